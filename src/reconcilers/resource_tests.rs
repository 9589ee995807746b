// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `resource.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::crd::{DNSResourceSpec, DnsRecordType};
    use crate::reconcilers::finalizers::has_finalizer;
    use crate::reconcilers::testutil::{Harness, NAMESPACE, ZONE};

    fn key() -> ObjectKey {
        ObjectKey::namespaced(NAMESPACE, "web-a")
    }

    async fn store_resource(h: &Harness) {
        let mut resource = DNSResource::new(
            "web-a",
            DNSResourceSpec {
                zone_name: ZONE.to_string(),
                domain: "www.example.com".to_string(),
                r#type: DnsRecordType::A,
                data: "1.2.3.4".to_string(),
                ttl: 300,
            },
        );
        resource.metadata.namespace = Some(NAMESPACE.to_string());
        h.store().create(&resource).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_pushes_record() {
        let h = Harness::new();
        let backend = h.ready_zone().await;
        store_resource(&h).await;

        let outcome = h.run(&ResourceReconciler, &key()).await;

        assert_eq!(outcome, Outcome::Done);
        let records = backend.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "www.example.com");
        assert_eq!(records[0].data, "1.2.3.4");

        let resource: DNSResource = h.get(&key()).await.unwrap();
        assert!(has_finalizer(&resource, FINALIZER));
        assert!(resource.status.unwrap().ready);
    }

    #[tokio::test]
    async fn test_update_without_backend_keeps_finalizer() {
        let h = Harness::new();
        store_resource(&h).await;

        let outcome = h.run(&ResourceReconciler, &key()).await;

        assert_eq!(outcome, Outcome::Requeue);
        let resource: DNSResource = h.get(&key()).await.unwrap();
        assert!(has_finalizer(&resource, FINALIZER));
        assert!(resource.status.is_none());
    }

    #[tokio::test]
    async fn test_delete_removes_record_and_releases() {
        let h = Harness::new();
        let backend = h.ready_zone().await;
        store_resource(&h).await;
        h.run(&ResourceReconciler, &key()).await;

        h.store().delete::<DNSResource>(&key()).await.unwrap();
        let outcome = h.run(&ResourceReconciler, &key()).await;

        assert_eq!(outcome, Outcome::Done);
        assert!(backend.records().is_empty());
        assert_eq!(backend.deleted().len(), 1);
        assert!(h.get::<DNSResource>(&key()).await.is_none());
    }

    #[tokio::test]
    async fn test_delete_uses_tombstone() {
        let h = Harness::new();
        let backend = h.ready_zone().await;
        store_resource(&h).await;
        h.run(&ResourceReconciler, &key()).await;
        assert!(h.ctx.backends.retire(ZONE));

        h.store().delete::<DNSResource>(&key()).await.unwrap();
        let outcome = h.run(&ResourceReconciler, &key()).await;

        assert_eq!(outcome, Outcome::Done);
        assert_eq!(backend.deleted().len(), 1);
        assert!(h.get::<DNSResource>(&key()).await.is_none());
    }

    #[tokio::test]
    async fn test_backend_failure_blocks_release() {
        let h = Harness::new();
        let backend = h.ready_zone().await;
        store_resource(&h).await;
        h.run(&ResourceReconciler, &key()).await;
        backend.fail_deletes(true);

        h.store().delete::<DNSResource>(&key()).await.unwrap();
        let outcome = h.run(&ResourceReconciler, &key()).await;

        assert_eq!(outcome, Outcome::Requeue);
        let resource: DNSResource = h.get(&key()).await.unwrap();
        assert!(has_finalizer(&resource, FINALIZER));
        assert_eq!(backend.records().len(), 1);

        backend.fail_deletes(false);
        assert_eq!(h.run(&ResourceReconciler, &key()).await, Outcome::Done);
        assert!(h.get::<DNSResource>(&key()).await.is_none());
    }

    #[tokio::test]
    async fn test_delete_without_any_backend_releases() {
        let h = Harness::new();
        h.ready_zone().await;
        store_resource(&h).await;
        h.run(&ResourceReconciler, &key()).await;
        h.ctx.backends.remove(ZONE);

        h.store().delete::<DNSResource>(&key()).await.unwrap();
        let outcome = h.run(&ResourceReconciler, &key()).await;

        assert_eq!(outcome, Outcome::Done);
        assert!(h.get::<DNSResource>(&key()).await.is_none());
    }
}
