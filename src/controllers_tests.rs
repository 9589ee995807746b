// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `controllers.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::crd::{DNSRecord, DNSZone};

    #[test]
    fn test_action_mapping() {
        let error_requeue = Duration::from_secs(30);
        assert_eq!(action(Outcome::Done, error_requeue), Action::await_change());
        assert_eq!(
            action(Outcome::Requeue, error_requeue),
            Action::requeue(error_requeue)
        );
        assert_eq!(
            action(Outcome::RequeueAfter(Duration::from_secs(5)), error_requeue),
            Action::requeue(Duration::from_secs(5))
        );
    }

    #[tokio::test]
    async fn test_triggers_keep_namespace() {
        let keys = futures::stream::iter(vec![
            ObjectKey::namespaced("default", "web"),
            ObjectKey::namespaced("team-a", "api"),
        ]);
        let refs: Vec<ObjectRef<DNSRecord>> = triggers(keys).collect().await;
        assert_eq!(
            refs,
            vec![
                ObjectRef::new("web").within("default"),
                ObjectRef::new("api").within("team-a"),
            ]
        );
    }

    #[tokio::test]
    async fn test_triggers_cluster_scoped() {
        let keys = futures::stream::iter(vec![ObjectKey::cluster("example-com")]);
        let refs: Vec<ObjectRef<DNSZone>> = triggers(keys).collect().await;
        assert_eq!(refs, vec![ObjectRef::new("example-com")]);
        assert!(refs[0].namespace.is_none());
    }
}
