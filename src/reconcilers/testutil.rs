// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Fixtures shared by the reconciler tests.

use super::{reconcile_request, Outcome, Reconcile};
use crate::backend::fake::{FakeBackend, FakeFactory};
use crate::config::ControllerSettings;
use crate::context::{Context, Requeue, RequeueReceivers};
use crate::crd::{
    DNSRecord, DNSRecordSpec, DNSZone, DNSZoneRecord, DNSZoneRef, DNSZoneSpec, IpSource,
    StaticIpSource,
};
use crate::store::memory::MemoryStore;
use crate::store::{ListQuery, ObjectKey, ObjectStore, StoreObject};
use std::sync::Arc;

pub const NAMESPACE: &str = "default";
pub const ZONE: &str = "example-com";
pub const DOMAIN: &str = "example.com";

pub struct Harness {
    pub ctx: Context<MemoryStore>,
    pub rx: RequeueReceivers,
    pub factory: Arc<FakeFactory>,
}

impl Harness {
    pub fn new() -> Self {
        let factory = Arc::new(FakeFactory::default());
        let (requeue, rx) = Requeue::channel();
        let ctx = Context::new(
            MemoryStore::new(),
            factory.clone(),
            requeue,
            ControllerSettings::default(),
        );
        Self { ctx, rx, factory }
    }

    pub fn store(&self) -> &MemoryStore {
        &self.ctx.store
    }

    /// Register a fake provider for `zone` serving `domain`.
    pub fn provider(&self, zone: &str, domain: &str) -> Arc<FakeBackend> {
        let backend = Arc::new(FakeBackend::new(&format!("fake:{zone}"), domain));
        self.factory.register(zone, backend.clone());
        backend
    }

    pub async fn run<R: Reconcile<MemoryStore>>(&self, reconciler: &R, key: &ObjectKey) -> Outcome {
        reconcile_request(reconciler, &self.ctx, key).await
    }

    pub async fn all<K: StoreObject>(&self) -> Vec<K> {
        self.store().list(None, &ListQuery::All).await.unwrap()
    }

    pub async fn get<K: StoreObject>(&self, key: &ObjectKey) -> Option<K> {
        self.store().get(key).await.unwrap()
    }

    /// Zone with a provider registered and its backend reconciled into the cache.
    pub async fn ready_zone(&self) -> Arc<FakeBackend> {
        let backend = self.provider(ZONE, DOMAIN);
        self.store()
            .create(&DNSZone::new(ZONE, DNSZoneSpec::default()))
            .await
            .unwrap();
        let outcome = self
            .run(&super::ZoneReconciler, &ObjectKey::cluster(ZONE))
            .await;
        assert_eq!(outcome, Outcome::Done);
        backend
    }

    /// Reconcile every stored zone record, then every stored resource.
    pub async fn converge_children(&self) {
        for zone_record in self.all::<DNSZoneRecord>().await {
            self.run(&super::ZoneRecordReconciler, &ObjectKey::of(&zone_record))
                .await;
        }
        for resource in self.all::<crate::crd::DNSResource>().await {
            self.run(&super::ResourceReconciler, &ObjectKey::of(&resource))
                .await;
        }
    }
}

pub fn static_ip(ip: &str) -> IpSource {
    IpSource {
        static_ip: Some(StaticIpSource { ip: ip.to_string() }),
        ..IpSource::default()
    }
}

pub fn record(name: &str, hosts: &[&str], cnames: &[&str], ip_source: IpSource) -> DNSRecord {
    let mut record = DNSRecord::new(
        name,
        DNSRecordSpec {
            hosts: hosts.iter().map(|h| (*h).to_string()).collect(),
            cnames: cnames.iter().map(|c| (*c).to_string()).collect(),
            zones: vec![DNSZoneRef {
                name: ZONE.to_string(),
                ip_source: IpSource::default(),
                ttl: None,
            }],
            ip_source,
            ttl: None,
            tls: None,
        },
    );
    record.metadata.namespace = Some(NAMESPACE.to_string());
    record
}
