// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Recording backend and factory for reconciler tests.

use super::{BackendError, BackendFactory, BackendRecord, DnsBackend};
use crate::crd::DNSZone;
use crate::errors::{Error, Result};
use crate::store::ObjectStore;
use async_trait::async_trait;
use kube::ResourceExt;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Backend that keeps records in memory and counts calls.
#[derive(Debug, Default)]
pub struct FakeBackend {
    identity: String,
    domain: String,
    records: Mutex<BTreeMap<(String, String), BackendRecord>>,
    deletes: Mutex<Vec<BackendRecord>>,
    fail_deletes: Mutex<bool>,
}

impl FakeBackend {
    pub fn new(identity: &str, domain: &str) -> Self {
        Self {
            identity: identity.to_string(),
            domain: domain.to_string(),
            ..Default::default()
        }
    }

    pub fn records(&self) -> Vec<BackendRecord> {
        self.records.lock().values().cloned().collect()
    }

    pub fn deleted(&self) -> Vec<BackendRecord> {
        self.deletes.lock().clone()
    }

    pub fn fail_deletes(&self, fail: bool) {
        *self.fail_deletes.lock() = fail;
    }
}

#[async_trait]
impl DnsBackend for FakeBackend {
    async fn update(&self, record: &BackendRecord) -> Result<(), BackendError> {
        self.records.lock().insert(
            (record.name.clone(), record.record_type.to_string()),
            record.clone(),
        );
        Ok(())
    }

    async fn delete(&self, record: &BackendRecord) -> Result<(), BackendError> {
        if *self.fail_deletes.lock() {
            return Err(BackendError::Api {
                method: "DELETE",
                url: "fake://".into(),
                status: 503,
                body: "unavailable".into(),
            });
        }
        let mut records = self.records.lock();
        let key = (record.name.clone(), record.record_type.to_string());
        if records
            .get(&key)
            .is_some_and(|existing| existing.ttl == record.ttl && existing.data == record.data)
        {
            records.remove(&key);
            self.deletes.lock().push(record.clone());
        }
        Ok(())
    }

    fn identity(&self) -> String {
        self.identity.clone()
    }

    fn domain(&self) -> &str {
        &self.domain
    }
}

/// Factory handing out pre-registered backends by zone name.
#[derive(Default)]
pub struct FakeFactory {
    backends: Mutex<BTreeMap<String, Arc<FakeBackend>>>,
    builds: Mutex<usize>,
}

impl FakeFactory {
    pub fn register(&self, zone: &str, backend: Arc<FakeBackend>) {
        self.backends.lock().insert(zone.to_string(), backend);
    }

    pub fn builds(&self) -> usize {
        *self.builds.lock()
    }
}

#[async_trait]
impl<S: ObjectStore> BackendFactory<S> for FakeFactory {
    async fn create(&self, _store: &S, zone: &DNSZone) -> Result<Arc<dyn DnsBackend>> {
        *self.builds.lock() += 1;
        let backend: Arc<dyn DnsBackend> = self
            .backends
            .lock()
            .get(&zone.name_any())
            .cloned()
            .ok_or_else(|| Error::NoBackendConfigured(zone.name_any()))?;
        Ok(backend)
    }
}
