// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Zone-name keyed cache of live DNS backends.
//!
//! A zone being torn down moves its backend to a tombstone key
//! (`*<zone>`) so that resources still draining can delete their records
//! even though the zone no longer offers a live backend.

use super::DnsBackend;
use crate::constants::TOMBSTONE_PREFIX;
use crate::metrics;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct BackendCache {
    entries: Arc<RwLock<HashMap<String, Arc<dyn DnsBackend>>>>,
}

fn tombstone_key(zone: &str) -> String {
    format!("{TOMBSTONE_PREFIX}{zone}")
}

impl BackendCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Live backend for `zone`.
    #[must_use]
    pub fn get(&self, zone: &str) -> Option<Arc<dyn DnsBackend>> {
        self.entries.read().get(zone).cloned()
    }

    pub fn update(&self, zone: &str, backend: Arc<dyn DnsBackend>) {
        let mut entries = self.entries.write();
        entries.insert(zone.to_string(), backend);
        metrics::set_cached_backends(entries.len());
    }

    pub fn remove(&self, zone: &str) {
        let mut entries = self.entries.write();
        entries.remove(zone);
        metrics::set_cached_backends(entries.len());
    }

    /// Move the live entry of `zone` to its tombstone key.
    ///
    /// Returns `true` when a live entry was moved. Without a live entry any
    /// existing tombstone is left untouched.
    pub fn retire(&self, zone: &str) -> bool {
        let mut entries = self.entries.write();
        match entries.remove(zone) {
            Some(backend) => {
                entries.insert(tombstone_key(zone), backend);
                true
            }
            None => false,
        }
    }

    /// Place a backend directly under the tombstone key of `zone`.
    pub fn bury(&self, zone: &str, backend: Arc<dyn DnsBackend>) {
        let mut entries = self.entries.write();
        entries.insert(tombstone_key(zone), backend);
        metrics::set_cached_backends(entries.len());
    }

    /// Live backend of `zone`, or its tombstone when the zone is terminating.
    #[must_use]
    pub fn get_for_deletion(&self, zone: &str) -> Option<Arc<dyn DnsBackend>> {
        let entries = self.entries.read();
        entries
            .get(zone)
            .or_else(|| entries.get(&tombstone_key(zone)))
            .cloned()
    }

    #[must_use]
    pub fn has_tombstone(&self, zone: &str) -> bool {
        self.entries.read().contains_key(&tombstone_key(zone))
    }

    pub fn purge_tombstone(&self, zone: &str) {
        self.remove(&tombstone_key(zone));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod cache_tests;
