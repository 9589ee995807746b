// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for all reconcilers.
//!
//! Every reconciler receives an `Arc<Context<S>>` holding:
//! - the object store (Kubernetes API plus secondary indexes)
//! - the backend cache shared by zone, zone record and resource reconcilers
//! - the factory that builds backends from zone specs
//! - requeue senders for explicit, index-driven fan-out
//! - timing settings

use crate::backend::{BackendCache, BackendFactory};
use crate::config::ControllerSettings;
use crate::store::{ObjectKey, ObjectStore};
use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use std::sync::Arc;
use tracing::warn;

pub struct Context<S: ObjectStore> {
    pub store: S,
    pub backends: BackendCache,
    pub factory: Arc<dyn BackendFactory<S>>,
    pub requeue: Requeue,
    pub settings: ControllerSettings,
}

impl<S: ObjectStore> Context<S> {
    pub fn new(
        store: S,
        factory: Arc<dyn BackendFactory<S>>,
        requeue: Requeue,
        settings: ControllerSettings,
    ) -> Self {
        Self {
            store,
            backends: BackendCache::new(),
            factory,
            requeue,
            settings,
        }
    }
}

/// Senders that push keys back into the `DNSRecord` and `DNSZoneRecord` work queues.
///
/// The controller runtime merges these into its scheduler, so a request is
/// deduplicated with any pending watch-triggered reconcile of the same object.
#[derive(Clone)]
pub struct Requeue {
    records: UnboundedSender<ObjectKey>,
    zone_records: UnboundedSender<ObjectKey>,
}

/// Receiving halves of [`Requeue`], consumed by the controllers.
pub struct RequeueReceivers {
    pub records: UnboundedReceiver<ObjectKey>,
    pub zone_records: UnboundedReceiver<ObjectKey>,
}

impl Requeue {
    #[must_use]
    pub fn channel() -> (Self, RequeueReceivers) {
        let (records, records_rx) = mpsc::unbounded();
        let (zone_records, zone_records_rx) = mpsc::unbounded();
        (
            Self {
                records,
                zone_records,
            },
            RequeueReceivers {
                records: records_rx,
                zone_records: zone_records_rx,
            },
        )
    }

    /// Schedule a `DNSRecord` reconcile.
    pub fn record(&self, key: ObjectKey) {
        if let Err(e) = self.records.unbounded_send(key) {
            warn!("Dropping DNSRecord requeue for {}: receiver closed", e.into_inner());
        }
    }

    /// Schedule a `DNSZoneRecord` reconcile.
    pub fn zone_record(&self, key: ObjectKey) {
        if let Err(e) = self.zone_records.unbounded_send(key) {
            warn!(
                "Dropping DNSZoneRecord requeue for {}: receiver closed",
                e.into_inner()
            );
        }
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod context_tests;
