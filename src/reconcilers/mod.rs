// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation logic for the switchboard resources.
//!
//! Each reconciler is driven by [`reconcile_request`], which fetches the
//! object by key and dispatches to one of three hooks:
//!
//! 1. **absent** - the object no longer exists (dependents may need cleanup)
//! 2. **update** - the object exists and is not being deleted
//! 3. **delete** - the object carries a `deletionTimestamp`
//!
//! Hook errors are logged, counted and turned into a requeue; they never
//! escape to the controller runtime.
//!
//! # Available Reconcilers
//!
//! - [`ZoneReconciler`] - builds the zone backend, owns zone teardown
//! - [`RecordReconciler`] - fans a `DNSRecord` out to one `DNSZoneRecord` per zone and a `Certificate`
//! - [`ZoneRecordReconciler`] - resolves the IP and expands hosts into `DNSResource`s
//! - [`ResourceReconciler`] - pushes one record to the provider
//! - [`ServiceReconciler`], [`NodeReconciler`] - requeue zone records whose IP source moved

pub mod finalizers;
pub mod node;
pub mod record;
pub mod resource;
pub mod service;
pub mod status;
pub mod zone;
pub mod zonerecord;

pub use node::NodeReconciler;
pub use record::RecordReconciler;
pub use resource::ResourceReconciler;
pub use service::ServiceReconciler;
pub use zone::ZoneReconciler;
pub use zonerecord::ZoneRecordReconciler;

use crate::constants::APEX_HOST;
use crate::context::Context;
use crate::errors::Result;
use crate::metrics;
use crate::store::{ObjectKey, ObjectStore, StoreObject};
use async_trait::async_trait;
use kube::Resource;
use std::time::{Duration, Instant};
use tracing::{debug, error, info_span, Instrument};

/// What the runtime should do after a reconcile.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Converged; wait for the next change
    Done,
    /// Retry after the configured error delay
    Requeue,
    /// Retry after the given delay
    RequeueAfter(Duration),
}

#[async_trait]
pub trait Reconcile<S: ObjectStore>: Send + Sync {
    type Object: StoreObject;

    async fn update(&self, ctx: &Context<S>, obj: Self::Object) -> Result<Outcome>;

    async fn delete(&self, _ctx: &Context<S>, _obj: Self::Object) -> Result<Outcome> {
        Ok(Outcome::Done)
    }

    async fn absent(&self, _ctx: &Context<S>, _key: &ObjectKey) -> Result<()> {
        Ok(())
    }
}

/// Fully-qualified name of `host` in `domain`; `@` is the apex.
pub(crate) fn full_host(host: &str, domain: &str) -> String {
    if host == APEX_HOST {
        domain.to_string()
    } else {
        format!("{host}.{domain}")
    }
}

/// Fetch `key` and run the matching hook of `reconciler`.
pub async fn reconcile_request<S, R>(reconciler: &R, ctx: &Context<S>, key: &ObjectKey) -> Outcome
where
    S: ObjectStore,
    R: Reconcile<S>,
{
    let kind = <R::Object as Resource>::kind(&());
    let span = info_span!(
        "reconcile",
        kind = %kind,
        namespace = key.namespace.as_deref().unwrap_or(""),
        name = %key.name,
    );

    async {
        let start = Instant::now();
        debug!("Reconcile request for {} {}", kind, key);

        let result = match ctx.store.get::<R::Object>(key).await {
            Ok(None) => reconciler.absent(ctx, key).await.map(|()| Outcome::Done),
            Ok(Some(obj)) if obj.meta().deletion_timestamp.is_none() => {
                reconciler.update(ctx, obj).await
            }
            Ok(Some(obj)) => reconciler.delete(ctx, obj).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(outcome) => {
                metrics::record_reconciliation_success(&kind, start.elapsed());
                match outcome {
                    Outcome::Done => {}
                    Outcome::Requeue => metrics::record_reconciliation_requeue(&kind, "requested"),
                    Outcome::RequeueAfter(_) => {
                        metrics::record_reconciliation_requeue(&kind, "scheduled");
                    }
                }
                outcome
            }
            Err(e) => {
                error!("Failed to reconcile {} {}: {}", kind, key, e);
                metrics::record_reconciliation_error(&kind, start.elapsed());
                metrics::record_error(&kind, e.error_type());
                metrics::record_reconciliation_requeue(&kind, "error");
                Outcome::Requeue
            }
        }
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod testutil;
