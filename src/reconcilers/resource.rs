// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `DNSResource` reconciliation: one record in the provider.
//!
//! The finalizer is attached before the record is pushed so that a deleted
//! resource always gets a chance to remove what it published. On deletion the
//! zone's tombstoned backend is used when the zone itself is already gone.

use super::{finalizers, status, Outcome, Reconcile};
use crate::backend::BackendRecord;
use crate::constants::FINALIZER;
use crate::context::Context;
use crate::crd::DNSResource;
use crate::errors::{Error, Result};
use crate::metrics;
use crate::store::{ObjectKey, ObjectStore};
use async_trait::async_trait;
use tracing::{debug, info, warn};

pub struct ResourceReconciler;

#[async_trait]
impl<S: ObjectStore> Reconcile<S> for ResourceReconciler {
    type Object = DNSResource;

    async fn update(&self, ctx: &Context<S>, resource: DNSResource) -> Result<Outcome> {
        finalizers::ensure_finalizer(&ctx.store, &resource, FINALIZER).await?;

        let zone_name = &resource.spec.zone_name;
        let backend = ctx
            .backends
            .get(zone_name)
            .ok_or_else(|| Error::BackendNotCached(zone_name.clone()))?;

        let record = BackendRecord::from(&resource.spec);
        let result = backend.update(&record).await;
        metrics::record_backend_operation("update", result.is_ok());
        result?;
        debug!(
            "Pushed {} {} -> {} to {}",
            record.record_type,
            record.name,
            record.data,
            backend.identity()
        );

        status::set_resource_ready(&ctx.store, &resource).await?;
        Ok(Outcome::Done)
    }

    async fn delete(&self, ctx: &Context<S>, resource: DNSResource) -> Result<Outcome> {
        if !finalizers::has_finalizer(&resource, FINALIZER) {
            return Ok(Outcome::Done);
        }

        let record = BackendRecord::from(&resource.spec);
        match ctx.backends.get_for_deletion(&resource.spec.zone_name) {
            Some(backend) => {
                let result = backend.delete(&record).await;
                metrics::record_backend_operation("delete", result.is_ok());
                result?;
                info!(
                    "Removed {} {} from {}",
                    record.record_type,
                    record.name,
                    backend.identity()
                );
            }
            None => warn!(
                "No backend for zone {}; leaving {} {} in the provider",
                resource.spec.zone_name, record.record_type, record.name
            ),
        }

        finalizers::remove_finalizer(&ctx.store, &resource, FINALIZER).await?;
        debug!("Released DNSResource {}", ObjectKey::of(&resource));
        Ok(Outcome::Done)
    }
}

#[cfg(test)]
#[path = "resource_tests.rs"]
mod resource_tests;
