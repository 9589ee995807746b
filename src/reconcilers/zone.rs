// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `DNSZone` reconciliation.
//!
//! A zone owns the backend for its provider. On update the backend is built
//! and cached under the zone name, and every `DNSRecord` referencing the zone
//! is requeued so its zone records pick the backend up.
//!
//! Deletion is staged. The backend moves to its tombstone so draining
//! `DNSResource`s can still remove their records, the zone's
//! `DNSZoneRecord`s are deleted, and a teardown deadline is stamped on the
//! zone. The finalizer is released only once the deadline has passed.

use super::{finalizers, status, Outcome, Reconcile};
use crate::constants::{ANNOTATION_TEARDOWN_DEADLINE, FINALIZER, KIND_DNS_ZONE_RECORD};
use crate::context::Context;
use crate::crd::{DNSRecord, DNSZone, DNSZoneRecord};
use crate::errors::Result;
use crate::metrics;
use crate::store::{IndexField, ListQuery, ObjectKey, ObjectStore};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use kube::ResourceExt;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct ZoneReconciler;

#[async_trait]
impl<S: ObjectStore> Reconcile<S> for ZoneReconciler {
    type Object = DNSZone;

    async fn update(&self, ctx: &Context<S>, zone: DNSZone) -> Result<Outcome> {
        let name = zone.name_any();

        finalizers::ensure_finalizer(&ctx.store, &zone, FINALIZER).await?;

        let backend = ctx.factory.create(&ctx.store, &zone).await?;
        match ctx.backends.get(&name) {
            Some(current) if current.equals(backend.as_ref()) => {
                debug!("Backend for zone {} unchanged", name);
            }
            _ => {
                info!("Caching backend {} for zone {}", backend.identity(), name);
                ctx.backends.update(&name, backend.clone());
            }
        }

        let records: Vec<DNSRecord> = ctx
            .store
            .list(None, &ListQuery::index(IndexField::Zone, &name))
            .await?;
        debug!("Requeueing {} DNSRecord(s) of zone {}", records.len(), name);
        for record in &records {
            ctx.requeue.record(ObjectKey::of(record));
        }

        status::set_zone_domain(&ctx.store, &zone, backend.domain()).await?;
        Ok(Outcome::Done)
    }

    async fn delete(&self, ctx: &Context<S>, zone: DNSZone) -> Result<Outcome> {
        if !finalizers::has_finalizer(&zone, FINALIZER) {
            return Ok(Outcome::Done);
        }
        let name = zone.name_any();

        if ctx.backends.retire(&name) {
            info!("Retired backend of zone {}", name);
        } else if !ctx.backends.has_tombstone(&name) {
            // Controller restarted mid-teardown; rebuild so resources can still drain.
            match ctx.factory.create(&ctx.store, &zone).await {
                Ok(backend) => ctx.backends.bury(&name, backend),
                Err(e) => warn!(
                    "No backend available while tearing down zone {}, records will be left in the provider: {}",
                    name, e
                ),
            }
        }

        let zone_records: Vec<DNSZoneRecord> = ctx
            .store
            .list(None, &ListQuery::index(IndexField::Zone, &name))
            .await?;
        for zone_record in &zone_records {
            ctx.store
                .delete::<DNSZoneRecord>(&ObjectKey::of(zone_record))
                .await?;
            metrics::record_resource_deleted(KIND_DNS_ZONE_RECORD);
        }

        let now = Utc::now();
        let deadline = zone
            .annotations()
            .get(ANNOTATION_TEARDOWN_DEADLINE)
            .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
            .map(|d| d.with_timezone(&Utc));

        let Some(deadline) = deadline else {
            let grace = ctx.settings.teardown_grace(zone_records.len());
            let deadline = now + chrono::Duration::from_std(grace).unwrap_or(chrono::Duration::zero());
            info!(
                "Zone {} deleting {} zone record(s); releasing in {:?}",
                name,
                zone_records.len(),
                grace
            );
            let patch = json!({
                "metadata": {
                    "annotations": {
                        ANNOTATION_TEARDOWN_DEADLINE: deadline.to_rfc3339_opts(SecondsFormat::Secs, true)
                    }
                }
            });
            ctx.store
                .patch::<DNSZone>(&ObjectKey::of(&zone), &patch)
                .await?;
            return Ok(Outcome::RequeueAfter(grace));
        };

        if let Ok(remaining) = (deadline - now).to_std() {
            if remaining > Duration::ZERO {
                debug!("Zone {} teardown waits {:?} more", name, remaining);
                return Ok(Outcome::RequeueAfter(remaining));
            }
        }

        ctx.backends.purge_tombstone(&name);
        finalizers::remove_finalizer(&ctx.store, &zone, FINALIZER).await?;
        info!("Zone {} released", name);
        Ok(Outcome::Done)
    }
}

#[cfg(test)]
#[path = "zone_tests.rs"]
mod zone_tests;
