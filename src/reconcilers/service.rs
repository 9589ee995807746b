// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `Service` watch: invalidates zone records that publish a service IP.

use super::{Outcome, Reconcile};
use crate::constants::KIND_DNS_ZONE_RECORD;
use crate::context::Context;
use crate::crd::DNSZoneRecord;
use crate::errors::Result;
use crate::metrics;
use crate::store::{IndexField, ListQuery, ObjectKey, ObjectStore};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Service;
use tracing::{debug, info};

pub struct ServiceReconciler;

async fn referencing<S: ObjectStore>(store: &S, key: &ObjectKey) -> Result<Vec<DNSZoneRecord>> {
    store
        .list(None, &ListQuery::index(IndexField::Service, key.to_string()))
        .await
}

async fn requeue_referencing<S: ObjectStore>(ctx: &Context<S>, key: &ObjectKey) -> Result<()> {
    let zone_records = referencing(&ctx.store, key).await?;
    debug!("Service {} changed, requeueing {} DNSZoneRecord(s)", key, zone_records.len());
    for zone_record in &zone_records {
        ctx.requeue.zone_record(ObjectKey::of(zone_record));
    }
    Ok(())
}

#[async_trait]
impl<S: ObjectStore> Reconcile<S> for ServiceReconciler {
    type Object = Service;

    async fn update(&self, ctx: &Context<S>, service: Service) -> Result<Outcome> {
        requeue_referencing(ctx, &ObjectKey::of(&service)).await?;
        Ok(Outcome::Done)
    }

    async fn delete(&self, ctx: &Context<S>, service: Service) -> Result<Outcome> {
        requeue_referencing(ctx, &ObjectKey::of(&service)).await?;
        Ok(Outcome::Done)
    }

    async fn absent(&self, ctx: &Context<S>, key: &ObjectKey) -> Result<()> {
        for zone_record in referencing(&ctx.store, key).await? {
            let zone_record_key = ObjectKey::of(&zone_record);
            ctx.store.delete::<DNSZoneRecord>(&zone_record_key).await?;
            info!("Service {} is gone, deleted DNSZoneRecord {}", key, zone_record_key);
            metrics::record_resource_deleted(KIND_DNS_ZONE_RECORD);
        }
        Ok(())
    }
}
