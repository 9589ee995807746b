// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `Node` watch: any node change may move the address picked for node-sourced
//! zone records, so all of them are requeued. A draining node counts as a
//! change as soon as its deletion starts.

use super::{Outcome, Reconcile};
use crate::context::Context;
use crate::crd::DNSZoneRecord;
use crate::errors::Result;
use crate::store::{IndexField, ListQuery, ObjectKey, ObjectStore};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Node;
use kube::ResourceExt;
use tracing::debug;

pub struct NodeReconciler;

async fn requeue_node_sourced<S: ObjectStore>(ctx: &Context<S>, node: &str) -> Result<()> {
    let zone_records: Vec<DNSZoneRecord> = ctx
        .store
        .list(None, &ListQuery::index(IndexField::IpSource, "node"))
        .await?;
    debug!(
        "Node {} changed, requeueing {} node-sourced DNSZoneRecord(s)",
        node,
        zone_records.len()
    );
    for zone_record in &zone_records {
        ctx.requeue.zone_record(ObjectKey::of(zone_record));
    }
    Ok(())
}

#[async_trait]
impl<S: ObjectStore> Reconcile<S> for NodeReconciler {
    type Object = Node;

    async fn update(&self, ctx: &Context<S>, node: Node) -> Result<Outcome> {
        requeue_node_sourced(ctx, &node.name_any()).await?;
        Ok(Outcome::Done)
    }

    async fn delete(&self, ctx: &Context<S>, node: Node) -> Result<Outcome> {
        requeue_node_sourced(ctx, &node.name_any()).await?;
        Ok(Outcome::Done)
    }

    async fn absent(&self, ctx: &Context<S>, key: &ObjectKey) -> Result<()> {
        requeue_node_sourced(ctx, &key.name).await
    }
}
