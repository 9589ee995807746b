// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `DNSZoneRecord` reconciliation.
//!
//! Resolves the record's IP source to a concrete address and expands hosts
//! and cnames into one `DNSResource` each. Children are diffed by spec, so a
//! changed IP replaces every A resource of the record.

use super::{full_host, Outcome, Reconcile};
use crate::constants::{KIND_DNS_RESOURCE, KIND_DNS_ZONE_RECORD};
use crate::context::Context;
use crate::crd::{
    DNSResource, DNSResourceSpec, DNSZoneRecord, DnsRecordType, IpSourceRef, NodeIpSource,
    ServiceIpSource, ServiceIpType,
};
use crate::diff::diff;
use crate::errors::{Error, Result};
use crate::metrics;
use crate::store::{IndexField, ListQuery, ObjectKey, ObjectStore};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::{Resource, ResourceExt};
use tracing::{debug, info};

pub struct ZoneRecordReconciler;

#[async_trait]
impl<S: ObjectStore> Reconcile<S> for ZoneRecordReconciler {
    type Object = DNSZoneRecord;

    async fn update(&self, ctx: &Context<S>, zone_record: DNSZoneRecord) -> Result<Outcome> {
        let namespace = zone_record.namespace().ok_or(Error::InvalidObject {
            kind: KIND_DNS_ZONE_RECORD,
            field: "metadata.namespace",
        })?;
        let name = zone_record.name_any();
        let zone_name = &zone_record.spec.zone_name;

        let backend = ctx
            .backends
            .get(zone_name)
            .ok_or_else(|| Error::BackendNotCached(zone_name.clone()))?;

        let ip = resolve_ip(&ctx.store, &zone_record, &namespace).await?;
        debug!("DNSZoneRecord {}/{} resolves to {}", namespace, name, ip);

        let owner = zone_record
            .controller_owner_ref(&())
            .ok_or(Error::InvalidObject {
                kind: KIND_DNS_ZONE_RECORD,
                field: "metadata.uid",
            })?;
        let desired = desired_resources(&zone_record, &namespace, backend.domain(), &ip, &owner)?;

        let owned: Vec<DNSResource> = ctx
            .store
            .list(Some(&namespace), &ListQuery::index(IndexField::Owner, &name))
            .await?;
        let changes = diff(&desired, &owned);
        for resource in &changes.missing {
            let created = ctx.store.create(resource).await?;
            info!(
                "Created DNSResource {} ({} {} -> {})",
                ObjectKey::of(&created),
                created.spec.r#type,
                created.spec.domain,
                created.spec.data
            );
            metrics::record_resource_created(KIND_DNS_RESOURCE);
        }
        for resource in &changes.excess {
            let key = ObjectKey::of(resource);
            ctx.store.delete::<DNSResource>(&key).await?;
            info!("Deleted DNSResource {}", key);
            metrics::record_resource_deleted(KIND_DNS_RESOURCE);
        }

        Ok(Outcome::Done)
    }
}

async fn resolve_ip<S: ObjectStore>(
    store: &S,
    zone_record: &DNSZoneRecord,
    namespace: &str,
) -> Result<String> {
    match zone_record.spec.ip_source.resolve()? {
        IpSourceRef::Static(source) => Ok(source.ip.clone()),
        IpSourceRef::Service(source) => service_ip(store, source, namespace).await,
        IpSourceRef::Node(source) => node_ip(store, source).await,
    }
}

async fn service_ip<S: ObjectStore>(
    store: &S,
    source: &ServiceIpSource,
    default_namespace: &str,
) -> Result<String> {
    let namespace = source
        .namespace
        .as_deref()
        .filter(|ns| !ns.is_empty())
        .unwrap_or(default_namespace);
    let unavailable = |reason: &str| Error::ServiceIpUnavailable {
        namespace: namespace.to_string(),
        name: source.name.clone(),
        reason: reason.to_string(),
    };

    let service: Service = store
        .get(&ObjectKey::namespaced(namespace, &source.name))
        .await?
        .ok_or_else(|| unavailable("service not found"))?;

    match source.r#type.unwrap_or_default() {
        ServiceIpType::Cluster => service
            .spec
            .and_then(|spec| spec.cluster_ip)
            .filter(|ip| !ip.is_empty() && ip != "None")
            .ok_or_else(|| unavailable("cluster IP not available")),
        ServiceIpType::External => service
            .status
            .and_then(|status| status.load_balancer)
            .and_then(|lb| lb.ingress)
            .and_then(|ingress| ingress.into_iter().next())
            .and_then(|ingress| ingress.ip)
            .filter(|ip| !ip.is_empty())
            .ok_or_else(|| unavailable("load balancer not available")),
    }
}

/// Lexicographically smallest address of the requested type over all
/// matching nodes, taking the first such address of each node.
async fn node_ip<S: ObjectStore>(store: &S, source: &NodeIpSource) -> Result<String> {
    let address_type = source.r#type.unwrap_or_default().address_type();
    let query = if source.match_labels.is_empty() {
        ListQuery::All
    } else {
        ListQuery::Labels(source.match_labels.clone())
    };

    let nodes: Vec<Node> = store.list(None, &query).await?;
    nodes
        .iter()
        .filter_map(|node| {
            node.status
                .as_ref()?
                .addresses
                .as_ref()?
                .iter()
                .find(|address| address.type_ == address_type)
                .map(|address| address.address.clone())
        })
        .min()
        .ok_or_else(|| Error::NoMatchingNode {
            address_type: address_type.to_string(),
        })
}

fn desired_resources(
    zone_record: &DNSZoneRecord,
    namespace: &str,
    domain: &str,
    ip: &str,
    owner: &OwnerReference,
) -> Result<Vec<DNSResource>> {
    let spec = &zone_record.spec;
    let resource = |record_type: DnsRecordType, host: &str, data: String| DNSResource {
        metadata: ObjectMeta {
            generate_name: Some(format!("{}-", zone_record.name_any())),
            namespace: Some(namespace.to_string()),
            owner_references: Some(vec![owner.clone()]),
            ..ObjectMeta::default()
        },
        spec: DNSResourceSpec {
            zone_name: spec.zone_name.clone(),
            domain: full_host(host, domain),
            r#type: record_type,
            data,
            ttl: spec.ttl,
        },
        status: None,
    };

    let mut resources: Vec<DNSResource> = spec
        .hosts
        .iter()
        .map(|host| resource(DnsRecordType::A, host, ip.to_string()))
        .collect();

    if !spec.cnames.is_empty() {
        let target = spec
            .hosts
            .first()
            .map(|host| full_host(host, domain))
            .ok_or_else(|| Error::NoHosts(ObjectKey::of(zone_record).to_string()))?;
        resources.extend(
            spec.cnames
                .iter()
                .map(|cname| resource(DnsRecordType::Cname, cname, target.clone())),
        );
    }

    Ok(resources)
}

#[cfg(test)]
#[path = "zonerecord_tests.rs"]
mod zonerecord_tests;
