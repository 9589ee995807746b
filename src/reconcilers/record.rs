// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `DNSRecord` reconciliation.
//!
//! A record fans out to one `DNSZoneRecord` per referenced zone, each carrying
//! the effective IP source and TTL after applying the override chain
//! (zone reference, then record, then zone template). When TLS is requested a
//! cert-manager `Certificate` covering every host and cname in every zone is
//! maintained next to them.

use super::status::{self, REASON_OWNERSHIP_CONFLICT, REASON_RECONCILED};
use super::{full_host, Outcome, Reconcile};
use crate::certmanager::{Certificate, CertificateSpec, IssuerReference};
use crate::constants::{
    CERT_MANAGER_GROUP, DEFAULT_CERTIFICATE_SUFFIX, DEFAULT_DNS_RECORD_TTL_SECS, KIND_CERTIFICATE,
    KIND_DNS_RECORD, KIND_DNS_ZONE_RECORD,
};
use crate::context::Context;
use crate::crd::{DNSRecord, DNSZone, DNSZoneRecord, DNSZoneRecordSpec, DNSZoneRef, TlsSpec};
use crate::diff::diff;
use crate::errors::{Error, Result};
use crate::metrics;
use crate::store::{IndexField, ListQuery, ObjectKey, ObjectStore};
use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;
use tracing::{debug, info};

pub struct RecordReconciler;

#[async_trait]
impl<S: ObjectStore> Reconcile<S> for RecordReconciler {
    type Object = DNSRecord;

    async fn update(&self, ctx: &Context<S>, record: DNSRecord) -> Result<Outcome> {
        let namespace = record.namespace().ok_or(Error::InvalidObject {
            kind: KIND_DNS_RECORD,
            field: "metadata.namespace",
        })?;
        let name = record.name_any();
        let owner = owner_reference(&record)?;

        let mut desired = Vec::with_capacity(record.spec.zones.len());
        for zone_ref in &record.spec.zones {
            let zone: DNSZone = ctx
                .store
                .get(&ObjectKey::cluster(&zone_ref.name))
                .await?
                .ok_or_else(|| Error::ZoneNotFound(zone_ref.name.clone()))?;
            if zone.metadata.deletion_timestamp.is_some() {
                debug!(
                    "Zone {} is terminating, skipping it for {}/{}",
                    zone_ref.name, namespace, name
                );
                continue;
            }
            desired.push(desired_zone_record(&record, &namespace, &zone, zone_ref, &owner)?);
        }

        let owned: Vec<DNSZoneRecord> = ctx
            .store
            .list(Some(&namespace), &ListQuery::index(IndexField::Owner, &name))
            .await?;
        let changes = diff(&desired, &owned);
        if changes.is_empty() {
            debug!("DNSZoneRecords of {}/{} up to date", namespace, name);
        }
        for zone_record in &changes.missing {
            let created = ctx.store.create(zone_record).await?;
            info!(
                "Created DNSZoneRecord {} for zone {}",
                ObjectKey::of(&created),
                created.spec.zone_name
            );
            metrics::record_resource_created(KIND_DNS_ZONE_RECORD);
        }
        for zone_record in &changes.excess {
            let key = ObjectKey::of(zone_record);
            ctx.store.delete::<DNSZoneRecord>(&key).await?;
            info!("Deleted DNSZoneRecord {}", key);
            metrics::record_resource_deleted(KIND_DNS_ZONE_RECORD);
        }

        match reconcile_certificate(ctx, &record, &namespace, &owner).await {
            Err(e @ Error::OwnershipConflict { .. }) => {
                status::set_record_ready(
                    &ctx.store,
                    &record,
                    false,
                    REASON_OWNERSHIP_CONFLICT,
                    &e.to_string(),
                )
                .await?;
                return Err(e);
            }
            result => result?,
        }

        status::set_record_ready(
            &ctx.store,
            &record,
            true,
            REASON_RECONCILED,
            "All zone records and certificates are in place",
        )
        .await?;
        Ok(Outcome::Done)
    }
}

fn owner_reference(record: &DNSRecord) -> Result<OwnerReference> {
    record.controller_owner_ref(&()).ok_or(Error::InvalidObject {
        kind: KIND_DNS_RECORD,
        field: "metadata.uid",
    })
}

/// The `DNSZoneRecord` a record wants in one zone.
fn desired_zone_record(
    record: &DNSRecord,
    namespace: &str,
    zone: &DNSZone,
    zone_ref: &DNSZoneRef,
    owner: &OwnerReference,
) -> Result<DNSZoneRecord> {
    let template = &zone.spec.record_template;
    let ip_source = [&zone_ref.ip_source, &record.spec.ip_source, &template.ip_source]
        .into_iter()
        .find(|source| !source.is_empty())
        .ok_or(Error::MissingIpSource)?
        .with_defaults(namespace);
    ip_source.resolve()?;

    let ttl = zone_ref
        .ttl
        .or(record.spec.ttl)
        .or(template.ttl)
        .unwrap_or(DEFAULT_DNS_RECORD_TTL_SECS);

    Ok(DNSZoneRecord {
        metadata: ObjectMeta {
            generate_name: Some(format!("{}-", record.name_any())),
            namespace: Some(namespace.to_string()),
            owner_references: Some(vec![owner.clone()]),
            ..ObjectMeta::default()
        },
        spec: DNSZoneRecordSpec {
            zone_name: zone_ref.name.clone(),
            hosts: record.spec.hosts.clone(),
            cnames: record.spec.cnames.clone(),
            ip_source,
            ttl,
        },
    })
}

fn certificate_name(record: &DNSRecord, tls: &TlsSpec) -> String {
    tls.certificate_name
        .clone()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| format!("{}{DEFAULT_CERTIFICATE_SUFFIX}", record.name_any()))
}

/// Whether `certificate` is controlled by `record`.
fn controlled_by(certificate: &Certificate, owner: &OwnerReference) -> bool {
    certificate.owner_references().iter().any(|o| {
        o.controller == Some(true)
            && o.api_version == owner.api_version
            && o.kind == owner.kind
            && o.name == owner.name
    })
}

/// DNS names covered by the certificate: per zone, every host then every cname.
fn certificate_dns_names<S: ObjectStore>(ctx: &Context<S>, record: &DNSRecord) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for zone_ref in &record.spec.zones {
        let backend = ctx
            .backends
            .get(&zone_ref.name)
            .ok_or_else(|| Error::BackendNotCached(zone_ref.name.clone()))?;
        let domain = backend.domain();
        names.extend(record.spec.hosts.iter().map(|h| full_host(h, domain)));
        names.extend(record.spec.cnames.iter().map(|c| full_host(c, domain)));
    }
    Ok(names)
}

fn desired_certificate<S: ObjectStore>(
    ctx: &Context<S>,
    record: &DNSRecord,
    tls: &TlsSpec,
    name: &str,
    namespace: &str,
    owner: &OwnerReference,
) -> Result<Certificate> {
    let spec = CertificateSpec {
        secret_name: tls
            .secret_name
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| name.to_string()),
        dns_names: certificate_dns_names(ctx, record)?,
        issuer_ref: IssuerReference {
            name: tls.issuer.name.clone(),
            kind: Some(tls.issuer.kind.unwrap_or_default().to_string()),
            group: Some(CERT_MANAGER_GROUP.to_string()),
        },
        extra: BTreeMap::new(),
    };

    let mut certificate = Certificate::new(name, spec);
    certificate.metadata.namespace = Some(namespace.to_string());
    certificate.metadata.owner_references = Some(vec![owner.clone()]);
    Ok(certificate)
}

fn certificate_differs(existing: &CertificateSpec, desired: &CertificateSpec) -> bool {
    existing.secret_name != desired.secret_name
        || existing.issuer_ref != desired.issuer_ref
        || existing.dns_names != desired.dns_names
}

async fn reconcile_certificate<S: ObjectStore>(
    ctx: &Context<S>,
    record: &DNSRecord,
    namespace: &str,
    owner: &OwnerReference,
) -> Result<()> {
    let expected = record
        .spec
        .tls
        .as_ref()
        .map(|tls| certificate_name(record, tls));

    let owned: Vec<Certificate> = ctx
        .store
        .list(
            Some(namespace),
            &ListQuery::index(IndexField::Owner, record.name_any()),
        )
        .await?;
    for certificate in owned {
        if expected.as_deref() != Some(certificate.name_any().as_str()) {
            let key = ObjectKey::of(&certificate);
            ctx.store.delete::<Certificate>(&key).await?;
            info!("Deleted stale Certificate {}", key);
            metrics::record_resource_deleted(KIND_CERTIFICATE);
        }
    }

    let (Some(tls), Some(name)) = (record.spec.tls.as_ref(), expected) else {
        return Ok(());
    };

    let desired = desired_certificate(ctx, record, tls, &name, namespace, owner)?;
    let key = ObjectKey::namespaced(namespace, &name);
    match ctx.store.get::<Certificate>(&key).await? {
        Some(existing) if !controlled_by(&existing, owner) => Err(Error::OwnershipConflict {
            kind: KIND_CERTIFICATE.to_string(),
            name: key.to_string(),
        }),
        Some(mut existing) => {
            if certificate_differs(&existing.spec, &desired.spec) {
                existing.spec.secret_name = desired.spec.secret_name;
                existing.spec.dns_names = desired.spec.dns_names;
                existing.spec.issuer_ref = desired.spec.issuer_ref;
                ctx.store.replace(&existing).await?;
                info!("Updated Certificate {}", key);
                metrics::record_resource_updated(KIND_CERTIFICATE);
            }
            Ok(())
        }
        None => {
            ctx.store.create(&desired).await?;
            info!("Created Certificate {}", key);
            metrics::record_resource_created(KIND_CERTIFICATE);
            Ok(())
        }
    }
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod record_tests;
