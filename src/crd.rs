// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definitions (CRDs) for DNS record management.
//!
//! Resources form an ownership chain:
//!
//! - [`DNSZone`] - Cluster-scoped zone bound to an external DNS provider
//! - [`DNSRecord`] - User intent: a set of hosts published in one or more zones
//! - [`DNSZoneRecord`] - One record projected into a single zone (owned by a `DNSRecord`)
//! - [`DNSResource`] - A single A or CNAME entry pushed to the backend (owned by a `DNSZoneRecord`)
//!
//! # Example: Publishing a service
//!
//! ```yaml
//! apiVersion: switchboard.firestoned.io/v1alpha1
//! kind: DNSRecord
//! metadata:
//!   name: web
//!   namespace: default
//! spec:
//!   hosts: ["www", "@"]
//!   cnames: ["app"]
//!   zones:
//!     - name: example-com
//!       serviceIP:
//!         name: ingress
//!         type: ExternalIP
//! ```

use crate::errors::Error;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// IP Sources
// ============================================================================

/// Literal IP address source.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
pub struct StaticIpSource {
    /// IP address published for every host
    pub ip: String,
}

/// Which address of a `Service` to publish.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
pub enum ServiceIpType {
    /// First load balancer ingress IP
    #[serde(rename = "ExternalIP")]
    External,
    /// `spec.clusterIP`
    #[default]
    #[serde(rename = "ClusterIP")]
    Cluster,
}

/// IP address taken from a Kubernetes `Service`.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct ServiceIpSource {
    pub name: String,

    /// Defaults to the namespace of the referencing record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Defaults to `ClusterIP`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#type: Option<ServiceIpType>,
}

/// Which address of a `Node` to publish.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
pub enum NodeIpType {
    #[default]
    #[serde(rename = "ExternalIP")]
    External,
    #[serde(rename = "InternalIP")]
    Internal,
}

impl NodeIpType {
    /// Node address type as reported in `status.addresses[].type`.
    #[must_use]
    pub fn address_type(self) -> &'static str {
        match self {
            Self::External => "ExternalIP",
            Self::Internal => "InternalIP",
        }
    }
}

/// IP address taken from the cluster nodes.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct NodeIpSource {
    /// Only nodes carrying all of these labels are considered
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub match_labels: BTreeMap<String, String>,

    /// Defaults to `ExternalIP`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#type: Option<NodeIpType>,
}

/// Where the published IP address comes from.
///
/// Exactly one field must be set once the source has been resolved for a
/// `DNSZoneRecord`. On zone references, records and zone templates an empty
/// source means "inherit".
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
pub struct IpSource {
    #[serde(rename = "staticIP", default, skip_serializing_if = "Option::is_none")]
    pub static_ip: Option<StaticIpSource>,

    #[serde(rename = "serviceIP", default, skip_serializing_if = "Option::is_none")]
    pub service_ip: Option<ServiceIpSource>,

    #[serde(rename = "nodeIP", default, skip_serializing_if = "Option::is_none")]
    pub node_ip: Option<NodeIpSource>,
}

/// A validated, single-variant view of an [`IpSource`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IpSourceRef<'a> {
    Static(&'a StaticIpSource),
    Service(&'a ServiceIpSource),
    Node(&'a NodeIpSource),
}

impl IpSourceRef<'_> {
    /// Value used by the `ipsource` secondary index.
    #[must_use]
    pub fn index_key(&self) -> &'static str {
        match self {
            Self::Static(_) => "static",
            Self::Service(_) => "service",
            Self::Node(_) => "node",
        }
    }
}

impl IpSource {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.static_ip.is_none() && self.service_ip.is_none() && self.node_ip.is_none()
    }

    /// Returns the single configured source.
    ///
    /// # Errors
    ///
    /// [`Error::MissingIpSource`] when nothing is set, [`Error::AmbiguousIpSource`]
    /// when more than one field is set.
    pub fn resolve(&self) -> Result<IpSourceRef<'_>, Error> {
        let mut set = Vec::with_capacity(1);
        if let Some(s) = &self.static_ip {
            set.push(IpSourceRef::Static(s));
        }
        if let Some(s) = &self.service_ip {
            set.push(IpSourceRef::Service(s));
        }
        if let Some(n) = &self.node_ip {
            set.push(IpSourceRef::Node(n));
        }
        match set.as_slice() {
            [] => Err(Error::MissingIpSource),
            [only] => Ok(*only),
            _ => Err(Error::AmbiguousIpSource),
        }
    }

    /// Fill defaults that depend on where the source is used.
    ///
    /// Service sources inherit `namespace` and default to `ClusterIP`; node
    /// sources default to `ExternalIP`.
    #[must_use]
    pub fn with_defaults(&self, namespace: &str) -> Self {
        let mut out = self.clone();
        if let Some(svc) = out.service_ip.as_mut() {
            if svc.namespace.as_deref().is_none_or(str::is_empty) {
                svc.namespace = Some(namespace.to_string());
            }
            svc.r#type.get_or_insert(ServiceIpType::Cluster);
        }
        if let Some(node) = out.node_ip.as_mut() {
            node.r#type.get_or_insert(NodeIpType::External);
        }
        out
    }
}

// ============================================================================
// Shared Status Types
// ============================================================================

/// Standard Kubernetes status condition.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition, e.g. `Ready`.
    pub r#type: String,

    /// Status of the condition: True, False, or Unknown.
    pub status: String,

    /// Brief CamelCase reason for the condition's last transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message indicating details about the transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Last time the condition transitioned from one status to another (RFC3339 format).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

/// Reference to a `Secret` key holding provider credentials.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct SecretRef {
    pub name: String,
    pub namespace: String,
    pub key: String,
}

// ============================================================================
// DNSZone
// ============================================================================

/// Defaults applied to every record published in a zone.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct DNSRecordTemplate {
    #[serde(flatten)]
    pub ip_source: IpSource,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 60, max = 86_400))]
    pub ttl: Option<i32>,
}

/// Google Cloud DNS managed zone.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CloudDNSZone {
    /// Managed zone name (not the DNS name)
    pub zone_name: String,

    /// Secret key holding a service account JSON key
    pub credentials_secret: SecretRef,
}

/// `DNSZone` binds a zone name to an external DNS provider.
///
/// # Example
///
/// ```yaml
/// apiVersion: switchboard.firestoned.io/v1alpha1
/// kind: DNSZone
/// metadata:
///   name: example-com
/// spec:
///   recordTemplate:
///     nodeIP:
///       type: ExternalIP
///     ttl: 600
///   clouddns:
///     zoneName: example-com
///     credentialsSecret:
///       name: clouddns
///       namespace: switchboard-system
///       key: credentials.json
/// ```
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema, Default)]
#[kube(
    group = "switchboard.firestoned.io",
    version = "v1alpha1",
    kind = "DNSZone",
    doc = "DNSZone binds a DNS zone to an external provider and supplies record defaults.",
    printcolumn = r#"{"name":"Domain","type":"string","jsonPath":".status.domain"}"#
)]
#[kube(status = "DNSZoneStatus")]
#[serde(rename_all = "camelCase")]
pub struct DNSZoneSpec {
    #[serde(default)]
    pub record_template: DNSRecordTemplate,

    #[serde(default, rename = "clouddns", skip_serializing_if = "Option::is_none")]
    pub cloud_dns: Option<CloudDNSZone>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct DNSZoneStatus {
    /// Domain served by the zone, without trailing dot
    #[serde(default)]
    pub domain: String,
}

// ============================================================================
// DNSRecord
// ============================================================================

/// cert-manager issuer kind.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum IssuerKind {
    #[default]
    Issuer,
    ClusterIssuer,
}

impl fmt::Display for IssuerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Issuer => f.write_str("Issuer"),
            Self::ClusterIssuer => f.write_str("ClusterIssuer"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct IssuerRef {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<IssuerKind>,
}

/// Certificate requested for every published name of a record.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TlsSpec {
    /// Defaults to `<record>-tls`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_name: Option<String>,

    /// Defaults to the certificate name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,

    pub issuer: IssuerRef,
}

/// A zone the record is published in, with optional per-zone overrides.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct DNSZoneRef {
    /// Name of the `DNSZone`
    pub name: String,

    #[serde(flatten)]
    pub ip_source: IpSource,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 60, max = 86_400))]
    pub ttl: Option<i32>,
}

/// `DNSRecord` publishes a set of host names in one or more zones.
///
/// IP source and TTL resolve per zone: zone reference, then record, then the
/// zone's record template.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "switchboard.firestoned.io",
    version = "v1alpha1",
    kind = "DNSRecord",
    namespaced,
    shortname = "dnsrec",
    doc = "DNSRecord publishes host names into one or more DNSZones and optionally requests a TLS certificate for them."
)]
#[kube(status = "DNSRecordStatus")]
#[serde(rename_all = "camelCase")]
pub struct DNSRecordSpec {
    /// Host labels relative to each zone; `@` is the zone apex
    #[schemars(length(min = 1))]
    pub hosts: Vec<String>,

    /// Aliases pointing at the first host
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cnames: Vec<String>,

    #[schemars(length(min = 1))]
    pub zones: Vec<DNSZoneRef>,

    /// Record-wide IP source used when a zone reference sets none
    #[serde(flatten)]
    pub ip_source: IpSource,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 60, max = 86_400))]
    pub ttl: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsSpec>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DNSRecordStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

// ============================================================================
// DNSZoneRecord
// ============================================================================

/// `DNSZoneRecord` is a record resolved for a single zone.
///
/// Created and owned by a `DNSRecord`; users should not create these directly.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[kube(
    group = "switchboard.firestoned.io",
    version = "v1alpha1",
    kind = "DNSZoneRecord",
    namespaced,
    doc = "DNSZoneRecord is the projection of a DNSRecord into a single DNSZone with a resolved IP source and TTL.",
    printcolumn = r#"{"name":"Zone","type":"string","jsonPath":".spec.zoneName"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct DNSZoneRecordSpec {
    pub zone_name: String,

    #[serde(default)]
    pub hosts: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cnames: Vec<String>,

    #[serde(flatten)]
    pub ip_source: IpSource,

    #[schemars(range(min = 60, max = 86_400))]
    pub ttl: i32,
}

// ============================================================================
// DNSResource
// ============================================================================

/// Record types a `DNSResource` can carry.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
pub enum DnsRecordType {
    A,
    #[serde(rename = "CNAME")]
    Cname,
}

impl fmt::Display for DnsRecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => f.write_str("A"),
            Self::Cname => f.write_str("CNAME"),
        }
    }
}

/// `DNSResource` is one resource record in the external provider.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[kube(
    group = "switchboard.firestoned.io",
    version = "v1alpha1",
    kind = "DNSResource",
    namespaced,
    doc = "DNSResource is a single A or CNAME record pushed to the DNS provider of its zone.",
    printcolumn = r#"{"name":"Domain","type":"string","jsonPath":".spec.domain"}"#,
    printcolumn = r#"{"name":"Type","type":"string","jsonPath":".spec.type"}"#,
    printcolumn = r#"{"name":"Data","type":"string","jsonPath":".spec.data"}"#,
    printcolumn = r#"{"name":"Ready","type":"boolean","jsonPath":".status.ready"}"#
)]
#[kube(status = "DNSResourceStatus")]
#[serde(rename_all = "camelCase")]
pub struct DNSResourceSpec {
    pub zone_name: String,

    /// Fully-qualified name without trailing dot
    pub domain: String,

    pub r#type: DnsRecordType,

    pub data: String,

    #[schemars(range(min = 60, max = 86_400))]
    pub ttl: i32,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct DNSResourceStatus {
    #[serde(default)]
    pub ready: bool,
}

