// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for Switchboard reconciliation.
//!
//! Every hook returns [`Error`]. The reconcile skeleton logs it, counts it under
//! [`Error::error_type`] and requeues the request. Not-found on the primary
//! object never reaches this type; the skeleton routes it to the absent hook.

use crate::backend::BackendError;
use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
    /// Transport or API failure talking to the Kubernetes API server
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// Optimistic concurrency failure (HTTP 409 on update)
    #[error("{kind} {name} was modified concurrently")]
    Conflict {
        /// Kind of the object being written
        kind: String,
        /// `namespace/name` of the object
        name: String,
    },

    /// Create collided with an existing object of the same name
    #[error("{kind} {name} already exists")]
    AlreadyExists { kind: String, name: String },

    /// Object could not be converted to or from JSON
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An object is missing metadata the controller relies on
    #[error("{kind} is missing {field}")]
    InvalidObject {
        kind: &'static str,
        field: &'static str,
    },

    /// No IP source at any level of the override chain
    #[error("no IP source configured")]
    MissingIpSource,

    /// More than one of staticIP, serviceIP and nodeIP is set
    #[error("only one of staticIP, serviceIP or nodeIP may be set")]
    AmbiguousIpSource,

    /// A record references a `DNSZone` that does not exist
    #[error("DNSZone {0} not found")]
    ZoneNotFound(String),

    /// The zone exists but its backend has not been built yet
    #[error("no backend cached for zone {0}")]
    BackendNotCached(String),

    /// The zone declares no provider
    #[error("DNSZone {0} has no DNS provider configured")]
    NoBackendConfigured(String),

    /// The referenced `Service` cannot provide the requested IP
    #[error("service {namespace}/{name}: {reason}")]
    ServiceIpUnavailable {
        namespace: String,
        name: String,
        reason: String,
    },

    /// No node matched the selector or none carries the requested address type
    #[error("no node provides a {address_type} address")]
    NoMatchingNode { address_type: String },

    /// CNAMEs need a first host to point at
    #[error("{0} has cnames but no hosts")]
    NoHosts(String),

    /// An object with the expected name exists but is controlled by something else
    #[error("{kind} {name} exists and is not controlled by this record")]
    OwnershipConflict { kind: String, name: String },

    #[error("secret {namespace}/{name} not found")]
    SecretNotFound { namespace: String, name: String },

    #[error("secret {namespace}/{name} has no key {key}")]
    SecretKeyMissing {
        namespace: String,
        name: String,
        key: String,
    },

    /// External DNS provider failure
    #[error("DNS backend error: {0}")]
    Backend(#[from] BackendError),
}

impl Error {
    /// Category label used by the `errors_total` metric.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Kube(_) | Self::Serialization(_) => "api_error",
            Self::Conflict { .. } | Self::AlreadyExists { .. } => "conflict",
            Self::InvalidObject { .. }
            | Self::MissingIpSource
            | Self::AmbiguousIpSource
            | Self::ZoneNotFound(_)
            | Self::BackendNotCached(_)
            | Self::NoBackendConfigured(_)
            | Self::ServiceIpUnavailable { .. }
            | Self::NoMatchingNode { .. }
            | Self::NoHosts(_)
            | Self::SecretNotFound { .. }
            | Self::SecretKeyMissing { .. } => "configuration_error",
            Self::OwnershipConflict { .. } => "ownership_conflict",
            Self::Backend(_) => "backend_error",
        }
    }
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
