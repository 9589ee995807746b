// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! External DNS provider interface.
//!
//! A [`DnsBackend`] is built per zone by a [`BackendFactory`] and kept in the
//! [`BackendCache`] so that record reconcilers never need provider credentials.
//! Providers implement only upsert and delete of a single record; they are
//! idempotent and compare by [`DnsBackend::identity`], never by pointer.

pub mod cache;
pub mod clouddns;

pub use cache::BackendCache;
pub use clouddns::CloudDnsBackend;

use crate::crd::{DNSResourceSpec, DNSZone, DnsRecordType, SecretRef};
use crate::errors::{Error, Result};
use crate::store::{ObjectKey, ObjectStore};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::ResourceExt;
use std::fmt;
use std::sync::Arc;
use url::Url;

/// Errors raised by DNS providers.
#[derive(thiserror::Error, Debug)]
pub enum BackendError {
    /// Provider credentials could not be parsed or are incomplete
    #[error("invalid provider credentials: {0}")]
    Credentials(String),

    /// Signing the OAuth2 assertion failed
    #[error("failed to sign token assertion: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// The request never produced an HTTP response
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The provider answered with a non-success status
    #[error("{method} {url} returned HTTP {status}: {body}")]
    Api {
        method: &'static str,
        url: String,
        status: u16,
        body: String,
    },

    #[error("invalid provider endpoint {0}")]
    Endpoint(String),
}

/// One resource record as pushed to a provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendRecord {
    /// Fully-qualified name without trailing dot
    pub name: String,
    pub record_type: DnsRecordType,
    pub ttl: i32,
    pub data: String,
}

impl From<&DNSResourceSpec> for BackendRecord {
    fn from(spec: &DNSResourceSpec) -> Self {
        Self {
            name: spec.domain.clone(),
            record_type: spec.r#type,
            ttl: spec.ttl,
            data: spec.data.clone(),
        }
    }
}

/// A DNS provider bound to one zone.
#[async_trait]
pub trait DnsBackend: Send + Sync + fmt::Debug {
    /// Create or overwrite the record set for `(name, type)` with exactly `record`.
    async fn update(&self, record: &BackendRecord) -> Result<(), BackendError>;

    /// Remove the record set for `(name, type)` if it exists.
    async fn delete(&self, record: &BackendRecord) -> Result<(), BackendError>;

    /// Stable description of the provider target, used for equality.
    fn identity(&self) -> String;

    /// Domain served by the zone, without trailing dot.
    fn domain(&self) -> &str;

    fn equals(&self, other: &dyn DnsBackend) -> bool {
        self.identity() == other.identity()
    }
}

/// Builds a backend from a zone spec.
#[async_trait]
pub trait BackendFactory<S: ObjectStore>: Send + Sync {
    async fn create(&self, store: &S, zone: &DNSZone) -> Result<Arc<dyn DnsBackend>>;
}

/// Read one key of a `Secret`.
pub async fn read_secret<S: ObjectStore>(store: &S, secret: &SecretRef) -> Result<Vec<u8>> {
    let found: Option<Secret> = store
        .get(&ObjectKey::namespaced(&secret.namespace, &secret.name))
        .await?;
    let found = found.ok_or_else(|| Error::SecretNotFound {
        namespace: secret.namespace.clone(),
        name: secret.name.clone(),
    })?;

    found
        .data
        .as_ref()
        .and_then(|data| data.get(&secret.key))
        .map(|bytes| bytes.0.clone())
        .or_else(|| {
            found
                .string_data
                .as_ref()
                .and_then(|data| data.get(&secret.key))
                .map(|s| s.as_bytes().to_vec())
        })
        .ok_or_else(|| Error::SecretKeyMissing {
            namespace: secret.namespace.clone(),
            name: secret.name.clone(),
            key: secret.key.clone(),
        })
}

/// Factory for the providers declared in `DNSZone.spec`.
pub struct ProviderBackendFactory {
    http: reqwest::Client,
    clouddns_endpoint: Url,
}

impl ProviderBackendFactory {
    #[must_use]
    pub fn new(http: reqwest::Client, clouddns_endpoint: Url) -> Self {
        Self {
            http,
            clouddns_endpoint,
        }
    }
}

#[async_trait]
impl<S: ObjectStore> BackendFactory<S> for ProviderBackendFactory {
    async fn create(&self, store: &S, zone: &DNSZone) -> Result<Arc<dyn DnsBackend>> {
        let Some(clouddns) = &zone.spec.cloud_dns else {
            return Err(Error::NoBackendConfigured(zone.name_any()));
        };

        let credentials = read_secret(store, &clouddns.credentials_secret).await?;
        let backend = CloudDnsBackend::connect(
            self.http.clone(),
            self.clouddns_endpoint.clone(),
            &clouddns.zone_name,
            &credentials,
        )
        .await?;
        let backend: Arc<dyn DnsBackend> = Arc::new(backend);
        Ok(backend)
    }
}

#[cfg(test)]
pub mod fake;
