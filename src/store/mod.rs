// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Object store abstraction used by every reconciler.
//!
//! Reconcilers never talk to [`kube::Api`] directly. They go through
//! [`ObjectStore`], which the controller binary backs with [`KubeStore`]
//! (API server plus in-memory secondary indexes) and tests back with an
//! in-memory implementation.
//!
//! Deletes are "delete if found": a missing object counts as success.

pub mod index;
pub mod api;
#[cfg(test)]
pub mod memory;

pub use self::index::{FieldIndex, IndexField, Indexed};
pub use self::api::KubeStore;

use crate::certmanager::Certificate;
use crate::crd::{DNSRecord, DNSResource, DNSZone, DNSZoneRecord};
use crate::errors::Result;
use kube::{Api, Client, Resource, ResourceExt};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, Secret, Service};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Namespace and name of an object. Cluster-scoped objects have no namespace.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    pub fn namespaced(namespace: &str, name: &str) -> Self {
        Self {
            namespace: Some(namespace.to_string()),
            name: name.to_string(),
        }
    }

    pub fn cluster(name: &str) -> Self {
        Self {
            namespace: None,
            name: name.to_string(),
        }
    }

    /// Key of an existing object.
    pub fn of<K: Resource>(obj: &K) -> Self {
        Self {
            namespace: obj.namespace(),
            name: obj.name_any(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{ns}/{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Selection applied by [`ObjectStore::list`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListQuery {
    All,
    /// Equality-based label selector; every pair must match
    Labels(BTreeMap<String, String>),
    /// Objects whose secondary index `field` contains the value
    Index(IndexField, String),
}

impl ListQuery {
    pub fn index(field: IndexField, value: impl Into<String>) -> Self {
        Self::Index(field, value.into())
    }

    /// Label selector in `k=v,k2=v2` form. Empty for non-label queries.
    #[must_use]
    pub fn label_selector(&self) -> String {
        match self {
            Self::Labels(labels) => labels
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(","),
            _ => String::new(),
        }
    }

    /// Client-side evaluation of the query against one object.
    pub fn matches<K: StoreObject>(&self, obj: &K) -> bool {
        match self {
            Self::All => true,
            Self::Labels(selector) => {
                let labels = obj.labels();
                selector.iter().all(|(k, v)| labels.get(k) == Some(v))
            }
            Self::Index(field, value) => obj.index_values(*field).iter().any(|v| v == value),
        }
    }
}

/// Everything the store needs to handle a kind generically.
pub trait StoreObject:
    Resource<DynamicType = ()>
    + Indexed
    + Clone
    + fmt::Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    /// API handle for one namespace, or for all namespaces (and cluster-scoped kinds) when `None`.
    fn api(client: Client, namespace: Option<&str>) -> Api<Self>;
}

macro_rules! namespaced_objects {
    ($($kind:ty),+ $(,)?) => {$(
        impl StoreObject for $kind {
            fn api(client: Client, namespace: Option<&str>) -> Api<Self> {
                match namespace {
                    Some(ns) => Api::namespaced(client, ns),
                    None => Api::all(client),
                }
            }
        }
    )+};
}

macro_rules! cluster_objects {
    ($($kind:ty),+ $(,)?) => {$(
        impl StoreObject for $kind {
            fn api(client: Client, _namespace: Option<&str>) -> Api<Self> {
                Api::all(client)
            }
        }
    )+};
}

namespaced_objects!(DNSRecord, DNSZoneRecord, DNSResource, Certificate, Service, Secret);
cluster_objects!(DNSZone, Node);

/// CRUD over Kubernetes objects.
///
/// `patch` and `patch_status` take JSON merge patches; `replace` carries the
/// object's `resourceVersion` and fails with [`crate::errors::Error::Conflict`]
/// when it is stale.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    async fn get<K: StoreObject>(&self, key: &ObjectKey) -> Result<Option<K>>;

    async fn list<K: StoreObject>(&self, namespace: Option<&str>, query: &ListQuery)
        -> Result<Vec<K>>;

    async fn create<K: StoreObject>(&self, obj: &K) -> Result<K>;

    async fn replace<K: StoreObject>(&self, obj: &K) -> Result<K>;

    async fn patch<K: StoreObject>(&self, key: &ObjectKey, patch: &serde_json::Value)
        -> Result<K>;

    async fn patch_status<K: StoreObject>(
        &self,
        key: &ObjectKey,
        patch: &serde_json::Value,
    ) -> Result<()>;

    /// Request deletion. Objects with finalizers stay until they are released.
    async fn delete<K: StoreObject>(&self, key: &ObjectKey) -> Result<()>;
}
