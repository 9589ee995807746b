// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Secondary indexes over watched objects.
//!
//! Each indexed kind maps to one or more [`IndexField`]s. The extractors
//! below define the values; [`FieldIndex`] keeps a reflector store of the
//! objects next to a value-to-keys multimap so lookups never scan.
//!
//! | Field | Kind | Value |
//! |---|---|---|
//! | `zone` | `DNSRecord` | every `spec.zones[].name` |
//! | `zone` | `DNSZoneRecord` | `spec.zoneName` |
//! | `service` | `DNSZoneRecord` | `<namespace>/<name>` of the service IP source |
//! | `owner` | `DNSZoneRecord`, `Certificate` | controlling `DNSRecord` name |
//! | `owner` | `DNSResource` | controlling `DNSZoneRecord` name |
//! | `ipsource` | `DNSZoneRecord` | `static`, `service` or `node` |

use super::ObjectKey;
use crate::certmanager::Certificate;
use crate::constants::{API_GROUP_VERSION, KIND_DNS_RECORD, KIND_DNS_ZONE_RECORD};
use crate::crd::{DNSRecord, DNSResource, DNSZone, DNSZoneRecord};
use k8s_openapi::api::core::v1::{Node, Secret, Service};
use kube::runtime::reflector::{self, store::Writer, ObjectRef, Store};
use kube::runtime::watcher;
use kube::{Resource, ResourceExt};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndexField {
    Zone,
    Service,
    Owner,
    IpSource,
}

impl fmt::Display for IndexField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Zone => "zone",
            Self::Service => "service",
            Self::Owner => "owner",
            Self::IpSource => "ipsource",
        })
    }
}

/// Values an object contributes to each secondary index.
pub trait Indexed {
    fn index_values(&self, _field: IndexField) -> Vec<String> {
        Vec::new()
    }
}

impl Indexed for DNSZone {}
impl Indexed for Service {}
impl Indexed for Node {}
impl Indexed for Secret {}

impl Indexed for DNSRecord {
    fn index_values(&self, field: IndexField) -> Vec<String> {
        match field {
            IndexField::Zone => self.spec.zones.iter().map(|z| z.name.clone()).collect(),
            _ => Vec::new(),
        }
    }
}

impl Indexed for DNSZoneRecord {
    fn index_values(&self, field: IndexField) -> Vec<String> {
        match field {
            IndexField::Zone => vec![self.spec.zone_name.clone()],
            IndexField::Service => self
                .spec
                .ip_source
                .service_ip
                .iter()
                .map(|svc| {
                    let namespace = svc
                        .namespace
                        .clone()
                        .filter(|ns| !ns.is_empty())
                        .or_else(|| self.namespace())
                        .unwrap_or_default();
                    format!("{namespace}/{}", svc.name)
                })
                .collect(),
            IndexField::Owner => controller_name(self, KIND_DNS_RECORD).into_iter().collect(),
            IndexField::IpSource => self
                .spec
                .ip_source
                .resolve()
                .map(|source| vec![source.index_key().to_string()])
                .unwrap_or_default(),
        }
    }
}

impl Indexed for DNSResource {
    fn index_values(&self, field: IndexField) -> Vec<String> {
        match field {
            IndexField::Owner => controller_name(self, KIND_DNS_ZONE_RECORD)
                .into_iter()
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl Indexed for Certificate {
    fn index_values(&self, field: IndexField) -> Vec<String> {
        match field {
            IndexField::Owner => controller_name(self, KIND_DNS_RECORD).into_iter().collect(),
            _ => Vec::new(),
        }
    }
}

/// Name of the controlling owner when it is one of our kinds.
fn controller_name<K: Resource>(obj: &K, owner_kind: &str) -> Option<String> {
    obj.owner_references()
        .iter()
        .find(|o| o.controller == Some(true))
        .filter(|o| o.api_version == API_GROUP_VERSION && o.kind == owner_kind)
        .map(|o| o.name.clone())
}

// ============================================================================
// FieldIndex
// ============================================================================

#[derive(Default)]
struct Postings {
    forward: HashMap<(IndexField, String), BTreeSet<ObjectKey>>,
    reverse: HashMap<ObjectKey, Vec<(IndexField, String)>>,
}

impl Postings {
    fn insert<K: Indexed + Resource>(&mut self, fields: &[IndexField], obj: &K) {
        let key = ObjectKey::of(obj);
        self.remove(&key);
        let mut values = Vec::new();
        for field in fields {
            for value in obj.index_values(*field) {
                self.forward
                    .entry((*field, value.clone()))
                    .or_default()
                    .insert(key.clone());
                values.push((*field, value));
            }
        }
        self.reverse.insert(key, values);
    }

    fn remove(&mut self, key: &ObjectKey) {
        for entry in self.reverse.remove(key).unwrap_or_default() {
            if let Some(keys) = self.forward.get_mut(&entry) {
                keys.remove(key);
                if keys.is_empty() {
                    self.forward.remove(&entry);
                }
            }
        }
    }
}

struct IndexState<K: Resource<DynamicType = ()> + Clone + 'static> {
    writer: Writer<K>,
    live: Postings,
    staging: Option<Postings>,
    ready: bool,
}

/// Reflector store of `K` plus secondary index postings, fed from a watcher.
#[derive(Clone)]
pub struct FieldIndex<K: Resource<DynamicType = ()> + Clone + 'static> {
    fields: &'static [IndexField],
    reader: Store<K>,
    state: Arc<Mutex<IndexState<K>>>,
}

impl<K> FieldIndex<K>
where
    K: Resource<DynamicType = ()> + Indexed + Clone + 'static,
{
    #[must_use]
    pub fn new(fields: &'static [IndexField]) -> Self {
        let (reader, writer) = reflector::store::<K>();
        Self {
            fields,
            reader,
            state: Arc::new(Mutex::new(IndexState {
                writer,
                live: Postings::default(),
                staging: None,
                ready: false,
            })),
        }
    }

    /// Whether the first full listing has been applied.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state.lock().ready
    }

    #[must_use]
    pub fn covers(&self, field: IndexField) -> bool {
        self.fields.contains(&field)
    }

    pub fn apply(&self, event: &watcher::Event<K>) {
        let mut state = self.state.lock();
        state.writer.apply_watcher_event(event);
        match event {
            watcher::Event::Apply(obj) => state.live.insert(self.fields, obj),
            watcher::Event::Delete(obj) => state.live.remove(&ObjectKey::of(obj)),
            watcher::Event::Init => state.staging = Some(Postings::default()),
            watcher::Event::InitApply(obj) => {
                if let Some(staging) = state.staging.as_mut() {
                    staging.insert(self.fields, obj);
                }
            }
            watcher::Event::InitDone => {
                if let Some(staging) = state.staging.take() {
                    state.live = staging;
                }
                state.ready = true;
            }
        }
    }

    /// Objects whose `field` index contains `value`, optionally restricted to a namespace.
    #[must_use]
    pub fn lookup(&self, field: IndexField, value: &str, namespace: Option<&str>) -> Vec<K> {
        let keys: Vec<ObjectKey> = {
            let state = self.state.lock();
            state
                .live
                .forward
                .get(&(field, value.to_string()))
                .map(|keys| {
                    keys.iter()
                        .filter(|k| namespace.is_none() || k.namespace.as_deref() == namespace)
                        .cloned()
                        .collect()
                })
                .unwrap_or_default()
        };

        keys.into_iter()
            .filter_map(|key| {
                let mut oref = ObjectRef::<K>::new(&key.name);
                if let Some(ns) = &key.namespace {
                    oref = oref.within(ns);
                }
                self.reader.get(&oref)
            })
            .map(|obj| (*obj).clone())
            .collect()
    }
}

#[cfg(test)]
#[path = "index_tests.rs"]
mod index_tests;
