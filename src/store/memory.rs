// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory [`ObjectStore`] for reconciler tests.
//!
//! Mimics the API server semantics the reconcilers depend on: `generateName`,
//! `resourceVersion` conflicts, finalizer-gated deletion, status subresource
//! separation and owner-reference garbage collection.

use super::{ListQuery, ObjectKey, ObjectStore, StoreObject};
use crate::errors::{Error, Result};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

type TypeKey = String;

#[derive(Default)]
struct State {
    objects: BTreeMap<(TypeKey, ObjectKey), Value>,
    revision: u64,
    generated: u64,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

fn type_key<K: StoreObject>() -> TypeKey {
    format!("{}/{}", K::api_version(&()), K::kind(&()))
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn meta_str<'a>(value: &'a Value, field: &str) -> Option<&'a str> {
    value.get("metadata")?.get(field)?.as_str()
}

/// RFC 7386 JSON merge patch.
fn merge(target: &mut Value, patch: &Value) {
    let Value::Object(entries) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(fields) = target {
        for (key, value) in entries {
            if value.is_null() {
                fields.remove(key);
            } else {
                merge(fields.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}

fn has_finalizers(value: &Value) -> bool {
    value
        .pointer("/metadata/finalizers")
        .and_then(Value::as_array)
        .is_some_and(|f| !f.is_empty())
}

impl State {
    fn next_revision(&mut self) -> String {
        self.revision += 1;
        self.revision.to_string()
    }

    /// Remove an object and cascade to its dependents.
    fn remove(&mut self, id: &(TypeKey, ObjectKey)) {
        let mut pending = vec![id.clone()];
        while let Some(id) = pending.pop() {
            let Some(removed) = self.objects.remove(&id) else {
                continue;
            };
            let Some(uid) = meta_str(&removed, "uid").map(str::to_string) else {
                continue;
            };
            let dependents: Vec<_> = self
                .objects
                .iter()
                .filter(|(_, v)| {
                    v.pointer("/metadata/ownerReferences")
                        .and_then(Value::as_array)
                        .is_some_and(|refs| {
                            refs.iter().any(|r| r.get("uid").and_then(Value::as_str) == Some(&uid))
                        })
                })
                .map(|(k, _)| k.clone())
                .collect();
            for dep in dependents {
                if self.mark_deleted(&dep) {
                    pending.push(dep);
                }
            }
        }
    }

    /// Set `deletionTimestamp`; returns true when the object can go right away.
    fn mark_deleted(&mut self, id: &(TypeKey, ObjectKey)) -> bool {
        let revision = self.next_revision();
        let Some(obj) = self.objects.get_mut(id) else {
            return false;
        };
        if !has_finalizers(obj) {
            return true;
        }
        if obj.pointer("/metadata/deletionTimestamp").is_none() {
            merge(
                obj,
                &serde_json::json!({
                    "metadata": {
                        "deletionTimestamp": now(),
                        "resourceVersion": revision,
                    }
                }),
            );
        }
        false
    }

    fn release_if_done(&mut self, id: &(TypeKey, ObjectKey)) {
        let done = self.objects.get(id).is_some_and(|obj| {
            obj.pointer("/metadata/deletionTimestamp").is_some() && !has_finalizers(obj)
        });
        if done {
            self.remove(id);
        }
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects of kind `K`, including terminating ones.
    #[must_use]
    pub fn count<K: StoreObject>(&self) -> usize {
        let kind = type_key::<K>();
        self.state
            .lock()
            .objects
            .keys()
            .filter(|(k, _)| *k == kind)
            .count()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get<K: StoreObject>(&self, key: &ObjectKey) -> Result<Option<K>> {
        let state = self.state.lock();
        state
            .objects
            .get(&(type_key::<K>(), key.clone()))
            .map(|v| serde_json::from_value(v.clone()))
            .transpose()
            .map_err(Error::from)
    }

    async fn list<K: StoreObject>(
        &self,
        namespace: Option<&str>,
        query: &ListQuery,
    ) -> Result<Vec<K>> {
        let kind = type_key::<K>();
        let values: Vec<Value> = {
            let state = self.state.lock();
            state
                .objects
                .iter()
                .filter(|((k, key), _)| {
                    *k == kind && (namespace.is_none() || key.namespace.as_deref() == namespace)
                })
                .map(|(_, v)| v.clone())
                .collect()
        };

        let mut out = Vec::new();
        for value in values {
            let obj: K = serde_json::from_value(value)?;
            if query.matches(&obj) {
                out.push(obj);
            }
        }
        Ok(out)
    }

    async fn create<K: StoreObject>(&self, obj: &K) -> Result<K> {
        let mut value = serde_json::to_value(obj)?;
        let mut state = self.state.lock();

        let name = match meta_str(&value, "name") {
            Some(name) => name.to_string(),
            None => {
                let prefix = meta_str(&value, "generateName").ok_or(Error::InvalidObject {
                    kind: "object",
                    field: "metadata.name",
                })?;
                state.generated += 1;
                format!("{prefix}{:05}", state.generated)
            }
        };
        let key = ObjectKey {
            namespace: meta_str(&value, "namespace").map(str::to_string),
            name: name.clone(),
        };
        let id = (type_key::<K>(), key.clone());
        if state.objects.contains_key(&id) {
            return Err(Error::AlreadyExists {
                kind: K::kind(&()).to_string(),
                name: key.to_string(),
            });
        }

        let revision = state.next_revision();
        merge(
            &mut value,
            &serde_json::json!({
                "metadata": {
                    "name": name,
                    "uid": format!("uid-{revision}"),
                    "resourceVersion": revision,
                    "generation": 1,
                    "creationTimestamp": now(),
                }
            }),
        );
        state.objects.insert(id, value.clone());
        Ok(serde_json::from_value(value)?)
    }

    async fn replace<K: StoreObject>(&self, obj: &K) -> Result<K> {
        let mut value = serde_json::to_value(obj)?;
        let key = ObjectKey::of(obj);
        let id = (type_key::<K>(), key.clone());
        let conflict = || Error::Conflict {
            kind: K::kind(&()).to_string(),
            name: key.to_string(),
        };

        let mut state = self.state.lock();
        let revision = state.next_revision();
        let existing = state.objects.get(&id).ok_or_else(conflict)?;
        let current = meta_str(existing, "resourceVersion");
        if meta_str(&value, "resourceVersion").is_some_and(|rv| Some(rv) != current) {
            return Err(conflict());
        }

        let preserved = serde_json::json!({
            "status": existing.get("status").cloned().unwrap_or(Value::Null),
            "metadata": {
                "uid": existing.pointer("/metadata/uid").cloned().unwrap_or(Value::Null),
                "deletionTimestamp": existing
                    .pointer("/metadata/deletionTimestamp")
                    .cloned()
                    .unwrap_or(Value::Null),
                "resourceVersion": revision,
            }
        });
        if let Value::Object(fields) = &mut value {
            fields.remove("status");
        }
        merge(&mut value, &preserved);
        state.objects.insert(id.clone(), value.clone());
        state.release_if_done(&id);
        Ok(serde_json::from_value(value)?)
    }

    async fn patch<K: StoreObject>(
        &self,
        key: &ObjectKey,
        patch: &serde_json::Value,
    ) -> Result<K> {
        let id = (type_key::<K>(), key.clone());
        let mut body = patch.clone();
        if let Value::Object(fields) = &mut body {
            fields.remove("status");
        }

        let mut state = self.state.lock();
        let revision = state.next_revision();
        let obj = state.objects.get_mut(&id).ok_or_else(|| Error::Conflict {
            kind: K::kind(&()).to_string(),
            name: key.to_string(),
        })?;
        merge(obj, &body);
        merge(obj, &serde_json::json!({"metadata": {"resourceVersion": revision}}));
        let updated = obj.clone();
        state.release_if_done(&id);
        Ok(serde_json::from_value(updated)?)
    }

    async fn patch_status<K: StoreObject>(
        &self,
        key: &ObjectKey,
        patch: &serde_json::Value,
    ) -> Result<()> {
        let id = (type_key::<K>(), key.clone());
        let mut state = self.state.lock();
        let revision = state.next_revision();
        let obj = state.objects.get_mut(&id).ok_or_else(|| Error::Conflict {
            kind: K::kind(&()).to_string(),
            name: key.to_string(),
        })?;
        if let Some(status) = patch.get("status") {
            merge(obj, &serde_json::json!({ "status": status }));
        }
        merge(obj, &serde_json::json!({"metadata": {"resourceVersion": revision}}));
        Ok(())
    }

    async fn delete<K: StoreObject>(&self, key: &ObjectKey) -> Result<()> {
        let id = (type_key::<K>(), key.clone());
        let mut state = self.state.lock();
        if state.mark_deleted(&id) {
            state.remove(&id);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod memory_tests;
