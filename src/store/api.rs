// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! [`ObjectStore`] backed by the Kubernetes API server.
//!
//! Reads by key always go to the API server. Index queries are answered from
//! a registered [`FieldIndex`] once its initial listing is complete, and fall
//! back to a full list filtered client-side before that.

use super::{FieldIndex, IndexField, ListQuery, ObjectKey, ObjectStore, StoreObject};
use crate::errors::{Error, Result};
use async_trait::async_trait;
use futures::StreamExt;
use kube::api::{DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, Client, ResourceExt};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct KubeStore {
    client: Client,
    indexes: Arc<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl KubeStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            indexes: Arc::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Register a secondary index for `K`. Feed it with [`run_index`].
    #[must_use]
    pub fn with_index<K: StoreObject>(mut self, index: FieldIndex<K>) -> Self {
        Arc::make_mut(&mut self.indexes).insert(TypeId::of::<K>(), Arc::new(index));
        self
    }

    fn index<K: StoreObject>(&self, field: IndexField) -> Option<&FieldIndex<K>> {
        self.indexes
            .get(&TypeId::of::<K>())
            .and_then(|index| (**index).downcast_ref::<FieldIndex<K>>())
            .filter(|index| index.covers(field) && index.is_ready())
    }
}

/// Keep `index` in sync with the cluster. Runs until the watch stream ends.
pub async fn run_index<K: StoreObject>(client: Client, index: FieldIndex<K>) {
    let kind = K::kind(&()).to_string();
    debug!("Starting secondary index watcher for {}", kind);

    watcher(K::api(client, None), watcher::Config::default())
        .default_backoff()
        .for_each(|event| {
            match event {
                Ok(event) => index.apply(&event),
                Err(e) => warn!("Index watcher for {} failed: {}", kind, e),
            }
            futures::future::ready(())
        })
        .await;
}

fn api_code(err: &kube::Error) -> Option<u16> {
    match err {
        kube::Error::Api(resp) => Some(resp.code),
        _ => None,
    }
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn get<K: StoreObject>(&self, key: &ObjectKey) -> Result<Option<K>> {
        let api = K::api(self.client.clone(), key.namespace.as_deref());
        Ok(api.get_opt(&key.name).await?)
    }

    async fn list<K: StoreObject>(
        &self,
        namespace: Option<&str>,
        query: &ListQuery,
    ) -> Result<Vec<K>> {
        if let ListQuery::Index(field, value) = query {
            if let Some(index) = self.index::<K>(*field) {
                return Ok(index.lookup(*field, value, namespace));
            }
        }

        let api = K::api(self.client.clone(), namespace);
        let mut params = ListParams::default();
        if let ListQuery::Labels(_) = query {
            params = params.labels(&query.label_selector());
        }
        let items = api.list(&params).await?.items;

        Ok(match query {
            ListQuery::Index(..) => items.into_iter().filter(|o| query.matches(o)).collect(),
            _ => items,
        })
    }

    async fn create<K: StoreObject>(&self, obj: &K) -> Result<K> {
        let api = K::api(self.client.clone(), obj.namespace().as_deref());
        api.create(&PostParams::default(), obj)
            .await
            .map_err(|e| match api_code(&e) {
                Some(409) => Error::AlreadyExists {
                    kind: K::kind(&()).to_string(),
                    name: ObjectKey::of(obj).to_string(),
                },
                _ => Error::Kube(e),
            })
    }

    async fn replace<K: StoreObject>(&self, obj: &K) -> Result<K> {
        let api = K::api(self.client.clone(), obj.namespace().as_deref());
        api.replace(&obj.name_any(), &PostParams::default(), obj)
            .await
            .map_err(|e| match api_code(&e) {
                Some(409) => Error::Conflict {
                    kind: K::kind(&()).to_string(),
                    name: ObjectKey::of(obj).to_string(),
                },
                _ => Error::Kube(e),
            })
    }

    async fn patch<K: StoreObject>(
        &self,
        key: &ObjectKey,
        patch: &serde_json::Value,
    ) -> Result<K> {
        let api = K::api(self.client.clone(), key.namespace.as_deref());
        Ok(api
            .patch(&key.name, &PatchParams::default(), &Patch::Merge(patch))
            .await?)
    }

    async fn patch_status<K: StoreObject>(
        &self,
        key: &ObjectKey,
        patch: &serde_json::Value,
    ) -> Result<()> {
        let api = K::api(self.client.clone(), key.namespace.as_deref());
        api.patch_status(&key.name, &PatchParams::default(), &Patch::Merge(patch))
            .await?;
        Ok(())
    }

    async fn delete<K: StoreObject>(&self, key: &ObjectKey) -> Result<()> {
        let api: Api<K> = K::api(self.client.clone(), key.namespace.as_deref());
        match api.delete(&key.name, &DeleteParams::background()).await {
            Ok(_) => Ok(()),
            Err(e) if api_code(&e) == Some(404) => {
                debug!("{} {} already gone", K::kind(&()), key);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
