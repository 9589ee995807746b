// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Generic finalizer management for Kubernetes resources.
//!
//! Finalizers are written with a JSON merge patch of the complete
//! `metadata.finalizers` list, so foreign finalizers are preserved.
//!
//! # Example
//!
//! ```rust,ignore
//! use switchboard::constants::FINALIZER;
//! use switchboard::reconcilers::finalizers::{ensure_finalizer, has_finalizer, remove_finalizer};
//!
//! async fn reconcile<S: ObjectStore>(store: &S, zone: DNSZone) -> Result<()> {
//!     if zone.metadata.deletion_timestamp.is_some() {
//!         if has_finalizer(&zone, FINALIZER) {
//!             // cleanup...
//!             remove_finalizer(store, &zone, FINALIZER).await?;
//!         }
//!         return Ok(());
//!     }
//!     ensure_finalizer(store, &zone, FINALIZER).await?;
//!     Ok(())
//! }
//! ```

use crate::errors::Result;
use crate::store::{ObjectKey, ObjectStore, StoreObject};
use kube::ResourceExt;
use serde_json::json;
use tracing::info;

#[must_use]
pub fn has_finalizer<T: StoreObject>(resource: &T, finalizer: &str) -> bool {
    resource.finalizers().iter().any(|f| f == finalizer)
}

/// Add a finalizer to a resource if not already present.
///
/// Idempotent: calling it again once the finalizer is present does nothing.
///
/// # Errors
///
/// Returns an error if the patch fails.
pub async fn ensure_finalizer<S, T>(store: &S, resource: &T, finalizer: &str) -> Result<()>
where
    S: ObjectStore,
    T: StoreObject,
{
    if has_finalizer(resource, finalizer) {
        return Ok(());
    }

    let key = ObjectKey::of(resource);
    info!("Adding finalizer {} to {} {}", finalizer, T::kind(&()), key);

    let mut finalizers = resource.finalizers().to_vec();
    finalizers.push(finalizer.to_string());
    let patch = json!({ "metadata": { "finalizers": finalizers } });
    store.patch::<T>(&key, &patch).await?;
    Ok(())
}

/// Remove a finalizer from a resource.
///
/// Idempotent: nothing is written when the finalizer is already absent.
///
/// # Errors
///
/// Returns an error if the patch fails.
pub async fn remove_finalizer<S, T>(store: &S, resource: &T, finalizer: &str) -> Result<()>
where
    S: ObjectStore,
    T: StoreObject,
{
    if !has_finalizer(resource, finalizer) {
        return Ok(());
    }

    let key = ObjectKey::of(resource);
    info!("Removing finalizer {} from {} {}", finalizer, T::kind(&()), key);

    let finalizers: Vec<&String> = resource
        .finalizers()
        .iter()
        .filter(|f| *f != finalizer)
        .collect();
    let patch = json!({ "metadata": { "finalizers": finalizers } });
    store.patch::<T>(&key, &patch).await?;
    Ok(())
}

#[cfg(test)]
#[path = "finalizers_tests.rs"]
mod finalizers_tests;
