// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status helpers for the switchboard resources.
//!
//! Status is written through the status subresource with a merge patch and
//! only when something observable changed, so reconciles that settle do not
//! generate watch events of their own.
//!
//! # Condition Format
//!
//! - `type`: The aspect of the resource being reported (`Ready`)
//! - `status`: "True", "False", or "Unknown"
//! - `reason`: A programmatic identifier (CamelCase)
//! - `message`: A human-readable explanation
//! - `lastTransitionTime`: RFC3339 timestamp when the condition changed

use crate::crd::{Condition, DNSRecord, DNSResource, DNSZone};
use crate::errors::Result;
use crate::store::{ObjectKey, ObjectStore};
use chrono::{SecondsFormat, Utc};
use serde_json::json;
use tracing::debug;

pub const CONDITION_READY: &str = "Ready";

pub const REASON_RECONCILED: &str = "Reconciled";
pub const REASON_OWNERSHIP_CONFLICT: &str = "OwnershipConflict";

/// Create a new condition stamped with the current time.
#[must_use]
pub fn create_condition(
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) -> Condition {
    Condition {
        r#type: condition_type.to_string(),
        status: status.to_string(),
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
        last_transition_time: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
    }
}

/// Whether `new_condition` differs from `existing` in status, reason or message.
///
/// `lastTransitionTime` is not compared.
#[must_use]
pub fn condition_changed(existing: Option<&Condition>, new_condition: &Condition) -> bool {
    existing.is_none_or(|c| {
        c.status != new_condition.status
            || c.reason != new_condition.reason
            || c.message != new_condition.message
    })
}

/// Set the `Ready` condition of a `DNSRecord`.
///
/// # Errors
///
/// Returns an error if the status patch fails.
pub async fn set_record_ready<S: ObjectStore>(
    store: &S,
    record: &DNSRecord,
    ready: bool,
    reason: &str,
    message: &str,
) -> Result<()> {
    let status = if ready { "True" } else { "False" };
    let condition = create_condition(CONDITION_READY, status, reason, message);
    let current = record.status.as_ref();
    let existing = current.and_then(|s| s.conditions.iter().find(|c| c.r#type == CONDITION_READY));
    let generation = record.metadata.generation;

    if !condition_changed(existing, &condition)
        && current.and_then(|s| s.observed_generation) == generation
    {
        debug!("Ready condition of DNSRecord {} unchanged", ObjectKey::of(record));
        return Ok(());
    }

    let mut conditions: Vec<Condition> = current
        .map(|s| {
            s.conditions
                .iter()
                .filter(|c| c.r#type != CONDITION_READY)
                .cloned()
                .collect()
        })
        .unwrap_or_default();
    conditions.push(match existing {
        Some(prev) if prev.status == condition.status => Condition {
            last_transition_time: prev.last_transition_time.clone(),
            ..condition
        },
        _ => condition,
    });

    let patch = json!({
        "status": {
            "conditions": conditions,
            "observedGeneration": generation,
        }
    });
    store
        .patch_status::<DNSRecord>(&ObjectKey::of(record), &patch)
        .await
}

/// Record the domain resolved from a zone's backend.
///
/// # Errors
///
/// Returns an error if the status patch fails.
pub async fn set_zone_domain<S: ObjectStore>(store: &S, zone: &DNSZone, domain: &str) -> Result<()> {
    if zone.status.as_ref().is_some_and(|s| s.domain == domain) {
        return Ok(());
    }
    let patch = json!({ "status": { "domain": domain } });
    store
        .patch_status::<DNSZone>(&ObjectKey::of(zone), &patch)
        .await
}

/// Mark a `DNSResource` as pushed to its backend.
///
/// # Errors
///
/// Returns an error if the status patch fails.
pub async fn set_resource_ready<S: ObjectStore>(store: &S, resource: &DNSResource) -> Result<()> {
    if resource.status.as_ref().is_some_and(|s| s.ready) {
        return Ok(());
    }
    let patch = json!({ "status": { "ready": true } });
    store
        .patch_status::<DNSResource>(&ObjectKey::of(resource), &patch)
        .await
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod status_tests;
