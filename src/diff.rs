// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Spec-level set difference between desired and existing child objects.
//!
//! Children are compared by their `spec` only; names, owners and status are
//! ignored. Objects are bucketed by spec hash and matched by equality inside
//! a bucket, so the diff is linear in the number of children.

use crate::crd::{DNSResource, DNSZoneRecord, DNSZoneRecordSpec, DNSResourceSpec};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// A child object compared by its spec.
pub trait Diffable {
    type Spec: Hash + Eq;

    fn spec(&self) -> &Self::Spec;
}

impl Diffable for DNSZoneRecord {
    type Spec = DNSZoneRecordSpec;

    fn spec(&self) -> &DNSZoneRecordSpec {
        &self.spec
    }
}

impl Diffable for DNSResource {
    type Spec = DNSResourceSpec;

    fn spec(&self) -> &DNSResourceSpec {
        &self.spec
    }
}

/// Result of [`diff`].
#[derive(Debug)]
pub struct Diff<T> {
    /// Desired objects with no existing counterpart (deduplicated)
    pub missing: Vec<T>,
    /// Existing objects that are not desired, plus duplicates of desired ones
    pub excess: Vec<T>,
}

impl<T> Diff<T> {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.excess.is_empty()
    }
}

fn spec_hash<S: Hash>(spec: &S) -> u64 {
    let mut hasher = DefaultHasher::new();
    spec.hash(&mut hasher);
    hasher.finish()
}

/// Compare `desired` against `actual` by spec.
///
/// Every spec in `desired` is kept by at most one object of `actual`; any
/// further object with the same spec is reported as excess.
pub fn diff<T: Diffable + Clone>(desired: &[T], actual: &[T]) -> Diff<T> {
    let mut unique: Vec<&T> = Vec::new();
    let mut buckets: HashMap<u64, Vec<usize>> = HashMap::new();
    for obj in desired {
        let bucket = buckets.entry(spec_hash(obj.spec())).or_default();
        if bucket.iter().any(|&i| unique[i].spec() == obj.spec()) {
            continue;
        }
        bucket.push(unique.len());
        unique.push(obj);
    }

    let mut kept = vec![false; unique.len()];
    let mut excess = Vec::new();
    for obj in actual {
        let slot = buckets
            .get(&spec_hash(obj.spec()))
            .and_then(|bucket| bucket.iter().find(|&&i| unique[i].spec() == obj.spec()));
        match slot {
            Some(&i) if !kept[i] => kept[i] = true,
            _ => excess.push(obj.clone()),
        }
    }

    let missing = unique
        .into_iter()
        .zip(kept)
        .filter(|(_, kept)| !kept)
        .map(|(obj, _)| obj.clone())
        .collect();

    Diff { missing, excess }
}

#[cfg(test)]
#[path = "diff_tests.rs"]
mod diff_tests;
