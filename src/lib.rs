// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # Switchboard - DNS records for Kubernetes workloads
//!
//! Switchboard is a Kubernetes controller that publishes A and CNAME records
//! for cluster workloads into external DNS providers, and optionally keeps a
//! cert-manager `Certificate` covering the published names.
//!
//! ## Resource chain
//!
//! ```text
//! DNSZone ──(backend cache)──┐
//!                            ▼
//! DNSRecord ──► DNSZoneRecord (one per zone) ──► DNSResource (one per host/cname)
//!     │
//!     └──► Certificate (cert-manager.io/v1)
//! ```
//!
//! - A [`crd::DNSZone`] binds a provider zone and caches its backend.
//! - A [`crd::DNSRecord`] lists hosts, cnames, zones and where the IP comes from.
//! - A [`crd::DNSZoneRecord`] is the record resolved for one zone.
//! - A [`crd::DNSResource`] is a single provider record, removed again through
//!   a finalizer when it is deleted.
//!
//! ## Modules
//!
//! - [`crd`] - Custom Resource Definition types
//! - [`reconcilers`] - Reconciliation logic for each kind
//! - [`backend`] - DNS provider backends and the backend cache
//! - [`store`] - Object store abstraction with secondary indexes
//! - [`controllers`] - Controller runtime wiring
//! - [`server`] - Metrics and probe endpoints
//!
//! ## Example
//!
//! ```rust,no_run
//! use switchboard::crd::{DNSRecordSpec, DNSZoneRef, IpSource, StaticIpSource};
//!
//! let spec = DNSRecordSpec {
//!     hosts: vec!["www".to_string()],
//!     cnames: vec!["api".to_string()],
//!     zones: vec![DNSZoneRef {
//!         name: "example-com".to_string(),
//!         ip_source: IpSource::default(),
//!         ttl: None,
//!     }],
//!     ip_source: IpSource {
//!         static_ip: Some(StaticIpSource { ip: "192.0.2.10".to_string() }),
//!         ..IpSource::default()
//!     },
//!     ttl: Some(300),
//!     tls: None,
//! };
//! ```

pub mod backend;
pub mod certmanager;
pub mod config;
pub mod constants;
pub mod context;
pub mod controllers;
pub mod crd;
pub mod diff;
pub mod errors;
pub mod metrics;
pub mod reconcilers;
pub mod server;
pub mod store;
