// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the Switchboard controller.
//!
//! Constants are grouped by concern. Values that operators may want to tune
//! at runtime are only the defaults here; see [`crate::config`].

// ============================================================================
// API Constants
// ============================================================================

/// API group for all Switchboard CRDs
pub const API_GROUP: &str = "switchboard.firestoned.io";

/// API version for all Switchboard CRDs
pub const API_VERSION: &str = "v1alpha1";

/// Fully qualified API version (group/version)
pub const API_GROUP_VERSION: &str = "switchboard.firestoned.io/v1alpha1";

/// Kind name for `DNSZone` resource
pub const KIND_DNS_ZONE: &str = "DNSZone";

/// Kind name for `DNSRecord` resource
pub const KIND_DNS_RECORD: &str = "DNSRecord";

/// Kind name for `DNSZoneRecord` resource
pub const KIND_DNS_ZONE_RECORD: &str = "DNSZoneRecord";

/// Kind name for `DNSResource` resource
pub const KIND_DNS_RESOURCE: &str = "DNSResource";

/// Kind name for cert-manager `Certificate`
pub const KIND_CERTIFICATE: &str = "Certificate";

/// Kind name for core `Service`
pub const KIND_SERVICE: &str = "Service";

/// Kind name for core `Node`
pub const KIND_NODE: &str = "Node";

/// cert-manager API group, used for certificate issuer references
pub const CERT_MANAGER_GROUP: &str = "cert-manager.io";

// ============================================================================
// Metadata Keys
// ============================================================================

/// Finalizer guarding zone teardown and backend record removal
pub const FINALIZER: &str = "switchboard.firestoned.io/finalizer";

/// Annotation holding the RFC3339 instant after which a terminating zone may release its finalizer
pub const ANNOTATION_TEARDOWN_DEADLINE: &str = "switchboard.firestoned.io/teardown-deadline";

/// Prefix for the backend cache key of a retired (terminating) zone
pub const TOMBSTONE_PREFIX: &str = "*";

// ============================================================================
// DNS Constants
// ============================================================================

/// TTL applied when neither the zone reference, the record nor the zone template set one
pub const DEFAULT_DNS_RECORD_TTL_SECS: i32 = 300;

/// Lowest TTL accepted by the CRD schema
pub const MIN_DNS_RECORD_TTL_SECS: i32 = 60;

/// Highest TTL accepted by the CRD schema (one day)
pub const MAX_DNS_RECORD_TTL_SECS: i32 = 86_400;

/// Host label that denotes the zone apex
pub const APEX_HOST: &str = "@";

/// Suffix appended to a record name when no certificate name is given
pub const DEFAULT_CERTIFICATE_SUFFIX: &str = "-tls";

// ============================================================================
// Controller Timing Constants
// ============================================================================

/// Requeue delay after a reconciliation error (seconds)
pub const ERROR_REQUEUE_DURATION_SECS: u64 = 30;

/// Base grace period before a zone drops its finalizer (seconds)
pub const ZONE_TEARDOWN_BASE_SECS: u64 = 3;

/// Additional grace per zone record deleted during teardown (seconds)
pub const ZONE_TEARDOWN_PER_RECORD_SECS: u64 = 1;

/// Upper bound of the zone teardown grace period (seconds)
pub const ZONE_TEARDOWN_MAX_SECS: u64 = 60;

// ============================================================================
// Cloud DNS Constants
// ============================================================================

/// Google Cloud DNS v1 REST endpoint
pub const CLOUDDNS_DEFAULT_ENDPOINT: &str = "https://dns.googleapis.com/dns/v1/";

/// OAuth2 scope required to read and write Cloud DNS records
pub const CLOUDDNS_SCOPE: &str = "https://www.googleapis.com/auth/ndev.clouddns.readwrite";

/// Token endpoint used when a service account key omits `token_uri`
pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Lifetime requested for service account assertions (seconds)
pub const JWT_ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Refresh an access token this long before it expires (seconds)
pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

/// Timeout for Cloud DNS HTTP requests (seconds)
pub const CLOUDDNS_REQUEST_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for the Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

/// Default bind address for the metrics and health server
pub const DEFAULT_METRICS_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Path serving Prometheus metrics
pub const METRICS_SERVER_PATH: &str = "/metrics";

/// Liveness probe path
pub const HEALTHZ_PATH: &str = "/healthz";

/// Readiness probe path
pub const READYZ_PATH: &str = "/readyz";
