// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Command-line and environment configuration for the controller binary.

use crate::constants::{
    CLOUDDNS_DEFAULT_ENDPOINT, DEFAULT_METRICS_BIND_ADDRESS, ERROR_REQUEUE_DURATION_SECS,
    ZONE_TEARDOWN_BASE_SECS, ZONE_TEARDOWN_MAX_SECS, ZONE_TEARDOWN_PER_RECORD_SECS,
};
use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;
use url::Url;

/// Kubernetes DNS controller with pluggable cloud DNS backends.
#[derive(Parser, Debug, Clone)]
#[command(name = "switchboard", version, about)]
pub struct Config {
    /// Address serving /metrics, /healthz and /readyz
    #[arg(
        long,
        env = "SWITCHBOARD_METRICS_BIND_ADDRESS",
        default_value = DEFAULT_METRICS_BIND_ADDRESS
    )]
    pub metrics_bind_address: SocketAddr,

    /// Seconds before a failed reconciliation is retried
    #[arg(long, env = "SWITCHBOARD_ERROR_REQUEUE_SECS", default_value_t = ERROR_REQUEUE_DURATION_SECS)]
    pub error_requeue_secs: u64,

    /// Minimum grace period granted to a deleted zone before its backend is dropped
    #[arg(long, env = "SWITCHBOARD_TEARDOWN_BASE_SECS", default_value_t = ZONE_TEARDOWN_BASE_SECS)]
    pub teardown_base_secs: u64,

    /// Extra grace per zone record still draining
    #[arg(long, env = "SWITCHBOARD_TEARDOWN_PER_RECORD_SECS", default_value_t = ZONE_TEARDOWN_PER_RECORD_SECS)]
    pub teardown_per_record_secs: u64,

    /// Upper bound of the zone teardown grace period
    #[arg(long, env = "SWITCHBOARD_TEARDOWN_MAX_SECS", default_value_t = ZONE_TEARDOWN_MAX_SECS)]
    pub teardown_max_secs: u64,

    /// Base URL of the Cloud DNS REST API
    #[arg(long, env = "SWITCHBOARD_CLOUDDNS_ENDPOINT", default_value = CLOUDDNS_DEFAULT_ENDPOINT)]
    pub clouddns_endpoint: Url,
}

impl Config {
    #[must_use]
    pub fn settings(&self) -> ControllerSettings {
        ControllerSettings {
            error_requeue: Duration::from_secs(self.error_requeue_secs),
            teardown_base: Duration::from_secs(self.teardown_base_secs),
            teardown_per_record: Duration::from_secs(self.teardown_per_record_secs),
            teardown_max: Duration::from_secs(self.teardown_max_secs),
        }
    }
}

/// Timing knobs shared by all reconcilers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerSettings {
    pub error_requeue: Duration,
    pub teardown_base: Duration,
    pub teardown_per_record: Duration,
    pub teardown_max: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            error_requeue: Duration::from_secs(ERROR_REQUEUE_DURATION_SECS),
            teardown_base: Duration::from_secs(ZONE_TEARDOWN_BASE_SECS),
            teardown_per_record: Duration::from_secs(ZONE_TEARDOWN_PER_RECORD_SECS),
            teardown_max: Duration::from_secs(ZONE_TEARDOWN_MAX_SECS),
        }
    }
}

impl ControllerSettings {
    /// Grace period before a deleted zone drops its backend, scaled by the
    /// number of zone records that still have to drain.
    #[must_use]
    pub fn teardown_grace(&self, draining: usize) -> Duration {
        let per_record = self
            .teardown_per_record
            .saturating_mul(u32::try_from(draining).unwrap_or(u32::MAX));
        self.teardown_base
            .saturating_add(per_record)
            .min(self.teardown_max)
    }
}
