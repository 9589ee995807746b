// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! HTTP endpoints for Prometheus scraping and kubelet probes.
//!
//! - `/metrics` - text exposition of [`crate::metrics`]
//! - `/healthz` - always `200` while the process serves requests
//! - `/readyz` - `200` once every registered readiness check passes

use crate::constants::{HEALTHZ_PATH, METRICS_SERVER_PATH, READYZ_PATH};
use crate::metrics;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

type ReadinessCheck = Arc<dyn Fn() -> bool + Send + Sync>;

/// Readiness checks evaluated on every `/readyz` request.
#[derive(Clone, Default)]
pub struct Probes {
    checks: Vec<ReadinessCheck>,
}

impl Probes {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_check(mut self, check: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.checks.push(Arc::new(check));
        self
    }

    #[must_use]
    pub fn ready(&self) -> bool {
        self.checks.iter().all(|check| check())
    }
}

pub fn router(probes: Probes) -> Router {
    Router::new()
        .route(METRICS_SERVER_PATH, get(serve_metrics))
        .route(HEALTHZ_PATH, get(|| async { "ok" }))
        .route(READYZ_PATH, get(readyz))
        .with_state(probes)
}

async fn serve_metrics() -> Response {
    match metrics::gather_metrics() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn readyz(State(probes): State<Probes>) -> StatusCode {
    if probes.ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Bind `addr` and serve until the listener fails.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server stops.
pub async fn serve(addr: SocketAddr, probes: Probes) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Serving metrics and probes on {}", addr);
    axum::serve(listener, router(probes)).await?;
    Ok(())
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod server_tests;
