// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::Result;
use clap::Parser;
use kube::{
    runtime::{watcher, Controller},
    Api, Client,
};
use std::sync::Arc;
use std::time::Duration;
use switchboard::{
    backend::{BackendFactory, ProviderBackendFactory},
    certmanager::Certificate,
    config::Config,
    constants::{CLOUDDNS_REQUEST_TIMEOUT_SECS, TOKIO_WORKER_THREADS},
    context::{Context, Requeue},
    controllers::{run_controller, run_watch, triggers},
    crd::{DNSRecord, DNSResource, DNSZone, DNSZoneRecord},
    reconcilers::{
        NodeReconciler, RecordReconciler, ResourceReconciler, ServiceReconciler, ZoneReconciler,
        ZoneRecordReconciler,
    },
    server::{self, Probes},
    store::{api::run_index, FieldIndex, IndexField, KubeStore},
};
use tracing::{debug, error, info};

fn main() -> Result<()> {
    let config = Config::parse();

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("switchboard-controller")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(config))
}

fn init_tracing() {
    // Respects RUST_LOG (default INFO) and RUST_LOG_FORMAT (json or text)
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}

async fn async_main(config: Config) -> Result<()> {
    init_tracing();
    info!("Starting switchboard DNS controller");
    debug!("Configuration: {:?}", config);

    let client = Client::try_default().await?;
    debug!("Kubernetes client initialized");

    let record_index = FieldIndex::<DNSRecord>::new(&[IndexField::Zone]);
    let zone_record_index = FieldIndex::<DNSZoneRecord>::new(&[
        IndexField::Zone,
        IndexField::Service,
        IndexField::Owner,
        IndexField::IpSource,
    ]);
    let resource_index = FieldIndex::<DNSResource>::new(&[IndexField::Owner]);
    let certificate_index = FieldIndex::<Certificate>::new(&[IndexField::Owner]);

    let probes = Probes::new()
        .with_check({
            let index = record_index.clone();
            move || index.is_ready()
        })
        .with_check({
            let index = zone_record_index.clone();
            move || index.is_ready()
        })
        .with_check({
            let index = resource_index.clone();
            move || index.is_ready()
        });

    let store = KubeStore::new(client.clone())
        .with_index(record_index.clone())
        .with_index(zone_record_index.clone())
        .with_index(resource_index.clone())
        .with_index(certificate_index.clone());

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(CLOUDDNS_REQUEST_TIMEOUT_SECS))
        .build()?;
    let factory: Arc<dyn BackendFactory<KubeStore>> = Arc::new(ProviderBackendFactory::new(
        http,
        config.clouddns_endpoint.clone(),
    ));

    let (requeue, receivers) = Requeue::channel();
    let ctx = Arc::new(Context::new(store, factory, requeue, config.settings()));

    let cfg = watcher::Config::default();
    let zones = Controller::new(Api::<DNSZone>::all(client.clone()), cfg.clone());
    let records = Controller::new(Api::<DNSRecord>::all(client.clone()), cfg.clone())
        .owns(Api::<DNSZoneRecord>::all(client.clone()), cfg.clone())
        .owns(Api::<Certificate>::all(client.clone()), cfg.clone())
        .reconcile_on(triggers(receivers.records));
    let zone_records = Controller::new(Api::<DNSZoneRecord>::all(client.clone()), cfg.clone())
        .owns(Api::<DNSResource>::all(client.clone()), cfg.clone())
        .reconcile_on(triggers(receivers.zone_records));
    let resources = Controller::new(Api::<DNSResource>::all(client.clone()), cfg);

    info!("Starting all controllers");

    // Controllers should never exit - if one does, log it and exit the process
    tokio::select! {
        result = server::serve(config.metrics_bind_address, probes) => {
            error!("CRITICAL: metrics server exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("metrics server exited unexpectedly without error")
        }
        () = run_index(client.clone(), record_index) => {
            anyhow::bail!("DNSRecord index watcher exited unexpectedly")
        }
        () = run_index(client.clone(), zone_record_index) => {
            anyhow::bail!("DNSZoneRecord index watcher exited unexpectedly")
        }
        () = run_index(client.clone(), resource_index) => {
            anyhow::bail!("DNSResource index watcher exited unexpectedly")
        }
        () = run_index(client.clone(), certificate_index) => {
            anyhow::bail!("Certificate index watcher exited unexpectedly")
        }
        () = run_controller(zones, ZoneReconciler, ctx.clone()) => {
            info!("DNSZone controller exited");
        }
        () = run_controller(records, RecordReconciler, ctx.clone()) => {
            info!("DNSRecord controller exited");
        }
        () = run_controller(zone_records, ZoneRecordReconciler, ctx.clone()) => {
            info!("DNSZoneRecord controller exited");
        }
        () = run_controller(resources, ResourceReconciler, ctx.clone()) => {
            info!("DNSResource controller exited");
        }
        () = run_watch(ServiceReconciler, ctx.clone()) => {
            anyhow::bail!("Service watch exited unexpectedly")
        }
        () = run_watch(NodeReconciler, ctx.clone()) => {
            anyhow::bail!("Node watch exited unexpectedly")
        }
    }

    Ok(())
}
