//! vl3d — vL3 mesh endpoint daemon.
//!
//! Serves the request chain over HTTP. The first client request resolves
//! this endpoint's name and starts forming the mesh with every other
//! endpoint listed in the registry table.

use std::sync::Arc;

use anyhow::{Context, Result};

use vl3_core::config::Vl3Config;
use vl3_core::ipam::ConfiguredSubnet;
use vl3_services::{DiscoveryClient, Vl3Endpoint};

mod connector;
mod dataplane;
mod discovery;

use connector::HttpConnector;
use dataplane::LoggingDataplane;
use discovery::StaticDiscovery;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = Vl3Config::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let mut config = Vl3Config::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        Vl3Config::default()
    });

    if let Some(name) = std::env::args().nth(1) {
        config.identity.endpoint_name = name;
    }
    let manager_name = format!("{}:{}", config.network.bind_addr, config.network.api_port);
    tracing::info!(
        endpoint = %config.identity.endpoint_name,
        manager = %manager_name,
        service = %config.network.service_name,
        "vl3d starting"
    );

    let discovery = if config.registry.endpoints.is_empty() {
        None
    } else {
        let registry = StaticDiscovery::new(config.registry.endpoints.clone());
        Some(Arc::new(registry) as Arc<dyn DiscoveryClient>)
    };

    let dataplane = Arc::new(LoggingDataplane::new());
    let endpoint = Arc::new(
        Vl3Endpoint::new(
            &config,
            &ConfiguredSubnet,
            &manager_name,
            discovery,
            Arc::new(HttpConnector::new()?),
            dataplane.clone(),
        )
        .context("failed to set up vL3 endpoint")?,
    );

    // ── Shutdown channel ─────────────────────────────────────────────────────
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    // ── API ──────────────────────────────────────────────────────────────────
    let mut shutdown_rx = shutdown_tx.subscribe();

    let api_task = {
        let state = vl3_api::ApiState {
            endpoint: endpoint.clone(),
            shutdown_tx: shutdown_tx.clone(),
        };
        let bind_addr = config.network.bind_addr.clone();
        let port = config.network.api_port;
        tokio::spawn(async move { vl3_api::serve(state, &bind_addr, port).await })
    };

    // ── Wait for exit ────────────────────────────────────────────────────────

    tokio::select! {
        _ = shutdown_rx.recv() => tracing::info!("shutting down"),
        r = api_task           => tracing::error!("API server exited: {:?}", r),
    }

    endpoint.shutdown();
    let summary = endpoint.drain().await;
    tracing::info!(
        formations = summary.completed,
        panicked = summary.panicked,
        peers = endpoint.registry().len(),
        links = ?dataplane.interfaces(),
        "vl3d stopped"
    );

    Ok(())
}
