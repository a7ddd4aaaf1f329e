//! /status, /peers, /peers/{name}, /daemon/shutdown handlers.

use std::collections::BTreeMap;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use vl3_services::PeerSnapshot;

use super::ApiState;

// ── /status ──────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct StatusResponse {
    /// Empty until the first client request resolves it.
    pub endpoint_name: String,
    pub subnet: String,
    pub vl3_cidr: String,
    pub remote_sites: Vec<String>,
    pub peers: usize,
    /// Peer count per state name; states with no peers are omitted.
    pub peers_by_state: BTreeMap<String, usize>,
    pub formation_tasks: usize,
}

pub async fn handle_status(State(state): State<ApiState>) -> Json<StatusResponse> {
    let endpoint = &state.endpoint;
    let registry = endpoint.registry();

    let mut peers_by_state = BTreeMap::new();
    for peer in registry.snapshot().await {
        *peers_by_state
            .entry(peer.state.as_str().to_string())
            .or_insert(0) += 1;
    }

    Json(StatusResponse {
        endpoint_name: registry.self_identity(),
        subnet: registry.subnet().to_string(),
        vl3_cidr: endpoint.vl3_cidr().to_string(),
        remote_sites: registry.remote_sites().to_vec(),
        peers: registry.len(),
        peers_by_state,
        formation_tasks: endpoint.supervisor().pending(),
    })
}

// ── /peers ────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct PeersResponse {
    pub peers: Vec<PeerSnapshot>,
}

pub async fn handle_peers(State(state): State<ApiState>) -> Json<PeersResponse> {
    let peers = state.endpoint.registry().snapshot().await;
    Json(PeersResponse { peers })
}

// ── /peers/{name} ─────────────────────────────────────────────────────────────

pub async fn handle_peer(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> Result<Json<PeerSnapshot>, (StatusCode, String)> {
    let peer = state
        .endpoint
        .registry()
        .peer(&name)
        .ok_or((StatusCode::NOT_FOUND, format!("peer {name} not found")))?;
    Ok(Json(peer.snapshot().await))
}

// ── /daemon/shutdown ──────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct ShutdownResponse {
    pub message: String,
}

pub async fn handle_shutdown(State(state): State<ApiState>) -> Json<ShutdownResponse> {
    tracing::info!("shutdown requested via API");
    let _ = state.shutdown_tx.send(());

    Json(ShutdownResponse {
        message: "Shutdown initiated".to_string(),
    })
}
