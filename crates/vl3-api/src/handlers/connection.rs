//! /request and /close: inbound connection requests, from clients and peers alike.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use vl3_core::{Connection, NetworkServiceRequest};
use vl3_services::NetworkServiceServer;

use super::ApiState;

// ── /request ──────────────────────────────────────────────────────────────────

pub async fn handle_request(
    State(state): State<ApiState>,
    Json(request): Json<NetworkServiceRequest>,
) -> Result<Json<Connection>, (StatusCode, String)> {
    state
        .endpoint
        .request(request)
        .await
        .map(Json)
        .map_err(|e| {
            tracing::warn!(error = %format!("{e:#}"), "request failed");
            (StatusCode::BAD_GATEWAY, format!("{e:#}"))
        })
}

// ── /close ────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct CloseResponse {
    pub id: String,
    pub closed: bool,
}

pub async fn handle_close(
    State(state): State<ApiState>,
    Json(connection): Json<Connection>,
) -> Result<Json<CloseResponse>, (StatusCode, String)> {
    let id = connection.id.clone();
    state.endpoint.close(connection).await.map_err(|e| {
        tracing::warn!(id = %id, error = %format!("{e:#}"), "close failed");
        (StatusCode::BAD_GATEWAY, format!("{e:#}"))
    })?;
    Ok(Json(CloseResponse { id, closed: true }))
}
