//! Peer transport over the daemon HTTP API.
//!
//! A peer's manager name is the address of its API. Connecting means
//! posting the labelled request to that peer's `/api/request`, which runs
//! it through the peer's own dispatcher.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;

use vl3_core::Connection;
use vl3_services::{PeerConnectRequest, PeerConnector};

/// Two endpoints dialing each other at once each wait on the other's peer
/// lock; the timeout turns that into a connect failure.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HttpConnector {
    client: reqwest::Client,
}

impl HttpConnector {
    pub fn new() -> Result<Self> {
        Self::with_timeout(CONNECT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client })
    }
}

fn request_url(manager: &str) -> String {
    format!("http://{}/api/request", manager)
}

#[async_trait]
impl PeerConnector for HttpConnector {
    async fn connect_to_endpoint(&self, request: PeerConnectRequest) -> Result<Connection> {
        if request.manager_name.is_empty() {
            bail!("peer {} has no manager address", request.endpoint_name);
        }
        let url = request_url(&request.manager_name);
        tracing::debug!(
            peer = %request.endpoint_name,
            url = %url,
            mechanism = %request.mechanism,
            "dialing peer"
        );

        let resp = self
            .client
            .post(&url)
            .json(&request.to_network_service_request())
            .send()
            .await
            .with_context(|| format!("failed to reach peer manager at {}", url))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("peer {} refused connection: {} {}", request.endpoint_name, status, body);
        }

        resp.json::<Connection>()
            .await
            .context("failed to parse peer connection")
    }
}
