//! Dataplane stand-in: logs each link it is asked to program and remembers it.

use anyhow::{bail, Result};
use async_trait::async_trait;
use dashmap::DashMap;

use vl3_services::{DataplaneApplier, DataplaneRequest};

/// Programmed links keyed by interface name, value is the local address.
#[derive(Default)]
pub struct LoggingDataplane {
    links: DashMap<String, String>,
}

impl LoggingDataplane {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interface names programmed so far, sorted.
    pub fn interfaces(&self) -> Vec<String> {
        let mut names: Vec<String> = self.links.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

#[async_trait]
impl DataplaneApplier for LoggingDataplane {
    async fn process_client_dataplane(&self, request: DataplaneRequest) -> Result<()> {
        if request.interface_name.is_empty() {
            bail!("dataplane request without interface name");
        }
        let ip = &request.connection.context.ip_context;
        tracing::info!(
            interface = %request.interface_name,
            src = %ip.src_ip_addr,
            dst = %ip.dst_ip_addr,
            routes = ip.dst_routes.len(),
            "programming peer link"
        );
        self.links
            .insert(request.interface_name, ip.src_ip_addr.clone());
        Ok(())
    }
}
