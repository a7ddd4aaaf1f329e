//! Static registry: answers discovery queries from the config file's table.

use anyhow::Result;
use async_trait::async_trait;

use vl3_core::config::RegistryEntry;
use vl3_core::{FindNetworkServiceRequest, FindNetworkServiceResponse, NetworkServiceEndpoint};
use vl3_services::DiscoveryClient;

pub struct StaticDiscovery {
    entries: Vec<RegistryEntry>,
}

impl StaticDiscovery {
    pub fn new(entries: Vec<RegistryEntry>) -> Self {
        Self { entries }
    }
}

#[async_trait]
impl DiscoveryClient for StaticDiscovery {
    /// Entries match on the full service name, site suffix included.
    async fn find_network_service(
        &self,
        request: &FindNetworkServiceRequest,
    ) -> Result<FindNetworkServiceResponse> {
        let network_service_endpoints: Vec<_> = self
            .entries
            .iter()
            .filter(|e| e.service == request.network_service_name)
            .map(|e| NetworkServiceEndpoint {
                name: e.name.clone(),
                network_service_manager_name: e.manager.clone(),
                network_service_name: e.service.clone(),
            })
            .collect();
        tracing::debug!(
            service = %request.network_service_name,
            found = network_service_endpoints.len(),
            "static registry lookup"
        );
        Ok(FindNetworkServiceResponse {
            network_service_endpoints,
        })
    }
}
