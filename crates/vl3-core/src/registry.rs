//! Registry query types: what a discovery lookup sends and gets back.

use serde::{Deserialize, Serialize};

/// Separator between a network service name and a remote site.
pub const SITE_SEPARATOR: char = '@';

/// An endpoint registered for a network service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkServiceEndpoint {
    pub name: String,
    /// Control-plane instance that owns the endpoint.
    pub network_service_manager_name: String,
    pub network_service_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindNetworkServiceRequest {
    pub network_service_name: String,
}

impl FindNetworkServiceRequest {
    /// Query against the local registry.
    pub fn local(service: &str) -> Self {
        Self {
            network_service_name: service.to_string(),
        }
    }

    /// Query scoped to a remote site: `<service>@<site>`.
    pub fn for_site(service: &str, site: &str) -> Self {
        Self {
            network_service_name: scoped_service_name(service, site),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FindNetworkServiceResponse {
    pub network_service_endpoints: Vec<NetworkServiceEndpoint>,
}

/// Compose a service name with a site. An empty site is the local registry.
pub fn scoped_service_name(service: &str, site: &str) -> String {
    if site.is_empty() {
        service.to_string()
    } else {
        format!("{service}{SITE_SEPARATOR}{site}")
    }
}
