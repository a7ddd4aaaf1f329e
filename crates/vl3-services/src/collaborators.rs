//! Seams to the outside world: registry discovery, the peer connection
//! transport, the dataplane, and the next stage of the request chain.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use vl3_core::{
    Connection, FindNetworkServiceRequest, FindNetworkServiceResponse, NetworkServiceRequest,
    Route,
};

/// Shared-memory interface mechanism requested for peer links.
pub const MECHANISM_MEMIF: &str = "MEMIF";

/// Looks up endpoints registered for a network service.
#[async_trait]
pub trait DiscoveryClient: Send + Sync {
    async fn find_network_service(
        &self,
        request: &FindNetworkServiceRequest,
    ) -> Result<FindNetworkServiceResponse>;
}

/// Opens a point-to-point connection to a peer endpoint.
#[async_trait]
pub trait PeerConnector: Send + Sync {
    async fn connect_to_endpoint(&self, request: PeerConnectRequest) -> Result<Connection>;
}

/// Programs an established connection into the dataplane.
#[async_trait]
pub trait DataplaneApplier: Send + Sync {
    async fn process_client_dataplane(&self, request: DataplaneRequest) -> Result<()>;
}

/// A stage in the inbound request chain.
#[async_trait]
pub trait NetworkServiceServer: Send + Sync {
    async fn request(&self, request: NetworkServiceRequest) -> Result<Connection>;
    async fn close(&self, connection: Connection) -> Result<()>;
    fn name(&self) -> &str;
}

/// Fallback source for this endpoint's name.
pub type SelfNameResolver = Arc<dyn Fn() -> String + Send + Sync>;

/// Everything the transport needs to dial a peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerConnectRequest {
    /// Empty for peers in the local registry.
    pub remote_site: String,
    pub endpoint_name: String,
    pub manager_name: String,
    pub interface_name: String,
    pub mechanism: String,
    pub description: String,
    /// Destination routes offered to the peer (our subnet).
    pub routes: Vec<String>,
    /// Carries the reserved source label so the peer takes its peer path.
    pub labels: HashMap<String, String>,
    /// Outgoing client name; the network service we belong to.
    pub network_service: String,
    /// Manager that owns this endpoint.
    pub source_manager_name: String,
}

impl PeerConnectRequest {
    /// The inbound request the peer's dispatcher will see.
    pub fn to_network_service_request(&self) -> NetworkServiceRequest {
        let mut connection = Connection {
            id: self.interface_name.clone(),
            network_service: self.network_service.clone(),
            network_service_endpoint_name: self.endpoint_name.clone(),
            source_network_service_manager_name: self.source_manager_name.clone(),
            labels: self.labels.clone(),
            ..Connection::default()
        };
        connection.context.ip_context.dst_routes =
            self.routes.iter().map(|r| Route::new(r.as_str())).collect();
        NetworkServiceRequest::new(connection)
    }
}

/// Placeholder dataplane description handed through to the applier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataplaneConfig {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataplaneRequest {
    pub config: DataplaneConfig,
    pub service_name: String,
    pub interface_name: String,
    pub connection: Connection,
}
