//! Connection model — what travels through the inbound request chain and
//! what a successful peer connect hands back.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Label key marking a request as coming from another vL3 endpoint.
/// The value is the sending endpoint's name.
pub const LABEL_NSE_SOURCE: &str = "vl3Nse/nseSource/endpointName";

/// A single destination route, e.g. `10.60.1.0/24`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub prefix: String,
}

impl Route {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

/// Layer-3 addressing negotiated for a connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IpContext {
    pub src_ip_addr: String,
    pub dst_ip_addr: String,
    /// Prefixes that must not be routed through this connection.
    pub excluded_prefixes: Vec<String>,
    /// Routes the remote side should install towards us.
    pub dst_routes: Vec<Route>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionContext {
    pub ip_context: IpContext,
}

/// A network service connection, as seen by one side of it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Connection {
    pub id: String,
    pub network_service: String,
    pub network_service_endpoint_name: String,
    pub source_network_service_manager_name: String,
    pub labels: HashMap<String, String>,
    pub context: ConnectionContext,
}

impl Connection {
    /// Endpoint name of the vL3 peer that sent this connection, if any.
    pub fn nse_source(&self) -> Option<&str> {
        self.labels.get(LABEL_NSE_SOURCE).map(String::as_str)
    }

    pub fn add_dst_route(&mut self, prefix: impl Into<String>) {
        self.context.ip_context.dst_routes.push(Route::new(prefix));
    }
}

/// An inbound connection request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkServiceRequest {
    pub connection: Connection,
}

impl NetworkServiceRequest {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }
}
