//! HTTP API handlers: the request chain entry point plus daemon state as JSON.

pub mod connection;
pub mod status;

use std::sync::Arc;

use vl3_services::Vl3Endpoint;

#[derive(Clone)]
pub struct ApiState {
    pub endpoint: Arc<Vl3Endpoint>,
    /// Shutdown broadcast sender; signals graceful daemon shutdown.
    pub shutdown_tx: tokio::sync::broadcast::Sender<()>,
}

// Re-export handler functions for use in router setup.
pub use connection::{handle_close, handle_request};
pub use status::{handle_peer, handle_peers, handle_shutdown, handle_status};
