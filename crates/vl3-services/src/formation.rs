//! Mesh formation: turns a discovery response into peer connections.
//!
//! Every discovered endpoint other than ourselves gets a peer record and is
//! driven through the state machine under that record's lock. The blocking
//! connect and dataplane steps only ever run for a record in NotConnected,
//! so two formations racing on the same peer dial it at most once.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::watch;

use vl3_core::{FindNetworkServiceResponse, LABEL_NSE_SOURCE};

use crate::collaborators::{
    DataplaneApplier, DataplaneConfig, DataplaneRequest, PeerConnectRequest, PeerConnector,
    MECHANISM_MEMIF,
};
use crate::peer::{PeerInner, PeerRecord, PeerRegistry};
use crate::state::{PeerError, PeerEvent, PeerState};

/// What a single `drive` call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriveOutcome {
    /// This call connected the peer and programmed the dataplane.
    Connected,
    /// Nothing to do; the peer was already in the given state.
    Skipped(PeerState),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerOutcome {
    pub endpoint_name: String,
    pub result: Result<DriveOutcome, PeerError>,
}

/// Result of one formation task, for the supervisor and for tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormationReport {
    /// Empty for the local registry.
    pub site: String,
    pub discovery_error: Option<String>,
    pub skipped_self: bool,
    pub peers: Vec<PeerOutcome>,
}

impl FormationReport {
    pub fn discovery_failed(site: &str, error: &anyhow::Error) -> Self {
        Self {
            site: site.to_string(),
            discovery_error: Some(format!("{error:#}")),
            ..Self::default()
        }
    }

    pub fn outcome(&self, endpoint_name: &str) -> Option<&Result<DriveOutcome, PeerError>> {
        self.peers
            .iter()
            .find(|p| p.endpoint_name == endpoint_name)
            .map(|p| &p.result)
    }
}

/// One discovery response waiting to be processed.
#[derive(Debug, Clone)]
pub struct FormationJob {
    /// Registry scope the response came from. Empty = local.
    pub site: String,
    /// Network service we connect to peers as.
    pub network_service: String,
    pub response: FindNetworkServiceResponse,
}

pub struct MeshFormation {
    registry: Arc<PeerRegistry>,
    connector: Arc<dyn PeerConnector>,
    dataplane: Arc<dyn DataplaneApplier>,
    /// Our own manager, stamped on outgoing peer requests.
    manager_name: String,
    cancel: watch::Receiver<bool>,
}

impl MeshFormation {
    pub fn new(
        registry: Arc<PeerRegistry>,
        connector: Arc<dyn PeerConnector>,
        dataplane: Arc<dyn DataplaneApplier>,
        manager_name: impl Into<String>,
        cancel: watch::Receiver<bool>,
    ) -> Self {
        Self {
            registry,
            connector,
            dataplane,
            manager_name: manager_name.into(),
            cancel,
        }
    }

    pub fn registry(&self) -> &Arc<PeerRegistry> {
        &self.registry
    }

    /// Drive every discovered endpoint except ourselves.
    pub async fn process_endpoints(&self, job: FormationJob) -> FormationReport {
        // Read before any peer lock is taken.
        let my_name = self.registry.self_identity();
        let routes = vec![self.registry.subnet().to_string()];
        let mut report = FormationReport {
            site: job.site.clone(),
            ..FormationReport::default()
        };

        for endpoint in job.response.network_service_endpoints {
            if endpoint.name == my_name {
                tracing::info!(
                    service = %endpoint.network_service_name,
                    endpoint = %endpoint.name,
                    "found own vL3 endpoint in discovery"
                );
                report.skipped_self = true;
                continue;
            }

            tracing::info!(
                service = %endpoint.network_service_name,
                peer = %endpoint.name,
                site = %job.site,
                "found vL3 peer"
            );
            let peer = self.registry.get_or_create_peer(
                &endpoint.name,
                &endpoint.network_service_manager_name,
                &job.site,
            );

            let mut inner = peer.lock().await;
            let result = self
                .drive(&my_name, &peer, &mut inner, routes.clone(), &job.network_service)
                .await;

            match &result {
                Err(e) => {
                    tracing::error!(
                        peer = %endpoint.name,
                        error = %e,
                        "failed to connect to vL3 peer"
                    );
                }
                Ok(_) => match inner.connection.as_ref() {
                    Some(conn) => tracing::info!(
                        peer = %endpoint.name,
                        src_ip = %conn.context.ip_context.src_ip_addr,
                        conn_excluded_prefixes = ?conn.context.ip_context.excluded_prefixes,
                        peer_excluded_prefixes = ?inner.excluded_prefixes,
                        dst_routes = ?conn.context.ip_context.dst_routes,
                        "connected to vL3 peer"
                    ),
                    None => tracing::info!(
                        peer = %endpoint.name,
                        peer_excluded_prefixes = ?inner.excluded_prefixes,
                        state = %inner.state,
                        "vL3 peer has no connection handle"
                    ),
                },
            }
            drop(inner);

            report.peers.push(PeerOutcome {
                endpoint_name: endpoint.name,
                result,
            });
        }

        report
    }

    /// Advance one peer toward Connected. `inner` is the peer's locked state,
    /// so the caller holds the record lock for the whole attempt.
    pub async fn drive(
        &self,
        my_name: &str,
        peer: &PeerRecord,
        inner: &mut PeerInner,
        routes: Vec<String>,
        network_service: &str,
    ) -> Result<DriveOutcome, PeerError> {
        tracing::debug!(
            peer = peer.endpoint_name(),
            manager = peer.manager_name(),
            state = %inner.state,
            "drive vL3 peer"
        );

        match inner.state {
            PeerState::NotConnected => {}
            PeerState::ConnectionInProgress => {
                tracing::info!(peer = peer.endpoint_name(), "remote connection in progress");
                return match inner.last_error.clone() {
                    Some(e) => Err(e),
                    None => Ok(DriveOutcome::Skipped(PeerState::ConnectionInProgress)),
                };
            }
            PeerState::Connected => {
                tracing::info!(peer = peer.endpoint_name(), "already connected to peer");
                return Ok(DriveOutcome::Skipped(PeerState::Connected));
            }
            PeerState::ConnectionError => {
                tracing::info!(
                    peer = peer.endpoint_name(),
                    "remote connection attempted prior and errored, not retrying"
                );
                return Ok(DriveOutcome::Skipped(PeerState::ConnectionError));
            }
            PeerState::ConnectedViaIncoming => {
                tracing::info!(
                    peer = peer.endpoint_name(),
                    "remote connection already established by peer"
                );
                return Ok(DriveOutcome::Skipped(PeerState::ConnectedViaIncoming));
            }
        }

        if let Err(e) = inner.apply(PeerEvent::Drive) {
            return Err(self.fail(peer, inner, e.into()));
        }
        tracing::info!(peer = peer.endpoint_name(), "performing connect to peer");

        let request = self.connect_request(my_name, peer, routes, network_service);
        let connected = tokio::select! {
            biased;
            _ = cancelled(self.cancel.clone()) => Err(PeerError::Cancelled),
            r = self.connector.connect_to_endpoint(request) => {
                r.map_err(|e| PeerError::Connect(format!("{e:#}")))
            }
        };
        let connection = match connected {
            Ok(c) => c,
            Err(e) => return Err(self.fail(peer, inner, e)),
        };
        inner.connection = Some(connection.clone());
        if let Err(e) = inner.apply(PeerEvent::ConnectSucceeded) {
            return Err(self.fail(peer, inner, e.into()));
        }

        let dp = DataplaneRequest {
            config: DataplaneConfig::default(),
            service_name: String::new(),
            interface_name: peer.interface_name().to_string(),
            connection,
        };
        let applied = tokio::select! {
            biased;
            _ = cancelled(self.cancel.clone()) => Err(PeerError::Cancelled),
            r = self.dataplane.process_client_dataplane(dp) => {
                r.map_err(|e| PeerError::Dataplane(format!("{e:#}")))
            }
        };
        if let Err(e) = applied {
            return Err(self.fail(peer, inner, e));
        }

        if let Err(e) = inner.apply(PeerEvent::DataplaneApplied) {
            return Err(self.fail(peer, inner, e.into()));
        }
        inner.last_error = None;
        tracing::info!(peer = peer.endpoint_name(), "done with connect to peer");
        Ok(DriveOutcome::Connected)
    }

    fn connect_request(
        &self,
        my_name: &str,
        peer: &PeerRecord,
        routes: Vec<String>,
        network_service: &str,
    ) -> PeerConnectRequest {
        let ifname = peer.interface_name().to_string();
        PeerConnectRequest {
            remote_site: peer.remote_site().to_string(),
            endpoint_name: peer.endpoint_name().to_string(),
            manager_name: peer.manager_name().to_string(),
            description: format!("VPP interface {ifname}"),
            interface_name: ifname,
            mechanism: MECHANISM_MEMIF.to_string(),
            routes,
            labels: HashMap::from([(LABEL_NSE_SOURCE.to_string(), my_name.to_string())]),
            network_service: network_service.to_string(),
            source_manager_name: self.manager_name.clone(),
        }
    }

    /// Record a failed attempt. The connection handle, if any, is kept.
    ///
    /// The record always ends in ConnectionError, even when the state
    /// machine rejects the failure event.
    fn fail(&self, peer: &PeerRecord, inner: &mut PeerInner, error: PeerError) -> PeerError {
        let event = match &error {
            PeerError::Connect(_) => Some(PeerEvent::ConnectFailed),
            PeerError::Dataplane(_) => Some(PeerEvent::DataplaneFailed),
            PeerError::Cancelled => Some(PeerEvent::Cancelled),
            // The state machine itself refused a step; there is no event to apply.
            PeerError::Transition(_) => None,
        };
        match event.map(|event| inner.apply(event)) {
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                tracing::error!(
                    peer = peer.endpoint_name(),
                    error = %e,
                    "peer state rejected failure"
                );
                inner.state = PeerState::ConnectionError;
            }
            None => inner.state = PeerState::ConnectionError,
        }
        tracing::error!(
            peer = peer.endpoint_name(),
            error = %error,
            "vL3 peer connection failed"
        );
        inner.last_error = Some(error.clone());
        error
    }
}

/// Resolves once cancellation is signalled. Never resolves if the sender
/// is gone without having cancelled.
async fn cancelled(mut rx: watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
