//! vL3 endpoint, the entry point for inbound connection requests.
//!
//! A request labelled with `LABEL_NSE_SOURCE` comes from another vL3
//! endpoint and is folded into that peer's record. Anything else is an
//! ordinary client: it gets a route for the whole vL3 range, and kicks off
//! discovery of the other endpoints (local registry and each remote site),
//! each result set feeding its own formation task.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::watch;

use vl3_core::config::Vl3Config;
use vl3_core::ipam::{IpamError, PrefixPoolGenerator};
use vl3_core::prefixes::merge_into;
use vl3_core::{Connection, FindNetworkServiceRequest, NetworkServiceRequest};

use crate::collaborators::{
    DataplaneApplier, DiscoveryClient, NetworkServiceServer, PeerConnector, SelfNameResolver,
};
use crate::formation::{FormationJob, FormationReport, MeshFormation};
use crate::peer::PeerRegistry;
use crate::state::PeerEvent;
use crate::supervisor::{DrainSummary, FormationSupervisor};

pub struct Vl3Endpoint {
    registry: Arc<PeerRegistry>,
    formation: Arc<MeshFormation>,
    supervisor: FormationSupervisor,
    discovery: Option<Arc<dyn DiscoveryClient>>,
    /// Whole vL3 range, routed to clients.
    vl3_cidr: String,
    resolve_name: SelfNameResolver,
    next: Option<Arc<dyn NetworkServiceServer>>,
    cancel: watch::Sender<bool>,
}

impl Vl3Endpoint {
    /// Build an endpoint. The subnet is generated here, once.
    ///
    /// `manager_name` identifies this endpoint's control plane to peers.
    /// A missing discovery client is not fatal: requests are still served,
    /// but no mesh is formed.
    pub fn new(
        config: &Vl3Config,
        ipam: &dyn PrefixPoolGenerator,
        manager_name: &str,
        discovery: Option<Arc<dyn DiscoveryClient>>,
        connector: Arc<dyn PeerConnector>,
        dataplane: Arc<dyn DataplaneApplier>,
    ) -> Result<Self, IpamError> {
        let subnet = ipam.generate(config)?;
        let registry = Arc::new(PeerRegistry::new(
            subnet.clone(),
            config.network.remote_sites.clone(),
        ));
        let (cancel, cancel_rx) = watch::channel(false);
        let formation = Arc::new(MeshFormation::new(
            registry.clone(),
            connector,
            dataplane,
            manager_name,
            cancel_rx,
        ));

        let fallback = config.identity.endpoint_name.clone();
        let resolve_name: SelfNameResolver = Arc::new(move || {
            if fallback.is_empty() {
                tracing::error!("service endpoint name is not set");
            }
            fallback.clone()
        });

        if discovery.is_none() {
            tracing::error!("discovery client is not configured, mesh will not form");
        }
        tracing::info!(
            subnet = %subnet,
            vl3_cidr = %config.network.vl3_cidr,
            remote_sites = ?config.network.remote_sites,
            "vL3 endpoint created"
        );

        Ok(Self {
            registry,
            formation,
            supervisor: FormationSupervisor::new(),
            discovery,
            vl3_cidr: config.network.vl3_cidr.clone(),
            resolve_name,
            next: None,
            cancel,
        })
    }

    /// Hand requests on to `next` after classification.
    pub fn with_next(mut self, next: Arc<dyn NetworkServiceServer>) -> Self {
        self.next = Some(next);
        self
    }

    /// Replace the fallback used when a client request carries no endpoint name.
    pub fn with_name_resolver(mut self, resolve: SelfNameResolver) -> Self {
        self.resolve_name = resolve;
        self
    }

    pub fn registry(&self) -> &Arc<PeerRegistry> {
        &self.registry
    }

    pub fn supervisor(&self) -> &FormationSupervisor {
        &self.supervisor
    }

    pub fn vl3_cidr(&self) -> &str {
        &self.vl3_cidr
    }

    /// Wait for all outstanding discovery and formation work.
    pub async fn drain(&self) -> DrainSummary {
        self.supervisor.drain().await
    }

    /// Cancel in-flight connect attempts. Peers caught mid-attempt end up in
    /// ConnectionError with a cancelled cause.
    pub fn shutdown(&self) {
        tracing::info!("vL3 endpoint shutting down");
        self.cancel.send_replace(true);
    }

    /// Fold a request from another vL3 endpoint into its peer record.
    async fn process_peer_request(&self, source: &str, connection: &mut Connection) {
        tracing::info!(peer = source, "connection request from vL3 peer");
        let peer = self.registry.get_or_create_peer(
            source,
            &connection.source_network_service_manager_name,
            "",
        );

        let mut inner = peer.lock().await;
        let prior = inner.state;

        let ip = &mut connection.context.ip_context;
        merge_into(&mut inner.excluded_prefixes, &ip.excluded_prefixes);
        ip.excluded_prefixes = inner.excluded_prefixes.clone();

        // Tell the peer to route to us for our subnet.
        connection.add_dst_route(self.registry.subnet());
        inner.connection = Some(connection.clone());

        let new_state = match inner.apply(PeerEvent::IncomingRequest) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(peer = source, error = %e, "peer state rejected incoming request");
                inner.state
            }
        };
        tracing::info!(
            peer = source,
            manager = peer.manager_name(),
            prior_state = %prior,
            new_state = %new_state,
            excluded_prefixes = ?inner.excluded_prefixes,
            "vL3 peer added"
        );
    }

    /// Client path: route, identity, then discovery per registry scope.
    fn process_client_request(&self, connection: &mut Connection) {
        connection.add_dst_route(self.vl3_cidr.clone());

        if self.registry.self_identity().is_empty() {
            let candidate = if connection.network_service_endpoint_name.is_empty() {
                (self.resolve_name)()
            } else {
                connection.network_service_endpoint_name.clone()
            };
            let name = self.registry.resolve_self_identity(&candidate);
            tracing::info!(
                endpoint = %name,
                requested = %connection.network_service_endpoint_name,
                "vL3 endpoint name set"
            );
        }

        let Some(discovery) = self.discovery.clone() else {
            tracing::error!("discovery client is not configured");
            return;
        };

        let service = connection.network_service.clone();
        let sites = std::iter::once(String::new())
            .chain(self.registry.remote_sites().iter().cloned());
        for site in sites {
            // A fresh query per scope; names never accumulate suffixes.
            let query = if site.is_empty() {
                FindNetworkServiceRequest::local(&service)
            } else {
                FindNetworkServiceRequest::for_site(&service, &site)
            };
            tracing::info!(
                service = %query.network_service_name,
                site = %site,
                "querying registry"
            );
            self.supervisor.spawn(discover_and_form(
                discovery.clone(),
                self.formation.clone(),
                query,
                site,
                service.clone(),
            ));
        }
    }
}

/// One registry scope: look up endpoints, then drive them.
async fn discover_and_form(
    discovery: Arc<dyn DiscoveryClient>,
    formation: Arc<MeshFormation>,
    query: FindNetworkServiceRequest,
    site: String,
    network_service: String,
) -> FormationReport {
    match discovery.find_network_service(&query).await {
        Ok(response) => {
            tracing::info!(
                service = %query.network_service_name,
                endpoints = response.network_service_endpoints.len(),
                "found network service, processing endpoints"
            );
            formation
                .process_endpoints(FormationJob {
                    site,
                    network_service,
                    response,
                })
                .await
        }
        Err(e) => {
            tracing::warn!(
                service = %query.network_service_name,
                error = %format!("{e:#}"),
                "registry query failed"
            );
            FormationReport::discovery_failed(&site, &e)
        }
    }
}

#[async_trait]
impl NetworkServiceServer for Vl3Endpoint {
    async fn request(&self, mut request: NetworkServiceRequest) -> Result<Connection> {
        tracing::info!(
            endpoint = %request.connection.network_service_endpoint_name,
            manager = %request.connection.source_network_service_manager_name,
            "vL3 request"
        );

        match request.connection.nse_source().map(str::to_string) {
            Some(source) => {
                self.process_peer_request(&source, &mut request.connection)
                    .await
            }
            None => self.process_client_request(&mut request.connection),
        }

        match &self.next {
            Some(next) => next.request(request).await,
            None => Ok(request.connection),
        }
    }

    async fn close(&self, connection: Connection) -> Result<()> {
        // Peer records outlive the connections that created them.
        match &self.next {
            Some(next) => next.close(connection).await,
            None => Ok(()),
        }
    }

    fn name(&self) -> &str {
        "vL3 NSE"
    }
}
