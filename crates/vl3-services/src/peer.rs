//! Peer registry — one record per remote vL3 endpoint.
//!
//! Lock order is registry first, then peer. The registry's map shards and
//! identity lock are only held for the duration of a lookup or insert,
//! never across I/O and never while a peer lock is being acquired.

use std::sync::{Arc, PoisonError, RwLock};

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard};

use vl3_core::Connection;

use crate::state::{transition, PeerError, PeerEvent, PeerState, TransitionError};

/// Mutable half of a peer record. Only reachable through the record's lock.
#[derive(Debug, Default)]
pub struct PeerInner {
    pub state: PeerState,
    /// Connection handle, once a connect (outbound or inbound) produced one.
    /// Kept after a dataplane failure.
    pub connection: Option<Connection>,
    /// Set only in ConnectionError.
    pub last_error: Option<PeerError>,
    /// Grows by union, never shrinks.
    pub excluded_prefixes: Vec<String>,
}

impl PeerInner {
    /// Apply `event` through the state machine.
    pub fn apply(&mut self, event: PeerEvent) -> Result<PeerState, TransitionError> {
        let next = transition(self.state, event)?;
        self.state = next;
        Ok(next)
    }
}

/// A remote vL3 endpoint.
#[derive(Debug)]
pub struct PeerRecord {
    endpoint_name: String,
    manager_name: String,
    /// Empty for peers found in the local registry.
    remote_site: String,
    inner: Mutex<PeerInner>,
}

impl PeerRecord {
    fn new(endpoint_name: &str, manager_name: &str, remote_site: &str) -> Self {
        Self {
            endpoint_name: endpoint_name.to_string(),
            manager_name: manager_name.to_string(),
            remote_site: remote_site.to_string(),
            inner: Mutex::new(PeerInner::default()),
        }
    }

    pub fn endpoint_name(&self) -> &str {
        &self.endpoint_name
    }

    pub fn manager_name(&self) -> &str {
        &self.manager_name
    }

    pub fn remote_site(&self) -> &str {
        &self.remote_site
    }

    /// Interface name used for this peer's point-to-point link.
    pub fn interface_name(&self) -> &str {
        &self.endpoint_name
    }

    /// Take the record's lock. Held across the whole connect attempt.
    pub async fn lock(&self) -> MutexGuard<'_, PeerInner> {
        self.inner.lock().await
    }

    pub async fn state(&self) -> PeerState {
        self.inner.lock().await.state
    }

    pub async fn snapshot(&self) -> PeerSnapshot {
        let inner = self.inner.lock().await;
        let ip = inner.connection.as_ref().map(|c| &c.context.ip_context);
        PeerSnapshot {
            endpoint_name: self.endpoint_name.clone(),
            manager_name: self.manager_name.clone(),
            remote_site: self.remote_site.clone(),
            state: inner.state,
            last_error: inner.last_error.as_ref().map(ToString::to_string),
            excluded_prefixes: inner.excluded_prefixes.clone(),
            has_connection: inner.connection.is_some(),
            src_ip_addr: ip.map(|ip| ip.src_ip_addr.clone()).unwrap_or_default(),
            dst_routes: ip
                .map(|ip| ip.dst_routes.iter().map(|r| r.prefix.clone()).collect())
                .unwrap_or_default(),
        }
    }
}

/// Read-only view of a peer record, for status reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeerSnapshot {
    pub endpoint_name: String,
    pub manager_name: String,
    pub remote_site: String,
    pub state: PeerState,
    pub last_error: Option<String>,
    pub excluded_prefixes: Vec<String>,
    pub has_connection: bool,
    pub src_ip_addr: String,
    pub dst_routes: Vec<String>,
}

/// Name-keyed peer records plus this endpoint's own identity and subnet.
///
/// Records are created lazily and never removed; a peer that fails stays in
/// ConnectionError for the life of the process.
#[derive(Debug)]
pub struct PeerRegistry {
    peers: DashMap<String, Arc<PeerRecord>>,
    self_identity: RwLock<String>,
    subnet: String,
    remote_sites: Vec<String>,
}

impl PeerRegistry {
    pub fn new(subnet: impl Into<String>, remote_sites: Vec<String>) -> Self {
        Self {
            peers: DashMap::new(),
            self_identity: RwLock::new(String::new()),
            subnet: subnet.into(),
            remote_sites,
        }
    }

    /// Return the record for `name`, creating a NotConnected one if absent.
    /// Manager and site of an existing record are left untouched.
    pub fn get_or_create_peer(
        &self,
        name: &str,
        manager_name: &str,
        remote_site: &str,
    ) -> Arc<PeerRecord> {
        self.peers
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::debug!(
                    peer = name,
                    manager = manager_name,
                    site = remote_site,
                    "peer record created"
                );
                Arc::new(PeerRecord::new(name, manager_name, remote_site))
            })
            .value()
            .clone()
    }

    pub fn peer(&self, name: &str) -> Option<Arc<PeerRecord>> {
        self.peers.get(name).map(|p| p.value().clone())
    }

    /// Set this endpoint's name if it is not set yet. Empty candidates are
    /// ignored. Returns the identity in effect afterwards.
    pub fn resolve_self_identity(&self, candidate: &str) -> String {
        let mut identity = self
            .self_identity
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if identity.is_empty() && !candidate.is_empty() {
            tracing::info!(endpoint = candidate, "self identity resolved");
            *identity = candidate.to_string();
        }
        identity.clone()
    }

    pub fn self_identity(&self) -> String {
        self.self_identity
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Subnet assigned to this endpoint.
    pub fn subnet(&self) -> &str {
        &self.subnet
    }

    pub fn remote_sites(&self) -> &[String] {
        &self.remote_sites
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Snapshot of every record, sorted by name.
    ///
    /// Record handles are collected first so no map shard is held while a
    /// peer lock is awaited.
    pub async fn snapshot(&self) -> Vec<PeerSnapshot> {
        let records: Vec<Arc<PeerRecord>> =
            self.peers.iter().map(|e| e.value().clone()).collect();
        let mut out = Vec::with_capacity(records.len());
        for record in records {
            out.push(record.snapshot().await);
        }
        out.sort_by(|a, b| a.endpoint_name.cmp(&b.endpoint_name));
        out
    }
}
