//! vl3-services — peer registry, connection state machine, mesh formation
//! and the inbound request dispatcher for a vL3 endpoint.

pub mod collaborators;
pub mod endpoint;
pub mod formation;
pub mod peer;
pub mod state;
pub mod supervisor;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use collaborators::{
    DataplaneApplier, DataplaneConfig, DataplaneRequest, DiscoveryClient, NetworkServiceServer,
    PeerConnectRequest, PeerConnector, SelfNameResolver, MECHANISM_MEMIF,
};
pub use endpoint::Vl3Endpoint;
pub use formation::{DriveOutcome, FormationJob, FormationReport, MeshFormation, PeerOutcome};
pub use peer::{PeerInner, PeerRecord, PeerRegistry, PeerSnapshot};
pub use state::{transition, PeerError, PeerEvent, PeerState, TransitionError};
pub use supervisor::{DrainSummary, FormationSupervisor};
