use std::time::Duration;

use vl3_core::{FindNetworkServiceResponse, NetworkServiceEndpoint};
use vl3_services::testing::{endpoints, MockDiscovery};
use vl3_services::{DriveOutcome, PeerError, PeerState};

use crate::*;

// ══════════════════════════════════════════════════════════════════════════════
//  Partial failures
// ══════════════════════════════════════════════════════════════════════════════

/// A registry entry whose manager nobody answers for.
fn with_ghost(mut response: FindNetworkServiceResponse) -> FindNetworkServiceResponse {
    response.network_service_endpoints.push(NetworkServiceEndpoint {
        name: "nse-ghost".to_string(),
        network_service_manager_name: "nsm-nowhere".to_string(),
        network_service_name: SERVICE.to_string(),
    });
    response
}

#[tokio::test]
async fn unreachable_peer_does_not_stop_the_rest() {
    let table = with_ghost(endpoints(SERVICE, &["nse-a", "nse-b"]));
    let mesh = Mesh::new(MockDiscovery::new().with_service(SERVICE, table));
    let a = mesh.node("nse-a", "10.60.1.0/24", &[]);
    let _b = mesh.node("nse-b", "10.60.2.0/24", &[]);

    let summary = a.client_request().await;
    let report = &summary.reports[0];
    assert_eq!(report.outcome("nse-b"), Some(&Ok(DriveOutcome::Connected)));
    assert!(matches!(
        report.outcome("nse-ghost"),
        Some(Err(PeerError::Connect(_)))
    ));

    assert_eq!(a.peer_state("nse-b").await, Some(PeerState::Connected));
    assert_eq!(
        a.peer_state("nse-ghost").await,
        Some(PeerState::ConnectionError)
    );

    // No retry on the next client request.
    a.client_request().await;
    assert_eq!(mesh.dials("nse-a", "nse-ghost"), 1);
    assert_eq!(
        a.peer_state("nse-ghost").await,
        Some(PeerState::ConnectionError)
    );
}

#[tokio::test]
async fn failing_site_does_not_block_local_formation() {
    let discovery = MockDiscovery::new()
        .with_service(SERVICE, endpoints(SERVICE, &["nse-a", "nse-b"]))
        .with_failure("vl3-service@site-down")
        .with_delay("vl3-service@site-down", Duration::from_millis(50));
    let mesh = Mesh::new(discovery);
    let a = mesh.node("nse-a", "10.60.1.0/24", &["site-down"]);
    let _b = mesh.node("nse-b", "10.60.2.0/24", &[]);

    let summary = a.client_request().await;
    assert_eq!(summary.reports.len(), 2);
    let failed = summary
        .reports
        .iter()
        .find(|r| r.site == "site-down")
        .unwrap();
    assert!(failed.discovery_error.is_some());
    assert!(failed.peers.is_empty());

    assert_eq!(a.peer_state("nse-b").await, Some(PeerState::Connected));
}

/// A peer that went away leaves its dialer in ConnectionError; the peer
/// coming back as a dialer itself repairs the link from its side.
#[tokio::test]
async fn failed_link_is_repaired_by_incoming_request() {
    let mesh = Mesh::new(
        MockDiscovery::new().with_service(SERVICE, endpoints(SERVICE, &["nse-a", "nse-b"])),
    );
    let a = mesh.node("nse-a", "10.60.1.0/24", &[]);

    // nse-b is listed but not running yet.
    a.client_request().await;
    assert_eq!(a.peer_state("nse-b").await, Some(PeerState::ConnectionError));

    let b = mesh.node("nse-b", "10.60.2.0/24", &[]);
    b.client_request().await;

    assert_eq!(b.peer_state("nse-a").await, Some(PeerState::Connected));
    assert_eq!(
        a.peer_state("nse-b").await,
        Some(PeerState::ConnectedViaIncoming)
    );
}

/// Shutdown cancels nothing that already finished.
#[tokio::test]
async fn shutdown_after_formation_keeps_state() {
    let mesh = Mesh::new(
        MockDiscovery::new().with_service(SERVICE, endpoints(SERVICE, &["nse-a", "nse-b"])),
    );
    let a = mesh.node("nse-a", "10.60.1.0/24", &[]);
    let _b = mesh.node("nse-b", "10.60.2.0/24", &[]);

    a.client_request().await;
    a.endpoint.shutdown();
    let summary = a.endpoint.drain().await;

    assert!(summary.reports.is_empty());
    assert_eq!(a.peer_state("nse-b").await, Some(PeerState::Connected));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn simultaneous_mutual_dial_settles_after_timeout() {
    let discovery =
        MockDiscovery::new().with_service(SERVICE, endpoints(SERVICE, &["nse-a", "nse-b"]));
    let mesh = Mesh::with_timeout(discovery, Duration::from_millis(300));
    let a = mesh.node("nse-a", "10.60.1.0/24", &[]);
    let b = mesh.node("nse-b", "10.60.2.0/24", &[]);

    tokio::time::timeout(Duration::from_secs(5), async {
        tokio::join!(a.client_request(), b.client_request())
    })
    .await
    .expect("mutual dial never settled");

    for state in [a.peer_state("nse-b").await, b.peer_state("nse-a").await] {
        assert!(
            matches!(
                state,
                Some(PeerState::Connected)
                    | Some(PeerState::ConnectedViaIncoming)
                    | Some(PeerState::ConnectionError)
            ),
            "peer left in {state:?}"
        );
    }
    assert_eq!(mesh.dials("nse-a", "nse-b"), 1);
    assert_eq!(mesh.dials("nse-b", "nse-a"), 1);
}
