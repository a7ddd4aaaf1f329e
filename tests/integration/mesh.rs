use std::collections::HashSet;

use vl3_services::testing::{endpoints, MockDiscovery};
use vl3_services::PeerState;

use crate::*;

// ══════════════════════════════════════════════════════════════════════════════
//  Local mesh formation
// ══════════════════════════════════════════════════════════════════════════════

fn three_node_mesh() -> (Mesh, Node, Node, Node) {
    let discovery = MockDiscovery::new()
        .with_service(SERVICE, endpoints(SERVICE, &["nse-a", "nse-b", "nse-c"]));
    let mesh = Mesh::new(discovery);
    let a = mesh.node("nse-a", "10.60.1.0/24", &[]);
    let b = mesh.node("nse-b", "10.60.2.0/24", &[]);
    let c = mesh.node("nse-c", "10.60.3.0/24", &[]);
    (mesh, a, b, c)
}

/// A's client request dials both others; they record A as incoming.
#[tokio::test]
async fn first_client_request_connects_to_every_other_endpoint() {
    let (mesh, a, b, c) = three_node_mesh();

    let summary = a.client_request().await;
    assert_eq!(summary.panicked, 0);
    assert_eq!(summary.reports.len(), 1);
    assert!(summary.reports[0].skipped_self);

    assert_eq!(a.peer_state("nse-b").await, Some(PeerState::Connected));
    assert_eq!(a.peer_state("nse-c").await, Some(PeerState::Connected));
    assert_eq!(
        b.peer_state("nse-a").await,
        Some(PeerState::ConnectedViaIncoming)
    );
    assert_eq!(
        c.peer_state("nse-a").await,
        Some(PeerState::ConnectedViaIncoming)
    );

    // B and C have not seen a client yet.
    assert_eq!(b.endpoint.registry().self_identity(), "");
    assert_eq!(b.peer_state("nse-c").await, None);

    let mut programmed = a.dataplane.interfaces();
    programmed.sort();
    assert_eq!(programmed, vec!["nse-b", "nse-c"]);
    assert_eq!(mesh.connector.calls().len(), 2);
}

/// After every endpoint saw a client, the mesh is full and each pair was
/// dialed exactly once, from one side.
#[tokio::test]
async fn full_mesh_dials_each_pair_once() {
    let (mesh, a, b, c) = three_node_mesh();
    let nodes = [&a, &b, &c];

    for node in &nodes {
        node.client_request().await;
    }

    for node in &nodes {
        for other in &nodes {
            if node.name == other.name {
                continue;
            }
            assert!(
                linked(node.peer_state(&other.name).await),
                "{} has no link to {}",
                node.name,
                other.name
            );
        }
    }

    let mut pairs = HashSet::new();
    for call in mesh.connector.calls() {
        let from = call.source_manager_name.trim_start_matches("nsm-").to_string();
        let mut pair = [from, call.endpoint_name.clone()];
        pair.sort();
        assert!(pairs.insert(pair.clone()), "pair {pair:?} dialed twice");
    }
    assert_eq!(pairs.len(), 3);

    // C only ever answered.
    assert!(c.dataplane.interfaces().is_empty());
    assert_eq!(mesh.dials("nse-b", "nse-c"), 1);
    assert_eq!(mesh.dials("nse-c", "nse-b"), 0);
}

/// Both ends of a link know each other's subnet.
#[tokio::test]
async fn link_carries_both_subnets() {
    let (_mesh, a, b, _c) = three_node_mesh();
    a.client_request().await;

    let a_view = a
        .peers()
        .await
        .into_iter()
        .find(|p| p.endpoint_name == "nse-b")
        .unwrap();
    assert!(a_view.has_connection);
    assert!(a_view.dst_routes.contains(&"10.60.2.0/24".to_string()));

    let b_view = b
        .peers()
        .await
        .into_iter()
        .find(|p| p.endpoint_name == "nse-a")
        .unwrap();
    assert_eq!(b_view.manager_name, "nsm-nse-a");
    assert!(b_view.dst_routes.contains(&"10.60.1.0/24".to_string()));
}

#[tokio::test]
async fn repeated_client_requests_do_not_redial() {
    let (mesh, a, _b, _c) = three_node_mesh();

    a.client_request().await;
    a.client_request().await;
    a.client_request().await;

    assert_eq!(mesh.dials("nse-a", "nse-b"), 1);
    assert_eq!(mesh.dials("nse-a", "nse-c"), 1);
    assert_eq!(a.dataplane.interfaces().len(), 2);
}

/// Many clients arriving at once still produce one dial per peer.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_clients_dial_each_peer_once() {
    let (mesh, a, _b, _c) = three_node_mesh();

    let mut handles = Vec::new();
    for i in 0..16 {
        let endpoint = a.endpoint.clone();
        handles.push(tokio::spawn(async move {
            let conn = vl3_core::Connection {
                id: format!("client-{i}"),
                network_service: SERVICE.to_string(),
                network_service_endpoint_name: "nse-a".to_string(),
                ..vl3_core::Connection::default()
            };
            endpoint
                .request(vl3_core::NetworkServiceRequest::new(conn))
                .await
        }));
    }
    for h in handles {
        h.await.unwrap().unwrap();
    }
    let summary = a.endpoint.drain().await;
    assert_eq!(summary.panicked, 0);

    assert_eq!(mesh.dials("nse-a", "nse-b"), 1);
    assert_eq!(mesh.dials("nse-a", "nse-c"), 1);
    assert_eq!(a.peer_state("nse-b").await, Some(PeerState::Connected));
    assert_eq!(a.peer_state("nse-c").await, Some(PeerState::Connected));
}

/// Peer snapshots serialize the way the API reports them.
#[tokio::test]
async fn peer_snapshot_serializes_state_names() {
    let (_mesh, a, b, _c) = three_node_mesh();
    a.client_request().await;

    let json = serde_json::to_value(b.peers().await).unwrap();
    assert_eq!(json[0]["endpoint_name"], "nse-a");
    assert_eq!(json[0]["state"], "connected_via_incoming");
}
