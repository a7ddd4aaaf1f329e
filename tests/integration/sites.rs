use vl3_services::testing::{endpoints, MockDiscovery};
use vl3_services::PeerState;

use crate::*;

// ══════════════════════════════════════════════════════════════════════════════
//  Remote registry sites
// ══════════════════════════════════════════════════════════════════════════════

/// A local neighbour plus one endpoint behind each of two remote sites.
fn multi_site_mesh() -> (Mesh, Node, Node, Node, Node) {
    let discovery = MockDiscovery::new()
        .with_service(SERVICE, endpoints(SERVICE, &["nse-a", "nse-b"]))
        .with_service(
            "vl3-service@site-east",
            endpoints("vl3-service@site-east", &["nse-east"]),
        )
        .with_service(
            "vl3-service@site-west",
            endpoints("vl3-service@site-west", &["nse-west"]),
        );
    let mesh = Mesh::new(discovery);
    let a = mesh.node("nse-a", "10.60.1.0/24", &["site-east", "site-west"]);
    let b = mesh.node("nse-b", "10.60.2.0/24", &[]);
    let east = mesh.node("nse-east", "10.60.10.0/24", &[]);
    let west = mesh.node("nse-west", "10.60.20.0/24", &[]);
    (mesh, a, b, east, west)
}

#[tokio::test]
async fn every_site_is_queried_once_with_its_own_name() {
    let (mesh, a, _b, _east, _west) = multi_site_mesh();
    let summary = a.client_request().await;

    let mut sites: Vec<_> = summary.reports.iter().map(|r| r.site.clone()).collect();
    sites.sort();
    assert_eq!(sites, vec!["", "site-east", "site-west"]);

    let mut queries = mesh.discovery().queries();
    queries.sort();
    assert_eq!(
        queries,
        vec![
            "vl3-service",
            "vl3-service@site-east",
            "vl3-service@site-west"
        ]
    );
}

#[tokio::test]
async fn remote_peers_are_tagged_with_their_site() {
    let (mesh, a, _b, east, west) = multi_site_mesh();
    a.client_request().await;

    let peers = a.peers().await;
    let names: Vec<_> = peers.iter().map(|p| p.endpoint_name.as_str()).collect();
    assert_eq!(names, vec!["nse-b", "nse-east", "nse-west"]);
    for p in &peers {
        assert_eq!(p.state, PeerState::Connected, "{}", p.endpoint_name);
    }
    let site_of = |name: &str| {
        peers
            .iter()
            .find(|p| p.endpoint_name == name)
            .map(|p| p.remote_site.clone())
            .unwrap()
    };
    assert_eq!(site_of("nse-b"), "");
    assert_eq!(site_of("nse-east"), "site-east");
    assert_eq!(site_of("nse-west"), "site-west");

    let east_call = mesh
        .connector
        .calls()
        .into_iter()
        .find(|c| c.endpoint_name == "nse-east")
        .unwrap();
    assert_eq!(east_call.remote_site, "site-east");
    assert_eq!(east_call.network_service, SERVICE);

    for remote in [&east, &west] {
        assert_eq!(
            remote.peer_state("nse-a").await,
            Some(PeerState::ConnectedViaIncoming)
        );
    }
}

#[tokio::test]
async fn endpoint_without_sites_only_queries_locally() {
    let (mesh, _a, b, _east, _west) = multi_site_mesh();
    b.client_request().await;

    assert_eq!(mesh.discovery().queries(), vec!["vl3-service"]);
    assert_eq!(b.peer_state("nse-east").await, None);
}
