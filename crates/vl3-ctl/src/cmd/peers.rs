//! Peer listing and inspection.

use anyhow::Result;
use serde::Deserialize;

use super::http::{base_url, get_json};

#[derive(Deserialize)]
struct PeersResponse {
    peers: Vec<PeerInfo>,
}

#[derive(Deserialize)]
struct PeerInfo {
    endpoint_name: String,
    manager_name: String,
    remote_site: String,
    state: String,
    last_error: Option<String>,
    excluded_prefixes: Vec<String>,
    has_connection: bool,
    src_ip_addr: String,
    dst_routes: Vec<String>,
}

fn state_icon(state: &str) -> &'static str {
    match state {
        "connected" | "connected_via_incoming" => "✓",
        "connection_error" => "✗",
        "connection_in_progress" => "…",
        _ => "○",
    }
}

fn print_peer(p: &PeerInfo) {
    let site = if p.remote_site.is_empty() {
        "local"
    } else {
        p.remote_site.as_str()
    };
    println!("  ┌─ {} {}", state_icon(&p.state), p.endpoint_name);
    println!("  │  manager  : {}", p.manager_name);
    println!("  │  site     : {}", site);
    if p.has_connection {
        println!("  │  src addr : {}", p.src_ip_addr);
        println!("  │  routes   : {}", p.dst_routes.join(", "));
    }
    if !p.excluded_prefixes.is_empty() {
        println!("  │  excluded : {}", p.excluded_prefixes.join(", "));
    }
    if let Some(err) = &p.last_error {
        println!("  │  error    : {}", err);
    }
    println!("  └─ state    : {}", p.state);
}

pub async fn cmd_peers(port: u16) -> Result<()> {
    let resp: PeersResponse = get_json(&format!("{}/peers", base_url(port))).await?;

    if resp.peers.is_empty() {
        println!("No peers yet.");
        return Ok(());
    }

    println!("═══════════════════════════════════════");
    println!("  vL3 Peers ({})", resp.peers.len());
    println!("═══════════════════════════════════════");

    for p in &resp.peers {
        print_peer(p);
    }

    Ok(())
}

pub async fn cmd_peer(port: u16, name: &str) -> Result<()> {
    let p: PeerInfo = get_json(&format!("{}/peers/{}", base_url(port), name)).await?;
    print_peer(&p);
    Ok(())
}
