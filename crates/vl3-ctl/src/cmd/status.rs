//! Daemon status and shutdown commands.

use std::collections::BTreeMap;

use anyhow::Result;
use serde::Deserialize;

use super::http::{base_url, get_json, post_json};

#[derive(Deserialize)]
struct StatusResponse {
    endpoint_name: String,
    subnet: String,
    vl3_cidr: String,
    remote_sites: Vec<String>,
    peers: usize,
    peers_by_state: BTreeMap<String, usize>,
    formation_tasks: usize,
}

pub async fn cmd_status(port: u16) -> Result<()> {
    let resp: StatusResponse = get_json(&format!("{}/status", base_url(port))).await?;

    let name = if resp.endpoint_name.is_empty() {
        "(unresolved)"
    } else {
        resp.endpoint_name.as_str()
    };

    println!("═══════════════════════════════════════");
    println!("  vL3 Endpoint Status");
    println!("═══════════════════════════════════════");
    println!("  Endpoint        : {}", name);
    println!("  Subnet          : {}", resp.subnet);
    println!("  vL3 range       : {}", resp.vl3_cidr);
    if !resp.remote_sites.is_empty() {
        println!("  Remote sites    : {}", resp.remote_sites.join(", "));
    }
    println!("  Peers           : {}", resp.peers);
    for (state, count) in &resp.peers_by_state {
        println!("    {:<24} {}", state, count);
    }
    println!("  Formation tasks : {}", resp.formation_tasks);

    Ok(())
}

pub async fn cmd_shutdown(port: u16) -> Result<()> {
    #[derive(Deserialize)]
    struct ShutdownResponse {
        message: String,
    }

    let resp: ShutdownResponse = post_json(&format!("{}/daemon/shutdown", base_url(port))).await?;
    println!("{}", resp.message);
    Ok(())
}
