//! Send a client connection request, which starts mesh formation.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::http::{base_url, post_json_body};

#[derive(Serialize)]
struct RequestBody<'a> {
    connection: ConnectionBody<'a>,
}

#[derive(Serialize)]
struct ConnectionBody<'a> {
    id: &'a str,
    network_service: &'a str,
    network_service_endpoint_name: &'a str,
}

#[derive(Deserialize)]
struct ConnectionReply {
    id: String,
    #[serde(default)]
    context: ContextReply,
}

#[derive(Deserialize, Default)]
struct ContextReply {
    #[serde(default)]
    ip_context: IpContextReply,
}

#[derive(Deserialize, Default)]
struct IpContextReply {
    #[serde(default)]
    dst_routes: Vec<RouteReply>,
}

#[derive(Deserialize)]
struct RouteReply {
    prefix: String,
}

pub async fn cmd_request(port: u16, service: &str, endpoint_name: &str) -> Result<()> {
    let body = RequestBody {
        connection: ConnectionBody {
            id: "vl3-ctl",
            network_service: service,
            network_service_endpoint_name: endpoint_name,
        },
    };
    let resp: ConnectionReply =
        post_json_body(&format!("{}/request", base_url(port)), &body).await?;

    let routes: Vec<&str> = resp
        .context
        .ip_context
        .dst_routes
        .iter()
        .map(|r| r.prefix.as_str())
        .collect();
    println!("Connection {} accepted, routes: {}", resp.id, routes.join(", "));
    Ok(())
}
