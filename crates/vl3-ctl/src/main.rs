//! vl3-ctl — command-line interface for the vL3 endpoint daemon.

mod cmd;

use anyhow::{Context, Result};

use cmd::peers::{cmd_peer, cmd_peers};
use cmd::request::cmd_request;
use cmd::status::{cmd_shutdown, cmd_status};

const DEFAULT_PORT: u16 = 9101;

fn print_usage() {
    println!("Usage: vl3-ctl [--port <port>] <command>");
    println!();
    println!("Commands:");
    println!("  status                          Show endpoint identity, subnet, and peer counts");
    println!("  peers                           List peer records and their states");
    println!("  peer <name>                     Show one peer record");
    println!("  request <service> [name]        Send a client request (starts mesh formation)");
    println!("  shutdown                        Stop the daemon");
    println!();
    println!("Options:");
    println!("  --port <port>   API port (default: {})", DEFAULT_PORT);
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    // Parse --port option
    let mut port = DEFAULT_PORT;
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--port" {
            i += 1;
            port = args
                .get(i)
                .context("--port requires a value")?
                .parse()
                .context("--port must be a number")?;
        } else {
            remaining.push(&args[i]);
        }
        i += 1;
    }

    match remaining.as_slice() {
        ["status"] | [] => cmd_status(port).await,
        ["peers"] => cmd_peers(port).await,
        ["peer", name] => cmd_peer(port, name).await,
        ["request", service] => cmd_request(port, service, "").await,
        ["request", service, name] => cmd_request(port, service, name).await,
        ["shutdown"] => cmd_shutdown(port).await,
        ["help"] | ["--help"] | ["-h"] => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
