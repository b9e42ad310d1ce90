//! CLI entry point: `dns_server <config.json>`.

use std::net::{IpAddr, SocketAddr};
use std::process::ExitCode;
use std::sync::Arc;

use dns_server::{DnsServer, ServerConfig, TracingSink};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args();
    let program = args.next().unwrap_or_else(|| "dns_server".to_string());
    let Some(config_path) = args.next() else {
        eprintln!("usage: {program} <config.json>");
        return ExitCode::FAILURE;
    };

    let config = match ServerConfig::load(config_path.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load config {config_path:?}: {e}");
            return ExitCode::FAILURE;
        }
    };

    let ip: IpAddr = match config.ip.parse() {
        Ok(ip) => ip,
        Err(e) => {
            eprintln!("invalid listen address {:?}: {e}", config.ip);
            return ExitCode::FAILURE;
        }
    };
    let addr = SocketAddr::new(ip, config.port);
    let table = config.build_table();

    tracing::info!(
        "starting DNS server on {} with {} configured record(s)",
        addr,
        table.len()
    );

    let server = match DnsServer::start(addr, table, Arc::new(TracingSink)) {
        Ok(server) => server,
        Err(e) => {
            eprintln!("failed to start server on {addr}: {e}");
            return ExitCode::FAILURE;
        }
    };

    match server.join() {
        Ok(()) => {
            tracing::info!("server shut down cleanly");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("reactor thread error: {e}");
            ExitCode::FAILURE
        }
    }
}
