//! echo-storm: a concurrent load generator for TCP echo servers
//!
//! Opens a configurable number of simultaneous connections. Each one sends a
//! single 64-byte random packet, reads 64 bytes back and closes. The process
//! prints `All done!` once every connection has finished, whatever the
//! outcome of the individual exchanges.
//!
//! Features:
//! - Fan-out of thousands of short-lived connections at once
//! - Per-connection diagnostics for dial, write and read failures
//! - Companion fixed-packet echo server (`--serve`)
//! - Configuration via CLI arguments or TOML file

mod client;
mod config;
mod driver;
mod payload;
mod server;

use config::Config;
use server::EchoServer;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging; stdout is reserved for client diagnostics
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    info!(
        host = %config.host,
        port = %config.port,
        clients = config.clients,
        workers = ?config.workers,
        serve = config.serve,
        "Starting echo-storm"
    );

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if let Some(workers) = config.worker_threads() {
        builder.worker_threads(workers);
    }
    let runtime = builder.build()?;

    if config.serve {
        run_server(&runtime, config)
    } else {
        run_client(&runtime, config)
    }
}

/// Run the load client and print the completion line
fn run_client(
    runtime: &tokio::runtime::Runtime,
    config: Config,
) -> Result<(), Box<dyn std::error::Error>> {
    runtime.block_on(driver::run(&config));
    client::print_line("All done!");
    Ok(())
}

/// Run the fixed-packet echo server until the process is killed
fn run_server(
    runtime: &tokio::runtime::Runtime,
    config: Config,
) -> Result<(), Box<dyn std::error::Error>> {
    runtime
        .block_on(async {
            let server = EchoServer::bind(config.target()).await?;
            server.run().await
        })
        .map_err(|e| e as Box<dyn std::error::Error>)
}
