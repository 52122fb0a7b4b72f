//! Vida - A Persistent FIFO Message Queue Server
//!
//! This is the main entry point for the Vida server.
//! It parses arguments, sets up logging, starts the server and stops it
//! gracefully on SIGINT / SIGTERM.

use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;
use vida::{Server, ServerConfig, StorageMode};

/// Parse configuration from command-line arguments
fn from_args() -> ServerConfig {
    let mut config = ServerConfig::default();
    let args: Vec<String> = std::env::args().collect();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--host" | "-h" => {
                config.host = value(&args, i, "--host").to_string();
                i += 2;
            }
            "--port" | "-p" => {
                config.port = value(&args, i, "--port").parse().unwrap_or_else(|_| {
                    eprintln!("Error: invalid port number");
                    std::process::exit(1);
                });
                i += 2;
            }
            "--data" | "-d" => {
                config.data_dir = PathBuf::from(value(&args, i, "--data"));
                i += 2;
            }
            "--idle-timeout" => {
                let secs: u64 = value(&args, i, "--idle-timeout").parse().unwrap_or_else(|_| {
                    eprintln!("Error: invalid idle timeout");
                    std::process::exit(1);
                });
                config.idle_timeout = Duration::from_secs(secs);
                i += 2;
            }
            "--max-item-size" => {
                config.max_item_size =
                    value(&args, i, "--max-item-size").parse().unwrap_or_else(|_| {
                        eprintln!("Error: invalid item size");
                        std::process::exit(1);
                    });
                i += 2;
            }
            "--shared" => {
                config.storage_mode = StorageMode::Shared;
                i += 1;
            }
            "--create-on-get" => {
                config.create_on_get = true;
                i += 1;
            }
            "--help" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-v" => {
                println!("Vida version {}", vida::VERSION);
                std::process::exit(0);
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_help();
                std::process::exit(1);
            }
        }
    }

    config
}

/// Returns the value following flag `i`, or exits.
fn value<'a>(args: &'a [String], i: usize, flag: &str) -> &'a str {
    match args.get(i + 1) {
        Some(value) => value,
        None => {
            eprintln!("Error: {} requires a value", flag);
            std::process::exit(1);
        }
    }
}

fn print_help() {
    println!(
        r#"
Vida - A Persistent FIFO Message Queue Server

USAGE:
    vida [OPTIONS]

OPTIONS:
    -h, --host <HOST>              Host to bind to (default: 0.0.0.0)
    -p, --port <PORT>              Port to listen on (default: 22133)
    -d, --data <DIR>               Data directory (default: ./data)
        --shared                   Keep all queues in one keyspace
        --create-on-get            GET creates queues that do not exist
        --idle-timeout <SECS>      Time allowed to send a command (default: 3)
        --max-item-size <BYTES>    Largest accepted item (default: 536870912)
    -v, --version                  Print version information
        --help                     Print this help message

EXAMPLES:
    vida                           # Start on 0.0.0.0:22133, data in ./data
    vida --port 22134 --shared     # One keyspace for every queue

CONNECTING:
    Any memcached client works:
    $ printf 'SET orders 0 0 5\r\nhello\r\nGET orders\r\n' | nc localhost 22133
    STORED
    VALUE orders 0 5
    hello
    END

LOGGING:
    Set RUST_LOG to change verbosity, e.g. RUST_LOG=vida=debug
"#
    );
}

#[cfg(unix)]
async fn shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result?,
        _ = terminate.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let config = from_args();

    // Set up logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    info!(
        version = vida::VERSION,
        data = %config.data_dir.display(),
        mode = ?config.storage_mode,
        "Starting Vida"
    );

    let server = Server::bind(config).await?;
    let handle = server.start()?;
    info!(addr = %handle.local_addr(), "Ready to accept connections");

    shutdown_signal().await?;
    info!("Shutdown signal received, stopping server...");

    handle.stop().await?;
    info!("Server shutdown complete");
    Ok(())
}
