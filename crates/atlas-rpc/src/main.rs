//! LoRA Atlas RPC Server - JSON-RPC backend over HTTP.
//!
//! This binary provides a JSON-RPC 2.0 server that wraps the lora-atlas library.

mod handlers;
mod server;

use anyhow::Result;
use clap::Parser;
use lora_atlas::config::{AppConfig, PathsConfig};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "atlas-rpc")]
#[command(about = "JSON-RPC server for LoRA Atlas")]
struct Args {
    /// Port to listen on (0 = auto-assign)
    #[arg(short, long, default_value = "0")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Data root holding atlas-data/ (defaults to the user data directory)
    #[arg(long)]
    data_root: Option<PathBuf>,

    /// Adapter library root used to infer base and category codes from paths
    #[arg(long)]
    library_root: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    info!("Starting {} RPC Server", AppConfig::APP_NAME);

    let data_root = match args.data_root {
        Some(path) => path,
        None => dirs::data_dir()
            .map(|dir| dir.join("lora-atlas"))
            .or_else(|| std::env::current_dir().ok())
            .ok_or_else(|| anyhow::anyhow!("Could not determine a data root; pass --data-root"))?,
    };

    info!(
        "Data root: {} ({})",
        data_root.display(),
        PathsConfig::DATA_DIR_NAME
    );

    let mut builder = lora_atlas::LoraAtlas::builder(&data_root).auto_create_dirs(true);
    if let Some(root) = &args.library_root {
        info!("Library root: {}", root.display());
        builder = builder.library_root(root);
    }
    let atlas = builder.build().await?;

    // Start the server
    let addr = server::start_server(atlas, &args.host, args.port).await?;

    // Print port for the parent process to read (intentional stdout)
    println!("RPC_PORT={}", addr.port());

    info!("RPC server running on {}", addr);

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, exiting");

    Ok(())
}
