use std::env;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tokio::io::BufReader;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cloud_log_mcp::cache::LogCache;
use cloud_log_mcp::config::{Config, ServerMode};
use cloud_log_mcp::http::{serve_both, serve_http};
use cloud_log_mcp::mcp::run_stdio;
use cloud_log_mcp::provider::{FileProvider, LogProvider};
use cloud_log_mcp::service::LogService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries JSON-RPC in stdio mode
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <config.yaml|json>", args[0]);
        std::process::exit(1);
    }

    let cfg_path = Path::new(&args[1]);
    let config = Config::load_from_path(cfg_path)
        .with_context(|| format!("loading config {}", cfg_path.display()))?;
    info!(
        mode = ?config.server.mode,
        ttl_secs = ?config.cache.ttl_secs,
        max_entries = config.cache.max_entries,
        "config loaded"
    );

    let records = match &config.provider.records_path {
        Some(path) => FileProvider::load(path).await?,
        None => {
            warn!("no provider.records_path configured");
            FileProvider::default()
        }
    };
    if records.is_empty() {
        warn!("log store is empty; every query will return no records");
    }
    let provider: Arc<dyn LogProvider> = Arc::new(records);
    let service = LogService::new(provider, LogCache::from_config(&config.cache));

    match config.server.mode {
        ServerMode::Http => serve_http(service, &config.server).await?,
        ServerMode::Stdio => run_stdio(service).await?,
        ServerMode::Both => {
            let stdin = BufReader::new(tokio::io::stdin());
            serve_both(service, &config.server, stdin, tokio::io::stdout()).await?
        }
    }

    Ok(())
}
