mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use mr_core::config::Config;
use mr_core::range::parse_range_header;
use mr_core::RangeWindow;
use std::path::Path;

async fn start_server(
    host: Option<String>,
    port: Option<u16>,
    config_path: Option<&Path>,
) -> Result<()> {
    let mut config = Config::load_or_default(config_path);

    // Override host/port from CLI if specified
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    tracing::info!(
        "Starting mediarelay with {} upstream client(s)",
        config.upstream.clients.len()
    );

    mr_server::start(config)
        .await
        .context("server terminated with an error")
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "mediarelay=trace,mr_server=trace,mr_upstream=trace,mr_db=debug,mr_core=debug,tower_http=debug".to_string()
        } else {
            "mediarelay=info,mr_server=info,mr_upstream=info,mr_db=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Plan {
            size,
            range,
            chunk_size,
        } => plan_range(size, range.as_deref(), chunk_size, cli.config.as_deref()),
        Commands::Version => {
            println!("mediarelay {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {}", p.display());
            let config = Config::load(p).with_context(|| format!("failed to load {}", p.display()))?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!("  Upstream clients: {}", config.upstream.clients.len());
    for client in &config.upstream.clients {
        match client.chunks_per_second {
            Some(rate) => println!("    {} -> {} ({rate} chunks/s)", client.name, client.base_url),
            None => println!("    {} -> {}", client.name, client.base_url),
        }
    }
    println!("  Chunk size: {}", config.streaming.effective_chunk_size());
    match &config.catalog.db_path {
        Some(db) => println!("  Catalog: {}", db.display()),
        None => println!("  Catalog: disabled"),
    }

    let warnings = config.validate();
    for warning in &warnings {
        println!("  warning: {warning}");
    }

    Ok(())
}

fn plan_range(
    size: u64,
    range: Option<&str>,
    chunk_size: Option<u64>,
    config_path: Option<&Path>,
) -> Result<()> {
    let chunk_size = match chunk_size {
        Some(size) => size,
        None => Config::load_or_default(config_path)
            .streaming
            .effective_chunk_size(),
    };

    let window = match range {
        Some(value) => parse_range_header(value)
            .with_context(|| format!("unsupported range: {value}"))?
            .plan(size, chunk_size)?,
        None => RangeWindow::whole(size, chunk_size)?,
    };

    println!("{}", serde_json::to_string_pretty(&window)?);
    Ok(())
}
