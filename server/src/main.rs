//! logai binary — thin CLI shell over the [`logai_server`] library crate.

use axum::{
    routing::{get, post},
    Router,
};
use clap::Parser;
use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use logai_core::coordination::{local::LocalCoordination, Coordination};
#[cfg(feature = "redis-coordination")]
use logai_core::coordination::redis_backed::RedisCoordination;
use logai_core::{catalog, housekeeping, Engine, EngineConfig};
use logai_server::mcp::run_mcp;
use logai_server::types::{McpAppContext, McpConfig, McpSession};

/// logai — concurrent, cache-backed log search engine, exposed as an MCP server.
#[derive(Parser)]
#[command(name = "logai", version, about, long_about = None)]
struct Cli {
    /// Path to the engine config TOML (global_admission_cap, spill_root, etc.)
    #[arg(long, default_value = "./logai.toml")]
    config: PathBuf,

    /// Path to the service catalog TOML. Overrides the config file's catalog_path.
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Run as MCP stdio server instead of serving the streamable HTTP transport.
    #[arg(long)]
    stdio: bool,

    /// Enable OAuth with authorization server URL (HTTP transport only).
    #[arg(long)]
    auth_issuer: Option<String>,

    /// Comma-separated allowed Origin headers for MCP HTTP transport.
    #[arg(long)]
    allowed_origins: Option<String>,

    /// Bind to 0.0.0.0 instead of 127.0.0.1 (localhost).
    #[arg(long)]
    bind_all: bool,
}

// ---------------------------------------------------------------------------
// Graceful shutdown signal
// ---------------------------------------------------------------------------

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to register SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received SIGINT, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.expect("failed to listen for Ctrl+C");
        info!("Received Ctrl+C, shutting down...");
    }
}

// ---------------------------------------------------------------------------
// Engine assembly
// ---------------------------------------------------------------------------

async fn build_engine(cli: &Cli) -> Engine {
    let mut config = EngineConfig::load(&cli.config).unwrap_or_else(|e| {
        error!(error = %e, "Could not load config, falling back to defaults");
        EngineConfig::default()
    });
    if let Some(catalog_path) = &cli.catalog {
        config.catalog_path = catalog_path.clone();
    }

    let catalog = catalog::load_catalog(&config.catalog_path).unwrap_or_else(|e| {
        error!(error = %e, path = %config.catalog_path.display(), "Could not load service catalog");
        std::process::exit(1);
    });

    let make_local = || {
        LocalCoordination::new(
            config.global_admission_cap,
            config.cache_byte_cap,
            config.cache_entry_cap,
            config.cache_ttl_seconds,
            config.catalog_path.clone(),
        )
    };

    #[cfg(feature = "redis-coordination")]
    let coordination: Arc<dyn Coordination> = match &config.shared_store_url {
        Some(url) => {
            let fallback = Arc::new(make_local());
            match RedisCoordination::connect(
                url,
                config.global_admission_cap,
                config.cache_ttl_seconds,
                config.cache_byte_cap,
                fallback.clone(),
            )
            .await
            {
                Ok(c) => Arc::new(c),
                Err(e) => {
                    error!(error = %e, "Could not connect to shared store, falling back to local coordination");
                    fallback
                }
            }
        }
        None => Arc::new(make_local()),
    };

    #[cfg(not(feature = "redis-coordination"))]
    let coordination: Arc<dyn Coordination> = {
        if config.shared_store_url.is_some() {
            tracing::warn!("shared_store_url configured but this binary was built without the redis-coordination feature; using local coordination");
        }
        Arc::new(make_local())
    };

    Engine { catalog: Arc::new(catalog), coordination, config: Arc::new(config) }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("logai=info".parse().unwrap()),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let engine = build_engine(&cli).await;

    tokio::spawn(housekeeping::run_retention_task(
        engine.config.spill_root.clone(),
        std::time::Duration::from_secs(engine.config.retention_seconds),
        std::time::Duration::from_secs(engine.config.retention_seconds.min(3600)),
    ));
    tokio::spawn(housekeeping::run_heartbeat_task(engine.coordination.clone(), engine.config.heartbeat_interval()));

    info!(services = engine.catalog.services.len(), "Service catalog loaded");

    if cli.stdio {
        run_mcp(Arc::new(engine)).await;
        return;
    }

    // HTTP transport.
    let bind_addr = if cli.bind_all { "0.0.0.0" } else { "127.0.0.1" };
    let explicit_port: Option<u16> = std::env::var("PORT").ok().and_then(|p| p.parse().ok());

    let listener = if let Some(port) = explicit_port {
        tokio::net::TcpListener::bind(format!("{bind_addr}:{port}")).await.unwrap_or_else(|e| {
            error!(port = port, error = %e, "Could not bind to port");
            std::process::exit(1);
        })
    } else {
        const BASE: u16 = 8732;
        const RANGE: u16 = 10;
        let mut found = None;
        for port in BASE..BASE + RANGE {
            if let Ok(l) = tokio::net::TcpListener::bind(format!("{bind_addr}:{port}")).await {
                found = Some(l);
                break;
            }
        }
        found.unwrap_or_else(|| {
            error!(range_start = BASE, range_end = BASE + RANGE - 1, "No free port found");
            eprintln!("  Try: PORT=<port> logai");
            std::process::exit(1);
        })
    };

    let port = listener.local_addr().unwrap().port();

    let cli_allowed_origins: Option<Vec<String>> =
        cli.allowed_origins.map(|s| s.split(',').map(|o| o.trim().to_string()).collect());
    let allowed_origins = cli_allowed_origins.unwrap_or_else(|| {
        vec![format!("http://localhost:{port}"), format!("http://127.0.0.1:{port}"), "null".to_string()]
    });

    let mcp_config = McpConfig {
        allowed_origins,
        auth_issuer: cli.auth_issuer,
        server_url: format!("http://{bind_addr}:{port}"),
    };

    let sessions: Arc<DashMap<String, McpSession>> = Arc::new(DashMap::new());
    let mcp_ctx = McpAppContext { engine: Arc::new(engine), sessions: sessions.clone(), config: Arc::new(mcp_config) };

    let app = Router::new()
        .route(
            "/mcp",
            post(logai_server::mcp_http::handle_mcp_post)
                .delete(logai_server::mcp_http::handle_mcp_delete)
                .get(logai_server::mcp_http::handle_mcp_get),
        )
        .route("/.well-known/oauth-protected-resource/mcp", get(logai_server::auth::prm_endpoint))
        .layer(axum::middleware::from_fn_with_state(mcp_ctx.clone(), logai_server::auth::validate_origin))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(mcp_ctx);

    // Session cleanup: prune idle sessions every 5 minutes.
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
        loop {
            interval.tick().await;
            let cutoff = std::time::Instant::now() - std::time::Duration::from_secs(1800);
            sessions.retain(|_, session| session.last_activity > cutoff);
        }
    });

    info!("MCP HTTP transport at /mcp");
    info!(port = port, "http://{bind_addr}:{port}");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await.unwrap();
}
