//! Kyotei pre-race info API
//!
//! Chat responder and CLI that summarise boatrace.jp pre-race information
//! (直前情報) for a single race.

mod cli;
mod config;
mod dispatcher;
mod error;
mod failsafe;
mod query;
mod routes;
mod scraper;
mod summary;
mod types;
mod venue;

use axum::{routing::get, routing::post, Router};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};
use crate::config::AppConfig;
use crate::routes::AppState;
use crate::scraper::{Clock, HttpFetcher, PageFetcher, SystemClock};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { host, port } => run_server(host, port).await,
        Commands::Ask { text } => cli::run_ask(text).await,
        Commands::Fetch {
            jcd,
            rno,
            hd,
            format,
        } => cli::run_fetch(jcd, rno, hd, format).await,
    }
}

/// Run the API server.
async fn run_server(host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kyotei_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let mut config = AppConfig::load()?;

    // Override with CLI args
    if let Some(h) = host {
        config.server.host = h;
    }
    if let Some(p) = port {
        config.server.port = p;
    }

    config.line.require()?;

    tracing::info!("Configuration loaded");
    tracing::info!("Upstream: {} (timeout {}s)", config.fetch.base_url, config.fetch.timeout_secs);

    // Create application state
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpFetcher::new(&config.fetch)?);
    let state = Arc::new(AppState {
        dispatcher: cli::build_dispatcher(&config, fetcher.clone(), clock.clone()),
        fetcher,
        clock,
    });

    // Build router
    let app = Router::new()
        .route("/", get(routes::root))
        .route("/health", get(routes::health))
        .route("/ask", post(routes::ask))
        .route("/_debug/beforeinfo", get(routes::debug_beforeinfo))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    // Start server
    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
