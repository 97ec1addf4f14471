use anyhow::{Context, Result};
use axum::{
    Router,
    routing::{get, post},
};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use timedate_origin::OriginMatcher;
use tokio_util::sync::CancellationToken;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

mod cli;
mod config;
mod error;
mod handlers;
mod logging;
mod metrics;
mod middleware;
mod models;
#[cfg(test)]
mod test_helpers;
mod time_service;
mod views;
mod ws;

use crate::config::{DEFAULT_CONFIG_FILE, FileConfig, LoggingConfig, ServerConfig};
use crate::metrics::ServerMetrics;
use crate::middleware::RequestIdMakeSpan;
use crate::models::TimeFormat;
use crate::time_service::TimeService;

#[derive(Parser)]
#[command(name = "timedate")]
#[command(about = "Time API with a live WebSocket time stream")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file (defaults to ./timedate.toml)
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the server in the foreground (default)
    Serve(ServeArgs),

    /// Write a default config file if none exists
    InitConfig,

    /// Print the current time in a zone as JSON
    Now(NowArgs),

    /// Follow a server's time stream
    Watch(WatchArgs),
}

#[derive(Parser, Default)]
struct ServeArgs {
    /// Host to bind to (overrides config)
    #[arg(short = 'b', long)]
    host: Option<String>,

    /// Port for the web server (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Parser)]
struct NowArgs {
    /// IANA zone id
    #[arg(short, long, default_value = "UTC")]
    timezone: String,

    #[arg(short, long, value_enum, default_value_t = TimeFormat::Iso8601)]
    format: TimeFormat,
}

#[derive(Parser)]
struct WatchArgs {
    /// Server address or stream URL
    #[arg(default_value = "localhost:8080")]
    url: String,

    /// Zone to subscribe to (server default is UTC)
    #[arg(short, long)]
    timezone: Option<String>,

    #[arg(short, long, value_enum)]
    format: Option<TimeFormat>,

    /// Exit after this many updates
    #[arg(short = 'n', long, value_parser = clap::value_parser!(u64).range(1..))]
    count: Option<u64>,
}

#[derive(Clone)]
pub(crate) struct AppState {
    /// Server runtime configuration
    pub config: Arc<ServerConfig>,
    /// Compiled `cors.allowed_origins`, shared by CORS and WebSocket admission
    pub origin_matcher: Arc<OriginMatcher>,
    pub time_service: TimeService,
    /// Server metrics for observability
    pub metrics: Arc<ServerMetrics>,
    /// Cancelled on Ctrl+C; every session token is a child of it
    pub shutdown: CancellationToken,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None => run_server(ServeArgs::default(), &cli.config).await,
        Some(Commands::Serve(args)) => run_server(args, &cli.config).await,
        Some(Commands::InitConfig) => cli::init_config_command(&cli.config),
        Some(Commands::Now(args)) => cli::now_command(&args.timezone, args.format),
        Some(Commands::Watch(args)) => {
            cli::watch_command(&args.url, args.timezone, args.format, args.count).await
        }
    }
}

pub(crate) fn build_router(state: AppState) -> Router {
    with_middleware(routes(), &state).with_state(state)
}

fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::root_handler))
        .route("/health", get(handlers::health_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .route("/ws/time", get(handlers::time_stream_handler))
        .route("/ws-test", get(views::ws_test_page))
        .nest("/api/v1", api_routes())
        .fallback(error::not_found)
}

/// Innermost first: panics become a 500 before the envelope middleware adds
/// path and method.
fn with_middleware(router: Router<AppState>, state: &AppState) -> Router<AppState> {
    let cors = middleware::cors_layer(&state.config.cors, state.origin_matcher.clone());

    router
        .layer(CatchPanicLayer::custom(error::panic_response))
        .layer(axum::middleware::from_fn(middleware::error_envelope))
        .layer(axum::middleware::from_fn(middleware::security_headers))
        .layer(TraceLayer::new_for_http().make_span_with(RequestIdMakeSpan))
        .layer(cors)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/time", get(handlers::get_current_time))
        .route("/time/", get(handlers::missing_timezone))
        .route("/time/convert", post(handlers::convert_time))
        .route("/time/{*timezone}", get(handlers::get_time_in_zone))
        .route("/timezones", get(handlers::list_timezones))
        .route("/formats", get(handlers::list_formats))
}

async fn run_server(args: ServeArgs, config_path: &Path) -> Result<()> {
    let file_config: FileConfig = config::load_config(config_path)
        .extract()
        .with_context(|| format!("Failed to load configuration from {:?}", config_path))?;

    logging::init(&LoggingConfig::from_file(&file_config.logging), args.debug)?;

    let mut server_config = ServerConfig::from_file(&file_config);
    if let Some(host) = args.host {
        server_config.host = host;
    }
    if let Some(port) = args.port {
        server_config.port = port;
    }

    let origin_matcher = OriginMatcher::compile(&server_config.cors.allowed_origins);
    if origin_matcher.allows_any() {
        warn!("cors.allowed_origins contains \"*\": every origin is admitted");
    }
    info!(
        "Origin allow list: {} rules ({} skipped)",
        origin_matcher.rule_count(),
        origin_matcher.rejected().len()
    );

    let shutdown = CancellationToken::new();
    let state = AppState {
        config: Arc::new(server_config.clone()),
        origin_matcher: Arc::new(origin_matcher),
        time_service: TimeService::new(),
        metrics: Arc::new(ServerMetrics::new()),
        shutdown: shutdown.clone(),
    };
    let app = build_router(state);

    let addr = server_config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    let actual_addr = listener.local_addr()?;

    info!("timedate listening on http://{}", actual_addr);
    info!("");
    info!("API endpoints:");
    info!("  GET    /api/v1/time?timezone=  - Current time");
    info!("  GET    /api/v1/time/{{zone}}     - Current time in zone");
    info!("  POST   /api/v1/time/convert    - Convert between zones");
    info!("  GET    /api/v1/timezones       - Curated zone list");
    info!("  GET    /api/v1/formats         - Display formats");
    info!("  GET    /ws/time                - WebSocket time stream");
    info!("  GET    /ws-test                - WebSocket test page");

    // Create shutdown signal handler
    let shutdown_signal = async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received shutdown signal, closing sessions..."),
            Err(e) => {
                warn!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
        shutdown.cancel();
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("Server error")?;

    info!("Shutdown complete");
    Ok(())
}
