pub mod api;
pub mod config;
pub mod constants;
pub mod db;
pub mod domain;
pub mod entities;
pub mod services;
pub mod state;

use std::net::SocketAddr;

use anyhow::Context;
pub use config::Config;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

pub async fn run() -> anyhow::Result<()> {
    let config = Config::load()?;

    init_tracing(&config);

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(String::as_str) {
        None | Some("serve" | "-s" | "--serve") => {
            // Refuse to bind anything with a missing or weak signing secret.
            config.validate().context("Invalid configuration")?;

            let prometheus_handle = if config.observability.metrics_enabled {
                use metrics_exporter_prometheus::PrometheusBuilder;
                let handle = PrometheusBuilder::new()
                    .install_recorder()
                    .context("Failed to install Prometheus recorder")?;
                info!("Prometheus metrics recorder initialized");
                Some(handle)
            } else {
                None
            };

            run_server(config, prometheus_handle).await
        }

        Some("init" | "--init") => {
            if Config::create_default_if_missing()? {
                println!("✓ Config file created. Set security.jwt_secret (or JWT_SECRET) and run again.");
            } else {
                println!("config.toml already exists, leaving it untouched.");
            }
            Ok(())
        }

        Some("help" | "-h" | "--help") => {
            print_help();
            Ok(())
        }

        Some(other) => {
            println!("Unknown command: {other}");
            println!();
            print_help();
            Ok(())
        }
    }
}

fn init_tracing(config: &Config) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    if config.observability.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn print_help() {
    println!("Gatehouse - operator authentication service");
    println!();
    println!("USAGE:");
    println!("  gatehouse [COMMAND]");
    println!();
    println!("COMMANDS:");
    println!("  serve             Run the HTTP API (default)");
    println!("  init              Create default config file");
    println!("  help              Show this help message");
    println!();
    println!("ENVIRONMENT:");
    println!("  JWT_SECRET            Token signing secret, at least 32 bytes (required)");
    println!("  DATABASE_URL          SQLite URL, e.g. sqlite:data/gatehouse.db");
    println!("  PORT                  Listen port");
    println!("  RATE_LIMIT_REQUESTS   Requests per client per window");
    println!("  LOG_LEVEL             Log filter when RUST_LOG is unset");
}

async fn run_server(
    config: Config,
    prometheus_handle: Option<metrics_exporter_prometheus::PrometheusHandle>,
) -> anyhow::Result<()> {
    info!("Gatehouse v{} starting...", env!("CARGO_PKG_VERSION"));

    let port = config.server.port;
    let sweep_interval = config.rate_limit.sweep_interval();

    let api_state = api::create_app_state_from_config(config, prometheus_handle).await?;
    let sweeper = api_state.rate_limiter().spawn_sweeper(sweep_interval);

    let app = api::router(api_state);
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("Web server running at http://{}", addr);

    let served = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;

    sweeper.shutdown().await;
    info!("Server stopped");

    served.context("Web server error")
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            error!("Error listening for shutdown: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
