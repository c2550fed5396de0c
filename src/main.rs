//! Switchyard demo server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ axum (TraceLayer, body limit)
//!                       │
//!                       ▼
//!                 transport middleware (request id, access log, recover, timeout)
//!                       │
//!                       ▼
//!                 dispatch pipeline
//!                   session + flash ─ params ─ CSRF token ─ database checkout
//!                       │
//!                       ▼
//!                 router ──▶ route middleware ──▶ action
//!                       │
//!                       ▼
//!                 write-back ─ session cookie
//!     ◀──────────────   │
//!     Client Response
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use switchyard::config::{config_warnings, load_config, validate_config, AppConfig, ConfigError};
use switchyard::http::server;
use switchyard::middleware::transport;
use switchyard::observability::{logging, metrics};
use switchyard::{demo, HttpServer, Pipeline, Shutdown};

#[derive(Parser)]
#[command(name = "switchyard")]
#[command(about = "Request dispatch pipeline demo server", long_about = None)]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }
    // Defaults and command-line overrides get the same checks as a file.
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init(&config.observability);
    tracing::info!("switchyard v{} starting", env!("CARGO_PKG_VERSION"));
    for warning in config_warnings(&config) {
        tracing::warn!("{warning}");
    }
    tracing::info!(
        bind_address = %config.listener.bind_address,
        database = ?config.database.mode,
        csrf = config.csrf.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let mut builder = Pipeline::builder(config.clone())
        .router(demo::router())
        .layer(transport::request_id())
        .layer(transport::access_log())
        .layer(transport::recover());
    if let Some(secs) = config.listener.request_timeout_secs {
        builder = builder.layer(transport::timeout(Duration::from_secs(secs)));
    }
    let pipeline = builder.build()?;

    let listener = server::bind(&config.listener).await?;
    let shutdown = Shutdown::new();
    shutdown.trigger_on_ctrl_c();

    HttpServer::new(pipeline).run(listener, &shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
