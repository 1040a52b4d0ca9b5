//! Resource gateway
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────────┐
//!                 │                  RESOURCE GATEWAY                    │
//!                 │                                                      │
//!   Client ──────▶│  net::Listener ─▶ panic/metrics/trace/timeout layers │
//!                 │        │                                             │
//!                 │        ▼                                             │
//!                 │  CORS ─▶ ClientLimiterRegistry ─▶ AuthChain          │
//!                 │        │                                             │
//!                 │        ▼                                             │
//!                 │  handlers ─▶ Store (deadline-bounded, CAS updates)   │
//!                 │                                                      │
//!                 │  lifecycle: signals ─▶ Shutdown ─▶ drain (grace)     │
//!                 └──────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use resource_gateway::config::{self, AppConfig, Environment};
use resource_gateway::lifecycle::{spawn_signal_listener, Shutdown};
use resource_gateway::net::Listener;
use resource_gateway::observability::{init_logging, metrics};
use resource_gateway::HttpServer;

/// Command-line overrides. Flags win over the config file.
#[derive(Debug, Parser)]
#[command(name = "resource-gateway", version, about)]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address, e.g. 0.0.0.0:4000.
    #[arg(long, env = "GATEWAY_BIND")]
    bind: Option<String>,

    /// Environment (development|staging|production).
    #[arg(long, env = "GATEWAY_ENV")]
    env: Option<Environment>,

    /// Enable the per-client rate limiter.
    #[arg(long)]
    limiter_enabled: Option<bool>,

    /// Rate limiter steady rate, requests per second.
    #[arg(long)]
    limiter_rps: Option<f64>,

    /// Rate limiter burst capacity.
    #[arg(long)]
    limiter_burst: Option<u32>,

    /// Trusted CORS origins (space separated).
    #[arg(long, value_delimiter = ' ', num_args = 1..)]
    cors_trusted_origins: Option<Vec<String>>,
}

impl Args {
    fn apply(self, config: &mut AppConfig) {
        if let Some(bind) = self.bind {
            config.listener.bind_address = bind;
        }
        if let Some(env) = self.env {
            config.environment = env;
        }
        if let Some(enabled) = self.limiter_enabled {
            config.rate_limit.enabled = enabled;
        }
        if let Some(rps) = self.limiter_rps {
            config.rate_limit.requests_per_second = rps;
        }
        if let Some(burst) = self.limiter_burst {
            config.rate_limit.burst = burst;
        }
        if let Some(origins) = self.cors_trusted_origins {
            config.cors.trusted_origins = origins;
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => match config::load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("failed to load configuration: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => AppConfig::default(),
    };
    args.apply(&mut config);

    if let Err(errors) = config::validate_config(&config) {
        for e in errors {
            eprintln!("invalid configuration: {e}");
        }
        return ExitCode::FAILURE;
    }

    init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "resource-gateway starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        environment = config.environment.as_str(),
        limiter_enabled = config.rate_limit.enabled,
        limiter_rps = config.rate_limit.requests_per_second,
        limiter_burst = config.rate_limit.burst,
        store_timeout_secs = config.store.timeout_secs,
        grace_secs = config.shutdown.grace_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    // Installed before binding so an early signal still stops the server.
    let shutdown = Shutdown::new();
    spawn_signal_listener(shutdown.clone());

    let listener = match Listener::bind(&config.listener).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, "Failed to bind listener");
            return ExitCode::FAILURE;
        }
    };

    let server = HttpServer::new(config, shutdown);
    match server.run(listener).await {
        Ok(outcome) => {
            tracing::info!(outcome = ?outcome, "Shutdown complete");
            ExitCode::from(outcome.exit_code())
        }
        Err(e) => {
            tracing::error!(error = %e, "Server failed");
            ExitCode::FAILURE
        }
    }
}
