// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use anyhow::{Context, Result};
use clap::Parser;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use companion::api::{create_http_server, HttpOptions};
use companion::config::{load_config, CompanionConfig};
use companion::io::NotificationHub;
use companion::observability::{
    debug_flags_help, init_logging, parse_debug_flags, strip_debug_flags, LogFormat,
    LoggingConfig,
};
use companion::{CompanionRuntime, Hardware};

/// Touch companion - capacitive touch drives a sad/glad mood light
#[derive(Parser, Debug)]
#[command(name = "companion", version, author, after_help = debug_flags_help())]
struct Args {
    /// Configuration file (default: search for companion.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// API bind address
    #[arg(long)]
    host: Option<String>,

    /// API port
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory for the runtime snapshot and event journal
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Base log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Number of LEDs on the strip
    #[arg(long)]
    led_count: Option<usize>,

    /// Deployment profile (development, production, test)
    #[arg(long)]
    environment: Option<String>,

    /// Write JSON log files to timestamped run folders under this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Emit console logs as JSON
    #[arg(long, default_value_t = false)]
    json_logs: bool,

    /// Use the in-process touch panel and LED strip
    #[arg(long, default_value_t = false)]
    simulate: bool,
}

impl Args {
    /// CLI values as config overrides
    fn overrides(&self) -> HashMap<String, String> {
        let mut overrides = HashMap::new();
        if let Some(host) = &self.host {
            overrides.insert("api_host".to_string(), host.clone());
        }
        if let Some(port) = self.port {
            overrides.insert("api_port".to_string(), port.to_string());
        }
        if let Some(dir) = &self.data_dir {
            overrides.insert("data_dir".to_string(), dir.display().to_string());
        }
        if let Some(level) = &self.log_level {
            overrides.insert("log_level".to_string(), level.clone());
        }
        if let Some(count) = self.led_count {
            overrides.insert("led_count".to_string(), count.to_string());
        }
        if let Some(environment) = &self.environment {
            overrides.insert("environment".to_string(), environment.clone());
        }
        overrides
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let debug_flags = parse_debug_flags();
    let args = Args::parse_from(strip_debug_flags(std::env::args()));

    let config = load_config(args.config.as_deref(), Some(&args.overrides()))
        .context("Failed to load configuration")?;

    let logging = LoggingConfig {
        level: config.system.log_level.clone(),
        format: if args.json_logs {
            LogFormat::Json
        } else {
            LogFormat::Text
        },
        log_dir: args.log_dir.clone(),
        ..Default::default()
    };
    let _log_guard = init_logging(&debug_flags, &logging)?;

    info!(
        target: "companion",
        "Companion v{} starting ({:?} profile, data in {})",
        env!("CARGO_PKG_VERSION"),
        config.system.environment,
        config.system.data_dir.display()
    );

    run(config, args.simulate).await
}

async fn run(config: CompanionConfig, simulate: bool) -> Result<()> {
    if !simulate {
        warn!(
            target: "companion",
            "No touch controller or LED driver is built in, using simulated devices"
        );
    }
    let (hardware, _panel, _strip) = Hardware::simulated(config.led.led_count);
    let runtime = CompanionRuntime::start(&config, hardware)?;

    let app = create_http_server(
        runtime.api_state(),
        &HttpOptions {
            cors_origins: config.api.cors_origins.clone(),
        },
    );
    let addr = format!("{}:{}", config.api.host, config.api.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(target: "companion", "Query API listening on http://{}", addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(Arc::clone(runtime.hub())))
        .await;
    if let Err(e) = served {
        warn!(target: "companion", "HTTP server error: {}", e);
    }

    runtime.shutdown().await
}

/// Resolves on Ctrl-C; ends live streams so the server can drain
async fn shutdown_signal(hub: Arc<NotificationHub>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(target: "companion", "Could not listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!(target: "companion", "Shutdown signal received");
    hub.disconnect_all();
}
