use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use waitroom_core::health::{HealthChecker, QUEUE_STORE_COMPONENT};
use waitroom_core::logging::{init_logging_with_config, LogConfig};
use waitroom_core::shutdown::{install_signal_handlers, ShutdownCoordinator};
use waitroom_core::{build_engine, open_store, AdmissionScheduler, Config};
use waitroom_server::{install_metrics_exporter, AppState, WaitroomServer};

#[derive(Parser, Debug)]
#[command(name = "waitroom-server")]
#[command(author, version, about = "Virtual waiting room HTTP server", long_about = None)]
struct Args {
    /// TOML configuration file; environment variables are used when absent
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the bind address
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Override the log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Enable JSON formatted logging
    #[arg(long)]
    json_logs: bool,

    /// Run the admission scheduler regardless of configuration
    #[arg(long)]
    enable_scheduler: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.server.bind_address = bind;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    if args.json_logs {
        config.logging.json_format = true;
    }
    if args.enable_scheduler {
        config.scheduler.enabled = true;
    }
    config.validate()?;

    init_logging_with_config(LogConfig::from_settings(&config.logging)?)?;
    install_metrics_exporter(&config.metrics)?;

    info!(backend = ?config.store.backend, "Opening queue store");
    let store = open_store(&config.store)?;
    let engine = build_engine(&config, store)?;

    let health = Arc::new(HealthChecker::new(env!("CARGO_PKG_VERSION")));
    health.register_component(QUEUE_STORE_COMPONENT).await;

    let coordinator = Arc::new(ShutdownCoordinator::new(config.server.shutdown_timeout));
    install_signal_handlers(coordinator.clone());

    if !config.scheduler.enabled {
        warn!("Admission scheduler disabled; users are only admitted through /api/v1/queue/allow");
    }
    let scheduler = AdmissionScheduler::new(engine.clone(), config.scheduler.clone())
        .with_health(health.clone())
        .spawn(coordinator.subscribe());

    let state = AppState::new(engine, health)
        .with_cookie_max_age(config.token.cookie_max_age)
        .with_health_timeout(config.store.operation_timeout);

    WaitroomServer::new(Arc::new(state), coordinator).run(config.server.bind_address).await?;

    scheduler.await?;
    info!("Waitroom server finished");

    Ok(())
}
