use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use color_eyre::eyre::WrapErr;
use crl_sync::{
    config::Config,
    crl::CrlFetcher,
    device::{BigIpClient, DeviceTarget},
    logger::TracingLogger,
    pool::Pool,
    telemetry,
};
use tracing::{debug, info};

/// Keep client-SSL profiles of BIG-IP devices in sync with remote CRLs.
#[derive(Parser, Debug)]
#[command(name = "crl-sync", version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file; defaults to config/settings.* and
    /// APP_* environment variables
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    let _ = dotenvy::dotenv();
    telemetry::init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => Config::load_from(path)
            .wrap_err_with(|| format!("cannot read configuration file {}", path.display()))?,
        None => Config::load().wrap_err("cannot read configuration")?,
    };
    config.validate()?;
    debug!("Loaded configuration: {:?}", config);

    let mut targets: Vec<Arc<dyn DeviceTarget>> = Vec::with_capacity(config.devices.len());
    for device in &config.devices {
        let client = BigIpClient::connect(device)
            .await
            .wrap_err_with(|| format!("cannot initialize client for {}", device.url))?;
        targets.push(Arc::new(client));
    }

    let mut pool = Pool::with_fetcher(CrlFetcher::new(config.fetch.timeout)?);
    for source in config.sources() {
        pool.add_source(source);
    }
    pool.start_all(targets, Arc::new(TracingLogger))
        .wrap_err("cannot start workers")?;

    shutdown_signal().await;
    pool.stop_all().await;

    info!("bye.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen to SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen to SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
