#![warn(clippy::all)]

use std::path::PathBuf;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uppe_monitor::config::Config;
use uppe_monitor::notify::Dispatcher;
use uppe_monitor::{AppError, Pipeline};

#[derive(Debug, Parser)]
#[command(version, about = "Periodic service checks with escalating notifications")]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Write logs to this file instead of stderr
    #[arg(short, long)]
    log: Option<PathBuf>,

    /// Send a test notification through every notifier and exit
    #[arg(short, long)]
    test: bool,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();

    let log = logger::init(logger::DEFAULT_LEVEL, cli.log.as_deref())?;

    let config = Config::load(&cli.config)?;
    log.set_level(&config.global.loglevel);
    warn!(path = %cli.config.display(), "Config loaded ok");
    debug!("{config}");

    if cli.test {
        return send_test_notifications(&config).await;
    }

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(shutdown.clone()));

    Pipeline::new(config)?.run(shutdown).await?;
    Ok(())
}

async fn send_test_notifications(config: &Config) -> Result<(), AppError> {
    let dispatcher = Dispatcher::from_config(config)?;
    match dispatcher.test_all().await {
        0 => {
            info!(notifiers = config.notifiers.len(), "test notifications sent");
            Ok(())
        }
        failed => Err(AppError::TestFailed(failed)),
    }
}

async fn cancel_on_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM, only Ctrl-C stops the monitor");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    warn!("signal received, shutting down");
    shutdown.cancel();
}
