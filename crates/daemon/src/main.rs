//! Cadence - Main Entry Point
//! Runs one command on an IntervalLoop until Ctrl+C

mod config;
mod telemetry;

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use cadence_core::{cancel_channel, IntervalLoop};
use cadence_infra_system::CommandAction;
use config::{DaemonConfig, LogFormat};
use telemetry::BoxedLayer;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const LOG_FILE_PREFIX: &str = "cadence.log";

/// Extra time the loop allows beyond the command's own SIGTERM grace
const CANCEL_GRACE_MARGIN: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load configuration
    let config = DaemonConfig::from_env()?;

    // 2. Initialize logging (guard flushes the file writer on exit)
    let _log_guard = init_logging(&config)?;

    info!("Cadence v{} starting...", VERSION);
    info!(
        name = %config.name,
        schedule = %config.schedule,
        program = %config.command.program,
        args = ?config.command.args,
        "Configuration loaded"
    );

    // 3. Setup dependencies (DI wiring)
    let action = Arc::new(
        CommandAction::new(config.command.clone()).with_kill_grace(config.cancel_grace),
    );
    let interval_loop = IntervalLoop::new(config.name.clone(), config.schedule, action)
        .with_cancel_grace(config.cancel_grace + CANCEL_GRACE_MARGIN);

    // 4. Start the loop
    let (cancel_source, cancel_token) = cancel_channel();
    let mut loop_handle = interval_loop.spawn(cancel_token);

    info!("Press Ctrl+C to shutdown");

    // 5. Wait for the loop to end on its own (run-once) or for Ctrl+C
    let finished = tokio::select! {
        joined = &mut loop_handle => Some(joined),
        signal = tokio::signal::ctrl_c() => {
            signal?;
            None
        }
    };
    if let Some(joined) = finished {
        if let Err(e) = joined {
            error!(error = ?e, "Loop task failed");
        }
        info!("Loop finished. Exiting.");
        return Ok(());
    }

    // 6. Graceful shutdown
    info!("Shutdown signal received. Exiting gracefully...");
    cancel_source.cancel();

    let shutdown_timeout = config.cancel_grace + CANCEL_GRACE_MARGIN * 2;
    match tokio::time::timeout(shutdown_timeout, loop_handle).await {
        Ok(Ok(())) => info!("Shutdown complete."),
        Ok(Err(e)) => error!(error = ?e, "Loop task failed during shutdown"),
        Err(_) => warn!(timeout = ?shutdown_timeout, "Loop did not stop in time"),
    }

    Ok(())
}

/// Install the global subscriber: stdout (pretty or JSON), optional rolling
/// file, optional OpenTelemetry export.
fn init_logging(config: &DaemonConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("cadence=info"))?;

    let mut layers: Vec<BoxedLayer> = Vec::new();
    layers.push(match config.log_format {
        // Production: JSON structured logging
        LogFormat::Json => fmt::layer().json().boxed(),
        // Development: Pretty formatting with colors
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
    });

    let guard = config.log_dir.as_ref().map(|dir| {
        let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        layers.push(fmt::layer().with_ansi(false).with_writer(writer).boxed());
        guard
    });

    let otel = telemetry::otel_layer();
    let otel_error = match otel {
        Ok(Some(layer)) => {
            layers.push(layer);
            None
        }
        Ok(None) => None,
        Err(e) => Some(e),
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .init();

    if let Some(e) = otel_error {
        warn!(error = ?e, "Failed to initialize OpenTelemetry (continuing without it)");
    } else if telemetry::endpoint_ignored() {
        warn!("OpenTelemetry endpoint set but feature 'telemetry' not enabled");
        warn!("Rebuild with: cargo build --features telemetry");
    }
    if let Some(dir) = &config.log_dir {
        info!(log_dir = %dir.display(), "File logging enabled");
    }

    Ok(guard)
}
