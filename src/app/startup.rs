//! Application startup
//!
//! Configuration, logging, lifecycle construction and the main wait for a
//! termination signal. Returns the process exit code.

use super::cli::{AppConfig, Args};
use super::drill::{register_steps, spawn_worker, HEARTBEAT};
use crate::core::error_handling::log_error_with_context;
use crate::core::logging::init_logging;
use crate::core::version::long_version;
use crate::lifecycle::{exit_code, Lifecycle, LifecycleError, SignalCoordinator};
use clap::Parser;
use std::io::IsTerminal;
use std::sync::Arc;

/// Run the drill from process arguments
pub async fn startup() -> i32 {
    run(Args::parse()).await
}

/// Run the drill with already parsed arguments
pub async fn run(args: Args) -> i32 {
    let mut config = match AppConfig::load(args.config_file.as_deref()).await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    config.apply_args(&args);

    let use_color = config
        .log
        .color
        .unwrap_or_else(|| std::io::stderr().is_terminal());
    if let Err(e) = init_logging(
        config.log.level.as_deref(),
        config.log.format.as_deref(),
        config.log.file.as_deref(),
        use_color,
    ) {
        eprintln!("Error: failed to initialise logging: {}", e);
        return 1;
    }

    log::info!("finalizer {} starting", long_version());
    log::debug!("effective configuration: {:?}", config);

    let lifecycle = match build_lifecycle(&config, &args) {
        Ok(lifecycle) => Arc::new(lifecycle),
        Err(e) => {
            log_error_with_context(&e, "Building finalizers");
            return 1;
        }
    };

    if !args.run_once {
        let (coordinator, mut shutdown_rx) = match SignalCoordinator::install(lifecycle.clone()) {
            Ok(installed) => installed,
            Err(e) => {
                log_error_with_context(&e, "Installing signal handlers");
                return 1;
            }
        };
        log::info!(
            "waiting for SIGINT/SIGTERM ({} exit, {} alarm finalizer(s))",
            lifecycle.at_exit().len().unwrap_or(0),
            lifecycle.at_alarm().len().unwrap_or(0)
        );

        match shutdown_rx.recv().await {
            Ok(signal) => log::debug!("shutdown requested by {}", signal.name()),
            Err(e) => log::warn!("signal listener stopped: {}", e),
        }
        log::debug!(
            "alarms handled before shutdown: {}",
            coordinator.alarms_received()
        );
    }

    let drain = lifecycle.clone();
    let ok = match tokio::task::spawn_blocking(move || drain.shutdown()).await {
        Ok(Some(ok)) => ok,
        Ok(None) => true,
        Err(e) => {
            log::error!("shutdown task failed: {}", e);
            false
        }
    };
    exit_code(ok, 0)
}

fn build_lifecycle(config: &AppConfig, args: &Args) -> Result<Lifecycle, LifecycleError> {
    let lifecycle = Lifecycle::from_configs(&config.at_exit, &config.at_alarm)?;

    register_steps(lifecycle.at_exit(), &args.steps)?;
    register_steps(lifecycle.at_alarm(), &args.alarm_steps)?;
    for worker in &args.workers {
        // Workers run detached; the exit drain is what stops them
        spawn_worker(lifecycle.at_exit(), worker.clone(), HEARTBEAT)?;
    }

    Ok(lifecycle)
}
