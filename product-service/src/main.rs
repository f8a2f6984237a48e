use std::process::ExitCode;

use envconfig::Envconfig;
use tracing::{error, info};

use lifecycle::wait_for_shutdown_signal;
use product_service::app::{Application, SERVICE_NAME};
use product_service::config::Config;
use product_service::logging;

/// Startup phases, each failing with its own exit code so operators can tell
/// them apart from the exit status alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Logging,
    Config,
    Construction,
    Start,
}

fn phase_exit_code(phase: Phase) -> u8 {
    match phase {
        Phase::Logging => 11,
        Phase::Config => 12,
        Phase::Construction => 13,
        Phase::Start => 14,
    }
}

fn fail(phase: Phase) -> ExitCode {
    ExitCode::from(phase_exit_code(phase))
}

#[tokio::main]
async fn main() -> ExitCode {
    let otel = match logging::init() {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("failed to initialize logging: {e}");
            return fail(Phase::Logging);
        }
    };

    let config = match Config::init_from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("invalid configuration: {}", e);
            return fail(Phase::Config);
        }
    };

    let mut app = match Application::new(config, Some(&otel)).await {
        Ok(app) => app,
        Err(e) => {
            error!("failed to build {}: {}", SERVICE_NAME, e);
            return fail(Phase::Construction);
        }
    };

    if let Err(e) = app.start().await {
        error!("failed to start {}: {}", SERVICE_NAME, e);
        return fail(Phase::Start);
    }
    info!("{} started", SERVICE_NAME);

    if let Err(e) = wait_for_shutdown_signal().await {
        error!("cannot listen for shutdown signals, stopping now: {}", e);
    }
    info!("Shutting down gracefully...");

    app.shutdown().await;
    ExitCode::SUCCESS
}
