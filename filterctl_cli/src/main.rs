//! filterctl: adjust a four-filter attenuator from detector histograms.

mod channels;
mod cli;

use std::process::ExitCode;
use std::sync::{Arc, OnceLock};

use clap::error::ErrorKind;
use clap::Parser;
use eyre::WrapErr;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use filterctl_config::StartupConfig;
use filterctl_core::{runner, ControlMode, EngineConfig, FilterController, ThresholdSet};

use crate::channels::{ZmqControlChannel, ZmqDataChannel, ZmqEventSink};
use crate::cli::Cli;

static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// Build a file sink writer with optional rotation, storing the non-blocking
/// guard in OnceLock.
fn file_layer(
    file: Option<&str>,
    rotation: Option<&str>,
) -> Option<tracing_appender::non_blocking::NonBlocking> {
    let path = file?;
    let p = std::path::Path::new(path);
    if let Some(parent) = p.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let file_appender = match rotation.unwrap_or("never").to_ascii_lowercase().as_str() {
        "daily" => tracing_appender::rolling::daily(".", path),
        "hourly" => tracing_appender::rolling::hourly(".", path),
        _ => tracing_appender::rolling::never(".", path),
    };
    let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
    let _ = FILE_GUARD.set(guard);
    Some(nb_writer)
}

/// Initialize tracing once for the whole app.
fn init_tracing(json: bool, level: &str, file: Option<&str>, rotation: Option<&str>) {
    // Prefer RUST_LOG if set; otherwise use the CLI level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);

    if json {
        let console = fmt::layer().json().with_target(false);
        if let Some(nb_writer) = file_layer(file, rotation) {
            let file_l = fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(nb_writer);
            registry.with(console).with(file_l).init();
        } else {
            registry.with(console).init();
        }
    } else {
        let console = fmt::layer().pretty().with_target(false);
        if let Some(nb_writer) = file_layer(file, rotation) {
            let file_l = fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(nb_writer);
            registry.with(console).with(file_l).init();
        } else {
            registry.with(console).init();
        }
    }
}

/// Map the startup configuration onto the engine defaults.
fn engine_config(startup: &StartupConfig) -> EngineConfig {
    let mut config = EngineConfig::default();
    if let Some(mode) = startup.mode {
        if let Some(mode) = ControlMode::from_code(i64::from(mode)) {
            config.mode = mode;
        }
    }
    if let Some(timeout) = startup.timeout {
        config.timeout = timeout;
    }
    config.in_positions = startup.positions.in_beam;
    config.out_positions = startup.positions.out_beam;
    config.thresholds = ThresholdSet {
        low1: startup.thresholds.low1,
        low2: startup.thresholds.low2,
        high1: startup.thresholds.high1,
        high2: startup.thresholds.high2,
        high3: startup.thresholds.high3,
    };
    config
}

fn run(cli: Cli) -> eyre::Result<()> {
    let endpoints = filterctl_config::parse_endpoints(&cli.subscribe_endpoints)
        .wrap_err("parse subscribe endpoints")?;
    let startup = match &cli.config {
        Some(path) => filterctl_config::load_file(path)
            .wrap_err_with(|| format!("load config {}", path.display()))?,
        None => StartupConfig::default(),
    };

    #[cfg(not(feature = "hardware"))]
    let motion = filterctl_hardware::DryRunMotionController::new();
    #[cfg(feature = "hardware")]
    let motion = filterctl_hardware::OnboardMotionController::new();

    let controller = Arc::new(
        FilterController::builder()
            .with_motion(motion)
            .with_config(engine_config(&startup))
            .build()
            .wrap_err("build controller")?,
    );

    let context = zmq::Context::new();
    let control = ZmqControlChannel::bind(&context, cli.control_port)?;
    let events = ZmqEventSink::bind(&context, cli.publish_port)?;
    let data = ZmqDataChannel::connect(&context, &endpoints)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        control_port = cli.control_port,
        publish_port = cli.publish_port,
        endpoints = endpoints.len(),
        "filterctl started"
    );

    runner::run(controller, control, data, events)?;
    tracing::info!("finished run");
    Ok(())
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };

    init_tracing(
        cli.json,
        &cli.log_level,
        cli.log_file.as_deref(),
        cli.log_rotation.as_deref(),
    );

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = ?e, "fatal error");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
