#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod cli;
mod error_fmt;
mod hw;
mod sort;
mod telemetry;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use eyre::Result;
use sorter_core::error::SorterError;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

use crate::cli::{Cli, Commands};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    let cli = Cli::parse();
    let _ = color_eyre::install();

    let cfg = sort::load_config(&cli.config);
    let guard = init_tracing(&cli, cfg.as_ref().ok().map(|c| &c.logging));

    let code = match cfg.and_then(|cfg| run(&cli, &cfg)) {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "command failed");
            if cli.json {
                eprintln!("{}", format_error_json(&e));
            } else {
                eprintln!("{}", humanize(&e));
            }
            exit_code_for_error(&e)
        }
    };
    // Flush the file appender before exiting
    drop(guard);
    std::process::exit(code);
}

fn run(cli: &Cli, cfg: &sorter_config::Config) -> Result<()> {
    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = shutdown.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            flag.store(true, Ordering::Relaxed);
        }) {
            tracing::warn!(error = %e, "could not install Ctrl-C handler");
        }
    }

    let profile = sort::load_profile(cfg, cli.calibration.as_deref());
    let rig = hw::open(cfg)?;

    match &cli.cmd {
        Commands::Sort {
            mode,
            delay,
            max_beans,
            summary,
        } => {
            let opts = sort::SortOpts {
                mode: mode.unwrap_or_else(|| cfg.runner.mode.into()),
                delay_s: delay.unwrap_or(cfg.runner.auto_delay_s),
                max_beans: *max_beans,
                summary: summary.clone(),
                json: cli.json,
            };
            let report = sort::run_sort(cfg, profile, rig, &opts, &shutdown)?;
            if let Some(e) = report.teardown_error {
                return Err(SorterError::HardwareFault(format!("diverter did not park: {e}")).into());
            }
            Ok(())
        }
        Commands::TestActuator => sort::run_test_actuator(cfg, profile, rig, cli.json, &shutdown),
        Commands::TestSensor { reads, interval_ms } => sort::run_test_sensor(
            cfg,
            profile,
            rig,
            *reads,
            Duration::from_millis(*interval_ms),
            cli.json,
            &shutdown,
        ),
        Commands::SelfCheck => sort::run_self_check(cfg, profile, rig, cli.json),
    }
}

/// Console logs go to stderr so stdout stays machine-readable. `RUST_LOG`
/// overrides `--log-level`. With `[logging].file` set, JSON lines are also
/// appended there, rotated per `[logging].rotation`.
fn init_tracing(cli: &Cli, logging: Option<&sorter_config::Logging>) -> Option<WorkerGuard> {
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let console = if cli.json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(console_filter)
            .boxed()
    };

    let mut guard = None;
    let file_layer = logging.and_then(|l| {
        let file = Path::new(l.file.as_deref()?);
        let dir = file.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
        let name = file.file_name()?;
        let appender = match l.rotation.as_deref() {
            Some("daily") => tracing_appender::rolling::daily(dir, name),
            Some("hourly") => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, g) = tracing_appender::non_blocking(appender);
        guard = Some(g);
        let level = l.level.as_deref().unwrap_or("info");
        Some(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(EnvFilter::new(level))
                .boxed(),
        )
    });

    let _ = tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .try_init();
    guard
}
