//! Command implementations: config mapping, sorter assembly, and the
//! sort / test-actuator / test-sensor / self-check runs.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use eyre::WrapErr;
use serde_json::json;
use sorter_traits::Clock;
use sorter_core::error::{Result as CoreResult, SorterError};
use sorter_core::{
    CalibrationProfile, Inspection, ManualSource, MoveOutcome, Position, PresenceCfg, PresenceSource,
    SessionReport, SortEvent, SortStatus, Sorter, SorterBuilder, TimedSource,
};

use crate::cli::Mode;
use crate::hw::Rig;
use crate::telemetry::HttpTelemetry;

/// Read, parse and validate the TOML config. Every failure is a config error.
pub fn load_config(path: &Path) -> CoreResult<sorter_config::Config> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        SorterError::Config(format!("read config {}: {e}", path.display()))
    })?;
    let cfg = sorter_config::load_toml(&text).map_err(|e| {
        SorterError::Config(format!("parse config {}: {e}", path.display()))
    })?;
    cfg.validate()
        .map_err(|e| SorterError::Config(format!("invalid config: {e}")))?;
    Ok(cfg)
}

/// `--calibration` wins over `[calibration].path`. Never fails: missing or
/// malformed files fall back to defaults inside the profile loader.
pub fn load_profile(cfg: &sorter_config::Config, cli_path: Option<&Path>) -> Arc<CalibrationProfile> {
    let path: Option<PathBuf> = cli_path
        .map(Path::to_path_buf)
        .or_else(|| cfg.calibration.path.as_ref().map(PathBuf::from));
    Arc::new(CalibrationProfile::load(path.as_deref()))
}

/// Options only the `sort` command needs.
pub struct SortOpts {
    pub mode: Mode,
    pub delay_s: f64,
    pub max_beans: Option<u64>,
    pub summary: Option<PathBuf>,
    pub json: bool,
}

/// Builder with devices, classifier and config tables attached; only the
/// bean sources are left to the caller.
fn prepare(
    cfg: &sorter_config::Config,
    profile: Arc<CalibrationProfile>,
    rig: Rig,
) -> CoreResult<(
    SorterBuilder<sorter_core::Set, sorter_core::Set, sorter_core::Missing>,
    Box<dyn sorter_traits::PresenceSensor + Send>,
)> {
    let classifier = sorter_core::build_classifier(&cfg.classifier, profile.clone())
        .map_err(|e| SorterError::Model(format!("{e:#}")))?;
    let Rig {
        color,
        servo,
        mass,
        presence,
        indicator,
        simulated,
    } = rig;
    tracing::info!(simulated, strategy = classifier.name(), "assembling sorter");

    let mut b = Sorter::builder()
        .with_color_sensor(color)
        .with_servo(servo)
        .with_classifier(classifier)
        .with_profile(profile)
        .with_reader((&cfg.color).into())
        .with_weight((&cfg.weight).into())
        .with_actuator((&cfg.servo).into())
        .with_presence((&cfg.presence).into())
        .with_runner(cfg.into());
    if let Some(m) = mass {
        b = b.with_mass_sensor(m);
    }
    if let Some(i) = indicator {
        b = b.with_indicator(i);
    }
    Ok((b, presence))
}

/// The `--delay` override is held to the same range as `runner.auto_delay_s`.
fn auto_delay(secs: f64) -> CoreResult<Duration> {
    if !(0.0..=sorter_config::MAX_AUTO_DELAY_S).contains(&secs) {
        return Err(SorterError::Config(format!(
            "auto delay must be between 0 and {} seconds, got {secs}",
            sorter_config::MAX_AUTO_DELAY_S
        ))
        .into());
    }
    Ok(Duration::from_secs_f64(secs))
}

/// A sorter for the diagnostic commands, which never poll a bean source.
fn diagnostic_sorter(
    cfg: &sorter_config::Config,
    profile: Arc<CalibrationProfile>,
    rig: Rig,
) -> CoreResult<Sorter> {
    let (b, _presence) = prepare(cfg, profile, rig)?;
    // Never polled; the sender is dropped on return
    let (_tx, rx) = crossbeam_channel::bounded(0);
    b.with_source(ManualSource::new(rx)).build()
}

pub fn run_sort(
    cfg: &sorter_config::Config,
    profile: Arc<CalibrationProfile>,
    rig: Rig,
    opts: &SortOpts,
    shutdown: &AtomicBool,
) -> eyre::Result<SessionReport> {
    let (b, presence) = prepare(cfg, profile, rig)?;

    let b = match opts.mode {
        Mode::Manual => {
            if !opts.json {
                println!("Manual mode: press Enter for each bean, Ctrl-D or Ctrl-C to stop.");
            }
            b.with_source(ManualSource::from_stdin().wrap_err("stdin trigger")?)
        }
        Mode::Auto => {
            let delay = auto_delay(opts.delay_s)?;
            b.with_source(TimedSource::new(delay))
        }
        Mode::Sensor => b
            .with_source(PresenceSource::from_cfg(presence, &PresenceCfg::from(&cfg.presence)))
            .with_source(ManualSource::from_stdin().wrap_err("stdin trigger")?),
    };

    let b = if cfg.telemetry.enabled {
        let url = cfg.telemetry.url.clone().unwrap_or_default();
        let sink = HttpTelemetry::new(
            url,
            cfg.telemetry.api_key.clone(),
            Duration::from_millis(cfg.telemetry.timeout_ms),
        )?;
        let worker = sorter_core::TelemetryWorker::spawn(sink, cfg.telemetry.queue)
            .wrap_err("spawn telemetry worker")?;
        b.with_telemetry(worker)
    } else {
        b
    };

    let mut sorter = b.build()?;
    if sorter.weight_channel().is_degraded() {
        let why = sorter.weight_channel().degraded_reason().unwrap_or("disabled");
        if opts.json {
            println!("{}", json!({ "event": "weight_degraded", "reason": why }));
        } else {
            println!("Weight channel degraded ({why}); default weight will be used.");
        }
    }

    let report = sorter_core::run_session(&mut sorter, shutdown, opts.max_beans, |status| {
        match status {
            SortStatus::Sorted(ev) => {
                if opts.json {
                    println!("{}", event_json(ev));
                } else {
                    println!("{}", event_line(ev));
                }
            }
            SortStatus::Failed(e) => {
                if opts.json {
                    println!("{}", json!({ "event": "failed", "error": e.to_string() }));
                } else {
                    println!("cycle failed: {e}");
                }
            }
            SortStatus::Stopped(_) => {}
        }
    });

    let summary = summary_json(&report, sorter.clock().now());
    if opts.json {
        println!("{summary}");
    } else {
        print_summary(&report, &summary);
    }
    if let Some(path) = &opts.summary {
        let bytes = serde_json::to_vec_pretty(&summary)?;
        sorter_core::atomic::write_atomic(path, &bytes)
            .wrap_err_with(|| format!("write summary {}", path.display()))?;
        tracing::info!(path = %path.display(), "session summary written");
    }
    Ok(report)
}

pub fn run_test_actuator(
    cfg: &sorter_config::Config,
    profile: Arc<CalibrationProfile>,
    rig: Rig,
    json: bool,
    shutdown: &AtomicBool,
) -> eyre::Result<()> {
    let mut sorter = diagnostic_sorter(cfg, profile, rig)?;
    sorter_core::run_actuator_test(&mut sorter, shutdown, |pos: Position, out: &MoveOutcome| {
        if json {
            println!(
                "{}",
                json!({ "event": "move", "position": format!("{pos:?}"), "angle_deg": out.angle, "clamped": out.clamped })
            );
        } else {
            let note = if out.clamped { " (clamped)" } else { "" };
            println!("{pos:?} -> {:.1}°{note}", out.angle);
        }
    })?;
    if !json {
        println!("Actuator test complete; diverter parked at HOME.");
    }
    Ok(())
}

pub fn run_test_sensor(
    cfg: &sorter_config::Config,
    profile: Arc<CalibrationProfile>,
    rig: Rig,
    reads: u32,
    interval: Duration,
    json: bool,
    shutdown: &AtomicBool,
) -> eyre::Result<()> {
    let mut sorter = diagnostic_sorter(cfg, profile, rig)?;
    sorter_core::run_sensor_test(&mut sorter, reads, interval, shutdown, |i, insp: &Inspection| {
        if json {
            println!("{}", inspection_json(i, insp));
        } else {
            println!(
                "read {i:>3}: R={:.0} G={:.0} B={:.0} weight={:.3}g -> {}",
                insp.features.red, insp.features.green, insp.features.blue, insp.features.weight, insp.verdict
            );
        }
    })?;
    Ok(())
}

pub fn run_self_check(
    cfg: &sorter_config::Config,
    profile: Arc<CalibrationProfile>,
    rig: Rig,
    json: bool,
) -> eyre::Result<()> {
    let sep = profile.separability();
    let fallbacks = profile.fallbacks.clone();
    let is_default = profile.is_default;
    let timestamp = profile.timestamp.clone();
    let midpoint = profile.sum_midpoint();
    let simulated = rig.simulated;
    let mut sorter = diagnostic_sorter(cfg, profile, rig)?;

    let degraded = sorter.weight_channel().is_degraded();
    let reason = sorter.weight_channel().degraded_reason().map(str::to_owned);
    let classifier = sorter.classifier().name();
    sorter.teardown()?;

    if json {
        println!(
            "{}",
            json!({
                "event": "self_check",
                "simulated": simulated,
                "classifier": classifier,
                "calibration": {
                    "default": is_default,
                    "timestamp": timestamp,
                    "fallbacks": fallbacks,
                    "separability_pct": sep,
                    "sum_midpoint": midpoint,
                },
                "weight": { "degraded": degraded, "reason": reason },
            })
        );
    } else {
        println!("Hardware:      {}", if simulated { "simulated" } else { "raspberry pi" });
        println!("Classifier:    {classifier}");
        if is_default {
            println!("Calibration:   built-in defaults");
        } else {
            println!(
                "Calibration:   loaded ({})",
                timestamp.as_deref().unwrap_or("no timestamp")
            );
        }
        if !fallbacks.is_empty() {
            println!("  defaulted:   {}", fallbacks.join(", "));
        }
        println!("  separability {sep:.1}%  sum midpoint {midpoint:.0}");
        match reason {
            Some(r) if degraded => println!("Weight:        DEGRADED ({r})"),
            _ if degraded => println!("Weight:        DEGRADED"),
            _ => println!("Weight:        ok"),
        }
    }
    Ok(())
}

fn event_line(ev: &SortEvent) -> String {
    let f = &ev.features;
    let mut line = format!(
        "#{:<4} {:<7} -> {:<6} R={:.0} G={:.0} B={:.0} weight={:.3}g angle={:.0}°",
        ev.seq,
        ev.verdict.as_str(),
        ev.disposition.as_str(),
        f.red,
        f.green,
        f.blue,
        f.weight,
        ev.angle_deg
    );
    if !ev.weight_ok {
        line.push_str(" [weight out of range]");
    }
    if ev.anomalous {
        line.push_str(" [anomalous reading]");
    }
    line
}

pub fn event_json(ev: &SortEvent) -> serde_json::Value {
    json!({
        "event": "bean",
        "seq": ev.seq,
        "timestamp": ev.timestamp.to_rfc3339(),
        "trigger": ev.trigger.as_str(),
        "red": ev.features.red,
        "green": ev.features.green,
        "blue": ev.features.blue,
        "weight_g": ev.features.weight,
        "weight_source": ev.weight_source.as_str(),
        "weight_ok": ev.weight_ok,
        "anomalous": ev.anomalous,
        "verdict": ev.verdict.as_str(),
        "disposition": ev.disposition.as_str(),
        "angle_deg": ev.angle_deg,
        "clamped": ev.clamped,
    })
}

fn inspection_json(read: u32, insp: &Inspection) -> serde_json::Value {
    json!({
        "event": "read",
        "read": read,
        "red": insp.features.red,
        "green": insp.features.green,
        "blue": insp.features.blue,
        "weight_g": insp.features.weight,
        "weight_source": insp.weight_source.as_str(),
        "anomalous": insp.anomalous,
        "verdict": insp.verdict.as_str(),
    })
}

pub fn summary_json(report: &SessionReport, now: std::time::Instant) -> serde_json::Value {
    let s = &report.stats;
    json!({
        "event": "summary",
        "stop": report.stop.as_str(),
        "started_at": s.started_at.to_rfc3339(),
        "runtime_s": s.runtime(now).as_secs_f64(),
        "total": s.total,
        "good": s.good,
        "bad": s.bad,
        "unknown": s.unknown,
        "weight_rejected": s.weight_rejected,
        "degraded_weight": s.degraded_weight,
        "clamped_moves": s.clamped_moves,
        "failed_cycles": s.failed_cycles,
        "good_pct": s.good_pct(),
        "bad_pct": s.bad_pct(),
        "avg_weight_g": s.avg_weight_g(),
        "beans_per_sec": s.beans_per_sec(now),
        "teardown_error": report.teardown_error,
    })
}

fn print_summary(report: &SessionReport, summary: &serde_json::Value) {
    let s = &report.stats;
    println!();
    println!("Session ended ({})", report.stop.as_str());
    println!(
        "  beans {}  good {} ({:.1}%)  bad {} ({:.1}%)  unknown {}",
        s.total,
        s.good,
        s.good_pct(),
        s.bad,
        s.bad_pct(),
        s.unknown
    );
    println!(
        "  weight rejected {}  defaulted weight {}  failed cycles {}",
        s.weight_rejected, s.degraded_weight, s.failed_cycles
    );
    println!(
        "  avg weight {:.3}g  runtime {:.1}s  {:.2} beans/s",
        s.avg_weight_g(),
        summary["runtime_s"].as_f64().unwrap_or_default(),
        summary["beans_per_sec"].as_f64().unwrap_or_default()
    );
    if let Some(e) = &report.teardown_error {
        println!("  WARNING: diverter may not be parked: {e}");
    }
}
