//! Human-readable error descriptions and structured JSON error formatting.

use sorter_core::error::{BuildError, SorterError};

/// Exit code for configuration problems (bad TOML, invalid values, missing model).
pub const EXIT_CONFIG: i32 = 3;
/// Exit code for hardware that could not be opened or driven.
pub const EXIT_HARDWARE: i32 = 4;

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingColorSensor => {
                "What happened: No colour sensor was provided to the sorter.\nLikely causes: The TCS3200 failed to initialize or was not wired into the builder.\nHow to fix: Check the color_s0..color_s3 and color_out pins, then pass the sensor via with_color_sensor(...).".to_string()
            }
            BuildError::MissingServo => {
                "What happened: No diverter servo was provided to the sorter.\nLikely causes: The servo pin failed to initialize or was not wired into the builder.\nHow to fix: Check pins.servo and pass the servo via with_servo(...).".to_string()
            }
            BuildError::MissingSource => {
                "What happened: No bean trigger was configured.\nLikely causes: No manual, timer or presence source was added.\nHow to fix: Choose a mode (`sorter sort --mode manual|auto|sensor`).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. See etc/sorter_config.toml for a sample."
            ),
        };
    }

    if let Some(se) = err.downcast_ref::<SorterError>() {
        return match se {
            SorterError::Timeout => "What happened: A sensor read timed out.\nLikely causes: HX711 or TCS3200 not wired correctly, no power/ground, or timeout too low.\nHow to fix: Verify the [pins] table and power, and consider increasing hardware.sensor_read_timeout_ms.".to_string(),
            SorterError::Config(m) => format!(
                "What happened: Configuration could not be used ({m}).\nLikely causes: A typo in the TOML, a value out of range, or a missing file.\nHow to fix: Fix the config (see etc/sorter_config.toml) and rerun."
            ),
            SorterError::Model(m) => format!(
                "What happened: The decision tree model is unusable ({m}).\nLikely causes: Wrong classifier.model_path or a malformed tree file.\nHow to fix: Point classifier.model_path at a valid tree JSON, or switch classifier.strategy to \"distance\"."
            ),
            SorterError::Hardware(_) | SorterError::HardwareFault(_) => format!(
                "What happened: {se}.\nLikely causes: Loose wiring, wrong pin numbers, or missing GPIO permissions.\nHow to fix: Run `sorter test-actuator` and `sorter test-sensor` to isolate the device."
            ),
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = format!("{err:#}").to_ascii_lowercase();

    if lower.contains("hx711") && lower.contains("timeout") {
        return "What happened: HX711 did not produce data within the configured timeout.\nLikely causes: Wrong DT/SCK pins, wiring/power issues, or timeout configured too low.\nHow to fix: Check [pins] in the config, verify 5V/GND, and raise hardware.sensor_read_timeout_ms.".to_string();
    }

    if lower.contains("open colour sensor") || lower.contains("open servo") || lower.contains("open ir sensor") {
        return "What happened: Failed to initialize hardware pins.\nLikely causes: Incorrect pin numbers or insufficient GPIO permissions.\nHow to fix: Fix the [pins] values in the config; ensure the process has permission to access GPIO.".to_string();
    }

    if lower.contains("read config") || lower.contains("parse config") || lower.contains("invalid config") {
        return format!(
            "What happened: Configuration is invalid or incomplete ({msg}).\nLikely causes: Wrong --config path, TOML syntax error, or out-of-range values.\nHow to fix: Edit the TOML config and try again."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes; clap reserves 2 for usage errors.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if err.downcast_ref::<BuildError>().is_some() {
        return EXIT_CONFIG;
    }
    if let Some(se) = err.downcast_ref::<SorterError>() {
        return match se {
            SorterError::Config(_) | SorterError::Model(_) => EXIT_CONFIG,
            SorterError::Hardware(_) | SorterError::HardwareFault(_) | SorterError::Timeout => {
                EXIT_HARDWARE
            }
        };
    }
    let lower = format!("{err:#}").to_ascii_lowercase();
    if lower.contains("open colour sensor") || lower.contains("open servo") || lower.contains("open ir sensor") {
        return EXIT_HARDWARE;
    }
    1
}

fn reason_name(err: &eyre::Report) -> &'static str {
    if err.downcast_ref::<BuildError>().is_some() {
        return "Config";
    }
    match err.downcast_ref::<SorterError>() {
        Some(SorterError::Config(_)) => "Config",
        Some(SorterError::Model(_)) => "Model",
        Some(SorterError::Timeout) => "Timeout",
        Some(SorterError::Hardware(_) | SorterError::HardwareFault(_)) => "Hardware",
        _ if exit_code_for_error(err) == EXIT_HARDWARE => "Hardware",
        _ => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({
        "reason": reason_name(err),
        "message": humanize(err),
    })
    .to_string()
}
