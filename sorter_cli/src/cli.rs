//! CLI argument definitions.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sorter", version, about = "Coffee bean sorter CLI")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/sorter_config.toml")]
    pub config: PathBuf,

    /// Calibration JSON; overrides [calibration].path
    #[arg(long, value_name = "FILE")]
    pub calibration: Option<PathBuf>,

    /// Log and report as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Where "bean arrived" events come from.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum Mode {
    /// Operator presses Enter for every bean
    Manual,
    /// Fixed delay between beans
    Auto,
    /// IR presence sensor, with Enter as a fallback
    Sensor,
}

impl From<sorter_config::RunMode> for Mode {
    fn from(m: sorter_config::RunMode) -> Self {
        match m {
            sorter_config::RunMode::Manual => Mode::Manual,
            sorter_config::RunMode::Auto => Mode::Auto,
            sorter_config::RunMode::Sensor => Mode::Sensor,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Inspect and sort beans until interrupted
    Sort {
        /// Trigger source; defaults to [runner].mode
        #[arg(long, value_enum)]
        mode: Option<Mode>,
        /// Seconds between beans in auto mode; defaults to [runner].auto_delay_s
        #[arg(long, value_name = "SECS")]
        delay: Option<f64>,
        /// Stop after this many beans (sorted or failed)
        #[arg(long, value_name = "N")]
        max_beans: Option<u64>,
        /// Write the final session summary as JSON to this file
        #[arg(long, value_name = "FILE")]
        summary: Option<PathBuf>,
    },
    /// Sweep the diverter through HOME, GOOD, BAD, 0°, 180° and back HOME
    TestActuator,
    /// Read and classify samples without moving the diverter
    TestSensor {
        /// Number of samples
        #[arg(long, default_value_t = 10)]
        reads: u32,
        /// Pause between samples (ms)
        #[arg(long, value_name = "MS", default_value_t = 1000)]
        interval_ms: u64,
    },
    /// Load config and calibration, report the profile and weight channel
    SelfCheck,
}
