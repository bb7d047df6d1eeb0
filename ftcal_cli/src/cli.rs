//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "ftcal", version, about = "Force/torque sensor calibration")]
pub struct Cli {
    /// Path to config TOML; built-in defaults when omitted
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log and report as JSON lines instead of pretty text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum MethodArg {
    Ordinary,
    Ridge,
    Lasso,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Record synchronized reference wrench + raw channel samples
    Acquire {
        /// Capture CSV (appended to when it exists)
        #[arg(long, value_name = "FILE")]
        out: PathBuf,
        /// Samples to record after warm-up (overrides acquisition.samples)
        #[arg(long)]
        samples: Option<u64>,
        /// Warm-up ticks (overrides acquisition.warmup_ticks)
        #[arg(long)]
        warmup: Option<u64>,
        /// Use the simulated rig even when built with hardware support
        #[arg(long, action = ArgAction::SetTrue)]
        simulate: bool,
    },
    /// Merge capture sessions, drop invalid rows, and split train/validation
    Merge {
        /// Capture CSVs, merged in the given order
        #[arg(required = true, num_args = 1..)]
        inputs: Vec<PathBuf>,
        /// Merged dataset CSV
        #[arg(long, value_name = "FILE")]
        out: PathBuf,
        /// Also write the training partition here
        #[arg(long, value_name = "FILE")]
        train: Option<PathBuf>,
        /// Also write the validation partition here
        #[arg(long, value_name = "FILE")]
        validation: Option<PathBuf>,
        /// Split seed (overrides dataset.seed)
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Fit a calibration model and write its parameter CSV
    Fit {
        /// Dataset CSV (merged, or a training partition with --no-split)
        #[arg(long, value_name = "FILE")]
        data: PathBuf,
        /// Parameter CSV to write
        #[arg(long, value_name = "FILE")]
        params: PathBuf,
        /// 1 = linear, 2 = quadratic (overrides model.degree)
        #[arg(long)]
        degree: Option<u8>,
        /// Regression method (overrides model.method)
        #[arg(long, value_enum)]
        method: Option<MethodArg>,
        /// Regularization strength (overrides model.alpha)
        #[arg(long)]
        alpha: Option<f64>,
        /// Fit on every row instead of the seeded training partition
        #[arg(long, action = ArgAction::SetTrue)]
        no_split: bool,
        /// Write the held-out partition here
        #[arg(long, value_name = "FILE")]
        validation_out: Option<PathBuf>,
    },
    /// Evaluate a parameter CSV against a labeled dataset
    Validate {
        /// Parameter CSV
        #[arg(long, value_name = "FILE")]
        params: PathBuf,
        /// Labeled validation CSV
        #[arg(long, value_name = "FILE")]
        data: PathBuf,
        /// Write the per-row error table here
        #[arg(long, value_name = "FILE")]
        errors: Option<PathBuf>,
        /// Histogram buckets per axis (0 disables the histogram)
        #[arg(long, default_value_t = 30)]
        bins: usize,
    },
    /// Print live wrench estimates from the raw sensor stream
    Estimate {
        /// Parameter CSV
        #[arg(long, value_name = "FILE")]
        params: PathBuf,
        /// Stop after this many ticks (overrides realtime.max_ticks)
        #[arg(long)]
        max_ticks: Option<u64>,
        /// Use the simulated rig even when built with hardware support
        #[arg(long, action = ArgAction::SetTrue)]
        simulate: bool,
    },
}
