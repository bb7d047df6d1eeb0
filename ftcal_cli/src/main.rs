#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! `ftcal`: capture, fit, validate and run force/torque sensor calibrations.

mod cli;
mod commands;
mod error_fmt;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::WrapErr;
use ftcal_config::Config;
use ftcal_core::CalError;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(e) = run(cli) {
        let code = error_fmt::exit_code_for_error(&e);
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", error_fmt::format_error_json(&e));
        } else {
            eprintln!("{}", error_fmt::humanize(&e));
        }
        tracing::error!(error = %e, code, "command failed");
        std::process::exit(code);
    }
}

fn run(cli: Cli) -> eyre::Result<()> {
    // Pretty reports only in text mode; JSON mode formats errors itself.
    if !cli.json {
        let _ = color_eyre::install();
    }

    let cfg = load_config(cli.config.as_deref())?;
    init_tracing(cli.json, &cli.log_level, &cfg.logging)?;
    tracing::debug!(config = ?cli.config, "configuration loaded");

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = Arc::clone(&shutdown);
        if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed)) {
            tracing::warn!(error = %e, "failed to install Ctrl-C handler");
        }
    }

    match cli.cmd {
        Commands::Acquire {
            out,
            samples,
            warmup,
            simulate,
        } => commands::run_acquire(&cfg, &out, samples, warmup, simulate, cli.json, &shutdown),
        Commands::Merge {
            inputs,
            out,
            train,
            validation,
            seed,
        } => commands::run_merge(
            &cfg,
            &inputs,
            &out,
            train.as_deref(),
            validation.as_deref(),
            seed,
            cli.json,
        ),
        Commands::Fit {
            data,
            params,
            degree,
            method,
            alpha,
            no_split,
            validation_out,
        } => commands::run_fit(
            &cfg,
            &data,
            &params,
            degree,
            method,
            alpha,
            no_split,
            validation_out.as_deref(),
            cli.json,
        ),
        Commands::Validate {
            params,
            data,
            errors,
            bins,
        } => commands::run_validate(&params, &data, errors.as_deref(), bins, cli.json),
        Commands::Estimate {
            params,
            max_ticks,
            simulate,
        } => commands::run_estimate(&cfg, &params, max_ticks, simulate, cli.json, &shutdown),
    }
}

/// Config loading and validation failures surface as `CalError::Config`.
fn load_config(path: Option<&std::path::Path>) -> eyre::Result<Config> {
    let loaded = match path {
        Some(path) => ftcal_config::load_config_file(path),
        None => {
            let cfg = Config::default();
            cfg.validate().map(|()| cfg)
        }
    };
    loaded.map_err(|e| eyre::Report::new(CalError::Config(e.to_string())))
}

/// Console layer on stderr (pretty or JSON) plus an optional JSON-lines file layer.
///
/// `RUST_LOG` wins over `--log-level`; `logging.level` applies to the file only.
fn init_tracing(json: bool, level: &str, logging: &ftcal_config::Logging) -> eyre::Result<()> {
    let console_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .wrap_err_with(|| format!("invalid log level '{level}'"))?;

    let console = if json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
            .boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
            .boxed()
    };

    let file_layer = match &logging.file {
        Some(path) => {
            let path = std::path::Path::new(path);
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| eyre::eyre!("logging.file has no file name: {}", path.display()))?;
            let appender = match logging.rotation.as_deref().unwrap_or("never") {
                "daily" => tracing_appender::rolling::daily(dir, name),
                "hourly" => tracing_appender::rolling::hourly(dir, name),
                _ => tracing_appender::rolling::never(dir, name),
            };
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            let file_filter = EnvFilter::try_new(logging.level.as_deref().unwrap_or("info"))
                .wrap_err("invalid logging.level")?;
            Some(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(writer)
                    .with_filter(file_filter)
                    .boxed(),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .try_init()
        .wrap_err("install tracing subscriber")?;
    Ok(())
}
