//! Subcommand implementations: config mapping, device assembly, and reporting.

use std::io::Write;
use std::path::Path;
use std::sync::atomic::AtomicBool;

use eyre::WrapErr;
use ftcal_config::{Config, MethodKind, PersistedParams, WrenchSourceCfg};
use ftcal_core::conversions::build_wrench_source;
use ftcal_core::{
    Acquisition, AxisStats, CalError, CalibrationModel, CsvSampleWriter, Dataset, Degree,
    ErrorReport, Method, RealtimeEstimator, RunOptions, WrenchSource,
};
use ftcal_hardware::SimulatedRig;
use ftcal_traits::layout::{AXIS_NAMES, N_AXES};
use ftcal_traits::{MonotonicClock, RawLineSource};
use serde_json::json;

use crate::cli::MethodArg;

type Devices = (Box<dyn RawLineSource>, Box<dyn WrenchSource>);

fn simulated_rig(cfg: &Config) -> SimulatedRig {
    let mut rig = SimulatedRig::new().with_frame_offsets(cfg.reference.offsets);
    // Test hook: inject truncated records into the simulated stream.
    if let Ok(v) = std::env::var("FTCAL_SIM_MALFORMED_EVERY")
        && let Ok(n) = v.parse::<u64>()
    {
        rig = rig.with_malformed_every(n);
    }
    rig
}

fn open_simulated(cfg: &Config) -> eyre::Result<Devices> {
    tracing::info!("using simulated rig");
    let rig = simulated_rig(cfg);
    let mut wrench = build_wrench_source(cfg, || Ok(rig.reference()))?;
    if !matches!(cfg.wrench_source, WrenchSourceCfg::Reference) {
        // Dead weight: the rig carries the configured load for the whole run.
        rig.hold_load(wrench.next_wrench()?);
    }
    Ok((Box::new(rig.channels()), wrench))
}

#[cfg(feature = "hardware")]
fn open_hardware(cfg: &Config) -> eyre::Result<Devices> {
    let wrench = build_wrench_source::<Box<dyn ftcal_traits::ReferenceSensor>, _>(cfg, || {
        Err(CalError::Hardware(
            "no reference sensor driver in this build; use a mass wrench source or --simulate"
                .into(),
        ))
    })?;
    let channels = ftcal_hardware::SerialLineSource::open(
        &cfg.serial.port,
        cfg.serial.baud_rate,
        std::time::Duration::from_millis(cfg.serial.read_timeout_ms),
    )
    .map_err(|e| CalError::Hardware(e.to_string()))?;
    Ok((Box::new(channels), wrench))
}

#[cfg(not(feature = "hardware"))]
fn open_hardware(_cfg: &Config) -> eyre::Result<Devices> {
    Err(CalError::Hardware("built without the `hardware` feature; rerun with --simulate".into()).into())
}

fn open_devices(cfg: &Config, simulate: bool) -> eyre::Result<Devices> {
    if simulate || !cfg!(feature = "hardware") {
        open_simulated(cfg)
    } else {
        open_hardware(cfg)
    }
}

pub fn run_acquire(
    cfg: &Config,
    out: &Path,
    samples: Option<u64>,
    warmup: Option<u64>,
    simulate: bool,
    json_mode: bool,
    shutdown: &AtomicBool,
) -> eyre::Result<()> {
    let mut acq = Acquisition::from(cfg);
    if let Some(n) = samples {
        if n == 0 {
            eyre::bail!("--samples must be >= 1");
        }
        acq.samples = n;
    }
    if let Some(w) = warmup {
        acq.warmup_ticks = w;
    }

    let (mut channels, mut wrench) = open_devices(cfg, simulate)?;
    let mut writer = CsvSampleWriter::open(out)
        .wrap_err_with(|| format!("open capture file {}", out.display()))?;
    let stats = acq.run(&mut channels, &mut wrench, &mut writer, &MonotonicClock::new(), shutdown)?;
    let written = writer.finish()?;

    if json_mode {
        println!(
            "{}",
            json!({
                "command": "acquire",
                "file": out.display().to_string(),
                "ticks": stats.ticks,
                "recorded": written,
                "malformed": stats.malformed,
                "timeouts": stats.timeouts,
                "overloaded": stats.overloaded,
                "interrupted": stats.interrupted,
            })
        );
    } else {
        println!(
            "Recorded {written} samples to {} ({} ticks, {} malformed, {} timeouts, {} overloaded){}",
            out.display(),
            stats.ticks,
            stats.malformed,
            stats.timeouts,
            stats.overloaded,
            if stats.interrupted { " [interrupted]" } else { "" }
        );
    }
    Ok(())
}

pub fn run_merge(
    cfg: &Config,
    inputs: &[std::path::PathBuf],
    out: &Path,
    train: Option<&Path>,
    validation: Option<&Path>,
    seed: Option<u64>,
    json_mode: bool,
) -> eyre::Result<()> {
    let (ds, report) = Dataset::build(inputs);
    if report.included.is_empty() {
        eyre::bail!("no usable session among {} input file(s)", inputs.len());
    }
    ds.write_csv(out)
        .wrap_err_with(|| format!("write merged dataset {}", out.display()))?;

    let seed = seed.unwrap_or(cfg.dataset.seed);
    let mut split_sizes = None;
    if train.is_some() || validation.is_some() {
        let split = ds.split(cfg.dataset.train_fraction, seed);
        if let Some(p) = train {
            split.train.write_csv(p)?;
        }
        if let Some(p) = validation {
            split.validation.write_csv(p)?;
        }
        split_sizes = Some((split.train.len(), split.validation.len()));
    }

    if json_mode {
        let excluded: Vec<_> = report
            .excluded
            .iter()
            .map(|(p, e)| json!({ "file": p.display().to_string(), "reason": e.to_string() }))
            .collect();
        println!(
            "{}",
            json!({
                "command": "merge",
                "included": report.included.len(),
                "excluded": excluded,
                "rows_kept": report.rows_kept,
                "rows_dropped_non_numeric": report.rows_dropped_non_numeric,
                "rows_dropped_overload": report.rows_dropped_overload,
                "train_rows": split_sizes.map(|s| s.0),
                "validation_rows": split_sizes.map(|s| s.1),
            })
        );
    } else {
        println!(
            "Merged {} file(s) into {}: {} rows kept, {} non-numeric dropped, {} overloaded dropped",
            report.included.len(),
            out.display(),
            report.rows_kept,
            report.rows_dropped_non_numeric,
            report.rows_dropped_overload
        );
        for (p, e) in &report.excluded {
            println!("Excluded {}: {e}", p.display());
        }
        if let Some((t, v)) = split_sizes {
            println!("Split (seed {seed}): {t} train / {v} validation rows");
        }
    }
    Ok(())
}

fn model_settings(
    cfg: &Config,
    degree: Option<u8>,
    method: Option<MethodArg>,
    alpha: Option<f64>,
) -> eyre::Result<(Degree, Method)> {
    let mut model_cfg = cfg.model.clone();
    if let Some(d) = degree {
        model_cfg.degree = d;
    }
    if let Some(m) = method {
        model_cfg.method = match m {
            MethodArg::Ordinary => MethodKind::Ordinary,
            MethodArg::Ridge => MethodKind::Ridge,
            MethodArg::Lasso => MethodKind::Lasso,
        };
    }
    if let Some(a) = alpha {
        if !(a.is_finite() && a > 0.0) {
            eyre::bail!("--alpha must be > 0");
        }
        model_cfg.alpha = a;
    }
    let degree = Degree::try_from(&model_cfg)?;
    Ok((degree, Method::from(&model_cfg)))
}

fn format_wrench(w: &[f64; N_AXES]) -> String {
    w.iter()
        .map(|v| format!("{v:>10.4}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[allow(clippy::too_many_arguments)]
pub fn run_fit(
    cfg: &Config,
    data: &Path,
    params: &Path,
    degree: Option<u8>,
    method: Option<MethodArg>,
    alpha: Option<f64>,
    no_split: bool,
    validation_out: Option<&Path>,
    json_mode: bool,
) -> eyre::Result<()> {
    let (degree, method) = model_settings(cfg, degree, method, alpha)?;
    let ds = Dataset::read_csv(data).wrap_err_with(|| format!("load dataset {}", data.display()))?;

    let (train, validation) = if no_split {
        (ds, None)
    } else {
        let split = ds.split(cfg.dataset.train_fraction, cfg.dataset.seed);
        (split.train, Some(split.validation))
    };

    let model = CalibrationModel::fit(&train, degree, &method)?;
    ftcal_config::write_params_csv(params, &PersistedParams::from(&model))
        .wrap_err_with(|| format!("write parameters {}", params.display()))?;

    if let (Some(p), Some(v)) = (validation_out, validation.as_ref()) {
        v.write_csv(p)?;
    }

    let train_rmse = model.rmse(&train);
    let val_rmse = validation.as_ref().filter(|v| !v.is_empty()).map(|v| model.rmse(v));
    if json_mode {
        println!(
            "{}",
            json!({
                "command": "fit",
                "params": params.display().to_string(),
                "degree": if degree == Degree::Quadratic { 2 } else { 1 },
                "method": method.name(),
                "train_rows": train.len(),
                "validation_rows": validation.as_ref().map(Dataset::len),
                "train_rmse": train_rmse,
                "validation_rmse": val_rmse,
            })
        );
    } else {
        println!(
            "Fitted {} {} model on {} rows -> {}",
            if degree == Degree::Quadratic { "quadratic" } else { "linear" },
            method.name(),
            train.len(),
            params.display()
        );
        println!("{:<16}{}", "", AXIS_NAMES.map(|a| format!("{a:>10}")).join(" "));
        println!("{:<16}{}", "train RMSE", format_wrench(&train_rmse));
        if let Some(v) = val_rmse {
            println!("{:<16}{}", "validation RMSE", format_wrench(&v));
        }
    }
    Ok(())
}

fn load_model(params: &Path) -> eyre::Result<CalibrationModel> {
    let p = ftcal_config::load_params_csv(params)
        .wrap_err_with(|| format!("load parameters {}", params.display()))?;
    Ok(CalibrationModel::from(p))
}

fn print_histograms(report: &ErrorReport, bins: usize) {
    const BAR: usize = 40;
    for (axis, name) in AXIS_NAMES.iter().enumerate() {
        let h = report.histogram(axis, bins);
        let peak = h.counts.iter().copied().max().unwrap_or(0).max(1);
        println!("{name} error histogram [{:.4}, {:.4}]", h.lo, h.hi);
        for (i, c) in h.counts.iter().enumerate() {
            let lo = h.lo + h.bin_width() * i as f64;
            println!("  {lo:>10.4} | {:<BAR$} {c}", "#".repeat(c * BAR / peak));
        }
    }
}

pub fn run_validate(
    params: &Path,
    data: &Path,
    errors: Option<&Path>,
    bins: usize,
    json_mode: bool,
) -> eyre::Result<()> {
    let model = load_model(params)?;
    // Every row as written, so `row_index` in the error table is the file's data row.
    let ds = Dataset::read_csv_unfiltered(data)
        .wrap_err_with(|| format!("load dataset {}", data.display()))?;
    let overloaded = ds.overloaded_rows();
    let report = ftcal_core::evaluate(&model, &ds);
    if let Some(p) = errors {
        report
            .write_csv(p)
            .wrap_err_with(|| format!("write error table {}", p.display()))?;
    }
    let summary = report.summary();

    if json_mode {
        let axes: serde_json::Map<String, serde_json::Value> = AXIS_NAMES
            .iter()
            .zip(summary.iter())
            .map(|(name, s)| (name.to_string(), axis_json(s)))
            .collect();
        println!(
            "{}",
            json!({
                "command": "validate",
                "rows": report.len(),
                "overloaded_rows": overloaded,
                "axes": axes,
            })
        );
        return Ok(());
    }

    if overloaded > 0 {
        println!("Validated {} rows ({overloaded} overloaded)", report.len());
    } else {
        println!("Validated {} rows", report.len());
    }
    println!(
        "{:<6}{:>12}{:>12}{:>12}{:>12}{:>12}",
        "axis", "mean", "min", "max", "rms", "max_abs"
    );
    for (name, s) in AXIS_NAMES.iter().zip(summary.iter()) {
        println!(
            "{name:<6}{:>12.5}{:>12.5}{:>12.5}{:>12.5}{:>12.5}",
            s.mean, s.min, s.max, s.rms, s.max_abs
        );
    }
    if bins > 0 && !report.is_empty() {
        print_histograms(&report, bins);
    }
    Ok(())
}

fn axis_json(s: &AxisStats) -> serde_json::Value {
    json!({
        "mean": s.mean,
        "min": s.min,
        "max": s.max,
        "rms": s.rms,
        "max_abs": s.max_abs,
    })
}

fn open_line_source(cfg: &Config, simulate: bool) -> eyre::Result<Box<dyn RawLineSource>> {
    if simulate || !cfg!(feature = "hardware") {
        tracing::info!("using simulated rig");
        return Ok(Box::new(simulated_rig(cfg).with_free_run().channels()));
    }
    #[cfg(feature = "hardware")]
    {
        let src = ftcal_hardware::SerialLineSource::open(
            &cfg.serial.port,
            cfg.serial.baud_rate,
            std::time::Duration::from_millis(cfg.serial.read_timeout_ms),
        )
        .map_err(|e| CalError::Hardware(e.to_string()))?;
        Ok(Box::new(src))
    }
    #[cfg(not(feature = "hardware"))]
    {
        Err(CalError::Hardware("built without the `hardware` feature".into()).into())
    }
}

pub fn run_estimate(
    cfg: &Config,
    params: &Path,
    max_ticks: Option<u64>,
    simulate: bool,
    json_mode: bool,
    shutdown: &AtomicBool,
) -> eyre::Result<()> {
    let estimator = RealtimeEstimator::new(load_model(params)?);
    let mut opts = RunOptions::from(cfg);
    if max_ticks.is_some() {
        opts.max_ticks = max_ticks;
    }
    let mut source = open_line_source(cfg, simulate)?;

    let stdout = std::io::stdout();
    let stats = estimator.run(&mut source, &MonotonicClock::new(), &opts, shutdown, |est| {
        let mut out = stdout.lock();
        let line = if json_mode {
            json!({
                "seq": est.seq,
                "wrench": est.wrench,
                "raw": est.raw,
                "overloaded": est.overloaded,
            })
            .to_string()
        } else {
            let raw = est.raw.map(|v| format!("{v:>5}")).join("");
            format!(
                "{:>8} {} |{raw}{}",
                est.seq,
                format_wrench(&est.wrench),
                if est.overloaded { "  OVERLOAD" } else { "" }
            )
        };
        writeln!(out, "{line}").map_err(CalError::from)
    })?;
    tracing::debug!(?stats, "estimate finished");
    Ok(())
}
