//! Live wrench estimation from the raw record stream.
//!
//! Each output depends only on the current record: the estimator keeps no filter
//! state between ticks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use ftcal_traits::RawLineSource;
use ftcal_traits::clock::Clock;

use crate::error::{CalError, Result, map_hw_error};
use crate::model::CalibrationModel;
use crate::pacing::Pacing;
use crate::record::decode_raw_line;
use crate::sample::{RawChannels, Wrench};
use crate::validity;

/// One live output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    pub seq: i64,
    pub raw: RawChannels,
    pub wrench: Wrench,
    /// At least one channel was outside the trusted range; the wrench is degraded
    pub overloaded: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub ticks: u64,
    pub emitted: u64,
    pub malformed: u64,
    pub timeouts: u64,
    pub overloaded: u64,
    pub interrupted: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub pacing: Pacing,
    /// Stop after this many ticks; `None` runs until `shutdown`
    pub max_ticks: Option<u64>,
    pub read_timeout: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            pacing: Pacing::FixedDelay(Duration::from_millis(5)),
            max_ticks: None,
            read_timeout: Duration::from_secs(1),
        }
    }
}

pub struct RealtimeEstimator {
    model: CalibrationModel,
}

impl RealtimeEstimator {
    pub fn new(model: CalibrationModel) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &CalibrationModel {
        &self.model
    }

    /// Decode one record and estimate its wrench.
    pub fn process_line(&self, line: &str) -> Result<Estimate> {
        let rec = decode_raw_line(line)?;
        let overloaded = !validity::is_valid(&rec.raw);
        Ok(Estimate {
            seq: rec.seq,
            raw: rec.raw,
            wrench: self.model.estimate(&rec.raw),
            overloaded,
        })
    }

    /// Pull records until `max_ticks` or `shutdown`, handing each estimate to
    /// `on_estimate`. Malformed records and timeouts are skipped; source errors and
    /// errors returned by `on_estimate` end the run.
    pub fn run<L, C, F>(
        &self,
        source: &mut L,
        clock: &C,
        opts: &RunOptions,
        shutdown: &AtomicBool,
        mut on_estimate: F,
    ) -> Result<RunStats>
    where
        L: RawLineSource + ?Sized,
        C: Clock + ?Sized,
        F: FnMut(&Estimate) -> Result<()>,
    {
        let mut stats = RunStats::default();
        loop {
            if opts.max_ticks.is_some_and(|m| stats.ticks >= m) {
                break;
            }
            if shutdown.load(Ordering::Relaxed) {
                stats.interrupted = true;
                break;
            }
            stats.ticks += 1;
            let line = source.read_line(opts.read_timeout).map_err(|e| map_hw_error(&*e));
            match line.and_then(|l| self.process_line(&l)) {
                Ok(est) => {
                    if est.overloaded {
                        stats.overloaded += 1;
                        validity::warn_if_overloaded(&est.raw);
                    }
                    on_estimate(&est)?;
                    stats.emitted += 1;
                }
                Err(CalError::Format(reason)) => {
                    stats.malformed += 1;
                    tracing::warn!(tick = stats.ticks, %reason, "skipping malformed record");
                }
                Err(CalError::Timeout) => {
                    stats.timeouts += 1;
                    tracing::warn!(tick = stats.ticks, "sensor read timed out");
                }
                Err(e) => return Err(e),
            }
            opts.pacing.after_tick(clock);
        }
        tracing::info!(
            ticks = stats.ticks,
            emitted = stats.emitted,
            malformed = stats.malformed,
            overloaded = stats.overloaded,
            interrupted = stats.interrupted,
            "estimation stopped"
        );
        Ok(stats)
    }
}
