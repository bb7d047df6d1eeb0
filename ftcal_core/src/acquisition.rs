//! Synchronized dual-source capture.
//!
//! One loop for every rig setup: per tick, take the reference wrench from a
//! `WrenchSource`, read one raw record, decode it, warn about overload, and record the
//! sample once the warm-up ticks are over. The output sink is owned by the caller and
//! passed in, so it is closed exactly once whatever way the loop ends.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use ftcal_traits::RawLineSource;
use ftcal_traits::clock::Clock;

use crate::dataset::DATASET_HEADER;
use crate::error::{CalError, Result, map_hw_error};
use crate::pacing::Pacing;
use crate::record::decode_raw_line;
use crate::sample::ChannelSample;
use crate::validity;
use crate::wrench_source::WrenchSource;

/// Destination of recorded samples.
pub trait SampleSink {
    fn record(&mut self, sample: &ChannelSample) -> Result<()>;
}

impl SampleSink for Vec<ChannelSample> {
    fn record(&mut self, sample: &ChannelSample) -> Result<()> {
        self.push(*sample);
        Ok(())
    }
}

/// Appends labeled samples to a dataset CSV, flushing after each one.
///
/// The header is written only when the file is empty, so a session can be resumed
/// into the same file. `finish` closes the file; dropping an unfinished writer
/// flushes and closes it as well.
pub struct CsvSampleWriter {
    path: PathBuf,
    wtr: Option<csv::Writer<File>>,
    written: u64,
}

impl CsvSampleWriter {
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let empty = file.metadata()?.len() == 0;
        let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        if empty {
            wtr.write_record(DATASET_HEADER)?;
            wtr.flush()?;
        }
        Ok(Self {
            path: path.to_path_buf(),
            wtr: Some(wtr),
            written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Samples written by this writer.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flush and close. Returns the number of samples written.
    pub fn finish(mut self) -> Result<u64> {
        if let Some(mut wtr) = self.wtr.take() {
            wtr.flush()?;
        }
        tracing::info!(file = %self.path.display(), samples = self.written, "capture file closed");
        Ok(self.written)
    }
}

impl SampleSink for CsvSampleWriter {
    fn record(&mut self, sample: &ChannelSample) -> Result<()> {
        let wtr = self
            .wtr
            .as_mut()
            .ok_or_else(|| CalError::Io(format!("{} already closed", self.path.display())))?;
        let wrench = sample
            .wrench
            .ok_or_else(|| CalError::Format("capture sample carries no reference wrench".into()))?;
        let mut row: Vec<String> = Vec::with_capacity(DATASET_HEADER.len());
        row.push(sample.timestamp.to_string());
        row.extend(wrench.iter().map(f64::to_string));
        row.extend(sample.raw.iter().map(i32::to_string));
        wtr.write_record(&row)?;
        wtr.flush()?;
        self.written += 1;
        Ok(())
    }
}

impl Drop for CsvSampleWriter {
    fn drop(&mut self) {
        if let Some(mut wtr) = self.wtr.take() {
            if let Err(e) = wtr.flush() {
                tracing::warn!(file = %self.path.display(), error = %e, "flush on close failed");
            }
            tracing::info!(
                file = %self.path.display(),
                samples = self.written,
                "capture file closed early"
            );
        }
    }
}

/// Tick counts of one capture run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcquisitionStats {
    pub ticks: u64,
    pub recorded: u64,
    pub malformed: u64,
    pub timeouts: u64,
    /// Recorded or warm-up ticks with at least one channel outside the trusted range
    pub overloaded: u64,
    pub interrupted: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct Acquisition {
    /// Leading ticks that are read but not recorded
    pub warmup_ticks: u64,
    /// Samples to record after warm-up
    pub samples: u64,
    pub pacing: Pacing,
    /// Per-line read timeout of the raw source
    pub read_timeout: Duration,
}

impl Default for Acquisition {
    fn default() -> Self {
        Self {
            warmup_ticks: 10,
            samples: 2000,
            pacing: Pacing::FixedDelay(Duration::from_millis(5)),
            read_timeout: Duration::from_secs(1),
        }
    }
}

impl Acquisition {
    /// Capture until `samples` are recorded or `shutdown` is set.
    ///
    /// Malformed records and timeouts cost one tick and are counted. Any other
    /// device or sink error ends the run and propagates.
    pub fn run<L, W, K, C>(
        &self,
        channels: &mut L,
        wrench_source: &mut W,
        sink: &mut K,
        clock: &C,
        shutdown: &AtomicBool,
    ) -> Result<AcquisitionStats>
    where
        L: RawLineSource + ?Sized,
        W: WrenchSource + ?Sized,
        K: SampleSink + ?Sized,
        C: Clock + ?Sized,
    {
        let mut stats = AcquisitionStats::default();
        let start = clock.now();
        tracing::info!(
            warmup = self.warmup_ticks,
            samples = self.samples,
            "acquisition started"
        );

        while stats.recorded < self.samples {
            if shutdown.load(Ordering::Relaxed) {
                stats.interrupted = true;
                tracing::info!(recorded = stats.recorded, "acquisition interrupted");
                break;
            }
            stats.ticks += 1;
            let tick = stats.ticks;
            let outcome = self.tick(channels, wrench_source, clock.secs_since(start));
            match outcome {
                Ok(sample) => {
                    if !validity::warn_if_overloaded(&sample.raw) {
                        stats.overloaded += 1;
                    }
                    if tick > self.warmup_ticks {
                        sink.record(&sample)?;
                        stats.recorded += 1;
                    }
                }
                Err(CalError::Format(reason)) => {
                    stats.malformed += 1;
                    tracing::warn!(tick, %reason, "skipping malformed record");
                }
                Err(CalError::Timeout) => {
                    stats.timeouts += 1;
                    tracing::warn!(tick, "device read timed out");
                }
                Err(e) => return Err(e),
            }
            self.pacing.after_tick(clock);
        }

        tracing::info!(
            ticks = stats.ticks,
            recorded = stats.recorded,
            malformed = stats.malformed,
            timeouts = stats.timeouts,
            overloaded = stats.overloaded,
            "acquisition finished"
        );
        Ok(stats)
    }

    fn tick<L, W>(&self, channels: &mut L, wrench_source: &mut W, timestamp: f64) -> Result<ChannelSample>
    where
        L: RawLineSource + ?Sized,
        W: WrenchSource + ?Sized,
    {
        let wrench = wrench_source.next_wrench()?;
        let line = channels
            .read_line(self.read_timeout)
            .map_err(|e| map_hw_error(&*e))?;
        let record = decode_raw_line(&line)?;
        Ok(ChannelSample::labeled(timestamp, wrench, record.raw))
    }
}
