//! Capture sessions, merging and the train/validation split.
//!
//! A session file carries the exact header `Timestamp,Fx,..,Mz,s0,..,s7`. Assembly
//! reads every session in order, drops non-numeric and overloaded rows, and rejects
//! whole files whose header differs. The result is immutable; `split` partitions it
//! by row index.

use std::path::{Path, PathBuf};

use ftcal_traits::layout::{N_AXES, N_CHANNELS};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::error::{CalError, Result};
use crate::sample::{ChannelSample, RawChannels, Wrench};
use crate::validity;

/// Column layout of every dataset file.
pub const DATASET_HEADER: [&str; 1 + N_AXES + N_CHANNELS] = [
    "Timestamp", "Fx", "Fy", "Fz", "Mx", "My", "Mz", "s0", "s1", "s2", "s3", "s4", "s5", "s6", "s7",
];

/// Ordered, labeled samples.
///
/// Assembled and filtered-loaded datasets hold only valid samples. A dataset from
/// `read_csv_unfiltered` keeps overloaded rows so evaluation sees the file as written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    samples: Vec<ChannelSample>,
}

/// Outcome of merging capture sessions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssemblyReport {
    pub included: Vec<PathBuf>,
    /// Rejected files with the reason (`SchemaMismatch`, or `Io` when unreadable)
    pub excluded: Vec<(PathBuf, CalError)>,
    pub rows_kept: usize,
    pub rows_dropped_non_numeric: usize,
    pub rows_dropped_overload: usize,
}

/// Disjoint partitions of one dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    /// Rows in the order they were drawn
    pub train: Dataset,
    /// Remaining rows in dataset order
    pub validation: Dataset,
    /// Dataset indices of `train`, same order
    pub train_indices: Vec<usize>,
    /// Dataset indices of `validation`, ascending
    pub validation_indices: Vec<usize>,
}

#[derive(Debug, Default)]
struct SessionRows {
    samples: Vec<ChannelSample>,
    non_numeric: usize,
    overload: usize,
}

fn schema_err(path: &Path, reason: impl Into<String>) -> CalError {
    CalError::SchemaMismatch {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

fn parse_f64(field: Option<&str>) -> Option<f64> {
    field
        .and_then(|f| f.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Channel readings are integers, possibly written as `512.0`.
fn parse_channel(field: Option<&str>) -> Option<i32> {
    let v = parse_f64(field)?;
    if v.fract() != 0.0 || v < f64::from(i32::MIN) || v > f64::from(i32::MAX) {
        return None;
    }
    Some(v as i32)
}

fn parse_row(rec: &csv::StringRecord) -> Option<ChannelSample> {
    let timestamp = parse_f64(rec.get(0))?;
    let mut wrench: Wrench = [0.0; N_AXES];
    for (k, w) in wrench.iter_mut().enumerate() {
        *w = parse_f64(rec.get(1 + k))?;
    }
    let mut raw: RawChannels = [0; N_CHANNELS];
    for (k, s) in raw.iter_mut().enumerate() {
        *s = parse_channel(rec.get(1 + N_AXES + k))?;
    }
    Some(ChannelSample::labeled(timestamp, wrench, raw))
}

fn open_session(path: &Path) -> Result<csv::Reader<std::fs::File>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| CalError::Io(format!("open {}: {e}", path.display())))?;
    let headers = rdr
        .headers()
        .map_err(|e| schema_err(path, format!("cannot read header: {e}")))?;
    let actual: Vec<&str> = headers.iter().map(str::trim).collect();
    if actual != DATASET_HEADER {
        return Err(schema_err(
            path,
            format!("expected header {}, got {}", DATASET_HEADER.join(","), actual.join(",")),
        ));
    }
    Ok(rdr)
}

fn read_session(path: &Path) -> Result<SessionRows> {
    let mut rdr = open_session(path)?;
    let mut out = SessionRows::default();
    for rec in rdr.records() {
        let Ok(rec) = rec else {
            out.non_numeric += 1;
            continue;
        };
        match parse_row(&rec) {
            Some(s) if validity::is_valid(&s.raw) => out.samples.push(s),
            Some(_) => out.overload += 1,
            None => out.non_numeric += 1,
        }
    }
    Ok(out)
}

impl Dataset {
    /// Keep the labeled samples that pass the overload policy, in order.
    pub fn from_samples(samples: impl IntoIterator<Item = ChannelSample>) -> Self {
        let samples = samples
            .into_iter()
            .filter(|s| s.wrench.is_some() && validity::is_valid(&s.raw))
            .collect();
        Self { samples }
    }

    /// Merge capture sessions in the given order.
    ///
    /// A file that cannot be read or whose header differs is excluded and counted;
    /// the merge continues with the remaining files.
    pub fn build<P: AsRef<Path>>(sessions: &[P]) -> (Self, AssemblyReport) {
        let mut report = AssemblyReport::default();
        let mut samples = Vec::new();
        for p in sessions {
            let path = p.as_ref();
            match read_session(path) {
                Ok(rows) => {
                    tracing::info!(
                        file = %path.display(),
                        rows = rows.samples.len(),
                        non_numeric = rows.non_numeric,
                        overload = rows.overload,
                        "session merged"
                    );
                    report.rows_dropped_non_numeric += rows.non_numeric;
                    report.rows_dropped_overload += rows.overload;
                    samples.extend(rows.samples);
                    report.included.push(path.to_path_buf());
                }
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "session excluded");
                    report.excluded.push((path.to_path_buf(), e));
                }
            }
        }
        report.rows_kept = samples.len();
        (Self { samples }, report)
    }

    /// Reload a persisted dataset. A header mismatch is an error here.
    pub fn read_csv(path: &Path) -> Result<Self> {
        let rows = read_session(path)?;
        if rows.non_numeric + rows.overload > 0 {
            tracing::warn!(
                file = %path.display(),
                non_numeric = rows.non_numeric,
                overload = rows.overload,
                "dropped rows while loading dataset"
            );
        }
        Ok(Self {
            samples: rows.samples,
        })
    }

    /// Load every row as written, overloaded ones included, for evaluation.
    ///
    /// Row `i` of the result is data row `i` of the file. A row that does not parse
    /// fails the load instead of being skipped, since skipping would shift every
    /// later index.
    pub fn read_csv_unfiltered(path: &Path) -> Result<Self> {
        let mut rdr = open_session(path)?;
        let mut samples = Vec::new();
        for (idx, rec) in rdr.records().enumerate() {
            // Header is line 1
            let line = idx + 2;
            let sample = rec
                .ok()
                .and_then(|r| parse_row(&r))
                .ok_or_else(|| schema_err(path, format!("line {line} is not a numeric row")))?;
            samples.push(sample);
        }
        let ds = Self { samples };
        let overloaded = ds.overloaded_rows();
        if overloaded > 0 {
            tracing::warn!(file = %path.display(), overloaded, "evaluating overloaded rows as given");
        }
        Ok(ds)
    }

    /// Rows whose raw channels fail the overload policy.
    pub fn overloaded_rows(&self) -> usize {
        self.samples.iter().filter(|s| !validity::is_valid(&s.raw)).count()
    }

    /// Persist with the dataset header; the file only appears once it is complete.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        ftcal_config::write_csv_atomically(path, |wtr| -> Result<()> {
            wtr.write_record(DATASET_HEADER)?;
            let mut row: Vec<String> = Vec::with_capacity(DATASET_HEADER.len());
            for (s, w) in self.labeled_samples() {
                row.clear();
                row.push(s.timestamp.to_string());
                row.extend(w.iter().map(f64::to_string));
                row.extend(s.raw.iter().map(i32::to_string));
                wtr.write_record(&row)?;
            }
            Ok(())
        })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[ChannelSample] {
        &self.samples
    }

    fn labeled_samples(&self) -> impl Iterator<Item = (&ChannelSample, &Wrench)> {
        self.samples
            .iter()
            .filter_map(|s| s.wrench.as_ref().map(|w| (s, w)))
    }

    /// `(raw, reference)` pairs in dataset order.
    pub fn labeled(&self) -> impl Iterator<Item = (&RawChannels, &Wrench)> {
        self.labeled_samples().map(|(s, w)| (&s.raw, w))
    }

    /// Draw `round(train_fraction * len)` rows uniformly without replacement.
    /// The same seed over the same dataset always gives the same split.
    pub fn split(&self, train_fraction: f64, seed: u64) -> Split {
        let n = self.samples.len();
        let n_train = ((train_fraction.clamp(0.0, 1.0) * n as f64).round() as usize).min(n);
        let mut rng = StdRng::seed_from_u64(seed);
        let train_indices: Vec<usize> = rand::seq::index::sample(&mut rng, n, n_train).into_vec();

        let mut in_train = vec![false; n];
        for &i in &train_indices {
            in_train[i] = true;
        }
        let validation_indices: Vec<usize> = (0..n).filter(|&i| !in_train[i]).collect();

        let pick = |idx: &[usize]| Dataset {
            samples: idx.iter().map(|&i| self.samples[i]).collect(),
        };
        tracing::debug!(rows = n, train = n_train, seed, "dataset split");
        Split {
            train: pick(&train_indices),
            validation: pick(&validation_indices),
            train_indices,
            validation_indices,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_fields_must_be_integral() {
        assert_eq!(parse_channel(Some("512")), Some(512));
        assert_eq!(parse_channel(Some(" 512.0 ")), Some(512));
        assert_eq!(parse_channel(Some("512.5")), None);
        assert_eq!(parse_channel(Some("abc")), None);
        assert_eq!(parse_channel(None), None);
    }

    #[test]
    fn non_finite_values_are_non_numeric() {
        assert_eq!(parse_f64(Some("NaN")), None);
        assert_eq!(parse_f64(Some("inf")), None);
        assert_eq!(parse_f64(Some("-1.5e3")), Some(-1500.0));
    }

    #[test]
    fn from_samples_keeps_only_valid_labeled() {
        let ds = Dataset::from_samples([
            ChannelSample::labeled(0.0, [0.0; 6], [500; 8]),
            ChannelSample::unlabeled(0.1, [500; 8]),
            ChannelSample::labeled(0.2, [0.0; 6], [10; 8]),
        ]);
        assert_eq!(ds.len(), 1);
    }
}
