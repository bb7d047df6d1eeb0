//! Held-out error analysis of a fitted model.
//!
//! Errors are `estimate - reference` per axis. The validation rows are used as
//! given, with no filtering here: `row_index` is the row's position in the dataset.

use std::path::Path;

use ftcal_traits::layout::{AXIS_NAMES, N_AXES};

use crate::dataset::Dataset;
use crate::error::Result;
use crate::model::CalibrationModel;
use crate::sample::Wrench;

/// Error of one validation row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ErrorRow {
    /// Position of the row inside the validation dataset
    pub row_index: usize,
    pub errors: Wrench,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorReport {
    pub rows: Vec<ErrorRow>,
}

/// Summary of one axis' error distribution.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AxisStats {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub rms: f64,
    pub max_abs: f64,
}

/// Equal-width buckets over `[lo, hi]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub lo: f64,
    pub hi: f64,
    pub counts: Vec<usize>,
}

impl Histogram {
    pub fn bin_width(&self) -> f64 {
        if self.counts.is_empty() {
            0.0
        } else {
            (self.hi - self.lo) / self.counts.len() as f64
        }
    }
}

pub fn evaluate(model: &CalibrationModel, validation: &Dataset) -> ErrorReport {
    let rows = validation
        .labeled()
        .enumerate()
        .map(|(row_index, (raw, reference))| {
            let est = model.estimate(raw);
            let mut errors = [0.0; N_AXES];
            for axis in 0..N_AXES {
                errors[axis] = est[axis] - reference[axis];
            }
            ErrorRow { row_index, errors }
        })
        .collect();
    ErrorReport { rows }
}

/// Header of the persisted error table.
pub fn error_header() -> Vec<String> {
    let mut cols = vec!["row_index".to_string()];
    cols.extend(AXIS_NAMES.iter().map(|a| format!("{a}_error")));
    cols
}

impl ErrorReport {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn axis_values(&self, axis: usize) -> impl Iterator<Item = f64> + '_ {
        self.rows.iter().map(move |r| r.errors[axis])
    }

    /// Per-axis statistics; all zeros for an empty report.
    pub fn summary(&self) -> [AxisStats; N_AXES] {
        let mut out = [AxisStats::default(); N_AXES];
        if self.rows.is_empty() {
            return out;
        }
        let n = self.rows.len() as f64;
        for (axis, st) in out.iter_mut().enumerate() {
            let mut sum = 0.0;
            let mut sq = 0.0;
            let mut min = f64::INFINITY;
            let mut max = f64::NEG_INFINITY;
            for e in self.axis_values(axis) {
                sum += e;
                sq += e * e;
                min = min.min(e);
                max = max.max(e);
            }
            *st = AxisStats {
                mean: sum / n,
                min,
                max,
                rms: (sq / n).sqrt(),
                max_abs: min.abs().max(max.abs()),
            };
        }
        out
    }

    /// Histogram of one axis over the symmetric range `[-max_abs, max_abs]`.
    pub fn histogram(&self, axis: usize, bins: usize) -> Histogram {
        let bins = bins.max(1);
        let max_abs = self
            .axis_values(axis)
            .fold(0.0f64, |m, e| m.max(e.abs()));
        let mut counts = vec![0usize; bins];
        if max_abs == 0.0 {
            // Every error is zero: everything lands in the middle bucket.
            counts[bins / 2] = self.rows.len();
            return Histogram {
                lo: 0.0,
                hi: 0.0,
                counts,
            };
        }
        let width = 2.0 * max_abs / bins as f64;
        for e in self.axis_values(axis) {
            let b = ((e + max_abs) / width).floor() as usize;
            counts[b.min(bins - 1)] += 1;
        }
        Histogram {
            lo: -max_abs,
            hi: max_abs,
            counts,
        }
    }

    /// Persist as `row_index,Fx_error,..,Mz_error`; the file only appears once complete.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        ftcal_config::write_csv_atomically(path, |wtr| -> Result<()> {
            wtr.write_record(error_header())?;
            let mut row: Vec<String> = Vec::with_capacity(1 + N_AXES);
            for r in &self.rows {
                row.clear();
                row.push(r.row_index.to_string());
                row.extend(r.errors.iter().map(f64::to_string));
                wtr.write_record(&row)?;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(values: &[f64]) -> ErrorReport {
        ErrorReport {
            rows: values
                .iter()
                .enumerate()
                .map(|(i, &v)| ErrorRow {
                    row_index: i,
                    errors: [v, 0.0, 0.0, 0.0, 0.0, 0.0],
                })
                .collect(),
        }
    }

    #[test]
    fn summary_statistics() {
        let s = report(&[1.0, -3.0, 2.0]).summary();
        assert!((s[0].mean - 0.0).abs() < 1e-12);
        assert_eq!(s[0].min, -3.0);
        assert_eq!(s[0].max, 2.0);
        assert_eq!(s[0].max_abs, 3.0);
        assert!((s[0].rms - (14.0f64 / 3.0).sqrt()).abs() < 1e-12);
        assert_eq!(s[1], AxisStats::default());
    }

    #[test]
    fn histogram_is_symmetric_and_counts_everything() {
        let h = report(&[-3.0, -1.0, 0.5, 3.0]).histogram(0, 30);
        assert_eq!(h.lo, -3.0);
        assert_eq!(h.hi, 3.0);
        assert_eq!(h.counts.len(), 30);
        assert_eq!(h.counts.iter().sum::<usize>(), 4);
        assert_eq!(h.counts[0], 1);
        assert_eq!(h.counts[29], 1);
    }

    #[test]
    fn histogram_of_zero_errors() {
        let h = report(&[0.0, 0.0]).histogram(1, 30);
        assert_eq!(h.counts[15], 2);
    }

    #[test]
    fn header_names() {
        assert_eq!(
            error_header().join(","),
            "row_index,Fx_error,Fy_error,Fz_error,Mx_error,My_error,Mz_error"
        );
    }
}
