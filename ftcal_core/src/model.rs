//! Polynomial calibration model: raw channels to wrench.
//!
//! `W = C + L·s` (linear) or `W = C + L·s + Q·m(s)` (quadratic), where `m(s)` are the
//! monomials in `MONOMIAL_PAIRS` order. A fitted model is independent of its training
//! data and never changes after construction.

use ftcal_traits::layout::{N_AXES, N_CHANNELS, N_MONOMIALS};
use nalgebra::DMatrix;

use crate::dataset::Dataset;
use crate::error::{CalError, Result};
use crate::features::{Degree, expand_into, monomials};
use crate::sample::{RawChannels, Wrench, raw_to_f64};
use crate::solver::{self, Method};

pub type Linear = [[f64; N_CHANNELS]; N_AXES];
pub type Quadratic = [[f64; N_MONOMIALS]; N_AXES];

#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationModel {
    c: Wrench,
    l: Linear,
    q: Option<Box<Quadratic>>,
}

impl CalibrationModel {
    pub fn from_parts(c: Wrench, l: Linear, q: Option<Quadratic>) -> Self {
        Self {
            c,
            l,
            q: q.map(Box::new),
        }
    }

    /// Fit on every row of `train`.
    ///
    /// Fails with `InsufficientData` when there are fewer rows than features (8 or 44),
    /// and with `Solver` on a numerical failure. No partial model is returned.
    pub fn fit(train: &Dataset, degree: Degree, method: &Method) -> Result<Self> {
        let n = train.len();
        let p = degree.n_features();
        if n < p {
            return Err(CalError::InsufficientData {
                rows: n,
                features: p,
            });
        }

        let mut x_rows = Vec::with_capacity(n * p);
        let mut y_rows = Vec::with_capacity(n * N_AXES);
        for (raw, w) in train.labeled() {
            expand_into(&raw_to_f64(raw), degree, &mut x_rows);
            y_rows.extend_from_slice(w);
        }
        let x = DMatrix::from_row_slice(n, p, &x_rows);
        let y = DMatrix::from_row_slice(n, N_AXES, &y_rows);

        let sol = solver::solve(x, y, method)?;

        let mut c = [0.0; N_AXES];
        let mut l = [[0.0; N_CHANNELS]; N_AXES];
        for axis in 0..N_AXES {
            c[axis] = sol.intercept[axis];
            for k in 0..N_CHANNELS {
                l[axis][k] = sol.coefs[(k, axis)];
            }
        }
        let q = (degree == Degree::Quadratic).then(|| {
            let mut q = [[0.0; N_MONOMIALS]; N_AXES];
            for (axis, row) in q.iter_mut().enumerate() {
                for (k, v) in row.iter_mut().enumerate() {
                    *v = sol.coefs[(N_CHANNELS + k, axis)];
                }
            }
            Box::new(q)
        });

        let model = Self { c, l, q };
        tracing::info!(
            rows = n,
            features = p,
            method = method.name(),
            train_rmse = ?model.rmse(train),
            "calibration fitted"
        );
        Ok(model)
    }

    pub fn degree(&self) -> Degree {
        if self.q.is_some() {
            Degree::Quadratic
        } else {
            Degree::Linear
        }
    }

    pub fn c(&self) -> &Wrench {
        &self.c
    }

    pub fn l(&self) -> &Linear {
        &self.l
    }

    pub fn q(&self) -> Option<&Quadratic> {
        self.q.as_deref()
    }

    /// Wrench estimate for one raw vector. No validity filtering is applied.
    #[inline]
    pub fn estimate(&self, raw: &RawChannels) -> Wrench {
        let s = raw_to_f64(raw);
        let mut w = self.c;
        for (axis, out) in w.iter_mut().enumerate() {
            *out += dot(&self.l[axis], &s);
        }
        if let Some(q) = &self.q {
            let m = monomials(&s);
            for (axis, out) in w.iter_mut().enumerate() {
                *out += dot(&q[axis], &m);
            }
        }
        w
    }

    /// Per-axis root mean square residual over `data`.
    pub fn rmse(&self, data: &Dataset) -> Wrench {
        let mut acc = [0.0; N_AXES];
        let mut n = 0usize;
        for (raw, w) in data.labeled() {
            let est = self.estimate(raw);
            for axis in 0..N_AXES {
                let e = est[axis] - w[axis];
                acc[axis] += e * e;
            }
            n += 1;
        }
        if n > 0 {
            for a in &mut acc {
                *a = (*a / n as f64).sqrt();
            }
        }
        acc
    }
}

#[inline]
fn dot<const N: usize>(a: &[f64; N], b: &[f64; N]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
