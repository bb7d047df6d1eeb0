//! Multi-output linear regression with an unpenalized intercept.
//!
//! Features and targets are centered first; the slope matrix `B` (p x 6) is solved on
//! the centered data and the intercept recovered as `C = ȳ - x̄·B`, so no method ever
//! shrinks `C`.

use nalgebra::{DMatrix, DVector};

use crate::error::{CalError, Result};

/// Regression method and its hyper-parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Method {
    /// Least squares, minimum-norm solution when rank-deficient
    Ordinary,
    /// `‖Y - C - XB‖² + alpha·‖B‖²`
    Ridge { alpha: f64 },
    /// `(1/2n)‖y - c - Xβ‖² + alpha·‖β‖₁` per output, cyclic coordinate descent
    Lasso { alpha: f64, max_iter: u32, tol: f64 },
}

impl Method {
    pub fn name(&self) -> &'static str {
        match self {
            Method::Ordinary => "ordinary",
            Method::Ridge { .. } => "ridge",
            Method::Lasso { .. } => "lasso",
        }
    }
}

/// Result of a fit in matrix form.
#[derive(Debug, Clone)]
pub struct Solution {
    /// One intercept per output
    pub intercept: DVector<f64>,
    /// Slopes, one row per feature and one column per output
    pub coefs: DMatrix<f64>,
}

struct Centered {
    x: DMatrix<f64>,
    y: DMatrix<f64>,
    x_mean: DVector<f64>,
    y_mean: DVector<f64>,
}

fn center(mut x: DMatrix<f64>, mut y: DMatrix<f64>) -> Centered {
    let x_mean = x.row_mean().transpose();
    let y_mean = y.row_mean().transpose();
    for (j, mut col) in x.column_iter_mut().enumerate() {
        col.add_scalar_mut(-x_mean[j]);
    }
    for (j, mut col) in y.column_iter_mut().enumerate() {
        col.add_scalar_mut(-y_mean[j]);
    }
    Centered {
        x,
        y,
        x_mean,
        y_mean,
    }
}

/// Fit `y ≈ intercept + x·coefs`. `x` is n x p, `y` is n x k, `n >= 1`.
pub fn solve(x: DMatrix<f64>, y: DMatrix<f64>, method: &Method) -> Result<Solution> {
    if x.nrows() != y.nrows() || x.nrows() == 0 {
        return Err(CalError::Solver(format!(
            "design matrix has {} rows, targets {}",
            x.nrows(),
            y.nrows()
        )));
    }
    let c = center(x, y);
    let coefs = match *method {
        Method::Ordinary => ordinary(&c.x, &c.y)?,
        Method::Ridge { alpha } => ridge(&c.x, &c.y, alpha)?,
        Method::Lasso {
            alpha,
            max_iter,
            tol,
        } => lasso(&c.x, &c.y, alpha, max_iter, tol),
    };
    if coefs.iter().any(|v| !v.is_finite()) {
        return Err(CalError::Solver("non-finite coefficient".into()));
    }
    let intercept = &c.y_mean - coefs.tr_mul(&c.x_mean);
    Ok(Solution { intercept, coefs })
}

fn ordinary(x: &DMatrix<f64>, y: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    // Column scaling keeps raw channels (~1e2) and monomials (~1e5) on one footing for
    // the singular-value cutoff.
    let scale: Vec<f64> = x
        .column_iter()
        .map(|col| {
            let norm = col.norm();
            if norm > 0.0 { norm } else { 1.0 }
        })
        .collect();
    let mut xs = x.clone();
    for (j, mut col) in xs.column_iter_mut().enumerate() {
        col.unscale_mut(scale[j]);
    }

    let svd = xs.svd(true, true);
    let max_sv = svd.singular_values.max();
    let eps = f64::EPSILON * (x.nrows().max(x.ncols()) as f64) * max_sv;
    let mut b = svd.solve(y, eps).map_err(|e| CalError::Solver(e.to_string()))?;
    for (j, mut row) in b.row_iter_mut().enumerate() {
        row.unscale_mut(scale[j]);
    }
    Ok(b)
}

/// Closed form through the SVD of the centered features: `B = V·diag(σ/(σ²+α))·Uᵀ·Y`.
fn ridge(x: &DMatrix<f64>, y: &DMatrix<f64>, alpha: f64) -> Result<DMatrix<f64>> {
    let svd = x.clone().svd(true, true);
    let u = svd
        .u
        .ok_or_else(|| CalError::Solver("SVD did not produce U".into()))?;
    let v_t = svd
        .v_t
        .ok_or_else(|| CalError::Solver("SVD did not produce Vᵀ".into()))?;
    let mut uty = u.tr_mul(y);
    for (i, s) in svd.singular_values.iter().enumerate() {
        let f = s / (s * s + alpha);
        uty.row_mut(i).scale_mut(f);
    }
    Ok(v_t.tr_mul(&uty))
}

#[inline]
fn soft_threshold(z: f64, gamma: f64) -> f64 {
    if z > gamma {
        z - gamma
    } else if z < -gamma {
        z + gamma
    } else {
        0.0
    }
}

fn lasso(x: &DMatrix<f64>, y: &DMatrix<f64>, alpha: f64, max_iter: u32, tol: f64) -> DMatrix<f64> {
    let n = x.nrows() as f64;
    let p = x.ncols();
    let col_sq: Vec<f64> = x.column_iter().map(|c| c.norm_squared() / n).collect();
    let mut coefs = DMatrix::zeros(p, y.ncols());

    for out in 0..y.ncols() {
        let mut beta = DVector::<f64>::zeros(p);
        let mut resid: DVector<f64> = y.column(out).into_owned();
        let mut converged = false;
        let mut sweeps = 0;
        while sweeps < max_iter {
            sweeps += 1;
            let mut max_delta = 0.0f64;
            let mut max_beta = 0.0f64;
            for j in 0..p {
                let old = beta[j];
                let new = if col_sq[j] > 0.0 {
                    let rho = x.column(j).dot(&resid) / n + col_sq[j] * old;
                    soft_threshold(rho, alpha) / col_sq[j]
                } else {
                    0.0
                };
                let delta = new - old;
                if delta != 0.0 {
                    resid.axpy(-delta, &x.column(j), 1.0);
                    beta[j] = new;
                }
                max_delta = max_delta.max(delta.abs());
                max_beta = max_beta.max(new.abs());
            }
            if max_delta <= tol * max_beta || max_beta == 0.0 {
                converged = true;
                break;
            }
        }
        if !converged {
            tracing::warn!(output = out, sweeps, "lasso did not converge; raise max_iter or tol");
        }
        coefs.set_column(out, &beta);
    }
    coefs
}
