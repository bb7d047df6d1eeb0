//! Polynomial feature expansion of a raw channel vector.

use ftcal_traits::layout::{MONOMIAL_PAIRS, N_CHANNELS, N_MONOMIALS};

/// Polynomial degree of the calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Degree {
    /// `C + L·s`
    Linear,
    /// `C + L·s + Q·m(s)` with the 36 unique monomials `s_i·s_j, i <= j`
    Quadratic,
}

impl Degree {
    pub fn n_features(self) -> usize {
        match self {
            Degree::Linear => N_CHANNELS,
            Degree::Quadratic => N_CHANNELS + N_MONOMIALS,
        }
    }

    pub fn from_u8(d: u8) -> Option<Self> {
        match d {
            1 => Some(Degree::Linear),
            2 => Some(Degree::Quadratic),
            _ => None,
        }
    }
}

/// The 36 products `s_i·s_j` in `MONOMIAL_PAIRS` order.
#[inline]
pub fn monomials(s: &[f64; N_CHANNELS]) -> [f64; N_MONOMIALS] {
    let mut out = [0.0; N_MONOMIALS];
    for (slot, &(i, j)) in out.iter_mut().zip(MONOMIAL_PAIRS.iter()) {
        *slot = s[i] * s[j];
    }
    out
}

/// Append the feature row of `s` for `degree` to `out`: the 8 channels, then the
/// monomials when quadratic.
pub fn expand_into(s: &[f64; N_CHANNELS], degree: Degree, out: &mut Vec<f64>) {
    out.extend_from_slice(s);
    if degree == Degree::Quadratic {
        out.extend_from_slice(&monomials(s));
    }
}
