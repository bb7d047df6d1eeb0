//! Channel/axis layout and the quadratic monomial ordering.
//!
//! `MONOMIAL_PAIRS` is the single definition of the 36 quadratic terms. Feature
//! expansion, model evaluation, and the `Q_s{i}s{j}` parameter columns all read it,
//! so a persisted model can never be reloaded with its coefficients shifted.

/// Number of raw sensor channels.
pub const N_CHANNELS: usize = 8;
/// Number of wrench axes.
pub const N_AXES: usize = 6;
/// Unique products `s_i * s_j` with `i <= j`.
pub const N_MONOMIALS: usize = N_CHANNELS * (N_CHANNELS + 1) / 2;

pub const CHANNEL_NAMES: [&str; N_CHANNELS] = ["s0", "s1", "s2", "s3", "s4", "s5", "s6", "s7"];
pub const AXIS_NAMES: [&str; N_AXES] = ["Fx", "Fy", "Fz", "Mx", "My", "Mz"];

/// `(i, j)` index pairs, increasing `i`, then increasing `j >= i`.
pub const MONOMIAL_PAIRS: [(usize, usize); N_MONOMIALS] = monomial_pairs();

const fn monomial_pairs() -> [(usize, usize); N_MONOMIALS] {
    let mut out = [(0usize, 0usize); N_MONOMIALS];
    let mut k = 0;
    let mut i = 0;
    while i < N_CHANNELS {
        let mut j = i;
        while j < N_CHANNELS {
            out[k] = (i, j);
            k += 1;
            j += 1;
        }
        i += 1;
    }
    out
}

/// Position of `s_i * s_j` inside `MONOMIAL_PAIRS` (order of the arguments is irrelevant).
pub const fn monomial_index(i: usize, j: usize) -> usize {
    let (i, j) = if i <= j { (i, j) } else { (j, i) };
    i * N_CHANNELS + j - i * (i + 1) / 2
}

/// Parameter-file column name for the quadratic term at position `k`.
pub fn monomial_column(k: usize) -> String {
    let (i, j) = MONOMIAL_PAIRS[k];
    format!("Q_s{i}s{j}")
}
