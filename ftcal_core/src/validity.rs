//! Overload policy for raw channel vectors.
//!
//! One implementation for every call site. Acquisition and the real-time path use
//! it to flag a tick (and keep it), dataset assembly uses it to drop rows, so what
//! trains the model and what a live consumer is warned about can never disagree.

use crate::sample::RawChannels;

/// Lowest trusted channel reading (inclusive).
pub const OVERLOAD_LOWER: i32 = 50;
/// Highest trusted channel reading (inclusive).
pub const OVERLOAD_UPPER: i32 = 950;

/// True when every channel lies in `[OVERLOAD_LOWER, OVERLOAD_UPPER]`.
#[inline]
pub fn is_valid(raw: &RawChannels) -> bool {
    raw.iter()
        .all(|v| (OVERLOAD_LOWER..=OVERLOAD_UPPER).contains(v))
}

/// Indices of the channels outside the trusted range, in channel order.
pub fn overloaded_channels(raw: &RawChannels) -> impl Iterator<Item = usize> + '_ {
    raw.iter()
        .enumerate()
        .filter(|(_, v)| !(OVERLOAD_LOWER..=OVERLOAD_UPPER).contains(*v))
        .map(|(i, _)| i)
}

/// Emit one warning per saturated channel. Returns whether the vector was valid.
pub fn warn_if_overloaded(raw: &RawChannels) -> bool {
    let mut valid = true;
    for ch in overloaded_channels(raw) {
        valid = false;
        tracing::warn!(channel = ch, value = raw[ch], "force overload");
    }
    valid
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_are_inclusive() {
        assert!(is_valid(&[50; 8]));
        assert!(is_valid(&[950; 8]));
        assert!(!is_valid(&[49, 500, 500, 500, 500, 500, 500, 500]));
        assert!(!is_valid(&[500, 500, 500, 500, 500, 500, 500, 951]));
    }

    #[test]
    fn lists_offending_channels_in_order() {
        let raw = [10, 500, 999, 500, 500, 500, 500, 0];
        let bad: Vec<usize> = overloaded_channels(&raw).collect();
        assert_eq!(bad, vec![0, 2, 7]);
        assert!(!warn_if_overloaded(&raw));
        assert!(warn_if_overloaded(&[500; 8]));
    }
}
