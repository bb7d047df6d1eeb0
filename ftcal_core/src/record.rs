//! Decoding of the two instrument wire formats.
//!
//! Raw sensor line (whitespace separated, newline terminated):
//! `<tag> <seq> <error_mask> s0 s1 s2 s3 s4 s5 s6 s7`
//!
//! Reference frame: six little-endian `f32` (`Fx..Mz`) at fixed per-device offsets.

use ftcal_traits::layout::{N_AXES, N_CHANNELS};

use crate::error::{CalError, Result};
use crate::sample::{RawChannels, Wrench};

const RECORD_TOKENS: usize = 3 + N_CHANNELS;

/// One decoded serial record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub tag: String,
    pub seq: i64,
    pub error_mask: i64,
    pub raw: RawChannels,
}

/// Decode one serial record. Fails with `CalError::Format` unless the line splits into
/// exactly 11 tokens and every token after the tag is an integer.
pub fn decode_raw_line(line: &str) -> Result<RawRecord> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() != RECORD_TOKENS {
        return Err(CalError::Format(format!(
            "expected {RECORD_TOKENS} tokens, got {}: {:?}",
            tokens.len(),
            line.trim_end()
        )));
    }
    let int = |idx: usize| -> Result<i64> {
        tokens[idx].parse::<i64>().map_err(|e| {
            CalError::Format(format!("token {} '{}' is not an integer ({e})", idx + 1, tokens[idx]))
        })
    };

    let seq = int(1)?;
    let error_mask = int(2)?;
    let mut raw = [0i32; N_CHANNELS];
    for (k, slot) in raw.iter_mut().enumerate() {
        let v = int(3 + k)?;
        *slot = i32::try_from(v)
            .map_err(|_| CalError::Format(format!("channel s{k} value {v} out of range")))?;
    }

    Ok(RawRecord {
        tag: tokens[0].to_string(),
        seq,
        error_mask,
        raw,
    })
}

/// Byte offsets of `Fx..Mz` inside a reference process-data frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    pub offsets: [usize; N_AXES],
}

impl Default for FrameLayout {
    /// Layout of the six-axis EtherCAT sensor used on the calibration rig.
    fn default() -> Self {
        Self {
            offsets: [5, 9, 13, 17, 21, 25],
        }
    }
}

impl FrameLayout {
    /// Smallest frame that holds every field.
    pub fn min_frame_len(&self) -> usize {
        self.offsets.iter().max().map_or(0, |o| o + 4)
    }

    pub fn decode(&self, frame: &[u8]) -> Result<Wrench> {
        let mut w = [0.0f64; N_AXES];
        for (axis, &off) in self.offsets.iter().enumerate() {
            let bytes: [u8; 4] = frame
                .get(off..off + 4)
                .and_then(|b| b.try_into().ok())
                .ok_or_else(|| {
                    CalError::Format(format!(
                        "reference frame of {} bytes has no field at offset {off}",
                        frame.len()
                    ))
                })?;
            w[axis] = f64::from(f32::from_le_bytes(bytes));
        }
        Ok(w)
    }

    /// Inverse of `decode`, used by simulated reference sensors and tests.
    pub fn encode(&self, wrench: &Wrench, frame_len: usize) -> Vec<u8> {
        let mut frame = vec![0u8; frame_len.max(self.min_frame_len())];
        for (axis, &off) in self.offsets.iter().enumerate() {
            frame[off..off + 4].copy_from_slice(&(wrench[axis] as f32).to_le_bytes());
        }
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_roundtrip_at_default_offsets() {
        let layout = FrameLayout::default();
        assert_eq!(layout.min_frame_len(), 29);
        let w = [1.5, -2.0, 9.125, 0.25, -0.5, 0.0];
        let frame = layout.encode(&w, 40);
        assert_eq!(frame.len(), 40);
        assert_eq!(layout.decode(&frame).unwrap(), w);
    }

    #[test]
    fn short_frame_is_a_format_error() {
        let layout = FrameLayout::default();
        let err = layout.decode(&[0u8; 20]).unwrap_err();
        assert!(matches!(err, CalError::Format(_)));
    }
}
