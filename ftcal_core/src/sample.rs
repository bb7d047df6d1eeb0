//! One synchronized reading of both instruments.

use ftcal_traits::layout::{N_AXES, N_CHANNELS};

/// Raw readings of the 8 sensor channels, indexed by physical channel.
pub type RawChannels = [i32; N_CHANNELS];

/// `[Fx, Fy, Fz, Mx, My, Mz]` in N and Nm.
pub type Wrench = [f64; N_AXES];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelSample {
    /// Seconds since the start of the acquisition run
    pub timestamp: f64,
    pub raw: RawChannels,
    /// Reference wrench; `None` for unlabeled inference input
    pub wrench: Option<Wrench>,
}

impl ChannelSample {
    pub fn labeled(timestamp: f64, wrench: Wrench, raw: RawChannels) -> Self {
        Self {
            timestamp,
            raw,
            wrench: Some(wrench),
        }
    }

    pub fn unlabeled(timestamp: f64, raw: RawChannels) -> Self {
        Self {
            timestamp,
            raw,
            wrench: None,
        }
    }

    /// Raw channels widened to `f64` for the model.
    #[inline]
    pub fn raw_f64(&self) -> [f64; N_CHANNELS] {
        raw_to_f64(&self.raw)
    }
}

#[inline]
pub fn raw_to_f64(raw: &RawChannels) -> [f64; N_CHANNELS] {
    raw.map(f64::from)
}
