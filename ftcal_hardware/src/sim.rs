//! Simulated calibration rig.
//!
//! The reference half and the channel half share one load. Each reference frame
//! advances the load along a slow multi-axis sweep; each raw line reports the current
//! load through a fixed channel gain matrix, rounded to integer counts.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use ftcal_traits::layout::{N_AXES, N_CHANNELS};
use ftcal_traits::{BoxError, RawLineSource, ReferenceSensor};

/// Counts at zero load.
pub const ZERO_COUNTS: f64 = 500.0;

/// Sweep amplitude per axis: ±5 N on forces, ±0.5 Nm on torques.
const AMPLITUDE: [f64; N_AXES] = [5.0, 5.0, 5.0, 0.5, 0.5, 0.5];
/// Sweep period in ticks per axis, pairwise distinct so the axes decorrelate.
const PERIOD: [f64; N_AXES] = [97.0, 131.0, 173.0, 211.0, 251.0, 293.0];

struct RigState {
    tick: u64,
    seq: i64,
    load: [f64; N_AXES],
    hold: bool,
    free_run: bool,
    gain: [[f64; N_AXES]; N_CHANNELS],
    offsets: [usize; N_AXES],
    frame_len: usize,
    malformed_every: Option<u64>,
}

/// Counts per N on force axes and per Nm on torque axes, mixed across channels.
fn default_gain() -> [[f64; N_AXES]; N_CHANNELS] {
    let mut g = [[0.0; N_AXES]; N_CHANNELS];
    for (k, row) in g.iter_mut().enumerate() {
        for (a, v) in row.iter_mut().enumerate() {
            let per_unit = if a < 3 { 10.0 } else { 100.0 };
            *v = per_unit * ((k as f64 + 1.0) * (a as f64 + 0.5)).cos();
        }
    }
    g
}

impl RigState {
    fn sweep(&mut self) {
        self.tick += 1;
        if self.hold {
            return;
        }
        let t = self.tick as f64;
        for a in 0..N_AXES {
            self.load[a] = AMPLITUDE[a] * (2.0 * std::f64::consts::PI * t / PERIOD[a]).sin();
        }
    }

    fn counts(&self) -> [i32; N_CHANNELS] {
        let mut raw = [0i32; N_CHANNELS];
        for (k, out) in raw.iter_mut().enumerate() {
            let v: f64 = ZERO_COUNTS
                + self.gain[k]
                    .iter()
                    .zip(&self.load)
                    .map(|(g, w)| g * w)
                    .sum::<f64>();
            *out = v.round().clamp(0.0, 1023.0) as i32;
        }
        raw
    }
}

/// Handle that creates the two device halves of one simulated rig.
#[derive(Clone)]
pub struct SimulatedRig {
    state: Rc<RefCell<RigState>>,
}

impl Default for SimulatedRig {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedRig {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(RigState {
                tick: 0,
                seq: 0,
                load: [0.0; N_AXES],
                hold: false,
                free_run: false,
                gain: default_gain(),
                offsets: [5, 9, 13, 17, 21, 25],
                frame_len: 32,
                malformed_every: None,
            })),
        }
    }

    /// Byte offsets of `Fx..Mz` in the emitted reference frames.
    pub fn with_frame_offsets(self, offsets: [usize; N_AXES]) -> Self {
        {
            let mut s = self.state.borrow_mut();
            s.offsets = offsets;
            s.frame_len = offsets.iter().max().map_or(0, |o| o + 4).max(s.frame_len);
        }
        self
    }

    /// Emit a truncated record every `n` lines.
    pub fn with_malformed_every(self, n: u64) -> Self {
        self.state.borrow_mut().malformed_every = (n > 0).then_some(n);
        self
    }

    /// Advance the sweep on every raw line, for runs without a reference read.
    pub fn with_free_run(self) -> Self {
        self.state.borrow_mut().free_run = true;
        self
    }

    /// Replace the sweep by a constant load (dead-weight setups).
    pub fn hold_load(&self, load: [f64; N_AXES]) {
        let mut s = self.state.borrow_mut();
        s.load = load;
        s.hold = true;
    }

    pub fn load(&self) -> [f64; N_AXES] {
        self.state.borrow().load
    }

    /// Channel counts of the current load.
    pub fn counts(&self) -> [i32; N_CHANNELS] {
        self.state.borrow().counts()
    }

    pub fn reference(&self) -> SimulatedReference {
        SimulatedReference {
            state: Rc::clone(&self.state),
        }
    }

    pub fn channels(&self) -> SimulatedChannels {
        SimulatedChannels {
            state: Rc::clone(&self.state),
        }
    }
}

/// Reference half: one process-data frame per call, advancing the load.
pub struct SimulatedReference {
    state: Rc<RefCell<RigState>>,
}

impl ReferenceSensor for SimulatedReference {
    fn read_frame(&mut self, _timeout: Duration) -> Result<Vec<u8>, BoxError> {
        let mut s = self.state.borrow_mut();
        s.sweep();
        let mut frame = vec![0u8; s.frame_len];
        for (a, &off) in s.offsets.iter().enumerate() {
            frame[off..off + 4].copy_from_slice(&(s.load[a] as f32).to_le_bytes());
        }
        Ok(frame)
    }
}

/// Channel half: one raw record per call reporting the current load.
pub struct SimulatedChannels {
    state: Rc<RefCell<RigState>>,
}

impl RawLineSource for SimulatedChannels {
    fn read_line(&mut self, _timeout: Duration) -> Result<String, BoxError> {
        let mut s = self.state.borrow_mut();
        if s.free_run {
            s.sweep();
        }
        s.seq += 1;
        let seq = s.seq;
        if let Some(n) = s.malformed_every
            && seq as u64 % n == 0
        {
            tracing::trace!(seq, "simulated truncated record");
            return Ok(format!("D {seq} 0 1 2 3"));
        }
        let raw = s.counts();
        let mut line = format!("D {seq} 0");
        for v in raw {
            line.push(' ');
            line.push_str(&v.to_string());
        }
        Ok(line)
    }
}
