//! Reference wrench providers for the acquisition loop.
//!
//! Every calibration rig setup shares one loop; they only differ in where the
//! reference wrench of a tick comes from:
//! - `MeasuredWrench`: decoded from the reference sensor's process-data frame;
//! - `CenteredMass`: a known mass on the tool axis with gravity along one sensor axis;
//! - `OffCenteredMass`: a known mass at an offset position with the sensor tilted.

use std::str::FromStr;
use std::time::Duration;

use ftcal_traits::ReferenceSensor;
use nalgebra::{Rotation3, Vector3};

use crate::error::{CalError, Result, map_hw_error};
use crate::record::FrameLayout;
use crate::sample::Wrench;

/// Standard gravity used for all mass-based wrenches (m/s²).
pub const GRAVITY: f64 = 9.81;

pub trait WrenchSource {
    /// Reference wrench for the current tick.
    fn next_wrench(&mut self) -> Result<Wrench>;
}

impl<T: WrenchSource + ?Sized> WrenchSource for Box<T> {
    fn next_wrench(&mut self) -> Result<Wrench> {
        (**self).next_wrench()
    }
}

/// Wrench measured by the reference instrument.
pub struct MeasuredWrench<R> {
    sensor: R,
    layout: FrameLayout,
    timeout: Duration,
}

impl<R: ReferenceSensor> MeasuredWrench<R> {
    pub fn new(sensor: R, layout: FrameLayout, timeout: Duration) -> Self {
        Self {
            sensor,
            layout,
            timeout,
        }
    }
}

impl<R: ReferenceSensor> WrenchSource for MeasuredWrench<R> {
    fn next_wrench(&mut self) -> Result<Wrench> {
        let frame = self
            .sensor
            .read_frame(self.timeout)
            .map_err(|e| map_hw_error(&*e))?;
        self.layout.decode(&frame)
    }
}

/// Direction in which gravity pulls the mass, in sensor coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    PosX,
    NegX,
    PosY,
    NegY,
    PosZ,
    NegZ,
}

impl FromStr for Direction {
    type Err = CalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "+x" => Ok(Direction::PosX),
            "-x" => Ok(Direction::NegX),
            "+y" => Ok(Direction::PosY),
            "-y" => Ok(Direction::NegY),
            "+z" => Ok(Direction::PosZ),
            "-z" => Ok(Direction::NegZ),
            other => Err(CalError::Config(format!(
                "direction must be one of +x / -x / +y / -y / +z / -z, got '{other}'"
            ))),
        }
    }
}

/// Constant wrench of a mass centered on the tool axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CenteredMass {
    wrench: Wrench,
}

impl CenteredMass {
    /// `F = m·g` along `direction`; `M = F·d` from the center of gravity sitting `d`
    /// above the tool origin. Gravity along z produces no moment.
    pub fn new(mass_kg: f64, cog_distance_m: f64, direction: Direction) -> Self {
        let f = mass_kg * GRAVITY;
        let m = f * cog_distance_m;
        let wrench = match direction {
            Direction::PosX => [f, 0.0, 0.0, 0.0, m, 0.0],
            Direction::NegX => [-f, 0.0, 0.0, 0.0, -m, 0.0],
            Direction::PosY => [0.0, f, 0.0, -m, 0.0, 0.0],
            Direction::NegY => [0.0, -f, 0.0, m, 0.0, 0.0],
            Direction::PosZ => [0.0, 0.0, f, 0.0, 0.0, 0.0],
            Direction::NegZ => [0.0, 0.0, -f, 0.0, 0.0, 0.0],
        };
        Self { wrench }
    }

    pub fn wrench(&self) -> Wrench {
        self.wrench
    }
}

impl WrenchSource for CenteredMass {
    fn next_wrench(&mut self) -> Result<Wrench> {
        Ok(self.wrench)
    }
}

/// Sensor orientation relative to the world frame, radians (ZYX / roll-pitch-yaw).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Orientation {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

/// Holder plate alone (position 0) and the four holder positions with the extra mass.
const HOLDER_MASS_KG: f64 = 0.309;
const LOADED_MASS_KG: f64 = 1.028;
const PRESETS: [([f64; 3], f64); 5] = [
    ([0.0, 0.0, 0.045], HOLDER_MASS_KG),
    ([0.02937, 0.02937, 0.05394], LOADED_MASS_KG),
    ([-0.02937, 0.02937, 0.05394], LOADED_MASS_KG),
    ([-0.02937, -0.02937, 0.05394], LOADED_MASS_KG),
    ([0.02937, -0.02937, 0.05394], LOADED_MASS_KG),
];

/// Constant wrench of a mass at `position_m` (sensor frame) with the sensor tilted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OffCenteredMass {
    wrench: Wrench,
}

impl OffCenteredMass {
    /// World gravity `[0, 0, -m·g]` is rotated into the sensor frame with the inverse
    /// of `R = Rz(yaw)·Ry(pitch)·Rx(roll)`; the moment is `r × F`.
    pub fn new(mass_kg: f64, position_m: [f64; 3], orientation: Orientation) -> Self {
        let f_world = Vector3::new(0.0, 0.0, -mass_kg * GRAVITY);
        let r_ws = Rotation3::from_euler_angles(orientation.roll, orientation.pitch, orientation.yaw);
        let f_s = r_ws.inverse() * f_world;
        let r = Vector3::from(position_m);
        let m_s = r.cross(&f_s);
        Self {
            wrench: [f_s.x, f_s.y, f_s.z, m_s.x, m_s.y, m_s.z],
        }
    }

    /// Fixture position 0..=4 of the calibration holder.
    pub fn preset(position: u8, orientation: Orientation) -> Result<Self> {
        let (r, m) = PRESETS
            .get(usize::from(position))
            .copied()
            .ok_or_else(|| CalError::Config(format!("mass position must be 0..=4, got {position}")))?;
        Ok(Self::new(m, r, orientation))
    }

    /// Position and mass of a fixture preset.
    pub fn preset_geometry(position: u8) -> Option<([f64; 3], f64)> {
        PRESETS.get(usize::from(position)).copied()
    }

    pub fn wrench(&self) -> Wrench {
        self.wrench
    }
}

impl WrenchSource for OffCenteredMass {
    fn next_wrench(&mut self) -> Result<Wrench> {
        Ok(self.wrench)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    fn close(a: &Wrench, b: &Wrench) -> bool {
        a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-9)
    }

    #[test]
    fn centered_mass_directions() {
        let f = 0.93 * GRAVITY;
        let m = f * 0.055;
        let w = CenteredMass::new(0.93, 0.055, Direction::PosX).wrench();
        assert!(close(&w, &[f, 0.0, 0.0, 0.0, m, 0.0]));
        let w = CenteredMass::new(0.93, 0.055, Direction::NegY).wrench();
        assert!(close(&w, &[0.0, -f, 0.0, m, 0.0, 0.0]));
        let w = CenteredMass::new(0.93, 0.055, Direction::PosZ).wrench();
        assert!(close(&w, &[0.0, 0.0, f, 0.0, 0.0, 0.0]));
    }

    #[test]
    fn direction_parsing() {
        assert_eq!("-z".parse::<Direction>().unwrap(), Direction::NegZ);
        assert!("z".parse::<Direction>().is_err());
    }

    #[test]
    fn upright_holder_has_no_moment() {
        let w = OffCenteredMass::preset(0, Orientation::default()).unwrap().wrench();
        let f = HOLDER_MASS_KG * GRAVITY;
        assert!(close(&w, &[0.0, 0.0, -f, 0.0, 0.0, 0.0]));
    }

    #[test]
    fn offset_mass_produces_moment() {
        let a = 0.02937;
        let f = LOADED_MASS_KG * GRAVITY;
        let w = OffCenteredMass::preset(1, Orientation::default()).unwrap().wrench();
        assert!(close(&w, &[0.0, 0.0, -f, -a * f, a * f, 0.0]));
    }

    #[test]
    fn roll_moves_gravity_into_y() {
        let orient = Orientation {
            roll: FRAC_PI_2,
            ..Orientation::default()
        };
        let w = OffCenteredMass::new(1.0, [0.0, 0.0, 0.0], orient).wrench();
        assert!(close(&w, &[0.0, -GRAVITY, 0.0, 0.0, 0.0, 0.0]));
    }

    #[test]
    fn preset_out_of_range() {
        assert!(OffCenteredMass::preset(5, Orientation::default()).is_err());
    }
}
