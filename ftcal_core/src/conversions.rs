//! Conversions from `ftcal_config` types to `ftcal_core` types.

use std::time::Duration;

use ftcal_config::{Config, MethodKind, ModelCfg, PersistedParams, ReferenceCfg, WrenchSourceCfg};
use ftcal_traits::ReferenceSensor;

use crate::acquisition::Acquisition;
use crate::error::{CalError, Result};
use crate::features::Degree;
use crate::model::CalibrationModel;
use crate::pacing::Pacing;
use crate::realtime::RunOptions;
use crate::record::FrameLayout;
use crate::solver::Method;
use crate::wrench_source::{
    CenteredMass, Direction, MeasuredWrench, OffCenteredMass, Orientation, WrenchSource,
};

// ── Model ────────────────────────────────────────────────────────────────────

impl From<&ModelCfg> for Method {
    fn from(c: &ModelCfg) -> Self {
        match c.method {
            MethodKind::Ordinary => Method::Ordinary,
            MethodKind::Ridge => Method::Ridge { alpha: c.alpha },
            MethodKind::Lasso => Method::Lasso {
                alpha: c.alpha,
                max_iter: c.max_iter,
                tol: c.tol,
            },
        }
    }
}

impl TryFrom<&ModelCfg> for Degree {
    type Error = CalError;

    fn try_from(c: &ModelCfg) -> Result<Self> {
        Degree::from_u8(c.degree)
            .ok_or_else(|| CalError::Config(format!("model.degree must be 1 or 2, got {}", c.degree)))
    }
}

// ── Parameters ───────────────────────────────────────────────────────────────

impl From<PersistedParams> for CalibrationModel {
    fn from(p: PersistedParams) -> Self {
        CalibrationModel::from_parts(p.c, p.l, p.q)
    }
}

impl From<&CalibrationModel> for PersistedParams {
    fn from(m: &CalibrationModel) -> Self {
        Self {
            c: *m.c(),
            l: *m.l(),
            q: m.q().copied(),
        }
    }
}

// ── Devices and loops ────────────────────────────────────────────────────────

impl From<&ReferenceCfg> for FrameLayout {
    fn from(c: &ReferenceCfg) -> Self {
        Self { offsets: c.offsets }
    }
}

impl From<&Config> for Acquisition {
    fn from(c: &Config) -> Self {
        Self {
            warmup_ticks: c.acquisition.warmup_ticks,
            samples: c.acquisition.samples,
            pacing: Pacing::from_millis(c.acquisition.tick_interval_ms),
            read_timeout: Duration::from_millis(c.serial.read_timeout_ms),
        }
    }
}

impl From<&Config> for RunOptions {
    fn from(c: &Config) -> Self {
        Self {
            pacing: Pacing::from_millis(c.realtime.tick_interval_ms),
            max_ticks: c.realtime.max_ticks,
            read_timeout: Duration::from_millis(c.serial.read_timeout_ms),
        }
    }
}

/// Build the configured wrench source. `open_reference` is only called when the
/// wrench is measured, so mass-based captures need no reference instrument.
pub fn build_wrench_source<R, F>(cfg: &Config, open_reference: F) -> Result<Box<dyn WrenchSource>>
where
    R: ReferenceSensor + 'static,
    F: FnOnce() -> Result<R>,
{
    match &cfg.wrench_source {
        WrenchSourceCfg::Reference => {
            let sensor = open_reference()?;
            Ok(Box::new(MeasuredWrench::new(
                sensor,
                FrameLayout::from(&cfg.reference),
                Duration::from_millis(cfg.reference.read_timeout_ms),
            )))
        }
        WrenchSourceCfg::CenteredMass {
            mass_kg,
            cog_distance_m,
            direction,
        } => {
            let dir: Direction = direction.parse()?;
            Ok(Box::new(CenteredMass::new(*mass_kg, *cog_distance_m, dir)))
        }
        WrenchSourceCfg::OffCenteredMass {
            preset,
            mass_kg,
            position_m,
            roll,
            pitch,
            yaw,
        } => {
            let orientation = Orientation {
                roll: *roll,
                pitch: *pitch,
                yaw: *yaw,
            };
            // Explicit mass/position override the preset's.
            let (preset_r, preset_m) = match preset {
                Some(p) => OffCenteredMass::preset_geometry(*p)
                    .map(|(r, m)| (Some(r), Some(m)))
                    .ok_or_else(|| CalError::Config(format!("mass position must be 0..=4, got {p}")))?,
                None => (None, None),
            };
            let mass = mass_kg.or(preset_m).ok_or_else(|| {
                CalError::Config("wrench_source needs either preset or mass_kg".into())
            })?;
            let r = position_m.or(preset_r).ok_or_else(|| {
                CalError::Config("wrench_source needs either preset or position_m".into())
            })?;
            Ok(Box::new(OffCenteredMass::new(mass, r, orientation)))
        }
    }
}
