#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and calibration-parameter files for the calibration workspace.
//!
//! - `Config` and its sections are deserialized from TOML and validated.
//! - The parameter CSV loader enforces the exact column layout (including the
//!   quadratic monomial order) before any coefficient is read.
use serde::Deserialize;

pub mod params;

pub use params::{PersistedParams, load_params_csv, params_header, write_csv_atomically, write_params_csv};

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SerialCfg {
    /// Serial device of the 8-channel sensor (e.g. "/dev/ttyUSB0", "COM3")
    pub port: String,
    pub baud_rate: u32,
    /// Max time to wait for one record line
    pub read_timeout_ms: u64,
}

impl Default for SerialCfg {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 115_200,
            read_timeout_ms: 1000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ReferenceCfg {
    /// Byte offsets of Fx, Fy, Fz, Mx, My, Mz (little-endian f32) in the process-data frame.
    /// Fixed per device model; not discoverable at runtime.
    pub offsets: [usize; 6],
    /// Process-data receive timeout
    pub read_timeout_ms: u64,
}

impl Default for ReferenceCfg {
    fn default() -> Self {
        Self {
            offsets: [5, 9, 13, 17, 21, 25],
            read_timeout_ms: 2,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AcquisitionCfg {
    /// Samples to record after warm-up
    pub samples: u64,
    /// Leading ticks that are read but not recorded
    pub warmup_ticks: u64,
    /// Delay inserted after every tick (soft pacing, not a timing contract)
    pub tick_interval_ms: u64,
}

impl Default for AcquisitionCfg {
    fn default() -> Self {
        Self {
            samples: 2000,
            warmup_ticks: 10,
            tick_interval_ms: 5,
        }
    }
}

/// Where the reference wrench of each tick comes from.
///
/// ```toml
/// [wrench_source]
/// kind = "centered_mass"
/// mass_kg = 0.93
/// cog_distance_m = 0.055
/// direction = "+z"
/// ```
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WrenchSourceCfg {
    /// Decoded from the reference sensor frame
    #[default]
    Reference,
    /// Known mass on the tool axis, gravity along one sensor axis
    CenteredMass {
        mass_kg: f64,
        cog_distance_m: f64,
        /// One of "+x", "-x", "+y", "-y", "+z", "-z"
        direction: String,
    },
    /// Known mass at an offset position, sensor tilted by roll/pitch/yaw (radians)
    OffCenteredMass {
        /// Fixture position 0..=4; fills mass and position when they are not given
        #[serde(default)]
        preset: Option<u8>,
        #[serde(default)]
        mass_kg: Option<f64>,
        #[serde(default)]
        position_m: Option<[f64; 3]>,
        #[serde(default)]
        roll: f64,
        #[serde(default)]
        pitch: f64,
        #[serde(default)]
        yaw: f64,
    },
}

pub const DIRECTIONS: [&str; 6] = ["+x", "-x", "+y", "-y", "+z", "-z"];

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatasetCfg {
    pub seed: u64,
    /// Share of merged rows drawn into the training partition
    pub train_fraction: f64,
}

impl Default for DatasetCfg {
    fn default() -> Self {
        Self {
            seed: 42,
            train_fraction: 0.8,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MethodKind {
    #[default]
    Ordinary,
    Ridge,
    Lasso,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ModelCfg {
    /// Polynomial degree: 1 (linear) or 2 (linear + quadratic)
    pub degree: u8,
    pub method: MethodKind,
    /// Regularization strength for ridge/lasso (ignored by ordinary)
    pub alpha: f64,
    /// Lasso: maximum coordinate-descent sweeps
    pub max_iter: u32,
    /// Lasso: relative coefficient-update tolerance
    pub tol: f64,
}

impl Default for ModelCfg {
    fn default() -> Self {
        Self {
            degree: 1,
            method: MethodKind::Ordinary,
            alpha: 1.0,
            max_iter: 1000,
            tol: 1e-4,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RealtimeCfg {
    pub tick_interval_ms: u64,
    /// Stop after this many ticks; runs until interrupted when absent
    pub max_ticks: Option<u64>,
}

impl Default for RealtimeCfg {
    fn default() -> Self {
        Self {
            tick_interval_ms: 5,
            max_ticks: None,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Config {
    pub serial: SerialCfg,
    pub reference: ReferenceCfg,
    pub acquisition: AcquisitionCfg,
    pub wrench_source: WrenchSourceCfg,
    pub dataset: DatasetCfg,
    pub model: ModelCfg,
    pub realtime: RealtimeCfg,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read, parse and validate a config file.
pub fn load_config_file(path: &std::path::Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {:?}: {}", path, e))?;
    let cfg = load_toml(&text).map_err(|e| eyre::eyre!("parse config {:?}: {}", path, e))?;
    cfg.validate()?;
    Ok(cfg)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Serial
        if self.serial.port.trim().is_empty() {
            eyre::bail!("serial.port must not be empty");
        }
        if self.serial.baud_rate == 0 {
            eyre::bail!("serial.baud_rate must be > 0");
        }
        if self.serial.read_timeout_ms == 0 {
            eyre::bail!("serial.read_timeout_ms must be >= 1");
        }

        // Reference frame layout: offsets must leave room for 4 bytes each and not overlap
        let mut sorted = self.reference.offsets;
        sorted.sort_unstable();
        for w in sorted.windows(2) {
            if w[1] < w[0] + 4 {
                eyre::bail!("reference.offsets overlap: {} and {}", w[0], w[1]);
            }
        }
        if self.reference.read_timeout_ms == 0 {
            eyre::bail!("reference.read_timeout_ms must be >= 1");
        }

        // Acquisition
        if self.acquisition.samples == 0 {
            eyre::bail!("acquisition.samples must be >= 1");
        }
        if self.acquisition.tick_interval_ms > 60 * 1000 {
            eyre::bail!("acquisition.tick_interval_ms is unreasonably large (>1min)");
        }

        // Wrench source
        match &self.wrench_source {
            WrenchSourceCfg::Reference => {}
            WrenchSourceCfg::CenteredMass {
                mass_kg,
                cog_distance_m,
                direction,
            } => {
                if !(mass_kg.is_finite() && *mass_kg > 0.0) {
                    eyre::bail!("wrench_source.mass_kg must be > 0");
                }
                if !cog_distance_m.is_finite() {
                    eyre::bail!("wrench_source.cog_distance_m must be finite");
                }
                if !DIRECTIONS.contains(&direction.as_str()) {
                    eyre::bail!(
                        "wrench_source.direction must be one of {}, got '{}'",
                        DIRECTIONS.join(" / "),
                        direction
                    );
                }
            }
            WrenchSourceCfg::OffCenteredMass {
                preset,
                mass_kg,
                position_m,
                roll,
                pitch,
                yaw,
            } => {
                if let Some(p) = preset
                    && *p > 4
                {
                    eyre::bail!("wrench_source.preset must be in 0..=4, got {p}");
                }
                if preset.is_none() && (mass_kg.is_none() || position_m.is_none()) {
                    eyre::bail!("wrench_source needs either preset or both mass_kg and position_m");
                }
                if let Some(m) = mass_kg
                    && !(m.is_finite() && *m > 0.0)
                {
                    eyre::bail!("wrench_source.mass_kg must be > 0");
                }
                for (name, a) in [("roll", roll), ("pitch", pitch), ("yaw", yaw)] {
                    if !(-std::f64::consts::PI..=std::f64::consts::PI).contains(a) {
                        eyre::bail!("wrench_source.{name} must be in [-pi, pi] radians");
                    }
                }
            }
        }

        // Dataset
        if !(self.dataset.train_fraction > 0.0 && self.dataset.train_fraction < 1.0) {
            eyre::bail!("dataset.train_fraction must be in (0.0, 1.0)");
        }

        // Model
        if !matches!(self.model.degree, 1 | 2) {
            eyre::bail!("model.degree must be 1 or 2, got {}", self.model.degree);
        }
        if self.model.method != MethodKind::Ordinary
            && !(self.model.alpha.is_finite() && self.model.alpha > 0.0)
        {
            eyre::bail!("model.alpha must be > 0 for ridge/lasso");
        }
        if self.model.max_iter == 0 {
            eyre::bail!("model.max_iter must be >= 1");
        }
        if !(self.model.tol.is_finite() && self.model.tol > 0.0) {
            eyre::bail!("model.tol must be > 0");
        }

        // Realtime
        if self.realtime.max_ticks == Some(0) {
            eyre::bail!("realtime.max_ticks must be >= 1 when set");
        }

        // Logging
        if let Some(r) = self.logging.rotation.as_deref()
            && !matches!(r, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be never|daily|hourly, got '{r}'");
        }

        Ok(())
    }
}
