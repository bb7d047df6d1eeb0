#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::similar_names
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Force/torque sensor calibration (hardware-agnostic).
//!
//! All device access goes through `ftcal_traits::RawLineSource` and
//! `ftcal_traits::ReferenceSensor`.
//!
//! ## Pipeline
//!
//! - **Acquisition**: synchronized reference wrench + raw channels per tick (`acquisition`)
//! - **Validity**: one overload policy shared by every stage (`validity`)
//! - **Dataset**: session merge, filtering and seeded train/validation split (`dataset`)
//! - **Model**: linear or quadratic polynomial, ordinary/ridge/lasso fit (`model`, `solver`)
//! - **Evaluation**: per-axis held-out errors and summaries (`evaluate`)
//! - **Real time**: stateless per-tick estimates from the live stream (`realtime`)
//!
//! ## Overload
//!
//! Producers flag, consumers decide: capture and the live path warn and keep the
//! sample, dataset assembly drops it. A model is therefore never trained on
//! saturated readings, while live output under saturation is emitted with
//! `Estimate::overloaded` set.

pub mod acquisition;
pub mod conversions;
pub mod dataset;
pub mod error;
pub mod evaluate;
pub mod features;
pub mod mocks;
pub mod model;
pub mod pacing;
pub mod realtime;
pub mod record;
pub mod sample;
pub mod solver;
pub mod validity;
pub mod wrench_source;

pub use acquisition::{Acquisition, AcquisitionStats, CsvSampleWriter, SampleSink};
pub use dataset::{AssemblyReport, DATASET_HEADER, Dataset, Split};
pub use error::{CalError, Result};
pub use evaluate::{AxisStats, ErrorReport, ErrorRow, Histogram, evaluate};
pub use features::Degree;
pub use model::CalibrationModel;
pub use pacing::Pacing;
pub use realtime::{Estimate, RealtimeEstimator, RunOptions, RunStats};
pub use record::{FrameLayout, RawRecord, decode_raw_line};
pub use sample::{ChannelSample, RawChannels, Wrench};
pub use solver::Method;
pub use wrench_source::{CenteredMass, Direction, MeasuredWrench, OffCenteredMass, Orientation, WrenchSource};
