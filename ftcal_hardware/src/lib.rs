//! Device implementations of the `ftcal_traits` seams.
//!
//! - `sim`: a simulated rig whose reference and channel halves share one load.
//! - `serial` (feature `hardware`): the 8-channel sensor's serial record stream.
//!
//! The EtherCAT reference instrument has no driver here; real captures with a
//! measured reference plug one in through `ftcal_traits::ReferenceSensor`.
pub mod error;
#[cfg(feature = "hardware")]
pub mod serial;
pub mod sim;

pub use error::HwError;
#[cfg(feature = "hardware")]
pub use serial::SerialLineSource;
pub use sim::{SimulatedChannels, SimulatedReference, SimulatedRig};
