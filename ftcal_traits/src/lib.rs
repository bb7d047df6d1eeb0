//! Hardware seams and shared layout for the calibration workspace.
//!
//! Everything that talks to a physical instrument goes through these traits so the
//! core crate stays hardware-agnostic and testable with scripted sources.
pub mod clock;
pub mod layout;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use layout::{AXIS_NAMES, CHANNEL_NAMES, MONOMIAL_PAIRS, N_AXES, N_CHANNELS, N_MONOMIALS};

/// Boxed error used at the hardware boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Line-oriented source of raw sensor records (the serial stream of the 8-channel sensor).
pub trait RawLineSource {
    /// Block until one newline-terminated record is available and return it without the
    /// terminator. Errors are fatal to the session.
    fn read_line(&mut self, timeout: std::time::Duration) -> Result<String, BoxError>;
}

/// Reference force/torque instrument delivering one process-data frame per request.
pub trait ReferenceSensor {
    fn read_frame(&mut self, timeout: std::time::Duration) -> Result<Vec<u8>, BoxError>;
}

impl<T: RawLineSource + ?Sized> RawLineSource for Box<T> {
    fn read_line(&mut self, timeout: std::time::Duration) -> Result<String, BoxError> {
        (**self).read_line(timeout)
    }
}

impl<T: ReferenceSensor + ?Sized> ReferenceSensor for Box<T> {
    fn read_frame(&mut self, timeout: std::time::Duration) -> Result<Vec<u8>, BoxError> {
        (**self).read_frame(timeout)
    }
}
