use std::time::Duration;

use ftcal_traits::clock::Clock;

/// How a tick loop spaces its iterations.
///
/// A soft hint only: the delay is added after the tick's own I/O, so the real period
/// is the delay plus whatever the devices took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// Sleep this long after every tick
    FixedDelay(Duration),
    /// Run ticks back to back (device reads block anyway)
    Unpaced,
}

impl Pacing {
    pub fn from_millis(ms: u64) -> Self {
        if ms == 0 {
            Pacing::Unpaced
        } else {
            Pacing::FixedDelay(Duration::from_millis(ms))
        }
    }

    #[inline]
    pub fn after_tick<C: Clock + ?Sized>(&self, clock: &C) {
        if let Pacing::FixedDelay(d) = self {
            clock.sleep(*d);
        }
    }
}
