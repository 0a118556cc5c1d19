//! Simulation time model.
//!
//! Time is a monotonically increasing `Tick` counter; one tick is one full
//! pass of the simulator's phase loop.  All coordination state (reservations,
//! message timestamps, delivery schedules) is keyed by absolute ticks, so
//! time arithmetic is exact integer arithmetic — no drift, O(1) comparisons.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An absolute simulation tick counter.
///
/// Stored as `u64`: even at millisecond-scale ticks a u64 outlasts any
/// conceivable run.
#[derive(
    Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default, Serialize, Deserialize,
)]
pub struct Tick(pub u64);

impl Tick {
    pub const ZERO: Tick = Tick(0);

    /// Return the tick `n` steps after `self`.
    #[inline]
    pub fn offset(self, n: u64) -> Tick {
        Tick(self.0 + n)
    }

    /// Ticks elapsed from `earlier` to `self`, saturating at zero when a
    /// stale timestamp from before `earlier` shows up.
    #[inline]
    pub fn since(self, earlier: Tick) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl std::ops::Add<u64> for Tick {
    type Output = Tick;
    #[inline]
    fn add(self, rhs: u64) -> Tick {
        Tick(self.0 + rhs)
    }
}

impl std::ops::Sub for Tick {
    type Output = u64;
    #[inline]
    fn sub(self, rhs: Tick) -> u64 {
        self.0 - rhs.0
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}
