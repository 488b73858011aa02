// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Monotonic time port used for budget accounting.
use std::time::{Duration, Instant};

/// Monotonic time source injected into the scheduler.
///
/// Tests swap in a manually advanced clock so budget properties can be
/// asserted without sleeping.
pub trait Clock: Send + Sync {
    /// Time elapsed since a fixed, arbitrary origin. Never decreases.
    fn now(&self) -> Duration;
}

/// [`Clock`] backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Clock whose origin is the moment of construction.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Time allowance for one [`crate::QueryInstance::execute_one_step`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepBudget {
    /// Ignore the clock and run the current unit of work to completion.
    Unbounded,
    /// Stop iterating items once this much time has elapsed in the step.
    Limited(Duration),
}

impl StepBudget {
    /// Absolute deadline for a step starting at `start`, if any.
    pub fn deadline(self, start: Duration) -> Option<Duration> {
        match self {
            Self::Unbounded => None,
            Self::Limited(limit) => Some(start.saturating_add(limit)),
        }
    }
}
