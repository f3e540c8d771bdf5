//! Cooldown and penalty timing
//!
//! A press while ready is accepted and starts the base cooldown. A press
//! while cooling down is rejected and pushes the ready time out by the
//! penalty, compounding on repeated early presses. The ready time only ever
//! moves forward.

use std::time::{Duration, Instant};

/// Cooldown after an accepted press
pub const DEFAULT_BASE_COOLDOWN: Duration = Duration::from_secs(10);

/// Extension applied per early press
pub const DEFAULT_PENALTY: Duration = Duration::from_secs(5);

/// Readiness as seen at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownState {
    /// A press will be accepted
    Ready,
    /// A press will be rejected
    CoolingDown {
        /// Time until ready
        remaining: Duration,
    },
}

/// Outcome of a recognized press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Speak a tip, then call [`Cooldown::begin`]
    Accepted,
    /// Too early; the penalty has already been applied
    Rejected {
        /// New ready time after the penalty
        ready_at: Instant,
    },
}

/// Cooldown state machine
#[derive(Debug, Clone)]
pub struct Cooldown {
    base: Duration,
    penalty: Duration,
    ready_at: Instant,
}

impl Cooldown {
    /// Create a machine that is ready at `now`
    #[must_use]
    pub const fn new(base: Duration, penalty: Duration, now: Instant) -> Self {
        Self {
            base,
            penalty,
            ready_at: now,
        }
    }

    /// Decide a press at `now`
    ///
    /// Rejection mutates state immediately. Acceptance does not: the caller
    /// commits it with [`Cooldown::begin`] once the tip has been produced.
    pub fn press(&mut self, now: Instant) -> Decision {
        if self.is_ready(now) {
            return Decision::Accepted;
        }

        self.ready_at += self.penalty;
        tracing::debug!(
            penalty_ms = self.penalty.as_millis(),
            remaining_ms = self.ready_at.saturating_duration_since(now).as_millis(),
            "early press penalized"
        );
        Decision::Rejected {
            ready_at: self.ready_at,
        }
    }

    /// Start the base cooldown for a press accepted at `now`
    pub fn begin(&mut self, now: Instant) {
        let next = now + self.base;
        // Never shorten an already pending cooldown
        if next > self.ready_at {
            self.ready_at = next;
        }
    }

    /// Whether a press at `now` would be accepted
    #[must_use]
    pub fn is_ready(&self, now: Instant) -> bool {
        now >= self.ready_at
    }

    /// Readiness at `now`
    #[must_use]
    pub fn state(&self, now: Instant) -> CooldownState {
        if self.is_ready(now) {
            CooldownState::Ready
        } else {
            CooldownState::CoolingDown {
                remaining: self.ready_at - now,
            }
        }
    }

    /// Instant from which presses are accepted again
    #[must_use]
    pub const fn ready_at(&self) -> Instant {
        self.ready_at
    }

    /// Configured base cooldown
    #[must_use]
    pub const fn base(&self) -> Duration {
        self.base
    }

    /// Configured penalty
    #[must_use]
    pub const fn penalty(&self) -> Duration {
        self.penalty
    }
}
