//! Consecutive-count debounce for watched state values.
//!
//! A new value is only accepted as a real state change after it has been
//! observed `threshold` times in a row. Any other value in between
//! restarts the count, so single-sample noise never reaches the action
//! callback. A fresh candidate is never accepted on first sight, so a
//! threshold of one behaves like two.
//!
//! # State Machine
//!
//! ```text
//!                 observed == candidate, count < threshold
//!                          ┌──────────┐
//!                          ▼          │
//!   Stable ─────────────► Counting ───┘
//!     ▲   observed != accepted  │
//!     │                         │ count >= threshold
//!     │  observed == accepted   ▼
//!     └──────────────────── Accepted (caller commits the new value)
//! ```
//!
//! A threshold of zero disables counting entirely: every value that
//! differs from the accepted one is accepted on first sight.

use crate::item::State;

/// What happens to the candidate when the observed value falls back to
/// the accepted one.
///
/// Both variants reset the consecutive count, and acceptance is identical
/// either way: a stale candidate that reappears after a fall-back counts
/// from one again. They differ only in which candidate value a diagnostic
/// snapshot reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CandidateReset {
    /// Re-synchronize the candidate to the stable value.
    #[default]
    OnStable,

    /// Leave the last candidate in place.
    Keep,
}

/// Result of [`Hysteresis::consider`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Observed value equals the accepted one. Nothing to do.
    Stable,

    /// Observed value is a candidate that has not yet been seen often
    /// enough.
    Pending { count: u32 },

    /// The candidate reached the threshold (or no threshold is set).
    Accepted,
}

impl Verdict {
    pub fn is_accepted(self) -> bool {
        matches!(self, Verdict::Accepted)
    }
}

/// Debounce counters for a single watch item.
#[derive(Debug, Clone)]
pub struct Hysteresis<S> {
    threshold: u32,
    candidate: S,
    consecutive: u32,
    reset: CandidateReset,
}

impl<S: State> Hysteresis<S> {
    pub fn new(threshold: u32, reset: CandidateReset) -> Self {
        Self {
            threshold,
            candidate: S::default(),
            consecutive: 0,
            reset,
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn candidate(&self) -> S {
        self.candidate
    }

    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }

    /// Forget any partial run and start over from `stable`.
    pub fn reset(&mut self, stable: S) {
        self.candidate = stable;
        self.consecutive = 0;
    }

    /// Feed one observation, given the currently accepted value.
    ///
    /// | threshold | observed | Result |
    /// |-----------|----------|--------|
    /// | 0 | == accepted | `Stable` |
    /// | 0 | != accepted | `Accepted` |
    /// | N | == accepted | `Stable` (count reset) |
    /// | N | == candidate | `Pending` or `Accepted` |
    /// | N | anything else | `Pending { count: 1 }` (new candidate) |
    pub fn consider(&mut self, accepted: S, observed: S) -> Verdict {
        if self.threshold == 0 {
            return if observed != accepted {
                Verdict::Accepted
            } else {
                Verdict::Stable
            };
        }

        if observed == accepted {
            self.consecutive = 0;
            if self.reset == CandidateReset::OnStable {
                self.candidate = observed;
            }
            return Verdict::Stable;
        }

        if observed == self.candidate {
            self.consecutive += 1;
            if self.consecutive >= self.threshold {
                self.consecutive = 0;
                return Verdict::Accepted;
            }
        } else {
            self.candidate = observed;
            self.consecutive = 1;
        }

        Verdict::Pending {
            count: self.consecutive,
        }
    }
}
