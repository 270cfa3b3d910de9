//! Time-bounded state override.
//!
//! While an override is active the item reports the forced value instead
//! of what its state function returned, and state changes bypass the
//! hysteresis filter. Expiry is lazy: an override is only dropped when
//! something looks at it after its deadline.

use std::time::Duration;

use tokio::time::Instant;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy)]
struct Active<S> {
    value: S,
    expire_at: Instant,
}

#[derive(Debug, Clone, Default)]
pub struct ForcedOverride<S> {
    active: Option<Active<S>>,
}

impl<S: Copy> ForcedOverride<S> {
    pub fn new() -> Self {
        Self { active: None }
    }

    /// Force `value` for `duration` starting at `now`, replacing any
    /// override already in place.
    pub fn set(&mut self, value: S, duration: Duration, now: Instant) -> Result<()> {
        if duration.is_zero() {
            return Err(Error::InvalidArgument(
                "forced state duration must be non-zero".into(),
            ));
        }

        self.active = Some(Active {
            value,
            expire_at: now + duration,
        });
        Ok(())
    }

    /// Drop the override. Returns whether one was active.
    pub fn clear(&mut self) -> bool {
        self.active.take().is_some()
    }

    /// Drop the override if its deadline has passed. Returns whether it
    /// expired on this call.
    pub fn expire(&mut self, now: Instant) -> bool {
        match self.active {
            Some(active) if now > active.expire_at => {
                self.active = None;
                true
            }
            _ => false,
        }
    }

    /// The forced value, if an override is active.
    pub fn value(&self) -> Option<S> {
        self.active.map(|active| active.value)
    }

    /// Time left on the active override, if any. Does not expire it; an
    /// override past its deadline reports zero until [`expire`] drops it.
    ///
    /// [`expire`]: ForcedOverride::expire
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.active
            .map(|active| active.expire_at.saturating_duration_since(now))
    }
}

#[cfg(test)]
mod tests {
    use tokio::time;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn rejects_zero_duration() {
        let mut forced = ForcedOverride::<u64>::new();
        let result = forced.set(7, Duration::ZERO, Instant::now());
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
        assert_eq!(forced.value(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn reports_value_and_remaining_time() {
        let mut forced = ForcedOverride::new();
        forced.set(99u64, Duration::from_secs(3), Instant::now()).unwrap();

        time::advance(Duration::from_secs(1)).await;
        assert_eq!(forced.value(), Some(99));
        assert_eq!(forced.remaining(Instant::now()), Some(Duration::from_secs(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn active_through_deadline_expires_after() {
        let mut forced = ForcedOverride::new();
        forced.set(1u64, Duration::from_secs(3), Instant::now()).unwrap();

        time::advance(Duration::from_secs(3)).await;
        assert!(!forced.expire(Instant::now()));
        assert_eq!(forced.remaining(Instant::now()), Some(Duration::ZERO));

        time::advance(Duration::from_millis(1)).await;
        assert!(forced.expire(Instant::now()));
        assert_eq!(forced.value(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn remaining_leaves_expiry_to_expire() {
        let mut forced = ForcedOverride::new();
        forced.set(1u64, Duration::from_secs(1), Instant::now()).unwrap();

        time::advance(Duration::from_secs(2)).await;
        assert_eq!(forced.remaining(Instant::now()), Some(Duration::ZERO));
        assert_eq!(forced.value(), Some(1));

        assert!(forced.expire(Instant::now()));
        assert_eq!(forced.remaining(Instant::now()), None);
        assert_eq!(forced.value(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn later_set_replaces_earlier() {
        let mut forced = ForcedOverride::new();
        forced.set(1u64, Duration::from_secs(10), Instant::now()).unwrap();
        forced.set(2u64, Duration::from_secs(1), Instant::now()).unwrap();

        assert_eq!(forced.value(), Some(2));
        assert_eq!(forced.remaining(Instant::now()), Some(Duration::from_secs(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn clear_is_idempotent() {
        let mut forced = ForcedOverride::new();
        forced.set(1u64, Duration::from_secs(1), Instant::now()).unwrap();

        assert!(forced.clear());
        assert!(!forced.clear());
        assert_eq!(forced.value(), None);
    }
}
