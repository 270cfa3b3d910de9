//! A single watched entity and its per-check pipeline.

use std::fmt;
use std::time::Duration;

use slotmap::new_key_type;
use tokio::time::Instant;

use crate::config::{ActionFn, StateFn, WatchItemConfig};
use crate::error::Result;
use crate::forced::ForcedOverride;
use crate::hysteresis::{Hysteresis, Verdict};
use crate::tracing::prelude::*;

/// Values a state function can report.
///
/// `Default` is the state every item starts from before its first
/// accepted change.
pub trait State: Copy + Eq + fmt::Debug + Default + Send + 'static {}

impl<T> State for T where T: Copy + Eq + fmt::Debug + Default + Send + 'static {}

new_key_type! {
    /// Handle to an item in a [`Registry`](crate::Registry).
    ///
    /// Handles are generation-checked: once the item is removed its handle
    /// is rejected, even if the slot is reused by a later item.
    pub struct ItemId;
}

/// Lifetime counters for one item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ItemStats {
    /// Number of times the state function ran.
    pub check_count: u64,

    /// Number of times the action callback ran.
    pub action_count: u64,
}

/// Point-in-time view of an item, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemInfo<S> {
    pub name: String,
    pub interval: Duration,
    pub hysteresis: u32,
    pub current_state: S,
    pub last_accepted_state: S,
    pub candidate_state: S,
    pub consecutive_count: u32,
    pub forced_state: Option<S>,
    pub stats: ItemStats,
}

/// Outcome of one due check, before anything is committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Evaluation<S> {
    pub value: S,
    pub accepted: bool,
}

pub(crate) struct WatchItem<S> {
    pub(crate) name: String,
    pub(crate) interval: Duration,
    state_fn: StateFn<S>,
    pub(crate) action_fn: Option<ActionFn<S>>,
    pub(crate) current_state: S,
    pub(crate) last_accepted: S,
    hysteresis: Hysteresis<S>,
    pub(crate) forced: ForcedOverride<S>,
    last_checked_at: Instant,
    pub(crate) stats: ItemStats,
}

impl<S: State> WatchItem<S> {
    pub(crate) fn new(
        config: WatchItemConfig<S>,
        name: String,
        interval: Duration,
        now: Instant,
    ) -> Self {
        Self {
            name,
            interval,
            state_fn: config.state_fn,
            action_fn: config.action_fn,
            current_state: S::default(),
            last_accepted: S::default(),
            hysteresis: Hysteresis::new(config.hysteresis, config.candidate_reset),
            forced: ForcedOverride::new(),
            last_checked_at: now,
            stats: ItemStats::default(),
        }
    }

    pub(crate) fn is_due(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_checked_at) >= self.interval
    }

    /// Force `value` for `duration`. Any partial hysteresis run is
    /// dropped, so once the override ends a real change needs the full
    /// count again.
    pub(crate) fn force(&mut self, value: S, duration: Duration, now: Instant) -> Result<()> {
        self.forced.set(value, duration, now)?;
        self.hysteresis.reset(self.last_accepted);
        Ok(())
    }

    /// Read the state and decide whether it is a change worth acting on.
    ///
    /// The state function always runs. An active override replaces its
    /// result and skips the hysteresis filter.
    pub(crate) fn evaluate(&mut self, now: Instant) -> Evaluation<S> {
        if self.forced.expire(now) {
            debug!(item = %self.name, "Forced state expired, resuming normal watching");
        }

        let observed = (self.state_fn)();

        if let Some(forced) = self.forced.value() {
            debug!(
                item = %self.name,
                forced = ?forced,
                observed = ?observed,
                "Using forced state"
            );
            return Evaluation {
                value: forced,
                accepted: forced != self.last_accepted,
            };
        }

        let verdict = self.hysteresis.consider(self.last_accepted, observed);
        if let Verdict::Pending { count } = verdict {
            debug!(
                item = %self.name,
                candidate = ?observed,
                count,
                need = self.hysteresis.threshold(),
                "Hysteresis pending"
            );
        }

        Evaluation {
            value: observed,
            accepted: verdict.is_accepted(),
        }
    }

    pub(crate) fn record_action(&mut self, value: S) {
        self.last_accepted = value;
        self.stats.action_count += 1;
    }

    pub(crate) fn record_check(&mut self, value: S, now: Instant) {
        self.current_state = value;
        self.last_checked_at = now;
        self.stats.check_count += 1;
    }

    pub(crate) fn info(&self) -> ItemInfo<S> {
        ItemInfo {
            name: self.name.clone(),
            interval: self.interval,
            hysteresis: self.hysteresis.threshold(),
            current_state: self.current_state,
            last_accepted_state: self.last_accepted,
            candidate_state: self.hysteresis.candidate(),
            consecutive_count: self.hysteresis.consecutive(),
            forced_state: self.forced.value(),
            stats: self.stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    use tokio::time;

    use super::*;

    const SECOND: Duration = Duration::from_secs(1);

    fn item_reading(value: Arc<AtomicU64>, hysteresis: u32) -> WatchItem<u64> {
        let config = WatchItemConfig::new(move || value.load(Ordering::SeqCst))
            .hysteresis(hysteresis);
        WatchItem::new(config, "test".into(), SECOND, Instant::now())
    }

    #[tokio::test(start_paused = true)]
    async fn due_after_interval() {
        let item = item_reading(Arc::new(AtomicU64::new(0)), 0);
        assert!(!item.is_due(Instant::now()));

        time::advance(SECOND).await;
        assert!(item.is_due(Instant::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn forced_value_bypasses_hysteresis() {
        let value = Arc::new(AtomicU64::new(3));
        let mut item = item_reading(value, 5);
        item.forced.set(99, 3 * SECOND, Instant::now()).unwrap();

        let eval = item.evaluate(Instant::now());
        assert_eq!(
            eval,
            Evaluation {
                value: 99,
                accepted: true
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn state_fn_runs_while_forced() {
        let calls = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&calls);
        let config = WatchItemConfig::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            1u64
        });
        let mut item = WatchItem::new(config, "calls".into(), SECOND, Instant::now());
        item.forced.set(7, SECOND, Instant::now()).unwrap();

        item.evaluate(Instant::now());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_override_falls_back_to_state_fn() {
        let value = Arc::new(AtomicU64::new(4));
        let mut item = item_reading(value, 0);
        item.forced.set(99, SECOND, Instant::now()).unwrap();

        time::advance(2 * SECOND).await;
        let eval = item.evaluate(Instant::now());
        assert_eq!(eval.value, 4);
        assert_eq!(item.forced.value(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn record_updates_state_and_counters() {
        let mut item = item_reading(Arc::new(AtomicU64::new(0)), 0);
        item.record_action(5);
        item.record_check(5, Instant::now());

        let info = item.info();
        assert_eq!(info.current_state, 5);
        assert_eq!(info.last_accepted_state, 5);
        assert_eq!(
            info.stats,
            ItemStats {
                check_count: 1,
                action_count: 1
            }
        );
    }
}
