use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::hysteresis::CandidateReset;

/// Base interval used when none (or zero) is given.
pub const DEFAULT_BASE_INTERVAL: Duration = Duration::from_millis(200);

/// Hysteresis threshold used when an item does not set one.
pub const DEFAULT_HYSTERESIS: u32 = 0;

/// Longest item name kept, in characters. Longer names are truncated.
pub const MAX_NAME_LEN: usize = 31;

pub type StateFn<S> = Box<dyn FnMut() -> S + Send>;
pub type ActionFn<S> = Arc<dyn Fn(S, S) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Scheduling granularity. Every item interval must be a whole
    /// multiple of it. Zero selects [`DEFAULT_BASE_INTERVAL`].
    pub base_interval: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            base_interval: DEFAULT_BASE_INTERVAL,
        }
    }
}

/// Configuration for one watch item.
///
/// The state function is the only required part. Anything the callbacks
/// need from the application is captured by the closures themselves; the
/// registry never looks inside them.
pub struct WatchItemConfig<S> {
    pub(crate) name: Option<String>,
    pub(crate) interval: Option<Duration>,
    pub(crate) hysteresis: u32,
    pub(crate) candidate_reset: CandidateReset,
    pub(crate) state_fn: StateFn<S>,
    pub(crate) action_fn: Option<ActionFn<S>>,
}

impl<S> WatchItemConfig<S> {
    pub fn new<F>(state_fn: F) -> Self
    where
        F: FnMut() -> S + Send + 'static,
    {
        Self {
            name: None,
            interval: None,
            hysteresis: DEFAULT_HYSTERESIS,
            candidate_reset: CandidateReset::default(),
            state_fn: Box::new(state_fn),
            action_fn: None,
        }
    }

    /// Diagnostic name. Unnamed items get `item_<n>`.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Check period. Zero (or never calling this) uses the registry's
    /// base interval.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = (!interval.is_zero()).then_some(interval);
        self
    }

    /// Consecutive observations a new value needs before it counts as a
    /// change. Zero accepts changes immediately.
    pub fn hysteresis(mut self, hysteresis: u32) -> Self {
        self.hysteresis = hysteresis;
        self
    }

    pub fn candidate_reset(mut self, reset: CandidateReset) -> Self {
        self.candidate_reset = reset;
        self
    }

    /// Callback run with `(old, new)` once per accepted state change.
    ///
    /// Runs without the registry lock held, so it may block.
    pub fn on_change<F>(mut self, action_fn: F) -> Self
    where
        F: Fn(S, S) + Send + Sync + 'static,
    {
        self.action_fn = Some(Arc::new(action_fn));
        self
    }
}

impl<S> fmt::Debug for WatchItemConfig<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchItemConfig")
            .field("name", &self.name)
            .field("interval", &self.interval)
            .field("hysteresis", &self.hysteresis)
            .field("candidate_reset", &self.candidate_reset)
            .field("has_action", &self.action_fn.is_some())
            .finish()
    }
}

/// Cut `name` to at most [`MAX_NAME_LEN`] characters.
pub(crate) fn truncate_name(mut name: String) -> String {
    if let Some((idx, _)) = name.char_indices().nth(MAX_NAME_LEN) {
        name.truncate(idx);
    }
    name
}
