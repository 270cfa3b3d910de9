//! Registry of watch items sharing one base interval.
//!
//! The registry owns every item, the run/stop state and the aggregate
//! counters. One lock guards all of it; the ticker only lets go of it
//! while an action callback runs.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use slotmap::SlotMap;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::{DEFAULT_BASE_INTERVAL, WatchItemConfig, WatcherConfig, truncate_name};
use crate::error::{Error, Result};
use crate::item::{ItemId, ItemInfo, ItemStats, State, WatchItem};
use crate::ticker;
use crate::tracing::prelude::*;

/// Aggregate counters across every item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub total_checks: u64,
    pub total_actions: u64,
    pub active_items: usize,
}

pub(crate) struct Inner<S> {
    pub(crate) initialized: bool,
    pub(crate) items: SlotMap<ItemId, WatchItem<S>>,
    /// Insertion order, used for iteration.
    pub(crate) order: Vec<ItemId>,
    next_seq: u64,
    pub(crate) total_checks: u64,
    pub(crate) total_actions: u64,
}

struct TickerHandle {
    cancellation: CancellationToken,
    task: JoinHandle<()>,
}

pub(crate) struct Shared<S> {
    pub(crate) base_interval: Duration,
    pub(crate) running: AtomicBool,
    pub(crate) inner: Mutex<Inner<S>>,
    /// Held for the whole of a tick, so a ticker started while a stopped
    /// one is still finishing its tick waits for it.
    pub(crate) tick_gate: Mutex<()>,
    ticker: Mutex<Option<TickerHandle>>,
}

impl<S> Shared<S> {
    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Periodic state watcher.
///
/// Cloning gives another handle to the same registry. Items are polled by
/// a ticker task that runs every base interval between [`start`] and
/// [`stop`]; each item is only checked once its own interval has elapsed.
///
/// [`start`]: Registry::start
/// [`stop`]: Registry::stop
pub struct Registry<S: State = u64> {
    shared: Arc<Shared<S>>,
}

impl<S: State> Clone for Registry<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S: State> Registry<S> {
    pub fn new(config: WatcherConfig) -> Self {
        let base_interval = if config.base_interval.is_zero() {
            DEFAULT_BASE_INTERVAL
        } else {
            config.base_interval
        };

        info!(
            base_interval_ms = base_interval.as_millis() as u64,
            "State watcher initialized"
        );

        Self {
            shared: Arc::new(Shared {
                base_interval,
                running: AtomicBool::new(false),
                inner: Mutex::new(Inner {
                    initialized: true,
                    items: SlotMap::with_key(),
                    order: Vec::new(),
                    next_seq: 0,
                    total_checks: 0,
                    total_actions: 0,
                }),
                tick_gate: Mutex::new(()),
                ticker: Mutex::new(None),
            }),
        }
    }

    pub fn with_base_interval(base_interval: Duration) -> Self {
        Self::new(WatcherConfig { base_interval })
    }

    pub fn base_interval(&self) -> Duration {
        self.shared.base_interval
    }

    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// Start the ticker. The first tick happens one base interval from
    /// now.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) -> Result<()> {
        if !self.shared.inner.lock().initialized {
            return Err(Error::NotInitialized);
        }
        let runtime = Handle::try_current().map_err(|_| Error::NoRuntime)?;

        let mut slot = self.shared.ticker.lock();
        if self
            .shared
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::AlreadyRunning);
        }

        let cancellation = CancellationToken::new();
        let task = runtime.spawn(ticker::run(
            Arc::downgrade(&self.shared),
            self.shared.base_interval,
            cancellation.clone(),
        ));
        *slot = Some(TickerHandle { cancellation, task });

        info!("State watcher started");
        Ok(())
    }

    /// Stop the ticker and wait for an in-flight tick, including any
    /// action callback it is running, to finish.
    ///
    /// No action callback runs after this returns. Calling it on a
    /// stopped registry does nothing.
    pub async fn stop(&self) {
        let ticker = {
            let mut slot = self.shared.ticker.lock();
            self.shared.running.store(false, Ordering::Release);
            slot.take()
        };

        let Some(TickerHandle { cancellation, task }) = ticker else {
            return;
        };

        cancellation.cancel();
        if let Err(e) = task.await {
            error!(error = %e, "Ticker task failed");
        }

        info!("State watcher stopped");
    }

    /// Stop, drop every item and invalidate the registry. Later calls
    /// fail with [`Error::NotInitialized`].
    pub async fn cleanup(&self) {
        if !self.shared.inner.lock().initialized {
            return;
        }

        self.stop().await;

        let removed = {
            let mut inner = self.shared.inner.lock();
            inner.order.clear();
            inner.initialized = false;
            std::mem::take(&mut inner.items)
        };
        drop(removed);

        info!("State watcher cleaned up");
    }

    pub fn add_item(&self, config: WatchItemConfig<S>) -> Result<ItemId> {
        let base = self.shared.base_interval;
        let interval = config.interval.unwrap_or(base);

        if interval < base || interval.as_nanos() % base.as_nanos() != 0 {
            error!(
                interval_ms = interval.as_millis() as u64,
                base_interval_ms = base.as_millis() as u64,
                "Invalid interval: must be a multiple of the base interval"
            );
            return Err(Error::InvalidConfiguration(format!(
                "interval {interval:?} is not a positive multiple of base interval {base:?}"
            )));
        }

        let mut inner = self.shared.inner.lock();
        if !inner.initialized {
            return Err(Error::NotInitialized);
        }
        inner
            .order
            .try_reserve(1)
            .map_err(|_| Error::AllocationFailure)?;

        let seq = inner.next_seq;
        inner.next_seq += 1;
        let name = truncate_name(config.name.clone().unwrap_or_else(|| format!("item_{seq}")));
        let hysteresis = config.hysteresis;

        let item = WatchItem::new(config, name.clone(), interval, Instant::now());
        let id = inner.items.insert(item);
        inner.order.push(id);
        drop(inner);

        info!(
            item = %name,
            interval_ms = interval.as_millis() as u64,
            hysteresis,
            "Added watch item"
        );
        Ok(id)
    }

    /// Remove an item. Safe while the registry is running: a tick in
    /// progress either finishes with the item or never sees it again.
    pub fn remove_item(&self, id: ItemId) -> Result<()> {
        let mut inner = self.shared.inner.lock();
        let item = inner.items.remove(id).ok_or_else(|| unknown_item(id))?;
        inner.order.retain(|&other| other != id);
        drop(inner);

        info!(item = %item.name, "Removed watch item");
        Ok(())
    }

    /// Most recent state of an item, after any override.
    pub fn item_state(&self, id: ItemId) -> Result<S> {
        self.with_item(id, |item| item.current_state)
    }

    pub fn item_stats(&self, id: ItemId) -> Result<ItemStats> {
        self.with_item(id, |item| item.stats)
    }

    pub fn item_info(&self, id: ItemId) -> Result<ItemInfo<S>> {
        self.with_item(id, |item| item.info())
    }

    pub fn item_count(&self) -> usize {
        self.shared.inner.lock().items.len()
    }

    pub fn stats(&self) -> Result<RegistryStats> {
        let inner = self.shared.inner.lock();
        if !inner.initialized {
            return Err(Error::NotInitialized);
        }

        Ok(RegistryStats {
            total_checks: inner.total_checks,
            total_actions: inner.total_actions,
            active_items: inner.items.len(),
        })
    }

    /// Make an item report `value` for `duration`, bypassing hysteresis.
    ///
    /// Replaces any override already active on the item.
    pub fn force_state(&self, id: ItemId, value: S, duration: Duration) -> Result<()> {
        self.with_item_mut(id, |item| {
            item.force(value, duration, Instant::now())?;
            info!(
                item = %item.name,
                forced = ?value,
                duration_ms = duration.as_millis() as u64,
                "Forced state"
            );
            Ok(())
        })?
    }

    pub fn clear_forced_state(&self, id: ItemId) -> Result<()> {
        self.with_item_mut(id, |item| {
            if item.forced.clear() {
                info!(item = %item.name, "Forced state cleared, resuming normal watching");
            }
        })
    }

    /// Remaining time on an item's override, or `None` if it has none
    /// (or the handle is unknown). An override past its deadline is
    /// cleared by this call.
    pub fn is_forced(&self, id: ItemId) -> Option<Duration> {
        self.with_item_mut(id, |item| {
            let now = Instant::now();
            if item.forced.expire(now) {
                debug!(item = %item.name, "Forced state expired during check");
            }
            item.forced.remaining(now)
        })
        .ok()
        .flatten()
    }

    /// Run one tick as the ticker would at `now`.
    #[cfg(test)]
    pub(crate) fn tick_at(&self, now: Instant) {
        self.shared.tick(now, &CancellationToken::new());
    }

    #[cfg(test)]
    pub(crate) fn set_running(&self, running: bool) {
        self.shared.running.store(running, Ordering::Release);
    }

    fn with_item<T>(&self, id: ItemId, f: impl FnOnce(&WatchItem<S>) -> T) -> Result<T> {
        let inner = self.shared.inner.lock();
        inner.items.get(id).map(f).ok_or_else(|| unknown_item(id))
    }

    fn with_item_mut<T>(&self, id: ItemId, f: impl FnOnce(&mut WatchItem<S>) -> T) -> Result<T> {
        let mut inner = self.shared.inner.lock();
        inner.items.get_mut(id).map(f).ok_or_else(|| unknown_item(id))
    }
}

fn unknown_item(id: ItemId) -> Error {
    Error::InvalidArgument(format!("no watch item {id:?}"))
}
