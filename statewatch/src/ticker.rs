//! The periodic task that drives a registry.
//!
//! One ticker runs per started registry. Ticks never overlap: the next
//! sleep only begins once the previous tick, including any action
//! callbacks it ran, has returned, and a restarted registry's first tick
//! waits out a tick still running from before the stop. The tick body
//! runs on the blocking pool because action callbacks are allowed to
//! block.

use std::sync::Weak;
use std::time::Duration;

use parking_lot::MutexGuard;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::item::{Evaluation, State};
use crate::registry::Shared;
use crate::tracing::prelude::*;

pub(crate) async fn run<S: State>(
    shared: Weak<Shared<S>>,
    base_interval: Duration,
    cancellation: CancellationToken,
) {
    trace!("Ticker task started.");

    loop {
        tokio::select! {
            _ = cancellation.cancelled() => {
                break;
            }
            _ = tokio::time::sleep(base_interval) => {}
        }

        // Registry dropped without being stopped
        let Some(registry) = shared.upgrade() else {
            break;
        };
        if !registry.is_running() || cancellation.is_cancelled() {
            break;
        }

        let now = Instant::now();
        let tick_registry = registry.clone();
        let tick_cancellation = cancellation.clone();
        let tick = move || tick_registry.tick(now, &tick_cancellation);
        if let Err(e) = tokio::task::spawn_blocking(tick).await {
            error!(error = %e, "Tick panicked");
        }

        if !registry.is_running() || cancellation.is_cancelled() {
            break;
        }
    }

    trace!("Ticker task stopped.");
}

impl<S: State> Shared<S> {
    /// Check every due item once.
    ///
    /// Items are visited in insertion order. The lock is released only
    /// around action callbacks; an item removed meanwhile is skipped from
    /// then on, and a stop observed after a callback ends the tick before
    /// anything else is committed. `cancellation` belongs to the ticker
    /// running this tick, so a restart during the callback does not revive
    /// it.
    pub(crate) fn tick(&self, now: Instant, cancellation: &CancellationToken) {
        let live = || self.is_running() && !cancellation.is_cancelled();
        if !live() {
            return;
        }

        let _gate = self.tick_gate.lock();
        if !live() {
            return;
        }

        let mut inner = self.inner.lock();
        let order = inner.order.clone();

        for id in order {
            let Some(item) = inner.items.get_mut(id) else {
                continue;
            };
            if !item.is_due(now) {
                continue;
            }

            let Evaluation { value, accepted } = item.evaluate(now);

            if accepted {
                match item.action_fn.clone() {
                    Some(action) => {
                        let old = item.last_accepted;
                        debug!(
                            item = %item.name,
                            old = ?old,
                            new = ?value,
                            "Executing action"
                        );

                        MutexGuard::unlocked(&mut inner, || action(old, value));

                        if !live() {
                            return;
                        }

                        let inner = &mut *inner;
                        let Some(item) = inner.items.get_mut(id) else {
                            continue;
                        };
                        item.record_action(value);
                        inner.total_actions += 1;
                    }
                    None => item.last_accepted = value,
                }
            }

            let inner = &mut *inner;
            let Some(item) = inner.items.get_mut(id) else {
                continue;
            };
            item.record_check(value, now);
            inner.total_checks += 1;
        }
    }
}
