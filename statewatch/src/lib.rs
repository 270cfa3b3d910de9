//! Periodic state watching with per-item intervals, hysteresis and forced
//! overrides.
//!
//! A [`Registry`] polls a set of watch items on a shared base interval.
//! Each item reads its state through a user callback every N base
//! intervals, runs the reading through a consecutive-count debounce, and
//! calls its action callback once per accepted change. An item can be
//! forced to a given state for a bounded time, which skips the debounce.
//!
//! ```no_run
//! use std::time::Duration;
//! use statewatch::{Registry, WatchItemConfig};
//!
//! # async fn example() -> statewatch::Result<()> {
//! let registry = Registry::with_base_interval(Duration::from_millis(100));
//! registry.add_item(
//!     WatchItemConfig::new(|| 42u64)
//!         .name("answer")
//!         .interval(Duration::from_millis(500))
//!         .hysteresis(2)
//!         .on_change(|old, new| println!("{old} -> {new}")),
//! )?;
//! registry.start()?;
//! # registry.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod forced;
pub mod hysteresis;
pub mod item;
pub mod registry;
mod ticker;
pub mod tracing;

pub use config::{WatchItemConfig, WatcherConfig};
pub use error::{Error, Result};
pub use hysteresis::CandidateReset;
pub use item::{ItemId, ItemInfo, ItemStats, State};
pub use registry::{Registry, RegistryStats};
