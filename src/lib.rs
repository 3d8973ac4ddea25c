//! # Decay Playback
//!
//! An adaptive playback scheduler for generational JPEG decay.
//!
//! A viewer shows an image that is repeatedly re-encoded, one *generation* per
//! re-encode, at a user-chosen speed. Each re-encode costs an unpredictable
//! amount of wall time, so playing "as fast as asked" is not always possible.
//! This crate decides, tick by tick, how many generations to run so playback
//! follows the requested rate when the machine keeps up and degrades to a
//! sustainable rate when it does not.
//!
//! ## Core Problem Solved
//!
//! - **Rate following**: unfinished work is carried as fractional *generation
//!   debt* between ticks, so the long-run rate matches the target
//! - **Throughput clamp**: the target is capped by what the measured cost per
//!   generation allows, so a slow encoder never snowballs into backlog
//! - **Bounded catch-up**: debt is capped, so a stall never becomes a burst
//! - **Stale-work safety**: resets, pauses, and new uploads invalidate any tick
//!   still in flight
//!
//! ## Key Components
//!
//! - [`core::rate_policy`]: effective generation rate from target and cost
//! - [`core::scheduler`]: `plan_tick` / `settle_after_process`, pure and deterministic
//! - [`core::wall_clock`]: observational elapsed time, separate from simulated time
//! - [`core::driver`]: the async driver loop built on the pieces above
//! - [`runtime`]: background loops and a thread-backed offload worker
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use decay_playback::builders::DriverBuilder;
//! use decay_playback::runtime::{PlaybackRuntime, TokioSpawner};
//!
//! let driver = DriverBuilder::new(Arc::new(canvas))
//!     .settings_json(r#"{"speed": 2, "batch": 1}"#)?
//!     .build()?;
//! let runtime = PlaybackRuntime::new(driver, TokioSpawner::current());
//! runtime.start_session().await;
//! ```
//!
//! For complete examples, see `tests/driver_loop_test.rs`.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Scheduling math, session state, and the driver loop.
pub mod core;
/// Session settings and driver configuration.
pub mod config;
/// Builders to construct drivers from configuration.
#[cfg(feature = "tokio-runtime")]
pub mod builders;
/// Runtime adapters: spawners, background loops, and offload workers.
#[cfg(feature = "tokio-runtime")]
pub mod runtime;
/// Shared utilities.
pub mod util;
