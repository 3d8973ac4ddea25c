//! Keeps a driver loop and a wall-clock loop running on a spawner.
//!
//! Session controls are forwarded to the [`PlaybackDriver`]; whenever a control
//! leaves playback running, the runtime makes sure exactly one driver loop is
//! alive to service it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::core::driver::{DriverSnapshot, PlaybackDriver};
use crate::core::error::PlaybackError;
use crate::core::processor::GenerationProcessor;
use crate::util::clock::now_ms_u64;

use super::tokio_spawner::Spawn;

/// Owns the background loops for one driver.
pub struct PlaybackRuntime<P, S>
where
    P: GenerationProcessor,
    S: Spawn,
{
    driver: PlaybackDriver<P>,
    spawner: S,
    loop_active: Arc<AtomicBool>,
    clock_active: Arc<AtomicBool>,
}

impl<P, S> PlaybackRuntime<P, S>
where
    P: GenerationProcessor,
    S: Spawn,
{
    /// Wrap a driver; no loops run until a session starts.
    pub fn new(driver: PlaybackDriver<P>, spawner: S) -> Self {
        Self {
            driver,
            spawner,
            loop_active: Arc::new(AtomicBool::new(false)),
            clock_active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The driven session.
    pub const fn driver(&self) -> &PlaybackDriver<P> {
        &self.driver
    }

    /// Current session snapshot.
    #[must_use]
    pub fn snapshot(&self) -> DriverSnapshot {
        self.driver.snapshot()
    }

    /// Whether a driver loop is currently spawned.
    #[must_use]
    pub fn is_loop_active(&self) -> bool {
        self.loop_active.load(Ordering::Acquire)
    }

    /// Load a new image anchored at the current system time and start playing.
    pub async fn start_session(&self) {
        self.driver.start_session(now_ms_u64()).await;
        self.ensure_clock();
        self.ensure_loop();
    }

    /// Return to the first frame.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::NoSession` when no image is loaded.
    pub async fn reset(&self, auto_play: bool) -> Result<(), PlaybackError> {
        self.driver.reset(auto_play).await?;
        self.ensure_loop();
        Ok(())
    }

    /// Toggle playback; returns whether playback is now running.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::NoSession` when no image is loaded.
    pub async fn play_pause(&self) -> Result<bool, PlaybackError> {
        let playing = self.driver.play_pause().await?;
        self.ensure_loop();
        Ok(playing)
    }

    /// Close the session; both loops wind down on their own.
    pub fn end_session(&self) {
        self.driver.end_session();
    }

    /// Spawn the driver loop if playback is running and no loop is alive.
    pub fn ensure_loop(&self) {
        if !self.driver.is_playing() {
            return;
        }
        if self.loop_active.swap(true, Ordering::AcqRel) {
            return;
        }
        let driver = self.driver.clone();
        let active = Arc::clone(&self.loop_active);
        debug!("spawning driver loop");
        self.spawner.spawn(async move {
            loop {
                driver.run().await;
                active.store(false, Ordering::Release);
                // A resume may have landed between the loop exiting and the flag clearing.
                if !driver.is_playing() || active.swap(true, Ordering::AcqRel) {
                    break;
                }
            }
        });
    }

    fn ensure_clock(&self) {
        if self.clock_active.swap(true, Ordering::AcqRel) {
            return;
        }
        let driver = self.driver.clone();
        let active = Arc::clone(&self.clock_active);
        self.spawner.spawn(async move {
            loop {
                driver.run_wall_clock(now_ms_u64).await;
                active.store(false, Ordering::Release);
                if !driver.snapshot().has_session || active.swap(true, Ordering::AcqRel) {
                    break;
                }
            }
        });
    }
}
