//! Runtime adapters: spawning the driver loop and running processors off the driver's task.

pub mod playback;
pub mod tokio_spawner;
#[cfg(not(target_arch = "wasm32"))]
pub mod worker;

pub use playback::PlaybackRuntime;
pub use tokio_spawner::{Spawn, TokioSpawner};
#[cfg(not(target_arch = "wasm32"))]
pub use worker::OffloadWorker;
