//! Shared utilities.

pub mod clock;
pub mod format;
pub mod telemetry;

pub use clock::*;
pub use format::*;
pub use telemetry::*;
