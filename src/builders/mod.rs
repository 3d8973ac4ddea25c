//! Builders to construct playback drivers from configuration.

pub mod driver_builder;

pub use driver_builder::DriverBuilder;
