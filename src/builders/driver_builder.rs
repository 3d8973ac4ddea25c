//! Builder for [`PlaybackDriver`].

use std::sync::Arc;

use crate::config::{DriverConfig, SessionSettings};
use crate::core::driver::PlaybackDriver;
use crate::core::error::PlaybackError;
use crate::core::events::{EventSink, TracingEventSink};
use crate::core::processor::{GenerationProcessor, OffloadedProcessor};

/// Assembles a driver from settings, configuration, and collaborators.
///
/// ```rust,ignore
/// let driver = DriverBuilder::new(Arc::new(canvas))
///     .settings_json(r#"{"speed": 4, "batch": 2}"#)?
///     .offload(Arc::new(OffloadWorker::spawn("decay-worker", canvas_copy)?))
///     .build()?;
/// ```
pub struct DriverBuilder<P>
where
    P: GenerationProcessor,
{
    processor: Arc<P>,
    settings: SessionSettings,
    config: DriverConfig,
    offload: Option<Arc<dyn OffloadedProcessor>>,
    events: Box<dyn EventSink>,
}

impl<P> DriverBuilder<P>
where
    P: GenerationProcessor,
{
    /// Start from default settings and configuration.
    pub fn new(processor: Arc<P>) -> Self {
        Self {
            processor,
            settings: SessionSettings::default(),
            config: DriverConfig::default(),
            offload: None,
            events: Box::new(TracingEventSink),
        }
    }

    /// Use these session settings (sanitized at build time).
    #[must_use]
    pub fn settings(mut self, settings: SessionSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Parse session settings from JSON.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::InvalidSettings` when the input is not valid JSON.
    pub fn settings_json(mut self, input: &str) -> Result<Self, PlaybackError> {
        self.settings = SessionSettings::from_json_str(input)?.settings;
        Ok(self)
    }

    /// Use this driver configuration.
    #[must_use]
    pub fn config(mut self, config: DriverConfig) -> Self {
        self.config = config;
        self
    }

    /// Parse driver configuration from JSON.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::InvalidSettings` when parsing or validation fails.
    pub fn config_json(mut self, input: &str) -> Result<Self, PlaybackError> {
        self.config = DriverConfig::from_json_str(input).map_err(PlaybackError::InvalidSettings)?;
        Ok(self)
    }

    /// Run batches on an offload worker when it is available.
    #[must_use]
    pub fn offload(mut self, offload: Arc<dyn OffloadedProcessor>) -> Self {
        self.offload = Some(offload);
        self
    }

    /// Send session events to `sink` instead of the log.
    #[must_use]
    pub fn events(mut self, sink: Box<dyn EventSink>) -> Self {
        self.events = sink;
        self
    }

    /// Build the driver.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::InvalidSettings` if the configuration is invalid.
    pub fn build(self) -> Result<PlaybackDriver<P>, PlaybackError> {
        PlaybackDriver::new(self.settings, self.config, self.processor, self.offload, self.events)
    }
}
