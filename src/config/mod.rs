//! Configuration models for sessions and the driver loop.

pub mod driver;
pub mod settings;

pub use driver::DriverConfig;
pub use settings::{
    sanitize_value, shift_speed, QualityModel, SanitizedSettings, SessionSettings, SettingField,
    SettingsErrors, SPEED_PRESETS, VIEWER_SPEED_PRESETS,
};
