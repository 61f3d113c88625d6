//! Configuration management.

mod settings;

pub use settings::{ChatConfig, ClientSettings, Settings, SettingsError};
