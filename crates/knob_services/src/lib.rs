//! Knob Services Layer
//!
//! Platform side of the settings registry: where settings are stored, how
//! the provider is configured, and the provider that owns the registry.

pub mod config;
pub mod provider;
pub mod storage;

pub use config::{ConfigError, ProviderConfig};
pub use provider::SettingsProvider;
pub use storage::FileStorage;
