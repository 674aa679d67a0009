//! Knob Core
//!
//! Runtime settings registry for interactive applications:
//! - Typed settings (bool, int, float, string, color, options, key bindings)
//! - Connections that bind a setting to live engine state
//! - The `Settings` registry driving the load / apply / pull lifecycle
//! - Resolvers that bind a setting to a UI widget
//! - Persistence through a string-keyed storage backend

pub mod connection;
pub mod data;
pub mod input;
pub mod listeners;
pub mod math;
pub mod resolver;
pub mod setting;
pub mod settings;
pub mod storage;
pub mod value;

pub use connection::{
    AnyConnection, CallbackConnection, Connection, ConnectionBase, ConnectionHandle,
    ConnectionTable, ConnectionWithOptions, OptionsConnection, DEFAULT_CONNECTION_ORDER,
};
pub use data::{SerializeError, SettingData};
pub use input::{KeyCode, KeyCombination};
pub use listeners::{ListenerId, Listeners};
pub use resolver::{Resolver, ResolverId, Widget, WidgetResolver};
pub use setting::Setting;
pub use settings::{LoadState, SettingMut, Settings, SettingsError};
pub use storage::{MemoryStorage, Storage, StorageError};
pub use value::{Color, DataType, OptionLabels, SettingValue};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
