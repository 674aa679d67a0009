//! Connections bind a setting to live engine state.
//!
//! A connection can `get`/`set` an external quantity, reports a default on
//! first use and notifies listeners when the quantity actually changes.
//! Connections are stored in a `ConnectionTable` owned by the registry and
//! referenced from settings by generational `ConnectionHandle`s; creating and
//! destroying them is explicit and independent of setting lifetime.

mod base;
mod callback;
mod table;

pub use base::{Connection, ConnectionBase, ConnectionWithOptions, DEFAULT_CONNECTION_ORDER};
pub use callback::{CallbackConnection, OptionsConnection};
pub use table::{AnyConnection, ConnectionHandle, ConnectionTable};
