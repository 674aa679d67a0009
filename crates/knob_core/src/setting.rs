//! A single typed, identified setting
//!
//! `Setting` holds one `SettingValue` variant for its whole lifetime. Methods
//! that touch live state take the registry's `ConnectionTable`; the setting
//! itself only stores a handle into it.

use crate::connection::{
    AnyConnection, ConnectionHandle, ConnectionTable, DEFAULT_CONNECTION_ORDER,
};
use crate::data::SettingData;
use crate::listeners::{ListenerId, Listeners};
use crate::value::{DataType, OptionLabels, SettingValue};
use tracing::{trace, warn};

#[derive(Debug)]
pub struct Setting {
    id: String,
    value: SettingValue,
    default: SettingValue,
    groups: Vec<String>,
    has_user_data: bool,
    changed: bool,
    /// False until the first assignment of a setting built from stored data.
    initialized: bool,
    /// False for settings materialized from stored data whose id no code
    /// has asked for yet.
    declared: bool,
    apply_immediately: bool,
    connection: Option<ConnectionHandle>,
    option_labels: Option<OptionLabels>,
    override_connection_labels: bool,
    change_listeners: Listeners<SettingValue>,
    pulled_listeners: Listeners<SettingValue>,
    applied_listeners: Listeners<SettingValue>,
}

impl Setting {
    pub fn new(id: impl Into<String>, default: SettingValue) -> Self {
        Self {
            id: id.into(),
            value: default.clone(),
            default,
            groups: Vec::new(),
            has_user_data: false,
            changed: false,
            initialized: true,
            declared: true,
            apply_immediately: false,
            connection: None,
            option_labels: None,
            override_connection_labels: false,
            change_listeners: Listeners::new(),
            pulled_listeners: Listeners::new(),
            applied_listeners: Listeners::new(),
        }
    }

    /// Build an undeclared setting from a stored record. Returns `None` if
    /// the record's type is unknown or its payload does not decode.
    pub(crate) fn from_data(data: &SettingData) -> Option<Self> {
        let zero = SettingValue::zero(data.data_type)?;
        let mut setting = Setting::new(data.id.clone(), zero);
        setting.initialized = false;
        setting.declared = false;
        setting.deserialize_value_from_data(data).then_some(setting)
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn matches_id(&self, id: &str) -> bool {
        self.id == id
    }

    #[inline]
    pub fn data_type(&self) -> DataType {
        self.default.data_type()
    }

    pub fn matches_any_data_type(&self, data_types: &[DataType]) -> bool {
        data_types.contains(&self.data_type())
    }

    #[inline]
    pub fn value(&self) -> &SettingValue {
        &self.value
    }

    pub fn default_value(&self) -> &SettingValue {
        &self.default
    }

    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    pub fn set_groups<S: Into<String>>(&mut self, groups: impl IntoIterator<Item = S>) {
        self.groups.clear();
        self.add_groups(groups);
    }

    /// Union `groups` into the existing tags.
    pub fn add_groups<S: Into<String>>(&mut self, groups: impl IntoIterator<Item = S>) {
        for group in groups {
            let group = group.into();
            if !self.groups.contains(&group) {
                self.groups.push(group);
            }
        }
    }

    pub fn matches_any_group<S: AsRef<str>>(&self, groups: &[S]) -> bool {
        groups
            .iter()
            .any(|g| self.groups.iter().any(|own| own == g.as_ref()))
    }

    pub fn has_user_data(&self) -> bool {
        self.has_user_data
    }

    pub fn set_has_user_data(&mut self, has_user_data: bool) {
        self.has_user_data = has_user_data;
    }

    pub fn has_unapplied_changes(&self) -> bool {
        self.changed
    }

    pub fn mark_as_changed(&mut self) {
        self.changed = true;
    }

    pub fn mark_as_unchanged(&mut self) {
        self.changed = false;
    }

    pub fn apply_immediately(&self) -> bool {
        self.apply_immediately
    }

    pub fn set_apply_immediately(&mut self, apply_immediately: bool) {
        self.apply_immediately = apply_immediately;
    }

    pub(crate) fn is_declared(&self) -> bool {
        self.declared
    }

    /// Turn a setting materialized from stored data into a declared one.
    /// The loaded value stays; the default is replaced.
    pub(crate) fn declare(&mut self, default: SettingValue) {
        self.declared = true;
        self.initialized = true;
        self.default = default;
    }

    // Listeners

    pub fn add_change_listener(&mut self, f: impl FnMut(&SettingValue) + 'static) -> ListenerId {
        self.change_listeners.add(f)
    }

    pub fn remove_change_listener(&mut self, id: ListenerId) -> bool {
        self.change_listeners.remove(id)
    }

    pub fn add_pulled_listener(&mut self, f: impl FnMut(&SettingValue) + 'static) -> ListenerId {
        self.pulled_listeners.add(f)
    }

    pub fn remove_pulled_listener(&mut self, id: ListenerId) -> bool {
        self.pulled_listeners.remove(id)
    }

    pub fn add_applied_listener(&mut self, f: impl FnMut(&SettingValue) + 'static) -> ListenerId {
        self.applied_listeners.add(f)
    }

    pub fn remove_applied_listener(&mut self, id: ListenerId) -> bool {
        self.applied_listeners.remove(id)
    }

    // Options

    /// The setting's own labels, ignoring any connection.
    pub fn own_option_labels(&self) -> Option<&OptionLabels> {
        self.option_labels.as_ref()
    }

    /// Replace the setting's own labels. Fails if the label kind does not
    /// match the setting (string labels on a `ColorOption`, or any labels on
    /// a non-option setting).
    pub fn set_option_labels(&mut self, labels: OptionLabels) -> bool {
        if labels.data_type() != self.data_type() {
            warn!(
                id = %self.id,
                "Ignoring {} labels for a {} setting",
                labels.data_type(),
                self.data_type()
            );
            return false;
        }
        self.option_labels = Some(labels);
        true
    }

    pub fn override_connection_labels(&self) -> bool {
        self.override_connection_labels
    }

    /// When set, the setting's own labels win over its connection's.
    pub fn set_override_connection_labels(&mut self, value: bool) {
        self.override_connection_labels = value;
    }

    /// Labels currently offered to the user. Connection labels win unless
    /// overridden or empty.
    pub fn option_labels(&self, connections: &mut ConnectionTable) -> Option<OptionLabels> {
        if !self.data_type().is_option() {
            return None;
        }
        if !self.override_connection_labels {
            let from_connection = self
                .connection
                .and_then(|handle| connections.get_mut(handle))
                .and_then(AnyConnection::option_labels)
                .filter(|labels| !labels.is_empty());
            if from_connection.is_some() {
                return from_connection;
            }
        }
        self.option_labels.clone()
    }

    // Value

    /// Set the value. Equal values are ignored once the setting holds a
    /// value. With `propagate` the setting is marked changed, change
    /// listeners run, and if `apply_immediately` is on the value is pushed.
    ///
    /// Returns false if the value's kind does not match the setting.
    pub fn set_value(
        &mut self,
        value: impl Into<SettingValue>,
        propagate: bool,
        connections: &mut ConnectionTable,
    ) -> bool {
        let value = self.coerce(value.into());
        if value.data_type() != self.data_type() {
            warn!(
                id = %self.id,
                "Type mismatch: cannot assign a {} value to a {} setting",
                value.data_type(),
                self.data_type()
            );
            return false;
        }

        if self.assign(value, propagate) && propagate && self.apply_immediately {
            self.push_to_connection(connections);
        }
        true
    }

    pub fn reset_to_default(&mut self, connections: &mut ConnectionTable) {
        self.assign(self.default.clone(), true);
        if self.apply_immediately {
            self.push_to_connection(connections);
        }
    }

    /// Store `value`. Returns whether it was taken.
    fn assign(&mut self, value: SettingValue, propagate: bool) -> bool {
        let value = self.clamp_index(value);
        if self.initialized && value == self.value {
            return false;
        }
        self.initialized = true;
        self.value = value;

        if propagate {
            self.changed = true;
            self.change_listeners.emit(&self.value);
        }
        true
    }

    /// Option indices are plain ints at the API surface.
    fn coerce(&self, value: SettingValue) -> SettingValue {
        match (self.data_type(), value) {
            (DataType::Option, SettingValue::Int(i)) => SettingValue::Option(i),
            (DataType::ColorOption, SettingValue::Int(i)) => SettingValue::ColorOption(i),
            (_, value) => value,
        }
    }

    /// Keep an option index inside the setting's own label range.
    fn clamp_index(&self, value: SettingValue) -> SettingValue {
        let Some(labels) = self.option_labels.as_ref().filter(|l| !l.is_empty()) else {
            return value;
        };
        let max = labels.len() as i32 - 1;
        match value {
            SettingValue::Option(i) => SettingValue::Option(i.clamp(0, max)),
            SettingValue::ColorOption(i) => SettingValue::ColorOption(i.clamp(0, max)),
            other => other,
        }
    }

    // Serialization

    pub fn serialize_value_to_data(&self) -> SettingData {
        SettingData::from_value(self.id.clone(), &self.value)
    }

    /// Load a stored record without notifying anyone. A record of another
    /// type is logged and ignored.
    pub fn deserialize_value_from_data(&mut self, data: &SettingData) -> bool {
        if data.data_type != self.data_type() {
            warn!(
                id = %self.id,
                "Stored {} data does not match {} setting; keeping current value",
                data.data_type,
                self.data_type()
            );
            return false;
        }

        match data.value() {
            Ok(value) => {
                self.assign(value, false);
                self.has_user_data = true;
                true
            }
            Err(e) => {
                warn!(id = %self.id, "Could not decode stored data: {}", e);
                false
            }
        }
    }

    // Connection

    pub fn connection(&self) -> Option<ConnectionHandle> {
        self.connection
    }

    pub fn has_connection(&self, connections: &ConnectionTable) -> bool {
        self.connection
            .is_some_and(|handle| connections.is_alive(handle))
    }

    /// Scheduling order; settings without a live connection use
    /// `DEFAULT_CONNECTION_ORDER`.
    pub fn connection_order(&self, connections: &ConnectionTable) -> i32 {
        self.connection
            .and_then(|handle| connections.get(handle))
            .map_or(DEFAULT_CONNECTION_ORDER, AnyConnection::order)
    }

    /// Bind to a connection (or unbind with `None`) and initialize it.
    /// Fails if the connection serves another data type.
    pub fn set_connection(
        &mut self,
        handle: Option<ConnectionHandle>,
        connections: &mut ConnectionTable,
    ) -> bool {
        if let Some(handle) = handle {
            match connections.get(handle) {
                Some(connection) if connection.data_type() != self.data_type() => {
                    warn!(
                        id = %self.id,
                        "Refusing {} connection on a {} setting",
                        connection.data_type(),
                        self.data_type()
                    );
                    return false;
                }
                Some(_) => {}
                None => {
                    warn!(id = %self.id, "Connection {} is not alive", handle);
                    return false;
                }
            }
        }

        self.connection = handle;
        self.initialize_connection(connections);
        true
    }

    /// Take the connection's default as this setting's default and, unless
    /// stored data was loaded, as its value. Runs no listeners.
    pub fn initialize_connection(&mut self, connections: &mut ConnectionTable) {
        let Some(handle) = self.connection else {
            return;
        };
        let Some(default) = connections.default_of(handle) else {
            return;
        };
        let default = self.coerce(default);
        if default.data_type() != self.data_type() {
            return;
        }

        self.default = default.clone();
        if !self.has_user_data {
            self.assign(default, false);
        }
    }

    pub fn push_to_connection(&mut self, connections: &mut ConnectionTable) {
        let Some(connection) = self.connection.and_then(|h| connections.get_mut(h)) else {
            return;
        };
        trace!(id = %self.id, value = %self.value, "push");
        connection.set(&self.value);
    }

    /// Read the live value without marking the setting changed, then run
    /// the pulled listeners. Returns false without a live connection.
    pub fn pull_from_connection(&mut self, connections: &mut ConnectionTable) -> bool {
        let Some(connection) = self.connection.and_then(|h| connections.get_mut(h)) else {
            return false;
        };
        let value = self.coerce(connection.get());
        if value.data_type() != self.data_type() {
            return false;
        }

        self.assign(value, false);
        self.pulled_listeners.emit(&self.value);
        true
    }

    /// Push, pull back (the connection may have snapped the value), clear
    /// the changed flag and run the applied listeners.
    pub fn apply(&mut self, connections: &mut ConnectionTable) {
        self.push_to_connection(connections);
        self.pull_from_connection(connections);
        self.changed = false;
        self.applied_listeners.emit(&self.value);
    }

    pub fn on_quality_changed(&mut self, level: i32, connections: &mut ConnectionTable) {
        if let Some(connection) = self.connection.and_then(|h| connections.get_mut(h)) {
            connection.on_quality_changed(level);
        }
    }
}
