//! The settings registry
//!
//! `Settings` owns every setting, the connection table they point into and
//! the list of resolvers to notify. Its lifecycle is
//! `Unloaded -> Loading -> Ready`; `load` walks the whole sequence:
//!
//! 1. merge stored records into the registry
//! 2. initialize every connection (seeds defaults from live state)
//! 3. reset settings that have neither a connection nor stored data
//! 4. mark everything changed and apply in ascending connection order
//! 5. refresh registered resolvers
//!
//! Bulk operations always visit settings in ascending connection order so
//! that a connection with side effects on others (quality level) runs first.

use crate::connection::{AnyConnection, ConnectionHandle, ConnectionTable};
use crate::data::{self, SerializeError};
use crate::resolver::{Resolver, ResolverId};
use crate::setting::Setting;
use crate::storage::{Storage, StorageError};
use crate::input::KeyCombination;
use crate::value::{Color, DataType, OptionLabels, SettingValue};
use knob_metrics::{Counter, PassProfiler};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::rc::{Rc, Weak};
use thiserror::Error;
use tracing::{debug, error, trace, warn};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LoadState {
    Unloaded,
    Loading,
    Ready,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("setting '{id}' already exists as {existing}, cannot create it as {requested}")]
    TypeCollision {
        id: String,
        existing: DataType,
        requested: DataType,
    },

    #[error("setting '{0}' already exists")]
    DuplicateId(String),

    #[error("no setting with id '{0}'")]
    UnknownId(String),

    #[error("setting '{id}' holds {expected} values, got {found}")]
    TypeMismatch {
        id: String,
        expected: DataType,
        found: DataType,
    },

    #[error("connection {0} is not alive")]
    StaleConnection(ConnectionHandle),

    #[error("connection serves {found} values but setting '{id}' is {expected}")]
    ConnectionType {
        id: String,
        expected: DataType,
        found: DataType,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Serialize(#[from] SerializeError),
}

type ResolverSlot = (ResolverId, Weak<RefCell<dyn Resolver>>);

/// Registry of all settings.
pub struct Settings {
    settings: Vec<Setting>,
    index: HashMap<String, usize>,
    connections: ConnectionTable,
    resolvers: Vec<ResolverSlot>,
    next_resolver_id: u32,
    state: LoadState,
    apply_immediately: bool,
    counters: Counter,
    profiler: PassProfiler,
}

impl Settings {
    pub fn new() -> Self {
        Self {
            settings: Vec::new(),
            index: HashMap::new(),
            connections: ConnectionTable::new(),
            resolvers: Vec::new(),
            next_resolver_id: 0,
            state: LoadState::Unloaded,
            apply_immediately: false,
            counters: Counter::new(),
            profiler: PassProfiler::new(),
        }
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == LoadState::Ready
    }

    /// `apply_immediately` flag given to settings created from now on.
    pub fn set_apply_immediately_default(&mut self, apply_immediately: bool) {
        self.apply_immediately = apply_immediately;
    }

    pub fn apply_immediately_default(&self) -> bool {
        self.apply_immediately
    }

    pub fn len(&self) -> usize {
        self.settings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Setting> {
        self.settings.iter()
    }

    pub fn counters(&self) -> &Counter {
        &self.counters
    }

    pub fn profiler(&self) -> &PassProfiler {
        &self.profiler
    }

    // Connections

    pub fn create_connection(&mut self, connection: AnyConnection) -> ConnectionHandle {
        let handle = self.connections.create(connection);
        trace!(%handle, "connection created");
        handle
    }

    /// Destroy a connection. Settings still pointing at it behave as if they
    /// had none.
    pub fn destroy_connection(&mut self, handle: ConnectionHandle) -> bool {
        self.connections.destroy(handle)
    }

    pub fn connections(&self) -> &ConnectionTable {
        &self.connections
    }

    pub fn connections_mut(&mut self) -> &mut ConnectionTable {
        &mut self.connections
    }

    // Lookup

    pub fn has_id(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn get_setting(&self, id: &str) -> Option<&Setting> {
        self.index.get(id).map(|&i| &self.settings[i])
    }

    pub fn get_setting_mut(&mut self, id: &str) -> Option<SettingMut<'_>> {
        let index = *self.index.get(id)?;
        Some(SettingMut {
            setting: &mut self.settings[index],
            connections: &mut self.connections,
        })
    }

    fn get_typed(&self, id: &str, data_type: DataType) -> Option<&Setting> {
        self.get_setting(id)
            .filter(|setting| setting.data_type() == data_type)
    }

    pub fn value(&self, id: &str) -> Option<&SettingValue> {
        self.get_setting(id).map(Setting::value)
    }

    /// Set a value by id, running change listeners. A value of the wrong
    /// kind is logged and rejected.
    pub fn set_value(
        &mut self,
        id: &str,
        value: impl Into<SettingValue>,
    ) -> Result<(), SettingsError> {
        let value = value.into();
        let Some(mut setting) = self.get_setting_mut(id) else {
            warn!(id, "Cannot set value: unknown setting");
            return Err(SettingsError::UnknownId(id.to_owned()));
        };
        let expected = setting.data_type();
        if setting.set_value(value.clone()) {
            Ok(())
        } else {
            Err(SettingsError::TypeMismatch {
                id: id.to_owned(),
                expected,
                found: value.data_type(),
            })
        }
    }

    /// Labels currently offered by an option setting.
    pub fn option_labels(&mut self, id: &str) -> Option<OptionLabels> {
        self.get_setting_mut(id)?.option_labels()
    }

    /// Ids in lexicographic order, optionally restricted to `data_types`.
    pub fn setting_ids_ordered_by_name(&self, data_types: Option<&[DataType]>) -> Vec<String> {
        let mut ids: Vec<String> = self
            .settings
            .iter()
            .filter(|s| data_types.map_or(true, |types| s.matches_any_data_type(types)))
            .map(|s| s.id().to_owned())
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn settings_in_groups(&self, groups: &[&str]) -> Vec<&Setting> {
        self.settings
            .iter()
            .filter(|s| s.matches_any_group(groups))
            .collect()
    }

    // Creation and removal

    /// Add a fully built setting. Any existing setting with the same id is
    /// left untouched and the call fails.
    pub fn add_setting(&mut self, mut setting: Setting) -> Result<SettingMut<'_>, SettingsError> {
        if let Some(existing) = self.get_setting(setting.id()) {
            error!(
                id = setting.id(),
                existing = %existing.data_type(),
                "Duplicate setting id; creation aborted"
            );
            return Err(SettingsError::DuplicateId(setting.id().to_owned()));
        }

        setting.initialize_connection(&mut self.connections);
        let index = self.settings.len();
        self.index.insert(setting.id().to_owned(), index);
        self.settings.push(setting);
        Ok(SettingMut {
            setting: &mut self.settings[index],
            connections: &mut self.connections,
        })
    }

    /// Idempotent upsert.
    ///
    /// If no setting has `id`, one is created with `default`, `groups`,
    /// `labels` and `connection`. If one exists, non-empty `groups` are merged
    /// in, non-empty `labels` replace its labels, a supplied `connection`
    /// replaces its connection, and `default` is ignored. A setting that
    /// only exists because stored data mentioned it adopts `default`.
    ///
    /// An existing setting of another data type is never touched; the
    /// collision is logged and returned as an error.
    pub fn get_or_create(
        &mut self,
        id: &str,
        default: SettingValue,
        groups: &[&str],
        labels: Option<OptionLabels>,
        connection: Option<ConnectionHandle>,
    ) -> Result<SettingMut<'_>, SettingsError> {
        let requested = default.data_type();

        if let Some(existing) = self.get_setting(id) {
            if existing.data_type() != requested {
                error!(
                    id,
                    existing = %existing.data_type(),
                    %requested,
                    "Another setting with this id and a different type exists; creation aborted"
                );
                return Err(SettingsError::TypeCollision {
                    id: id.to_owned(),
                    existing: existing.data_type(),
                    requested,
                });
            }
        }
        if let Some(handle) = connection {
            self.check_connection(id, requested, handle)?;
        }

        let labels = labels.filter(|labels| !labels.is_empty());
        let index = match self.index.get(id) {
            Some(&index) => {
                let apply_immediately = self.apply_immediately;
                let setting = &mut self.settings[index];
                if !setting.is_declared() {
                    debug!(id, "Adopting setting loaded from storage");
                    setting.declare(default);
                    setting.set_apply_immediately(apply_immediately);
                }
                setting.add_groups(groups.iter().copied());
                index
            }
            None => {
                let mut setting = Setting::new(id, default);
                setting.set_groups(groups.iter().copied());
                setting.set_apply_immediately(self.apply_immediately);
                let index = self.settings.len();
                self.index.insert(id.to_owned(), index);
                self.settings.push(setting);
                index
            }
        };

        let relabelled = match labels {
            Some(labels) => self.settings[index].set_option_labels(labels),
            None => false,
        };
        if let Some(handle) = connection {
            self.settings[index].set_connection(Some(handle), &mut self.connections);
        }
        if relabelled {
            self.refresh_resolvers_for(id);
        }

        Ok(SettingMut {
            setting: &mut self.settings[index],
            connections: &mut self.connections,
        })
    }

    fn check_connection(
        &self,
        id: &str,
        expected: DataType,
        handle: ConnectionHandle,
    ) -> Result<(), SettingsError> {
        let Some(connection) = self.connections.get(handle) else {
            error!(id, %handle, "Connection is not alive");
            return Err(SettingsError::StaleConnection(handle));
        };
        if connection.data_type() != expected {
            error!(
                id,
                connection = %connection.data_type(),
                setting = %expected,
                "Connection type does not match setting"
            );
            return Err(SettingsError::ConnectionType {
                id: id.to_owned(),
                expected,
                found: connection.data_type(),
            });
        }
        Ok(())
    }

    pub fn get_or_create_option(
        &mut self,
        id: &str,
        default_index: i32,
        groups: &[&str],
        labels: Option<Vec<String>>,
        connection: Option<ConnectionHandle>,
    ) -> Result<SettingMut<'_>, SettingsError> {
        self.get_or_create(
            id,
            SettingValue::Option(default_index),
            groups,
            labels.map(OptionLabels::Strings),
            connection,
        )
    }

    pub fn get_or_create_color_option(
        &mut self,
        id: &str,
        default_index: i32,
        groups: &[&str],
        labels: Option<Vec<Color>>,
        connection: Option<ConnectionHandle>,
    ) -> Result<SettingMut<'_>, SettingsError> {
        self.get_or_create(
            id,
            SettingValue::ColorOption(default_index),
            groups,
            labels.map(OptionLabels::Colors),
            connection,
        )
    }

    pub fn get_option(&self, id: &str) -> Option<&Setting> {
        self.get_typed(id, DataType::Option)
    }

    pub fn get_color_option(&self, id: &str) -> Option<&Setting> {
        self.get_typed(id, DataType::ColorOption)
    }

    /// Remove a setting. Its connection, if any, stays alive.
    pub fn remove_setting(&mut self, id: &str) -> Option<Setting> {
        let index = self.index.remove(id)?;
        let setting = self.settings.remove(index);
        self.rebuild_index();
        Some(setting)
    }

    fn rebuild_index(&mut self) {
        self.index.clear();
        for (i, setting) in self.settings.iter().enumerate() {
            self.index.insert(setting.id().to_owned(), i);
        }
    }

    // Persistence

    /// Serialize every setting, including ones only known from stored data.
    pub fn to_json(&self) -> Result<String, SerializeError> {
        let records: Vec<_> = self
            .settings
            .iter()
            .map(Setting::serialize_value_to_data)
            .collect();
        data::to_json(&records)
    }

    /// Merge a stored document into the registry. Records for unknown ids
    /// become undeclared settings; mismatched or malformed records are
    /// logged and skipped. Returns the number of records taken.
    pub fn merge_json(&mut self, json: &str) -> Result<usize, SerializeError> {
        let records = data::from_json(json)?;
        let mut taken = 0;
        for record in &records {
            match self.index.get(&record.id) {
                Some(&index) => {
                    if self.settings[index].deserialize_value_from_data(record) {
                        taken += 1;
                    }
                }
                None => match Setting::from_data(record) {
                    Some(setting) => {
                        self.index.insert(record.id.clone(), self.settings.len());
                        self.settings.push(setting);
                        taken += 1;
                    }
                    None => warn!(id = %record.id, "Skipping unreadable stored setting"),
                },
            }
        }
        Ok(taken)
    }

    /// Load from `storage` and run the full post-load sequence. A missing or
    /// unreadable document leaves every setting at its default.
    pub fn load(&mut self, storage: &dyn Storage, key: &str) {
        self.state = LoadState::Loading;
        match storage.read_string(key) {
            Some(json) if !json.is_empty() => match self.merge_json(&json) {
                Ok(taken) => debug!(key, taken, "Loaded stored settings"),
                Err(e) => warn!(key, "Ignoring stored settings: {}", e),
            },
            _ => debug!(key, "No stored settings"),
        }
        self.post_load();
    }

    fn post_load(&mut self) {
        self.rebuild_index();

        for setting in self.settings.iter_mut() {
            setting.initialize_connection(&mut self.connections);
            if !setting.has_connection(&self.connections) && !setting.has_user_data() {
                setting.reset_to_default(&mut self.connections);
            }
        }

        for setting in self.settings.iter_mut() {
            setting.mark_as_changed();
        }

        self.apply(true);
        self.state = LoadState::Ready;
        self.refresh_registered_resolvers();
        debug!(settings = self.settings.len(), "Settings ready");
    }

    pub fn save(&self, storage: &mut dyn Storage, key: &str) -> Result<(), SettingsError> {
        let json = self.to_json()?;
        storage.write_string(key, &json)?;
        debug!(key, settings = self.settings.len(), "Saved settings");
        Ok(())
    }

    pub fn delete(storage: &mut dyn Storage, key: &str) -> Result<(), SettingsError> {
        storage.delete_key(key)?;
        debug!(key, "Deleted stored settings");
        Ok(())
    }

    // Bulk operations

    /// Indices sorted by ascending connection order, stable for ties.
    fn ordered_indices(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.settings.len()).collect();
        order.sort_by_key(|&i| self.settings[i].connection_order(&self.connections));
        order
    }

    /// Apply settings in ascending connection order; with `changed_only`
    /// only dirty settings are applied.
    pub fn apply(&mut self, changed_only: bool) {
        let order = self.ordered_indices();
        self.apply_indices(&order, changed_only);
    }

    /// `apply` restricted to settings in any of `groups`.
    pub fn apply_groups(&mut self, groups: &[&str], changed_only: bool) {
        let order: Vec<usize> = self
            .ordered_indices()
            .into_iter()
            .filter(|&i| self.settings[i].matches_any_group(groups))
            .collect();
        self.apply_indices(&order, changed_only);
    }

    fn apply_indices(&mut self, order: &[usize], changed_only: bool) {
        let Self {
            settings,
            connections,
            counters,
            profiler,
            ..
        } = self;

        if !changed_only {
            for &i in order {
                settings[i].mark_as_changed();
            }
        }

        let applied = profiler.time_pass("apply", || {
            let mut applied = 0;
            for &i in order {
                let setting = &mut settings[i];
                if !setting.has_unapplied_changes() {
                    continue;
                }
                trace!(id = setting.id(), "apply");
                setting.apply(connections);
                applied += 1;
            }
            applied
        });
        counters.increment("apply", applied);
    }

    /// Pull live values in connection order. With `except_unapplied`,
    /// settings holding unapplied edits keep them.
    pub fn pull_from_connections(&mut self, except_unapplied: bool) {
        for i in self.ordered_indices() {
            let setting = &mut self.settings[i];
            if except_unapplied && setting.has_unapplied_changes() {
                continue;
            }
            if setting.pull_from_connection(&mut self.connections) {
                self.counters.increment("pull", 1);
            }
        }
    }

    pub fn push_to_connections(&mut self) {
        for i in self.ordered_indices() {
            self.push_index(i);
        }
    }

    pub fn push_to_connections_in_groups(&mut self, groups: &[&str]) {
        for i in self.ordered_indices() {
            if self.settings[i].matches_any_group(groups) {
                self.push_index(i);
            }
        }
    }

    fn push_index(&mut self, i: usize) {
        let setting = &mut self.settings[i];
        if setting.has_connection(&self.connections) {
            setting.push_to_connection(&mut self.connections);
            self.counters.increment("push", 1);
        }
    }

    pub fn has_unapplied_changes(&self) -> bool {
        self.settings.iter().any(Setting::has_unapplied_changes)
    }

    /// Reset every setting to its default, then refresh resolvers.
    pub fn reset_all(&mut self) {
        self.reset_matching(|_| true);
    }

    pub fn reset_ids(&mut self, ids: &[&str]) {
        self.reset_matching(|s| ids.iter().any(|id| s.matches_id(id)));
    }

    pub fn reset_groups(&mut self, groups: &[&str]) {
        self.reset_matching(|s| s.matches_any_group(groups));
    }

    fn reset_matching(&mut self, mut matches: impl FnMut(&Setting) -> bool) {
        for i in self.ordered_indices() {
            if matches(&self.settings[i]) {
                self.settings[i].reset_to_default(&mut self.connections);
            }
        }
        self.refresh_registered_resolvers();
    }

    /// Forward a quality level change to every connection in order.
    pub fn on_quality_changed(&mut self, level: i32, exclude_changed: bool) {
        for i in self.ordered_indices() {
            let setting = &mut self.settings[i];
            if exclude_changed && setting.has_unapplied_changes() {
                continue;
            }
            setting.on_quality_changed(level, &mut self.connections);
        }
    }

    // Resolvers

    /// Add a resolver to the refresh list. The registry holds it weakly;
    /// registering the same resolver twice returns the first id.
    pub fn register_resolver<R: Resolver + 'static>(
        &mut self,
        resolver: &Rc<RefCell<R>>,
    ) -> ResolverId {
        let resolver: Rc<RefCell<dyn Resolver>> = resolver.clone();
        let weak = Rc::downgrade(&resolver);
        if let Some((id, _)) = self.resolvers.iter().find(|(_, w)| w.ptr_eq(&weak)) {
            return *id;
        }

        let id = ResolverId::new(self.next_resolver_id);
        self.next_resolver_id = self.next_resolver_id.wrapping_add(1);
        self.resolvers.push((id, weak));
        id
    }

    pub fn unregister_resolver(&mut self, id: ResolverId) -> bool {
        let before = self.resolvers.len();
        self.resolvers.retain(|(rid, _)| *rid != id);
        self.resolvers.len() != before
    }

    pub fn resolver_count(&self) -> usize {
        self.resolvers.len()
    }

    /// Refresh every registered resolver.
    pub fn refresh_registered_resolvers(&mut self) {
        self.refresh_resolvers_where(|_| true);
    }

    /// Refresh resolvers bound to `id`.
    pub fn refresh_resolvers_for(&mut self, id: &str) {
        self.refresh_resolvers_where(|resolver| resolver.setting_id() == id);
    }

    /// Visit a snapshot of the list. A resolver unregistered by an earlier
    /// one in the same pass is skipped; one registered during the pass
    /// waits for the next. A resolver that is already borrowed (it started
    /// this refresh) is skipped.
    fn refresh_resolvers_where(&mut self, mut select: impl FnMut(&dyn Resolver) -> bool) {
        let snapshot = self.resolvers.clone();
        for (id, weak) in snapshot {
            if !self.resolvers.iter().any(|(rid, _)| *rid == id) {
                continue;
            }
            let Some(resolver) = weak.upgrade() else {
                continue;
            };
            let Ok(mut resolver) = resolver.try_borrow_mut() else {
                trace!(%id, "resolver busy, skipped");
                continue;
            };
            if select(&*resolver) {
                resolver.refresh(self);
            }
        }
        self.resolvers.retain(|(_, weak)| weak.strong_count() > 0);
    }

    /// Drop every setting and resolver, destroy every connection and return
    /// to `Unloaded`. Connection handles held elsewhere go stale. The
    /// `apply_immediately` default survives.
    pub fn teardown(&mut self) {
        let apply_immediately = self.apply_immediately;
        self.connections.clear();
        *self = Settings::new();
        self.apply_immediately = apply_immediately;
        debug!("Settings torn down");
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("state", &self.state)
            .field("settings", &self.settings.len())
            .field("connections", &self.connections.len())
            .field("resolvers", &self.resolvers.len())
            .finish()
    }
}

macro_rules! typed_access {
    ($($variant:ident: $ty:ty => $create:ident, $get:ident;)+) => {
        impl Settings {
            $(
                pub fn $create(
                    &mut self,
                    id: &str,
                    default: $ty,
                    groups: &[&str],
                    connection: Option<ConnectionHandle>,
                ) -> Result<SettingMut<'_>, SettingsError> {
                    self.get_or_create(id, SettingValue::$variant(default.into()), groups, None, connection)
                }

                pub fn $get(&self, id: &str) -> Option<&Setting> {
                    self.get_typed(id, DataType::$variant)
                }
            )+
        }
    };
}

typed_access! {
    Bool: bool => get_or_create_bool, get_bool;
    Int: i32 => get_or_create_int, get_int;
    Float: f32 => get_or_create_float, get_float;
    String: &str => get_or_create_string, get_string;
    Color: Color => get_or_create_color, get_color;
    KeyCombination: KeyCombination => get_or_create_key_combination, get_key_combination;
}

/// Mutable access to one setting together with the connection table it
/// needs for push and pull.
pub struct SettingMut<'a> {
    setting: &'a mut Setting,
    connections: &'a mut ConnectionTable,
}

impl SettingMut<'_> {
    /// Set and propagate (listeners, changed flag, immediate push).
    pub fn set_value(&mut self, value: impl Into<SettingValue>) -> bool {
        self.setting.set_value(value, true, self.connections)
    }

    /// Set without marking changed or running listeners.
    pub fn set_value_silently(&mut self, value: impl Into<SettingValue>) -> bool {
        self.setting.set_value(value, false, self.connections)
    }

    pub fn reset_to_default(&mut self) {
        self.setting.reset_to_default(self.connections);
    }

    pub fn apply(&mut self) {
        self.setting.apply(self.connections);
    }

    pub fn push_to_connection(&mut self) {
        self.setting.push_to_connection(self.connections);
    }

    pub fn pull_from_connection(&mut self) -> bool {
        self.setting.pull_from_connection(self.connections)
    }

    pub fn set_connection(&mut self, handle: Option<ConnectionHandle>) -> bool {
        self.setting.set_connection(handle, self.connections)
    }

    pub fn has_connection(&self) -> bool {
        self.setting.has_connection(self.connections)
    }

    pub fn connection_order(&self) -> i32 {
        self.setting.connection_order(self.connections)
    }

    pub fn option_labels(&mut self) -> Option<OptionLabels> {
        self.setting.option_labels(self.connections)
    }

    /// Replace the setting's labels and, unless the setting overrides its
    /// connection's labels, the connection's too.
    pub fn set_option_labels(&mut self, labels: OptionLabels) -> bool {
        if !self.setting.set_option_labels(labels.clone()) {
            return false;
        }
        if !self.setting.override_connection_labels() {
            if let Some(connection) = self
                .setting
                .connection()
                .and_then(|handle| self.connections.get_mut(handle))
            {
                connection.set_option_labels(labels);
            }
        }
        true
    }

    pub fn on_quality_changed(&mut self, level: i32) {
        self.setting.on_quality_changed(level, self.connections);
    }
}

impl Deref for SettingMut<'_> {
    type Target = Setting;

    fn deref(&self) -> &Setting {
        self.setting
    }
}

impl DerefMut for SettingMut<'_> {
    fn deref_mut(&mut self) -> &mut Setting {
        self.setting
    }
}

impl fmt::Debug for SettingMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.setting, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{CallbackConnection, Connection, ConnectionBase};
    use crate::data::SettingData;
    use crate::storage::MemoryStorage;
    use proptest::prelude::*;
    use std::cell::Cell;

    const KEY: &str = "TestSettings";

    /// Records connection traffic across every connection it is wired into.
    #[derive(Default)]
    struct Probe {
        writes: Cell<u32>,
        written: RefCell<Vec<i32>>,
        read: RefCell<Vec<i32>>,
    }

    /// Int connection with the given order; logs its order on every read
    /// and write. `step` > 1 snaps writes to multiples of `step`.
    fn probed_int(probe: &Rc<Probe>, order: i32, initial: i32, step: i32) -> AnyConnection {
        let live = Rc::new(Cell::new(initial));
        let (get_live, set_live) = (live.clone(), live);
        let (get_probe, set_probe) = (probe.clone(), probe.clone());
        AnyConnection::int(
            CallbackConnection::new(
                move || {
                    get_probe.read.borrow_mut().push(order);
                    get_live.get()
                },
                move |v: i32| {
                    set_probe.writes.set(set_probe.writes.get() + 1);
                    set_probe.written.borrow_mut().push(order);
                    set_live.set((v + step / 2) / step * step);
                },
            )
            .with_order(order),
        )
    }

    fn stored(records: &[SettingData]) -> MemoryStorage {
        let mut storage = MemoryStorage::new();
        storage
            .write_string(KEY, &data::to_json(records).unwrap())
            .unwrap();
        storage
    }

    #[test]
    fn default_applies_without_stored_data() {
        let mut settings = Settings::new();
        assert_eq!(settings.state(), LoadState::Unloaded);
        settings
            .get_or_create_float("volume", 0.5, &[], None)
            .unwrap();

        settings.load(&MemoryStorage::new(), KEY);

        assert!(settings.is_ready());
        let volume = settings.get_float("volume").unwrap();
        assert_eq!(volume.value(), &SettingValue::Float(0.5));
        assert!(!volume.has_user_data());
        assert!(!settings.has_unapplied_changes());
    }

    #[test]
    fn saved_value_survives_a_fresh_registry() {
        let mut storage = MemoryStorage::new();
        let mut first = Settings::new();
        first.get_or_create_float("volume", 0.5, &[], None).unwrap();
        first.load(&storage, KEY);
        first.set_value("volume", 0.8f32).unwrap();
        first.save(&mut storage, KEY).unwrap();

        let mut second = Settings::new();
        second.get_or_create_float("volume", 0.5, &[], None).unwrap();
        second.load(&storage, KEY);

        let volume = second.get_float("volume").unwrap();
        assert_eq!(volume.value().as_float(), Some(0.8));
        assert!(volume.has_user_data());
        assert_eq!(volume.default_value(), &SettingValue::Float(0.5));
    }

    #[test]
    fn stored_setting_is_adopted_when_declared_later() {
        let storage = stored(&[SettingData::from_value("volume", &SettingValue::Float(0.8))]);
        let mut settings = Settings::new();
        settings.load(&storage, KEY);
        assert_eq!(settings.value("volume"), Some(&SettingValue::Float(0.8)));

        let volume = settings
            .get_or_create_float("volume", 0.5, &["audio"], None)
            .unwrap();
        assert_eq!(volume.value(), &SettingValue::Float(0.8));
        assert_eq!(volume.default_value(), &SettingValue::Float(0.5));
        assert_eq!(volume.groups().to_vec(), vec!["audio".to_string()]);
    }

    #[test]
    fn apply_snaps_through_connection() {
        let probe = Rc::new(Probe::default());
        let mut settings = Settings::new();
        let handle = settings.create_connection(probed_int(&probe, 0, 20, 10));
        settings
            .get_or_create_int("detail", 0, &[], Some(handle))
            .unwrap();
        settings.load(&MemoryStorage::new(), KEY);

        settings.set_value("detail", 47).unwrap();
        settings.apply(true);

        assert_eq!(settings.value("detail"), Some(&SettingValue::Int(50)));
        assert!(!settings.has_unapplied_changes());
    }

    #[test]
    fn connection_default_wins_unless_user_data() {
        let probe = Rc::new(Probe::default());
        let mut settings = Settings::new();
        let fresh = settings.create_connection(probed_int(&probe, 0, 30, 1));
        let saved = settings.create_connection(probed_int(&probe, 0, 30, 1));
        settings.get_or_create_int("fresh", 5, &[], Some(fresh)).unwrap();
        settings.get_or_create_int("saved", 5, &[], Some(saved)).unwrap();

        let storage = stored(&[SettingData::from_value("saved", &SettingValue::Int(70))]);
        settings.load(&storage, KEY);

        assert_eq!(settings.value("fresh"), Some(&SettingValue::Int(30)));
        assert_eq!(settings.value("saved"), Some(&SettingValue::Int(70)));
        assert_eq!(
            settings.get_int("saved").map(|s| s.default_value().clone()),
            Some(SettingValue::Int(30))
        );
    }

    #[test]
    fn type_collision_leaves_registry_untouched() {
        let mut settings = Settings::new();
        settings.get_or_create_float("volume", 0.5, &[], None).unwrap();

        let err = settings
            .get_or_create_bool("volume", true, &["audio"], None)
            .unwrap_err();
        assert!(matches!(
            err,
            SettingsError::TypeCollision {
                existing: DataType::Float,
                requested: DataType::Bool,
                ..
            }
        ));
        assert_eq!(settings.len(), 1);
        let volume = settings.get_setting("volume").unwrap();
        assert_eq!(volume.value(), &SettingValue::Float(0.5));
        assert!(volume.groups().is_empty());
        assert!(settings.get_bool("volume").is_none());
    }

    #[test]
    fn explicit_add_rejects_any_duplicate() {
        let mut settings = Settings::new();
        settings
            .add_setting(Setting::new("volume", SettingValue::Float(0.5)))
            .unwrap();
        assert!(matches!(
            settings.add_setting(Setting::new("volume", SettingValue::Float(0.1))),
            Err(SettingsError::DuplicateId(_))
        ));
        assert_eq!(settings.value("volume"), Some(&SettingValue::Float(0.5)));
    }

    #[test]
    fn remove_then_recreate_with_other_type() {
        let probe = Rc::new(Probe::default());
        let mut settings = Settings::new();
        let handle = settings.create_connection(probed_int(&probe, 0, 1, 1));
        settings.get_or_create_int("volume", 1, &[], Some(handle)).unwrap();

        let removed = settings.remove_setting("volume").unwrap();
        assert_eq!(removed.connection(), Some(handle));
        assert!(settings.get_setting("volume").is_none());
        assert!(settings.connections().is_alive(handle));

        settings.get_or_create_bool("volume", true, &[], None).unwrap();
        assert_eq!(settings.value("volume"), Some(&SettingValue::Bool(true)));
    }

    #[test]
    fn mismatched_stored_record_is_skipped() {
        let storage = stored(&[
            SettingData::from_value("volume", &SettingValue::Int(3)),
            SettingData::from_value("fps", &SettingValue::Int(30)),
        ]);
        let mut settings = Settings::new();
        settings.get_or_create_float("volume", 0.5, &[], None).unwrap();
        settings.get_or_create_int("fps", 60, &[], None).unwrap();
        settings.load(&storage, KEY);

        let volume = settings.get_setting("volume").unwrap();
        assert_eq!(volume.value(), &SettingValue::Float(0.5));
        assert!(!volume.has_user_data());
        assert_eq!(settings.value("fps"), Some(&SettingValue::Int(30)));
    }

    #[test]
    fn unreadable_document_loads_defaults() {
        let mut storage = MemoryStorage::new();
        storage.write_string(KEY, "{ not json").unwrap();
        let mut settings = Settings::new();
        settings.get_or_create_int("fps", 60, &[], None).unwrap();
        settings.load(&storage, KEY);

        assert!(settings.is_ready());
        assert_eq!(settings.value("fps"), Some(&SettingValue::Int(60)));
    }

    #[test]
    fn unknown_stored_ids_are_kept_on_save() {
        let storage = stored(&[SettingData::from_value("legacy", &SettingValue::Bool(true))]);
        let mut settings = Settings::new();
        settings.load(&storage, KEY);

        let mut out = MemoryStorage::new();
        settings.save(&mut out, KEY).unwrap();
        let records = data::from_json(&out.read_string(KEY).unwrap()).unwrap();
        assert_eq!(records[0].id, "legacy");
    }

    #[test]
    fn pull_keeps_unapplied_edits_when_asked() {
        let probe = Rc::new(Probe::default());
        let mut settings = Settings::new();
        let handle = settings.create_connection(probed_int(&probe, 0, 10, 1));
        settings.get_or_create_int("detail", 0, &[], Some(handle)).unwrap();
        settings.load(&MemoryStorage::new(), KEY);

        settings.set_value("detail", 90).unwrap();
        settings.pull_from_connections(true);
        assert_eq!(settings.value("detail"), Some(&SettingValue::Int(90)));

        settings.pull_from_connections(false);
        assert_eq!(settings.value("detail"), Some(&SettingValue::Int(10)));
    }

    #[test]
    fn resets_by_id_and_group() {
        let mut settings = Settings::new();
        settings.get_or_create_float("music", 0.5, &["audio"], None).unwrap();
        settings.get_or_create_float("sfx", 0.5, &["audio"], None).unwrap();
        settings.get_or_create_int("fps", 60, &["video"], None).unwrap();
        settings.load(&MemoryStorage::new(), KEY);

        settings.set_value("music", 0.1f32).unwrap();
        settings.set_value("sfx", 0.2f32).unwrap();
        settings.set_value("fps", 30).unwrap();

        settings.reset_ids(&["music"]);
        assert_eq!(settings.value("music"), Some(&SettingValue::Float(0.5)));
        assert_eq!(settings.value("sfx"), Some(&SettingValue::Float(0.2)));

        settings.reset_groups(&["audio"]);
        assert_eq!(settings.value("sfx"), Some(&SettingValue::Float(0.5)));
        assert_eq!(settings.value("fps"), Some(&SettingValue::Int(30)));

        settings.reset_all();
        assert_eq!(settings.value("fps"), Some(&SettingValue::Int(60)));
    }

    #[test]
    fn apply_groups_only_touches_members() {
        let mut settings = Settings::new();
        settings.get_or_create_float("music", 0.5, &["audio"], None).unwrap();
        settings.get_or_create_int("fps", 60, &["video"], None).unwrap();
        settings.load(&MemoryStorage::new(), KEY);

        settings.set_value("music", 0.1f32).unwrap();
        settings.set_value("fps", 30).unwrap();
        settings.apply_groups(&["audio"], true);

        assert!(!settings.get_setting("music").unwrap().has_unapplied_changes());
        assert!(settings.get_setting("fps").unwrap().has_unapplied_changes());
        assert!(settings.has_unapplied_changes());
    }

    #[test]
    fn ids_ordered_by_name_with_type_filter() {
        let mut settings = Settings::new();
        settings.get_or_create_int("fps", 60, &[], None).unwrap();
        settings.get_or_create_float("volume", 0.5, &[], None).unwrap();
        settings.get_or_create_float("brightness", 0.5, &[], None).unwrap();

        assert_eq!(
            settings.setting_ids_ordered_by_name(None),
            vec!["brightness", "fps", "volume"]
        );
        assert_eq!(
            settings.setting_ids_ordered_by_name(Some(&[DataType::Float][..])),
            vec!["brightness", "volume"]
        );
    }

    #[test]
    fn groups_merge_on_repeated_get_or_create() {
        let mut settings = Settings::new();
        settings.get_or_create_float("music", 0.5, &["audio"], None).unwrap();
        settings.get_or_create_float("music", 0.9, &["mix"], None).unwrap();

        let music = settings.get_setting("music").unwrap();
        assert_eq!(music.default_value(), &SettingValue::Float(0.5));
        assert_eq!(settings.settings_in_groups(&["mix"]).len(), 1);
        assert_eq!(settings.settings_in_groups(&["audio"]).len(), 1);
    }

    #[test]
    fn destroyed_connection_degrades_to_plain_setting() {
        let probe = Rc::new(Probe::default());
        let mut settings = Settings::new();
        let handle = settings.create_connection(probed_int(&probe, -10, 40, 1));
        settings.get_or_create_int("detail", 0, &[], Some(handle)).unwrap();
        settings.load(&MemoryStorage::new(), KEY);
        let writes = probe.writes.get();

        assert!(settings.destroy_connection(handle));
        settings.set_value("detail", 11).unwrap();
        settings.apply(true);

        assert_eq!(probe.writes.get(), writes);
        assert_eq!(settings.value("detail"), Some(&SettingValue::Int(11)));
        assert!(matches!(
            settings.get_or_create_int("other", 0, &[], Some(handle)),
            Err(SettingsError::StaleConnection(_))
        ));
    }

    #[test]
    fn connection_of_wrong_type_is_refused_before_creation() {
        let mut settings = Settings::new();
        let handle = settings.create_connection(AnyConnection::bool(CallbackConnection::new(
            || false,
            |_| {},
        )));
        assert!(matches!(
            settings.get_or_create_float("volume", 0.5, &[], Some(handle)),
            Err(SettingsError::ConnectionType { .. })
        ));
        assert!(settings.is_empty());
    }

    #[test]
    fn set_value_checks_id_and_type() {
        let mut settings = Settings::new();
        settings.get_or_create_float("volume", 0.5, &[], None).unwrap();
        assert!(matches!(
            settings.set_value("missing", 1.0f32),
            Err(SettingsError::UnknownId(_))
        ));
        assert!(matches!(
            settings.set_value("volume", "loud"),
            Err(SettingsError::TypeMismatch {
                expected: DataType::Float,
                found: DataType::String,
                ..
            })
        ));
    }

    #[test]
    fn quality_change_reaches_connections() {
        let seen = Rc::new(Cell::new(-1));

        struct QualityProbe {
            base: crate::connection::ConnectionBase<bool>,
            seen: Rc<Cell<i32>>,
        }

        impl crate::connection::Connection<bool> for QualityProbe {
            fn base(&self) -> &crate::connection::ConnectionBase<bool> {
                &self.base
            }
            fn base_mut(&mut self) -> &mut crate::connection::ConnectionBase<bool> {
                &mut self.base
            }
            fn get(&mut self) -> bool {
                true
            }
            fn set(&mut self, value: bool) {
                self.base.notify_listeners_if_changed(value);
            }
            fn on_quality_changed(&mut self, level: i32) {
                self.seen.set(level);
            }
        }

        let mut settings = Settings::new();
        let handle = settings.create_connection(AnyConnection::bool(QualityProbe {
            base: Default::default(),
            seen: seen.clone(),
        }));
        settings.get_or_create_bool("shadows", true, &[], Some(handle)).unwrap();
        settings.on_quality_changed(3, false);
        assert_eq!(seen.get(), 3);
    }

    struct CountingResolver {
        id: String,
        refreshes: Rc<Cell<u32>>,
        unregister_on_refresh: Option<ResolverId>,
    }

    impl Resolver for CountingResolver {
        fn setting_id(&self) -> &str {
            &self.id
        }

        fn supported_data_types(&self) -> &[DataType] {
            &[]
        }

        fn refresh(&mut self, settings: &mut Settings) {
            self.refreshes.set(self.refreshes.get() + 1);
            if let Some(id) = self.unregister_on_refresh.take() {
                settings.unregister_resolver(id);
            }
        }
    }

    fn counting(id: &str, refreshes: &Rc<Cell<u32>>) -> Rc<RefCell<CountingResolver>> {
        Rc::new(RefCell::new(CountingResolver {
            id: id.to_owned(),
            refreshes: refreshes.clone(),
            unregister_on_refresh: None,
        }))
    }

    #[test]
    fn resolver_unregistered_mid_refresh_is_skipped() {
        let (a_count, b_count, c_count) = (
            Rc::new(Cell::new(0)),
            Rc::new(Cell::new(0)),
            Rc::new(Cell::new(0)),
        );
        let a = counting("volume", &a_count);
        let b = counting("volume", &b_count);
        let c = counting("volume", &c_count);

        let mut settings = Settings::new();
        settings.register_resolver(&a);
        let b_id = settings.register_resolver(&b);
        settings.register_resolver(&c);
        assert_eq!(settings.register_resolver(&b), b_id);
        a.borrow_mut().unregister_on_refresh = Some(b_id);

        settings.refresh_registered_resolvers();

        assert_eq!(a_count.get(), 1);
        assert_eq!(b_count.get(), 0);
        assert_eq!(c_count.get(), 1);
        assert_eq!(settings.resolver_count(), 2);
    }

    #[test]
    fn dropped_resolvers_are_pruned() {
        let count = Rc::new(Cell::new(0));
        let mut settings = Settings::new();
        {
            let gone = counting("volume", &count);
            settings.register_resolver(&gone);
        }
        let kept = counting("fps", &count);
        settings.register_resolver(&kept);

        settings.refresh_resolvers_for("fps");
        assert_eq!(count.get(), 1);
        assert_eq!(settings.resolver_count(), 1);
    }

    /// Bool connection that counts `destroy` calls.
    struct Disposable {
        base: ConnectionBase<bool>,
        destroyed: Rc<Cell<u32>>,
    }

    impl Connection<bool> for Disposable {
        fn base(&self) -> &ConnectionBase<bool> {
            &self.base
        }

        fn base_mut(&mut self) -> &mut ConnectionBase<bool> {
            &mut self.base
        }

        fn get(&mut self) -> bool {
            false
        }

        fn set(&mut self, value: bool) {
            self.base.notify_listeners_if_changed(value);
        }

        fn destroy(&mut self) {
            self.destroyed.set(self.destroyed.get() + 1);
        }
    }

    #[test]
    fn teardown_destroys_connections() {
        let destroyed = Rc::new(Cell::new(0));
        let mut settings = Settings::new();
        let handle = settings.create_connection(AnyConnection::bool(Disposable {
            base: ConnectionBase::new(),
            destroyed: destroyed.clone(),
        }));
        settings.get_or_create_bool("vsync", true, &[], Some(handle)).unwrap();
        settings.load(&MemoryStorage::new(), KEY);

        settings.teardown();

        assert_eq!(destroyed.get(), 1);
        assert!(settings.connections().is_empty());
        assert!(!settings.connections().is_alive(handle));
    }

    #[test]
    fn binding_a_connection_overwrites_value_silently() {
        let probe = Rc::new(Probe::default());
        let fired = Rc::new(Cell::new(0));
        let mut settings = Settings::new();
        {
            let fired = fired.clone();
            let mut fov = settings.get_or_create_int("fov", 5, &[], None).unwrap();
            fov.add_change_listener(move |_| fired.set(fired.get() + 1));
        }

        let handle = settings.create_connection(probed_int(&probe, 0, 30, 1));
        assert!(settings.get_setting_mut("fov").unwrap().set_connection(Some(handle)));
        assert_eq!(settings.value("fov"), Some(&SettingValue::Int(30)));

        settings.load(&MemoryStorage::new(), KEY);

        assert_eq!(settings.value("fov"), Some(&SettingValue::Int(30)));
        assert_eq!(fired.get(), 0);
    }

    #[test]
    fn teardown_returns_to_unloaded() {
        let mut settings = Settings::new();
        settings.set_apply_immediately_default(true);
        settings.get_or_create_int("fps", 60, &[], None).unwrap();
        settings.load(&MemoryStorage::new(), KEY);
        settings.teardown();

        assert_eq!(settings.state(), LoadState::Unloaded);
        assert!(settings.is_empty());
        assert!(settings.apply_immediately_default());
    }

    proptest! {
        #[test]
        fn second_apply_writes_nothing(
            specs in prop::collection::vec((-50i32..50, 0i32..100, any::<bool>()), 1..12)
        ) {
            let probe = Rc::new(Probe::default());
            let mut settings = Settings::new();
            let mut records = Vec::new();
            for (i, (order, initial, has_stored)) in specs.iter().copied().enumerate() {
                let id = format!("s{i}");
                let handle = settings.create_connection(probed_int(&probe, order, initial, 5));
                settings.get_or_create_int(&id, 0, &[], Some(handle)).unwrap();
                if has_stored {
                    records.push(SettingData::from_value(id, &SettingValue::Int(initial + 3)));
                }
            }

            settings.load(&stored(&records), KEY);
            prop_assert!(!settings.has_unapplied_changes());
            let writes = probe.writes.get();

            settings.apply(true);
            prop_assert_eq!(probe.writes.get(), writes);
        }

        #[test]
        fn bulk_passes_follow_connection_order(
            orders in prop::collection::vec(-100i32..100, 1..16)
        ) {
            let probe = Rc::new(Probe::default());
            let mut settings = Settings::new();
            for (i, order) in orders.iter().copied().enumerate() {
                let handle = settings.create_connection(probed_int(&probe, order, 0, 1));
                settings.get_or_create_int(&format!("s{i}"), 0, &[], Some(handle)).unwrap();
            }
            settings.load(&MemoryStorage::new(), KEY);

            probe.written.borrow_mut().clear();
            settings.apply(false);
            let written = probe.written.borrow().clone();
            prop_assert_eq!(written.len(), orders.len());
            prop_assert!(written.windows(2).all(|w| w[0] <= w[1]));

            probe.read.borrow_mut().clear();
            settings.pull_from_connections(false);
            let read = probe.read.borrow().clone();
            prop_assert_eq!(read.len(), orders.len());
            prop_assert!(read.windows(2).all(|w| w[0] <= w[1]));
        }
    }
}
