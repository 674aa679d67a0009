//! Settings provider
//!
//! Owns the `Settings` registry and its storage. The registry is built on
//! first access: the setup closure declares settings and connections, then
//! stored data is loaded and applied. Components that need settings are
//! handed the provider (or the registry) explicitly.

use crate::config::ProviderConfig;
use crate::storage::FileStorage;
use knob_core::{Settings, SettingsError, Storage};
use tracing::{debug, info};

type Setup = Box<dyn FnMut(&mut Settings)>;

pub struct SettingsProvider {
    config: ProviderConfig,
    storage: Box<dyn Storage>,
    setup: Option<Setup>,
    settings: Option<Settings>,
}

impl SettingsProvider {
    pub fn new(config: ProviderConfig, storage: impl Storage + 'static) -> Self {
        Self {
            config,
            storage: Box::new(storage),
            setup: None,
            settings: None,
        }
    }

    /// Provider over `FileStorage` in the configured directory.
    pub fn from_config(config: ProviderConfig) -> Self {
        let storage = FileStorage::new(config.storage_dir());
        Self::new(config, storage)
    }

    /// Closure run on every fresh registry before stored data is loaded.
    pub fn with_setup(mut self, setup: impl FnMut(&mut Settings) + 'static) -> Self {
        self.setup = Some(Box::new(setup));
        self
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn storage_key(&self) -> &str {
        &self.config.storage_key
    }

    pub fn storage(&self) -> &dyn Storage {
        &*self.storage
    }

    /// Whether the registry has been built and loaded.
    pub fn has_settings(&self) -> bool {
        self.settings.is_some()
    }

    /// The registry, if it has been built.
    pub fn settings(&self) -> Option<&Settings> {
        self.settings.as_ref()
    }

    /// The registry, building and loading it on first access.
    pub fn settings_mut(&mut self) -> &mut Settings {
        self.parts().0
    }

    fn parts(&mut self) -> (&mut Settings, &mut dyn Storage, &str) {
        let Self {
            config,
            storage,
            setup,
            settings,
        } = self;

        let settings = settings.get_or_insert_with(|| {
            let mut fresh = Settings::new();
            fresh.set_apply_immediately_default(config.apply_immediately);
            if let Some(setup) = setup.as_mut() {
                setup(&mut fresh);
            }
            fresh.load(&**storage, &config.storage_key);
            info!(
                key = %config.storage_key,
                settings = fresh.len(),
                "Settings loaded"
            );
            fresh
        });
        (settings, &mut **storage, &config.storage_key)
    }

    /// Load on first use; afterwards pull live values (they seed defaults)
    /// and reload stored data over them.
    pub fn load(&mut self) {
        if !self.has_settings() {
            self.settings_mut();
            return;
        }
        let (settings, storage, key) = self.parts();
        settings.pull_from_connections(false);
        settings.load(storage, key);
    }

    /// Discard unsaved edits by reloading stored data.
    pub fn reset_to_last_save(&mut self) {
        let (settings, storage, key) = self.parts();
        settings.load(storage, key);
    }

    pub fn save(&mut self) -> Result<(), SettingsError> {
        let (settings, storage, key) = self.parts();
        settings.save(storage, key)
    }

    /// Remove stored data. The live registry keeps its values.
    pub fn delete(&mut self) -> Result<(), SettingsError> {
        Settings::delete(&mut *self.storage, &self.config.storage_key)
    }

    pub fn reset(&mut self) {
        self.settings_mut().reset_all();
    }

    pub fn reset_ids(&mut self, ids: &[&str]) {
        self.settings_mut().reset_ids(ids);
    }

    pub fn reset_groups(&mut self, groups: &[&str]) {
        self.settings_mut().reset_groups(groups);
    }

    pub fn apply(&mut self) {
        self.settings_mut().apply(true);
    }

    /// Drop the registry. The next access builds and loads a fresh one.
    pub fn teardown(&mut self) {
        if let Some(mut settings) = self.settings.take() {
            settings.teardown();
            debug!(key = %self.config.storage_key, "Provider torn down");
        }
    }
}

impl std::fmt::Debug for SettingsProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsProvider")
            .field("config", &self.config)
            .field("settings", &self.settings)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use knob_core::{AnyConnection, CallbackConnection, LoadState, MemoryStorage, SettingValue};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    fn file_provider(dir: &std::path::Path) -> SettingsProvider {
        let config = ProviderConfig {
            storage_dir: Some(dir.to_owned()),
            ..ProviderConfig::default()
        };
        SettingsProvider::from_config(config).with_setup(|settings| {
            settings
                .get_or_create_float("volume", 0.5, &["audio"], None)
                .unwrap();
            settings
                .get_or_create_int("fps", 60, &["video"], None)
                .unwrap();
        })
    }

    #[test]
    fn registry_is_built_on_first_access() {
        let setups = Rc::new(Cell::new(0));
        let mut provider = {
            let setups = setups.clone();
            SettingsProvider::new(ProviderConfig::default(), MemoryStorage::new())
                .with_setup(move |_| setups.set(setups.get() + 1))
        };
        assert!(!provider.has_settings());
        assert!(provider.settings().is_none());

        assert_eq!(provider.settings_mut().state(), LoadState::Ready);
        provider.settings_mut();
        assert_eq!(setups.get(), 1);
    }

    #[test]
    fn save_and_reload_across_providers() {
        let dir = tempfile::tempdir().unwrap();

        let mut first = file_provider(dir.path());
        first.settings_mut().set_value("volume", 0.8f32).unwrap();
        first.save().unwrap();

        let mut second = file_provider(dir.path());
        let volume = second.settings_mut().get_float("volume").unwrap();
        assert_eq!(volume.value().as_float(), Some(0.8));
        assert!(volume.has_user_data());

        second.delete().unwrap();
        let mut third = file_provider(dir.path());
        assert_eq!(
            third.settings_mut().value("volume"),
            Some(&SettingValue::Float(0.5))
        );
    }

    #[test]
    fn reset_to_last_save_discards_edits() {
        let dir = tempfile::tempdir().unwrap();
        let mut provider = file_provider(dir.path());
        provider.settings_mut().set_value("fps", 30).unwrap();
        provider.save().unwrap();

        provider.settings_mut().set_value("fps", 144).unwrap();
        provider.reset_to_last_save();
        assert_eq!(
            provider.settings_mut().value("fps"),
            Some(&SettingValue::Int(30))
        );
        assert!(!provider.settings_mut().has_unapplied_changes());
    }

    #[test]
    fn reset_groups_and_apply() {
        let dir = tempfile::tempdir().unwrap();
        let mut provider = file_provider(dir.path());
        provider.settings_mut().set_value("volume", 0.1f32).unwrap();
        provider.settings_mut().set_value("fps", 30).unwrap();

        provider.reset_groups(&["audio"]);
        provider.apply();

        let settings = provider.settings_mut();
        assert_eq!(settings.value("volume"), Some(&SettingValue::Float(0.5)));
        assert_eq!(settings.value("fps"), Some(&SettingValue::Int(30)));
        assert!(!settings.has_unapplied_changes());

        provider.reset();
        assert_eq!(
            provider.settings_mut().value("fps"),
            Some(&SettingValue::Int(60))
        );
    }

    #[test]
    fn reload_restores_engine_to_configured_state() {
        let live = Rc::new(Cell::new(3));
        let pushed = Rc::new(RefCell::new(Vec::new()));
        let mut provider = {
            let (live, pushed) = (live.clone(), pushed.clone());
            SettingsProvider::new(ProviderConfig::default(), MemoryStorage::new()).with_setup(
                move |settings| {
                    let (get, set, pushed) = (live.clone(), live.clone(), pushed.clone());
                    let handle = settings.create_connection(AnyConnection::int(
                        CallbackConnection::new(
                            move || get.get(),
                            move |v: i32| {
                                pushed.borrow_mut().push(v);
                                set.set(v);
                            },
                        ),
                    ));
                    settings
                        .get_or_create_int("quality", 0, &[], Some(handle))
                        .unwrap();
                },
            )
        };

        provider.load();
        assert_eq!(*pushed.borrow(), vec![3]);

        // The engine drifts; with nothing stored, a reload puts the first
        // observed value back.
        live.set(5);
        provider.load();
        assert_eq!(
            provider.settings_mut().value("quality"),
            Some(&SettingValue::Int(3))
        );
        assert_eq!(live.get(), 3);
        assert_eq!(*pushed.borrow(), vec![3, 3]);
    }

    #[test]
    fn teardown_rebuilds_on_next_access() {
        let mut provider = SettingsProvider::new(ProviderConfig::default(), MemoryStorage::new())
            .with_setup(|settings| {
                settings.get_or_create_bool("vsync", true, &[], None).unwrap();
            });
        provider.settings_mut().set_value("vsync", false).unwrap();
        provider.teardown();
        assert!(!provider.has_settings());

        assert_eq!(
            provider.settings_mut().value("vsync"),
            Some(&SettingValue::Bool(true))
        );
    }
}
