//! Knob Runtime
//!
//! Demo binary: boots a settings provider over a simulated engine, loads the
//! stored settings, changes a few of them and saves.
//!
//! Usage: `knob [config.json]`

use anyhow::Result;
use knob_connections::{
    shared, AmbientLightConnection, AudioVolumeConnection, QualityConnection, QualitySystem,
    RefreshRateConnection, ResolutionConnection, Screen, ShadowConnection, Shared, SimulatedAudioMixer,
    SimulatedLighting, SimulatedQuality, SimulatedScreen,
};
use knob_core::{AnyConnection, KeyCode, KeyCombination, SettingValue, Settings};
use knob_services::{ProviderConfig, SettingsProvider};
use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;
use tracing_subscriber::EnvFilter;

/// Everything the connections talk to.
#[derive(Clone)]
struct Engine {
    audio: Shared<SimulatedAudioMixer>,
    screen: Shared<SimulatedScreen>,
    quality: Shared<SimulatedQuality>,
    lighting: Shared<SimulatedLighting>,
    /// Last quality level the quality connection switched to.
    quality_changed: Rc<Cell<Option<i32>>>,
}

impl Engine {
    fn new() -> Self {
        Self {
            audio: shared(SimulatedAudioMixer::with_sources([0.7, 0.7, 0.7])),
            screen: shared(SimulatedScreen::desktop()),
            quality: shared(SimulatedQuality::default()),
            lighting: shared(SimulatedLighting::skybox()),
            quality_changed: Rc::new(Cell::new(None)),
        }
    }

    /// Declare every setting the demo exposes.
    fn declare(&self, settings: &mut Settings) {
        let volume = settings.create_connection(AnyConnection::float(AudioVolumeConnection::new(self.audio.clone())));
        let quality = settings.create_connection(AnyConnection::option(QualityConnection::new(self.quality.clone())));
        let shadows = settings.create_connection(AnyConnection::bool(ShadowConnection::new(self.quality.clone())));
        let resolution =
            settings.create_connection(AnyConnection::option(ResolutionConnection::new(self.screen.clone())));
        let refresh_rate =
            settings.create_connection(AnyConnection::option(RefreshRateConnection::new(self.screen.clone())));
        let ambient = settings.create_connection(AnyConnection::float(AmbientLightConnection::new(self.lighting.clone())));

        if let Some(connection) = settings.connections_mut().get_mut(quality) {
            let changed = self.quality_changed.clone();
            connection.add_change_listener(move |level| changed.set(level.as_index()));
        }

        let declared = [
            settings.get_or_create_float("audio.volume", 50.0, &["audio"], Some(volume)).err(),
            settings.get_or_create_option("graphics.quality", 0, &["graphics"], None, Some(quality)).err(),
            settings.get_or_create_bool("graphics.shadows", true, &["graphics"], Some(shadows)).err(),
            settings.get_or_create_float("graphics.ambient", 50.0, &["graphics"], Some(ambient)).err(),
            settings.get_or_create_option("display.resolution", 0, &["display"], None, Some(resolution)).err(),
            settings.get_or_create_option("display.refresh_rate", 0, &["display"], None, Some(refresh_rate)).err(),
            settings.get_or_create_string("player.name", "Player", &["player"], None).err(),
            settings.get_or_create_bool("input.invert_y", false, &["input"], None).err(),
            settings
                .get_or_create_key_combination("input.jump", KeyCombination::new(KeyCode::Space), &["input"], None)
                .err(),
        ];
        for error in declared.into_iter().flatten() {
            tracing::error!("Failed to declare setting: {}", error);
        }
    }
}

fn log_settings(settings: &Settings) {
    for id in settings.setting_ids_ordered_by_name(None) {
        if let Some(value) = settings.value(&id) {
            tracing::info!("  {id} = {value:?}");
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!("Knob v{}", knob_core::VERSION);

    let config = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => ProviderConfig::load(&path)?,
        None => ProviderConfig::default(),
    };
    tracing::info!(
        key = %config.storage_key,
        dir = %config.storage_dir().display(),
        "Using settings storage"
    );

    let engine = Engine::new();
    let mut provider = {
        let engine = engine.clone();
        SettingsProvider::from_config(config).with_setup(move |settings| engine.declare(settings))
    };

    provider.load();
    tracing::info!("Loaded settings:");
    log_settings(provider.settings_mut());

    let settings = provider.settings_mut();
    let volume = settings
        .value("audio.volume")
        .and_then(SettingValue::as_float)
        .unwrap_or(50.0);
    settings.set_value("audio.volume", (volume + 10.0).min(100.0))?;
    settings.set_value("graphics.quality", SettingValue::Option(1))?;
    settings.set_value("display.refresh_rate", SettingValue::Option(1))?;
    provider.apply();
    if let Some(level) = engine.quality_changed.take() {
        provider.settings_mut().on_quality_changed(level, true);
    }

    tracing::info!(
        volume = ?engine.audio.borrow().volumes,
        shadows = ?engine.quality.borrow().shadows(),
        mode = ?engine.screen.borrow().current(),
        "Engine state after apply"
    );

    provider.save()?;
    tracing::info!("Saved settings under {:?}", provider.storage_key());

    knob_metrics::metrics! {
        if let Some(settings) = provider.settings() {
            for (name, count) in settings.counters().sorted() {
                tracing::debug!(name, count, "connection traffic");
            }
            tracing::debug!(
                apply = ?settings.profiler().get_timing("apply"),
                runs = settings.profiler().runs("apply"),
                "pass timing"
            );
        }
    }

    provider.teardown();
    Ok(())
}
