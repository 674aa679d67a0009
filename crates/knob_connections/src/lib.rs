//! Knob Connections - Settings bound to live engine state
//!
//! Ready-made connections for the settings most applications expose:
//! - Audio volume
//! - Quality level and shadows
//! - Screen resolution and refresh rate
//! - Ambient light intensity
//!
//! Each connection talks to the engine through one of the narrow traits in
//! [`engine`], so hosts only implement the slice of their engine a connection
//! touches.

pub mod audio;
pub mod display;
pub mod engine;
pub mod lighting;
pub mod quality;

pub use audio::AudioVolumeConnection;
pub use display::{RefreshRateConnection, ResolutionConnection, REFRESH_RATE_CONNECTION_ORDER};
pub use engine::{
    shared, AmbientMode, AudioMixer, DisplayMode, Lighting, QualitySystem, Screen, ShadowQuality, Shared,
    SimulatedAudioMixer, SimulatedLighting, SimulatedQuality, SimulatedScreen,
};
pub use lighting::AmbientLightConnection;
pub use quality::{QualityConnection, ShadowConnection, QUALITY_CONNECTION_ORDER};

#[cfg(test)]
mod tests {
    use super::*;
    use knob_core::{AnyConnection, MemoryStorage, SettingValue, Settings};
    use knob_services::{ProviderConfig, SettingsProvider};
    use std::cell::Cell;
    use std::rc::Rc;

    struct Engine {
        quality: Shared<SimulatedQuality>,
        screen: Shared<SimulatedScreen>,
    }

    fn register(settings: &mut Settings, engine: &Engine) {
        let quality = settings.create_connection(AnyConnection::option(QualityConnection::new(engine.quality.clone())));
        let shadows = settings.create_connection(AnyConnection::bool(ShadowConnection::new(engine.quality.clone())));
        let resolution =
            settings.create_connection(AnyConnection::option(ResolutionConnection::new(engine.screen.clone())));
        let refresh_rate =
            settings.create_connection(AnyConnection::option(RefreshRateConnection::new(engine.screen.clone())));

        settings.get_or_create_option("quality", 0, &["graphics"], None, Some(quality)).unwrap();
        settings.get_or_create_bool("shadows", false, &["graphics"], Some(shadows)).unwrap();
        settings.get_or_create_option("resolution", 0, &["display"], None, Some(resolution)).unwrap();
        settings.get_or_create_option("refresh_rate", 0, &["display"], None, Some(refresh_rate)).unwrap();
    }

    fn engine() -> Engine {
        Engine {
            quality: shared(SimulatedQuality::default()),
            screen: shared(SimulatedScreen::desktop()),
        }
    }

    #[test]
    fn quality_applies_before_shadows() {
        let engine = engine();
        let mut settings = Settings::new();
        register(&mut settings, &engine);

        // Dropping to "Low" disables shadows through the preset; the explicit
        // shadow choice must land afterwards and win.
        settings.set_value("quality", SettingValue::Option(0)).unwrap();
        settings.apply(false);

        assert_eq!(engine.quality.borrow().level(), 0);
        assert_eq!(engine.quality.borrow().shadows(), ShadowQuality::All);
        assert_eq!(settings.value("shadows"), Some(&SettingValue::Bool(true)));
    }

    #[test]
    fn resolution_and_refresh_rate_survive_reload() {
        let engine = engine();
        let provider_engine = Engine {
            quality: engine.quality.clone(),
            screen: engine.screen.clone(),
        };
        let mut provider = SettingsProvider::new(ProviderConfig::default(), MemoryStorage::new())
            .with_setup(move |settings| register(settings, &provider_engine));

        let settings = provider.settings_mut();
        settings.set_value("resolution", SettingValue::Option(4)).unwrap();
        settings.set_value("refresh_rate", SettingValue::Option(1)).unwrap();
        provider.apply();
        provider.save().unwrap();

        assert_eq!(engine.screen.borrow().current(), DisplayMode::new(2560, 1440, 144));

        engine.screen.borrow_mut().request_mode(DisplayMode::new(1280, 720, 60));
        provider.teardown();
        provider.load();
        provider.apply();

        assert_eq!(engine.screen.borrow().current(), DisplayMode::new(2560, 1440, 144));
    }

    #[test]
    fn quality_notifications_reach_dependent_connections() {
        let engine = engine();
        let mut settings = Settings::new();
        register(&mut settings, &engine);

        let changed = Rc::new(Cell::new(None));
        let handle = settings.get_setting("quality").and_then(|s| s.connection()).unwrap();
        {
            let changed = changed.clone();
            settings
                .connections_mut()
                .get_mut(handle)
                .unwrap()
                .add_change_listener(move |v| changed.set(v.as_index()));
        }

        settings.set_value("quality", SettingValue::Option(1)).unwrap();
        settings.apply(true);
        if let Some(level) = changed.take() {
            settings.on_quality_changed(level, true);
        }
        settings.pull_from_connections(false);

        assert_eq!(settings.value("shadows"), Some(&SettingValue::Bool(true)));
        assert_eq!(engine.quality.borrow().shadows(), ShadowQuality::HardOnly);
    }
}
