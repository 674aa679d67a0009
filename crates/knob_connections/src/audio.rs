use crate::engine::{AudioMixer, Shared};
use glam::Vec2;
use knob_core::math::map_with_anchor;
use knob_core::{Connection, ConnectionBase};

/// Float connection over the volume of an `AudioMixer`.
///
/// The setting works in `input_range` (0..100 by default); the sources work
/// in 0..1. With no sources bound `get` reports the middle of the range and
/// `set` does nothing.
pub struct AudioVolumeConnection {
    base: ConnectionBase<f32>,
    mixer: Shared<dyn AudioMixer>,
    input_range: Vec2,
}

impl AudioVolumeConnection {
    pub fn new(mixer: Shared<dyn AudioMixer>) -> Self {
        Self {
            base: ConnectionBase::new(),
            mixer,
            input_range: Vec2::new(0.0, 100.0),
        }
    }

    pub fn with_input_range(mut self, min: f32, max: f32) -> Self {
        self.input_range = Vec2::new(min, max);
        self
    }

    pub fn input_range(&self) -> Vec2 {
        self.input_range
    }

    fn to_input(&self, volume: f32, clamp: bool) -> f32 {
        let Vec2 { x: min, y: max } = self.input_range;
        map_with_anchor(volume, 0.0, 0.0, 1.0, min, min, max, clamp)
    }

    fn to_volume(&self, value: f32) -> f32 {
        let Vec2 { x: min, y: max } = self.input_range;
        map_with_anchor(value, min, min, max, 0.0, 0.0, 1.0, false)
    }
}

impl Connection<f32> for AudioVolumeConnection {
    fn base(&self) -> &ConnectionBase<f32> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ConnectionBase<f32> {
        &mut self.base
    }

    fn get(&mut self) -> f32 {
        let first = self.mixer.borrow().volumes().first().copied();
        match first {
            Some(volume) => self.to_input(volume, false),
            None => self.to_input(0.5, true),
        }
    }

    fn set(&mut self, value: f32) {
        if self.mixer.borrow().volumes().is_empty() {
            return;
        }
        let volume = self.to_volume(value);
        self.mixer.borrow_mut().set_volume(volume);

        let current = self.get();
        self.base.notify_listeners_if_changed(current);
    }
}
