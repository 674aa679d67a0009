use crate::engine::{AmbientMode, Lighting, Shared};
use knob_core::math::map_with_anchor;
use knob_core::{Connection, ConnectionBase};

const SKYBOX_DEFAULT_INTENSITY: f32 = 1.0;
const SKYBOX_MAX_INTENSITY: f32 = 8.0;

/// Brightest channel value a flat ambient color is scaled up to.
const COLOR_MAX_INTENSITY: f32 = 2.0;
/// Darkest channel value; keeps the color's hue recoverable at 0.
const COLOR_MIN_INTENSITY: f32 = 0.01;

/// Float connection over ambient light intensity in `0..=100`.
///
/// 50 is the scene's authored ambient light. In skybox mode that is an
/// intensity of 1; in color mode it is the ambient color the scene started
/// with, and other values scale that color's channels.
pub struct AmbientLightConnection {
    base: ConnectionBase<f32>,
    lighting: Shared<dyn Lighting>,
    default_color_max: f32,
}

impl AmbientLightConnection {
    pub fn new(lighting: Shared<dyn Lighting>) -> Self {
        let default_color_max = lighting
            .borrow()
            .ambient_color()
            .max_element()
            .max(COLOR_MIN_INTENSITY);
        Self {
            base: ConnectionBase::new(),
            lighting,
            default_color_max,
        }
    }
}

impl Connection<f32> for AmbientLightConnection {
    fn base(&self) -> &ConnectionBase<f32> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ConnectionBase<f32> {
        &mut self.base
    }

    fn get(&mut self) -> f32 {
        let lighting = self.lighting.borrow();
        match lighting.ambient_mode() {
            AmbientMode::Skybox => map_with_anchor(
                lighting.ambient_intensity(),
                0.0,
                SKYBOX_DEFAULT_INTENSITY,
                SKYBOX_MAX_INTENSITY,
                0.0,
                50.0,
                100.0,
                true,
            ),
            AmbientMode::Color => map_with_anchor(
                lighting.ambient_color().max_element(),
                COLOR_MIN_INTENSITY,
                self.default_color_max,
                COLOR_MAX_INTENSITY,
                0.0,
                50.0,
                100.0,
                true,
            ),
        }
    }

    fn get_default(&mut self) -> f32 {
        50.0
    }

    fn set(&mut self, value: f32) {
        {
            let mut lighting = self.lighting.borrow_mut();
            match lighting.ambient_mode() {
                AmbientMode::Skybox => {
                    let intensity = map_with_anchor(
                        value,
                        0.0,
                        50.0,
                        100.0,
                        0.0,
                        SKYBOX_DEFAULT_INTENSITY,
                        SKYBOX_MAX_INTENSITY,
                        true,
                    );
                    lighting.set_ambient_intensity(intensity);
                }
                AmbientMode::Color => {
                    let target = map_with_anchor(
                        value,
                        0.0,
                        50.0,
                        100.0,
                        COLOR_MIN_INTENSITY,
                        self.default_color_max,
                        COLOR_MAX_INTENSITY,
                        true,
                    );
                    let color = lighting.ambient_color();
                    let current = color.max_element();
                    if current > 0.0 {
                        let scaled = (color * (target / current)).min(glam::Vec3::splat(COLOR_MAX_INTENSITY));
                        lighting.set_ambient_color(scaled);
                    } else {
                        lighting.set_ambient_color(glam::Vec3::splat(target));
                    }
                }
            }
        }
        self.base.notify_listeners_if_changed(value);
    }
}
