use crate::engine::{QualitySystem, Shared, ShadowQuality};
use knob_core::{Connection, ConnectionBase, ConnectionWithOptions};

/// Order of `QualityConnection`. Quality presets overwrite shadows, texture
/// and resolution limits, so the level must land before anything else.
pub const QUALITY_CONNECTION_ORDER: i32 = -100;

/// Option connection over the engine's quality levels.
///
/// The host should forward every change notification to
/// `Settings::on_quality_changed` so that connections whose live state the
/// preset just overwrote can react.
pub struct QualityConnection {
    base: ConnectionBase<i32>,
    quality: Shared<dyn QualitySystem>,
    labels: Option<Vec<String>>,
}

impl QualityConnection {
    pub fn new(quality: Shared<dyn QualitySystem>) -> Self {
        Self {
            base: ConnectionBase::with_order(QUALITY_CONNECTION_ORDER),
            quality,
            labels: None,
        }
    }

    fn max_index(&mut self) -> i32 {
        (self.option_labels().len() as i32 - 1).max(0)
    }
}

impl Connection<i32> for QualityConnection {
    fn base(&self) -> &ConnectionBase<i32> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ConnectionBase<i32> {
        &mut self.base
    }

    fn get(&mut self) -> i32 {
        self.quality.borrow().level() as i32
    }

    fn set(&mut self, index: i32) {
        let index = index.clamp(0, self.max_index());
        self.quality.borrow_mut().set_level(index as usize);
        self.base.notify_listeners_if_changed(index);
    }
}

impl ConnectionWithOptions<String> for QualityConnection {
    fn option_labels(&mut self) -> Vec<String> {
        self.labels
            .get_or_insert_with(|| self.quality.borrow().level_names())
            .clone()
    }

    fn set_option_labels(&mut self, labels: Vec<String>) {
        let levels = self.quality.borrow().level_names().len();
        if labels.len() != levels {
            tracing::error!(
                expected = levels,
                found = labels.len(),
                "quality label count does not match the number of quality levels"
            );
            return;
        }
        self.labels = Some(labels);
    }

    fn refresh_option_labels(&mut self) {
        self.labels = None;
    }
}

/// Bool connection toggling shadows.
///
/// Turning shadows back on restores whatever non-disabled quality was last
/// seen, or hard shadows if none was.
pub struct ShadowConnection {
    base: ConnectionBase<bool>,
    quality: Shared<dyn QualitySystem>,
    last_enabled: Option<ShadowQuality>,
}

impl ShadowConnection {
    pub fn new(quality: Shared<dyn QualitySystem>) -> Self {
        Self {
            base: ConnectionBase::new(),
            quality,
            last_enabled: None,
        }
    }

    fn remember(&mut self) -> ShadowQuality {
        let shadows = self.quality.borrow().shadows();
        if shadows != ShadowQuality::Disabled {
            self.last_enabled = Some(shadows);
        }
        shadows
    }
}

impl Connection<bool> for ShadowConnection {
    fn base(&self) -> &ConnectionBase<bool> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ConnectionBase<bool> {
        &mut self.base
    }

    fn get(&mut self) -> bool {
        self.remember() != ShadowQuality::Disabled
    }

    fn set(&mut self, enabled: bool) {
        self.remember();
        let shadows = if enabled {
            self.last_enabled.unwrap_or(ShadowQuality::HardOnly)
        } else {
            ShadowQuality::Disabled
        };
        self.quality.borrow_mut().set_shadows(shadows);
        self.base.notify_listeners_if_changed(enabled);
    }

    fn on_quality_changed(&mut self, _level: i32) {
        self.remember();
    }
}
