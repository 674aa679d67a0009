//! Display mode connections
//!
//! `ResolutionConnection` and `RefreshRateConnection` both index into lists
//! derived from `Screen::modes`. The lists depend on the monitor (and on each
//! other), so both connections detect when their source changed instead of
//! trusting a cache built at startup.

use crate::engine::{DisplayMode, Screen, Shared};
use glam::{UVec2, Vec2};
use knob_core::{Connection, ConnectionBase, ConnectionWithOptions};

/// Refresh rates within this many Hz of the current rate count as equal.
const REFRESH_RATE_TOLERANCE: u32 = 1;

const FALLBACK_RESOLUTION: UVec2 = UVec2::new(1024, 768);

/// Order of `RefreshRateConnection`; its options depend on the resolution.
pub const REFRESH_RATE_CONNECTION_ORDER: i32 = 10;

fn aspect_ratio(size: UVec2) -> f32 {
    size.x as f32 / size.y.max(1) as f32
}

fn largest_size(modes: &[DisplayMode]) -> Option<UVec2> {
    modes
        .iter()
        .map(|m| m.size)
        .max_by_key(|s| (s.x as u64 * s.y as u64, s.x))
}

/// Option connection over the resolutions available at the current refresh
/// rate.
///
/// With allowed aspect ratios configured, only matching resolutions are
/// offered; if none match the filter is dropped, and if the display reports no
/// modes at all a single 1024x768 entry is offered.
pub struct ResolutionConnection {
    base: ConnectionBase<i32>,
    screen: Shared<dyn Screen>,
    aspect_ratios: Vec<Vec2>,
    aspect_ratio_delta: f32,
    resolutions: Option<Vec<UVec2>>,
    labels: Option<Vec<String>>,
    monitor_max: Option<UVec2>,
}

impl ResolutionConnection {
    pub fn new(screen: Shared<dyn Screen>) -> Self {
        Self {
            base: ConnectionBase::new(),
            screen,
            aspect_ratios: Vec::new(),
            aspect_ratio_delta: 0.02,
            resolutions: None,
            labels: None,
            monitor_max: None,
        }
    }

    /// Only offer resolutions whose aspect ratio is within `delta` of one of
    /// `ratios` (given as width:height pairs, e.g. `Vec2::new(16.0, 9.0)`).
    pub fn with_aspect_ratios(mut self, ratios: impl IntoIterator<Item = Vec2>, delta: f32) -> Self {
        self.aspect_ratios = ratios.into_iter().collect();
        self.aspect_ratio_delta = delta;
        self.invalidate();
        self
    }

    fn invalidate(&mut self) {
        self.resolutions = None;
        self.labels = None;
    }

    fn matches_aspect_ratio(&self, size: UVec2) -> bool {
        let ratio = aspect_ratio(size);
        self.aspect_ratios
            .iter()
            .any(|r| (r.x / r.y - ratio).abs() <= self.aspect_ratio_delta)
    }

    /// Drop caches when the window moved to a monitor with a different
    /// largest mode.
    fn detect_monitor_change(&mut self) {
        let max = largest_size(&self.screen.borrow().modes());
        if max != self.monitor_max {
            if self.monitor_max.is_some() {
                tracing::debug!(?max, "display modes changed, rebuilding resolution list");
            }
            self.monitor_max = max;
            self.invalidate();
        }
    }

    fn build_resolutions(&self) -> Vec<UVec2> {
        let screen = self.screen.borrow();
        let rate = screen.current().refresh_rate;

        let mut sizes: Vec<UVec2> = Vec::new();
        for mode in screen.modes() {
            if mode.refresh_rate.abs_diff(rate) <= REFRESH_RATE_TOLERANCE && !sizes.contains(&mode.size) {
                sizes.push(mode.size);
            }
        }

        if !self.aspect_ratios.is_empty() {
            let filtered: Vec<UVec2> = sizes
                .iter()
                .copied()
                .filter(|s| self.matches_aspect_ratio(*s))
                .collect();
            if filtered.is_empty() {
                tracing::warn!("no resolution matches the allowed aspect ratios, offering all");
            } else {
                sizes = filtered;
            }
        }

        if sizes.is_empty() {
            sizes.push(FALLBACK_RESOLUTION);
        }
        sizes
    }

    /// Resolutions offered as options, in option order.
    pub fn resolutions(&mut self) -> Vec<UVec2> {
        self.detect_monitor_change();
        if self.resolutions.is_none() {
            self.resolutions = Some(self.build_resolutions());
        }
        self.resolutions.clone().unwrap_or_default()
    }
}

impl Connection<i32> for ResolutionConnection {
    fn base(&self) -> &ConnectionBase<i32> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ConnectionBase<i32> {
        &mut self.base
    }

    /// Index of the offered resolution closest to the current one.
    fn get(&mut self) -> i32 {
        let current = self.screen.borrow().current().size.as_ivec2();
        self.resolutions()
            .iter()
            .enumerate()
            .min_by_key(|(_, s)| {
                let d = (s.as_ivec2() - current).abs();
                d.x + d.y
            })
            .map_or(0, |(i, _)| i as i32)
    }

    fn set(&mut self, index: i32) {
        let resolutions = self.resolutions();
        let index = index.clamp(0, (resolutions.len() as i32 - 1).max(0));
        if let Some(&size) = resolutions.get(index as usize) {
            let mut screen = self.screen.borrow_mut();
            let refresh_rate = screen.current().refresh_rate;
            screen.request_mode(DisplayMode { size, refresh_rate });
        }
        let current = self.get();
        self.base.notify_listeners_if_changed(current);
    }
}

impl ConnectionWithOptions<String> for ResolutionConnection {
    fn option_labels(&mut self) -> Vec<String> {
        let resolutions = self.resolutions();
        self.labels
            .get_or_insert_with(|| resolutions.iter().map(|s| format!("{}x{}", s.x, s.y)).collect())
            .clone()
    }

    fn set_option_labels(&mut self, labels: Vec<String>) {
        let count = self.resolutions().len();
        if labels.len() != count {
            tracing::error!(
                expected = count,
                found = labels.len(),
                "resolution labels must match the number of resolutions"
            );
        }
        self.labels = Some(labels);
    }

    fn refresh_option_labels(&mut self) {
        self.invalidate();
    }
}

/// Option connection over the refresh rates available at the current
/// resolution. Labels read `"<rate> <suffix>"`, e.g. `"144 Hz"`.
pub struct RefreshRateConnection {
    base: ConnectionBase<i32>,
    screen: Shared<dyn Screen>,
    suffix: String,
    /// Rates the cached labels were built for.
    rates: Option<Vec<u32>>,
    labels: Option<Vec<String>>,
}

impl RefreshRateConnection {
    pub fn new(screen: Shared<dyn Screen>) -> Self {
        Self {
            base: ConnectionBase::with_order(REFRESH_RATE_CONNECTION_ORDER),
            screen,
            suffix: "Hz".to_string(),
            rates: None,
            labels: None,
        }
    }

    pub fn with_label_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self.labels = None;
        self
    }

    /// Refresh rates offered at the current resolution, ascending.
    ///
    /// Rebuilt from `Screen::modes` on every call; the labels are dropped
    /// whenever the list differs from the one they were built for, so a
    /// monitor switch at an unchanged resolution is picked up as well.
    pub fn rates(&mut self) -> Vec<u32> {
        let rates = {
            let screen = self.screen.borrow();
            let current = screen.current();
            let mut rates: Vec<u32> = screen
                .modes()
                .iter()
                .filter(|m| m.size == current.size)
                .map(|m| m.refresh_rate)
                .collect();
            rates.push(current.refresh_rate);
            rates.sort_unstable();
            rates.dedup();
            rates
        };

        if self.rates.as_ref() != Some(&rates) {
            if self.rates.is_some() {
                tracing::debug!(?rates, "refresh rates changed, rebuilding labels");
            }
            self.rates = Some(rates.clone());
            self.labels = None;
        }
        rates
    }
}

impl Connection<i32> for RefreshRateConnection {
    fn base(&self) -> &ConnectionBase<i32> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ConnectionBase<i32> {
        &mut self.base
    }

    fn get(&mut self) -> i32 {
        let current = self.screen.borrow().current().refresh_rate;
        self.rates()
            .iter()
            .position(|&r| r == current)
            .map_or(0, |i| i as i32)
    }

    fn set(&mut self, index: i32) {
        let rates = self.rates();
        let index = index.clamp(0, (rates.len() as i32 - 1).max(0));
        if let Some(&refresh_rate) = rates.get(index as usize) {
            let mut screen = self.screen.borrow_mut();
            let size = screen.current().size;
            screen.request_mode(DisplayMode { size, refresh_rate });
        }
        let current = self.get();
        self.base.notify_listeners_if_changed(current);
    }
}

impl ConnectionWithOptions<String> for RefreshRateConnection {
    fn option_labels(&mut self) -> Vec<String> {
        let rates = self.rates();
        let suffix = &self.suffix;
        self.labels
            .get_or_insert_with(|| rates.iter().map(|r| format!("{r} {suffix}")).collect())
            .clone()
    }

    /// Labels are generated from the rates; the first given label becomes the
    /// unit suffix.
    fn set_option_labels(&mut self, labels: Vec<String>) {
        match labels.into_iter().next() {
            Some(suffix) => {
                self.suffix = suffix;
                self.labels = None;
            }
            None => tracing::warn!("refresh rate labels need a suffix, keeping {:?}", self.suffix),
        }
    }

    fn refresh_option_labels(&mut self) {
        self.rates = None;
        self.labels = None;
    }
}
