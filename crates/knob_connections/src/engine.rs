//! Live engine state seen by connections
//!
//! Each trait is the narrow slice of an engine subsystem one family of
//! connections needs. Hosts implement them over their real audio, display,
//! quality and lighting systems; the `Simulated*` types keep the state in
//! memory for tests and the demo binary.

use glam::{UVec2, Vec3};
use std::cell::RefCell;
use std::rc::Rc;

/// Engine subsystem shared between the host and the connections bound to it.
pub type Shared<T> = Rc<RefCell<T>>;

pub fn shared<T>(value: T) -> Shared<T> {
    Rc::new(RefCell::new(value))
}

/// Volume control over a set of audio sources.
pub trait AudioMixer {
    /// Volume of every bound source, each in `0.0..=1.0`. May be empty.
    fn volumes(&self) -> Vec<f32>;

    /// Set every bound source to `volume`.
    fn set_volume(&mut self, volume: f32);
}

/// One fullscreen mode a display supports.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct DisplayMode {
    pub size: UVec2,
    pub refresh_rate: u32,
}

impl DisplayMode {
    pub const fn new(width: u32, height: u32, refresh_rate: u32) -> Self {
        Self {
            size: UVec2::new(width, height),
            refresh_rate,
        }
    }
}

pub trait Screen {
    /// Supported modes, smallest first.
    fn modes(&self) -> Vec<DisplayMode>;

    fn current(&self) -> DisplayMode;

    /// Switch to `mode`. `current` reports the new mode once it took effect.
    fn request_mode(&mut self, mode: DisplayMode);
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ShadowQuality {
    Disabled,
    HardOnly,
    All,
}

pub trait QualitySystem {
    fn level_names(&self) -> Vec<String>;
    fn level(&self) -> usize;

    /// Switch quality level. Applies the level's preset, shadows included.
    fn set_level(&mut self, level: usize);

    fn shadows(&self) -> ShadowQuality;
    fn set_shadows(&mut self, shadows: ShadowQuality);
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AmbientMode {
    /// Ambient light sampled from the sky, scaled by an intensity in `0..=8`.
    Skybox,
    /// Flat ambient color.
    Color,
}

pub trait Lighting {
    fn ambient_mode(&self) -> AmbientMode;

    fn ambient_intensity(&self) -> f32;
    fn set_ambient_intensity(&mut self, intensity: f32);

    fn ambient_color(&self) -> Vec3;
    fn set_ambient_color(&mut self, color: Vec3);
}

// Simulated engine state

#[derive(Debug, Clone, Default)]
pub struct SimulatedAudioMixer {
    pub volumes: Vec<f32>,
}

impl SimulatedAudioMixer {
    pub fn with_sources(volumes: impl IntoIterator<Item = f32>) -> Self {
        Self {
            volumes: volumes.into_iter().collect(),
        }
    }
}

impl AudioMixer for SimulatedAudioMixer {
    fn volumes(&self) -> Vec<f32> {
        self.volumes.clone()
    }

    fn set_volume(&mut self, volume: f32) {
        let volume = volume.clamp(0.0, 1.0);
        for v in &mut self.volumes {
            *v = volume;
        }
    }
}

/// Display that switches modes synchronously. Requests for unsupported modes
/// are ignored.
#[derive(Debug, Clone)]
pub struct SimulatedScreen {
    modes: Vec<DisplayMode>,
    current: DisplayMode,
}

impl SimulatedScreen {
    pub fn new(mut modes: Vec<DisplayMode>, current: DisplayMode) -> Self {
        modes.sort_by_key(|m| (m.size.x * m.size.y, m.size.x, m.refresh_rate));
        Self { modes, current }
    }

    /// Common desktop modes at 60 and 144 Hz, starting at 1920x1080@60.
    pub fn desktop() -> Self {
        let sizes = [(1280, 720), (1280, 1024), (1600, 900), (1920, 1080), (2560, 1440)];
        let modes = sizes
            .iter()
            .flat_map(|&(w, h)| [DisplayMode::new(w, h, 60), DisplayMode::new(w, h, 144)])
            .collect();
        Self::new(modes, DisplayMode::new(1920, 1080, 60))
    }

    /// Replace the supported modes, as when the window moves to another monitor.
    pub fn switch_monitor(&mut self, modes: Vec<DisplayMode>, current: DisplayMode) {
        *self = Self::new(modes, current);
    }
}

impl Screen for SimulatedScreen {
    fn modes(&self) -> Vec<DisplayMode> {
        self.modes.clone()
    }

    fn current(&self) -> DisplayMode {
        self.current
    }

    fn request_mode(&mut self, mode: DisplayMode) {
        if self.modes.contains(&mode) {
            self.current = mode;
        } else {
            tracing::debug!(?mode, "unsupported display mode requested");
        }
    }
}

/// Quality levels whose preset disables shadows on the lowest level, uses
/// hard shadows on the next one and all shadows above.
#[derive(Debug, Clone)]
pub struct SimulatedQuality {
    names: Vec<String>,
    level: usize,
    shadows: ShadowQuality,
}

impl SimulatedQuality {
    pub fn new(names: &[&str], level: usize) -> Self {
        let mut quality = Self {
            names: names.iter().map(|n| n.to_string()).collect(),
            level: 0,
            shadows: ShadowQuality::Disabled,
        };
        quality.set_level(level);
        quality
    }

    fn preset_shadows(level: usize) -> ShadowQuality {
        match level {
            0 => ShadowQuality::Disabled,
            1 => ShadowQuality::HardOnly,
            _ => ShadowQuality::All,
        }
    }
}

impl Default for SimulatedQuality {
    fn default() -> Self {
        Self::new(&["Low", "Medium", "High", "Ultra"], 2)
    }
}

impl QualitySystem for SimulatedQuality {
    fn level_names(&self) -> Vec<String> {
        self.names.clone()
    }

    fn level(&self) -> usize {
        self.level
    }

    fn set_level(&mut self, level: usize) {
        let level = level.min(self.names.len().saturating_sub(1));
        self.level = level;
        self.shadows = Self::preset_shadows(level);
    }

    fn shadows(&self) -> ShadowQuality {
        self.shadows
    }

    fn set_shadows(&mut self, shadows: ShadowQuality) {
        self.shadows = shadows;
    }
}

#[derive(Debug, Clone)]
pub struct SimulatedLighting {
    pub mode: AmbientMode,
    pub intensity: f32,
    pub color: Vec3,
}

impl SimulatedLighting {
    pub fn skybox() -> Self {
        Self {
            mode: AmbientMode::Skybox,
            intensity: 1.0,
            color: Vec3::splat(0.2),
        }
    }

    pub fn flat(color: Vec3) -> Self {
        Self {
            mode: AmbientMode::Color,
            intensity: 1.0,
            color,
        }
    }
}

impl Lighting for SimulatedLighting {
    fn ambient_mode(&self) -> AmbientMode {
        self.mode
    }

    fn ambient_intensity(&self) -> f32 {
        self.intensity
    }

    fn set_ambient_intensity(&mut self, intensity: f32) {
        self.intensity = intensity.clamp(0.0, 8.0);
    }

    fn ambient_color(&self) -> Vec3 {
        self.color
    }

    fn set_ambient_color(&mut self, color: Vec3) {
        self.color = color.max(Vec3::ZERO);
    }
}
