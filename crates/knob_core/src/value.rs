//! Setting value types
//!
//! The set of value kinds is closed: every setting holds exactly one
//! `SettingValue` variant for its whole lifetime.

use crate::input::KeyCombination;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Data type tag of a setting, also written to storage.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DataType {
    Bool,
    Int,
    Float,
    String,
    Color,
    Option,
    ColorOption,
    KeyCombination,
    /// Tag read from storage that this build does not know.
    #[serde(other)]
    Unknown,
}

impl DataType {
    pub const ALL: [DataType; 8] = [
        DataType::Bool,
        DataType::Int,
        DataType::Float,
        DataType::String,
        DataType::Color,
        DataType::Option,
        DataType::ColorOption,
        DataType::KeyCombination,
    ];

    /// Whether values of this type are an index into an option list.
    pub fn is_option(self) -> bool {
        matches!(self, DataType::Option | DataType::ColorOption)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Framework-agnostic RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Color = Color::from_rgb(0.0, 0.0, 0.0);
    pub const WHITE: Color = Color::from_rgb(1.0, 1.0, 1.0);

    pub const fn from_rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const fn from_rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Convert from hex u32 (0xRRGGBB)
    pub fn from_hex(hex: u32) -> Self {
        let r = ((hex >> 16) & 0xFF) as f32 / 255.0;
        let g = ((hex >> 8) & 0xFF) as f32 / 255.0;
        let b = (hex & 0xFF) as f32 / 255.0;
        Self { r, g, b, a: 1.0 }
    }

    /// Largest of the three color channels.
    pub fn max_channel(&self) -> f32 {
        self.r.max(self.g).max(self.b)
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// The current value of a setting.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    String(String),
    Color(Color),
    /// Selected index into a list of string labels.
    Option(i32),
    /// Selected index into a list of color labels.
    ColorOption(i32),
    KeyCombination(KeyCombination),
}

impl SettingValue {
    pub fn data_type(&self) -> DataType {
        match self {
            SettingValue::Bool(_) => DataType::Bool,
            SettingValue::Int(_) => DataType::Int,
            SettingValue::Float(_) => DataType::Float,
            SettingValue::String(_) => DataType::String,
            SettingValue::Color(_) => DataType::Color,
            SettingValue::Option(_) => DataType::Option,
            SettingValue::ColorOption(_) => DataType::ColorOption,
            SettingValue::KeyCombination(_) => DataType::KeyCombination,
        }
    }

    /// The zero value of a data type. `Unknown` has none.
    pub fn zero(data_type: DataType) -> Option<Self> {
        Some(match data_type {
            DataType::Bool => SettingValue::Bool(false),
            DataType::Int => SettingValue::Int(0),
            DataType::Float => SettingValue::Float(0.0),
            DataType::String => SettingValue::String(String::new()),
            DataType::Color => SettingValue::Color(Color::default()),
            DataType::Option => SettingValue::Option(0),
            DataType::ColorOption => SettingValue::ColorOption(0),
            DataType::KeyCombination => SettingValue::KeyCombination(KeyCombination::default()),
            DataType::Unknown => return None,
        })
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            SettingValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            SettingValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SettingValue::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_color(&self) -> Option<Color> {
        match self {
            SettingValue::Color(v) => Some(*v),
            _ => None,
        }
    }

    /// Selected index of an `Option` or `ColorOption` value.
    pub fn as_index(&self) -> Option<i32> {
        match self {
            SettingValue::Option(v) | SettingValue::ColorOption(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_key_combination(&self) -> Option<KeyCombination> {
        match self {
            SettingValue::KeyCombination(v) => Some(*v),
            _ => None,
        }
    }
}

/// Labels of an option setting: text for `Option`, swatches for `ColorOption`.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionLabels {
    Strings(Vec<String>),
    Colors(Vec<Color>),
}

impl OptionLabels {
    pub fn len(&self) -> usize {
        match self {
            OptionLabels::Strings(labels) => labels.len(),
            OptionLabels::Colors(labels) => labels.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The option data type these labels belong to.
    pub fn data_type(&self) -> DataType {
        match self {
            OptionLabels::Strings(_) => DataType::Option,
            OptionLabels::Colors(_) => DataType::ColorOption,
        }
    }

    pub fn as_strings(&self) -> Option<&[String]> {
        match self {
            OptionLabels::Strings(labels) => Some(labels),
            OptionLabels::Colors(_) => None,
        }
    }

    pub fn as_colors(&self) -> Option<&[Color]> {
        match self {
            OptionLabels::Colors(labels) => Some(labels),
            OptionLabels::Strings(_) => None,
        }
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        SettingValue::Bool(value)
    }
}

impl From<i32> for SettingValue {
    fn from(value: i32) -> Self {
        SettingValue::Int(value)
    }
}

impl From<f32> for SettingValue {
    fn from(value: f32) -> Self {
        SettingValue::Float(value)
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        SettingValue::String(value)
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        SettingValue::String(value.to_owned())
    }
}

impl From<Color> for SettingValue {
    fn from(value: Color) -> Self {
        SettingValue::Color(value)
    }
}

impl From<KeyCombination> for SettingValue {
    fn from(value: KeyCombination) -> Self {
        SettingValue::KeyCombination(value)
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Bool(v) => write!(f, "{v}"),
            SettingValue::Int(v) => write!(f, "{v}"),
            SettingValue::Float(v) => write!(f, "{v}"),
            SettingValue::String(v) => write!(f, "{v:?}"),
            SettingValue::Color(c) => write!(f, "rgba({}, {}, {}, {})", c.r, c.g, c.b, c.a),
            SettingValue::Option(i) | SettingValue::ColorOption(i) => write!(f, "#{i}"),
            SettingValue::KeyCombination(k) => write!(f, "{k}"),
        }
    }
}
