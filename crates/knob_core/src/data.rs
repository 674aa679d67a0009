//! Persisted record format
//!
//! A stored document is a JSON object `{ "version": 1, "settings": [...] }`.
//! Every entry carries a type tag, the id and a short primitive array sized
//! to the type:
//!
//! | type             | payload      |
//! |------------------|--------------|
//! | `Bool`           | 1 int (0/1)  |
//! | `Int`            | 1 int        |
//! | `Float`          | 1 float      |
//! | `String`         | 1 string     |
//! | `Color`          | 4 floats     |
//! | `Option`         | 1 int        |
//! | `ColorOption`    | 1 int        |
//! | `KeyCombination` | 2 ints       |

use crate::input::KeyCombination;
use crate::value::{Color, DataType, SettingValue};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Document version written by `to_json`.
pub const DOCUMENT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("malformed settings document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("setting '{id}' ({data_type}) needs {expected} {kind} value(s), found {found}")]
    MissingValues {
        id: String,
        data_type: DataType,
        kind: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("setting '{id}' has an unknown data type")]
    UnknownType { id: String },
}

/// One persisted setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingData {
    #[serde(rename = "type")]
    pub data_type: DataType,
    pub id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub floats: Vec<f32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ints: Vec<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub strings: Vec<String>,
}

impl SettingData {
    pub fn new(id: impl Into<String>, data_type: DataType) -> Self {
        Self {
            data_type,
            id: id.into(),
            floats: Vec::new(),
            ints: Vec::new(),
            strings: Vec::new(),
        }
    }

    /// Encode `value` into its primitive payload.
    pub fn from_value(id: impl Into<String>, value: &SettingValue) -> Self {
        let mut data = Self::new(id, value.data_type());
        match value {
            SettingValue::Bool(v) => data.ints.push(i32::from(*v)),
            SettingValue::Int(v) | SettingValue::Option(v) | SettingValue::ColorOption(v) => {
                data.ints.push(*v)
            }
            SettingValue::Float(v) => data.floats.push(*v),
            SettingValue::String(v) => data.strings.push(v.clone()),
            SettingValue::Color(c) => data.floats.extend_from_slice(&c.to_array()),
            SettingValue::KeyCombination(k) => data.ints.extend_from_slice(&k.to_codes()),
        }
        data
    }

    /// Decode the primitive payload back into a value.
    pub fn value(&self) -> Result<SettingValue, SerializeError> {
        Ok(match self.data_type {
            DataType::Bool => SettingValue::Bool(self.ints_n::<1>()?[0] != 0),
            DataType::Int => SettingValue::Int(self.ints_n::<1>()?[0]),
            DataType::Option => SettingValue::Option(self.ints_n::<1>()?[0]),
            DataType::ColorOption => SettingValue::ColorOption(self.ints_n::<1>()?[0]),
            DataType::Float => SettingValue::Float(self.floats_n::<1>()?[0]),
            DataType::String => match self.strings.first() {
                Some(s) => SettingValue::String(s.clone()),
                None => return Err(self.missing("string", 1, 0)),
            },
            DataType::Color => {
                let [r, g, b, a] = self.floats_n::<4>()?;
                SettingValue::Color(Color::from_rgba(r, g, b, a))
            }
            DataType::KeyCombination => {
                let [key, modifier] = self.ints_n::<2>()?;
                SettingValue::KeyCombination(KeyCombination::from_codes(key, modifier))
            }
            DataType::Unknown => {
                return Err(SerializeError::UnknownType {
                    id: self.id.clone(),
                })
            }
        })
    }

    fn ints_n<const N: usize>(&self) -> Result<[i32; N], SerializeError> {
        self.ints
            .get(..N)
            .and_then(|slice| <[i32; N]>::try_from(slice).ok())
            .ok_or_else(|| self.missing("int", N, self.ints.len()))
    }

    fn floats_n<const N: usize>(&self) -> Result<[f32; N], SerializeError> {
        self.floats
            .get(..N)
            .and_then(|slice| <[f32; N]>::try_from(slice).ok())
            .ok_or_else(|| self.missing("float", N, self.floats.len()))
    }

    fn missing(&self, kind: &'static str, expected: usize, found: usize) -> SerializeError {
        SerializeError::MissingValues {
            id: self.id.clone(),
            data_type: self.data_type,
            kind,
            expected,
            found,
        }
    }
}

#[derive(Serialize)]
struct DocumentOut<'a> {
    version: u32,
    settings: &'a [SettingData],
}

#[derive(Deserialize)]
struct DocumentIn {
    #[serde(default)]
    version: u32,
    #[serde(default)]
    settings: Vec<serde_json::Value>,
}

/// Serialize a list of records into a document.
pub fn to_json(records: &[SettingData]) -> Result<String, SerializeError> {
    let document = DocumentOut {
        version: DOCUMENT_VERSION,
        settings: records,
    };
    Ok(serde_json::to_string(&document)?)
}

/// Parse a document. A document that is not JSON fails as a whole; entries
/// that do not parse as records are logged and skipped.
pub fn from_json(json: &str) -> Result<Vec<SettingData>, SerializeError> {
    let document: DocumentIn = serde_json::from_str(json)?;
    if document.version > DOCUMENT_VERSION {
        warn!(
            version = document.version,
            "Settings document is newer than this build; reading what is understood"
        );
    }

    let mut records = Vec::with_capacity(document.settings.len());
    for (index, entry) in document.settings.into_iter().enumerate() {
        match serde_json::from_value::<SettingData>(entry) {
            Ok(record) => records.push(record),
            Err(e) => warn!(index, "Skipping malformed settings entry: {}", e),
        }
    }
    Ok(records)
}
