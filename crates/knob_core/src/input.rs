//! Device-independent key codes and key combinations for binding settings

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! key_codes {
    ($($name:ident = $code:literal),+ $(,)?) => {
        /// Device-independent key code.
        ///
        /// The discriminant is the stable code written to storage, so existing
        /// values must never be renumbered.
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
        #[repr(i32)]
        pub enum KeyCode {
            #[default]
            None = 0,
            $($name = $code),+
        }

        impl KeyCode {
            /// Every known key code, `None` first.
            pub const ALL: &'static [KeyCode] = &[KeyCode::None, $(KeyCode::$name),+];

            /// Stable integer code used by the persisted format.
            #[inline]
            pub fn code(self) -> i32 {
                self as i32
            }

            /// Decode a stored integer. Unknown codes degrade to `None`.
            pub fn from_code(code: i32) -> Self {
                match code {
                    $($code => KeyCode::$name,)+
                    _ => KeyCode::None,
                }
            }

            pub fn name(self) -> &'static str {
                match self {
                    KeyCode::None => "None",
                    $(KeyCode::$name => stringify!($name),)+
                }
            }
        }
    };
}

key_codes! {
    Backspace = 8,
    Tab = 9,
    Return = 13,
    Escape = 27,
    Space = 32,
    Alpha0 = 48, Alpha1 = 49, Alpha2 = 50, Alpha3 = 51, Alpha4 = 52,
    Alpha5 = 53, Alpha6 = 54, Alpha7 = 55, Alpha8 = 56, Alpha9 = 57,
    A = 97, B = 98, C = 99, D = 100, E = 101, F = 102, G = 103, H = 104,
    I = 105, J = 106, K = 107, L = 108, M = 109, N = 110, O = 111, P = 112,
    Q = 113, R = 114, S = 115, T = 116, U = 117, V = 118, W = 119, X = 120,
    Y = 121, Z = 122,
    Delete = 127,
    UpArrow = 273, DownArrow = 274, RightArrow = 275, LeftArrow = 276,
    Insert = 277, Home = 278, End = 279, PageUp = 280, PageDown = 281,
    F1 = 282, F2 = 283, F3 = 284, F4 = 285, F5 = 286, F6 = 287,
    F7 = 288, F8 = 289, F9 = 290, F10 = 291, F11 = 292, F12 = 293,
    RightShift = 303, LeftShift = 304,
    RightControl = 305, LeftControl = 306,
    RightAlt = 307, LeftAlt = 308,
    Mouse0 = 323, Mouse1 = 324, Mouse2 = 325,
    GamepadSouth = 330, GamepadEast = 331, GamepadWest = 332, GamepadNorth = 333,
    GamepadLeftShoulder = 334, GamepadRightShoulder = 335,
    GamepadSelect = 336, GamepadStart = 337,
}

impl KeyCode {
    /// Keys that only make sense as the modifier half of a combination.
    pub fn is_modifier(self) -> bool {
        matches!(
            self,
            KeyCode::LeftShift
                | KeyCode::RightShift
                | KeyCode::LeftControl
                | KeyCode::RightControl
                | KeyCode::LeftAlt
                | KeyCode::RightAlt
                | KeyCode::Tab
        )
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A key plus an optional modifier (Ctrl, Alt, Shift, Tab).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct KeyCombination {
    pub key: KeyCode,
    pub modifier: KeyCode,
}

impl KeyCombination {
    pub const fn new(key: KeyCode) -> Self {
        Self {
            key,
            modifier: KeyCode::None,
        }
    }

    pub const fn with_modifier(key: KeyCode, modifier: KeyCode) -> Self {
        Self { key, modifier }
    }

    pub fn has_modifier(&self) -> bool {
        self.modifier != KeyCode::None
    }

    /// Encode as `[key, modifier]` integer codes.
    pub fn to_codes(self) -> [i32; 2] {
        [self.key.code(), self.modifier.code()]
    }

    pub fn from_codes(key: i32, modifier: i32) -> Self {
        Self {
            key: KeyCode::from_code(key),
            modifier: KeyCode::from_code(modifier),
        }
    }
}

impl fmt::Display for KeyCombination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.has_modifier() {
            write!(f, "{} + {}", self.modifier, self.key)
        } else {
            write!(f, "{}", self.key)
        }
    }
}
