//! Driver roster types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Result, TimingError};

/// RGBA display colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    /// Opaque white, used when the feed sends no usable team colour.
    pub const WHITE: Color = Color { r: 0xFF, g: 0xFF, b: 0xFF, a: 0xFF };

    /// Parse a 6-hex-digit `RRGGBB` string (an optional leading `#` is allowed).
    pub fn from_hex(hex: &str) -> Result<Self> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 || !digits.is_ascii() {
            return Err(TimingError::unknown_variant("team colour", hex));
        }

        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16)
                .map_err(|_| TimingError::unknown_variant("team colour", hex))
        };

        Ok(Color { r: channel(0..2)?, g: channel(2..4)?, b: channel(4..6)?, a: 0xFF })
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::WHITE
    }
}

/// Identity of one car in the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverInfo {
    pub number: u32,
    pub start_position: u32,
    pub name: String,
    pub short_name: String,
    pub team: String,
    /// `#RRGGBB` as sent by the feed (empty when absent)
    pub hex_color: String,
    pub color: Color,
}

/// Roster delta: only drivers that were not known before this fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drivers {
    pub timestamp: DateTime<Utc>,
    pub drivers: Vec<DriverInfo>,
}
