//! Particle colors.

use serde::{Deserialize, Serialize};

use crate::SimError;

/// An opaque RGB color, written as `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl Color {
    /// Construct from channels.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// White, used when no palette entry applies.
    pub const WHITE: Self = Self::rgb(0xff, 0xff, 0xff);
}

/// The presenter palette: blue, pink, emerald, amber, violet, cyan.
pub const DEFAULT_PALETTE: [Color; 6] = [
    Color::rgb(0x3b, 0x82, 0xf6),
    Color::rgb(0xec, 0x48, 0x99),
    Color::rgb(0x10, 0xb9, 0x81),
    Color::rgb(0xf5, 0x9e, 0x0b),
    Color::rgb(0x8b, 0x5c, 0xf6),
    Color::rgb(0x06, 0xb6, 0xd4),
];

impl core::str::FromStr for Color {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SimError::InvalidColor(s.to_owned());
        let hex = s.strip_prefix('#').ok_or_else(invalid)?;
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(invalid());
        }
        let channel = |range: core::ops::Range<usize>| {
            hex.get(range)
                .and_then(|digits| u8::from_str_radix(digits, 16).ok())
                .ok_or_else(invalid)
        };
        Ok(Self::rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }
}

impl TryFrom<String> for Color {
    type Error = SimError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

impl core::fmt::Display for Color {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_prints_hex() {
        let color: Color = "#3B82f6".parse().unwrap();
        assert_eq!(color, Color::rgb(0x3b, 0x82, 0xf6));
        assert_eq!(color.to_string(), "#3b82f6");
    }

    #[test]
    fn rejects_malformed() {
        assert!("3b82f6".parse::<Color>().is_err());
        assert!("#3b82f".parse::<Color>().is_err());
        assert!("#zzzzzz".parse::<Color>().is_err());
    }

    #[test]
    fn serde_uses_hex_string() {
        let json = serde_json::to_string(&DEFAULT_PALETTE[1]).unwrap();
        assert_eq!(json, "\"#ec4899\"");
        let back: Color = serde_json::from_str(&json).unwrap();
        assert_eq!(back, DEFAULT_PALETTE[1]);
    }
}
