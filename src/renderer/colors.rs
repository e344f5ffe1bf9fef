use crate::error::{ReelError, ReelResult};

/// Straight (non-premultiplied) RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const RED: Color = Color::rgb(255, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Same color with alpha given as a 0.0-1.0 fraction.
    pub fn with_opacity(self, opacity: f32) -> Self {
        let a = (opacity.clamp(0.0, 1.0) * 255.0).round() as u8;
        Self { a, ..self }
    }

    /// Parse `#rrggbb` or `#rrggbbaa` (leading `#` optional).
    pub fn from_hex(hex: &str) -> ReelResult<Self> {
        let digits = hex.trim().trim_start_matches('#');
        if !(digits.len() == 6 || digits.len() == 8) || !digits.is_ascii() {
            return Err(ReelError::config(format!("Invalid color '{}': expected #rrggbb or #rrggbbaa", hex)));
        }

        let channel = |i: usize| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| ReelError::config(format!("Invalid color '{}'", hex)))
        };

        let a = if digits.len() == 8 { channel(6)? } else { 255 };
        Ok(Self::rgba(channel(0)?, channel(2)?, channel(4)?, a))
    }

    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

/// Blend one channel of `src` over `dst` with alpha `a` (0-255).
#[inline]
pub fn blend_channel(src: u8, dst: u8, a: u32) -> u8 {
    ((src as u32 * a + dst as u32 * (255 - a) + 127) / 255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        assert_eq!(Color::from_hex("#ff0000").unwrap(), Color::RED);
        assert_eq!(Color::from_hex("000000b3").unwrap(), Color::rgba(0, 0, 0, 0xb3));
        assert!(Color::from_hex("#fff").is_err());
        assert!(Color::from_hex("#gg0000").is_err());
    }

    #[test]
    fn test_hex_roundtrip_text() {
        assert_eq!(Color::RED.to_hex(), "#ff0000");
        assert_eq!(Color::BLACK.with_opacity(0.7).to_hex(), "#000000b3");
    }

    #[test]
    fn test_blend_extremes() {
        assert_eq!(blend_channel(200, 10, 255), 200);
        assert_eq!(blend_channel(200, 10, 0), 10);
        assert_eq!(blend_channel(255, 0, 128), 128);
    }
}
