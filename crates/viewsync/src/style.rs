use serde::{Deserialize, Serialize};

/// 8-bit RGBA color, serialized as a CSS hex string.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid CSS color {0:?}; expected #RGB, #RRGGBB or #RRGGBBAA")]
pub struct ColorParseError(pub String);

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    /// Default location marker fill.
    pub const LOCATION_BLUE: Color = Color::rgb(0x33, 0x99, 0xcc);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub fn from_css_hex(s: &str) -> Result<Self, ColorParseError> {
        let err = || ColorParseError(s.to_string());
        let hex = s.trim().strip_prefix('#').ok_or_else(err)?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(err());
        }

        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| err());
        let nibble = |i: usize| {
            u8::from_str_radix(&hex[i..i + 1], 16)
                .map(|v| v * 17)
                .map_err(|_| err())
        };

        match hex.len() {
            3 => Ok(Color::rgb(nibble(0)?, nibble(1)?, nibble(2)?)),
            6 => Ok(Color::rgb(byte(0)?, byte(2)?, byte(4)?)),
            8 => Ok(Color {
                r: byte(0)?,
                g: byte(2)?,
                b: byte(4)?,
                a: byte(6)?,
            }),
            _ => Err(err()),
        }
    }

    pub fn to_css_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        } else {
            format!("#{:02X}{:02X}{:02X}{:02X}", self.r, self.g, self.b, self.a)
        }
    }

    pub fn to_rgba_f32(&self) -> [f32; 4] {
        [
            f32::from(self.r) / 255.0,
            f32::from(self.g) / 255.0,
            f32::from(self.b) / 255.0,
            f32::from(self.a) / 255.0,
        ]
    }
}

impl TryFrom<String> for Color {
    type Error = ColorParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Color::from_css_hex(&value)
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_css_hex()
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_css_hex())
    }
}

/// How a marker's height is interpreted by the engine.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeightReference {
    #[default]
    ClampToGround,
    Absolute,
}

/// Flat-engine marker: a filled circle with an outline.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CircleStyle {
    pub radius_px: f64,
    pub fill: Color,
    pub stroke: Color,
    pub stroke_width_px: f64,
    pub height: HeightReference,
}

/// Globe-engine marker: a screen-space point primitive.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PointStyle {
    pub pixel_size: f64,
    pub color: Color,
    pub outline_color: Color,
    pub outline_width_px: f64,
    pub height: HeightReference,
    /// Camera distance below which depth testing applies; infinity keeps the
    /// point drawn on top of terrain at every distance.
    pub disable_depth_test_distance: f64,
}

/// Configured look of the location marker in both engines.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerStyle {
    pub color: Color,
    pub outline_color: Color,
    pub outline_width_px: f64,
    pub flat_radius_px: f64,
    pub globe_pixel_size: f64,
}

impl Default for MarkerStyle {
    fn default() -> Self {
        Self {
            color: Color::LOCATION_BLUE,
            outline_color: Color::WHITE,
            outline_width_px: 2.0,
            flat_radius_px: 7.0,
            globe_pixel_size: 10.0,
        }
    }
}

impl MarkerStyle {
    pub fn circle(&self) -> CircleStyle {
        CircleStyle {
            radius_px: self.flat_radius_px,
            fill: self.color,
            stroke: self.outline_color,
            stroke_width_px: self.outline_width_px,
            height: HeightReference::ClampToGround,
        }
    }

    pub fn point(&self) -> PointStyle {
        PointStyle {
            pixel_size: self.globe_pixel_size,
            color: self.color,
            outline_color: self.outline_color,
            outline_width_px: self.outline_width_px,
            height: HeightReference::ClampToGround,
            disable_depth_test_distance: f64::INFINITY,
        }
    }
}
