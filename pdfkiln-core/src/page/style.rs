use lopdf::Object;
use serde::{Deserialize, Serialize};

/// A colour in one of the device colour spaces, components in `0.0..=1.0`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "space", content = "components", rename_all = "lowercase")]
pub enum Color {
    Gray(f32),
    Rgb(f32, f32, f32),
    Cmyk(f32, f32, f32, f32),
}

impl Default for Color {
    fn default() -> Self {
        Color::black()
    }
}

impl Color {
    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Color::Rgb(r.clamp(0.0, 1.0), g.clamp(0.0, 1.0), b.clamp(0.0, 1.0))
    }

    pub fn gray(value: f32) -> Self {
        Color::Gray(value.clamp(0.0, 1.0))
    }

    pub fn black() -> Self {
        Color::Gray(0.0)
    }

    pub fn yellow() -> Self {
        Color::Rgb(1.0, 1.0, 0.0)
    }

    pub fn components(&self) -> Vec<f32> {
        match *self {
            Color::Gray(g) => vec![g],
            Color::Rgb(r, g, b) => vec![r, g, b],
            Color::Cmyk(c, m, y, k) => vec![c, m, y, k],
        }
    }

    /// Colour from operator operands, chosen by component count
    pub fn from_components(values: &[f32]) -> Option<Self> {
        match *values {
            [g] => Some(Color::Gray(g)),
            [r, g, b] => Some(Color::Rgb(r, g, b)),
            [c, m, y, k] => Some(Color::Cmyk(c, m, y, k)),
            _ => None,
        }
    }

    /// Annotation `/C` array
    pub fn to_object(&self) -> Object {
        Object::Array(self.components().into_iter().map(Object::Real).collect())
    }

    /// Content stream operator setting this as the fill (`stroke = false`)
    /// or stroke colour
    pub fn operator(&self, stroke: bool) -> String {
        let op = match (self, stroke) {
            (Color::Gray(_), false) => "g",
            (Color::Gray(_), true) => "G",
            (Color::Rgb(..), false) => "rg",
            (Color::Rgb(..), true) => "RG",
            (Color::Cmyk(..), false) => "k",
            (Color::Cmyk(..), true) => "K",
        };
        let operands: Vec<String> = self.components().iter().map(|c| format!("{c:.3}")).collect();
        format!("{} {op}", operands.join(" "))
    }
}

/// The standard 14 fonts usable without embedding; only the Latin text
/// faces are offered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StandardFont {
    #[default]
    Helvetica,
    HelveticaBold,
    TimesRoman,
    TimesBold,
    Courier,
}

impl StandardFont {
    pub fn base_font(self) -> &'static str {
        match self {
            StandardFont::Helvetica => "Helvetica",
            StandardFont::HelveticaBold => "Helvetica-Bold",
            StandardFont::TimesRoman => "Times-Roman",
            StandardFont::TimesBold => "Times-Bold",
            StandardFont::Courier => "Courier",
        }
    }

    /// Rough average glyph advance in em, used for line wrapping
    pub fn average_width(self) -> f32 {
        match self {
            StandardFont::Courier => 0.6,
            StandardFont::TimesRoman | StandardFont::TimesBold => 0.45,
            _ => 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextStyle {
    pub font: StandardFont,
    pub size: f32,
    pub color: Color,
    /// Baseline distance for multi-line text, as a multiple of `size`
    pub line_height: f32,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font: StandardFont::Helvetica,
            size: 12.0,
            color: Color::black(),
            line_height: 1.2,
        }
    }
}

impl TextStyle {
    pub fn with_size(mut self, size: f32) -> Self {
        self.size = size;
        self
    }

    pub fn with_font(mut self, font: StandardFont) -> Self {
        self.font = font;
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }
}
