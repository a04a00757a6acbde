use core::fmt;
use std::collections::HashMap;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// An ARGB color.
///
/// Serialized as a `#AARRGGBB` hex string.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Color {
    pub argb: u32,
}

impl Color {
    pub const fn new_argb(argb: u32) -> Self {
        Self { argb }
    }

    /// Opaque color from a `0xRRGGBB` triple.
    pub const fn from_rgb(rgb: u32) -> Self {
        Self {
            argb: 0xFF00_0000 | (rgb & 0x00FF_FFFF),
        }
    }

    pub const fn black() -> Self {
        Self::from_rgb(0x000000)
    }

    /// The `RRGGBB` part, ignoring alpha.
    ///
    /// Producers disagree on the alpha byte (`FF808080` vs `00808080`), so color
    /// comparisons go through this.
    pub const fn rgb(self) -> u32 {
        self.argb & 0x00FF_FFFF
    }

    /// Parse `RRGGBB`, `AARRGGBB`, or either with a leading `#`.
    pub fn parse_hex(s: &str) -> Option<Self> {
        let hex = s.trim().trim_start_matches('#');
        match hex.len() {
            6 => u32::from_str_radix(hex, 16).ok().map(Self::from_rgb),
            8 => u32::from_str_radix(hex, 16).ok().map(Self::new_argb),
            _ => None,
        }
    }

    /// `AARRGGBB` without a leading `#` (the SpreadsheetML `rgb` attribute form).
    pub fn to_argb_hex(self) -> String {
        format!("{:08X}", self.argb)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:08X}", self.argb)
    }
}

impl Serialize for Color {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Color::parse_hex(&s).ok_or_else(|| D::Error::custom("color must be a #AARRGGBB hex string"))
    }
}

/// Font formatting.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Font {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Font size in 1/100 points (e.g. 1100 = 11pt).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_100pt: Option<u16>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub bold: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub italic: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
}

impl Font {
    pub fn colored(color: Color, bold: bool) -> Self {
        Self {
            bold,
            color: Some(color),
            ..Self::default()
        }
    }

    pub fn bold() -> Self {
        Self {
            bold: true,
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FillPattern {
    #[default]
    None,
    Gray125,
    Solid,
    Other(String),
}

/// Fill (background) formatting.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Fill {
    #[serde(default)]
    pub pattern: FillPattern,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fg_color: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bg_color: Option<Color>,
}

impl Fill {
    pub fn solid(color: Color) -> Self {
        Self {
            pattern: FillPattern::Solid,
            fg_color: Some(color),
            bg_color: None,
        }
    }

    /// Foreground color of a solid fill, falling back to the background color.
    pub fn visible_color(&self) -> Option<Color> {
        match self.pattern {
            FillPattern::None => None,
            _ => self.fg_color.or(self.bg_color),
        }
    }
}

/// Border line style.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BorderStyle {
    #[default]
    None,
    Thin,
    Medium,
    Thick,
}

impl BorderStyle {
    pub fn from_ooxml(val: &str) -> Self {
        match val {
            "thin" | "hair" | "dotted" | "dashed" => BorderStyle::Thin,
            "medium" | "mediumDashed" | "mediumDashDot" | "double" => BorderStyle::Medium,
            "thick" => BorderStyle::Thick,
            _ => BorderStyle::None,
        }
    }

    pub fn to_ooxml(self) -> Option<&'static str> {
        match self {
            BorderStyle::None => None,
            BorderStyle::Thin => Some("thin"),
            BorderStyle::Medium => Some("medium"),
            BorderStyle::Thick => Some("thick"),
        }
    }
}

/// Border formatting (one line style per edge, shared color).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Border {
    #[serde(default)]
    pub top: BorderStyle,
    #[serde(default)]
    pub bottom: BorderStyle,
    #[serde(default)]
    pub left: BorderStyle,
    #[serde(default)]
    pub right: BorderStyle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
}

impl Border {
    pub fn is_empty(&self) -> bool {
        self.top == BorderStyle::None
            && self.bottom == BorderStyle::None
            && self.left == BorderStyle::None
            && self.right == BorderStyle::None
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HorizontalAlignment {
    General,
    Left,
    Center,
    Right,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerticalAlignment {
    Top,
    Center,
    Bottom,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Alignment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub horizontal: Option<HorizontalAlignment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vertical: Option<VerticalAlignment>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub wrap_text: bool,
}

impl Alignment {
    pub fn centered() -> Self {
        Self {
            horizontal: Some(HorizontalAlignment::Center),
            vertical: Some(VerticalAlignment::Center),
            wrap_text: false,
        }
    }

    pub fn horizontal(horizontal: HorizontalAlignment) -> Self {
        Self {
            horizontal: Some(horizontal),
            ..Self::default()
        }
    }
}

/// Complete cell style.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Style {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font: Option<Font>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<Fill>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border: Option<Border>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alignment: Option<Alignment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_format: Option<String>,
}

impl Style {
    pub fn fill_color(&self) -> Option<Color> {
        self.fill.as_ref().and_then(Fill::visible_color)
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Interned cell styles. Cells refer to entries by index; index `0` is the empty style.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(from = "StoredStyles")]
pub struct StyleTable {
    pub styles: Vec<Style>,
    #[serde(skip)]
    index: HashMap<Style, u32>,
}

#[derive(Deserialize)]
struct StoredStyles {
    #[serde(default)]
    styles: Vec<Style>,
}

impl From<StoredStyles> for StyleTable {
    fn from(stored: StoredStyles) -> Self {
        Self::from_styles(stored.styles)
    }
}

impl Default for StyleTable {
    fn default() -> Self {
        Self::new()
    }
}

impl StyleTable {
    pub fn new() -> Self {
        Self::from_styles(Vec::new())
    }

    fn from_styles(mut styles: Vec<Style>) -> Self {
        if styles.is_empty() {
            styles.push(Style::default());
        }
        let mut index = HashMap::with_capacity(styles.len());
        for (id, style) in styles.iter().enumerate() {
            index.entry(style.clone()).or_insert(id as u32);
        }
        Self { styles, index }
    }

    /// Id of `style`, adding it if unseen.
    pub fn intern(&mut self, style: Style) -> u32 {
        if let Some(&id) = self.index.get(&style) {
            return id;
        }
        let id = self.styles.len() as u32;
        self.index.insert(style.clone(), id);
        self.styles.push(style);
        id
    }

    pub fn get(&self, style_id: u32) -> Option<&Style> {
        self.styles.get(style_id as usize)
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb_ignores_alpha() {
        let a = Color::parse_hex("00808080").unwrap();
        let b = Color::parse_hex("808080").unwrap();
        assert_ne!(a, b);
        assert_eq!(a.rgb(), b.rgb());
        assert_eq!(b.to_argb_hex(), "FF808080");
    }

    #[test]
    fn solid_fill_reports_color() {
        let style = Style {
            fill: Some(Fill::solid(Color::from_rgb(0xDAE9F8))),
            ..Style::default()
        };
        assert_eq!(style.fill_color().map(Color::rgb), Some(0xDAE9F8));
        assert_eq!(Style::default().fill_color(), None);
    }
}
