//! Text block payload.
//!
//! # Invariants
//! - Alignment is stored as one horizontal and one vertical component and
//!   serialized as Qt-compatible flag bits.
//! - Search over text is case-insensitive substring matching.

use crate::model::geometry::Color;
use crate::model::schema::color_or;
use serde::Deserialize;
use serde_json::{json, Map, Value};

const ALIGN_LEFT: i64 = 0x0001;
const ALIGN_RIGHT: i64 = 0x0002;
const ALIGN_HCENTER: i64 = 0x0004;
const ALIGN_TOP: i64 = 0x0020;
const ALIGN_BOTTOM: i64 = 0x0040;
const ALIGN_VCENTER: i64 = 0x0080;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HorizontalAlign {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerticalAnchor {
    #[default]
    Top,
    Middle,
    Bottom,
}

/// Combined horizontal/vertical placement of text inside its bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Alignment {
    pub horizontal: HorizontalAlign,
    pub vertical: VerticalAnchor,
}

impl Alignment {
    pub const fn new(horizontal: HorizontalAlign, vertical: VerticalAnchor) -> Self {
        Self {
            horizontal,
            vertical,
        }
    }

    pub fn to_flags(self) -> i64 {
        let horizontal = match self.horizontal {
            HorizontalAlign::Left => ALIGN_LEFT,
            HorizontalAlign::Center => ALIGN_HCENTER,
            HorizontalAlign::Right => ALIGN_RIGHT,
        };
        let vertical = match self.vertical {
            VerticalAnchor::Top => ALIGN_TOP,
            VerticalAnchor::Middle => ALIGN_VCENTER,
            VerticalAnchor::Bottom => ALIGN_BOTTOM,
        };
        horizontal | vertical
    }

    /// Decodes flag bits; missing components fall back to left/top.
    pub fn from_flags(flags: i64) -> Self {
        let horizontal = if flags & ALIGN_HCENTER != 0 {
            HorizontalAlign::Center
        } else if flags & ALIGN_RIGHT != 0 {
            HorizontalAlign::Right
        } else {
            HorizontalAlign::Left
        };
        let vertical = if flags & ALIGN_VCENTER != 0 {
            VerticalAnchor::Middle
        } else if flags & ALIGN_BOTTOM != 0 {
            VerticalAnchor::Bottom
        } else {
            VerticalAnchor::Top
        };
        Self::new(horizontal, vertical)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Font {
    pub family: String,
    pub size: i32,
    pub bold: bool,
    pub italic: bool,
}

impl Default for Font {
    fn default() -> Self {
        Self {
            family: "Sans Serif".to_string(),
            size: 12,
            bold: false,
            italic: false,
        }
    }
}

/// Payload of a text object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextContent {
    pub content: String,
    /// When set, `content` is markdown source rather than plain text.
    pub markdown_mode: bool,
    pub font: Font,
    pub text_color: Color,
    pub background_color: Color,
    pub alignment: Alignment,
    pub line_spacing: i32,
}

impl Default for TextContent {
    fn default() -> Self {
        Self {
            content: String::new(),
            markdown_mode: true,
            font: Font::default(),
            text_color: Color::BLACK,
            background_color: Color::TRANSPARENT,
            alignment: Alignment::default(),
            line_spacing: 0,
        }
    }
}

impl TextContent {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    /// Returns whether `needle` occurs in the content, ignoring case.
    ///
    /// An empty needle matches nothing.
    pub fn contains_text(&self, needle: &str) -> bool {
        if needle.is_empty() {
            return false;
        }
        self.content
            .to_lowercase()
            .contains(needle.to_lowercase().as_str())
    }

    pub(crate) fn write_fields(&self, out: &mut Map<String, Value>) {
        out.insert("content".to_string(), json!(self.content));
        out.insert("markdownMode".to_string(), json!(self.markdown_mode));
        out.insert(
            "font".to_string(),
            json!({
                "family": self.font.family,
                "size": self.font.size,
                "bold": self.font.bold,
                "italic": self.font.italic,
            }),
        );
        out.insert("textColor".to_string(), json!(self.text_color.to_hex()));
        out.insert(
            "backgroundColor".to_string(),
            json!(self.background_color.to_hex()),
        );
        out.insert("alignment".to_string(), json!(self.alignment.to_flags()));
        out.insert("lineSpacing".to_string(), json!(self.line_spacing));
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct TextRecord {
    content: String,
    markdown_mode: bool,
    font: FontRecord,
    text_color: Option<String>,
    background_color: Option<String>,
    alignment: Option<i64>,
    line_spacing: i32,
}

impl Default for TextRecord {
    fn default() -> Self {
        Self {
            content: String::new(),
            markdown_mode: true,
            font: FontRecord::default(),
            text_color: None,
            background_color: None,
            alignment: None,
            line_spacing: 0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct FontRecord {
    family: String,
    size: i32,
    bold: bool,
    italic: bool,
}

impl Default for FontRecord {
    fn default() -> Self {
        let font = Font::default();
        Self {
            family: font.family,
            size: font.size,
            bold: font.bold,
            italic: font.italic,
        }
    }
}

impl From<TextRecord> for TextContent {
    fn from(record: TextRecord) -> Self {
        Self {
            content: record.content,
            markdown_mode: record.markdown_mode,
            font: Font {
                family: record.font.family,
                size: record.font.size,
                bold: record.font.bold,
                italic: record.font.italic,
            },
            text_color: color_or("textColor", record.text_color.as_deref(), Color::BLACK),
            background_color: color_or(
                "backgroundColor",
                record.background_color.as_deref(),
                Color::TRANSPARENT,
            ),
            alignment: record
                .alignment
                .map_or_else(Alignment::default, Alignment::from_flags),
            line_spacing: record.line_spacing,
        }
    }
}
