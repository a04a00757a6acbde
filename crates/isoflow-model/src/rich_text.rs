use serde::{Deserialize, Serialize};

use crate::Color;

/// A string with styled runs over it.
///
/// Run offsets count `char`s, not bytes, so labels such as `δ¹³C` slice correctly.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RichText {
    pub text: String,
    pub runs: Vec<RichTextRun>,
}

impl RichText {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            runs: Vec::new(),
        }
    }

    pub fn plain_text(&self) -> &str {
        &self.text
    }

    pub fn is_plain(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn from_segments<S: Into<String>>(
        segments: impl IntoIterator<Item = (S, RichTextRunStyle)>,
    ) -> Self {
        let mut text = String::new();
        let mut runs = Vec::new();
        let mut cursor = 0usize;

        for (segment_text, style) in segments {
            let segment_text = segment_text.into();
            let start = cursor;
            cursor += segment_text.chars().count();
            text.push_str(&segment_text);
            runs.push(RichTextRun {
                start,
                end: cursor,
                style,
            });
        }

        Self { text, runs }
    }

    pub fn slice_run_text(&self, run: &RichTextRun) -> &str {
        slice_by_char_range(&self.text, run.start, run.end)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RichTextRun {
    pub start: usize,
    pub end: usize,
    pub style: RichTextRunStyle,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RichTextRunStyle {
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub color: Option<Color>,
    pub font: Option<String>,
    /// Font size in 1/100 points, matching [`crate::Font`].
    pub size_100pt: Option<u16>,
}

impl RichTextRunStyle {
    pub fn colored(color: Color, bold: bool) -> Self {
        Self {
            bold: Some(bold),
            color: Some(color),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bold.is_none()
            && self.italic.is_none()
            && self.color.is_none()
            && self.font.is_none()
            && self.size_100pt.is_none()
    }
}

fn slice_by_char_range(text: &str, start: usize, end: usize) -> &str {
    if start >= end {
        return "";
    }
    let byte_at = |n: usize| text.char_indices().nth(n).map_or(text.len(), |(i, _)| i);
    &text[byte_at(start)..byte_at(end)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_segments_builds_runs_with_char_indices() {
        let red = RichTextRunStyle::colored(Color::from_rgb(0xFF0000), true);
        let rt = RichText::from_segments([("δ¹⁸O ", RichTextRunStyle::default()), ("19", red)]);

        assert_eq!(rt.text, "δ¹⁸O 19");
        assert_eq!(rt.runs[0].end, 5);
        assert_eq!(rt.runs[1].start, 5);
        assert_eq!(rt.slice_run_text(&rt.runs[1]), "19");
        assert!(!rt.is_plain());
    }
}
