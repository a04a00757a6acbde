use serde::{Deserialize, Serialize};

use crate::{normalize_formula_text, CellValue, RichText};

/// What a cell holds: exactly one of a literal, a formula, or rich text.
///
/// Formulas carry the engine's last computed result (`cached`) when one was
/// materialized; a formula that has never been recalculated has `cached: None`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CellContent {
    Literal { value: CellValue },
    Formula {
        /// Canonical formula text (no leading `=`).
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cached: Option<CellValue>,
    },
    RichText { text: RichText },
}

impl Default for CellContent {
    fn default() -> Self {
        CellContent::Literal {
            value: CellValue::Empty,
        }
    }
}

impl CellContent {
    pub fn literal(value: impl Into<CellValue>) -> Self {
        CellContent::Literal {
            value: value.into(),
        }
    }

    /// A formula without a cached result. Accepts display (`=..`) or canonical text.
    pub fn formula(text: &str) -> Self {
        CellContent::Formula {
            text: normalize_formula_text(text),
            cached: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellContent::Literal { value } if value.is_empty())
    }

    pub fn is_formula(&self) -> bool {
        matches!(self, CellContent::Formula { .. })
    }

    pub fn formula_text(&self) -> Option<&str> {
        match self {
            CellContent::Formula { text, .. } => Some(text),
            _ => None,
        }
    }

    /// Formula cell whose result was never materialized.
    pub fn is_uncached_formula(&self) -> bool {
        matches!(
            self,
            CellContent::Formula { cached, .. }
                if cached.as_ref().map_or(true, CellValue::is_empty)
        )
    }

    /// The value a reader should see: the cached result for formulas (empty when
    /// uncached), the literal itself otherwise, and the plain text of rich text.
    pub fn resolved_value(&self) -> CellValue {
        match self {
            CellContent::Literal { value } => value.clone(),
            CellContent::Formula { cached, .. } => cached.clone().unwrap_or_default(),
            CellContent::RichText { text } => CellValue::String(text.text.clone()),
        }
    }
}

/// A single cell record.
///
/// Cells are stored sparsely: when a cell is "truly empty" (no content, default
/// style), it is removed from the worksheet map.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    #[serde(default)]
    pub content: CellContent,

    /// Index into the workbook style table.
    #[serde(default)]
    pub style_id: u32,
}

impl Cell {
    pub fn new(content: CellContent) -> Self {
        Self {
            content,
            style_id: 0,
        }
    }

    pub fn is_truly_empty(&self) -> bool {
        self.content.is_empty() && self.style_id == 0
    }

    pub fn value(&self) -> CellValue {
        self.content.resolved_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolved_value_prefers_cache() {
        let uncached = CellContent::formula("=ROUND(R5,3)");
        assert_eq!(uncached.formula_text(), Some("ROUND(R5,3)"));
        assert!(uncached.is_uncached_formula());
        assert_eq!(uncached.resolved_value(), CellValue::Empty);

        let cached = CellContent::Formula {
            text: "ROUND(R5,3)".to_string(),
            cached: Some(CellValue::Number(1.25)),
        };
        assert!(!cached.is_uncached_formula());
        assert_eq!(cached.resolved_value(), CellValue::Number(1.25));

        assert_eq!(
            CellContent::literal("ok").resolved_value(),
            CellValue::String("ok".to_string())
        );
    }

    #[test]
    fn styled_blank_cell_is_not_truly_empty() {
        let mut cell = Cell::default();
        assert!(cell.is_truly_empty());
        cell.style_id = 3;
        assert!(!cell.is_truly_empty());
    }
}
