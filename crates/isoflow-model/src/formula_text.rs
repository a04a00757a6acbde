//! Formula text in its two spellings.
//!
//! [`crate::CellContent::Formula`] stores formulas trimmed and without the leading `=`,
//! which is also how SpreadsheetML writes them inside `<f>`. The pipeline composes
//! formulas in display form (`=ROUND(R5,3)`).

/// Stored form: trimmed, one leading `=` removed. Syntax is not checked.
pub fn normalize_formula_text(s: &str) -> String {
    let s = s.trim();
    s.strip_prefix('=').map_or(s, str::trim).to_owned()
}

/// Display form with a leading `=`; blank input stays blank.
pub fn display_formula_text(s: &str) -> String {
    match normalize_formula_text(s) {
        body if body.is_empty() => body,
        body => format!("={body}"),
    }
}
