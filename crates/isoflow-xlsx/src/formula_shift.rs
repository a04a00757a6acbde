//! Relative-reference shifting for shared-formula followers.
//!
//! A shared formula stores its text once on the anchor cell; followers carry only
//! `si`. Followers get the anchor text with every relative A1 reference moved by
//! the follower's offset. `$`-anchored parts stay put.

use std::sync::OnceLock;

use isoflow_model::{column_index, column_name, EXCEL_MAX_COLS, EXCEL_MAX_ROWS};
use regex::Regex;

fn cell_ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\$?)([A-Za-z]{1,3})(\$?)([0-9]+)").expect("valid regex")
    })
}

/// Shift relative references in `formula` by `(d_row, d_col)`.
///
/// References that would leave the sheet become `#REF!`.
pub(crate) fn shift_formula(formula: &str, d_row: i64, d_col: i64) -> String {
    if d_row == 0 && d_col == 0 {
        return formula.to_string();
    }

    let mut out = String::with_capacity(formula.len());
    let mut segment_start = 0;
    let mut in_string = false;

    for (idx, ch) in formula.char_indices() {
        if ch == '"' {
            if !in_string {
                out.push_str(&shift_segment(&formula[segment_start..idx], d_row, d_col));
                segment_start = idx;
            } else {
                out.push_str(&formula[segment_start..=idx]);
                segment_start = idx + 1;
            }
            in_string = !in_string;
        }
    }

    let tail = &formula[segment_start..];
    if in_string {
        out.push_str(tail);
    } else {
        out.push_str(&shift_segment(tail, d_row, d_col));
    }
    out
}

fn shift_segment(segment: &str, d_row: i64, d_col: i64) -> String {
    let mut out = String::with_capacity(segment.len());
    let mut last = 0;

    for caps in cell_ref_re().captures_iter(segment) {
        let Some(m) = caps.get(0) else {
            continue;
        };
        let before = segment[..m.start()].chars().next_back();
        let after = segment[m.end()..].chars().next();
        // Part of a longer identifier (`LOG10(`, `Sheet1`, `A1B`) or a decimal.
        let is_embedded = before.is_some_and(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
            || after.is_some_and(|c| c.is_ascii_alphanumeric() || c == '(' || c == '_');
        if is_embedded {
            continue;
        }

        out.push_str(&segment[last..m.start()]);
        out.push_str(&shift_ref(&caps, d_row, d_col));
        last = m.end();
    }

    out.push_str(&segment[last..]);
    out
}

fn shift_ref(caps: &regex::Captures<'_>, d_row: i64, d_col: i64) -> String {
    let whole = &caps[0];
    let col_abs = &caps[1];
    let letters = &caps[2];
    let row_abs = &caps[3];
    let digits = &caps[4];

    let (Ok(col), Ok(row)) = (column_index(letters), digits.parse::<i64>()) else {
        return whole.to_string();
    };

    let col = if col_abs.is_empty() {
        i64::from(col) + d_col
    } else {
        i64::from(col)
    };
    let row = if row_abs.is_empty() { row + d_row } else { row };

    if col < 0 || col >= i64::from(EXCEL_MAX_COLS) || row < 1 || row > i64::from(EXCEL_MAX_ROWS) {
        return "#REF!".to_string();
    }

    format!(
        "{col_abs}{}{row_abs}{row}",
        column_name(col as u32),
    )
}
