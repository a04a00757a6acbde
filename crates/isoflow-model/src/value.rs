use std::fmt;

use serde::{Deserialize, Serialize};

/// Scalar cell value.
///
/// The enum uses an explicit `{type, value}` tagged layout so dumps stay stable.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CellValue {
    /// Empty / unset cell value.
    #[default]
    Empty,
    /// IEEE-754 double precision number.
    Number(f64),
    /// Plain string (not rich text).
    String(String),
    Boolean(bool),
    /// Error literal such as `#DIV/0!`.
    Error(String),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Text rendering of the value, `None` for [`CellValue::Empty`].
    ///
    /// Integral numbers render without a fractional part so that identifiers such as
    /// `12` survive a number -> text coercion unchanged.
    pub fn to_text(&self) -> Option<String> {
        match self {
            CellValue::Empty => None,
            other => Some(other.to_string()),
        }
    }

    /// Coerce a value to its text form, leaving empties untouched.
    pub fn into_text(self) -> CellValue {
        match self {
            CellValue::Empty => CellValue::Empty,
            CellValue::String(s) => CellValue::String(s),
            other => CellValue::String(other.to_string()),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Number(n) => f.write_str(&format_number(*n)),
            CellValue::String(s) => f.write_str(s),
            CellValue::Boolean(true) => f.write_str("TRUE"),
            CellValue::Boolean(false) => f.write_str("FALSE"),
            CellValue::Error(e) => f.write_str(e),
        }
    }
}

/// Shortest text form of a number; integral values drop the `.0`.
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<i32> for CellValue {
    fn from(value: i32) -> Self {
        CellValue::Number(value as f64)
    }
}

impl From<u32> for CellValue {
    fn from(value: u32) -> Self {
        CellValue::Number(value as f64)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Boolean(value)
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::String(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::String(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_coercion_keeps_integers_clean() {
        assert_eq!(CellValue::Number(12.0).to_text().as_deref(), Some("12"));
        assert_eq!(CellValue::Number(-2.37).to_text().as_deref(), Some("-2.37"));
        assert_eq!(CellValue::Empty.to_text(), None);
        assert_eq!(
            CellValue::Number(3.0).into_text(),
            CellValue::String("3".to_string())
        );
        assert_eq!(CellValue::Empty.into_text(), CellValue::Empty);
    }

    #[test]
    fn serde_layout_is_tagged() {
        let json = serde_json::to_string(&CellValue::Number(1.5)).unwrap();
        assert_eq!(json, r#"{"type":"number","value":1.5}"#);
    }
}
