use serde::{Deserialize, Serialize};

use crate::Range;

/// Sort condition within an AutoFilter / SortState payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortCondition {
    pub range: Range,
    #[serde(default)]
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortState {
    pub range: Range,
    pub conditions: Vec<SortCondition>,
}

/// Value-list filter for one column of the AutoFilter range.
///
/// `col_id` is a 0-based offset from the AutoFilter range start column, matching
/// Excel's `filterColumn/@colId`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterColumn {
    pub col_id: u32,
    /// `<filters><filter val="..."/></filters>` entries.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

/// Worksheet-level AutoFilter state (`<autoFilter>`).
///
/// Hidden rows are tracked separately on the worksheet; this only records what
/// the filter dropdowns show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetAutoFilter {
    pub range: Range,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filter_columns: Vec<FilterColumn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_state: Option<SortState>,
}

impl SheetAutoFilter {
    pub fn new(range: Range) -> Self {
        Self {
            range,
            filter_columns: Vec::new(),
            sort_state: None,
        }
    }

    /// Replace (or add) the value list for `col_id`.
    pub fn add_filter_column(&mut self, col_id: u32, values: Vec<String>) {
        self.filter_columns.retain(|c| c.col_id != col_id);
        self.filter_columns.push(FilterColumn { col_id, values });
        self.filter_columns.sort_by_key(|c| c.col_id);
    }

    pub fn add_sort_condition(&mut self, range: Range, descending: bool) {
        let whole = self.range;
        let sort_state = self.sort_state.get_or_insert_with(|| SortState {
            range: whole,
            conditions: Vec::new(),
        });
        sort_state
            .conditions
            .push(SortCondition { range, descending });
    }
}
