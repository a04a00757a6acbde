//! Stage 2: materialize `Data` into plain values in the `To Sort` view and filter it on
//! the summary label column.

use isoflow_model::{CellValue, Range, SheetAutoFilter, Workbook};

use crate::layout::{COL_LABEL, DATA_SHEET, TO_SORT_SHEET};
use crate::sheet::{at, col_letter, max_col, max_row, replace_view};
use crate::{CategoryFilter, PipelineError};

/// Columns D..F hold identifier-like values that must stay text.
const TEXT_COLS: [u32; 3] = [4, 5, 6];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ToSortReport {
    pub last_row: u32,
    pub hidden_rows: usize,
}

pub fn build_to_sort(
    workbook: &mut Workbook,
    filter: CategoryFilter,
) -> Result<ToSortReport, PipelineError> {
    let source = workbook
        .sheet_by_name(DATA_SHEET)
        .cloned()
        .ok_or(PipelineError::SheetNotFound {
            sheet: DATA_SHEET,
            step: 1,
        })?;
    let (last_row, last_col) = (max_row(&source), max_col(&source));

    let (id, hidden_rows) = {
        let mut grid = replace_view(workbook, TO_SORT_SHEET, DATA_SHEET);
        for (cell_ref, cell) in source.iter_cells() {
            let mut value = cell.value();
            if TEXT_COLS.contains(&(cell_ref.col + 1)) {
                value = value.into_text();
            }
            if !value.is_empty() {
                grid.sheet.set_value(cell_ref, value);
            }
        }

        if last_row > 0 && last_col > 0 {
            let mut auto_filter =
                SheetAutoFilter::new(Range::new(at(1, 1), at(last_row, last_col)));
            auto_filter.add_filter_column(COL_LABEL - 1, vec![filter.label().to_string()]);
            auto_filter.add_sort_condition(
                Range::new(at(2, COL_LABEL), at(last_row.max(2), COL_LABEL)),
                false,
            );
            log::debug!(
                "auto-filter on A1:{}{last_row}",
                col_letter(last_col)
            );
            grid.sheet.auto_filter = Some(auto_filter);
        }

        let mut hidden_rows = 0;
        if !filter.is_wildcard() {
            for row in 2..=last_row {
                let keep = match grid.value(row, COL_LABEL) {
                    CellValue::Empty => false,
                    value => value.to_string().to_lowercase() == filter.label(),
                };
                if !keep {
                    grid.sheet.set_row_hidden(row - 1, true);
                    hidden_rows += 1;
                }
            }
        }
        (grid.id(), hidden_rows)
    };
    workbook.activate(id);

    Ok(ToSortReport {
        last_row,
        hidden_rows,
    })
}
