//! Stage 3: extract the `last 6` summary rows of `To Sort` into the `Last 6` view.

use std::collections::HashMap;

use isoflow_model::Workbook;

use crate::layout::{COL_LABEL, LAST6_SHEET, TO_SORT_SHEET};
use crate::sheet::{at, max_col, max_row, replace_view};
use crate::{CategoryFilter, PipelineError};

/// Header names (lowercase) whose columns are copied as text.
const TEXT_HEADERS: [&str; 3] = ["comment", "identifier 2", "analysis"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Last6Report {
    pub rows: usize,
}

pub fn build_last6(workbook: &mut Workbook) -> Result<Last6Report, PipelineError> {
    let source = workbook
        .sheet_by_name(TO_SORT_SHEET)
        .cloned()
        .ok_or(PipelineError::SheetNotFound {
            sheet: TO_SORT_SHEET,
            step: 2,
        })?;
    let (last_row, last_col) = (max_row(&source), max_col(&source));
    let wanted = CategoryFilter::Last6.label();

    let (id, rows) = {
        let mut grid = replace_view(workbook, LAST6_SHEET, TO_SORT_SHEET);

        let mut header_cols: HashMap<String, u32> = HashMap::new();
        for col in 1..=last_col {
            let header = source
                .value(at(1, col))
                .to_text()
                .map(|h| h.trim().to_string())
                .unwrap_or_default();
            if !header.is_empty() {
                grid.set(1, col, header.as_str());
            }
            header_cols.insert(header.to_lowercase(), col);
        }
        let text_cols: Vec<u32> = TEXT_HEADERS
            .iter()
            .filter_map(|name| header_cols.get(*name).copied())
            .collect();

        let mut target = 2;
        for row in 2..=last_row {
            let label = source.value(at(row, COL_LABEL)).to_text();
            if label.map_or(true, |l| l.trim().to_lowercase() != wanted) {
                continue;
            }
            for col in 1..=last_col {
                let mut value = source.value(at(row, col));
                if text_cols.contains(&col) {
                    value = value.into_text();
                }
                if !value.is_empty() {
                    grid.set(target, col, value);
                }
            }
            target += 1;
        }
        (grid.id(), (target - 2) as usize)
    };
    workbook.activate(id);
    log::debug!("copied {rows} '{wanted}' rows");

    Ok(Last6Report { rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use isoflow_model::{CellRef, CellValue};
    use pretty_assertions::assert_eq;

    fn a1(s: &str) -> CellRef {
        CellRef::from_a1(s).unwrap()
    }

    #[test]
    fn keeps_only_last6_rows_with_text_identifiers() {
        let mut workbook = Workbook::new();
        workbook.add_sheet("Data");
        let to_sort = workbook.insert_sheet(0, "To Sort");
        {
            let sheet = workbook.sheet_mut(to_sort).unwrap();
            sheet.set_value(a1("C1"), " Identifier 1 ");
            sheet.set_value(a1("E1"), "Identifier 2");
            sheet.set_value(a1("R1"), "C avg");
            sheet.set_value(a1("C3"), "CO2 R1");
            sheet.set_value(a1("Q3"), "ref avg");
            sheet.set_value(a1("C8"), "NBS 18 R2");
            sheet.set_value(a1("E8"), 17.0);
            sheet.set_value(a1("Q8"), " Last 6 ");
            sheet.set_value(a1("R8"), -5.012);
            sheet.set_value(a1("C20"), "Coral R1.1");
            sheet.set_value(a1("Q20"), "last 6");
        }

        let report = build_last6(&mut workbook).unwrap();
        assert_eq!(report.rows, 2);
        assert_eq!(workbook.sheet_names(), vec!["Last 6", "To Sort", "Data"]);

        let sheet = workbook.sheet_by_name("Last 6").unwrap();
        assert!(sheet.tab_selected);
        assert_eq!(sheet.value(a1("C1")), CellValue::from("Identifier 1"));
        assert_eq!(sheet.value(a1("C2")), CellValue::from("NBS 18 R2"));
        assert_eq!(sheet.value(a1("E2")), CellValue::from("17"));
        assert_eq!(sheet.value(a1("R2")), CellValue::Number(-5.012));
        assert_eq!(sheet.value(a1("C3")), CellValue::from("Coral R1.1"));
        assert_eq!(sheet.last_row(), Some(2));
    }

    #[test]
    fn missing_to_sort_names_the_step_to_run() {
        let mut workbook = Workbook::new();
        workbook.add_sheet("Data");
        let err = build_last6(&mut workbook).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Sheet 'To Sort' not found in workbook. Run Step 2 first."
        );
    }
}
