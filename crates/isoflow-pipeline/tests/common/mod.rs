#![allow(dead_code)]

use std::path::Path;

use isoflow_model::{CellContent, CellRef, CellValue, Workbook};
use isoflow_pipeline::Recalculator;
use isoflow_xlsx::{read_workbook, write_workbook};

pub const INPUT_SHEET: &str = "Default_Gas_Bench.wke";

pub fn a1(s: &str) -> CellRef {
    CellRef::from_a1(s).unwrap()
}

/// Stands in for a spreadsheet engine: every formula without a cached result gets
/// `value` cached, and the file is saved back.
pub struct FillCaches {
    pub value: f64,
}

impl Recalculator for FillCaches {
    fn recalculate(&self, path: &Path) -> bool {
        let Ok(mut workbook) = read_workbook(path) else {
            return false;
        };
        for sheet in &mut workbook.sheets {
            let pending: Vec<(CellRef, String)> = sheet
                .iter_cells()
                .filter(|(_, cell)| cell.content.is_uncached_formula())
                .filter_map(|(at, cell)| Some((at, cell.content.formula_text()?.to_string())))
                .collect();
            for (at, text) in pending {
                sheet.set_content(
                    at,
                    CellContent::Formula {
                        text,
                        cached: Some(CellValue::Number(self.value)),
                    },
                );
            }
        }
        write_workbook(&workbook, path).is_ok()
    }
}

/// One raw export row: line, time code, identifier, peak, amplitude, area, δ13C, δ18O.
pub fn raw_row(line: u32, ident: &str, peak: u32) -> Vec<CellValue> {
    let p = f64::from(peak);
    vec![
        CellValue::Number(f64::from(line)),
        CellValue::from("10:15:00"),
        CellValue::from(ident),
        CellValue::Number(p),
        CellValue::Number(3000.0 - p * 100.0),
        CellValue::Number(25.0 + p),
        CellValue::Number(-1.0 - p / 100.0),
        CellValue::Number(-5.0 + p / 100.0),
    ]
}

pub const RAW_HEADERS: [&str; 8] = [
    "Line",
    "Time Code",
    "Identifier 1",
    "Peak Nr",
    "Ampl 44",
    "Area All",
    "d 13C/12C",
    "d 18O/16O",
];

/// Raw workbook with one run line per `(identifier, peaks)` entry.
pub fn raw_workbook(lines: &[(&str, u32)]) -> Workbook {
    let mut workbook = Workbook::new();
    let id = workbook.add_sheet(INPUT_SHEET);
    let sheet = workbook.sheet_mut(id).unwrap();
    for (col, header) in RAW_HEADERS.iter().enumerate() {
        sheet.set_value(CellRef::new(0, col as u32), *header);
    }
    let mut row = 1;
    for (i, (ident, peaks)) in lines.iter().enumerate() {
        for peak in 1..=*peaks {
            for (col, value) in raw_row(i as u32 + 1, ident, peak).into_iter().enumerate() {
                sheet.set_value(CellRef::new(row, col as u32), value);
            }
            row += 1;
        }
    }
    workbook
}

pub fn write_raw(dir: &Path, lines: &[(&str, u32)]) -> std::path::PathBuf {
    let path = dir.join("run.xlsx");
    write_workbook(&raw_workbook(lines), &path).unwrap();
    path
}
