//! Stage 1: group the raw export by run line, pad every group to an 11-row block and
//! write the blocks with their summary formulas and peak checks into the `Data` view.

use std::collections::HashMap;

use isoflow_model::{CellValue, Workbook, Worksheet};

use crate::layout::{
    BLOCK_ROWS, COL_AMPL, COL_ANALYSIS, COL_AREA, COL_C_AVG, COL_C_STDEV, COL_D13C, COL_D18O,
    COL_FUNNY, COL_IDENTIFIER_1, COL_IDENTIFIER_2, COL_LABEL, COL_LINE, COL_MIN_INTENSITY,
    COL_O_AVG, COL_O_STDEV, COL_PEAK_NR, COL_SUM_AREA_ALL, COL_TIME_CODE, DATA_HEADERS,
    DATA_SHEET, FIRST_BLOCK_ROW, REFERENCE_PEAKS, SUMMARY_LABELS,
};
use crate::normalize::map_columns;
use crate::sheet::{at, col_letter, max_col, max_row, replace_view, Grid};
use crate::{CategoryFilter, Palette, PipelineError};

/// Header row plus data rows of the raw input sheet, as resolved values.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SourceTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl SourceTable {
    pub fn from_sheet(sheet: &Worksheet) -> Self {
        let width = max_col(sheet);
        let headers = (1..=width)
            .map(|col| sheet.value(at(1, col)).to_text().unwrap_or_default())
            .collect();
        let rows = (2..=max_row(sheet))
            .map(|row| (1..=width).map(|col| sheet.value(at(row, col))).collect())
            .collect();
        Self { headers, rows }
    }
}

/// One measurement row laid out on the `Data` columns.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub values: Vec<CellValue>,
}

impl Record {
    fn blank() -> Self {
        Self {
            values: vec![CellValue::Empty; DATA_HEADERS.len()],
        }
    }

    pub fn get(&self, col: u32) -> &CellValue {
        &self.values[slot(col)]
    }

    fn set(&mut self, col: u32, value: CellValue) {
        self.values[slot(col)] = value;
    }
}

/// A run line padded (or truncated) to exactly [`BLOCK_ROWS`] records.
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub line: String,
    pub records: Vec<Record>,
    /// Source rows seen for this line before padding/truncation.
    pub real_rows: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DataReport {
    pub blocks: usize,
    pub last_row: u32,
}

fn slot(col: u32) -> usize {
    col as usize - 1
}

/// Group source rows by run line in first-seen order and pad each group.
///
/// Rows without a line value cannot be grouped and are dropped. `Sum area all` is never
/// taken from the source.
pub fn build_blocks(source: &SourceTable, mapping: &[Option<usize>]) -> Vec<Block> {
    let Some(line_src) = mapping.get(slot(COL_LINE)).copied().flatten() else {
        log::warn!("input sheet has no 'Line' column; no blocks written");
        return Vec::new();
    };
    let has_peak_nr = mapping.get(slot(COL_PEAK_NR)).copied().flatten().is_some();

    let mut groups: Vec<(String, Vec<Record>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for row in &source.rows {
        let Some(line) = row.get(line_src).and_then(CellValue::to_text) else {
            continue;
        };
        if line.trim().is_empty() {
            continue;
        }

        let mut record = Record::blank();
        for (i, src) in mapping.iter().enumerate() {
            let col = i as u32 + 1;
            if col == COL_SUM_AREA_ALL {
                continue;
            }
            if let Some(value) = src.and_then(|s| row.get(s)) {
                record.set(col, value.clone());
            }
        }

        let group = *index.entry(line.clone()).or_insert_with(|| {
            groups.push((line, Vec::new()));
            groups.len() - 1
        });
        groups[group].1.push(record);
    }

    groups
        .into_iter()
        .map(|(line, records)| pad_block(line, records, has_peak_nr))
        .collect()
}

fn pad_block(line: String, mut records: Vec<Record>, has_peak_nr: bool) -> Block {
    let real_rows = records.len();
    let target = BLOCK_ROWS as usize;
    if real_rows > target {
        log::debug!("line {line}: keeping the first {target} of {real_rows} rows");
        records.truncate(target);
    }

    let template = records.first().cloned().unwrap_or_else(Record::blank);
    for i in records.len()..target {
        let mut synthetic = Record::blank();
        for col in [COL_LINE, COL_TIME_CODE, COL_IDENTIFIER_1] {
            synthetic.set(col, template.get(col).clone());
        }
        if has_peak_nr {
            synthetic.set(COL_PEAK_NR, CellValue::from(i as u32 + 1));
        }
        records.push(synthetic);
    }

    Block {
        line,
        records,
        real_rows,
    }
}

/// Which formula families can be emitted, given the columns the source provided.
#[derive(Clone, Copy, Debug)]
struct Channels {
    isotopes: bool,
    area: bool,
    amplitude: bool,
}

/// Build (or rebuild) the `Data` view from `input_sheet`, immediately left of it, and
/// make it the active tab.
pub fn build_data_view(
    workbook: &mut Workbook,
    input_sheet: &str,
    palette: &Palette,
) -> Result<DataReport, PipelineError> {
    let source = workbook
        .sheet_by_name(input_sheet)
        .map(SourceTable::from_sheet)
        .ok_or_else(|| PipelineError::InputSheetNotFound(input_sheet.to_string()))?;

    let mapping = map_columns(&DATA_HEADERS, &source.headers);
    let mapped = |col: u32| mapping[slot(col)].is_some();
    let channels = Channels {
        isotopes: mapped(COL_D13C) && mapped(COL_D18O),
        area: mapped(COL_AREA),
        amplitude: mapped(COL_AMPL),
    };
    if !channels.isotopes {
        log::warn!("isotope columns not found in '{input_sheet}'; summary formulas skipped");
    }

    let blocks = build_blocks(&source, &mapping);

    let (id, last_row) = {
        let mut grid = replace_view(workbook, DATA_SHEET, input_sheet);
        for (i, header) in DATA_HEADERS.iter().enumerate() {
            if !header.is_empty() {
                grid.set(1, i as u32 + 1, *header);
            }
        }

        let mut delta_rows = Vec::with_capacity(blocks.len());
        let mut row = FIRST_BLOCK_ROW;
        for (i, block) in blocks.iter().enumerate() {
            if i > 0 {
                row += 1;
            }
            log::debug!(
                "block {} (line {}) at row {row}: {} real rows",
                i + 1,
                block.line,
                block.real_rows
            );
            delta_rows.push(write_block(&mut grid, block, row, channels));
            row += BLOCK_ROWS;
        }

        color_label_columns(&mut grid, &delta_rows, palette);
        (grid.id(), grid.max_row())
    };
    workbook.activate(id);

    Ok(DataReport {
        blocks: blocks.len(),
        last_row,
    })
}

/// Write one block starting at `first`; returns the row of its `delta` label.
fn write_block(grid: &mut Grid<'_>, block: &Block, first: u32, channels: Channels) -> u32 {
    for (i, record) in block.records.iter().enumerate() {
        let row = first + i as u32;
        for (j, value) in record.values.iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            let col = j as u32 + 1;
            grid.set(row, col, value.clone());
            if col == COL_IDENTIFIER_2 || col == COL_ANALYSIS {
                grid.number_format(row, col, "@");
            }
        }
    }

    let delta_row = write_summary_rows(grid, first, channels);
    if channels.amplitude {
        write_peak_checks(grid, first);
    }
    delta_row
}

fn write_summary_rows(grid: &mut Grid<'_>, first: u32, channels: Channels) -> u32 {
    let last = first + BLOCK_ROWS - 1;
    let c = col_letter(COL_D13C);
    let o = col_letter(COL_D18O);
    let area = col_letter(COL_AREA);
    let (c_avg, o_avg) = (col_letter(COL_C_AVG), col_letter(COL_O_AVG));

    let last7_start = first.max(last.saturating_sub(6));
    let last6_start = first.max(last.saturating_sub(5));
    let start_of_last6 = if first + 5 <= last { first + 5 } else { first };
    let second_last = if last > first { last - 1 } else { last };

    let row_of = |label: CategoryFilter| {
        SUMMARY_LABELS
            .iter()
            .find(|(l, _)| *l == label)
            .map_or(first, |(_, offset)| first + offset)
    };

    for (label, offset) in SUMMARY_LABELS {
        let row = first + offset;
        grid.set(row, COL_LABEL, label.label());
        if !channels.isotopes {
            continue;
        }

        match label {
            CategoryFilter::RefAvg => {
                let picks = |l: &str| format!("{l}{},{l}{},{l}{}", first, first + 1, first + 3);
                write_stats(grid, row, &picks(&c), &picks(&o));
            }
            CategoryFilter::All | CategoryFilter::Last6 => {
                let from = if label == CategoryFilter::All {
                    last7_start
                } else {
                    last6_start
                };
                let span = |l: &str| format!("{l}{from}:{l}{last}");
                write_stats(grid, row, &span(&c), &span(&o));
                if channels.area {
                    grid.set_formula(
                        row,
                        COL_SUM_AREA_ALL,
                        &format!("ROUND(SUM({}),2)", span(&area)),
                    );
                }
            }
            CategoryFilter::Start => {
                grid.set_formula(row, COL_C_AVG, &format!("ROUND({c}{start_of_last6},3)"));
                grid.set_formula(row, COL_O_AVG, &format!("ROUND({o}{start_of_last6},3)"));
            }
            CategoryFilter::End => {
                grid.set_formula(row, COL_C_AVG, &format!("ROUND({c}{last},3)"));
                grid.set_formula(row, COL_O_AVG, &format!("ROUND({o}{second_last},3)"));
            }
            CategoryFilter::Delta => {
                let (start, end) = (row_of(CategoryFilter::Start), row_of(CategoryFilter::End));
                grid.set_formula(
                    row,
                    COL_C_AVG,
                    &format!("ROUND({c_avg}{end}-{c_avg}{start},3)"),
                );
                grid.set_formula(
                    row,
                    COL_O_AVG,
                    &format!("ROUND({o_avg}{end}-{o_avg}{start},3)"),
                );
            }
        }
    }

    row_of(CategoryFilter::Delta)
}

fn write_stats(grid: &mut Grid<'_>, row: u32, carbon: &str, oxygen: &str) {
    grid.set_formula(row, COL_C_AVG, &format!("ROUND(AVERAGE({carbon}),3)"));
    grid.set_formula(row, COL_C_STDEV, &format!("ROUND(STDEV({carbon}),3)"));
    grid.set_formula(row, COL_O_AVG, &format!("ROUND(AVERAGE({oxygen}),3)"));
    grid.set_formula(row, COL_O_STDEV, &format!("ROUND(STDEV({oxygen}),3)"));
}

/// Peak-shape check (amplitude must drop towards the next peak) and minimum intensity.
/// The first peaks of a block are the reference gas pulses.
fn write_peak_checks(grid: &mut Grid<'_>, first: u32) {
    let j = col_letter(COL_AMPL);
    for i in 0..BLOCK_ROWS {
        let row = first + i;
        if i < REFERENCE_PEAKS {
            grid.set(row, COL_FUNNY, "ref");
            grid.set(row, COL_MIN_INTENSITY, CellValue::Empty);
        } else {
            let next = row + 1;
            grid.set_formula(
                row,
                COL_FUNNY,
                &format!(r#"IF({j}{row}>{j}{next},IF({j}{next}<{j}{row},"ok","check"),"check")"#),
            );
            grid.set_formula(
                row,
                COL_MIN_INTENSITY,
                &format!(r#"IF({j}{row}<400,"check","ok")"#),
            );
        }
    }
}

/// Shade the label column and the two flag columns from the header down, leaving the
/// separator row under each block uncolored.
fn color_label_columns(grid: &mut Grid<'_>, delta_rows: &[u32], palette: &Palette) {
    let last = grid.max_row();
    for row in 1..=last {
        if delta_rows.iter().any(|d| d + 1 == row) {
            continue;
        }
        grid.fill(row, COL_LABEL, palette.label_fill);
        grid.fill(row, COL_FUNNY, palette.flag_fill);
        grid.fill(row, COL_MIN_INTENSITY, palette.flag_fill);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use isoflow_model::CellRef;
    use pretty_assertions::assert_eq;

    fn a1(s: &str) -> CellRef {
        CellRef::from_a1(s).unwrap()
    }

    fn source(headers: &[&str], rows: Vec<Vec<CellValue>>) -> SourceTable {
        SourceTable {
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows,
        }
    }

    fn raw_row(line: f64, ident: &str, peak: f64) -> Vec<CellValue> {
        vec![
            CellValue::Number(line),
            CellValue::from("14:02"),
            CellValue::from(ident),
            CellValue::Number(peak),
            CellValue::Number(2400.0 - peak * 10.0),
            CellValue::Number(-1.5 + peak / 100.0),
            CellValue::Number(-4.0),
        ]
    }

    const RAW_HEADERS: [&str; 7] = [
        "Line",
        "Time Code",
        "Identifier 1",
        "Peak Nr",
        "Ampl  44",
        "d 13C/12C",
        "d 18O/16O",
    ];

    #[test]
    fn short_groups_are_padded_with_synthetic_peaks() {
        let table = source(
            &RAW_HEADERS,
            vec![raw_row(7.0, "NBS 18 R1", 1.0), raw_row(7.0, "NBS 18 R1", 2.0)],
        );
        let mapping = map_columns(&DATA_HEADERS, &table.headers);
        let blocks = build_blocks(&table, &mapping);

        assert_eq!(blocks.len(), 1);
        let block = &blocks[0];
        assert_eq!(block.real_rows, 2);
        assert_eq!(block.records.len(), 11);
        let synthetic = &block.records[5];
        assert_eq!(synthetic.get(COL_LINE), &CellValue::Number(7.0));
        assert_eq!(synthetic.get(COL_IDENTIFIER_1), &CellValue::from("NBS 18 R1"));
        assert_eq!(synthetic.get(COL_PEAK_NR), &CellValue::Number(6.0));
        assert!(synthetic.get(COL_D13C).is_empty());
    }

    #[test]
    fn groups_keep_first_seen_order_and_drop_unkeyed_rows() {
        let mut orphan = raw_row(0.0, "lost", 1.0);
        orphan[0] = CellValue::Empty;
        let rows = (1..=13)
            .map(|p| raw_row(if p % 2 == 0 { 3.0 } else { 9.0 }, "CO2", p as f64))
            .chain(std::iter::once(orphan))
            .collect();
        let table = source(&RAW_HEADERS, rows);
        let blocks = build_blocks(&table, &map_columns(&DATA_HEADERS, &table.headers));

        let lines: Vec<_> = blocks.iter().map(|b| b.line.as_str()).collect();
        assert_eq!(lines, vec!["9", "3"]);
        assert_eq!(blocks[0].real_rows, 7);
        assert_eq!(blocks[1].real_rows, 6);
        assert!(blocks.iter().all(|b| b.records.len() == 11));
    }

    #[test]
    fn data_view_carries_formulas_flags_and_shading() {
        let mut workbook = Workbook::new();
        let raw = workbook.add_sheet("Default_Gas_Bench.wke");
        {
            let sheet = workbook.sheet_mut(raw).unwrap();
            for (c, h) in RAW_HEADERS.iter().enumerate() {
                sheet.set_value(CellRef::new(0, c as u32), *h);
            }
            for r in 0..3u32 {
                for (c, v) in raw_row(1.0, "Coral", r as f64 + 1.0).into_iter().enumerate() {
                    sheet.set_value(CellRef::new(r + 1, c as u32), v);
                }
                for (c, v) in raw_row(2.0, "CO2", r as f64 + 1.0).into_iter().enumerate() {
                    sheet.set_value(CellRef::new(r + 4, c as u32), v);
                }
            }
        }

        let report = build_data_view(&mut workbook, "Default_Gas_Bench.wke", &Palette::STANDARD)
            .unwrap();
        assert_eq!(report.blocks, 2);
        assert_eq!(report.last_row, 25);
        assert_eq!(workbook.sheet_names(), vec!["Data", "Default_Gas_Bench.wke"]);

        let data = workbook.sheet_by_name("Data").unwrap();
        assert!(data.tab_selected);
        assert_eq!(data.value(a1("R1")), CellValue::from("C avg"));
        assert!(data.value(a1("Q1")).is_empty());

        let formula = |s: &str| data.content(a1(s)).and_then(|c| c.formula_text());
        assert_eq!(data.value(a1("Q3")), CellValue::from("ref avg"));
        assert_eq!(formula("R3"), Some("ROUND(AVERAGE(L3,L4,L6),3)"));
        assert_eq!(formula("V7"), Some("ROUND(STDEV(M7:M13),3)"));
        assert_eq!(data.value(a1("Q8")), CellValue::from("last 6"));
        assert_eq!(formula("R11"), Some("ROUND(L8,3)"));
        assert_eq!(formula("U12"), Some("ROUND(M12,3)"));
        assert_eq!(formula("R13"), Some("ROUND(R12-R11,3)"));
        assert_eq!(formula("S13"), None);
        // no area column in the source
        assert_eq!(formula("X7"), None);

        // second block after one separator row
        assert_eq!(data.value(a1("Q15")), CellValue::from("ref avg"));
        assert_eq!(formula("R15"), Some("ROUND(AVERAGE(L15,L16,L18),3)"));

        assert_eq!(data.value(a1("Z6")), CellValue::from("ref"));
        assert_eq!(
            formula("Z7"),
            Some(r#"IF(J7>J8,IF(J8<J7,"ok","check"),"check")"#)
        );
        assert_eq!(formula("AA13"), Some(r#"IF(J13<400,"check","ok")"#));

        let fill = |s: &str| {
            workbook
                .styles
                .get(data.style_id(a1(s)))
                .and_then(|style| style.fill_color())
                .map(|c| c.rgb())
        };
        assert_eq!(fill("Q2"), Some(0xCDFFCC));
        assert_eq!(fill("Q14"), None);
        assert_eq!(fill("AA14"), None);
        assert_eq!(fill("Z20"), Some(0xCDFEFF));
    }

    #[test]
    fn missing_isotope_columns_skip_the_formulas() {
        let mut workbook = Workbook::new();
        let raw = workbook.add_sheet("Raw");
        {
            let sheet = workbook.sheet_mut(raw).unwrap();
            sheet.set_value(a1("A1"), "Line");
            sheet.set_value(a1("B1"), "Identifier 2");
            sheet.set_value(a1("A2"), 1.0);
            sheet.set_value(a1("B2"), 42.0);
        }

        build_data_view(&mut workbook, "raw", &Palette::STANDARD).unwrap();
        let data = workbook.sheet_by_name("Data").unwrap();
        assert_eq!(data.value(a1("Q3")), CellValue::from("ref avg"));
        assert!(data.content(a1("R3")).is_none() || data.value(a1("R3")).is_empty());
        assert!(data.content(a1("Z7")).map_or(true, |c| !c.is_formula()));

        let format = workbook
            .styles
            .get(data.style_id(a1("E3")))
            .and_then(|s| s.number_format.clone());
        assert_eq!(format.as_deref(), Some("@"));
    }

    #[test]
    fn missing_input_sheet_is_fatal() {
        let mut workbook = Workbook::new();
        workbook.add_sheet("Other");
        let err = build_data_view(&mut workbook, "Default_Gas_Bench.wke", &Palette::STANDARD)
            .unwrap_err();
        assert!(matches!(err, PipelineError::InputSheetNotFound(_)));
        assert_eq!(workbook.sheet_names(), vec!["Other"]);
    }
}
