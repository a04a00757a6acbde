//! Stage 4: group the `Last 6` rows by sample, summarize the reference materials and
//! emit the normalization formulas for every other sample.

mod panel;
mod sample_id;

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use isoflow_model::{Alignment, CellValue, Font, HorizontalAlignment, Workbook};

use crate::config::{is_reference_key, reference_standard, CO2_KEY, VSMOW_OFFSET, VSMOW_SLOPE};
use crate::layout::{GROUP_DATA_COLS, GROUP_SHEET, LAST6_SHEET};
use crate::sheet::{at, col_letter, max_row, replace_view, Grid};
use crate::{Palette, PipelineError};

pub use sample_id::{group_key, is_aragonite, RunNumber, SampleId};

pub(crate) const COL_IDENTIFIER: u32 = 3;
pub(crate) const COL_C_MEAN: u32 = 18;
pub(crate) const COL_O_MEAN: u32 = 21;

const COL_Z: u32 = 26;
const COL_AC: u32 = 29;
const COL_AE: u32 = 31;
const COL_AG: u32 = 33;
const COL_AH: u32 = 34;
/// Columns recolored on an aragonite row (A..AI).
const ARAGONITE_ROW_COLS: u32 = 35;

const HEADER_ROW: u32 = 18;
const FIRST_GROUP_ROW: u32 = 19;
/// Top panel area shaded blue (A1:W15).
const PANEL_AREA: ((u32, u32), (u32, u32)) = ((1, 15), (1, 23));
/// Divider columns A..ZY.
const DIVIDER_COLS: u32 = 701;
const SPARE_ROWS_BEFORE_DIVIDER: u32 = 8;
/// Rows after each group: the summary label and aggregate rows plus one spare, or three
/// spare rows after a sample group.
const ROWS_AFTER_GROUP: u32 = 3;
/// First row of the light-gray R/U shading, and how far past the used area it runs.
const SHADE_FROM_ROW: u32 = 16;
const SHADE_EXTRA_ROWS: u32 = 50;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GroupReport {
    pub reference_groups: usize,
    pub sample_groups: usize,
    /// Top row of the two-row divider, when any reference group was written.
    pub divider_row: Option<u32>,
}

#[derive(Debug)]
struct SampleGroup {
    key: String,
    rows: Vec<Vec<CellValue>>,
}

impl SampleGroup {
    fn runs(&self) -> Vec<RunNumber> {
        self.rows.iter().map(|row| run_of(row)).collect()
    }
}

fn identifier_of(row: &[CellValue]) -> Option<&str> {
    match row.get(COL_IDENTIFIER as usize - 1) {
        Some(CellValue::String(s)) => Some(s.as_str()),
        _ => None,
    }
}

fn run_of(row: &[CellValue]) -> RunNumber {
    identifier_of(row).map_or(RunNumber::UNNUMBERED, RunNumber::parse)
}

fn is_truthy(value: &CellValue) -> bool {
    match value {
        CellValue::Empty => false,
        CellValue::Number(n) => *n != 0.0,
        CellValue::String(s) => !s.is_empty(),
        CellValue::Boolean(b) => *b,
        CellValue::Error(_) => true,
    }
}

/// Rows of the CO2 group that enter its aggregate: one per run major (the smallest minor,
/// first occurrence on ties), never major 1. Returned as ascending row indices.
pub fn valid_co2_rows(runs: &[RunNumber]) -> Vec<usize> {
    let mut best: BTreeMap<u64, (u64, usize)> = BTreeMap::new();
    for (i, run) in runs.iter().enumerate() {
        if run.major == 1 {
            continue;
        }
        best.entry(run.major)
            .and_modify(|(minor, index)| {
                if run.minor < *minor {
                    *minor = run.minor;
                    *index = i;
                }
            })
            .or_insert((run.minor, i));
    }
    let mut rows: Vec<usize> = best.into_values().map(|(_, i)| i).collect();
    rows.sort_unstable();
    rows
}

/// Group rows by normalized sample base in first-seen order, each sorted by run.
fn group_rows(rows: Vec<Vec<CellValue>>) -> Vec<SampleGroup> {
    let mut groups: Vec<SampleGroup> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for row in rows {
        let key = identifier_of(&row)
            .map(|ident| group_key(&SampleId::parse(ident).base))
            .unwrap_or_default();
        let slot = *index.entry(key.clone()).or_insert_with(|| {
            groups.push(SampleGroup {
                key,
                rows: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].rows.push(row);
    }
    for group in &mut groups {
        group.rows.sort_by_key(|row| run_of(row));
    }
    groups
}

pub fn build_group(
    workbook: &mut Workbook,
    palette: &Palette,
    today: NaiveDate,
) -> Result<GroupReport, PipelineError> {
    let source = workbook
        .sheet_by_name(LAST6_SHEET)
        .ok_or(PipelineError::SheetNotFound {
            sheet: LAST6_SHEET,
            step: 3,
        })?;
    let source_id = source.id;

    let headers: Vec<CellValue> = (1..=GROUP_DATA_COLS)
        .map(|col| source.value(at(1, col)))
        .collect();
    let rows: Vec<Vec<CellValue>> = (2..=max_row(source))
        .map(|row| {
            (1..=GROUP_DATA_COLS)
                .map(|col| source.value(at(row, col)))
                .collect::<Vec<_>>()
        })
        .filter(|row| row.iter().any(is_truthy))
        .collect();

    let (references, samples): (Vec<SampleGroup>, Vec<SampleGroup>) = group_rows(rows)
        .into_iter()
        .partition(|g| is_reference_key(&g.key));

    let mut grid = replace_view(workbook, GROUP_SHEET, LAST6_SHEET);
    let ((top, bottom), (left, right)) = PANEL_AREA;
    grid.fill_rect((top, bottom), (left, right), palette.panel_blue);
    write_headers(&mut grid, HEADER_ROW, &headers);

    let mut row = FIRST_GROUP_ROW;
    for group in &references {
        row = write_reference_group(&mut grid, group, row, palette);
    }

    let mut divider_row = None;
    if !references.is_empty() {
        row += SPARE_ROWS_BEFORE_DIVIDER;
        let divider = row;
        for r in divider..divider + 2 {
            for col in 1..=DIVIDER_COLS {
                grid.fill(r, col, palette.divider_gray);
            }
        }
        write_headers(&mut grid, divider + 2, &headers);
        panel::draw_lower_boxes(&mut grid, divider, palette);
        divider_row = Some(divider);
        row = divider + 3;
    }

    for group in &samples {
        row = write_sample_group(&mut grid, group, row, palette);
    }

    for r in SHADE_FROM_ROW..=grid.max_row() + SHADE_EXTRA_ROWS {
        grid.fill(r, COL_C_MEAN, palette.light_gray);
        grid.fill(r, COL_O_MEAN, palette.light_gray);
    }
    grid.set_col_width(COL_IDENTIFIER, 22.0);
    grid.set_col_width(COL_C_MEAN, 22.0);

    panel::draw_top_panel(&mut grid, palette, today);
    drop(grid);

    // `Last 6` stays the active tab.
    workbook.activate(source_id);

    Ok(GroupReport {
        reference_groups: references.len(),
        sample_groups: samples.len(),
        divider_row,
    })
}

fn write_headers(grid: &mut Grid<'_>, row: u32, headers: &[CellValue]) {
    for (i, header) in headers.iter().enumerate() {
        if !header.is_empty() {
            grid.set(row, i as u32 + 1, header.clone());
        }
    }
}

fn write_rows(grid: &mut Grid<'_>, rows: &[Vec<CellValue>], first: u32) {
    for (i, values) in rows.iter().enumerate() {
        for (j, value) in values.iter().enumerate() {
            if !value.is_empty() {
                grid.set(first + i as u32, j as u32 + 1, value.clone());
            }
        }
    }
}

/// Rows, then the Average/Stdev/Count labels and their formulas. Returns the next free row.
fn write_reference_group(
    grid: &mut Grid<'_>,
    group: &SampleGroup,
    first: u32,
    palette: &Palette,
) -> u32 {
    let standard = reference_standard(&group.key);
    let last = first + group.rows.len() as u32 - 1;
    write_rows(grid, &group.rows, first);

    let counted: Option<Vec<u32>> = (group.key == CO2_KEY).then(|| {
        valid_co2_rows(&group.runs())
            .into_iter()
            .map(|i| first + i as u32)
            .collect()
    });
    if let Some(counted) = &counted {
        for row in counted {
            for col in 1..=GROUP_DATA_COLS {
                grid.fill(*row, col, palette.light_gray);
            }
        }
    }
    if let Some(standard) = standard {
        for row in first..=last {
            grid.font(row, COL_IDENTIFIER, Font::colored(standard.font, false));
        }
    }

    let label_row = last + 1;
    let avg_row = label_row + 1;
    for (offset, label) in ["Average", "Stdev", "Count"].into_iter().enumerate() {
        for base in [COL_C_MEAN, COL_O_MEAN] {
            let col = base + offset as u32;
            grid.set(label_row, col, label);
            grid.align(label_row, col, Alignment::horizontal(HorizontalAlignment::Right));
        }
    }

    for base in [COL_C_MEAN, COL_O_MEAN] {
        let l = col_letter(base);
        let cells = match &counted {
            Some(rows) if !rows.is_empty() => rows
                .iter()
                .map(|r| format!("{l}{r}"))
                .collect::<Vec<_>>()
                .join(","),
            _ => format!("{l}{first}:{l}{last}"),
        };
        for (offset, func) in ["AVERAGE", "STDEV", "COUNT"].into_iter().enumerate() {
            grid.set_formula(avg_row, base + offset as u32, &format!("ROUND({func}({cells}),3)"));
        }
    }

    if let Some(standard) = standard {
        let font = Font::colored(standard.font, false);
        for row in [label_row, avg_row] {
            for col in COL_C_MEAN..COL_C_MEAN + 6 {
                grid.font(row, col, font.clone());
            }
        }
    }

    log::debug!(
        "reference group '{}' at rows {first}..={last}",
        group.key
    );
    label_row + ROWS_AFTER_GROUP
}

/// Rows plus their normalization formulas. Returns the next free row.
fn write_sample_group(
    grid: &mut Grid<'_>,
    group: &SampleGroup,
    first: u32,
    palette: &Palette,
) -> u32 {
    write_rows(grid, &group.rows, first);
    let (r, u) = (col_letter(COL_C_MEAN), col_letter(COL_O_MEAN));

    for (i, values) in group.rows.iter().enumerate() {
        let row = first + i as u32;
        let calcite_c = format!(r#"IFERROR(ROUND(($K$10*{r}{row})+$K$11,2),"")"#);
        let calcite_o = format!(r#"IFERROR(ROUND(($N$10*{u}{row})+$N$11,2),"")"#);
        let vsmow = |from: u32| {
            format!(
                r#"IFERROR(ROUND(({VSMOW_SLOPE}*{}{row})+{VSMOW_OFFSET},2),"")"#,
                col_letter(from)
            )
        };
        grid.set_formula(row, COL_Z, &calcite_c);
        grid.set_formula(row, COL_AC, &calcite_o);

        if identifier_of(values).is_some_and(is_aragonite) {
            grid.set_formula(
                row,
                COL_AE,
                &format!(r#"IFERROR(ROUND(($O$10*{u}{row})+$O$11,2),"")"#),
            );
            grid.set_formula(row, COL_AH, &vsmow(COL_AE));
            grid.set(row, COL_AG, CellValue::Empty);
            for col in 1..=ARAGONITE_ROW_COLS {
                let bold = [COL_Z, COL_AC, COL_AE, COL_AH].contains(&col);
                grid.font(row, col, Font::colored(palette.aragonite_green, bold));
            }
        } else {
            grid.set_formula(row, COL_AG, &vsmow(COL_AC));
            for col in [COL_Z, COL_AC, COL_AG] {
                grid.font(row, col, Font::bold());
            }
        }
    }

    first + group.rows.len() as u32 + ROWS_AFTER_GROUP
}

#[cfg(test)]
mod tests {
    use super::*;
    use isoflow_model::{CellRef, Color};
    use pretty_assertions::assert_eq;

    fn a1(s: &str) -> CellRef {
        CellRef::from_a1(s).unwrap()
    }

    fn run(major: u64, minor: u64) -> RunNumber {
        RunNumber { major, minor }
    }

    fn formula(workbook: &Workbook, cell: &str) -> Option<String> {
        let sheet = workbook.sheet_by_name("Group").unwrap();
        sheet
            .content(a1(cell))
            .and_then(|c| c.formula_text())
            .map(str::to_string)
    }

    #[test]
    fn co2_keeps_smallest_minor_per_major_and_skips_major_one() {
        let runs = [run(1, 0), run(2, 0), run(2, 1), run(3, 0)];
        assert_eq!(valid_co2_rows(&runs), vec![1, 3]);

        let runs = [run(4, 2), run(4, 1), run(4, 1), run(1, 0)];
        assert_eq!(valid_co2_rows(&runs), vec![1]);
        assert!(valid_co2_rows(&[run(1, 0), run(1, 3)]).is_empty());
    }

    #[test]
    fn rows_group_by_base_in_first_seen_order() {
        let row = |ident: &str| {
            let mut values = vec![CellValue::Empty; GROUP_DATA_COLS as usize];
            values[2] = CellValue::from(ident);
            values
        };
        let groups = group_rows(vec![
            row("Coral R2"),
            row("NBS-18 R1"),
            row("coral r1.1"),
            row("Coral"),
            row("NBS 18 R3"),
        ]);
        let keys: Vec<&str> = groups.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["coral", "nbs18"]);
        let idents: Vec<&str> = groups[0]
            .rows
            .iter()
            .filter_map(|r| identifier_of(r))
            .collect();
        assert_eq!(idents, vec!["coral r1.1", "Coral R2", "Coral"]);
    }

    fn last6_workbook(rows: &[(&str, f64, f64)]) -> Workbook {
        let mut workbook = Workbook::new();
        workbook.add_sheet("Data");
        let id = workbook.insert_sheet(0, "Last 6");
        let sheet = workbook.sheet_mut(id).unwrap();
        sheet.set_value(at(1, 3), "Identifier 1");
        sheet.set_value(at(1, 18), "C avg");
        sheet.set_value(at(1, 21), "O avg");
        for (i, (ident, c, o)) in rows.iter().enumerate() {
            let row = i as u32 + 2;
            sheet.set_value(at(row, 3), *ident);
            sheet.set_value(at(row, 17), "last 6");
            sheet.set_value(at(row, 18), *c);
            sheet.set_value(at(row, 21), *o);
        }
        workbook
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 7).unwrap()
    }

    #[test]
    fn references_come_first_then_divider_then_samples() {
        let mut workbook = last6_workbook(&[
            ("Coral R1", -1.2, -3.4),
            ("NBS 18 R1", -5.0, -23.0),
            ("N.Arag R1", 0.5, -1.0),
            ("NBS 18 R2", -5.02, -23.02),
        ]);
        let report = build_group(&mut workbook, &Palette::STANDARD, today()).unwrap();
        assert_eq!(report.reference_groups, 1);
        assert_eq!(report.sample_groups, 2);
        assert_eq!(workbook.sheet_names(), vec!["Group", "Last 6", "Data"]);
        assert_eq!(
            workbook.active_sheet_index(),
            workbook.sheet_index("Last 6").unwrap()
        );

        let sheet = workbook.sheet_by_name("Group").unwrap();
        assert_eq!(sheet.value(a1("A1")), CellValue::from("2025-0307"));
        assert_eq!(sheet.value(a1("C18")), CellValue::from("Identifier 1"));
        assert_eq!(sheet.value(a1("C19")), CellValue::from("NBS 18 R1"));
        assert_eq!(sheet.value(a1("C20")), CellValue::from("NBS 18 R2"));
        assert_eq!(sheet.value(a1("R21")), CellValue::from("Average"));
        assert_eq!(sheet.value(a1("W21")), CellValue::from("Count"));
        assert_eq!(
            formula(&workbook, "R22").as_deref(),
            Some("ROUND(AVERAGE(R19:R20),3)")
        );
        assert_eq!(
            formula(&workbook, "V22").as_deref(),
            Some("ROUND(STDEV(U19:U20),3)")
        );
        // NBS 18 averages feed the measured panel
        assert_eq!(
            formula(&workbook, "K7").as_deref(),
            Some(r#"IFERROR(ROUND(R22,3),"")"#)
        );

        // 19..20 rows, 21..23 summary, 8 spare rows, divider at 32..33, header 34
        assert_eq!(report.divider_row, Some(32));
        let fill = |cell: &str| {
            workbook
                .styles
                .get(sheet.style_id(a1(cell)))
                .and_then(|s| s.fill_color())
        };
        assert_eq!(fill("A32"), Some(Color::from_rgb(0x808080)));
        assert_eq!(fill("ZY33"), Some(Color::from_rgb(0x808080)));
        assert_eq!(sheet.value(a1("C34")), CellValue::from("Identifier 1"));

        assert_eq!(sheet.value(a1("C35")), CellValue::from("Coral R1"));
        assert_eq!(
            formula(&workbook, "Z35").as_deref(),
            Some(r#"IFERROR(ROUND(($K$10*R35)+$K$11,2),"")"#)
        );
        assert_eq!(
            formula(&workbook, "AG35").as_deref(),
            Some(r#"IFERROR(ROUND((1.03092*AC35)+30.92,2),"")"#)
        );
        assert_eq!(formula(&workbook, "AE35"), None);

        // the aragonite group follows three rows later
        assert_eq!(sheet.value(a1("C39")), CellValue::from("N.Arag R1"));
        assert_eq!(
            formula(&workbook, "AE39").as_deref(),
            Some(r#"IFERROR(ROUND(($O$10*U39)+$O$11,2),"")"#)
        );
        assert_eq!(
            formula(&workbook, "AH39").as_deref(),
            Some(r#"IFERROR(ROUND((1.03092*AE39)+30.92,2),"")"#)
        );
        assert_eq!(formula(&workbook, "AG39"), None);
        let font = |cell: &str| {
            workbook
                .styles
                .get(sheet.style_id(a1(cell)))
                .and_then(|s| s.font.clone())
        };
        assert_eq!(font("C39"), Some(Font::colored(Color::from_rgb(0x008000), false)));
        assert_eq!(font("AE39"), Some(Font::colored(Color::from_rgb(0x008000), true)));
        assert_eq!(font("C19"), Some(Font::colored(Color::from_rgb(0xFF0000), false)));
    }

    #[test]
    fn co2_aggregate_lists_the_deduplicated_rows() {
        let mut workbook = last6_workbook(&[
            ("CO2 R1", -1.0, -1.0),
            ("CO2 R2", -1.1, -1.1),
            ("CO2 R2.1", -1.2, -1.2),
            ("CO2 R3", -1.3, -1.3),
        ]);
        build_group(&mut workbook, &Palette::STANDARD, today()).unwrap();
        assert_eq!(
            formula(&workbook, "R24").as_deref(),
            Some("ROUND(AVERAGE(R20,R22),3)")
        );
        assert_eq!(
            formula(&workbook, "W24").as_deref(),
            Some("ROUND(COUNT(U20,U22),3)")
        );
        let sheet = workbook.sheet_by_name("Group").unwrap();
        let fill = |cell: &str| {
            workbook
                .styles
                .get(sheet.style_id(a1(cell)))
                .and_then(|s| s.fill_color())
        };
        assert_eq!(fill("A20"), Some(Color::from_rgb(0xE7E7E7)));
        assert_eq!(fill("A21"), None);
    }

    #[test]
    fn samples_only_skip_the_divider() {
        let mut workbook = last6_workbook(&[("Coral R1", -1.2, -3.4)]);
        let report = build_group(&mut workbook, &Palette::STANDARD, today()).unwrap();
        assert_eq!(report.divider_row, None);
        let sheet = workbook.sheet_by_name("Group").unwrap();
        assert_eq!(sheet.value(a1("C19")), CellValue::from("Coral R1"));
        // no usable reference averages: regression cells are empty strings
        assert_eq!(sheet.value(a1("K10")), CellValue::String(String::new()));
    }

    #[test]
    fn missing_last6_names_the_step_to_run() {
        let mut workbook = Workbook::new();
        workbook.add_sheet("To Sort");
        let err = build_group(&mut workbook, &Palette::STANDARD, today()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Sheet 'Last 6' not found in workbook. Run Step 3 first."
        );
    }
}
