//! Stage 5: copy the normalized results below the `Group` divider into the `Summary` view.

mod band;

use isoflow_model::{CellContent, Workbook, Worksheet};

use crate::layout::{GROUP_SHEET, SUMMARY_SHEET};
use crate::sheet::{at, max_row, replace_view};
use crate::{Palette, PipelineError};

pub use band::{locate_band, BandGrid, Strategy, STRATEGIES};

/// Identifier columns A..C, then the normalized block Z..AH, packed into A..L.
const SOURCE_COLS: [u32; 12] = [1, 2, 3, 26, 27, 28, 29, 30, 31, 32, 33, 34];
/// Rows copied above the band top.
const ROWS_ABOVE_BAND: u32 = 3;
/// Rows probed for formulas still lacking a cached result.
const REFRESH_PROBE_ROWS: u32 = 30;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SummaryReport {
    pub band_row: u32,
    pub first_row: u32,
    pub rows: u32,
}

fn group_sheet(workbook: &Workbook) -> Result<&Worksheet, PipelineError> {
    workbook
        .sheet_by_name(GROUP_SHEET)
        .ok_or(PipelineError::SheetNotFound {
            sheet: GROUP_SHEET,
            step: 4,
        })
}

fn copy_start(workbook: &Workbook, palette: &Palette) -> Result<(u32, u32), PipelineError> {
    let group = group_sheet(workbook)?;
    let band = locate_band(&BandGrid::new(group, &workbook.styles, palette.divider_gray))
        .ok_or(PipelineError::MarkerNotFound(GROUP_SHEET))?;
    Ok((band, band.saturating_sub(ROWS_ABOVE_BAND).max(1)))
}

/// Whether the first rows of the copy window hold formulas with no cached value, i.e. the
/// workbook should be recalculated before extracting.
pub fn needs_refresh(workbook: &Workbook, palette: &Palette) -> Result<bool, PipelineError> {
    let (_, start) = copy_start(workbook, palette)?;
    let group = group_sheet(workbook)?;
    let end = (start + REFRESH_PROBE_ROWS).min(max_row(group) + 1);
    Ok((start..end).any(|row| {
        SOURCE_COLS.iter().any(|col| {
            group
                .content(at(row, *col))
                .is_some_and(CellContent::is_uncached_formula)
        })
    }))
}

pub fn build_summary(
    workbook: &mut Workbook,
    palette: &Palette,
) -> Result<SummaryReport, PipelineError> {
    let (band_row, start) = copy_start(workbook, palette)?;
    let group = group_sheet(workbook)?.clone();
    let last = max_row(&group);

    let id = {
        let mut grid = replace_view(workbook, SUMMARY_SHEET, GROUP_SHEET);
        for (target_row, row) in (start..=last).enumerate() {
            let target_row = target_row as u32 + 1;
            for (i, col) in SOURCE_COLS.iter().enumerate() {
                let target_col = i as u32 + 1;
                let Some(cell) = group.cell(at(row, *col)) else {
                    continue;
                };
                match &cell.content {
                    CellContent::RichText { text } => {
                        grid.set_rich(target_row, target_col, text.clone())
                    }
                    content => {
                        let value = content.resolved_value();
                        if !value.is_empty() {
                            grid.set(target_row, target_col, value);
                        }
                    }
                }
                grid.set_style_id(target_row, target_col, cell.style_id);
            }
            if let Some(height) = group.row_height(row - 1) {
                grid.sheet.set_row_height(target_row - 1, Some(height));
            }
        }
        for (i, col) in SOURCE_COLS.iter().enumerate() {
            if let Some(width) = group.col_width(col - 1) {
                grid.set_col_width(i as u32 + 1, width);
            }
        }
        grid.id()
    };
    workbook.activate(id);

    let rows = (last + 1).saturating_sub(start);
    log::debug!("summary: band at row {band_row}, copied rows {start}..={last}");
    Ok(SummaryReport {
        band_row,
        first_row: start,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use isoflow_model::{CellRef, CellValue, Color, Fill, Font, RichText, RichTextRunStyle};
    use pretty_assertions::assert_eq;

    fn a1(s: &str) -> CellRef {
        CellRef::from_a1(s).unwrap()
    }

    /// A `Group` view with its divider at rows 10..11 and one sample row at 13.
    fn group_workbook(cached: bool) -> Workbook {
        let mut workbook = Workbook::new();
        workbook.add_sheet("Last 6");
        let id = workbook.insert_sheet(0, "Group");
        let (sheet, styles) = workbook.sheet_with_styles_mut(id).unwrap();
        for row in [10, 11] {
            for col in 1..=40 {
                sheet.update_style(styles, at(row, col), |s| {
                    s.fill = Some(Fill::solid(Color::from_rgb(0x808080)))
                });
            }
        }
        sheet.set_value(a1("Z7"), "Normalized");
        sheet.set_rich_text(
            a1("Z9"),
            RichText::from_segments([
                ("18 ", RichTextRunStyle::colored(Color::from_rgb(0xFF0000), true)),
                ("19", RichTextRunStyle::colored(Color::from_rgb(0x0000FF), true)),
            ]),
        );
        sheet.set_value(a1("C12"), "Identifier 1");
        sheet.set_value(a1("C13"), "Coral R1");
        sheet.set_value(a1("R13"), -1.2);
        sheet.set_content(
            a1("Z13"),
            CellContent::Formula {
                text: r#"IFERROR(ROUND(($K$10*R13)+$K$11,2),"")"#.to_string(),
                cached: cached.then_some(CellValue::Number(-0.87)),
            },
        );
        sheet.update_style(styles, a1("Z13"), |s| s.font = Some(Font::bold()));
        sheet.set_row_height(12, Some(21.0));
        sheet.set_col_width(25, Some(11.0));
        workbook
    }

    #[test]
    fn copies_the_window_below_the_band() {
        let mut workbook = group_workbook(true);
        assert!(!needs_refresh(&workbook, &Palette::STANDARD).unwrap());

        let report = build_summary(&mut workbook, &Palette::STANDARD).unwrap();
        assert_eq!(report.band_row, 10);
        assert_eq!(report.first_row, 7);
        assert_eq!(report.rows, 7);
        assert_eq!(workbook.sheet_names(), vec!["Summary", "Group", "Last 6"]);

        let sheet = workbook.sheet_by_name("Summary").unwrap();
        assert!(sheet.tab_selected);
        assert_eq!(sheet.value(a1("D1")), CellValue::from("Normalized"));
        assert!(matches!(sheet.content(a1("D3")), Some(CellContent::RichText { .. })));
        assert_eq!(sheet.value(a1("C7")), CellValue::from("Coral R1"));
        // materialized, not the formula
        assert_eq!(
            sheet.content(a1("D7")),
            Some(&CellContent::literal(-0.87))
        );
        let font = workbook
            .styles
            .get(sheet.style_id(a1("D7")))
            .and_then(|s| s.font.clone());
        assert_eq!(font, Some(Font::bold()));
        // R is outside the window
        assert!(sheet.last_col().is_some_and(|c| c < 12));
        assert_eq!(sheet.row_height(6), Some(21.0));
        assert_eq!(sheet.col_width(3), Some(11.0));
    }

    #[test]
    fn uncached_formulas_request_a_refresh_and_copy_empty() {
        let mut workbook = group_workbook(false);
        assert!(needs_refresh(&workbook, &Palette::STANDARD).unwrap());
        build_summary(&mut workbook, &Palette::STANDARD).unwrap();
        let sheet = workbook.sheet_by_name("Summary").unwrap();
        assert!(sheet.value(a1("D7")).is_empty());
    }

    #[test]
    fn missing_band_is_fatal() {
        let mut workbook = Workbook::new();
        let id = workbook.add_sheet("Group");
        workbook.sheet_mut(id).unwrap().set_value(a1("C20"), "Coral");
        let err = build_summary(&mut workbook, &Palette::STANDARD).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Could not find the 2-row dark gray band (color #808080) in 'Group' sheet."
        );
    }

    #[test]
    fn missing_group_names_the_step_to_run() {
        let mut workbook = Workbook::new();
        workbook.add_sheet("Last 6");
        let err = build_summary(&mut workbook, &Palette::STANDARD).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Sheet 'Group' not found in workbook. Run Step 4 first."
        );
    }
}
