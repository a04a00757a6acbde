//! Fixed decoration of the `Group` view: the calibration panel in A1:W15 (published and
//! measured reference values, regression cells) and the legend boxes at the divider.

use chrono::NaiveDate;
use isoflow_model::{
    Alignment, BorderStyle, CellContent, CellValue, Color, Font, HorizontalAlignment, Range,
    RichText, RichTextRunStyle, VerticalAlignment,
};

use crate::config::{
    classify_identifier, ARAGONITE_INTERCEPT, ARAGONITE_SLOPE, REFERENCE_STANDARDS,
};
use crate::sheet::{at, col_letter, Grid};
use crate::Palette;

use super::{COL_C_MEAN, COL_IDENTIFIER, COL_O_MEAN};

const D13C: &str = "δ¹³C";
const D18O: &str = "δ¹⁸O";

/// Published carbon and oxygen columns regressed against the measured ones.
const COL_PUBLISHED_C: u32 = 6;
const COL_PUBLISHED_O: u32 = 7;
pub(crate) const COL_MEASURED_C: u32 = 11;
pub(crate) const COL_MEASURED_O: u32 = 14;
const COL_ARAGONITE: u32 = 15;
/// Slope row; the intercept sits right below it.
pub(crate) const ROW_SLOPE: u32 = 10;
const PANEL_ROWS: (u32, u32) = (5, 8);
/// Rows searched above an `Average` label for the group identifier.
const IDENTIFIER_LOOKBACK: u32 = 20;

/// "18 19": NBS 18 and NBS 19 legend.
pub(crate) fn legend_18_19(palette: &Palette, bold_18: bool, color_19: Color) -> RichText {
    RichText::from_segments([
        ("18 ", RichTextRunStyle::colored(palette.legend_red, bold_18)),
        ("19", RichTextRunStyle::colored(color_19, true)),
    ])
}

/// "18 19 603": NBS 18, NBS 19 and IAEA 603 legend, all bold.
pub(crate) fn legend_18_19_603(palette: &Palette) -> RichText {
    RichText::from_segments([
        ("18 ", RichTextRunStyle::colored(palette.legend_red, true)),
        ("19 ", RichTextRunStyle::colored(palette.legend_blue, true)),
        ("603", RichTextRunStyle::colored(palette.aragonite_green, true)),
    ])
}

pub(crate) fn draw_top_panel(grid: &mut Grid<'_>, palette: &Palette, today: NaiveDate) {
    let black_bold = Font::colored(Color::black(), true);
    let green_bold = Font::colored(palette.aragonite_green, true);

    grid.set(1, 1, today.format("%Y-%m%d").to_string());
    grid.align(
        1,
        1,
        Alignment {
            horizontal: Some(HorizontalAlignment::Left),
            vertical: Some(VerticalAlignment::Center),
            wrap_text: false,
        },
    );
    grid.label(1, 3, "Normalization", black_bold.clone());
    grid.label(1, COL_C_MEAN, "Normalized (vs. VPDB)", black_bold.clone());

    // Reference material names.
    grid.boxed((2, 3), (3, 3), BorderStyle::Medium, palette.panel_blue);
    grid.boxed((4, 8), (3, 3), BorderStyle::Medium, palette.panel_blue);
    grid.label(2, 3, "Reference Materials", black_bold.clone());
    for standard in &REFERENCE_STANDARDS {
        grid.label(standard.panel_row, 3, standard.name, Font::colored(standard.font, false));
    }

    // Published values.
    grid.boxed((2, 3), (4, 8), BorderStyle::Thick, palette.panel_blue);
    grid.boxed((4, 8), (4, 8), BorderStyle::Thick, palette.panel_blue);
    grid.sheet.merge(Range::new(at(2, 6), at(2, 7)));
    grid.label(2, 6, "Published (vs. VPDB)", black_bold.clone());
    grid.centered(3, COL_PUBLISHED_C, D13C);
    grid.centered(3, COL_PUBLISHED_O, D18O);
    for standard in &REFERENCE_STANDARDS {
        let font = Font::colored(standard.font, true);
        for published in [standard.carbon, standard.oxygen] {
            grid.set(standard.panel_row, published.col, published.value);
            grid.font(standard.panel_row, published.col, font.clone());
        }
    }

    // Normalized-value column headings.
    for (col, text) in [(19, D13C), (20, D13C), (22, D18O), (23, D18O)] {
        grid.centered(2, col, text);
    }
    for col in [19, 22] {
        grid.set_rich(3, col, legend_18_19(palette, false, palette.legend_blue));
        grid.align(3, col, Alignment::centered());
    }
    for col in [20, 23] {
        grid.set_rich(3, col, legend_18_19_603(palette));
        grid.align(3, col, Alignment::centered());
    }
    for standard in &REFERENCE_STANDARDS {
        grid.set(standard.panel_row, COL_C_MEAN, standard.name);
        grid.font(standard.panel_row, COL_C_MEAN, Font::colored(standard.font, false));
    }

    // Regression labels.
    grid.set_rich(ROW_SLOPE, 9, legend_18_19(palette, true, palette.legend_navy));
    grid.align(ROW_SLOPE, 9, Alignment::centered());
    grid.set_rich(ROW_SLOPE + 3, 9, legend_18_19_603(palette));
    grid.align(ROW_SLOPE + 3, 9, Alignment::centered());
    for row in [ROW_SLOPE, ROW_SLOPE + 3] {
        grid.set(row, 10, "Slope");
        grid.font(row, 10, black_bold.clone());
        grid.set(row + 1, 10, "Intercept");
        grid.font(row + 1, 10, black_bold.clone());
    }

    // Measured values.
    grid.boxed((2, 3), (10, 14), BorderStyle::Thick, palette.panel_blue);
    grid.sheet.merge(Range::new(at(2, 10), at(2, 14)));
    grid.label(2, 10, "Measured (vs. Working Standard)", black_bold);
    grid.centered(3, COL_MEASURED_C, D13C);
    grid.centered(3, COL_MEASURED_O, D18O);
    grid.boxed((4, 8), (10, 14), BorderStyle::Thick, palette.panel_blue);

    let measured = fill_measured_values(grid);
    log::debug!("measured panel filled for {measured} reference materials");
    write_regression(grid);

    for (row, value) in [(9, None), (10, Some(ARAGONITE_SLOPE)), (11, Some(ARAGONITE_INTERCEPT))] {
        match value {
            Some(v) => grid.set(row, COL_ARAGONITE, v),
            None => grid.set(row, COL_ARAGONITE, "Aragonite (Kim et al. 2015)"),
        }
        grid.font(row, COL_ARAGONITE, green_bold.clone());
        grid.align(row, COL_ARAGONITE, Alignment::centered());
    }

    grid.set_col_width(26, 11.0);
}

/// Link each reference material's group averages into the measured panel.
///
/// Every `Average` label in column R is attributed to the nearest identifier above it;
/// the first group found for a material wins. Returns how many materials were linked.
pub(crate) fn fill_measured_values(grid: &mut Grid<'_>) -> usize {
    let mut linked: Vec<&'static str> = Vec::new();
    for row in 1..=grid.max_row() {
        let is_average = grid
            .value(row, COL_C_MEAN)
            .to_text()
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("average"));
        if !is_average || row < 2 {
            continue;
        }

        let id_row = row - 1;
        let scan_top = id_row.saturating_sub(IDENTIFIER_LOOKBACK).max(1);
        let identifier = (scan_top..=id_row)
            .rev()
            .filter_map(|r| grid.value(r, COL_IDENTIFIER).to_text())
            .map(|v| v.trim().to_string())
            .find(|v| !v.is_empty())
            .unwrap_or_default();

        let Some(standard) = classify_identifier(&identifier) else {
            log::debug!("average at row {row} ('{identifier}') is not a reference material");
            continue;
        };
        if linked.contains(&standard.key) {
            continue;
        }
        linked.push(standard.key);

        let avg_row = row + 1;
        let font = Font::colored(standard.font, false);
        for (target, source) in [(COL_MEASURED_C, COL_C_MEAN), (COL_MEASURED_O, COL_O_MEAN)] {
            grid.set_formula(
                standard.panel_row,
                target,
                &format!(r#"IFERROR(ROUND({}{avg_row},3),"")"#, col_letter(source)),
            );
            grid.font(standard.panel_row, target, font.clone());
        }
    }
    linked.len()
}

/// A measured-panel cell usable as a regression point: a number, numeric text, or a
/// formula that is not an empty-string guard.
pub(crate) fn usable_measurement(content: Option<&CellContent>) -> bool {
    match content {
        Some(CellContent::Literal {
            value: CellValue::Number(_),
        }) => true,
        Some(CellContent::Literal {
            value: CellValue::String(s),
        }) => s.trim().parse::<f64>().is_ok(),
        Some(CellContent::Formula { text, .. }) => !text.trim().ends_with(r#""""#),
        _ => false,
    }
}

/// Slope/intercept of published against measured values per channel, as sheet formulas
/// over the usable panel rows. Fewer than two usable rows leaves empty strings.
pub(crate) fn write_regression(grid: &mut Grid<'_>) {
    for (published, measured) in [
        (COL_PUBLISHED_C, COL_MEASURED_C),
        (COL_PUBLISHED_O, COL_MEASURED_O),
    ] {
        let rows: Vec<u32> = (PANEL_ROWS.0..=PANEL_ROWS.1)
            .filter(|r| usable_measurement(grid.sheet.content(at(*r, measured))))
            .collect();

        match (rows.first(), rows.last()) {
            (Some(first), Some(last)) if rows.len() >= 2 => {
                let span = |col: u32| {
                    let l = col_letter(col);
                    format!("${l}${first}:${l}${last}")
                };
                let (y, x) = (span(published), span(measured));
                grid.set_formula(ROW_SLOPE, measured, &format!(r#"IFERROR(SLOPE({y},{x}),"")"#));
                grid.set_formula(
                    ROW_SLOPE + 1,
                    measured,
                    &format!(r#"IFERROR(INTERCEPT({y},{x}),"")"#),
                );
            }
            _ => {
                log::warn!(
                    "fewer than 2 measured reference values in column {}; regression left empty",
                    col_letter(measured)
                );
                grid.set(ROW_SLOPE, measured, "");
                grid.set(ROW_SLOPE + 1, measured, "");
            }
        }
        grid.align(ROW_SLOPE, measured, Alignment::centered());
        grid.align(ROW_SLOPE + 1, measured, Alignment::centered());
    }
}

/// Legend boxes straddling the divider: "Normalized VPDB" over Z..AE and "VSMOW" over
/// AG..AH, both ending on the divider's second row.
pub(crate) fn draw_lower_boxes(grid: &mut Grid<'_>, divider_top: u32, palette: &Palette) {
    let black_bold = Font::colored(Color::black(), true);
    let green_bold = Font::colored(palette.aragonite_green, true);
    let bottom = divider_top + 1;
    let two = || legend_18_19(palette, true, palette.legend_blue);

    let top = bottom - 4;
    grid.boxed((top, bottom), (26, 31), BorderStyle::Thick, palette.panel_blue);
    grid.set(top, 26, "Normalized");
    grid.font(top, 26, black_bold.clone());
    grid.set(top + 1, 26, "VPDB");
    grid.font(top + 1, 26, black_bold.clone());
    for col in [29, 30] {
        grid.set(top + 2, col, "Calcite");
        grid.font(top + 2, col, black_bold.clone());
    }
    grid.set(top + 2, 31, "Aragonite");
    grid.font(top + 2, 31, green_bold.clone());
    for (col, text) in [(26, D13C), (27, D13C), (29, D18O), (30, D18O), (31, D18O)] {
        grid.set(top + 3, col, text);
    }
    for col in [26, 29, 31] {
        grid.set_rich(top + 4, col, two());
    }
    for col in [27, 30] {
        grid.set_rich(top + 4, col, legend_18_19_603(palette));
    }

    let top = bottom - 3;
    grid.boxed((top, bottom), (33, 34), BorderStyle::Thick, palette.panel_blue);
    grid.set(top, 33, "VSMOW");
    grid.font(top, 33, black_bold.clone());
    grid.set(top + 1, 33, "Calcite");
    grid.font(top + 1, 33, black_bold);
    grid.set(top + 1, 34, "Aragonite");
    grid.font(top + 1, 34, green_bold);
    for col in [33, 34] {
        grid.set(top + 2, col, D18O);
        grid.set_rich(top + 3, col, two());
    }

    grid.set_col_width(26, 11.0);
}
