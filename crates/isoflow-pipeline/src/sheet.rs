//! Helpers shared by the stages for building a view in 1-based (row, column)
//! coordinates, the way the generated formulas address cells.

use isoflow_model::{
    column_name, Alignment, Border, BorderStyle, CellRef, CellValue, Color, Fill, Font, RichText,
    Style, StyleTable, Workbook, Worksheet, WorksheetId,
};

/// Cell reference for 1-based `row`/`col`.
pub(crate) fn at(row: u32, col: u32) -> CellRef {
    CellRef::new(row.saturating_sub(1), col.saturating_sub(1))
}

/// Column letters for a 1-based column number.
pub(crate) fn col_letter(col: u32) -> String {
    column_name(col.saturating_sub(1))
}

/// 1-based row count of the used area (0 for an empty sheet).
pub(crate) fn max_row(sheet: &Worksheet) -> u32 {
    sheet.last_row().map_or(0, |r| r + 1)
}

/// 1-based column count of the used area (0 for an empty sheet).
pub(crate) fn max_col(sheet: &Worksheet) -> u32 {
    sheet.last_col().map_or(0, |c| c + 1)
}

/// Delete any previous view called `name` and create a fresh one immediately left of
/// `left_of`.
pub(crate) fn replace_view<'a>(workbook: &'a mut Workbook, name: &str, left_of: &str) -> Grid<'a> {
    if workbook.remove_sheet_by_name(name).is_some() {
        log::debug!("replacing existing '{name}' sheet");
    }
    let index = workbook.sheet_index(left_of).unwrap_or(0);
    let (sheet, styles) = workbook.insert_sheet_with_styles(index, name);
    Grid { sheet, styles }
}

/// A worksheet being written, together with the workbook style table.
pub(crate) struct Grid<'a> {
    pub(crate) sheet: &'a mut Worksheet,
    styles: &'a mut StyleTable,
}

impl<'a> Grid<'a> {
    pub(crate) fn id(&self) -> WorksheetId {
        self.sheet.id
    }

    pub(crate) fn value(&self, row: u32, col: u32) -> CellValue {
        self.sheet.value(at(row, col))
    }

    pub(crate) fn max_row(&self) -> u32 {
        max_row(self.sheet)
    }

    /// Write a literal; an empty value clears the cell content but keeps its style.
    pub(crate) fn set(&mut self, row: u32, col: u32, value: impl Into<CellValue>) {
        self.sheet.set_value(at(row, col), value);
    }

    /// Write a formula (with or without the leading `=`) without a cached result.
    pub(crate) fn set_formula(&mut self, row: u32, col: u32, formula: &str) {
        self.sheet.set_formula(at(row, col), formula);
    }

    pub(crate) fn set_rich(&mut self, row: u32, col: u32, text: RichText) {
        self.sheet.set_rich_text(at(row, col), text);
    }

    pub(crate) fn set_style_id(&mut self, row: u32, col: u32, style_id: u32) {
        self.sheet.set_style_id(at(row, col), style_id);
    }

    pub(crate) fn style(&mut self, row: u32, col: u32, edit: impl FnOnce(&mut Style)) {
        self.sheet.update_style(self.styles, at(row, col), edit);
    }

    pub(crate) fn fill(&mut self, row: u32, col: u32, color: Color) {
        self.style(row, col, |s| s.fill = Some(Fill::solid(color)));
    }

    /// Replace the font (color, weight) of a cell.
    pub(crate) fn font(&mut self, row: u32, col: u32, font: Font) {
        self.style(row, col, |s| s.font = Some(font));
    }

    pub(crate) fn align(&mut self, row: u32, col: u32, alignment: Alignment) {
        self.style(row, col, |s| s.alignment = Some(alignment));
    }

    pub(crate) fn number_format(&mut self, row: u32, col: u32, format: &str) {
        self.style(row, col, |s| s.number_format = Some(format.to_string()));
    }

    /// Write a value and center it, leaving the font alone.
    pub(crate) fn centered(&mut self, row: u32, col: u32, value: impl Into<CellValue>) {
        self.set(row, col, value);
        self.align(row, col, Alignment::centered());
    }

    /// Write a bold (optionally colored) centered label.
    pub(crate) fn label(&mut self, row: u32, col: u32, text: &str, font: Font) {
        self.set(row, col, text);
        self.style(row, col, |s| {
            s.font = Some(font);
            s.alignment = Some(Alignment::centered());
        });
    }

    pub(crate) fn fill_rect(&mut self, rows: (u32, u32), cols: (u32, u32), color: Color) {
        for row in rows.0..=rows.1 {
            for col in cols.0..=cols.1 {
                self.fill(row, col, color);
            }
        }
    }

    /// Fill a rectangle, center its cells and draw an outer border of `weight`.
    ///
    /// Each cell's border is replaced, so inner edges end up without lines.
    pub(crate) fn boxed(&mut self, rows: (u32, u32), cols: (u32, u32), weight: BorderStyle, fill: Color) {
        for row in rows.0..=rows.1 {
            for col in cols.0..=cols.1 {
                let edge = |on: bool| if on { weight } else { BorderStyle::None };
                let border = Border {
                    top: edge(row == rows.0),
                    bottom: edge(row == rows.1),
                    left: edge(col == cols.0),
                    right: edge(col == cols.1),
                    color: None,
                };
                self.style(row, col, |s| {
                    s.fill = Some(Fill::solid(fill));
                    s.alignment = Some(Alignment::centered());
                    s.border = (!border.is_empty()).then_some(border);
                });
            }
        }
    }

    pub(crate) fn set_col_width(&mut self, col: u32, width: f32) {
        self.sheet.set_col_width(col.saturating_sub(1), Some(width));
    }
}
