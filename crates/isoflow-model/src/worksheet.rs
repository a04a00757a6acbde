use std::collections::BTreeMap;

use crate::{
    Cell, CellContent, CellRef, CellValue, Range, RichText, SheetAutoFilter, Style, StyleTable,
};

/// Identifier for a worksheet within a workbook.
pub type WorksheetId = u32;

/// Per-row formatting and visibility.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RowProperties {
    /// Row height in points.
    pub height: Option<f32>,
    pub hidden: bool,
}

impl RowProperties {
    fn is_default(&self) -> bool {
        self.height.is_none() && !self.hidden
    }
}

/// Per-column formatting.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ColProperties {
    /// Column width in Excel "character" units.
    pub width: Option<f32>,
}

/// A named 2-D grid of cells plus the sheet-level state the pipeline touches.
///
/// Cells are stored sparsely in row-major order. A cell that only carries a style
/// (a fill band, a border) is still stored.
#[derive(Clone, Debug)]
pub struct Worksheet {
    pub id: WorksheetId,
    pub name: String,
    cells: BTreeMap<CellRef, Cell>,
    row_properties: BTreeMap<u32, RowProperties>,
    col_properties: BTreeMap<u32, ColProperties>,
    /// Merged ranges; the value lives in the top-left cell.
    pub merged_regions: Vec<Range>,
    pub auto_filter: Option<SheetAutoFilter>,
    /// `sheetView/@tabSelected`.
    pub tab_selected: bool,
}

impl Worksheet {
    pub fn new(id: WorksheetId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            cells: BTreeMap::new(),
            row_properties: BTreeMap::new(),
            col_properties: BTreeMap::new(),
            merged_regions: Vec::new(),
            auto_filter: None,
            tab_selected: false,
        }
    }

    pub fn cell(&self, cell_ref: CellRef) -> Option<&Cell> {
        self.cells.get(&cell_ref)
    }

    pub fn content(&self, cell_ref: CellRef) -> Option<&CellContent> {
        self.cells.get(&cell_ref).map(|c| &c.content)
    }

    /// Resolved value at `cell_ref` (see [`CellContent::resolved_value`]).
    pub fn value(&self, cell_ref: CellRef) -> CellValue {
        self.cells
            .get(&cell_ref)
            .map(Cell::value)
            .unwrap_or_default()
    }

    /// Insert or replace a cell record, dropping it if it is truly empty.
    pub fn set_cell(&mut self, cell_ref: CellRef, cell: Cell) {
        if cell.is_truly_empty() {
            self.cells.remove(&cell_ref);
        } else {
            self.cells.insert(cell_ref, cell);
        }
    }

    /// Replace the content of a cell, keeping its style.
    pub fn set_content(&mut self, cell_ref: CellRef, content: CellContent) {
        let style_id = self.style_id(cell_ref);
        self.set_cell(cell_ref, Cell { content, style_id });
    }

    pub fn set_value(&mut self, cell_ref: CellRef, value: impl Into<CellValue>) {
        self.set_content(
            cell_ref,
            CellContent::Literal {
                value: value.into(),
            },
        );
    }

    /// Store a formula (display or canonical text) with no cached result.
    pub fn set_formula(&mut self, cell_ref: CellRef, formula: &str) {
        self.set_content(cell_ref, CellContent::formula(formula));
    }

    pub fn set_rich_text(&mut self, cell_ref: CellRef, text: RichText) {
        self.set_content(cell_ref, CellContent::RichText { text });
    }

    pub fn clear_value(&mut self, cell_ref: CellRef) {
        self.set_content(cell_ref, CellContent::default());
    }

    pub fn style_id(&self, cell_ref: CellRef) -> u32 {
        self.cells.get(&cell_ref).map_or(0, |c| c.style_id)
    }

    pub fn set_style_id(&mut self, cell_ref: CellRef, style_id: u32) {
        match self.cells.get_mut(&cell_ref) {
            Some(cell) => {
                cell.style_id = style_id;
                if cell.is_truly_empty() {
                    self.cells.remove(&cell_ref);
                }
            }
            None if style_id != 0 => {
                self.cells.insert(
                    cell_ref,
                    Cell {
                        content: CellContent::default(),
                        style_id,
                    },
                );
            }
            None => {}
        }
    }

    /// Apply `edit` to a copy of the cell's current style and store the interned result.
    pub fn update_style(
        &mut self,
        styles: &mut StyleTable,
        cell_ref: CellRef,
        edit: impl FnOnce(&mut Style),
    ) {
        let mut style = styles
            .get(self.style_id(cell_ref))
            .cloned()
            .unwrap_or_default();
        edit(&mut style);
        let style_id = styles.intern(style);
        self.set_style_id(cell_ref, style_id);
    }

    /// Iterate stored cells in row-major order.
    pub fn iter_cells(&self) -> impl Iterator<Item = (CellRef, &Cell)> {
        self.cells.iter().map(|(k, v)| (*k, v))
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// 0-based index of the last row holding a stored cell.
    pub fn last_row(&self) -> Option<u32> {
        self.cells.keys().next_back().map(|c| c.row)
    }

    /// 0-based index of the right-most column holding a stored cell.
    pub fn last_col(&self) -> Option<u32> {
        self.cells.keys().map(|c| c.col).max()
    }

    pub fn used_range(&self) -> Option<Range> {
        let first_row = self.cells.keys().next()?.row;
        let first_col = self.cells.keys().map(|c| c.col).min()?;
        let last_row = self.last_row()?;
        let last_col = self.last_col()?;
        Some(Range::new(
            CellRef::new(first_row, first_col),
            CellRef::new(last_row, last_col),
        ))
    }

    pub fn row_properties(&self, row: u32) -> Option<&RowProperties> {
        self.row_properties.get(&row)
    }

    pub fn iter_row_properties(&self) -> impl Iterator<Item = (u32, &RowProperties)> {
        self.row_properties.iter().map(|(k, v)| (*k, v))
    }

    pub fn row_height(&self, row: u32) -> Option<f32> {
        self.row_properties.get(&row).and_then(|p| p.height)
    }

    pub fn set_row_height(&mut self, row: u32, height: Option<f32>) {
        self.edit_row(row, |p| p.height = height);
    }

    pub fn is_row_hidden(&self, row: u32) -> bool {
        self.row_properties.get(&row).is_some_and(|p| p.hidden)
    }

    pub fn set_row_hidden(&mut self, row: u32, hidden: bool) {
        self.edit_row(row, |p| p.hidden = hidden);
    }

    fn edit_row(&mut self, row: u32, edit: impl FnOnce(&mut RowProperties)) {
        let props = self.row_properties.entry(row).or_default();
        edit(props);
        if props.is_default() {
            self.row_properties.remove(&row);
        }
    }

    pub fn col_width(&self, col: u32) -> Option<f32> {
        self.col_properties.get(&col).and_then(|p| p.width)
    }

    pub fn set_col_width(&mut self, col: u32, width: Option<f32>) {
        match width {
            Some(width) => {
                self.col_properties.entry(col).or_default().width = Some(width);
            }
            None => {
                self.col_properties.remove(&col);
            }
        }
    }

    pub fn iter_col_properties(&self) -> impl Iterator<Item = (u32, &ColProperties)> {
        self.col_properties.iter().map(|(k, v)| (*k, v))
    }

    /// Merge `range`. Overlapping merges are replaced.
    pub fn merge(&mut self, range: Range) {
        if range.is_single_cell() {
            return;
        }
        self.merged_regions.retain(|r| !ranges_overlap(r, &range));
        self.merged_regions.push(range);
    }
}

fn ranges_overlap(a: &Range, b: &Range) -> bool {
    a.start.row <= b.end.row
        && b.start.row <= a.end.row
        && a.start.col <= b.end.col
        && b.start.col <= a.end.col
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Fill;
    use crate::Color;

    #[test]
    fn set_value_keeps_style() {
        let mut styles = StyleTable::new();
        let mut sheet = Worksheet::new(1, "Data");
        let a1 = CellRef::new(0, 0);

        sheet.update_style(&mut styles, a1, |s| {
            s.fill = Some(Fill::solid(Color::from_rgb(0xCDFFCC)))
        });
        sheet.set_value(a1, "ref avg");
        assert_ne!(sheet.style_id(a1), 0);
        assert_eq!(sheet.value(a1), CellValue::String("ref avg".to_string()));

        sheet.clear_value(a1);
        assert!(sheet.cell(a1).is_some(), "styled cell stays stored");
        sheet.set_style_id(a1, 0);
        assert!(sheet.cell(a1).is_none());
    }

    #[test]
    fn extent_includes_style_only_cells() {
        let mut sheet = Worksheet::new(1, "Group");
        sheet.set_value(CellRef::new(2, 1), 1.0);
        sheet.set_style_id(CellRef::new(5, 700), 2);
        assert_eq!(sheet.last_row(), Some(5));
        assert_eq!(sheet.last_col(), Some(700));
        assert_eq!(sheet.used_range().unwrap().to_string(), "B3:ZY6");
    }

    #[test]
    fn row_properties_collapse_to_default() {
        let mut sheet = Worksheet::new(1, "To Sort");
        sheet.set_row_hidden(4, true);
        assert!(sheet.is_row_hidden(4));
        sheet.set_row_hidden(4, false);
        assert!(sheet.row_properties(4).is_none());
    }
}
