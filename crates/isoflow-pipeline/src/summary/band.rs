//! Locating the two-row divider band of the `Group` view by its fill color.

use isoflow_model::{Color, StyleTable, Worksheet};

use crate::sheet::{at, max_col, max_row};

/// Cells of one worksheet tested for the marker fill.
pub struct BandGrid<'a> {
    sheet: &'a Worksheet,
    styles: &'a StyleTable,
    marker: Color,
}

impl<'a> BandGrid<'a> {
    pub fn new(sheet: &'a Worksheet, styles: &'a StyleTable, marker: Color) -> Self {
        Self {
            sheet,
            styles,
            marker,
        }
    }

    fn is_marked(&self, row: u32, col: u32) -> bool {
        self.styles
            .get(self.sheet.style_id(at(row, col)))
            .and_then(|style| style.fill_color())
            .is_some_and(|color| color.rgb() == self.marker.rgb())
    }

    fn marked_in(&self, row: u32, cols: (u32, u32)) -> u32 {
        (cols.0..=cols.1).filter(|c| self.is_marked(row, *c)).count() as u32
    }

    fn max_row(&self) -> u32 {
        max_row(self.sheet)
    }

    fn max_col(&self) -> u32 {
        max_col(self.sheet)
    }

    /// First row `r` such that rows `r` and `r + 1` both pass `hit`.
    fn first_pair(&self, hit: impl Fn(u32) -> bool) -> Option<u32> {
        (1..self.max_row()).find(|r| hit(*r) && hit(r + 1))
    }
}

/// A band locator: the top row of the band it recognizes, if any.
pub type Strategy = fn(&BandGrid<'_>) -> Option<u32>;

/// Normalized-value columns Z..AH, at least half of them marked.
fn normalized_columns(grid: &BandGrid<'_>) -> Option<u32> {
    const COLS: (u32, u32) = (26, 34);
    let threshold = ((COLS.1 - COLS.0 + 1) / 2).max(1);
    grid.first_pair(|r| grid.marked_in(r, COLS) >= threshold)
}

/// Columns L..last used column, at least half of them marked.
fn data_columns(grid: &BandGrid<'_>) -> Option<u32> {
    let cols = (12, grid.max_col());
    let width = cols.1.saturating_sub(cols.0) + 1;
    let threshold = (width / 2).max(1);
    grid.first_pair(|r| grid.marked_in(r, cols) >= threshold)
}

/// Any marked cell at all.
fn any_column(grid: &BandGrid<'_>) -> Option<u32> {
    let cols = (1, grid.max_col());
    grid.first_pair(|r| grid.marked_in(r, cols) > 0)
}

/// Tried in order; the first hit wins.
pub const STRATEGIES: [Strategy; 3] = [normalized_columns, data_columns, any_column];

pub fn locate_band(grid: &BandGrid<'_>) -> Option<u32> {
    STRATEGIES.iter().enumerate().find_map(|(i, strategy)| {
        let row = strategy(grid)?;
        log::debug!("gray band at row {row} (strategy {})", i + 1);
        Some(row)
    })
}
