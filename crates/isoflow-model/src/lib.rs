//! `isoflow-model` is the in-memory workbook model used by the isotope-run pipeline.
//!
//! It holds exactly what the pipeline reads from and writes into a workbook:
//! cells (literal, formula with optional cached result, or rich text), styles,
//! row/column properties, merged ranges, and the sheet auto-filter.

mod address;
mod autofilter;
mod cell;
mod formula_text;
mod rich_text;
mod style;
mod value;
mod workbook;
mod worksheet;

pub use address::{
    column_index, column_name, A1ParseError, CellRef, Range, RangeParseError, EXCEL_MAX_COLS,
    EXCEL_MAX_ROWS,
};
pub use autofilter::{FilterColumn, SheetAutoFilter, SortCondition, SortState};
pub use cell::{Cell, CellContent};
pub use formula_text::{display_formula_text, normalize_formula_text};
pub use rich_text::{RichText, RichTextRun, RichTextRunStyle};
pub use style::{
    Alignment, Border, BorderStyle, Color, Fill, FillPattern, Font, HorizontalAlignment, Style,
    StyleTable, VerticalAlignment,
};
pub use value::{format_number, CellValue};
pub use workbook::Workbook;
pub use worksheet::{ColProperties, RowProperties, Worksheet, WorksheetId};
