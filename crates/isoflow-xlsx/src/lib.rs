//! XLSX import/export for the isoflow workbook model.
//!
//! Reads and writes the subset of SpreadsheetML the pipeline relies on: cell values,
//! formulas together with their cached results, rich text, cell styles, row/column
//! properties, merges, the sheet AutoFilter and the active tab. Parts outside that
//! subset (charts, drawings, comments) are not carried across a read/write cycle.

mod formula_shift;
mod read;
mod save;
mod shared_strings;
mod styles;
mod write;
mod xml;

pub use read::{read_workbook, read_workbook_from_bytes, read_workbook_from_reader, ReadError};
pub use save::atomic_write;
pub use write::{write_workbook, write_workbook_to_writer, WriteError};
