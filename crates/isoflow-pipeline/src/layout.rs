//! Sheet names and fixed column positions shared by the stages (1-based columns).

use crate::CategoryFilter;

pub const DATA_SHEET: &str = "Data";
pub const TO_SORT_SHEET: &str = "To Sort";
pub const LAST6_SHEET: &str = "Last 6";
pub const GROUP_SHEET: &str = "Group";
pub const SUMMARY_SHEET: &str = "Summary";

/// Header row of the `Data` view, columns A..AA. Blank entries are spacer columns.
pub const DATA_HEADERS: [&str; 27] = [
    "Line",
    "Time Code",
    "Identifier 1",
    "Comment",
    "Identifier 2",
    "Analysis",
    "Preparation",
    "Peak Nr",
    "Rt",
    "Ampl 44",
    "Area All",
    "d 13C/12C",
    "d 18O/16O",
    "",
    "",
    "",
    "",
    "C avg",
    "C stdev",
    "",
    "O avg",
    "O stdev",
    "",
    "Sum area all",
    "area peaks",
    "funny peaks",
    "min intensity",
];

pub const COL_LINE: u32 = 1;
pub const COL_TIME_CODE: u32 = 2;
pub const COL_IDENTIFIER_1: u32 = 3;
pub const COL_IDENTIFIER_2: u32 = 5;
pub const COL_ANALYSIS: u32 = 6;
pub const COL_PEAK_NR: u32 = 8;
pub const COL_AMPL: u32 = 10;
pub const COL_AREA: u32 = 11;
pub const COL_D13C: u32 = 12;
pub const COL_D18O: u32 = 13;
/// Summary label column (Q); the `To Sort` filter works on it.
pub const COL_LABEL: u32 = 17;
pub const COL_C_AVG: u32 = 18;
pub const COL_C_STDEV: u32 = 19;
pub const COL_O_AVG: u32 = 21;
pub const COL_O_STDEV: u32 = 22;
pub const COL_SUM_AREA_ALL: u32 = 24;
pub const COL_FUNNY: u32 = 26;
pub const COL_MIN_INTENSITY: u32 = 27;

/// Rows per padded block.
pub const BLOCK_ROWS: u32 = 11;
pub const FIRST_BLOCK_ROW: u32 = 3;
/// Leading block rows flagged `ref` instead of getting peak checks.
pub const REFERENCE_PEAKS: u32 = 4;

/// Label written into column Q and its row offset inside the block.
pub const SUMMARY_LABELS: [(CategoryFilter, u32); 6] = [
    (CategoryFilter::RefAvg, 0),
    (CategoryFilter::All, 4),
    (CategoryFilter::Last6, 5),
    (CategoryFilter::Start, 8),
    (CategoryFilter::End, 9),
    (CategoryFilter::Delta, 10),
];

/// Columns of `Group` (and `Last 6`) carried from the measurement rows.
pub const GROUP_DATA_COLS: u32 = 24;
