//! Five-stage processing of isotope-ratio mass-spectrometer exports.
//!
//! Every stage rebuilds one named view of the workbook from the view before it:
//!
//! 1. `Data`: raw rows grouped by run line into padded 11-row blocks with summary
//!    formulas and peak checks ([`build_data_view`]).
//! 2. `To Sort`: `Data` materialized to plain values and filtered on a summary label
//!    ([`build_to_sort`]).
//! 3. `Last 6`: the `last 6` summary rows ([`build_last6`]).
//! 4. `Group`: rows grouped per sample, reference-material aggregates, the calibration
//!    regression and per-sample normalization formulas ([`build_group`]).
//! 5. `Summary`: the normalized results below the `Group` divider ([`build_summary`]).
//!
//! Formulas are written as text; an external engine behind [`Recalculator`] computes
//! their cached values. [`run_stage`] and [`run_pipeline`] drive the stages against a
//! file on disk.

mod block;
mod config;
mod error;
mod group;
mod last6;
pub mod layout;
mod normalize;
mod recalc;
mod runner;
mod sheet;
mod summary;
mod to_sort;

pub use block::{build_blocks, build_data_view, Block, DataReport, Record, SourceTable};
pub use config::{
    classify_identifier, is_reference_key, reference_standard, CategoryFilter, Palette,
    PipelineConfig, Published, RecalcBackend, RecalcConfig, ReferenceStandard, StageToggles,
    UnknownCategory, ARAGONITE_INTERCEPT, ARAGONITE_SLOPE, CO2_KEY, DEFAULT_INPUT_SHEET,
    REFERENCE_STANDARDS, VSMOW_OFFSET, VSMOW_SLOPE,
};
pub use error::PipelineError;
pub use group::{
    build_group, group_key, is_aragonite, valid_co2_rows, GroupReport, RunNumber, SampleId,
};
pub use last6::{build_last6, Last6Report};
pub use normalize::{map_columns, normalize_header};
pub use recalc::{NoRecalc, OfficeRecalc, Recalculator};
pub use runner::{run_pipeline, run_stage, Stage, StageReport};
pub use summary::{
    build_summary, locate_band, needs_refresh, BandGrid, Strategy, SummaryReport, STRATEGIES,
};
pub use to_sort::{build_to_sort, ToSortReport};
