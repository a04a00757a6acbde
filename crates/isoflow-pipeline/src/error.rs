use std::path::PathBuf;

use isoflow_xlsx::{ReadError, WriteError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A predecessor view is missing: the stage that produces it has not run yet.
    #[error("Sheet '{sheet}' not found in workbook. Run Step {step} first.")]
    SheetNotFound { sheet: &'static str, step: u8 },
    #[error("Input sheet '{0}' not found in workbook.")]
    InputSheetNotFound(String),
    #[error("Could not find the 2-row dark gray band (color #808080) in '{0}' sheet.")]
    MarkerNotFound(&'static str),
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("failed to read workbook: {0}")]
    Read(#[from] ReadError),
    #[error("failed to write workbook: {0}")]
    Write(#[from] WriteError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}
