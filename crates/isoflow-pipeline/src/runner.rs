//! Running stages against a workbook file: each stage reads the file, rebuilds its view and
//! saves the whole workbook back before the next one starts.

use std::fmt;
use std::path::Path;

use isoflow_model::Workbook;
use isoflow_xlsx::{read_workbook, write_workbook};

use crate::block::build_data_view;
use crate::group::build_group;
use crate::last6::build_last6;
use crate::recalc::Recalculator;
use crate::summary::{build_summary, needs_refresh};
use crate::to_sort::build_to_sort;
use crate::{Palette, PipelineConfig, PipelineError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    Data,
    ToSort,
    Last6,
    Group,
    Summary,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Data,
        Stage::ToSort,
        Stage::Last6,
        Stage::Group,
        Stage::Summary,
    ];

    pub fn number(self) -> u8 {
        match self {
            Stage::Data => 1,
            Stage::ToSort => 2,
            Stage::Last6 => 3,
            Stage::Group => 4,
            Stage::Summary => 5,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Stage::Data => "DATA",
            Stage::ToSort => "TO SORT",
            Stage::Last6 => "LAST 6",
            Stage::Group => "GROUP",
            Stage::Summary => "SUMMARY",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Step {}: {}", self.number(), self.title())
    }
}

/// Outcome of one successful stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StageReport {
    pub stage: Stage,
    /// "Step N: TITLE completed on <path>".
    pub message: String,
    /// Advisories raised along the way (e.g. recalculation unavailable).
    pub notes: Vec<String>,
}

fn open(path: &Path) -> Result<Workbook, PipelineError> {
    if !path.exists() {
        return Err(PipelineError::FileNotFound(path.to_path_buf()));
    }
    Ok(read_workbook(path)?)
}

/// Run a single stage on the workbook at `path` and save it.
pub fn run_stage(
    path: &Path,
    stage: Stage,
    config: &PipelineConfig,
    recalc: &dyn Recalculator,
) -> Result<StageReport, PipelineError> {
    let palette = Palette::STANDARD;
    let mut notes = Vec::new();

    let workbook = match stage {
        Stage::Data => {
            let mut workbook = open(path)?;
            let report = build_data_view(&mut workbook, &config.input_sheet, &palette)?;
            log::debug!("{} blocks, last row {}", report.blocks, report.last_row);
            workbook
        }
        Stage::ToSort => {
            if !path.exists() {
                return Err(PipelineError::FileNotFound(path.to_path_buf()));
            }
            let recalculated = recalc.recalculate(path);
            if !recalculated {
                log::warn!("Warning: unable to force recalculation (no engine or it failed).");
                log::warn!(
                    "If Data contains formulas without cached values, To Sort may have empty \
                     cells for those formulas."
                );
            }
            let mut workbook = open(path)?;
            let report = build_to_sort(&mut workbook, config.filter)?;
            log::debug!(
                "filter '{}': {} of {} rows hidden",
                config.filter,
                report.hidden_rows,
                report.last_row.saturating_sub(1)
            );
            if !recalculated {
                notes.push(
                    "Recalculation was not run. If To Sort contains blanks in R-AA, open the \
                     workbook in a spreadsheet application, save it once, then re-run Step 2."
                        .to_string(),
                );
            }
            workbook
        }
        Stage::Last6 => {
            let mut workbook = open(path)?;
            let report = build_last6(&mut workbook)?;
            log::debug!("{} rows extracted", report.rows);
            workbook
        }
        Stage::Group => {
            let mut workbook = open(path)?;
            let today = chrono::Local::now().date_naive();
            let report = build_group(&mut workbook, &palette, today)?;
            log::debug!(
                "{} reference groups, {} sample groups",
                report.reference_groups,
                report.sample_groups
            );
            workbook
        }
        Stage::Summary => {
            let mut workbook = open(path)?;
            if needs_refresh(&workbook, &palette)? {
                log::info!("Group has formulas without cached values; recalculating");
                if recalc.recalculate(path) {
                    workbook = open(path)?;
                } else {
                    notes.push(
                        "Group formulas have no cached values; Summary cells for them are empty."
                            .to_string(),
                    );
                }
            }
            let report = build_summary(&mut workbook, &palette)?;
            log::debug!("{} rows copied from row {}", report.rows, report.first_row);
            workbook
        }
    };

    write_workbook(&workbook, path)?;

    let message = format!("{stage} completed on {}", path.display());
    log::info!("{message}");
    for note in &notes {
        log::warn!("{note}");
    }
    Ok(StageReport {
        stage,
        message,
        notes,
    })
}

/// Run every enabled stage in order, stopping at the first error.
pub fn run_pipeline(
    path: &Path,
    config: &PipelineConfig,
    recalc: &dyn Recalculator,
) -> Result<Vec<StageReport>, PipelineError> {
    Stage::ALL
        .into_iter()
        .filter(|stage| config.stages.is_enabled(*stage))
        .map(|stage| run_stage(path, stage, config, recalc))
        .collect()
}
