use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use isoflow_model::Color;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::recalc::{NoRecalc, OfficeRecalc, Recalculator};
use crate::runner::Stage;
use crate::PipelineError;

/// Raw instrument export sheet name.
pub const DEFAULT_INPUT_SHEET: &str = "Default_Gas_Bench.wke";

/// Per-run settings. Every field has a default, so a partial JSON file is valid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub input_sheet: String,
    pub filter: CategoryFilter,
    pub stages: StageToggles,
    pub recalc: RecalcConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_sheet: DEFAULT_INPUT_SHEET.to_string(),
            filter: CategoryFilter::default(),
            stages: StageToggles::default(),
            recalc: RecalcConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Summary label that Stage 2 keeps visible.
///
/// `All` doubles as the wildcard: choosing it never hides a row, even though Stage 1 also
/// writes an `all` label.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CategoryFilter {
    #[serde(rename = "all")]
    All,
    #[serde(rename = "ref avg")]
    RefAvg,
    #[default]
    #[serde(rename = "last 6")]
    Last6,
    #[serde(rename = "start")]
    Start,
    #[serde(rename = "end")]
    End,
    #[serde(rename = "delta")]
    Delta,
}

impl CategoryFilter {
    pub const ALL: [CategoryFilter; 6] = [
        CategoryFilter::All,
        CategoryFilter::RefAvg,
        CategoryFilter::Last6,
        CategoryFilter::Start,
        CategoryFilter::End,
        CategoryFilter::Delta,
    ];

    /// Lowercase label as written into the label column by Stage 1.
    pub fn label(self) -> &'static str {
        match self {
            CategoryFilter::All => "all",
            CategoryFilter::RefAvg => "ref avg",
            CategoryFilter::Last6 => "last 6",
            CategoryFilter::Start => "start",
            CategoryFilter::End => "end",
            CategoryFilter::Delta => "delta",
        }
    }

    pub fn is_wildcard(self) -> bool {
        self == CategoryFilter::All
    }
}

impl fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Error)]
#[error("unknown category filter '{0}' (expected one of: all, ref avg, last 6, start, end, delta)")]
pub struct UnknownCategory(pub String);

impl FromStr for CategoryFilter {
    type Err = UnknownCategory;

    /// Case-insensitive; `-` and `_` are accepted in place of the space (`last-6`, `ref_avg`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s
            .trim()
            .chars()
            .map(|c| if c == '-' || c == '_' { ' ' } else { c })
            .collect::<String>()
            .to_lowercase();
        CategoryFilter::ALL
            .into_iter()
            .find(|choice| choice.label() == wanted)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageToggles {
    pub data: bool,
    pub to_sort: bool,
    pub last6: bool,
    pub group: bool,
    pub summary: bool,
}

impl Default for StageToggles {
    fn default() -> Self {
        Self {
            data: true,
            to_sort: true,
            last6: true,
            group: true,
            summary: true,
        }
    }
}

impl StageToggles {
    /// Only the listed stages switched on.
    pub fn only(stages: &[Stage]) -> Self {
        let mut toggles = Self {
            data: false,
            to_sort: false,
            last6: false,
            group: false,
            summary: false,
        };
        for stage in stages {
            *toggles.slot(*stage) = true;
        }
        toggles
    }

    pub fn is_enabled(&self, stage: Stage) -> bool {
        match stage {
            Stage::Data => self.data,
            Stage::ToSort => self.to_sort,
            Stage::Last6 => self.last6,
            Stage::Group => self.group,
            Stage::Summary => self.summary,
        }
    }

    fn slot(&mut self, stage: Stage) -> &mut bool {
        match stage {
            Stage::Data => &mut self.data,
            Stage::ToSort => &mut self.to_sort,
            Stage::Last6 => &mut self.last6,
            Stage::Group => &mut self.group,
            Stage::Summary => &mut self.summary,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecalcBackend {
    None,
    #[default]
    Office,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecalcConfig {
    pub backend: RecalcBackend,
    /// Office suite executable used by the `office` backend.
    pub program: PathBuf,
    pub settle_ms: u64,
}

impl Default for RecalcConfig {
    fn default() -> Self {
        Self {
            backend: RecalcBackend::Office,
            program: PathBuf::from("soffice"),
            settle_ms: 1000,
        }
    }
}

impl RecalcConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn build(&self) -> Box<dyn Recalculator> {
        match self.backend {
            RecalcBackend::None => Box::new(NoRecalc),
            RecalcBackend::Office => Box::new(OfficeRecalc::new(&self.program, self.settle())),
        }
    }
}

/// Fill and font colors used by the generated views.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Palette {
    /// Summary label column in `Data`.
    pub label_fill: Color,
    /// Peak-check flag columns in `Data`.
    pub flag_fill: Color,
    pub panel_blue: Color,
    /// Two-row divider band in `Group`; Stage 5 locates its copy window by it.
    pub divider_gray: Color,
    pub light_gray: Color,
    pub aragonite_green: Color,
    pub legend_red: Color,
    pub legend_blue: Color,
    pub legend_navy: Color,
}

impl Palette {
    pub const STANDARD: Palette = Palette {
        label_fill: Color::from_rgb(0xCDFFCC),
        flag_fill: Color::from_rgb(0xCDFEFF),
        panel_blue: Color::from_rgb(0xDAE9F8),
        divider_gray: Color::from_rgb(0x808080),
        light_gray: Color::from_rgb(0xE7E7E7),
        aragonite_green: Color::from_rgb(0x008000),
        legend_red: Color::from_rgb(0xFF0000),
        legend_blue: Color::from_rgb(0x0000FF),
        legend_navy: Color::from_rgb(0x000080),
    };
}

impl Default for Palette {
    fn default() -> Self {
        Palette::STANDARD
    }
}

/// A published value and the top-panel column (1-based) it is written to.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Published {
    pub col: u32,
    pub value: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum IdentifierMatch {
    AnyOf(&'static [&'static str]),
    AllOf(&'static [&'static str]),
}

/// One of the four calibration reference materials.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReferenceStandard {
    /// Display name in the legend boxes.
    pub name: &'static str,
    /// Normalized group key (see [`crate::group_key`]).
    pub key: &'static str,
    pub font: Color,
    /// Top-panel row (1-based) holding this standard's published and measured values.
    pub panel_row: u32,
    pub carbon: Published,
    pub oxygen: Published,
    matcher: IdentifierMatch,
}

impl ReferenceStandard {
    /// Substring classification of a free-text identifier (already lowercased).
    pub fn matches_identifier(&self, lower: &str) -> bool {
        match self.matcher {
            IdentifierMatch::AnyOf(needles) => needles.iter().any(|n| lower.contains(n)),
            IdentifierMatch::AllOf(needles) => needles.iter().all(|n| lower.contains(n)),
        }
    }
}

/// Group key of the working-gas reference group; it has no legend entry.
pub const CO2_KEY: &str = "co2";

pub const REFERENCE_STANDARDS: [ReferenceStandard; 4] = [
    ReferenceStandard {
        name: "IAEA 603",
        key: "iaea603",
        font: Color::from_rgb(0x008000),
        panel_row: 5,
        carbon: Published { col: 6, value: 2.46 },
        oxygen: Published { col: 7, value: -2.37 },
        matcher: IdentifierMatch::AnyOf(&["iaea", "603"]),
    },
    ReferenceStandard {
        name: "LSVEC",
        key: "lsvec",
        font: Color::from_rgb(0x3399FF),
        panel_row: 6,
        carbon: Published { col: 5, value: -46.6 },
        oxygen: Published { col: 8, value: -26.7 },
        matcher: IdentifierMatch::AllOf(&["lsvec"]),
    },
    ReferenceStandard {
        name: "NBS 18",
        key: "nbs18",
        font: Color::from_rgb(0xFF0000),
        panel_row: 7,
        carbon: Published { col: 6, value: -5.01 },
        oxygen: Published { col: 7, value: -23.01 },
        matcher: IdentifierMatch::AllOf(&["nbs", "18"]),
    },
    ReferenceStandard {
        name: "NBS 19",
        key: "nbs19",
        font: Color::from_rgb(0x000080),
        panel_row: 8,
        carbon: Published { col: 6, value: 1.95 },
        oxygen: Published { col: 7, value: -2.2 },
        matcher: IdentifierMatch::AllOf(&["nbs", "19"]),
    },
];

/// Aragonite-calcite oxygen fractionation (Kim et al. 2015).
pub const ARAGONITE_SLOPE: f64 = 0.992;
pub const ARAGONITE_INTERCEPT: f64 = -16.893;

/// VPDB -> VSMOW δ18O conversion.
pub const VSMOW_SLOPE: f64 = 1.03092;
pub const VSMOW_OFFSET: f64 = 30.92;

pub fn reference_standard(key: &str) -> Option<&'static ReferenceStandard> {
    REFERENCE_STANDARDS.iter().find(|s| s.key == key)
}

/// First standard (in legend order) whose markers occur in `identifier`.
pub fn classify_identifier(identifier: &str) -> Option<&'static ReferenceStandard> {
    let lower = identifier.to_lowercase();
    REFERENCE_STANDARDS
        .iter()
        .find(|s| s.matches_identifier(&lower))
}

/// Group keys written as Reference Groups: the four standards plus CO2.
pub fn is_reference_key(key: &str) -> bool {
    key == CO2_KEY || reference_standard(key).is_some()
}
