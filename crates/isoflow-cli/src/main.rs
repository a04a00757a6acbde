use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use isoflow_pipeline::{
    run_pipeline, CategoryFilter, PipelineConfig, RecalcBackend, Stage, StageToggles,
};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum StageArg {
    Data,
    ToSort,
    #[value(alias = "last-6")]
    Last6,
    Group,
    Summary,
}

impl From<StageArg> for Stage {
    fn from(arg: StageArg) -> Self {
        match arg {
            StageArg::Data => Stage::Data,
            StageArg::ToSort => Stage::ToSort,
            StageArg::Last6 => Stage::Last6,
            StageArg::Group => Stage::Group,
            StageArg::Summary => Stage::Summary,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum RecalcArg {
    None,
    Office,
}

#[derive(Debug, Parser)]
#[command(
    name = "isoflow",
    about = "Run the isotope-run pipeline (Data, To Sort, Last 6, Group, Summary) on a workbook."
)]
struct Args {
    /// Workbook to process; it is updated in place.
    file: PathBuf,

    /// Stages to run (repeatable). Default: every stage enabled in the configuration.
    #[arg(long = "stage", value_enum)]
    stages: Vec<StageArg>,

    /// Name of the raw instrument export sheet.
    #[arg(long)]
    sheet: Option<String>,

    /// `To Sort` category filter: all, ref avg, last 6, start, end, delta.
    #[arg(long)]
    filter: Option<CategoryFilter>,

    /// JSON configuration file; flags override its fields.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Engine used to compute cached formula values [default: office].
    #[arg(long, value_enum)]
    recalc: Option<RecalcArg>,

    /// Office suite executable for `--recalc office`.
    #[arg(long, value_name = "PATH")]
    soffice: Option<PathBuf>,

    /// Log per-block and per-group details.
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)
                .with_context(|| format!("load config {}", path.display()))?,
            None => PipelineConfig::default(),
        };
        if let Some(sheet) = &self.sheet {
            config.input_sheet = sheet.clone();
        }
        if let Some(filter) = self.filter {
            config.filter = filter;
        }
        if !self.stages.is_empty() {
            let stages: Vec<Stage> = self.stages.iter().map(|s| Stage::from(*s)).collect();
            config.stages = StageToggles::only(&stages);
        }
        match self.recalc {
            Some(RecalcArg::None) => config.recalc.backend = RecalcBackend::None,
            Some(RecalcArg::Office) => config.recalc.backend = RecalcBackend::Office,
            None => {}
        }
        if let Some(program) = &self.soffice {
            config.recalc.program = program.clone();
        }
        Ok(config)
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = args.pipeline_config()?;
    let recalc = config.recalc.build();
    let reports = run_pipeline(&args.file, &config, recalc.as_ref())
        .with_context(|| format!("process {}", args.file.display()))?;

    for report in &reports {
        println!("{}", report.message);
        for note in &report.notes {
            println!("  note: {note}");
        }
    }
    Ok(())
}
