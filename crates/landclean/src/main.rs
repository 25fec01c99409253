use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::Table;
use landclean_core::config::ConfigFile;
use landclean_core::outputs::{publish_tables, WrittenFile};
use landclean_core::{all_pipelines, find_pipeline, CleaningPipeline, PipelineConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Cleans Dubai Pulse real-estate exports into analysis tables", long_about = None)]
struct Cli {
    /// TOML file providing raw_dir, processed_dir and reference_year
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Directory holding the raw CSV exports
    #[arg(long, global = true)]
    raw_dir: Option<PathBuf>,
    /// Directory the cleaned tables are written to
    #[arg(long, global = true)]
    processed_dir: Option<PathBuf>,
    /// Year the lookback windows end on (defaults to the current year)
    #[arg(long, global = true)]
    reference_year: Option<i32>,
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
    // None runs every pipeline.
    #[command(subcommand)]
    command: Option<Command>,
}

impl Cli {
    fn command(&self) -> Command {
        self.command.unwrap_or(Command::All)
    }
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Clean the rent contracts export
    Rent,
    /// Clean transactions and merge them with projects and developers
    Transactions,
    /// Run every pipeline in turn
    All,
    /// List the available pipelines
    List,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let pipelines: Vec<&'static dyn CleaningPipeline> = match cli.command() {
        Command::Rent => vec![lookup("rent")?],
        Command::Transactions => vec![lookup("transactions")?],
        Command::All => all_pipelines().to_vec(),
        Command::List => {
            for pipeline in all_pipelines() {
                println!("{:<14} {}", pipeline.code_identifier(), pipeline.description());
            }
            return Ok(());
        }
    };

    let config = resolve_config(&cli)?;
    info!(
        raw_dir = %config.raw_dir.display(),
        processed_dir = %config.processed_dir.display(),
        reference_year = config.reference_year,
        "configuration resolved"
    );

    for pipeline in pipelines {
        run_pipeline(pipeline, &config)?;
    }

    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn lookup(code: &str) -> Result<&'static dyn CleaningPipeline> {
    match find_pipeline(code) {
        Some(pipeline) => Ok(pipeline),
        None => bail!("pipeline '{code}' is not registered"),
    }
}

fn resolve_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let file = ConfigFile::from_path(path)
                .with_context(|| format!("failed to load config {}", path.display()))?;
            PipelineConfig::from_file(file)
        }
        None => PipelineConfig::default(),
    };

    if let Some(raw_dir) = &cli.raw_dir {
        config.raw_dir = raw_dir.clone();
    }
    if let Some(processed_dir) = &cli.processed_dir {
        config.processed_dir = processed_dir.clone();
    }
    if let Some(year) = cli.reference_year {
        config = config.with_reference_year(year);
    }

    Ok(config)
}

fn run_pipeline(pipeline: &dyn CleaningPipeline, config: &PipelineConfig) -> Result<()> {
    let code = pipeline.code_identifier();
    info!(pipeline = code, "starting pipeline");

    let mut output = pipeline
        .run(config)
        .with_context(|| format!("pipeline '{code}' failed"))?;
    let written = publish_tables(config, &mut output.tables)
        .with_context(|| format!("failed to write outputs for '{code}'"))?;

    print_summary(code, &output, &written);
    Ok(())
}

fn print_summary(code: &str, output: &landclean_core::PipelineOutput, written: &[WrittenFile]) {
    let mut stages = Table::new();
    stages.set_header(vec!["Stage", "Rows in", "Rows out", "Dropped"]);
    for record in output.stages.records() {
        stages.add_row(vec![
            record.stage.to_string(),
            record.rows_in.to_string(),
            record.rows_out.to_string(),
            record.rows_dropped().to_string(),
        ]);
    }

    let mut files = Table::new();
    files.set_header(vec!["Output", "Rows", "Columns"]);
    for file in written {
        files.add_row(vec![
            file.path.display().to_string(),
            file.rows.to_string(),
            file.columns.to_string(),
        ]);
    }

    println!("Pipeline '{code}'");
    println!("{stages}");
    println!("{files}");
}
