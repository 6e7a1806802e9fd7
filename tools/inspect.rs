use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use isoxml_decoder::geometry::feature_collection;
use isoxml_decoder::{DecoderConfig, TaskData};

#[derive(Parser)]
#[command(about = "Inspect an ISOXML task-data archive")]
struct Cli {
    /// Task-data zip archive
    archive: PathBuf,

    /// TOML configuration; ISOXML_* environment variables otherwise
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log as JSON lines
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print every diagnostic of the tree and its streams
    Diagnostics {
        /// Also decode TimeLogs and grids
        #[arg(long)]
        streams: bool,
    },
    /// Print all exportable geometry as a GeoJSON FeatureCollection
    Geojson,
    /// Summarize each TimeLog
    Timelogs,
    /// Summarize each grid
    Grids,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }

    let config = match &cli.config {
        Some(path) => DecoderConfig::from_toml_file(path)?,
        None => DecoderConfig::from_env(),
    };
    config.validate()?;

    let bytes = std::fs::read(&cli.archive)
        .with_context(|| format!("Failed to read {}", cli.archive.display()))?;
    let task = TaskData::open_with_config(&bytes, config)
        .with_context(|| format!("Failed to load {}", cli.archive.display()))?;
    info!(archive = %cli.archive.display(), "Archive loaded");

    match cli.command {
        Command::Diagnostics { streams } => {
            let mut diagnostics = task.diagnostics();
            if streams {
                let (timelogs, problems) = task.timelogs();
                diagnostics.extend(problems);
                for log in &timelogs {
                    diagnostics.extend(log.diagnostics());
                }
                let (grids, problems) = task.grids();
                diagnostics.extend(problems);
                for grid in &grids {
                    diagnostics.extend(grid.diagnostics());
                }
            }
            for line in diagnostics.to_strings() {
                println!("{}", line);
            }
            println!("{} problems", diagnostics.len());
        }
        Command::Geojson => {
            let (geometries, problems) = task.geometries();
            for problem in problems.iter() {
                eprintln!("{}", problem);
            }
            let (collection, failures) = feature_collection(&geometries);
            for (path, error) in &failures {
                eprintln!("{}: {}", path, error);
            }
            println!("{}", serde_json::to_string_pretty(&collection)?);
        }
        Command::Timelogs => {
            let (timelogs, problems) = task.timelogs();
            for log in &timelogs {
                let invalid = log.rows().iter().filter(|r| !r.is_valid()).count();
                println!("{}: {} rows, {} with errors", log.name(), log.rows().len(), invalid);
                for (slot, description) in log.value_descriptions().iter().enumerate() {
                    match description {
                        Ok(d) => println!(
                            "  [{}] DDI {:04X} on {} {}",
                            slot,
                            d.ddi,
                            d.device_element_id,
                            d.designator.as_deref().unwrap_or("")
                        ),
                        Err(e) => println!("  [{}] {}", slot, e),
                    }
                }
            }
            for problem in problems.iter() {
                eprintln!("{}", problem);
            }
        }
        Command::Grids => {
            let (grids, problems) = task.grids();
            for grid in &grids {
                let invalid = grid.entries().iter().filter(|e| e.error().is_some()).count()
                    + grid.missing_cells();
                println!(
                    "{}: {:?} {}x{}, {} zones, {} cells with errors",
                    grid.name(),
                    grid.grid_type(),
                    grid.row_count(),
                    grid.column_count(),
                    grid.zones().len(),
                    invalid
                );
            }
            for problem in problems.iter() {
                eprintln!("{}", problem);
            }
        }
    }

    Ok(())
}
