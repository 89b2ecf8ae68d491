//! Command-line interface.
//!
//! Every data-processing subcommand opens a data file, runs one stage over
//! it and syncs the results back into the same file.

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

use crate::config::AppConfig;
use crate::data::{DataProvider, DataStore, Schema};
use crate::generator::{generate_random, ushakov, GeneratorConfig};
use crate::optimizer::GaNetworkOptimizationSolver;
use crate::orchestration::Orchestrated2StageSolver;
use crate::planner::{ProcessedDataAmountMaximizationSolver, ROW_VARIABLES};
use crate::processor::DataProcessor;
use crate::report::format_solution;
use crate::simulation::{NetworkDataFlow, NoiseModel};
use crate::storage;

#[derive(Parser, Debug)]
#[command(name = "twoopt", version, about = "Two-stage optimization of virtualized network data flow")]
pub struct Cli {
    #[arg(long, global = true, help = "Config file (TOML). Defaults to $TWOOPT_CONFIG or twoopt.toml")]
    pub config: Option<PathBuf>,
    #[arg(long, global = true, help = "Use the small, fast test profile")]
    pub test_profile: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a random dataset for a schema.
    Generate {
        #[arg(long)]
        schema: PathBuf,
        #[arg(long, default_value_t = 10.0)]
        psi_upper: f64,
        #[arg(long, default_value_t = 10.0)]
        phi_upper: f64,
        #[arg(long, default_value_t = 10.0)]
        v_upper: f64,
        #[arg(long)]
        x_eq_upper: Option<f64>,
        #[arg(long, default_value_t = 2.0)]
        tl_upper: f64,
        #[arg(long, value_delimiter = ',')]
        entry_nodes: Vec<usize>,
        #[arg(long, default_value_t = 0)]
        seed: u64,
        #[arg(long, help = "Output file. Defaults to the current time, YYYYMMDDHHMM.csv")]
        output: Option<PathBuf>,
    },
    /// Write the reference Ushakov dataset and its schema.
    Ushakov {
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
    /// Plan data amounts (linear program only).
    Plan {
        data: PathBuf,
        #[arg(long, help = "Print the plan")]
        show: bool,
    },
    /// Simulate the stored plan.
    Simulate {
        data: PathBuf,
        #[arg(long, help = "Export a per-tick trace into the trace directory")]
        trace: bool,
        #[arg(long, help = "Add gaussian noise to operation rates")]
        noise: bool,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Tune throughput fractions for the stored plan (GA only).
    Optimize { data: PathBuf },
    /// Alternate planning and tuning.
    Orchestrate {
        data: PathBuf,
        #[arg(long, help = "Do not save the run report")]
        no_report: bool,
    },
}

/// Output file name used when `generate` gets none.
pub fn default_output_name() -> PathBuf {
    PathBuf::from(Local::now().format("%Y%m%d%H%M.csv").to_string())
}

impl Cli {
    pub fn load_config(&self) -> Result<AppConfig> {
        if self.test_profile {
            return Ok(AppConfig::test_profile());
        }
        match &self.config {
            Some(path) => AppConfig::load(path),
            None => AppConfig::load_or_default(AppConfig::locate(None)),
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).context("Failed to render output")?);
    Ok(())
}

fn open(path: &Path) -> Result<DataStore> {
    DataStore::open(path).with_context(|| format!("Failed to open data file {}", path.display()))
}

/// Execute a parsed command line. `cancel` stops orchestration between
/// iterations.
pub async fn run(cli: Cli, cancel: Arc<AtomicBool>) -> Result<()> {
    let config = cli.load_config()?;

    match cli.command {
        Commands::Generate {
            schema,
            psi_upper,
            phi_upper,
            v_upper,
            x_eq_upper,
            tl_upper,
            entry_nodes,
            seed,
            output,
        } => {
            let schema_file = schema;
            let schema = Schema::from_file(&schema_file)
                .with_context(|| format!("Failed to load schema {}", schema_file.display()))?;
            let generator = GeneratorConfig {
                psi_upper,
                phi_upper,
                v_upper,
                x_eq_upper,
                tl_upper,
                entry_nodes,
                seed,
                ..GeneratorConfig::default()
            };
            let output = output.unwrap_or_else(default_output_name);
            let entries = generate_random(&schema, &generator, &output)?;
            info!(path = %output.display(), entries, "Generated");
        }

        Commands::Ushakov { dir } => {
            let (data, schema) = ushakov::write(&dir)?;
            info!(data = %data.display(), schema = %schema.display(), "Reference dataset ready");
        }

        Commands::Plan { data, show } => {
            let mut solver = ProcessedDataAmountMaximizationSolver::new(open(&data)?, config.planner.clone())?;
            let outcome = solver.run().await?;
            if show {
                print!(
                    "{}",
                    format_solution(solver.data(), solver.data().schema(), &ROW_VARIABLES)?
                );
            }
            let mut store = solver.into_provider();
            store.sync()?;
            print_json(&outcome)?;
        }

        Commands::Simulate {
            data,
            trace,
            noise,
            seed,
        } => {
            let mut simulation = config.simulation.clone();
            if noise {
                simulation.noise = NoiseModel::Gauss;
            }
            if let Some(seed) = seed {
                simulation.seed = seed;
            }
            let mut flow = NetworkDataFlow::new(open(&data)?, simulation)?;
            if trace {
                let name = format!("trace_{}.csv", Utc::now().format("%Y%m%d%H%M%S"));
                flow = flow.with_trace_path(config.output.trace_dir.join(name));
            }
            let mut report = flow.run().await?;
            let mut store = flow.into_provider();
            store.sync()?;
            report.trace.clear();
            print_json(&report)?;
        }

        Commands::Optimize { data } => {
            let mut solver =
                GaNetworkOptimizationSolver::new(open(&data)?, config.ga.clone(), config.simulation.clone())?;
            let report = solver.run().await?;
            let mut store = solver.into_provider();
            store.sync()?;
            print_json(&report)?;
        }

        Commands::Orchestrate { data, no_report } => {
            let mut solver = Orchestrated2StageSolver::new(
                open(&data)?,
                config.orchestration.clone(),
                config.planner.clone(),
                config.ga.clone(),
                config.simulation.clone(),
            )
            .with_cancel_flag(cancel);
            let report = solver.run().await?;
            if !no_report {
                let path = storage::save_report(&report, &config.output.report_dir)?;
                info!(path = %path.display(), "Report saved");
            }
            print_json(&report)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_generate() {
        let cli = Cli::try_parse_from([
            "twoopt",
            "generate",
            "--schema",
            "schema.json",
            "--psi-upper",
            "5",
            "--entry-nodes",
            "0,2",
        ])
        .unwrap();
        match cli.command {
            Commands::Generate {
                psi_upper,
                phi_upper,
                entry_nodes,
                output,
                ..
            } => {
                assert_eq!(psi_upper, 5.0);
                assert_eq!(phi_upper, 10.0);
                assert_eq!(entry_nodes, vec![0, 2]);
                assert!(output.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["twoopt", "orchestrate", "data.csv", "--test-profile"]).unwrap();
        assert!(cli.test_profile);
        assert_eq!(cli.load_config().unwrap().ga.population_size, 3);
    }

    #[test]
    fn test_default_output_name() {
        let name = default_output_name();
        let name = name.to_string_lossy();
        assert!(name.ends_with(".csv"));
        assert_eq!(name.len(), "YYYYMMDDHHMM.csv".len());
    }

    #[tokio::test]
    async fn test_plan_command_updates_file() {
        let dir = tempfile::tempdir().unwrap();
        let (data, _) = ushakov::write(dir.path()).unwrap();
        let cli = Cli::try_parse_from(["twoopt", "plan", data.to_str().unwrap(), "--test-profile"]).unwrap();
        run(cli, Arc::new(AtomicBool::new(false))).await.unwrap();

        let store = DataStore::open(&data).unwrap();
        let planned = store.entries().iter().filter(|(key, _)| key.variable == "g").count();
        assert!(planned > 0);
    }
}
