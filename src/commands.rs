//! The command line interface for the planner.
use crate::log;
use crate::run::{self, Options};
use crate::settings::Settings;
use crate::store::Store;
use ::log::info;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

pub mod example;
use example::ExampleSubcommands;

/// The command line interface for the planner.
#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    /// The available commands.
    #[command(subcommand)]
    pub command: Commands,
}

/// The available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Solve a scenario and write its results.
    Run {
        /// Path to the scenario directory.
        scenario_dir: PathBuf,
    },
    /// Write the model as an LP file without solving it.
    WriteModel {
        /// Path to the scenario directory.
        scenario_dir: PathBuf,
        /// Destination for the LP file (defaults to model.lp in the scenario directory).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Create a new, empty scenario.
    New {
        /// Path for the new scenario directory.
        scenario_dir: PathBuf,
    },
    /// Set the default value of a parameter.
    SetDefault {
        /// Path to the scenario directory.
        scenario_dir: PathBuf,
        /// The parameter name.
        param: String,
        /// The new default value.
        val: f64,
    },
    /// Delete the result tables of a prior run.
    DropResults {
        /// Path to the scenario directory.
        scenario_dir: PathBuf,
    },
    /// Rewrite the scenario's tables and remove stray temporary files.
    Compact {
        /// Path to the scenario directory.
        scenario_dir: PathBuf,
    },
    /// Manage bundled example scenarios.
    Example {
        /// The available subcommands for managing example scenarios.
        #[command(subcommand)]
        subcommand: ExampleSubcommands,
    },
}

impl Commands {
    /// Execute the supplied CLI command
    fn execute(self) -> Result<()> {
        match self {
            Self::Run { scenario_dir } => handle_run_command(&scenario_dir),
            Self::WriteModel {
                scenario_dir,
                output,
            } => handle_write_model_command(&scenario_dir, output.as_deref()),
            Self::New { scenario_dir } => handle_new_command(&scenario_dir),
            Self::SetDefault {
                scenario_dir,
                param,
                val,
            } => handle_set_default_command(&scenario_dir, &param, val),
            Self::DropResults { scenario_dir } => handle_drop_results_command(&scenario_dir),
            Self::Compact { scenario_dir } => handle_compact_command(&scenario_dir),
            Self::Example { subcommand } => subcommand.execute(),
        }
    }
}

/// Parse CLI arguments and execute the chosen command
pub fn run_cli() -> Result<()> {
    Cli::parse().command.execute()
}

/// Initialise the program logger from the scenario's settings.
///
/// A no-op when the logger is already running, so commands compose in-process.
fn init_logging(settings: &Settings, scenario_dir: &Path) -> Result<()> {
    if log::is_logger_initialised() {
        return Ok(());
    }
    let log_dir = settings.log_to_file.then_some(scenario_dir);
    log::init(Some(settings.log_level.as_str()), log_dir).context("Failed to initialise logging.")
}

/// Handle the `run` command.
pub fn handle_run_command(scenario_dir: &Path) -> Result<()> {
    let settings = Settings::from_path(scenario_dir)?;
    init_logging(&settings, scenario_dir)?;

    let store = Store::open(scenario_dir)?;
    let options = Options::from_store(&store)?;
    let output = run::solve(&store, &options).context("Failed to solve scenario.")?;

    info!("Objective value: {}", output.objective);
    info!("Result tables written: {}", output.tables_written.join(", "));
    Ok(())
}

/// Handle the `write-model` command.
pub fn handle_write_model_command(scenario_dir: &Path, output: Option<&Path>) -> Result<()> {
    let settings = Settings::from_path(scenario_dir)?;
    init_logging(&settings, scenario_dir)?;

    let store = Store::open(scenario_dir)?;
    let options = Options::from_store(&store)?;
    let default_path;
    let path = match output {
        Some(path) => path,
        None => {
            default_path = scenario_dir.join("model.lp");
            &default_path
        }
    };
    run::write_model(&store, &options, path).context("Failed to write model.")
}

/// Handle the `new` command.
pub fn handle_new_command(scenario_dir: &Path) -> Result<()> {
    let settings = Settings::from_path(scenario_dir)?;
    init_logging(&settings, scenario_dir)?;
    Store::create(scenario_dir)?;
    Ok(())
}

/// Handle the `set-default` command.
pub fn handle_set_default_command(scenario_dir: &Path, param: &str, val: f64) -> Result<()> {
    let settings = Settings::from_path(scenario_dir)?;
    init_logging(&settings, scenario_dir)?;
    let store = Store::open(scenario_dir)?;
    store.set_param_default(param, val)?;
    info!("Default for {param} set to {val}");
    Ok(())
}

/// Handle the `drop-results` command.
pub fn handle_drop_results_command(scenario_dir: &Path) -> Result<()> {
    let settings = Settings::from_path(scenario_dir)?;
    init_logging(&settings, scenario_dir)?;
    let store = Store::open(scenario_dir)?;
    store.drop_result_tables()
}

/// Handle the `compact` command.
pub fn handle_compact_command(scenario_dir: &Path) -> Result<()> {
    let settings = Settings::from_path(scenario_dir)?;
    init_logging(&settings, scenario_dir)?;
    let store = Store::open(scenario_dir)?;
    store.compact()
}
