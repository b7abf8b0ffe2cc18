//! The top-level entry points: solve a scenario, or dump its model.
use anyhow::{Context, Result};
use log::info;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::AtomicBool;

use crate::build::{build_model, BuildOptions, TransmissionTopology};
use crate::error::{EngineError, SolveStatus};
use crate::id::Year;
use crate::index::ModelIndex;
use crate::model::VariableFamily;
use crate::output::write_results;
use crate::phases::{run_phases, PhasePlan};
use crate::scenario::ScenarioData;
use crate::solver::{create_solver, Solver, SolverOptions};
use crate::store::Store;

/// Name of the optional run-options file inside a scenario directory
pub const RUN_OPTIONS_FILE: &str = "run.toml";

/// The variable families written out when the caller does not choose
pub const DEFAULT_VARS_TO_SAVE: [&str; 7] = [
    "vnewcapacity",
    "vtotalcapacityannual",
    "vproduction",
    "vuse",
    "vstoragelevel",
    "vannualemissions",
    "vtotaldiscountedcost",
];

/// Which years to solve, and how they are split into foresight phases.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(untagged)]
pub enum YearSelection {
    /// All modeled years in one phase
    #[default]
    All,
    /// A subset of the modeled years in one phase
    Flat(Vec<Year>),
    /// Year blocks solved in order with limited foresight
    Blocks(Vec<Vec<Year>>),
}

/// Options for one run. Every field has a default, so an empty `run.toml`
/// (or none at all) is a valid configuration.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct Options {
    /// Result-table names of the families to write out
    pub vars_to_save: Vec<String>,
    /// Only instantiate variables referenced by a constraint or the objective
    pub restrict_vars: bool,
    /// Years to solve and their phase structure
    pub years: YearSelection,
    /// Trade representation between regions
    pub transmission: TransmissionTopology,
    /// Whether line build decisions are integer
    pub discrete_transmission: bool,
    /// Solver backend name
    pub solver: String,
    /// Options passed through to the backend
    pub solver_options: SolverOptions,
    /// Near-zero comparison tolerance
    pub tolerance: f64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            vars_to_save: DEFAULT_VARS_TO_SAVE.map(String::from).to_vec(),
            restrict_vars: true,
            years: YearSelection::All,
            transmission: TransmissionTopology::default(),
            discrete_transmission: false,
            solver: "highs".to_string(),
            solver_options: SolverOptions::default(),
            tolerance: 1e-6,
        }
    }
}

impl Options {
    /// Read options from the scenario's `run.toml`, if one exists.
    pub fn from_store(store: &Store) -> Result<Options> {
        let path = store.root().join(RUN_OPTIONS_FILE);
        if !path.is_file() {
            return Ok(Options::default());
        }
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("could not read {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("could not parse {}", path.display()))
    }

    /// The phase plan implied by the year selection.
    fn plan(&self, scenario_years: &[Year]) -> Result<PhasePlan> {
        let blocks = match &self.years {
            YearSelection::All => return PhasePlan::flat(scenario_years.to_vec()),
            YearSelection::Flat(years) => vec![years.clone()],
            YearSelection::Blocks(blocks) => blocks.clone(),
        };
        for year in blocks.iter().flatten() {
            if !scenario_years.contains(year) {
                return Err(
                    EngineError::data(format!("year {year} is not a modeled year")).into(),
                );
            }
        }
        PhasePlan::new(blocks)
    }

    /// The families selected for output, resolved from table names.
    fn selected_families(&self) -> Result<Vec<VariableFamily>> {
        self.vars_to_save
            .iter()
            .map(|name| {
                VariableFamily::from_str(name).map_err(|_| {
                    EngineError::data(format!("unknown result table '{name}'")).into()
                })
            })
            .collect()
    }

    fn build_options(&self) -> BuildOptions {
        BuildOptions {
            transmission: self.transmission,
            discrete_transmission: self.discrete_transmission,
            restrict_vars: self.restrict_vars,
        }
    }
}

/// The summary of a successful solve.
#[derive(Debug)]
pub struct SolveOutput {
    /// Always [`SolveStatus::Optimal`] here; other statuses surface as errors
    /// and are recovered by downcasting
    pub status: SolveStatus,
    /// Total objective value, summed over phases
    pub objective: f64,
    /// Result tables written, in selection order
    pub tables_written: Vec<String>,
}

/// Solve a scenario end to end and write its results.
pub fn solve(store: &Store, options: &Options) -> Result<SolveOutput> {
    solve_with_cancel(store, options, &AtomicBool::new(false))
}

/// Like [`solve`], honoring a cancellation flag between phases.
pub fn solve_with_cancel(
    store: &Store,
    options: &Options,
    cancel: &AtomicBool,
) -> Result<SolveOutput> {
    // Configuration-time failures come first: an unknown solver, output
    // family or year never builds a model
    let solver = create_solver(&options.solver)?;
    negotiate_capabilities(solver.as_ref(), options)?;
    let families = options.selected_families()?;

    let mut data = ScenarioData::load(store)?;
    let plan = options.plan(&data.sets.years)?;

    let outcomes = run_phases(
        &mut data,
        &plan,
        &options.build_options(),
        solver.as_ref(),
        &options.solver_options,
        options.tolerance,
        cancel,
    )?;

    let objective: f64 = outcomes
        .iter()
        .map(|outcome| outcome.model.objective_value(&outcome.values))
        .sum();

    // Results from a prior run are dropped only once this one has succeeded
    store.drop_result_tables()?;
    let tables_written = write_results(store, &outcomes, &families)?;
    info!("solve finished with objective {objective}");

    Ok(SolveOutput {
        status: SolveStatus::Optimal,
        objective,
        tables_written,
    })
}

/// Serialize the model for the first phase in CPLEX LP format.
///
/// Never touches the results directory.
pub fn write_model(store: &Store, options: &Options, path: &Path) -> Result<()> {
    let solver = create_solver(&options.solver)?;
    negotiate_capabilities(solver.as_ref(), options)?;

    let data = ScenarioData::load(store)?;
    let plan = options.plan(&data.sets.years)?;
    let years = &plan.blocks()[0];

    let index = ModelIndex::build(&data, years)?;
    let model = build_model(&data, &index, &options.build_options())?;

    let file = File::create(path).with_context(|| format!("could not create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    model.write_lp(&mut writer)?;
    info!(
        "wrote model for years {years:?} ({} variables, {} constraints) to {}",
        model.variables.len(),
        model.constraints.len(),
        path.display()
    );
    Ok(())
}

/// A run requesting integer decisions needs a backend that can provide them.
fn negotiate_capabilities(solver: &dyn Solver, options: &Options) -> Result<()> {
    if options.discrete_transmission
        && options.transmission == TransmissionTopology::Pairwise
        && !solver.supports_integer()
    {
        return Err(EngineError::SolverUnavailable(
            solver.id().to_string(),
            "discrete transmission expansion needs an integer-capable solver".to_string(),
        )
        .into());
    }
    Ok(())
}
