//! Phase orchestration for limited-foresight runs.
//!
//! A run is split into one or more phases, each covering a block of years.
//! Phases solve in order; after each solve the committed decisions (new
//! capacity, new storage capacity, line builds and closing storage levels)
//! are carried forward as a parameter overlay for the next phase. A phase
//! that does not solve to optimality aborts the whole run.
use anyhow::{Context, Result};
use itertools::Itertools;
use log::info;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::build::{build_model, BuildOptions};
use crate::error::EngineError;
use crate::id::Year;
use crate::index::ModelIndex;
use crate::model::{Model, VarKey};
use crate::scenario::ScenarioData;
use crate::solver::{Solver, SolverOptions};

/// Threshold above which a relaxed build decision counts as committed
const BUILD_THRESHOLD: f64 = 0.5;

/// The ordered year blocks of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhasePlan {
    blocks: Vec<Vec<Year>>,
}

impl PhasePlan {
    /// A single phase covering all the given years
    pub fn flat(years: Vec<Year>) -> Result<PhasePlan> {
        Self::new(vec![years])
    }

    /// A limited-foresight plan: blocks must be non-empty, internally
    /// ascending, disjoint and ascending across blocks.
    pub fn new(blocks: Vec<Vec<Year>>) -> Result<PhasePlan> {
        if blocks.is_empty() || blocks.iter().any(Vec::is_empty) {
            return Err(EngineError::data("phase plan contains an empty year block").into());
        }
        let flattened: Vec<Year> = blocks.iter().flatten().copied().collect();
        for (a, b) in flattened.iter().tuple_windows() {
            if b <= a {
                return Err(EngineError::data(format!(
                    "phase plan years must be strictly ascending ({a} precedes {b})"
                ))
                .into());
            }
        }
        Ok(PhasePlan { blocks })
    }

    /// The year blocks, in solve order
    pub fn blocks(&self) -> &[Vec<Year>] {
        &self.blocks
    }

    /// Number of phases
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether the plan has no phases (never true for a validated plan)
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Where the runner is in the phase walk, for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunnerState {
    Idle,
    Building(usize),
    Solved(usize),
    CarryingForward(usize),
    Done,
}

/// One solved phase, kept for the result writer.
#[derive(Debug)]
pub struct PhaseOutcome {
    /// The years this phase covered
    pub years: Vec<Year>,
    /// The finalised model
    pub model: Model,
    /// Primal values in the model's column order
    pub values: Vec<f64>,
}

/// Solve every phase of the plan in order.
///
/// `cancel` is checked between phases only; a cancelled run returns an error
/// without writing anything.
pub fn run_phases(
    data: &mut ScenarioData,
    plan: &PhasePlan,
    build_options: &BuildOptions,
    solver: &dyn Solver,
    solver_options: &SolverOptions,
    tolerance: f64,
    cancel: &AtomicBool,
) -> Result<Vec<PhaseOutcome>> {
    let total = plan.len();
    let mut outcomes = Vec::with_capacity(total);
    let mut state = RunnerState::Idle;
    info!("{total} phase(s) planned ({state:?})");

    for (i, years) in plan.blocks().iter().enumerate() {
        if cancel.load(Ordering::Relaxed) {
            return Err(EngineError::data(format!(
                "run cancelled before phase {} of {total}",
                i + 1
            ))
            .into());
        }

        state = RunnerState::Building(i);
        info!(
            "phase {} of {total}: building model for years {:?} ({state:?})",
            i + 1,
            years
        );
        let index = ModelIndex::build(data, years)?;
        let model = build_model(data, &index, build_options)?;
        info!(
            "phase {} of {total}: {} variables, {} constraints",
            i + 1,
            model.variables.len(),
            model.constraints.len()
        );

        let solution = solver
            .solve(&model, solver_options)
            .with_context(|| format!("phase {} of {total}", i + 1))?;
        state = RunnerState::Solved(i);
        info!(
            "phase {} of {total}: solved, objective {} ({state:?})",
            i + 1,
            solution.objective
        );

        if i + 1 < total {
            state = RunnerState::CarryingForward(i);
            info!("phase {} of {total}: carrying decisions forward ({state:?})", i + 1);
            carry_forward(data, &model, &solution.values, years, tolerance);
        }

        outcomes.push(PhaseOutcome {
            years: years.clone(),
            model,
            values: solution.values,
        });
    }

    state = RunnerState::Done;
    info!("all {total} phases solved ({state:?})");
    Ok(outcomes)
}

/// Copy the committed decisions of a solved phase into the overlay.
///
/// Values within `tolerance` of zero are treated as zero so solver noise
/// does not accumulate across phases.
fn carry_forward(
    data: &mut ScenarioData,
    model: &Model,
    values: &[f64],
    years: &[Year],
    tolerance: f64,
) {
    let last_year = years.last().copied();
    let last_slice = data.sets.timeslices.last().cloned();
    let overlay = &mut data.params.carry_forward;

    for (col, key) in model.variables.keys().enumerate() {
        let value = values[col];
        match key {
            VarKey::NewCapacity(r, t, y) => {
                if value.abs() > tolerance {
                    overlay.record_new_capacity(r.clone(), t.clone(), *y, value);
                }
            }
            VarKey::NewStorageCapacity(r, s, y) => {
                if value.abs() > tolerance {
                    overlay
                        .new_storage_capacity
                        .entry((r.clone(), s.clone()))
                        .or_default()
                        .push((*y, value));
                }
            }
            VarKey::LineBuilt(line, y) => {
                // Only a decided build is carried; declared lines stay driven
                // by TransmissionAvailable
                if value >= BUILD_THRESHOLD && !overlay.line_built.contains_key(line) {
                    overlay.line_built.insert(line.clone(), *y);
                }
            }
            VarKey::StorageLevel(r, s, l, y) => {
                if Some(*y) == last_year && Some(l) == last_slice.as_ref() {
                    overlay.storage_level.insert((r.clone(), s.clone()), value);
                }
            }
            _ => {}
        }
    }
}
