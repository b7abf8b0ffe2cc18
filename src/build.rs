//! Turning a loaded scenario into an optimization model.
//!
//! Variable declaration and per-region constraint generation are pure
//! functions of the index and the parameters, so per-region families run in
//! parallel and merge in declared region order. Cross-region families (line
//! rows and the trade clearing house) follow in a serial pass. Two runs over
//! identical inputs produce identical variable and constraint ordering.
use anyhow::Result;
use indexmap::IndexMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::id::RegionID;
use crate::index::{LineStatus, ModelIndex};
use crate::model::{Constraint, Model, VarDef, VarKey};
use crate::scenario::ScenarioData;

pub mod capacity;
pub mod costs;
pub mod energy;
pub mod storage;
pub mod transmission;

/// How trade between regions is represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransmissionTopology {
    /// Regions are islands
    #[default]
    None,
    /// Explicit lines with capacities, losses and build decisions
    Pairwise,
    /// A clearing house balances net imports, bounded by trade routes
    Transshipment,
}

/// Build-time options, a subset of the run options.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildOptions {
    /// Trade representation
    pub transmission: TransmissionTopology,
    /// Whether line build decisions are integer
    pub discrete_transmission: bool,
    /// Only instantiate variables referenced by a constraint or the objective
    pub restrict_vars: bool,
}

/// Shared read-only state for the generator functions
pub(crate) struct Ctx<'a> {
    pub data: &'a ScenarioData,
    pub index: &'a ModelIndex,
    pub topology: TransmissionTopology,
    /// First modeled year of the whole run (discounting base)
    pub first_year: crate::id::Year,
    /// Last modeled year of the whole run (salvage horizon)
    pub last_year: crate::id::Year,
}

/// Build the complete model for one phase.
pub fn build_model(
    data: &ScenarioData,
    index: &ModelIndex,
    options: &BuildOptions,
) -> Result<Model> {
    let first_year = data.sets.first_year().unwrap_or(0);
    let last_year = data.sets.years.last().copied().unwrap_or(0);
    let ctx = Ctx {
        data,
        index,
        topology: options.transmission,
        first_year,
        last_year,
    };

    let candidates = declare_variables(&ctx, options.discrete_transmission);

    let regions: Vec<RegionID> = data.sets.regions.iter().cloned().collect();
    let mut constraints: Vec<Constraint> = regions
        .par_iter()
        .map(|r| region_rows(&ctx, r))
        .collect::<Vec<_>>()
        .into_iter()
        .flatten()
        .collect();

    // Cross-region coupling generates serially
    constraints.extend(transmission::line_rows(&ctx));
    constraints.extend(energy::clearing_rows(&ctx));

    let mut objective = IndexMap::new();
    for r in &data.sets.regions {
        for y in &index.years {
            objective.insert(VarKey::TotalDiscountedCost(r.clone(), *y), 1.0);
        }
    }

    Model::finalise(
        candidates,
        constraints,
        objective,
        index.years.clone(),
        options.restrict_vars,
    )
}

/// Every per-region constraint family, in a fixed order
fn region_rows(ctx: &Ctx, r: &RegionID) -> Vec<Constraint> {
    let mut rows = capacity::rows(ctx, r);
    rows.extend(energy::rows(ctx, r));
    rows.extend(storage::rows(ctx, r));
    rows.extend(costs::technology_rows(ctx, r));
    rows.extend(costs::storage_rows(ctx, r));
    rows.extend(transmission::cost_rows(ctx, r));
    rows.extend(costs::identity_rows(ctx, r));
    rows
}

/// Declare every candidate variable tuple, family by family, in deterministic
/// declared-set order.
fn declare_variables(ctx: &Ctx, discrete: bool) -> IndexMap<VarKey, VarDef> {
    let data = ctx.data;
    let index = ctx.index;
    let sets = &data.sets;
    let years = &index.years;
    let mut vars = IndexMap::new();

    for r in &sets.regions {
        for t in &index.technologies[r] {
            for y in years {
                vars.insert(
                    VarKey::NewCapacity(r.clone(), t.clone(), *y),
                    VarDef::non_negative(),
                );
            }
        }
    }
    for r in &sets.regions {
        for t in &index.technologies[r] {
            for y in years {
                vars.insert(
                    VarKey::TotalCapacity(r.clone(), t.clone(), *y),
                    VarDef::non_negative(),
                );
            }
        }
    }
    for r in &sets.regions {
        for l in &sets.timeslices {
            for tm in &index.operable[r] {
                for y in years {
                    vars.insert(
                        VarKey::Activity(
                            r.clone(),
                            l.clone(),
                            tm.technology.clone(),
                            tm.mode.clone(),
                            *y,
                        ),
                        VarDef::non_negative(),
                    );
                }
            }
        }
    }
    for r in &sets.regions {
        for l in &sets.timeslices {
            for f in &index.tracked_fuels[r] {
                for y in years {
                    vars.insert(
                        VarKey::Production(r.clone(), l.clone(), f.clone(), *y),
                        VarDef::non_negative(),
                    );
                    vars.insert(
                        VarKey::Use(r.clone(), l.clone(), f.clone(), *y),
                        VarDef::non_negative(),
                    );
                }
            }
        }
    }

    for r in &sets.regions {
        for s in &index.storages[r] {
            for l in &sets.timeslices {
                for y in years {
                    vars.insert(
                        VarKey::StorageCharge(r.clone(), s.clone(), l.clone(), *y),
                        VarDef::non_negative(),
                    );
                    vars.insert(
                        VarKey::StorageDischarge(r.clone(), s.clone(), l.clone(), *y),
                        VarDef::non_negative(),
                    );
                    vars.insert(
                        VarKey::StorageLevel(r.clone(), s.clone(), l.clone(), *y),
                        VarDef::non_negative(),
                    );
                }
            }
            for y in years {
                vars.insert(
                    VarKey::NewStorageCapacity(r.clone(), s.clone(), *y),
                    VarDef::non_negative(),
                );
                vars.insert(
                    VarKey::StorageCapacity(r.clone(), s.clone(), *y),
                    VarDef::non_negative(),
                );
            }
        }
    }

    if ctx.topology == TransmissionTopology::Pairwise {
        for line in sets.lines.keys() {
            for l in &sets.timeslices {
                for y in years {
                    if index.lines.contains_key(&(line.clone(), *y)) {
                        vars.insert(
                            VarKey::LineFlow(line.clone(), l.clone(), *y),
                            VarDef::free(),
                        );
                    }
                }
            }
        }
        for line in sets.lines.keys() {
            for y in years {
                let def = match index.lines.get(&(line.clone(), *y)) {
                    Some(LineStatus::Existing) => VarDef::bounded(1.0, 1.0),
                    Some(LineStatus::Buildable) => VarDef::build_decision(discrete),
                    None => continue,
                };
                vars.insert(VarKey::LineBuilt(line.clone(), *y), def);
            }
        }
        for line in sets.lines.keys() {
            for l in &sets.timeslices {
                for y in years {
                    if index.lines.contains_key(&(line.clone(), *y)) {
                        vars.insert(
                            VarKey::LineEnergy(line.clone(), l.clone(), *y),
                            VarDef::non_negative(),
                        );
                    }
                }
            }
        }
    }

    if ctx.topology == TransmissionTopology::Transshipment {
        for r in &sets.regions {
            for f in &index.tracked_fuels[r] {
                for l in &sets.timeslices {
                    for y in years {
                        let ys = data.params.year_split.get(&(l.clone(), *y));
                        let import_cap: f64 = sets
                            .regions
                            .iter()
                            .map(|rr| {
                                data.params
                                    .trade_route
                                    .get(&(rr.clone(), r.clone(), f.clone(), *y))
                            })
                            .sum();
                        let export_cap: f64 = sets
                            .regions
                            .iter()
                            .map(|rr| {
                                data.params
                                    .trade_route
                                    .get(&(r.clone(), rr.clone(), f.clone(), *y))
                            })
                            .sum();
                        vars.insert(
                            VarKey::NetImport(r.clone(), f.clone(), l.clone(), *y),
                            VarDef::bounded(-ys * export_cap, ys * import_cap),
                        );
                    }
                }
            }
        }
    }

    for r in &sets.regions {
        for e in &sets.emissions {
            for y in years {
                // Free: capture technologies with negative activity ratios
                // can push the total below zero
                vars.insert(
                    VarKey::AnnualEmissions(r.clone(), e.clone(), *y),
                    VarDef::free(),
                );
            }
        }
    }

    // Cost accounting variables are free: the defining equalities pin them,
    // and salvage credits can push totals negative
    for r in &sets.regions {
        for t in &index.technologies[r] {
            for y in years {
                for key in [
                    VarKey::CapitalInvestment(r.clone(), t.clone(), *y),
                    VarKey::DiscountedCapitalInvestment(r.clone(), t.clone(), *y),
                    VarKey::OperatingCost(r.clone(), t.clone(), *y),
                    VarKey::DiscountedOperatingCost(r.clone(), t.clone(), *y),
                    VarKey::SalvageValue(r.clone(), t.clone(), *y),
                    VarKey::DiscountedSalvageValue(r.clone(), t.clone(), *y),
                    VarKey::AnnualEmissionsPenalty(r.clone(), t.clone(), *y),
                    VarKey::DiscountedEmissionsPenalty(r.clone(), t.clone(), *y),
                    VarKey::TotalDiscountedCostByTechnology(r.clone(), t.clone(), *y),
                ] {
                    vars.insert(key, VarDef::free());
                }
            }
        }
    }
    for r in &sets.regions {
        for s in &index.storages[r] {
            for y in years {
                for key in [
                    VarKey::CapitalInvestmentStorage(r.clone(), s.clone(), *y),
                    VarKey::DiscountedCapitalInvestmentStorage(r.clone(), s.clone(), *y),
                    VarKey::SalvageValueStorage(r.clone(), s.clone(), *y),
                    VarKey::DiscountedSalvageValueStorage(r.clone(), s.clone(), *y),
                    VarKey::TotalDiscountedStorageCost(r.clone(), s.clone(), *y),
                ] {
                    vars.insert(key, VarDef::free());
                }
            }
        }
    }
    if ctx.topology == TransmissionTopology::Pairwise {
        for r in &sets.regions {
            for y in years {
                vars.insert(
                    VarKey::TotalDiscountedTransmissionCost(r.clone(), *y),
                    VarDef::free(),
                );
            }
        }
    }
    for r in &sets.regions {
        for y in years {
            vars.insert(VarKey::TotalDiscountedCost(r.clone(), *y), VarDef::free());
        }
    }

    vars
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::loaded_scenario;
    use crate::fixture::YEARS;
    use crate::model::VariableFamily;
    use crate::store::Store;
    use rstest::rstest;
    use tempfile::TempDir;

    fn pairwise() -> BuildOptions {
        BuildOptions {
            transmission: TransmissionTopology::Pairwise,
            ..Default::default()
        }
    }

    #[rstest]
    fn test_build_is_deterministic(loaded_scenario: (TempDir, Store, ScenarioData)) {
        let (_dir, _store, data) = loaded_scenario;
        let index = ModelIndex::build(&data, &YEARS).unwrap();

        let a = build_model(&data, &index, &pairwise()).unwrap();
        let b = build_model(&data, &index, &pairwise()).unwrap();

        let cols_a: Vec<_> = a.variables.keys().collect();
        let cols_b: Vec<_> = b.variables.keys().collect();
        assert_eq!(cols_a, cols_b);
        assert_eq!(a.constraints.len(), b.constraints.len());
        for (ca, cb) in a.constraints.iter().zip(&b.constraints) {
            assert_eq!(ca.family, cb.family);
            assert_eq!(ca.terms, cb.terms);
        }
    }

    #[rstest]
    fn test_objective_sums_regional_cost(loaded_scenario: (TempDir, Store, ScenarioData)) {
        let (_dir, _store, data) = loaded_scenario;
        let index = ModelIndex::build(&data, &YEARS).unwrap();
        let model = build_model(&data, &index, &BuildOptions::default()).unwrap();

        // One objective term per (region, year), all with unit weight
        assert_eq!(model.objective.len(), 2 * YEARS.len());
        assert!(model.objective.values().all(|c| *c == 1.0));
        assert!(model
            .objective
            .keys()
            .all(|k| k.family() == VariableFamily::TotalDiscountedCost));
    }

    #[rstest]
    fn test_annual_emissions_are_unbounded_below(
        loaded_scenario: (TempDir, Store, ScenarioData),
    ) {
        let (_dir, _store, data) = loaded_scenario;
        let index = ModelIndex::build(&data, &YEARS).unwrap();
        let model = build_model(&data, &index, &BuildOptions::default()).unwrap();

        // Capture technologies carry negative activity ratios, so the annual
        // total must be allowed below zero
        let def = &model.variables[&VarKey::AnnualEmissions("north".into(), "co2".into(), 2020)];
        assert_eq!(def.lower, f64::NEG_INFINITY);
        assert_eq!(def.upper, f64::INFINITY);
    }

    #[rstest]
    fn test_topology_gates_trade_variables(loaded_scenario: (TempDir, Store, ScenarioData)) {
        let (_dir, _store, data) = loaded_scenario;
        let index = ModelIndex::build(&data, &YEARS).unwrap();

        let none = build_model(&data, &index, &BuildOptions::default()).unwrap();
        assert!(!none
            .variables
            .keys()
            .any(|k| matches!(k.family(), VariableFamily::LineFlow | VariableFamily::NetImport)));

        let pairwise = build_model(&data, &index, &pairwise()).unwrap();
        assert!(pairwise
            .variables
            .keys()
            .any(|k| k.family() == VariableFamily::LineFlow));
        assert!(!pairwise
            .variables
            .keys()
            .any(|k| k.family() == VariableFamily::NetImport));
    }

    #[rstest]
    fn test_discrete_transmission_marks_build_integer(
        loaded_scenario: (TempDir, Store, ScenarioData),
    ) {
        let (_dir, _store, data) = loaded_scenario;
        let index = ModelIndex::build(&data, &YEARS).unwrap();
        let options = BuildOptions {
            transmission: TransmissionTopology::Pairwise,
            discrete_transmission: true,
            ..Default::default()
        };
        let model = build_model(&data, &index, &options).unwrap();

        // The fixture's line is declared available, so its build variable is
        // fixed at 1 rather than integer
        for (key, def) in &model.variables {
            if key.family() == VariableFamily::LineBuilt {
                assert_eq!(def.lower, 1.0);
                assert_eq!(def.upper, 1.0);
            }
        }
    }

    #[rstest]
    fn test_restrict_vars_drops_unreferenced_tuples(
        loaded_scenario: (TempDir, Store, ScenarioData),
    ) {
        let (_dir, _store, data) = loaded_scenario;
        let index = ModelIndex::build(&data, &YEARS).unwrap();

        let full = build_model(&data, &index, &pairwise()).unwrap();
        let restricted = build_model(
            &data,
            &index,
            &BuildOptions {
                transmission: TransmissionTopology::Pairwise,
                restrict_vars: true,
                ..Default::default()
            },
        )
        .unwrap();

        assert!(restricted.variables.len() <= full.variables.len());
        // Restriction preserves relative column order
        let full_order: Vec<_> = full
            .variables
            .keys()
            .filter(|k| restricted.variables.contains_key(*k))
            .collect();
        let restricted_order: Vec<_> = restricted.variables.keys().collect();
        assert_eq!(full_order, restricted_order);
    }
}
