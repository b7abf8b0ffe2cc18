//! Transmission line capacity, build and cost constraints.
use super::{costs::discount_factor, Ctx, TransmissionTopology};
use crate::id::RegionID;
use crate::index::LineStatus;
use crate::model::{Constraint, ConstraintFamily, VarKey};

/// Per-line rows: flow capacity gated on the build state, the energy
/// magnitude pair, and build monotonicity across years. Cross-region, so
/// generated serially.
pub(crate) fn line_rows(ctx: &Ctx) -> Vec<Constraint> {
    if ctx.topology != TransmissionTopology::Pairwise {
        return Vec::new();
    }
    let data = ctx.data;
    let index = ctx.index;
    let mut rows = Vec::new();

    for line in data.sets.lines.keys() {
        let cap = data.params.transmission_capacity.get(line);
        let mut prev_built: Option<VarKey> = None;
        for y in &index.years {
            let Some(status) = index.lines.get(&(line.clone(), *y)) else {
                prev_built = None;
                continue;
            };
            let built = VarKey::LineBuilt(line.clone(), *y);

            for l in &data.sets.timeslices {
                let flow = VarKey::LineFlow(line.clone(), l.clone(), *y);
                let energy = VarKey::LineEnergy(line.clone(), l.clone(), *y);
                rows.push(Constraint::at_most(
                    ConstraintFamily::LineCapacityPositive,
                    vec![(flow.clone(), 1.0), (built.clone(), -cap)],
                    0.0,
                ));
                rows.push(Constraint::at_most(
                    ConstraintFamily::LineCapacityNegative,
                    vec![(flow.clone(), -1.0), (built.clone(), -cap)],
                    0.0,
                ));
                rows.push(Constraint::at_least(
                    ConstraintFamily::LineEnergyPositive,
                    vec![(energy.clone(), 1.0), (flow.clone(), -1.0)],
                    0.0,
                ));
                rows.push(Constraint::at_least(
                    ConstraintFamily::LineEnergyNegative,
                    vec![(energy, 1.0), (flow, 1.0)],
                    0.0,
                ));
            }

            // A built line stays built
            if *status == LineStatus::Buildable {
                if let Some(prev) = &prev_built {
                    rows.push(Constraint::at_least(
                        ConstraintFamily::LineBuildMonotonic,
                        vec![(built.clone(), 1.0), (prev.clone(), -1.0)],
                        0.0,
                    ));
                }
            }
            prev_built = Some(built);
        }
    }

    rows
}

/// A region's share of transmission costs: half of each incident line's
/// discounted build cost plus discounted flow cost.
pub(crate) fn cost_rows(ctx: &Ctx, r: &RegionID) -> Vec<Constraint> {
    if ctx.topology != TransmissionTopology::Pairwise {
        return Vec::new();
    }
    let data = ctx.data;
    let index = ctx.index;
    let params = &data.params;
    let rate = params.discount_rate.get(r);
    let mut rows = Vec::new();

    for y in &index.years {
        let mut terms = vec![(
            VarKey::TotalDiscountedTransmissionCost(r.clone(), *y),
            1.0,
        )];
        let mut rhs = 0.0;

        for (line_id, line) in &data.sets.lines {
            if &line.region1 != r && &line.region2 != r {
                continue;
            }
            let Some(status) = index.lines.get(&(line_id.clone(), *y)) else {
                continue;
            };

            // Build cost on the increment of the build decision; declared
            // lines incur none
            if *status == LineStatus::Buildable {
                let build_cost = params.transmission_capital_cost.get(&(line_id.clone(), *y))
                    * params.transmission_capacity.get(line_id);
                if build_cost != 0.0 {
                    let df = discount_factor(rate, *y, ctx.first_year, 0.0);
                    let coeff = -0.5 * build_cost / df;
                    terms.push((VarKey::LineBuilt(line_id.clone(), *y), coeff));
                    match index.lines.get(&(line_id.clone(), y - 1)) {
                        Some(LineStatus::Buildable) => {
                            terms.push((VarKey::LineBuilt(line_id.clone(), y - 1), -coeff));
                        }
                        // An already-existing prior year folds a constant
                        // increment of -1 into the right-hand side
                        Some(LineStatus::Existing) => rhs += coeff,
                        None => {}
                    }
                }
            }

            let flow_cost = params.variable_cost_transmission.get(&(line_id.clone(), *y));
            if flow_cost != 0.0 {
                let df = discount_factor(rate, *y, ctx.first_year, 0.5);
                for l in &data.sets.timeslices {
                    terms.push((
                        VarKey::LineEnergy(line_id.clone(), l.clone(), *y),
                        -0.5 * flow_cost / df,
                    ));
                }
            }
        }

        rows.push(Constraint::equality(
            ConstraintFamily::TransmissionCostDefinition,
            terms,
            rhs,
        ));
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::super::{build_model, BuildOptions};
    use super::*;
    use crate::fixture::{loaded_scenario, write_table, YEARS};
    use crate::index::ModelIndex;
    use crate::scenario::ScenarioData;
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
    fn test_flow_capacity_is_gated_on_build_state(
        loaded_scenario: (TempDir, Store, ScenarioData),
    ) {
        let (_dir, _store, data) = loaded_scenario;
        let index = ModelIndex::build(&data, &YEARS).unwrap();
        let model = build_model(&data, &index, &pairwise()).unwrap();

        let flow = VarKey::LineFlow("north_south".into(), "day".into(), 2020);
        let built = VarKey::LineBuilt("north_south".into(), 2020);
        assert!(model.constraints.iter().any(|c| {
            c.family == ConstraintFamily::LineCapacityPositive
                && c.terms.contains(&(flow.clone(), 1.0))
                && c.terms.contains(&(built.clone(), -5.0))
        }));
        assert!(model.constraints.iter().any(|c| {
            c.family == ConstraintFamily::LineCapacityNegative
                && c.terms.contains(&(flow.clone(), -1.0))
        }));
    }

    #[rstest]
    fn test_buildable_line_is_monotone_and_costed(
        loaded_scenario: (TempDir, Store, ScenarioData),
    ) {
        let (_dir, store, data) = loaded_scenario;
        // Make the line a build decision instead of a declared asset
        write_table(&store, "TransmissionAvailable", &[]);
        let buildable: Vec<String> = YEARS
            .iter()
            .map(|y| format!("north_south,{y},1"))
            .collect();
        write_table(&store, "TransmissionBuildable", &buildable);
        write_table(
            &store,
            "TransmissionCapitalCost",
            &YEARS.iter().map(|y| format!("north_south,{y},40")).collect::<Vec<_>>(),
        );
        drop(data);
        let data = ScenarioData::load(&store).unwrap();
        let index = ModelIndex::build(&data, &YEARS).unwrap();
        let model = build_model(&data, &index, &pairwise()).unwrap();

        let monotone: Vec<_> = model
            .constraints
            .iter()
            .filter(|c| c.family == ConstraintFamily::LineBuildMonotonic)
            .collect();
        assert_eq!(monotone.len(), 2);

        // Each region's 2020 cost row carries half the 40 * 5 build cost
        let row = model
            .constraints
            .iter()
            .find(|c| {
                c.family == ConstraintFamily::TransmissionCostDefinition
                    && c.terms[0]
                        == (
                            VarKey::TotalDiscountedTransmissionCost("north".into(), 2020),
                            1.0,
                        )
            })
            .unwrap();
        assert!(row
            .terms
            .contains(&(VarKey::LineBuilt("north_south".into(), 2020), -100.0)));
    }

    #[rstest]
    fn test_declared_line_has_zero_cost_terms(loaded_scenario: (TempDir, Store, ScenarioData)) {
        let (_dir, _store, data) = loaded_scenario;
        let index = ModelIndex::build(&data, &YEARS).unwrap();
        let model = build_model(&data, &index, &pairwise()).unwrap();

        // The fixture line is declared available with no costs, so every
        // transmission cost row pins the variable to zero
        for row in model
            .constraints
            .iter()
            .filter(|c| c.family == ConstraintFamily::TransmissionCostDefinition)
        {
            assert_eq!(row.terms.len(), 1);
            assert_eq!(row.lower, 0.0);
        }
    }
}
