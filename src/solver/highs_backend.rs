//! The HiGHS backend.
use anyhow::{anyhow, Result};
use highs::{HighsModelStatus, RowProblem as Problem, Sense};

use super::{year_span, Solution, Solver, SolverOptions};
use crate::error::EngineError;
use crate::model::Model;

/// Solves through the bundled HiGHS library. Handles both LPs and MIPs.
#[derive(Debug)]
pub struct HighsSolver;

impl Solver for HighsSolver {
    fn id(&self) -> &'static str {
        "highs"
    }

    fn supports_integer(&self) -> bool {
        true
    }

    fn solve(&self, model: &Model, options: &SolverOptions) -> Result<Solution> {
        let mut problem = Problem::default();

        // Columns in model order, so the returned primal values line up
        let columns: Vec<highs::Col> = model
            .variables
            .iter()
            .map(|(key, def)| {
                let coeff = model.objective.get(key).copied().unwrap_or(0.0);
                if def.integer {
                    problem.add_integer_column(coeff, def.lower..=def.upper)
                } else {
                    problem.add_column(coeff, def.lower..=def.upper)
                }
            })
            .collect();

        let mut terms = Vec::new();
        for constraint in &model.constraints {
            terms.extend(constraint.terms.iter().map(|(key, coeff)| {
                let col = model
                    .column_of(key)
                    .expect("constraint references unbuilt variable");
                (columns[col], *coeff)
            }));
            problem.add_row(constraint.lower..=constraint.upper, terms.drain(0..));
        }

        let mut highs_model = problem.optimise(Sense::Minimise);
        configure_logging(&mut highs_model);
        apply_options(&mut highs_model, options)?;

        let solved = highs_model.solve();
        let context = year_span(model);
        match solved.status() {
            HighsModelStatus::Optimal => {
                let values = solved.get_solution().columns().to_vec();
                // The objective is recomputed from the primal point rather
                // than read back from the solver
                let objective = model.objective_value(&values);
                Ok(Solution { values, objective })
            }
            HighsModelStatus::Infeasible => {
                Err(EngineError::Infeasible { context }.into())
            }
            HighsModelStatus::Unbounded | HighsModelStatus::UnboundedOrInfeasible => {
                Err(EngineError::Unbounded { context }.into())
            }
            HighsModelStatus::ReachedTimeLimit => {
                let values = solved.get_solution().columns().to_vec();
                Err(time_limit_error(model, &values, context).into())
            }
            status => Err(anyhow!("HiGHS terminated abnormally ({context}): {status:?}")),
        }
    }
}

/// A time-limit error carrying the incumbent objective, when HiGHS handed
/// back a usable primal point
fn time_limit_error(model: &Model, values: &[f64], context: String) -> EngineError {
    let usable =
        values.len() == model.variables.len() && values.iter().all(|v| v.is_finite());
    EngineError::TimeLimit {
        context,
        best_bound: usable.then(|| model.objective_value(values)),
    }
}

/// Route HiGHS console output according to the logger configuration
fn configure_logging(model: &mut highs::Model) {
    let quiet = std::env::var("OSPREY_LOG_LEVEL")
        .is_ok_and(|level| level.eq_ignore_ascii_case("off"));
    model.set_option("output_flag", !quiet);
    model.set_option("log_to_console", !quiet);
}

/// Apply the option bag to a HiGHS model
fn apply_options(model: &mut highs::Model, options: &SolverOptions) -> Result<()> {
    if let Some(limit) = options.time_limit {
        model.set_option("time_limit", limit);
    }
    if let Some(gap) = options.mip_rel_gap {
        model.set_option("mip_rel_gap", gap);
    }
    for (key, value) in &options.extra {
        match value {
            toml::Value::Integer(n) => model.set_option(key.as_str(), *n as i32),
            toml::Value::Float(x) => model.set_option(key.as_str(), *x),
            toml::Value::Boolean(b) => model.set_option(key.as_str(), *b),
            toml::Value::String(s) => model.set_option(key.as_str(), s.as_str()),
            other => {
                return Err(EngineError::data(format!(
                    "solver option '{key}' has unsupported value {other}"
                ))
                .into())
            }
        };
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Constraint, ConstraintFamily, VarDef, VarKey};
    use float_cmp::assert_approx_eq;
    use indexmap::{indexmap, IndexMap};

    fn var(t: &str) -> VarKey {
        VarKey::NewCapacity("north".into(), t.into(), 2020)
    }

    /// min 2x + 3y st x + y >= 4, x <= 3
    fn tiny_model() -> Model {
        let candidates = indexmap! {
            var("x") => VarDef::non_negative(),
            var("y") => VarDef::non_negative(),
        };
        let constraints = vec![
            Constraint::at_least(
                ConstraintFamily::EnergyBalance,
                vec![(var("x"), 1.0), (var("y"), 1.0)],
                4.0,
            ),
            Constraint::at_most(
                ConstraintFamily::MaxCapacity,
                vec![(var("x"), 1.0)],
                3.0,
            ),
        ];
        let objective = indexmap! { var("x") => 2.0, var("y") => 3.0 };
        Model::finalise(candidates, constraints, objective, vec![2020], false).unwrap()
    }

    #[test]
    fn test_solves_tiny_lp() {
        let model = tiny_model();
        let solution = HighsSolver
            .solve(&model, &SolverOptions::default())
            .unwrap();

        // Optimum: x = 3, y = 1
        assert_approx_eq!(f64, solution.values[0], 3.0);
        assert_approx_eq!(f64, solution.values[1], 1.0);
        assert_approx_eq!(f64, solution.objective, 9.0);
    }

    #[test]
    fn test_infeasible_maps_to_taxonomy() {
        let candidates = indexmap! { var("x") => VarDef::bounded(0.0, 1.0) };
        let constraints = vec![Constraint::at_least(
            ConstraintFamily::EnergyBalance,
            vec![(var("x"), 1.0)],
            2.0,
        )];
        let model =
            Model::finalise(candidates, constraints, IndexMap::new(), vec![2020], false).unwrap();

        let err = HighsSolver
            .solve(&model, &SolverOptions::default())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EngineError>(),
            Some(EngineError::Infeasible { .. })
        ));
        assert!(err.to_string().contains("year 2020"));
    }

    #[test]
    fn test_time_limit_carries_incumbent_objective() {
        let model = tiny_model();

        let err = time_limit_error(&model, &[3.0, 1.0], "year 2020".to_string());
        let EngineError::TimeLimit { best_bound, .. } = err else {
            panic!("expected a time-limit error");
        };
        assert_approx_eq!(f64, best_bound.unwrap(), 9.0);

        // An empty or partial primal point yields no bound
        let err = time_limit_error(&model, &[], "year 2020".to_string());
        assert!(matches!(
            err,
            EngineError::TimeLimit {
                best_bound: None,
                ..
            }
        ));
    }

    #[test]
    fn test_integer_column_is_respected() {
        // min x st x >= 0.3, x integer in [0, 2]
        let candidates = indexmap! {
            var("x") => VarDef { lower: 0.0, upper: 2.0, integer: true },
        };
        let constraints = vec![Constraint::at_least(
            ConstraintFamily::MinCapacity,
            vec![(var("x"), 1.0)],
            0.3,
        )];
        let objective = indexmap! { var("x") => 1.0 };
        let model =
            Model::finalise(candidates, constraints, objective, vec![2020], false).unwrap();

        let solution = HighsSolver
            .solve(&model, &SolverOptions::default())
            .unwrap();
        assert_approx_eq!(f64, solution.values[0], 1.0);
    }
}
