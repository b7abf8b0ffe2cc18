//! Solver dispatch.
//!
//! Backends implement [`Solver`] and are chosen by name through
//! [`create_solver`]. An unknown name fails at configuration time, before any
//! model is built. Backends translate the finalised [`Model`] into their own
//! representation and map their termination statuses onto the error taxonomy;
//! they never round solution values.
use anyhow::Result;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::model::Model;

pub mod highs_backend;

/// Options handed to the backend for one solve.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    /// Wall-clock limit in seconds
    pub time_limit: Option<f64>,
    /// Relative MIP gap at which the solver may stop
    pub mip_rel_gap: Option<f64>,
    /// Backend-specific options, passed through by key
    #[serde(flatten)]
    pub extra: IndexMap<String, toml::Value>,
}

/// A solved model: primal values aligned with the model's column order.
#[derive(Debug)]
pub struct Solution {
    /// One value per instantiated variable, in column order
    pub values: Vec<f64>,
    /// The objective value implied by the primal point
    pub objective: f64,
}

/// A linear-programming backend.
pub trait Solver: std::fmt::Debug {
    /// The name the factory resolves
    fn id(&self) -> &'static str;

    /// Whether the backend can handle integer variables
    fn supports_integer(&self) -> bool;

    /// Solve `model` to optimality or report why it could not
    fn solve(&self, model: &Model, options: &SolverOptions) -> Result<Solution>;
}

/// Resolve a solver by name.
pub fn create_solver(name: &str) -> Result<Box<dyn Solver>> {
    match name {
        "highs" => Ok(Box::new(highs_backend::HighsSolver)),
        other => Err(EngineError::SolverUnavailable(
            other.to_string(),
            "not a known solver backend".to_string(),
        )
        .into()),
    }
}

/// A human-readable description of the years a model covers, used in failure
/// context messages
pub(crate) fn year_span(model: &Model) -> String {
    match (model.years.first(), model.years.last()) {
        (Some(first), Some(last)) if first != last => format!("years {first}-{last}"),
        (Some(first), _) => format!("year {first}"),
        _ => "no years".to_string(),
    }
}
