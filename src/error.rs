//! The error taxonomy for scenario solves.
//!
//! Errors propagate through `anyhow` as elsewhere in the codebase, but the
//! failures a caller may want to react to programmatically are raised as
//! [`EngineError`] values so they can be recovered by downcasting.
use serde::Serialize;
use thiserror::Error;

/// A failure raised by the engine while loading, building or solving.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Missing or malformed scenario input. Raised before any solve attempt.
    #[error("data error: {0}")]
    Data(String),

    /// An internal invariant of the model builder was violated.
    ///
    /// This always indicates a defect in the builder (e.g. a constraint
    /// referencing a variable tuple the index builder never declared).
    #[error("model construction error: {0}")]
    ModelConstruction(String),

    /// The solver reported the model infeasible.
    #[error("model is infeasible ({context})")]
    Infeasible {
        /// Phase and year-range context for the failing solve
        context: String,
    },

    /// The solver reported the model unbounded.
    #[error("model is unbounded ({context})")]
    Unbounded {
        /// Phase and year-range context for the failing solve
        context: String,
    },

    /// The solver stopped at its time limit.
    #[error("solver reached its time limit ({context})")]
    TimeLimit {
        /// Phase and year-range context for the failing solve
        context: String,
        /// Best objective bound reported by the solver, if any
        best_bound: Option<f64>,
    },

    /// The requested solver is unknown or cannot be used for this run.
    ///
    /// Raised at configuration time, before any model is built.
    #[error("solver '{0}' is not available: {1}")]
    SolverUnavailable(String, String),

    /// A storage I/O failure. Callers may retry a bounded number of times.
    #[error("store I/O error: {0}")]
    StoreIO(String),
}

impl EngineError {
    /// Shorthand for a [`EngineError::Data`] error
    pub fn data(msg: impl Into<String>) -> Self {
        Self::Data(msg.into())
    }

    /// Shorthand for a [`EngineError::ModelConstruction`] error
    pub fn model(msg: impl Into<String>) -> Self {
        Self::ModelConstruction(msg.into())
    }
}

impl From<csv::Error> for EngineError {
    fn from(err: csv::Error) -> Self {
        Self::StoreIO(err.to_string())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        Self::StoreIO(err.to_string())
    }
}

/// The outcome of a solve, as reported to callers and written to logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SolveStatus {
    /// Every phase solved to optimality
    Optimal,
    /// A phase was infeasible
    Infeasible,
    /// A phase was unbounded
    Unbounded,
    /// The solver stopped at its time limit
    TimeLimit,
    /// The configured solver is not available
    SolverUnavailable,
    /// The scenario input was missing or malformed
    DataError,
}

impl SolveStatus {
    /// Recover a status from an error produced by a solve entry point.
    ///
    /// Errors outside the taxonomy (I/O failures and builder defects included)
    /// are reported as [`SolveStatus::DataError`], the catch-all for "no usable
    /// solution exists".
    pub fn from_error(err: &anyhow::Error) -> Self {
        match err.downcast_ref::<EngineError>() {
            Some(EngineError::Infeasible { .. }) => Self::Infeasible,
            Some(EngineError::Unbounded { .. }) => Self::Unbounded,
            Some(EngineError::TimeLimit { .. }) => Self::TimeLimit,
            Some(EngineError::SolverUnavailable(..)) => Self::SolverUnavailable,
            _ => Self::DataError,
        }
    }
}
