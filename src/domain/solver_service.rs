// Domain service interface for solving models in process
// Defines the contract that any solver implementation must follow (Dependency Inversion Principle)

use super::model::{Model, ModelError, VarId};
use super::value_objects::TerminationCondition;
use crate::repn::{CanonicalModel, CanonicalOptions};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Error types for the solver service
#[derive(Debug, thiserror::Error)]
pub enum SolverError {
    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Solver not available: {0}")]
    SolverNotAvailable(String),

    #[error("Solver execution failed: {0}")]
    ExecutionFailed(String),

    #[error("No solution to load, the solver stopped with: {0}")]
    NoSolution(TerminationCondition),
}

pub type Result<T> = std::result::Result<T, SolverError>;

/// Available solver backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverBackend {
    /// HiGHS when compiled in, CBC otherwise
    #[default]
    Auto,
    Highs,
    CoinCbc,
}

impl fmt::Display for SolverBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverBackend::Auto => write!(f, "auto"),
            SolverBackend::Highs => write!(f, "highs"),
            SolverBackend::CoinCbc => write!(f, "cbc"),
        }
    }
}

impl FromStr for SolverBackend {
    type Err = SolverError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(SolverBackend::Auto),
            "highs" => Ok(SolverBackend::Highs),
            "cbc" | "coin_cbc" | "coin-cbc" => Ok(SolverBackend::CoinCbc),
            other => Err(SolverError::SolverNotAvailable(other.to_string())),
        }
    }
}

/// Outcome of one solve
#[derive(Debug, Clone, PartialEq)]
pub struct SolveResults {
    pub termination_condition: TerminationCondition,
    pub best_feasible_objective: Option<f64>,
    pub best_objective_bound: Option<f64>,
    pub solver_name: String,
    pub wallclock_ms: f64,
    /// Primal values of the variables the solver saw
    pub values: BTreeMap<VarId, f64>,
}

impl SolveResults {
    pub fn new(solver_name: impl Into<String>, termination_condition: TerminationCondition) -> Self {
        Self {
            termination_condition,
            best_feasible_objective: None,
            best_objective_bound: None,
            solver_name: solver_name.into(),
            wallclock_ms: 0.0,
            values: BTreeMap::new(),
        }
    }

    /// Copy the primal values into the model's variables
    pub fn load_solution(&self, model: &mut Model) -> Result<()> {
        if !self.termination_condition.has_solution() || self.values.is_empty() {
            return Err(SolverError::NoSolution(self.termination_condition));
        }
        for (id, value) in &self.values {
            model.set_value(*id, *value)?;
        }
        Ok(())
    }
}

/// Canonical form handed to the solver backends; built again on every solve
/// so parameter changes and fixed variables are picked up
pub fn canonicalize(model: &Model) -> Result<CanonicalModel> {
    let options = CanonicalOptions {
        skip_trivial_constraints: true,
        ..CanonicalOptions::default()
    };
    Ok(CanonicalModel::build(model, &options)?)
}

/// Domain service interface for in-process solvers
///
/// Backends receive the model, canonicalize it and report results keyed by
/// variable, so callers never depend on a concrete solver API.
pub trait SolverService: Send + Sync {
    /// Solve the active part of `model`
    fn solve(&self, model: &Model) -> Result<SolveResults>;

    /// Check that a canonical model fits this backend
    fn validate(&self, canonical: &CanonicalModel) -> Result<()> {
        let mut errors = Vec::new();

        if canonical.objectives.len() > 1 {
            errors.push(format!(
                "{} active objectives, at most one is supported",
                canonical.objectives.len()
            ));
        }
        for objective in &canonical.objectives {
            if !objective.repn.is_linear() {
                errors.push(format!("objective '{}' is not linear", objective.name));
            }
        }
        for row in &canonical.rows {
            if !row.repn.is_linear() {
                errors.push(format!("constraint '{}' is not linear", row.name));
            }
        }
        if !self.supports_integer() && canonical.has_discrete_columns() {
            errors.push(format!("{} does not support discrete variables", self.name()));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(SolverError::InvalidModel(errors.join("; ")))
        }
    }

    /// Get the name of this solver backend
    fn name(&self) -> &str;

    /// Whether the backend can be used in this build
    fn available(&self) -> bool;

    /// Check if this solver supports mixed-integer programming
    fn supports_integer(&self) -> bool;
}
