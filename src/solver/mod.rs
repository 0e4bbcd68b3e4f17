// Solver adapters: concrete implementations of SolverService

#[cfg(feature = "coin_cbc")]
pub mod coin_cbc_solver;
pub mod factory;
#[cfg(feature = "highs")]
pub mod highs_solver;

#[cfg(feature = "coin_cbc")]
pub use coin_cbc_solver::CoinCbcSolver;
pub use factory::SolverFactory;
#[cfg(feature = "highs")]
pub use highs_solver::HighsSolver;

use crate::domain::solver_service::SolveResults;
use crate::domain::value_objects::TerminationCondition;
use crate::repn::CanonicalModel;

/// Objective value of a column solution, constant included
pub(crate) fn objective_value(canonical: &CanonicalModel, columns: &[f64]) -> Option<f64> {
    let objective = canonical.objectives.first()?;
    let mut value = objective.repn.constant;
    for (id, coef) in &objective.repn.linear {
        value += coef * columns[canonical.column_position(*id)?];
    }
    Some(value)
}

/// Results for a model without free variables: nothing is left to decide
pub(crate) fn trivial_results(solver_name: &str, canonical: &CanonicalModel) -> SolveResults {
    let mut results = SolveResults::new(solver_name, TerminationCondition::Optimal);
    results.best_feasible_objective = objective_value(canonical, &[]);
    results.best_objective_bound = results.best_feasible_objective;
    results
}
