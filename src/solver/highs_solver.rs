// HiGHS Solver Adapter
// Implements the SolverService interface for HiGHS
// This is an adapter pattern - translates canonical models to the HiGHS API

use super::{objective_value, trivial_results};
use crate::domain::{
    model::Model,
    solver_service::{canonicalize, Result, SolveResults, SolverService},
    value_objects::{ObjectiveSense, TerminationCondition},
};
use crate::repn::CanonicalColumn;
use highs::{HighsModelStatus, RowProblem, Sense};
use std::time::Instant;
use tracing::{debug, info, warn};

/// HiGHS through its row-wise problem builder
///
/// Nothing is cached between calls: every solve canonicalizes the model
/// again, so mutable parameters, fixed variables and removed constraints
/// always reach the solver.
pub struct HighsSolver {
    warm_start: bool,
}

impl HighsSolver {
    pub fn new() -> Self {
        Self { warm_start: false }
    }

    /// Hand the current variable values to HiGHS as a starting point
    pub fn with_warm_start(mut self, enabled: bool) -> Self {
        self.warm_start = enabled;
        self
    }
}

/// Starting value for a column: its current value, or zero, moved inside its bounds
fn start_value(column: &CanonicalColumn) -> f64 {
    let value = column.value.unwrap_or(0.0);
    let value = column.lower.map_or(value, |lower| value.max(lower));
    column.upper.map_or(value, |upper| value.min(upper))
}

impl Default for HighsSolver {
    fn default() -> Self {
        Self::new()
    }
}

fn termination(status: HighsModelStatus) -> TerminationCondition {
    match status {
        HighsModelStatus::Optimal => TerminationCondition::Optimal,
        HighsModelStatus::Infeasible => TerminationCondition::Infeasible,
        HighsModelStatus::Unbounded => TerminationCondition::Unbounded,
        HighsModelStatus::UnboundedOrInfeasible => TerminationCondition::InfeasibleOrUnbounded,
        HighsModelStatus::ReachedTimeLimit => TerminationCondition::MaxTimeLimit,
        HighsModelStatus::ReachedIterationLimit => TerminationCondition::IterationLimit,
        status => {
            warn!(?status, "unexpected HiGHS model status");
            TerminationCondition::Unknown
        }
    }
}

impl SolverService for HighsSolver {
    fn solve(&self, model: &Model) -> Result<SolveResults> {
        let canonical = canonicalize(model)?;
        self.validate(&canonical)?;

        let start_time = Instant::now();
        if canonical.columns.is_empty() {
            debug!(model = model.name(), "no free variables, skipping HiGHS");
            return Ok(trivial_results(self.name(), &canonical));
        }

        let mut pb = RowProblem::default();
        let mut costs = vec![0.0; canonical.columns.len()];
        let objective = canonical.objectives.first();
        if let Some(objective) = objective {
            for (id, coef) in &objective.repn.linear {
                if let Some(position) = canonical.column_position(*id) {
                    costs[position] = *coef;
                }
            }
        }

        // Add variables
        let mut cols = Vec::with_capacity(canonical.columns.len());
        for (column, cost) in canonical.columns.iter().zip(costs) {
            let lower = column.lower.unwrap_or(f64::NEG_INFINITY);
            let upper = column.upper.unwrap_or(f64::INFINITY);
            let col = if column.domain.is_integer() {
                pb.add_integer_column(cost, lower..=upper)
            } else {
                pb.add_column(cost, lower..=upper)
            };
            cols.push(col);
        }

        // Add constraints
        for row in &canonical.rows {
            let mut terms = Vec::with_capacity(row.repn.linear.len());
            for (id, coef) in &row.repn.linear {
                if let Some(position) = canonical.column_position(*id) {
                    terms.push((cols[position], *coef));
                }
            }
            let lower = row.lower.unwrap_or(f64::NEG_INFINITY);
            let upper = row.upper.unwrap_or(f64::INFINITY);
            pb.add_row(lower..=upper, &terms);
        }

        let sense = match objective.map(|o| o.sense) {
            Some(ObjectiveSense::Maximize) => Sense::Maximise,
            _ => Sense::Minimise,
        };
        let mut highs_model = pb.optimise(sense);
        if self.warm_start && canonical.columns.iter().any(|c| c.value.is_some()) {
            let start: Vec<f64> = canonical.columns.iter().map(start_value).collect();
            debug!(columns = start.len(), "passing start values to HiGHS");
            if let Err(status) = highs_model.try_set_solution(Some(&start), None, None, None) {
                warn!(?status, "HiGHS rejected the start values");
            }
        }
        let solved = highs_model.solve();

        let mut results = SolveResults::new(self.name(), termination(solved.status()));
        results.wallclock_ms = start_time.elapsed().as_secs_f64() * 1000.0;
        if results.termination_condition.has_solution() {
            let solution = solved.get_solution();
            let values = solution.columns();
            results.best_feasible_objective = objective_value(&canonical, values);
            if results.termination_condition == TerminationCondition::Optimal {
                results.best_objective_bound = results.best_feasible_objective;
            }
            results.values = canonical
                .columns
                .iter()
                .zip(values)
                .map(|(column, value)| (column.id, *value))
                .collect();
        }

        info!(
            solver = self.name(),
            model = model.name(),
            columns = canonical.columns.len(),
            rows = canonical.rows.len(),
            termination = %results.termination_condition,
            "solve finished"
        );
        Ok(results)
    }

    fn name(&self) -> &str {
        "HiGHS"
    }

    fn available(&self) -> bool {
        true
    }

    fn supports_integer(&self) -> bool {
        true
    }
}
