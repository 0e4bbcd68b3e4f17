// COIN-OR CBC Solver Adapter
// Implements the SolverService interface through good_lp

use super::{objective_value, trivial_results};
use crate::domain::{
    model::Model,
    solver_service::{canonicalize, Result, SolveResults, SolverError, SolverService},
    value_objects::{ObjectiveSense, TerminationCondition},
};
use crate::repn::{CanonicalModel, StandardRepn};
use good_lp::{
    solvers::coin_cbc, variable, variables, Expression, ResolutionError,
    Solution as GoodLpSolutionTrait, SolverModel, Variable as GoodLpVariable,
};
use std::time::Instant;
use tracing::{debug, info};

pub struct CoinCbcSolver;

impl CoinCbcSolver {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CoinCbcSolver {
    fn default() -> Self {
        Self::new()
    }
}

fn linear_expression(
    canonical: &CanonicalModel,
    repn: &StandardRepn,
    lp_variables: &[GoodLpVariable],
) -> Expression {
    let mut expr: Expression = 0.into();
    for (id, coef) in &repn.linear {
        if let Some(position) = canonical.column_position(*id) {
            expr += *coef * lp_variables[position];
        }
    }
    expr
}

impl SolverService for CoinCbcSolver {
    fn solve(&self, model: &Model) -> Result<SolveResults> {
        let canonical = canonicalize(model)?;
        self.validate(&canonical)?;

        let start_time = Instant::now();
        if canonical.columns.is_empty() {
            debug!(model = model.name(), "no free variables, skipping CBC");
            return Ok(trivial_results(self.name(), &canonical));
        }

        // Build variables using good_lp
        let mut vars = variables!();
        let mut lp_variables: Vec<GoodLpVariable> = Vec::with_capacity(canonical.columns.len());
        for column in &canonical.columns {
            let mut definition = variable();
            if column.domain.is_integer() {
                definition = definition.integer();
            }
            if let Some(lower) = column.lower {
                definition = definition.min(lower);
            }
            if let Some(upper) = column.upper {
                definition = definition.max(upper);
            }
            lp_variables.push(vars.add(definition));
        }

        let objective = canonical.objectives.first();
        let obj_expr = match objective {
            Some(objective) => linear_expression(&canonical, &objective.repn, &lp_variables),
            None => 0.into(),
        };
        let unsolved = match objective.map(|o| o.sense) {
            Some(ObjectiveSense::Maximize) => vars.maximise(obj_expr),
            _ => vars.minimise(obj_expr),
        };

        // Build constraints
        let mut lp_model = unsolved.using(coin_cbc::coin_cbc);
        for row in &canonical.rows {
            let lhs = linear_expression(&canonical, &row.repn, &lp_variables);
            match (row.lower, row.upper) {
                (Some(lower), Some(_)) if row.is_equality() => {
                    lp_model = lp_model.with(lhs.eq(lower));
                }
                (lower, upper) => {
                    if let Some(lower) = lower {
                        lp_model = lp_model.with(lhs.clone().geq(lower));
                    }
                    if let Some(upper) = upper {
                        lp_model = lp_model.with(lhs.leq(upper));
                    }
                }
            }
        }

        // Solve the problem
        let solution_result = lp_model.solve();
        let wallclock_ms = start_time.elapsed().as_secs_f64() * 1000.0;

        let mut results = match solution_result {
            Ok(sol) => {
                let values: Vec<f64> = lp_variables.iter().map(|var| sol.value(*var)).collect();
                let mut results = SolveResults::new(self.name(), TerminationCondition::Optimal);
                results.best_feasible_objective = objective_value(&canonical, &values);
                results.best_objective_bound = results.best_feasible_objective;
                results.values = canonical
                    .columns
                    .iter()
                    .map(|column| column.id)
                    .zip(values)
                    .collect();
                results
            }
            Err(ResolutionError::Infeasible) => {
                SolveResults::new(self.name(), TerminationCondition::Infeasible)
            }
            Err(ResolutionError::Unbounded) => {
                SolveResults::new(self.name(), TerminationCondition::Unbounded)
            }
            Err(e) => return Err(SolverError::ExecutionFailed(format!("{:?}", e))),
        };
        results.wallclock_ms = wallclock_ms;

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
        "COIN-OR CBC"
    }

    fn available(&self) -> bool {
        true
    }

    fn supports_integer(&self) -> bool {
        true
    }
}
