// Canonical form of a whole model
//
// Rows, objectives and the columns they reference, with parameters and fixed
// variables folded and row constants moved into the bounds. Writers and the
// in-process solvers both start from here.

use super::standard::{generate_standard_repn, RepnOptions, StandardRepn};
use crate::domain::model::{Constraint, ConstraintId, Model, ModelError, ObjectiveId, Result, VarId};
use crate::domain::value_objects::{FileDeterminism, ObjectiveSense, VariableDomain};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

const FEASIBILITY_TOLERANCE: f64 = 1e-9;

/// How the canonical model is assembled
#[derive(Debug, Clone, Default)]
pub struct CanonicalOptions {
    pub repn: RepnOptions,
    /// Drop rows without free variables once they are known to be feasible
    pub skip_trivial_constraints: bool,
    pub file_determinism: FileDeterminism,
    /// Variable names placed first, in this order
    pub column_order: Vec<String>,
    /// Constraint names placed first, in this order
    pub row_order: Vec<String>,
}

/// `lower <= repn <= upper`, with `repn.constant == 0`
#[derive(Debug, Clone)]
pub struct CanonicalRow {
    pub id: ConstraintId,
    pub name: String,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
    pub repn: StandardRepn,
}

impl CanonicalRow {
    pub fn is_equality(&self) -> bool {
        matches!((self.lower, self.upper), (Some(lower), Some(upper)) if lower == upper)
    }

    /// Both bounds present and different
    pub fn is_range(&self) -> bool {
        matches!((self.lower, self.upper), (Some(lower), Some(upper)) if lower != upper)
    }
}

#[derive(Debug, Clone)]
pub struct CanonicalObjective {
    pub id: ObjectiveId,
    pub name: String,
    pub sense: ObjectiveSense,
    pub repn: StandardRepn,
}

/// A variable referenced by an active row or objective
#[derive(Debug, Clone)]
pub struct CanonicalColumn {
    pub id: VarId,
    pub name: String,
    pub domain: VariableDomain,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
    pub value: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct CanonicalModel {
    pub name: String,
    pub objectives: Vec<CanonicalObjective>,
    pub rows: Vec<CanonicalRow>,
    pub columns: Vec<CanonicalColumn>,
    positions: HashMap<VarId, usize>,
}

impl CanonicalModel {
    pub fn build(model: &Model, options: &CanonicalOptions) -> Result<Self> {
        let mut objectives = Vec::new();
        for (id, objective) in model.active_objectives() {
            let repn = generate_standard_repn(model, &objective.expr, options.repn)?;
            objectives.push(CanonicalObjective {
                id,
                name: objective.name.clone(),
                sense: objective.sense,
                repn,
            });
        }

        let mut rows = Vec::new();
        for (id, constraint) in model.active_constraints() {
            if let Some(row) = canonical_row(model, id, constraint, options)? {
                rows.push(row);
            }
        }
        apply_ordering(&mut rows, options.file_determinism, &options.row_order, |row| {
            row.name.as_str()
        });

        let mut referenced = HashSet::new();
        let mut columns = Vec::new();
        let repns = objectives
            .iter()
            .map(|objective| &objective.repn)
            .chain(rows.iter().map(|row| &row.repn));
        for repn in repns {
            for id in repn.all_vars() {
                if referenced.insert(id) {
                    let var = model.var(id)?;
                    let (lower, upper) = model.var_bounds(id)?;
                    columns.push(CanonicalColumn {
                        id,
                        name: var.name.clone(),
                        domain: var.domain,
                        lower,
                        upper,
                        value: var.value,
                    });
                }
            }
        }
        columns.sort_by_key(|column| column.id);
        apply_ordering(
            &mut columns,
            options.file_determinism,
            &options.column_order,
            |column| column.name.as_str(),
        );

        let positions = columns
            .iter()
            .enumerate()
            .map(|(i, column)| (column.id, i))
            .collect();

        info!(
            model = %model.name(),
            rows = rows.len(),
            columns = columns.len(),
            objectives = objectives.len(),
            "canonical model built"
        );

        Ok(Self {
            name: model.name().to_string(),
            objectives,
            rows,
            columns,
            positions,
        })
    }

    /// Position of a variable among the columns
    pub fn column_position(&self, id: VarId) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    pub fn column(&self, id: VarId) -> Option<&CanonicalColumn> {
        self.column_position(id).map(|i| &self.columns[i])
    }

    pub fn has_discrete_columns(&self) -> bool {
        self.columns.iter().any(|column| column.domain.is_integer())
    }

    /// Highest polynomial degree over rows and objectives; `None` if any is
    /// general nonlinear
    pub fn max_degree(&self) -> Option<u32> {
        self.objectives
            .iter()
            .map(|objective| &objective.repn)
            .chain(self.rows.iter().map(|row| &row.repn))
            .try_fold(0, |acc, repn| repn.polynomial_degree().map(|d| acc.max(d)))
    }
}

fn finite(bound: Option<f64>) -> Option<f64> {
    bound.filter(|value| value.is_finite())
}

fn canonical_row(
    model: &Model,
    id: ConstraintId,
    constraint: &Constraint,
    options: &CanonicalOptions,
) -> Result<Option<CanonicalRow>> {
    let name = constraint.name.as_str();
    let relation = &constraint.relation;
    let mut repn = generate_standard_repn(model, &relation.body, options.repn)?;
    let lower = relation
        .lower
        .as_ref()
        .map(|expr| model.fixed_value(name, expr))
        .transpose()?;
    let upper = relation
        .upper
        .as_ref()
        .map(|expr| model.fixed_value(name, expr))
        .transpose()?;
    let offset = repn.constant;
    repn.constant = 0.0;
    let lower = finite(lower).map(|value| value - offset);
    let upper = finite(upper).map(|value| value - offset);

    if lower.is_none() && upper.is_none() {
        warn!(constraint = %name, "skipping constraint without finite bounds");
        return Ok(None);
    }

    if repn.is_constant() {
        let violated = lower.is_some_and(|lb| lb > FEASIBILITY_TOLERANCE)
            || upper.is_some_and(|ub| ub < -FEASIBILITY_TOLERANCE);
        if violated {
            return Err(ModelError::InfeasibleConstraint(name.to_string()));
        }
        if options.skip_trivial_constraints {
            debug!(constraint = %name, "skipping trivial constraint");
            return Ok(None);
        }
    }

    Ok(Some(CanonicalRow {
        id,
        name: name.to_string(),
        lower,
        upper,
        repn,
    }))
}

// Stable: names listed in `explicit` come first, the rest keep declaration
// order or are sorted by name
fn apply_ordering<T>(
    items: &mut [T],
    determinism: FileDeterminism,
    explicit: &[String],
    name: impl Fn(&T) -> &str,
) {
    if determinism == FileDeterminism::SortedByName {
        items.sort_by(|a, b| name(a).cmp(name(b)));
    }
    if !explicit.is_empty() {
        let rank: HashMap<&str, usize> = explicit
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();
        items.sort_by_key(|item| rank.get(name(item)).copied().unwrap_or(usize::MAX));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::expr::Expr;
    use crate::domain::model::{Param, Variable};

    #[test]
    fn row_constants_move_into_bounds() {
        let mut model = Model::new("m");
        let x = model.add_var(Variable::new("x")).unwrap();
        model.add_constraint("c", (x + 2.0).leq(5.0)).unwrap();
        let canonical = CanonicalModel::build(&model, &CanonicalOptions::default()).unwrap();
        let row = &canonical.rows[0];
        assert_eq!(row.upper, Some(3.0));
        assert_eq!(row.lower, None);
        assert_eq!(row.repn.constant, 0.0);
    }

    #[test]
    fn trivial_rows_are_checked_then_skipped() {
        let mut model = Model::new("m");
        let x = model.add_var(Variable::new("x")).unwrap();
        let y = model.add_var(Variable::new("y").fixed_at(1.0)).unwrap();
        model.add_constraint("ok", Expr::from(y).leq(2.0)).unwrap();
        model.add_constraint("real", Expr::from(x).geq(0.0)).unwrap();

        let options = CanonicalOptions {
            skip_trivial_constraints: true,
            ..CanonicalOptions::default()
        };
        let canonical = CanonicalModel::build(&model, &options).unwrap();
        assert_eq!(canonical.rows.len(), 1);
        assert_eq!(canonical.rows[0].name, "real");

        let kept = CanonicalModel::build(&model, &CanonicalOptions::default()).unwrap();
        assert_eq!(kept.rows.len(), 2);

        model.add_constraint("bad", Expr::from(y).geq(2.0)).unwrap();
        assert_eq!(
            CanonicalModel::build(&model, &options).unwrap_err(),
            ModelError::InfeasibleConstraint("bad".to_string())
        );
    }

    #[test]
    fn only_referenced_columns_appear_in_declaration_order() {
        let mut model = Model::new("m");
        let a = model.add_var(Variable::new("a")).unwrap();
        let _unused = model.add_var(Variable::new("unused")).unwrap();
        let b = model.add_var(Variable::binary("b")).unwrap();
        model.add_constraint("c", (b + a).leq(1.0)).unwrap();

        let canonical = CanonicalModel::build(&model, &CanonicalOptions::default()).unwrap();
        let names: Vec<_> = canonical.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(canonical.column(b).unwrap().upper, Some(1.0));
        assert!(canonical.has_discrete_columns());
    }

    #[test]
    fn explicit_orders_come_first() {
        let mut model = Model::new("m");
        let vars: Vec<_> = ["z", "x", "y"]
            .iter()
            .map(|name| model.add_var(Variable::new(*name)).unwrap())
            .collect();
        for (i, var) in vars.iter().enumerate() {
            model
                .add_constraint(format!("c{}", 3 - i), Expr::from(*var).leq(1.0))
                .unwrap();
        }

        let options = CanonicalOptions {
            file_determinism: FileDeterminism::SortedByName,
            column_order: vec!["y".to_string()],
            row_order: vec!["c2".to_string()],
            ..CanonicalOptions::default()
        };
        let canonical = CanonicalModel::build(&model, &options).unwrap();
        let columns: Vec<_> = canonical.columns.iter().map(|c| c.name.as_str()).collect();
        let rows: Vec<_> = canonical.rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(columns, vec!["y", "x", "z"]);
        assert_eq!(rows, vec!["c2", "c1", "c3"]);
    }

    #[test]
    fn bounds_follow_mutable_parameters() {
        let mut model = Model::new("m");
        let p = model.add_param(Param::mutable("p").with_value(1.0)).unwrap();
        let x = model.add_var(Variable::new("x")).unwrap();
        model.add_constraint("c", Expr::from(x).leq(p)).unwrap();

        let first = CanonicalModel::build(&model, &CanonicalOptions::default()).unwrap();
        model.set_param_value(p, 4.0).unwrap();
        let second = CanonicalModel::build(&model, &CanonicalOptions::default()).unwrap();
        assert_eq!(first.rows[0].upper, Some(1.0));
        assert_eq!(second.rows[0].upper, Some(4.0));
    }
}
