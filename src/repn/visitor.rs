// Non-recursive expression tree traversal
//
// `walk` keeps its own stack of partially visited nodes, so the depth of an
// expression is bounded by heap memory instead of the thread's call stack.

use crate::domain::expr::{Expr, ExprNode};
use crate::domain::model::{Model, ModelError, Result as ModelResult, VarId};
use crate::domain::value_objects::UnaryFunction;
use std::collections::HashSet;
use std::convert::Infallible;

/// Post-order callbacks over an expression tree
pub trait ExpressionVisitor {
    type Output;
    type Error;

    /// Called before descending into `child`; returning a result skips it
    fn before_child(
        &mut self,
        _parent: &Expr,
        _child: &Expr,
    ) -> Result<Option<Self::Output>, Self::Error> {
        Ok(None)
    }

    fn visit_leaf(&mut self, leaf: &Expr) -> Result<Self::Output, Self::Error>;

    /// Combine the results of every child of `node`, in argument order
    fn exit_node(
        &mut self,
        node: &Expr,
        children: Vec<Self::Output>,
    ) -> Result<Self::Output, Self::Error>;
}

struct Frame<'a, O> {
    expr: &'a Expr,
    next: usize,
    results: Vec<O>,
}

impl<'a, O> Frame<'a, O> {
    fn new(expr: &'a Expr) -> Self {
        Self {
            expr,
            next: 0,
            results: Vec::with_capacity(expr.args().len()),
        }
    }
}

/// Visit `root` in post-order without recursion
pub fn walk<V: ExpressionVisitor>(visitor: &mut V, root: &Expr) -> Result<V::Output, V::Error> {
    if root.is_leaf() {
        return visitor.visit_leaf(root);
    }

    let mut current = Frame::new(root);
    let mut parents: Vec<Frame<'_, V::Output>> = Vec::new();
    loop {
        let expr = current.expr;
        let args = expr.args();
        if current.next < args.len() {
            let child = &args[current.next];
            current.next += 1;
            if let Some(result) = visitor.before_child(expr, child)? {
                current.results.push(result);
            } else if child.is_leaf() {
                let result = visitor.visit_leaf(child)?;
                current.results.push(result);
            } else {
                parents.push(std::mem::replace(&mut current, Frame::new(child)));
            }
            continue;
        }

        let result = visitor.exit_node(expr, std::mem::take(&mut current.results))?;
        match parents.pop() {
            Some(parent) => {
                current = parent;
                current.results.push(result);
            }
            None => return Ok(result),
        }
    }
}

fn infallible<T>(result: Result<T, Infallible>) -> T {
    match result {
        Ok(value) => value,
        Err(never) => match never {},
    }
}

// ---- evaluation ----------------------------------------------------------

struct Evaluator<'a> {
    model: &'a Model,
}

impl ExpressionVisitor for Evaluator<'_> {
    type Output = f64;
    type Error = ModelError;

    fn visit_leaf(&mut self, leaf: &Expr) -> ModelResult<f64> {
        match leaf.node() {
            ExprNode::Constant(value) => Ok(*value),
            ExprNode::Var(id) => {
                let var = self.model.var(*id)?;
                var.value
                    .ok_or_else(|| ModelError::UninitializedVar(var.name.clone()))
            }
            ExprNode::Param(id) => {
                let param = self.model.param(*id)?;
                param
                    .value
                    .ok_or_else(|| ModelError::UninitializedParam(param.name.clone()))
            }
            _ => Err(ModelError::Evaluation(format!("{} is not a leaf", leaf.preview()))),
        }
    }

    fn exit_node(&mut self, node: &Expr, children: Vec<f64>) -> ModelResult<f64> {
        let value = match (node.node(), children.as_slice()) {
            (ExprNode::Negation(_), [a]) => -a,
            (ExprNode::Sum(_), terms) => terms.iter().sum(),
            (ExprNode::Product(_), [a, b]) => a * b,
            (ExprNode::Division(_), [a, b]) => {
                if *b == 0.0 {
                    return Err(ModelError::Evaluation(format!(
                        "division by zero in '{}'",
                        node.preview()
                    )));
                }
                a / b
            }
            (ExprNode::Power(_), [a, b]) => a.powf(*b),
            (ExprNode::Unary(func, _), [a]) => func.apply(*a).ok_or_else(|| {
                ModelError::Evaluation(format!("{}({}) is undefined", func, a))
            })?,
            _ => {
                return Err(ModelError::Evaluation(format!(
                    "malformed expression '{}'",
                    node.preview()
                )))
            }
        };
        if value.is_nan() {
            return Err(ModelError::Evaluation(format!("'{}' evaluates to NaN", node.preview())));
        }
        Ok(value)
    }
}

/// Numeric value of `expr` at the current variable and parameter values
pub fn evaluate(model: &Model, expr: &Expr) -> ModelResult<f64> {
    walk(&mut Evaluator { model }, expr)
}

// ---- polynomial degree ---------------------------------------------------

struct DegreeVisitor<'a> {
    model: &'a Model,
}

impl ExpressionVisitor for DegreeVisitor<'_> {
    type Output = Option<u32>;
    type Error = ModelError;

    fn visit_leaf(&mut self, leaf: &Expr) -> ModelResult<Option<u32>> {
        match leaf.node() {
            ExprNode::Var(id) => Ok(Some(if self.model.var(*id)?.fixed { 0 } else { 1 })),
            _ => Ok(Some(0)),
        }
    }

    fn exit_node(&mut self, node: &Expr, children: Vec<Option<u32>>) -> ModelResult<Option<u32>> {
        let degree = match (node.node(), children.as_slice()) {
            (ExprNode::Negation(_), [a]) => *a,
            (ExprNode::Sum(_), degrees) => degrees
                .iter()
                .try_fold(0, |acc, degree| degree.map(|d| acc.max(d))),
            (ExprNode::Product(_), [a, b]) => a.zip(*b).map(|(a, b)| a + b),
            (ExprNode::Division(_), [a, Some(0)]) => *a,
            (ExprNode::Power([_, exponent]), [base, Some(0)]) => match base {
                Some(0) => Some(0),
                Some(base) => self
                    .model
                    .value(exponent)
                    .ok()
                    .filter(|e| *e >= 0.0 && e.fract() == 0.0)
                    .map(|e| base * e as u32),
                None => None,
            },
            (ExprNode::Unary(..), [Some(0)]) => Some(0),
            _ => None,
        };
        Ok(degree)
    }
}

/// Degree of `expr` treating fixed variables as constants; `None` when the
/// expression is not a polynomial
pub fn polynomial_degree(model: &Model, expr: &Expr) -> ModelResult<Option<u32>> {
    walk(&mut DegreeVisitor { model }, expr)
}

// ---- variable identification --------------------------------------------

#[derive(Default)]
struct VariableCollector {
    seen: HashSet<VarId>,
    order: Vec<VarId>,
}

impl ExpressionVisitor for VariableCollector {
    type Output = ();
    type Error = Infallible;

    fn visit_leaf(&mut self, leaf: &Expr) -> Result<(), Infallible> {
        if let Some(id) = leaf.as_var() {
            if self.seen.insert(id) {
                self.order.push(id);
            }
        }
        Ok(())
    }

    fn exit_node(&mut self, _node: &Expr, _children: Vec<()>) -> Result<(), Infallible> {
        Ok(())
    }
}

/// Variables in order of first appearance, without duplicates
pub fn identify_variables(expr: &Expr) -> Vec<VarId> {
    let mut collector = VariableCollector::default();
    infallible(walk(&mut collector, expr));
    collector.order
}

// ---- function search -----------------------------------------------------

struct FunctionFinder {
    target: UnaryFunction,
}

impl ExpressionVisitor for FunctionFinder {
    type Output = bool;
    type Error = Infallible;

    fn visit_leaf(&mut self, _leaf: &Expr) -> Result<bool, Infallible> {
        Ok(false)
    }

    fn exit_node(&mut self, node: &Expr, children: Vec<bool>) -> Result<bool, Infallible> {
        let here = matches!(node.node(), ExprNode::Unary(func, _) if *func == self.target);
        Ok(here || children.into_iter().any(|found| found))
    }
}

pub fn contains_function(expr: &Expr, target: UnaryFunction) -> bool {
    infallible(walk(&mut FunctionFinder { target }, expr))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::expr::{abs, exp, log};
    use crate::domain::model::{Param, Variable};

    fn model_with_values(values: &[f64]) -> (Model, Vec<VarId>) {
        let mut model = Model::new("m");
        let vars = values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                model
                    .add_var(Variable::new(format!("x{}", i)).with_value(*v))
                    .unwrap()
            })
            .collect();
        (model, vars)
    }

    #[test]
    fn deep_chains_do_not_overflow_the_stack() {
        let (model, x) = model_with_values(&[1.0]);
        let mut expr = Expr::from(x[0]);
        for _ in 0..200_000 {
            expr = exp(expr) - 1.0;
            expr = -expr;
        }
        assert!(evaluate(&model, &expr).is_ok());
        assert_eq!(identify_variables(&expr), vec![x[0]]);
    }

    #[test]
    fn evaluation_uses_current_values() {
        let (mut model, x) = model_with_values(&[2.0, 3.0]);
        let p = model.add_param(Param::new("p", 4.0)).unwrap();
        let expr = x[0] * x[1] + p / x[0] - Expr::from(x[1]).pow(2.0);
        assert_eq!(evaluate(&model, &expr).unwrap(), 6.0 + 2.0 - 9.0);
    }

    #[test]
    fn evaluation_reports_domain_errors() {
        let (model, x) = model_with_values(&[-1.0, 0.0]);
        assert!(matches!(
            evaluate(&model, &log(x[0])),
            Err(ModelError::Evaluation(_))
        ));
        assert!(matches!(
            evaluate(&model, &(1.0 / Expr::from(x[1]))),
            Err(ModelError::Evaluation(_))
        ));
    }

    #[test]
    fn uninitialized_values_are_errors() {
        let mut model = Model::new("m");
        let x = model.add_var(Variable::new("x")).unwrap();
        assert_eq!(
            evaluate(&model, &(x + 1.0)),
            Err(ModelError::UninitializedVar("x".to_string()))
        );
    }

    #[test]
    fn degree_treats_fixed_variables_as_constants() {
        let (mut model, x) = model_with_values(&[1.0, 1.0]);
        let quadratic = x[0] * x[1] + 3.0;
        assert_eq!(polynomial_degree(&model, &quadratic).unwrap(), Some(2));
        model.fix(x[1], 2.0).unwrap();
        assert_eq!(polynomial_degree(&model, &quadratic).unwrap(), Some(1));
        assert_eq!(
            polynomial_degree(&model, &Expr::from(x[0]).pow(3.0)).unwrap(),
            Some(3)
        );
        assert_eq!(polynomial_degree(&model, &exp(x[0])).unwrap(), None);
        assert_eq!(polynomial_degree(&model, &(x[1] / x[0])).unwrap(), None);
    }

    #[test]
    fn variables_are_listed_once_in_first_appearance_order() {
        let (_, x) = model_with_values(&[0.0, 0.0, 0.0]);
        let expr = x[2] * x[0] + x[2] + exp(x[1] + x[0]);
        assert_eq!(identify_variables(&expr), vec![x[2], x[0], x[1]]);
    }

    #[test]
    fn finds_nested_functions() {
        let (_, x) = model_with_values(&[0.0]);
        let expr = 2.0 * exp(abs(x[0]) + 1.0);
        assert!(contains_function(&expr, UnaryFunction::Abs));
        assert!(!contains_function(&expr, UnaryFunction::Sin));
    }
}
