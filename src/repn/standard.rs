// Standard representation of an expression
//
// An expression is split into a constant, linear terms, quadratic terms and
// whatever general nonlinear remainder is left. Parameters and fixed
// variables are folded into numbers on the way up the tree.

use super::visitor::{identify_variables, walk, ExpressionVisitor};
use crate::domain::expr::{Expr, ExprNode};
use crate::domain::model::{Model, ModelError, Result, VarId};
use std::collections::{BTreeMap, HashSet};

/// Canonicalization switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepnOptions {
    /// Expand products of linear terms into quadratic terms; when off they
    /// stay in the nonlinear part
    pub quadratic: bool,
}

impl Default for RepnOptions {
    fn default() -> Self {
        Self { quadratic: true }
    }
}

impl RepnOptions {
    pub fn linear_only() -> Self {
        Self { quadratic: false }
    }
}

/// `constant + Σ a_i x_i + Σ q_ij x_i x_j + nonlinear`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StandardRepn {
    pub constant: f64,
    pub linear: BTreeMap<VarId, f64>,
    /// Keys are ordered pairs `(min, max)`
    pub quadratic: BTreeMap<(VarId, VarId), f64>,
    pub nonlinear: Option<Expr>,
    /// Free variables of `nonlinear`, in first-appearance order
    pub nonlinear_vars: Vec<VarId>,
}

impl StandardRepn {
    pub fn constant(value: f64) -> Self {
        Self {
            constant: value,
            ..Self::default()
        }
    }

    fn variable(id: VarId) -> Self {
        let mut repn = Self::default();
        repn.linear.insert(id, 1.0);
        repn
    }

    fn general(expr: Expr) -> Self {
        Self {
            nonlinear: Some(expr),
            ..Self::default()
        }
    }

    /// `None` when a nonlinear part is present
    pub fn polynomial_degree(&self) -> Option<u32> {
        if self.nonlinear.is_some() {
            None
        } else if !self.quadratic.is_empty() {
            Some(2)
        } else if !self.linear.is_empty() {
            Some(1)
        } else {
            Some(0)
        }
    }

    pub fn is_constant(&self) -> bool {
        self.polynomial_degree() == Some(0)
    }

    pub fn is_linear(&self) -> bool {
        matches!(self.polynomial_degree(), Some(0) | Some(1))
    }

    pub fn is_quadratic(&self) -> bool {
        self.polynomial_degree() == Some(2)
    }

    pub fn is_nonlinear(&self) -> bool {
        self.nonlinear.is_some()
    }

    fn as_constant(&self) -> Option<f64> {
        if self.is_constant() {
            Some(self.constant)
        } else {
            None
        }
    }

    /// Every free variable, linear terms first
    pub fn all_vars(&self) -> Vec<VarId> {
        let mut seen = HashSet::new();
        let quadratic = self.quadratic.keys().flat_map(|&(a, b)| [a, b]);
        self.linear
            .keys()
            .copied()
            .chain(quadratic)
            .chain(self.nonlinear_vars.iter().copied())
            .filter(|id| seen.insert(*id))
            .collect()
    }

    /// Rebuild an expression equal to this representation
    pub fn to_expr(&self) -> Expr {
        let mut terms = Vec::with_capacity(1 + self.linear.len() + self.quadratic.len());
        terms.push(Expr::constant(self.constant));
        for (&id, &coef) in &self.linear {
            terms.push(coef * Expr::from(id));
        }
        for (&(a, b), &coef) in &self.quadratic {
            let product = if a == b {
                Expr::from(a).pow(2.0)
            } else {
                a * b
            };
            terms.push(coef * product);
        }
        if let Some(nonlinear) = &self.nonlinear {
            terms.push(nonlinear.clone());
        }
        Expr::sum(terms)
    }

    fn scale(mut self, factor: f64) -> Self {
        if factor == 0.0 {
            return Self::default();
        }
        if factor == 1.0 {
            return self;
        }
        self.constant *= factor;
        self.linear.values_mut().for_each(|coef| *coef *= factor);
        self.quadratic.values_mut().for_each(|coef| *coef *= factor);
        self.nonlinear = self.nonlinear.map(|expr| {
            if factor == -1.0 {
                -expr
            } else {
                factor * expr
            }
        });
        self
    }

    // Each coefficient is divided separately so that `x / 3` matches the
    // value a user would compute by hand
    fn divide(mut self, divisor: f64) -> Self {
        if divisor == 1.0 {
            return self;
        }
        self.constant /= divisor;
        self.linear.values_mut().for_each(|coef| *coef /= divisor);
        self.quadratic.values_mut().for_each(|coef| *coef /= divisor);
        self.nonlinear = self.nonlinear.map(|expr| expr / divisor);
        self
    }

    fn accumulate(&mut self, other: StandardRepn) {
        self.constant += other.constant;
        for (id, coef) in other.linear {
            *self.linear.entry(id).or_insert(0.0) += coef;
        }
        for (key, coef) in other.quadratic {
            *self.quadratic.entry(key).or_insert(0.0) += coef;
        }
        self.nonlinear = match (self.nonlinear.take(), other.nonlinear) {
            (Some(a), Some(b)) => Some(a + b),
            (a, b) => a.or(b),
        };
    }

    fn prune_zeros(&mut self) {
        self.linear.retain(|_, coef| *coef != 0.0);
        self.quadratic.retain(|_, coef| *coef != 0.0);
    }

    // (c1 + l1) * (c2 + l2) for two representations of degree at most one
    fn expand_product(a: &StandardRepn, b: &StandardRepn) -> StandardRepn {
        let mut result = StandardRepn::constant(a.constant * b.constant);
        for (&id, &coef) in &b.linear {
            *result.linear.entry(id).or_insert(0.0) += a.constant * coef;
        }
        for (&id, &coef) in &a.linear {
            *result.linear.entry(id).or_insert(0.0) += b.constant * coef;
        }
        for (&ia, &ca) in &a.linear {
            for (&ib, &cb) in &b.linear {
                let key = if ia <= ib { (ia, ib) } else { (ib, ia) };
                *result.quadratic.entry(key).or_insert(0.0) += ca * cb;
            }
        }
        result.prune_zeros();
        result
    }

    fn finalize(mut self) -> Self {
        self.prune_zeros();
        if self.constant == 0.0 {
            // normalizes -0.0
            self.constant = 0.0;
        }
        self.nonlinear_vars = self
            .nonlinear
            .as_ref()
            .map(identify_variables)
            .unwrap_or_default();
        self
    }
}

struct RepnVisitor<'a> {
    model: &'a Model,
    options: RepnOptions,
}

impl RepnVisitor<'_> {
    fn evaluation_error(&self, node: &Expr, what: &str) -> ModelError {
        ModelError::Evaluation(format!("{} in '{}'", what, node.preview()))
    }

    fn checked(&self, node: &Expr, value: f64) -> Result<StandardRepn> {
        if value.is_nan() {
            return Err(self.evaluation_error(node, "undefined value"));
        }
        Ok(StandardRepn::constant(value))
    }

    fn product(&self, node: &Expr, a: StandardRepn, b: StandardRepn) -> StandardRepn {
        if let Some(factor) = a.as_constant() {
            return b.scale(factor);
        }
        if let Some(factor) = b.as_constant() {
            return a.scale(factor);
        }
        if self.options.quadratic && a.polynomial_degree() == Some(1) && b.polynomial_degree() == Some(1)
        {
            return StandardRepn::expand_product(&a, &b);
        }
        tracing::trace!(expr = %node.preview(), "product kept as nonlinear");
        StandardRepn::general(a.to_expr() * b.to_expr())
    }

    fn power(&self, node: &Expr, base: StandardRepn, exponent: StandardRepn) -> Result<StandardRepn> {
        let Some(exp) = exponent.as_constant() else {
            return Ok(StandardRepn::general(base.to_expr().pow(exponent.to_expr())));
        };
        if let Some(value) = base.as_constant() {
            return self.checked(node, value.powf(exp));
        }
        if exp == 0.0 {
            return Ok(StandardRepn::constant(1.0));
        }
        if exp == 1.0 {
            return Ok(base);
        }
        if exp == 2.0 && self.options.quadratic && base.polynomial_degree() == Some(1) {
            return Ok(StandardRepn::expand_product(&base, &base));
        }
        Ok(StandardRepn::general(base.to_expr().pow(exp)))
    }
}

impl ExpressionVisitor for RepnVisitor<'_> {
    type Output = StandardRepn;
    type Error = ModelError;

    fn visit_leaf(&mut self, leaf: &Expr) -> Result<StandardRepn> {
        match leaf.node() {
            ExprNode::Constant(value) => Ok(StandardRepn::constant(*value)),
            ExprNode::Param(id) => {
                let param = self.model.param(*id)?;
                param
                    .value
                    .map(StandardRepn::constant)
                    .ok_or_else(|| ModelError::UninitializedParam(param.name.clone()))
            }
            ExprNode::Var(id) => {
                let var = self.model.var(*id)?;
                if !var.fixed {
                    return Ok(StandardRepn::variable(*id));
                }
                var.value
                    .map(StandardRepn::constant)
                    .ok_or_else(|| ModelError::UninitializedVar(var.name.clone()))
            }
            _ => Err(self.evaluation_error(leaf, "unexpected interior node")),
        }
    }

    fn exit_node(&mut self, node: &Expr, children: Vec<StandardRepn>) -> Result<StandardRepn> {
        let mut children = children.into_iter();
        let mut next = || {
            children
                .next()
                .ok_or_else(|| ModelError::Evaluation(format!("missing operand in '{}'", node.preview())))
        };
        match node.node() {
            ExprNode::Constant(_) | ExprNode::Var(_) | ExprNode::Param(_) => {
                Err(self.evaluation_error(node, "unexpected leaf"))
            }
            ExprNode::Negation(_) => Ok(next()?.scale(-1.0)),
            ExprNode::Sum(terms) => {
                let mut total = StandardRepn::default();
                for _ in 0..terms.len() {
                    total.accumulate(next()?);
                }
                total.prune_zeros();
                Ok(total)
            }
            ExprNode::Product(_) => {
                let (a, b) = (next()?, next()?);
                Ok(self.product(node, a, b))
            }
            ExprNode::Division(_) => {
                let (numerator, denominator) = (next()?, next()?);
                match denominator.as_constant() {
                    Some(divisor) if divisor == 0.0 => {
                        Err(self.evaluation_error(node, "division by zero"))
                    }
                    Some(divisor) => Ok(numerator.divide(divisor)),
                    None if numerator.as_constant() == Some(0.0) => Ok(StandardRepn::default()),
                    None => Ok(StandardRepn::general(
                        numerator.to_expr() / denominator.to_expr(),
                    )),
                }
            }
            ExprNode::Power(_) => {
                let (base, exponent) = (next()?, next()?);
                self.power(node, base, exponent)
            }
            ExprNode::Unary(func, _) => {
                let arg = next()?;
                match arg.as_constant() {
                    Some(value) => match func.apply(value) {
                        Some(result) => self.checked(node, result),
                        None => Err(self.evaluation_error(
                            node,
                            &format!("{}({}) is undefined", func, value),
                        )),
                    },
                    None => Ok(StandardRepn::general(arg.to_expr().apply(*func))),
                }
            }
        }
    }
}

/// Canonical decomposition of `expr` at the current parameter values and
/// fixed-variable values
pub fn generate_standard_repn(
    model: &Model,
    expr: &Expr,
    options: RepnOptions,
) -> Result<StandardRepn> {
    let mut visitor = RepnVisitor { model, options };
    Ok(walk(&mut visitor, expr)?.finalize())
}
