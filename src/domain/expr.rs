// Symbolic expression trees
//
// An `Expr` is an immutable handle to a shared node. Cloning is a reference
// count bump; building `a + b + c` appends to a uniquely owned sum in place.

use super::model::{ParamId, VarId};
use super::value_objects::UnaryFunction;
use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub};
use std::sync::{Arc, OnceLock};

/// Handle to an expression node
#[derive(Clone, PartialEq)]
pub struct Expr(Arc<ExprNode>);

/// Node kinds of the expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum ExprNode {
    Constant(f64),
    Var(VarId),
    Param(ParamId),
    Negation(Expr),
    /// n-ary sum, children in insertion order
    Sum(Vec<Expr>),
    Product([Expr; 2]),
    Division([Expr; 2]),
    /// `[base, exponent]`
    Power([Expr; 2]),
    Unary(UnaryFunction, Expr),
}

impl Expr {
    pub fn new(node: ExprNode) -> Self {
        Expr(Arc::new(node))
    }

    pub fn constant(value: f64) -> Self {
        Expr::new(ExprNode::Constant(value))
    }

    pub fn zero() -> Self {
        Expr::constant(0.0)
    }

    pub fn node(&self) -> &ExprNode {
        &self.0
    }

    /// Child expressions in evaluation order
    pub fn args(&self) -> &[Expr] {
        match self.node() {
            ExprNode::Constant(_) | ExprNode::Var(_) | ExprNode::Param(_) => &[],
            ExprNode::Negation(arg) | ExprNode::Unary(_, arg) => std::slice::from_ref(arg),
            ExprNode::Sum(terms) => terms,
            ExprNode::Product(pair) | ExprNode::Division(pair) | ExprNode::Power(pair) => pair,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.args().is_empty()
    }

    /// No variables or parameters anywhere in the tree
    pub fn is_constant(&self) -> bool {
        let mut stack = vec![self];
        while let Some(expr) = stack.pop() {
            if matches!(expr.node(), ExprNode::Var(_) | ExprNode::Param(_)) {
                return false;
            }
            stack.extend(expr.args());
        }
        true
    }

    pub fn as_constant(&self) -> Option<f64> {
        match self.node() {
            ExprNode::Constant(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_var(&self) -> Option<VarId> {
        match self.node() {
            ExprNode::Var(id) => Some(*id),
            _ => None,
        }
    }

    /// True when any variable (fixed or not) appears in the tree
    pub fn contains_vars(&self) -> bool {
        let mut stack = vec![self];
        while let Some(expr) = stack.pop() {
            if matches!(expr.node(), ExprNode::Var(_)) {
                return true;
            }
            stack.extend(expr.args());
        }
        false
    }

    pub fn node_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(expr) = stack.pop() {
            count += 1;
            stack.extend(expr.args());
        }
        count
    }

    /// Build an n-ary sum; an empty iterator yields zero
    pub fn sum<I, T>(terms: I) -> Expr
    where
        I: IntoIterator<Item = T>,
        T: Into<Expr>,
    {
        let mut total = Expr::zero();
        for term in terms {
            total += term;
        }
        total
    }

    pub fn pow(self, exponent: impl Into<Expr>) -> Expr {
        let exponent = exponent.into();
        match (self.as_constant(), exponent.as_constant()) {
            (Some(base), Some(exp)) => Expr::constant(base.powf(exp)),
            (_, Some(exp)) if exp == 0.0 => Expr::constant(1.0),
            (_, Some(exp)) if exp == 1.0 => self,
            _ => Expr::new(ExprNode::Power([self, exponent])),
        }
    }

    /// Apply an intrinsic function; constant arguments inside the function's
    /// domain are folded immediately
    pub fn apply(self, func: UnaryFunction) -> Expr {
        if let Some(value) = self.as_constant().and_then(|c| func.apply(c)) {
            return Expr::constant(value);
        }
        Expr::new(ExprNode::Unary(func, self))
    }

    /// `self <= rhs`
    pub fn leq(self, rhs: impl Into<Expr>) -> Relation {
        Relation::inequality(self, rhs.into())
    }

    /// `self >= rhs`
    pub fn geq(self, rhs: impl Into<Expr>) -> Relation {
        Relation::inequality(rhs.into(), self)
    }

    /// `self == rhs`
    pub fn equals(self, rhs: impl Into<Expr>) -> Relation {
        Relation::equality(self, rhs.into())
    }

    fn add_expr(mut self, rhs: Expr) -> Expr {
        match (self.as_constant(), rhs.as_constant()) {
            (Some(a), Some(b)) => return Expr::constant(a + b),
            (Some(a), None) if a == 0.0 => return rhs,
            (None, Some(b)) if b == 0.0 => return self,
            _ => {}
        }
        if let Some(ExprNode::Sum(terms)) = Arc::get_mut(&mut self.0) {
            terms.push(rhs);
            return self;
        }
        if let ExprNode::Sum(terms) = self.node() {
            let mut terms = terms.clone();
            terms.push(rhs);
            return Expr::new(ExprNode::Sum(terms));
        }
        Expr::new(ExprNode::Sum(vec![self, rhs]))
    }

    fn neg_expr(self) -> Expr {
        match self.node() {
            ExprNode::Constant(value) => Expr::constant(-value),
            ExprNode::Negation(inner) => inner.clone(),
            _ => Expr::new(ExprNode::Negation(self)),
        }
    }

    fn sub_expr(self, rhs: Expr) -> Expr {
        self.add_expr(rhs.neg_expr())
    }

    fn mul_expr(self, rhs: Expr) -> Expr {
        match (self.as_constant(), rhs.as_constant()) {
            (Some(a), Some(b)) => Expr::constant(a * b),
            (Some(a), None) if a == 0.0 => Expr::zero(),
            (None, Some(b)) if b == 0.0 => Expr::zero(),
            (Some(a), None) if a == 1.0 => rhs,
            (None, Some(b)) if b == 1.0 => self,
            _ => Expr::new(ExprNode::Product([self, rhs])),
        }
    }

    fn div_expr(self, rhs: Expr) -> Expr {
        match (self.as_constant(), rhs.as_constant()) {
            (Some(a), Some(b)) if b != 0.0 => Expr::constant(a / b),
            (None, Some(b)) if b == 1.0 => self,
            (Some(a), None) if a == 0.0 => Expr::zero(),
            _ => Expr::new(ExprNode::Division([self, rhs])),
        }
    }
}

// Shared stand-in left behind by detached children
fn placeholder() -> Expr {
    static LEAF: OnceLock<Expr> = OnceLock::new();
    LEAF.get_or_init(Expr::zero).clone()
}

// Moves non-leaf children of uniquely owned nodes onto `pending` so that
// dropping a deep tree does not recurse
fn detach_children(node: &mut ExprNode, pending: &mut Vec<Expr>) {
    let mut detach = |arg: &mut Expr| {
        if !arg.is_leaf() {
            pending.push(std::mem::replace(arg, placeholder()));
        }
    };
    match node {
        ExprNode::Constant(_) | ExprNode::Var(_) | ExprNode::Param(_) => {}
        ExprNode::Negation(arg) | ExprNode::Unary(_, arg) => detach(arg),
        ExprNode::Sum(terms) => pending.extend(terms.drain(..).filter(|term| !term.is_leaf())),
        ExprNode::Product(pair) | ExprNode::Division(pair) | ExprNode::Power(pair) => {
            pair.iter_mut().for_each(detach)
        }
    }
}

impl Drop for Expr {
    fn drop(&mut self) {
        if self.is_leaf() {
            return;
        }
        let mut pending = Vec::new();
        if let Some(node) = Arc::get_mut(&mut self.0) {
            detach_children(node, &mut pending);
        }
        while let Some(mut expr) = pending.pop() {
            if let Some(node) = Arc::get_mut(&mut expr.0) {
                detach_children(node, &mut pending);
            }
        }
    }
}

impl Default for Expr {
    fn default() -> Self {
        Expr::zero()
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Expr({})", self.preview())
    }
}

// Binding strength used to decide where parentheses are needed
fn precedence(expr: &Expr) -> u8 {
    match expr.node() {
        ExprNode::Sum(_) => 1,
        ExprNode::Negation(_) | ExprNode::Product(_) | ExprNode::Division(_) => 2,
        ExprNode::Constant(value) if *value < 0.0 => 2,
        ExprNode::Power(_) => 3,
        _ => 4,
    }
}

const PREVIEW_LEN: usize = 120;

enum Piece<'a> {
    Text(&'static str),
    Owned(String),
    Operand(&'a Expr, u8),
}

// Infix text of `root` built with an explicit stack; stops once `limit`
// bytes are written and reports whether the text was cut
fn render(root: &Expr, limit: Option<usize>) -> (String, bool) {
    let mut out = String::new();
    let mut stack = vec![Piece::Operand(root, 0)];
    while let Some(piece) = stack.pop() {
        if limit.is_some_and(|limit| out.len() >= limit) {
            return (out, true);
        }
        let (expr, min_precedence) = match piece {
            Piece::Text(text) => {
                out.push_str(text);
                continue;
            }
            Piece::Owned(text) => {
                out.push_str(&text);
                continue;
            }
            Piece::Operand(expr, min_precedence) => (expr, min_precedence),
        };

        // pieces are pushed in reverse order of appearance
        let wrapped = precedence(expr) < min_precedence;
        if wrapped {
            stack.push(Piece::Text(")"));
        }
        match expr.node() {
            ExprNode::Constant(value) => stack.push(Piece::Owned(value.to_string())),
            ExprNode::Var(id) => stack.push(Piece::Owned(format!("x{}", id.index()))),
            ExprNode::Param(id) => stack.push(Piece::Owned(format!("p{}", id.index()))),
            ExprNode::Negation(arg) => {
                stack.push(Piece::Operand(arg, 3));
                stack.push(Piece::Text("-"));
            }
            ExprNode::Sum(terms) => {
                for (i, term) in terms.iter().enumerate().rev() {
                    stack.push(Piece::Operand(term, 0));
                    if i > 0 {
                        stack.push(Piece::Text(" + "));
                    }
                }
            }
            ExprNode::Product([a, b]) => {
                stack.push(Piece::Operand(b, 3));
                stack.push(Piece::Text("*"));
                stack.push(Piece::Operand(a, 2));
            }
            ExprNode::Division([a, b]) => {
                stack.push(Piece::Operand(b, 3));
                stack.push(Piece::Text("/"));
                stack.push(Piece::Operand(a, 2));
            }
            ExprNode::Power([base, exponent]) => {
                stack.push(Piece::Operand(exponent, 4));
                stack.push(Piece::Text("**"));
                stack.push(Piece::Operand(base, 4));
            }
            ExprNode::Unary(func, arg) => {
                stack.push(Piece::Text(")"));
                stack.push(Piece::Operand(arg, 0));
                stack.push(Piece::Owned(format!("{}(", func)));
            }
        }
        if wrapped {
            stack.push(Piece::Text("("));
        }
    }
    (out, false)
}

impl Expr {
    /// Infix text cut after a fixed length, for messages and logs
    pub fn preview(&self) -> String {
        match render(self, Some(PREVIEW_LEN)) {
            (mut text, true) => {
                text.push_str("...");
                text
            }
            (text, false) => text,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render(self, None).0)
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Expr::constant(value)
    }
}

impl From<VarId> for Expr {
    fn from(id: VarId) -> Self {
        Expr::new(ExprNode::Var(id))
    }
}

impl From<ParamId> for Expr {
    fn from(id: ParamId) -> Self {
        Expr::new(ExprNode::Param(id))
    }
}

impl From<&Expr> for Expr {
    fn from(expr: &Expr) -> Self {
        expr.clone()
    }
}

macro_rules! impl_binary_op {
    ($trait:ident, $method:ident, $inner:ident) => {
        impl<T: Into<Expr>> $trait<T> for Expr {
            type Output = Expr;
            fn $method(self, rhs: T) -> Expr {
                self.$inner(rhs.into())
            }
        }

        impl<T: Into<Expr>> $trait<T> for &Expr {
            type Output = Expr;
            fn $method(self, rhs: T) -> Expr {
                self.clone().$inner(rhs.into())
            }
        }

        impl<T: Into<Expr>> $trait<T> for VarId {
            type Output = Expr;
            fn $method(self, rhs: T) -> Expr {
                Expr::from(self).$inner(rhs.into())
            }
        }

        impl<T: Into<Expr>> $trait<T> for ParamId {
            type Output = Expr;
            fn $method(self, rhs: T) -> Expr {
                Expr::from(self).$inner(rhs.into())
            }
        }

        impl $trait<Expr> for f64 {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                Expr::constant(self).$inner(rhs)
            }
        }

        impl $trait<&Expr> for f64 {
            type Output = Expr;
            fn $method(self, rhs: &Expr) -> Expr {
                Expr::constant(self).$inner(rhs.clone())
            }
        }

        impl $trait<VarId> for f64 {
            type Output = Expr;
            fn $method(self, rhs: VarId) -> Expr {
                Expr::constant(self).$inner(Expr::from(rhs))
            }
        }

        impl $trait<ParamId> for f64 {
            type Output = Expr;
            fn $method(self, rhs: ParamId) -> Expr {
                Expr::constant(self).$inner(Expr::from(rhs))
            }
        }
    };
}

impl_binary_op!(Add, add, add_expr);
impl_binary_op!(Sub, sub, sub_expr);
impl_binary_op!(Mul, mul, mul_expr);
impl_binary_op!(Div, div, div_expr);

impl<T: Into<Expr>> AddAssign<T> for Expr {
    fn add_assign(&mut self, rhs: T) {
        let lhs = std::mem::take(self);
        *self = lhs.add_expr(rhs.into());
    }
}

impl Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        self.neg_expr()
    }
}

impl Neg for &Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        self.clone().neg_expr()
    }
}

impl Neg for VarId {
    type Output = Expr;
    fn neg(self) -> Expr {
        Expr::from(self).neg_expr()
    }
}

impl Neg for ParamId {
    type Output = Expr;
    fn neg(self) -> Expr {
        Expr::from(self).neg_expr()
    }
}

macro_rules! intrinsic {
    ($name:ident, $func:expr) => {
        pub fn $name(arg: impl Into<Expr>) -> Expr {
            arg.into().apply($func)
        }
    };
}

intrinsic!(exp, UnaryFunction::Exp);
intrinsic!(log, UnaryFunction::Log);
intrinsic!(log10, UnaryFunction::Log10);
intrinsic!(sqrt, UnaryFunction::Sqrt);
intrinsic!(sin, UnaryFunction::Sin);
intrinsic!(cos, UnaryFunction::Cos);
intrinsic!(tan, UnaryFunction::Tan);
intrinsic!(asin, UnaryFunction::Asin);
intrinsic!(acos, UnaryFunction::Acos);
intrinsic!(atan, UnaryFunction::Atan);
intrinsic!(sinh, UnaryFunction::Sinh);
intrinsic!(cosh, UnaryFunction::Cosh);
intrinsic!(tanh, UnaryFunction::Tanh);
intrinsic!(abs, UnaryFunction::Abs);

/// `lower <= body <= upper`; a missing side is unbounded
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    pub lower: Option<Expr>,
    pub body: Expr,
    pub upper: Option<Expr>,
}

impl Relation {
    pub fn ranged(
        lower: impl Into<Expr>,
        body: impl Into<Expr>,
        upper: impl Into<Expr>,
    ) -> Self {
        Self {
            lower: Some(lower.into()),
            body: body.into(),
            upper: Some(upper.into()),
        }
    }

    pub fn new(lower: Option<Expr>, body: impl Into<Expr>, upper: Option<Expr>) -> Self {
        Self {
            lower,
            body: body.into(),
            upper,
        }
    }

    // lhs <= rhs, keeping the variable side as the body when possible
    fn inequality(lhs: Expr, rhs: Expr) -> Self {
        if !rhs.contains_vars() {
            Self::new(None, lhs, Some(rhs))
        } else if !lhs.contains_vars() {
            Self::new(Some(lhs), rhs, None)
        } else {
            Self::new(None, lhs - rhs, Some(Expr::zero()))
        }
    }

    fn equality(lhs: Expr, rhs: Expr) -> Self {
        if !rhs.contains_vars() {
            Self::new(Some(rhs.clone()), lhs, Some(rhs))
        } else if !lhs.contains_vars() {
            Self::new(Some(lhs.clone()), rhs, Some(lhs))
        } else {
            Self::new(Some(Expr::zero()), lhs - rhs, Some(Expr::zero()))
        }
    }

    /// Both sides present and structurally identical
    pub fn is_equality(&self) -> bool {
        match (&self.lower, &self.upper) {
            (Some(lower), Some(upper)) => lower == upper,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{Model, Variable};

    fn model_with_vars(n: usize) -> (Model, Vec<VarId>) {
        let mut model = Model::new("m");
        let vars = (0..n)
            .map(|i| model.add_var(Variable::new(format!("v{}", i))).unwrap())
            .collect();
        (model, vars)
    }

    #[test]
    fn chained_addition_builds_one_flat_sum() {
        let (_, v) = model_with_vars(3);
        let expr = v[0] + v[1] + v[2];
        match expr.node() {
            ExprNode::Sum(terms) => assert_eq!(terms.len(), 3),
            other => panic!("expected sum, got {:?}", other),
        }
    }

    #[test]
    fn shared_sums_are_not_mutated_by_later_additions() {
        let (_, v) = model_with_vars(3);
        let base = v[0] + v[1];
        let extended = base.clone() + v[2];
        assert_eq!(base.args().len(), 2);
        assert_eq!(extended.args().len(), 3);
    }

    #[test]
    fn add_assign_starting_from_zero_drops_the_zero() {
        let (_, v) = model_with_vars(2);
        let mut expr = Expr::constant(0.0);
        expr += v[0];
        assert_eq!(expr.as_var(), Some(v[0]));
        expr += 1.0 * v[1];
        assert_eq!(expr.args().len(), 2);
    }

    #[test]
    fn constant_operands_fold() {
        let expr = Expr::constant(2.0) * 3.0 + 1.0;
        assert_eq!(expr.as_constant(), Some(7.0));
        assert_eq!(exp(0.0).as_constant(), Some(1.0));
        assert_eq!((-Expr::constant(4.0)).as_constant(), Some(-4.0));
    }

    #[test]
    fn double_negation_cancels() {
        let (_, v) = model_with_vars(1);
        let expr = -(-v[0]);
        assert_eq!(expr.as_var(), Some(v[0]));
    }

    #[test]
    fn inequality_keeps_variable_side_as_body() {
        let (_, v) = model_with_vars(2);
        let upper = (v[0] + v[1]).leq(4.0);
        assert!(upper.lower.is_none());
        assert_eq!(upper.upper.as_ref().and_then(Expr::as_constant), Some(4.0));

        let lower = Expr::from(v[0]).geq(0.0);
        assert_eq!(lower.lower.as_ref().and_then(Expr::as_constant), Some(0.0));
        assert_eq!(lower.body.as_var(), Some(v[0]));

        let both = Expr::from(v[0]).leq(v[1]);
        assert_eq!(both.upper.as_ref().and_then(Expr::as_constant), Some(0.0));
        assert!(both.body.contains_vars());
    }

    #[test]
    fn constant_trees_have_no_components() {
        let (_, v) = model_with_vars(1);
        assert!((Expr::constant(2.0) * 3.0).is_constant());
        assert!(!(Expr::constant(2.0) * v[0]).is_constant());
    }

    #[test]
    fn equality_sets_both_bounds() {
        let (_, v) = model_with_vars(1);
        let relation = Expr::from(v[0]).equals(2.0);
        assert!(relation.is_equality());
    }

    #[test]
    fn display_parenthesizes_by_precedence() {
        let (_, v) = model_with_vars(2);
        let expr = (v[0] + v[1]) * v[0];
        assert_eq!(expr.to_string(), "(x0 + x1)*x0");
        let power = (Expr::from(v[0]) * 2.0).pow(2.0);
        assert_eq!(power.to_string(), "(x0*2)**2");
    }

    fn deep_chain(x: VarId, depth: usize) -> Expr {
        let mut expr = Expr::from(x);
        for _ in 0..depth {
            expr = -(exp(expr) - 1.0);
        }
        expr
    }

    #[test]
    fn deep_trees_render_without_recursion() {
        let (_, v) = model_with_vars(1);
        let expr = deep_chain(v[0], 200_000);

        let preview = expr.preview();
        assert!(preview.starts_with("-(exp(-(exp("));
        assert!(preview.ends_with("..."));
        assert!(preview.len() < 150);

        let full = expr.to_string();
        assert!(full.ends_with("x0) + -1)) + -1)"));
        assert!(format!("{:?}", expr).starts_with("Expr(-(exp("));
    }

    #[test]
    fn short_previews_are_not_cut() {
        let (_, v) = model_with_vars(2);
        let expr = exp(v[0] + 1.0) / v[1];
        assert_eq!(expr.preview(), "exp(x0 + 1)/x1");
        assert_eq!(expr.preview(), expr.to_string());
    }

    #[test]
    fn dropping_a_tree_leaves_shared_children_intact() {
        let (_, v) = model_with_vars(2);
        let shared = exp(v[0] * v[1]);
        let tree = deep_chain(v[0], 10_000) + shared.clone() + 2.0 * v[1];
        drop(tree);
        assert_eq!(shared.to_string(), "exp(x0*x1)");
        assert!(Arc::ptr_eq(&placeholder().0, &placeholder().0));
    }
}
