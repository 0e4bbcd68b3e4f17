// Helpers shared by the file writers: number formatting, column labels and
// infix rendering of canonical bodies

use crate::domain::expr::{Expr, ExprNode};
use crate::domain::model::VarId;
use crate::domain::symbol_map::{Labeler, SymbolMap};
use crate::domain::value_objects::UnaryFunction;
use crate::domain::writer_service::{Result, WriterError};
use crate::repn::visitor::{walk, ExpressionVisitor};
use crate::repn::{CanonicalModel, StandardRepn};
use std::fmt::Write as _;

/// Longest line GAMS accepts
pub const GAMS_MAX_LINE_LENGTH: usize = 80_000;

/// Shortest text that parses back to exactly `value`
pub fn format_number(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if value.fract() == 0.0 && value.abs() < 1e15 {
        return format!("{}", value as i64);
    }
    format!("{:?}", value)
}

/// `+3`, `-0.5`
pub fn signed(value: f64) -> String {
    if value < 0.0 {
        format!("-{}", format_number(-value))
    } else {
        format!("+{}", format_number(value))
    }
}

/// Labels of the canonical columns, indexed by column position
pub(crate) struct ColumnLabels<'a> {
    canonical: &'a CanonicalModel,
    labels: Vec<String>,
}

impl<'a> ColumnLabels<'a> {
    pub fn new(canonical: &'a CanonicalModel, labeler: &mut dyn Labeler) -> Self {
        let labels = canonical
            .columns
            .iter()
            .map(|column| labeler.label(&column.name))
            .collect();
        Self { canonical, labels }
    }

    pub fn register(&self, symbol_map: &mut SymbolMap) -> Result<()> {
        for (column, label) in self.canonical.columns.iter().zip(&self.labels) {
            symbol_map.add_symbol(column.id, label.clone())?;
        }
        Ok(())
    }

    pub fn position(&self, id: VarId) -> Result<usize> {
        self.canonical
            .column_position(id)
            .ok_or_else(|| WriterError::MissingSymbol(format!("variable #{}", id.index())))
    }

    pub fn label(&self, id: VarId) -> Result<&str> {
        Ok(self.label_at(self.position(id)?))
    }

    pub fn label_at(&self, position: usize) -> &str {
        &self.labels[position]
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Linear terms as `(position, coefficient)` in column order
    pub fn linear_terms(&self, repn: &StandardRepn) -> Result<Vec<(usize, f64)>> {
        let mut terms = repn
            .linear
            .iter()
            .map(|(id, coef)| Ok((self.position(*id)?, *coef)))
            .collect::<Result<Vec<_>>>()?;
        terms.sort_by_key(|(position, _)| *position);
        Ok(terms)
    }

    /// Quadratic terms as `(first, second, coefficient)`, `first <= second`
    pub fn quadratic_terms(&self, repn: &StandardRepn) -> Result<Vec<(usize, usize, f64)>> {
        let mut terms = repn
            .quadratic
            .iter()
            .map(|((a, b), coef)| {
                let (i, j) = (self.position(*a)?, self.position(*b)?);
                Ok((i.min(j), i.max(j), *coef))
            })
            .collect::<Result<Vec<_>>>()?;
        terms.sort_by_key(|(i, j, _)| (*i, *j));
        Ok(terms)
    }
}

/// Infix syntax of a target format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Dialect {
    Gams,
    Baron,
}

impl Dialect {
    fn format_name(&self) -> &'static str {
        match self {
            Dialect::Gams => "GAMS",
            Dialect::Baron => "BARON .BAR",
        }
    }

    fn square(&self, label: &str) -> String {
        match self {
            Dialect::Gams => format!("power({}, 2)", label),
            Dialect::Baron => format!("{}^2", label),
        }
    }
}

const SUM: u8 = 1;
const PRODUCT: u8 = 2;
const POWER: u8 = 3;
const ATOM: u8 = 4;

pub(crate) struct Rendered {
    text: String,
    precedence: u8,
}

impl Rendered {
    fn new(text: String, precedence: u8) -> Self {
        Self { text, precedence }
    }

    fn atom(text: String) -> Self {
        Self::new(text, ATOM)
    }

    fn wrapped(&self, min_precedence: u8) -> String {
        if self.precedence < min_precedence {
            format!("({})", self.text)
        } else {
            self.text.clone()
        }
    }
}

struct InfixPrinter<'a, 'b> {
    dialect: Dialect,
    labels: &'b ColumnLabels<'a>,
}

impl InfixPrinter<'_, '_> {
    fn function(&self, func: UnaryFunction, arg: &Rendered) -> Result<Rendered> {
        let name = match (self.dialect, func) {
            (Dialect::Baron, UnaryFunction::Exp | UnaryFunction::Log) => func.name(),
            (Dialect::Baron, UnaryFunction::Log10) => {
                return Ok(Rendered::atom(format!("(log({})/log(10))", arg.text)));
            }
            (Dialect::Baron, UnaryFunction::Sqrt) => {
                return Ok(Rendered::new(format!("{}^0.5", arg.wrapped(ATOM)), POWER));
            }
            (Dialect::Baron, _) => {
                return Err(WriterError::UnsupportedFunction {
                    format: self.dialect.format_name(),
                    function: func.name().to_string(),
                })
            }
            (Dialect::Gams, UnaryFunction::Asin) => "arcsin",
            (Dialect::Gams, UnaryFunction::Acos) => "arccos",
            (Dialect::Gams, UnaryFunction::Atan) => "arctan",
            (Dialect::Gams, _) => func.name(),
        };
        Ok(Rendered::atom(format!("{}({})", name, arg.text)))
    }

    fn power(&self, exponent_node: &Expr, base: &Rendered, exponent: &Rendered) -> Rendered {
        match self.dialect {
            Dialect::Gams => match exponent_node.as_constant() {
                Some(value) if value.fract() == 0.0 => {
                    Rendered::atom(format!("power({}, {})", base.text, exponent.text))
                }
                _ => Rendered::new(
                    format!("{} ** {}", base.wrapped(ATOM), exponent.wrapped(ATOM)),
                    POWER,
                ),
            },
            Dialect::Baron => Rendered::new(
                format!("{}^{}", base.wrapped(ATOM), exponent.wrapped(ATOM)),
                POWER,
            ),
        }
    }
}

impl ExpressionVisitor for InfixPrinter<'_, '_> {
    type Output = Rendered;
    type Error = WriterError;

    fn visit_leaf(&mut self, leaf: &Expr) -> Result<Rendered> {
        match leaf.node() {
            ExprNode::Constant(value) if *value < 0.0 => {
                Ok(Rendered::new(format_number(*value), PRODUCT))
            }
            ExprNode::Constant(value) => Ok(Rendered::atom(format_number(*value))),
            ExprNode::Var(id) => Ok(Rendered::atom(self.labels.label(*id)?.to_string())),
            _ => Err(WriterError::MissingSymbol(leaf.to_string())),
        }
    }

    fn exit_node(&mut self, node: &Expr, children: Vec<Rendered>) -> Result<Rendered> {
        match (node.node(), children.as_slice()) {
            (ExprNode::Sum(_), terms) => {
                let mut body = TermBuilder::default();
                for term in terms {
                    body.push_rendered(term);
                }
                Ok(Rendered::new(body.finish(), SUM))
            }
            (ExprNode::Negation(_), [arg]) => {
                Ok(Rendered::new(format!("-{}", arg.wrapped(POWER)), PRODUCT))
            }
            (ExprNode::Product(_), [a, b]) => Ok(Rendered::new(
                format!("{}*{}", a.wrapped(PRODUCT), b.wrapped(POWER)),
                PRODUCT,
            )),
            (ExprNode::Division(_), [a, b]) => Ok(Rendered::new(
                format!("{}/{}", a.wrapped(PRODUCT), b.wrapped(POWER)),
                PRODUCT,
            )),
            (ExprNode::Power([_, exponent]), [base, exp]) => Ok(self.power(exponent, base, exp)),
            (ExprNode::Unary(func, _), [arg]) => self.function(*func, arg),
            _ => Err(WriterError::MissingSymbol(node.to_string())),
        }
    }
}

/// Joins signed terms into `a + 2*b - c`
#[derive(Default)]
pub(crate) struct TermBuilder {
    text: String,
}

impl TermBuilder {
    fn push_signed(&mut self, negative: bool, magnitude: &str) {
        match (self.text.is_empty(), negative) {
            (true, false) => self.text.push_str(magnitude),
            (true, true) => {
                self.text.push('-');
                self.text.push_str(magnitude);
            }
            (false, false) => {
                let _ = write!(self.text, " + {}", magnitude);
            }
            (false, true) => {
                let _ = write!(self.text, " - {}", magnitude);
            }
        }
    }

    /// `coef*factor` with unit coefficients elided
    pub fn push_term(&mut self, coef: f64, factor: &str) {
        let magnitude = coef.abs();
        if magnitude == 1.0 {
            self.push_signed(coef < 0.0, factor);
        } else {
            self.push_signed(coef < 0.0, &format!("{}*{}", format_number(magnitude), factor));
        }
    }

    pub fn push_constant(&mut self, value: f64) {
        self.push_signed(value < 0.0, &format_number(value.abs()));
    }

    fn push_rendered(&mut self, term: &Rendered) {
        match term.text.strip_prefix('-') {
            Some(rest) if term.precedence >= PRODUCT => self.push_signed(true, rest),
            Some(_) => self.push_signed(false, &format!("({})", term.text)),
            None => self.push_signed(false, &term.text),
        }
    }

    pub fn finish(self) -> String {
        if self.text.is_empty() {
            "0".to_string()
        } else {
            self.text
        }
    }
}

/// Linear, quadratic and nonlinear parts of `repn` as one infix sum
pub(crate) fn render_body(
    repn: &StandardRepn,
    include_constant: bool,
    dialect: Dialect,
    labels: &ColumnLabels<'_>,
) -> Result<String> {
    let mut body = TermBuilder::default();
    for (position, coef) in labels.linear_terms(repn)? {
        body.push_term(coef, labels.label_at(position));
    }
    for (i, j, coef) in labels.quadratic_terms(repn)? {
        let factor = if i == j {
            dialect.square(labels.label_at(i))
        } else {
            format!("{}*{}", labels.label_at(i), labels.label_at(j))
        };
        body.push_term(coef, &factor);
    }
    if let Some(nonlinear) = &repn.nonlinear {
        let mut printer = InfixPrinter { dialect, labels };
        // top-level sums are spliced so that signs read naturally
        let terms = match nonlinear.node() {
            ExprNode::Sum(terms) => terms.as_slice(),
            _ => std::slice::from_ref(nonlinear),
        };
        for term in terms {
            body.push_rendered(&walk(&mut printer, term)?);
        }
    }
    if include_constant && repn.constant != 0.0 {
        body.push_constant(repn.constant);
    }
    Ok(body.finish())
}

/// Break lines longer than `limit` at the last space before the limit
pub fn split_long_lines(text: &str, limit: usize) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let mut rest = line;
        while rest.len() > limit {
            let bytes = rest.as_bytes();
            let cut = bytes[..=limit]
                .iter()
                .rposition(|b| *b == b' ')
                .filter(|&pos| pos > 0)
                .or_else(|| bytes.iter().position(|b| *b == b' '));
            match cut {
                Some(pos) => {
                    out.push_str(&rest[..pos]);
                    out.push('\n');
                    rest = &rest[pos + 1..];
                }
                None => break,
            }
        }
        out.push_str(rest);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_use_the_shortest_exact_form() {
        assert_eq!(format_number(0.0), "0");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-12.0), "-12");
        assert_eq!(format_number(0.1), "0.1");
        assert_eq!(format_number(1.0 / 3.0), "0.3333333333333333");
        assert_eq!(format_number(2.5e-8).parse::<f64>().unwrap(), 2.5e-8);
        assert_eq!(signed(2.0), "+2");
        assert_eq!(signed(-0.5), "-0.5");
    }

    #[test]
    fn term_builder_elides_unit_coefficients() {
        let mut body = TermBuilder::default();
        body.push_term(-1.0, "x");
        body.push_term(2.0, "y");
        body.push_term(-0.5, "z");
        body.push_constant(-3.0);
        assert_eq!(body.finish(), "-x + 2*y - 0.5*z - 3");
        assert_eq!(TermBuilder::default().finish(), "0");
    }

    #[test]
    fn long_lines_break_on_spaces() {
        let line = "aaaa bbbb cccc dddd";
        assert_eq!(split_long_lines(line, 10), "aaaa bbbb\ncccc dddd");
        assert_eq!(split_long_lines("short\nlines", 10), "short\nlines");
        assert_eq!(split_long_lines("unbreakable", 4), "unbreakable");
    }
}
