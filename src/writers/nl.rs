// AMPL NL writer (text mode)
//
// Only the nonlinear part of each body goes into the `C`/`O` expression
// segments; linear coefficients are written to `J`/`G`, so the
// representation is generated without the quadratic shortcut.

use super::common::format_number;
use crate::domain::expr::{Expr, ExprNode};
use crate::domain::model::{Model, VarId};
use crate::domain::symbol_map::SymbolMap;
use crate::domain::value_objects::{ProblemFormat, UnaryFunction};
use crate::domain::writer_service::{
    ProblemWriter, Result, WriterError, WriterOptions, WrittenProblem,
};
use crate::repn::{CanonicalColumn, CanonicalModel, CanonicalRow, RepnOptions, StandardRepn};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::Write as _;
use tracing::debug;

pub struct NlWriter;

impl NlWriter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NlWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn opcode(func: UnaryFunction) -> u8 {
    match func {
        UnaryFunction::Abs => 15,
        UnaryFunction::Tanh => 37,
        UnaryFunction::Tan => 38,
        UnaryFunction::Sqrt => 39,
        UnaryFunction::Sinh => 40,
        UnaryFunction::Sin => 41,
        UnaryFunction::Log10 => 42,
        UnaryFunction::Log => 43,
        UnaryFunction::Exp => 44,
        UnaryFunction::Cosh => 45,
        UnaryFunction::Cos => 46,
        UnaryFunction::Atan => 49,
        UnaryFunction::Asin => 51,
        UnaryFunction::Acos => 53,
    }
}

/// Range/bound line: `0 lb ub`, `1 ub`, `2 lb`, `3`, `4 value`
fn bound_line(out: &mut String, lower: Option<f64>, upper: Option<f64>) {
    let _ = match (lower, upper) {
        (Some(lower), Some(upper)) if lower == upper => writeln!(out, "4 {}", format_number(lower)),
        (Some(lower), Some(upper)) => writeln!(
            out,
            "0 {} {}",
            format_number(lower),
            format_number(upper)
        ),
        (None, Some(upper)) => writeln!(out, "1 {}", format_number(upper)),
        (Some(lower), None) => writeln!(out, "2 {}", format_number(lower)),
        (None, None) => writeln!(out, "3"),
    };
}

fn nonlinear_vars<'a>(repns: impl Iterator<Item = &'a StandardRepn>) -> HashSet<VarId> {
    repns
        .flat_map(|repn| repn.nonlinear_vars.iter().copied())
        .collect()
}

/// Where a column sits in the NL variable order
#[derive(Debug, Default)]
struct VariableGroups {
    order: Vec<usize>,
    nonlinear_both: usize,
    nonlinear_cons: usize,
    nonlinear_objs: usize,
    discrete_both: usize,
    discrete_cons: usize,
    discrete_objs: usize,
    linear_binary: usize,
    linear_integer: usize,
}

impl VariableGroups {
    fn build(canonical: &CanonicalModel) -> Self {
        let in_cons = nonlinear_vars(canonical.rows.iter().map(|row| &row.repn));
        let in_objs = nonlinear_vars(canonical.objectives.iter().map(|obj| &obj.repn));

        let mut groups = Self::default();
        let columns: Vec<(usize, &CanonicalColumn)> = canonical.columns.iter().enumerate().collect();
        // continuous members first, then discrete; returns (members, discrete)
        let take = |order: &mut Vec<usize>, filter: &dyn Fn(&CanonicalColumn) -> bool| {
            let members: Vec<(usize, bool)> = columns
                .iter()
                .filter(|(_, column)| filter(*column))
                .map(|(position, column)| (*position, column.domain.is_integer()))
                .collect();
            order.extend(members.iter().filter(|(_, d)| !d).map(|(p, _)| *p));
            order.extend(members.iter().filter(|(_, d)| *d).map(|(p, _)| *p));
            (members.len(), members.iter().filter(|(_, d)| *d).count())
        };

        let mut order = Vec::with_capacity(columns.len());
        (groups.nonlinear_both, groups.discrete_both) = take(&mut order, &|c: &CanonicalColumn| {
            in_cons.contains(&c.id) && in_objs.contains(&c.id)
        });
        (groups.nonlinear_cons, groups.discrete_cons) = take(&mut order, &|c: &CanonicalColumn| {
            in_cons.contains(&c.id) && !in_objs.contains(&c.id)
        });
        (groups.nonlinear_objs, groups.discrete_objs) = take(&mut order, &|c: &CanonicalColumn| {
            !in_cons.contains(&c.id) && in_objs.contains(&c.id)
        });
        let linear = |c: &CanonicalColumn| !in_cons.contains(&c.id) && !in_objs.contains(&c.id);
        take(&mut order, &|c: &CanonicalColumn| linear(c) && c.domain.is_continuous());
        (groups.linear_binary, _) = take(&mut order, &|c: &CanonicalColumn| linear(c) && c.domain.is_binary());
        (groups.linear_integer, _) = take(&mut order, &|c: &CanonicalColumn| {
            linear(c) && c.domain.is_integer() && !c.domain.is_binary()
        });
        groups.order = order;
        groups
    }
}

struct NlBody<'a> {
    out: String,
    canonical: &'a CanonicalModel,
    /// NL index of each variable
    index: HashMap<VarId, usize>,
    symbolic: bool,
}

impl NlBody<'_> {
    fn comment(&mut self, text: &str) {
        if self.symbolic {
            let _ = write!(self.out, "\t#{}", text);
        }
        self.out.push('\n');
    }

    fn variable(&self, id: VarId) -> Result<usize> {
        self.index
            .get(&id)
            .copied()
            .ok_or_else(|| WriterError::MissingSymbol(format!("variable #{}", id.index())))
    }

    fn op(&mut self, code: u8, name: &str) {
        let _ = write!(self.out, "o{}", code);
        self.comment(name);
    }

    /// Prefix form of `expr`, walked with an explicit stack
    fn expression(&mut self, expr: &Expr) -> Result<()> {
        let mut stack = vec![expr];
        while let Some(node) = stack.pop() {
            match node.node() {
                ExprNode::Constant(value) => {
                    let _ = writeln!(self.out, "n{}", format_number(*value));
                }
                ExprNode::Var(id) => {
                    let position = self.variable(*id)?;
                    let _ = write!(self.out, "v{}", position);
                    let name = self.canonical.column(*id).map(|c| c.name.clone()).unwrap_or_default();
                    self.comment(&name);
                }
                ExprNode::Param(_) => return Err(WriterError::MissingSymbol(node.to_string())),
                ExprNode::Sum(terms) => match terms.len() {
                    0 => self.out.push_str("n0\n"),
                    1 => stack.push(&terms[0]),
                    2 => {
                        self.op(0, "+");
                        stack.extend(terms.iter().rev());
                    }
                    n => {
                        self.op(54, "sumlist");
                        let _ = writeln!(self.out, "{}", n);
                        stack.extend(terms.iter().rev());
                    }
                },
                ExprNode::Negation(arg) => {
                    self.op(16, "-");
                    stack.push(arg);
                }
                ExprNode::Product(args) => {
                    self.op(2, "*");
                    stack.extend(args.iter().rev());
                }
                ExprNode::Division(args) => {
                    self.op(3, "/");
                    stack.extend(args.iter().rev());
                }
                ExprNode::Power(args) => {
                    self.op(5, "^");
                    stack.extend(args.iter().rev());
                }
                ExprNode::Unary(func, arg) => {
                    self.op(opcode(*func), func.name());
                    stack.push(arg);
                }
            }
        }
        Ok(())
    }

    /// `(index, coefficient)` pairs of every variable in `repn`, nonlinear
    /// ones with a zero linear coefficient
    fn gradient(&self, repn: &StandardRepn) -> Result<Vec<(usize, f64)>> {
        let mut entries = BTreeMap::new();
        for id in &repn.nonlinear_vars {
            entries.insert(self.variable(*id)?, 0.0);
        }
        for (id, coef) in &repn.linear {
            entries.insert(self.variable(*id)?, *coef);
        }
        Ok(entries.into_iter().collect())
    }
}

impl ProblemWriter for NlWriter {
    fn format(&self) -> ProblemFormat {
        ProblemFormat::Nl
    }

    fn render(&self, model: &Model, options: &WriterOptions) -> Result<WrittenProblem> {
        let canonical = CanonicalModel::build(
            model,
            &options.canonical_options(RepnOptions::linear_only(), true),
        )?;
        if canonical.objectives.len() > 1 {
            return Err(WriterError::ObjectiveCount {
                format: "NL",
                expected: "at most one",
                found: canonical.objectives.len(),
            });
        }
        let symbolic = options.symbolic_solver_labels;

        let groups = VariableGroups::build(&canonical);
        let columns: Vec<&CanonicalColumn> =
            groups.order.iter().map(|&p| &canonical.columns[p]).collect();
        let index = columns
            .iter()
            .enumerate()
            .map(|(i, column)| (column.id, i))
            .collect();

        let mut rows: Vec<&CanonicalRow> = canonical.rows.iter().filter(|r| r.repn.is_nonlinear()).collect();
        let nonlinear_rows = rows.len();
        rows.extend(canonical.rows.iter().filter(|r| !r.repn.is_nonlinear()));
        let nonlinear_objs = canonical
            .objectives
            .iter()
            .filter(|o| o.repn.is_nonlinear())
            .count();

        let mut symbol_map = SymbolMap::new();
        for (i, column) in columns.iter().enumerate() {
            symbol_map.add_symbol(column.id, format!("v{}", i))?;
        }
        for (i, row) in rows.iter().enumerate() {
            symbol_map.add_symbol(row.id, format!("c{}", i))?;
        }
        for (i, objective) in canonical.objectives.iter().enumerate() {
            symbol_map.add_symbol(objective.id, format!("o{}", i))?;
        }

        let mut body = NlBody {
            out: String::new(),
            canonical: &canonical,
            index,
            symbolic,
        };
        let jacobian = rows
            .iter()
            .map(|row| body.gradient(&row.repn))
            .collect::<Result<Vec<_>>>()?;
        let gradients = canonical
            .objectives
            .iter()
            .map(|objective| body.gradient(&objective.repn))
            .collect::<Result<Vec<_>>>()?;

        let ranges = rows.iter().filter(|r| r.is_range()).count();
        let equalities = rows.iter().filter(|r| r.is_equality()).count();
        let jacobian_nonzeros: usize = jacobian.iter().map(Vec::len).sum();
        let gradient_nonzeros: usize = gradients.iter().map(Vec::len).sum();
        let (row_name_len, col_name_len) = if symbolic {
            (
                rows.iter()
                    .map(|r| r.name.len())
                    .chain(canonical.objectives.iter().map(|o| o.name.len()))
                    .max()
                    .unwrap_or(0),
                columns.iter().map(|c| c.name.len()).max().unwrap_or(0),
            )
        } else {
            (0, 0)
        };
        debug!(
            vars = columns.len(),
            rows = rows.len(),
            nonlinear_rows,
            "writing NL header"
        );

        let out = &mut body.out;
        let _ = writeln!(out, "g3 1 1 0\t# problem {}", canonical.name);
        let _ = writeln!(
            out,
            " {} {} {} {} {}\t# vars, constraints, objectives, ranges, eqns",
            columns.len(),
            rows.len(),
            canonical.objectives.len(),
            ranges,
            equalities
        );
        let _ = writeln!(
            out,
            " {} {}\t# nonlinear constraints, objectives",
            nonlinear_rows, nonlinear_objs
        );
        out.push_str(" 0 0\t# network constraints: nonlinear, linear\n");
        // objective-only columns are ordered after the constraint ones, so the
        // objective count spans both groups once any of them exist
        let nonlinear_obj_vars = if groups.nonlinear_objs == 0 {
            groups.nonlinear_both
        } else {
            groups.nonlinear_both + groups.nonlinear_cons + groups.nonlinear_objs
        };
        let _ = writeln!(
            out,
            " {} {} {}\t# nonlinear vars in constraints, objectives, both",
            groups.nonlinear_both + groups.nonlinear_cons,
            nonlinear_obj_vars,
            groups.nonlinear_both
        );
        out.push_str(" 0 0 0 1\t# linear network variables; functions; arith, flags\n");
        let _ = writeln!(
            out,
            " {} {} {} {} {}\t# discrete variables: binary, integer, nonlinear (b,c,o)",
            groups.linear_binary,
            groups.linear_integer,
            groups.discrete_both,
            groups.discrete_cons,
            groups.discrete_objs
        );
        let _ = writeln!(
            out,
            " {} {}\t# nonzeros in Jacobian, gradients",
            jacobian_nonzeros, gradient_nonzeros
        );
        let _ = writeln!(
            out,
            " {} {}\t# max name lengths: constraints, variables",
            row_name_len, col_name_len
        );
        out.push_str(" 0 0 0 0 0\t# common exprs: b,c,o,c1,o1\n");

        for (i, row) in rows.iter().enumerate() {
            let _ = write!(body.out, "C{}", i);
            body.comment(&row.name);
            match &row.repn.nonlinear {
                Some(expr) => body.expression(expr)?,
                None => body.out.push_str("n0\n"),
            }
        }

        for (i, objective) in canonical.objectives.iter().enumerate() {
            let sense = if objective.sense.is_minimizing() { 0 } else { 1 };
            let _ = write!(body.out, "O{} {}", i, sense);
            body.comment(&objective.name);
            let constant = objective.repn.constant;
            match &objective.repn.nonlinear {
                Some(expr) if constant != 0.0 => {
                    body.op(0, "+");
                    body.expression(expr)?;
                    let _ = writeln!(body.out, "n{}", format_number(constant));
                }
                Some(expr) => body.expression(expr)?,
                None => {
                    let _ = writeln!(body.out, "n{}", format_number(constant));
                }
            }
        }

        let out = &mut body.out;
        let starts: Vec<(usize, f64)> = columns
            .iter()
            .enumerate()
            .filter_map(|(i, column)| column.value.map(|value| (i, value)))
            .collect();
        if !starts.is_empty() {
            let _ = writeln!(out, "x{}", starts.len());
            for (i, value) in starts {
                let _ = writeln!(out, "{} {}", i, format_number(value));
            }
        }

        if !rows.is_empty() {
            out.push_str("r\n");
            for row in &rows {
                bound_line(out, row.lower, row.upper);
            }
        }
        if !columns.is_empty() {
            out.push_str("b\n");
            for column in &columns {
                bound_line(out, column.lower, column.upper);
            }

            let mut counts = vec![0usize; columns.len()];
            for (position, _) in jacobian.iter().flatten() {
                counts[*position] += 1;
            }
            let _ = writeln!(out, "k{}", columns.len() - 1);
            let mut total = 0;
            for count in &counts[..columns.len() - 1] {
                total += count;
                let _ = writeln!(out, "{}", total);
            }
        }

        for (i, entries) in jacobian.iter().enumerate() {
            if entries.is_empty() {
                continue;
            }
            let _ = writeln!(out, "J{} {}", i, entries.len());
            for (position, coef) in entries {
                let _ = writeln!(out, "{} {}", position, format_number(*coef));
            }
        }
        for (i, entries) in gradients.iter().enumerate() {
            if entries.is_empty() {
                continue;
            }
            let _ = writeln!(out, "G{} {}", i, entries.len());
            for (position, coef) in entries {
                let _ = writeln!(out, "{} {}", position, format_number(*coef));
            }
        }

        let mut auxiliary_files = Vec::new();
        if symbolic {
            let mut row_file = String::new();
            for name in rows
                .iter()
                .map(|r| &r.name)
                .chain(canonical.objectives.iter().map(|o| &o.name))
            {
                let _ = writeln!(row_file, "{}", name);
            }
            let mut col_file = String::new();
            for column in &columns {
                let _ = writeln!(col_file, "{}", column.name);
            }
            auxiliary_files.push(("row".to_string(), row_file));
            auxiliary_files.push(("col".to_string(), col_file));
        }

        Ok(WrittenProblem {
            contents: body.out,
            symbol_map,
            auxiliary_files,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::expr::{exp, Expr};
    use crate::domain::model::Variable;
    use crate::domain::value_objects::ObjectiveSense;

    fn nonlinear_model() -> (Model, VarId, VarId) {
        let mut model = Model::new("m");
        let y = model.add_var(Variable::new("y")).unwrap();
        let x = model.add_var(Variable::new("x")).unwrap();
        model
            .add_objective("obj", Expr::from(y), ObjectiveSense::Minimize)
            .unwrap();
        model.add_constraint("lin", Expr::from(y).geq(0.0)).unwrap();
        model.add_constraint("curve", (exp(x) + y).leq(4.0)).unwrap();
        (model, x, y)
    }

    #[test]
    fn nonlinear_variables_and_rows_come_first() {
        let (model, x, y) = nonlinear_model();
        let written = NlWriter.render(&model, &WriterOptions::default()).unwrap();
        let text = &written.contents;

        assert_eq!(written.symbol_map.symbol(x), Some("v0"));
        assert_eq!(written.symbol_map.symbol(y), Some("v1"));
        assert!(text.contains(" 2 2 1 0 0\t# vars, constraints, objectives, ranges, eqns\n"));
        assert!(text.contains(" 1 0\t# nonlinear constraints, objectives\n"));
        assert!(text.contains(" 1 0 0\t# nonlinear vars in constraints, objectives, both\n"));
        assert!(text.contains("C0\no44\nv0\nC1\nn0\nO0 0\nn0\n"));
        assert!(text.contains("r\n1 4\n2 0\nb\n3\n3\nk1\n1\n"));
        assert!(text.contains("J0 2\n0 0\n1 1\nJ1 1\n1 1\nG0 1\n1 1\n"));
        assert!(written.auxiliary_files.is_empty());
    }

    #[test]
    fn symbolic_labels_add_comments_and_name_files() {
        let (model, _, _) = nonlinear_model();
        let written = NlWriter.render(&model, &WriterOptions::symbolic()).unwrap();
        assert!(written.contents.contains("C0\t#curve\no44\t#exp\nv0\t#x\n"));
        assert_eq!(
            written.auxiliary_files,
            vec![
                ("row".to_string(), "curve\nlin\nobj\n".to_string()),
                ("col".to_string(), "x\ny\n".to_string()),
            ]
        );
    }

    #[test]
    fn long_sums_use_sumlist() {
        let mut model = Model::new("m");
        let x = model.add_indexed_var("x", 0..3, Variable::new("x")).unwrap();
        model
            .add_objective(
                "obj",
                exp(x[0]) + exp(x[1]) + exp(x[2]),
                ObjectiveSense::Maximize,
            )
            .unwrap();
        let text = NlWriter
            .render(&model, &WriterOptions::default())
            .unwrap()
            .contents;
        assert!(text.contains("O0 1\no54\n3\no44\nv0\no44\nv1\no44\nv2\n"));
        assert!(text.contains(" 0 3 0\t# nonlinear vars in constraints, objectives, both\n"));
    }

    #[test]
    fn objective_only_columns_extend_the_objective_count() {
        let mut model = Model::new("m");
        let y = model.add_var(Variable::new("y")).unwrap();
        let x = model.add_var(Variable::new("x")).unwrap();
        model
            .add_objective("obj", exp(y), ObjectiveSense::Minimize)
            .unwrap();
        model.add_constraint("cap", exp(x).leq(1.0)).unwrap();

        let written = NlWriter.render(&model, &WriterOptions::symbolic()).unwrap();
        assert_eq!(written.symbol_map.symbol(x), Some("v0"));
        assert_eq!(written.symbol_map.symbol(y), Some("v1"));
        assert!(written
            .contents
            .contains(" 1 2 0\t# nonlinear vars in constraints, objectives, both\n"));
        assert!(written
            .contents
            .contains(" 1 1\t# nonlinear constraints, objectives\n"));
        assert_eq!(
            written.auxiliary_files,
            vec![
                ("row".to_string(), "cap\nobj\n".to_string()),
                ("col".to_string(), "x\ny\n".to_string()),
            ]
        );
    }

    #[test]
    fn discrete_columns_follow_continuous_ones() {
        let mut model = Model::new("m");
        let z = model.add_var(Variable::integer("z")).unwrap();
        let b = model.add_var(Variable::binary("b")).unwrap();
        let x = model.add_var(Variable::non_negative("x")).unwrap();
        model
            .add_constraint("c", (Expr::from(z) + b + x).leq(10.0))
            .unwrap();
        let written = NlWriter.render(&model, &WriterOptions::default()).unwrap();
        assert_eq!(written.symbol_map.symbol(x), Some("v0"));
        assert_eq!(written.symbol_map.symbol(b), Some("v1"));
        assert_eq!(written.symbol_map.symbol(z), Some("v2"));
        assert!(written
            .contents
            .contains(" 1 1 0 0 0\t# discrete variables: binary, integer, nonlinear (b,c,o)\n"));
        assert!(written.contents.contains("b\n2 0\n0 0 1\n3\n"));
    }
}
