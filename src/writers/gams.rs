// GAMS writer
//
// Produces a self-contained .gms file: declarations, equations, bounds, the
// solve statement and the status scalars a caller needs to read results back.

use super::common::{
    format_number, render_body, split_long_lines, ColumnLabels, Dialect, GAMS_MAX_LINE_LENGTH,
};
use crate::domain::model::Model;
use crate::domain::symbol_map::{AlphaNumericLabeler, Labeler, NumericLabeler, SymbolMap};
use crate::domain::value_objects::{ProblemFormat, UnaryFunction, VariableDomain};
use crate::domain::writer_service::{
    ProblemWriter, Result, WriterError, WriterOptions, WrittenProblem,
};
use crate::repn::{contains_function, CanonicalColumn, CanonicalModel, RepnOptions};
use std::fmt::Write as _;
use tracing::debug;

const OBJECTIVE_VARIABLE: &str = "GAMS_OBJECTIVE";

const STATUS_SCALARS: [(&str, &str, &str); 9] = [
    ("MODELSTAT", "model status", "modelstat"),
    ("SOLVESTAT", "solve status", "solvestat"),
    ("OBJEST", "best objective", "objest"),
    ("OBJVAL", "objective value", "objval"),
    ("NUMVAR", "number of variables", "numvar"),
    ("NUMEQU", "number of equations", "numequ"),
    ("NUMDVAR", "number of discrete variables", "numdvar"),
    ("NUMNZ", "number of nonzeros", "numnz"),
    ("ETSOLVE", "time to execute solve statement", "etsolve"),
];

pub struct GamsWriter;

impl GamsWriter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for GamsWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn labeler(symbolic: bool, prefix: &str) -> Box<dyn Labeler> {
    if symbolic {
        Box::new(AlphaNumericLabeler)
    } else {
        Box::new(NumericLabeler::new(prefix))
    }
}

/// GAMS model type for the canonical model
fn infer_model_type(canonical: &CanonicalModel) -> &'static str {
    let discrete = canonical.has_discrete_columns();
    match canonical.max_degree() {
        Some(0) | Some(1) => {
            if discrete {
                "mip"
            } else {
                "lp"
            }
        }
        Some(_) => {
            if discrete {
                "miqcp"
            } else {
                "qcp"
            }
        }
        None => {
            let nonsmooth = canonical
                .objectives
                .iter()
                .map(|objective| &objective.repn)
                .chain(canonical.rows.iter().map(|row| &row.repn))
                .filter_map(|repn| repn.nonlinear.as_ref())
                .any(|expr| contains_function(expr, UnaryFunction::Abs));
            match (discrete, nonsmooth) {
                (true, _) => "minlp",
                (false, true) => "dnlp",
                (false, false) => "nlp",
            }
        }
    }
}

#[derive(Default)]
struct Categories<'a> {
    free: Vec<&'a str>,
    positive: Vec<&'a str>,
    binary: Vec<&'a str>,
    integer: Vec<&'a str>,
}

fn declare(out: &mut String, keyword: &str, names: &[&str]) {
    if names.is_empty() {
        return;
    }
    let _ = writeln!(out, "{}", keyword);
    let _ = writeln!(out, "\t{};", names.join("\n\t"));
    out.push('\n');
}

fn write_bounds(out: &mut String, column: &CanonicalColumn, label: &str) {
    match column.domain {
        VariableDomain::Binary => {}
        VariableDomain::Integers | VariableDomain::NonNegativeIntegers => {
            let lower = column.lower.map(format_number).unwrap_or_else(|| "-inf".to_string());
            let upper = column.upper.map(format_number).unwrap_or_else(|| "+inf".to_string());
            let _ = writeln!(out, "{}.lo = {};", label, lower);
            let _ = writeln!(out, "{}.up = {};", label, upper);
        }
        _ => {
            match column.lower {
                Some(lower) if lower != 0.0 => {
                    let _ = writeln!(out, "{}.lo = {};", label, format_number(lower));
                }
                _ => {}
            }
            if let Some(upper) = column.upper {
                let _ = writeln!(out, "{}.up = {};", label, format_number(upper));
            }
        }
    }
}

impl ProblemWriter for GamsWriter {
    fn format(&self) -> ProblemFormat {
        ProblemFormat::Gams
    }

    fn render(&self, model: &Model, options: &WriterOptions) -> Result<WrittenProblem> {
        let canonical = CanonicalModel::build(
            model,
            &options.canonical_options(RepnOptions::default(), options.skip_trivial_constraints),
        )?;
        let [objective] = canonical.objectives.as_slice() else {
            return Err(WriterError::ObjectiveCount {
                format: "GAMS",
                expected: "exactly one",
                found: canonical.objectives.len(),
            });
        };
        let symbolic = options.symbolic_solver_labels;

        let mut symbol_map = SymbolMap::new();
        let columns = ColumnLabels::new(&canonical, labeler(symbolic, "x").as_mut());
        columns.register(&mut symbol_map)?;

        let mut row_labeler = labeler(symbolic, "c");
        let mut equation_names = Vec::new();
        let mut equations = String::new();
        for row in &canonical.rows {
            let label = row_labeler.label(&row.name);
            symbol_map.add_symbol(row.id, label.clone())?;
            let body = render_body(&row.repn, false, Dialect::Gams, &columns)?;
            let mut line = String::new();
            match (row.lower, row.upper) {
                (Some(lower), Some(_)) if row.is_equality() => {
                    let _ = write!(line, "{}.. {} =e= {} ;", label, body, format_number(lower));
                    equation_names.push(label);
                }
                (Some(lower), Some(upper)) => {
                    let (lo, hi) = (format!("{}_lo", label), format!("{}_hi", label));
                    symbol_map.add_alias(row.id, lo.clone())?;
                    symbol_map.add_alias(row.id, hi.clone())?;
                    let _ = writeln!(line, "{}.. {} =l= {} ;", lo, format_number(lower), body);
                    let _ = write!(line, "{}.. {} =l= {} ;", hi, body, format_number(upper));
                    equation_names.push(lo);
                    equation_names.push(hi);
                }
                (Some(lower), None) => {
                    let _ = write!(line, "{}.. {} =g= {} ;", label, body, format_number(lower));
                    equation_names.push(label);
                }
                (None, Some(upper)) => {
                    let _ = write!(line, "{}.. {} =l= {} ;", label, body, format_number(upper));
                    equation_names.push(label);
                }
                (None, None) => continue,
            }
            equations.push_str(&split_long_lines(&line, GAMS_MAX_LINE_LENGTH));
            equations.push('\n');
        }

        let objective_label = labeler(symbolic, "o").label(&objective.name);
        symbol_map.add_symbol(objective.id, objective_label.clone())?;
        let objective_body = render_body(&objective.repn, true, Dialect::Gams, &columns)?;
        let objective_line = format!(
            "{}.. {} =e= {} ;",
            objective_label, OBJECTIVE_VARIABLE, objective_body
        );
        equations.push_str(&split_long_lines(&objective_line, GAMS_MAX_LINE_LENGTH));
        equations.push('\n');
        equation_names.push(objective_label);

        let mut categories = Categories::default();
        categories.free.push(OBJECTIVE_VARIABLE);
        for (column, label) in canonical.columns.iter().zip(columns.labels()) {
            let label = label.as_str();
            match column.domain {
                VariableDomain::Binary => categories.binary.push(label),
                VariableDomain::Integers | VariableDomain::NonNegativeIntegers => {
                    categories.integer.push(label)
                }
                _ if column.lower.is_some_and(|lower| lower >= 0.0) => {
                    categories.positive.push(label)
                }
                _ => categories.free.push(label),
            }
        }

        let mut out = String::new();
        out.push_str("$offlisting\n$offdigit\n\n");
        let equation_refs: Vec<&str> = equation_names.iter().map(String::as_str).collect();
        declare(&mut out, "EQUATIONS", &equation_refs);
        declare(&mut out, "VARIABLES", &categories.free);
        declare(&mut out, "POSITIVE VARIABLES", &categories.positive);
        declare(&mut out, "BINARY VARIABLES", &categories.binary);
        declare(&mut out, "INTEGER VARIABLES", &categories.integer);
        out.push_str(&equations);
        out.push('\n');

        for (column, label) in canonical.columns.iter().zip(columns.labels()) {
            write_bounds(&mut out, column, label);
        }
        if options.warmstart {
            for (column, label) in canonical.columns.iter().zip(columns.labels()) {
                if let Some(value) = column.value {
                    let _ = writeln!(out, "{}.l = {};", label, format_number(value));
                }
            }
        }

        let model_type = options
            .mtype
            .clone()
            .unwrap_or_else(|| infer_model_type(&canonical).to_string());
        debug!(model_type = %model_type, "GAMS model type selected");
        let direction = if objective.sense.is_minimizing() {
            "minimizing"
        } else {
            "maximizing"
        };

        out.push_str("\nMODEL GAMS_MODEL /all/ ;\n");
        out.push_str("option solprint=off;\n");
        out.push_str("option limrow=0;\n");
        out.push_str("option limcol=0;\n");
        out.push_str("option solvelink=5;\n");
        if let Some(solver) = &options.solver {
            let _ = writeln!(out, "option {}={};", model_type, solver);
        }
        for line in &options.add_options {
            let _ = writeln!(out, "{}", line);
        }
        let _ = writeln!(
            out,
            "SOLVE GAMS_MODEL USING {} {} {};",
            model_type, direction, OBJECTIVE_VARIABLE
        );

        for (name, description, attribute) in STATUS_SCALARS {
            let _ = writeln!(out, "\nScalar {} '{}';", name, description);
            let _ = writeln!(out, "{} = GAMS_MODEL.{};", name, attribute);
        }

        if let Some(stem) = &options.put_results {
            out.push_str(&format!("\nfile results /'{}.dat'/;\n", stem));
            out.push_str("results.nd=15;\nresults.nw=21;\nput results;\n");
            out.push_str("put 'SYMBOL  :  LEVEL  :  MARGINAL' /;\n");
            for label in columns.labels() {
                let _ = writeln!(out, "put '{0}' {0}.l {0}.m /;", label);
            }
            for name in &equation_names {
                let _ = writeln!(out, "put '{0}' {0}.l {0}.m /;", name);
            }
            let _ = writeln!(out, "put '{0}' {0}.l {0}.m /;", OBJECTIVE_VARIABLE);
            out.push_str("putclose results;\n");

            out.push_str(&format!("\nfile statresults /'{}stat.dat'/;\n", stem));
            out.push_str("statresults.nd=15;\nstatresults.nw=21;\nput statresults;\n");
            out.push_str("put 'SYMBOL   :   VALUE' /;\n");
            for (name, _, _) in STATUS_SCALARS {
                let _ = writeln!(out, "put '{0}' {0} /;", name);
            }
            out.push_str("putclose statresults;\n");
        }

        Ok(WrittenProblem {
            contents: out,
            symbol_map,
            auxiliary_files: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::expr::{abs, exp, Expr};
    use crate::domain::model::Variable;
    use crate::domain::value_objects::ObjectiveSense;

    fn render(model: &Model) -> String {
        GamsWriter
            .render(model, &WriterOptions::default())
            .unwrap()
            .contents
    }

    #[test]
    fn model_type_follows_the_hardest_expression() {
        let mut model = Model::new("m");
        let x = model.add_var(Variable::new("x")).unwrap();
        let y = model.add_var(Variable::new("y")).unwrap();
        model.add_objective("obj", x + y, ObjectiveSense::Minimize).unwrap();
        model.add_constraint("c", (x * y).leq(1.0)).unwrap();
        assert!(render(&model).contains("USING qcp minimizing"));

        model.add_constraint("d", exp(x).leq(2.0)).unwrap();
        assert!(render(&model).contains("USING nlp minimizing"));

        model.add_constraint("e", abs(y).leq(3.0)).unwrap();
        assert!(render(&model).contains("USING dnlp minimizing"));

        let z = model.add_var(Variable::binary("z")).unwrap();
        model.add_constraint("f", Expr::from(z).leq(x)).unwrap();
        assert!(render(&model).contains("USING minlp minimizing"));
    }

    #[test]
    fn explicit_model_type_and_solver_win() {
        let mut model = Model::new("m");
        let x = model.add_var(Variable::non_negative("x")).unwrap();
        model.add_objective("obj", x, ObjectiveSense::Maximize).unwrap();
        model.add_constraint("c", Expr::from(x).leq(1.0)).unwrap();
        let options = WriterOptions {
            mtype: Some("rmip".to_string()),
            solver: Some("cplex".to_string()),
            add_options: vec!["option reslim=10;".to_string()],
            ..WriterOptions::default()
        };
        let text = GamsWriter.render(&model, &options).unwrap().contents;
        assert!(text.contains(
            "option rmip=cplex;\noption reslim=10;\nSOLVE GAMS_MODEL USING rmip maximizing GAMS_OBJECTIVE;"
        ));
    }

    #[test]
    fn requires_exactly_one_objective() {
        let mut model = Model::new("m");
        let x = model.add_var(Variable::new("x")).unwrap();
        model.add_constraint("c", Expr::from(x).leq(1.0)).unwrap();
        assert!(matches!(
            GamsWriter.render(&model, &WriterOptions::default()),
            Err(WriterError::ObjectiveCount { found: 0, .. })
        ));
    }

    #[test]
    fn powers_use_gams_syntax() {
        let mut model = Model::new("m");
        let x = model.add_var(Variable::new("x")).unwrap();
        model
            .add_objective("obj", Expr::from(x).pow(3.0) + Expr::from(x).pow(0.5), ObjectiveSense::Minimize)
            .unwrap();
        assert!(render(&model).contains("o1.. GAMS_OBJECTIVE =e= power(x1, 3) + x1 ** 0.5 ;"));
    }
}
