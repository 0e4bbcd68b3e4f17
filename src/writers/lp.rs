// CPLEX LP writer

use super::common::{format_number, signed, ColumnLabels};
use crate::domain::model::Model;
use crate::domain::symbol_map::{Labeler, NumericLabeler, SymbolMap, TextLabeler};
use crate::domain::value_objects::{ObjectiveSense, ProblemFormat};
use crate::domain::writer_service::{
    ProblemWriter, Result, WriterError, WriterOptions, WrittenProblem,
};
use crate::repn::{CanonicalModel, CanonicalRow, RepnOptions, StandardRepn};
use std::fmt::Write as _;
use tracing::debug;

const ONE_VAR_CONSTANT: &str = "ONE_VAR_CONSTANT";

pub struct LpWriter;

impl LpWriter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LpWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn labeler(symbolic: bool, prefix: &str) -> Box<dyn Labeler> {
    if symbolic {
        Box::new(TextLabeler)
    } else {
        Box::new(NumericLabeler::new(prefix))
    }
}

struct LpBody<'a> {
    out: String,
    columns: &'a ColumnLabels<'a>,
    uses_constant: bool,
}

impl LpBody<'_> {
    // Writes the terms of `repn`; returns false when nothing was written
    fn terms(&mut self, repn: &StandardRepn, objective: bool) -> Result<bool> {
        let linear = self.columns.linear_terms(repn)?;
        let quadratic = self.columns.quadratic_terms(repn)?;
        for (position, coef) in &linear {
            let _ = writeln!(self.out, "{} {}", signed(*coef), self.columns.label_at(*position));
        }
        if !quadratic.is_empty() {
            // objective quadratics are written as twice the value over 2
            let factor = if objective { 2.0 } else { 1.0 };
            self.out.push_str("+ [\n");
            for (i, j, coef) in &quadratic {
                let coef = signed(coef * factor);
                if i == j {
                    let _ = writeln!(self.out, "{} {} ^ 2", coef, self.columns.label_at(*i));
                } else {
                    let _ = writeln!(
                        self.out,
                        "{} {} * {}",
                        coef,
                        self.columns.label_at(*i),
                        self.columns.label_at(*j)
                    );
                }
            }
            self.out.push_str(if objective { "] / 2\n" } else { "]\n" });
        }
        Ok(!linear.is_empty() || !quadratic.is_empty())
    }

    fn constant_term(&mut self, value: f64) {
        let _ = writeln!(self.out, "{} {}", signed(value), ONE_VAR_CONSTANT);
        self.uses_constant = true;
    }

    fn row(&mut self, label: &str, row: &CanonicalRow, operator: &str, rhs: f64) -> Result<()> {
        let _ = writeln!(self.out, "{}:", label);
        if !self.terms(&row.repn, false)? {
            self.constant_term(0.0);
        }
        let _ = writeln!(self.out, "{} {}", operator, format_number(rhs));
        self.out.push('\n');
        Ok(())
    }
}

fn bound_text(bound: Option<f64>, infinity: &str) -> String {
    bound.map(format_number).unwrap_or_else(|| infinity.to_string())
}

impl ProblemWriter for LpWriter {
    fn format(&self) -> ProblemFormat {
        ProblemFormat::Lp
    }

    fn render(&self, model: &Model, options: &WriterOptions) -> Result<WrittenProblem> {
        let canonical = CanonicalModel::build(
            model,
            &options.canonical_options(RepnOptions::default(), options.skip_trivial_constraints),
        )?;
        if canonical.objectives.len() > 1 {
            return Err(WriterError::ObjectiveCount {
                format: "LP",
                expected: "at most one",
                found: canonical.objectives.len(),
            });
        }
        let symbolic = options.symbolic_solver_labels;

        let mut symbol_map = SymbolMap::new();
        let columns = ColumnLabels::new(&canonical, labeler(symbolic, "x").as_mut());
        columns.register(&mut symbol_map)?;

        let mut body = LpBody {
            out: String::new(),
            columns: &columns,
            uses_constant: false,
        };
        let _ = writeln!(body.out, "\\* Source model name={} *\\", canonical.name);
        body.out.push('\n');

        match canonical.objectives.first() {
            Some(objective) => {
                if objective.repn.is_nonlinear() {
                    return Err(WriterError::UnsupportedExpression {
                        format: "LP",
                        component: objective.name.clone(),
                    });
                }
                let label = labeler(symbolic, "o").label(&objective.name);
                symbol_map.add_symbol(objective.id, label.clone())?;
                let sense = match objective.sense {
                    ObjectiveSense::Minimize => "min",
                    ObjectiveSense::Maximize => "max",
                };
                let _ = writeln!(body.out, "{} \n{}:", sense, label);
                let written = body.terms(&objective.repn, true)?;
                if objective.repn.constant != 0.0 || !written {
                    body.constant_term(objective.repn.constant);
                }
            }
            None => {
                debug!("no active objective, writing a constant one");
                body.out.push_str("min \nzero_objective:\n");
                body.constant_term(0.0);
            }
        }
        body.out.push_str("\ns.t.\n\n");

        let mut row_labeler = labeler(symbolic, "c");
        for row in &canonical.rows {
            if row.repn.is_nonlinear() {
                return Err(WriterError::UnsupportedExpression {
                    format: "LP",
                    component: row.name.clone(),
                });
            }
            let label = row_labeler.label(&row.name);
            symbol_map.add_symbol(row.id, label.clone())?;
            match (row.lower, row.upper) {
                (Some(lower), Some(_)) if row.is_equality() => {
                    let row_label = format!("c_e_{}_", label);
                    symbol_map.add_alias(row.id, row_label.clone())?;
                    body.row(&row_label, row, "=", lower)?;
                }
                (Some(lower), Some(upper)) => {
                    let lower_label = format!("r_l_{}_", label);
                    let upper_label = format!("r_u_{}_", label);
                    symbol_map.add_alias(row.id, lower_label.clone())?;
                    symbol_map.add_alias(row.id, upper_label.clone())?;
                    body.row(&lower_label, row, ">=", lower)?;
                    body.row(&upper_label, row, "<=", upper)?;
                }
                (Some(lower), None) => {
                    let row_label = format!("c_l_{}_", label);
                    symbol_map.add_alias(row.id, row_label.clone())?;
                    body.row(&row_label, row, ">=", lower)?;
                }
                (None, Some(upper)) => {
                    let row_label = format!("c_u_{}_", label);
                    symbol_map.add_alias(row.id, row_label.clone())?;
                    body.row(&row_label, row, "<=", upper)?;
                }
                (None, None) => {}
            }
        }
        if canonical.rows.is_empty() {
            // some readers reject files without rows
            let _ = writeln!(body.out, "c_e_{}:", ONE_VAR_CONSTANT);
            body.constant_term(1.0);
            body.out.push_str("= 1\n\n");
        }

        let LpBody {
            mut out,
            uses_constant,
            ..
        } = body;

        out.push_str("bounds\n");
        for (column, label) in canonical.columns.iter().zip(columns.labels()) {
            let _ = writeln!(
                out,
                "   {} <= {} <= {}",
                bound_text(column.lower, "-inf"),
                label,
                bound_text(column.upper, "+inf")
            );
        }
        if uses_constant {
            let _ = writeln!(out, "   1 <= {} <= 1", ONE_VAR_CONSTANT);
        }

        let binaries: Vec<&str> = canonical
            .columns
            .iter()
            .zip(columns.labels())
            .filter(|(column, _)| column.domain.is_binary())
            .map(|(_, label)| label.as_str())
            .collect();
        let generals: Vec<&str> = canonical
            .columns
            .iter()
            .zip(columns.labels())
            .filter(|(column, _)| column.domain.is_integer() && !column.domain.is_binary())
            .map(|(_, label)| label.as_str())
            .collect();
        if !binaries.is_empty() {
            out.push_str("binary\n");
            for label in binaries {
                let _ = writeln!(out, "  {}", label);
            }
        }
        if !generals.is_empty() {
            out.push_str("general\n");
            for label in generals {
                let _ = writeln!(out, "  {}", label);
            }
        }
        out.push_str("end\n");

        Ok(WrittenProblem {
            contents: out,
            symbol_map,
            auxiliary_files: Vec::new(),
        })
    }
}
