// BARON .bar writer

use super::common::{format_number, render_body, ColumnLabels, Dialect};
use crate::domain::model::{ComponentRef, Model};
use crate::domain::symbol_map::{AlphaNumericLabeler, Labeler, NumericLabeler, SymbolMap};
use crate::domain::value_objects::{ProblemFormat, VariableDomain};
use crate::domain::writer_service::{
    ProblemWriter, Result, WriterError, WriterOptions, WrittenProblem,
};
use crate::repn::{CanonicalModel, RepnOptions};
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// The only export suffix BARON understands
const PRIORITY_SUFFIX: &str = "priority";

pub struct BaronWriter;

impl BaronWriter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for BaronWriter {
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

fn section(out: &mut String, keyword: &str, names: &[&str]) {
    if !names.is_empty() {
        let _ = writeln!(out, "{} {};\n", keyword, names.join(", "));
    }
}

fn block(out: &mut String, keyword: &str, entries: &[(String, f64)]) {
    if entries.is_empty() {
        return;
    }
    let _ = writeln!(out, "{}{{", keyword);
    for (label, value) in entries {
        let _ = writeln!(out, "{}: {};", label, format_number(*value));
    }
    out.push_str("}\n\n");
}

impl ProblemWriter for BaronWriter {
    fn format(&self) -> ProblemFormat {
        ProblemFormat::Baron
    }

    fn render(&self, model: &Model, options: &WriterOptions) -> Result<WrittenProblem> {
        let mut priorities = None;
        for suffix in model.active_export_suffixes() {
            if suffix.name != PRIORITY_SUFFIX {
                return Err(WriterError::UnsupportedSuffix(suffix.name.clone()));
            }
            priorities = Some(&suffix.values);
        }

        let canonical = CanonicalModel::build(
            model,
            &options.canonical_options(RepnOptions::default(), options.skip_trivial_constraints),
        )?;
        let [objective] = canonical.objectives.as_slice() else {
            return Err(WriterError::ObjectiveCount {
                format: "BARON",
                expected: "exactly one",
                found: canonical.objectives.len(),
            });
        };
        let symbolic = options.symbolic_solver_labels;

        let mut symbol_map = SymbolMap::new();
        let columns = ColumnLabels::new(&canonical, labeler(symbolic, "x").as_mut());
        columns.register(&mut symbol_map)?;

        let mut out = String::new();
        let mut baron_options = BTreeMap::new();
        baron_options.insert("Summary".to_string(), "0".to_string());
        baron_options.extend(options.baron_options.clone());
        out.push_str("OPTIONS {\n");
        for (key, value) in &baron_options {
            let _ = writeln!(out, "{}: {};", key, value);
        }
        out.push_str("}\n\n");

        let mut binary = Vec::new();
        let mut integer = Vec::new();
        let mut positive = Vec::new();
        let mut free = Vec::new();
        let mut lower_bounds = Vec::new();
        let mut upper_bounds = Vec::new();
        for (column, label) in canonical.columns.iter().zip(columns.labels()) {
            match column.domain {
                VariableDomain::Binary => {
                    binary.push(label.as_str());
                    continue;
                }
                VariableDomain::Integers | VariableDomain::NonNegativeIntegers => {
                    integer.push(label.as_str());
                    if let Some(lower) = column.lower {
                        lower_bounds.push((label.clone(), lower));
                    }
                }
                _ if column.lower == Some(0.0) => positive.push(label.as_str()),
                _ => {
                    free.push(label.as_str());
                    if let Some(lower) = column.lower {
                        lower_bounds.push((label.clone(), lower));
                    }
                }
            }
            if let Some(upper) = column.upper {
                upper_bounds.push((label.clone(), upper));
            }
        }
        section(&mut out, "BINARY_VARIABLES", &binary);
        section(&mut out, "INTEGER_VARIABLES", &integer);
        section(&mut out, "POSITIVE_VARIABLES", &positive);
        section(&mut out, "VARIABLES", &free);
        block(&mut out, "LOWER_BOUNDS", &lower_bounds);
        block(&mut out, "UPPER_BOUNDS", &upper_bounds);

        if let Some(values) = priorities {
            let entries: Vec<(String, f64)> = canonical
                .columns
                .iter()
                .zip(columns.labels())
                .filter_map(|(column, label)| {
                    values
                        .get(&ComponentRef::Var(column.id))
                        .map(|priority| (label.clone(), *priority))
                })
                .collect();
            block(&mut out, "BRANCHING_PRIORITIES", &entries);
        }

        let mut row_labeler = labeler(symbolic, "c");
        let mut equations = String::new();
        let mut names = Vec::new();
        for row in &canonical.rows {
            let label = row_labeler.label(&row.name);
            symbol_map.add_symbol(row.id, label.clone())?;
            let body = render_body(&row.repn, false, Dialect::Baron, &columns)?;
            let _ = match (row.lower, row.upper) {
                (Some(lower), Some(_)) if row.is_equality() => {
                    writeln!(equations, "{}: {} == {};", label, body, format_number(lower))
                }
                (Some(lower), Some(upper)) => writeln!(
                    equations,
                    "{}: {} <= {} <= {};",
                    label,
                    format_number(lower),
                    body,
                    format_number(upper)
                ),
                (Some(lower), None) => {
                    writeln!(equations, "{}: {} >= {};", label, body, format_number(lower))
                }
                (None, Some(upper)) => {
                    writeln!(equations, "{}: {} <= {};", label, body, format_number(upper))
                }
                (None, None) => continue,
            };
            names.push(label);
        }
        if !names.is_empty() {
            let _ = writeln!(out, "EQUATIONS {};\n", names.join(", "));
            out.push_str(&equations);
            out.push('\n');
        }

        symbol_map.add_symbol(objective.id, "OBJ")?;
        let sense = if objective.sense.is_minimizing() {
            "minimize"
        } else {
            "maximize"
        };
        let body = render_body(&objective.repn, true, Dialect::Baron, &columns)?;
        let _ = writeln!(out, "OBJ: {} {};", sense, body);

        if options.warmstart {
            let start: Vec<(String, f64)> = canonical
                .columns
                .iter()
                .zip(columns.labels())
                .filter_map(|(column, label)| column.value.map(|value| (label.clone(), value)))
                .collect();
            if !start.is_empty() {
                out.push('\n');
                block(&mut out, "STARTING_POINT", &start);
                out.truncate(out.trim_end().len() + 1);
            }
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
    use crate::domain::expr::{log10, sin, sqrt, Expr};
    use crate::domain::model::Variable;
    use crate::domain::value_objects::{ObjectiveSense, SuffixDirection};

    #[test]
    fn trigonometric_functions_are_rejected() {
        let mut model = Model::new("m");
        let x = model
            .add_var(Variable::new("x").with_bounds(Some(0.0), Some(6.283)))
            .unwrap();
        model
            .add_objective("obj", sin(x), ObjectiveSense::Minimize)
            .unwrap();
        let err = BaronWriter.render(&model, &WriterOptions::default()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "The BARON .BAR format does not support the unary function \"sin\""
        );
    }

    #[test]
    fn supported_functions_are_rewritten() {
        let mut model = Model::new("m");
        let x = model.add_var(Variable::non_negative("x")).unwrap();
        model
            .add_objective("obj", sqrt(x) + log10(x), ObjectiveSense::Minimize)
            .unwrap();
        let text = BaronWriter
            .render(&model, &WriterOptions::default())
            .unwrap()
            .contents;
        assert!(text.contains("OBJ: minimize x1^0.5 + (log(x1)/log(10));"));
    }

    #[test]
    fn unknown_export_suffixes_are_rejected() {
        let mut model = Model::new("m");
        let x = model.add_var(Variable::binary("x")).unwrap();
        model.add_objective("obj", x, ObjectiveSense::Maximize).unwrap();
        let suffix = model.add_suffix("priorities", SuffixDirection::Export).unwrap();
        model.set_suffix_value(suffix, x, 1.0).unwrap();
        assert!(matches!(
            BaronWriter.render(&model, &WriterOptions::default()),
            Err(WriterError::UnsupportedSuffix(name)) if name == "priorities"
        ));

        model.deactivate_suffix(suffix).unwrap();
        assert!(BaronWriter.render(&model, &WriterOptions::default()).is_ok());
    }

    #[test]
    fn group_priorities_become_branching_priorities() {
        let mut model = Model::new("m");
        let x = model.add_indexed_var("x", 0..3, Variable::binary("x")).unwrap();
        model
            .add_objective("obj", x[0] + x[1] + x[2], ObjectiveSense::Maximize)
            .unwrap();
        let priority = model.add_suffix("priority", SuffixDirection::Export).unwrap();
        model.set_suffix_values(priority, x[1..].iter().copied(), 3.0).unwrap();
        let text = BaronWriter
            .render(&model, &WriterOptions::default())
            .unwrap()
            .contents;
        assert!(text.contains("BRANCHING_PRIORITIES{\nx2: 3;\nx3: 3;\n}\n"));
    }

    #[test]
    fn user_options_join_the_defaults() {
        let mut model = Model::new("m");
        let x = model.add_var(Variable::new("x")).unwrap();
        model.add_objective("obj", Expr::from(x), ObjectiveSense::Minimize).unwrap();
        let mut options = WriterOptions::default();
        options.baron_options.insert("MaxTime".to_string(), "60".to_string());
        let text = BaronWriter.render(&model, &options).unwrap().contents;
        assert!(text.starts_with("OPTIONS {\nMaxTime: 60;\nSummary: 0;\n}\n"));
    }
}
