// Domain service interface for writing models to solver input files
// Every file format implements `ProblemWriter`; callers pick one through the
// writer factory and never depend on a concrete format.

use super::model::{Model, ModelError};
use super::symbol_map::{SymbolError, SymbolMap};
use super::value_objects::{FileDeterminism, ProblemFormat};
use crate::repn::{CanonicalOptions, RepnOptions};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Error types for the writers
#[derive(Debug, thiserror::Error)]
pub enum WriterError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Symbol(#[from] SymbolError),

    #[error("No symbol was assigned to {0}")]
    MissingSymbol(String),

    #[error("The {format} format does not support the unary function \"{function}\"")]
    UnsupportedFunction {
        format: &'static str,
        function: String,
    },

    #[error("The {format} writer can not represent the nonlinear expression in '{component}'")]
    UnsupportedExpression {
        format: &'static str,
        component: String,
    },

    #[error("The BARON writer can not export suffix with name '{0}'. Either remove it from the model or deactivate it.")]
    UnsupportedSuffix(String),

    #[error("The {format} writer requires {expected} active objective(s), found {found}")]
    ObjectiveCount {
        format: &'static str,
        expected: &'static str,
        found: usize,
    },

    #[error("Invalid writer options: {0}")]
    InvalidOptions(String),
}

pub type Result<T> = std::result::Result<T, WriterError>;

/// Options shared by all writers; fields a format does not use are ignored
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WriterOptions {
    /// Use component names instead of numeric labels
    pub symbolic_solver_labels: bool,
    pub file_determinism: FileDeterminism,
    pub skip_trivial_constraints: bool,
    /// Variable names written first, in this order
    pub column_order: Vec<String>,
    /// Constraint names written first, in this order
    pub row_order: Vec<String>,
    /// Write current variable values as starting points
    pub warmstart: bool,
    /// GAMS solver selected for the model type
    pub solver: Option<String>,
    /// GAMS model type, inferred when absent
    pub mtype: Option<String>,
    /// Extra GAMS lines placed before the solve statement
    pub add_options: Vec<String>,
    /// GAMS result file stem; enables `put` statements
    pub put_results: Option<String>,
    /// Entries of the BARON `OPTIONS` block
    pub baron_options: BTreeMap<String, String>,
}

impl WriterOptions {
    pub fn symbolic() -> Self {
        Self {
            symbolic_solver_labels: true,
            ..Self::default()
        }
    }

    /// Parse options from JSON; an empty string gives the defaults
    pub fn from_json(json: &str) -> Result<Self> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(json).map_err(|e| WriterError::InvalidOptions(e.to_string()))
    }

    pub fn canonical_options(&self, repn: RepnOptions, skip_trivial: bool) -> CanonicalOptions {
        CanonicalOptions {
            repn,
            skip_trivial_constraints: skip_trivial,
            file_determinism: self.file_determinism,
            column_order: self.column_order.clone(),
            row_order: self.row_order.clone(),
        }
    }
}

/// Rendered file plus the symbols used in it
#[derive(Debug, Clone, Default)]
pub struct WrittenProblem {
    pub contents: String,
    pub symbol_map: SymbolMap,
    /// `(extension, contents)` pairs written next to the main file
    pub auxiliary_files: Vec<(String, String)>,
}

/// Domain service interface for problem writers
pub trait ProblemWriter: Send + Sync {
    fn format(&self) -> ProblemFormat;

    /// Render the whole file in memory
    fn render(&self, model: &Model, options: &WriterOptions) -> Result<WrittenProblem>;

    /// Write the main file to `out`
    fn write(&self, model: &Model, out: &mut dyn Write, options: &WriterOptions) -> Result<SymbolMap> {
        let written = self.render(model, options)?;
        out.write_all(written.contents.as_bytes())?;
        Ok(written.symbol_map)
    }

    /// Create `path` and any auxiliary files beside it
    fn write_to_path(&self, model: &Model, path: &Path, options: &WriterOptions) -> Result<SymbolMap> {
        let written = self.render(model, options)?;
        std::fs::write(path, written.contents.as_bytes())?;
        for (extension, contents) in &written.auxiliary_files {
            std::fs::write(path.with_extension(extension), contents.as_bytes())?;
        }
        info!(
            format = %self.format(),
            path = %path.display(),
            symbols = written.symbol_map.len(),
            "model written"
        );
        Ok(written.symbol_map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_default_from_partial_json() {
        let options = WriterOptions::from_json(
            r#"{"symbolic_solver_labels": true, "file_determinism": "sorted_by_name"}"#,
        )
        .unwrap();
        assert!(options.symbolic_solver_labels);
        assert_eq!(options.file_determinism, FileDeterminism::SortedByName);
        assert!(!options.warmstart);
        assert_eq!(WriterOptions::from_json("").unwrap(), WriterOptions::default());
    }

    #[test]
    fn unknown_options_are_rejected() {
        let err = WriterOptions::from_json(r#"{"symbolic": true}"#).unwrap_err();
        assert!(matches!(err, WriterError::InvalidOptions(_)));
    }

    #[test]
    fn suffix_message_names_the_suffix() {
        assert_eq!(
            WriterError::UnsupportedSuffix("priorities".to_string()).to_string(),
            "The BARON writer can not export suffix with name 'priorities'. \
             Either remove it from the model or deactivate it."
        );
    }
}
