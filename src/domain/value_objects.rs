// Domain value objects shared by the model, the canonicalizer and the writers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Domain of a decision variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariableDomain {
    /// x ∈ ℝ
    Reals,
    /// x ∈ ℝ, x ≥ 0
    NonNegativeReals,
    /// x ∈ ℝ, x ≤ 0
    NonPositiveReals,
    /// x ∈ ℤ
    Integers,
    /// x ∈ ℤ, x ≥ 0
    NonNegativeIntegers,
    /// x ∈ {0, 1}
    Binary,
}

impl VariableDomain {
    /// Bounds implied by the domain alone
    pub fn implied_bounds(&self) -> (Option<f64>, Option<f64>) {
        match self {
            VariableDomain::Reals | VariableDomain::Integers => (None, None),
            VariableDomain::NonNegativeReals | VariableDomain::NonNegativeIntegers => {
                (Some(0.0), None)
            }
            VariableDomain::NonPositiveReals => (None, Some(0.0)),
            VariableDomain::Binary => (Some(0.0), Some(1.0)),
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            VariableDomain::Integers | VariableDomain::NonNegativeIntegers | VariableDomain::Binary
        )
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, VariableDomain::Binary)
    }

    pub fn is_continuous(&self) -> bool {
        !self.is_integer()
    }
}

/// Direction of optimization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectiveSense {
    Minimize,
    Maximize,
}

impl ObjectiveSense {
    pub fn is_minimizing(&self) -> bool {
        matches!(self, ObjectiveSense::Minimize)
    }
}

impl fmt::Display for ObjectiveSense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectiveSense::Minimize => write!(f, "minimize"),
            ObjectiveSense::Maximize => write!(f, "maximize"),
        }
    }
}

/// Intrinsic functions of one argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryFunction {
    Exp,
    Log,
    Log10,
    Sqrt,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Abs,
}

impl UnaryFunction {
    pub const ALL: [UnaryFunction; 14] = [
        UnaryFunction::Exp,
        UnaryFunction::Log,
        UnaryFunction::Log10,
        UnaryFunction::Sqrt,
        UnaryFunction::Sin,
        UnaryFunction::Cos,
        UnaryFunction::Tan,
        UnaryFunction::Asin,
        UnaryFunction::Acos,
        UnaryFunction::Atan,
        UnaryFunction::Sinh,
        UnaryFunction::Cosh,
        UnaryFunction::Tanh,
        UnaryFunction::Abs,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            UnaryFunction::Exp => "exp",
            UnaryFunction::Log => "log",
            UnaryFunction::Log10 => "log10",
            UnaryFunction::Sqrt => "sqrt",
            UnaryFunction::Sin => "sin",
            UnaryFunction::Cos => "cos",
            UnaryFunction::Tan => "tan",
            UnaryFunction::Asin => "asin",
            UnaryFunction::Acos => "acos",
            UnaryFunction::Atan => "atan",
            UnaryFunction::Sinh => "sinh",
            UnaryFunction::Cosh => "cosh",
            UnaryFunction::Tanh => "tanh",
            UnaryFunction::Abs => "abs",
        }
    }

    /// Evaluate the function, returning `None` outside its domain
    pub fn apply(&self, x: f64) -> Option<f64> {
        let value = match self {
            UnaryFunction::Exp => x.exp(),
            UnaryFunction::Log => {
                if x <= 0.0 {
                    return None;
                }
                x.ln()
            }
            UnaryFunction::Log10 => {
                if x <= 0.0 {
                    return None;
                }
                x.log10()
            }
            UnaryFunction::Sqrt => {
                if x < 0.0 {
                    return None;
                }
                x.sqrt()
            }
            UnaryFunction::Sin => x.sin(),
            UnaryFunction::Cos => x.cos(),
            UnaryFunction::Tan => x.tan(),
            UnaryFunction::Asin => {
                if !(-1.0..=1.0).contains(&x) {
                    return None;
                }
                x.asin()
            }
            UnaryFunction::Acos => {
                if !(-1.0..=1.0).contains(&x) {
                    return None;
                }
                x.acos()
            }
            UnaryFunction::Atan => x.atan(),
            UnaryFunction::Sinh => x.sinh(),
            UnaryFunction::Cosh => x.cosh(),
            UnaryFunction::Tanh => x.tanh(),
            UnaryFunction::Abs => x.abs(),
        };
        Some(value)
    }
}

impl fmt::Display for UnaryFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for UnaryFunction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UnaryFunction::ALL
            .iter()
            .copied()
            .find(|func| func.name() == s)
            .ok_or_else(|| format!("unknown function '{}'", s))
    }
}

/// Output file format understood by a writer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProblemFormat {
    /// CPLEX LP
    Lp,
    /// GAMS model
    Gams,
    /// BARON .bar
    Baron,
    /// AMPL NL (text)
    Nl,
}

impl ProblemFormat {
    pub const ALL: [ProblemFormat; 4] = [
        ProblemFormat::Lp,
        ProblemFormat::Gams,
        ProblemFormat::Baron,
        ProblemFormat::Nl,
    ];

    pub fn extension(&self) -> &'static str {
        match self {
            ProblemFormat::Lp => "lp",
            ProblemFormat::Gams => "gms",
            ProblemFormat::Baron => "bar",
            ProblemFormat::Nl => "nl",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        ProblemFormat::ALL
            .iter()
            .copied()
            .find(|format| format.extension().eq_ignore_ascii_case(ext))
    }
}

impl fmt::Display for ProblemFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProblemFormat::Lp => write!(f, "CPLEX LP"),
            ProblemFormat::Gams => write!(f, "GAMS"),
            ProblemFormat::Baron => write!(f, "BARON"),
            ProblemFormat::Nl => write!(f, "AMPL NL"),
        }
    }
}

impl FromStr for ProblemFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lp" | "cpxlp" => Ok(ProblemFormat::Lp),
            "gams" | "gms" => Ok(ProblemFormat::Gams),
            "baron" | "bar" => Ok(ProblemFormat::Baron),
            "nl" | "ampl" => Ok(ProblemFormat::Nl),
            other => Err(format!("unknown problem format '{}'", other)),
        }
    }
}

/// Direction of data flow for a suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SuffixDirection {
    /// Not exchanged with solvers
    Local,
    /// Sent to the solver
    Export,
    /// Read back from the solver
    Import,
    ImportExport,
}

impl SuffixDirection {
    pub fn is_export(&self) -> bool {
        matches!(self, SuffixDirection::Export | SuffixDirection::ImportExport)
    }

    pub fn is_import(&self) -> bool {
        matches!(self, SuffixDirection::Import | SuffixDirection::ImportExport)
    }
}

impl FromStr for SuffixDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "" | "local" => Ok(SuffixDirection::Local),
            "export" => Ok(SuffixDirection::Export),
            "import" => Ok(SuffixDirection::Import),
            "import_export" | "importexport" => Ok(SuffixDirection::ImportExport),
            other => Err(format!("unknown suffix direction '{}'", other)),
        }
    }
}

/// How rows and columns are ordered in written files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileDeterminism {
    /// Declaration order
    #[default]
    Ordered,
    /// Lexicographic by component name
    SortedByName,
}

/// Why a solver stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationCondition {
    Unknown,
    MaxTimeLimit,
    IterationLimit,
    Optimal,
    Unbounded,
    Infeasible,
    InfeasibleOrUnbounded,
    Error,
    Interrupted,
    LicensingProblems,
}

impl TerminationCondition {
    pub fn has_solution(&self) -> bool {
        matches!(
            self,
            TerminationCondition::Optimal
                | TerminationCondition::MaxTimeLimit
                | TerminationCondition::IterationLimit
        )
    }
}

impl fmt::Display for TerminationCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationCondition::Unknown => write!(f, "Unknown"),
            TerminationCondition::MaxTimeLimit => write!(f, "Time Limit Reached"),
            TerminationCondition::IterationLimit => write!(f, "Iteration Limit Reached"),
            TerminationCondition::Optimal => write!(f, "Optimal"),
            TerminationCondition::Unbounded => write!(f, "Unbounded"),
            TerminationCondition::Infeasible => write!(f, "Infeasible"),
            TerminationCondition::InfeasibleOrUnbounded => write!(f, "Infeasible or Unbounded"),
            TerminationCondition::Error => write!(f, "Error"),
            TerminationCondition::Interrupted => write!(f, "Interrupted"),
            TerminationCondition::LicensingProblems => write!(f, "Licensing Problems"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_domain_implies_unit_bounds() {
        assert_eq!(
            VariableDomain::Binary.implied_bounds(),
            (Some(0.0), Some(1.0))
        );
        assert!(VariableDomain::Binary.is_integer());
        assert!(!VariableDomain::NonNegativeReals.is_integer());
    }

    #[test]
    fn formats_parse_from_names_and_extensions() {
        assert_eq!("bar".parse::<ProblemFormat>(), Ok(ProblemFormat::Baron));
        assert_eq!("GAMS".parse::<ProblemFormat>(), Ok(ProblemFormat::Gams));
        assert_eq!(ProblemFormat::from_extension("LP"), Some(ProblemFormat::Lp));
        assert!("mps".parse::<ProblemFormat>().is_err());
    }

    #[test]
    fn unary_functions_reject_out_of_domain_arguments() {
        assert_eq!(UnaryFunction::Log.apply(-1.0), None);
        assert_eq!(UnaryFunction::Sqrt.apply(4.0), Some(2.0));
        assert_eq!("tanh".parse::<UnaryFunction>(), Ok(UnaryFunction::Tanh));
    }
}
