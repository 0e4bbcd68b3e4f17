// Domain module: modeling objects and the services that consume them

pub mod expr;
pub mod model;
pub mod solver_service;
pub mod symbol_map;
pub mod value_objects;
pub mod writer_service;

pub use expr::{Expr, ExprNode, Relation};
pub use model::{
    Block, BlockId, ComponentRef, Constraint, ConstraintId, Model, ModelError, ModelId, Objective,
    ObjectiveId, Param, ParamId, Suffix, SuffixId, VarId, Variable,
};
pub use solver_service::{SolveResults, SolverBackend, SolverError, SolverService};
pub use symbol_map::{
    AlphaNumericLabeler, Labeler, NumericLabeler, SymbolError, SymbolMap, TextLabeler,
};
pub use value_objects::{
    FileDeterminism, ObjectiveSense, ProblemFormat, SuffixDirection, TerminationCondition,
    UnaryFunction, VariableDomain,
};
pub use writer_service::{ProblemWriter, WriterError, WriterOptions, WrittenProblem};
