// Canonicalization of expressions and models

pub mod canonical;
pub mod standard;
pub mod visitor;

pub use canonical::{CanonicalColumn, CanonicalModel, CanonicalObjective, CanonicalOptions, CanonicalRow};
pub use standard::{generate_standard_repn, RepnOptions, StandardRepn};
pub use visitor::{contains_function, evaluate, identify_variables, polynomial_degree, walk, ExpressionVisitor};
