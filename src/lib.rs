// Domain layer: Modeling objects and service contracts
pub mod domain;

// Canonical representations shared by writers and solvers
pub mod repn;

// File writers: Concrete implementations of ProblemWriter
pub mod writers;

// Solver adapters: Concrete implementations of SolverService
#[cfg(any(feature = "highs", feature = "coin_cbc"))]
pub mod solver;

// Application layer: gRPC use cases
#[cfg(feature = "server")]
pub mod application;

// Infrastructure layer: External concerns (gRPC server, settings)
#[cfg(feature = "server")]
pub mod infrastructure;

// Re-export commonly used types
pub use domain::{
    Expr, Model, ModelError, ObjectiveSense, ProblemFormat, ProblemWriter, Relation, SolveResults,
    SolverError, SolverService, SymbolMap, Variable, VariableDomain, WriterError, WriterOptions,
};
pub use repn::{CanonicalModel, StandardRepn};
pub use writers::WriterFactory;

#[cfg(feature = "server")]
pub use application::GrpcModelService;

#[cfg(feature = "server")]
pub use infrastructure::{start_server, ServerConfig, Settings};

#[cfg(any(feature = "highs", feature = "coin_cbc"))]
pub use solver::SolverFactory;
#[cfg(feature = "coin_cbc")]
pub use solver::CoinCbcSolver;
#[cfg(feature = "highs")]
pub use solver::HighsSolver;
