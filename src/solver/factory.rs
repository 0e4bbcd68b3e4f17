use crate::domain::solver_service::{Result, SolverBackend, SolverError, SolverService};
#[cfg(feature = "coin_cbc")]
use crate::solver::CoinCbcSolver;
#[cfg(feature = "highs")]
use crate::solver::HighsSolver;
use std::sync::Arc;

/// Factory for creating solver instances based on configuration
pub struct SolverFactory;

impl SolverFactory {
    /// Create a solver by name: `highs`, `cbc` or `auto`
    pub fn create(name: &str) -> Result<Arc<dyn SolverService>> {
        Self::create_from_backend(name.parse()?)
    }

    /// Create a solver for a specific backend
    pub fn create_from_backend(backend: SolverBackend) -> Result<Arc<dyn SolverService>> {
        match backend {
            #[cfg(feature = "highs")]
            SolverBackend::Auto | SolverBackend::Highs => Ok(Arc::new(HighsSolver::new())),
            #[cfg(all(feature = "coin_cbc", not(feature = "highs")))]
            SolverBackend::Auto => Ok(Arc::new(CoinCbcSolver::new())),
            #[cfg(feature = "coin_cbc")]
            SolverBackend::CoinCbc => Ok(Arc::new(CoinCbcSolver::new())),
            #[allow(unreachable_patterns)]
            other => Err(SolverError::SolverNotAvailable(format!(
                "{} was not compiled into this build",
                other
            ))),
        }
    }

    /// Get the default solver
    pub fn default_solver() -> Result<Arc<dyn SolverService>> {
        Self::create_from_backend(SolverBackend::Auto)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_resolves_to_a_compiled_backend() {
        let solver = SolverFactory::default_solver().unwrap();
        assert!(solver.available());
        assert!(solver.supports_integer());
        assert!(SolverFactory::create("glpk").is_err());
    }

    #[cfg(feature = "highs")]
    #[test]
    fn highs_is_preferred() {
        assert_eq!(SolverFactory::create("auto").unwrap().name(), "HiGHS");
    }
}
