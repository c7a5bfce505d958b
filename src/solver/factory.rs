use crate::domain::{
    solver_service::{Result, SolverService},
    value_objects::SolverMode,
};
use crate::solver::{AnnealingSolver, ExhaustiveSolver};
use std::sync::Arc;

/// Backend name and whether it is compiled into this build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolverInfo {
    pub mode: SolverMode,
    pub name: &'static str,
    pub available: bool,
}

/// Factory for creating solver instances based on configuration
pub struct SolverFactory;

impl SolverFactory {
    /// Create a solver for a specific mode
    pub fn create_from_mode(mode: SolverMode) -> Result<Arc<dyn SolverService>> {
        match mode {
            SolverMode::Exhaustive => Ok(Arc::new(ExhaustiveSolver::new())),
            SolverMode::Annealing => Ok(Arc::new(AnnealingSolver::new())),
            SolverMode::Hybrid => Self::hybrid(),
        }
    }

    /// Get the default solver (simulated annealing)
    pub fn default_solver() -> Arc<dyn SolverService> {
        Arc::new(AnnealingSolver::new())
    }

    pub fn available_solvers() -> Vec<SolverInfo> {
        vec![
            SolverInfo {
                mode: SolverMode::Exhaustive,
                name: "exhaustive",
                available: true,
            },
            SolverInfo {
                mode: SolverMode::Annealing,
                name: "annealing",
                available: true,
            },
            SolverInfo {
                mode: SolverMode::Hybrid,
                name: "HiGHS",
                available: cfg!(feature = "mip"),
            },
        ]
    }

    #[cfg(feature = "mip")]
    fn hybrid() -> Result<Arc<dyn SolverService>> {
        Ok(Arc::new(crate::solver::HighsSolver::new()))
    }

    #[cfg(not(feature = "mip"))]
    fn hybrid() -> Result<Arc<dyn SolverService>> {
        Err(crate::domain::SolverError::SolverNotAvailable(
            "hybrid mode requires the 'mip' feature".to_string(),
        ))
    }
}
