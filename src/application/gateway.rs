// Solver gateway
// Enforces backend capacity limits before delegating to a SolverService

use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::{
    models::{Sample, SolveParams},
    solver_service::{Result, SolverError, SolverService},
};
use crate::error::ConfigError;
use crate::qubo::QuadraticModel;

/// Capacity of the target backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelLimits {
    pub max_variables: usize,
    /// Off-diagonal terms
    pub max_connections: usize,
}

impl Default for ModelLimits {
    fn default() -> Self {
        Self {
            max_variables: 175,
            max_connections: 30625,
        }
    }
}

impl ModelLimits {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.max_variables == 0 {
            return Err(ConfigError::invalid("solver.max_variables", "must be positive"));
        }
        if self.max_connections == 0 {
            return Err(ConfigError::invalid(
                "solver.max_connections",
                "must be positive",
            ));
        }
        Ok(())
    }

    pub fn check(&self, model: &QuadraticModel) -> Result<()> {
        let variables = model.num_variables();
        let connections = model.num_interactions();
        if variables > self.max_variables || connections > self.max_connections {
            return Err(SolverError::SizeExceeded {
                variables,
                max_variables: self.max_variables,
                connections,
                max_connections: self.max_connections,
            });
        }
        Ok(())
    }
}

pub struct SolverGateway {
    solver: Arc<dyn SolverService>,
    limits: ModelLimits,
}

impl SolverGateway {
    pub fn new(solver: Arc<dyn SolverService>, limits: ModelLimits) -> Self {
        Self { solver, limits }
    }

    pub fn solver_name(&self) -> &str {
        self.solver.name()
    }

    pub fn limits(&self) -> ModelLimits {
        self.limits
    }

    /// Best sample of the backend; oversized models never reach it
    pub fn solve(&self, model: &QuadraticModel, params: &SolveParams) -> Result<Sample> {
        if let Err(err) = self.limits.check(model) {
            warn!(error = %err, "Model rejected before dispatch");
            return Err(err);
        }
        if !self.solver.supports(params.mode) {
            return Err(SolverError::SolverNotAvailable(format!(
                "backend '{}' does not serve mode '{}'",
                self.solver.name(),
                params.mode
            )));
        }

        let samples = self.solver.sample(model, params)?;
        let best = samples.into_first().ok_or_else(|| {
            SolverError::ExecutionFailed(format!("backend '{}' returned no samples", self.solver.name()))
        })?;

        debug!(
            solver = self.solver.name(),
            variables = model.num_variables(),
            energy = best.energy,
            "Model solved"
        );
        Ok(best)
    }
}
