// Domain service interface for solving quadratic binary models
// Defines the contract that any optimization backend must follow (Dependency Inversion Principle)

use super::models::{SampleSet, SolveParams};
use super::value_objects::SolverMode;
use crate::qubo::QuadraticModel;

/// Error types for the solver service
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SolverError {
    #[error("Invalid problem: {0}")]
    InvalidProblem(String),

    #[error("Solver not available: {0}")]
    SolverNotAvailable(String),

    #[error("Solver execution failed: {0}")]
    ExecutionFailed(String),

    #[error(
        "Model size exceeded: {variables} variables (max {max_variables}), \
         {connections} connections (max {max_connections})"
    )]
    SizeExceeded {
        variables: usize,
        max_variables: usize,
        connections: usize,
        max_connections: usize,
    },

    #[error("Solver timed out after {0:.1}s")]
    Timeout(f64),
}

impl SolverError {
    /// Failures worth another attempt on the same model
    pub fn is_transient(&self) -> bool {
        matches!(self, SolverError::ExecutionFailed(_))
    }
}

pub type Result<T> = std::result::Result<T, SolverError>;

/// Domain service interface for optimization backends
///
/// Backends receive a quadratic binary model and return candidate assignments
/// with their energy. Exhaustive, hybrid and annealing backends are swappable
/// behind this trait.
pub trait SolverService: Send + Sync {
    /// Sample low-energy assignments of the model
    fn sample(&self, model: &QuadraticModel, params: &SolveParams) -> Result<SampleSet>;

    /// Validate a model without solving it
    fn validate(&self, model: &QuadraticModel) -> Result<()> {
        let mut errors = Vec::new();

        for (pair, coefficient) in model.iter() {
            if !coefficient.is_finite() {
                errors.push(format!(
                    "Coefficient of ({}, {}) is not finite",
                    pair.first(),
                    pair.second()
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(SolverError::InvalidProblem(errors.join("; ")))
        }
    }

    /// Get the name of this solver backend
    fn name(&self) -> &str;

    /// Check if this backend serves the given mode
    fn supports(&self, mode: SolverMode) -> bool;
}
