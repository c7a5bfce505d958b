// Solver adapters module

pub mod annealing;
pub mod exhaustive;
pub mod factory;
#[cfg(feature = "mip")]
pub mod highs_solver;

pub use annealing::AnnealingSolver;
pub use exhaustive::ExhaustiveSolver;
pub use factory::{SolverFactory, SolverInfo};
#[cfg(feature = "mip")]
pub use highs_solver::HighsSolver;
