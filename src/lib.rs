// Domain layer: Pricing data, solutions and the solver contract
pub mod domain;

// Crate-wide error taxonomy
pub mod error;

// Interaction graph and partitioning strategies
pub mod graph;

// Quadratic binary model construction
pub mod qubo;

// Solver adapters: Concrete implementations of SolverService
pub mod solver;

// Application layer: Pipeline orchestration and service use cases
pub mod application;

// Infrastructure layer: Files, configuration, logging and the gRPC server
pub mod infrastructure;

// Re-export commonly used types
pub use domain::{
    CrossElasticityEdge, GlobalSolution, PriceOption, PriceSelection, PricingData, ProductId,
    SolveParams, SolverError, SolverMode, SolverService, VariableId,
};
pub use error::{ConfigError, DataError, Error, PartitionError, Result};

pub use application::{
    PipelineConfig, PipelineReport, PricingPipeline, SolutionValidator, SolverGateway,
};
pub use graph::{InteractionGraph, PartitionConfig, PartitionStrategy};
pub use infrastructure::AppConfig;
pub use qubo::{ModelBuilder, PenaltyWeights, QuadraticModel};
pub use solver::SolverFactory;

#[cfg(feature = "server")]
pub use application::PriceOptimizerService;

#[cfg(feature = "server")]
pub use infrastructure::{start_server, ServerConfig};
