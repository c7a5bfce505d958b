pub mod gateway;
pub mod integrator;
pub mod pipeline;
pub mod validator;

#[cfg(feature = "server")]
pub mod grpc_service;
#[cfg(feature = "server")]
pub mod mappers;

pub use gateway::{ModelLimits, SolverGateway};
pub use integrator::{decode, SolutionIntegrator};
pub use pipeline::{
    plan_partition, ClusterOutcome, ClusterProblem, ClusterReport, PartitionPlan, PipelineConfig,
    PipelineReport, PricingPipeline, SolverSettings,
};
pub use validator::{SolutionValidator, ValidationCheck, ValidationReport};

#[cfg(feature = "server")]
pub use grpc_service::PriceOptimizerService;
