// Quadratic model construction

pub mod builder;
pub mod model;

pub use builder::{ModelBuilder, PenaltyWeights};
pub use model::{CompiledModel, QuadraticModel, VariablePair};
