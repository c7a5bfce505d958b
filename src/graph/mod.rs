// Product interaction graph and its partitioning into solvable clusters

pub mod bisection;
pub mod community;
pub mod interaction;
pub mod limits;
pub mod louvain;
pub mod partitioner;
pub mod spectral;

pub use bisection::KernighanLinPartitioner;
pub use community::LouvainSpectralPartitioner;
pub use interaction::InteractionGraph;
pub use limits::{max_cluster_size, GraphLimits};
pub use partitioner::{
    GraphPartitioner, Partition, PartitionConfig, PartitionStrategy, PartitionerFactory,
};
