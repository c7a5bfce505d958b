// Partitioner
// Contract shared by the partitioning strategies

use serde::Deserialize;
use std::collections::BTreeSet;
use std::fmt;

use super::bisection::KernighanLinPartitioner;
use super::community::LouvainSpectralPartitioner;
use super::interaction::InteractionGraph;
use crate::domain::ProductId;
use crate::error::{ConfigError, PartitionError};

/// Disjoint, size-bounded clusters covering a graph
#[derive(Debug, Clone, Default)]
pub struct Partition {
    clusters: Vec<InteractionGraph>,
}

impl Partition {
    pub fn new(clusters: Vec<InteractionGraph>) -> Self {
        Self { clusters }
    }

    /// Induced subgraphs of `graph` over each node set, in order
    pub fn from_node_sets(graph: &InteractionGraph, node_sets: Vec<BTreeSet<ProductId>>) -> Self {
        Self::new(node_sets.iter().map(|nodes| graph.subgraph(nodes)).collect())
    }

    pub fn clusters(&self) -> &[InteractionGraph] {
        &self.clusters
    }

    pub fn into_clusters(self) -> Vec<InteractionGraph> {
        self.clusters
    }

    pub fn node_sets(&self) -> Vec<BTreeSet<ProductId>> {
        self.clusters.iter().map(|c| c.node_set()).collect()
    }

    pub fn sizes(&self) -> Vec<usize> {
        self.clusters.iter().map(|c| c.node_count()).collect()
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Elasticity weight on edges cut by the partition
    pub fn dropped_weight(&self, graph: &InteractionGraph) -> f64 {
        let kept: f64 = self.clusters.iter().map(|c| c.total_weight()).sum();
        (graph.total_weight() - kept).max(0.0)
    }

    /// Check coverage, disjointness, non-emptiness and the size bound
    pub fn verify(&self, graph: &InteractionGraph, max_size: usize) -> Result<(), PartitionError> {
        let mut seen = BTreeSet::new();

        for (index, cluster) in self.clusters.iter().enumerate() {
            let size = cluster.node_count();
            if size == 0 {
                return Err(PartitionError::EmptyCluster { index });
            }
            if size > max_size {
                return Err(PartitionError::ClusterTooLarge {
                    index,
                    size,
                    max_size,
                });
            }
            for product in cluster.nodes() {
                if !seen.insert(product) {
                    return Err(PartitionError::Overlap { product });
                }
            }
        }

        let missing = graph.nodes().filter(|n| !seen.contains(n)).count();
        if missing > 0 {
            return Err(PartitionError::Uncovered { missing });
        }

        Ok(())
    }
}

/// Strategy that splits a graph into clusters of at most `max_size` nodes
pub trait GraphPartitioner: Send + Sync {
    fn partition(&self, graph: &InteractionGraph, max_size: usize) -> Result<Partition, ConfigError>;

    fn name(&self) -> &str;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionStrategy {
    /// Recursive Kernighan-Lin bisection
    #[default]
    KernighanLin,
    /// Louvain communities refined by spectral clustering
    LouvainSpectral,
}

impl fmt::Display for PartitionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionStrategy::KernighanLin => write!(f, "kernighan_lin"),
            PartitionStrategy::LouvainSpectral => write!(f, "louvain_spectral"),
        }
    }
}

impl std::str::FromStr for PartitionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "kernighan_lin" | "bisection" => Ok(PartitionStrategy::KernighanLin),
            "louvain_spectral" | "community" => Ok(PartitionStrategy::LouvainSpectral),
            other => Err(format!("unknown partition strategy '{}'", other)),
        }
    }
}

/// Partitioning settings, the `[partition]` config section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PartitionConfig {
    pub strategy: PartitionStrategy,
    /// Kernighan-Lin passes per bisection
    pub max_passes: usize,
    /// Shuffle the initial bisection when set
    pub bisection_seed: Option<u64>,
    pub min_resolution: f64,
    pub max_resolution: f64,
    /// Number of resolutions tried when locating the modularity elbow
    pub resolution_steps: usize,
    pub louvain_seed: Option<u64>,
    pub spectral_seed: u64,
    /// Overrides the size derived from prices per product
    pub max_cluster_size: Option<usize>,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            strategy: PartitionStrategy::default(),
            max_passes: 10,
            bisection_seed: None,
            min_resolution: 0.1,
            max_resolution: 2.0,
            resolution_steps: 10,
            louvain_seed: None,
            spectral_seed: 42,
            max_cluster_size: None,
        }
    }
}

impl PartitionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_passes == 0 {
            return Err(ConfigError::invalid("partition.max_passes", "must be positive"));
        }
        if self.resolution_steps == 0 {
            return Err(ConfigError::invalid(
                "partition.resolution_steps",
                "must be positive",
            ));
        }
        if !(self.min_resolution.is_finite() && self.min_resolution > 0.0) {
            return Err(ConfigError::invalid(
                "partition.min_resolution",
                "must be a positive number",
            ));
        }
        if !(self.max_resolution.is_finite() && self.max_resolution >= self.min_resolution) {
            return Err(ConfigError::invalid(
                "partition.max_resolution",
                "must be a number not below min_resolution",
            ));
        }
        if self.max_cluster_size == Some(0) {
            return Err(ConfigError::invalid(
                "partition.max_cluster_size",
                "must be positive",
            ));
        }
        Ok(())
    }
}

/// Factory for creating partitioners based on configuration
pub struct PartitionerFactory;

impl PartitionerFactory {
    pub fn create(config: &PartitionConfig) -> Box<dyn GraphPartitioner> {
        match config.strategy {
            PartitionStrategy::KernighanLin => Box::new(KernighanLinPartitioner::from_config(config)),
            PartitionStrategy::LouvainSpectral => {
                Box::new(LouvainSpectralPartitioner::from_config(config))
            }
        }
    }
}

pub(crate) fn check_max_size(max_size: usize) -> Result<(), ConfigError> {
    if max_size == 0 {
        return Err(ConfigError::invalid(
            "partition.max_cluster_size",
            "must be positive",
        ));
    }
    Ok(())
}
