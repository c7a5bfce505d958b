// Community partitioner
// Louvain at the modularity elbow, then spectral refinement of oversized communities

use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

use super::interaction::InteractionGraph;
use super::louvain::{community_count, group, modularity, Louvain};
use super::partitioner::{check_max_size, GraphPartitioner, Partition, PartitionConfig};
use super::spectral::{fiedler_bisect, SpectralClustering};
use crate::domain::ProductId;
use crate::error::ConfigError;

/// Modularity and community count observed at one resolution
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepPoint {
    pub resolution: f64,
    pub modularity: f64,
    pub communities: usize,
}

#[derive(Debug, Clone)]
pub struct LouvainSpectralPartitioner {
    min_resolution: f64,
    max_resolution: f64,
    resolution_steps: usize,
    louvain_seed: Option<u64>,
    spectral_seed: u64,
}

impl LouvainSpectralPartitioner {
    pub fn from_config(config: &PartitionConfig) -> Self {
        Self {
            min_resolution: config.min_resolution,
            max_resolution: config.max_resolution,
            resolution_steps: config.resolution_steps,
            louvain_seed: config.louvain_seed,
            spectral_seed: config.spectral_seed,
        }
    }

    /// Evenly spaced resolutions from min to max inclusive
    pub fn resolutions(&self) -> Vec<f64> {
        let steps = self.resolution_steps.max(1);
        if steps == 1 {
            return vec![self.min_resolution];
        }
        let step = (self.max_resolution - self.min_resolution) / (steps - 1) as f64;
        (0..steps)
            .map(|i| self.min_resolution + step * i as f64)
            .collect()
    }

    /// Run Louvain at each resolution; modularity is scored at resolution 1
    pub fn sweep(&self, graph: &InteractionGraph) -> Vec<SweepPoint> {
        self.resolutions()
            .into_iter()
            .map(|resolution| {
                let communities = Louvain::new(resolution, self.louvain_seed).detect(graph);
                SweepPoint {
                    resolution,
                    modularity: modularity(graph, &communities, 1.0),
                    communities: community_count(&communities),
                }
            })
            .collect()
    }

    /// Community count right after the largest modularity jump
    pub fn elbow(points: &[SweepPoint]) -> Option<SweepPoint> {
        if points.len() < 2 {
            return points.first().copied();
        }
        let mut best = 0;
        let mut best_jump = f64::NEG_INFINITY;
        for i in 0..points.len() - 1 {
            let jump = points[i + 1].modularity - points[i].modularity;
            if jump > best_jump {
                best = i;
                best_jump = jump;
            }
        }
        Some(points[best + 1])
    }

    fn refine(
        &self,
        graph: &InteractionGraph,
        community: Vec<ProductId>,
        max_size: usize,
        finished: &mut Vec<BTreeSet<ProductId>>,
    ) {
        let mut stack = vec![community];
        while let Some(nodes) = stack.pop() {
            if nodes.len() <= max_size {
                finished.push(nodes.into_iter().collect());
                continue;
            }

            let k = (nodes.len() / max_size).max(2);
            let labels = SpectralClustering::new(k, self.spectral_seed).fit_predict(graph, &nodes);
            let mut parts: BTreeMap<usize, Vec<ProductId>> = BTreeMap::new();
            for (node, label) in nodes.iter().zip(labels) {
                parts.entry(label).or_default().push(*node);
            }

            if parts.len() < 2 {
                debug!(size = nodes.len(), "Spectral clustering did not split, using Fiedler halves");
                let (left, right) = fiedler_bisect(graph, &nodes);
                stack.push(left);
                stack.push(right);
            } else {
                debug!(size = nodes.len(), parts = parts.len(), "Refined oversized community");
                stack.extend(parts.into_values());
            }
        }
    }
}

/// Merge the two smallest communities until `target` remain
pub fn merge_smallest(
    mut groups: BTreeMap<usize, Vec<ProductId>>,
    target: usize,
) -> Vec<Vec<ProductId>> {
    let target = target.max(1);
    while groups.len() > target {
        let mut sizes: Vec<(usize, usize)> = groups.iter().map(|(l, m)| (m.len(), *l)).collect();
        sizes.sort_unstable();
        let (smallest, into) = (sizes[0].1, sizes[1].1);
        if let Some(moved) = groups.remove(&smallest) {
            if let Some(members) = groups.get_mut(&into) {
                members.extend(moved);
                members.sort_unstable();
            }
        }
    }
    groups.into_values().collect()
}

impl GraphPartitioner for LouvainSpectralPartitioner {
    fn partition(&self, graph: &InteractionGraph, max_size: usize) -> Result<Partition, ConfigError> {
        check_max_size(max_size)?;
        if graph.is_empty() {
            return Ok(Partition::default());
        }

        let points = self.sweep(graph);
        let target = Self::elbow(&points).map_or(1, |p| p.communities);
        for point in &points {
            debug!(
                resolution = point.resolution,
                modularity = point.modularity,
                communities = point.communities,
                "Resolution sweep"
            );
        }

        let baseline = Louvain::new(1.0, self.louvain_seed).detect(graph);
        let communities = merge_smallest(group(&baseline), target);
        info!(
            baseline = community_count(&baseline),
            target,
            kept = communities.len(),
            "Selected community count at modularity elbow"
        );

        let mut finished = Vec::new();
        for community in communities {
            self.refine(graph, community, max_size, &mut finished);
        }

        Ok(Partition::from_node_sets(graph, finished))
    }

    fn name(&self) -> &str {
        "louvain_spectral"
    }
}
