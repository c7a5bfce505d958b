// Kernighan-Lin partitioner
// Recursive bisection until every part fits the cluster limit

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::debug;

use super::interaction::InteractionGraph;
use super::partitioner::{check_max_size, GraphPartitioner, Partition, PartitionConfig};
use crate::domain::ProductId;
use crate::error::ConfigError;

const GAIN_EPSILON: f64 = 1e-9;

/// Halves node sets with Kernighan-Lin until every set fits `max_size`
#[derive(Debug, Clone)]
pub struct KernighanLinPartitioner {
    max_passes: usize,
    seed: Option<u64>,
}

impl KernighanLinPartitioner {
    pub fn new(max_passes: usize, seed: Option<u64>) -> Self {
        Self { max_passes, seed }
    }

    pub fn from_config(config: &PartitionConfig) -> Self {
        Self::new(config.max_passes, config.bisection_seed)
    }
}

impl Default for KernighanLinPartitioner {
    fn default() -> Self {
        Self::new(10, None)
    }
}

impl GraphPartitioner for KernighanLinPartitioner {
    fn partition(&self, graph: &InteractionGraph, max_size: usize) -> Result<Partition, ConfigError> {
        check_max_size(max_size)?;
        if graph.is_empty() {
            return Ok(Partition::default());
        }

        let mut rng = self.seed.map(StdRng::seed_from_u64);
        let mut queue = VecDeque::from([graph.node_set()]);
        let mut finished = Vec::new();

        while let Some(nodes) = queue.pop_front() {
            if nodes.len() <= max_size {
                finished.push(nodes);
                continue;
            }

            let (left, right) = bisect(graph, &nodes, self.max_passes, rng.as_mut());
            debug!(
                size = nodes.len(),
                left = left.len(),
                right = right.len(),
                cut = graph.cut_weight(&left, &right),
                "Bisected cluster"
            );
            queue.push_back(left);
            queue.push_back(right);
        }

        Ok(Partition::from_node_sets(graph, finished))
    }

    fn name(&self) -> &str {
        "kernighan_lin"
    }
}

/// Split `nodes` into halves of sizes `n / 2` and `n - n / 2` with a small
/// crossing weight
pub fn bisect(
    graph: &InteractionGraph,
    nodes: &BTreeSet<ProductId>,
    max_passes: usize,
    rng: Option<&mut StdRng>,
) -> (BTreeSet<ProductId>, BTreeSet<ProductId>) {
    let mut order: Vec<ProductId> = nodes.iter().copied().collect();
    if let Some(rng) = rng {
        order.shuffle(rng);
    }

    let index: BTreeMap<ProductId, usize> =
        order.iter().enumerate().map(|(i, n)| (*n, i)).collect();
    let adjacency: Vec<Vec<(usize, f64)>> = order
        .iter()
        .map(|node| {
            graph
                .neighbors(*node)
                .filter_map(|(m, w)| index.get(&m).map(|&j| (j, w)))
                .collect()
        })
        .collect();

    let half = order.len() / 2;
    let mut side: Vec<bool> = (0..order.len()).map(|i| i >= half).collect();

    for _ in 0..max_passes {
        let swaps = sweep(&adjacency, &side);
        if swaps.is_empty() {
            break;
        }
        for (u, v) in swaps {
            side[u] = true;
            side[v] = false;
        }
    }

    let mut left = BTreeSet::new();
    let mut right = BTreeSet::new();
    for (node, on_right) in order.into_iter().zip(side) {
        if on_right {
            right.insert(node);
        } else {
            left.insert(node);
        }
    }
    (left, right)
}

/// One Kernighan-Lin pass: returns the prefix of tentative swaps with the
/// largest positive cumulative gain
fn sweep(adjacency: &[Vec<(usize, f64)>], side: &[bool]) -> Vec<(usize, usize)> {
    let n = adjacency.len();
    let mut gain: Vec<f64> = (0..n)
        .map(|u| {
            adjacency[u]
                .iter()
                .map(|&(v, w)| if side[v] != side[u] { w } else { -w })
                .sum()
        })
        .collect();
    let mut locked = vec![false; n];

    let mut pairs = Vec::new();
    let mut total = 0.0;
    let mut best = 0.0;
    let mut best_len = 0;

    loop {
        let Some(u) = highest_gain(&gain, &locked, side, false) else {
            break;
        };
        let gain_u = gain[u];
        lock_and_update(u, adjacency, side, &mut locked, &mut gain);

        let Some(v) = highest_gain(&gain, &locked, side, true) else {
            break;
        };
        let gain_v = gain[v];
        lock_and_update(v, adjacency, side, &mut locked, &mut gain);

        total += gain_u + gain_v;
        pairs.push((u, v));
        if total > best + GAIN_EPSILON {
            best = total;
            best_len = pairs.len();
        }
    }

    pairs.truncate(best_len);
    pairs
}

fn highest_gain(gain: &[f64], locked: &[bool], side: &[bool], on_right: bool) -> Option<usize> {
    let mut best: Option<usize> = None;
    for i in 0..gain.len() {
        if locked[i] || side[i] != on_right {
            continue;
        }
        if best.map_or(true, |b| gain[i] > gain[b]) {
            best = Some(i);
        }
    }
    best
}

/// Lock `x` and update the gains of its unlocked neighbours as if it had
/// moved to the other side
fn lock_and_update(
    x: usize,
    adjacency: &[Vec<(usize, f64)>],
    side: &[bool],
    locked: &mut [bool],
    gain: &mut [f64],
) {
    locked[x] = true;
    for &(y, w) in &adjacency[x] {
        if locked[y] {
            continue;
        }
        if side[y] == side[x] {
            gain[y] += 2.0 * w;
        } else {
            gain[y] -= 2.0 * w;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CrossElasticityEdge;

    fn two_triangles() -> InteractionGraph {
        let edges = [
            CrossElasticityEdge::new(1, 2, 1, 10.0),
            CrossElasticityEdge::new(2, 3, 1, 10.0),
            CrossElasticityEdge::new(1, 3, 1, 10.0),
            CrossElasticityEdge::new(4, 5, 1, 10.0),
            CrossElasticityEdge::new(5, 6, 1, 10.0),
            CrossElasticityEdge::new(4, 6, 1, 10.0),
            CrossElasticityEdge::new(3, 4, 1, 1.0),
        ];
        InteractionGraph::from_elasticities([1, 2, 3, 4, 5, 6], &edges)
    }

    fn assert_valid(graph: &InteractionGraph, partition: &Partition, max_size: usize) {
        partition.verify(graph, max_size).unwrap();
    }

    #[test]
    fn test_small_graph_is_returned_unchanged() {
        let graph = two_triangles();
        let partition = KernighanLinPartitioner::default()
            .partition(&graph, 6)
            .unwrap();
        assert_eq!(partition.len(), 1);
        assert_eq!(partition.clusters()[0], graph);
    }

    #[test]
    fn test_scenario_keeps_weighted_pair_together() {
        let edges = [CrossElasticityEdge::new(1, 2, 2, 10.0)];
        let graph = InteractionGraph::from_elasticities([1, 2, 3], &edges);
        let partition = KernighanLinPartitioner::default()
            .partition(&graph, 2)
            .unwrap();

        assert_valid(&graph, &partition, 2);
        assert!(partition.node_sets().contains(&BTreeSet::from([1, 2])));
        assert!(partition.node_sets().contains(&BTreeSet::from([3])));
    }

    #[test]
    fn test_bisection_finds_minimum_cut() {
        let graph = two_triangles();
        let (left, right) = bisect(&graph, &graph.node_set(), 10, None);
        assert_eq!(graph.cut_weight(&left, &right), 1.0);
        assert_eq!(left.len(), 3);
        assert_eq!(right.len(), 3);
    }

    #[test]
    fn test_bisection_improves_bad_start() {
        // interleaved ids so the sorted split starts on the worst cut
        let edges = [
            CrossElasticityEdge::new(1, 3, 1, 5.0),
            CrossElasticityEdge::new(2, 4, 1, 5.0),
        ];
        let graph = InteractionGraph::from_elasticities([1, 2, 3, 4], &edges);
        let (left, right) = bisect(&graph, &graph.node_set(), 10, None);
        assert_eq!(graph.cut_weight(&left, &right), 0.0);
    }

    #[test]
    fn test_partition_respects_limits_on_larger_graph() {
        let mut edges = Vec::new();
        for a in 0..60u32 {
            edges.push(CrossElasticityEdge::new(a, (a + 1) % 60, 1, 3.0));
            edges.push(CrossElasticityEdge::new(a, (a * 7) % 60, 1, 1.0));
        }
        let graph = InteractionGraph::from_elasticities(0..65, &edges);

        for max_size in [1, 5, 7, 20] {
            let partition = KernighanLinPartitioner::new(10, Some(3))
                .partition(&graph, max_size)
                .unwrap();
            assert_valid(&graph, &partition, max_size);
        }
    }

    #[test]
    fn test_zero_max_size_is_rejected() {
        assert!(KernighanLinPartitioner::default()
            .partition(&two_triangles(), 0)
            .is_err());
    }

    #[test]
    fn test_empty_graph_gives_empty_partition() {
        let partition = KernighanLinPartitioner::default()
            .partition(&InteractionGraph::new(), 3)
            .unwrap();
        assert!(partition.is_empty());
    }
}
