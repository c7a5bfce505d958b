// Louvain
// Community detection and modularity

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeMap;

use super::interaction::InteractionGraph;
use crate::domain::ProductId;

const MAX_LOCAL_PASSES: usize = 100;
const MOVE_EPSILON: f64 = 1e-12;

/// Product to community label, labels are dense from zero
pub type Communities = BTreeMap<ProductId, usize>;

/// Greedy modularity maximisation at a fixed resolution
#[derive(Debug, Clone)]
pub struct Louvain {
    resolution: f64,
    seed: Option<u64>,
}

impl Louvain {
    pub fn new(resolution: f64, seed: Option<u64>) -> Self {
        Self { resolution, seed }
    }

    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    pub fn detect(&self, graph: &InteractionGraph) -> Communities {
        let nodes: Vec<ProductId> = graph.nodes().collect();
        let mut network = Network::from_graph(graph, &nodes);
        let mut membership: Vec<usize> = (0..nodes.len()).collect();

        if network.total_weight > 0.0 {
            let mut rng = StdRng::seed_from_u64(self.seed.unwrap_or(0));
            loop {
                let (community, moved) = self.local_moves(&network, &mut rng);
                if !moved {
                    break;
                }
                for m in membership.iter_mut() {
                    *m = community[*m];
                }
                network = network.aggregate(&community);
            }
        }

        nodes.into_iter().zip(relabel(&membership)).collect()
    }

    /// Move single nodes between communities while modularity improves
    fn local_moves(&self, network: &Network, rng: &mut StdRng) -> (Vec<usize>, bool) {
        let n = network.len();
        let two_m = 2.0 * network.total_weight;
        let mut community: Vec<usize> = (0..n).collect();
        let mut totals = network.degree.clone();
        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(rng);

        let mut moved_any = false;
        for _ in 0..MAX_LOCAL_PASSES {
            let mut moved = false;
            for &i in &order {
                let current = community[i];
                let k_i = network.degree[i];

                let mut links: BTreeMap<usize, f64> = BTreeMap::new();
                for &(j, w) in &network.adjacency[i] {
                    *links.entry(community[j]).or_insert(0.0) += w;
                }

                totals[current] -= k_i;
                let gain = |c: usize, k_in: f64| k_in - self.resolution * totals[c] * k_i / two_m;

                let mut best = current;
                let mut best_gain = gain(current, links.get(&current).copied().unwrap_or(0.0));
                for (&c, &k_in) in &links {
                    let g = gain(c, k_in);
                    if g > best_gain + MOVE_EPSILON {
                        best = c;
                        best_gain = g;
                    }
                }

                totals[best] += k_i;
                community[i] = best;
                if best != current {
                    moved = true;
                    moved_any = true;
                }
            }
            if !moved {
                break;
            }
        }

        (relabel(&community), moved_any)
    }
}

/// Modularity of `communities` on `graph`; zero for an edgeless graph
pub fn modularity(graph: &InteractionGraph, communities: &Communities, resolution: f64) -> f64 {
    let m = graph.total_weight();
    if m <= 0.0 {
        return 0.0;
    }

    let mut internal: BTreeMap<usize, f64> = BTreeMap::new();
    let mut degree: BTreeMap<usize, f64> = BTreeMap::new();
    for node in graph.nodes() {
        let Some(&c) = communities.get(&node) else {
            continue;
        };
        for (other, w) in graph.neighbors(node) {
            *degree.entry(c).or_insert(0.0) += w;
            if node < other && communities.get(&other) == Some(&c) {
                *internal.entry(c).or_insert(0.0) += w;
            }
        }
    }

    degree
        .iter()
        .map(|(c, d)| {
            let inside = internal.get(c).copied().unwrap_or(0.0);
            inside / m - resolution * (d / (2.0 * m)).powi(2)
        })
        .sum()
}

/// Number of distinct labels
pub fn community_count(communities: &Communities) -> usize {
    communities.values().max().map_or(0, |max| max + 1)
}

/// Node sets per community label
pub fn group(communities: &Communities) -> BTreeMap<usize, Vec<ProductId>> {
    let mut groups: BTreeMap<usize, Vec<ProductId>> = BTreeMap::new();
    for (&node, &label) in communities {
        groups.entry(label).or_default().push(node);
    }
    groups
}

fn relabel(labels: &[usize]) -> Vec<usize> {
    let mut mapping = BTreeMap::new();
    labels
        .iter()
        .map(|label| {
            let next = mapping.len();
            *mapping.entry(*label).or_insert(next)
        })
        .collect()
}

/// Index-based weighted graph with self-loops, one level of the hierarchy
struct Network {
    adjacency: Vec<Vec<(usize, f64)>>,
    self_loops: Vec<f64>,
    degree: Vec<f64>,
    total_weight: f64,
}

impl Network {
    fn from_graph(graph: &InteractionGraph, nodes: &[ProductId]) -> Self {
        let index: BTreeMap<ProductId, usize> =
            nodes.iter().enumerate().map(|(i, n)| (*n, i)).collect();
        let adjacency: Vec<Vec<(usize, f64)>> = nodes
            .iter()
            .map(|node| {
                graph
                    .neighbors(*node)
                    .filter_map(|(m, w)| index.get(&m).map(|&j| (j, w)))
                    .collect()
            })
            .collect();
        Self::assemble(adjacency, vec![0.0; nodes.len()], graph.total_weight())
    }

    fn assemble(adjacency: Vec<Vec<(usize, f64)>>, self_loops: Vec<f64>, total_weight: f64) -> Self {
        let degree = adjacency
            .iter()
            .zip(&self_loops)
            .map(|(links, own)| links.iter().map(|(_, w)| w).sum::<f64>() + 2.0 * own)
            .collect();
        Self {
            adjacency,
            self_loops,
            degree,
            total_weight,
        }
    }

    fn len(&self) -> usize {
        self.adjacency.len()
    }

    /// Collapse every community into a single node
    fn aggregate(&self, community: &[usize]) -> Self {
        let size = community.iter().max().map_or(0, |c| c + 1);
        let mut self_loops = vec![0.0; size];
        let mut links: Vec<BTreeMap<usize, f64>> = vec![BTreeMap::new(); size];

        for (i, neighbors) in self.adjacency.iter().enumerate() {
            let ci = community[i];
            self_loops[ci] += self.self_loops[i];
            for &(j, w) in neighbors {
                if j < i {
                    continue;
                }
                let cj = community[j];
                if ci == cj {
                    self_loops[ci] += w;
                } else {
                    *links[ci].entry(cj).or_insert(0.0) += w;
                    *links[cj].entry(ci).or_insert(0.0) += w;
                }
            }
        }

        let adjacency = links
            .into_iter()
            .map(|l| l.into_iter().collect())
            .collect();
        Self::assemble(adjacency, self_loops, self.total_weight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CrossElasticityEdge;

    fn two_cliques() -> InteractionGraph {
        let mut edges = Vec::new();
        for group in [[1, 2, 3, 4], [5, 6, 7, 8]] {
            for (i, a) in group.iter().enumerate() {
                for b in &group[i + 1..] {
                    edges.push(CrossElasticityEdge::new(*a, *b, 1, 5.0));
                }
            }
        }
        edges.push(CrossElasticityEdge::new(4, 5, 1, 1.0));
        InteractionGraph::from_elasticities(1..=8, &edges)
    }

    #[test]
    fn test_detects_two_cliques() {
        let graph = two_cliques();
        let communities = Louvain::new(1.0, Some(7)).detect(&graph);

        assert_eq!(community_count(&communities), 2);
        assert_eq!(communities[&1], communities[&4]);
        assert_eq!(communities[&5], communities[&8]);
        assert_ne!(communities[&1], communities[&5]);
    }

    #[test]
    fn test_modularity_of_known_partition() {
        let graph = two_cliques();
        let split: Communities = (1..=8).map(|n| (n, usize::from(n > 4))).collect();
        let single: Communities = (1..=8).map(|n| (n, 0)).collect();

        // m = 61, each clique holds 30 and has degree 61
        let expected = 2.0 * (30.0 / 61.0 - 0.25);
        assert!((modularity(&graph, &split, 1.0) - expected).abs() < 1e-9);
        assert!(modularity(&graph, &single, 1.0).abs() < 1e-9);
        assert!(modularity(&graph, &split, 1.0) > modularity(&graph, &single, 1.0));
    }

    #[test]
    fn test_edgeless_graph_keeps_singletons() {
        let graph = InteractionGraph::from_elasticities([3, 1, 2], std::iter::empty());
        let communities = Louvain::new(1.0, Some(1)).detect(&graph);
        assert_eq!(community_count(&communities), 3);
        assert_eq!(modularity(&graph, &communities, 1.0), 0.0);
    }

    #[test]
    fn test_higher_resolution_gives_more_communities() {
        let graph = two_cliques();
        let low = Louvain::new(0.05, Some(3)).detect(&graph);
        let high = Louvain::new(8.0, Some(3)).detect(&graph);
        assert!(community_count(&high) >= community_count(&low));
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let graph = two_cliques();
        let first = Louvain::new(1.0, Some(11)).detect(&graph);
        let second = Louvain::new(1.0, Some(11)).detect(&graph);
        assert_eq!(first, second);
    }

    #[test]
    fn test_group_lists_members() {
        let communities: Communities = BTreeMap::from([(1, 0), (2, 1), (3, 0)]);
        let groups = group(&communities);
        assert_eq!(groups[&0], vec![1, 3]);
        assert_eq!(groups[&1], vec![2]);
    }
}
