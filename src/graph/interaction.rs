// Interaction graph
// Products linked by their cross elasticities

use std::collections::{BTreeMap, BTreeSet};

use crate::domain::{CrossElasticityEdge, PricingData, ProductId};

/// Undirected weighted graph over products
///
/// The weight of `{a, b}` is the summed absolute elasticity between the two
/// products over all prices and both directions. No self-loops.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InteractionGraph {
    adjacency: BTreeMap<ProductId, BTreeMap<ProductId, f64>>,
}

impl InteractionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Graph over `products` plus every product named by an edge
    pub fn from_elasticities<'a>(
        products: impl IntoIterator<Item = ProductId>,
        edges: impl IntoIterator<Item = &'a CrossElasticityEdge>,
    ) -> Self {
        let mut graph = Self::new();
        for product in products {
            graph.add_node(product);
        }
        for edge in edges {
            graph.add_weight(edge.product_a, edge.product_b, edge.affected_margin_pct.abs());
        }
        graph
    }

    pub fn from_pricing_data(data: &PricingData) -> Self {
        let edges: Vec<CrossElasticityEdge> = data.elasticities().collect();
        Self::from_elasticities(data.products(), &edges)
    }

    pub fn add_node(&mut self, node: ProductId) {
        self.adjacency.entry(node).or_default();
    }

    /// Add `weight` to edge `{a, b}`; a self-loop only registers the node
    pub fn add_weight(&mut self, a: ProductId, b: ProductId, weight: f64) {
        self.add_node(a);
        self.add_node(b);
        if a == b {
            return;
        }
        *self.adjacency.entry(a).or_default().entry(b).or_insert(0.0) += weight;
        *self.adjacency.entry(b).or_default().entry(a).or_insert(0.0) += weight;
    }

    pub fn contains(&self, node: ProductId) -> bool {
        self.adjacency.contains_key(&node)
    }

    pub fn nodes(&self) -> impl Iterator<Item = ProductId> + '_ {
        self.adjacency.keys().copied()
    }

    pub fn node_set(&self) -> BTreeSet<ProductId> {
        self.nodes().collect()
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(|n| n.len()).sum::<usize>() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    pub fn neighbors(&self, node: ProductId) -> impl Iterator<Item = (ProductId, f64)> + '_ {
        self.adjacency
            .get(&node)
            .into_iter()
            .flat_map(|n| n.iter().map(|(m, w)| (*m, *w)))
    }

    /// Weight of `{a, b}`, zero when not connected
    pub fn weight(&self, a: ProductId, b: ProductId) -> f64 {
        self.adjacency
            .get(&a)
            .and_then(|n| n.get(&b))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn degree(&self, node: ProductId) -> f64 {
        self.neighbors(node).map(|(_, w)| w).sum()
    }

    /// Sum of all edge weights, each edge counted once
    pub fn total_weight(&self) -> f64 {
        self.adjacency
            .iter()
            .flat_map(|(a, n)| n.iter().filter(move |(b, _)| a < *b).map(|(_, w)| *w))
            .sum()
    }

    /// Induced subgraph; nodes not in the graph are ignored
    pub fn subgraph(&self, nodes: &BTreeSet<ProductId>) -> InteractionGraph {
        let adjacency = nodes
            .iter()
            .filter_map(|node| {
                self.adjacency.get(node).map(|neighbors| {
                    let kept = neighbors
                        .iter()
                        .filter(|(m, _)| nodes.contains(m))
                        .map(|(m, w)| (*m, *w))
                        .collect();
                    (*node, kept)
                })
            })
            .collect();
        InteractionGraph { adjacency }
    }

    /// Weight of edges with one end in `left` and the other in `right`
    pub fn cut_weight(&self, left: &BTreeSet<ProductId>, right: &BTreeSet<ProductId>) -> f64 {
        left.iter()
            .flat_map(|a| self.neighbors(*a).filter(|(b, _)| right.contains(b)))
            .map(|(_, w)| w)
            .sum()
    }
}
