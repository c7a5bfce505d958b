// Spectral clustering
// k-way split on the eigenvectors of the normalized Laplacian

use nalgebra::{DMatrix, DVector, SymmetricEigen};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;

use super::interaction::InteractionGraph;
use crate::domain::ProductId;

const KMEANS_MAX_ITERATIONS: usize = 300;

/// Splits a node set into `n_clusters` groups by k-means on the spectral
/// embedding
#[derive(Debug, Clone)]
pub struct SpectralClustering {
    n_clusters: usize,
    seed: u64,
}

impl SpectralClustering {
    pub fn new(n_clusters: usize, seed: u64) -> Self {
        Self {
            n_clusters: n_clusters.max(1),
            seed,
        }
    }

    /// Cluster label per entry of `nodes`
    pub fn fit_predict(&self, graph: &InteractionGraph, nodes: &[ProductId]) -> Vec<usize> {
        let k = self.n_clusters.min(nodes.len());
        if k <= 1 {
            return vec![0; nodes.len()];
        }

        let eigen = laplacian_eigen(graph, nodes);
        let embedding = row_normalized(&smallest_eigenvectors(&eigen, k));
        kmeans(&embedding, k, self.seed)
    }
}

/// Split `nodes` in half along the Fiedler vector
pub fn fiedler_bisect(graph: &InteractionGraph, nodes: &[ProductId]) -> (Vec<ProductId>, Vec<ProductId>) {
    let mut ordered: Vec<ProductId> = nodes.to_vec();
    if nodes.len() >= 2 {
        let eigen = laplacian_eigen(graph, nodes);
        let fiedler = smallest_eigenvectors(&eigen, 2).column(1).clone_owned();
        let position: BTreeMap<ProductId, f64> =
            nodes.iter().copied().zip(fiedler.iter().copied()).collect();
        ordered.sort_by(|a, b| position[a].total_cmp(&position[b]).then(a.cmp(b)));
    }
    let right = ordered.split_off(ordered.len() / 2);
    (ordered, right)
}

/// `I - D^-1/2 A D^-1/2`, isolated nodes keep a unit diagonal
fn normalized_laplacian(graph: &InteractionGraph, nodes: &[ProductId]) -> DMatrix<f64> {
    let n = nodes.len();
    let index: BTreeMap<ProductId, usize> =
        nodes.iter().enumerate().map(|(i, p)| (*p, i)).collect();

    let mut adjacency = DMatrix::<f64>::zeros(n, n);
    for (i, node) in nodes.iter().enumerate() {
        for (other, w) in graph.neighbors(*node) {
            if let Some(&j) = index.get(&other) {
                adjacency[(i, j)] = w;
            }
        }
    }

    let inv_sqrt: DVector<f64> = DVector::from_iterator(
        n,
        adjacency.row_iter().map(|row| {
            let d = row.sum();
            if d > 0.0 {
                1.0 / d.sqrt()
            } else {
                0.0
            }
        }),
    );

    let mut laplacian = DMatrix::<f64>::identity(n, n);
    for i in 0..n {
        for j in 0..n {
            if adjacency[(i, j)] != 0.0 {
                laplacian[(i, j)] -= inv_sqrt[i] * adjacency[(i, j)] * inv_sqrt[j];
            }
        }
    }
    laplacian
}

fn laplacian_eigen(graph: &InteractionGraph, nodes: &[ProductId]) -> SymmetricEigen<f64, nalgebra::Dyn> {
    SymmetricEigen::new(normalized_laplacian(graph, nodes))
}

/// Columns are the eigenvectors of the `k` smallest eigenvalues, ascending
fn smallest_eigenvectors(eigen: &SymmetricEigen<f64, nalgebra::Dyn>, k: usize) -> DMatrix<f64> {
    let mut order: Vec<usize> = (0..eigen.eigenvalues.len()).collect();
    order.sort_by(|&a, &b| eigen.eigenvalues[a].total_cmp(&eigen.eigenvalues[b]));

    let columns: Vec<DVector<f64>> = order
        .into_iter()
        .take(k)
        .map(|c| eigen.eigenvectors.column(c).clone_owned())
        .collect();
    DMatrix::from_columns(&columns)
}

fn row_normalized(matrix: &DMatrix<f64>) -> DMatrix<f64> {
    let mut out = matrix.clone();
    for mut row in out.row_iter_mut() {
        let norm = row.norm();
        if norm > 1e-12 {
            row /= norm;
        }
    }
    out
}

/// Lloyd's k-means with k-means++ seeding over the rows of `points`
fn kmeans(points: &DMatrix<f64>, k: usize, seed: u64) -> Vec<usize> {
    let n = points.nrows();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut centroids = kmeans_plus_plus(points, k, &mut rng);
    let mut labels = vec![usize::MAX; n];

    for _ in 0..KMEANS_MAX_ITERATIONS {
        let mut changed = false;
        for i in 0..n {
            let nearest = nearest_centroid(points, i, &centroids);
            if labels[i] != nearest {
                labels[i] = nearest;
                changed = true;
            }
        }
        if !changed {
            break;
        }

        for (c, centroid) in centroids.iter_mut().enumerate() {
            let members: Vec<usize> = (0..n).filter(|&i| labels[i] == c).collect();
            if members.is_empty() {
                continue;
            }
            let mut sum = DVector::<f64>::zeros(points.ncols());
            for &i in &members {
                sum += points.row(i).transpose();
            }
            *centroid = sum / members.len() as f64;
        }
    }

    labels
}

fn kmeans_plus_plus(points: &DMatrix<f64>, k: usize, rng: &mut StdRng) -> Vec<DVector<f64>> {
    let n = points.nrows();
    let row = |i: usize| points.row(i).transpose();
    let mut chosen = vec![rng.gen_range(0..n)];

    while chosen.len() < k {
        let distances: Vec<f64> = (0..n)
            .map(|i| {
                chosen
                    .iter()
                    .map(|&c| (row(i) - row(c)).norm_squared())
                    .fold(f64::INFINITY, f64::min)
            })
            .collect();
        let total: f64 = distances.iter().sum();

        let next = if total > 0.0 {
            let mut target = rng.gen::<f64>() * total;
            let mut pick = n - 1;
            for (i, d) in distances.iter().enumerate() {
                if target < *d {
                    pick = i;
                    break;
                }
                target -= d;
            }
            pick
        } else {
            // all points coincide with a centre
            (0..n).find(|i| !chosen.contains(i)).unwrap_or(0)
        };
        chosen.push(next);
    }

    chosen.into_iter().map(row).collect()
}

fn nearest_centroid(points: &DMatrix<f64>, i: usize, centroids: &[DVector<f64>]) -> usize {
    let point = points.row(i).transpose();
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (c, centroid) in centroids.iter().enumerate() {
        let d = (&point - centroid).norm_squared();
        if d < best_distance {
            best = c;
            best_distance = d;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CrossElasticityEdge;
    use std::collections::BTreeSet;

    fn two_components() -> InteractionGraph {
        let edges = [
            CrossElasticityEdge::new(1, 2, 1, 4.0),
            CrossElasticityEdge::new(2, 3, 1, 4.0),
            CrossElasticityEdge::new(1, 3, 1, 4.0),
            CrossElasticityEdge::new(4, 5, 1, 4.0),
            CrossElasticityEdge::new(5, 6, 1, 4.0),
            CrossElasticityEdge::new(4, 6, 1, 4.0),
        ];
        InteractionGraph::from_elasticities(1..=6, &edges)
    }

    #[test]
    fn test_laplacian_is_symmetric_with_unit_diagonal() {
        let graph = two_components();
        let nodes: Vec<ProductId> = graph.nodes().collect();
        let laplacian = normalized_laplacian(&graph, &nodes);
        assert!((laplacian.clone() - laplacian.transpose()).norm() < 1e-12);
        for i in 0..nodes.len() {
            assert_eq!(laplacian[(i, i)], 1.0);
        }
        assert!((laplacian[(0, 1)] + 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_separates_components() {
        let graph = two_components();
        let nodes: Vec<ProductId> = graph.nodes().collect();
        let labels = SpectralClustering::new(2, 42).fit_predict(&graph, &nodes);

        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[1], labels[2]);
        assert_eq!(labels[3], labels[4]);
        assert_eq!(labels[4], labels[5]);
        assert_ne!(labels[0], labels[3]);
    }

    #[test]
    fn test_single_cluster_is_trivial() {
        let graph = two_components();
        let nodes: Vec<ProductId> = graph.nodes().collect();
        assert_eq!(
            SpectralClustering::new(1, 42).fit_predict(&graph, &nodes),
            vec![0; 6]
        );
    }

    #[test]
    fn test_fiedler_bisect_halves() {
        let graph = two_components();
        let nodes: Vec<ProductId> = graph.nodes().collect();
        let (left, right) = fiedler_bisect(&graph, &nodes);
        assert_eq!(left.len(), 3);
        assert_eq!(right.len(), 3);
        let all: BTreeSet<ProductId> = left.iter().chain(&right).copied().collect();
        assert_eq!(all.len(), 6);
    }

    #[test]
    fn test_seeded_kmeans_is_reproducible() {
        let points = DMatrix::from_row_slice(4, 2, &[0.0, 0.0, 0.1, 0.0, 5.0, 5.0, 5.1, 5.0]);
        let first = kmeans(&points, 2, 42);
        assert_eq!(first, kmeans(&points, 2, 42));
        assert_eq!(first[0], first[1]);
        assert_ne!(first[0], first[2]);
    }
}
