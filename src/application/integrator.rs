// Solution integrator
// Decodes per-cluster samples and merges them over the product universe

use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use crate::domain::{
    models::{GlobalSolution, ResolvedAssignment, Sample},
    value_objects::{PriceSelection, ProductId},
};

/// Selected prices per product; variables set to 0 are dropped
pub fn decode(sample: &Sample) -> ResolvedAssignment {
    let mut assignment = ResolvedAssignment::new();
    for var in sample.selected() {
        assignment.entry(var.product).or_default().insert(var.price);
    }
    assignment
}

pub struct SolutionIntegrator {
    universe: BTreeSet<ProductId>,
}

impl SolutionIntegrator {
    pub fn new(universe: BTreeSet<ProductId>) -> Self {
        Self { universe }
    }

    pub fn universe(&self) -> &BTreeSet<ProductId> {
        &self.universe
    }

    /// Merge cluster assignments; products without any price are unassigned
    pub fn integrate<'a>(
        &self,
        assignments: impl IntoIterator<Item = &'a ResolvedAssignment>,
    ) -> GlobalSolution {
        let mut merged: BTreeMap<ProductId, BTreeSet<_>> = BTreeMap::new();
        for assignment in assignments {
            for (product, prices) in assignment {
                merged.entry(*product).or_default().extend(prices.iter().copied());
            }
        }

        let extra: Vec<ProductId> = merged
            .keys()
            .filter(|p| !self.universe.contains(*p))
            .copied()
            .collect();
        if !extra.is_empty() {
            warn!(count = extra.len(), products = ?extra, "Decoded products outside the universe");
        }

        let mut selections: BTreeMap<ProductId, PriceSelection> = self
            .universe
            .iter()
            .map(|product| (*product, PriceSelection::Unassigned))
            .collect();
        for (product, prices) in merged {
            if !prices.is_empty() {
                selections.insert(product, PriceSelection::Selected(prices.into_iter().collect()));
            }
        }

        let solution = GlobalSolution::new(selections);
        debug!(
            products = solution.len(),
            unassigned = solution.num_unassigned(),
            "Integrated cluster solutions"
        );
        solution
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::VariableId;

    fn sample(selected: &[(u32, u32)], unselected: &[(u32, u32)]) -> Sample {
        let values = selected
            .iter()
            .map(|&v| (VariableId::from(v), 1))
            .chain(unselected.iter().map(|&v| (VariableId::from(v), 0)))
            .collect();
        Sample::new(values, 0.0)
    }

    #[test]
    fn test_decode_keeps_selected_only() {
        let assignment = decode(&sample(&[(1, 2), (3, 1), (3, 4)], &[(1, 1), (2, 1)]));
        assert_eq!(assignment.len(), 2);
        assert_eq!(assignment[&1], BTreeSet::from([2]));
        assert_eq!(assignment[&3], BTreeSet::from([1, 4]));
    }

    #[test]
    fn test_missing_products_are_unassigned() {
        let integrator = SolutionIntegrator::new(BTreeSet::from([1, 2, 3]));
        let first = decode(&sample(&[(1, 2)], &[(1, 1)]));
        let second = decode(&sample(&[(3, 1)], &[(2, 1)]));
        let solution = integrator.integrate([&first, &second]);

        assert_eq!(solution.len(), 3);
        assert_eq!(solution.get(1), Some(&PriceSelection::Selected(vec![2])));
        assert_eq!(solution.get(2), Some(&PriceSelection::Unassigned));
        assert_eq!(solution.get(3), Some(&PriceSelection::Selected(vec![1])));
        assert_eq!(solution.num_unassigned(), 1);
    }

    #[test]
    fn test_multiple_prices_are_kept_sorted() {
        let integrator = SolutionIntegrator::new(BTreeSet::from([1]));
        let first = decode(&sample(&[(1, 5)], &[]));
        let second = decode(&sample(&[(1, 2), (1, 5)], &[]));
        let solution = integrator.integrate([&first, &second]);
        assert_eq!(solution.get(1), Some(&PriceSelection::Selected(vec![2, 5])));
    }

    #[test]
    fn test_extra_products_are_kept() {
        let integrator = SolutionIntegrator::new(BTreeSet::from([1]));
        let assignment = decode(&sample(&[(1, 1), (9, 3)], &[]));
        let solution = integrator.integrate([&assignment]);
        assert!(solution.contains(9));
        assert_eq!(solution.len(), 2);
    }

    #[test]
    fn test_assigned_and_unassigned_are_exclusive() {
        let integrator = SolutionIntegrator::new(BTreeSet::from([1, 2]));
        let assignment = decode(&sample(&[(1, 1)], &[(2, 1)]));
        let solution = integrator.integrate([&assignment]);
        for (_, selection) in solution.iter() {
            assert_eq!(selection.is_assigned(), !selection.prices().is_empty());
        }
    }
}
