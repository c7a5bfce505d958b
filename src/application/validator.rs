// Solution validator
// Read-only checks over an integrated solution

use std::collections::BTreeSet;
use tracing::{info, warn};

use crate::domain::{models::GlobalSolution, value_objects::ProductId};

/// Outcome of one check with the products that failed it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationCheck {
    pub passed: bool,
    pub offending: Vec<ProductId>,
}

impl ValidationCheck {
    fn from_offending(offending: Vec<ProductId>) -> Self {
        Self {
            passed: offending.is_empty(),
            offending,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Every expected product appears in the solution
    pub products_listed: ValidationCheck,
    /// Every listed product has exactly one price
    pub single_price: ValidationCheck,
}

impl ValidationReport {
    pub fn passed(&self) -> bool {
        self.products_listed.passed && self.single_price.passed
    }
}

/// Expected products missing from the solution
pub fn check_expected_products(
    solution: &GlobalSolution,
    expected: &BTreeSet<ProductId>,
) -> ValidationCheck {
    ValidationCheck::from_offending(
        expected
            .iter()
            .filter(|product| !solution.contains(**product))
            .copied()
            .collect(),
    )
}

/// Products with no price or with several prices
pub fn check_price_selection(solution: &GlobalSolution) -> ValidationCheck {
    ValidationCheck::from_offending(
        solution
            .iter()
            .filter(|(_, selection)| selection.single().is_none())
            .map(|(product, _)| product)
            .collect(),
    )
}

pub struct SolutionValidator;

impl SolutionValidator {
    pub fn validate(solution: &GlobalSolution, expected: &BTreeSet<ProductId>) -> ValidationReport {
        let report = ValidationReport {
            products_listed: check_expected_products(solution, expected),
            single_price: check_price_selection(solution),
        };

        if report.passed() {
            info!(products = solution.len(), "Solution passed validation");
        } else {
            warn!(
                missing = report.products_listed.offending.len(),
                invalid_selection = report.single_price.offending.len(),
                "Solution failed validation"
            );
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PriceSelection;
    use std::collections::BTreeMap;

    fn scenario() -> GlobalSolution {
        GlobalSolution::new(BTreeMap::from([
            (1, PriceSelection::Selected(vec![2])),
            (2, PriceSelection::Unassigned),
            (3, PriceSelection::Selected(vec![1])),
        ]))
    }

    #[test]
    fn test_scenario_reports_unassigned_product() {
        let report = SolutionValidator::validate(&scenario(), &BTreeSet::from([1, 2, 3]));
        assert!(report.products_listed.passed);
        assert!(report.products_listed.offending.is_empty());
        assert!(!report.single_price.passed);
        assert_eq!(report.single_price.offending, vec![2]);
        assert!(!report.passed());
    }

    #[test]
    fn test_missing_product_is_reported() {
        let check = check_expected_products(&scenario(), &BTreeSet::from([1, 4]));
        assert!(!check.passed);
        assert_eq!(check.offending, vec![4]);
    }

    #[test]
    fn test_multiple_prices_fail() {
        let solution = GlobalSolution::new(BTreeMap::from([(5, PriceSelection::Selected(vec![1, 3]))]));
        assert_eq!(check_price_selection(&solution).offending, vec![5]);
    }

    #[test]
    fn test_validation_does_not_mutate() {
        let solution = scenario();
        let before = solution.clone();
        SolutionValidator::validate(&solution, &BTreeSet::from([1, 2, 3]));
        assert_eq!(solution, before);
    }
}
