use super::value_objects::{PriceId, PriceSelection, ProductId, SolverMode, VariableId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tracing::warn;

/// Candidate price of a product with the margin it yields
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceOption {
    pub product: ProductId,
    pub price: PriceId,
    #[serde(rename = "margin_of_sales")]
    pub margin: f64,
}

impl PriceOption {
    pub fn new(product: ProductId, price: PriceId, margin: f64) -> Self {
        Self {
            product,
            price,
            margin,
        }
    }
}

/// "If `product_a` is sold at `price_a`, the margin of `product_b` changes by
/// `affected_margin_pct` percent."
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CrossElasticityEdge {
    #[serde(rename = "product_A")]
    pub product_a: ProductId,
    #[serde(rename = "affected_product_B")]
    pub product_b: ProductId,
    #[serde(rename = "price_A")]
    pub price_a: PriceId,
    #[serde(rename = "affected_margin_B")]
    pub affected_margin_pct: f64,
}

impl CrossElasticityEdge {
    pub fn new(
        product_a: ProductId,
        product_b: ProductId,
        price_a: PriceId,
        affected_margin_pct: f64,
    ) -> Self {
        Self {
            product_a,
            product_b,
            price_a,
            affected_margin_pct,
        }
    }
}

/// Price and elasticity data of a whole run or of one cluster
///
/// Records are keyed; a repeated key keeps the last record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PricingData {
    margins: BTreeMap<VariableId, f64>,
    elasticities: BTreeMap<(ProductId, ProductId, PriceId), f64>,
}

impl PricingData {
    pub fn new(
        prices: impl IntoIterator<Item = PriceOption>,
        edges: impl IntoIterator<Item = CrossElasticityEdge>,
    ) -> Self {
        let mut data = Self::default();

        for option in prices {
            let key = VariableId::new(option.product, option.price);
            if data.margins.insert(key, option.margin).is_some() {
                warn!(product = option.product, price = option.price, "Duplicate price option, keeping last");
            }
        }

        for edge in edges {
            let key = (edge.product_a, edge.product_b, edge.price_a);
            if data
                .elasticities
                .insert(key, edge.affected_margin_pct)
                .is_some()
            {
                warn!(
                    product_a = edge.product_a,
                    product_b = edge.product_b,
                    price_a = edge.price_a,
                    "Duplicate cross elasticity, keeping last"
                );
            }
        }

        data
    }

    pub fn margin(&self, product: ProductId, price: PriceId) -> Option<f64> {
        self.margins.get(&VariableId::new(product, price)).copied()
    }

    pub fn price_options(&self) -> impl Iterator<Item = PriceOption> + '_ {
        self.margins
            .iter()
            .map(|(var, &margin)| PriceOption::new(var.product, var.price, margin))
    }

    pub fn elasticities(&self) -> impl Iterator<Item = CrossElasticityEdge> + '_ {
        self.elasticities
            .iter()
            .map(|(&(a, b, price), &pct)| CrossElasticityEdge::new(a, b, price, pct))
    }

    /// Prices available for one product, ascending
    pub fn prices_of(&self, product: ProductId) -> impl Iterator<Item = (PriceId, f64)> + '_ {
        self.margins
            .range(VariableId::new(product, PriceId::MIN)..=VariableId::new(product, PriceId::MAX))
            .map(|(var, &margin)| (var.price, margin))
    }

    /// Every product that has at least one price option
    pub fn products(&self) -> BTreeSet<ProductId> {
        self.margins.keys().map(|var| var.product).collect()
    }

    pub fn num_price_options(&self) -> usize {
        self.margins.len()
    }

    pub fn num_elasticities(&self) -> usize {
        self.elasticities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.margins.is_empty()
    }

    /// Lowest margin of each product, the baseline for the margin reward
    pub fn min_margins(&self) -> BTreeMap<ProductId, f64> {
        let mut mins: BTreeMap<ProductId, f64> = BTreeMap::new();
        for (var, &margin) in &self.margins {
            mins.entry(var.product)
                .and_modify(|m| *m = m.min(margin))
                .or_insert(margin);
        }
        mins
    }

    fn prices_per_product(&self) -> BTreeMap<ProductId, usize> {
        let mut counts = BTreeMap::new();
        for var in self.margins.keys() {
            *counts.entry(var.product).or_insert(0) += 1;
        }
        counts
    }

    pub fn max_prices_per_product(&self) -> usize {
        self.prices_per_product().values().copied().max().unwrap_or(0)
    }

    /// Data restricted to a product set; elasticities need both endpoints inside
    pub fn restrict_to(&self, products: &BTreeSet<ProductId>) -> PricingData {
        let margins = self
            .margins
            .iter()
            .filter(|(var, _)| products.contains(&var.product))
            .map(|(var, margin)| (*var, *margin))
            .collect();
        let elasticities = self
            .elasticities
            .iter()
            .filter(|((a, b, _), _)| products.contains(a) && products.contains(b))
            .map(|(key, pct)| (*key, *pct))
            .collect();

        PricingData {
            margins,
            elasticities,
        }
    }

    /// Total margin of a one-price-per-product assignment, elasticity effects
    /// included
    ///
    /// Products without a price contribute nothing, as do assignments to
    /// prices the product does not have.
    pub fn evaluate_margin(&self, assignment: &BTreeMap<ProductId, PriceId>) -> f64 {
        let mut total: f64 = assignment
            .iter()
            .filter_map(|(&product, &price)| self.margin(product, price))
            .sum();

        for (&(a, b, price_a), &pct) in &self.elasticities {
            if assignment.get(&a) != Some(&price_a) {
                continue;
            }
            if let Some(margin_b) = assignment.get(&b).and_then(|&pb| self.margin(b, pb)) {
                total += margin_b * pct / 100.0;
            }
        }

        total
    }

    pub fn summary(&self) -> DatasetSummary {
        let counts: Vec<usize> = self.prices_per_product().into_values().collect();
        let pcts: Vec<f64> = self.elasticities.values().copied().collect();

        let mean = |total: f64, n: usize| if n == 0 { 0.0 } else { total / n as f64 };

        DatasetSummary {
            num_products: counts.len(),
            max_prices: counts.iter().copied().max().unwrap_or(0),
            min_prices: counts.iter().copied().min().unwrap_or(0),
            avg_prices: mean(counts.iter().sum::<usize>() as f64, counts.len()),
            avg_margin: mean(self.margins.values().sum(), self.margins.len()),
            num_elasticities: pcts.len(),
            max_elasticity: pcts.iter().copied().reduce(f64::max).unwrap_or(0.0),
            min_elasticity: pcts.iter().copied().reduce(f64::min).unwrap_or(0.0),
            avg_elasticity: mean(pcts.iter().sum(), pcts.len()),
        }
    }
}

/// Descriptive statistics of a dataset
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatasetSummary {
    pub num_products: usize,
    pub max_prices: usize,
    pub min_prices: usize,
    pub avg_prices: f64,
    pub avg_margin: f64,
    pub num_elasticities: usize,
    pub max_elasticity: f64,
    pub min_elasticity: f64,
    pub avg_elasticity: f64,
}

/// Parameters forwarded to the optimization backend
#[derive(Debug, Clone, Default)]
pub struct SolveParams {
    pub mode: SolverMode,
    /// Independent reads for stochastic backends
    pub num_reads: Option<usize>,
    /// Annealing sweeps per read
    pub sweeps: Option<usize>,
    pub seed: Option<u64>,
    pub time_limit: Option<Duration>,
}

impl SolveParams {
    pub fn new(mode: SolverMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn with_num_reads(mut self, num_reads: usize) -> Self {
        self.num_reads = Some(num_reads);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// One candidate assignment returned by a backend
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub values: BTreeMap<VariableId, u8>,
    pub energy: f64,
}

impl Sample {
    pub fn new(values: BTreeMap<VariableId, u8>, energy: f64) -> Self {
        Self { values, energy }
    }

    pub fn empty() -> Self {
        Self::new(BTreeMap::new(), 0.0)
    }

    pub fn selected(&self) -> impl Iterator<Item = VariableId> + '_ {
        self.values
            .iter()
            .filter(|(_, &value)| value == 1)
            .map(|(var, _)| *var)
    }
}

/// Samples ordered by ascending energy
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleSet {
    samples: Vec<Sample>,
}

impl SampleSet {
    pub fn new(mut samples: Vec<Sample>) -> Self {
        samples.sort_by(|a, b| a.energy.total_cmp(&b.energy));
        Self { samples }
    }

    /// Lowest-energy sample
    pub fn first(&self) -> Option<&Sample> {
        self.samples.first()
    }

    pub fn into_first(self) -> Option<Sample> {
        self.samples.into_iter().next()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }
}

/// Decoded sample: selected prices of each product
pub type ResolvedAssignment = BTreeMap<ProductId, BTreeSet<PriceId>>;

/// Integrated solution over the whole product universe
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlobalSolution {
    selections: BTreeMap<ProductId, PriceSelection>,
}

impl GlobalSolution {
    pub fn new(selections: BTreeMap<ProductId, PriceSelection>) -> Self {
        Self { selections }
    }

    pub fn get(&self, product: ProductId) -> Option<&PriceSelection> {
        self.selections.get(&product)
    }

    pub fn contains(&self, product: ProductId) -> bool {
        self.selections.contains_key(&product)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ProductId, &PriceSelection)> {
        self.selections.iter().map(|(p, s)| (*p, s))
    }

    pub fn len(&self) -> usize {
        self.selections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }

    pub fn num_unassigned(&self) -> usize {
        self.selections.values().filter(|s| !s.is_assigned()).count()
    }

    /// Products with exactly one selected price
    pub fn single_price_assignment(&self) -> BTreeMap<ProductId, PriceId> {
        self.selections
            .iter()
            .filter_map(|(product, selection)| selection.single().map(|price| (*product, price)))
            .collect()
    }
}
