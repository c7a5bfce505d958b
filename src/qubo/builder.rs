// Model builder
// One binary variable per (product, price) option, four summed terms:
//   1. margin reward relative to the product's worst price (diagonal)
//   2. uniqueness penalty on every pair of prices of the same product
//   3. elasticity coupling between a source price and each target price
//   4. flat reward on every variable so that some price gets picked

use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use super::model::QuadraticModel;
use crate::domain::{PricingData, ProductId, VariableId};
use crate::error::ConfigError;

/// Weights of the four model terms
///
/// `uniqueness` and `force_choice` encode hard constraints and must dominate
/// any margin swing the other two terms can produce.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct PenaltyWeights {
    pub margin: f64,
    pub uniqueness: f64,
    pub elasticity: f64,
    pub force_choice: f64,
}

impl Default for PenaltyWeights {
    fn default() -> Self {
        Self {
            margin: 1.0,
            uniqueness: 5000.0,
            elasticity: 1.0,
            force_choice: 1000.0,
        }
    }
}

impl PenaltyWeights {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let weights = [
            ("penalties.margin", self.margin),
            ("penalties.uniqueness", self.uniqueness),
            ("penalties.elasticity", self.elasticity),
            ("penalties.force_choice", self.force_choice),
        ];
        for (field, value) in weights {
            if !value.is_finite() {
                return Err(ConfigError::invalid(field, "must be finite"));
            }
            if value < 0.0 {
                return Err(ConfigError::invalid(field, "must not be negative"));
            }
        }
        if self.force_choice <= 0.0 {
            return Err(ConfigError::invalid(
                "penalties.force_choice",
                "must be positive",
            ));
        }
        if self.uniqueness <= self.force_choice {
            return Err(ConfigError::invalid(
                "penalties.uniqueness",
                format!(
                    "must exceed force_choice ({} <= {})",
                    self.uniqueness, self.force_choice
                ),
            ));
        }
        Ok(())
    }

    /// Largest objective gain a single product can collect from margin and
    /// elasticity terms
    pub fn max_margin_swing(&self, data: &PricingData) -> f64 {
        let min_margins = data.min_margins();
        let mut swing: BTreeMap<ProductId, f64> = BTreeMap::new();

        for option in data.price_options() {
            let gain = self.margin * (option.margin - min_margins[&option.product]);
            let entry = swing.entry(option.product).or_insert(0.0);
            *entry = entry.max(gain);
        }

        for edge in data.elasticities() {
            let coupling: f64 = data
                .prices_of(edge.product_b)
                .map(|(_, margin)| (self.elasticity * margin * edge.affected_margin_pct / 100.0).abs())
                .fold(0.0, f64::max);
            *swing.entry(edge.product_a).or_insert(0.0) += coupling;
        }

        swing.into_values().fold(0.0, f64::max)
    }
}

/// Builds the model of one (sub)problem
#[derive(Debug, Clone, Default)]
pub struct ModelBuilder {
    weights: PenaltyWeights,
}

impl ModelBuilder {
    pub fn new(weights: PenaltyWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &PenaltyWeights {
        &self.weights
    }

    pub fn build(&self, data: &PricingData) -> QuadraticModel {
        let w = &self.weights;
        let min_margins = data.min_margins();
        let mut model = QuadraticModel::new();

        // Rule 1: margin above the product's worst price
        for option in data.price_options() {
            let var = VariableId::new(option.product, option.price);
            model.add_linear(var, -w.margin * (option.margin - min_margins[&option.product]));
        }

        // Rule 2: at most one price per product
        for &product in min_margins.keys() {
            let prices: Vec<_> = data.prices_of(product).map(|(price, _)| price).collect();
            for (i, &first) in prices.iter().enumerate() {
                for &second in &prices[i + 1..] {
                    model.add_interaction(
                        VariableId::new(product, first),
                        VariableId::new(product, second),
                        w.uniqueness,
                    );
                }
            }
        }

        // Rule 3: elasticity between a source price and every target price
        for edge in data.elasticities() {
            if edge.product_a == edge.product_b
                || data.margin(edge.product_a, edge.price_a).is_none()
            {
                continue;
            }
            let source = VariableId::new(edge.product_a, edge.price_a);
            for (price_b, margin_b) in data.prices_of(edge.product_b) {
                model.add_interaction(
                    source,
                    VariableId::new(edge.product_b, price_b),
                    -w.elasticity * margin_b * edge.affected_margin_pct / 100.0,
                );
            }
        }

        // Rule 4: selecting a price beats selecting none
        for option in data.price_options() {
            model.add_linear(VariableId::new(option.product, option.price), -w.force_choice);
        }

        let swing = w.max_margin_swing(data);
        if w.force_choice <= swing || w.uniqueness - w.force_choice <= swing {
            warn!(
                swing,
                uniqueness = w.uniqueness,
                force_choice = w.force_choice,
                "Penalty weights do not dominate the margin swing, constraint violations may be optimal"
            );
        }

        debug!(
            variables = model.num_variables(),
            interactions = model.num_interactions(),
            "Built quadratic model"
        );

        model
    }
}
