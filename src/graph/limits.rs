// Cluster limits
// Products per cluster shrink as candidate prices per product grow,
// since every price is one more binary variable

use crate::domain::PricingData;
use crate::error::ConfigError;

/// `(max prices per product, max products per cluster)`, ascending
const SIZE_TABLE: [(usize, usize); 10] = [
    (1, 175),
    (2, 85),
    (3, 55),
    (4, 40),
    (5, 35),
    (7, 25),
    (8, 20),
    (11, 15),
    (17, 10),
    (35, 5),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphLimits {
    pub num_products: usize,
    pub max_prices_per_product: usize,
    pub max_cluster_size: usize,
}

impl GraphLimits {
    pub fn from_data(data: &PricingData) -> Result<Self, ConfigError> {
        let max_prices_per_product = data.max_prices_per_product();
        Ok(Self {
            num_products: data.products().len(),
            max_prices_per_product,
            max_cluster_size: max_cluster_size(max_prices_per_product)?,
        })
    }
}

/// Largest cluster size for the given number of prices per product
pub fn max_cluster_size(max_prices_per_product: usize) -> Result<usize, ConfigError> {
    if max_prices_per_product == 0 {
        return Err(ConfigError::EmptyDataset);
    }
    SIZE_TABLE
        .iter()
        .find(|(prices, _)| max_prices_per_product <= *prices)
        .map(|(_, size)| *size)
        .ok_or(ConfigError::TooManyPrices {
            max_prices: max_prices_per_product,
        })
}
