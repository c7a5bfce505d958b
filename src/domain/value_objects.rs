// Domain value objects representing core pricing concepts

use serde::Deserialize;
use std::fmt;

/// Identifier of a product in the catalogue
pub type ProductId = u32;

/// Identifier of a candidate price of a product
pub type PriceId = u32;

/// Binary decision variable: "product is sold at price"
///
/// Ordered by product first, so every variable of one product is contiguous
/// when iterated from an ordered map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VariableId {
    pub product: ProductId,
    pub price: PriceId,
}

impl VariableId {
    pub fn new(product: ProductId, price: PriceId) -> Self {
        Self { product, price }
    }
}

impl fmt::Display for VariableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "i{}_p{}", self.product, self.price)
    }
}

impl From<(ProductId, PriceId)> for VariableId {
    fn from((product, price): (ProductId, PriceId)) -> Self {
        Self::new(product, price)
    }
}

/// Solving mode requested from the optimization backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverMode {
    /// Exact enumeration of every assignment
    Exhaustive,
    /// Exact MIP solve of the linearized model
    Hybrid,
    /// Stochastic simulated annealing
    #[default]
    Annealing,
}

impl fmt::Display for SolverMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverMode::Exhaustive => write!(f, "exhaustive"),
            SolverMode::Hybrid => write!(f, "hybrid"),
            SolverMode::Annealing => write!(f, "annealing"),
        }
    }
}

impl std::str::FromStr for SolverMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "exhaustive" | "exact" => Ok(SolverMode::Exhaustive),
            "hybrid" => Ok(SolverMode::Hybrid),
            "annealing" | "quantum" => Ok(SolverMode::Annealing),
            other => Err(format!("unknown solver mode '{}'", other)),
        }
    }
}

/// Price chosen for a product in the integrated solution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriceSelection {
    /// No cluster produced a price for the product
    Unassigned,
    /// Selected prices, sorted and deduplicated; more than one means the
    /// uniqueness penalty was violated
    Selected(Vec<PriceId>),
}

impl PriceSelection {
    pub fn prices(&self) -> &[PriceId] {
        match self {
            PriceSelection::Unassigned => &[],
            PriceSelection::Selected(prices) => prices,
        }
    }

    /// The price when exactly one was selected
    pub fn single(&self) -> Option<PriceId> {
        match self.prices() {
            [price] => Some(*price),
            _ => None,
        }
    }

    pub fn is_assigned(&self) -> bool {
        matches!(self, PriceSelection::Selected(_))
    }
}

impl fmt::Display for PriceSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceSelection::Unassigned => write!(f, "-1"),
            PriceSelection::Selected(prices) => {
                let joined = prices
                    .iter()
                    .map(|p| p.to_string())
                    .collect::<Vec<_>>()
                    .join(",");
                write!(f, "{}", joined)
            }
        }
    }
}
