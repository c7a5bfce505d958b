use std::path::PathBuf;
use thiserror::Error;

use crate::domain::solver_service::SolverError;

/// Configuration errors. Always fatal: they are reported before any work starts.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("too many prices per product: {max_prices} (at most 35 supported)")]
    TooManyPrices { max_prices: usize },

    #[error("dataset has no price options")]
    EmptyDataset,

    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

impl ConfigError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

/// Errors reading or writing dataset files.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed record in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cluster {prefix} has no matching price file {path}")]
    MissingPriceFile { prefix: String, path: PathBuf },
}

/// Partition invariant violations detected after partitioning.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PartitionError {
    #[error("cluster {index} has {size} products, limit is {max_size}")]
    ClusterTooLarge {
        index: usize,
        size: usize,
        max_size: usize,
    },

    #[error("cluster {index} is empty")]
    EmptyCluster { index: usize },

    #[error("product {product} appears in more than one cluster")]
    Overlap { product: u32 },

    #[error("{missing} products are not covered by any cluster")]
    Uncovered { missing: usize },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Partition(#[from] PartitionError),

    #[error(transparent)]
    Solver(#[from] SolverError),
}

pub type Result<T> = std::result::Result<T, Error>;
