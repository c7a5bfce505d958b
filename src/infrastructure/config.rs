// Application configuration
// Loading and validation of the TOML config; a missing section takes its defaults
//
//   [logging]
//   level = "info"
//   format = "pretty"
//
//   [partition]
//   strategy = "louvain_spectral"
//
//   [solver]
//   mode = "annealing"
//   num_reads = 20

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;

use super::logging::LoggingConfig;
use crate::application::pipeline::{PipelineConfig, SolverSettings};
use crate::error::ConfigError;
use crate::graph::PartitionConfig;
use crate::qubo::PenaltyWeights;

/// gRPC listener settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub address: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            address: "0.0.0.0:50051".into(),
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.address.parse().map_err(|_| {
            ConfigError::invalid(
                "server.address",
                format!("'{}' is not a socket address", self.address),
            )
        })
    }
}

/// Naming of written cluster files
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub prefix: String,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            prefix: "cluster".into(),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub server: ServerSettings,
    pub partition: PartitionConfig,
    pub penalties: PenaltyWeights,
    pub solver: SolverSettings,
    pub output: OutputSettings,
}

impl AppConfig {
    /// Parse and validate TOML content.
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse_toml(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.logging.validate()?;
        self.server.socket_addr()?;
        if self.output.prefix.is_empty() {
            return Err(ConfigError::invalid("output.prefix", "must not be empty"));
        }
        self.pipeline_config().validate()
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            partition: self.partition.clone(),
            penalties: self.penalties,
            solver: self.solver.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SolverMode;
    use crate::graph::PartitionStrategy;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = AppConfig::parse_toml("").unwrap();
        assert_eq!(config.server.address, "0.0.0.0:50051");
        assert_eq!(config.output.prefix, "cluster");
        assert_eq!(config.logging, LoggingConfig::default());
        assert_eq!(config.solver.max_variables, 175);
        assert_eq!(config.partition.strategy, PartitionStrategy::KernighanLin);
    }

    #[test]
    fn test_sections_override_defaults() {
        let config = AppConfig::parse_toml(
            r#"
            [logging]
            format = "json"

            [partition]
            strategy = "louvain_spectral"
            resolution_steps = 5
            max_cluster_size = 12

            [penalties]
            uniqueness = 8000.0

            [solver]
            mode = "exhaustive"
            seed = 9
            cluster_timeout_secs = 2.5
            "#,
        )
        .unwrap();

        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.partition.strategy, PartitionStrategy::LouvainSpectral);
        assert_eq!(config.partition.resolution_steps, 5);
        assert_eq!(config.partition.max_cluster_size, Some(12));
        assert_eq!(config.penalties.uniqueness, 8000.0);
        assert_eq!(config.solver.mode, SolverMode::Exhaustive);
        assert_eq!(config.solver.seed, Some(9));

        let pipeline = config.pipeline_config();
        assert_eq!(pipeline.solver.cluster_timeout(), Some(std::time::Duration::from_millis(2500)));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            AppConfig::parse_toml("[server]\naddress = \"nowhere\""),
            Err(ConfigError::InvalidValue { field: "server.address", .. })
        ));
        assert!(matches!(
            AppConfig::parse_toml("[solver]\nconcurrency = 0"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            AppConfig::parse_toml("[solver]\nmode = \"quantum\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            AppConfig::load(dir.path().join("absent.toml")),
            Err(ConfigError::ReadFile { .. })
        ));
    }
}
