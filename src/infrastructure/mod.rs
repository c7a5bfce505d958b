pub mod config;
pub mod csv_store;
pub mod logging;

#[cfg(feature = "server")]
pub mod server;

pub use config::{AppConfig, OutputSettings, ServerSettings};
pub use csv_store::ClusterFiles;
pub use logging::LoggingConfig;

#[cfg(feature = "server")]
pub use server::{start_server, ServerConfig};
