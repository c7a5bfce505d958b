// Infrastructure: Server setup and configuration
// Owns the gRPC listener lifecycle

use std::net::SocketAddr;
use tonic::transport::Server;
use tracing::info;

use crate::application::mappers::price_optimizer::price_optimizer_server::PriceOptimizerServer;
use crate::application::pipeline::PipelineConfig;
use crate::application::PriceOptimizerService;
use crate::solver::SolverFactory;

pub struct ServerConfig {
    pub address: SocketAddr,
    /// Defaults for requests that leave options unset
    pub pipeline: PipelineConfig,
}

impl ServerConfig {
    pub fn new(address: SocketAddr, pipeline: PipelineConfig) -> Self {
        Self { address, pipeline }
    }
}

pub async fn start_server(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    config.pipeline.validate()?;

    let available: Vec<&str> = SolverFactory::available_solvers()
        .into_iter()
        .filter(|s| s.available)
        .map(|s| s.name)
        .collect();
    info!(
        address = %config.address,
        strategy = %config.pipeline.partition.strategy,
        mode = %config.pipeline.solver.mode,
        solvers = ?available,
        "Price optimizer listening"
    );

    let service = PriceOptimizerService::new(config.pipeline);
    Server::builder()
        .add_service(PriceOptimizerServer::new(service))
        .serve(config.address)
        .await?;

    Ok(())
}
