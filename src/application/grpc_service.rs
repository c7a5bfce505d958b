use std::sync::Arc;
use tonic::{Request, Response, Status};
use tracing::{debug, info};

use super::mappers::{self, price_optimizer as proto};
use super::pipeline::{plan_partition, PipelineConfig, PricingPipeline};
use super::validator::SolutionValidator;
use crate::domain::PricingData;
use crate::solver::SolverFactory;

/// gRPC service implementation
pub struct PriceOptimizerService {
    config: PipelineConfig,
}

impl PriceOptimizerService {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    async fn optimize(
        &self,
        data: PricingData,
        options: Option<&proto::OptimizeOptions>,
    ) -> Result<proto::OptimizeResult, Status> {
        let config = mappers::apply_options(&self.config, options).map_err(|e| *e)?;
        let pipeline = PricingPipeline::new(config).map_err(mappers::error_to_status)?;
        info!(
            options = data.num_price_options(),
            elasticities = data.num_elasticities(),
            solver = pipeline.solver_name(),
            "Optimizing prices"
        );

        let report = pipeline
            .run(Arc::new(data))
            .await
            .map_err(mappers::error_to_status)?;

        info!(
            products = report.solution.len(),
            failed_clusters = report.num_failed(),
            total_margin = report.total_margin,
            valid = report.validation.passed(),
            "Optimization finished"
        );
        Ok(mappers::domain_to_proto_result(&report, pipeline.solver_name()))
    }
}

impl Default for PriceOptimizerService {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

#[tonic::async_trait]
impl proto::price_optimizer_server::PriceOptimizer for PriceOptimizerService {
    async fn partition_products(
        &self,
        request: Request<proto::PartitionRequest>,
    ) -> Result<Response<proto::PartitionResult>, Status> {
        let request = request.into_inner();
        let dataset = request.dataset.unwrap_or_default();
        let data = mappers::proto_to_domain_dataset(&dataset.price_options, &dataset.elasticities);
        let config = mappers::apply_options(&self.config, request.options.as_ref()).map_err(|e| *e)?;

        let plan = plan_partition(&config.partition, &data).map_err(mappers::error_to_status)?;
        Ok(Response::new(mappers::domain_to_proto_partition(&plan)))
    }

    async fn optimize_prices(
        &self,
        request: Request<proto::OptimizeRequest>,
    ) -> Result<Response<proto::OptimizeResult>, Status> {
        let request = request.into_inner();
        let dataset = request.dataset.unwrap_or_default();
        let data = mappers::proto_to_domain_dataset(&dataset.price_options, &dataset.elasticities);

        let result = self.optimize(data, request.options.as_ref()).await?;
        Ok(Response::new(result))
    }

    async fn optimize_prices_stream(
        &self,
        request: Request<tonic::Streaming<proto::DatasetChunk>>,
    ) -> Result<Response<proto::OptimizeResult>, Status> {
        let mut stream = request.into_inner();

        let mut price_options = Vec::new();
        let mut elasticities = Vec::new();
        let mut options: Option<proto::OptimizeOptions> = None;
        let mut chunks = 0usize;

        // Collect all chunks
        while let Some(chunk) = stream.message().await? {
            chunks += 1;
            match chunk.chunk {
                Some(proto::dataset_chunk::Chunk::PriceOptions(batch)) => {
                    price_options.extend(batch.records);
                }
                Some(proto::dataset_chunk::Chunk::Elasticities(batch)) => {
                    elasticities.extend(batch.records);
                }
                Some(proto::dataset_chunk::Chunk::Options(o)) => {
                    if options.replace(o).is_some() {
                        return Err(Status::invalid_argument(
                            "Options may be sent at most once",
                        ));
                    }
                }
                None => {}
            }
        }
        debug!(chunks, "Received streamed dataset");

        let data = mappers::proto_to_domain_dataset(&price_options, &elasticities);
        let result = self.optimize(data, options.as_ref()).await?;
        Ok(Response::new(result))
    }

    async fn validate_solution(
        &self,
        request: Request<proto::ValidateRequest>,
    ) -> Result<Response<proto::ValidationResult>, Status> {
        let request = request.into_inner();
        let solution = mappers::proto_to_domain_solution(&request.selections);
        let expected = mappers::expected_products(&request.expected_products);

        let report = SolutionValidator::validate(&solution, &expected);
        Ok(Response::new(mappers::domain_to_proto_validation(&report)))
    }

    async fn get_available_solvers(
        &self,
        _request: Request<proto::Empty>,
    ) -> Result<Response<proto::AvailableSolvers>, Status> {
        Ok(Response::new(mappers::domain_to_proto_solvers(
            SolverFactory::available_solvers(),
        )))
    }
}
