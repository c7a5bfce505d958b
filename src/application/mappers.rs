// Mappers: Convert between gRPC protobuf types and domain models
// Protobuf types stay out of the pipeline and the domain layer

use std::collections::{BTreeMap, BTreeSet};
use tonic::Status;

use super::pipeline::{ClusterOutcome, ClusterReport, PartitionPlan, PipelineConfig, PipelineReport};
use super::validator::{ValidationCheck, ValidationReport};
use crate::domain::{
    models::{CrossElasticityEdge, GlobalSolution, PriceOption, PricingData},
    value_objects::{PriceSelection, ProductId, SolverMode},
};
use crate::error::Error;
use crate::graph::PartitionStrategy;
use crate::solver::SolverInfo;

pub mod price_optimizer {
    tonic::include_proto!("price_optimizer");
}

use price_optimizer as proto;

/// Convert protobuf records to a domain dataset
pub fn proto_to_domain_dataset(
    price_options: &[proto::PriceOption],
    elasticities: &[proto::CrossElasticity],
) -> PricingData {
    PricingData::new(
        price_options
            .iter()
            .map(|o| PriceOption::new(o.product, o.price, o.margin)),
        elasticities.iter().map(|e| {
            CrossElasticityEdge::new(e.product_a, e.product_b, e.price_a, e.affected_margin_pct)
        }),
    )
}

pub fn proto_to_domain_strategy(value: i32) -> std::result::Result<PartitionStrategy, Box<Status>> {
    match proto::PartitionStrategy::try_from(value) {
        Ok(proto::PartitionStrategy::KernighanLin) => Ok(PartitionStrategy::KernighanLin),
        Ok(proto::PartitionStrategy::LouvainSpectral) => Ok(PartitionStrategy::LouvainSpectral),
        Err(_) => Err(Box::new(Status::invalid_argument(
            "Invalid partition strategy",
        ))),
    }
}

pub fn proto_to_domain_mode(value: i32) -> std::result::Result<SolverMode, Box<Status>> {
    match proto::SolverMode::try_from(value) {
        Ok(proto::SolverMode::Annealing) => Ok(SolverMode::Annealing),
        Ok(proto::SolverMode::Exhaustive) => Ok(SolverMode::Exhaustive),
        Ok(proto::SolverMode::Hybrid) => Ok(SolverMode::Hybrid),
        Err(_) => Err(Box::new(Status::invalid_argument("Invalid solver mode"))),
    }
}

pub fn domain_to_proto_mode(mode: SolverMode) -> proto::SolverMode {
    match mode {
        SolverMode::Annealing => proto::SolverMode::Annealing,
        SolverMode::Exhaustive => proto::SolverMode::Exhaustive,
        SolverMode::Hybrid => proto::SolverMode::Hybrid,
    }
}

/// Server configuration with the request's options applied on top
pub fn apply_options(
    base: &PipelineConfig,
    options: Option<&proto::OptimizeOptions>,
) -> std::result::Result<PipelineConfig, Box<Status>> {
    let mut config = base.clone();
    let Some(options) = options else {
        return Ok(config);
    };

    if let Some(strategy) = options.strategy {
        config.partition.strategy = proto_to_domain_strategy(strategy)?;
    }
    if let Some(mode) = options.mode {
        config.solver.mode = proto_to_domain_mode(mode)?;
    }
    if let Some(num_reads) = options.num_reads {
        config.solver.num_reads = num_reads as usize;
    }
    if let Some(seed) = options.seed {
        config.solver.seed = Some(seed);
        config.partition.bisection_seed = Some(seed);
        config.partition.louvain_seed = Some(seed);
    }
    if let Some(max_cluster_size) = options.max_cluster_size {
        config.partition.max_cluster_size = Some(max_cluster_size as usize);
    }
    if let Some(secs) = options.cluster_timeout_secs {
        config.solver.cluster_timeout_secs = Some(secs);
    }

    config
        .validate()
        .map_err(|e| Box::new(Status::invalid_argument(e.to_string())))?;
    Ok(config)
}

/// Convert protobuf selections to a domain solution; no prices means unassigned
pub fn proto_to_domain_solution(selections: &[proto::ProductSelection]) -> GlobalSolution {
    let selections: BTreeMap<ProductId, PriceSelection> = selections
        .iter()
        .map(|s| {
            let selection = if s.prices.is_empty() {
                PriceSelection::Unassigned
            } else {
                let mut prices = s.prices.clone();
                prices.sort_unstable();
                prices.dedup();
                PriceSelection::Selected(prices)
            };
            (s.product, selection)
        })
        .collect();
    GlobalSolution::new(selections)
}

pub fn domain_to_proto_solution(solution: &GlobalSolution) -> Vec<proto::ProductSelection> {
    solution
        .iter()
        .map(|(product, selection)| proto::ProductSelection {
            product,
            prices: selection.prices().to_vec(),
        })
        .collect()
}

fn domain_to_proto_check(check: &ValidationCheck) -> proto::ValidationCheck {
    proto::ValidationCheck {
        passed: check.passed,
        offending: check.offending.clone(),
    }
}

pub fn domain_to_proto_validation(report: &ValidationReport) -> proto::ValidationResult {
    proto::ValidationResult {
        passed: report.passed(),
        products_listed: Some(domain_to_proto_check(&report.products_listed)),
        single_price: Some(domain_to_proto_check(&report.single_price)),
    }
}

fn domain_to_proto_cluster(cluster: &ClusterReport) -> proto::ClusterResult {
    let (status, energy, attempts, message) = match &cluster.outcome {
        ClusterOutcome::Solved {
            energy, attempts, ..
        } => (
            proto::ClusterStatus::Solved,
            *energy,
            *attempts as u32,
            String::new(),
        ),
        ClusterOutcome::Skipped { reason } => {
            (proto::ClusterStatus::Skipped, 0.0, 0, reason.to_string())
        }
        ClusterOutcome::Failed { error, attempts } => (
            proto::ClusterStatus::Failed,
            0.0,
            *attempts as u32,
            error.to_string(),
        ),
    };

    proto::ClusterResult {
        name: cluster.name.clone(),
        products: cluster.products as u32,
        status: status as i32,
        energy,
        attempts,
        message,
        elapsed_ms: cluster.elapsed.as_secs_f64() * 1000.0,
    }
}

pub fn domain_to_proto_result(report: &PipelineReport, solver_name: &str) -> proto::OptimizeResult {
    proto::OptimizeResult {
        selections: domain_to_proto_solution(&report.solution),
        clusters: report.clusters.iter().map(domain_to_proto_cluster).collect(),
        validation: Some(domain_to_proto_validation(&report.validation)),
        total_margin: report.total_margin,
        dropped_weight: report.dropped_weight,
        solver_backend: solver_name.to_string(),
    }
}

pub fn domain_to_proto_partition(plan: &PartitionPlan) -> proto::PartitionResult {
    proto::PartitionResult {
        num_products: plan.limits.num_products as u32,
        max_prices_per_product: plan.limits.max_prices_per_product as u32,
        max_cluster_size: plan.max_cluster_size as u32,
        clusters: plan
            .partition
            .node_sets()
            .into_iter()
            .enumerate()
            .map(|(index, nodes)| proto::Cluster {
                name: format!("subgraph{}", index + 1),
                products: nodes.into_iter().collect(),
            })
            .collect(),
        dropped_weight: plan.dropped_weight,
    }
}

pub fn domain_to_proto_solvers(solvers: Vec<SolverInfo>) -> proto::AvailableSolvers {
    proto::AvailableSolvers {
        solvers: solvers
            .into_iter()
            .map(|s| proto::SolverInfo {
                name: s.name.to_string(),
                mode: domain_to_proto_mode(s.mode) as i32,
                available: s.available,
            })
            .collect(),
    }
}

pub fn expected_products(ids: &[u32]) -> BTreeSet<ProductId> {
    ids.iter().copied().collect()
}

/// Configuration problems are the caller's fault, everything else is ours
pub fn error_to_status(error: Error) -> Status {
    match error {
        Error::Config(e) => Status::invalid_argument(e.to_string()),
        other => Status::internal(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_enum_values_are_rejected() {
        assert!(proto_to_domain_mode(7).is_err());
        assert!(proto_to_domain_strategy(-1).is_err());
        assert_eq!(proto_to_domain_mode(1).unwrap(), SolverMode::Exhaustive);
    }

    #[test]
    fn test_options_override_base_config() {
        let options = proto::OptimizeOptions {
            strategy: Some(proto::PartitionStrategy::LouvainSpectral as i32),
            mode: Some(proto::SolverMode::Exhaustive as i32),
            num_reads: None,
            seed: Some(3),
            max_cluster_size: Some(4),
            cluster_timeout_secs: None,
        };
        let config = apply_options(&PipelineConfig::default(), Some(&options)).unwrap();

        assert_eq!(config.partition.strategy, PartitionStrategy::LouvainSpectral);
        assert_eq!(config.solver.mode, SolverMode::Exhaustive);
        assert_eq!(config.solver.seed, Some(3));
        assert_eq!(config.partition.max_cluster_size, Some(4));
        assert_eq!(config.solver.num_reads, 10);
    }

    #[test]
    fn test_invalid_options_map_to_invalid_argument() {
        let options = proto::OptimizeOptions {
            num_reads: Some(0),
            ..Default::default()
        };
        let status = apply_options(&PipelineConfig::default(), Some(&options)).unwrap_err();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);
    }

    #[test]
    fn test_empty_prices_mean_unassigned() {
        let solution = proto_to_domain_solution(&[
            proto::ProductSelection {
                product: 1,
                prices: vec![2],
            },
            proto::ProductSelection {
                product: 2,
                prices: vec![],
            },
        ]);
        assert_eq!(solution.get(1), Some(&PriceSelection::Selected(vec![2])));
        assert_eq!(solution.get(2), Some(&PriceSelection::Unassigned));
        assert_eq!(domain_to_proto_solution(&solution)[1].prices, Vec::<u32>::new());
    }

    #[test]
    fn test_cluster_attempts_are_reported() {
        let report = |outcome| ClusterReport {
            index: 0,
            name: "cluster_0".to_string(),
            products: 3,
            outcome,
            elapsed: std::time::Duration::from_millis(5),
        };

        let solved = domain_to_proto_cluster(&report(ClusterOutcome::Solved {
            energy: -420.0,
            assigned: 3,
            attempts: 3,
        }));
        assert_eq!(solved.status, proto::ClusterStatus::Solved as i32);
        assert_eq!(solved.attempts, 3);
        assert_eq!(solved.energy, -420.0);

        let skipped = domain_to_proto_cluster(&report(ClusterOutcome::Skipped {
            reason: crate::domain::SolverError::InvalidProblem("too large".to_string()),
        }));
        assert_eq!(skipped.attempts, 0);
    }

    #[test]
    fn test_huge_cluster_timeout_maps_to_invalid_argument() {
        let options = proto::OptimizeOptions {
            cluster_timeout_secs: Some(1e30),
            ..Default::default()
        };
        let status = apply_options(&PipelineConfig::default(), Some(&options)).unwrap_err();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);
    }
}
