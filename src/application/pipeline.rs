// Pricing pipeline
// graph -> partition -> per-cluster model and solve -> integrate -> validate

use futures::stream::{self, StreamExt};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::gateway::{ModelLimits, SolverGateway};
use super::integrator::{decode, SolutionIntegrator};
use super::validator::{SolutionValidator, ValidationReport};
use crate::domain::{
    models::{GlobalSolution, PricingData, ResolvedAssignment, SolveParams},
    solver_service::{SolverError, SolverService},
    value_objects::{ProductId, SolverMode},
};
use crate::error::{ConfigError, Result};
use crate::graph::{GraphLimits, InteractionGraph, Partition, PartitionConfig, PartitionerFactory};
use crate::qubo::{ModelBuilder, PenaltyWeights};
use crate::solver::SolverFactory;

/// Backend selection and scheduling, the `[solver]` config section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    pub mode: SolverMode,
    pub num_reads: usize,
    pub sweeps: usize,
    pub seed: Option<u64>,
    pub max_variables: usize,
    pub max_connections: usize,
    /// Wall-clock budget per cluster attempt
    pub cluster_timeout_secs: Option<f64>,
    /// Extra attempts after a transient backend failure
    pub max_retries: usize,
    /// Clusters solved at the same time
    pub concurrency: usize,
}

impl Default for SolverSettings {
    fn default() -> Self {
        let limits = ModelLimits::default();
        Self {
            mode: SolverMode::default(),
            num_reads: 10,
            sweeps: 1000,
            seed: None,
            max_variables: limits.max_variables,
            max_connections: limits.max_connections,
            cluster_timeout_secs: None,
            max_retries: 2,
            concurrency: 4,
        }
    }
}

impl SolverSettings {
    pub fn limits(&self) -> ModelLimits {
        ModelLimits {
            max_variables: self.max_variables,
            max_connections: self.max_connections,
        }
    }

    pub fn cluster_timeout(&self) -> Option<Duration> {
        self.cluster_timeout_secs
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }

    /// Parameters for one cluster; the seed is offset by the cluster index
    pub fn solve_params(&self, cluster: usize) -> SolveParams {
        SolveParams {
            mode: self.mode,
            num_reads: Some(self.num_reads),
            sweeps: Some(self.sweeps),
            seed: self.seed.map(|seed| seed.wrapping_add(cluster as u64)),
            time_limit: self.cluster_timeout(),
        }
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.limits().validate()?;
        if self.num_reads == 0 {
            return Err(ConfigError::invalid("solver.num_reads", "must be positive"));
        }
        if self.sweeps == 0 {
            return Err(ConfigError::invalid("solver.sweeps", "must be positive"));
        }
        if self.concurrency == 0 {
            return Err(ConfigError::invalid("solver.concurrency", "must be positive"));
        }
        if let Some(secs) = self.cluster_timeout_secs {
            if !(secs > 0.0 && Duration::try_from_secs_f64(secs).is_ok()) {
                return Err(ConfigError::invalid(
                    "solver.cluster_timeout_secs",
                    "must be a positive number of seconds",
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub partition: PartitionConfig,
    pub penalties: PenaltyWeights,
    pub solver: SolverSettings,
}

impl PipelineConfig {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.partition.validate()?;
        self.penalties.validate()?;
        self.solver.validate()
    }
}

/// Products of one cluster with the data restricted to them
#[derive(Debug, Clone)]
pub struct ClusterProblem {
    pub index: usize,
    pub name: String,
    pub data: Arc<PricingData>,
}

impl ClusterProblem {
    pub fn new(index: usize, name: impl Into<String>, data: PricingData) -> Self {
        Self {
            index,
            name: name.into(),
            data: Arc::new(data),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClusterOutcome {
    Solved {
        energy: f64,
        assigned: usize,
        attempts: usize,
    },
    /// Model exceeded backend capacity and was never dispatched
    Skipped { reason: SolverError },
    Failed { error: SolverError, attempts: usize },
}

impl ClusterOutcome {
    pub fn is_solved(&self) -> bool {
        matches!(self, ClusterOutcome::Solved { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClusterReport {
    pub index: usize,
    pub name: String,
    pub products: usize,
    pub outcome: ClusterOutcome,
    pub elapsed: Duration,
}

/// Result of partitioning a dataset, before anything is solved
#[derive(Debug, Clone)]
pub struct PartitionPlan {
    pub limits: GraphLimits,
    pub max_cluster_size: usize,
    pub graph: InteractionGraph,
    pub partition: Partition,
    /// Elasticity weight on edges between clusters, ignored by the solvers
    pub dropped_weight: f64,
}

impl PartitionPlan {
    /// Per-cluster data, in partition order
    pub fn problems(&self, data: &PricingData) -> Vec<ClusterProblem> {
        self.partition
            .clusters()
            .iter()
            .enumerate()
            .map(|(index, cluster)| {
                ClusterProblem::new(
                    index,
                    format!("subgraph{}", index + 1),
                    data.restrict_to(&cluster.node_set()),
                )
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub solution: GlobalSolution,
    pub validation: ValidationReport,
    pub clusters: Vec<ClusterReport>,
    /// Margin of the single-price products, elasticity effects included
    pub total_margin: f64,
    pub dropped_weight: f64,
}

impl PipelineReport {
    pub fn num_failed(&self) -> usize {
        self.clusters.iter().filter(|c| !c.outcome.is_solved()).count()
    }
}

/// Build the interaction graph and split it into verified clusters
pub fn plan_partition(config: &PartitionConfig, data: &PricingData) -> Result<PartitionPlan> {
    config.validate()?;
    let limits = GraphLimits::from_data(data)?;
    let max_cluster_size = config.max_cluster_size.unwrap_or(limits.max_cluster_size);

    let graph = InteractionGraph::from_pricing_data(data);
    let partitioner = PartitionerFactory::create(config);
    let partition = partitioner.partition(&graph, max_cluster_size)?;
    partition.verify(&graph, max_cluster_size)?;

    let dropped_weight = partition.dropped_weight(&graph);
    info!(
        strategy = partitioner.name(),
        products = limits.num_products,
        max_prices = limits.max_prices_per_product,
        max_cluster_size,
        clusters = partition.len(),
        dropped_weight,
        "Partitioned interaction graph"
    );

    Ok(PartitionPlan {
        limits,
        max_cluster_size,
        graph,
        partition,
        dropped_weight,
    })
}

pub struct PricingPipeline {
    config: PipelineConfig,
    gateway: Arc<SolverGateway>,
}

impl PricingPipeline {
    /// Validate the configuration and create the configured backend
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let solver = SolverFactory::create_from_mode(config.solver.mode)?;
        Self::with_solver(config, solver)
    }

    pub fn with_solver(config: PipelineConfig, solver: Arc<dyn SolverService>) -> Result<Self> {
        config.validate()?;
        let gateway = Arc::new(SolverGateway::new(solver, config.solver.limits()));
        Ok(Self { config, gateway })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn solver_name(&self) -> &str {
        self.gateway.solver_name()
    }

    pub fn partition(&self, data: &PricingData) -> Result<PartitionPlan> {
        plan_partition(&self.config.partition, data)
    }

    /// Full run over an in-memory dataset
    pub async fn run(&self, data: Arc<PricingData>) -> Result<PipelineReport> {
        let plan = self.partition(&data)?;
        let problems = plan.problems(&data);
        self.execute(problems, data.products(), &data, plan.dropped_weight)
            .await
    }

    /// Solve pre-partitioned clusters; the universe is every product seen
    pub async fn run_clusters(&self, problems: Vec<ClusterProblem>) -> Result<PipelineReport> {
        let combined = PricingData::new(
            problems
                .iter()
                .flat_map(|p| p.data.price_options().collect::<Vec<_>>()),
            problems
                .iter()
                .flat_map(|p| p.data.elasticities().collect::<Vec<_>>()),
        );
        if combined.is_empty() {
            return Err(ConfigError::EmptyDataset.into());
        }
        self.execute(problems, combined.products(), &combined, 0.0)
            .await
    }

    async fn execute(
        &self,
        problems: Vec<ClusterProblem>,
        universe: BTreeSet<ProductId>,
        evaluation: &PricingData,
        dropped_weight: f64,
    ) -> Result<PipelineReport> {
        let start = Instant::now();
        let total = problems.len();

        let mut results: Vec<(ClusterReport, Option<ResolvedAssignment>)> =
            stream::iter(problems.into_iter().map(|problem| self.solve_cluster(problem)))
                .buffer_unordered(self.config.solver.concurrency)
                .collect()
                .await;
        results.sort_by_key(|(report, _)| report.index);

        let integrator = SolutionIntegrator::new(universe);
        let solution = integrator.integrate(results.iter().filter_map(|(_, a)| a.as_ref()));
        let validation = SolutionValidator::validate(&solution, integrator.universe());
        let total_margin = evaluation.evaluate_margin(&solution.single_price_assignment());

        let clusters: Vec<ClusterReport> = results.into_iter().map(|(report, _)| report).collect();
        let report = PipelineReport {
            solution,
            validation,
            clusters,
            total_margin,
            dropped_weight,
        };

        info!(
            clusters = total,
            failed = report.num_failed(),
            unassigned = report.solution.num_unassigned(),
            total_margin,
            elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Pipeline finished"
        );
        Ok(report)
    }

    async fn solve_cluster(
        &self,
        problem: ClusterProblem,
    ) -> (ClusterReport, Option<ResolvedAssignment>) {
        let start = Instant::now();
        let settings = &self.config.solver;
        let params = settings.solve_params(problem.index);
        let products = problem.data.products().len();
        let mut attempts = 0;

        let (outcome, assignment) = loop {
            attempts += 1;
            match self.solve_once(&problem, &params).await {
                Ok(sample) => {
                    let assignment = decode(&sample);
                    let outcome = ClusterOutcome::Solved {
                        energy: sample.energy,
                        assigned: assignment.len(),
                        attempts,
                    };
                    break (outcome, Some(assignment));
                }
                Err(reason @ SolverError::SizeExceeded { .. }) => {
                    warn!(cluster = %problem.name, error = %reason, "Cluster skipped");
                    break (ClusterOutcome::Skipped { reason }, None);
                }
                Err(error) if error.is_transient() && attempts <= settings.max_retries => {
                    warn!(cluster = %problem.name, attempt = attempts, error = %error, "Retrying cluster");
                }
                Err(error) => {
                    warn!(cluster = %problem.name, attempts, error = %error, "Cluster failed");
                    break (ClusterOutcome::Failed { error, attempts }, None);
                }
            }
        };

        debug!(cluster = %problem.name, products, outcome = ?outcome, "Cluster finished");
        let report = ClusterReport {
            index: problem.index,
            name: problem.name,
            products,
            outcome,
            elapsed: start.elapsed(),
        };
        (report, assignment)
    }

    async fn solve_once(
        &self,
        problem: &ClusterProblem,
        params: &SolveParams,
    ) -> std::result::Result<crate::domain::Sample, SolverError> {
        let gateway = Arc::clone(&self.gateway);
        let builder = ModelBuilder::new(self.config.penalties);
        let data = Arc::clone(&problem.data);
        let params = params.clone();

        let mut task = tokio::task::spawn_blocking(move || {
            let model = builder.build(&data);
            gateway.solve(&model, &params)
        });

        let joined = match self.config.solver.cluster_timeout() {
            Some(limit) => match tokio::time::timeout(limit, &mut task).await {
                Ok(joined) => joined,
                Err(_) => {
                    // blocking solves cannot be aborted; wait for it to return
                    if let Err(e) = task.await {
                        warn!(cluster = %problem.name, error = %e, "Timed out worker task failed");
                    }
                    return Err(SolverError::Timeout(limit.as_secs_f64()));
                }
            },
            None => task.await,
        };
        joined.map_err(|e| SolverError::ExecutionFailed(format!("worker task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CrossElasticityEdge, PriceOption, PriceSelection, Sample, SampleSet};
    use crate::error::Error;
    use crate::graph::PartitionStrategy;
    use crate::qubo::QuadraticModel;
    use crate::solver::ExhaustiveSolver;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn scenario() -> PricingData {
        PricingData::new(
            vec![
                PriceOption::new(1, 1, 100.0),
                PriceOption::new(1, 2, 150.0),
                PriceOption::new(2, 1, 200.0),
                PriceOption::new(3, 1, 50.0),
            ],
            vec![CrossElasticityEdge::new(1, 2, 2, 10.0)],
        )
    }

    fn exhaustive_config() -> PipelineConfig {
        PipelineConfig {
            solver: SolverSettings {
                mode: SolverMode::Exhaustive,
                ..SolverSettings::default()
            },
            ..PipelineConfig::default()
        }
    }

    struct FlakySolver {
        calls: AtomicUsize,
        failures: usize,
    }

    impl SolverService for FlakySolver {
        fn sample(
            &self,
            _model: &crate::qubo::QuadraticModel,
            _params: &SolveParams,
        ) -> crate::domain::Result<SampleSet> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(SolverError::ExecutionFailed("busy".to_string()))
            } else {
                Ok(SampleSet::new(vec![Sample::empty()]))
            }
        }

        fn name(&self) -> &str {
            "flaky"
        }

        fn supports(&self, _mode: SolverMode) -> bool {
            true
        }
    }

    /// Stalls on models holding `slow_product`, solves the rest exactly
    struct StallingSolver {
        slow_product: ProductId,
        stall: Duration,
        started: AtomicUsize,
        finished: AtomicUsize,
    }

    impl StallingSolver {
        fn new(slow_product: ProductId) -> Self {
            Self {
                slow_product,
                stall: Duration::from_millis(300),
                started: AtomicUsize::new(0),
                finished: AtomicUsize::new(0),
            }
        }
    }

    impl SolverService for StallingSolver {
        fn sample(
            &self,
            model: &QuadraticModel,
            params: &SolveParams,
        ) -> crate::domain::Result<SampleSet> {
            if !model.variables().iter().any(|v| v.product == self.slow_product) {
                return ExhaustiveSolver::new().sample(model, params);
            }
            self.started.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.stall);
            self.finished.fetch_add(1, Ordering::SeqCst);
            Ok(SampleSet::new(vec![Sample::empty()]))
        }

        fn name(&self) -> &str {
            "stalling"
        }

        fn supports(&self, _mode: SolverMode) -> bool {
            true
        }
    }

    fn timeout_config(secs: f64) -> PipelineConfig {
        PipelineConfig {
            solver: SolverSettings {
                mode: SolverMode::Exhaustive,
                cluster_timeout_secs: Some(secs),
                max_retries: 2,
                ..SolverSettings::default()
            },
            ..PipelineConfig::default()
        }
    }

    fn two_clusters() -> Vec<ClusterProblem> {
        let data = scenario();
        vec![
            ClusterProblem::new(0, "cluster_0", data.restrict_to(&BTreeSet::from([1, 2]))),
            ClusterProblem::new(1, "cluster_1", data.restrict_to(&BTreeSet::from([3]))),
        ]
    }

    #[tokio::test]
    async fn test_scenario_end_to_end() {
        let pipeline = PricingPipeline::new(exhaustive_config()).unwrap();
        let report = pipeline.run(Arc::new(scenario())).await.unwrap();

        assert_eq!(report.solution.get(1), Some(&PriceSelection::Selected(vec![2])));
        assert_eq!(report.solution.get(2), Some(&PriceSelection::Selected(vec![1])));
        assert_eq!(report.solution.get(3), Some(&PriceSelection::Selected(vec![1])));
        assert!(report.validation.passed());
        assert_eq!(report.total_margin, 420.0);
        assert_eq!(report.dropped_weight, 0.0);
        assert_eq!(report.num_failed(), 0);
    }

    #[tokio::test]
    async fn test_plan_respects_cluster_limit() {
        let config = PipelineConfig {
            partition: PartitionConfig {
                max_cluster_size: Some(2),
                strategy: PartitionStrategy::KernighanLin,
                ..PartitionConfig::default()
            },
            ..exhaustive_config()
        };
        let pipeline = PricingPipeline::new(config).unwrap();
        let plan = pipeline.partition(&scenario()).unwrap();

        assert_eq!(plan.limits.max_cluster_size, 85);
        assert_eq!(plan.max_cluster_size, 2);
        assert!(plan.partition.sizes().iter().all(|&s| s <= 2));
        assert_eq!(plan.dropped_weight, 0.0);
    }

    #[tokio::test]
    async fn test_oversized_cluster_is_skipped_not_fatal() {
        let config = PipelineConfig {
            solver: SolverSettings {
                mode: SolverMode::Exhaustive,
                max_variables: 1,
                ..SolverSettings::default()
            },
            ..PipelineConfig::default()
        };
        let pipeline = PricingPipeline::new(config).unwrap();
        let report = pipeline.run(Arc::new(scenario())).await.unwrap();

        assert_eq!(report.clusters.len(), 1);
        assert!(matches!(
            report.clusters[0].outcome,
            ClusterOutcome::Skipped { .. }
        ));
        assert_eq!(report.solution.num_unassigned(), 3);
        assert!(!report.validation.passed());
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let solver = Arc::new(FlakySolver {
            calls: AtomicUsize::new(0),
            failures: 2,
        });
        let pipeline = PricingPipeline::with_solver(PipelineConfig::default(), solver.clone()).unwrap();
        let report = pipeline.run(Arc::new(scenario())).await.unwrap();

        assert!(report.clusters[0].outcome.is_solved());
        assert_eq!(solver.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let solver = Arc::new(FlakySolver {
            calls: AtomicUsize::new(0),
            failures: usize::MAX,
        });
        let config = PipelineConfig {
            solver: SolverSettings {
                max_retries: 1,
                ..SolverSettings::default()
            },
            ..PipelineConfig::default()
        };
        let pipeline = PricingPipeline::with_solver(config, solver.clone()).unwrap();
        let report = pipeline.run(Arc::new(scenario())).await.unwrap();

        assert!(matches!(
            report.clusters[0].outcome,
            ClusterOutcome::Failed { attempts: 2, .. }
        ));
        assert_eq!(solver.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_dataset_is_fatal() {
        let pipeline = PricingPipeline::new(exhaustive_config()).unwrap();
        let err = pipeline
            .run(Arc::new(PricingData::new(vec![], vec![])))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::EmptyDataset)));
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        let config = PipelineConfig {
            solver: SolverSettings {
                concurrency: 0,
                ..SolverSettings::default()
            },
            ..PipelineConfig::default()
        };
        assert!(matches!(
            PricingPipeline::new(config),
            Err(Error::Config(ConfigError::InvalidValue { field: "solver.concurrency", .. }))
        ));
    }

    #[test]
    fn test_seed_offsets_per_cluster() {
        let settings = SolverSettings {
            seed: Some(10),
            ..SolverSettings::default()
        };
        assert_eq!(settings.solve_params(0).seed, Some(10));
        assert_eq!(settings.solve_params(3).seed, Some(13));
        assert_eq!(SolverSettings::default().solve_params(3).seed, None);
    }

    #[tokio::test]
    async fn test_timed_out_cluster_is_unassigned_and_others_solve() {
        let solver = Arc::new(StallingSolver::new(1));
        let pipeline = PricingPipeline::with_solver(timeout_config(0.05), solver.clone()).unwrap();
        let report = pipeline.run_clusters(two_clusters()).await.unwrap();

        assert!(matches!(
            report.clusters[0].outcome,
            ClusterOutcome::Failed {
                error: SolverError::Timeout(_),
                attempts: 1,
            }
        ));
        assert_eq!(report.solution.get(1), Some(&PriceSelection::Unassigned));
        assert_eq!(report.solution.get(2), Some(&PriceSelection::Unassigned));

        assert!(matches!(
            report.clusters[1].outcome,
            ClusterOutcome::Solved { attempts: 1, .. }
        ));
        assert_eq!(report.solution.get(3), Some(&PriceSelection::Selected(vec![1])));
        assert_eq!(report.num_failed(), 1);
    }

    #[tokio::test]
    async fn test_timed_out_solve_is_not_retried_or_left_running() {
        let solver = Arc::new(StallingSolver::new(3));
        let pipeline = PricingPipeline::with_solver(timeout_config(0.05), solver.clone()).unwrap();
        let report = pipeline.run_clusters(two_clusters()).await.unwrap();

        assert!(matches!(
            report.clusters[1].outcome,
            ClusterOutcome::Failed {
                error: SolverError::Timeout(_),
                ..
            }
        ));
        assert_eq!(solver.started.load(Ordering::SeqCst), 1);
        assert_eq!(solver.finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhaustive_backend_honors_cluster_timeout() {
        let options: Vec<PriceOption> = (1..=20)
            .map(|product| PriceOption::new(product, 1, 10.0))
            .collect();
        let edges: Vec<CrossElasticityEdge> = (1..20)
            .map(|product| CrossElasticityEdge::new(product, product + 1, 1, 5.0))
            .collect();
        let problem = ClusterProblem::new(0, "cluster_0", PricingData::new(options, edges));

        let pipeline = PricingPipeline::new(timeout_config(1e-6)).unwrap();
        let report = pipeline.run_clusters(vec![problem]).await.unwrap();

        assert!(matches!(
            report.clusters[0].outcome,
            ClusterOutcome::Failed {
                error: SolverError::Timeout(_),
                attempts: 1,
            }
        ));
        assert_eq!(report.solution.num_unassigned(), 20);
    }

    #[tokio::test]
    async fn test_retried_success_reports_attempts() {
        let solver = Arc::new(FlakySolver {
            calls: AtomicUsize::new(0),
            failures: 1,
        });
        let pipeline = PricingPipeline::with_solver(PipelineConfig::default(), solver).unwrap();
        let report = pipeline.run(Arc::new(scenario())).await.unwrap();

        assert!(matches!(
            report.clusters[0].outcome,
            ClusterOutcome::Solved { attempts: 2, .. }
        ));
    }

    #[test]
    fn test_unrepresentable_timeout_is_rejected() {
        for secs in [1e30, f64::INFINITY, f64::NAN, 0.0, -1.0] {
            let settings = SolverSettings {
                cluster_timeout_secs: Some(secs),
                ..SolverSettings::default()
            };
            assert!(
                matches!(
                    settings.validate(),
                    Err(ConfigError::InvalidValue {
                        field: "solver.cluster_timeout_secs",
                        ..
                    })
                ),
                "{secs}"
            );
        }

        let huge = SolverSettings {
            cluster_timeout_secs: Some(1e30),
            ..SolverSettings::default()
        };
        assert_eq!(huge.cluster_timeout(), None);
        assert_eq!(huge.solve_params(0).time_limit, None);
    }
}
