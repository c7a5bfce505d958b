use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use priceopt::application::{plan_partition, PipelineReport, PricingPipeline};
use priceopt::infrastructure::{csv_store, AppConfig};
use priceopt::{PartitionStrategy, SolverMode};

/// Price selection for product catalogues with cross-elasticity effects
#[derive(Parser, Debug)]
#[command(name = "priceopt")]
#[command(version)]
struct Cli {
    /// TOML configuration file; built-in defaults when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Split a dataset into cluster files sized for the solver
    Partition(PartitionArgs),

    /// Solve every cluster file pair in a directory into one solution
    Solve(SolveArgs),

    /// Partition, solve and integrate a dataset in one run
    Optimize(OptimizeArgs),

    /// Print descriptive statistics of a dataset
    Summary(DatasetArgs),

    /// Start the gRPC server
    #[cfg(feature = "server")]
    Serve(ServeArgs),
}

#[derive(Args, Debug)]
struct DatasetArgs {
    /// `product;price;margin_of_sales` file
    #[arg(long)]
    prices: PathBuf,

    /// `product_A;affected_product_B;price_A;affected_margin_B` file
    #[arg(long)]
    elasticities: PathBuf,
}

#[derive(Args, Debug)]
struct SolverArgs {
    /// exhaustive, annealing or hybrid
    #[arg(long)]
    mode: Option<SolverMode>,

    #[arg(long)]
    num_reads: Option<usize>,

    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Args, Debug)]
struct PartitionArgs {
    #[command(flatten)]
    dataset: DatasetArgs,

    #[arg(long)]
    out_dir: PathBuf,

    /// File name prefix of the cluster files
    #[arg(long)]
    prefix: Option<String>,

    /// kernighan_lin or louvain_spectral
    #[arg(long)]
    strategy: Option<PartitionStrategy>,

    #[arg(long)]
    max_cluster_size: Option<usize>,
}

#[derive(Args, Debug)]
struct SolveArgs {
    /// Directory holding `*_elasticity_prices.csv` and `*_cross_elasticity_prices.csv` pairs
    #[arg(long)]
    clusters: PathBuf,

    #[arg(long)]
    output: PathBuf,

    #[command(flatten)]
    solver: SolverArgs,
}

#[derive(Args, Debug)]
struct OptimizeArgs {
    #[command(flatten)]
    dataset: DatasetArgs,

    #[arg(long)]
    output: PathBuf,

    #[arg(long)]
    strategy: Option<PartitionStrategy>,

    #[arg(long)]
    max_cluster_size: Option<usize>,

    #[command(flatten)]
    solver: SolverArgs,
}

#[cfg(feature = "server")]
#[derive(Args, Debug)]
struct ServeArgs {
    /// Listen address, overrides `server.address`
    #[arg(long)]
    address: Option<String>,
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(AppConfig::default()),
    }
}

fn apply_solver_args(config: &mut AppConfig, args: &SolverArgs) {
    if let Some(mode) = args.mode {
        config.solver.mode = mode;
    }
    if let Some(num_reads) = args.num_reads {
        config.solver.num_reads = num_reads;
    }
    if let Some(seed) = args.seed {
        config.solver.seed = Some(seed);
        config.partition.bisection_seed = Some(seed);
        config.partition.louvain_seed = Some(seed);
    }
}

fn apply_partition_args(
    config: &mut AppConfig,
    strategy: Option<PartitionStrategy>,
    max_cluster_size: Option<usize>,
) {
    if let Some(strategy) = strategy {
        config.partition.strategy = strategy;
    }
    if max_cluster_size.is_some() {
        config.partition.max_cluster_size = max_cluster_size;
    }
}

fn print_report(report: &PipelineReport, output: &Path) {
    println!("Clusters:");
    for cluster in &report.clusters {
        println!(
            "  {:<24} {:>4} products  {:?}  ({:.1} ms)",
            cluster.name,
            cluster.products,
            cluster.outcome,
            cluster.elapsed.as_secs_f64() * 1000.0
        );
    }
    println!();
    println!("Products:            {}", report.solution.len());
    println!("Unassigned:          {}", report.solution.num_unassigned());
    println!("Failed clusters:     {}", report.num_failed());
    println!("Total margin:        {:.4}", report.total_margin);
    println!("Dropped elasticity:  {:.4}", report.dropped_weight);

    let validation = &report.validation;
    if validation.passed() {
        println!("Validation:          passed");
    } else {
        println!("Validation:          FAILED");
        println!("  missing products:  {:?}", validation.products_listed.offending);
        println!("  not single price:  {:?}", validation.single_price.offending);
    }
    println!("Solution written to {}", output.display());
}

async fn run(cli: Cli, mut config: AppConfig) -> Result<()> {
    match cli.command {
        Command::Partition(args) => {
            apply_partition_args(&mut config, args.strategy, args.max_cluster_size);
            if let Some(prefix) = args.prefix {
                config.output.prefix = prefix;
            }
            config.validate()?;

            let data = csv_store::load_dataset(&args.dataset.prices, &args.dataset.elasticities)?;
            let plan = plan_partition(&config.partition, &data)?;
            let problems = plan.problems(&data);
            let files = csv_store::write_cluster_files(&args.out_dir, &config.output.prefix, &problems)?;

            println!("Products:                {}", plan.limits.num_products);
            println!("Max prices per product:  {}", plan.limits.max_prices_per_product);
            println!("Max cluster size:        {}", plan.max_cluster_size);
            println!("Dropped elasticity:      {:.4}", plan.dropped_weight);
            println!("Clusters:                {}", files.len());
            for (file, problem) in files.iter().zip(&problems) {
                println!("  {:<32} {:>4} products", file.name, problem.data.products().len());
            }
        }
        Command::Solve(args) => {
            apply_solver_args(&mut config, &args.solver);
            config.validate()?;

            let files = csv_store::discover_cluster_files(&args.clusters)?;
            if files.is_empty() {
                anyhow::bail!("no cluster files found in {}", args.clusters.display());
            }
            let problems = csv_store::load_cluster_problems(&files)?;

            let pipeline = PricingPipeline::new(config.pipeline_config())?;
            info!(clusters = problems.len(), solver = pipeline.solver_name(), "Solving cluster folder");
            let report = pipeline.run_clusters(problems).await?;

            csv_store::write_solution_file(&args.output, &report.solution)?;
            print_report(&report, &args.output);
        }
        Command::Optimize(args) => {
            apply_partition_args(&mut config, args.strategy, args.max_cluster_size);
            apply_solver_args(&mut config, &args.solver);
            config.validate()?;

            let data = csv_store::load_dataset(&args.dataset.prices, &args.dataset.elasticities)?;
            let pipeline = PricingPipeline::new(config.pipeline_config())?;
            let report = pipeline.run(Arc::new(data)).await?;

            csv_store::write_solution_file(&args.output, &report.solution)?;
            print_report(&report, &args.output);
        }
        Command::Summary(args) => {
            let data = csv_store::load_dataset(&args.prices, &args.elasticities)?;
            let summary = data.summary();

            println!("Products:                  {}", summary.num_products);
            println!("Max prices per product:    {}", summary.max_prices);
            println!("Min prices per product:    {}", summary.min_prices);
            println!("Avg prices per product:    {:.2}", summary.avg_prices);
            println!("Avg margin:                {:.4}", summary.avg_margin);
            println!("Cross elasticities:        {}", summary.num_elasticities);
            println!("Max elasticity (%):        {:.4}", summary.max_elasticity);
            println!("Min elasticity (%):        {:.4}", summary.min_elasticity);
            println!("Avg elasticity (%):        {:.4}", summary.avg_elasticity);
        }
        #[cfg(feature = "server")]
        Command::Serve(args) => {
            if let Some(address) = args.address {
                config.server.address = address;
            }
            config.validate()?;

            let server = priceopt::ServerConfig::new(
                config.server.socket_addr()?,
                config.pipeline_config(),
            );
            priceopt::start_server(server)
                .await
                .map_err(|e| anyhow::anyhow!("server error: {}", e))?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    config.logging.init();

    run(cli, config).await
}
