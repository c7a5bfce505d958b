// Example client for the price optimizer gRPC service
//
// Three products with candidate prices:
// - product 1 at price 1 yields 100, at price 2 yields 150
// - product 2 at price 1 yields 200
// - product 3 at price 1 yields 50
// Selling product 1 at price 2 raises the margin of product 2 by 10%.
//
// The best assignment picks price 2 for product 1 and has total margin 420.

use tonic::Request;

pub mod price_optimizer {
    tonic::include_proto!("price_optimizer");
}

use price_optimizer::{
    price_optimizer_client::PriceOptimizerClient, ClusterStatus, CrossElasticity, Dataset, Empty,
    OptimizeOptions, OptimizeRequest, PriceOption, SolverMode,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut client = PriceOptimizerClient::connect("http://127.0.0.1:50051").await?;

    println!("=== Price Selection ===\n");

    let solvers = client
        .get_available_solvers(Request::new(Empty {}))
        .await?
        .into_inner()
        .solvers;
    println!("Available solvers:");
    for solver in &solvers {
        let state = if solver.available { "" } else { " (not built)" };
        println!("  • {}{}", solver.name, state);
    }
    println!();

    let option = |product, price, margin| PriceOption {
        product,
        price,
        margin,
    };
    let dataset = Dataset {
        price_options: vec![
            option(1, 1, 100.0),
            option(1, 2, 150.0),
            option(2, 1, 200.0),
            option(3, 1, 50.0),
        ],
        elasticities: vec![CrossElasticity {
            product_a: 1,
            product_b: 2,
            price_a: 2,
            affected_margin_pct: 10.0,
        }],
    };

    let request = Request::new(OptimizeRequest {
        dataset: Some(dataset),
        options: Some(OptimizeOptions {
            mode: Some(SolverMode::Exhaustive as i32),
            ..Default::default()
        }),
    });
    let result = client.optimize_prices(request).await?.into_inner();

    println!("Solver: {}\n", result.solver_backend);
    for cluster in &result.clusters {
        let status = ClusterStatus::try_from(cluster.status)
            .map(|s| s.as_str_name())
            .unwrap_or("UNKNOWN");
        println!(
            "  {} ({} products): {} energy={:.2}",
            cluster.name, cluster.products, status, cluster.energy
        );
    }

    println!("\nSelected prices:");
    for selection in &result.selections {
        if selection.prices.is_empty() {
            println!("  product {}: unassigned", selection.product);
        } else {
            println!("  product {}: {:?}", selection.product, selection.prices);
        }
    }

    let passed = result.validation.map(|v| v.passed).unwrap_or(false);
    println!("\nTotal margin: {:.2}", result.total_margin);
    println!("Validation:   {}", if passed { "passed" } else { "failed" });

    Ok(())
}
