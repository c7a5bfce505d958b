// Example: Streaming a large catalogue to the price optimizer
//
// 400 products with 4 candidate prices each, grouped into product families of 10.
// Within a family, a cheaper price on one product lowers the margin of its
// neighbours; a premium price raises it.
//
// Variables: 1600 binary, far beyond a single solver call, so the server
// partitions the catalogue into clusters before solving.
//
// Records are sent in batches so no single message carries the whole dataset.

use futures::stream;
use tonic::Request;

pub mod price_optimizer {
    tonic::include_proto!("price_optimizer");
}

use price_optimizer::{
    dataset_chunk::Chunk, price_optimizer_client::PriceOptimizerClient, ClusterStatus,
    CrossElasticity, CrossElasticityBatch, DatasetChunk, OptimizeOptions, PartitionStrategy,
    PriceOption, PriceOptionBatch, SolverMode,
};

const NUM_PRODUCTS: u32 = 400;
const PRICES_PER_PRODUCT: u32 = 4;
const FAMILY_SIZE: u32 = 10;
const BATCH_SIZE: usize = 250;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut client = PriceOptimizerClient::connect("http://127.0.0.1:50051").await?;

    let price_options = catalogue();
    let elasticities = family_effects();

    println!("=== Catalogue Price Selection (gRPC Streaming) ===\n");
    println!("  • {} products", NUM_PRODUCTS);
    println!("  • {} price options", price_options.len());
    println!("  • {} cross elasticities\n", elasticities.len());

    let mut chunks = vec![DatasetChunk {
        chunk: Some(Chunk::Options(OptimizeOptions {
            strategy: Some(PartitionStrategy::LouvainSpectral as i32),
            mode: Some(SolverMode::Annealing as i32),
            num_reads: Some(20),
            seed: Some(7),
            ..Default::default()
        })),
    }];
    for batch in price_options.chunks(BATCH_SIZE) {
        chunks.push(DatasetChunk {
            chunk: Some(Chunk::PriceOptions(PriceOptionBatch {
                records: batch.to_vec(),
            })),
        });
    }
    for batch in elasticities.chunks(BATCH_SIZE) {
        chunks.push(DatasetChunk {
            chunk: Some(Chunk::Elasticities(CrossElasticityBatch {
                records: batch.to_vec(),
            })),
        });
    }

    println!("Sending {} chunks...\n", chunks.len());
    let result = client
        .optimize_prices_stream(Request::new(stream::iter(chunks)))
        .await?
        .into_inner();

    let solved = result
        .clusters
        .iter()
        .filter(|c| c.status == ClusterStatus::Solved as i32)
        .count();
    let unassigned = result
        .selections
        .iter()
        .filter(|s| s.prices.is_empty())
        .count();

    println!("=== Solution ===\n");
    println!("Solver:              {}", result.solver_backend);
    println!("Clusters solved:     {}/{}", solved, result.clusters.len());
    println!("Unassigned products: {}", unassigned);
    println!("Dropped elasticity:  {:.2}", result.dropped_weight);
    println!("Total margin:        {:.2}", result.total_margin);
    if let Some(validation) = result.validation {
        println!(
            "Validation:          {}",
            if validation.passed { "passed" } else { "failed" }
        );
    }

    Ok(())
}

/// Margins fall with the price level and vary per product
fn catalogue() -> Vec<PriceOption> {
    (1..=NUM_PRODUCTS)
        .flat_map(|product| {
            (1..=PRICES_PER_PRODUCT).map(move |price| PriceOption {
                product,
                price,
                margin: 50.0 + (product % 17) as f64 * 3.0 + price as f64 * 12.5,
            })
        })
        .collect()
}

/// Cheapest price pulls neighbours down, most expensive lifts them
fn family_effects() -> Vec<CrossElasticity> {
    let mut effects = Vec::new();
    for product in 1..=NUM_PRODUCTS {
        let family_start = (product - 1) / FAMILY_SIZE * FAMILY_SIZE + 1;
        for neighbour in family_start..family_start + FAMILY_SIZE {
            if neighbour == product || (neighbour + product) % 3 != 0 {
                continue;
            }
            effects.push(CrossElasticity {
                product_a: product,
                product_b: neighbour,
                price_a: 1,
                affected_margin_pct: -4.0,
            });
            effects.push(CrossElasticity {
                product_a: product,
                product_b: neighbour,
                price_a: PRICES_PER_PRODUCT,
                affected_margin_pct: 2.5,
            });
        }
    }
    effects
}
