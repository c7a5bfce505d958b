// Simulated annealing solver
// Single-bit Metropolis flips under a geometric inverse-temperature schedule

use crate::domain::{
    models::{Sample, SampleSet, SolveParams},
    solver_service::{Result, SolverError, SolverService},
    value_objects::SolverMode,
};
use crate::qubo::{CompiledModel, QuadraticModel};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub const DEFAULT_NUM_READS: usize = 10;
pub const DEFAULT_SWEEPS: usize = 1000;

pub struct AnnealingSolver;

impl AnnealingSolver {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AnnealingSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl SolverService for AnnealingSolver {
    fn sample(&self, model: &QuadraticModel, params: &SolveParams) -> Result<SampleSet> {
        self.validate(model)?;

        let compiled = model.compile();
        if compiled.num_variables() == 0 {
            return Ok(SampleSet::new(vec![Sample::empty()]));
        }

        let num_reads = params.num_reads.unwrap_or(DEFAULT_NUM_READS).max(1);
        let sweeps = params.sweeps.unwrap_or(DEFAULT_SWEEPS).max(1);
        let schedule = beta_schedule(&compiled, sweeps);
        let mut rng = match params.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let start = Instant::now();
        let deadline = params.time_limit.map(|limit| Deadline { start, limit });
        let mut samples = Vec::with_capacity(num_reads);
        for read in 0..num_reads {
            let Some((state, energy)) = anneal(&compiled, &schedule, &mut rng, deadline.as_ref())
            else {
                match (samples.is_empty(), params.time_limit) {
                    (true, Some(limit)) => return Err(SolverError::Timeout(limit.as_secs_f64())),
                    _ => {
                        warn!(
                            completed = read,
                            requested = num_reads,
                            "Annealing time limit reached mid-read, returning completed reads"
                        );
                        break;
                    }
                }
            };
            samples.push(compiled.to_sample(&state, energy));

            if let Some(limit) = params.time_limit {
                if start.elapsed() >= limit && read + 1 < num_reads {
                    warn!(
                        completed = read + 1,
                        requested = num_reads,
                        "Annealing time limit reached, returning partial reads"
                    );
                    break;
                }
            }
        }

        debug!(
            variables = compiled.num_variables(),
            reads = samples.len(),
            sweeps,
            elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Annealing finished"
        );

        Ok(SampleSet::new(samples))
    }

    fn name(&self) -> &str {
        "annealing"
    }

    fn supports(&self, mode: SolverMode) -> bool {
        mode == SolverMode::Annealing
    }
}

/// Geometric inverse temperatures from hot to cold
///
/// The hot end accepts the largest uphill flip with probability 1/2, the cold
/// end accepts the smallest with probability 1/100.
fn beta_schedule(model: &CompiledModel, sweeps: usize) -> Vec<f64> {
    let mut max_field: f64 = 0.0;
    let mut min_coefficient = f64::INFINITY;

    for i in 0..model.num_variables() {
        let field = model.linear[i].abs()
            + model.neighbors[i].iter().map(|(_, c)| c.abs()).sum::<f64>();
        max_field = max_field.max(field);
    }
    for c in model
        .linear
        .iter()
        .chain(model.interactions.iter().map(|(_, _, c)| c))
    {
        if c.abs() > 0.0 {
            min_coefficient = min_coefficient.min(c.abs());
        }
    }

    if max_field == 0.0 || !min_coefficient.is_finite() {
        return vec![1.0; sweeps];
    }

    let hot = 2f64.ln() / max_field;
    let cold = (100f64.ln() / min_coefficient).max(hot);
    if sweeps == 1 {
        return vec![cold];
    }
    let ratio = (cold / hot).powf(1.0 / (sweeps - 1) as f64);
    (0..sweeps).map(|k| hot * ratio.powi(k as i32)).collect()
}

struct Deadline {
    start: Instant,
    limit: Duration,
}

impl Deadline {
    fn passed(&self) -> bool {
        self.start.elapsed() >= self.limit
    }
}

/// One read; `None` when the deadline passes before the schedule completes
fn anneal(
    model: &CompiledModel,
    schedule: &[f64],
    rng: &mut StdRng,
    deadline: Option<&Deadline>,
) -> Option<(Vec<u8>, f64)> {
    let n = model.num_variables();
    let mut state: Vec<u8> = (0..n).map(|_| u8::from(rng.gen::<bool>())).collect();
    let mut energy = model.energy(&state);

    for &beta in schedule {
        if deadline.is_some_and(Deadline::passed) {
            return None;
        }
        for i in 0..n {
            let delta = model.flip_delta(&state, i);
            if delta <= 0.0 || rng.gen::<f64>() < (-beta * delta).exp() {
                state[i] ^= 1;
                energy += delta;
            }
        }
    }

    let exact = model.energy(&state);
    debug_assert!((exact - energy).abs() <= 1e-6 * (1.0 + exact.abs()));
    Some((state, exact))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CrossElasticityEdge, PriceOption, PricingData, VariableId};
    use crate::qubo::ModelBuilder;
    use crate::solver::ExhaustiveSolver;

    fn v(product: u32, price: u32) -> VariableId {
        VariableId::new(product, price)
    }

    fn params() -> SolveParams {
        SolveParams::new(SolverMode::Annealing)
            .with_num_reads(8)
            .with_seed(17)
    }

    #[test]
    fn test_schedule_is_increasing() {
        let mut model = QuadraticModel::new();
        model.add_linear(v(1, 1), -2.0);
        model.add_interaction(v(1, 1), v(2, 1), 8.0);
        let schedule = beta_schedule(&model.compile(), 50);
        assert_eq!(schedule.len(), 50);
        assert!(schedule.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_reads_and_ordering() {
        let mut model = QuadraticModel::new();
        model.add_linear(v(1, 1), -1.0);
        model.add_linear(v(2, 1), 2.0);
        let samples = AnnealingSolver::new().sample(&model, &params()).unwrap();

        assert_eq!(samples.len(), 8);
        let energies: Vec<f64> = samples.iter().map(|s| s.energy).collect();
        assert!(energies.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(samples.first().unwrap().energy, -1.0);
    }

    #[test]
    fn test_matches_exhaustive_on_small_pricing_model() {
        let data = PricingData::new(
            vec![
                PriceOption::new(1, 1, 100.0),
                PriceOption::new(1, 2, 150.0),
                PriceOption::new(2, 1, 200.0),
                PriceOption::new(2, 2, 180.0),
                PriceOption::new(3, 1, 50.0),
            ],
            vec![CrossElasticityEdge::new(1, 2, 2, 10.0)],
        );
        let model = ModelBuilder::default().build(&data);

        let exact = ExhaustiveSolver::new()
            .sample(&model, &SolveParams::default())
            .unwrap();
        let annealed = AnnealingSolver::new().sample(&model, &params()).unwrap();

        assert_eq!(
            annealed.first().unwrap().energy,
            exact.first().unwrap().energy
        );
    }

    #[test]
    fn test_seed_makes_runs_reproducible() {
        let mut model = QuadraticModel::new();
        model.add_linear(v(1, 1), -1.0);
        model.add_linear(v(1, 2), -1.0);
        model.add_interaction(v(1, 1), v(1, 2), 3.0);
        let first = AnnealingSolver::new().sample(&model, &params()).unwrap();
        let second = AnnealingSolver::new().sample(&model, &params()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_expired_deadline_before_first_read_times_out() {
        let mut model = QuadraticModel::new();
        model.add_linear(v(1, 1), -1.0);
        model.add_interaction(v(1, 1), v(2, 1), 2.0);
        let params = SolveParams {
            time_limit: Some(Duration::ZERO),
            ..params()
        };
        let err = AnnealingSolver::new().sample(&model, &params).unwrap_err();
        assert!(matches!(err, SolverError::Timeout(_)));
    }
}
