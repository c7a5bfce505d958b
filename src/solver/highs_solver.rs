// HiGHS Solver Adapter
// Implements the SolverService interface for HiGHS
// Solves the quadratic binary model exactly as a linearized MIP

use crate::domain::{
    models::{Sample, SampleSet, SolveParams},
    solver_service::{Result, SolverError, SolverService},
    value_objects::SolverMode,
};
use crate::qubo::QuadraticModel;
use std::time::Instant;
use tracing::debug;

pub struct HighsSolver;

impl HighsSolver {
    pub fn new() -> Self {
        Self
    }
}

impl Default for HighsSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl SolverService for HighsSolver {
    fn sample(&self, model: &QuadraticModel, params: &SolveParams) -> Result<SampleSet> {
        // Validate first
        self.validate(model)?;

        let compiled = model.compile();
        if compiled.num_variables() == 0 {
            return Ok(SampleSet::new(vec![Sample::empty()]));
        }

        let start_time = Instant::now();

        use highs::{HighsModelStatus, RowProblem, Sense};

        let mut pb = RowProblem::default();

        // One binary column per model variable
        let x: Vec<_> = compiled
            .linear
            .iter()
            .map(|&c| pb.add_integer_column(c, 0..=1))
            .collect();

        // Each product x_i * x_j becomes y in [0, 1]:
        // positive coefficients push y down, so y >= x_i + x_j - 1 suffices;
        // negative ones push y up, so y <= x_i and y <= x_j suffice
        for &(i, j, q) in &compiled.interactions {
            let y = pb.add_column(q, 0.0..=1.0);
            if q > 0.0 {
                pb.add_row(-1.0.., &[(y, 1.0), (x[i], -1.0), (x[j], -1.0)]);
            } else if q < 0.0 {
                pb.add_row(..=0.0, &[(y, 1.0), (x[i], -1.0)]);
                pb.add_row(..=0.0, &[(y, 1.0), (x[j], -1.0)]);
            }
        }

        let mut highs_model = pb.optimise(Sense::Minimise);
        highs_model.set_option("output_flag", false);
        if let Some(limit) = params.time_limit {
            highs_model.set_option("time_limit", limit.as_secs_f64());
        }

        let solved = highs_model.solve();
        let solve_time = start_time.elapsed().as_secs_f64() * 1000.0;

        match solved.status() {
            HighsModelStatus::Optimal => {
                let solution = solved.get_solution();
                let state: Vec<u8> = solution
                    .columns()
                    .iter()
                    .take(compiled.num_variables())
                    .map(|&value| u8::from(value > 0.5))
                    .collect();
                let energy = compiled.energy(&state);

                debug!(
                    variables = compiled.num_variables(),
                    interactions = compiled.interactions.len(),
                    solve_time_ms = solve_time,
                    energy,
                    "HiGHS found optimal assignment"
                );

                Ok(SampleSet::new(vec![compiled.to_sample(&state, energy)]))
            }
            HighsModelStatus::ReachedTimeLimit => Err(SolverError::Timeout(
                params.time_limit.map_or(solve_time / 1000.0, |l| l.as_secs_f64()),
            )),
            status => Err(SolverError::ExecutionFailed(format!(
                "HiGHS solver returned status: {:?}",
                status
            ))),
        }
    }

    fn name(&self) -> &str {
        "HiGHS"
    }

    fn supports(&self, mode: SolverMode) -> bool {
        mode == SolverMode::Hybrid
    }
}
