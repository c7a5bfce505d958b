// Exhaustive solver
// Enumerates every assignment in Gray-code order, one bit flip per step

use crate::domain::{
    models::{Sample, SampleSet, SolveParams},
    solver_service::{Result, SolverError, SolverService},
    value_objects::SolverMode,
};
use crate::qubo::QuadraticModel;
use std::time::Instant;
use tracing::debug;

/// Largest model enumerated, 2^24 assignments
pub const MAX_EXHAUSTIVE_VARIABLES: usize = 24;

/// Steps between two deadline checks
const DEADLINE_CHECK_MASK: u64 = 0xFFF;

pub struct ExhaustiveSolver;

impl ExhaustiveSolver {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ExhaustiveSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl SolverService for ExhaustiveSolver {
    fn sample(&self, model: &QuadraticModel, params: &SolveParams) -> Result<SampleSet> {
        self.validate(model)?;

        let compiled = model.compile();
        let n = compiled.num_variables();
        if n == 0 {
            return Ok(SampleSet::new(vec![Sample::empty()]));
        }
        if n > MAX_EXHAUSTIVE_VARIABLES {
            return Err(SolverError::InvalidProblem(format!(
                "Exhaustive search supports at most {} variables, model has {}",
                MAX_EXHAUSTIVE_VARIABLES, n
            )));
        }

        let start = Instant::now();
        let mut state = vec![0u8; n];
        let mut energy = 0.0;
        let mut best_state = state.clone();
        let mut best_energy = energy;

        for step in 1u64..(1u64 << n) {
            if step & DEADLINE_CHECK_MASK == 0 {
                if let Some(limit) = params.time_limit {
                    if start.elapsed() >= limit {
                        return Err(SolverError::Timeout(limit.as_secs_f64()));
                    }
                }
            }
            let bit = step.trailing_zeros() as usize;
            energy += compiled.flip_delta(&state, bit);
            state[bit] ^= 1;
            if energy < best_energy {
                best_energy = energy;
                best_state.copy_from_slice(&state);
            }
        }

        debug!(
            variables = n,
            elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Enumerated all assignments"
        );

        // recompute to shed accumulated rounding
        let exact = compiled.energy(&best_state);
        Ok(SampleSet::new(vec![compiled.to_sample(&best_state, exact)]))
    }

    fn name(&self) -> &str {
        "exhaustive"
    }

    fn supports(&self, mode: SolverMode) -> bool {
        mode == SolverMode::Exhaustive
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::VariableId;

    fn v(product: u32, price: u32) -> VariableId {
        VariableId::new(product, price)
    }

    #[test]
    fn test_finds_ground_state() {
        let mut model = QuadraticModel::new();
        model.add_linear(v(1, 1), -3.0);
        model.add_linear(v(1, 2), -5.0);
        model.add_interaction(v(1, 1), v(1, 2), 10.0);
        model.add_linear(v(2, 1), 1.0);

        let samples = ExhaustiveSolver::new()
            .sample(&model, &SolveParams::new(SolverMode::Exhaustive))
            .unwrap();
        let best = samples.first().unwrap();

        assert_eq!(best.energy, -5.0);
        assert_eq!(best.selected().collect::<Vec<_>>(), vec![v(1, 2)]);
    }

    #[test]
    fn test_empty_model_gives_empty_sample() {
        let samples = ExhaustiveSolver::new()
            .sample(&QuadraticModel::new(), &SolveParams::default())
            .unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples.first().unwrap(), &Sample::empty());
    }

    #[test]
    fn test_rejects_large_models() {
        let mut model = QuadraticModel::new();
        for product in 0..25 {
            model.add_linear(v(product, 1), -1.0);
        }
        let err = ExhaustiveSolver::new()
            .sample(&model, &SolveParams::default())
            .unwrap_err();
        assert!(matches!(err, SolverError::InvalidProblem(_)));
    }

    #[test]
    fn test_rejects_non_finite_coefficients() {
        let mut model = QuadraticModel::new();
        model.add_linear(v(1, 1), f64::NAN);
        assert!(ExhaustiveSolver::new()
            .sample(&model, &SolveParams::default())
            .is_err());
    }

    #[test]
    fn test_time_limit_stops_enumeration() {
        let mut model = QuadraticModel::new();
        for product in 0..20 {
            model.add_linear(v(product, 1), -1.0);
            model.add_interaction(v(product, 1), v(product + 1, 1), 0.5);
        }
        let params = SolveParams {
            time_limit: Some(std::time::Duration::ZERO),
            ..SolveParams::new(SolverMode::Exhaustive)
        };
        let err = ExhaustiveSolver::new().sample(&model, &params).unwrap_err();
        assert!(matches!(err, SolverError::Timeout(_)));
    }
}
