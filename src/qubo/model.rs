// Quadratic model
// Coefficients keyed by unordered variable pairs; a variable paired with
// itself holds its linear term. Energy is minimized.

use std::collections::{BTreeMap, BTreeSet};

use crate::domain::{Sample, VariableId};

/// Unordered pair of variables, stored with the smaller id first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VariablePair(VariableId, VariableId);

impl VariablePair {
    pub fn new(a: VariableId, b: VariableId) -> Self {
        if a <= b {
            Self(a, b)
        } else {
            Self(b, a)
        }
    }

    pub fn first(&self) -> VariableId {
        self.0
    }

    pub fn second(&self) -> VariableId {
        self.1
    }

    pub fn is_diagonal(&self) -> bool {
        self.0 == self.1
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuadraticModel {
    terms: BTreeMap<VariablePair, f64>,
}

impl QuadraticModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_linear(&mut self, var: VariableId, coefficient: f64) {
        self.add_interaction(var, var, coefficient);
    }

    /// Accumulate a coefficient on the pair `{a, b}`; `a == b` is a linear term
    pub fn add_interaction(&mut self, a: VariableId, b: VariableId, coefficient: f64) {
        *self.terms.entry(VariablePair::new(a, b)).or_insert(0.0) += coefficient;
    }

    /// Coefficient of `{a, b}`, zero when absent
    pub fn coefficient(&self, a: VariableId, b: VariableId) -> f64 {
        self.terms
            .get(&VariablePair::new(a, b))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn linear(&self, var: VariableId) -> f64 {
        self.coefficient(var, var)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&VariablePair, f64)> {
        self.terms.iter().map(|(pair, c)| (pair, *c))
    }

    pub fn variables(&self) -> BTreeSet<VariableId> {
        self.terms
            .keys()
            .flat_map(|pair| [pair.first(), pair.second()])
            .collect()
    }

    pub fn num_variables(&self) -> usize {
        self.variables().len()
    }

    /// Number of distinct off-diagonal terms
    pub fn num_interactions(&self) -> usize {
        self.terms.keys().filter(|pair| !pair.is_diagonal()).count()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Energy of an assignment; variables missing from `values` count as 0
    pub fn energy(&self, values: &BTreeMap<VariableId, u8>) -> f64 {
        let on = |var: &VariableId| values.get(var).copied().unwrap_or(0) == 1;
        self.terms
            .iter()
            .filter(|(pair, _)| on(&pair.first()) && on(&pair.second()))
            .map(|(_, c)| *c)
            .sum()
    }

    /// Index-based view used by the backends
    pub fn compile(&self) -> CompiledModel {
        let variables: Vec<VariableId> = self.variables().into_iter().collect();
        let index: BTreeMap<VariableId, usize> = variables
            .iter()
            .enumerate()
            .map(|(i, var)| (*var, i))
            .collect();

        let mut linear = vec![0.0; variables.len()];
        let mut neighbors = vec![Vec::new(); variables.len()];
        let mut interactions = Vec::new();

        for (pair, &coefficient) in &self.terms {
            let i = index[&pair.first()];
            let j = index[&pair.second()];
            if i == j {
                linear[i] += coefficient;
            } else {
                neighbors[i].push((j, coefficient));
                neighbors[j].push((i, coefficient));
                interactions.push((i, j, coefficient));
            }
        }

        CompiledModel {
            variables,
            linear,
            neighbors,
            interactions,
        }
    }
}

/// Dense-indexed copy of a [`QuadraticModel`]
#[derive(Debug, Clone)]
pub struct CompiledModel {
    pub variables: Vec<VariableId>,
    pub linear: Vec<f64>,
    pub neighbors: Vec<Vec<(usize, f64)>>,
    pub interactions: Vec<(usize, usize, f64)>,
}

impl CompiledModel {
    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn energy(&self, state: &[u8]) -> f64 {
        let linear: f64 = self
            .linear
            .iter()
            .zip(state)
            .filter(|(_, &x)| x == 1)
            .map(|(c, _)| *c)
            .sum();
        let quadratic: f64 = self
            .interactions
            .iter()
            .filter(|(i, j, _)| state[*i] == 1 && state[*j] == 1)
            .map(|(_, _, c)| *c)
            .sum();
        linear + quadratic
    }

    /// Energy change of flipping variable `i`
    pub fn flip_delta(&self, state: &[u8], i: usize) -> f64 {
        let field: f64 = self.linear[i]
            + self.neighbors[i]
                .iter()
                .filter(|(j, _)| state[*j] == 1)
                .map(|(_, c)| *c)
                .sum::<f64>();
        if state[i] == 1 {
            -field
        } else {
            field
        }
    }

    pub fn to_sample(&self, state: &[u8], energy: f64) -> Sample {
        let values = self
            .variables
            .iter()
            .zip(state)
            .map(|(var, &x)| (*var, x))
            .collect();
        Sample::new(values, energy)
    }
}
