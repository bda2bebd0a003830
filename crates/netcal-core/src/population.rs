use crate::params::ParameterDescriptor;
use netcal_protocol::WorkerId;
use std::cmp::Ordering;

/// Fitness of a member that has not been evaluated yet. Anything is better.
pub const UNEVALUATED: f32 = f32::INFINITY;

/// Fitness assigned by niche clearing to suppressed near-duplicates: finite,
/// but worse than any real evaluation can produce.
pub const CLEARED: f32 = f32::MAX;

/// One candidate solution. A member transitions
/// unevaluated -> assigned -> processed exactly once per generation;
/// `fitness` is only meaningful once `processed` is set.
#[derive(Debug, Clone)]
pub struct ParameterSet {
    pub parameters: Vec<ParameterDescriptor>,
    pub fitness: f32,
    pub processed: bool,
    pub processing: bool,
    pub assigned_to: Option<WorkerId>,
}

impl ParameterSet {
    pub fn new(parameters: Vec<ParameterDescriptor>) -> Self {
        Self {
            parameters,
            fitness: UNEVALUATED,
            processed: false,
            processing: false,
            assigned_to: None,
        }
    }

    pub fn values(&self) -> Vec<f32> {
        self.parameters.iter().map(|p| p.current).collect()
    }
}

/// Total-order comparator for fitness values, ascending (best first, since
/// lower is better). NaN sorts last so a poisoned member can never displace
/// a real one.
pub fn compare_fitness(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

/// Sort a population ascending by fitness.
pub fn sort_by_fitness(population: &mut [ParameterSet]) {
    population.sort_by(|x, y| compare_fitness(x.fitness, y.fitness));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(fitness: f32) -> ParameterSet {
        let mut m = ParameterSet::new(Vec::new());
        m.fitness = fitness;
        m
    }

    #[test]
    fn sorts_best_first_with_nan_last() {
        let mut pop = vec![
            member(5.0),
            member(f32::NAN),
            member(UNEVALUATED),
            member(1.0),
            member(CLEARED),
        ];
        sort_by_fitness(&mut pop);
        assert_eq!(pop[0].fitness, 1.0);
        assert_eq!(pop[1].fitness, 5.0);
        assert_eq!(pop[2].fitness, CLEARED);
        assert_eq!(pop[3].fitness, UNEVALUATED);
        assert!(pop[4].fitness.is_nan());
    }
}
