use super::PopulationStrategy;
use crate::config::GeneticParams;
use crate::error::{NcResult, NetcalError};
use crate::params::{ParameterDescriptor, ParameterSpace};
use crate::population::{sort_by_fitness, ParameterSet, CLEARED};

/// Generation-based genetic evolution with rank-biased selection, uniform
/// crossover, exponential mutation, tail reseeding and optional Petrowski
/// clearing (A. Petrowski, "A clearing procedure as a niching method for
/// genetic algorithms", ICEC'96).
#[derive(Debug)]
pub struct GeneticStrategy {
    params: GeneticParams,
    rng: fastrand::Rng,
}

impl GeneticStrategy {
    pub fn new(params: GeneticParams, seed: Option<u64>) -> NcResult<Self> {
        if params.reseed > params.population_size {
            return Err(NetcalError::Config(
                "you can not reseed more than the size of the population".into(),
            ));
        }
        if params.population_size < 2 {
            return Err(NetcalError::Config(
                "the population needs at least two members to breed".into(),
            ));
        }
        let rng = match seed {
            Some(s) => fastrand::Rng::with_seed(s),
            None => fastrand::Rng::new(),
        };
        Ok(Self { params, rng })
    }

    /// Rank-biased index into the ascending-sorted population. An exponent
    /// above 1 skews selection toward index 0, the current best.
    fn select(&mut self) -> usize {
        let n = self.params.population_size as f64;
        ((self.rng.f64().powf(self.params.cross_exponent as f64)) * n) as usize
    }

    /// Per-dimension uniform crossover: a fair coin per index.
    fn cross_genes(
        &mut self,
        first: &[ParameterDescriptor],
        second: &[ParameterDescriptor],
    ) -> Vec<ParameterDescriptor> {
        first
            .iter()
            .zip(second)
            .map(|(a, b)| if self.rng.bool() { a.clone() } else { b.clone() })
            .collect()
    }

    /// `floor(p)` mutations plus one more with probability `frac(p)`; each
    /// mutation pushes one random dimension by
    /// `rand^exponent * range * max_mutation_percent` with a random sign,
    /// then clamps.
    fn mutate(&mut self, set: &mut [ParameterDescriptor]) {
        let p = self.params.mutation_probability;
        let mut count = p as usize;
        if (p - p.floor()) as f64 > self.rng.f64() {
            count += 1;
        }
        for _ in 0..count {
            let index = (self.rng.f64() * set.len() as f64) as usize;
            let d = &mut set[index];
            let magnitude = (self.rng.f64().powf(self.params.mutation_exponent as f64) as f32)
                * (d.range() * self.params.max_mutation_percent);
            if self.rng.bool() {
                d.current += magnitude;
            } else {
                d.current -= magnitude;
            }
            d.clamp();
        }
    }

    fn distance(&self, first: &ParameterSet, second: &ParameterSet) -> f32 {
        let mut sum = 0.0f64;
        for (a, b) in first.parameters.iter().zip(&second.parameters) {
            let unit = if self.params.percent_distance {
                (a.current - b.current) / (a.stop - a.start)
            } else {
                a.current - b.current
            };
            sum += unit as f64 * unit as f64;
        }
        sum.sqrt() as f32
    }

    /// Walk the ascending-sorted population; once a niche holds `capacity`
    /// members, every further member within `distance` of the representative
    /// is pushed to the worst-possible fitness so breeding ignores it.
    fn clearing(&self, population: &mut [ParameterSet]) {
        let n = population.len();
        for i in 0..n {
            let mut win = 0usize;
            if population[i].fitness < CLEARED {
                win = 1;
            }
            for j in (i + 1)..n {
                if population[j].fitness < CLEARED
                    && self.distance(&population[i], &population[j]) <= self.params.niche_distance
                {
                    if win < self.params.niche_capacity {
                        win += 1;
                    } else {
                        population[j].fitness = CLEARED;
                    }
                }
            }
        }
    }
}

impl PopulationStrategy for GeneticStrategy {
    fn label(&self) -> &'static str {
        "genetic"
    }

    fn total_generations(&self) -> u32 {
        self.params.total_generations
    }

    fn initial_population(&mut self, space: &ParameterSpace) -> Vec<ParameterSet> {
        (0..self.params.population_size)
            .map(|_| ParameterSet::new(space.randomized(&mut self.rng)))
            .collect()
    }

    fn next_generation(
        &mut self,
        mut previous: Vec<ParameterSet>,
        space: &ParameterSpace,
    ) -> Vec<ParameterSet> {
        sort_by_fitness(&mut previous);
        if self.params.niching {
            self.clearing(&mut previous);
        }

        let size = self.params.population_size;
        let mut next = Vec::with_capacity(size);
        for _ in 0..size - self.params.reseed {
            let first = self.select();
            let mut second = self.select();
            // deterministic tie-break: shift to the neighbour instead of
            // redrawing, so two distinct parents are always used
            if second == first {
                second += 1;
            }
            if second >= size {
                second = 0;
            }
            let mut child =
                self.cross_genes(&previous[first].parameters, &previous[second].parameters);
            self.mutate(&mut child);
            next.push(ParameterSet::new(child));
        }
        for _ in 0..self.params.reseed {
            next.push(ParameterSet::new(space.randomized(&mut self.rng)));
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn space() -> ParameterSpace {
        ParameterSpace::new(vec![
            ParameterDescriptor {
                name: "wait".into(),
                slot: 0,
                start: 0.0,
                stop: 2.0,
                current: 1.0,
            },
            ParameterDescriptor {
                name: "walk".into(),
                slot: 1,
                start: -1.0,
                stop: 1.0,
                current: 0.0,
            },
        ])
        .unwrap()
    }

    fn params(size: usize, reseed: usize) -> GeneticParams {
        GeneticParams {
            population_size: size,
            reseed,
            ..GeneticParams::default()
        }
    }

    fn evaluated(strategy: &mut GeneticStrategy, space: &ParameterSpace) -> Vec<ParameterSet> {
        let mut population = strategy.initial_population(space);
        for (i, member) in population.iter_mut().enumerate() {
            member.fitness = i as f32;
            member.processed = true;
        }
        population
    }

    #[test]
    fn reseed_larger_than_population_is_rejected() {
        let err = GeneticStrategy::new(params(10, 11), Some(1)).unwrap_err();
        assert!(matches!(err, NetcalError::Config(_)));
    }

    #[test]
    fn next_generation_has_fresh_flags_and_full_size() {
        let space = space();
        let mut strategy = GeneticStrategy::new(params(20, 5), Some(7)).unwrap();
        let previous = evaluated(&mut strategy, &space);
        let next = strategy.next_generation(previous, &space);
        assert_eq!(next.len(), 20);
        for member in &next {
            assert!(member.fitness.is_infinite());
            assert!(!member.processed && !member.processing);
            assert!(member.assigned_to.is_none());
        }
    }

    #[test]
    fn selection_biases_toward_best_for_large_exponents() {
        let biased_mean = {
            let mut s = GeneticStrategy::new(
                GeneticParams {
                    cross_exponent: 2.2,
                    ..params(100, 0)
                },
                Some(11),
            )
            .unwrap();
            (0..20_000).map(|_| s.select()).sum::<usize>() as f64 / 20_000.0
        };
        let uniform_mean = {
            let mut s = GeneticStrategy::new(
                GeneticParams {
                    cross_exponent: 1.0,
                    ..params(100, 0)
                },
                Some(11),
            )
            .unwrap();
            (0..20_000).map(|_| s.select()).sum::<usize>() as f64 / 20_000.0
        };
        // uniform lands near 49.5; the bias should pull the mean well down
        assert!(biased_mean + 10.0 < uniform_mean);
    }

    #[test]
    fn clearing_caps_each_niche() {
        let space = space();
        let capacity = 3usize;
        let mut strategy = GeneticStrategy::new(
            GeneticParams {
                niching: true,
                niche_distance: 10.0,
                niche_capacity: capacity,
                ..params(12, 0)
            },
            Some(5),
        )
        .unwrap();
        // every member identical: one big niche
        let template = space.descriptors().to_vec();
        let mut population: Vec<ParameterSet> = (0..12)
            .map(|i| {
                let mut m = ParameterSet::new(template.clone());
                m.fitness = i as f32;
                m
            })
            .collect();
        strategy.clearing(&mut population);
        let survivors = population.iter().filter(|m| m.fitness < CLEARED).count();
        assert_eq!(survivors, capacity);
        // the best members survive, the tail is cleared
        assert!(population[0].fitness < CLEARED);
        assert_eq!(population[11].fitness, CLEARED);
    }

    proptest! {
        #[test]
        fn mutation_never_leaves_bounds(seed in any::<u64>()) {
            let space = space();
            let mut strategy = GeneticStrategy::new(
                GeneticParams { mutation_probability: 5.9, ..params(10, 2) },
                Some(seed),
            ).unwrap();
            let mut set = space.randomized(&mut fastrand::Rng::with_seed(seed));
            strategy.mutate(&mut set);
            for d in &set {
                prop_assert!(d.current >= d.start && d.current <= d.stop);
            }
        }

        #[test]
        fn bred_generations_never_leave_bounds(seed in any::<u64>()) {
            let space = space();
            let mut strategy = GeneticStrategy::new(params(16, 4), Some(seed)).unwrap();
            let mut population = evaluated(&mut strategy, &space);
            for _ in 0..3 {
                population = strategy.next_generation(population, &space);
                for member in &population {
                    for d in &member.parameters {
                        prop_assert!(d.current >= d.start && d.current <= d.stop);
                    }
                }
                for (i, member) in population.iter_mut().enumerate() {
                    member.fitness = (i % 7) as f32;
                    member.processed = true;
                }
            }
        }
    }
}
