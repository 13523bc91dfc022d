use crate::config::RerunPolicy;
use crate::data::cache::{mean, FitnessCache};
use crate::engines::evaluation::Environment;
use rand::Rng;

/// Scores genomes through an [`Environment`], remembering every result.
pub struct FitnessEvaluator {
    cache: FitnessCache,
    rerun: RerunPolicy,
    failure_fitness: f64,
    verbose: bool,
}

impl FitnessEvaluator {
    pub fn new(cache: FitnessCache, rerun: RerunPolicy, failure_fitness: f64, verbose: bool) -> Self {
        Self {
            cache,
            rerun,
            failure_fitness,
            verbose,
        }
    }

    pub fn cache(&self) -> &FitnessCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut FitnessCache {
        &mut self.cache
    }

    /// Evaluations run so far, including those loaded from a snapshot
    pub fn n_episodes(&self) -> usize {
        self.cache.n_values()
    }

    /// Fitness of `genome` under the configured re-run policy
    pub fn evaluate<E, R>(&mut self, genome: &[String], environment: &mut E, rng: &mut R) -> f64
    where
        E: Environment + ?Sized,
        R: Rng + ?Sized,
    {
        self.evaluate_with(genome, self.rerun, environment, rng)
    }

    /// Fitness of `genome`, running the environment only if `rerun` asks for it
    /// or the genome has never been seen. The result is the mean of all samples.
    pub fn evaluate_with<E, R>(
        &mut self,
        genome: &[String],
        rerun: RerunPolicy,
        environment: &mut E,
        rng: &mut R,
    ) -> f64
    where
        E: Environment + ?Sized,
        R: Rng + ?Sized,
    {
        let run = match self.cache.find(genome) {
            None => true,
            Some(values) => match rerun {
                RerunPolicy::Never => false,
                RerunPolicy::Always => true,
                RerunPolicy::Probabilistic => rng.gen::<f64>() < rerun_probability(values.len()),
            },
        };

        if run {
            let fitness = match environment.run_and_compute(genome, self.verbose) {
                Ok(fitness) => fitness,
                Err(e) => {
                    log::warn!(
                        "Evaluation of {:?} failed, scoring it {}: {:#}",
                        genome,
                        self.failure_fitness,
                        e
                    );
                    self.failure_fitness
                }
            };
            self.cache.insert(genome, fitness);
        }

        let fitness = self.cache.find(genome).map(mean).unwrap_or(self.failure_fitness);
        log::trace!("Fitness {:.4} for {:?}", fitness, genome);
        fitness
    }
}

/// Chance of sampling a genome again after `n_runs` samples
pub fn rerun_probability(n_runs: usize) -> f64 {
    if n_runs == 0 {
        return 1.0;
    }
    1.0 / (n_runs * n_runs) as f64
}
