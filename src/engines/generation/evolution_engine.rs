use crate::config::{ConfigSection, GeneticParameters, RerunPolicy};
use crate::data::{Checkpoint, FitnessCache, RunLog};
use crate::engines::evaluation::{Environment, FitnessEvaluator};
use crate::engines::generation::{
    genome::Genome,
    operators::{GeneticOperators, MAX_ATTEMPTS},
    selection::{elite_selection, select},
};
use crate::error::{GpError, Result};
use crate::types::Search;
use chrono::Utc;
use rand::Rng;
use rand::SeedableRng;
use rand_pcg::Pcg64;
use std::path::Path;

/// How [`EvolutionEngine::run`] obtains its first population
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartMode {
    /// Random population, previous logs of the same run name are cleared
    Fresh,
    /// Continue from the last checkpoint of the run
    HotStart,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub population: Vec<Genome>,
    pub fitness: Vec<f64>,
    /// Best fitness after each generation, generation 0 included
    pub best_fitness: Vec<f64>,
    /// Cumulative number of evaluations after each generation
    pub n_episodes: Vec<usize>,
    pub best_individual: Genome,
}

pub trait ProgressCallback: Send {
    fn on_generation_start(&mut self, generation: usize);
    fn on_generation_complete(&mut self, generation: usize, best_fitness: f64, n_episodes: usize);
    fn on_individual_evaluated(&mut self, _current: usize, _total: usize) {}
    fn on_checkpoint(&mut self, _generation: usize) {}
}

pub struct EvolutionEngine<O: GeneticOperators> {
    params: GeneticParameters,
    operators: O,
    evaluator: FitnessEvaluator,
    run_log: RunLog,
    rng: Pcg64,
}

struct RunState {
    population: Vec<Genome>,
    best_fitness: Vec<f64>,
    n_episodes: Vec<usize>,
    last_generation: usize,
    baseline: Option<Genome>,
}

impl<O: GeneticOperators> EvolutionEngine<O> {
    pub fn new<P: AsRef<Path>>(params: GeneticParameters, operators: O, log_root: P) -> Result<Self> {
        params.validate()?;

        let rng = match params.seed {
            Some(seed) => Pcg64::seed_from_u64(seed),
            None => Pcg64::from_entropy(),
        };
        let evaluator = FitnessEvaluator::new(
            FitnessCache::new(params.hash_table_size),
            params.rerun_fitness,
            params.failure_fitness,
            params.verbose,
        );
        let run_log = RunLog::new(log_root, &params.log_name);

        Ok(Self {
            params,
            operators,
            evaluator,
            run_log,
            rng,
        })
    }

    pub fn parameters(&self) -> &GeneticParameters {
        &self.params
    }

    pub fn run_log(&self) -> &RunLog {
        &self.run_log
    }

    pub fn evaluator(&self) -> &FitnessEvaluator {
        &self.evaluator
    }

    /// Run the evolution process
    pub fn run<E, C>(
        &mut self,
        environment: &mut E,
        baseline: Option<Genome>,
        mode: StartMode,
        mut callback: C,
    ) -> Result<RunOutcome>
    where
        E: Environment + ?Sized,
        C: ProgressCallback,
    {
        *self.evaluator.cache_mut() = FitnessCache::new(self.params.hash_table_size);

        let RunState {
            mut population,
            mut best_fitness,
            mut n_episodes,
            last_generation,
            baseline,
        } = match mode {
            StartMode::Fresh => self.start_fresh(baseline)?,
            StartMode::HotStart => self.load_state(baseline)?,
        };
        if population.is_empty() {
            return Err(GpError::Generation(
                "No valid genome in the starting population".to_string(),
            ));
        }

        let mut fitness =
            self.evaluate_population(&population, RerunPolicy::Never, environment, &mut callback);

        if mode == StartMode::Fresh {
            best_fitness.push(max_fitness(&fitness));
            self.log_population(0, &population, &fitness);
            self.run_log.log_fitness(0, &fitness)?;
            self.run_log.log_population(0, &population)?;
            callback.on_generation_complete(0, max_fitness(&fitness), self.evaluator.n_episodes());
        }

        let mut current = last_generation;
        for generation in last_generation + 1..self.params.n_generations {
            current = generation;
            callback.on_generation_start(generation);

            if self.params.keep_baseline {
                if let Some(baseline) = &baseline {
                    if !population.contains(baseline) {
                        population.push(baseline.clone());
                    }
                }
            }

            // Generation 1 reuses the scores of the initial evaluation
            if generation > 1 || fitness.len() != population.len() {
                fitness = self.evaluate_population(
                    &population,
                    self.params.rerun_fitness,
                    environment,
                    &mut callback,
                );
            }

            let baseline_index = baseline
                .as_ref()
                .and_then(|b| population.iter().position(|g| g == b));
            let mut boosted = None;
            if self.params.keep_baseline && self.params.boost_baseline {
                if let Some(index) = baseline_index {
                    boosted = Some((index, fitness[index]));
                    fitness[index] = max_fitness(&fitness);
                }
            }

            let co_parents = self.crossover_parent_selection(&population, &fitness);
            let co_offspring = self.crossover(&population, &co_parents)?;
            let co_fitness = self.evaluate_all(&co_offspring, environment);
            fitness.extend(co_fitness);

            if self.params.boost_baseline_only_co {
                restore_fitness(&mut fitness, &mut boosted);
            }

            let mutation_parents =
                self.mutation_parent_selection(&population, &fitness, &co_parents, co_offspring.len());
            let mut mutation_pool = population.clone();
            mutation_pool.extend(co_offspring.iter().cloned());
            let mutated_offspring = self.mutation(&mutation_pool, &mutation_parents)?;
            let mutated_fitness = self.evaluate_all(&mutated_offspring, environment);
            fitness.extend(mutated_fitness);

            restore_fitness(&mut fitness, &mut boosted);

            log::debug!(
                "Generation {}: {} crossover and {} mutated offspring",
                generation,
                co_offspring.len(),
                mutated_offspring.len()
            );

            let (survivors, survivor_fitness) =
                self.survivor_selection(population, fitness, co_offspring, mutated_offspring);
            population = survivors;
            fitness = survivor_fitness;

            let best = max_fitness(&fitness);
            best_fitness.push(best);
            n_episodes.push(self.evaluator.n_episodes());

            self.run_log.log_fitness(generation, &fitness)?;
            self.run_log.log_population(generation, &population)?;
            self.log_population(generation, &population, &fitness);
            callback.on_generation_complete(generation, best, self.evaluator.n_episodes());

            // The last generation is saved below
            if (generation + 1) % self.params.checkpoint_interval == 0
                && generation < self.params.n_generations - 1
            {
                self.save_state(&population, None, &best_fitness, &n_episodes, &baseline, generation)?;
                callback.on_checkpoint(generation);
            }
        }

        let all: Vec<usize> = (0..population.len()).collect();
        let best_individual = elite_selection(&all, &fitness, 1)
            .first()
            .map(|&i| population[i].clone())
            .unwrap_or_default();

        log::info!(
            "Final population after generation {}, best individual {:?} with fitness {:.4}",
            current,
            best_individual,
            max_fitness(&fitness)
        );

        self.save_state(
            &population,
            Some(&best_individual),
            &best_fitness,
            &n_episodes,
            &baseline,
            current,
        )?;
        callback.on_checkpoint(current);

        if self.params.fig_best {
            self.plot(environment, "best individual", &best_individual);
        }
        if self.params.fig_last_gen {
            for (i, individual) in population.iter().enumerate() {
                self.plot(environment, &format!("individual_{}", i), individual);
            }
        }

        Ok(RunOutcome {
            population,
            fitness,
            best_fitness,
            n_episodes,
            best_individual,
        })
    }

    fn start_fresh(&mut self, baseline: Option<Genome>) -> Result<RunState> {
        self.run_log.clear()?;

        let mut population = self.create_population();
        if let Some(baseline) = &baseline {
            match population.first_mut() {
                Some(first) => *first = baseline.clone(),
                None => population.push(baseline.clone()),
            }
        }

        Ok(RunState {
            population,
            best_fitness: Vec::new(),
            n_episodes: vec![self.evaluator.n_episodes()],
            last_generation: 0,
            baseline,
        })
    }

    fn load_state(&mut self, baseline: Option<Genome>) -> Result<RunState> {
        let checkpoint = self.run_log.load_checkpoint()?;
        if checkpoint.parameters != self.params {
            log::warn!("Parameters differ from the checkpoint, continuing with the current ones");
        }

        self.rng = checkpoint.rng;
        self.run_log.clear_after_generation(checkpoint.generation)?;

        let cache_path = self.run_log.cache_path();
        if cache_path.exists() {
            self.evaluator.cache_mut().load(&cache_path)?;
        } else {
            log::warn!("No fitness cache at {}, starting empty", cache_path.display());
        }

        log::info!(
            "Hot start from generation {} saved {}",
            checkpoint.generation,
            checkpoint.saved_at.to_rfc3339()
        );

        Ok(RunState {
            population: checkpoint.population,
            best_fitness: checkpoint.best_fitness,
            n_episodes: checkpoint.n_episodes,
            last_generation: checkpoint.generation,
            baseline: baseline.or(checkpoint.baseline),
        })
    }

    fn save_state(
        &mut self,
        population: &[Genome],
        best_individual: Option<&Genome>,
        best_fitness: &[f64],
        n_episodes: &[usize],
        baseline: &Option<Genome>,
        generation: usize,
    ) -> Result<()> {
        let checkpoint = Checkpoint {
            generation,
            population: population.to_vec(),
            best_individual: best_individual.cloned(),
            best_fitness: best_fitness.to_vec(),
            n_episodes: n_episodes.to_vec(),
            parameters: self.params.clone(),
            baseline: baseline.clone(),
            rng: self.rng.clone(),
            saved_at: Utc::now(),
        };
        self.run_log.save_checkpoint(&checkpoint)?;
        self.evaluator.cache().write(self.run_log.cache_path())?;
        Ok(())
    }

    /// Distinct random genomes, skipping slots where none could be found
    fn create_population(&mut self) -> Vec<Genome> {
        let mut population: Vec<Genome> = Vec::with_capacity(self.params.n_population);

        for _ in 0..self.params.n_population {
            for _ in 0..MAX_ATTEMPTS {
                if let Search::Found(individual) = self
                    .operators
                    .random_genome(self.params.ind_start_length, &mut self.rng)
                {
                    if !population.contains(&individual) {
                        population.push(individual);
                        break;
                    }
                }
            }
        }

        if population.len() < self.params.n_population {
            log::warn!(
                "Created {} of {} initial individuals",
                population.len(),
                self.params.n_population
            );
        }
        population
    }

    fn evaluate_population<E, C>(
        &mut self,
        population: &[Genome],
        rerun: RerunPolicy,
        environment: &mut E,
        callback: &mut C,
    ) -> Vec<f64>
    where
        E: Environment + ?Sized,
        C: ProgressCallback,
    {
        let mut fitness = Vec::with_capacity(population.len());
        for (i, individual) in population.iter().enumerate() {
            fitness.push(
                self.evaluator
                    .evaluate_with(individual, rerun, environment, &mut self.rng),
            );
            callback.on_individual_evaluated(i + 1, population.len());
        }
        fitness
    }

    fn evaluate_all<E: Environment + ?Sized>(&mut self, genomes: &[Genome], environment: &mut E) -> Vec<f64> {
        genomes
            .iter()
            .map(|genome| self.evaluator.evaluate(genome, environment, &mut self.rng))
            .collect()
    }

    /// Indices into `population` of the crossover parents
    fn crossover_parent_selection(&mut self, population: &[Genome], fitness: &[f64]) -> Vec<usize> {
        let n = self.params.n_crossover_parents();
        if n == 0 {
            return Vec::new();
        }
        let candidates: Vec<usize> = (0..population.len()).collect();
        let mut parents = select(
            self.params.parent_selection,
            &candidates,
            &fitness[..population.len()],
            n,
            &mut self.rng,
        );

        // A small population can clamp the selection to an odd count
        if parents.len() % 2 != 0 && parents.len() < n {
            parents.pop();
        }
        parents
    }

    /// Pair up parents and cross them over. When too few valid pairs are
    /// found the unused parents are mutated instead, as long as neither
    /// operator is configured for several offspring.
    fn crossover(&mut self, population: &[Genome], parents: &[usize]) -> Result<Vec<Genome>> {
        if parents.len() % 2 != 0 {
            return Err(GpError::Configuration(
                "Number of parents for crossover must be even".to_string(),
            ));
        }

        let mut offspring: Vec<Genome> = Vec::new();
        for _ in 0..self.params.n_offspring_crossover {
            let mut unused: Vec<usize> = parents.to_vec();
            let mut attempts = 0;

            while unused.len() >= 2 && attempts < MAX_ATTEMPTS {
                let first = self.rng.gen_range(0..unused.len());
                let mut second = self.rng.gen_range(0..unused.len() - 1);
                if second >= first {
                    second += 1;
                }

                let result = self.operators.crossover_genome(
                    &population[unused[first]],
                    &population[unused[second]],
                    self.params.replace_crossover,
                    &mut self.rng,
                );
                let accepted = match result {
                    Search::Found((child1, child2))
                        if self.acceptable(&child1, population, &offspring)
                            && self.acceptable(&child2, population, &offspring) =>
                    {
                        offspring.push(child1);
                        offspring.push(child2);
                        true
                    }
                    _ => false,
                };

                if accepted {
                    unused.remove(first.max(second));
                    unused.remove(first.min(second));
                    attempts = 0;
                } else {
                    attempts += 1;
                }
            }

            if attempts == MAX_ATTEMPTS
                && !unused.is_empty()
                && self.params.n_offspring_mutation <= 1
                && self.params.n_offspring_crossover <= 1
            {
                log::debug!(
                    "Crossover ran out of attempts, mutating {} parents instead",
                    unused.len()
                );
                let mut pool = population.to_vec();
                pool.extend(offspring.iter().cloned());
                let mutated = self.mutation(&pool, &unused)?;
                offspring.extend(mutated);
            }
        }
        Ok(offspring)
    }

    /// Indices into `population ++ crossover offspring` of the mutation parents
    fn mutation_parent_selection(
        &mut self,
        population: &[Genome],
        fitness: &[f64],
        co_parents: &[usize],
        n_co_offspring: usize,
    ) -> Vec<usize> {
        let n = self.params.n_mutation_parents();
        if n == 0 {
            return Vec::new();
        }

        let mut candidates: Vec<usize> = (0..population.len())
            .filter(|i| self.params.mutate_co_parents || !co_parents.contains(i))
            .collect();
        if self.params.mutate_co_offspring {
            candidates.extend(population.len()..population.len() + n_co_offspring);
        }
        let candidate_fitness: Vec<f64> = candidates.iter().map(|&i| fitness[i]).collect();

        select(
            self.params.parent_selection,
            &candidates,
            &candidate_fitness,
            n,
            &mut self.rng,
        )
    }

    /// `n_offspring_mutation` new genomes per parent, parents indexing `pool`
    fn mutation(&mut self, pool: &[Genome], parents: &[usize]) -> Result<Vec<Genome>> {
        let mut mutated: Vec<Genome> = Vec::new();

        for &parent in parents {
            for _ in 0..self.params.n_offspring_mutation {
                for _ in 0..MAX_ATTEMPTS {
                    let result = self.operators.mutate_gene(
                        &pool[parent],
                        self.params.mutation_p_add,
                        self.params.mutation_p_delete,
                        &mut self.rng,
                    )?;
                    if let Search::Found(child) = result {
                        if self.acceptable(&child, pool, &mutated) {
                            mutated.push(child);
                            break;
                        }
                    }
                }
            }
        }
        Ok(mutated)
    }

    fn acceptable(&self, genome: &Genome, population: &[Genome], offspring: &[Genome]) -> bool {
        genome.len() >= self.params.min_length
            && (self.params.allow_identical
                || (!population.contains(genome) && !offspring.contains(genome)))
    }

    /// Best parents compete with all offspring. Elites pass first, the rest of
    /// the population is filled by the configured survivor selection.
    fn survivor_selection(
        &mut self,
        population: Vec<Genome>,
        fitness: Vec<f64>,
        co_offspring: Vec<Genome>,
        mutated_offspring: Vec<Genome>,
    ) -> (Vec<Genome>, Vec<f64>) {
        let n_parents_total = population.len();
        let mut selectable: Vec<Genome> = Vec::new();
        let mut selectable_fitness: Vec<f64> = Vec::new();

        let n_parents = self.params.n_surviving_parents();
        if n_parents > 0 {
            let candidates: Vec<usize> = (0..n_parents_total).collect();
            for i in elite_selection(&candidates, &fitness[..n_parents_total], n_parents) {
                selectable.push(population[i].clone());
                selectable_fitness.push(fitness[i]);
            }
        }

        selectable.extend(co_offspring);
        selectable.extend(mutated_offspring);
        selectable_fitness.extend_from_slice(&fitness[n_parents_total..]);

        let mut survivors = Vec::with_capacity(self.params.n_population);
        let mut survivor_fitness = Vec::with_capacity(self.params.n_population);

        let n_elites = self.params.n_elites();
        if n_elites > 0 {
            let candidates: Vec<usize> = (0..selectable.len()).collect();
            let mut elites = elite_selection(&candidates, &selectable_fitness, n_elites);
            elites.sort_unstable_by(|a, b| b.cmp(a));
            for i in elites {
                survivors.push(selectable.remove(i));
                survivor_fitness.push(selectable_fitness.remove(i));
            }
        }

        let n_to_select = self.params.n_population.saturating_sub(survivors.len());
        let candidates: Vec<usize> = (0..selectable.len()).collect();
        let selected = select(
            self.params.survivor_selection,
            &candidates,
            &selectable_fitness,
            n_to_select,
            &mut self.rng,
        );
        for i in selected {
            survivors.push(selectable[i].clone());
            survivor_fitness.push(selectable_fitness[i]);
        }

        (survivors, survivor_fitness)
    }

    fn plot<E: Environment + ?Sized>(&self, environment: &mut E, name: &str, genome: &[String]) {
        if let Err(e) = environment.plot_individual(self.run_log.dir(), name, genome) {
            log::warn!("Could not plot '{}': {:#}", name, e);
        }
    }

    fn log_population(&self, generation: usize, population: &[Genome], fitness: &[f64]) {
        let level = if self.params.verbose {
            log::Level::Info
        } else {
            log::Level::Debug
        };
        for (individual, value) in population.iter().zip(fitness) {
            log::log!(level, "{:?} fitness: {:.4}", individual, value);
        }
        log::info!(
            "Generation: {} Best fitness: {:.4}",
            generation,
            max_fitness(fitness)
        );
    }
}

fn max_fitness(fitness: &[f64]) -> f64 {
    fitness.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

fn restore_fitness(fitness: &mut [f64], boosted: &mut Option<(usize, f64)>) {
    if let Some((index, value)) = boosted.take() {
        fitness[index] = value;
    }
}
