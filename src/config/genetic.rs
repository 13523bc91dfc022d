use super::traits::{check_fraction, ConfigSection};
use crate::error::GpError;
use serde::{Deserialize, Serialize};

/// Parameters of one genetic programming run.
///
/// Fractions are relative to `n_population` and are turned into counts with
/// round-half-to-even, so `f_crossover = 0.5` with 8 individuals gives 4 parents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneticParameters {
    pub ind_start_length: usize,           // Length of initial genomes
    pub min_length: usize,                 // Minimum token count of offspring
    pub n_population: usize,
    pub f_crossover: f64,                  // Fraction of population selected for crossover
    pub n_offspring_crossover: usize,      // Crossover rounds per parent pool
    pub replace_crossover: bool,           // Swap subtrees instead of inserting them
    pub f_mutation: f64,                   // Fraction of population selected for mutation
    pub n_offspring_mutation: usize,       // Mutants per mutation parent
    pub parent_selection: SelectionMethod,
    pub survivor_selection: SelectionMethod,
    pub f_elites: f64,                     // Fraction surviving as elites
    pub f_parents: f64,                    // Fraction of parents that may survive
    pub mutate_co_offspring: bool,
    pub mutate_co_parents: bool,
    pub mutation_p_add: f64,
    pub mutation_p_delete: f64,
    pub allow_identical: bool,
    pub keep_baseline: bool,
    pub boost_baseline: bool,
    pub boost_baseline_only_co: bool,
    pub n_generations: usize,
    pub hash_table_size: usize,
    pub rerun_fitness: RerunPolicy,
    pub checkpoint_interval: usize,
    pub failure_fitness: f64,              // Fitness given when the environment fails
    pub fig_best: bool,
    pub fig_last_gen: bool,
    pub verbose: bool,
    pub log_name: String,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMethod {
    Elitism,
    Tournament,
    Rank,
    Random,
    All,
}

/// When a cached genome is sent back to the environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RerunPolicy {
    Never,
    Probabilistic,
    Always,
}

impl Default for GeneticParameters {
    fn default() -> Self {
        Self {
            ind_start_length: 5,
            min_length: 2,
            n_population: 8,
            f_crossover: 0.5,
            n_offspring_crossover: 1,
            replace_crossover: false,
            f_mutation: 0.5,
            n_offspring_mutation: 1,
            parent_selection: SelectionMethod::Tournament,
            survivor_selection: SelectionMethod::Tournament,
            f_elites: 0.1,
            f_parents: 1.0,
            mutate_co_offspring: false,
            mutate_co_parents: false,
            mutation_p_add: 0.4,
            mutation_p_delete: 0.3,
            allow_identical: false,
            keep_baseline: true,
            boost_baseline: false,
            boost_baseline_only_co: true,
            n_generations: 100,
            hash_table_size: 100_000,
            rerun_fitness: RerunPolicy::Never,
            checkpoint_interval: 25,
            failure_fitness: -1000.0,
            fig_best: true,
            fig_last_gen: false,
            verbose: false,
            log_name: "1".to_string(),
            seed: None,
        }
    }
}

impl GeneticParameters {
    /// Number of individuals corresponding to a fraction of the population
    pub fn count_of(&self, fraction: f64) -> usize {
        (fraction * self.n_population as f64).round_ties_even().max(0.0) as usize
    }

    pub fn n_crossover_parents(&self) -> usize {
        self.count_of(self.f_crossover)
    }

    pub fn n_mutation_parents(&self) -> usize {
        self.count_of(self.f_mutation)
    }

    pub fn n_elites(&self) -> usize {
        self.count_of(self.f_elites)
    }

    pub fn n_surviving_parents(&self) -> usize {
        self.count_of(self.f_parents)
    }
}

/// Mutation probabilities must be non-negative and sum to at most one
pub fn check_mutation_probabilities(p_add: f64, p_delete: f64) -> Result<(), GpError> {
    if p_add < 0.0 || p_delete < 0.0 {
        return Err(GpError::Configuration(
            "Mutation parameters must not be negative".to_string(),
        ));
    }
    if p_add + p_delete > 1.0 {
        return Err(GpError::Configuration(
            "Sum of the mutation probabilities must be at most 1".to_string(),
        ));
    }
    Ok(())
}

impl ConfigSection for GeneticParameters {
    fn section_name() -> &'static str {
        "genetic"
    }

    fn validate(&self) -> Result<(), GpError> {
        if self.n_population == 0 {
            return Err(GpError::Configuration(
                "Population size must be at least 1".to_string(),
            ));
        }
        if self.ind_start_length == 0 {
            return Err(GpError::Configuration(
                "Initial genome length must be at least 1".to_string(),
            ));
        }
        if self.hash_table_size == 0 {
            return Err(GpError::Configuration(
                "Hash table size must be at least 1".to_string(),
            ));
        }
        if self.checkpoint_interval == 0 {
            return Err(GpError::Configuration(
                "Checkpoint interval must be at least 1".to_string(),
            ));
        }
        if self.log_name.trim().is_empty() {
            return Err(GpError::Configuration("Log name must not be empty".to_string()));
        }

        check_fraction("f_crossover", self.f_crossover)?;
        check_fraction("f_mutation", self.f_mutation)?;
        check_fraction("f_elites", self.f_elites)?;
        check_fraction("f_parents", self.f_parents)?;
        check_mutation_probabilities(self.mutation_p_add, self.mutation_p_delete)?;

        if self.n_crossover_parents() % 2 != 0 {
            return Err(GpError::Configuration(format!(
                "Number of parents for crossover must be even, f_crossover gives {}",
                self.n_crossover_parents()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let params = GeneticParameters::default();
        assert!(params.validate().is_ok());
        assert_eq!(params.n_crossover_parents(), 4);
        assert_eq!(params.n_mutation_parents(), 4);
        assert_eq!(params.n_elites(), 1);
        assert_eq!(params.n_surviving_parents(), 8);
    }

    #[test]
    fn test_counts_round_half_to_even() {
        let params = GeneticParameters {
            n_population: 10,
            ..Default::default()
        };
        // 0.25 * 10 = 2.5 rounds down to 2
        assert_eq!(params.count_of(0.25), 2);
        // 0.75 * 10 = 7.5 rounds up to 8
        assert_eq!(params.count_of(0.75), 8);
    }

    #[test]
    fn test_rejects_odd_crossover_parents() {
        let params = GeneticParameters {
            n_population: 6,
            f_crossover: 0.5,
            ..Default::default()
        };
        assert!(matches!(params.validate(), Err(GpError::Configuration(_))));
    }

    #[test]
    fn test_rejects_bad_mutation_probabilities() {
        assert!(check_mutation_probabilities(-0.1, 0.5).is_err());
        assert!(check_mutation_probabilities(0.5, -0.1).is_err());
        assert!(check_mutation_probabilities(0.7, 0.7).is_err());
        assert!(check_mutation_probabilities(0.0, 0.0).is_ok());
        assert!(check_mutation_probabilities(1.0, 0.0).is_ok());
    }

    #[test]
    fn test_rejects_fraction_out_of_range() {
        let params = GeneticParameters {
            f_elites: 1.5,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }
}
