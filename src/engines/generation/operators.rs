use crate::config::genetic::check_mutation_probabilities;
use crate::engines::generation::genome::Genome;
use crate::error::Result;
use crate::sbt::{Grammar, StringBehaviorTree};
use crate::types::Search;
use rand::Rng;
use std::sync::Arc;

/// Attempts made by mutation and crossover before giving up
pub const MAX_ATTEMPTS: usize = 100;

/// Ways of creating new genomes, injected into the evolution engine
pub trait GeneticOperators {
    fn random_genome<R: Rng + ?Sized>(&self, length: usize, rng: &mut R) -> Search<Genome>;

    /// Change a single gene. Fails only on invalid probabilities.
    fn mutate_gene<R: Rng + ?Sized>(
        &self,
        genome: &[String],
        p_add: f64,
        p_delete: f64,
        rng: &mut R,
    ) -> Result<Search<Genome>>;

    fn crossover_genome<R: Rng + ?Sized>(
        &self,
        genome1: &[String],
        genome2: &[String],
        replace: bool,
        rng: &mut R,
    ) -> Search<(Genome, Genome)>;
}

/// Operators on string behavior trees of one grammar
#[derive(Debug, Clone)]
pub struct SbtOperators {
    grammar: Arc<Grammar>,
}

impl SbtOperators {
    pub fn new(grammar: Arc<Grammar>) -> Self {
        Self { grammar }
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }
}

impl GeneticOperators for SbtOperators {
    fn random_genome<R: Rng + ?Sized>(&self, length: usize, rng: &mut R) -> Search<Genome> {
        StringBehaviorTree::empty(&self.grammar).random(length, rng)
    }

    /// Delete with probability `p_delete`, add with probability `p_add`,
    /// otherwise change the node at a random index. The result must be valid
    /// and differ from the input.
    fn mutate_gene<R: Rng + ?Sized>(
        &self,
        genome: &[String],
        p_add: f64,
        p_delete: f64,
        rng: &mut R,
    ) -> Result<Search<Genome>> {
        check_mutation_probabilities(p_add, p_delete)?;
        if genome.is_empty() {
            return Ok(Search::Exhausted);
        }

        let mut mutated = StringBehaviorTree::empty(&self.grammar);
        for _ in 0..MAX_ATTEMPTS {
            mutated.set(genome);
            let index = rng.gen_range(0..genome.len());
            let mutation = rng.gen::<f64>();

            let edit = if mutation < p_delete {
                mutated.delete_node(index)
            } else if mutation < p_delete + p_add {
                mutated.add_node(index, None, rng)
            } else {
                mutated.change_node(index, None, rng)
            };
            if let Err(e) = edit {
                log::trace!("Mutation at {} failed: {}", index, e);
                continue;
            }

            mutated.close();
            mutated.trim();
            if mutated.is_valid() && mutated.tokens() != genome {
                return Ok(Search::Found(mutated.into_tokens()));
            }
        }
        Ok(Search::Exhausted)
    }

    /// Exchange random subtrees, or with `replace == false` insert each
    /// parent's subtree into the other parent. Index 0 is only picked for
    /// single-token genomes, where it stands for the whole genome.
    fn crossover_genome<R: Rng + ?Sized>(
        &self,
        genome1: &[String],
        genome2: &[String],
        replace: bool,
        rng: &mut R,
    ) -> Search<(Genome, Genome)> {
        let parent1 = StringBehaviorTree::new(&self.grammar, genome1.to_vec());
        let parent2 = StringBehaviorTree::new(&self.grammar, genome2.to_vec());
        if !parent1.is_valid() || !parent2.is_valid() {
            return Search::Exhausted;
        }

        let points1 = crossover_points(&parent1);
        let points2 = crossover_points(&parent2);
        if points1.is_empty() || points2.is_empty() {
            return Search::Exhausted;
        }

        let mut offspring1 = StringBehaviorTree::empty(&self.grammar);
        let mut offspring2 = StringBehaviorTree::empty(&self.grammar);
        for _ in 0..MAX_ATTEMPTS {
            offspring1.set(genome1);
            offspring2.set(genome2);
            let point1 = points1[rng.gen_range(0..points1.len())];
            let point2 = points2[rng.gen_range(0..points2.len())];

            if replace {
                offspring1.swap_subtrees(&mut offspring2, point1, point2);
            } else {
                let subtree1 = offspring1.get_subtree(point1);
                let subtree2 = offspring2.get_subtree(point2);
                let index1 = insertion_index(genome1.len(), rng);
                let index2 = insertion_index(genome2.len(), rng);
                offspring1.insert_subtree(&subtree2, index1);
                offspring2.insert_subtree(&subtree1, index2);
            }

            if offspring1.is_valid() && offspring2.is_valid() {
                return Search::Found((offspring1.into_tokens(), offspring2.into_tokens()));
            }
        }
        Search::Exhausted
    }
}

/// Indices where a subtree starts, the root excluded unless it is the only token
fn crossover_points(tree: &StringBehaviorTree<'_>) -> Vec<usize> {
    if tree.len() == 1 {
        return vec![0];
    }
    (1..tree.len()).filter(|&i| tree.is_subtree(i)).collect()
}

fn insertion_index<R: Rng + ?Sized>(len: usize, rng: &mut R) -> usize {
    if len == 1 {
        rng.gen_range(0..=1)
    } else {
        rng.gen_range(1..len)
    }
}
