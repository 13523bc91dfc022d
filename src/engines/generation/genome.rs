/// Genome representation for genetic programming
///
/// A genome is the token sequence of a string behavior tree, in prefix order:
/// control nodes open a subtree that the grammar's up token closes, leaves
/// stand alone.
///
/// # Why a flat sequence instead of a node tree?
///
/// All edits are index based:
/// - **Mutation**: insert, delete or replace the token at an index
/// - **Crossover**: subtrees are contiguous slices, swapped by splicing
/// - **Caching**: the genome itself is the fitness cache key
///
/// Use `StringBehaviorTree::new(&grammar, genome)` to check validity or edit it.
///
/// # Example
///
/// ```
/// let genome: bt_evolve::engines::generation::Genome =
///     ["s(", "c0", "f(", "c1", "a0", ")", "a1", ")"]
///         .iter()
///         .map(|t| t.to_string())
///         .collect();
/// assert_eq!(genome.len(), 8);
/// ```
pub type Genome = Vec<String>;
