use crate::config::{ConfigSection, GrammarConfig};
use crate::error::{GpError, Result};
use crate::types::NodeKind;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashMap;

/// Resolved vocabulary of a string behavior tree grammar.
///
/// Built once from a validated [`GrammarConfig`] and shared (by reference or
/// `Arc`) by every tree and operator that needs it. Token lists keep the order
/// of the configuration so seeded runs are reproducible.
#[derive(Debug, Clone)]
pub struct Grammar {
    config: GrammarConfig,
    kinds: HashMap<String, NodeKind>,
    control_nodes: Vec<String>,
    condition_nodes: Vec<String>,
    behavior_nodes: Vec<String>,
    leaf_nodes: Vec<String>,
}

impl Grammar {
    pub fn new(config: GrammarConfig) -> Result<Self> {
        config.validate()?;

        let mut kinds = HashMap::new();
        let groups = [
            (&config.fallback_nodes, NodeKind::Fallback),
            (&config.sequence_nodes, NodeKind::Sequence),
            (&config.parallel_nodes, NodeKind::Parallel),
            (&config.condition_nodes, NodeKind::Condition),
            (&config.action_nodes, NodeKind::Action),
            (&config.atomic_fallback_nodes, NodeKind::AtomicFallback),
            (&config.atomic_sequence_nodes, NodeKind::AtomicSequence),
        ];
        for (tokens, kind) in groups {
            for token in tokens.iter() {
                kinds.insert(token.clone(), kind);
            }
        }
        kinds.insert(config.up_node.clone(), NodeKind::Up);

        let control_nodes: Vec<String> = config
            .fallback_nodes
            .iter()
            .chain(&config.sequence_nodes)
            .chain(&config.parallel_nodes)
            .cloned()
            .collect();
        let condition_nodes = config.condition_nodes.clone();
        let behavior_nodes: Vec<String> = config
            .action_nodes
            .iter()
            .chain(&config.atomic_fallback_nodes)
            .chain(&config.atomic_sequence_nodes)
            .cloned()
            .collect();
        let leaf_nodes: Vec<String> = condition_nodes
            .iter()
            .chain(&behavior_nodes)
            .cloned()
            .collect();

        Ok(Self {
            config,
            kinds,
            control_nodes,
            condition_nodes,
            behavior_nodes,
            leaf_nodes,
        })
    }

    pub fn config(&self) -> &GrammarConfig {
        &self.config
    }

    pub fn kind(&self, token: &str) -> Option<NodeKind> {
        self.kinds.get(token).copied()
    }

    /// Kind of a token, failing on tokens outside the vocabulary
    pub fn require(&self, token: &str) -> Result<NodeKind> {
        self.kind(token)
            .ok_or_else(|| GpError::UnknownToken(token.to_string()))
    }

    pub fn contains(&self, token: &str) -> bool {
        self.kinds.contains_key(token)
    }

    pub fn up(&self) -> &str {
        &self.config.up_node
    }

    pub fn is_up(&self, token: &str) -> bool {
        token == self.config.up_node
    }

    pub fn is_control(&self, token: &str) -> bool {
        self.kind(token).is_some_and(NodeKind::is_control)
    }

    pub fn is_leaf(&self, token: &str) -> bool {
        self.kind(token).is_some_and(NodeKind::is_leaf)
    }

    pub fn is_behavior(&self, token: &str) -> bool {
        self.kind(token).is_some_and(NodeKind::is_behavior)
    }

    pub fn is_condition(&self, token: &str) -> bool {
        self.kind(token) == Some(NodeKind::Condition)
    }

    pub fn is_action(&self, token: &str) -> bool {
        self.kind(token) == Some(NodeKind::Action)
    }

    pub fn control_nodes(&self) -> &[String] {
        &self.control_nodes
    }

    pub fn condition_nodes(&self) -> &[String] {
        &self.condition_nodes
    }

    pub fn behavior_nodes(&self) -> &[String] {
        &self.behavior_nodes
    }

    pub fn leaf_nodes(&self) -> &[String] {
        &self.leaf_nodes
    }

    /// Any token except the up token.
    ///
    /// Leaf sets are usually much larger than control sets; picking the category
    /// first keeps the final mix close to 50-50.
    pub fn random_node<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        if rng.gen::<f64>() < 0.5 {
            self.random_control(rng)
        } else {
            self.random_leaf(rng)
        }
    }

    pub fn random_control<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        pick(&self.control_nodes, rng)
    }

    pub fn random_leaf<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        pick(&self.leaf_nodes, rng)
    }

    pub fn random_behavior<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        pick(&self.behavior_nodes, rng)
    }

    /// A condition, or any leaf when the grammar has no conditions
    pub fn random_condition<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        if self.condition_nodes.is_empty() {
            self.random_leaf(rng)
        } else {
            pick(&self.condition_nodes, rng)
        }
    }
}

// Validated grammars always have controls, behaviors and therefore leaves
fn pick<R: Rng + ?Sized>(tokens: &[String], rng: &mut R) -> String {
    tokens.choose(rng).cloned().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    fn grammar() -> Grammar {
        Grammar::new(GrammarConfig {
            parallel_nodes: vec!["p(".to_string()],
            condition_nodes: vec!["c0".to_string(), "c1".to_string()],
            action_nodes: vec!["a0".to_string()],
            atomic_fallback_nodes: vec!["af0".to_string()],
            atomic_sequence_nodes: vec!["as0".to_string()],
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_categories() {
        let g = grammar();
        assert_eq!(g.control_nodes(), ["f(", "s(", "p("]);
        assert_eq!(g.behavior_nodes(), ["a0", "af0", "as0"]);
        assert_eq!(g.leaf_nodes(), ["c0", "c1", "a0", "af0", "as0"]);
        assert!(g.is_up(")"));
        assert!(g.is_control("p("));
        assert!(g.is_behavior("af0"));
        assert!(!g.is_action("af0"));
        assert_eq!(g.kind("as0"), Some(NodeKind::AtomicSequence));
        assert_eq!(g.kind("x"), None);
        assert!(matches!(g.require("x"), Err(GpError::UnknownToken(_))));
    }

    #[test]
    fn test_random_node_never_returns_up() {
        let g = grammar();
        let mut rng = Pcg64::seed_from_u64(7);
        let mut controls = 0;
        for _ in 0..1000 {
            let node = g.random_node(&mut rng);
            assert!(!g.is_up(&node));
            assert!(g.contains(&node));
            if g.is_control(&node) {
                controls += 1;
            }
        }
        assert!(controls > 400 && controls < 600);
    }
}
