use super::traits::ConfigSection;
use crate::error::GpError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Token vocabulary of string behavior trees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrammarConfig {
    pub fallback_nodes: Vec<String>,
    pub sequence_nodes: Vec<String>,
    pub parallel_nodes: Vec<String>,
    pub condition_nodes: Vec<String>,
    pub action_nodes: Vec<String>,
    pub atomic_fallback_nodes: Vec<String>,
    pub atomic_sequence_nodes: Vec<String>,
    pub up_node: String,
}

impl Default for GrammarConfig {
    fn default() -> Self {
        Self {
            fallback_nodes: vec!["f(".to_string()],
            sequence_nodes: vec!["s(".to_string()],
            parallel_nodes: Vec::new(),
            condition_nodes: Vec::new(),
            action_nodes: Vec::new(),
            atomic_fallback_nodes: Vec::new(),
            atomic_sequence_nodes: Vec::new(),
            up_node: ")".to_string(),
        }
    }
}

impl GrammarConfig {
    /// Load a grammar from a TOML or JSON file, format picked by extension
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, GpError> {
        let grammar: GrammarConfig = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .build()?
            .try_deserialize()?;

        grammar.validate()?;
        Ok(grammar)
    }

    /// All token lists with their category names, in declaration order
    pub(crate) fn categories(&self) -> [(&'static str, &[String]); 7] {
        [
            ("fallback_nodes", self.fallback_nodes.as_slice()),
            ("sequence_nodes", self.sequence_nodes.as_slice()),
            ("parallel_nodes", self.parallel_nodes.as_slice()),
            ("condition_nodes", self.condition_nodes.as_slice()),
            ("action_nodes", self.action_nodes.as_slice()),
            ("atomic_fallback_nodes", self.atomic_fallback_nodes.as_slice()),
            ("atomic_sequence_nodes", self.atomic_sequence_nodes.as_slice()),
        ]
    }
}

impl ConfigSection for GrammarConfig {
    fn section_name() -> &'static str {
        "grammar"
    }

    fn validate(&self) -> Result<(), GpError> {
        if self.up_node.is_empty() {
            return Err(GpError::Configuration("Up node must not be empty".to_string()));
        }
        if self.fallback_nodes.is_empty()
            && self.sequence_nodes.is_empty()
            && self.parallel_nodes.is_empty()
        {
            return Err(GpError::Configuration(
                "Grammar needs at least one control node".to_string(),
            ));
        }
        if self.action_nodes.is_empty()
            && self.atomic_fallback_nodes.is_empty()
            && self.atomic_sequence_nodes.is_empty()
        {
            return Err(GpError::Configuration(
                "Grammar needs at least one action or atomic node".to_string(),
            ));
        }

        let mut seen: HashSet<&str> = HashSet::new();
        seen.insert(self.up_node.as_str());
        for (category, tokens) in self.categories() {
            for token in tokens {
                if token.is_empty() {
                    return Err(GpError::Configuration(format!(
                        "Empty token in {}",
                        category
                    )));
                }
                if !seen.insert(token.as_str()) {
                    return Err(GpError::Configuration(format!(
                        "Token '{}' appears more than once in the grammar",
                        token
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> GrammarConfig {
        GrammarConfig {
            condition_nodes: vec!["c0".to_string()],
            action_nodes: vec!["a0".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_minimal_grammar_is_valid() {
        assert!(minimal().validate().is_ok());
    }

    #[test]
    fn test_rejects_duplicate_tokens() {
        let mut grammar = minimal();
        grammar.condition_nodes.push("a0".to_string());
        assert!(grammar.validate().is_err());

        let mut grammar = minimal();
        grammar.action_nodes.push(")".to_string());
        assert!(grammar.validate().is_err());
    }

    #[test]
    fn test_rejects_grammar_without_behaviors() {
        let mut grammar = minimal();
        grammar.action_nodes.clear();
        assert!(grammar.validate().is_err());

        grammar.atomic_sequence_nodes.push("as0".to_string());
        assert!(grammar.validate().is_ok());
    }

    #[test]
    fn test_rejects_grammar_without_controls() {
        let mut grammar = minimal();
        grammar.fallback_nodes.clear();
        grammar.sequence_nodes.clear();
        assert!(grammar.validate().is_err());
    }
}
