use super::grammar::Grammar;
use crate::error::{GpError, Result};
use crate::types::{NodeKind, Search};
use rand::Rng;

/// Upper bound on candidate trees tried by [`StringBehaviorTree::random`]
pub const MAX_RANDOM_ATTEMPTS: usize = 10_000;

/// A behavior tree stored as a flat token sequence in prefix order.
///
/// Control tokens open a child list that is closed by the grammar's up token,
/// e.g. `s( c0 f( c1 a0 ) a1 )`. There is no node structure besides the token
/// vector: parents, children and subtrees are found by scanning with a running
/// nesting level, and all edits are index based.
#[derive(Debug, Clone)]
pub struct StringBehaviorTree<'g> {
    grammar: &'g Grammar,
    bt: Vec<String>,
}

impl PartialEq for StringBehaviorTree<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.bt == other.bt
    }
}

impl<'g> StringBehaviorTree<'g> {
    pub fn new(grammar: &'g Grammar, bt: Vec<String>) -> Self {
        Self { grammar, bt }
    }

    pub fn empty(grammar: &'g Grammar) -> Self {
        Self::new(grammar, Vec::new())
    }

    /// Build from string slices, mostly useful in tests and configuration
    pub fn from_tokens(grammar: &'g Grammar, tokens: &[&str]) -> Self {
        Self::new(grammar, tokens.iter().map(|t| t.to_string()).collect())
    }

    pub fn set(&mut self, bt: &[String]) -> &mut Self {
        self.bt = bt.to_vec();
        self
    }

    pub fn grammar(&self) -> &'g Grammar {
        self.grammar
    }

    pub fn tokens(&self) -> &[String] {
        &self.bt
    }

    pub fn into_tokens(self) -> Vec<String> {
        self.bt
    }

    pub fn len(&self) -> usize {
        self.bt.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bt.is_empty()
    }

    fn is_control_at(&self, index: usize) -> bool {
        self.grammar.is_control(&self.bt[index])
    }

    fn is_up_at(&self, index: usize) -> bool {
        self.grammar.is_up(&self.bt[index])
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.bt.len() {
            return Err(GpError::InvalidEdit(format!(
                "Index {} out of range for tree of {} tokens",
                index,
                self.bt.len()
            )));
        }
        Ok(())
    }

    /// Replace the tree with a random valid tree of `length` non-up tokens.
    ///
    /// Candidates are built to mostly follow the validity rules and retried
    /// until one is valid. After [`MAX_RANDOM_ATTEMPTS`] the tree is left empty
    /// and `Exhausted` is returned.
    pub fn random<R: Rng + ?Sized>(&mut self, length: usize, rng: &mut R) -> Search<Vec<String>> {
        self.bt.clear();
        if length == 0 {
            return Search::Exhausted;
        }

        for _ in 0..MAX_RANDOM_ATTEMPTS {
            if length == 1 {
                self.bt = vec![self.grammar.random_behavior(rng)];
            } else {
                self.bt = vec![self.grammar.random_control(rng)];
                for _ in 0..length - 1 {
                    let node = self.grammar.random_node(rng);
                    let is_action = self.grammar.is_action(&node);
                    self.bt.push(node);
                    if is_action {
                        self.bt.push(self.grammar.up().to_string());
                    }
                }

                // Pad if the loop came up short, conditions first
                let missing = length.saturating_sub(self.length() + 1);
                for _ in 0..missing {
                    self.bt.push(self.grammar.random_condition(rng));
                }
                if self.length() < length {
                    self.bt.push(self.grammar.random_behavior(rng));
                }
                self.close();
            }

            if self.is_valid() {
                return Search::Found(self.bt.clone());
            }
        }

        log::debug!(
            "No valid random tree of length {} after {} attempts",
            length,
            MAX_RANDOM_ATTEMPTS
        );
        self.bt.clear();
        Search::Exhausted
    }

    /// Whether the tree is well formed.
    ///
    /// Checks run roughly in order of cost so that most invalid trees are
    /// rejected before the nesting rules are walked.
    pub fn is_valid(&self) -> bool {
        let Some(first) = self.bt.first() else {
            return false;
        };

        // A leaf may only be the root of a single-token tree
        if !self.grammar.is_control(first) && self.bt.len() != 1 {
            return false;
        }

        if self.bt.iter().any(|token| !self.grammar.contains(token)) {
            return false;
        }

        for pair in self.bt.windows(2) {
            // Empty child list
            if self.grammar.is_control(&pair[0]) && self.grammar.is_up(&pair[1]) {
                return false;
            }
            // Repeating a condition is wasteful
            if self.grammar.is_condition(&pair[0]) && pair[0] == pair[1] {
                return false;
            }
        }

        match self.depth() {
            None => return false,
            Some(0) if self.bt.len() > 1 => return false,
            _ => {}
        }

        match self.grammar.kind(first) {
            Some(NodeKind::Fallback) => self.is_subtree_valid(&self.bt[1..], false, true),
            Some(NodeKind::Sequence) => self.is_subtree_valid(&self.bt[1..], true, false),
            Some(NodeKind::Parallel) => self.is_subtree_valid(&self.bt[1..], true, true),
            _ => true,
        }
    }

    /// Check the nesting rules for the children that follow a control node.
    ///
    /// `tokens` starts right after the control node and must contain the up
    /// token that closes it. Fallbacks (atomic or not) may not appear below a
    /// fallback unless a sequence or parallel node sits in between, and the
    /// same holds for sequences.
    pub fn is_subtree_valid(
        &self,
        tokens: &[String],
        fallback_allowed: bool,
        sequence_allowed: bool,
    ) -> bool {
        let mut cursor = 0;
        self.walk_children(tokens, &mut cursor, fallback_allowed, sequence_allowed)
    }

    fn walk_children(
        &self,
        tokens: &[String],
        cursor: &mut usize,
        fallback_allowed: bool,
        sequence_allowed: bool,
    ) -> bool {
        while *cursor < tokens.len() {
            let node = &tokens[*cursor];
            *cursor += 1;

            let valid = match self.grammar.kind(node) {
                Some(NodeKind::Up) => return true,
                Some(NodeKind::AtomicFallback) => fallback_allowed,
                Some(NodeKind::AtomicSequence) => sequence_allowed,
                Some(NodeKind::Fallback) => {
                    fallback_allowed && self.walk_children(tokens, cursor, false, true)
                }
                Some(NodeKind::Sequence) => {
                    sequence_allowed && self.walk_children(tokens, cursor, true, false)
                }
                Some(NodeKind::Parallel) => self.walk_children(tokens, cursor, true, true),
                _ => true,
            };
            if !valid {
                return false;
            }
        }

        // Ran out of tokens before the closing up
        false
    }

    /// Add missing up tokens at the end, or remove surplus ones near the end.
    ///
    /// The final token is never removed.
    pub fn close(&mut self) {
        if self.bt.is_empty() {
            return;
        }

        if self.is_control_at(0) && !self.is_up_at(self.bt.len() - 1) {
            self.bt.push(self.grammar.up().to_string());
        }

        let mut open_subtrees: i64 = 0;
        for token in &self.bt {
            if self.grammar.is_control(token) {
                open_subtrees += 1;
            } else if self.grammar.is_up(token) {
                open_subtrees -= 1;
            }
        }

        if open_subtrees > 0 {
            for _ in 0..open_subtrees {
                self.bt.push(self.grammar.up().to_string());
            }
        } else {
            for _ in 0..(-open_subtrees) {
                let last = self.bt.len().saturating_sub(1);
                let surplus = (1..last).rev().find(|&j| self.is_up_at(j));
                match surplus {
                    Some(j) => {
                        self.bt.remove(j);
                    }
                    None => break,
                }
            }
        }
    }

    /// Remove control nodes left with at most one child.
    ///
    /// A single child takes the place of its parent. When that child is a
    /// control node identical to the grandparent, it is dissolved into the
    /// grandparent as well. The root is never trimmed.
    pub fn trim(&mut self) {
        for index in (1..self.bt.len()).rev() {
            if index >= self.bt.len() || !self.is_control_at(index) {
                continue;
            }

            let children = self.find_children(index);
            if children.len() > 1 {
                continue;
            }
            let Ok(up_index) = self.find_up_node(index) else {
                continue;
            };
            self.bt.remove(up_index);

            if let [child] = children.as_slice() {
                let child = *child;
                if let Some(parent) = self.find_parent(index) {
                    if self.bt[parent] == self.bt[child] {
                        if let Ok(child_up) = self.find_up_node(child) {
                            self.bt.remove(child_up);
                            self.bt.remove(child);
                        }
                    }
                }
            }
            self.bt.remove(index);
        }
    }

    /// Maximum nesting depth, or `None` when the nesting is broken.
    ///
    /// The nesting level may only return to zero at the last token, so two
    /// trees side by side or a missing up token both give `None`. A single leaf
    /// has depth zero.
    pub fn depth(&self) -> Option<usize> {
        let last = self.bt.len().saturating_sub(1);
        let mut depth: i64 = 0;
        let mut max_depth: i64 = 0;

        for (i, token) in self.bt.iter().enumerate() {
            if self.grammar.is_control(token) {
                depth += 1;
                max_depth = max_depth.max(depth);
            } else if self.grammar.is_up(token) {
                depth -= 1;
                if depth < 0 || (depth == 0 && i != last) {
                    return None;
                }
            }
        }

        if depth != 0 {
            return None;
        }
        Some(max_depth as usize)
    }

    /// Number of nodes, not counting up tokens
    pub fn length(&self) -> usize {
        self.bt.iter().filter(|token| !self.grammar.is_up(token)).count()
    }

    /// Change the node at `index`, to `new_node` or to a random node.
    ///
    /// A control node turned into a leaf loses its whole subtree. A leaf turned
    /// into a control node becomes a two-child subtree that keeps the old leaf:
    /// behaviors go last, conditions go first. Up tokens are left alone.
    pub fn change_node<R: Rng + ?Sized>(
        &mut self,
        index: usize,
        new_node: Option<&str>,
        rng: &mut R,
    ) -> Result<()> {
        self.check_index(index)?;
        if self.is_up_at(index) {
            return Ok(());
        }

        let new_node = match new_node {
            Some(node) => {
                self.grammar.require(node)?;
                node.to_string()
            }
            None => self.grammar.random_node(rng),
        };

        let old_is_control = self.is_control_at(index);
        let old_is_leaf = self.grammar.is_leaf(&self.bt[index]);

        if self.grammar.is_leaf(&new_node) && old_is_control {
            self.delete_node(index)?;
            self.bt.insert(index, new_node);
        } else if self.grammar.is_control(&new_node) && old_is_leaf {
            let old_node = std::mem::replace(&mut self.bt[index], new_node);
            if self.grammar.is_behavior(&old_node) {
                self.bt.insert(index + 1, self.grammar.random_leaf(rng));
                self.bt.insert(index + 2, old_node);
            } else {
                self.bt.insert(index + 1, old_node);
                self.bt.insert(index + 2, self.grammar.random_behavior(rng));
            }
            self.bt.insert(index + 3, self.grammar.up().to_string());
        } else {
            self.bt[index] = new_node;
        }
        Ok(())
    }

    /// Insert `new_node` (or a random node) at `index`.
    ///
    /// A control node at the root wraps the whole tree; anywhere else it comes
    /// with a fresh leaf and behavior child.
    pub fn add_node<R: Rng + ?Sized>(
        &mut self,
        index: usize,
        new_node: Option<&str>,
        rng: &mut R,
    ) -> Result<()> {
        if index > self.bt.len() {
            return Err(GpError::InvalidEdit(format!(
                "Cannot insert at {} in tree of {} tokens",
                index,
                self.bt.len()
            )));
        }

        let new_node = match new_node {
            Some(node) => {
                self.grammar.require(node)?;
                node.to_string()
            }
            None => self.grammar.random_node(rng),
        };

        if self.grammar.is_control(&new_node) {
            if index == 0 {
                self.bt.insert(0, new_node);
                self.bt.push(self.grammar.up().to_string());
            } else {
                self.bt.insert(index, new_node);
                self.bt.insert(index + 1, self.grammar.random_leaf(rng));
                self.bt.insert(index + 2, self.grammar.random_behavior(rng));
                self.bt.insert(index + 3, self.grammar.up().to_string());
            }
        } else {
            self.bt.insert(index, new_node);
        }
        Ok(())
    }

    /// Delete the node at `index`, including its subtree for control nodes.
    /// Up tokens cannot be deleted directly.
    pub fn delete_node(&mut self, index: usize) -> Result<()> {
        self.check_index(index)?;
        if self.is_up_at(index) {
            return Ok(());
        }

        if self.is_control_at(index) {
            let up_index = self.find_up_node(index)?;
            self.bt.drain(index..=up_index);
        } else {
            self.bt.remove(index);
        }
        Ok(())
    }

    /// Index of the closest control node owning the node at `index`
    pub fn find_parent(&self, index: usize) -> Option<usize> {
        let mut parent = index.min(self.bt.len());
        let mut siblings_left = 0usize;

        while parent > 0 {
            parent -= 1;
            if self.is_control_at(parent) {
                if siblings_left == 0 {
                    return Some(parent);
                }
                siblings_left -= 1;
            } else if self.is_up_at(parent) {
                siblings_left += 1;
            }
        }
        None
    }

    /// Indices of the direct children of the node at `index`
    pub fn find_children(&self, index: usize) -> Vec<usize> {
        let mut children = Vec::new();
        if index >= self.bt.len() || !self.is_control_at(index) {
            return children;
        }

        let mut child = index + 1;
        let mut level: i64 = 0;
        while level >= 0 && child < self.bt.len() {
            if self.is_up_at(child) {
                level -= 1;
            } else if level == 0 {
                children.push(child);
            }

            if self.is_control_at(child) {
                level += 1;
            }
            child += 1;
        }
        children
    }

    /// Index of the up token closing the control node at `index`
    pub fn find_up_node(&self, index: usize) -> Result<usize> {
        self.check_index(index)?;
        if !self.is_control_at(index) {
            return Err(GpError::InvalidEdit(format!(
                "Node at {} is not a control node",
                index
            )));
        }

        if index == 0 {
            let last = self.bt.len() - 1;
            if self.is_up_at(last) {
                return Ok(last);
            }
            return Err(GpError::InvalidEdit("Missing up at end of tree".to_string()));
        }

        let mut cursor = index;
        let mut level = 1;
        while level > 0 {
            cursor += 1;
            if cursor == self.bt.len() {
                return Err(GpError::InvalidEdit(format!(
                    "Missing up for control node at {}",
                    index
                )));
            }
            if self.is_control_at(cursor) {
                level += 1;
            } else if self.is_up_at(cursor) {
                level -= 1;
            }
        }
        Ok(cursor)
    }

    /// Tokens of the subtree rooted at `index`: a single leaf, a control node
    /// through its up token, or nothing when `index` holds an up token
    pub fn get_subtree(&self, index: usize) -> Vec<String> {
        if index >= self.bt.len() {
            return Vec::new();
        }
        let token = &self.bt[index];
        if self.grammar.is_leaf(token) {
            vec![token.clone()]
        } else if self.grammar.is_control(token) {
            match self.find_up_node(index) {
                Ok(up_index) => self.bt[index..=up_index].to_vec(),
                Err(_) => Vec::new(),
            }
        } else {
            Vec::new()
        }
    }

    pub fn insert_subtree(&mut self, subtree: &[String], index: usize) {
        let index = index.min(self.bt.len());
        self.bt.splice(index..index, subtree.iter().cloned());
    }

    /// Exchange the subtree at `index` with the subtree at `other_index` of
    /// `other`. Nothing happens if either side is not a subtree root.
    pub fn swap_subtrees(&mut self, other: &mut StringBehaviorTree<'_>, index: usize, other_index: usize) {
        let subtree = self.get_subtree(index);
        let other_subtree = other.get_subtree(other_index);

        if subtree.is_empty() || other_subtree.is_empty() {
            return;
        }

        self.bt
            .splice(index..index + subtree.len(), other_subtree.iter().cloned());
        other
            .bt
            .splice(other_index..other_index + other_subtree.len(), subtree);
    }

    /// Whether a subtree starts at `index`
    pub fn is_subtree(&self, index: usize) -> bool {
        index < self.bt.len() && !self.is_up_at(index)
    }
}
