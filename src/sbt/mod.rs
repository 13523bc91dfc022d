pub mod grammar;
pub mod tree;

pub use grammar::Grammar;
pub use tree::{StringBehaviorTree, MAX_RANDOM_ATTEMPTS};
