//! Genetic programming of behavior trees encoded as flat token strings.
//!
//! A [`sbt::Grammar`] defines the token vocabulary, genomes are token
//! sequences edited through [`sbt::StringBehaviorTree`], and the
//! [`engines::generation::EvolutionEngine`] evolves them against a user
//! supplied [`engines::evaluation::Environment`].

pub mod config;
pub mod data;
pub mod engines;
pub mod error;
pub mod sbt;
pub mod types;

pub use error::{GpError, Result};
pub use types::{NodeKind, Search};
