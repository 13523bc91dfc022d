pub mod cache;
pub mod run_log;

pub use cache::FitnessCache;
pub use run_log::{Checkpoint, RunLog};
