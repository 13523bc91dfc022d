pub mod environment;
pub mod evaluator;

pub use environment::Environment;
pub use evaluator::FitnessEvaluator;
