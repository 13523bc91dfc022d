pub mod evolution_engine;
pub mod genome;
pub mod operators;
pub mod progress;
pub mod selection;

pub use genome::Genome;
pub use evolution_engine::{EvolutionEngine, ProgressCallback, RunOutcome, StartMode};
pub use operators::{GeneticOperators, SbtOperators};
pub use progress::{ChannelProgressCallback, ConsoleProgressCallback, ProgressMessage};
pub use selection::select;
