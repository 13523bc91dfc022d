pub mod traits;
pub mod genetic;
pub mod grammar;
pub mod manager;

pub use manager::{AppConfig, ConfigManager};
pub use genetic::{GeneticParameters, RerunPolicy, SelectionMethod};
pub use grammar::GrammarConfig;
pub use traits::ConfigSection;
