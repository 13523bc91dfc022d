use super::{genetic::GeneticParameters, grammar::GrammarConfig, traits::ConfigSection};
use crate::error::GpError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, RwLock};

/// Prefix of environment variables overriding file settings,
/// e.g. `BTEVOLVE__GENETIC__N_POPULATION=16`
pub const ENV_PREFIX: &str = "BTEVOLVE";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub genetic: GeneticParameters,
    pub grammar: GrammarConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), GpError> {
        self.genetic.validate()?;
        self.grammar.validate()?;
        Ok(())
    }
}

pub struct ConfigManager {
    config: Arc<RwLock<AppConfig>>,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManager {
    pub fn new() -> Self {
        Self {
            config: Arc::new(RwLock::new(AppConfig::default())),
        }
    }

    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) -> Result<(), GpError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| GpError::Configuration(format!("Failed to read config: {}", e)))?;

        let config: AppConfig = toml::from_str(&contents)
            .map_err(|e| GpError::Configuration(format!("Failed to parse config: {}", e)))?;

        config.validate()?;

        *self.config.write().unwrap_or_else(|e| e.into_inner()) = config;
        Ok(())
    }

    /// Load a file and apply `BTEVOLVE__<SECTION>__<FIELD>` environment overrides on top
    pub fn load_layered<P: AsRef<Path>>(&self, path: P) -> Result<(), GpError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        let config = AppConfig {
            genetic: read_section(&settings)?,
            grammar: read_section(&settings)?,
        };

        config.validate()?;
        log::debug!(
            "Loaded layered configuration for run '{}'",
            config.genetic.log_name
        );

        *self.config.write().unwrap_or_else(|e| e.into_inner()) = config;
        Ok(())
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), GpError> {
        let config = self.get();
        let toml_str = toml::to_string_pretty(&config)
            .map_err(|e| GpError::Configuration(format!("Failed to serialize: {}", e)))?;

        std::fs::write(path, toml_str)
            .map_err(|e| GpError::Configuration(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    pub fn get(&self) -> AppConfig {
        self.config.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Apply a change, keeping the previous configuration if the result is invalid
    pub fn update<F>(&self, f: F) -> Result<(), GpError>
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut config = self.config.write().unwrap_or_else(|e| e.into_inner());
        let mut candidate = config.clone();
        f(&mut candidate);
        candidate.validate()?;
        *config = candidate;
        Ok(())
    }
}

/// A section of a layered configuration, defaults when the section is absent
fn read_section<T: ConfigSection>(settings: &config::Config) -> Result<T, GpError> {
    match settings.get::<T>(T::section_name()) {
        Ok(section) => Ok(section),
        Err(config::ConfigError::NotFound(_)) => {
            log::debug!("No [{}] section, using defaults", T::section_name());
            Ok(T::default())
        }
        Err(e) => Err(e.into()),
    }
}
