use crate::config::GeneticParameters;
use crate::engines::generation::Genome;
use crate::error::{GpError, Result};
use chrono::{DateTime, Utc};
use rand_pcg::Pcg64;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const FITNESS_LOG: &str = "fitness_log.txt";
pub const POPULATION_LOG: &str = "population_log.txt";
pub const CHECKPOINT_FILE: &str = "checkpoint.json";
pub const CACHE_FILE: &str = "hash_log.txt";

/// Everything needed to resume a run where it stopped
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub generation: usize,
    pub population: Vec<Genome>,
    /// Only set by the final checkpoint of a run
    pub best_individual: Option<Genome>,
    pub best_fitness: Vec<f64>,
    pub n_episodes: Vec<usize>,
    pub parameters: GeneticParameters,
    pub baseline: Option<Genome>,
    pub rng: Pcg64,
    pub saved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitnessRecord {
    pub generation: usize,
    pub fitness: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationRecord {
    pub generation: usize,
    pub population: Vec<Genome>,
}

/// Files of a single run, kept under `<root>/<log_name>/`
#[derive(Debug, Clone)]
pub struct RunLog {
    dir: PathBuf,
}

impl RunLog {
    pub fn new<P: AsRef<Path>>(root: P, log_name: &str) -> Self {
        Self {
            dir: root.as_ref().join(log_name),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn cache_path(&self) -> PathBuf {
        self.dir.join(CACHE_FILE)
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.dir.join(CHECKPOINT_FILE)
    }

    /// Start a fresh run: create the directory and drop files of any previous run
    pub fn clear(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        for name in [FITNESS_LOG, POPULATION_LOG, CHECKPOINT_FILE, CACHE_FILE] {
            let path = self.dir.join(name);
            if path.exists() {
                fs::remove_file(&path)?;
            }
        }
        log::debug!("Cleared run log at {}", self.dir.display());
        Ok(())
    }

    pub fn log_fitness(&self, generation: usize, fitness: &[f64]) -> Result<()> {
        self.append(
            FITNESS_LOG,
            &FitnessRecord {
                generation,
                fitness: fitness.to_vec(),
            },
        )
    }

    pub fn log_population(&self, generation: usize, population: &[Genome]) -> Result<()> {
        self.append(
            POPULATION_LOG,
            &PopulationRecord {
                generation,
                population: population.to_vec(),
            },
        )
    }

    pub fn read_fitness_log(&self) -> Result<Vec<FitnessRecord>> {
        self.read_records(FITNESS_LOG)
    }

    pub fn read_population_log(&self) -> Result<Vec<PopulationRecord>> {
        self.read_records(POPULATION_LOG)
    }

    /// Drop log lines written after `generation`, used when resuming
    pub fn clear_after_generation(&self, generation: usize) -> Result<()> {
        let fitness: Vec<FitnessRecord> = self
            .read_records::<FitnessRecord>(FITNESS_LOG)?
            .into_iter()
            .filter(|r| r.generation <= generation)
            .collect();
        let population: Vec<PopulationRecord> = self
            .read_records::<PopulationRecord>(POPULATION_LOG)?
            .into_iter()
            .filter(|r| r.generation <= generation)
            .collect();

        self.rewrite(FITNESS_LOG, &fitness)?;
        self.rewrite(POPULATION_LOG, &population)?;
        Ok(())
    }

    pub fn save_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string_pretty(checkpoint)?;

        // Write next to the target and rename so a crash never leaves half a checkpoint
        let tmp = self.dir.join(format!("{}.tmp", CHECKPOINT_FILE));
        fs::write(&tmp, json)?;
        fs::rename(&tmp, self.checkpoint_path())?;

        log::info!(
            "Saved checkpoint for generation {} to {}",
            checkpoint.generation,
            self.dir.display()
        );
        Ok(())
    }

    pub fn load_checkpoint(&self) -> Result<Checkpoint> {
        let path = self.checkpoint_path();
        if !path.exists() {
            return Err(GpError::Persistence(format!(
                "No checkpoint found at {}",
                path.display()
            )));
        }
        let contents = fs::read_to_string(&path)?;
        let checkpoint: Checkpoint = serde_json::from_str(&contents)?;
        Ok(checkpoint)
    }

    fn append<T: Serialize>(&self, name: &str, record: &T) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(name))?;
        writeln!(file, "{}", serde_json::to_string(record)?)?;
        Ok(())
    }

    fn read_records<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>> {
        let path = self.dir.join(name);
        if !path.exists() {
            return Ok(Vec::new());
        }
        fs::read_to_string(&path)?
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(GpError::from))
            .collect()
    }

    fn rewrite<T: Serialize>(&self, name: &str, records: &[T]) -> Result<()> {
        let mut contents = String::new();
        for record in records {
            contents.push_str(&serde_json::to_string(record)?);
            contents.push('\n');
        }
        fs::write(self.dir.join(name), contents)?;
        Ok(())
    }
}
