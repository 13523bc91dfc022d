use super::evolution_engine::ProgressCallback;

pub struct ConsoleProgressCallback;

impl ProgressCallback for ConsoleProgressCallback {
    fn on_generation_start(&mut self, generation: usize) {
        log::debug!("Generation {} starting...", generation);
    }

    fn on_generation_complete(&mut self, generation: usize, best_fitness: f64, n_episodes: usize) {
        log::info!(
            "Generation {} complete. Best fitness: {:.4}, episodes: {}",
            generation, best_fitness, n_episodes
        );
    }

    fn on_individual_evaluated(&mut self, current: usize, total: usize) {
        if current % 10 == 0 || current == total {
            log::debug!("  Evaluated {}/{} individuals", current, total);
        }
    }

    fn on_checkpoint(&mut self, generation: usize) {
        log::info!("Checkpoint saved after generation {}", generation);
    }
}

// For watching a run from another thread
pub struct ChannelProgressCallback {
    sender: std::sync::mpsc::Sender<ProgressMessage>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressMessage {
    GenerationStart(usize),
    GenerationComplete { generation: usize, best_fitness: f64, n_episodes: usize },
    IndividualEvaluated { current: usize, total: usize },
    Checkpoint(usize),
}

impl ChannelProgressCallback {
    pub fn new(sender: std::sync::mpsc::Sender<ProgressMessage>) -> Self {
        Self { sender }
    }
}

impl ProgressCallback for ChannelProgressCallback {
    fn on_generation_start(&mut self, generation: usize) {
        let _ = self.sender.send(ProgressMessage::GenerationStart(generation));
    }

    fn on_generation_complete(&mut self, generation: usize, best_fitness: f64, n_episodes: usize) {
        let _ = self.sender.send(ProgressMessage::GenerationComplete {
            generation,
            best_fitness,
            n_episodes,
        });
    }

    fn on_individual_evaluated(&mut self, current: usize, total: usize) {
        let _ = self.sender.send(ProgressMessage::IndividualEvaluated { current, total });
    }

    fn on_checkpoint(&mut self, generation: usize) {
        let _ = self.sender.send(ProgressMessage::Checkpoint(generation));
    }
}

// Runs that nobody watches
impl ProgressCallback for () {
    fn on_generation_start(&mut self, _generation: usize) {}

    fn on_generation_complete(&mut self, _generation: usize, _best_fitness: f64, _n_episodes: usize) {}
}
