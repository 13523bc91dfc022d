use std::path::Path;

/// The world a genome is scored in, usually a simulator or a real robot.
///
/// Implementations may keep state between calls; the engine calls them from a
/// single thread, one genome at a time.
pub trait Environment {
    /// Run the behavior tree described by `genome` and return its fitness,
    /// higher is better
    fn run_and_compute(&mut self, genome: &[String], verbose: bool) -> anyhow::Result<f64>;

    /// Save a picture of `genome` as `name` in `dir`. Best effort only.
    fn plot_individual(&mut self, _dir: &Path, _name: &str, _genome: &[String]) -> anyhow::Result<()> {
        Ok(())
    }
}
