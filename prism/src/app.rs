use crate::Engine;
use prism_core::cli::EngineArgs;
use prism_rendergraph::{FrameOutputs, PassRegistry};

pub trait App: Sized + 'static {
    fn new(args: &EngineArgs) -> anyhow::Result<Self>;

    /// Add the pass types this app's graphs use. Runs once, before `setup`.
    fn register_passes(&mut self, _registry: &mut PassRegistry) -> anyhow::Result<()> {
        Ok(())
    }

    /// Build the render graphs and hand them to the engine.
    fn setup(&mut self, engine: &mut Engine) -> anyhow::Result<()>;

    fn tick(&mut self, _engine: &mut Engine, _delta_time: f32) {}

    /// Receive the final outputs of a rendered frame.
    fn present(&mut self, _outputs: &FrameOutputs) {}
}
