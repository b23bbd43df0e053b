#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use log::{info, warn};
use prism::passes::register_builtin_passes;
use prism::passes::scripts::{default_render_graph, DEFAULT_RENDER_GRAPH};
use prism::rendergraph::{FrameOutputs, PassRegistry};
use prism::{launch, App, Args, Engine};

pub struct SurfelApp {
    post_fx_toggle: Option<u64>,
}

impl App for SurfelApp {
    fn new(args: &Args) -> anyhow::Result<Self> {
        // `postfx-toggle=N` flips SimplePostFX every N frames
        let post_fx_toggle = args
            .args
            .iter()
            .find_map(|arg| arg.strip_prefix("postfx-toggle="))
            .map(str::parse)
            .transpose()?;

        Ok(Self { post_fx_toggle })
    }

    fn register_passes(&mut self, registry: &mut PassRegistry) -> anyhow::Result<()> {
        register_builtin_passes(registry)?;
        Ok(())
    }

    fn setup(&mut self, engine: &mut Engine) -> anyhow::Result<()> {
        let graph = default_render_graph(engine.registry().clone())?;
        engine.add_graph(graph)?;
        Ok(())
    }

    fn tick(&mut self, engine: &mut Engine, _delta_time: f32) {
        let Some(period) = self.post_fx_toggle.filter(|period| *period > 0) else {
            return;
        };

        let frame = engine.frame_count();
        if frame == 0 || frame % period != 0 {
            return;
        }

        let enabled = (frame / period) % 2 == 0;
        if let Some(graph) = engine.graph_mut(DEFAULT_RENDER_GRAPH) {
            let config = graph
                .pass_by_name("SimplePostFX")
                .map(|node| node.config().clone().with("enabled", enabled))
                .unwrap_or_default();

            match graph.update_pass_config("SimplePostFX", config) {
                Ok(()) => info!("SimplePostFX {}", if enabled { "enabled" } else { "disabled" }),
                Err(err) => warn!("Failed to reconfigure SimplePostFX: {err}"),
            }
        }
    }

    fn present(&mut self, outputs: &FrameOutputs) {
        for (name, handle) in outputs.iter() {
            info!("Frame {}: present {name} = {handle}", outputs.frame_index());
        }
    }
}

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    launch::<SurfelApp>().expect("Failed to launch prism engine loop!");
}
