use anyhow::{anyhow, bail};
use log::info;
use prism_core::cli::EngineArgs;
use prism_rendergraph::{
    CompileConfig, CompileConfigBuilder, Extent2D, FrameOutputs, HeadlessBackend, PassRegistry, RenderGraph,
    RenderGraphRunner, ResourceBackend, ResourcePool, SharedResourcePool,
};
use std::sync::Arc;

struct GraphEntry {
    graph: RenderGraph,
    runner: RenderGraphRunner,
}

pub struct Engine {
    registry: Arc<PassRegistry>,
    pool: SharedResourcePool,
    compile_config: CompileConfig,

    graphs: Vec<GraphEntry>,
    active_graph: Option<usize>,

    frame_count: u64,
    should_exit: bool,
}

impl Engine {
    pub fn new(registry: PassRegistry, backend: impl ResourceBackend + 'static, compile_config: CompileConfig) -> Self {
        Self {
            registry: Arc::new(registry),
            pool: ResourcePool::shared(backend),
            compile_config,
            graphs: Vec::new(),
            active_graph: None,
            frame_count: 0,
            should_exit: false,
        }
    }

    /// Headless engine configured from command-line arguments.
    pub fn from_args(registry: PassRegistry, args: &EngineArgs) -> Self {
        let backend = match args.max_resources {
            Some(capacity) => HeadlessBackend::with_capacity(capacity),
            None => HeadlessBackend::new(),
        };

        let compile_config = CompileConfigBuilder::default()
            .default_extent(Extent2D::new(args.width, args.height))
            .enable_aliasing(!args.no_aliasing)
            .build()
            .unwrap_or_default();

        Self::new(registry, backend, compile_config)
    }

    #[inline]
    pub fn registry(&self) -> &Arc<PassRegistry> {
        &self.registry
    }

    #[inline]
    pub fn pool(&self) -> &SharedResourcePool {
        &self.pool
    }

    /// Empty graph bound to this engine's pass registry.
    pub fn create_graph(&self, name: &str) -> RenderGraph {
        RenderGraph::new(name, self.registry.clone())
    }

    /// Register a graph for rendering. The first graph added becomes the active one.
    pub fn add_graph(&mut self, graph: RenderGraph) -> anyhow::Result<()> {
        if self.graph_index(graph.name()).is_some() {
            bail!("Render graph '{}' is already registered!", graph.name());
        }

        info!("Added render graph {} ({} passes)", graph.name(), graph.pass_count());

        let runner = RenderGraphRunner::new(self.pool.clone(), self.compile_config.clone());
        self.graphs.push(GraphEntry { graph, runner });
        self.active_graph.get_or_insert(self.graphs.len() - 1);
        Ok(())
    }

    pub fn remove_graph(&mut self, name: &str) -> Option<RenderGraph> {
        let index = self.graph_index(name)?;
        let entry = self.graphs.remove(index);

        self.active_graph = match self.active_graph {
            Some(active) if active == index => None,
            Some(active) if active > index => Some(active - 1),
            active => active,
        };
        Some(entry.graph)
    }

    pub fn set_active_graph(&mut self, name: &str) -> anyhow::Result<()> {
        let index = self
            .graph_index(name)
            .ok_or_else(|| anyhow!("Unknown render graph '{name}'!"))?;
        self.active_graph = Some(index);
        Ok(())
    }

    pub fn active_graph(&self) -> Option<&RenderGraph> {
        self.active_graph.map(|index| &self.graphs[index].graph)
    }

    pub fn graph(&self, name: &str) -> Option<&RenderGraph> {
        self.graph_index(name).map(|index| &self.graphs[index].graph)
    }

    pub fn graph_mut(&mut self, name: &str) -> Option<&mut RenderGraph> {
        self.graph_index(name).map(|index| &mut self.graphs[index].graph)
    }

    pub fn runner(&self, name: &str) -> Option<&RenderGraphRunner> {
        self.graph_index(name).map(|index| &self.graphs[index].runner)
    }

    /// Applies to every registered graph on its next frame. Idle pooled resources are released since
    /// their descriptors are unlikely to match the recompiled plans.
    pub fn set_compile_config(&mut self, compile_config: CompileConfig) {
        for entry in &mut self.graphs {
            entry.runner.set_compile_config(compile_config.clone());
        }
        self.compile_config = compile_config;
        self.pool.lock().clear();
    }

    /// Render one frame of the active graph.
    #[profiling::function]
    pub fn render_frame(&mut self) -> anyhow::Result<FrameOutputs> {
        let index = self.active_graph.ok_or_else(|| anyhow!("No active render graph!"))?;
        let GraphEntry { graph, runner } = &mut self.graphs[index];

        let outputs = runner.render(graph)?;
        self.frame_count += 1;

        profiling::finish_frame!();
        Ok(outputs)
    }

    /// Number of successfully rendered frames.
    #[inline]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    #[inline]
    pub fn request_exit(&mut self) { self.should_exit = true; }

    #[inline]
    pub fn should_exit(&self) -> bool { self.should_exit }

    fn graph_index(&self, name: &str) -> Option<usize> {
        self.graphs.iter().position(|entry| entry.graph.name() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_passes::register_builtin_passes;
    use prism_passes::scripts::{default_render_graph, DEFAULT_RENDER_GRAPH};
    use prism_rendergraph::PassConfig;

    fn engine() -> Engine {
        let mut registry = PassRegistry::new();
        register_builtin_passes(&mut registry).unwrap();
        Engine::new(registry, HeadlessBackend::new(), CompileConfig::default())
    }

    #[test]
    fn test_render_default_graph() {
        let mut engine = engine();
        let graph = default_render_graph(engine.registry().clone()).unwrap();
        engine.add_graph(graph).unwrap();

        assert_eq!(engine.active_graph().unwrap().name(), DEFAULT_RENDER_GRAPH);
        for _ in 0..3 {
            let outputs = engine.render_frame().unwrap();
            assert!(outputs.get("ToneMapper.dst").is_some());
        }
        assert_eq!(engine.frame_count(), 3);
        assert_eq!(engine.runner(DEFAULT_RENDER_GRAPH).unwrap().compile_count(), 1);
    }

    #[test]
    fn test_duplicate_graph_name() {
        let mut engine = engine();
        engine.add_graph(engine.create_graph("main")).unwrap();
        assert!(engine.add_graph(engine.create_graph("main")).is_err());
    }

    #[test]
    fn test_active_graph_switching() {
        let mut engine = engine();
        assert!(engine.render_frame().is_err());
        assert!(engine.set_active_graph("missing").is_err());

        let mut first = engine.create_graph("first");
        first.add_pass("GBuffer", "SurfelGBuffer", PassConfig::new()).unwrap();
        first.mark_output("GBuffer.depth").unwrap();
        engine.add_graph(first).unwrap();
        engine.add_graph(default_render_graph(engine.registry().clone()).unwrap()).unwrap();

        assert!(engine.render_frame().unwrap().get("GBuffer.depth").is_some());

        engine.set_active_graph(DEFAULT_RENDER_GRAPH).unwrap();
        assert!(engine.render_frame().unwrap().get("ToneMapper.dst").is_some());

        assert!(engine.remove_graph("first").is_some());
        assert_eq!(engine.active_graph().unwrap().name(), DEFAULT_RENDER_GRAPH);
        engine.remove_graph(DEFAULT_RENDER_GRAPH).unwrap();
        assert!(engine.active_graph().is_none());
    }

    #[test]
    fn test_compile_config_change_on_capped_backend() {
        let mut registry = PassRegistry::new();
        register_builtin_passes(&mut registry).unwrap();
        let mut engine = Engine::new(registry, HeadlessBackend::with_capacity(12), CompileConfig::default());
        engine.add_graph(default_render_graph(engine.registry().clone()).unwrap()).unwrap();
        engine.render_frame().unwrap();

        let mut config = CompileConfig::default();
        config.default_extent = Extent2D::new(640, 480);
        engine.set_compile_config(config);

        for _ in 0..3 {
            engine.render_frame().unwrap();
        }
        assert_eq!(engine.frame_count(), 4);

        let stats = engine.pool().lock().stats();
        assert_eq!(stats.available_count, 0);
        assert_eq!(stats.live_count, stats.in_use_count);
    }

    #[test]
    fn test_from_args() {
        use clap::Parser;

        let args = EngineArgs::try_parse_from(["prism", "--width", "320", "--height", "240", "--no-aliasing"]).unwrap();
        let mut registry = PassRegistry::new();
        register_builtin_passes(&mut registry).unwrap();
        let mut engine = Engine::from_args(registry, &args);

        engine.add_graph(default_render_graph(engine.registry().clone()).unwrap()).unwrap();
        engine.render_frame().unwrap();

        let runner = engine.runner(DEFAULT_RENDER_GRAPH).unwrap();
        let plan = runner.plan().unwrap();
        assert_eq!(plan.config().default_extent, Extent2D::new(320, 240));
        assert_eq!(runner.bindings().unwrap().slot_count(), plan.resources().len());
    }
}
