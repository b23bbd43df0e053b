use crate::allocator::{allocate, ResourceBindingTable};
use crate::compiler::{compile, CompileConfig, CompiledPlan};
use crate::error::RenderGraphError;
use crate::executor::{Executor, FrameOutputs};
use crate::graph::RenderGraph;
use crate::pool::SharedResourcePool;
use log::{debug, info};

/// Keeps the compiled plan and bindings of one graph across frames.
pub struct RenderGraphRunner {
    pool: SharedResourcePool,
    config: CompileConfig,
    compiled: Option<(CompiledPlan, ResourceBindingTable)>,
    executor: Executor,
    compile_count: u64,
}

impl RenderGraphRunner {
    pub fn new(pool: SharedResourcePool, config: CompileConfig) -> Self {
        Self {
            pool,
            config,
            compiled: None,
            executor: Executor::new(),
            compile_count: 0,
        }
    }

    /// Render one frame, recompiling only when the graph topology or the compile config changed.
    pub fn render(&mut self, graph: &mut RenderGraph) -> Result<FrameOutputs, RenderGraphError> {
        let up_to_date = self
            .compiled
            .as_ref()
            .is_some_and(|(plan, _)| plan.is_compiled_from(graph) && plan.config() == &self.config);

        let compiled = match self.compiled.take() {
            Some(compiled) if up_to_date => compiled,
            stale => {
                // give the old slots back first so the new table can reuse them
                drop(stale);

                let plan = compile(graph, &self.config)?;
                let bindings = allocate(&plan, &self.pool)?;
                self.compile_count += 1;

                // cached resources of descriptors the new plan does not use would otherwise stay live
                let released = self
                    .pool
                    .lock()
                    .trim(|desc| bindings.slots().iter().any(|slot| slot.desc == *desc));
                if released > 0 {
                    debug!("[{}] released {released} unused pooled resources", graph.name());
                }

                info!(
                    "[{}] compiled render graph (topology {}): {} passes, {} slots",
                    graph.name(),
                    plan.topology_version(),
                    plan.order().len(),
                    bindings.slot_count()
                );
                (plan, bindings)
            }
        };

        let (plan, bindings) = self.compiled.insert(compiled);
        self.executor.run(graph, plan, bindings)
    }

    /// Drop the cached plan. The next `render` recompiles.
    pub fn invalidate(&mut self) {
        self.compiled = None;
    }

    pub fn set_compile_config(&mut self, config: CompileConfig) {
        self.config = config;
    }

    #[inline]
    pub fn compile_config(&self) -> &CompileConfig {
        &self.config
    }

    pub fn plan(&self) -> Option<&CompiledPlan> {
        self.compiled.as_ref().map(|(plan, _)| plan)
    }

    pub fn bindings(&self) -> Option<&ResourceBindingTable> {
        self.compiled.as_ref().map(|(_, bindings)| bindings)
    }

    /// How many times a plan was compiled and allocated.
    #[inline]
    pub fn compile_count(&self) -> u64 {
        self.compile_count
    }

    #[inline]
    pub fn frame_index(&self) -> u64 {
        self.executor.frame_index()
    }
}
