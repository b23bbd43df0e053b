//! Frame execution of a compiled plan.

use crate::allocator::ResourceBindingTable;
use crate::compiler::CompiledPlan;
use crate::error::RenderGraphError;
use crate::graph::RenderGraph;
use crate::node::{PassContext, PassNode};
use crate::resource::ResourceHandle;
use log::{trace, warn};

/// Handles of the marked outputs after a successful frame, in marking order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameOutputs {
    frame_index: u64,
    outputs: Vec<(String, ResourceHandle)>,
}

impl FrameOutputs {
    #[inline]
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Handle of a marked output by its `"pass.port"` name.
    pub fn get(&self, name: &str) -> Option<ResourceHandle> {
        self.outputs
            .iter()
            .find(|(output, _)| output == name)
            .map(|(_, handle)| *handle)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ResourceHandle)> + '_ {
        self.outputs.iter().map(|(name, handle)| (name.as_str(), *handle))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct Executor {
    frame_index: u64,
}

impl Executor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index the next frame will run with.
    #[inline]
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Run every pass of `plan` once, in order.
    ///
    /// A failing pass aborts the rest of the frame. The graph, the plan and the bindings stay valid.
    #[profiling::function]
    pub fn run(
        &mut self,
        graph: &mut RenderGraph,
        plan: &CompiledPlan,
        bindings: &ResourceBindingTable,
    ) -> Result<FrameOutputs, RenderGraphError> {
        if !plan.is_compiled_from(graph) || !bindings.is_allocated_for(plan) {
            return Err(RenderGraphError::StalePlan {
                plan_version: plan.topology_version(),
                graph_version: graph.topology_version(),
            });
        }

        let frame = self.frame_index;
        self.frame_index += 1;

        let graph_name = graph.name().to_owned();
        let mut handles = bindings.resolved_handles();

        for binding in &plan.bindings {
            let PassNode { name, pass_type, schema, config, pass } = graph.node_mut(binding.pass);

            profiling::scope!("rendergraph::execute_pass", name.as_str());
            trace!("[{graph_name}] frame {frame}: {name}");

            let mut ctx = PassContext {
                name: name.as_str(),
                pass_type: pass_type.as_str(),
                config: &*config,
                schema: &**schema,
                frame_index: frame,
                inputs: binding.inputs.iter().map(|id| id.map(|id| handles[id.index()])).collect(),
                outputs: binding.outputs.iter().map(|id| handles[id.index()]).collect(),
            };

            if let Err(source) = pass.execute(&mut ctx) {
                warn!("[{graph_name}] pass {name} failed in frame {frame}: {source:#}");
                return Err(RenderGraphError::PassError { pass: name.clone(), frame, source });
            }

            for (id, handle) in binding.outputs.iter().zip(ctx.outputs) {
                handles[id.index()] = handle;
            }
        }

        let outputs = plan
            .outputs()
            .iter()
            .map(|output| (output.name.clone(), handles[output.resource.index()]))
            .collect();

        Ok(FrameOutputs { frame_index: frame, outputs })
    }
}
