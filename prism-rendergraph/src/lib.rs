mod allocator;
mod backend;
mod compiler;
mod error;
mod executor;
mod graph;
mod node;
mod pool;
mod resource;
mod runner;
mod schema;

pub use resource::{
    BufferLayout, Extent2D, FormatClass, Lifetime, ResourceDesc, ResourceHandle, ResourceType, SizeHint,
    TextureFormat,
};
pub use schema::{is_compatible, PassFactory, PassRegistry, PortDesc, PortSchema};
pub use error::{PortDirection, RenderGraphError};
pub use node::{PassConfig, PassContext, PassNode, RenderPass};
pub use graph::{Edge, PassHandle, PortHandle, RenderGraph};
pub use compiler::{
    compile, CompileConfig, CompileConfigBuilder, CompileConfigBuilderError, CompiledPlan, EdgeLifetime,
    MarkedOutput, ResourceOrigin, VirtualResource, VirtualResourceId, DEFAULT_BUFFER_SIZE, DEFAULT_EXTENT,
};
pub use allocator::{allocate, ResourceBindingTable, ResourceSlot};
pub use backend::{HeadlessBackend, ResourceBackend};
pub use pool::{ResourcePool, ResourcePoolStats, SharedResourcePool};
pub use executor::{Executor, FrameOutputs};
pub use runner::RenderGraphRunner;
