//! Dependency resolution, scheduling and resource lifetime analysis.

use crate::error::{PortDirection, RenderGraphError};
use crate::graph::{Edge, PassHandle, PortHandle, RenderGraph};
use crate::resource::{BufferLayout, Extent2D, Lifetime, ResourceDesc, ResourceType, SizeHint, TextureFormat};
use derive_builder::Builder;
use derive_more::Display;
use log::{debug, warn};
use prism_core::collections::{HashMap, SmallVec};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

pub const DEFAULT_EXTENT: Extent2D = Extent2D::new(1920, 1080);
pub const DEFAULT_BUFFER_SIZE: u64 = 4096;

/// Type used for outputs that carry `Any` and have no concretely-typed consumer.
const FALLBACK_TYPE: ResourceType = ResourceType::Texture(TextureFormat::Rgba32Float);

#[derive(Clone, Debug, PartialEq, Eq, Builder)]
#[builder(setter(into))]
pub struct CompileConfig {
    /// Extent of textures whose port uses [`SizeHint::Default`].
    #[builder(default = "DEFAULT_EXTENT")]
    pub default_extent: Extent2D,
    /// Byte size of buffers whose port uses [`SizeHint::Default`].
    #[builder(default = "DEFAULT_BUFFER_SIZE")]
    pub default_buffer_size: u64,
    #[builder(default = "true")]
    pub enable_aliasing: bool,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            default_extent: DEFAULT_EXTENT,
            default_buffer_size: DEFAULT_BUFFER_SIZE,
            enable_aliasing: true,
        }
    }
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[display("v{_0}")]
pub struct VirtualResourceId(pub(crate) u32);

impl VirtualResourceId {
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceOrigin {
    /// Written by an output port.
    Output(PortHandle),
    /// Stands in for an unconnected required input.
    Placeholder(PortHandle),
}

/// A logical resource of the plan, before it is mapped onto a physical slot.
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualResource {
    pub(crate) id: VirtualResourceId,
    pub(crate) origin: ResourceOrigin,
    pub(crate) desc: ResourceDesc,
    pub(crate) lifetime: Lifetime,
    pub(crate) pinned: bool,
    pub(crate) forwards: Option<VirtualResourceId>,
}

impl VirtualResource {
    #[inline]
    pub fn id(&self) -> VirtualResourceId {
        self.id
    }

    #[inline]
    pub fn origin(&self) -> ResourceOrigin {
        self.origin
    }

    #[inline]
    pub fn desc(&self) -> &ResourceDesc {
        &self.desc
    }

    #[inline]
    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    /// Marked outputs stay alive until the end of the plan.
    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    /// Input resource the producing port may publish in place of this one.
    #[inline]
    pub fn forwarded(&self) -> Option<VirtualResourceId> {
        self.forwards
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeLifetime {
    pub edge: Edge,
    pub resource: VirtualResourceId,
    pub lifetime: Lifetime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkedOutput {
    pub name: String,
    pub port: PortHandle,
    pub resource: VirtualResourceId,
}

/// Port to virtual resource mapping of one scheduled pass.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PassBinding {
    pub(crate) pass: PassHandle,
    pub(crate) inputs: SmallVec<[Option<VirtualResourceId>; 8]>,
    pub(crate) outputs: SmallVec<[VirtualResourceId; 8]>,
}

/// Result of compiling a render graph. Valid as long as the graph topology is unchanged.
#[derive(Debug, Clone)]
pub struct CompiledPlan {
    pub(crate) graph_id: u64,
    pub(crate) topology_version: u64,
    pub(crate) config: CompileConfig,
    pub(crate) order: Vec<PassHandle>,
    pub(crate) positions: Vec<Option<usize>>,
    pub(crate) edges: Vec<EdgeLifetime>,
    pub(crate) resources: Vec<VirtualResource>,
    pub(crate) outputs: Vec<MarkedOutput>,
    pub(crate) bindings: Vec<PassBinding>,
}

impl CompiledPlan {
    /// Execution order.
    #[inline]
    pub fn order(&self) -> &[PassHandle] {
        &self.order
    }

    pub fn pass_names<'g>(&self, graph: &'g RenderGraph) -> Vec<&'g str> {
        self.order
            .iter()
            .filter_map(|handle| graph.pass(*handle).map(|node| node.name()))
            .collect()
    }

    /// Position of a pass in the execution order.
    pub fn position(&self, pass: PassHandle) -> Option<usize> {
        self.positions.get(pass.index()).copied().flatten()
    }

    #[inline]
    pub fn edge_lifetimes(&self) -> &[EdgeLifetime] {
        &self.edges
    }

    #[inline]
    pub fn resources(&self) -> &[VirtualResource] {
        &self.resources
    }

    pub fn resource(&self, id: VirtualResourceId) -> Option<&VirtualResource> {
        self.resources.get(id.index())
    }

    /// Marked outputs in marking order.
    #[inline]
    pub fn outputs(&self) -> &[MarkedOutput] {
        &self.outputs
    }

    #[inline]
    pub fn topology_version(&self) -> u64 {
        self.topology_version
    }

    #[inline]
    pub fn config(&self) -> &CompileConfig {
        &self.config
    }

    #[inline]
    pub fn last_index(&self) -> usize {
        self.order.len().saturating_sub(1)
    }

    pub(crate) fn is_compiled_from(&self, graph: &RenderGraph) -> bool {
        self.graph_id == graph.id() && self.topology_version == graph.topology_version()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Producer to consumer adjacency, indexed by pass handle. Consumers are sorted and unique.
fn build_successors(graph: &RenderGraph) -> Vec<SmallVec<[usize; 4]>> {
    let mut successors: Vec<SmallVec<[usize; 4]>> = vec![SmallVec::new(); graph.handle_capacity()];

    for edge in graph.edges() {
        let consumers = &mut successors[edge.src.pass.index()];
        let consumer = edge.dst.pass.index();
        if let Err(position) = consumers.binary_search(&consumer) {
            consumers.insert(position, consumer);
        }
    }

    successors
}

/// Depth-first search with an explicit stack of (pass, next successor) pairs.
fn find_cycle(graph: &RenderGraph, successors: &[SmallVec<[usize; 4]>]) -> Option<Vec<String>> {
    let mut marks = vec![Mark::Unvisited; successors.len()];
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for (handle, _) in graph.passes() {
        let root = handle.index();
        if marks[root] != Mark::Unvisited {
            continue;
        }

        marks[root] = Mark::InProgress;
        stack.push((root, 0));

        while let Some(top) = stack.last_mut() {
            let (node, cursor) = *top;
            let Some(&next) = successors[node].get(cursor) else {
                marks[node] = Mark::Done;
                stack.pop();
                continue;
            };
            top.1 += 1;

            match marks[next] {
                Mark::InProgress => {
                    let start = stack.iter().position(|&(n, _)| n == next).unwrap_or(0);
                    let chain = stack[start..]
                        .iter()
                        .map(|&(n, _)| n)
                        .chain(std::iter::once(next))
                        .map(|index| graph.node(PassHandle(index as u32)).name().to_owned())
                        .collect();
                    return Some(chain);
                }
                Mark::Unvisited => {
                    marks[next] = Mark::InProgress;
                    stack.push((next, 0));
                }
                Mark::Done => {}
            }
        }
    }

    None
}

/// Kahn's algorithm, ready passes are taken in declaration order.
fn schedule(graph: &RenderGraph, successors: &[SmallVec<[usize; 4]>]) -> Vec<PassHandle> {
    let mut in_degree = vec![0usize; successors.len()];
    for consumers in successors {
        for &consumer in consumers {
            in_degree[consumer] += 1;
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = graph
        .passes()
        .map(|(handle, _)| handle.index())
        .filter(|index| in_degree[*index] == 0)
        .map(Reverse)
        .collect();

    let mut order = Vec::with_capacity(graph.pass_count());
    while let Some(Reverse(index)) = ready.pop() {
        order.push(PassHandle(index as u32));

        for &consumer in &successors[index] {
            in_degree[consumer] -= 1;
            if in_degree[consumer] == 0 {
                ready.push(Reverse(consumer));
            }
        }
    }

    order
}

fn resolve_desc(ty: ResourceType, size: SizeHint, config: &CompileConfig) -> ResourceDesc {
    match ty {
        ResourceType::Texture(format) => {
            let extent = match size {
                SizeHint::Fixed(extent) => extent,
                SizeHint::Default | SizeHint::Bytes(_) => config.default_extent,
            };
            ResourceDesc::Texture { format, extent }
        }
        ResourceType::Buffer(layout) => {
            let size = match size {
                SizeHint::Bytes(bytes) => bytes,
                // one element per texel
                SizeHint::Fixed(extent) => {
                    let stride = match layout {
                        BufferLayout::Structured { stride } => u64::from(stride),
                        BufferLayout::Raw | BufferLayout::Indirect => 4,
                    };
                    u64::from(extent.width) * u64::from(extent.height) * stride
                }
                SizeHint::Default => config.default_buffer_size,
            };
            ResourceDesc::Buffer { layout, size }
        }
        ResourceType::Any => resolve_desc(FALLBACK_TYPE, size, config),
    }
}

/// Concrete type of an output port. `Any` outputs follow their first concretely-typed consumer.
fn output_type(graph: &RenderGraph, port: PortHandle) -> ResourceType {
    let declared = graph.port_desc(port, PortDirection::Output).resource_type();
    if !declared.is_any() {
        return declared;
    }

    graph
        .edges()
        .iter()
        .filter(|edge| edge.src == port)
        .map(|edge| graph.port_desc(edge.dst, PortDirection::Input).resource_type())
        .find(|ty| !ty.is_any())
        .unwrap_or(FALLBACK_TYPE)
}

/// Extend the lifetime of `id` and of every resource it forwards.
fn extend_lifetime(resources: &mut [VirtualResource], id: VirtualResourceId, index: usize) {
    let mut current = Some(id);
    while let Some(id) = current {
        let resource = &mut resources[id.index()];
        resource.lifetime.extend_to(index);
        current = resource.forwards;
    }
}

/// Compile a render graph into an execution plan.
#[profiling::function]
pub fn compile(graph: &RenderGraph, config: &CompileConfig) -> Result<CompiledPlan, RenderGraphError> {
    let successors = build_successors(graph);

    if let Some(chain) = find_cycle(graph, &successors) {
        return Err(RenderGraphError::CycleDetected { chain });
    }

    let order = schedule(graph, &successors);

    let mut positions = vec![None; graph.handle_capacity()];
    for (position, handle) in order.iter().enumerate() {
        positions[handle.index()] = Some(position);
    }

    for port in graph.outputs() {
        if positions[port.pass.index()].is_none() {
            return Err(RenderGraphError::UnreachableOutput(graph.port_name(*port, PortDirection::Output)));
        }
    }

    if order.len() != graph.pass_count() {
        let chain = graph
            .passes()
            .filter(|(handle, _)| positions[handle.index()].is_none())
            .map(|(_, node)| node.name().to_owned())
            .collect();
        return Err(RenderGraphError::CycleDetected { chain });
    }

    let last = order.len().saturating_sub(1);
    let mut resources: Vec<VirtualResource> = Vec::new();
    let mut produced: HashMap<PortHandle, VirtualResourceId> = HashMap::default();
    let mut bindings = Vec::with_capacity(order.len());

    for (position, &pass) in order.iter().enumerate() {
        let node = graph.node(pass);
        let schema = node.schema();
        let mut binding = PassBinding {
            pass,
            inputs: SmallVec::with_capacity(schema.inputs().len()),
            outputs: SmallVec::with_capacity(schema.outputs().len()),
        };

        for (index, port_desc) in schema.inputs().iter().enumerate() {
            let port = PortHandle { pass, index: index as u16 };

            let bound = match graph.incoming_edge(port) {
                Some(edge) => {
                    // producers are scheduled first, so their resource exists
                    let id = produced.get(&edge.src).copied();
                    if let Some(id) = id {
                        extend_lifetime(&mut resources, id, position);
                    }
                    id
                }
                None if port_desc.is_optional() => None,
                None => {
                    warn!(
                        "[{}] required input {} is not connected, binding a placeholder",
                        graph.name(),
                        graph.port_name(port, PortDirection::Input)
                    );

                    let id = VirtualResourceId(resources.len() as u32);
                    resources.push(VirtualResource {
                        id,
                        origin: ResourceOrigin::Placeholder(port),
                        desc: resolve_desc(port_desc.resource_type(), port_desc.size(), config),
                        lifetime: Lifetime::at(position),
                        pinned: false,
                        forwards: None,
                    });
                    Some(id)
                }
            };
            binding.inputs.push(bound);
        }

        for (index, port_desc) in schema.outputs().iter().enumerate() {
            let port = PortHandle { pass, index: index as u16 };
            let id = VirtualResourceId(resources.len() as u32);
            let pinned = graph.is_output(port);

            let mut lifetime = Lifetime::at(position);
            if pinned {
                lifetime.extend_to(last);
            }

            // a forwarded input must outlive every read of this output
            let forwards = port_desc
                .forwarded_input()
                .and_then(|input| schema.find_input(input))
                .and_then(|input| binding.inputs[input]);
            if let Some(source) = forwards {
                extend_lifetime(&mut resources, source, lifetime.last);
            }

            resources.push(VirtualResource {
                id,
                origin: ResourceOrigin::Output(port),
                desc: resolve_desc(output_type(graph, port), port_desc.size(), config),
                lifetime,
                pinned,
                forwards,
            });
            produced.insert(port, id);
            binding.outputs.push(id);
        }

        bindings.push(binding);
    }

    let edges = graph
        .edges()
        .iter()
        .filter_map(|edge| {
            let resource = produced.get(&edge.src).copied()?;
            let first = positions[edge.src.pass.index()]?;
            let consumer = positions[edge.dst.pass.index()]?;

            let mut lifetime = Lifetime { first, last: consumer };
            if graph.is_output(edge.src) {
                lifetime.extend_to(last);
            }

            Some(EdgeLifetime { edge: *edge, resource, lifetime })
        })
        .collect::<Vec<_>>();

    let outputs = graph
        .outputs()
        .iter()
        .filter_map(|port| {
            produced.get(port).map(|resource| MarkedOutput {
                name: graph.port_name(*port, PortDirection::Output),
                port: *port,
                resource: *resource,
            })
        })
        .collect::<Vec<_>>();

    debug!(
        "[{}] compiled {} passes, {} edges, {} virtual resources, {} marked outputs",
        graph.name(),
        order.len(),
        edges.len(),
        resources.len(),
        outputs.len()
    );

    Ok(CompiledPlan {
        graph_id: graph.id(),
        topology_version: graph.topology_version(),
        config: config.clone(),
        order,
        positions,
        edges,
        resources,
        outputs,
        bindings,
    })
}
