//! Render graph construction and structural validation.

use crate::error::{PortDirection, RenderGraphError};
use crate::node::{PassConfig, PassNode};
use crate::schema::{is_compatible, PassRegistry, PortDesc};
use log::{debug, warn};
use prism_core::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_GRAPH_ID: AtomicU64 = AtomicU64::new(1);

/// Handle to a pass in a render graph, only meaningful for the graph that created it.
///
/// Handles stay valid when other passes are removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PassHandle(pub(crate) u32);

impl PassHandle {
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// A port resolved to its owning pass and its index in the pass schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortHandle {
    pub(crate) pass: PassHandle,
    pub(crate) index: u16,
}

impl PortHandle {
    #[inline]
    pub fn pass(&self) -> PassHandle {
        self.pass
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

/// Directed connection from an output port to an input port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edge {
    pub(crate) src: PortHandle,
    pub(crate) dst: PortHandle,
}

impl Edge {
    #[inline]
    pub fn src(&self) -> PortHandle {
        self.src
    }

    #[inline]
    pub fn dst(&self) -> PortHandle {
        self.dst
    }
}

/// Split a `"pass.port"` reference.
pub(crate) fn parse_port_ref(port_ref: &str) -> Result<(&str, &str), RenderGraphError> {
    match port_ref.split_once('.') {
        Some((pass, port)) if !pass.is_empty() && !port.is_empty() => Ok((pass, port)),
        _ => Err(RenderGraphError::InvalidPortRef(port_ref.to_owned())),
    }
}

pub struct RenderGraph {
    name: String,
    id: u64,
    registry: Arc<PassRegistry>,
    nodes: Vec<Option<PassNode>>,
    names: HashMap<String, PassHandle>,
    edges: Vec<Edge>,
    outputs: Vec<PortHandle>,
    topology_version: u64,
}

impl RenderGraph {
    pub fn new(name: &str, registry: Arc<PassRegistry>) -> Self {
        Self {
            name: name.to_owned(),
            id: NEXT_GRAPH_ID.fetch_add(1, Ordering::Relaxed),
            registry,
            nodes: Vec::new(),
            names: HashMap::default(),
            edges: Vec::new(),
            outputs: Vec::new(),
            topology_version: 0,
        }
    }

    /// Instantiate a pass of a registered type.
    pub fn add_pass(&mut self, name: &str, pass_type: &str, config: PassConfig) -> Result<PassHandle, RenderGraphError> {
        if name.is_empty() || name.contains('.') {
            return Err(RenderGraphError::InvalidName(name.to_owned()));
        }
        if self.names.contains_key(name) {
            return Err(RenderGraphError::DuplicatePassName(name.to_owned()));
        }

        let entry = self.registry.entry(pass_type)?;
        let mut node = PassNode {
            name: name.to_owned(),
            pass_type: pass_type.to_owned(),
            schema: entry.schema.clone(),
            config,
            pass: (entry.factory)(),
        };
        node.pass.on_config_changed(&node.config);

        let handle = PassHandle(self.nodes.len() as u32);
        self.nodes.push(Some(node));
        self.names.insert(name.to_owned(), handle);
        self.bump_topology();

        debug!("[{}] add pass {name} ({pass_type})", self.name);
        Ok(handle)
    }

    /// Remove a pass together with its edges and output marks.
    pub fn remove_pass(&mut self, name: &str) -> Result<(), RenderGraphError> {
        let handle = self.handle_of(name)?;

        self.nodes[handle.index()] = None;
        self.names.remove(name);
        self.edges.retain(|edge| edge.src.pass != handle && edge.dst.pass != handle);
        self.outputs.retain(|port| port.pass != handle);
        self.bump_topology();

        debug!("[{}] remove pass {name}", self.name);
        Ok(())
    }

    /// Replace the configuration of a pass. Topology is unchanged, so compiled plans stay valid.
    pub fn update_pass_config(&mut self, name: &str, config: PassConfig) -> Result<(), RenderGraphError> {
        let handle = self.handle_of(name)?;
        let node = self.node_mut(handle);

        node.config = config;
        node.pass.on_config_changed(&node.config);
        Ok(())
    }

    /// Connect `producer` (an output, `"pass.port"`) to `consumer` (an input, `"pass.port"`).
    pub fn add_edge(&mut self, producer: &str, consumer: &str) -> Result<Edge, RenderGraphError> {
        let src = self.resolve(producer, PortDirection::Output)?;
        let dst = self.resolve(consumer, PortDirection::Input)?;

        if let Some(bound) = self.incoming_edge(dst) {
            return Err(RenderGraphError::PortAlreadyBound {
                port: consumer.to_owned(),
                bound_to: self.port_name(bound.src, PortDirection::Output),
            });
        }

        let src_type = self.port_desc(src, PortDirection::Output).resource_type();
        let dst_type = self.port_desc(dst, PortDirection::Input).resource_type();
        if !is_compatible(src_type, dst_type) {
            return Err(RenderGraphError::TypeMismatch {
                src: producer.to_owned(),
                src_type,
                dst: consumer.to_owned(),
                dst_type,
            });
        }

        let edge = Edge { src, dst };
        self.edges.push(edge);
        self.bump_topology();

        debug!("[{}] add edge {producer} -> {consumer}", self.name);
        Ok(edge)
    }

    pub fn remove_edge(&mut self, producer: &str, consumer: &str) -> Result<(), RenderGraphError> {
        let src = self.resolve(producer, PortDirection::Output)?;
        let dst = self.resolve(consumer, PortDirection::Input)?;

        let position = self.edges
            .iter()
            .position(|edge| edge.src == src && edge.dst == dst)
            .ok_or_else(|| RenderGraphError::UnknownEdge {
                src: producer.to_owned(),
                dst: consumer.to_owned(),
            })?;

        self.edges.remove(position);
        self.bump_topology();
        Ok(())
    }

    /// Mark an output port as a final output of the graph. Marking twice is a no-op.
    pub fn mark_output(&mut self, port_ref: &str) -> Result<PortHandle, RenderGraphError> {
        let port = self.resolve(port_ref, PortDirection::Output)?;

        if !self.outputs.contains(&port) {
            self.outputs.push(port);
            self.bump_topology();
        }

        Ok(port)
    }

    /// Returns whether the port was marked.
    pub fn unmark_output(&mut self, port_ref: &str) -> Result<bool, RenderGraphError> {
        let port = self.resolve(port_ref, PortDirection::Output)?;

        match self.outputs.iter().position(|marked| *marked == port) {
            Some(position) => {
                self.outputs.remove(position);
                self.bump_topology();
                Ok(true)
            }
            None => {
                warn!("[{}] {port_ref} is not marked as output", self.name);
                Ok(false)
            }
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn registry(&self) -> &Arc<PassRegistry> {
        &self.registry
    }

    /// Incremented by every structural mutation.
    #[inline]
    pub fn topology_version(&self) -> u64 {
        self.topology_version
    }

    pub fn handle_of(&self, name: &str) -> Result<PassHandle, RenderGraphError> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| RenderGraphError::UnknownPass(name.to_owned()))
    }

    pub fn pass(&self, handle: PassHandle) -> Option<&PassNode> {
        self.nodes.get(handle.index()).and_then(Option::as_ref)
    }

    pub fn pass_by_name(&self, name: &str) -> Option<&PassNode> {
        self.names.get(name).and_then(|handle| self.pass(*handle))
    }

    /// Passes in declaration order.
    pub fn passes(&self) -> impl Iterator<Item = (PassHandle, &PassNode)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(index, node)| node.as_ref().map(|node| (PassHandle(index as u32), node)))
    }

    #[inline]
    pub fn pass_count(&self) -> usize {
        self.names.len()
    }

    #[inline]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Marked outputs in marking order.
    #[inline]
    pub fn outputs(&self) -> &[PortHandle] {
        &self.outputs
    }

    pub fn is_output(&self, port: PortHandle) -> bool {
        self.outputs.contains(&port)
    }

    pub fn incoming_edge(&self, input: PortHandle) -> Option<&Edge> {
        self.edges.iter().find(|edge| edge.dst == input)
    }

    /// `"pass.port"` name of a port.
    pub fn port_name(&self, port: PortHandle, direction: PortDirection) -> String {
        match self.pass(port.pass) {
            Some(node) => format!("{}.{}", node.name, self.port_desc(port, direction).name()),
            None => format!("<removed #{}>.{}", port.pass.0, port.index),
        }
    }

    pub fn edge_name(&self, edge: &Edge) -> String {
        format!(
            "{} -> {}",
            self.port_name(edge.src, PortDirection::Output),
            self.port_name(edge.dst, PortDirection::Input)
        )
    }

    pub(crate) fn port_desc(&self, port: PortHandle, direction: PortDirection) -> &PortDesc {
        let node = self.node(port.pass);
        match direction {
            PortDirection::Input => &node.schema.inputs[port.index()],
            PortDirection::Output => &node.schema.outputs[port.index()],
        }
    }

    /// Upper bound of pass handle indices, including removed passes.
    #[inline]
    pub(crate) fn handle_capacity(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn node(&self, handle: PassHandle) -> &PassNode {
        self.pass(handle).expect("Pass handle refers to a removed pass!")
    }

    pub(crate) fn node_mut(&mut self, handle: PassHandle) -> &mut PassNode {
        self.nodes
            .get_mut(handle.index())
            .and_then(Option::as_mut)
            .expect("Pass handle refers to a removed pass!")
    }

    fn resolve(&self, port_ref: &str, direction: PortDirection) -> Result<PortHandle, RenderGraphError> {
        let (pass_name, port_name) = parse_port_ref(port_ref)?;
        let pass = self.handle_of(pass_name)?;
        let schema = &self.node(pass).schema;

        let index = match direction {
            PortDirection::Input => schema.find_input(port_name),
            PortDirection::Output => schema.find_output(port_name),
        };

        index
            .map(|index| PortHandle { pass, index: index as u16 })
            .ok_or_else(|| RenderGraphError::UnknownPort {
                pass: pass_name.to_owned(),
                port: port_name.to_owned(),
                direction,
            })
    }

    fn bump_topology(&mut self) {
        self.topology_version += 1;
    }
}

impl std::fmt::Debug for RenderGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderGraph")
            .field("name", &self.name)
            .field("passes", &self.passes().map(|(_, node)| node.name()).collect::<Vec<_>>())
            .field("edges", &self.edges.iter().map(|edge| self.edge_name(edge)).collect::<Vec<_>>())
            .field("topology_version", &self.topology_version)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::node::PassContext;
    use crate::resource::{BufferLayout, TextureFormat};
    use crate::schema::PortSchema;

    fn noop(_ctx: &mut PassContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// Registry with a few small pass types shared by the crate's tests.
    pub(crate) fn test_registry() -> Arc<PassRegistry> {
        let mut registry = PassRegistry::new();
        registry
            .register(
                "Source",
                PortSchema::new().output(PortDesc::texture("color", TextureFormat::Rgba32Float)),
                || noop,
            )
            .unwrap();
        registry
            .register(
                "Filter",
                PortSchema::new()
                    .input(PortDesc::texture("src", TextureFormat::Rgba32Float))
                    .output(PortDesc::texture("dst", TextureFormat::Rgba32Float)),
                || noop,
            )
            .unwrap();
        registry
            .register(
                "Blend",
                PortSchema::new()
                    .input(PortDesc::texture("a", TextureFormat::Rgba32Float))
                    .input(PortDesc::texture("b", TextureFormat::Rgba32Float))
                    .input(PortDesc::texture("mask", TextureFormat::R32Float).optional())
                    .output(PortDesc::texture("dst", TextureFormat::Rgba32Float)),
                || noop,
            )
            .unwrap();
        registry
            .register(
                "Present",
                PortSchema::new()
                    .input(PortDesc::texture("src", TextureFormat::Rgba8Unorm))
                    .output(PortDesc::texture("dst", TextureFormat::Rgba8Unorm)),
                || noop,
            )
            .unwrap();
        registry
            .register(
                "Counter",
                PortSchema::new().output(PortDesc::buffer("counts", BufferLayout::Structured { stride: 4 }, 256)),
                || noop,
            )
            .unwrap();
        registry
            .register(
                "Bypass",
                PortSchema::new()
                    .input(PortDesc::texture("src", TextureFormat::Rgba32Float))
                    .output(PortDesc::texture("dst", TextureFormat::Rgba32Float).forwards("src")),
                || noop,
            )
            .unwrap();
        registry
            .register(
                "Inspect",
                PortSchema::new().input(PortDesc::any("any")).output(PortDesc::any("out")),
                || noop,
            )
            .unwrap();
        Arc::new(registry)
    }

    #[test]
    fn test_add_pass() {
        let mut graph = RenderGraph::new("test", test_registry());
        let handle = graph.add_pass("src", "Source", PassConfig::new()).unwrap();

        assert_eq!(graph.pass_count(), 1);
        assert_eq!(graph.pass(handle).unwrap().name(), "src");
        assert_eq!(graph.pass_by_name("src").unwrap().pass_type(), "Source");
        assert_eq!(graph.topology_version(), 1);
    }

    #[test]
    fn test_add_pass_errors() {
        let mut graph = RenderGraph::new("test", test_registry());
        graph.add_pass("src", "Source", PassConfig::new()).unwrap();
        let version = graph.topology_version();

        assert_eq!(
            graph.add_pass("src", "Filter", PassConfig::new()).unwrap_err(),
            RenderGraphError::DuplicatePassName("src".into())
        );
        assert_eq!(
            graph.add_pass("other", "Missing", PassConfig::new()).unwrap_err(),
            RenderGraphError::UnknownPassType("Missing".into())
        );
        assert_eq!(
            graph.add_pass("a.b", "Source", PassConfig::new()).unwrap_err(),
            RenderGraphError::InvalidName("a.b".into())
        );
        assert_eq!(
            graph.add_pass("", "Source", PassConfig::new()).unwrap_err(),
            RenderGraphError::InvalidName("".into())
        );

        assert_eq!(graph.pass_count(), 1);
        assert_eq!(graph.topology_version(), version);
    }

    #[test]
    fn test_add_edge() {
        let mut graph = RenderGraph::new("test", test_registry());
        graph.add_pass("src", "Source", PassConfig::new()).unwrap();
        graph.add_pass("blur", "Filter", PassConfig::new()).unwrap();

        let edge = graph.add_edge("src.color", "blur.src").unwrap();
        assert_eq!(graph.edges(), &[edge]);
        assert_eq!(graph.incoming_edge(edge.dst()), Some(&edge));
        assert_eq!(graph.edge_name(&edge), "src.color -> blur.src");
    }

    #[test]
    fn test_add_edge_resolution_errors() {
        let mut graph = RenderGraph::new("test", test_registry());
        graph.add_pass("src", "Source", PassConfig::new()).unwrap();
        graph.add_pass("blur", "Filter", PassConfig::new()).unwrap();
        let version = graph.topology_version();

        assert_eq!(
            graph.add_edge("nope.color", "blur.src").unwrap_err(),
            RenderGraphError::UnknownPass("nope".into())
        );
        assert_eq!(
            graph.add_edge("src.color", "later.src").unwrap_err(),
            RenderGraphError::UnknownPass("later".into())
        );
        assert_eq!(
            graph.add_edge("src.depth", "blur.src").unwrap_err(),
            RenderGraphError::UnknownPort {
                pass: "src".into(),
                port: "depth".into(),
                direction: PortDirection::Output,
            }
        );
        // an output port is not an input
        assert_eq!(
            graph.add_edge("src.color", "blur.dst").unwrap_err(),
            RenderGraphError::UnknownPort {
                pass: "blur".into(),
                port: "dst".into(),
                direction: PortDirection::Input,
            }
        );
        assert_eq!(
            graph.add_edge("srccolor", "blur.src").unwrap_err(),
            RenderGraphError::InvalidPortRef("srccolor".into())
        );
        assert_eq!(
            graph.add_edge("src.color", "blur.").unwrap_err(),
            RenderGraphError::InvalidPortRef("blur.".into())
        );

        assert!(graph.edges().is_empty());
        assert_eq!(graph.topology_version(), version);
    }

    #[test]
    fn test_port_already_bound() {
        let mut graph = RenderGraph::new("test", test_registry());
        graph.add_pass("a", "Source", PassConfig::new()).unwrap();
        graph.add_pass("b", "Source", PassConfig::new()).unwrap();
        graph.add_pass("blur", "Filter", PassConfig::new()).unwrap();

        let first = graph.add_edge("a.color", "blur.src").unwrap();
        let err = graph.add_edge("b.color", "blur.src").unwrap_err();

        assert_eq!(
            err,
            RenderGraphError::PortAlreadyBound { port: "blur.src".into(), bound_to: "a.color".into() }
        );
        assert_eq!(graph.edges(), &[first]);
    }

    #[test]
    fn test_type_mismatch() {
        let mut graph = RenderGraph::new("test", test_registry());
        graph.add_pass("src", "Source", PassConfig::new()).unwrap();
        graph.add_pass("present", "Present", PassConfig::new()).unwrap();
        graph.add_pass("counter", "Counter", PassConfig::new()).unwrap();
        graph.add_pass("blur", "Filter", PassConfig::new()).unwrap();
        graph.add_pass("inspect", "Inspect", PassConfig::new()).unwrap();

        let err = graph.add_edge("src.color", "present.src").unwrap_err();
        assert_eq!(
            err,
            RenderGraphError::TypeMismatch {
                src: "src.color".into(),
                src_type: TextureFormat::Rgba32Float.into(),
                dst: "present.src".into(),
                dst_type: TextureFormat::Rgba8Unorm.into(),
            }
        );
        assert!(matches!(
            graph.add_edge("counter.counts", "blur.src").unwrap_err(),
            RenderGraphError::TypeMismatch { .. }
        ));
        assert!(graph.edges().is_empty());

        // "any" connects to everything
        graph.add_edge("counter.counts", "inspect.any").unwrap();
        graph.add_edge("inspect.out", "blur.src").unwrap();
    }

    #[test]
    fn test_fan_out() {
        let mut graph = RenderGraph::new("test", test_registry());
        graph.add_pass("src", "Source", PassConfig::new()).unwrap();
        graph.add_pass("blur0", "Filter", PassConfig::new()).unwrap();
        graph.add_pass("blur1", "Filter", PassConfig::new()).unwrap();

        graph.add_edge("src.color", "blur0.src").unwrap();
        graph.add_edge("src.color", "blur1.src").unwrap();
        assert_eq!(graph.edges().len(), 2);
    }

    #[test]
    fn test_mark_output() {
        let mut graph = RenderGraph::new("test", test_registry());
        graph.add_pass("src", "Source", PassConfig::new()).unwrap();
        graph.add_pass("blur", "Filter", PassConfig::new()).unwrap();
        graph.add_edge("src.color", "blur.src").unwrap();

        let port = graph.mark_output("blur.dst").unwrap();
        // a marked port may still feed other passes
        graph.mark_output("src.color").unwrap();
        let version = graph.topology_version();
        graph.mark_output("blur.dst").unwrap();

        assert_eq!(graph.outputs().len(), 2);
        assert_eq!(graph.outputs()[0], port);
        assert_eq!(graph.topology_version(), version);

        assert_eq!(
            graph.mark_output("blur.src").unwrap_err(),
            RenderGraphError::UnknownPort {
                pass: "blur".into(),
                port: "src".into(),
                direction: PortDirection::Output,
            }
        );
        assert_eq!(
            graph.mark_output("ghost.dst").unwrap_err(),
            RenderGraphError::UnknownPass("ghost".into())
        );

        assert!(graph.unmark_output("src.color").unwrap());
        assert!(!graph.unmark_output("src.color").unwrap());
        assert_eq!(graph.outputs(), &[port]);
    }

    #[test]
    fn test_remove_pass() {
        let mut graph = RenderGraph::new("test", test_registry());
        graph.add_pass("src", "Source", PassConfig::new()).unwrap();
        let blur = graph.add_pass("blur", "Filter", PassConfig::new()).unwrap();
        graph.add_pass("blur2", "Filter", PassConfig::new()).unwrap();
        graph.add_edge("src.color", "blur.src").unwrap();
        graph.add_edge("blur.dst", "blur2.src").unwrap();
        graph.mark_output("src.color").unwrap();

        graph.remove_pass("src").unwrap();

        assert_eq!(graph.pass_count(), 2);
        assert!(graph.pass_by_name("src").is_none());
        assert_eq!(graph.edges().len(), 1);
        assert!(graph.outputs().is_empty());
        // other handles survive the removal
        assert_eq!(graph.pass(blur).unwrap().name(), "blur");
        assert_eq!(
            graph.remove_pass("src").unwrap_err(),
            RenderGraphError::UnknownPass("src".into())
        );

        // the name can be reused
        graph.add_pass("src", "Source", PassConfig::new()).unwrap();
        assert_eq!(
            graph.passes().map(|(_, node)| node.name()).collect::<Vec<_>>(),
            vec!["blur", "blur2", "src"]
        );
    }

    #[test]
    fn test_remove_edge() {
        let mut graph = RenderGraph::new("test", test_registry());
        graph.add_pass("src", "Source", PassConfig::new()).unwrap();
        graph.add_pass("blur", "Filter", PassConfig::new()).unwrap();
        graph.add_edge("src.color", "blur.src").unwrap();

        graph.remove_edge("src.color", "blur.src").unwrap();
        assert!(graph.edges().is_empty());
        assert_eq!(
            graph.remove_edge("src.color", "blur.src").unwrap_err(),
            RenderGraphError::UnknownEdge { src: "src.color".into(), dst: "blur.src".into() }
        );

        // the input is free again
        graph.add_edge("src.color", "blur.src").unwrap();
    }

    #[test]
    fn test_update_config_keeps_topology() {
        let mut graph = RenderGraph::new("test", test_registry());
        graph.add_pass("blur", "Filter", PassConfig::new()).unwrap();
        let version = graph.topology_version();

        graph.update_pass_config("blur", PassConfig::new().with("radius", 4)).unwrap();

        assert_eq!(graph.topology_version(), version);
        assert_eq!(graph.pass_by_name("blur").unwrap().config().get_f64("radius"), Some(4.0));
        assert_eq!(
            graph.update_pass_config("nope", PassConfig::new()).unwrap_err(),
            RenderGraphError::UnknownPass("nope".into())
        );
    }
}
