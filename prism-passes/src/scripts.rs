//! Render graph scripts translated to builder calls.

use crate::post_fx::SimplePostFX;
use crate::surfel::{SurfelGBuffer, SurfelGI, SurfelGIRenderPass};
use crate::tone_mapper::ToneMapper;
use prism_rendergraph::{PassConfig, PassRegistry, RenderGraph, RenderGraphError};
use std::sync::Arc;

pub const DEFAULT_RENDER_GRAPH: &str = "DefaultRenderGraph";

pub fn default_tone_mapper_config() -> PassConfig {
    PassConfig::new()
        .with("outputSize", "Default")
        .with("useSceneMetadata", true)
        .with("exposureCompensation", 0.0)
        .with("autoExposure", false)
        .with("filmSpeed", 100.0)
        .with("whiteBalance", false)
        .with("whitePoint", 6500.0)
        .with("operator", "HableUc2")
        .with("clamp", true)
        .with("whiteMaxLuminance", 1.0)
        .with("whiteScale", 11.199999809265137)
        .with("fNumber", 1.0)
        .with("shutter", 1.0)
        .with("exposureMode", "AperturePriority")
}

/// Surfel GI: G-buffer, surfel accumulation, GI composition, post effects and tone mapping,
/// presenting `ToneMapper.dst`.
pub fn default_render_graph(registry: Arc<PassRegistry>) -> Result<RenderGraph, RenderGraphError> {
    let mut graph = RenderGraph::new(DEFAULT_RENDER_GRAPH, registry);

    graph.add_pass("ToneMapper", ToneMapper::PASS_TYPE, default_tone_mapper_config())?;
    graph.add_pass("SurfelGI", SurfelGI::PASS_TYPE, PassConfig::new())?;
    graph.add_pass("SurfelGBuffer", SurfelGBuffer::PASS_TYPE, PassConfig::new())?;
    graph.add_pass("SurfelGIRenderPass", SurfelGIRenderPass::PASS_TYPE, PassConfig::new())?;
    graph.add_pass("SimplePostFX", SimplePostFX::PASS_TYPE, PassConfig::new())?;

    graph.add_edge("SurfelGBuffer.packedHitInfo", "SurfelGI.packedHitInfo")?;
    graph.add_edge("SurfelGBuffer.packedHitInfo", "SurfelGIRenderPass.packedHitInfo")?;
    graph.add_edge("SurfelGI.output", "SurfelGIRenderPass.indirectLighting")?;
    graph.add_edge("SurfelGIRenderPass.output", "SimplePostFX.src")?;
    graph.add_edge("SimplePostFX.dst", "ToneMapper.src")?;
    graph.mark_output("ToneMapper.dst")?;

    Ok(graph)
}
