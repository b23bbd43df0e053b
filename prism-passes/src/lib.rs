//! Headless implementations of the surfel GI pass types and the graphs built from them.

mod post_fx;
mod surfel;
mod tone_mapper;
pub mod scripts;

pub use post_fx::{SimplePostFX, SimplePostFxConfig};
pub use surfel::{SurfelGBuffer, SurfelGI, SurfelGIRenderPass};
pub use tone_mapper::{ExposureMode, OutputSize, ToneMapOperator, ToneMapper, ToneMapperConfig};

use prism_rendergraph::{PassRegistry, RenderGraphError};

pub fn register_builtin_passes(registry: &mut PassRegistry) -> Result<(), RenderGraphError> {
    registry.register(SurfelGBuffer::PASS_TYPE, SurfelGBuffer::schema(), || SurfelGBuffer)?;
    registry.register(SurfelGI::PASS_TYPE, SurfelGI::schema(), SurfelGI::default)?;
    registry.register(SurfelGIRenderPass::PASS_TYPE, SurfelGIRenderPass::schema(), || SurfelGIRenderPass)?;
    registry.register(SimplePostFX::PASS_TYPE, SimplePostFX::schema(), SimplePostFX::default)?;
    registry.register(ToneMapper::PASS_TYPE, ToneMapper::schema(), ToneMapper::default)?;
    Ok(())
}
