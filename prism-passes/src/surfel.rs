//! Headless surfel GI passes: G-buffer, surfel accumulation and final GI composition.

use log::trace;
use prism_rendergraph::{PassConfig, PassContext, PortDesc, PortSchema, RenderPass, TextureFormat};

pub struct SurfelGBuffer;

impl SurfelGBuffer {
    pub const PASS_TYPE: &'static str = "SurfelGBuffer";

    pub fn schema() -> PortSchema {
        PortSchema::new()
            .output(PortDesc::texture("depth", TextureFormat::D32Float).with_description("depth buffer"))
            .output(PortDesc::texture("normal", TextureFormat::Rgba32Float).with_description("Normal"))
            .output(PortDesc::texture("instanceID", TextureFormat::R32Uint).with_description("Instance ID"))
            .output(
                PortDesc::texture("instanceIDVisual", TextureFormat::Rgba32Float)
                    .with_description("Instance ID Visualization"),
            )
            .output(PortDesc::texture("packedHitInfo", TextureFormat::Rgba32Uint).with_description("Packed Hit Info"))
    }
}

impl RenderPass for SurfelGBuffer {
    #[profiling::function]
    fn execute(&mut self, ctx: &mut PassContext<'_>) -> anyhow::Result<()> {
        for (port, handle) in ctx.outputs() {
            trace!("{}: clear {} ({handle})", ctx.name(), port.name());
        }
        Ok(())
    }
}

/// Accumulates indirect lighting over frames, restarting whenever it is reconfigured.
#[derive(Default)]
pub struct SurfelGI {
    accumulated_frames: u64,
}

impl SurfelGI {
    pub const PASS_TYPE: &'static str = "SurfelGI";

    pub fn schema() -> PortSchema {
        PortSchema::new()
            .input(
                PortDesc::texture("depth", TextureFormat::D32Float)
                    .with_description("depth texture")
                    .optional(),
            )
            .input(
                PortDesc::texture("normal", TextureFormat::Rgba32Float)
                    .with_description("normal texture")
                    .optional(),
            )
            .input(PortDesc::texture("packedHitInfo", TextureFormat::Rgba32Uint).with_description("packed hit info texture"))
            .input(
                PortDesc::texture("directLighting", TextureFormat::Rgba32Float)
                    .with_description("direct lighting texture")
                    .optional(),
            )
            .output(PortDesc::texture("output", TextureFormat::Rgba32Float).with_description("output texture"))
    }

    #[inline]
    pub fn accumulated_frames(&self) -> u64 {
        self.accumulated_frames
    }
}

impl RenderPass for SurfelGI {
    #[profiling::function]
    fn execute(&mut self, ctx: &mut PassContext<'_>) -> anyhow::Result<()> {
        let hit_info = ctx.require_input("packedHitInfo")?;
        self.accumulated_frames += 1;

        trace!(
            "{}: accumulate from {hit_info}, {} frames so far",
            ctx.name(),
            self.accumulated_frames
        );
        Ok(())
    }

    fn on_config_changed(&mut self, _config: &PassConfig) {
        self.accumulated_frames = 0;
    }
}

pub struct SurfelGIRenderPass;

impl SurfelGIRenderPass {
    pub const PASS_TYPE: &'static str = "SurfelGIRenderPass";

    pub fn schema() -> PortSchema {
        PortSchema::new()
            .input(PortDesc::texture("packedHitInfo", TextureFormat::Rgba32Uint).with_description("hit info texture"))
            .input(
                PortDesc::texture("indirectLighting", TextureFormat::Rgba32Float)
                    .with_description("diffuse indirect lighting texture"),
            )
            .input(
                PortDesc::texture("reflectionHitInfo", TextureFormat::Rgba32Uint)
                    .with_description("reflection hit info texture")
                    .optional(),
            )
            .input(
                PortDesc::texture("reflectionDirection", TextureFormat::Rgba32Float)
                    .with_description("reflection direction texture")
                    .optional(),
            )
            .output(PortDesc::texture("output", TextureFormat::Rgba32Float).with_description("final result"))
            .output(PortDesc::texture("diffuseLighting", TextureFormat::Rgba32Float).with_description("diffuse lighting"))
            .output(
                PortDesc::texture("reflectionLighting", TextureFormat::Rgba32Float)
                    .with_description("reflection lighting"),
            )
    }
}

impl RenderPass for SurfelGIRenderPass {
    #[profiling::function]
    fn execute(&mut self, ctx: &mut PassContext<'_>) -> anyhow::Result<()> {
        let hit_info = ctx.require_input("packedHitInfo")?;
        let indirect = ctx.require_input("indirectLighting")?;

        // reflections are skipped without their inputs
        let reflections = ctx.input("reflectionHitInfo").is_some() && ctx.input("reflectionDirection").is_some();

        trace!(
            "{}: compose {hit_info} + {indirect}, reflections {}",
            ctx.name(),
            if reflections { "on" } else { "off" }
        );
        Ok(())
    }
}
