use log::{trace, warn};
use prism_rendergraph::{PassConfig, PassContext, PortDesc, PortSchema, RenderPass, TextureFormat};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ToneMapOperator {
    Linear,
    Reinhard,
    ReinhardModified,
    HejiHableAlu,
    HableUc2,
    Aces,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ExposureMode {
    AperturePriority,
    ShutterPriority,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum OutputSize {
    Default,
    Fixed,
    Full,
    Half,
    Quarter,
    Double,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToneMapperConfig {
    pub output_size: OutputSize,
    pub use_scene_metadata: bool,
    pub exposure_compensation: f32,
    pub auto_exposure: bool,
    pub film_speed: f32,
    pub white_balance: bool,
    pub white_point: f32,
    pub operator: ToneMapOperator,
    pub clamp: bool,
    pub white_max_luminance: f32,
    pub white_scale: f32,
    pub f_number: f32,
    pub shutter: f32,
    pub exposure_mode: ExposureMode,
}

impl Default for ToneMapperConfig {
    fn default() -> Self {
        Self {
            output_size: OutputSize::Default,
            use_scene_metadata: true,
            exposure_compensation: 0.0,
            auto_exposure: false,
            film_speed: 100.0,
            white_balance: false,
            white_point: 6500.0,
            operator: ToneMapOperator::Aces,
            clamp: true,
            white_max_luminance: 1.0,
            white_scale: 11.2,
            f_number: 1.0,
            shutter: 1.0,
            exposure_mode: ExposureMode::AperturePriority,
        }
    }
}

impl ToneMapperConfig {
    /// Linear scale applied before the operator, from the photographic exposure and the compensation in EV.
    pub fn exposure_scale(&self) -> f32 {
        let ev100 = (self.f_number * self.f_number / self.shutter * 100.0 / self.film_speed).log2();
        self.exposure_compensation.exp2() / (1.2 * ev100.exp2())
    }
}

#[derive(Default)]
pub struct ToneMapper {
    config: ToneMapperConfig,
}

impl ToneMapper {
    pub const PASS_TYPE: &'static str = "ToneMapper";

    pub fn schema() -> PortSchema {
        PortSchema::new()
            .input(PortDesc::texture("src", TextureFormat::Rgba32Float).with_description("Source texture"))
            .output(PortDesc::texture("dst", TextureFormat::Rgba32Float).with_description("Tone-mapped output texture"))
    }

    #[inline]
    pub fn config(&self) -> &ToneMapperConfig {
        &self.config
    }
}

impl RenderPass for ToneMapper {
    #[profiling::function]
    fn execute(&mut self, ctx: &mut PassContext<'_>) -> anyhow::Result<()> {
        let src = ctx.require_input("src")?;

        trace!(
            "{}: {:?} on {src}, exposure scale {:.3}{}",
            ctx.name(),
            self.config.operator,
            self.config.exposure_scale(),
            if self.config.auto_exposure { " (auto)" } else { "" }
        );
        Ok(())
    }

    fn on_config_changed(&mut self, config: &PassConfig) {
        match config.parse() {
            Ok(config) => self.config = config,
            Err(err) => warn!("Ignoring invalid ToneMapper config: {err}"),
        }
    }
}
