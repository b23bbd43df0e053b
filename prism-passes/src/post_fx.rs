use log::{trace, warn};
use prism_rendergraph::{PassConfig, PassContext, PortDesc, PortSchema, RenderPass, TextureFormat};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SimplePostFxConfig {
    pub enabled: bool,
    pub bloom_amount: f32,
    pub vignette_amount: f32,
    pub chromatic_aberration_amount: f32,
}

impl Default for SimplePostFxConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bloom_amount: 0.0,
            vignette_amount: 0.0,
            chromatic_aberration_amount: 0.0,
        }
    }
}

/// Bloom, vignette and chromatic aberration. Forwards its source untouched while disabled.
#[derive(Default)]
pub struct SimplePostFX {
    config: SimplePostFxConfig,
}

impl SimplePostFX {
    pub const PASS_TYPE: &'static str = "SimplePostFX";

    pub fn schema() -> PortSchema {
        PortSchema::new()
            .input(PortDesc::texture("src", TextureFormat::Rgba32Float).with_description("Source texture"))
            .output(
                PortDesc::texture("dst", TextureFormat::Rgba32Float)
                    .with_description("post-effected output texture")
                    .forwards("src"),
            )
    }

    #[inline]
    pub fn config(&self) -> &SimplePostFxConfig {
        &self.config
    }
}

impl RenderPass for SimplePostFX {
    #[profiling::function]
    fn execute(&mut self, ctx: &mut PassContext<'_>) -> anyhow::Result<()> {
        let src = ctx.require_input("src")?;

        if !self.config.enabled {
            trace!("{}: disabled, forwarding {src}", ctx.name());
            return ctx.set_output("dst", src);
        }

        trace!(
            "{}: bloom {} vignette {} chromatic aberration {}",
            ctx.name(),
            self.config.bloom_amount,
            self.config.vignette_amount,
            self.config.chromatic_aberration_amount
        );
        Ok(())
    }

    fn on_config_changed(&mut self, config: &PassConfig) {
        match config.parse() {
            Ok(config) => self.config = config,
            Err(err) => warn!("Ignoring invalid SimplePostFX config: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config() {
        let mut pass = SimplePostFX::default();
        assert!(pass.config().enabled);

        pass.on_config_changed(&PassConfig::new().with("enabled", false).with("bloomAmount", 0.25));
        assert!(!pass.config().enabled);
        assert_eq!(pass.config().bloom_amount, 0.25);

        // a malformed config keeps the previous one
        pass.on_config_changed(&PassConfig::new().with("enabled", "yes"));
        assert!(!pass.config().enabled);
    }
}
