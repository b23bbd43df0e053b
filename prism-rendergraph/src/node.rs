use crate::resource::ResourceHandle;
use crate::schema::{PortDesc, PortSchema};
use anyhow::{anyhow, bail};
use prism_core::collections::SmallVec;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Opaque per-pass configuration blob, a JSON object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassConfig(Map<String, Value>);

impl PassConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a JSON value. `null` yields an empty config, anything but an object is rejected.
    pub fn from_json(value: Value) -> anyhow::Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::default()),
            other => bail!("pass config must be a JSON object, got {other}"),
        }
    }

    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_owned(), value.into());
    }

    #[inline]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Deserialize the whole blob into a typed view.
    pub fn parse<T: DeserializeOwned>(&self) -> anyhow::Result<T> {
        Ok(serde_json::from_value(Value::Object(self.0.clone()))?)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for PassConfig {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// The capability every pass type implements.
pub trait RenderPass: 'static {
    /// Record the pass's work for one frame. Inputs and outputs are already bound in `ctx`.
    fn execute(&mut self, ctx: &mut PassContext<'_>) -> anyhow::Result<()>;

    /// Called with the initial configuration once the pass joins a graph, and after every replacement.
    fn on_config_changed(&mut self, _config: &PassConfig) {}
}

impl<F> RenderPass for F
where
    F: FnMut(&mut PassContext<'_>) -> anyhow::Result<()> + 'static,
{
    fn execute(&mut self, ctx: &mut PassContext<'_>) -> anyhow::Result<()> {
        self(ctx)
    }
}

/// Everything a pass sees while it executes.
pub struct PassContext<'node> {
    pub(crate) name: &'node str,
    pub(crate) pass_type: &'node str,
    pub(crate) config: &'node PassConfig,
    pub(crate) schema: &'node PortSchema,
    pub(crate) frame_index: u64,
    pub(crate) inputs: SmallVec<[Option<ResourceHandle>; 8]>,
    pub(crate) outputs: SmallVec<[ResourceHandle; 8]>,
}

impl<'node> PassContext<'node> {
    #[inline]
    pub fn name(&self) -> &str {
        self.name
    }

    #[inline]
    pub fn pass_type(&self) -> &str {
        self.pass_type
    }

    #[inline]
    pub fn config(&self) -> &PassConfig {
        self.config
    }

    #[inline]
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Resource bound to an input port, `None` for unknown ports and unconnected optional inputs.
    pub fn input(&self, port: &str) -> Option<ResourceHandle> {
        self.schema.find_input(port).and_then(|index| self.inputs[index])
    }

    pub fn require_input(&self, port: &str) -> anyhow::Result<ResourceHandle> {
        self.input(port)
            .ok_or_else(|| anyhow!("input '{port}' of pass '{}' is not bound", self.name))
    }

    pub fn output(&self, port: &str) -> Option<ResourceHandle> {
        self.schema.find_output(port).map(|index| self.outputs[index])
    }

    /// Publish the input an output port forwards (see [`PortDesc::forwards`]) in place of the
    /// output's own resource. Downstream passes of this frame read it instead.
    pub fn set_output(&mut self, port: &str, resource: ResourceHandle) -> anyhow::Result<()> {
        let index = self.schema
            .find_output(port)
            .ok_or_else(|| anyhow!("pass '{}' has no output named '{port}'", self.name))?;

        let forwarded = self.schema.outputs[index]
            .forwarded_input()
            .and_then(|input| self.input(input));
        if resource != self.outputs[index] && Some(resource) != forwarded {
            bail!(
                "output '{port}' of pass '{}' can only publish its own resource or its forwarded input",
                self.name
            );
        }

        self.outputs[index] = resource;
        Ok(())
    }

    pub fn inputs(&self) -> impl Iterator<Item = (&PortDesc, Option<ResourceHandle>)> + '_ {
        self.schema.inputs.iter().zip(self.inputs.iter().copied())
    }

    pub fn outputs(&self) -> impl Iterator<Item = (&PortDesc, ResourceHandle)> + '_ {
        self.schema.outputs.iter().zip(self.outputs.iter().copied())
    }
}

pub struct PassNode {
    pub(crate) name: String,
    pub(crate) pass_type: String,
    pub(crate) schema: Arc<PortSchema>,
    pub(crate) config: PassConfig,
    pub(crate) pass: Box<dyn RenderPass>,
}

impl PassNode {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn pass_type(&self) -> &str {
        &self.pass_type
    }

    #[inline]
    pub fn schema(&self) -> &PortSchema {
        &self.schema
    }

    #[inline]
    pub fn config(&self) -> &PassConfig {
        &self.config
    }
}

impl std::fmt::Debug for PassNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PassNode")
            .field("name", &self.name)
            .field("pass_type", &self.pass_type)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
