//! Port schemas and the registry of pass types.

use crate::error::{PortDirection, RenderGraphError};
use crate::node::RenderPass;
use crate::resource::{BufferLayout, Extent2D, FormatClass, ResourceType, SizeHint, TextureFormat};
use log::debug;
use prism_core::collections::HashMap;
use std::sync::Arc;

/// Texture format class pairs (producer, consumer) that may be connected even though
/// the formats differ. Identical formats are always compatible.
const COMPATIBLE_FORMAT_CLASSES: &[(FormatClass, FormatClass)] = &[
    (FormatClass::Float, FormatClass::Float),
    (FormatClass::Unorm, FormatClass::Unorm),
    (FormatClass::Unorm, FormatClass::Float),
    (FormatClass::Uint, FormatClass::Uint),
    (FormatClass::Depth, FormatClass::Depth),
    (FormatClass::Depth, FormatClass::Float),
];

/// Whether an output of type `producer` may feed an input of type `consumer`.
pub fn is_compatible(producer: ResourceType, consumer: ResourceType) -> bool {
    match (producer, consumer) {
        (ResourceType::Any, _) | (_, ResourceType::Any) => true,
        (ResourceType::Texture(src), ResourceType::Texture(dst)) => {
            src == dst || COMPATIBLE_FORMAT_CLASSES.contains(&(src.class(), dst.class()))
        }
        (ResourceType::Buffer(src), ResourceType::Buffer(dst)) => src == dst,
        _ => false,
    }
}

/// A single declared port of a pass type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortDesc {
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) ty: ResourceType,
    pub(crate) size: SizeHint,
    pub(crate) optional: bool,
    pub(crate) forwards: Option<String>,
}

impl PortDesc {
    pub fn new(name: &str, ty: impl Into<ResourceType>) -> Self {
        Self {
            name: name.to_owned(),
            description: String::new(),
            ty: ty.into(),
            size: SizeHint::Default,
            optional: false,
            forwards: None,
        }
    }

    #[inline]
    pub fn texture(name: &str, format: TextureFormat) -> Self {
        Self::new(name, ResourceType::Texture(format))
    }

    #[inline]
    pub fn buffer(name: &str, layout: BufferLayout, size: u64) -> Self {
        Self::new(name, ResourceType::Buffer(layout)).with_size(SizeHint::Bytes(size))
    }

    #[inline]
    pub fn any(name: &str) -> Self {
        Self::new(name, ResourceType::Any)
    }

    #[must_use]
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_owned();
        self
    }

    #[must_use]
    pub fn with_size(mut self, size: SizeHint) -> Self {
        self.size = size;
        self
    }

    #[must_use]
    pub fn with_extent(self, width: u32, height: u32) -> Self {
        self.with_size(SizeHint::Fixed(Extent2D::new(width, height)))
    }

    /// Unconnected optional inputs are bound to nothing instead of a placeholder.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Let this output publish the resource bound to `input` instead of its own.
    ///
    /// The forwarded input is kept alive for as long as this output is read.
    #[must_use]
    pub fn forwards(mut self, input: &str) -> Self {
        self.forwards = Some(input.to_owned());
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[inline]
    pub fn resource_type(&self) -> ResourceType {
        self.ty
    }

    #[inline]
    pub fn size(&self) -> SizeHint {
        self.size
    }

    #[inline]
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    #[inline]
    pub fn forwarded_input(&self) -> Option<&str> {
        self.forwards.as_deref()
    }
}

/// Ordered input and output ports of a pass type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortSchema {
    pub(crate) inputs: Vec<PortDesc>,
    pub(crate) outputs: Vec<PortDesc>,
}

impl PortSchema {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn input(mut self, port: PortDesc) -> Self {
        self.inputs.push(port);
        self
    }

    #[must_use]
    pub fn output(mut self, port: PortDesc) -> Self {
        self.outputs.push(port);
        self
    }

    #[inline]
    pub fn inputs(&self) -> &[PortDesc] {
        &self.inputs
    }

    #[inline]
    pub fn outputs(&self) -> &[PortDesc] {
        &self.outputs
    }

    pub fn find_input(&self, name: &str) -> Option<usize> {
        self.inputs.iter().position(|port| port.name == name)
    }

    pub fn find_output(&self, name: &str) -> Option<usize> {
        self.outputs.iter().position(|port| port.name == name)
    }

    fn first_duplicate(ports: &[PortDesc]) -> Option<&str> {
        ports.iter()
            .enumerate()
            .find(|(index, port)| ports[..*index].iter().any(|prev| prev.name == port.name))
            .map(|(_, port)| port.name.as_str())
    }
}

pub type PassFactory = Arc<dyn Fn() -> Box<dyn RenderPass> + Send + Sync>;

pub(crate) struct PassTypeEntry {
    pub(crate) schema: Arc<PortSchema>,
    pub(crate) factory: PassFactory,
}

/// Append-only table of known pass types.
#[derive(Default)]
pub struct PassRegistry {
    types: HashMap<String, PassTypeEntry>,
}

impl PassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pass type with its port schema and a factory creating one pass instance per graph node.
    pub fn register<F, P>(&mut self, pass_type: &str, schema: PortSchema, factory: F) -> Result<(), RenderGraphError>
    where
        F: Fn() -> P + Send + Sync + 'static,
        P: RenderPass,
    {
        if self.types.contains_key(pass_type) {
            return Err(RenderGraphError::DuplicatePassType(pass_type.to_owned()));
        }

        for ports in [&schema.inputs, &schema.outputs] {
            if let Some(port) = PortSchema::first_duplicate(ports) {
                return Err(RenderGraphError::DuplicatePortName {
                    pass_type: pass_type.to_owned(),
                    port: port.to_owned(),
                });
            }
        }

        for output in &schema.outputs {
            let Some(input) = output.forwarded_input() else {
                continue;
            };

            let Some(index) = schema.find_input(input) else {
                return Err(RenderGraphError::UnknownPort {
                    pass: pass_type.to_owned(),
                    port: input.to_owned(),
                    direction: PortDirection::Input,
                });
            };

            let input_type = schema.inputs[index].ty;
            if !is_compatible(input_type, output.ty) {
                return Err(RenderGraphError::TypeMismatch {
                    src: format!("{pass_type}.{input}"),
                    src_type: input_type,
                    dst: format!("{pass_type}.{}", output.name),
                    dst_type: output.ty,
                });
            }
        }

        debug!(
            "Registered pass type {pass_type} ({} inputs, {} outputs)",
            schema.inputs.len(),
            schema.outputs.len()
        );

        self.types.insert(
            pass_type.to_owned(),
            PassTypeEntry {
                schema: Arc::new(schema),
                factory: Arc::new(move || Box::new(factory()) as Box<dyn RenderPass>),
            },
        );

        Ok(())
    }

    /// Look up the declared ports of a pass type.
    pub fn schema(&self, pass_type: &str) -> Result<&PortSchema, RenderGraphError> {
        self.entry(pass_type).map(|entry| entry.schema.as_ref())
    }

    pub(crate) fn entry(&self, pass_type: &str) -> Result<&PassTypeEntry, RenderGraphError> {
        self.types
            .get(pass_type)
            .ok_or_else(|| RenderGraphError::UnknownPassType(pass_type.to_owned()))
    }

    #[inline]
    pub fn contains(&self, pass_type: &str) -> bool {
        self.types.contains_key(pass_type)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::PassContext;

    fn noop(_ctx: &mut PassContext) -> anyhow::Result<()> {
        Ok(())
    }

    fn blur_schema() -> PortSchema {
        PortSchema::new()
            .input(PortDesc::texture("src", TextureFormat::Rgba32Float))
            .output(PortDesc::texture("dst", TextureFormat::Rgba32Float))
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = PassRegistry::new();
        registry.register("Blur", blur_schema(), || noop).unwrap();

        let schema = registry.schema("Blur").unwrap();
        assert_eq!(schema.inputs().len(), 1);
        assert_eq!(schema.outputs()[0].name(), "dst");
        assert_eq!(schema.find_input("src"), Some(0));
        assert_eq!(schema.find_output("src"), None);
    }

    #[test]
    fn test_unknown_pass_type() {
        let registry = PassRegistry::new();
        assert_eq!(
            registry.schema("Missing").unwrap_err(),
            RenderGraphError::UnknownPassType("Missing".into())
        );
    }

    #[test]
    fn test_duplicate_pass_type() {
        let mut registry = PassRegistry::new();
        registry.register("Blur", blur_schema(), || noop).unwrap();

        let err = registry.register("Blur", PortSchema::new(), || noop).unwrap_err();
        assert_eq!(err, RenderGraphError::DuplicatePassType("Blur".into()));
        // the first registration is untouched
        assert_eq!(registry.schema("Blur").unwrap(), &blur_schema());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_port_name() {
        let mut registry = PassRegistry::new();
        let schema = PortSchema::new()
            .output(PortDesc::texture("color", TextureFormat::Rgba8Unorm))
            .output(PortDesc::texture("color", TextureFormat::Rgba32Float));

        let err = registry.register("Broken", schema, || noop).unwrap_err();
        assert_eq!(
            err,
            RenderGraphError::DuplicatePortName { pass_type: "Broken".into(), port: "color".into() }
        );
        assert!(!registry.contains("Broken"));

        // same name in different directions is fine
        let schema = PortSchema::new()
            .input(PortDesc::texture("color", TextureFormat::Rgba8Unorm))
            .output(PortDesc::texture("color", TextureFormat::Rgba8Unorm));
        registry.register("InPlace", schema, || noop).unwrap();
    }

    #[test]
    fn test_forwarded_input_must_exist() {
        let mut registry = PassRegistry::new();

        let schema = PortSchema::new()
            .input(PortDesc::texture("src", TextureFormat::Rgba32Float))
            .output(PortDesc::texture("dst", TextureFormat::Rgba32Float).forwards("source"));
        assert_eq!(
            registry.register("Typo", schema, || noop).unwrap_err(),
            RenderGraphError::UnknownPort {
                pass: "Typo".into(),
                port: "source".into(),
                direction: PortDirection::Input,
            }
        );

        let schema = PortSchema::new()
            .input(PortDesc::texture("src", TextureFormat::R32Uint))
            .output(PortDesc::texture("dst", TextureFormat::Rgba32Float).forwards("src"));
        assert!(matches!(
            registry.register("Widen", schema, || noop),
            Err(RenderGraphError::TypeMismatch { .. })
        ));

        let schema = PortSchema::new()
            .input(PortDesc::texture("src", TextureFormat::Rgba32Float))
            .output(PortDesc::texture("dst", TextureFormat::Rgba32Float).forwards("src"));
        registry.register("Bypass", schema, || noop).unwrap();
        assert_eq!(registry.schema("Bypass").unwrap().outputs()[0].forwarded_input(), Some("src"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_compatibility_table() {
        use TextureFormat::*;
        let tex = ResourceType::Texture;

        assert!(is_compatible(tex(Rgba32Float), tex(Rgba32Float)));
        assert!(is_compatible(tex(Rgba16Float), tex(Rgba32Float)));
        assert!(is_compatible(tex(Rgba8Unorm), tex(Rgba32Float)));
        assert!(!is_compatible(tex(Rgba32Float), tex(Rgba8Unorm)));
        assert!(is_compatible(tex(D32Float), tex(R32Float)));
        assert!(!is_compatible(tex(R32Float), tex(D32Float)));
        assert!(!is_compatible(tex(Rgba32Uint), tex(Rgba32Float)));
        assert!(is_compatible(tex(R32Uint), tex(Rgba32Uint)));

        let structured = ResourceType::Buffer(BufferLayout::Structured { stride: 16 });
        assert!(is_compatible(structured, structured));
        assert!(!is_compatible(structured, ResourceType::Buffer(BufferLayout::Structured { stride: 32 })));
        assert!(!is_compatible(structured, tex(Rgba32Float)));

        assert!(is_compatible(ResourceType::Any, structured));
        assert!(is_compatible(tex(Rgba32Uint), ResourceType::Any));
    }
}
