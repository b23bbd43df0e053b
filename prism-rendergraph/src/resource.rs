use derive_more::{Display, From};

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
#[display("{width}x{height}")]
pub struct Extent2D {
    pub width: u32,
    pub height: u32,
}

impl Extent2D {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgba32Float,
    Rgba16Float,
    Rgba8Unorm,
    Rgba32Uint,
    R32Uint,
    R32Float,
    D32Float,
}

/// Coarse grouping of texture formats used by the port compatibility table.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatClass {
    Float,
    Unorm,
    Uint,
    Depth,
}

impl TextureFormat {
    pub fn class(self) -> FormatClass {
        match self {
            TextureFormat::Rgba32Float | TextureFormat::Rgba16Float | TextureFormat::R32Float => FormatClass::Float,
            TextureFormat::Rgba8Unorm => FormatClass::Unorm,
            TextureFormat::Rgba32Uint | TextureFormat::R32Uint => FormatClass::Uint,
            TextureFormat::D32Float => FormatClass::Depth,
        }
    }
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferLayout {
    Raw,
    #[display("Structured({stride})")]
    Structured { stride: u32 },
    Indirect,
}

/// Semantic type carried by a port.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, From)]
pub enum ResourceType {
    #[display("Texture({_0})")]
    Texture(TextureFormat),
    #[display("Buffer({_0})")]
    Buffer(BufferLayout),
    #[from(ignore)]
    Any,
}

impl ResourceType {
    pub fn is_any(&self) -> bool {
        matches!(self, ResourceType::Any)
    }
}

/// How big the resource behind a port should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SizeHint {
    /// Follow the compile configuration's default extent or buffer size.
    #[default]
    Default,
    Fixed(Extent2D),
    Bytes(u64),
}

/// Concrete description of a backing resource. Doubles as the pool key.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceDesc {
    #[display("texture {format} {extent}")]
    Texture { format: TextureFormat, extent: Extent2D },
    #[display("buffer {layout} {size}B")]
    Buffer { layout: BufferLayout, size: u64 },
}

/// Opaque handle to a backing resource owned by the resource backend.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[display("Resource#{_0}")]
pub struct ResourceHandle(pub(crate) u64);

impl ResourceHandle {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Closed interval of execution-order indices during which a resource is alive.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
#[display("[{first}, {last}]")]
pub struct Lifetime {
    pub first: usize,
    pub last: usize,
}

impl Lifetime {
    pub(crate) fn at(index: usize) -> Self {
        Self { first: index, last: index }
    }

    pub(crate) fn extend_to(&mut self, index: usize) {
        self.first = self.first.min(index);
        self.last = self.last.max(index);
    }

    pub fn overlaps(&self, other: &Lifetime) -> bool {
        self.first <= other.last && other.first <= self.last
    }

    pub fn contains(&self, index: usize) -> bool {
        self.first <= index && index <= self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifetime_overlap() {
        let a = Lifetime { first: 0, last: 2 };
        let b = Lifetime { first: 2, last: 4 };
        let c = Lifetime { first: 3, last: 3 };

        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c));
        assert!(b.overlaps(&c));
        assert!(b.contains(3));
        assert!(!a.contains(3));
    }

    #[test]
    fn test_display() {
        assert_eq!(Extent2D::new(1920, 1080).to_string(), "1920x1080");
        assert_eq!(ResourceType::Texture(TextureFormat::Rgba32Float).to_string(), "Texture(Rgba32Float)");
        assert_eq!(
            ResourceType::Buffer(BufferLayout::Structured { stride: 16 }).to_string(),
            "Buffer(Structured(16))"
        );
        assert_eq!(ResourceType::Any.to_string(), "Any");
        assert_eq!(ResourceHandle::from_raw(7).to_string(), "Resource#7");
    }

    #[test]
    fn test_format_class() {
        assert_eq!(TextureFormat::Rgba16Float.class(), FormatClass::Float);
        assert_eq!(TextureFormat::R32Uint.class(), FormatClass::Uint);
        assert_eq!(TextureFormat::D32Float.class(), FormatClass::Depth);
    }
}
