//! Virtual resources for the render graph

use std::fmt;

use crate::backend::types::*;
use crate::backend::DeviceResource;

/// Handle to a versioned resource node in a [`FrameGraph`](super::FrameGraph).
///
/// `index` points into the graph's node table and `version` counts the writes
/// the underlying resource went through. Every write yields a new node, so a
/// handle taken before a write keeps naming the pre-write version.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceHandle {
    index: u32,
    version: u32,
}

impl ResourceHandle {
    /// Placeholder that no graph ever hands out
    pub const INVALID: Self = Self {
        index: u32::MAX,
        version: u32::MAX,
    };

    pub(crate) fn new(index: usize, version: u32) -> Self {
        Self {
            index: u32::try_from(index).expect("FrameGraph node table exceeds u32 indices"),
            version,
        }
    }

    /// Index into the node table
    pub fn index(&self) -> usize {
        self.index as usize
    }

    pub fn version(&self) -> u32 {
        self.version
    }
}

/// Pass data structs can derive `Default` and fill their handles in setup.
impl Default for ResourceHandle {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Resource({}.v{})", self.index, self.version)
    }
}

/// Shape of a virtual resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceDescriptor {
    Texture(TextureDescriptor),
    Buffer(BufferDescriptor),
}

impl ResourceDescriptor {
    pub fn as_texture(&self) -> Option<&TextureDescriptor> {
        match self {
            ResourceDescriptor::Texture(desc) => Some(desc),
            ResourceDescriptor::Buffer(_) => None,
        }
    }

    pub fn as_buffer(&self) -> Option<&BufferDescriptor> {
        match self {
            ResourceDescriptor::Buffer(desc) => Some(desc),
            ResourceDescriptor::Texture(_) => None,
        }
    }

    pub fn is_texture(&self) -> bool {
        matches!(self, ResourceDescriptor::Texture(_))
    }

    /// Approximate device memory taken by a resource of this shape
    pub fn size_in_bytes(&self) -> u64 {
        match self {
            ResourceDescriptor::Texture(desc) => desc.size_in_bytes(),
            ResourceDescriptor::Buffer(desc) => desc.size,
        }
    }

    /// Whether `resource` is the kind of device object this descriptor describes
    pub(crate) fn matches(&self, resource: &DeviceResource) -> bool {
        matches!(
            (self, resource),
            (ResourceDescriptor::Texture(_), DeviceResource::Texture(_))
                | (ResourceDescriptor::Buffer(_), DeviceResource::Buffer(_))
        )
    }
}

impl From<TextureDescriptor> for ResourceDescriptor {
    fn from(desc: TextureDescriptor) -> Self {
        ResourceDescriptor::Texture(desc)
    }
}

impl From<BufferDescriptor> for ResourceDescriptor {
    fn from(desc: BufferDescriptor) -> Self {
        ResourceDescriptor::Buffer(desc)
    }
}

impl fmt::Display for ResourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceDescriptor::Texture(desc) => {
                write!(f, "{}x{}", desc.extent.width, desc.extent.height)?;
                if desc.extent.depth > 1 {
                    write!(f, "x{}", desc.extent.depth)?;
                }
                write!(f, " {:?}", desc.format)?;
                if desc.mip_levels > 1 {
                    write!(f, " mips={}", desc.mip_levels)?;
                }
                if desc.layers > 1 {
                    write!(f, " layers={}", desc.layers)?;
                }
                Ok(())
            }
            ResourceDescriptor::Buffer(desc) => write!(f, "{} bytes", desc.size),
        }
    }
}

/// One version of a resource.
#[derive(Debug, Clone)]
pub(crate) struct ResourceNode {
    /// Index of the underlying [`ResourceEntry`]
    pub entry: usize,
    pub version: u32,
    /// Pass that produced this version, `None` for imported resources
    /// registered outside of any pass
    pub producer: Option<usize>,
}

/// A virtual resource shared by all of its versions.
#[derive(Debug, Clone)]
pub(crate) struct ResourceEntry {
    pub name: String,
    pub desc: ResourceDescriptor,
    /// Pass that created or imported the resource
    pub creator: Option<usize>,
    /// Caller-owned device object for imported resources
    pub imported: Option<DeviceResource>,
    /// Latest version handed out
    pub latest_version: u32,
    /// Device object bound while the resource is inside its lifetime window
    pub physical: Option<DeviceResource>,
}

impl ResourceEntry {
    pub fn is_imported(&self) -> bool {
        self.imported.is_some()
    }
}
