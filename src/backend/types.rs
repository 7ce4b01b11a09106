//! Common types shared between the frame graph and device implementations

use bitflags::bitflags;

/// Texture format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureFormat {
    R8Unorm,
    #[default]
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Bgra8Unorm,
    Bgra8UnormSrgb,
    Rgb8Unorm,
    Rgb16Float,
    Rgba16Float,
    Rgba32Float,
    R32Float,
    Rg16Float,
    Rg32Float,
    Depth24Plus,
    Depth32Float,
    Depth24PlusStencil8,
}

impl TextureFormat {
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            TextureFormat::R8Unorm => 1,
            TextureFormat::Rgb8Unorm => 3,
            TextureFormat::Rgba8Unorm
            | TextureFormat::Rgba8UnormSrgb
            | TextureFormat::Bgra8Unorm
            | TextureFormat::Bgra8UnormSrgb
            | TextureFormat::R32Float
            | TextureFormat::Rg16Float
            | TextureFormat::Depth24Plus
            | TextureFormat::Depth32Float
            | TextureFormat::Depth24PlusStencil8 => 4,
            TextureFormat::Rgb16Float => 6,
            TextureFormat::Rgba16Float | TextureFormat::Rg32Float => 8,
            TextureFormat::Rgba32Float => 16,
        }
    }
}

bitflags! {
    /// Texture usage flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        const COPY_SRC = 1 << 0;
        const COPY_DST = 1 << 1;
        const TEXTURE_BINDING = 1 << 2;
        const STORAGE_BINDING = 1 << 3;
        const RENDER_ATTACHMENT = 1 << 4;
    }
}

bitflags! {
    /// Buffer usage flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        const MAP_READ = 1 << 0;
        const MAP_WRITE = 1 << 1;
        const COPY_SRC = 1 << 2;
        const COPY_DST = 1 << 3;
        const INDEX = 1 << 4;
        const VERTEX = 1 << 5;
        const UNIFORM = 1 << 6;
        const STORAGE = 1 << 7;
        const INDIRECT = 1 << 8;
    }
}

/// Filter mode for samplers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    Nearest,
    #[default]
    Linear,
}

/// Address mode for samplers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressMode {
    #[default]
    ClampToEdge,
    ClampToBorder,
    Repeat,
    MirrorRepeat,
}

/// Compare function for depth/stencil and shadow sampling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareFunction {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

/// Size of a texture in texels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Extent3d {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

impl Extent3d {
    pub fn new_2d(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            depth: 1,
        }
    }
}

impl Default for Extent3d {
    fn default() -> Self {
        Self::new_2d(1, 1)
    }
}

/// Texture descriptor
///
/// Besides the image shape it carries sampling hints (`wrap`, `filter`,
/// `shadow_sampler`) that are applied when the texture is first created.
/// Two descriptors compare equal only if every field matches, which is what
/// the transient pool buckets on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureDescriptor {
    pub extent: Extent3d,
    pub mip_levels: u32,
    pub layers: u32,
    pub format: TextureFormat,
    pub usage: TextureUsage,
    pub wrap: AddressMode,
    pub filter: FilterMode,
    pub shadow_sampler: bool,
}

impl TextureDescriptor {
    /// A single-mip 2D render target of the given size and format
    pub fn new_2d(width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            extent: Extent3d::new_2d(width, height),
            format,
            ..Default::default()
        }
    }

    pub fn with_mip_levels(mut self, mip_levels: u32) -> Self {
        self.mip_levels = mip_levels;
        self
    }

    pub fn with_layers(mut self, layers: u32) -> Self {
        self.layers = layers;
        self
    }

    pub fn with_usage(mut self, usage: TextureUsage) -> Self {
        self.usage = usage;
        self
    }

    pub fn with_wrap(mut self, wrap: AddressMode) -> Self {
        self.wrap = wrap;
        self
    }

    pub fn with_filter(mut self, filter: FilterMode) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_shadow_sampler(mut self) -> Self {
        self.shadow_sampler = true;
        self
    }

    /// Sampler state derived from the descriptor hints
    pub fn sampler(&self) -> SamplerDescriptor {
        SamplerDescriptor {
            mag_filter: self.filter,
            min_filter: self.filter,
            mipmap_filter: if self.mip_levels > 1 {
                Some(self.filter)
            } else {
                None
            },
            address_mode_u: self.wrap,
            address_mode_v: self.wrap,
            address_mode_w: self.wrap,
            compare: self.shadow_sampler.then_some(CompareFunction::LessEqual),
        }
    }

    /// Approximate memory footprint of the base level times layers
    pub fn size_in_bytes(&self) -> u64 {
        self.extent.width as u64
            * self.extent.height as u64
            * self.extent.depth as u64
            * self.layers as u64
            * self.format.bytes_per_pixel() as u64
    }
}

impl Default for TextureDescriptor {
    fn default() -> Self {
        Self {
            extent: Extent3d::default(),
            mip_levels: 1,
            layers: 1,
            format: TextureFormat::Rgba8Unorm,
            usage: TextureUsage::TEXTURE_BINDING | TextureUsage::RENDER_ATTACHMENT,
            wrap: AddressMode::ClampToEdge,
            filter: FilterMode::Linear,
            shadow_sampler: false,
        }
    }
}

/// Buffer descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferDescriptor {
    pub size: u64,
    pub usage: BufferUsage,
}

impl BufferDescriptor {
    pub fn new(size: u64, usage: BufferUsage) -> Self {
        Self { size, usage }
    }

    pub fn uniform(size: u64) -> Self {
        Self::new(size, BufferUsage::UNIFORM | BufferUsage::COPY_DST)
    }

    pub fn storage(size: u64) -> Self {
        Self::new(size, BufferUsage::STORAGE | BufferUsage::COPY_DST)
    }
}

/// Sampler state applied to a texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerDescriptor {
    pub mag_filter: FilterMode,
    pub min_filter: FilterMode,
    /// `None` disables mipmapping
    pub mipmap_filter: Option<FilterMode>,
    pub address_mode_u: AddressMode,
    pub address_mode_v: AddressMode,
    pub address_mode_w: AddressMode,
    pub compare: Option<CompareFunction>,
}

impl Default for SamplerDescriptor {
    fn default() -> Self {
        TextureDescriptor::default().sampler()
    }
}

/// Render pipeline descriptor
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PipelineDescriptor {
    pub label: Option<String>,
    pub vertex_shader: String,
    pub fragment_shader: Option<String>,
    pub color_formats: Vec<TextureFormat>,
    pub depth_format: Option<TextureFormat>,
    pub depth_compare: Option<CompareFunction>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoadOp {
    Clear([f32; 4]),
    Load,
}

/// Attachment for render pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attachment {
    pub texture: super::TextureHandle,
    pub load_op: LoadOp,
}

impl Attachment {
    pub fn clear(texture: super::TextureHandle, color: [f32; 4]) -> Self {
        Self {
            texture,
            load_op: LoadOp::Clear(color),
        }
    }

    pub fn load(texture: super::TextureHandle) -> Self {
        Self {
            texture,
            load_op: LoadOp::Load,
        }
    }
}

/// Render pass descriptor
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderPassDescriptor {
    pub label: Option<String>,
    pub color_attachments: Vec<Attachment>,
    pub depth_attachment: Option<Attachment>,
}
