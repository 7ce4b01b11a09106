//! Device abstraction consumed by the frame graph
//!
//! The graph never talks to a graphics API directly. It allocates and frees
//! transient resources through [`Device`], and pass callbacks receive the same
//! device to record their work.

use crate::backend::types::*;
use thiserror::Error;

/// Backend error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Failed to create buffer: {0}")]
    BufferCreationFailed(String),
    #[error("Failed to create texture: {0}")]
    TextureCreationFailed(String),
    #[error("Failed to create pipeline: {0}")]
    PipelineCreationFailed(String),
    #[error("Invalid descriptor: {0}")]
    InvalidDescriptor(String),
    #[error("Out of memory")]
    OutOfMemory,
    #[error("Device lost")]
    DeviceLost,
}

pub type BackendResult<T> = Result<T, BackendError>;

macro_rules! device_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            /// Wrap a raw id handed out by a device implementation
            pub const fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            pub const fn raw(self) -> u64 {
                self.0
            }
        }
    };
}

device_handle!(
    /// Handle to a GPU texture
    TextureHandle
);
device_handle!(
    /// Handle to a GPU buffer
    BufferHandle
);
device_handle!(
    /// Handle to a graphics pipeline
    PipelineHandle
);
device_handle!(
    /// Token returned by [`Device::begin_render_pass`]
    RenderPassToken
);

/// A real device object backing a virtual graph resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceResource {
    Texture(TextureHandle),
    Buffer(BufferHandle),
}

impl DeviceResource {
    pub fn as_texture(&self) -> Option<TextureHandle> {
        match self {
            DeviceResource::Texture(t) => Some(*t),
            DeviceResource::Buffer(_) => None,
        }
    }

    pub fn as_buffer(&self) -> Option<BufferHandle> {
        match self {
            DeviceResource::Buffer(b) => Some(*b),
            DeviceResource::Texture(_) => None,
        }
    }
}

impl From<TextureHandle> for DeviceResource {
    fn from(handle: TextureHandle) -> Self {
        DeviceResource::Texture(handle)
    }
}

impl From<BufferHandle> for DeviceResource {
    fn from(handle: BufferHandle) -> Self {
        DeviceResource::Buffer(handle)
    }
}

/// Graphics device trait
///
/// Object safe so pass callbacks can take `&mut dyn Device`.
pub trait Device {
    /// Get the device name for logging
    fn name(&self) -> &str;

    // Resource creation

    /// Create a texture
    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle>;

    /// Create a buffer
    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<BufferHandle>;

    /// Set sampling state (filtering, wrapping, compare) of a texture
    fn set_texture_sampler(&mut self, texture: TextureHandle, sampler: &SamplerDescriptor);

    /// Write data to a buffer
    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]);

    /// Create a graphics pipeline
    fn create_pipeline(&mut self, desc: &PipelineDescriptor) -> BackendResult<PipelineHandle>;

    // Command recording

    /// Begin a render pass
    fn begin_render_pass(&mut self, desc: &RenderPassDescriptor) -> RenderPassToken;

    /// End a render pass
    fn end_render_pass(&mut self, token: RenderPassToken);

    /// Set the pipeline
    fn bind_pipeline(&mut self, pipeline: PipelineHandle);

    /// Bind a texture to a sampler slot
    fn bind_texture(&mut self, slot: u32, texture: TextureHandle);

    /// Bind a uniform buffer to a slot
    fn bind_uniform_buffer(&mut self, slot: u32, buffer: BufferHandle);

    /// Draw primitives
    fn draw(&mut self, vertices: std::ops::Range<u32>, instances: std::ops::Range<u32>);

    /// Dispatch compute work
    fn dispatch(&mut self, x: u32, y: u32, z: u32);

    // Resource cleanup

    /// Destroy a texture
    fn destroy_texture(&mut self, texture: TextureHandle);

    /// Destroy a buffer
    fn destroy_buffer(&mut self, buffer: BufferHandle);

    /// Destroy a pipeline
    fn destroy_pipeline(&mut self, pipeline: PipelineHandle);
}
