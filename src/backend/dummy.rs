//! Dummy device for testing and development.
//!
//! This device doesn't perform actual GPU operations. It hands out
//! increasing ids, keeps track of live objects and records every call so
//! tests can assert on what the frame graph asked for.

use std::collections::{HashMap, HashSet};
use std::ops::Range;

use super::traits::*;
use super::types::*;

/// A call recorded by [`DummyDevice`]
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCommand {
    CreateTexture(TextureHandle),
    CreateBuffer(BufferHandle),
    SetTextureSampler(TextureHandle, SamplerDescriptor),
    WriteBuffer {
        buffer: BufferHandle,
        offset: u64,
        len: usize,
    },
    CreatePipeline(PipelineHandle),
    BeginRenderPass {
        token: RenderPassToken,
        label: Option<String>,
    },
    EndRenderPass(RenderPassToken),
    BindPipeline(PipelineHandle),
    BindTexture {
        slot: u32,
        texture: TextureHandle,
    },
    BindUniformBuffer {
        slot: u32,
        buffer: BufferHandle,
    },
    Draw {
        vertices: Range<u32>,
        instances: Range<u32>,
    },
    Dispatch(u32, u32, u32),
    DestroyTexture(TextureHandle),
    DestroyBuffer(BufferHandle),
    DestroyPipeline(PipelineHandle),
}

/// Dummy device.
#[derive(Debug, Default)]
pub struct DummyDevice {
    next_id: u64,
    textures: HashMap<TextureHandle, TextureDescriptor>,
    buffers: HashMap<BufferHandle, BufferDescriptor>,
    samplers: HashMap<TextureHandle, SamplerDescriptor>,
    pipelines: HashSet<PipelineHandle>,
    open_pass: Option<RenderPassToken>,
    commands: Vec<DeviceCommand>,
    allocations: usize,
    allocation_limit: Option<usize>,
}

impl DummyDevice {
    /// Create a new dummy device.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every texture/buffer allocation after the next `count` ones fail
    /// with [`BackendError::OutOfMemory`].
    pub fn fail_allocations_after(&mut self, count: usize) {
        self.allocation_limit = Some(self.allocations + count);
    }

    /// Remove a limit set by [`fail_allocations_after`](Self::fail_allocations_after).
    pub fn clear_allocation_limit(&mut self) {
        self.allocation_limit = None;
    }

    /// All calls recorded so far, in order.
    pub fn commands(&self) -> &[DeviceCommand] {
        &self.commands
    }

    /// Drain the recorded calls.
    pub fn take_commands(&mut self) -> Vec<DeviceCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Number of successful texture and buffer allocations over the device lifetime.
    pub fn allocation_count(&self) -> usize {
        self.allocations
    }

    pub fn live_texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn live_buffer_count(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_texture_alive(&self, texture: TextureHandle) -> bool {
        self.textures.contains_key(&texture)
    }

    pub fn is_buffer_alive(&self, buffer: BufferHandle) -> bool {
        self.buffers.contains_key(&buffer)
    }

    pub fn texture_descriptor(&self, texture: TextureHandle) -> Option<&TextureDescriptor> {
        self.textures.get(&texture)
    }

    pub fn texture_sampler(&self, texture: TextureHandle) -> Option<&SamplerDescriptor> {
        self.samplers.get(&texture)
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn check_budget(&mut self) -> BackendResult<()> {
        if let Some(limit) = self.allocation_limit {
            if self.allocations >= limit {
                log::trace!("DummyDevice: allocation limit {} reached", limit);
                return Err(BackendError::OutOfMemory);
            }
        }
        self.allocations += 1;
        Ok(())
    }
}

impl Device for DummyDevice {
    fn name(&self) -> &str {
        "Dummy"
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle> {
        let extent = desc.extent;
        if extent.width == 0 || extent.height == 0 || extent.depth == 0 {
            return Err(BackendError::TextureCreationFailed(format!(
                "zero extent {}x{}x{}",
                extent.width, extent.height, extent.depth
            )));
        }
        if desc.mip_levels == 0 || desc.layers == 0 {
            return Err(BackendError::InvalidDescriptor(
                "texture needs at least one mip level and one layer".into(),
            ));
        }
        self.check_budget()?;

        let handle = TextureHandle::from_raw(self.next_id());
        log::trace!(
            "DummyDevice: creating texture {:?} ({}x{}x{}, {:?})",
            handle,
            extent.width,
            extent.height,
            extent.depth,
            desc.format
        );
        self.textures.insert(handle, *desc);
        self.commands.push(DeviceCommand::CreateTexture(handle));
        Ok(handle)
    }

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<BufferHandle> {
        if desc.size == 0 {
            return Err(BackendError::BufferCreationFailed("zero size".into()));
        }
        self.check_budget()?;

        let handle = BufferHandle::from_raw(self.next_id());
        log::trace!("DummyDevice: creating buffer {:?} (size: {})", handle, desc.size);
        self.buffers.insert(handle, *desc);
        self.commands.push(DeviceCommand::CreateBuffer(handle));
        Ok(handle)
    }

    fn set_texture_sampler(&mut self, texture: TextureHandle, sampler: &SamplerDescriptor) {
        assert!(
            self.textures.contains_key(&texture),
            "DummyDevice: sampler set on unknown texture {:?}",
            texture
        );
        self.samplers.insert(texture, *sampler);
        self.commands
            .push(DeviceCommand::SetTextureSampler(texture, *sampler));
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) {
        let desc = self
            .buffers
            .get(&buffer)
            .unwrap_or_else(|| panic!("DummyDevice: write to unknown buffer {:?}", buffer));
        assert!(
            offset + data.len() as u64 <= desc.size,
            "DummyDevice: write of {} bytes at {} overflows buffer of {} bytes",
            data.len(),
            offset,
            desc.size
        );
        self.commands.push(DeviceCommand::WriteBuffer {
            buffer,
            offset,
            len: data.len(),
        });
    }

    fn create_pipeline(&mut self, desc: &PipelineDescriptor) -> BackendResult<PipelineHandle> {
        if desc.vertex_shader.is_empty() {
            return Err(BackendError::PipelineCreationFailed(
                "missing vertex shader".into(),
            ));
        }
        let handle = PipelineHandle::from_raw(self.next_id());
        log::trace!("DummyDevice: creating pipeline {:?} {:?}", handle, desc.label);
        self.pipelines.insert(handle);
        self.commands.push(DeviceCommand::CreatePipeline(handle));
        Ok(handle)
    }

    fn begin_render_pass(&mut self, desc: &RenderPassDescriptor) -> RenderPassToken {
        assert!(
            self.open_pass.is_none(),
            "DummyDevice: render pass {:?} begun inside another pass",
            desc.label
        );
        for attachment in desc.color_attachments.iter().chain(&desc.depth_attachment) {
            assert!(
                self.textures.contains_key(&attachment.texture),
                "DummyDevice: attachment {:?} is not a live texture",
                attachment.texture
            );
        }
        let token = RenderPassToken::from_raw(self.next_id());
        self.open_pass = Some(token);
        self.commands.push(DeviceCommand::BeginRenderPass {
            token,
            label: desc.label.clone(),
        });
        token
    }

    fn end_render_pass(&mut self, token: RenderPassToken) {
        assert_eq!(
            self.open_pass.take(),
            Some(token),
            "DummyDevice: ending a render pass that is not open"
        );
        self.commands.push(DeviceCommand::EndRenderPass(token));
    }

    fn bind_pipeline(&mut self, pipeline: PipelineHandle) {
        self.commands.push(DeviceCommand::BindPipeline(pipeline));
    }

    fn bind_texture(&mut self, slot: u32, texture: TextureHandle) {
        self.commands.push(DeviceCommand::BindTexture { slot, texture });
    }

    fn bind_uniform_buffer(&mut self, slot: u32, buffer: BufferHandle) {
        self.commands
            .push(DeviceCommand::BindUniformBuffer { slot, buffer });
    }

    fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>) {
        self.commands.push(DeviceCommand::Draw {
            vertices,
            instances,
        });
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.commands.push(DeviceCommand::Dispatch(x, y, z));
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        assert!(
            self.textures.remove(&texture).is_some(),
            "DummyDevice: destroying unknown texture {:?}",
            texture
        );
        self.samplers.remove(&texture);
        log::trace!("DummyDevice: destroyed texture {:?}", texture);
        self.commands.push(DeviceCommand::DestroyTexture(texture));
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        assert!(
            self.buffers.remove(&buffer).is_some(),
            "DummyDevice: destroying unknown buffer {:?}",
            buffer
        );
        log::trace!("DummyDevice: destroyed buffer {:?}", buffer);
        self.commands.push(DeviceCommand::DestroyBuffer(buffer));
    }

    fn destroy_pipeline(&mut self, pipeline: PipelineHandle) {
        assert!(
            self.pipelines.remove(&pipeline),
            "DummyDevice: destroying unknown pipeline {:?}",
            pipeline
        );
        self.commands.push(DeviceCommand::DestroyPipeline(pipeline));
    }
}
