//! Common utilities for frame graph integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::time::Duration;

use lilium_framegraph::backend::{
    BufferDescriptor, TextureDescriptor, TextureFormat, TextureHandle, TextureUsage,
};
use lilium_framegraph::{
    DummyDevice, FrameGraph, PoolConfig, ResourceHandle, TransientResources,
};

/// Initialize `env_logger` once for the test binary.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Device and pool that live across the frames of a test.
pub struct TestContext {
    pub device: DummyDevice,
    pub pool: TransientResources,
}

impl TestContext {
    pub fn new() -> Self {
        init_logging();
        Self {
            device: DummyDevice::new(),
            pool: TransientResources::new(),
        }
    }

    pub fn with_max_idle_time(max_idle_time: Duration) -> Self {
        init_logging();
        Self {
            device: DummyDevice::new(),
            pool: TransientResources::with_config(PoolConfig { max_idle_time }),
        }
    }

    /// Compile and execute `graph`, panicking on device failures.
    pub fn run(&mut self, mut graph: FrameGraph<'_>) {
        graph.compile();
        graph
            .execute(&mut self.device, &mut self.pool)
            .expect("frame graph execution failed");
    }

    pub fn heartbeat(&mut self, dt: Duration) {
        self.pool.heartbeat(&mut self.device, dt);
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        self.pool.clear(&mut self.device);
    }
}

pub fn color_target(width: u32, height: u32) -> TextureDescriptor {
    TextureDescriptor::new_2d(width, height, TextureFormat::Rgba16Float)
        .with_usage(TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING)
}

pub fn uniform_buffer() -> BufferDescriptor {
    BufferDescriptor::uniform(256)
}

/// Imported swapchain stand-in. The raw id is far above what the dummy
/// device hands out so it can never collide with a pooled texture.
pub fn backbuffer() -> (TextureDescriptor, TextureHandle) {
    (
        TextureDescriptor::new_2d(1280, 720, TextureFormat::Bgra8Unorm)
            .with_usage(TextureUsage::RENDER_ATTACHMENT),
        TextureHandle::from_raw(u64::MAX),
    )
}

/// Names of executed passes, in execution order.
pub type ExecutionLog = RefCell<Vec<String>>;

/// Handles produced by [`three_pass_graph`]
#[derive(Debug, Clone, Copy)]
pub struct ThreePass {
    pub texture: ResourceHandle,
    pub buffer: ResourceHandle,
}

/// Pass A creates and writes texture T, pass B reads T and creates buffer U,
/// pass C has side effects and reads U only when `c_reads_u` is set.
pub fn three_pass_graph<'a>(log: &'a ExecutionLog, c_reads_u: bool) -> (FrameGraph<'a>, ThreePass) {
    let mut graph = FrameGraph::new();

    let texture = graph.add_pass(
        "A",
        |builder, out: &mut Option<ResourceHandle>| {
            let t = builder.create("T", color_target(64, 64));
            *out = Some(builder.write(t));
        },
        move |_, _, _| log.borrow_mut().push("A".into()),
    );
    let texture = texture.unwrap();

    let buffer = graph.add_pass(
        "B",
        |builder, out: &mut Option<ResourceHandle>| {
            builder.read(texture);
            *out = Some(builder.create("U", uniform_buffer()));
        },
        move |_, _, _| log.borrow_mut().push("B".into()),
    );
    let buffer = buffer.unwrap();

    graph.add_pass(
        "C",
        |builder, _: &mut ()| {
            if c_reads_u {
                builder.read(buffer);
            } else {
                builder.create("Unrelated", uniform_buffer());
            }
            builder.set_side_effect();
        },
        move |_, _, _| log.borrow_mut().push("C".into()),
    );

    (graph, ThreePass { texture, buffer })
}
