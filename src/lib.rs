//! Lilium Frame Graph - A per-frame render graph scheduler with transient resource pooling
//!
//! Rendering code describes a frame as passes with declared data
//! dependencies. The graph then:
//! - culls passes whose outputs never reach a side effect
//! - computes the lifetime of every intermediate resource
//! - executes passes, allocating and releasing resources just in time
//! - recycles device resources across frames through a pool with idle eviction
//!
//! The GPU is abstracted behind the [`Device`] trait; [`DummyDevice`]
//! implements it without a GPU and records every call.
//!
//! # Frame loop
//!
//! ```ignore
//! let mut pool = TransientResources::new();
//! loop {
//!     let mut graph = FrameGraph::new();
//!     // graph.add_pass(...)
//!     graph.compile();
//!     graph.execute(&mut device, &mut pool)?;
//!     pool.heartbeat(&mut device, frame_time);
//! }
//! ```

pub mod backend;
pub mod error;
pub mod render_graph;
pub mod resources;

pub use backend::dummy::DummyDevice;
pub use backend::{BackendError, BackendResult, Device, DeviceResource};
pub use error::{FrameGraphError, FrameGraphResult};
pub use render_graph::{
    Blackboard, CompiledGraph, FrameGraph, PassBuilder, PassId, PassResources,
    ResourceDescriptor, ResourceHandle, ResourceLifetime,
};
pub use resources::{PoolConfig, PoolStats, TransientResources};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
