//! Frame Graph System
//!
//! Rendering code declares each frame as a list of passes together with the
//! resources they create, read and write. Compiling the graph culls passes
//! that contribute nothing to a side effect and computes when every resource
//! is first and last used. Executing it materializes transient resources from
//! a [`TransientResources`](crate::resources::TransientResources) pool just in
//! time and hands them back as soon as their last user finished.

pub mod blackboard;
pub mod compiler;
mod dot;
mod executor;
pub mod graph;
pub mod pass;
pub mod resource;

pub use blackboard::Blackboard;
pub use compiler::{CompiledGraph, ResourceLifetime};
pub use graph::*;
pub use pass::*;
pub use resource::*;
