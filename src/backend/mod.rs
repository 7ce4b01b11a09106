//! Backend abstraction layer
//!
//! Provides the device trait the frame graph drives, the types shared with
//! device implementations, and a dummy device for running without a GPU.

pub mod dummy;
pub mod traits;
pub mod types;

pub use dummy::*;
pub use traits::*;
pub use types::*;
