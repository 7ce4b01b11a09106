//! Resource management shared across frames

pub mod transient;

pub use transient::*;

use std::time::Duration;

/// Configuration for the transient resource pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// How long a free resource may sit unused before it is destroyed
    pub max_idle_time: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle_time: Duration::from_secs(1),
        }
    }
}
