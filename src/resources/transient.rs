//! Transient resource pool
//!
//! Device resources handed out to frame graphs are kept alive across frames
//! and recycled by exact descriptor match. Free entries that go unused for
//! longer than [`PoolConfig::max_idle_time`] are destroyed by
//! [`TransientResources::heartbeat`].

use std::collections::HashMap;
use std::time::Duration;

use crate::backend::{BackendResult, Device, DeviceResource};
use crate::render_graph::ResourceDescriptor;

use super::PoolConfig;

/// A free device resource waiting in its bucket
#[derive(Debug)]
struct PoolEntry {
    resource: DeviceResource,
    idle_time: Duration,
}

/// Snapshot of pool counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    /// Resources currently handed out
    pub live: usize,
    /// Resources sitting in buckets
    pub free: usize,
    /// Approximate memory of the resources handed out
    pub live_bytes: u64,
    /// Approximate memory of the resources sitting in buckets
    pub free_bytes: u64,
    /// Number of descriptor buckets
    pub buckets: usize,
    /// Device allocations performed over the pool lifetime
    pub allocations: u64,
    /// Acquires satisfied from a bucket
    pub reuses: u64,
    /// Entries destroyed after idling too long
    pub evictions: u64,
}

/// Owns the real device resources that back transient graph resources.
///
/// Only the frame graph executor and the once-per-frame heartbeat should
/// touch the pool.
#[derive(Debug, Default)]
pub struct TransientResources {
    config: PoolConfig,
    buckets: HashMap<ResourceDescriptor, Vec<PoolEntry>>,
    live: HashMap<DeviceResource, ResourceDescriptor>,
    allocations: u64,
    reuses: u64,
    evictions: u64,
}

impl TransientResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: PoolConfig) -> Self {
        Self {
            config,
            buckets: HashMap::new(),
            live: HashMap::new(),
            allocations: 0,
            reuses: 0,
            evictions: 0,
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Hand out a resource matching `desc`, reusing a free one when possible.
    pub fn acquire(
        &mut self,
        device: &mut dyn Device,
        desc: &ResourceDescriptor,
    ) -> BackendResult<DeviceResource> {
        let recycled = self.buckets.get_mut(desc).and_then(Vec::pop);

        let resource = match recycled {
            Some(entry) => {
                self.reuses += 1;
                log::trace!("Pool: reusing {:?} for {:?}", entry.resource, desc);
                entry.resource
            }
            None => {
                let resource = Self::create(device, desc)?;
                self.allocations += 1;
                log::trace!("Pool: allocated {:?} for {:?}", resource, desc);
                resource
            }
        };

        self.live.insert(resource, *desc);
        Ok(resource)
    }

    /// Return a resource obtained from [`acquire`](Self::acquire).
    ///
    /// # Panics
    ///
    /// Panics if the resource is not currently handed out by this pool or was
    /// acquired with a different descriptor.
    pub fn release(&mut self, desc: &ResourceDescriptor, resource: DeviceResource) {
        match self.live.remove(&resource) {
            Some(acquired) => assert_eq!(
                &acquired, desc,
                "Pool: {:?} released under a different descriptor",
                resource
            ),
            None => panic!("Pool: {:?} was not acquired from this pool", resource),
        }

        log::trace!("Pool: released {:?}", resource);
        self.buckets.entry(*desc).or_default().push(PoolEntry {
            resource,
            idle_time: Duration::ZERO,
        });
    }

    /// Age free entries by `dt`, destroying the ones idle for longer than the
    /// configured limit and dropping buckets that end up empty.
    pub fn heartbeat(&mut self, device: &mut dyn Device, dt: Duration) {
        let max_idle_time = self.config.max_idle_time;
        let mut evicted: u64 = 0;

        for (desc, entries) in self.buckets.iter_mut() {
            entries.retain_mut(|entry| {
                entry.idle_time += dt;
                if entry.idle_time > max_idle_time {
                    log::trace!("Pool: evicting {:?} ({:?})", entry.resource, desc);
                    Self::destroy(&mut *device, entry.resource);
                    evicted += 1;
                    false
                } else {
                    true
                }
            });
        }
        self.buckets.retain(|_, entries| !entries.is_empty());

        if evicted > 0 {
            self.evictions += evicted;
            log::debug!(
                "Pool: evicted {} idle resources, {} free remain ({} bytes)",
                evicted,
                self.free_total(),
                self.free_bytes()
            );
        }
    }

    /// Destroy every free resource. Resources still handed out are left alone.
    pub fn clear(&mut self, device: &mut dyn Device) {
        let mut destroyed = 0;
        for (_, entries) in self.buckets.drain() {
            for entry in entries {
                Self::destroy(device, entry.resource);
                destroyed += 1;
            }
        }
        log::debug!("Pool: destroyed {} free resources on `{}`", destroyed, device.name());
        if !self.live.is_empty() {
            log::warn!(
                "Pool: cleared while {} resources are still in use",
                self.live.len()
            );
        }
    }

    /// Number of free resources waiting in the bucket for `desc`
    pub fn free_count(&self, desc: &ResourceDescriptor) -> usize {
        self.buckets.get(desc).map_or(0, Vec::len)
    }

    pub fn is_live(&self, resource: DeviceResource) -> bool {
        self.live.contains_key(&resource)
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            live: self.live.len(),
            free: self.free_total(),
            live_bytes: self.live.values().map(ResourceDescriptor::size_in_bytes).sum(),
            free_bytes: self.free_bytes(),
            buckets: self.buckets.len(),
            allocations: self.allocations,
            reuses: self.reuses,
            evictions: self.evictions,
        }
    }

    fn free_total(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    fn free_bytes(&self) -> u64 {
        self.buckets
            .iter()
            .map(|(desc, entries)| desc.size_in_bytes() * entries.len() as u64)
            .sum()
    }

    fn create(device: &mut dyn Device, desc: &ResourceDescriptor) -> BackendResult<DeviceResource> {
        match desc {
            ResourceDescriptor::Texture(texture_desc) => {
                let texture = device.create_texture(texture_desc)?;
                device.set_texture_sampler(texture, &texture_desc.sampler());
                Ok(DeviceResource::Texture(texture))
            }
            ResourceDescriptor::Buffer(buffer_desc) => {
                Ok(DeviceResource::Buffer(device.create_buffer(buffer_desc)?))
            }
        }
    }

    fn destroy(device: &mut dyn Device, resource: DeviceResource) {
        match resource {
            DeviceResource::Texture(texture) => device.destroy_texture(texture),
            DeviceResource::Buffer(buffer) => device.destroy_buffer(buffer),
        }
    }
}

impl Drop for TransientResources {
    fn drop(&mut self) {
        let owned = self.free_total() + self.live.len();
        if owned > 0 {
            log::warn!(
                "Pool dropped while owning {} device resources; call clear() first",
                owned
            );
        }
    }
}
