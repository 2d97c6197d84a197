use std::collections::{HashMap, HashSet};

use compositor_protocol::{IntSize, ResourceFormat, ResourceId};

use crate::resource_provider::ResourceProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PooledResource {
    id: ResourceId,
    size: IntSize,
    format: ResourceFormat,
    bytes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResourcePoolUsage {
    pub total_bytes: usize,
    pub total_count: usize,
    pub acquired_bytes: usize,
    pub acquired_count: usize,
}

/// Recycles raster backings between tiles.
///
/// A resource is either in use by a tile, busy (released but possibly still
/// read by an in-flight frame) or unused and ready for reuse.
#[derive(Debug)]
pub struct ResourcePool {
    provider: ResourceProvider,
    max_memory_usage_bytes: usize,
    max_resource_count: usize,
    in_use: HashMap<ResourceId, PooledResource>,
    busy: Vec<PooledResource>,
    unused: Vec<PooledResource>,
    shutdown_started: bool,
}

impl ResourcePool {
    pub fn new(provider: ResourceProvider) -> Self {
        Self {
            provider,
            max_memory_usage_bytes: 0,
            max_resource_count: 0,
            in_use: HashMap::new(),
            busy: Vec::new(),
            unused: Vec::new(),
            shutdown_started: false,
        }
    }

    pub fn provider(&self) -> &ResourceProvider {
        &self.provider
    }

    pub fn acquire_resource(&mut self, size: IntSize, format: ResourceFormat) -> ResourceId {
        self.assert_accepting_new_requests("acquire_resource");
        let reusable = self
            .unused
            .iter()
            .position(|resource| resource.size == size && resource.format == format);
        let resource = match reusable {
            Some(index) => self.unused.swap_remove(index),
            None => {
                let id = self.provider.create_resource(size, format);
                let bytes = self
                    .provider
                    .resource_info(id)
                    .map(|info| info.bytes())
                    .unwrap_or(0);
                PooledResource {
                    id,
                    size,
                    format,
                    bytes,
                }
            }
        };
        if self.in_use.insert(resource.id, resource).is_some() {
            panic!("resource acquired twice: {:?}", resource.id);
        }
        resource.id
    }

    pub fn release_resource(&mut self, id: ResourceId) {
        let Some(resource) = self.in_use.remove(&id) else {
            panic!("cannot release resource that is not in use: {id:?}");
        };
        self.busy.push(resource);
    }

    /// Moves busy resources whose last frame has been consumed back to the unused list.
    pub fn check_busy_resources(&mut self) {
        self.unused.append(&mut self.busy);
        self.reduce_resource_usage();
    }

    pub fn set_resource_usage_limits(&mut self, max_memory_usage_bytes: usize, max_resource_count: usize) {
        self.max_memory_usage_bytes = max_memory_usage_bytes;
        self.max_resource_count = max_resource_count;
        self.reduce_resource_usage();
    }

    /// Deletes unused resources until the pool fits its limits.
    pub fn reduce_resource_usage(&mut self) {
        while !self.unused.is_empty() && self.exceeds_limits() {
            let resource = self.unused.remove(0);
            self.provider.delete_resource(resource.id);
        }
    }

    fn exceeds_limits(&self) -> bool {
        let usage = self.usage();
        usage.total_bytes > self.max_memory_usage_bytes
            || usage.total_count > self.max_resource_count
    }

    pub fn usage(&self) -> ResourcePoolUsage {
        let mut usage = ResourcePoolUsage::default();
        for resource in self.in_use.values() {
            usage.acquired_bytes += resource.bytes;
            usage.acquired_count += 1;
        }
        usage.total_bytes = usage.acquired_bytes;
        usage.total_count = usage.acquired_count;
        for resource in self.busy.iter().chain(self.unused.iter()) {
            usage.total_bytes += resource.bytes;
            usage.total_count += 1;
        }
        usage
    }

    pub fn in_use_ids(&self) -> HashSet<ResourceId> {
        self.in_use.keys().copied().collect()
    }

    pub fn unused_count(&self) -> usize {
        self.unused.len()
    }

    pub fn busy_count(&self) -> usize {
        self.busy.len()
    }

    /// Deletes everything that is not held by a tile and refuses new acquisitions.
    pub fn begin_shutdown(&mut self) {
        self.shutdown_started = true;
        for resource in self.busy.drain(..).chain(self.unused.drain(..)) {
            self.provider.delete_resource(resource.id);
        }
    }

    pub fn is_drained(&self) -> bool {
        self.in_use.is_empty() && self.busy.is_empty() && self.unused.is_empty()
    }

    fn assert_accepting_new_requests(&self, stage: &'static str) {
        if self.shutdown_started {
            panic!("resource pool rejects new request after shutdown at stage {stage}");
        }
    }
}

impl Drop for ResourcePool {
    fn drop(&mut self) {
        for resource in self
            .busy
            .drain(..)
            .chain(self.unused.drain(..))
            .chain(self.in_use.drain().map(|(_, resource)| resource))
        {
            self.provider.delete_resource(resource.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile_size() -> IntSize {
        IntSize::new(4, 4)
    }

    #[test]
    fn released_resources_are_reused_after_busy_check() {
        let provider = ResourceProvider::new();
        let mut pool = ResourcePool::new(provider.clone());
        pool.set_resource_usage_limits(usize::MAX, usize::MAX);

        let first = pool.acquire_resource(tile_size(), ResourceFormat::Rgba8888);
        pool.release_resource(first);
        assert_eq!(pool.busy_count(), 1);

        let second = pool.acquire_resource(tile_size(), ResourceFormat::Rgba8888);
        assert_ne!(first, second);

        pool.check_busy_resources();
        let third = pool.acquire_resource(tile_size(), ResourceFormat::Rgba8888);
        assert_eq!(third, first);
        assert_eq!(provider.resource_count(), 2);
    }

    #[test]
    fn lowering_limits_deletes_unused_resources_only() {
        let provider = ResourceProvider::new();
        let mut pool = ResourcePool::new(provider.clone());
        pool.set_resource_usage_limits(usize::MAX, usize::MAX);

        let held = pool.acquire_resource(tile_size(), ResourceFormat::Rgba8888);
        let spare = pool.acquire_resource(tile_size(), ResourceFormat::Rgba8888);
        pool.release_resource(spare);
        pool.check_busy_resources();

        pool.set_resource_usage_limits(0, 0);
        assert_eq!(pool.unused_count(), 0);
        assert!(provider.contains(held));
        assert!(!provider.contains(spare));
        assert_eq!(pool.usage().acquired_count, 1);
    }

    #[test]
    #[should_panic(expected = "not in use")]
    fn releasing_unknown_resource_panics() {
        let mut pool = ResourcePool::new(ResourceProvider::new());
        pool.release_resource(ResourceId(99));
    }

    #[test]
    #[should_panic(expected = "rejects new request after shutdown")]
    fn shutdown_rejects_new_acquisitions() {
        let mut pool = ResourcePool::new(ResourceProvider::new());
        pool.begin_shutdown();
        let _ = pool.acquire_resource(tile_size(), ResourceFormat::Rgba8888);
    }

    #[test]
    fn dropping_the_pool_frees_every_resource() {
        let provider = ResourceProvider::new();
        {
            let mut pool = ResourcePool::new(provider.clone());
            pool.set_resource_usage_limits(usize::MAX, usize::MAX);
            let _ = pool.acquire_resource(tile_size(), ResourceFormat::Rgba8888);
        }
        assert_eq!(provider.resource_count(), 0);
    }
}
