use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use compositor_protocol::{IntSize, ResourceFormat, ResourceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceInfo {
    pub size: IntSize,
    pub format: ResourceFormat,
}

impl ResourceInfo {
    pub fn bytes(&self) -> usize {
        let width = self.size.width.max(0) as usize;
        let height = self.size.height.max(0) as usize;
        width * height * self.format.bytes_per_pixel()
    }
}

#[derive(Debug)]
struct ResourceProviderInner {
    next_id: AtomicU32,
    lost: AtomicBool,
    resources: Mutex<HashMap<ResourceId, ResourceInfo>>,
}

/// Shared handle to the backing store of every resource the compositor owns.
#[derive(Debug, Clone)]
pub struct ResourceProvider {
    inner: Arc<ResourceProviderInner>,
}

impl Default for ResourceProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceProvider {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ResourceProviderInner {
                next_id: AtomicU32::new(1),
                lost: AtomicBool::new(false),
                resources: Mutex::new(HashMap::new()),
            }),
        }
    }

    fn resources(&self) -> MutexGuard<'_, HashMap<ResourceId, ResourceInfo>> {
        match self.inner.resources.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn create_resource(&self, size: IntSize, format: ResourceFormat) -> ResourceId {
        let raw = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        if raw == 0 {
            panic!("resource id space exhausted");
        }
        let id = ResourceId(raw);
        self.resources().insert(id, ResourceInfo { size, format });
        id
    }

    pub fn delete_resource(&self, id: ResourceId) -> bool {
        self.resources().remove(&id).is_some()
    }

    pub fn resource_info(&self, id: ResourceId) -> Option<ResourceInfo> {
        self.resources().get(&id).copied()
    }

    pub fn contains(&self, id: ResourceId) -> bool {
        self.resources().contains_key(&id)
    }

    pub fn resource_count(&self) -> usize {
        self.resources().len()
    }

    pub fn memory_usage_bytes(&self) -> usize {
        self.resources().values().map(ResourceInfo::bytes).sum()
    }

    /// The context backing every resource is gone; ids stay valid until deleted.
    pub fn did_lose_output_surface(&self) {
        self.inner.lost.store(true, Ordering::Release);
    }

    pub fn is_lost(&self) -> bool {
        self.inner.lost.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_bytes_of_live_resources() {
        let provider = ResourceProvider::new();
        let first = provider.create_resource(IntSize::new(16, 16), ResourceFormat::Rgba8888);
        let second = provider.create_resource(IntSize::new(8, 8), ResourceFormat::Alpha8);
        assert_ne!(first, second);
        assert_eq!(provider.memory_usage_bytes(), 16 * 16 * 4 + 8 * 8);

        assert!(provider.delete_resource(first));
        assert!(!provider.delete_resource(first));
        assert_eq!(provider.resource_count(), 1);
    }
}
