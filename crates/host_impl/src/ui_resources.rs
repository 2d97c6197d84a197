use std::collections::{HashMap, HashSet};
use std::fmt;

use compositor_protocol::{IntSize, ResourceFormat, ResourceId, UiResourceBitmap, UiResourceId};
use layer_tree::UiResourceRequest;

use crate::LayerTreeHostImpl;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiResourceError {
    InvalidId,
    NoResourceProvider,
}

impl fmt::Display for UiResourceError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UiResourceError::InvalidId => write!(formatter, "ui resource id 0 is reserved"),
            UiResourceError::NoResourceProvider => {
                write!(formatter, "no resource provider to back ui resources")
            }
        }
    }
}

impl std::error::Error for UiResourceError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct UiResourceData {
    resource_id: ResourceId,
    size: IntSize,
    opaque: bool,
}

/// Backed UI resources plus the ids whose backing was dropped while the
/// main thread still refers to them. Drawing is blocked until every evicted
/// id has been recreated or deleted.
#[derive(Debug, Default)]
pub(crate) struct UiResourceMap {
    entries: HashMap<UiResourceId, UiResourceData>,
    evicted: HashSet<UiResourceId>,
}

impl LayerTreeHostImpl {
    pub fn create_ui_resource(
        &mut self,
        id: UiResourceId,
        bitmap: &UiResourceBitmap,
    ) -> Result<(), UiResourceError> {
        if !id.is_valid() {
            return Err(UiResourceError::InvalidId);
        }
        let Some(provider) = self.resource_provider.clone() else {
            return Err(UiResourceError::NoResourceProvider);
        };

        if self.ui_resources.entries.contains_key(&id) {
            self.delete_ui_resource(id);
        }

        let format = match bitmap.format {
            ResourceFormat::Alpha8 => ResourceFormat::Alpha8,
            ResourceFormat::Rgba8888 | ResourceFormat::Bgra8888 => ResourceFormat::Rgba8888,
        };
        let resource_id = provider.create_resource(bitmap.size, format);
        self.ui_resources.entries.insert(
            id,
            UiResourceData {
                resource_id,
                size: bitmap.size,
                opaque: bitmap.opaque,
            },
        );
        log::trace!(
            "[host_impl] ui resource {} -> resource {} ({:?})",
            id.0,
            resource_id.0,
            bitmap.size
        );
        self.mark_ui_resource_not_evicted(id);
        Ok(())
    }

    pub fn delete_ui_resource(&mut self, id: UiResourceId) {
        if let Some(data) = self.ui_resources.entries.remove(&id) {
            if let Some(provider) = self.resource_provider.as_ref() {
                provider.delete_resource(data.resource_id);
            }
        }
        self.mark_ui_resource_not_evicted(id);
    }

    /// Drops every backing while remembering the ids as evicted.
    pub fn clear_ui_resources(&mut self) {
        let entries = std::mem::take(&mut self.ui_resources.entries);
        for (id, data) in entries {
            self.ui_resources.evicted.insert(id);
            if let Some(provider) = self.resource_provider.as_ref() {
                provider.delete_resource(data.resource_id);
            }
        }
    }

    pub fn evict_all_ui_resources(&mut self) {
        if self.ui_resources.entries.is_empty() {
            return;
        }
        self.clear_ui_resources();
        log::debug!(
            "[host_impl] evicted ui resources, {} awaiting recreation",
            self.ui_resources.evicted.len()
        );

        self.client.set_needs_commit_on_impl_thread();
        let can_draw = self.can_draw();
        self.client.on_can_draw_state_changed(can_draw);
        self.client.renew_tree_priority();
    }

    pub fn resource_id_for_ui_resource(&self, id: UiResourceId) -> Option<ResourceId> {
        self.ui_resources.entries.get(&id).map(|data| data.resource_id)
    }

    pub fn ui_resource_size(&self, id: UiResourceId) -> Option<IntSize> {
        self.ui_resources.entries.get(&id).map(|data| data.size)
    }

    pub fn is_ui_resource_opaque(&self, id: UiResourceId) -> bool {
        self.ui_resources
            .entries
            .get(&id)
            .is_some_and(|data| data.opaque)
    }

    pub fn evicted_ui_resources_exist(&self) -> bool {
        !self.ui_resources.evicted.is_empty()
    }

    /// The last outstanding eviction unblocks drawing.
    pub(crate) fn mark_ui_resource_not_evicted(&mut self, id: UiResourceId) {
        if !self.ui_resources.evicted.remove(&id) {
            return;
        }
        if self.ui_resources.evicted.is_empty() {
            let can_draw = self.can_draw();
            self.client.on_can_draw_state_changed(can_draw);
        }
    }

    pub(crate) fn process_ui_resource_requests(&mut self, requests: Vec<UiResourceRequest>) {
        for request in requests {
            match request {
                UiResourceRequest::Create { id, bitmap } => {
                    if let Err(error) = self.create_ui_resource(id, &bitmap) {
                        log::warn!("[host_impl] dropping ui resource {}: {error}", id.0);
                    }
                }
                UiResourceRequest::Delete { id } => self.delete_ui_resource(id),
            }
        }
    }
}
