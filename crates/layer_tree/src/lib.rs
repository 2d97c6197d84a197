//! Impl-side layer tree.
//!
//! One `LayerTreeImpl` is a complete drawable snapshot: an arena of layers, the property
//! trees and render surfaces derived from it, and the tree-level state the main thread
//! commits alongside the layers (viewport layers, page scale, top controls, swap promises).
//!
//! Internal modules:
//! - `layer`: the layer record.
//! - `synced_property`: main/impl split values (scroll offsets, page scale, top controls).
//! - `property_trees`: transform/clip/effect/scroll nodes.
//! - `draw_properties`: derives property trees, render surfaces and per-layer draw state.
//! - `render_surface`: surfaces, the render surface layer list and the front-to-back iterator.
//! - `damage_tracker`: per-surface damage history.
//! - `scroll`: offset clamping, single-node scrolling and viewport offsets.
//! - `sync`: structural sync and property push between trees.
//! - `animation`: keyframe-less layer animations.

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use compositor_protocol::{
    Color, DidNotSwapReason, IntSize, LayerId, ScrollOffset, SwapPromise, CompositorFrameMetadata,
};
use slotmap::SlotMap;

pub mod animation;
pub mod damage_tracker;
mod draw_properties;
pub mod layer;
pub mod property_trees;
pub mod render_surface;
mod scroll;
mod sync;
pub mod synced_property;
pub mod ui_resource_request;

pub use animation::{AnimatedValue, AnimationTarget, LayerAnimation, RunState};
pub use damage_tracker::DamageTracker;
pub use layer::{DrawProperties, LayerContents, LayerImpl};
pub use property_trees::{PropertyTrees, ScrollNode, ScrollTree};
pub use render_surface::{LayerIteratorItem, LayerIteratorItemKind, RenderSurfaceImpl};
pub use sync::synchronize_trees;
pub use synced_property::{SyncedScale, SyncedScrollOffset, SyncedTopControls};
pub use ui_resource_request::UiResourceRequest;

slotmap::new_key_type! {
    pub struct LayerKey;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerTreeKind {
    Active,
    Pending,
    Recycle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerTreeError {
    DuplicateLayerId { layer_id: LayerId },
    UnknownLayer { layer_id: LayerId },
    UnknownParent { parent_id: LayerId, child_id: LayerId },
    MissingRoot,
}

impl fmt::Display for LayerTreeError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerTreeError::DuplicateLayerId { layer_id } => {
                write!(formatter, "layer id {} already exists in tree", layer_id.0)
            }
            LayerTreeError::UnknownLayer { layer_id } => {
                write!(formatter, "layer id {} not found in tree", layer_id.0)
            }
            LayerTreeError::UnknownParent {
                parent_id,
                child_id,
            } => write!(
                formatter,
                "cannot attach layer {} to unknown parent {}",
                child_id.0, parent_id.0
            ),
            LayerTreeError::MissingRoot => write!(formatter, "layer tree has no root layer"),
        }
    }
}

impl std::error::Error for LayerTreeError {}

/// Layers with a special role in viewport scrolling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewportLayers {
    pub page_scale: Option<LayerId>,
    pub inner_viewport_scroll: Option<LayerId>,
    pub outer_viewport_scroll: Option<LayerId>,
}

/// A page scale animation requested by the main thread, started after activation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingPageScaleAnimation {
    pub target_offset: ScrollOffset,
    pub use_anchor: bool,
    pub scale: f32,
    pub duration: Duration,
}

pub struct LayerTreeImpl {
    kind: LayerTreeKind,
    pub(crate) layers: SlotMap<LayerKey, LayerImpl>,
    pub(crate) layer_id_map: HashMap<LayerId, LayerKey>,
    pub(crate) root: Option<LayerKey>,

    pub(crate) viewport_layers: ViewportLayers,
    pub(crate) hud_layer: Option<LayerId>,
    pub(crate) page_scale_factor: SyncedScale,
    pub(crate) min_page_scale_factor: f32,
    pub(crate) max_page_scale_factor: f32,
    pub(crate) device_scale_factor: f32,
    pub(crate) painted_device_scale_factor: f32,
    pub(crate) device_viewport_size: IntSize,
    pub(crate) top_controls_height: f32,
    pub(crate) top_controls_shrink_content_size: bool,
    pub(crate) top_controls_shown_ratio: SyncedTopControls,
    pub(crate) background_color: Color,
    pub(crate) has_transparent_background: bool,
    pub(crate) have_scroll_event_handlers: bool,

    pub(crate) needs_update_draw_properties: bool,
    pub(crate) needs_full_tree_sync: bool,
    pub(crate) viewport_size_invalid: bool,
    pub(crate) contents_textures_purged: bool,
    pub(crate) requires_high_res_to_draw: bool,
    pub(crate) has_ever_been_drawn: bool,
    pub(crate) source_frame_number: i32,

    pub(crate) swap_promises: Vec<Box<dyn SwapPromise>>,
    pub(crate) ui_resource_request_queue: Vec<UiResourceRequest>,
    pub(crate) pending_page_scale_animation: Option<PendingPageScaleAnimation>,

    pub(crate) property_trees: PropertyTrees,
    pub(crate) render_surfaces: HashMap<LayerId, RenderSurfaceImpl>,
    pub(crate) render_surface_layer_list: Vec<LayerId>,
    pub(crate) damage_trackers: HashMap<LayerId, DamageTracker>,
}

impl fmt::Debug for LayerTreeImpl {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("LayerTreeImpl")
            .field("kind", &self.kind)
            .field("layer_count", &self.layers.len())
            .field("source_frame_number", &self.source_frame_number)
            .field("swap_promises", &self.swap_promises.len())
            .finish()
    }
}

impl LayerTreeImpl {
    pub fn new(kind: LayerTreeKind) -> Self {
        Self {
            kind,
            layers: SlotMap::with_key(),
            layer_id_map: HashMap::new(),
            root: None,
            viewport_layers: ViewportLayers::default(),
            hud_layer: None,
            page_scale_factor: SyncedScale::new(1.0),
            min_page_scale_factor: 1.0,
            max_page_scale_factor: 1.0,
            device_scale_factor: 1.0,
            painted_device_scale_factor: 1.0,
            device_viewport_size: IntSize::zero(),
            top_controls_height: 0.0,
            top_controls_shrink_content_size: false,
            top_controls_shown_ratio: SyncedTopControls::new(1.0),
            background_color: Color::WHITE,
            has_transparent_background: false,
            have_scroll_event_handlers: false,
            needs_update_draw_properties: true,
            needs_full_tree_sync: true,
            viewport_size_invalid: false,
            contents_textures_purged: false,
            requires_high_res_to_draw: false,
            has_ever_been_drawn: false,
            source_frame_number: -1,
            swap_promises: Vec::new(),
            ui_resource_request_queue: Vec::new(),
            pending_page_scale_animation: None,
            property_trees: PropertyTrees::default(),
            render_surfaces: HashMap::new(),
            render_surface_layer_list: Vec::new(),
            damage_trackers: HashMap::new(),
        }
    }

    pub fn kind(&self) -> LayerTreeKind {
        self.kind
    }

    pub fn set_kind(&mut self, kind: LayerTreeKind) {
        self.kind = kind;
    }

    pub fn is_active_tree(&self) -> bool {
        self.kind == LayerTreeKind::Active
    }

    pub fn is_pending_tree(&self) -> bool {
        self.kind == LayerTreeKind::Pending
    }

    // Building.

    /// Replaces the whole hierarchy with `root`.
    pub fn set_root_layer(&mut self, root: LayerImpl) {
        self.layers.clear();
        self.layer_id_map.clear();
        let id = root.id();
        let key = self.layers.insert(root);
        self.layer_id_map.insert(id, key);
        self.root = Some(key);
        self.needs_full_tree_sync = true;
        self.set_needs_update_draw_properties();
    }

    pub fn clear_layers(&mut self) {
        self.layers.clear();
        self.layer_id_map.clear();
        self.root = None;
        self.render_surfaces.clear();
        self.render_surface_layer_list.clear();
        self.property_trees.clear();
        self.needs_full_tree_sync = true;
        self.set_needs_update_draw_properties();
    }

    pub fn add_child(&mut self, parent_id: LayerId, child: LayerImpl) -> Result<(), LayerTreeError> {
        let child_id = child.id();
        if self.layer_id_map.contains_key(&child_id) {
            return Err(LayerTreeError::DuplicateLayerId { layer_id: child_id });
        }
        let Some(&parent_key) = self.layer_id_map.get(&parent_id) else {
            return Err(LayerTreeError::UnknownParent {
                parent_id,
                child_id,
            });
        };
        let child_key = self.layers.insert(child);
        self.layers[child_key].parent = Some(parent_key);
        self.layers[parent_key].children.push(child_key);
        self.layer_id_map.insert(child_id, child_key);
        self.needs_full_tree_sync = true;
        self.set_needs_update_draw_properties();
        Ok(())
    }

    /// Removes `layer_id` and its whole subtree.
    pub fn remove_layer(&mut self, layer_id: LayerId) -> Result<(), LayerTreeError> {
        let Some(&key) = self.layer_id_map.get(&layer_id) else {
            return Err(LayerTreeError::UnknownLayer { layer_id });
        };
        if let Some(parent) = self.layers[key].parent {
            self.layers[parent].children.retain(|&child| child != key);
        }
        let mut stack = vec![key];
        while let Some(current) = stack.pop() {
            if let Some(layer) = self.layers.remove(current) {
                self.layer_id_map.remove(&layer.id());
                stack.extend(layer.children);
            }
        }
        if self.root == Some(key) {
            self.root = None;
        }
        self.needs_full_tree_sync = true;
        self.set_needs_update_draw_properties();
        Ok(())
    }

    pub fn root_layer_id(&self) -> Option<LayerId> {
        self.root.map(|key| self.layers[key].id())
    }

    pub fn layer_list_is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn layer_by_id(&self, layer_id: LayerId) -> Option<&LayerImpl> {
        self.layer_id_map
            .get(&layer_id)
            .map(|&key| &self.layers[key])
    }

    /// Mutable access; any mutation may change draw properties.
    pub fn layer_mut(&mut self, layer_id: LayerId) -> Option<&mut LayerImpl> {
        let key = *self.layer_id_map.get(&layer_id)?;
        self.needs_update_draw_properties = true;
        self.layers.get_mut(key)
    }

    pub fn parent_id(&self, layer_id: LayerId) -> Option<LayerId> {
        let layer = self.layer_by_id(layer_id)?;
        layer.parent.map(|key| self.layers[key].id())
    }

    pub fn children_ids(&self, layer_id: LayerId) -> Vec<LayerId> {
        self.layer_by_id(layer_id)
            .map(|layer| {
                layer
                    .children
                    .iter()
                    .map(|&key| self.layers[key].id())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn pre_order_keys(&self) -> Vec<LayerKey> {
        let mut order = Vec::with_capacity(self.layers.len());
        let Some(root) = self.root else {
            return order;
        };
        let mut stack = vec![root];
        while let Some(key) = stack.pop() {
            order.push(key);
            stack.extend(self.layers[key].children.iter().rev().copied());
        }
        order
    }

    /// Every layer id in paint order (parents before children, siblings back to front).
    pub fn layer_ids_in_tree_order(&self) -> Vec<LayerId> {
        self.pre_order_keys()
            .into_iter()
            .map(|key| self.layers[key].id())
            .collect()
    }

    pub fn is_ancestor(&self, ancestor: LayerId, layer_id: LayerId) -> bool {
        let mut current = Some(layer_id);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent_id(id);
        }
        false
    }

    pub fn picture_layer_ids(&self) -> Vec<LayerId> {
        self.layer_ids_in_tree_order()
            .into_iter()
            .filter(|&id| {
                self.layer_by_id(id)
                    .is_some_and(|layer| layer.contents.is_picture())
            })
            .collect()
    }

    // Viewport layers and tree-level properties.

    pub fn set_viewport_layers(&mut self, viewport_layers: ViewportLayers) {
        self.viewport_layers = viewport_layers;
        self.set_needs_update_draw_properties();
    }

    pub fn viewport_layers(&self) -> ViewportLayers {
        self.viewport_layers
    }

    pub fn inner_viewport_scroll_layer(&self) -> Option<LayerId> {
        self.viewport_layers.inner_viewport_scroll
    }

    pub fn outer_viewport_scroll_layer(&self) -> Option<LayerId> {
        self.viewport_layers.outer_viewport_scroll
    }

    pub fn page_scale_layer(&self) -> Option<LayerId> {
        self.viewport_layers.page_scale
    }

    pub fn inner_viewport_container_layer(&self) -> Option<LayerId> {
        self.inner_viewport_scroll_layer()
            .and_then(|id| self.layer_by_id(id))
            .and_then(|layer| layer.scroll_clip_layer)
    }

    pub fn outer_viewport_container_layer(&self) -> Option<LayerId> {
        self.outer_viewport_scroll_layer()
            .and_then(|id| self.layer_by_id(id))
            .and_then(|layer| layer.scroll_clip_layer)
    }

    pub fn set_hud_layer(&mut self, layer_id: Option<LayerId>) {
        self.hud_layer = layer_id;
    }

    pub fn hud_layer(&self) -> Option<LayerId> {
        self.hud_layer
    }

    pub fn current_page_scale_factor(&self) -> f32 {
        self.page_scale_factor.current()
    }

    pub fn page_scale_factor(&self) -> &SyncedScale {
        &self.page_scale_factor
    }

    pub fn min_page_scale_factor(&self) -> f32 {
        self.min_page_scale_factor
    }

    pub fn max_page_scale_factor(&self) -> f32 {
        self.max_page_scale_factor
    }

    fn clamp_page_scale_factor(&self, page_scale_factor: f32) -> f32 {
        page_scale_factor.clamp(
            self.min_page_scale_factor,
            self.max_page_scale_factor.max(self.min_page_scale_factor),
        )
    }

    /// Impl-side page scale change (pinch, page scale animation).
    pub fn set_page_scale_on_active_tree(&mut self, page_scale_factor: f32) {
        let clamped = self.clamp_page_scale_factor(page_scale_factor);
        if self.page_scale_factor.set_current(clamped) {
            self.did_update_page_scale();
        }
    }

    /// Main-thread commit of the page scale base and its limits.
    pub fn push_page_scale_from_main_thread(
        &mut self,
        page_scale_factor: f32,
        min_page_scale_factor: f32,
        max_page_scale_factor: f32,
    ) {
        self.min_page_scale_factor = min_page_scale_factor;
        self.max_page_scale_factor = max_page_scale_factor;
        self.page_scale_factor.push_from_main_thread(page_scale_factor);
        let clamped = self.clamp_page_scale_factor(self.page_scale_factor.current());
        self.page_scale_factor.set_current(clamped);
        self.did_update_page_scale();
    }

    fn did_update_page_scale(&mut self) {
        self.set_needs_update_draw_properties();
        if let Some(layer) = self
            .page_scale_layer()
            .and_then(|id| self.layer_id_map.get(&id).copied())
        {
            self.layers[layer].layer_property_changed = true;
        }
    }

    pub fn device_scale_factor(&self) -> f32 {
        self.device_scale_factor
    }

    pub fn set_device_scale_factor(&mut self, device_scale_factor: f32) {
        if self.device_scale_factor == device_scale_factor {
            return;
        }
        self.device_scale_factor = device_scale_factor;
        self.set_needs_update_draw_properties();
    }

    pub fn painted_device_scale_factor(&self) -> f32 {
        self.painted_device_scale_factor
    }

    pub fn set_painted_device_scale_factor(&mut self, painted_device_scale_factor: f32) {
        self.painted_device_scale_factor = painted_device_scale_factor;
    }

    pub fn device_viewport_size(&self) -> IntSize {
        self.device_viewport_size
    }

    pub fn set_device_viewport_size(&mut self, size: IntSize) {
        if self.device_viewport_size == size {
            return;
        }
        self.device_viewport_size = size;
        self.set_needs_update_draw_properties();
    }

    pub fn top_controls_height(&self) -> f32 {
        self.top_controls_height
    }

    pub fn top_controls_shrink_content_size(&self) -> bool {
        self.top_controls_shrink_content_size
    }

    pub fn set_top_controls_height(&mut self, height: f32, shrink_content_size: bool) {
        self.top_controls_height = height.max(0.0);
        self.top_controls_shrink_content_size = shrink_content_size;
        self.set_needs_update_draw_properties();
    }

    pub fn current_top_controls_shown_ratio(&self) -> f32 {
        self.top_controls_shown_ratio.current()
    }

    pub fn top_controls_shown_ratio(&self) -> &SyncedTopControls {
        &self.top_controls_shown_ratio
    }

    /// Returns true when the ratio changed. The ratio is clamped to `[0, 1]`.
    pub fn set_current_top_controls_shown_ratio(&mut self, ratio: f32) -> bool {
        let changed = self
            .top_controls_shown_ratio
            .set_current(ratio.clamp(0.0, 1.0));
        if changed {
            self.set_needs_update_draw_properties();
        }
        changed
    }

    /// Snapshots the impl-side page scale and top controls deltas for the next
    /// main frame. Returns `(page_scale_delta, top_controls_delta)`.
    pub fn pull_viewport_deltas_for_main_thread(&mut self) -> (f32, f32) {
        (
            self.page_scale_factor.pull_delta_for_main_thread(),
            self.top_controls_shown_ratio.pull_delta_for_main_thread(),
        )
    }

    pub fn push_top_controls_from_main_thread(&mut self, ratio: f32) {
        self.top_controls_shown_ratio
            .push_from_main_thread(ratio.clamp(0.0, 1.0));
    }

    pub fn background_color(&self) -> Color {
        self.background_color
    }

    pub fn set_background_color(&mut self, color: Color) {
        self.background_color = color;
    }

    pub fn has_transparent_background(&self) -> bool {
        self.has_transparent_background
    }

    pub fn set_has_transparent_background(&mut self, transparent: bool) {
        self.has_transparent_background = transparent;
    }

    pub fn have_scroll_event_handlers(&self) -> bool {
        self.have_scroll_event_handlers
    }

    pub fn set_have_scroll_event_handlers(&mut self, have_handlers: bool) {
        self.have_scroll_event_handlers = have_handlers;
    }

    pub fn source_frame_number(&self) -> i32 {
        self.source_frame_number
    }

    pub fn set_source_frame_number(&mut self, frame_number: i32) {
        self.source_frame_number = frame_number;
    }

    // Flags.

    pub fn needs_update_draw_properties(&self) -> bool {
        self.needs_update_draw_properties
    }

    pub fn set_needs_update_draw_properties(&mut self) {
        self.needs_update_draw_properties = true;
    }

    pub fn needs_full_tree_sync(&self) -> bool {
        self.needs_full_tree_sync
    }

    pub fn set_needs_full_tree_sync(&mut self, needs_sync: bool) {
        self.needs_full_tree_sync = needs_sync;
    }

    pub fn viewport_size_invalid(&self) -> bool {
        self.viewport_size_invalid
    }

    pub fn set_viewport_size_invalid(&mut self) {
        self.viewport_size_invalid = true;
    }

    pub fn reset_viewport_size_invalid(&mut self) {
        self.viewport_size_invalid = false;
    }

    /// Set when memory pressure took away the content this tree draws. Only a
    /// commit of fresh content clears it.
    pub fn contents_textures_purged(&self) -> bool {
        self.contents_textures_purged
    }

    /// Returns whether the flag changed.
    pub fn set_contents_textures_purged(&mut self) -> bool {
        !std::mem::replace(&mut self.contents_textures_purged, true)
    }

    /// Returns whether the flag changed.
    pub fn reset_contents_textures_purged(&mut self) -> bool {
        std::mem::replace(&mut self.contents_textures_purged, false)
    }

    pub fn requires_high_res_to_draw(&self) -> bool {
        self.requires_high_res_to_draw
    }

    pub fn set_requires_high_res_to_draw(&mut self) {
        self.requires_high_res_to_draw = true;
    }

    pub fn reset_requires_high_res_to_draw(&mut self) {
        self.requires_high_res_to_draw = false;
    }

    pub fn has_ever_been_drawn(&self) -> bool {
        self.has_ever_been_drawn
    }

    pub fn set_has_ever_been_drawn(&mut self, drawn: bool) {
        self.has_ever_been_drawn = drawn;
    }

    // Swap promises, UI resource requests, page scale animation.

    pub fn queue_swap_promise(&mut self, promise: Box<dyn SwapPromise>) {
        self.swap_promises.push(promise);
    }

    pub fn swap_promise_count(&self) -> usize {
        self.swap_promises.len()
    }

    pub fn finish_swap_promises(&mut self, metadata: &mut CompositorFrameMetadata) {
        for mut promise in self.swap_promises.drain(..) {
            promise.did_swap(metadata);
        }
    }

    pub fn break_swap_promises(&mut self, reason: DidNotSwapReason) {
        for mut promise in self.swap_promises.drain(..) {
            promise.did_not_swap(reason);
        }
    }

    pub fn queue_ui_resource_request(&mut self, request: UiResourceRequest) {
        self.ui_resource_request_queue.push(request);
    }

    pub fn take_ui_resource_request_queue(&mut self) -> Vec<UiResourceRequest> {
        std::mem::take(&mut self.ui_resource_request_queue)
    }

    pub fn set_pending_page_scale_animation(&mut self, animation: PendingPageScaleAnimation) {
        self.pending_page_scale_animation = Some(animation);
    }

    pub fn take_pending_page_scale_animation(&mut self) -> Option<PendingPageScaleAnimation> {
        self.pending_page_scale_animation.take()
    }

    // Change tracking.

    pub fn reset_all_change_tracking(&mut self) {
        for layer in self.layers.values_mut() {
            layer.reset_change_tracking();
        }
    }

    pub fn did_become_active(&mut self) {
        self.reset_viewport_size_invalid();
        self.set_needs_update_draw_properties();
        if !self.has_ever_been_drawn {
            for tracker in self.damage_trackers.values_mut() {
                tracker.force_full_damage_next_update();
            }
        }
    }

    /// Drops draw-time state; layers redraw in full once resources come back.
    pub fn release_resources(&mut self) {
        for layer in self.layers.values_mut() {
            layer.draw_properties = DrawProperties::default();
            layer.layer_property_changed = true;
        }
        self.render_surfaces.clear();
        self.render_surface_layer_list.clear();
        self.set_needs_update_draw_properties();
    }

    pub fn recreate_resources(&mut self) {
        self.set_needs_update_draw_properties();
    }

    // Animations.

    pub fn activate_animations(&mut self) {
        for layer in self.layers.values_mut() {
            for animation in &mut layer.animations {
                animation.activate();
            }
        }
    }

    /// Ticks running layer animations. Returns true when any value changed.
    pub fn animate_layers(&mut self, now: Instant) -> bool {
        let mut did_animate = false;
        for layer in self.layers.values_mut() {
            let mut opacity = None;
            let mut translation = None;
            for animation in &mut layer.animations {
                match animation.tick(now) {
                    Some(AnimatedValue::Opacity(value)) => opacity = Some(value),
                    Some(AnimatedValue::Translation(value)) => translation = Some(value),
                    None => {}
                }
            }
            if let Some(value) = opacity {
                layer.opacity = value;
                layer.layer_property_changed = true;
                did_animate = true;
            }
            if let Some(value) = translation {
                layer.transform = compositor_protocol::Transform::translation(value.x, value.y);
                layer.layer_property_changed = true;
                layer.was_ever_ready_since_last_transform_animation = false;
                did_animate = true;
            }
            layer
                .animations
                .retain(|animation| animation.run_state() != RunState::Finished);
        }
        if did_animate {
            self.set_needs_update_draw_properties();
        }
        did_animate
    }

    pub fn has_running_animations(&self) -> bool {
        self.layers
            .values()
            .any(|layer| layer.animations.iter().any(LayerAnimation::is_running))
    }

    // Derived state.

    pub fn property_trees(&self) -> &PropertyTrees {
        &self.property_trees
    }

    pub fn scroll_tree(&self) -> &ScrollTree {
        &self.property_trees.scroll_tree
    }

    pub fn currently_scrolling_layer(&self) -> Option<LayerId> {
        self.property_trees.scroll_tree.currently_scrolling_layer()
    }

    pub fn set_currently_scrolling_layer(&mut self, layer_id: Option<LayerId>) {
        self.property_trees
            .scroll_tree
            .set_currently_scrolling_layer(layer_id);
    }

    pub fn clear_currently_scrolling_layer(&mut self) {
        self.set_currently_scrolling_layer(None);
    }

    pub fn render_surface_layer_list(&self) -> &[LayerId] {
        &self.render_surface_layer_list
    }

    pub fn render_surface(&self, owner: LayerId) -> Option<&RenderSurfaceImpl> {
        self.render_surfaces.get(&owner)
    }

    pub fn root_render_surface(&self) -> Option<&RenderSurfaceImpl> {
        self.root_layer_id()
            .and_then(|id| self.render_surfaces.get(&id))
    }

    pub fn damage_tracker(&self, owner: LayerId) -> Option<&DamageTracker> {
        self.damage_trackers.get(&owner)
    }

    pub fn damage_tracker_mut(&mut self, owner: LayerId) -> &mut DamageTracker {
        self.damage_trackers.entry(owner).or_default()
    }
}
