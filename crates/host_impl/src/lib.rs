//! Impl-thread compositor core.
//!
//! `LayerTreeHostImpl` owns the active/pending/recycle trees and drives them
//! through commit, activation, draw and swap. It never schedules itself; every
//! "needs redraw/commit/prepare tiles" decision is reported to a
//! `HostImplClient` and the embedder's scheduler calls back in.
//!
//! Internal architecture overview:
//! - `trees`: the tree triple and the only code that changes tree roles.
//! - `lifecycle`: commit, activation, viewport sizing, `can_draw`, visibility.
//! - `draw`: frame preparation, render pass assembly, draw and swap.
//! - `input`: scroll, fling and pinch handling with viewport bubbling.
//! - `memory`: memory policy, tile priorities and tile manager notifications.
//! - `ui_resources`: embedder bitmaps and their eviction state.
//! - `animation`: per-frame ticking of page scale, layers, scrollbars and top controls.
//! - `output_surface`: renderer and resource lifetime across output surfaces.

mod animation;
mod draw;
mod input;
mod lifecycle;
mod memory;
mod output_surface;
mod settings;
mod trees;
mod ui_resources;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use compositor_protocol::{
    HostImplClient, InputHandlerClient, IntRect, IntSize, LayerId, OutputSurface, RectF, Renderer,
    ResourceId, SwapPromise, VectorF,
};
use layer_tree::LayerTreeImpl;
use tiles::{
    GlobalTileState, ManagedMemoryPolicy, Rasterizer, ResourceProvider, SynchronousTaskGraphRunner,
    TaskGraphRunner, TileManager, TileManagerSettings, WorkerPoolTaskGraphRunner,
};
use viewport::{PageScaleAnimation, TopControlsManager, Viewport};

pub use animation::ScrollbarFadeController;
pub use draw::FrameData;
pub use output_surface::InitializeRendererError;
pub use settings::{DebugState, LayerTreeSettings};
pub use trees::TreeSet;
pub use ui_resources::UiResourceError;

use ui_resources::UiResourceMap;

/// Cross-thread handoff points with the main thread are `begin_commit`,
/// `commit_complete` and `process_scroll_deltas`; everything else runs on the
/// impl thread only.
pub struct LayerTreeHostImpl {
    settings: LayerTreeSettings,
    debug_state: DebugState,
    client: Box<dyn HostImplClient>,
    input_handler_client: Option<Box<dyn InputHandlerClient>>,
    trees: TreeSet,

    output_surface: Option<Box<dyn OutputSurface>>,
    renderer: Option<Box<dyn Renderer>>,
    resource_provider: Option<ResourceProvider>,
    tile_manager: TileManager,
    global_tile_state: GlobalTileState,
    cached_managed_memory_policy: ManagedMemoryPolicy,
    /// Largest budget the committed content could use. Policies above it on
    /// both sides of a change need no new commit.
    max_memory_needed_bytes: usize,
    tile_priorities_dirty: bool,
    is_likely_to_require_a_draw: bool,

    visible: bool,
    device_viewport_size: IntSize,
    viewport_damage_rect: RectF,
    external_viewport: IntRect,
    external_clip: IntRect,
    viewport_rect_for_tile_priority: IntRect,
    resourceless_software_draw: bool,

    ui_resources: UiResourceMap,
    /// Backing of the heads-up display layer and the size it was made for.
    hud_resource: Option<(ResourceId, IntSize)>,

    viewport: Viewport,
    top_controls_manager: TopControlsManager,
    did_lock_scrolling_layer: bool,
    wheel_scrolling: bool,
    scroll_affects_scroll_handler: bool,
    accumulated_root_overscroll: VectorF,
    pinch_gesture_active: bool,
    pinch_gesture_end_should_clear_scrolling_layer: bool,

    page_scale_animation: Option<PageScaleAnimation>,
    scrollbar_animation_controllers: HashMap<LayerId, ScrollbarFadeController>,
    swap_promises_for_main_thread_scroll_update: Vec<Box<dyn SwapPromise>>,
    /// Frame time of the current impl frame, or of the last one once it finished.
    begin_frame_time: Option<Instant>,
    inside_impl_frame: bool,
}

impl fmt::Debug for LayerTreeHostImpl {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("LayerTreeHostImpl")
            .field("trees", &self.trees)
            .field("visible", &self.visible)
            .field("has_renderer", &self.renderer.is_some())
            .field("device_viewport_size", &self.device_viewport_size)
            .field("global_tile_state", &self.global_tile_state)
            .finish()
    }
}

impl LayerTreeHostImpl {
    pub fn new(
        settings: LayerTreeSettings,
        client: Box<dyn HostImplClient>,
        rasterizer: Arc<dyn Rasterizer>,
    ) -> Self {
        let runner: Box<dyn TaskGraphRunner> = if settings.raster_worker_count == 0 {
            Box::new(SynchronousTaskGraphRunner::new(rasterizer))
        } else {
            match WorkerPoolTaskGraphRunner::new(settings.raster_worker_count, rasterizer.clone()) {
                Ok(runner) => Box::new(runner),
                Err(error) => {
                    log::warn!(
                        "[host_impl] raster worker pool unavailable, rastering on the impl thread: {error}"
                    );
                    Box::new(SynchronousTaskGraphRunner::new(rasterizer))
                }
            }
        };
        let tile_manager = TileManager::new(
            TileManagerSettings {
                tile_size: settings.default_tile_size,
                interest_margin: settings.tile_interest_margin,
                scheduled_raster_task_limit: settings.scheduled_raster_task_limit,
            },
            runner,
        );
        let top_controls_manager = TopControlsManager::new(
            settings.top_controls_show_threshold,
            settings.top_controls_hide_threshold,
        );

        Self {
            settings,
            debug_state: DebugState::default(),
            client,
            input_handler_client: None,
            trees: TreeSet::new(),
            output_surface: None,
            renderer: None,
            resource_provider: None,
            tile_manager,
            global_tile_state: GlobalTileState::default(),
            cached_managed_memory_policy: ManagedMemoryPolicy::default(),
            max_memory_needed_bytes: 0,
            tile_priorities_dirty: false,
            is_likely_to_require_a_draw: false,
            visible: false,
            device_viewport_size: IntSize::zero(),
            viewport_damage_rect: RectF::zero(),
            external_viewport: IntRect::zero(),
            external_clip: IntRect::zero(),
            viewport_rect_for_tile_priority: IntRect::zero(),
            resourceless_software_draw: false,
            ui_resources: UiResourceMap::default(),
            hud_resource: None,
            viewport: Viewport::new(),
            top_controls_manager,
            did_lock_scrolling_layer: false,
            wheel_scrolling: false,
            scroll_affects_scroll_handler: false,
            accumulated_root_overscroll: VectorF::zero(),
            pinch_gesture_active: false,
            pinch_gesture_end_should_clear_scrolling_layer: false,
            page_scale_animation: None,
            scrollbar_animation_controllers: HashMap::new(),
            swap_promises_for_main_thread_scroll_update: Vec::new(),
            begin_frame_time: None,
            inside_impl_frame: false,
        }
    }

    pub fn settings(&self) -> &LayerTreeSettings {
        &self.settings
    }

    pub fn debug_state(&self) -> DebugState {
        self.debug_state
    }

    pub fn commit_to_active_tree(&self) -> bool {
        self.settings.commit_to_active_tree
    }

    pub fn set_input_handler_client(&mut self, client: Option<Box<dyn InputHandlerClient>>) {
        if let Some(mut previous) = self.input_handler_client.take() {
            previous.will_shutdown();
        }
        self.input_handler_client = client;
    }

    pub fn active_tree(&self) -> &LayerTreeImpl {
        self.trees.active()
    }

    pub fn active_tree_mut(&mut self) -> &mut LayerTreeImpl {
        self.trees.active_mut()
    }

    pub fn pending_tree(&self) -> Option<&LayerTreeImpl> {
        self.trees.pending()
    }

    pub fn pending_tree_mut(&mut self) -> Option<&mut LayerTreeImpl> {
        self.trees.pending_mut()
    }

    pub fn recycle_tree(&self) -> Option<&LayerTreeImpl> {
        self.trees.recycle()
    }

    /// Where the next commit lands: the pending tree, or the active tree when
    /// committing to it directly.
    pub fn sync_tree(&self) -> &LayerTreeImpl {
        self.trees.sync_tree()
    }

    pub fn sync_tree_mut(&mut self) -> &mut LayerTreeImpl {
        self.trees.sync_tree_mut()
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    pub fn device_viewport_size(&self) -> IntSize {
        self.device_viewport_size
    }

    pub fn tile_manager(&self) -> &TileManager {
        &self.tile_manager
    }

    pub fn global_tile_state(&self) -> &GlobalTileState {
        &self.global_tile_state
    }

    pub fn has_renderer(&self) -> bool {
        self.renderer.is_some()
    }

    pub fn hud_resource(&self) -> Option<ResourceId> {
        self.hud_resource.map(|(resource_id, _)| resource_id)
    }

    pub fn resource_provider(&self) -> Option<&ResourceProvider> {
        self.resource_provider.as_ref()
    }

    pub fn is_likely_to_require_a_draw(&self) -> bool {
        self.is_likely_to_require_a_draw
    }

    pub fn accumulated_root_overscroll(&self) -> VectorF {
        self.accumulated_root_overscroll
    }

    pub fn pinch_gesture_active(&self) -> bool {
        self.pinch_gesture_active
    }

    pub fn page_scale_animation_active(&self) -> bool {
        self.page_scale_animation.is_some()
    }

    pub fn top_controls_manager(&self) -> &TopControlsManager {
        &self.top_controls_manager
    }

    fn inner_viewport_scroll_layer(&self) -> Option<LayerId> {
        self.trees.active().inner_viewport_scroll_layer()
    }

    fn outer_viewport_scroll_layer(&self) -> Option<LayerId> {
        self.trees.active().outer_viewport_scroll_layer()
    }

    fn currently_scrolling_layer(&self) -> Option<LayerId> {
        self.trees.active().currently_scrolling_layer()
    }
}

impl Drop for LayerTreeHostImpl {
    fn drop(&mut self) {
        if let Some(mut input_handler_client) = self.input_handler_client.take() {
            input_handler_client.will_shutdown();
        }
        self.trees
            .for_each_tree_mut(|tree| tree.break_swap_promises(compositor_protocol::DidNotSwapReason::SwapFails));
        for mut promise in self.swap_promises_for_main_thread_scroll_update.drain(..) {
            promise.did_not_swap(compositor_protocol::DidNotSwapReason::SwapFails);
        }
        self.release_output_surface();
    }
}

#[cfg(test)]
mod test_support;
#[cfg(test)]
mod tests;
