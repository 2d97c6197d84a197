use std::time::Duration;

use compositor_protocol::IntSize;

/// Construction-time configuration of the impl-side host. Never mutated after
/// `LayerTreeHostImpl::new`.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerTreeSettings {
    /// Commits land on the active tree directly; there is no pending tree.
    pub commit_to_active_tree: bool,
    /// The embedder animates root flings itself.
    pub ignore_root_layer_flings: bool,
    pub report_overscroll_only_for_scrollable_axes: bool,
    pub using_synchronous_renderer_compositor: bool,
    /// Share of the hard memory limit tiles may use for prepaint, in percent.
    pub max_memory_for_prepaint_percentage: usize,
    pub scheduled_raster_task_limit: usize,
    pub default_tile_size: IntSize,
    pub tile_interest_margin: i32,
    pub top_controls_show_threshold: f32,
    pub top_controls_hide_threshold: f32,
    pub scrollbar_fade_delay: Duration,
    pub scrollbar_fade_duration: Duration,
    pub page_scale_animation_duration_default: Duration,
    /// Zero rasters synchronously on the impl thread.
    pub raster_worker_count: usize,
}

impl Default for LayerTreeSettings {
    fn default() -> Self {
        Self {
            commit_to_active_tree: false,
            ignore_root_layer_flings: false,
            report_overscroll_only_for_scrollable_axes: false,
            using_synchronous_renderer_compositor: false,
            max_memory_for_prepaint_percentage: 100,
            scheduled_raster_task_limit: 32,
            default_tile_size: IntSize::new(256, 256),
            tile_interest_margin: 256,
            top_controls_show_threshold: 0.5,
            top_controls_hide_threshold: 0.5,
            scrollbar_fade_delay: Duration::from_millis(300),
            scrollbar_fade_duration: Duration::from_millis(300),
            page_scale_animation_duration_default: Duration::from_millis(250),
            raster_worker_count: 2,
        }
    }
}

/// Debug switches. Replaced wholesale through `LayerTreeHostImpl::set_debug_state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DebugState {
    pub show_fps_counter: bool,
    pub rasterize_only_visible_content: bool,
    pub show_hud_rects: bool,
}

impl DebugState {
    /// The HUD layer redraws every frame when it has something to show.
    pub fn show_hud_info(&self) -> bool {
        self.show_fps_counter || self.show_hud_rects
    }
}
