use std::time::Instant;

use crate::frame::{CompositorFrameMetadata, RenderPass};
use crate::{IntRect, RectF, VectorF};

/// Scheduling hints emitted by the compositor core. None of these block.
pub trait HostImplClient {
    fn set_needs_commit_on_impl_thread(&mut self);
    fn set_needs_redraw_on_impl_thread(&mut self);
    fn set_needs_redraw_rect_on_impl_thread(&mut self, damage_rect: RectF);
    fn set_needs_one_begin_impl_frame_on_impl_thread(&mut self);
    fn set_needs_prepare_tiles_on_impl_thread(&mut self);
    fn on_can_draw_state_changed(&mut self, can_draw: bool);
    fn notify_ready_to_activate(&mut self);
    fn notify_ready_to_draw(&mut self);
    fn did_activate_sync_tree(&mut self);
    fn renew_tree_priority(&mut self);
    fn did_lose_output_surface_on_impl_thread(&mut self);
    fn did_complete_page_scale_animation_on_impl_thread(&mut self);
    fn will_prepare_tiles(&mut self) {}
    fn did_prepare_tiles(&mut self) {}
    fn update_renderer_capabilities_on_impl_thread(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RendererCapabilities {
    pub max_texture_size: u32,
    pub using_partial_swap: bool,
    pub allow_partial_texture_updates: bool,
}

/// Backends draw a frame's passes; `draw_frame` must drain `render_passes`.
pub trait Renderer {
    fn draw_frame(
        &mut self,
        render_passes: &mut Vec<RenderPass>,
        device_scale_factor: f32,
        device_viewport_rect: IntRect,
        device_clip_rect: IntRect,
        disable_image_filtering: bool,
    );
    fn swap_buffers(&mut self, metadata: CompositorFrameMetadata);
    fn set_visible(&mut self, visible: bool);
    fn capabilities(&self) -> RendererCapabilities;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererKind {
    Delegating,
    Gl,
    Software,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OutputSurfaceCapabilities {
    pub delegated_rendering: bool,
    pub has_context: bool,
    pub has_software_device: bool,
    pub can_force_reclaim_resources: bool,
    pub max_frames_pending: u32,
}

impl OutputSurfaceCapabilities {
    pub fn renderer_kind(&self) -> Option<RendererKind> {
        if self.delegated_rendering {
            Some(RendererKind::Delegating)
        } else if self.has_context {
            Some(RendererKind::Gl)
        } else if self.has_software_device {
            Some(RendererKind::Software)
        } else {
            None
        }
    }
}

pub trait OutputSurface {
    fn bind_to_client(&mut self) -> bool;
    fn detach_from_client(&mut self) {}
    fn capabilities(&self) -> OutputSurfaceCapabilities;
    fn force_reclaim_resources(&mut self);
    fn create_renderer(&mut self, kind: RendererKind) -> Box<dyn Renderer>;
}

/// The embedder side of input handling.
pub trait InputHandlerClient {
    fn animate(&mut self, monotonic_time: Instant);
    fn did_overscroll(
        &mut self,
        accumulated_overscroll: VectorF,
        latest_overscroll_delta: VectorF,
    );
    fn will_shutdown(&mut self);
    fn main_thread_has_stopped_flinging(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renderer_kind_prefers_delegation_over_context() {
        let capabilities = OutputSurfaceCapabilities {
            delegated_rendering: true,
            has_context: true,
            ..Default::default()
        };
        assert_eq!(capabilities.renderer_kind(), Some(RendererKind::Delegating));

        let software = OutputSurfaceCapabilities {
            has_software_device: true,
            ..Default::default()
        };
        assert_eq!(software.renderer_kind(), Some(RendererKind::Software));
        assert_eq!(OutputSurfaceCapabilities::default().renderer_kind(), None);
    }
}
