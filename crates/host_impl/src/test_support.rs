//! Recording fakes for host tests.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use compositor_protocol::{
    CompositorFrameMetadata, HostImplClient, InputHandlerClient, IntRect, IntSize, LayerId,
    OutputSurface, OutputSurfaceCapabilities, RectF, RenderPass, RenderPassId, Renderer,
    RendererCapabilities, RendererKind, SizeF, VectorF,
};
use layer_tree::{LayerContents, LayerImpl, LayerTreeImpl, ViewportLayers};
use tiles::{RasterOutcome, RasterTask, Rasterizer};

use crate::{LayerTreeHostImpl, LayerTreeSettings};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[derive(Debug, Default, Clone)]
pub struct ClientLog {
    pub needs_commit: usize,
    pub needs_redraw: usize,
    pub redraw_rects: Vec<RectF>,
    pub needs_one_begin_impl_frame: usize,
    pub needs_prepare_tiles: usize,
    pub can_draw_states: Vec<bool>,
    pub ready_to_activate: usize,
    pub ready_to_draw: usize,
    pub did_activate: usize,
    pub renew_tree_priority: usize,
    pub lost_output_surface: usize,
    pub completed_page_scale_animations: usize,
    pub renderer_capabilities_updates: usize,
}

impl ClientLog {
    pub fn last_can_draw(&self) -> Option<bool> {
        self.can_draw_states.last().copied()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordingClient {
    log: Arc<Mutex<ClientLog>>,
}

impl RecordingClient {
    pub fn snapshot(&self) -> ClientLog {
        lock(&self.log).clone()
    }

    pub fn reset(&self) {
        *lock(&self.log) = ClientLog::default();
    }
}

impl HostImplClient for RecordingClient {
    fn set_needs_commit_on_impl_thread(&mut self) {
        lock(&self.log).needs_commit += 1;
    }

    fn set_needs_redraw_on_impl_thread(&mut self) {
        lock(&self.log).needs_redraw += 1;
    }

    fn set_needs_redraw_rect_on_impl_thread(&mut self, damage_rect: RectF) {
        lock(&self.log).redraw_rects.push(damage_rect);
    }

    fn set_needs_one_begin_impl_frame_on_impl_thread(&mut self) {
        lock(&self.log).needs_one_begin_impl_frame += 1;
    }

    fn set_needs_prepare_tiles_on_impl_thread(&mut self) {
        lock(&self.log).needs_prepare_tiles += 1;
    }

    fn on_can_draw_state_changed(&mut self, can_draw: bool) {
        lock(&self.log).can_draw_states.push(can_draw);
    }

    fn notify_ready_to_activate(&mut self) {
        lock(&self.log).ready_to_activate += 1;
    }

    fn notify_ready_to_draw(&mut self) {
        lock(&self.log).ready_to_draw += 1;
    }

    fn did_activate_sync_tree(&mut self) {
        lock(&self.log).did_activate += 1;
    }

    fn renew_tree_priority(&mut self) {
        lock(&self.log).renew_tree_priority += 1;
    }

    fn did_lose_output_surface_on_impl_thread(&mut self) {
        lock(&self.log).lost_output_surface += 1;
    }

    fn did_complete_page_scale_animation_on_impl_thread(&mut self) {
        lock(&self.log).completed_page_scale_animations += 1;
    }

    fn update_renderer_capabilities_on_impl_thread(&mut self) {
        lock(&self.log).renderer_capabilities_updates += 1;
    }
}

#[derive(Debug, Default, Clone)]
pub struct RendererLog {
    /// Pass ids of every drawn frame, in the order the renderer received them.
    pub drawn_frames: Vec<Vec<RenderPassId>>,
    pub swaps: Vec<CompositorFrameMetadata>,
    pub visible: Option<bool>,
    pub kind: Option<RendererKind>,
}

#[derive(Debug)]
pub struct FakeRenderer {
    log: Arc<Mutex<RendererLog>>,
}

impl Renderer for FakeRenderer {
    fn draw_frame(
        &mut self,
        render_passes: &mut Vec<RenderPass>,
        _device_scale_factor: f32,
        _device_viewport_rect: IntRect,
        _device_clip_rect: IntRect,
        _disable_image_filtering: bool,
    ) {
        let ids = render_passes.drain(..).map(|pass| pass.id).collect();
        lock(&self.log).drawn_frames.push(ids);
    }

    fn swap_buffers(&mut self, metadata: CompositorFrameMetadata) {
        lock(&self.log).swaps.push(metadata);
    }

    fn set_visible(&mut self, visible: bool) {
        lock(&self.log).visible = Some(visible);
    }

    fn capabilities(&self) -> RendererCapabilities {
        RendererCapabilities {
            max_texture_size: 4096,
            using_partial_swap: false,
            allow_partial_texture_updates: false,
        }
    }
}

#[derive(Debug)]
pub struct FakeOutputSurface {
    pub capabilities: OutputSurfaceCapabilities,
    pub bind_succeeds: bool,
    pub renderer_log: Arc<Mutex<RendererLog>>,
    pub detached: Arc<Mutex<bool>>,
}

impl FakeOutputSurface {
    /// A GL surface that never needs forced reclaims, so frames without
    /// damage are skipped.
    pub fn gl() -> Self {
        Self {
            capabilities: OutputSurfaceCapabilities {
                has_context: true,
                max_frames_pending: 1,
                ..OutputSurfaceCapabilities::default()
            },
            bind_succeeds: true,
            renderer_log: Arc::default(),
            detached: Arc::default(),
        }
    }
}

impl OutputSurface for FakeOutputSurface {
    fn bind_to_client(&mut self) -> bool {
        self.bind_succeeds
    }

    fn detach_from_client(&mut self) {
        *lock(&self.detached) = true;
    }

    fn capabilities(&self) -> OutputSurfaceCapabilities {
        self.capabilities
    }

    fn force_reclaim_resources(&mut self) {}

    fn create_renderer(&mut self, kind: RendererKind) -> Box<dyn Renderer> {
        lock(&self.renderer_log).kind = Some(kind);
        Box::new(FakeRenderer {
            log: self.renderer_log.clone(),
        })
    }
}

#[derive(Debug, Default)]
pub struct CompletingRasterizer;

impl Rasterizer for CompletingRasterizer {
    fn rasterize(&self, _task: &RasterTask) -> RasterOutcome {
        RasterOutcome::Completed
    }
}

#[derive(Debug, Default, Clone)]
pub struct OverscrollLog {
    pub overscrolls: Vec<(VectorF, VectorF)>,
    pub animate_calls: usize,
    pub shut_down: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RecordingInputHandlerClient {
    pub log: Arc<Mutex<OverscrollLog>>,
}

impl InputHandlerClient for RecordingInputHandlerClient {
    fn animate(&mut self, _monotonic_time: Instant) {
        lock(&self.log).animate_calls += 1;
    }

    fn did_overscroll(&mut self, accumulated_overscroll: VectorF, latest_overscroll_delta: VectorF) {
        lock(&self.log)
            .overscrolls
            .push((accumulated_overscroll, latest_overscroll_delta));
    }

    fn will_shutdown(&mut self) {
        lock(&self.log).shut_down = true;
    }
}

pub struct Harness {
    pub host: LayerTreeHostImpl,
    pub client: RecordingClient,
    pub renderer_log: Arc<Mutex<RendererLog>>,
}

impl Harness {
    pub fn renderer_log(&self) -> RendererLog {
        lock(&self.renderer_log).clone()
    }
}

pub fn test_settings() -> LayerTreeSettings {
    LayerTreeSettings {
        commit_to_active_tree: true,
        raster_worker_count: 0,
        ..LayerTreeSettings::default()
    }
}

/// A visible host with a GL renderer and a 100x100 viewport.
pub fn harness_with_settings(settings: LayerTreeSettings) -> Harness {
    let client = RecordingClient::default();
    let mut host = LayerTreeHostImpl::new(
        settings,
        Box::new(client.clone()),
        Arc::new(CompletingRasterizer),
    );
    let output_surface = FakeOutputSurface::gl();
    let renderer_log = output_surface.renderer_log.clone();
    host.initialize_renderer(Box::new(output_surface))
        .expect("gl output surface should bind");
    host.set_visible(true);
    host.set_viewport_size(IntSize::new(100, 100));
    Harness {
        host,
        client,
        renderer_log,
    }
}

pub fn harness() -> Harness {
    harness_with_settings(test_settings())
}

pub fn layer(id: i32, width: f32, height: f32) -> LayerImpl {
    let mut layer = LayerImpl::new(LayerId(id));
    layer.bounds = SizeF::new(width, height);
    layer
}

pub fn solid_layer(id: i32, width: f32, height: f32) -> LayerImpl {
    let mut layer = layer(id, width, height);
    layer.draws_content = true;
    layer.contents_opaque = true;
    layer.contents = LayerContents::SolidColor(compositor_protocol::Color::WHITE);
    layer
}

pub fn picture_layer(id: i32, width: f32, height: f32) -> LayerImpl {
    let mut layer = layer(id, width, height);
    layer.draws_content = true;
    layer.contents = LayerContents::Picture {
        recorded_size: SizeF::new(width, height),
    };
    layer
}

pub const ROOT: LayerId = LayerId(1);
pub const INNER_CONTAINER: LayerId = LayerId(2);
pub const INNER_SCROLL: LayerId = LayerId(3);
pub const PAGE_SCALE: LayerId = LayerId(4);
pub const OUTER_CONTAINER: LayerId = LayerId(5);
pub const OUTER_SCROLL: LayerId = LayerId(6);
pub const CONTENT: LayerId = LayerId(7);

/// root > inner container > inner scroll > page scale > outer container >
/// outer scroll > content. The outer viewport scrolls `content_size`.
pub fn setup_viewport_layers(tree: &mut LayerTreeImpl, viewport: f32, content_size: SizeF) {
    tree.set_root_layer(solid_layer(ROOT.0, viewport, viewport));
    tree.add_child(ROOT, layer(INNER_CONTAINER.0, viewport, viewport))
        .expect("inner container");
    let mut inner = layer(INNER_SCROLL.0, viewport, viewport);
    inner.scroll_clip_layer = Some(INNER_CONTAINER);
    tree.add_child(INNER_CONTAINER, inner).expect("inner scroll");
    tree.add_child(INNER_SCROLL, LayerImpl::new(PAGE_SCALE))
        .expect("page scale");
    tree.add_child(PAGE_SCALE, layer(OUTER_CONTAINER.0, viewport, viewport))
        .expect("outer container");
    let mut outer = layer(OUTER_SCROLL.0, content_size.width, content_size.height);
    outer.scroll_clip_layer = Some(OUTER_CONTAINER);
    tree.add_child(OUTER_CONTAINER, outer).expect("outer scroll");
    tree.add_child(
        OUTER_SCROLL,
        solid_layer(CONTENT.0, content_size.width, content_size.height),
    )
    .expect("content");
    tree.set_viewport_layers(ViewportLayers {
        page_scale: Some(PAGE_SCALE),
        inner_viewport_scroll: Some(INNER_SCROLL),
        outer_viewport_scroll: Some(OUTER_SCROLL),
    });
    tree.push_page_scale_from_main_thread(1.0, 1.0, 4.0);
}
