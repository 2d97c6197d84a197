use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use compositor_protocol::{
    CompositorFrameMetadata, CopyOutputRequest, CopyOutputResult, DidNotSwapReason, DrawResult,
    IntSize, LayerId, PointF, RenderPassId, ScrollInputType, ScrollState, ScrollThread, SizeF,
    SwapPromise, UiResourceBitmap, UiResourceId, VectorF,
};
use layer_tree::{AnimationTarget, LayerAnimation, LayerContents, UiResourceRequest};
use tiles::{ManagedMemoryPolicy, WhichTree};

use super::test_support::*;
use super::*;

fn draw_frame(host: &mut LayerTreeHostImpl) -> (DrawResult, bool) {
    let mut frame = FrameData::default();
    let result = host.prepare_to_draw(&mut frame);
    host.draw_layers(&mut frame);
    host.did_draw_all_layers(&mut frame);
    let swapped = host.swap_buffers(&frame);
    (result, swapped)
}

fn wheel_begin(host: &mut LayerTreeHostImpl, x: f32, y: f32) -> ScrollThread {
    let mut state = ScrollState::new(VectorF::zero(), PointF::new(x, y));
    host.scroll_begin(&mut state, ScrollInputType::Wheel).thread
}

fn wheel_update(host: &mut LayerTreeHostImpl, delta: VectorF) -> compositor_protocol::InputHandlerScrollResult {
    let mut state = ScrollState::new(delta, PointF::new(10.0, 10.0));
    host.scroll_by(&mut state)
}

const CHILD_CLIP: LayerId = LayerId(8);
const CHILD_SCROLL: LayerId = LayerId(9);

/// Viewport with a 50x50 scroller at the content origin that can move 50px down.
fn nested_scroller_harness() -> Harness {
    let mut harness = harness();
    let tree = harness.host.active_tree_mut();
    setup_viewport_layers(tree, 100.0, SizeF::new(100.0, 300.0));
    let mut clip = layer(CHILD_CLIP.0, 50.0, 50.0);
    clip.masks_to_bounds = true;
    tree.add_child(CONTENT, clip).expect("child clip");
    let mut scroller = solid_layer(CHILD_SCROLL.0, 50.0, 100.0);
    scroller.scroll_clip_layer = Some(CHILD_CLIP);
    tree.add_child(CHILD_CLIP, scroller).expect("child scroller");
    harness
}

#[test]
fn frame_without_damage_is_neither_drawn_nor_swapped() {
    let mut harness = harness();
    harness
        .host
        .active_tree_mut()
        .set_root_layer(solid_layer(1, 100.0, 100.0));
    assert!(harness.host.can_draw());

    let (first, swapped) = draw_frame(&mut harness.host);
    assert_eq!(first, DrawResult::Success);
    assert!(swapped);

    let (second, swapped_again) = draw_frame(&mut harness.host);
    assert_eq!(second, DrawResult::Success);
    assert!(!swapped_again);

    let log = harness.renderer_log();
    assert_eq!(log.drawn_frames.len(), 1);
    assert_eq!(log.swaps.len(), 1);
}

#[test]
fn render_passes_reach_the_renderer_children_first() {
    let mut harness = harness();
    let tree = harness.host.active_tree_mut();
    tree.set_root_layer(solid_layer(1, 100.0, 100.0));
    let mut group = solid_layer(2, 50.0, 50.0);
    group.position = PointF::new(10.0, 10.0);
    group.force_render_surface = true;
    tree.add_child(LayerId(1), group).expect("group");

    let (result, swapped) = draw_frame(&mut harness.host);
    assert_eq!(result, DrawResult::Success);
    assert!(swapped);

    let log = harness.renderer_log();
    assert_eq!(
        log.drawn_frames,
        vec![vec![
            RenderPassId::new(LayerId(2), 0),
            RenderPassId::new(LayerId(1), 0)
        ]]
    );
}

#[test]
fn pending_tree_activates_after_tiles_report_ready() {
    let mut harness = harness_with_settings(LayerTreeSettings {
        commit_to_active_tree: false,
        ..test_settings()
    });
    harness.host.begin_commit();
    harness
        .host
        .pending_tree_mut()
        .expect("begin_commit should create a pending tree")
        .set_root_layer(solid_layer(1, 100.0, 100.0));
    harness.host.commit_complete();
    harness.host.check_for_completed_tile_tasks();
    assert!(harness.client.snapshot().ready_to_activate >= 1);
    assert!(!harness.host.can_draw());

    harness.host.activate_sync_tree();

    assert!(harness.host.pending_tree().is_none());
    assert!(harness.host.recycle_tree().is_some());
    assert_eq!(harness.host.active_tree().root_layer_id(), Some(LayerId(1)));
    let log = harness.client.snapshot();
    assert_eq!(log.did_activate, 1);
    assert_eq!(log.last_can_draw(), Some(true));
}

#[test]
fn evicted_ui_resources_block_drawing_until_recreated() {
    let mut harness = harness();
    harness
        .host
        .active_tree_mut()
        .set_root_layer(solid_layer(1, 100.0, 100.0));
    let id = UiResourceId(7);
    let bitmap = UiResourceBitmap::new(IntSize::new(4, 4), true);
    harness
        .host
        .create_ui_resource(id, &bitmap)
        .expect("provider exists after initialize_renderer");
    assert!(harness.host.resource_id_for_ui_resource(id).is_some());
    assert!(harness.host.is_ui_resource_opaque(id));

    harness.host.set_visible(false);
    assert!(harness.host.evicted_ui_resources_exist());
    assert!(harness.host.resource_id_for_ui_resource(id).is_none());
    harness.host.set_visible(true);
    assert!(!harness.host.can_draw());
    assert_eq!(harness.client.snapshot().last_can_draw(), Some(false));

    harness
        .host
        .create_ui_resource(id, &bitmap)
        .expect("recreate");
    assert!(!harness.host.evicted_ui_resources_exist());
    assert!(harness.host.can_draw());
    assert_eq!(harness.client.snapshot().last_can_draw(), Some(true));
}

#[test]
fn ui_resource_id_zero_is_rejected() {
    let mut harness = harness();
    let error = harness
        .host
        .create_ui_resource(UiResourceId(0), &UiResourceBitmap::new(IntSize::new(1, 1), false))
        .expect_err("id 0 is reserved");
    assert_eq!(error, UiResourceError::InvalidId);
}

#[test]
fn nested_scroller_takes_the_whole_delta_then_bubbles_to_viewport() {
    let mut harness = nested_scroller_harness();
    assert_eq!(wheel_begin(&mut harness.host, 10.0, 10.0), ScrollThread::OnImplThread);

    let first = wheel_update(&mut harness.host, VectorF::new(0.0, 80.0));
    assert!(first.did_scroll);
    assert!(!first.did_overscroll_root);
    let tree = harness.host.active_tree();
    assert_eq!(tree.current_scroll_offset(CHILD_SCROLL), VectorF::new(0.0, 50.0));
    assert_eq!(tree.total_scroll_offset(), VectorF::zero());

    let second = wheel_update(&mut harness.host, VectorF::new(0.0, 30.0));
    assert!(second.did_scroll);
    let tree = harness.host.active_tree();
    assert_eq!(tree.current_scroll_offset(CHILD_SCROLL), VectorF::new(0.0, 50.0));
    assert_eq!(tree.current_scroll_offset(OUTER_SCROLL), VectorF::new(0.0, 30.0));

    let mut end = ScrollState::new(VectorF::zero(), PointF::new(10.0, 10.0));
    harness.host.scroll_end(&mut end);
    assert!(!harness.host.is_actively_scrolling());
}

#[test]
fn scroll_begin_outside_any_scroller_falls_back_to_the_viewport() {
    let mut harness = nested_scroller_harness();
    assert_eq!(wheel_begin(&mut harness.host, 80.0, 80.0), ScrollThread::OnImplThread);

    wheel_update(&mut harness.host, VectorF::new(0.0, 20.0));
    let tree = harness.host.active_tree();
    assert_eq!(tree.current_scroll_offset(CHILD_SCROLL), VectorF::zero());
    assert_eq!(tree.total_scroll_offset(), VectorF::new(0.0, 20.0));
}

#[test]
fn main_thread_scrolling_reasons_send_the_gesture_to_the_main_thread() {
    let mut harness = nested_scroller_harness();
    if let Some(scroller) = harness.host.active_tree_mut().layer_mut(CHILD_SCROLL) {
        scroller.main_thread_scrolling_reasons =
            compositor_protocol::MainThreadScrollingReasons::HAS_BACKGROUND_ATTACHMENT_FIXED_OBJECTS;
    }
    harness.host.active_tree_mut().set_needs_update_draw_properties();

    assert_eq!(wheel_begin(&mut harness.host, 10.0, 10.0), ScrollThread::OnMainThread);
}

#[test]
fn overscroll_is_reported_only_on_scrollable_axes() {
    let mut harness = harness_with_settings(LayerTreeSettings {
        report_overscroll_only_for_scrollable_axes: true,
        ..test_settings()
    });
    let input_client = RecordingInputHandlerClient::default();
    let overscrolls = input_client.log.clone();
    harness
        .host
        .set_input_handler_client(Some(Box::new(input_client)));
    setup_viewport_layers(
        harness.host.active_tree_mut(),
        100.0,
        SizeF::new(100.0, 150.0),
    );

    let mut begin = ScrollState::new(VectorF::zero(), PointF::new(10.0, 10.0));
    let status = harness.host.root_scroll_begin(&mut begin, ScrollInputType::Wheel);
    assert_eq!(status.thread, ScrollThread::OnImplThread);

    let result = wheel_update(&mut harness.host, VectorF::new(30.0, 80.0));
    assert!(result.did_scroll);
    assert!(result.did_overscroll_root);
    assert_eq!(result.unused_scroll_delta, VectorF::new(0.0, 30.0));
    assert_eq!(result.accumulated_root_overscroll, VectorF::new(0.0, 30.0));
    assert_eq!(
        harness.host.active_tree().current_scroll_offset(OUTER_SCROLL),
        VectorF::new(0.0, 50.0)
    );
    let reported = overscrolls.lock().expect("overscroll log").overscrolls.clone();
    assert_eq!(reported, vec![(VectorF::new(0.0, 30.0), VectorF::new(0.0, 30.0))]);

    let deltas = harness.host.process_scroll_deltas();
    assert_eq!(deltas.scrolls.len(), 1);
    assert_eq!(deltas.scrolls[0].layer_id, OUTER_SCROLL);
    assert_eq!(deltas.scrolls[0].scroll_delta, VectorF::new(0.0, 50.0));
}

#[test]
fn root_flings_are_left_to_the_embedder_when_configured() {
    let mut harness = harness_with_settings(LayerTreeSettings {
        ignore_root_layer_flings: true,
        ..test_settings()
    });
    setup_viewport_layers(
        harness.host.active_tree_mut(),
        100.0,
        SizeF::new(100.0, 300.0),
    );
    let mut begin = ScrollState::new(VectorF::zero(), PointF::new(10.0, 10.0));
    harness
        .host
        .root_scroll_begin(&mut begin, ScrollInputType::Touchscreen);

    let status = harness.host.fling_scroll_begin();
    assert_eq!(status.thread, ScrollThread::Ignored);
    assert!(harness.host.active_tree().currently_scrolling_layer().is_none());
}

#[test]
fn unchanged_memory_budget_does_not_request_a_commit() {
    let mut harness = harness();
    harness.host.set_max_memory_needed_bytes(1024 * 1024);
    harness.client.reset();

    harness
        .host
        .set_managed_memory_policy(ManagedMemoryPolicy::default());
    harness
        .host
        .set_managed_memory_policy(ManagedMemoryPolicy::new(32 * 1024 * 1024));
    assert_eq!(harness.client.snapshot().needs_commit, 0);
    assert_eq!(
        harness.host.global_tile_state().hard_memory_limit_in_bytes,
        32 * 1024 * 1024
    );

    harness
        .host
        .set_managed_memory_policy(ManagedMemoryPolicy::new(512 * 1024));
    assert_eq!(harness.client.snapshot().needs_commit, 1);
}

#[test]
fn hidden_host_keeps_no_tile_memory() {
    let mut harness = harness();
    assert!(harness.host.global_tile_state().hard_memory_limit_in_bytes > 0);
    harness.host.set_visible(false);
    assert_eq!(harness.host.global_tile_state().hard_memory_limit_in_bytes, 0);
    assert_eq!(harness.renderer_log().visible, Some(false));
}

#[test]
fn page_scale_animation_runs_to_its_target_over_impl_frames() {
    let mut harness = harness();
    setup_viewport_layers(
        harness.host.active_tree_mut(),
        100.0,
        SizeF::new(100.0, 300.0),
    );
    harness.host.start_page_scale_animation(
        VectorF::zero(),
        false,
        2.0,
        Duration::from_millis(100),
    );
    assert!(harness.host.page_scale_animation_active());

    let start = Instant::now();
    harness.host.will_begin_impl_frame(start);
    harness.host.did_finish_impl_frame();
    assert!(harness.host.page_scale_animation_active());

    harness
        .host
        .will_begin_impl_frame(start + Duration::from_millis(200));
    harness.host.did_finish_impl_frame();
    assert!(!harness.host.page_scale_animation_active());
    assert!((harness.host.active_tree().current_page_scale_factor() - 2.0).abs() < 1e-4);
    assert_eq!(harness.client.snapshot().completed_page_scale_animations, 1);
}

#[test]
fn lost_output_surface_is_reported_to_the_client() {
    let mut harness = harness();
    harness.host.did_lose_output_surface();
    assert_eq!(harness.client.snapshot().lost_output_surface, 1);
    assert!(
        harness
            .host
            .resource_provider()
            .expect("provider outlives the loss until release")
            .is_lost()
    );
}

#[test]
fn failed_bind_leaves_the_host_without_a_renderer() {
    let mut harness = harness();
    let mut surface = FakeOutputSurface::gl();
    surface.bind_succeeds = false;

    let error = harness
        .host
        .initialize_renderer(Box::new(surface))
        .expect_err("bind should fail");
    assert_eq!(error, InitializeRendererError::BindFailed);
    assert!(!harness.host.has_renderer());
    assert!(harness.host.resource_provider().is_none());
    assert!(!harness.host.can_draw());
}

#[test]
fn dropping_the_host_detaches_its_output_surface() {
    let client = RecordingClient::default();
    let mut host = LayerTreeHostImpl::new(
        test_settings(),
        Box::new(client),
        Arc::new(CompletingRasterizer),
    );
    let surface = FakeOutputSurface::gl();
    let detached: Arc<Mutex<bool>> = surface.detached.clone();
    host.initialize_renderer(Box::new(surface))
        .expect("bind");
    assert!(!*detached.lock().expect("detached flag"));

    drop(host);
    assert!(*detached.lock().expect("detached flag"));
}

struct RecordingPromise {
    reasons: Arc<Mutex<Vec<DidNotSwapReason>>>,
}

impl SwapPromise for RecordingPromise {
    fn did_swap(&mut self, _metadata: &mut CompositorFrameMetadata) {}

    fn did_not_swap(&mut self, reason: DidNotSwapReason) {
        self.reasons.lock().expect("promise log").push(reason);
    }

    fn trace_id(&self) -> i64 {
        0
    }
}

/// Rasters every tile of the picture root so the tile manager holds memory.
fn rastered_picture_harness() -> Harness {
    let mut harness = harness();
    harness
        .host
        .active_tree_mut()
        .set_root_layer(picture_layer(1, 100.0, 100.0));
    let mut frame = FrameData::default();
    harness.host.prepare_to_draw(&mut frame);
    harness.host.prepare_tiles();
    harness.host.check_for_completed_tile_tasks();
    let tiles = harness.host.tile_manager().tile_draw_info(LayerId(1), WhichTree::Active);
    assert!(!tiles.is_empty());
    assert!(tiles.iter().all(|tile| tile.is_ready()));
    harness
}

#[test]
fn zero_visible_budget_blocks_drawing_until_the_next_commit() {
    let mut harness = harness();
    harness
        .host
        .active_tree_mut()
        .set_root_layer(solid_layer(1, 100.0, 100.0));
    assert!(harness.host.can_draw());
    harness.client.reset();

    harness
        .host
        .set_managed_memory_policy(ManagedMemoryPolicy::new(0));
    assert!(harness.host.active_tree().contents_textures_purged());
    assert!(!harness.host.can_draw());
    let log = harness.client.snapshot();
    assert_eq!(log.last_can_draw(), Some(false));
    assert!(log.needs_commit >= 1);
    assert!(log.renew_tree_priority >= 1);

    harness.host.begin_commit();
    harness.host.commit_complete();
    assert!(!harness.host.active_tree().contents_textures_purged());
    assert!(harness.host.can_draw());
    assert_eq!(harness.client.snapshot().last_can_draw(), Some(true));
}

#[test]
fn handled_main_frame_abort_clears_purged_contents() {
    let mut harness = harness();
    harness
        .host
        .active_tree_mut()
        .set_root_layer(solid_layer(1, 100.0, 100.0));
    harness
        .host
        .set_managed_memory_policy(ManagedMemoryPolicy::new(0));
    assert!(!harness.host.can_draw());

    harness.host.begin_main_frame_aborted(false);
    assert!(!harness.host.can_draw());

    harness.host.begin_main_frame_aborted(true);
    assert!(harness.host.can_draw());
    assert_eq!(harness.client.snapshot().last_can_draw(), Some(true));
}

#[test]
fn hiding_evicts_tiles_and_purges_the_active_tree() {
    let mut harness = rastered_picture_harness();
    harness.client.reset();

    harness.host.set_visible(false);
    assert!(harness.host.active_tree().contents_textures_purged());
    assert!(
        harness
            .host
            .tile_manager()
            .tile_draw_info(LayerId(1), WhichTree::Active)
            .iter()
            .all(|tile| !tile.is_ready())
    );
    assert!(harness.client.snapshot().needs_commit >= 1);

    harness.host.set_visible(true);
    assert!(!harness.host.can_draw());
}

#[test]
fn releasing_tree_resources_returns_tile_raster_to_the_pool() {
    let mut harness = rastered_picture_harness();
    harness.host.release_tree_resources();

    let tile_manager = harness.host.tile_manager();
    let tiles = tile_manager.tile_draw_info(LayerId(1), WhichTree::Active);
    assert!(!tiles.is_empty());
    assert!(tiles.iter().all(|tile| !tile.is_ready()));
    assert!(
        tile_manager
            .resource_pool()
            .expect("tile resources")
            .in_use_ids()
            .is_empty()
    );
}

#[test]
fn equal_memory_policy_is_ignored() {
    let mut harness = rastered_picture_harness();
    harness
        .host
        .set_managed_memory_policy(ManagedMemoryPolicy::new(32 * 1024 * 1024));
    harness.client.reset();
    let tile_state = *harness.host.tile_manager().global_state();
    let pool_usage = harness
        .host
        .tile_manager()
        .resource_pool()
        .expect("tile resources")
        .usage();

    harness
        .host
        .set_managed_memory_policy(ManagedMemoryPolicy::new(32 * 1024 * 1024));
    assert_eq!(*harness.host.tile_manager().global_state(), tile_state);
    assert_eq!(
        harness
            .host
            .tile_manager()
            .resource_pool()
            .expect("tile resources")
            .usage(),
        pool_usage
    );
    let log = harness.client.snapshot();
    assert_eq!(log.needs_prepare_tiles, 0);
    assert_eq!(log.needs_commit, 0);
    assert!(log.can_draw_states.is_empty());
    assert!(!harness.host.active_tree().contents_textures_purged());
}

#[test]
fn synchronous_compositor_rebuilds_tile_resources_on_a_zero_budget() {
    let mut harness = harness_with_settings(LayerTreeSettings {
        using_synchronous_renderer_compositor: true,
        ..test_settings()
    });
    harness
        .host
        .active_tree_mut()
        .set_root_layer(picture_layer(1, 100.0, 100.0));
    let id = UiResourceId(3);
    harness
        .host
        .create_ui_resource(id, &UiResourceBitmap::new(IntSize::new(4, 4), false))
        .expect("provider exists after initialize_renderer");
    let mut frame = FrameData::default();
    harness.host.prepare_to_draw(&mut frame);
    assert!(harness.host.tile_manager().tile_count() > 0);

    harness.host.set_memory_policy(ManagedMemoryPolicy::new(0));
    assert!(harness.host.tile_manager().has_resources());
    assert_eq!(harness.host.tile_manager().tile_count(), 0);
    assert!(harness.host.resource_id_for_ui_resource(id).is_none());
}

#[test]
fn missing_high_res_tiles_abort_the_draw() {
    let mut harness = harness();
    harness
        .host
        .active_tree_mut()
        .set_root_layer(picture_layer(1, 100.0, 100.0));
    assert!(harness.host.active_tree().requires_high_res_to_draw());

    let mut frame = FrameData::default();
    assert_eq!(
        harness.host.prepare_to_draw(&mut frame),
        DrawResult::AbortedMissingHighResContent
    );
}

#[test]
fn resourceless_software_draw_never_aborts() {
    let mut harness = harness();
    harness
        .host
        .active_tree_mut()
        .set_root_layer(picture_layer(1, 100.0, 100.0));
    harness.host.set_resourceless_software_draw(true);

    let mut frame = FrameData::default();
    assert_eq!(harness.host.prepare_to_draw(&mut frame), DrawResult::Success);
}

#[test]
fn animating_layer_with_missing_tiles_aborts_for_checkerboard() {
    let mut harness = harness_with_settings(LayerTreeSettings {
        commit_to_active_tree: false,
        ..test_settings()
    });
    let tree = harness.host.active_tree_mut();
    let mut root = picture_layer(1, 100.0, 100.0);
    let mut animation = LayerAnimation::new(
        1,
        AnimationTarget::Translation {
            from: VectorF::zero(),
            to: VectorF::new(20.0, 0.0),
        },
        Duration::from_millis(100),
    );
    animation.activate();
    root.add_animation(animation);
    root.was_ever_ready_since_last_transform_animation = false;
    tree.set_root_layer(root);
    tree.reset_requires_high_res_to_draw();

    let mut frame = FrameData::default();
    assert_eq!(
        harness.host.prepare_to_draw(&mut frame),
        DrawResult::AbortedCheckerboardAnimations
    );
}

#[test]
fn copy_requests_during_resourceless_draw_are_answered_empty() {
    let mut harness = harness();
    let tree = harness.host.active_tree_mut();
    tree.set_root_layer(solid_layer(1, 100.0, 100.0));
    let mut child = solid_layer(2, 50.0, 50.0);
    let answer: Arc<Mutex<Option<CopyOutputResult>>> = Arc::default();
    let sink = answer.clone();
    child.request_copy_of_output(CopyOutputRequest::new(move |result| {
        *sink.lock().expect("copy result") = Some(result);
    }));
    tree.add_child(LayerId(1), child).expect("child");
    harness.host.set_resourceless_software_draw(true);
    harness.client.reset();

    let mut frame = FrameData::default();
    assert_eq!(harness.host.prepare_to_draw(&mut frame), DrawResult::Success);
    let result = answer.lock().expect("copy result").take().expect("request answered");
    assert!(result.is_empty());
    assert!(frame.render_passes.iter().all(|pass| pass.copy_requests.is_empty()));
    assert!(
        !harness
            .host
            .active_tree()
            .layer_by_id(LayerId(2))
            .expect("child")
            .has_copy_requests()
    );
    assert!(harness.client.snapshot().needs_commit >= 1);
}

#[test]
fn frame_without_damage_breaks_swap_promises() {
    let mut harness = harness();
    harness
        .host
        .active_tree_mut()
        .set_root_layer(solid_layer(1, 100.0, 100.0));
    let (_, swapped) = draw_frame(&mut harness.host);
    assert!(swapped);

    let reasons = Arc::new(Mutex::new(Vec::new()));
    harness
        .host
        .active_tree_mut()
        .queue_swap_promise(Box::new(RecordingPromise {
            reasons: reasons.clone(),
        }));
    let (_, swapped_again) = draw_frame(&mut harness.host);
    assert!(!swapped_again);
    assert_eq!(*reasons.lock().expect("promise log"), vec![DidNotSwapReason::SwapFails]);
}

#[test]
fn ui_resource_requests_on_the_active_tree_are_processed_on_activation() {
    let mut harness = harness();
    harness
        .host
        .active_tree_mut()
        .set_root_layer(solid_layer(1, 100.0, 100.0));
    let id = UiResourceId(5);
    harness
        .host
        .active_tree_mut()
        .queue_ui_resource_request(UiResourceRequest::Create {
            id,
            bitmap: UiResourceBitmap::new(IntSize::new(8, 8), true),
        });

    harness.host.activate_sync_tree();
    assert!(harness.host.resource_id_for_ui_resource(id).is_some());
    assert!(harness.host.is_ui_resource_opaque(id));
}

#[test]
fn tiny_viewport_movement_resets_accumulated_overscroll() {
    let mut harness = harness();
    let tree = harness.host.active_tree_mut();
    setup_viewport_layers(tree, 100.0, SizeF::new(100.0, 150.0));
    tree.set_page_scale_on_active_tree(2.0);
    let mut begin = ScrollState::new(VectorF::zero(), PointF::new(10.0, 10.0));
    harness.host.root_scroll_begin(&mut begin, ScrollInputType::Wheel);

    let result = wheel_update(&mut harness.host, VectorF::new(0.0, 500.0));
    assert!(result.accumulated_root_overscroll.y > 0.0);

    // Moves the inner viewport by a fraction of a pixel.
    let result = wheel_update(&mut harness.host, VectorF::new(0.0, -0.05));
    assert!(result.did_scroll);
    assert!(!result.did_overscroll_root);
    assert_eq!(result.accumulated_root_overscroll, VectorF::zero());
}

#[test]
fn hud_texture_follows_the_hud_layer_size() {
    let mut harness = harness();
    let tree = harness.host.active_tree_mut();
    tree.set_root_layer(solid_layer(1, 100.0, 100.0));
    let mut hud = layer(2, 50.0, 20.0);
    hud.draws_content = true;
    hud.contents = LayerContents::HeadsUpDisplay;
    tree.add_child(LayerId(1), hud).expect("hud");
    tree.set_hud_layer(Some(LayerId(2)));
    harness.host.set_debug_state(DebugState {
        show_fps_counter: true,
        ..DebugState::default()
    });

    let (_, swapped) = draw_frame(&mut harness.host);
    assert!(swapped);
    let first = harness.host.hud_resource().expect("hud texture after a draw");
    let provider = harness.host.resource_provider().expect("provider").clone();
    assert_eq!(
        provider.resource_info(first).expect("hud texture").size,
        IntSize::new(50, 20)
    );

    harness
        .host
        .active_tree_mut()
        .layer_mut(LayerId(2))
        .expect("hud")
        .bounds = SizeF::new(60.0, 20.0);
    harness.host.active_tree_mut().set_needs_update_draw_properties();
    let (_, swapped_again) = draw_frame(&mut harness.host);
    assert!(swapped_again);
    let second = harness.host.hud_resource().expect("hud texture after resize");
    assert_ne!(first, second);
    assert!(!provider.contains(first));
    assert_eq!(
        provider.resource_info(second).expect("hud texture").size,
        IntSize::new(60, 20)
    );

    harness.host.release_output_surface();
    assert!(harness.host.hud_resource().is_none());
    assert!(!provider.contains(second));
}
