use compositor_protocol::{
    InputHandlerScrollResult, IntPoint, LayerId, MainThreadScrollingReasons, PointF,
    ScrollDirection, ScrollInputType, ScrollOffset, ScrollState, ScrollStatus, ScrollThread,
    VectorF,
};
use layer_tree::{LayerTreeImpl, ScrollNode};
use viewport::{SCROLL_EPSILON, Viewport, scroll_single_node};

use crate::LayerTreeHostImpl;

/// A layer that moved within this angle of the requested delta takes all of it.
pub const SCROLL_BUBBLE_ANGLE_THRESHOLD_DEGREES: f32 = 45.0;

/// Share of the clip height one page scroll moves, leaving some overlap.
const PAGE_SCROLL_FRACTION: f32 = 0.875;

#[derive(Debug, Clone, Copy)]
struct ChainLink {
    owner: LayerId,
    is_inner_viewport: bool,
}

impl LayerTreeHostImpl {
    /// Starts a gesture at `scroll_state.position`. The thread decision is made
    /// here once and holds for every delta of the gesture.
    pub fn scroll_begin(&mut self, scroll_state: &mut ScrollState, input_type: ScrollInputType) -> ScrollStatus {
        self.clear_currently_scrolling_layer();

        let device_point = self.device_point_for(viewport_point_of(scroll_state));
        let tree = self.trees.active_mut();
        let hit_layer = tree.find_layer_that_is_hit_by_point(device_point);
        if let Some(hit_layer) = hit_layer {
            let scroll_layer = tree.find_first_scrolling_layer_that_is_hit_by_point(device_point);
            if let Some(scroll_layer) = scroll_layer {
                if !has_scroll_ancestor(tree, hit_layer, scroll_layer) {
                    log::debug!(
                        "[host_impl] scroll_begin failed hit test: {hit_layer} is not scrolled by {scroll_layer}"
                    );
                    return ScrollStatus::new(
                        ScrollThread::Unknown,
                        MainThreadScrollingReasons::FAILED_HIT_TEST,
                    );
                }
            }
        }

        match self.find_scroll_layer_for_device_viewport_point(device_point, input_type, hit_layer) {
            Ok(scrolling_layer) => {
                if scrolling_layer.is_some() {
                    self.scroll_affects_scroll_handler = self.trees.active().have_scroll_event_handlers();
                }
                self.scroll_begin_impl(scroll_state, scrolling_layer, input_type)
            }
            Err(reasons) => {
                log::debug!("[host_impl] scroll_begin on main thread: {reasons:?}");
                ScrollStatus::new(ScrollThread::OnMainThread, reasons)
            }
        }
    }

    /// Starts a gesture on the viewport without hit testing.
    pub fn root_scroll_begin(&mut self, scroll_state: &mut ScrollState, input_type: ScrollInputType) -> ScrollStatus {
        self.clear_currently_scrolling_layer();
        let inner = self.inner_viewport_scroll_layer();
        self.scroll_begin_impl(scroll_state, inner, input_type)
    }

    pub(crate) fn scroll_begin_impl(
        &mut self,
        scroll_state: &mut ScrollState,
        scrolling_layer: Option<LayerId>,
        input_type: ScrollInputType,
    ) -> ScrollStatus {
        debug_assert!(scroll_state.fully_consumed(), "scroll begin carries a delta");
        let Some(scrolling_layer) = scrolling_layer else {
            return ScrollStatus::new(
                ScrollThread::Ignored,
                MainThreadScrollingReasons::NO_SCROLLING_LAYER,
            );
        };

        self.top_controls_manager.scroll_begin(self.trees.active());
        self.trees
            .active_mut()
            .set_currently_scrolling_layer(Some(scrolling_layer));
        self.wheel_scrolling = input_type == ScrollInputType::Wheel;
        scroll_state.is_direct_manipulation = !self.wheel_scrolling;
        self.distribute_scroll_delta(scroll_state);
        self.client.renew_tree_priority();
        log::debug!(
            "[host_impl] scroll begin on {scrolling_layer} wheel={}",
            self.wheel_scrolling
        );
        ScrollStatus::on_impl_thread()
    }

    /// Checks whether `node` can take a gesture at `screen_point` on this thread.
    pub fn try_scroll(&self, screen_point: PointF, node: &ScrollNode) -> ScrollStatus {
        if !node.main_thread_scrolling_reasons.is_empty() {
            return ScrollStatus::new(ScrollThread::OnMainThread, node.main_thread_scrolling_reasons);
        }

        let tree = self.trees.active();
        let invertible = tree
            .layer_by_id(node.owner)
            .and_then(|layer| layer.draw_properties().screen_space_transform.inverse())
            .is_some();
        if !invertible {
            return ScrollStatus::new(
                ScrollThread::Ignored,
                MainThreadScrollingReasons::NON_INVERTIBLE_TRANSFORM,
            );
        }

        if node.contains_non_fast_scrollable_region
            && tree.layer_non_fast_scrollable_region_contains(node.owner, screen_point)
        {
            return ScrollStatus::new(
                ScrollThread::OnMainThread,
                MainThreadScrollingReasons::NON_FAST_SCROLLABLE_REGION,
            );
        }

        if !node.scrollable {
            return ScrollStatus::new(ScrollThread::Ignored, MainThreadScrollingReasons::NOT_SCROLLABLE);
        }
        let max_scroll_offset = tree.max_scroll_offset(node.owner);
        if max_scroll_offset.x <= 0.0 && max_scroll_offset.y <= 0.0 {
            return ScrollStatus::new(ScrollThread::Ignored, MainThreadScrollingReasons::NOT_SCROLLABLE);
        }
        ScrollStatus::on_impl_thread()
    }

    /// Walks the scroll ancestors of `hit_layer` for the first node that can
    /// scroll on this thread. Any node that needs the main thread wins and is
    /// returned as `Err`. Falls back to the inner viewport, which also stands
    /// in for the outer one.
    pub fn find_scroll_layer_for_device_viewport_point(
        &self,
        device_point: PointF,
        _input_type: ScrollInputType,
        hit_layer: Option<LayerId>,
    ) -> Result<Option<LayerId>, MainThreadScrollingReasons> {
        let tree = self.trees.active();
        let mut potentially_scrolling_layer = None;
        if let Some(hit_layer) = hit_layer {
            for node in scroll_nodes_from_layer(tree, hit_layer) {
                let status = self.try_scroll(device_point, node);
                if status.thread == ScrollThread::OnMainThread {
                    return Err(status.main_thread_scrolling_reasons);
                }
                if status.thread == ScrollThread::OnImplThread && potentially_scrolling_layer.is_none() {
                    potentially_scrolling_layer = Some(node.owner);
                }
            }
        }

        let inner = self.inner_viewport_scroll_layer();
        let layer = potentially_scrolling_layer.or(inner);
        if layer.is_some() && layer == self.outer_viewport_scroll_layer() {
            return Ok(inner);
        }
        Ok(layer)
    }

    pub fn scroll_by(&mut self, scroll_state: &mut ScrollState) -> InputHandlerScrollResult {
        let Some(currently_scrolling_layer) = self.currently_scrolling_layer() else {
            return InputHandlerScrollResult::default();
        };
        let initial_controls_offset = self.top_controls_manager.controls_top_offset(self.trees.active());

        scroll_state.delta_consumed_for_scroll_sequence = self.did_lock_scrolling_layer;
        scroll_state.is_direct_manipulation = !self.wheel_scrolling;
        scroll_state.current_native_scrolling_layer = Some(currently_scrolling_layer);
        self.distribute_scroll_delta(scroll_state);

        self.trees
            .active_mut()
            .set_currently_scrolling_layer(scroll_state.current_native_scrolling_layer);
        self.did_lock_scrolling_layer = scroll_state.delta_consumed_for_scroll_sequence;

        let did_scroll_x = scroll_state.caused_scroll_x;
        let did_scroll_y = scroll_state.caused_scroll_y;
        let did_scroll_content = did_scroll_x || did_scroll_y;
        if did_scroll_content {
            if self.scroll_affects_scroll_handler {
                log::trace!("[host_impl] scroll forwarded to main-thread scroll handlers");
            }
            if let Some(layer) = scroll_state.current_native_scrolling_layer {
                self.did_scroll_layer_with_scrollbars(layer);
            }
            self.client.set_needs_commit_on_impl_thread();
            self.set_needs_redraw();
            self.client.renew_tree_priority();
        }

        if did_scroll_x {
            self.accumulated_root_overscroll.x = 0.0;
        }
        if did_scroll_y {
            self.accumulated_root_overscroll.y = 0.0;
        }
        let unused_root_delta = self.reportable_overscroll(scroll_state.delta());
        self.accumulated_root_overscroll += unused_root_delta;

        let did_scroll_top_controls = initial_controls_offset
            != self.top_controls_manager.controls_top_offset(self.trees.active());
        let did_overscroll_root = unused_root_delta != VectorF::zero();
        if did_overscroll_root {
            if let Some(input_handler_client) = self.input_handler_client.as_mut() {
                input_handler_client.did_overscroll(self.accumulated_root_overscroll, unused_root_delta);
            }
        }

        InputHandlerScrollResult {
            did_scroll: did_scroll_content || did_scroll_top_controls,
            did_overscroll_root,
            accumulated_root_overscroll: self.accumulated_root_overscroll,
            unused_scroll_delta: unused_root_delta,
        }
    }

    /// Overscroll is only reported on axes the viewport could scroll along.
    fn reportable_overscroll(&self, unused_delta: VectorF) -> VectorF {
        let mut unused = unused_delta;
        let tree = self.trees.active();
        if let Some(inner) = self.inner_viewport_scroll_layer().and_then(|id| tree.layer_by_id(id)) {
            if !inner.user_scrollable_horizontal {
                unused.x = 0.0;
            }
            if !inner.user_scrollable_vertical {
                unused.y = 0.0;
            }
        }
        if self.settings.report_overscroll_only_for_scrollable_axes {
            let total_max = tree.total_max_scroll_offset();
            if total_max.x.abs() <= SCROLL_EPSILON {
                unused.x = 0.0;
            }
            if total_max.y.abs() <= SCROLL_EPSILON {
                unused.y = 0.0;
            }
        }
        unused
    }

    /// Offers the remaining delta to one node of the chain.
    pub(crate) fn apply_scroll(&mut self, owner: LayerId, is_inner_viewport: bool, scroll_state: &mut ScrollState) {
        let viewport_point = viewport_point_of(scroll_state);
        let delta = scroll_state.delta();
        let is_direct_manipulation = scroll_state.is_direct_manipulation;

        let mut applied_delta = if is_inner_viewport {
            let affect_top_controls = !self.wheel_scrolling;
            let result = self.viewport.scroll_by(
                self.trees.active_mut(),
                &mut self.top_controls_manager,
                delta,
                viewport_point,
                is_direct_manipulation,
                affect_top_controls,
            );
            // Any movement of the viewport content counts, however small.
            scroll_state.caused_scroll_x |= result.content_scrolled_delta.x != 0.0;
            scroll_state.caused_scroll_y |= result.content_scrolled_delta.y != 0.0;
            scroll_state.consume_delta(result.consumed_delta);
            result.consumed_delta
        } else {
            scroll_single_node(
                self.trees.active_mut(),
                owner,
                delta,
                viewport_point,
                is_direct_manipulation,
            )
        };

        let scrolled = applied_delta.x.abs() > SCROLL_EPSILON || applied_delta.y.abs() > SCROLL_EPSILON;
        if scrolled && !is_inner_viewport {
            applied_delta = if smallest_angle_between_degrees(applied_delta, delta)
                < SCROLL_BUBBLE_ANGLE_THRESHOLD_DEGREES
            {
                delta
            } else {
                // What is left may only move ancestors perpendicular to this layer.
                project_vector(delta, applied_delta)
            };
            scroll_state.caused_scroll_x |= applied_delta.x.abs() > SCROLL_EPSILON;
            scroll_state.caused_scroll_y |= applied_delta.y.abs() > SCROLL_EPSILON;
            scroll_state.consume_delta(applied_delta);
        }

        if scrolled {
            scroll_state.current_native_scrolling_layer = Some(owner);
        }
    }

    /// Hands the delta to the scroll chain of the current layer, innermost node
    /// first. The outer viewport is skipped; the inner viewport scrolls both.
    pub(crate) fn distribute_scroll_delta(&mut self, scroll_state: &mut ScrollState) {
        let chain: Vec<ChainLink> = match self.currently_scrolling_layer() {
            Some(layer) => scroll_nodes_from_layer(self.trees.active(), layer)
                .into_iter()
                .filter(|node| node.scrollable && !node.is_outer_viewport_scroll_layer)
                .map(|node| ChainLink {
                    owner: node.owner,
                    is_inner_viewport: node.is_inner_viewport_scroll_layer,
                })
                .collect(),
            None => Vec::new(),
        };

        for link in chain {
            if scroll_state.fully_consumed() {
                break;
            }
            // A locked gesture that may not propagate only moves its own layer.
            if !scroll_state.should_propagate
                && scroll_state.delta_consumed_for_scroll_sequence
                && scroll_state.current_native_scrolling_layer != Some(link.owner)
            {
                continue;
            }
            self.apply_scroll(link.owner, link.is_inner_viewport, scroll_state);
        }
    }

    /// Wheel page scroll: moves the first scroller up the chain that can move
    /// by most of its visible height.
    pub fn scroll_vertically_by_page(&mut self, _viewport_point: IntPoint, direction: ScrollDirection) -> bool {
        debug_assert!(self.wheel_scrolling, "page scrolling outside a wheel gesture");
        let Some(layer) = self.currently_scrolling_layer() else {
            return false;
        };
        let candidates: Vec<(LayerId, f32)> = {
            let tree = self.trees.active();
            scroll_nodes_from_layer(tree, layer)
                .into_iter()
                .filter(|node| node.scrollable && !node.is_outer_viewport_scroll_layer)
                .map(|node| (node.owner, scroll_clip_height(tree, node.owner)))
                .collect()
        };

        for (owner, clip_height) in candidates {
            let mut page = (clip_height * PAGE_SCROLL_FRACTION).max(1.0);
            if direction == ScrollDirection::Backward {
                page = -page;
            }
            let applied = self
                .trees
                .active_mut()
                .scroll_node_with_local_delta(owner, VectorF::new(0.0, page), 1.0);
            if applied != VectorF::zero() {
                self.client.set_needs_commit_on_impl_thread();
                self.set_needs_redraw();
                self.client.renew_tree_priority();
                return true;
            }
            self.trees.active_mut().set_currently_scrolling_layer(Some(owner));
        }
        false
    }

    pub fn scroll_end(&mut self, scroll_state: &mut ScrollState) {
        debug_assert!(scroll_state.fully_consumed(), "scroll end carries a delta");
        self.distribute_scroll_delta(scroll_state);
        self.top_controls_manager.scroll_end(self.trees.active());
        self.clear_currently_scrolling_layer();
        log::debug!("[host_impl] scroll end");
    }

    pub fn clear_currently_scrolling_layer(&mut self) {
        self.trees.active_mut().clear_currently_scrolling_layer();
        self.did_lock_scrolling_layer = false;
        self.scroll_affects_scroll_handler = false;
        self.accumulated_root_overscroll = VectorF::zero();
    }

    /// Continues the current gesture as a fling. Root flings are left to the
    /// embedder when it animates them itself.
    pub fn fling_scroll_begin(&mut self) -> ScrollStatus {
        let Some(layer) = self.currently_scrolling_layer() else {
            return ScrollStatus::new(
                ScrollThread::Ignored,
                MainThreadScrollingReasons::NO_SCROLLING_LAYER,
            );
        };
        let is_viewport = Some(layer) == self.inner_viewport_scroll_layer()
            || Some(layer) == self.outer_viewport_scroll_layer();
        if self.settings.ignore_root_layer_flings && is_viewport {
            self.clear_currently_scrolling_layer();
            return ScrollStatus::new(ScrollThread::Ignored, MainThreadScrollingReasons::empty());
        }
        if !self.wheel_scrolling {
            // The fling locks to the first layer that moves after it starts.
            self.did_lock_scrolling_layer = false;
        }
        ScrollStatus::on_impl_thread()
    }

    pub fn pinch_gesture_begin(&mut self) {
        self.pinch_gesture_active = true;
        self.client.renew_tree_priority();
        self.pinch_gesture_end_should_clear_scrolling_layer = self.currently_scrolling_layer().is_none();
        let inner = self.inner_viewport_scroll_layer();
        self.trees.active_mut().set_currently_scrolling_layer(inner);
        self.top_controls_manager.pinch_begin(self.trees.active());
    }

    pub fn pinch_gesture_update(&mut self, magnify_delta: f32, anchor: IntPoint) {
        if self.inner_viewport_scroll_layer().is_none() {
            return;
        }
        self.viewport
            .pinch_update(self.trees.active_mut(), magnify_delta, anchor);
        self.client.set_needs_commit_on_impl_thread();
        self.set_needs_redraw();
        self.client.renew_tree_priority();
    }

    pub fn pinch_gesture_end(&mut self) {
        self.pinch_gesture_active = false;
        if self.pinch_gesture_end_should_clear_scrolling_layer {
            self.pinch_gesture_end_should_clear_scrolling_layer = false;
            self.clear_currently_scrolling_layer();
        }
        self.viewport.pinch_end();
        self.top_controls_manager.pinch_end(self.trees.active());
        self.client.set_needs_commit_on_impl_thread();
        // Content may be cached at pinch-time scales.
        self.trees.active_mut().set_needs_update_draw_properties();
        self.set_needs_redraw();
    }

    /// True when a gesture starting at `viewport_point` would scroll the layer
    /// already being scrolled. The two viewports count as one.
    pub fn is_currently_scrolling_layer_at(&mut self, viewport_point: IntPoint, input_type: ScrollInputType) -> bool {
        let Some(scrolling_layer) = self.currently_scrolling_layer() else {
            return false;
        };
        let device_point = self.device_point_for(viewport_point);
        let hit_layer = self.trees.active_mut().find_layer_that_is_hit_by_point(device_point);
        let Ok(Some(test_layer)) =
            self.find_scroll_layer_for_device_viewport_point(device_point, input_type, hit_layer)
        else {
            return false;
        };
        if scrolling_layer == test_layer {
            return true;
        }
        let inner = self.inner_viewport_scroll_layer();
        let outer = self.outer_viewport_scroll_layer();
        (Some(scrolling_layer) == inner && Some(test_layer) == outer)
            || (Some(scrolling_layer) == outer && Some(test_layer) == inner)
    }

    pub fn is_actively_scrolling(&self) -> bool {
        let Some(layer) = self.currently_scrolling_layer() else {
            return false;
        };
        // The embedder animates root flings, so they are invisible here.
        if self.settings.ignore_root_layer_flings && Some(layer) == self.inner_viewport_scroll_layer() {
            return false;
        }
        self.did_lock_scrolling_layer
    }

    pub fn main_thread_has_stopped_flinging(&mut self) {
        self.top_controls_manager
            .main_thread_has_stopped_flinging(self.trees.active());
        if let Some(input_handler_client) = self.input_handler_client.as_mut() {
            input_handler_client.main_thread_has_stopped_flinging();
        }
    }

    /// Scrolls the inner viewport and gives the remainder to the outer one.
    pub fn scroll_viewport_inner_first(&mut self, scroll_delta: VectorF) -> VectorF {
        debug_assert!(self.inner_viewport_scroll_layer().is_some());
        Viewport::scroll_inner_first(self.trees.active_mut(), scroll_delta)
    }

    /// Scrolls the outer viewport and gives the remainder to the inner one.
    pub fn scroll_viewport_by(&mut self, scroll_delta: VectorF) -> VectorF {
        debug_assert!(self.inner_viewport_scroll_layer().is_some());
        Viewport::scroll_outer_first(self.trees.active_mut(), scroll_delta)
    }

    /// Root offset chosen by a synchronous embedder, split across the viewports.
    pub fn set_synchronous_input_handler_root_scroll_offset(&mut self, root_offset: ScrollOffset) {
        let tree = self.trees.active_mut();
        let before = tree.total_scroll_offset();
        tree.distribute_root_scroll_offset(root_offset);
        if tree.total_scroll_offset() == before {
            return;
        }
        self.client.set_needs_commit_on_impl_thread();
        self.set_full_root_layer_damage();
        self.set_needs_redraw();
    }

    fn device_point_for(&self, viewport_point: IntPoint) -> PointF {
        let device_scale_factor = self.trees.active().device_scale_factor();
        PointF::new(viewport_point.x as f32, viewport_point.y as f32) * device_scale_factor
    }
}

fn viewport_point_of(scroll_state: &ScrollState) -> IntPoint {
    IntPoint::new(scroll_state.position.x as i32, scroll_state.position.y as i32)
}

/// The scroll node governing `layer_id` followed by its ancestors.
fn scroll_nodes_from_layer(tree: &LayerTreeImpl, layer_id: LayerId) -> Vec<&ScrollNode> {
    let scroll_tree = tree.scroll_tree();
    let mut current = tree
        .property_trees()
        .layer_nodes
        .get(&layer_id)
        .and_then(|indices| indices.scroll)
        .and_then(|index| scroll_tree.node(index));
    let mut chain = Vec::new();
    while let Some(node) = current {
        chain.push(node);
        current = scroll_tree.parent(node);
    }
    chain
}

/// Whether the first scrollable ancestor of `child` is `scroll_ancestor`.
fn has_scroll_ancestor(tree: &LayerTreeImpl, child: LayerId, scroll_ancestor: LayerId) -> bool {
    scroll_nodes_from_layer(tree, child)
        .into_iter()
        .find(|node| node.scrollable)
        .is_some_and(|node| node.owner == scroll_ancestor)
}

fn scroll_clip_height(tree: &LayerTreeImpl, layer_id: LayerId) -> f32 {
    tree.layer_by_id(layer_id)
        .and_then(|layer| layer.scroll_clip_layer)
        .and_then(|clip| tree.layer_by_id(clip))
        .map(|clip| clip.bounds_with_delta().height)
        .unwrap_or(0.0)
}

fn smallest_angle_between_degrees(a: VectorF, b: VectorF) -> f32 {
    let lengths = a.length() * b.length();
    if lengths == 0.0 {
        return 0.0;
    }
    let cosine = (a.dot(b) / lengths).clamp(-1.0, 1.0);
    cosine.acos().to_degrees()
}

/// `source` projected onto `destination`.
fn project_vector(source: VectorF, destination: VectorF) -> VectorF {
    let length_squared = destination.square_length();
    if length_squared == 0.0 {
        return VectorF::zero();
    }
    destination * (source.dot(destination) / length_squared)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aligned_deltas_have_no_angle() {
        let angle = smallest_angle_between_degrees(VectorF::new(0.0, 10.0), VectorF::new(0.0, 3.0));
        assert!(angle.abs() < 1e-3);
        let right = smallest_angle_between_degrees(VectorF::new(1.0, 0.0), VectorF::new(0.0, 1.0));
        assert!((right - 90.0).abs() < 1e-3);
    }

    #[test]
    fn projection_keeps_only_the_component_along_the_destination() {
        let projected = project_vector(VectorF::new(10.0, 10.0), VectorF::new(0.0, 4.0));
        assert_eq!(projected, VectorF::new(0.0, 10.0));
        assert_eq!(project_vector(VectorF::new(1.0, 1.0), VectorF::zero()), VectorF::zero());
    }
}
