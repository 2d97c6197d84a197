//! Root viewport scrolling.
//!
//! The visual viewport is the inner viewport scroll layer; the layout viewport is
//! the outer one. Gestures aimed at the viewport scroll the top controls first,
//! then the inner viewport, and bubble the remainder to the outer viewport, so
//! the pair behaves as a single scroller.

mod page_scale_animation;
mod top_controls;

pub use page_scale_animation::{CubicBezier, PageScaleAnimation};
pub use top_controls::{
    AnimationDirection, SHOW_HIDE_MAX_DURATION, TopControlsManager, TopControlsState,
};

use compositor_protocol::{IntPoint, LayerId, PointF, VectorF};
use layer_tree::LayerTreeImpl;

/// Deltas below this are treated as zero when judging whether something scrolled.
pub const SCROLL_EPSILON: f32 = 0.1;
/// Pinch anchors this close to a viewport edge snap to it.
pub const PINCH_ZOOM_SNAP_MARGIN_DIPS: f32 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScrollResult {
    pub consumed_delta: VectorF,
    pub content_scrolled_delta: VectorF,
}

/// Scrolls one layer by a gesture delta and returns the viewport-space delta it took.
///
/// Direct manipulation follows the finger through the layer's screen space
/// transform; wheel input is scaled by the page scale instead.
pub fn scroll_single_node(
    tree: &mut LayerTreeImpl,
    layer_id: LayerId,
    delta: VectorF,
    viewport_point: IntPoint,
    is_direct_manipulation: bool,
) -> VectorF {
    if is_direct_manipulation {
        let point = PointF::new(viewport_point.x as f32, viewport_point.y as f32);
        return tree.scroll_node_with_viewport_space_delta(layer_id, point, delta);
    }
    let page_scale = tree.current_page_scale_factor();
    tree.scroll_node_with_local_delta(layer_id, delta, page_scale)
}

/// Zeroes components too small to count as overscroll.
pub fn adjust_overscroll(delta: VectorF) -> VectorF {
    VectorF::new(
        if delta.x.abs() < SCROLL_EPSILON { 0.0 } else { delta.x },
        if delta.y.abs() < SCROLL_EPSILON { 0.0 } else { delta.y },
    )
}

/// Pinch state for the root viewport.
#[derive(Debug, Clone, Default)]
pub struct Viewport {
    pinch_zoom_active: bool,
    pinch_anchor_adjustment: VectorF,
}

impl Viewport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pinch_zoom_active(&self) -> bool {
        self.pinch_zoom_active
    }

    pub fn pinch_anchor_adjustment(&self) -> VectorF {
        self.pinch_anchor_adjustment
    }

    /// Scrolls the viewport as one unit. Returns the consumed delta (everything
    /// but the overscroll) and how much the content itself moved.
    pub fn scroll_by(
        &mut self,
        tree: &mut LayerTreeImpl,
        top_controls: &mut TopControlsManager,
        delta: VectorF,
        viewport_point: IntPoint,
        is_direct_manipulation: bool,
        affect_top_controls: bool,
    ) -> ScrollResult {
        let Some(inner) = tree.inner_viewport_scroll_layer() else {
            return ScrollResult::default();
        };

        let mut content_delta = delta;
        if affect_top_controls && should_top_controls_consume_scroll(tree, delta) {
            let remaining = top_controls.scroll_by(tree, delta);
            content_delta -= delta - remaining;
        }

        let mut pending = content_delta;
        pending -= scroll_single_node(tree, inner, pending, viewport_point, is_direct_manipulation);

        let consumed_delta = if pending.round() == VectorF::zero() {
            delta
        } else {
            if let Some(outer) = tree.outer_viewport_scroll_layer() {
                pending -= scroll_single_node(tree, outer, pending, viewport_point, is_direct_manipulation);
            }
            delta - adjust_overscroll(pending)
        };

        log::trace!(
            "[viewport] scroll_by delta={delta:?} consumed={consumed_delta:?} remaining={pending:?}"
        );
        ScrollResult {
            consumed_delta,
            content_scrolled_delta: content_delta - pending,
        }
    }

    /// Scrolls the inner viewport first and gives the remainder to the outer one.
    /// `delta` is in CSS pixels. Returns what neither could take.
    pub fn scroll_inner_first(tree: &mut LayerTreeImpl, delta: VectorF) -> VectorF {
        let Some(inner) = tree.inner_viewport_scroll_layer() else {
            return delta;
        };
        let unused = tree.scroll_by(inner, delta);
        if unused == VectorF::zero() {
            return unused;
        }
        match tree.outer_viewport_scroll_layer() {
            Some(outer) => tree.scroll_by(outer, unused),
            None => unused,
        }
    }

    /// Scrolls the outer viewport (or the inner one when there is none) and
    /// bubbles the remainder to the inner viewport. Returns what is left.
    pub fn scroll_outer_first(tree: &mut LayerTreeImpl, delta: VectorF) -> VectorF {
        let inner = tree.inner_viewport_scroll_layer();
        let outer = tree.outer_viewport_scroll_layer();
        let Some(first) = outer.or(inner) else {
            return delta;
        };
        let unused = tree.scroll_by(first, delta);
        match (outer, inner) {
            (Some(_), Some(inner)) if unused != VectorF::zero() => tree.scroll_by(inner, unused),
            _ => unused,
        }
    }

    fn snap_pinch_anchor_if_within_margin(&mut self, tree: &LayerTreeImpl, anchor: IntPoint) {
        let Some(container) = tree
            .inner_viewport_container_layer()
            .and_then(|id| tree.layer_by_id(id))
        else {
            return;
        };
        let viewport_size = container.bounds_with_delta();
        let anchor = PointF::new(anchor.x as f32, anchor.y as f32);

        if anchor.x < PINCH_ZOOM_SNAP_MARGIN_DIPS {
            self.pinch_anchor_adjustment.x = -anchor.x;
        } else if anchor.x > viewport_size.width - PINCH_ZOOM_SNAP_MARGIN_DIPS {
            self.pinch_anchor_adjustment.x = viewport_size.width - anchor.x;
        }
        if anchor.y < PINCH_ZOOM_SNAP_MARGIN_DIPS {
            self.pinch_anchor_adjustment.y = -anchor.y;
        } else if anchor.y > viewport_size.height - PINCH_ZOOM_SNAP_MARGIN_DIPS {
            self.pinch_anchor_adjustment.y = viewport_size.height - anchor.y;
        }
    }

    /// Scales the page by `magnify_delta` keeping the content under `anchor` still.
    pub fn pinch_update(&mut self, tree: &mut LayerTreeImpl, magnify_delta: f32, anchor: IntPoint) {
        let Some(inner) = tree.inner_viewport_scroll_layer() else {
            return;
        };
        if !self.pinch_zoom_active {
            // First update of the gesture: snap to a nearby edge so fixed-position
            // content at the edge stays put while zooming.
            self.snap_pinch_anchor_if_within_margin(tree, anchor);
            self.pinch_zoom_active = true;
        }

        let adjusted_anchor =
            PointF::new(anchor.x as f32, anchor.y as f32) + self.pinch_anchor_adjustment;
        let previous_scale = tree.current_page_scale_factor();
        let previous_anchor = adjusted_anchor / previous_scale;
        tree.set_page_scale_on_active_tree(previous_scale * magnify_delta);
        let new_scale = tree.current_page_scale_factor();
        let new_anchor = adjusted_anchor / new_scale;

        // Scroll offsets are in CSS pixels, the space both anchors are in.
        let mut move_delta = previous_anchor - new_anchor;
        move_delta -= tree.clamp_scroll_to_max_scroll_offset(inner);

        let scroll_layer = tree.outer_viewport_scroll_layer().unwrap_or(inner);
        let unused = tree.scroll_by(scroll_layer, move_delta);
        if unused != VectorF::zero() && scroll_layer != inner {
            tree.scroll_by(inner, unused);
            tree.clamp_scroll_to_max_scroll_offset(inner);
        }
        log::trace!("[viewport] pinch scale {previous_scale} -> {new_scale} move={move_delta:?}");
    }

    pub fn pinch_end(&mut self) {
        self.pinch_anchor_adjustment = VectorF::zero();
        self.pinch_zoom_active = false;
    }
}

/// The controls always take upward scrolls; downward ones only until the
/// viewport reaches its bottom.
fn should_top_controls_consume_scroll(tree: &LayerTreeImpl, delta: VectorF) -> bool {
    if delta.y < 0.0 {
        return true;
    }
    tree.total_scroll_offset().y < tree.total_max_scroll_offset().y
}

#[cfg(test)]
mod tests;
