use compositor_protocol::{
    LayerId, PointF, ScrollOffset, ScrollUpdateInfo, SizeF, VectorF, floor_vector,
};

use crate::LayerTreeImpl;

impl LayerTreeImpl {
    /// Largest offset `layer_id` can scroll to, never negative.
    pub fn max_scroll_offset(&self, layer_id: LayerId) -> ScrollOffset {
        let Some(layer) = self.layer_by_id(layer_id) else {
            return ScrollOffset::zero();
        };
        let Some(clip) = layer
            .scroll_clip_layer
            .and_then(|clip_id| self.layer_by_id(clip_id))
        else {
            return ScrollOffset::zero();
        };

        let affected_by_page_scale = self
            .scroll_tree()
            .node_for_layer(layer_id)
            .map(|node| node.max_scroll_offset_affected_by_page_scale)
            .unwrap_or_else(|| self.inner_viewport_scroll_layer() == Some(layer_id));
        let scale = if affected_by_page_scale {
            self.current_page_scale_factor()
        } else {
            1.0
        };

        let scroll_bounds = layer.bounds_with_delta();
        let scaled_bounds = SizeF::new(
            (scroll_bounds.width * scale).floor(),
            (scroll_bounds.height * scale).floor(),
        );
        let clip_bounds = clip.bounds_with_delta();
        let max = VectorF::new(
            (scaled_bounds.width - clip_bounds.width) / scale,
            (scaled_bounds.height - clip_bounds.height) / scale,
        );
        VectorF::new(max.x.max(0.0), max.y.max(0.0))
    }

    pub fn clamp_scroll_offset_to_limits(&self, layer_id: LayerId, offset: ScrollOffset) -> ScrollOffset {
        let max = self.max_scroll_offset(layer_id);
        VectorF::new(offset.x.clamp(0.0, max.x), offset.y.clamp(0.0, max.y))
    }

    pub fn current_scroll_offset(&self, layer_id: LayerId) -> ScrollOffset {
        self.layer_by_id(layer_id)
            .map(|layer| layer.current_scroll_offset())
            .unwrap_or_else(ScrollOffset::zero)
    }

    /// Returns true when the offset changed.
    pub fn set_current_scroll_offset(&mut self, layer_id: LayerId, offset: ScrollOffset) -> bool {
        let Some(&key) = self.layer_id_map.get(&layer_id) else {
            return false;
        };
        let layer = &mut self.layers[key];
        if !layer.scroll_offset.set_current(offset) {
            return false;
        }
        layer.layer_property_changed = true;
        self.set_needs_update_draw_properties();
        true
    }

    /// Scrolls within `[0, max]` and returns the delta that could not be applied.
    /// Axes that are not user scrollable are left untouched.
    pub fn scroll_by(&mut self, layer_id: LayerId, delta: VectorF) -> VectorF {
        let Some(layer) = self.layer_by_id(layer_id) else {
            return delta;
        };
        let mut adjusted = delta;
        if !layer.user_scrollable_horizontal {
            adjusted.x = 0.0;
        }
        if !layer.user_scrollable_vertical {
            adjusted.y = 0.0;
        }
        let old_offset = layer.current_scroll_offset();
        let new_offset = self.clamp_scroll_offset_to_limits(layer_id, old_offset + adjusted);
        self.set_current_scroll_offset(layer_id, new_offset);
        old_offset + delta - new_offset
    }

    /// Pulls the offset back inside its limits and returns the correction applied.
    pub fn clamp_scroll_to_max_scroll_offset(&mut self, layer_id: LayerId) -> VectorF {
        let old_offset = self.current_scroll_offset(layer_id);
        let clamped = self.clamp_scroll_offset_to_limits(layer_id, old_offset);
        let delta = clamped - old_offset;
        if delta != VectorF::zero() {
            self.set_current_scroll_offset(layer_id, clamped);
        }
        delta
    }

    /// Scrolls by a delta given in viewport space (direct manipulation). The gesture
    /// is projected through the layer's screen space transform, so rotated or scaled
    /// scrollers move along the user's finger. Returns the applied viewport delta.
    pub fn scroll_node_with_viewport_space_delta(
        &mut self,
        layer_id: LayerId,
        viewport_point: PointF,
        viewport_delta: VectorF,
    ) -> VectorF {
        let Some(layer) = self.layer_by_id(layer_id) else {
            return VectorF::zero();
        };
        let screen_space = layer.draw_properties.screen_space_transform;
        let Some(inverse) = screen_space.inverse() else {
            return VectorF::zero();
        };
        let device_scale = self.device_scale_factor;
        let screen_point = viewport_point * device_scale;
        let screen_delta = viewport_delta * device_scale;

        let local_start = inverse.transform_point(screen_point);
        let local_end = inverse.transform_point(screen_point + screen_delta);
        let local_delta = local_end - local_start;

        let previous = self.current_scroll_offset(layer_id);
        self.scroll_by(layer_id, local_delta);
        let scrolled = self.current_scroll_offset(layer_id) - previous;

        let actual_local_end = local_start + scrolled;
        let actual_screen_end = screen_space.transform_point(actual_local_end);
        let actual_viewport_end = actual_screen_end / device_scale;
        actual_viewport_end - viewport_point
    }

    /// Scrolls by a delta in layer space scaled by `page_scale_factor` (wheel input).
    /// Returns the consumed delta in the same units as `local_delta`.
    pub fn scroll_node_with_local_delta(
        &mut self,
        layer_id: LayerId,
        local_delta: VectorF,
        page_scale_factor: f32,
    ) -> VectorF {
        let delta = local_delta / page_scale_factor;
        let previous = self.current_scroll_offset(layer_id);
        self.scroll_by(layer_id, delta);
        let consumed = self.current_scroll_offset(layer_id) - previous;
        consumed * page_scale_factor
    }

    pub fn total_scroll_offset(&self) -> ScrollOffset {
        let mut offset = ScrollOffset::zero();
        if let Some(inner) = self.inner_viewport_scroll_layer() {
            offset += self.current_scroll_offset(inner);
        }
        if let Some(outer) = self.outer_viewport_scroll_layer() {
            offset += self.current_scroll_offset(outer);
        }
        offset
    }

    pub fn total_max_scroll_offset(&self) -> ScrollOffset {
        let mut offset = ScrollOffset::zero();
        if let Some(inner) = self.inner_viewport_scroll_layer() {
            offset += self.max_scroll_offset(inner);
        }
        if let Some(outer) = self.outer_viewport_scroll_layer() {
            offset += self.max_scroll_offset(outer);
        }
        offset
    }

    /// Splits a root offset between the outer and inner viewports, outer first.
    pub fn distribute_root_scroll_offset(&mut self, root_offset: ScrollOffset) {
        let (Some(inner), Some(outer)) = (
            self.inner_viewport_scroll_layer(),
            self.outer_viewport_scroll_layer(),
        ) else {
            if let Some(inner) = self.inner_viewport_scroll_layer() {
                let clamped = self.clamp_scroll_offset_to_limits(inner, root_offset);
                self.set_current_scroll_offset(inner, clamped);
            }
            return;
        };
        let total_max = self.total_max_scroll_offset();
        let root_offset = VectorF::new(
            root_offset.x.clamp(0.0, total_max.x),
            root_offset.y.clamp(0.0, total_max.y),
        );
        let outer_offset = self.clamp_scroll_offset_to_limits(
            outer,
            root_offset - self.current_scroll_offset(inner),
        );
        let inner_offset = self.clamp_scroll_offset_to_limits(inner, root_offset - outer_offset);
        self.set_current_scroll_offset(outer, outer_offset);
        self.set_current_scroll_offset(inner, inner_offset);
    }

    /// Content size of the root scroller, never smaller than its container.
    pub fn scrollable_size(&self) -> SizeF {
        let Some(scroll_layer) = self
            .outer_viewport_scroll_layer()
            .or(self.inner_viewport_scroll_layer())
            .and_then(|id| self.layer_by_id(id))
        else {
            return SizeF::zero();
        };
        let content = scroll_layer.bounds_with_delta();
        let viewport = scroll_layer
            .scroll_clip_layer
            .and_then(|clip| self.layer_by_id(clip))
            .map(|clip| clip.bounds_with_delta())
            .unwrap_or_else(SizeF::zero);
        SizeF::new(content.width.max(viewport.width), content.height.max(viewport.height))
    }

    /// The inner viewport container expressed in CSS pixels.
    pub fn scrollable_viewport_size(&self) -> SizeF {
        let Some(container) = self
            .inner_viewport_container_layer()
            .and_then(|id| self.layer_by_id(id))
        else {
            return SizeF::zero();
        };
        container.bounds_with_delta() / self.current_page_scale_factor()
    }

    /// Per-layer scroll deltas for the main thread, floored to whole pixels.
    pub fn collect_scroll_deltas(&mut self) -> Vec<ScrollUpdateInfo> {
        let mut scrolls = Vec::new();
        for key in self.pre_order_keys() {
            let layer = &mut self.layers[key];
            let delta = floor_vector(layer.scroll_offset.delta());
            if delta == VectorF::zero() {
                layer.scroll_offset.set_sent_delta(VectorF::zero());
                continue;
            }
            layer.scroll_offset.set_sent_delta(delta);
            scrolls.push(ScrollUpdateInfo {
                layer_id: layer.id(),
                scroll_delta: delta,
            });
        }
        scrolls
    }

    pub fn apply_sent_scroll_and_scale_deltas_from_aborted_commit(&mut self) {
        for layer in self.layers.values_mut() {
            layer.scroll_offset.abort_commit(true);
        }
        self.page_scale_factor.abort_commit(true);
        self.top_controls_shown_ratio.abort_commit(true);
        self.set_needs_update_draw_properties();
    }

    /// Front-most hit-testable layer under `screen_point`.
    pub fn find_layer_that_is_hit_by_point(&mut self, screen_point: PointF) -> Option<LayerId> {
        if !self.update_draw_properties() {
            return None;
        }
        self.hit_test(screen_point, false)
    }

    pub fn find_first_scrolling_layer_that_is_hit_by_point(
        &mut self,
        screen_point: PointF,
    ) -> Option<LayerId> {
        if !self.update_draw_properties() {
            return None;
        }
        self.hit_test(screen_point, true)
    }

    fn hit_test(&self, screen_point: PointF, scrolling_only: bool) -> Option<LayerId> {
        self.pre_order_keys().into_iter().rev().find_map(|key| {
            let layer = &self.layers[key];
            let properties = &layer.draw_properties;
            let candidate = if scrolling_only {
                layer.scrollable()
            } else {
                properties.is_drawn || layer.scrollable()
            };
            if !candidate || properties.render_target.is_none() {
                return None;
            }
            if let Some(clip) = properties.clip_rect {
                if !clip.contains(screen_point) {
                    return None;
                }
            }
            let local = properties
                .screen_space_transform
                .inverse()?
                .transform_point(screen_point);
            layer.layer_rect().contains(local).then(|| layer.id())
        })
    }

    /// True when `screen_point` falls in `layer_id`'s non-fast-scrollable region.
    pub fn layer_non_fast_scrollable_region_contains(
        &self,
        layer_id: LayerId,
        screen_point: PointF,
    ) -> bool {
        let Some(layer) = self.layer_by_id(layer_id) else {
            return false;
        };
        if layer.non_fast_scrollable_region.is_empty() {
            return false;
        }
        let Some(inverse) = layer.draw_properties.screen_space_transform.inverse() else {
            return false;
        };
        let local = inverse.transform_point(screen_point);
        layer
            .non_fast_scrollable_region
            .iter()
            .any(|rect| rect.contains(local))
    }
}
