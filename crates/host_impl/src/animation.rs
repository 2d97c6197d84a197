use std::time::{Duration, Instant};

use compositor_protocol::{LayerId, VectorF};
use viewport::{CubicBezier, PageScaleAnimation, TopControlsState};

use crate::LayerTreeHostImpl;

/// Linear fade of a scroll layer's scrollbars. A scroll shows them at full
/// opacity; after `delay` without scrolling they fade out over `duration`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollbarFadeController {
    delay: Duration,
    duration: Duration,
    opacity: f32,
    last_scroll_time: Option<Instant>,
}

impl ScrollbarFadeController {
    pub fn new(delay: Duration, duration: Duration) -> Self {
        Self {
            delay,
            duration,
            opacity: 0.0,
            last_scroll_time: None,
        }
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn is_animating(&self) -> bool {
        self.last_scroll_time.is_some()
    }

    pub fn did_scroll(&mut self, now: Instant) {
        self.opacity = 1.0;
        self.last_scroll_time = Some(now);
    }

    /// Returns true when the opacity changed.
    pub fn animate(&mut self, now: Instant) -> bool {
        let Some(last_scroll_time) = self.last_scroll_time else {
            return false;
        };
        let fade_start = last_scroll_time + self.delay;
        let opacity = if now <= fade_start {
            1.0
        } else if self.duration.is_zero() {
            0.0
        } else {
            let progress = (now - fade_start).as_secs_f32() / self.duration.as_secs_f32();
            (1.0 - progress).clamp(0.0, 1.0)
        };
        if opacity <= 0.0 {
            self.last_scroll_time = None;
        }
        let changed = opacity != self.opacity;
        self.opacity = opacity;
        changed
    }
}

impl LayerTreeHostImpl {
    pub fn will_begin_impl_frame(&mut self, frame_time: Instant) {
        self.begin_frame_time = Some(frame_time);
        self.inside_impl_frame = true;

        if self.is_likely_to_require_a_draw {
            // Tiles became ready for draw without the draw being requested yet.
            self.set_needs_redraw();
        }
        self.animate();
    }

    pub fn did_finish_impl_frame(&mut self) {
        self.inside_impl_frame = false;
    }

    pub fn current_begin_frame_time(&self) -> Instant {
        match self.begin_frame_time {
            Some(frame_time) if self.inside_impl_frame => frame_time,
            _ => Instant::now(),
        }
    }

    pub fn animate(&mut self) {
        let now = self.current_begin_frame_time();
        self.animate_internal(now, true);
    }

    /// Freshly committed layer animations tick on the pending tree before it
    /// activates.
    pub fn animate_pending_tree_after_commit(&mut self) {
        let now = self.current_begin_frame_time();
        self.animate_internal(now, false);
    }

    fn animate_internal(&mut self, now: Instant, active_tree: bool) {
        let ignore_fling = self.settings.ignore_root_layer_flings
            && self.currently_scrolling_layer().is_some()
            && self.currently_scrolling_layer() == self.inner_viewport_scroll_layer();
        if !ignore_fling {
            if let Some(input_handler_client) = self.input_handler_client.as_mut() {
                input_handler_client.animate(now);
            }
        }

        let mut did_animate = false;
        did_animate |= self.animate_page_scale(now);
        did_animate |= self.animate_layers(now, active_tree);
        did_animate |= self.animate_scrollbars(now);
        did_animate |= self.animate_top_controls(now);

        if active_tree && did_animate {
            self.set_needs_redraw();
        }
    }

    pub fn animate_page_scale(&mut self, now: Instant) -> bool {
        let Some(animation) = self.page_scale_animation.as_mut() else {
            return false;
        };
        if !animation.is_animation_started() {
            animation.start_animation(now);
        }
        let page_scale_factor = animation.page_scale_factor_at_time(now);
        let next_scroll = animation.scroll_offset_at_time(now);
        let complete = animation.is_animation_complete_at_time(now);

        let tree = self.trees.active_mut();
        let scroll_total = tree.total_scroll_offset();
        tree.set_page_scale_on_active_tree(page_scale_factor);
        self.scroll_viewport_inner_first(next_scroll - scroll_total);

        if complete {
            self.page_scale_animation = None;
            self.client.set_needs_commit_on_impl_thread();
            self.client.renew_tree_priority();
            self.client.did_complete_page_scale_animation_on_impl_thread();
            log::debug!("[host_impl] page scale animation complete scale={page_scale_factor}");
        } else {
            self.set_needs_one_begin_impl_frame();
        }
        true
    }

    /// Ticks layer animations on the active tree, or on the sync tree right
    /// after a commit.
    pub fn animate_layers(&mut self, now: Instant, active_tree: bool) -> bool {
        let tree = if active_tree {
            self.trees.active_mut()
        } else {
            self.trees.sync_tree_mut()
        };
        let did_animate = tree.animate_layers(now);
        let still_running = tree.has_running_animations();
        if still_running {
            self.set_needs_one_begin_impl_frame();
        }
        did_animate
    }

    pub fn animate_scrollbars(&mut self, now: Instant) -> bool {
        let mut changed_layers: Vec<LayerId> = Vec::new();
        let mut any_animating = false;
        for (&layer_id, controller) in &mut self.scrollbar_animation_controllers {
            if controller.animate(now) {
                changed_layers.push(layer_id);
            }
            any_animating |= controller.is_animating();
        }

        let tree = self.trees.active_mut();
        for &layer_id in &changed_layers {
            if let Some(layer) = tree.layer_mut(layer_id) {
                layer.note_layer_property_changed();
            }
        }
        if any_animating {
            self.set_needs_one_begin_impl_frame();
        }
        !changed_layers.is_empty()
    }

    pub fn animate_top_controls(&mut self, now: Instant) -> bool {
        if !self.top_controls_manager.has_animation() {
            return false;
        }
        let scroll = self.top_controls_manager.animate(self.trees.active_mut(), now);
        if self.top_controls_manager.has_animation() {
            self.set_needs_one_begin_impl_frame();
        }

        if self.trees.active().total_scroll_offset().y == 0.0 {
            return false;
        }
        if scroll == VectorF::zero() {
            return false;
        }
        let page_scale_factor = self.trees.active().current_page_scale_factor();
        self.scroll_viewport_by(scroll / page_scale_factor);
        self.client.set_needs_commit_on_impl_thread();
        self.client.renew_tree_priority();
        true
    }

    /// Starts an animated zoom. With `anchor_point` the target offset is the
    /// anchor to keep fixed, otherwise the scroll offset to end at.
    pub fn start_page_scale_animation(
        &mut self,
        target_offset: VectorF,
        anchor_point: bool,
        page_scale: f32,
        duration: Duration,
    ) {
        let tree = self.trees.active();
        let Some(inner_scroll) = tree.inner_viewport_scroll_layer() else {
            return;
        };
        let container_size = tree
            .layer_by_id(inner_scroll)
            .and_then(|layer| layer.scroll_clip_layer)
            .and_then(|clip| tree.layer_by_id(clip))
            .map(|clip| clip.bounds_with_delta())
            .unwrap_or_else(|| tree.scrollable_viewport_size());

        let mut animation = PageScaleAnimation::new(
            tree.total_scroll_offset(),
            tree.current_page_scale_factor(),
            container_size,
            tree.scrollable_size(),
            CubicBezier::page_scale_ease(),
        );
        if anchor_point {
            animation.zoom_with_anchor(target_offset, page_scale, duration);
        } else {
            animation.zoom_to(target_offset, page_scale, duration);
        }
        self.page_scale_animation = Some(animation);
        log::debug!(
            "[host_impl] page scale animation to {page_scale} over {}ms",
            duration.as_millis()
        );

        self.set_needs_one_begin_impl_frame();
        self.client.set_needs_commit_on_impl_thread();
        self.client.renew_tree_priority();
    }

    pub fn update_top_controls_state(
        &mut self,
        constraints: TopControlsState,
        current: TopControlsState,
        animate: bool,
    ) {
        let ratio_before = self.trees.active().current_top_controls_shown_ratio();
        self.top_controls_manager
            .update_top_controls_state(self.trees.active_mut(), constraints, current, animate);
        if self.top_controls_manager.has_animation() {
            self.set_needs_one_begin_impl_frame();
        }
        if self.trees.active().current_top_controls_shown_ratio() != ratio_before {
            self.did_change_top_controls_position();
        }
    }

    /// The controls moved, so the viewport containers change size without a
    /// commit.
    pub fn did_change_top_controls_position(&mut self) {
        self.update_viewport_container_sizes();
        self.set_needs_redraw();
        self.set_needs_one_begin_impl_frame();
        self.trees.active_mut().set_needs_update_draw_properties();
        self.set_full_root_layer_damage();
    }

    /// Creates fade controllers for scroll layers with scrollbars and drops the
    /// ones whose layer went away.
    pub(crate) fn register_scrollbar_animation_controllers(&mut self) {
        let tree = self.trees.active();
        let with_scrollbars: Vec<LayerId> = tree
            .layer_ids_in_tree_order()
            .into_iter()
            .filter(|&layer_id| {
                tree.layer_by_id(layer_id).is_some_and(|layer| {
                    layer.has_vertical_scrollbar || layer.has_horizontal_scrollbar
                })
            })
            .collect();

        self.scrollbar_animation_controllers
            .retain(|layer_id, _| with_scrollbars.contains(layer_id));
        let delay = self.settings.scrollbar_fade_delay;
        let duration = self.settings.scrollbar_fade_duration;
        for layer_id in with_scrollbars {
            self.scrollbar_animation_controllers
                .entry(layer_id)
                .or_insert_with(|| ScrollbarFadeController::new(delay, duration));
        }
    }

    pub fn scrollbar_animation_controller(&self, layer_id: LayerId) -> Option<&ScrollbarFadeController> {
        self.scrollbar_animation_controllers.get(&layer_id)
    }

    pub(crate) fn did_scroll_layer_with_scrollbars(&mut self, layer_id: LayerId) {
        let now = self.current_begin_frame_time();
        let Some(controller) = self.scrollbar_animation_controllers.get_mut(&layer_id) else {
            return;
        };
        controller.did_scroll(now);
        self.set_needs_one_begin_impl_frame();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrollbars_stay_visible_until_delay_then_fade() {
        let start = Instant::now();
        let mut controller =
            ScrollbarFadeController::new(Duration::from_millis(100), Duration::from_millis(200));
        assert!(!controller.animate(start));

        controller.did_scroll(start);
        assert_eq!(controller.opacity(), 1.0);
        assert!(!controller.animate(start + Duration::from_millis(50)));

        assert!(controller.animate(start + Duration::from_millis(200)));
        assert!((controller.opacity() - 0.5).abs() < 1e-3);

        assert!(controller.animate(start + Duration::from_millis(400)));
        assert_eq!(controller.opacity(), 0.0);
        assert!(!controller.is_animating());
    }

    #[test]
    fn scrolling_again_restores_full_opacity() {
        let start = Instant::now();
        let mut controller = ScrollbarFadeController::new(Duration::ZERO, Duration::from_millis(100));
        controller.did_scroll(start);
        controller.animate(start + Duration::from_millis(50));
        assert!(controller.opacity() < 1.0);

        controller.did_scroll(start + Duration::from_millis(60));
        assert_eq!(controller.opacity(), 1.0);
    }
}
