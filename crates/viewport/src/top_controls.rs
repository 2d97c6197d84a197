//! Show/hide state of the browser's top controls (location bar).
//!
//! The shown ratio lives on the active tree so it is synchronised with the main
//! thread like any other impl-side delta. This manager only decides how
//! scrolls and gestures move it.

use std::time::{Duration, Instant};

use compositor_protocol::VectorF;
use layer_tree::LayerTreeImpl;

pub const SHOW_HIDE_MAX_DURATION: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopControlsState {
    Shown,
    Hidden,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationDirection {
    ShowingControls,
    HidingControls,
}

#[derive(Debug, Clone, Copy)]
struct TopControlsAnimation {
    direction: AnimationDirection,
    start_value: f32,
    /// Set on the first tick so the animation never jumps on a late frame.
    start_time: Option<Instant>,
}

impl TopControlsAnimation {
    fn stop_value(&self) -> f32 {
        match self.direction {
            AnimationDirection::ShowingControls => self.start_value + 1.0,
            AnimationDirection::HidingControls => self.start_value - 1.0,
        }
    }

    fn is_complete(&self, ratio: f32) -> bool {
        match self.direction {
            AnimationDirection::ShowingControls => ratio >= 1.0,
            AnimationDirection::HidingControls => ratio <= 0.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TopControlsManager {
    show_threshold: f32,
    hide_threshold: f32,
    permitted_state: TopControlsState,
    accumulated_scroll_delta: f32,
    baseline_content_offset: f32,
    pinch_gesture_active: bool,
    animation: Option<TopControlsAnimation>,
}

impl TopControlsManager {
    pub fn new(show_threshold: f32, hide_threshold: f32) -> Self {
        Self {
            show_threshold,
            hide_threshold,
            permitted_state: TopControlsState::Both,
            accumulated_scroll_delta: 0.0,
            baseline_content_offset: 0.0,
            pinch_gesture_active: false,
            animation: None,
        }
    }

    pub fn content_top_offset(&self, tree: &LayerTreeImpl) -> f32 {
        tree.current_top_controls_shown_ratio() * tree.top_controls_height()
    }

    pub fn controls_top_offset(&self, tree: &LayerTreeImpl) -> f32 {
        self.content_top_offset(tree) - tree.top_controls_height()
    }

    pub fn permitted_state(&self) -> TopControlsState {
        self.permitted_state
    }

    pub fn has_animation(&self) -> bool {
        self.animation.is_some()
    }

    pub fn animation_direction(&self) -> Option<AnimationDirection> {
        self.animation.map(|animation| animation.direction)
    }

    /// Applies main-thread constraints. `current` asks for an immediate state
    /// within the constraints, animated when `animate` is set.
    pub fn update_top_controls_state(
        &mut self,
        tree: &mut LayerTreeImpl,
        constraints: TopControlsState,
        current: TopControlsState,
        animate: bool,
    ) {
        debug_assert!(
            !(constraints == TopControlsState::Shown && current == TopControlsState::Hidden),
            "cannot hide top controls constrained to shown"
        );
        debug_assert!(
            !(constraints == TopControlsState::Hidden && current == TopControlsState::Shown),
            "cannot show top controls constrained to hidden"
        );
        self.permitted_state = constraints;
        if constraints == TopControlsState::Both && current == TopControlsState::Both {
            return;
        }

        let final_ratio = if constraints == TopControlsState::Shown || current == TopControlsState::Shown {
            1.0
        } else {
            0.0
        };
        if final_ratio == tree.current_top_controls_shown_ratio() {
            self.reset_animations();
            return;
        }
        if animate {
            let direction = if final_ratio == 1.0 {
                AnimationDirection::ShowingControls
            } else {
                AnimationDirection::HidingControls
            };
            self.setup_animation(tree, direction);
        } else {
            self.reset_animations();
            tree.set_current_top_controls_shown_ratio(final_ratio);
        }
    }

    pub fn scroll_begin(&mut self, tree: &LayerTreeImpl) {
        self.reset_animations();
        self.reset_baseline(tree);
    }

    /// Moves the controls by the vertical part of `pending_delta` and returns
    /// the delta left for content scrolling.
    pub fn scroll_by(&mut self, tree: &mut LayerTreeImpl, pending_delta: VectorF) -> VectorF {
        let height = tree.top_controls_height();
        if height == 0.0 || self.pinch_gesture_active {
            return pending_delta;
        }
        match self.permitted_state {
            TopControlsState::Shown if pending_delta.y > 0.0 => return pending_delta,
            TopControlsState::Hidden if pending_delta.y < 0.0 => return pending_delta,
            _ => {}
        }

        self.accumulated_scroll_delta += pending_delta.y;
        let old_offset = self.content_top_offset(tree);
        tree.set_current_top_controls_shown_ratio(
            (self.baseline_content_offset - self.accumulated_scroll_delta) / height,
        );
        // Fully shown controls become the new baseline even mid-gesture.
        if tree.current_top_controls_shown_ratio() == 1.0 {
            self.reset_baseline(tree);
        }
        self.reset_animations();

        let applied = VectorF::new(0.0, old_offset - self.content_top_offset(tree));
        pending_delta - applied
    }

    pub fn scroll_end(&mut self, tree: &LayerTreeImpl) {
        self.start_animation_if_necessary(tree);
    }

    pub fn pinch_begin(&mut self, tree: &LayerTreeImpl) {
        self.pinch_gesture_active = true;
        self.start_animation_if_necessary(tree);
    }

    pub fn pinch_end(&mut self, tree: &LayerTreeImpl) {
        self.pinch_gesture_active = false;
        self.scroll_begin(tree);
    }

    pub fn main_thread_has_stopped_flinging(&mut self, tree: &LayerTreeImpl) {
        self.start_animation_if_necessary(tree);
    }

    /// Advances the settle animation. Returns how far the content moved.
    pub fn animate(&mut self, tree: &mut LayerTreeImpl, now: Instant) -> VectorF {
        let Some(animation) = self.animation.as_mut() else {
            return VectorF::zero();
        };
        if tree.inner_viewport_scroll_layer().is_none() {
            return VectorF::zero();
        }
        let start_time = *animation.start_time.get_or_insert(now);
        let progress = if now <= start_time {
            0.0
        } else {
            let elapsed = now.duration_since(start_time).as_secs_f32();
            (elapsed / SHOW_HIDE_MAX_DURATION.as_secs_f32()).min(1.0)
        };
        let new_ratio = animation.start_value + (animation.stop_value() - animation.start_value) * progress;
        let animation = *animation;

        let old_offset = self.content_top_offset(tree);
        tree.set_current_top_controls_shown_ratio(new_ratio);
        if animation.is_complete(new_ratio) || progress >= 1.0 {
            self.reset_animations();
        }
        VectorF::new(0.0, self.content_top_offset(tree) - old_offset)
    }

    fn reset_animations(&mut self) {
        self.animation = None;
    }

    fn reset_baseline(&mut self, tree: &LayerTreeImpl) {
        self.accumulated_scroll_delta = 0.0;
        self.baseline_content_offset = self.content_top_offset(tree);
    }

    fn setup_animation(&mut self, tree: &mut LayerTreeImpl, direction: AnimationDirection) {
        if self.animation_direction() == Some(direction) {
            return;
        }
        if tree.top_controls_height() == 0.0 {
            let ratio = match direction {
                AnimationDirection::ShowingControls => 1.0,
                AnimationDirection::HidingControls => 0.0,
            };
            tree.set_current_top_controls_shown_ratio(ratio);
            return;
        }
        log::trace!("[viewport] top controls animation: {direction:?}");
        self.animation = Some(TopControlsAnimation {
            direction,
            start_value: tree.current_top_controls_shown_ratio(),
            start_time: None,
        });
    }

    fn start_animation_if_necessary(&mut self, tree: &LayerTreeImpl) {
        let ratio = tree.current_top_controls_shown_ratio();
        if ratio == 0.0 || ratio == 1.0 {
            return;
        }
        let direction = if ratio >= 1.0 - self.hide_threshold {
            AnimationDirection::ShowingControls
        } else if ratio <= self.show_threshold {
            AnimationDirection::HidingControls
        } else if self.accumulated_scroll_delta <= 0.0 {
            AnimationDirection::ShowingControls
        } else {
            AnimationDirection::HidingControls
        };
        if self.animation_direction() == Some(direction) {
            return;
        }
        // The height is non-zero here, otherwise the ratio could not sit between the ends.
        self.animation = Some(TopControlsAnimation {
            direction,
            start_value: ratio,
            start_time: None,
        });
    }
}

#[cfg(test)]
mod tests {
    use compositor_protocol::LayerId;
    use layer_tree::{LayerImpl, LayerTreeKind, ViewportLayers};

    use super::*;

    fn tree_with_controls(height: f32) -> LayerTreeImpl {
        let mut tree = LayerTreeImpl::new(LayerTreeKind::Active);
        tree.set_root_layer(LayerImpl::new(LayerId(1)));
        tree.add_child(LayerId(1), LayerImpl::new(LayerId(2)))
            .expect("inner scroll layer");
        tree.set_viewport_layers(ViewportLayers {
            inner_viewport_scroll: Some(LayerId(2)),
            ..ViewportLayers::default()
        });
        tree.set_top_controls_height(height, true);
        tree
    }

    #[test]
    fn scrolling_down_hides_controls_and_returns_the_rest() {
        let mut tree = tree_with_controls(50.0);
        let mut manager = TopControlsManager::new(0.5, 0.5);
        manager.scroll_begin(&tree);

        let remaining = manager.scroll_by(&mut tree, VectorF::new(0.0, 80.0));
        assert!((remaining.y - 30.0).abs() < 1e-4);
        assert_eq!(tree.current_top_controls_shown_ratio(), 0.0);
        assert!((manager.controls_top_offset(&tree) + 50.0).abs() < 1e-4);
    }

    #[test]
    fn shown_constraint_ignores_hiding_scrolls() {
        let mut tree = tree_with_controls(50.0);
        let mut manager = TopControlsManager::new(0.5, 0.5);
        manager.update_top_controls_state(&mut tree, TopControlsState::Shown, TopControlsState::Both, false);

        let remaining = manager.scroll_by(&mut tree, VectorF::new(0.0, 20.0));
        assert_eq!(remaining, VectorF::new(0.0, 20.0));
        assert_eq!(tree.current_top_controls_shown_ratio(), 1.0);
    }

    #[test]
    fn scroll_end_past_threshold_animates_to_hidden() {
        let mut tree = tree_with_controls(100.0);
        let mut manager = TopControlsManager::new(0.5, 0.5);
        manager.scroll_begin(&tree);
        manager.scroll_by(&mut tree, VectorF::new(0.0, 70.0));
        manager.scroll_end(&tree);
        assert_eq!(
            manager.animation_direction(),
            Some(AnimationDirection::HidingControls)
        );

        let start = Instant::now();
        manager.animate(&mut tree, start);
        let moved = manager.animate(&mut tree, start + SHOW_HIDE_MAX_DURATION);
        assert!(moved.y < 0.0);
        assert_eq!(tree.current_top_controls_shown_ratio(), 0.0);
        assert!(!manager.has_animation());
    }

    #[test]
    fn pinch_blocks_top_controls_scrolling() {
        let mut tree = tree_with_controls(50.0);
        let mut manager = TopControlsManager::new(0.5, 0.5);
        manager.pinch_begin(&tree);
        let remaining = manager.scroll_by(&mut tree, VectorF::new(0.0, 10.0));
        assert_eq!(remaining, VectorF::new(0.0, 10.0));
        manager.pinch_end(&tree);
        let remaining = manager.scroll_by(&mut tree, VectorF::new(0.0, 10.0));
        assert_eq!(remaining, VectorF::zero());
    }
}
