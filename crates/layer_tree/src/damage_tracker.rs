//! Per-surface damage accumulation.
//!
//! Each surface remembers the target-space rect every contributor covered last frame.
//! Damage accumulates across updates until the surface reports it was drawn.

use std::collections::HashMap;

use compositor_protocol::{LayerId, RectF};

/// What one contributor looked like this frame, in target surface space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DamageContributor {
    pub layer_id: LayerId,
    pub rect: RectF,
    pub property_changed: bool,
    /// Redrawn part of a layer, or the current damage of a child surface.
    pub content_damage: RectF,
}

#[derive(Debug, Clone, Copy)]
struct RectHistoryEntry {
    rect: RectF,
    seen_this_update: bool,
}

#[derive(Debug)]
pub struct DamageTracker {
    rect_history: HashMap<LayerId, RectHistoryEntry>,
    current_damage: RectF,
    damage_next_update: RectF,
    force_full_damage_next_update: bool,
}

fn union(accumulated: &mut RectF, rect: RectF) {
    if rect.is_empty() {
        return;
    }
    *accumulated = if accumulated.is_empty() {
        rect
    } else {
        accumulated.union(&rect)
    };
}

impl Default for DamageTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl DamageTracker {
    pub fn new() -> Self {
        Self {
            rect_history: HashMap::new(),
            current_damage: RectF::zero(),
            damage_next_update: RectF::zero(),
            force_full_damage_next_update: false,
        }
    }

    pub fn current_damage_rect(&self) -> RectF {
        self.current_damage
    }

    pub fn add_damage_next_update(&mut self, rect: RectF) {
        union(&mut self.damage_next_update, rect);
    }

    pub fn force_full_damage_next_update(&mut self) {
        self.force_full_damage_next_update = true;
    }

    pub fn did_draw_damaged_area(&mut self) {
        self.current_damage = RectF::zero();
    }

    pub fn update_damage_tracking_state(
        &mut self,
        contributors: &[DamageContributor],
        surface_content_rect: RectF,
        surface_property_changed: bool,
    ) {
        for entry in self.rect_history.values_mut() {
            entry.seen_this_update = false;
        }

        let mut damage = RectF::zero();
        for contributor in contributors {
            let previous = self.rect_history.insert(
                contributor.layer_id,
                RectHistoryEntry {
                    rect: contributor.rect,
                    seen_this_update: true,
                },
            );
            match previous {
                Some(previous) if !contributor.property_changed => {
                    union(&mut damage, contributor.content_damage);
                    if previous.rect != contributor.rect {
                        union(&mut damage, previous.rect);
                        union(&mut damage, contributor.rect);
                    }
                }
                Some(previous) => {
                    union(&mut damage, previous.rect);
                    union(&mut damage, contributor.rect);
                }
                None => union(&mut damage, contributor.rect),
            }
        }

        self.rect_history.retain(|_, entry| {
            if !entry.seen_this_update {
                union(&mut damage, entry.rect);
            }
            entry.seen_this_update
        });

        if surface_property_changed || self.force_full_damage_next_update {
            damage = surface_content_rect;
            self.force_full_damage_next_update = false;
        } else {
            union(&mut damage, self.damage_next_update);
            damage = damage.intersection(&surface_content_rect).unwrap_or_else(RectF::zero);
        }
        self.damage_next_update = RectF::zero();

        union(&mut self.current_damage, damage);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contributor(id: i32, rect: RectF, property_changed: bool) -> DamageContributor {
        DamageContributor {
            layer_id: LayerId(id),
            rect,
            property_changed,
            content_damage: RectF::zero(),
        }
    }

    fn rect(x: f32, y: f32, w: f32, h: f32) -> RectF {
        RectF::new(euclid::point2(x, y), euclid::size2(w, h))
    }

    #[test]
    fn new_contributor_damages_its_rect_then_settles() {
        let mut tracker = DamageTracker::new();
        let content = rect(0.0, 0.0, 800.0, 600.0);
        let layer = rect(10.0, 10.0, 50.0, 50.0);

        tracker.update_damage_tracking_state(&[contributor(1, layer, false)], content, false);
        assert_eq!(tracker.current_damage_rect(), layer);

        tracker.did_draw_damaged_area();
        tracker.update_damage_tracking_state(&[contributor(1, layer, false)], content, false);
        assert!(tracker.current_damage_rect().is_empty());
    }

    #[test]
    fn removed_contributor_damages_old_rect() {
        let mut tracker = DamageTracker::new();
        let content = rect(0.0, 0.0, 800.0, 600.0);
        let layer = rect(100.0, 0.0, 20.0, 20.0);

        tracker.update_damage_tracking_state(&[contributor(7, layer, false)], content, false);
        tracker.did_draw_damaged_area();
        tracker.update_damage_tracking_state(&[], content, false);
        assert_eq!(tracker.current_damage_rect(), layer);
    }

    #[test]
    fn forced_full_damage_covers_content_rect_once() {
        let mut tracker = DamageTracker::new();
        let content = rect(0.0, 0.0, 400.0, 300.0);
        tracker.force_full_damage_next_update();
        tracker.update_damage_tracking_state(&[], content, false);
        assert_eq!(tracker.current_damage_rect(), content);

        tracker.did_draw_damaged_area();
        tracker.update_damage_tracking_state(&[], content, false);
        assert!(tracker.current_damage_rect().is_empty());
    }

    #[test]
    fn extra_damage_is_clipped_to_content() {
        let mut tracker = DamageTracker::new();
        let content = rect(0.0, 0.0, 100.0, 100.0);
        tracker.add_damage_next_update(rect(50.0, 50.0, 100.0, 100.0));
        tracker.update_damage_tracking_state(&[], content, false);
        assert_eq!(tracker.current_damage_rect(), rect(50.0, 50.0, 50.0, 50.0));
    }
}
