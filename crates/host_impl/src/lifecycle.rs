use std::collections::HashSet;

use compositor_protocol::{
    IntRect, IntSize, LayerId, RectF, ScrollAndScaleSet, SwapPromise, VectorF, enclosing_int_rect,
};
use layer_tree::LayerTreeImpl;
use tiles::WhichTree;

use crate::LayerTreeHostImpl;

impl LayerTreeHostImpl {
    /// Start of a main-thread commit. Outstanding GPU work is reclaimed first so
    /// partial texture updates are safe while the commit lands.
    pub fn begin_commit(&mut self) {
        if let Some(output_surface) = self.output_surface.as_mut() {
            if output_surface.capabilities().can_force_reclaim_resources {
                output_surface.force_reclaim_resources();
            }
        }
        if !self.settings.commit_to_active_tree {
            self.create_pending_tree();
        }
        log::debug!(
            "[host_impl] begin commit into {} tree",
            if self.settings.commit_to_active_tree { "active" } else { "pending" }
        );
    }

    pub fn commit_complete(&mut self) {
        // The commit brought fresh content for whatever was purged.
        if self.sync_tree_mut().reset_contents_textures_purged() && self.settings.commit_to_active_tree {
            let can_draw = self.can_draw();
            self.client.on_can_draw_state_changed(can_draw);
        }
        if self.settings.commit_to_active_tree {
            self.trees.active_mut().activate_animations();
            self.animate();
        } else {
            self.animate_pending_tree_after_commit();
        }

        self.sync_tree_mut().set_needs_update_draw_properties();
        let sync_which = self.sync_tree_which();
        self.update_draw_properties_and_tile_priorities(sync_which);

        // Nothing to raster means the new tree is ready right away.
        let did_prepare_tiles = self.prepare_tiles();
        if !did_prepare_tiles {
            self.notify_ready_to_activate();
            if self.settings.commit_to_active_tree {
                self.notify_ready_to_draw();
            }
        }
        log::debug!(
            "[host_impl] commit complete source_frame={} prepared_tiles={did_prepare_tiles}",
            self.sync_tree().source_frame_number()
        );
    }

    /// The main frame was dropped. When the main thread had already folded in
    /// the deltas sent to it, the impl side treats them as applied.
    pub fn begin_main_frame_aborted(&mut self, main_frame_handled: bool) {
        if main_frame_handled {
            let active = self.trees.active_mut();
            active.apply_sent_scroll_and_scale_deltas_from_aborted_commit();
            if active.reset_contents_textures_purged() {
                let can_draw = self.can_draw();
                self.client.on_can_draw_state_changed(can_draw);
            }
        }
        log::debug!("[host_impl] main frame aborted handled={main_frame_handled}");
    }

    pub fn create_pending_tree(&mut self) {
        let device_viewport_size = self.device_viewport_size;
        let pending = self.trees.create_pending_tree();
        pending.set_device_viewport_size(device_viewport_size);
        pending.set_needs_update_draw_properties();
        let can_draw = self.can_draw();
        self.client.on_can_draw_state_changed(can_draw);
    }

    /// Makes the sync tree the drawn tree. Without a pending tree only the
    /// active tree's UI resource requests are processed before the common tail.
    pub fn activate_sync_tree(&mut self) {
        if self.trees.has_pending_tree() {
            let requests = self
                .trees
                .pending_mut()
                .map(LayerTreeImpl::take_ui_resource_request_queue)
                .unwrap_or_default();
            self.process_ui_resource_requests(requests);

            self.trees.activate();
            self.tile_manager.activate_pending_tilings();
            self.trees.active_mut().activate_animations();
            self.register_scrollbar_animation_controllers();
        } else {
            let requests = self.trees.active_mut().take_ui_resource_request_queue();
            self.process_ui_resource_requests(requests);
        }

        self.update_viewport_container_sizes();
        self.trees.active_mut().did_become_active();
        self.client.renew_tree_priority();
        if !self.trees.active().picture_layer_ids().is_empty() {
            self.did_modify_tile_priorities();
        }

        let can_draw = self.can_draw();
        self.client.on_can_draw_state_changed(can_draw);
        self.client.did_activate_sync_tree();

        if let Some(pending_animation) = self.trees.active_mut().take_pending_page_scale_animation() {
            self.start_page_scale_animation(
                pending_animation.target_offset,
                pending_animation.use_anchor,
                pending_animation.scale,
                pending_animation.duration,
            );
        }
        log::debug!(
            "[host_impl] activated source_frame={}",
            self.trees.active().source_frame_number()
        );
    }

    /// Resizes the viewport containers so the top controls' current offset is
    /// reflected in the layout without a main-thread round trip.
    pub fn update_viewport_container_sizes(&mut self) {
        let top_controls_layout_height = {
            let tree = self.trees.active();
            if tree.top_controls_shrink_content_size() {
                tree.top_controls_height()
            } else {
                0.0
            }
        };
        let delta_from_top_controls = top_controls_layout_height
            - self.top_controls_manager.content_top_offset(self.trees.active());

        let tree = self.trees.active_mut();
        let Some(inner_container) = tree.inner_viewport_container_layer() else {
            return;
        };
        if let Some(layer) = tree.layer_mut(inner_container) {
            layer.bounds_delta = VectorF::new(0.0, delta_from_top_controls);
            layer.note_layer_property_changed();
        }

        let Some(outer_container) = tree.outer_viewport_container_layer() else {
            tree.set_needs_update_draw_properties();
            return;
        };
        let outer_is_empty = tree
            .layer_by_id(outer_container)
            .is_none_or(|layer| layer.bounds_with_delta().is_empty());
        if outer_is_empty {
            tree.set_needs_update_draw_properties();
            return;
        }

        // The outer viewport lives in CSS pixels at minimum scale.
        let scaled_delta = VectorF::new(
            0.0,
            delta_from_top_controls / tree.min_page_scale_factor(),
        );
        if let Some(layer) = tree.layer_mut(outer_container) {
            layer.bounds_delta = scaled_delta;
            layer.note_layer_property_changed();
        }
        if let Some(inner_scroll) = tree.inner_viewport_scroll_layer() {
            if let Some(layer) = tree.layer_mut(inner_scroll) {
                layer.bounds_delta = scaled_delta;
                layer.note_layer_property_changed();
            }
        }
        tree.set_needs_update_draw_properties();
    }

    pub fn set_viewport_size(&mut self, device_viewport_size: IntSize) {
        if self.device_viewport_size == device_viewport_size {
            return;
        }
        // The active tree keeps its content laid out for the old size until the
        // commit with the new layout activates.
        if self.trees.has_pending_tree() {
            self.trees.active_mut().set_viewport_size_invalid();
        }
        self.device_viewport_size = device_viewport_size;
        self.trees
            .for_each_tree_mut(|tree| tree.set_device_viewport_size(device_viewport_size));

        self.update_viewport_container_sizes();
        let can_draw = self.can_draw();
        self.client.on_can_draw_state_changed(can_draw);
        self.set_full_root_layer_damage();
        self.trees.active_mut().set_needs_update_draw_properties();
        log::debug!("[host_impl] viewport size {device_viewport_size:?}");
    }

    /// Impl-side deltas for the next main frame. Sent deltas are remembered by
    /// the synced properties until the commit that carries them back lands.
    pub fn process_scroll_deltas(&mut self) -> ScrollAndScaleSet {
        let tree = self.trees.active_mut();
        let scrolls = if tree.layer_list_is_empty() {
            Vec::new()
        } else {
            tree.collect_scroll_deltas()
        };
        let (page_scale_delta, top_controls_delta) = tree.pull_viewport_deltas_for_main_thread();
        ScrollAndScaleSet {
            scrolls,
            page_scale_delta,
            top_controls_delta,
            swap_promises: std::mem::take(&mut self.swap_promises_for_main_thread_scroll_update),
        }
    }

    /// Promises that resolve with the main frame that picks up the current scroll.
    pub fn queue_swap_promise_for_main_thread_scroll_update(&mut self, promise: Box<dyn SwapPromise>) {
        self.swap_promises_for_main_thread_scroll_update.push(promise);
    }

    pub fn can_draw(&self) -> bool {
        if self.renderer.is_none() {
            log::trace!("[host_impl] can_draw false: no renderer");
            return false;
        }
        let active = self.trees.active();
        if active.layer_list_is_empty() {
            log::trace!("[host_impl] can_draw false: no root layer");
            return false;
        }
        if self.resourceless_software_draw {
            return true;
        }
        if self.draw_viewport_size().is_empty() {
            log::trace!("[host_impl] can_draw false: empty viewport");
            return false;
        }
        if active.viewport_size_invalid() {
            log::trace!("[host_impl] can_draw false: viewport size recently changed");
            return false;
        }
        if active.contents_textures_purged() {
            log::trace!("[host_impl] can_draw false: contents textures purged");
            return false;
        }
        if self.evicted_ui_resources_exist() {
            log::trace!("[host_impl] can_draw false: evicted UI resources");
            return false;
        }
        true
    }

    pub fn set_visible(&mut self, visible: bool) {
        if self.visible == visible {
            return;
        }
        self.visible = visible;
        let policy = self.actual_managed_memory_policy();
        self.enforce_managed_memory_policy(policy);

        if visible {
            self.trees.active_mut().set_requires_high_res_to_draw();
        } else {
            self.evict_all_ui_resources();
            self.trees.clear_recycle_tree();
            // Drop tiles promptly instead of waiting for the next frame.
            self.prepare_tiles();
        }

        if let Some(renderer) = self.renderer.as_mut() {
            renderer.set_visible(visible);
        }
        log::debug!("[host_impl] visible={visible}");
    }

    /// The external viewport when the embedder set one, else the whole surface.
    pub fn device_viewport(&self) -> IntRect {
        if self.external_viewport.is_empty() {
            IntRect::from_size(self.device_viewport_size)
        } else {
            self.external_viewport
        }
    }

    pub fn device_clip(&self) -> IntRect {
        if self.external_clip.is_empty() {
            self.device_viewport()
        } else {
            self.external_clip
        }
    }

    pub fn draw_viewport_size(&self) -> IntSize {
        self.device_viewport().size
    }

    pub(crate) fn viewport_rect_for_tile_priority(&self) -> IntRect {
        if self.viewport_rect_for_tile_priority.is_empty() {
            self.device_viewport()
        } else {
            self.viewport_rect_for_tile_priority
        }
    }

    pub(crate) fn sync_tree_which(&self) -> WhichTree {
        if self.trees.has_pending_tree() {
            WhichTree::Pending
        } else {
            WhichTree::Active
        }
    }

    /// Recomputes the draw properties of one tree and hands the visible rect and
    /// invalidation of each picture layer to the tile manager. Returns false when
    /// the tree has no root layer.
    pub(crate) fn update_draw_properties_and_tile_priorities(&mut self, which: WhichTree) -> bool {
        let tile_priority_rect = self.viewport_rect_for_tile_priority().to_f32();
        let tree = match which {
            WhichTree::Pending => match self.trees.pending_mut() {
                Some(tree) => tree,
                None => return false,
            },
            WhichTree::Active => self.trees.active_mut(),
        };
        if !tree.update_draw_properties() {
            return false;
        }

        let picture_layers = tree.picture_layer_ids();
        for &layer_id in &picture_layers {
            let Some(layer) = tree.layer_mut(layer_id) else {
                continue;
            };
            let invalidation: Vec<IntRect> = layer
                .take_invalidation()
                .into_iter()
                .map(enclosing_int_rect)
                .collect();
            let bounds = layer.bounds_with_delta();
            let bounds = IntSize::new(bounds.width.ceil() as i32, bounds.height.ceil() as i32);
            let visible_rect = tile_priority_visible_rect(layer, tile_priority_rect);
            self.tile_manager.update_layer_tiling(
                layer_id,
                which,
                bounds,
                enclosing_int_rect(visible_rect),
                &invalidation,
            );
        }
        let live_layers: HashSet<LayerId> = picture_layers.into_iter().collect();
        self.tile_manager.retain_layers(which, &live_layers);
        self.tile_priorities_dirty = true;
        true
    }
}

/// The part of `layer` that lies in the tile priority viewport, in layer space.
fn tile_priority_visible_rect(layer: &layer_tree::LayerImpl, tile_priority_rect: RectF) -> RectF {
    let properties = layer.draw_properties();
    let Some(inverse) = properties.screen_space_transform.inverse() else {
        return properties.visible_layer_rect;
    };
    inverse
        .outer_transformed_rect(&tile_priority_rect)
        .intersection(&layer.layer_rect())
        .unwrap_or_else(RectF::zero)
}
