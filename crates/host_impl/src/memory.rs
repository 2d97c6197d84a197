use compositor_protocol::LayerId;
use layer_tree::LayerTreeImpl;
use tiles::{
    ManagedMemoryPolicy, PriorityCutoff, ResourcePool, TaskGraphError, TileManagerNotification,
    TreePriority, WhichTree, priority_cutoff_to_tile_memory_limit_policy,
};

use crate::{DebugState, LayerTreeHostImpl};

impl LayerTreeHostImpl {
    /// Applies an embedder memory policy. A synchronous compositor handed a zero
    /// budget tears the tile pipeline down and rebuilds it right away.
    pub fn set_memory_policy(&mut self, policy: ManagedMemoryPolicy) {
        self.set_managed_memory_policy(policy);

        if policy.bytes_limit_when_visible == 0
            && self.tile_manager.has_resources()
            && self.settings.using_synchronous_renderer_compositor
        {
            log::debug!("[host_impl] zero memory budget, rebuilding tile resources");
            self.release_tree_resources();
            self.clean_up_tile_manager_and_ui_resources();
            // Nothing may have been scheduled when the tile manager went away.
            self.notify_all_tile_tasks_completed();
            self.create_tile_manager_resources();
            self.recreate_tree_resources();
        }
    }

    pub fn set_managed_memory_policy(&mut self, policy: ManagedMemoryPolicy) {
        if self.cached_managed_memory_policy == policy {
            return;
        }
        let old_policy = self.actual_managed_memory_policy();
        self.cached_managed_memory_policy = policy;
        let actual_policy = self.actual_managed_memory_policy();
        if old_policy == actual_policy {
            return;
        }
        self.enforce_managed_memory_policy(actual_policy);

        // Budgets above what the content needs on both sides change nothing a
        // commit could use. Hidden hosts get a commit on becoming visible anyway.
        let needs_commit = !(self.visible
            && actual_policy.bytes_limit_when_visible >= self.max_memory_needed_bytes
            && old_policy.bytes_limit_when_visible >= self.max_memory_needed_bytes
            && actual_policy.priority_cutoff_when_visible == old_policy.priority_cutoff_when_visible);
        if needs_commit {
            self.client.set_needs_commit_on_impl_thread();
        }
        log::debug!(
            "[host_impl] memory policy bytes={} cutoff={:?} needs_commit={needs_commit}",
            actual_policy.bytes_limit_when_visible,
            actual_policy.priority_cutoff_when_visible
        );
    }

    /// Largest tile memory the committed content could use.
    pub fn set_max_memory_needed_bytes(&mut self, bytes: usize) {
        self.max_memory_needed_bytes = bytes;
    }

    /// The cached policy with debug overrides applied.
    pub fn actual_managed_memory_policy(&self) -> ManagedMemoryPolicy {
        let mut actual = self.cached_managed_memory_policy;
        if self.debug_state.rasterize_only_visible_content {
            actual.priority_cutoff_when_visible = PriorityCutoff::AllowRequiredOnly;
        }
        actual
    }

    /// Evicts tile memory the policy no longer allows, then hands the policy to
    /// the tile manager. Evicted content leaves both trees purged until a commit
    /// brings fresh content. A visible zero budget leaves no room for content at all.
    pub fn enforce_managed_memory_policy(&mut self, policy: ManagedMemoryPolicy) {
        let limit_bytes = if self.visible {
            policy.bytes_limit_when_visible
        } else {
            0
        };
        let evicted = self.tile_manager.reduce_memory_usage_to(limit_bytes);
        if evicted || (self.visible && limit_bytes == 0) {
            self.trees.active_mut().set_contents_textures_purged();
            if let Some(pending) = self.trees.pending_mut() {
                pending.set_contents_textures_purged();
            }
            log::info!("[host_impl] contents textures purged, limit={limit_bytes}");
            self.client.set_needs_commit_on_impl_thread();
            let can_draw = self.can_draw();
            self.client.on_can_draw_state_changed(can_draw);
            self.client.renew_tree_priority();
        }

        self.update_tile_manager_memory_policy(policy);
    }

    /// Pushes `policy` into the global tile state. A hidden host keeps nothing.
    pub fn update_tile_manager_memory_policy(&mut self, policy: ManagedMemoryPolicy) {
        if !self.tile_manager.has_resources() {
            return;
        }
        let state = &mut self.global_tile_state;
        state.hard_memory_limit_in_bytes = 0;
        state.soft_memory_limit_in_bytes = 0;
        if self.visible && policy.bytes_limit_when_visible > 0 {
            state.hard_memory_limit_in_bytes = policy.bytes_limit_when_visible;
            state.soft_memory_limit_in_bytes = policy.bytes_limit_when_visible
                * self.settings.max_memory_for_prepaint_percentage
                / 100;
        }
        let cutoff = if self.visible {
            policy.priority_cutoff_when_visible
        } else {
            PriorityCutoff::AllowNothing
        };
        state.memory_limit_policy = priority_cutoff_to_tile_memory_limit_policy(cutoff);
        state.num_resources_limit = policy.num_resources_limit;

        // The pool trims back to the soft limit after going over.
        let soft_limit = state.soft_memory_limit_in_bytes;
        let count_limit = state.num_resources_limit;
        self.tile_manager
            .set_resource_usage_limits(soft_limit, count_limit);
        self.did_modify_tile_priorities();
    }

    pub fn did_modify_tile_priorities(&mut self) {
        self.tile_priorities_dirty = true;
        self.client.set_needs_prepare_tiles_on_impl_thread();
    }

    /// Runs tile prioritization if anything changed since the last run. Returns
    /// whether the tile manager did any work.
    pub fn prepare_tiles(&mut self) -> bool {
        if !self.tile_priorities_dirty {
            return false;
        }
        self.client.will_prepare_tiles();
        let did_prepare_tiles = self.tile_manager.prepare_tiles(&self.global_tile_state);
        if did_prepare_tiles {
            self.tile_priorities_dirty = false;
        }
        self.client.did_prepare_tiles();
        did_prepare_tiles
    }

    /// Collects finished raster and forwards what the tile manager signaled.
    pub fn check_for_completed_tile_tasks(&mut self) {
        self.tile_manager.flush();
        self.handle_tile_manager_notifications();
    }

    pub fn handle_tile_manager_notifications(&mut self) {
        self.dispatch_tile_manager_notifications(false);
    }

    /// Inside a draw, damage from state changes lands in the frame being built
    /// so no extra redraw is requested.
    pub(crate) fn dispatch_tile_manager_notifications(&mut self, inside_draw: bool) {
        for notification in self.tile_manager.take_notifications() {
            match notification {
                TileManagerNotification::ReadyToActivate => self.notify_ready_to_activate(),
                TileManagerNotification::ReadyToDraw => self.notify_ready_to_draw(),
                TileManagerNotification::AllTileTasksCompleted => self.notify_all_tile_tasks_completed(),
                TileManagerNotification::TileStateChanged {
                    layer,
                    required_for_draw,
                } => self.notify_tile_state_changed(layer, required_for_draw && !inside_draw),
            }
        }
    }

    pub fn notify_ready_to_activate(&mut self) {
        self.client.notify_ready_to_activate();
    }

    /// Ready tiles already requested their redraws through state changes.
    pub fn notify_ready_to_draw(&mut self) {
        self.is_likely_to_require_a_draw = false;
        self.client.notify_ready_to_draw();
    }

    pub fn notify_all_tile_tasks_completed(&mut self) {
        if self.global_tile_state.hard_memory_limit_in_bytes == 0 {
            log::trace!("[host_impl] tile tasks drained with a zero budget");
        }
    }

    /// A tile of `layer` changed state. The layer is damaged in both trees; a
    /// tile needed for the next draw also requests a redraw.
    pub fn notify_tile_state_changed(&mut self, layer: LayerId, required_for_draw: bool) {
        damage_whole_layer(self.trees.active_mut(), layer);
        if let Some(pending) = self.trees.pending_mut() {
            damage_whole_layer(pending, layer);
        }
        if required_for_draw {
            self.set_needs_redraw();
        }
    }

    pub fn set_is_likely_to_require_a_draw(&mut self, is_likely_to_require_a_draw: bool) {
        self.is_likely_to_require_a_draw = is_likely_to_require_a_draw;
    }

    pub fn tree_priority(&self) -> TreePriority {
        self.global_tile_state.tree_priority
    }

    pub fn set_tree_priority(&mut self, priority: TreePriority) {
        if self.global_tile_state.tree_priority == priority {
            return;
        }
        self.global_tile_state.tree_priority = priority;
        self.did_modify_tile_priorities();
    }

    pub fn release_tree_resources(&mut self) {
        self.trees.for_each_tree_mut(|tree| tree.release_resources());
        self.tile_manager.release_tile_resources();
        self.release_hud_resource();
        self.evict_all_ui_resources();
    }

    pub fn recreate_tree_resources(&mut self) {
        self.trees.for_each_tree_mut(|tree| tree.recreate_resources());
    }

    pub fn create_tile_manager_resources(&mut self) {
        let Some(provider) = self.resource_provider.clone() else {
            return;
        };
        self.tile_manager.set_resources(ResourcePool::new(provider));
        let policy = self.actual_managed_memory_policy();
        self.update_tile_manager_memory_policy(policy);
    }

    pub fn clean_up_tile_manager_and_ui_resources(&mut self) {
        self.clear_ui_resources();
        self.tile_manager.finish_tasks_and_clean_up();
    }

    /// Rasters the missing tiles of one active layer, blocking until done.
    pub fn run_on_demand_raster_task(&mut self, layer: LayerId) -> Result<usize, TaskGraphError> {
        let rastered = self.tile_manager.run_on_demand_raster(layer, WhichTree::Active)?;
        self.dispatch_tile_manager_notifications(true);
        Ok(rastered)
    }

    pub fn set_debug_state(&mut self, debug_state: DebugState) {
        if self.debug_state == debug_state {
            return;
        }
        self.debug_state = debug_state;
        let policy = self.actual_managed_memory_policy();
        self.update_tile_manager_memory_policy(policy);
        self.set_full_root_layer_damage();
    }
}

fn damage_whole_layer(tree: &mut LayerTreeImpl, layer_id: LayerId) {
    if let Some(layer) = tree.layer_mut(layer_id) {
        let rect = layer.layer_rect();
        layer.union_update_rect(rect);
    }
}
