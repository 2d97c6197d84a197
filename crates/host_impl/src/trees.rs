//! Ownership of the active/pending/recycle tree triple.
//!
//! Roles only change through `create_pending_tree` and `activate`, so no caller
//! ever observes a tree that is both pending and active.

use layer_tree::{LayerTreeImpl, LayerTreeKind, synchronize_trees};

#[derive(Debug)]
pub struct TreeSet {
    active: LayerTreeImpl,
    pending: Option<LayerTreeImpl>,
    recycle: Option<LayerTreeImpl>,
}

impl Default for TreeSet {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeSet {
    pub fn new() -> Self {
        Self {
            active: LayerTreeImpl::new(LayerTreeKind::Active),
            pending: None,
            recycle: None,
        }
    }

    pub fn active(&self) -> &LayerTreeImpl {
        &self.active
    }

    pub fn active_mut(&mut self) -> &mut LayerTreeImpl {
        &mut self.active
    }

    pub fn pending(&self) -> Option<&LayerTreeImpl> {
        self.pending.as_ref()
    }

    pub fn pending_mut(&mut self) -> Option<&mut LayerTreeImpl> {
        self.pending.as_mut()
    }

    pub fn recycle(&self) -> Option<&LayerTreeImpl> {
        self.recycle.as_ref()
    }

    pub fn has_pending_tree(&self) -> bool {
        self.pending.is_some()
    }

    /// The tree commits land in: the pending tree when there is one.
    pub fn sync_tree(&self) -> &LayerTreeImpl {
        self.pending.as_ref().unwrap_or(&self.active)
    }

    pub fn sync_tree_mut(&mut self) -> &mut LayerTreeImpl {
        self.pending.as_mut().unwrap_or(&mut self.active)
    }

    /// Turns the recycle tree into the pending tree, or builds a new one that
    /// starts from the active tree's committed viewport state.
    pub fn create_pending_tree(&mut self) -> &mut LayerTreeImpl {
        debug_assert!(self.pending.is_none(), "pending tree already exists");
        let mut tree = match self.recycle.take() {
            Some(tree) => tree,
            None => {
                let active = &self.active;
                let mut tree = LayerTreeImpl::new(LayerTreeKind::Pending);
                tree.push_page_scale_from_main_thread(
                    active.page_scale_factor().base(),
                    active.min_page_scale_factor(),
                    active.max_page_scale_factor(),
                );
                tree.set_top_controls_height(
                    active.top_controls_height(),
                    active.top_controls_shrink_content_size(),
                );
                tree.push_top_controls_from_main_thread(active.top_controls_shown_ratio().base());
                tree.set_device_scale_factor(active.device_scale_factor());
                tree.set_painted_device_scale_factor(active.painted_device_scale_factor());
                tree.set_device_viewport_size(active.device_viewport_size());
                tree
            }
        };
        tree.set_kind(LayerTreeKind::Pending);
        self.pending.insert(tree)
    }

    /// Pushes the pending tree into the active tree and parks it as the recycle
    /// tree. Returns false when there was nothing to activate.
    pub fn activate(&mut self) -> bool {
        let Some(mut pending) = self.pending.take() else {
            return false;
        };
        debug_assert!(self.recycle.is_none(), "recycle slot occupied during activation");
        if pending.needs_full_tree_sync() {
            synchronize_trees(&mut pending, &mut self.active);
        }
        pending.push_properties_to(&mut self.active);
        pending.set_kind(LayerTreeKind::Recycle);
        self.recycle = Some(pending);
        true
    }

    /// Drops the recycle tree; its memory is not worth keeping while hidden.
    pub fn clear_recycle_tree(&mut self) {
        self.recycle = None;
    }

    pub fn for_each_tree_mut(&mut self, mut apply: impl FnMut(&mut LayerTreeImpl)) {
        apply(&mut self.active);
        if let Some(pending) = self.pending.as_mut() {
            apply(pending);
        }
        if let Some(recycle) = self.recycle.as_mut() {
            apply(recycle);
        }
    }
}
