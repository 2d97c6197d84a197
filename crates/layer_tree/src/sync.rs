//! Moving committed state between trees: a main-thread commit into the sync
//! tree, and the pending tree into the active tree on activation.

use std::collections::HashMap;

use compositor_protocol::LayerId;

use crate::{LayerImpl, LayerKey, LayerTreeImpl};

/// Rebuilds `target`'s hierarchy so it mirrors `source` layer-for-layer by id.
///
/// Layers that exist in both trees keep their impl-side state (scroll deltas,
/// animation progress); everything else is created fresh. Properties are not
/// copied here, see `LayerTreeImpl::push_properties_to`.
pub fn synchronize_trees(source: &mut LayerTreeImpl, target: &mut LayerTreeImpl) {
    let mut reusable: HashMap<LayerId, LayerImpl> = target
        .layers
        .drain()
        .map(|(_, layer)| (layer.id(), layer))
        .collect();
    target.layer_id_map.clear();
    target.root = None;

    let Some(source_root) = source.root else {
        log::debug!("[layer_tree] synchronize trees: source has no root");
        target.set_needs_update_draw_properties();
        source.needs_full_tree_sync = false;
        return;
    };

    let mut stack: Vec<(LayerKey, Option<LayerKey>)> = vec![(source_root, None)];
    while let Some((source_key, target_parent)) = stack.pop() {
        let source_layer = &source.layers[source_key];
        let id = source_layer.id();
        let mut layer = reusable.remove(&id).unwrap_or_else(|| LayerImpl::new(id));
        layer.parent = target_parent;
        layer.children.clear();
        let key = target.layers.insert(layer);
        target.layer_id_map.insert(id, key);
        match target_parent {
            Some(parent) => target.layers[parent].children.push(key),
            None => target.root = Some(key),
        }
        for &child in source_layer.children.iter().rev() {
            stack.push((child, Some(key)));
        }
    }

    log::debug!(
        "[layer_tree] synchronize trees: layers={} dropped={}",
        target.layers.len(),
        reusable.len()
    );
    source.needs_full_tree_sync = false;
    target.set_needs_update_draw_properties();
}

impl LayerTreeImpl {
    /// Pushes every committed layer and tree property into `target`.
    ///
    /// Copy requests, animations and swap promises move rather than copy.
    pub fn push_properties_to(&mut self, target: &mut LayerTreeImpl) {
        for key in self.pre_order_keys() {
            let id = self.layers[key].id();
            let Some(&target_key) = target.layer_id_map.get(&id) else {
                continue;
            };
            let source_layer = &mut self.layers[key];
            let target_layer = &mut target.layers[target_key];
            source_layer.push_properties_to(target_layer);
            target_layer
                .copy_requests
                .extend(source_layer.copy_requests.drain(..));

            let incoming = std::mem::take(&mut source_layer.animations);
            let mut merged = Vec::with_capacity(incoming.len());
            for animation in incoming {
                match target_layer
                    .animations
                    .iter()
                    .position(|existing| existing.id() == animation.id())
                {
                    Some(index) => merged.push(target_layer.animations.swap_remove(index)),
                    None => merged.push(animation),
                }
            }
            target_layer.animations = merged;
            source_layer.reset_change_tracking();
        }

        target.viewport_layers = self.viewport_layers;
        target.hud_layer = self.hud_layer;
        target.min_page_scale_factor = self.min_page_scale_factor;
        target.max_page_scale_factor = self.max_page_scale_factor;
        target
            .page_scale_factor
            .push_pending_to_active(&self.page_scale_factor);
        target.device_scale_factor = self.device_scale_factor;
        target.painted_device_scale_factor = self.painted_device_scale_factor;
        target.top_controls_height = self.top_controls_height;
        target.top_controls_shrink_content_size = self.top_controls_shrink_content_size;
        target
            .top_controls_shown_ratio
            .push_pending_to_active(&self.top_controls_shown_ratio);
        target.background_color = self.background_color;
        target.has_transparent_background = self.has_transparent_background;
        target.have_scroll_event_handlers = self.have_scroll_event_handlers;
        target.source_frame_number = self.source_frame_number;
        target.contents_textures_purged = self.contents_textures_purged;
        if self.requires_high_res_to_draw {
            target.requires_high_res_to_draw = true;
        }

        for mut promise in self.swap_promises.drain(..) {
            promise.did_activate();
            target.swap_promises.push(promise);
        }
        if let Some(animation) = self.pending_page_scale_animation.take() {
            target.pending_page_scale_animation = Some(animation);
        }
        target.set_needs_update_draw_properties();
    }
}
