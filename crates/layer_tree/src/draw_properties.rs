//! Derives property trees, render surfaces and per-layer draw state.

use std::collections::HashMap;

use compositor_protocol::{LayerId, PointF, RectF, Transform};

use crate::layer::DrawProperties;
use crate::property_trees::{ClipNode, EffectNode, LayerNodeIndices, ScrollNode, TransformNode};
use crate::render_surface::RenderSurfaceImpl;
use crate::{LayerKey, LayerTreeImpl};

#[derive(Debug, Clone, Copy)]
struct Inherited {
    screen_space: Transform,
    transform_node: Option<usize>,
    clip: Option<RectF>,
    clip_node: Option<usize>,
    effect_node: Option<usize>,
    screen_space_opacity: f32,
    scroll_node: Option<usize>,
    target: Option<LayerId>,
    opacity_to_target: f32,
    animating: bool,
    hidden: bool,
    under_page_scale: bool,
}

fn intersect(clip: Option<RectF>, rect: RectF) -> RectF {
    match clip {
        Some(clip) => clip.intersection(&rect).unwrap_or_else(RectF::zero),
        None => rect,
    }
}

fn union(accumulated: RectF, rect: RectF) -> RectF {
    if rect.is_empty() {
        accumulated
    } else if accumulated.is_empty() {
        rect
    } else {
        accumulated.union(&rect)
    }
}

impl LayerTreeImpl {
    fn local_transform(&self, key: LayerKey, page_scale_layer: Option<LayerId>) -> Transform {
        let layer = &self.layers[key];
        let scroll = layer.current_scroll_offset();
        let mut local = Transform::identity();
        if page_scale_layer == Some(layer.id()) {
            let page_scale = self.current_page_scale_factor();
            local = Transform::scale(page_scale, page_scale);
        }
        local
            .then(&layer.transform)
            .then(&Transform::translation(
                layer.position.x - scroll.x,
                layer.position.y - scroll.y,
            ))
    }

    fn viewport_rect(&self) -> RectF {
        RectF::new(PointF::zero(), self.device_viewport_size.to_f32())
    }

    /// Recomputes draw properties when something changed. Returns false when
    /// there is no root layer to compute them for.
    pub fn update_draw_properties(&mut self) -> bool {
        if !self.needs_update_draw_properties {
            return self.root.is_some();
        }
        self.needs_update_draw_properties = false;
        self.property_trees.clear();
        self.render_surfaces.clear();
        self.render_surface_layer_list.clear();

        let Some(root) = self.root else {
            self.damage_trackers.clear();
            return false;
        };

        let order = self.pre_order_keys();
        let mut drawing_counts: HashMap<LayerKey, usize> = HashMap::with_capacity(order.len());
        for &key in order.iter().rev() {
            let layer = &self.layers[key];
            let own = usize::from(layer.draws_content && !layer.hide_layer_and_subtree);
            let children = layer
                .children
                .iter()
                .map(|child| drawing_counts.get(child).copied().unwrap_or(0))
                .sum::<usize>();
            drawing_counts.insert(key, own + children);
        }

        let viewport = self.viewport_rect();
        let device_scale = self.device_scale_factor;
        let viewport_layers = self.viewport_layers;
        let root_id = self.layers[root].id();

        let mut surface_order: Vec<LayerId> = Vec::new();
        let mut stack = vec![(
            root,
            Inherited {
                screen_space: Transform::scale(device_scale, device_scale),
                transform_node: None,
                clip: None,
                clip_node: None,
                effect_node: None,
                screen_space_opacity: 1.0,
                scroll_node: None,
                target: None,
                opacity_to_target: 1.0,
                animating: false,
                hidden: false,
                under_page_scale: false,
            },
        )];

        while let Some((key, inherited)) = stack.pop() {
            let local = self.local_transform(key, viewport_layers.page_scale);
            let layer = &self.layers[key];
            let layer_id = layer.id();
            let is_root = layer_id == root_id;
            let screen_space = local.then(&inherited.screen_space);
            let animating = inherited.animating || layer.has_running_transform_animation();
            let hidden = inherited.hidden || layer.hide_layer_and_subtree;
            let under_page_scale =
                inherited.under_page_scale || viewport_layers.page_scale == Some(layer_id);

            let creates_surface = is_root
                || layer.force_render_surface
                || layer.has_copy_requests()
                || (layer.opacity < 1.0 && drawing_counts.get(&key).copied().unwrap_or(0) >= 2);

            let transform_index = self.property_trees.transform_tree.len();
            self.property_trees.transform_tree.push(TransformNode {
                owner: layer_id,
                parent: inherited.transform_node,
                local,
                screen_space,
                is_animating: animating,
            });

            let layer_screen_rect = screen_space.outer_transformed_rect(&layer.layer_rect());
            let drawable_content_rect =
                intersect(Some(viewport), intersect(inherited.clip, layer_screen_rect));
            let visible_layer_rect = screen_space
                .inverse()
                .map(|inverse| inverse.outer_transformed_rect(&drawable_content_rect))
                .and_then(|rect| rect.intersection(&layer.layer_rect()))
                .unwrap_or_else(RectF::zero);

            let screen_space_opacity = inherited.screen_space_opacity * layer.opacity;
            let (target, draw_opacity, children_opacity_to_target) = if creates_surface {
                (layer_id, 1.0, 1.0)
            } else {
                let opacity = inherited.opacity_to_target * layer.opacity;
                (inherited.target.unwrap_or(root_id), opacity, opacity)
            };

            let is_drawn = !hidden
                && layer.draws_content
                && draw_opacity > 0.0
                && !drawable_content_rect.is_empty();

            let effect_index = if creates_surface || layer.opacity < 1.0 {
                let index = self.property_trees.effect_tree.len();
                self.property_trees.effect_tree.push(EffectNode {
                    owner: layer_id,
                    parent: inherited.effect_node,
                    opacity: layer.opacity,
                    screen_space_opacity,
                    has_render_surface: creates_surface,
                    has_copy_request: layer.has_copy_requests(),
                });
                Some(index)
            } else {
                inherited.effect_node
            };

            let (children_clip, clip_index) = if layer.masks_to_bounds {
                let clip_rect = intersect(inherited.clip, layer_screen_rect);
                let index = self.property_trees.clip_tree.len();
                self.property_trees.clip_tree.push(ClipNode {
                    owner: layer_id,
                    parent: inherited.clip_node,
                    clip_rect,
                });
                (Some(clip_rect), Some(index))
            } else {
                (inherited.clip, inherited.clip_node)
            };

            let needs_scroll_node = layer.scrollable()
                || !layer.main_thread_scrolling_reasons.is_empty()
                || !layer.non_fast_scrollable_region.is_empty();
            let scroll_index = if needs_scroll_node {
                let clip_under_page_scale = layer
                    .scroll_clip_layer
                    .and_then(|clip| self.layer_id_map.get(&clip).copied())
                    .map(|clip_key| self.is_key_under_page_scale(clip_key))
                    .unwrap_or(false);
                let node = ScrollNode {
                    id: 0,
                    owner: layer_id,
                    parent: inherited.scroll_node,
                    scrollable: layer.scrollable(),
                    user_scrollable_horizontal: layer.user_scrollable_horizontal,
                    user_scrollable_vertical: layer.user_scrollable_vertical,
                    main_thread_scrolling_reasons: layer.main_thread_scrolling_reasons,
                    contains_non_fast_scrollable_region: !layer
                        .non_fast_scrollable_region
                        .is_empty(),
                    is_inner_viewport_scroll_layer: viewport_layers.inner_viewport_scroll
                        == Some(layer_id),
                    is_outer_viewport_scroll_layer: viewport_layers.outer_viewport_scroll
                        == Some(layer_id),
                    max_scroll_offset_affected_by_page_scale: under_page_scale
                        && !clip_under_page_scale,
                };
                Some(self.property_trees.scroll_tree.push_node(node))
            } else {
                inherited.scroll_node
            };

            self.property_trees.layer_nodes.insert(
                layer_id,
                LayerNodeIndices {
                    transform: transform_index,
                    clip: clip_index,
                    effect: effect_index,
                    scroll: scroll_index,
                },
            );

            if creates_surface {
                let parent_target = if is_root {
                    None
                } else {
                    Some(inherited.target.unwrap_or(root_id))
                };
                self.render_surfaces.insert(
                    layer_id,
                    RenderSurfaceImpl {
                        owner: layer_id,
                        target: parent_target,
                        content_rect: RectF::zero(),
                        clip_rect: inherited.clip,
                        draw_opacity: inherited.opacity_to_target * layer.opacity,
                        layer_list: Vec::new(),
                        contributes_to_drawn_surface: false,
                        has_copy_request: layer.has_copy_requests(),
                        surface_property_changed: layer.layer_property_changed,
                    },
                );
                surface_order.push(layer_id);
                let parent = parent_target
                    .filter(|_| !hidden)
                    .and_then(|parent_target| self.render_surfaces.get_mut(&parent_target));
                if let Some(parent) = parent {
                    parent.layer_list.push(layer_id);
                }
            }
            if is_drawn {
                if let Some(surface) = self.render_surfaces.get_mut(&target) {
                    surface.layer_list.push(layer_id);
                }
            }

            let layer = &mut self.layers[key];
            layer.draw_properties = DrawProperties {
                draw_transform: screen_space,
                screen_space_transform: screen_space,
                screen_space_transform_is_animating: animating,
                visible_layer_rect,
                drawable_content_rect,
                clip_rect: inherited.clip,
                render_target: Some(target),
                draw_opacity,
                is_drawn,
            };

            let child_inherited = Inherited {
                screen_space,
                transform_node: Some(transform_index),
                clip: children_clip,
                clip_node: clip_index,
                effect_node: effect_index,
                screen_space_opacity,
                scroll_node: scroll_index,
                target: Some(target),
                opacity_to_target: children_opacity_to_target,
                animating,
                hidden,
                under_page_scale,
            };
            for &child in layer.children.iter().rev() {
                stack.push((child, child_inherited));
            }
        }

        self.finalize_render_surfaces(root_id, viewport, surface_order);
        true
    }

    fn is_key_under_page_scale(&self, key: LayerKey) -> bool {
        let Some(page_scale) = self.viewport_layers.page_scale else {
            return false;
        };
        let mut current = Some(key);
        while let Some(key) = current {
            let layer = &self.layers[key];
            if layer.id() == page_scale {
                return true;
            }
            current = layer.parent;
        }
        false
    }

    fn finalize_render_surfaces(
        &mut self,
        root_id: LayerId,
        viewport: RectF,
        surface_order: Vec<LayerId>,
    ) {
        // Children surfaces come after their targets in tree order.
        for &owner in surface_order.iter().rev() {
            let Some(surface) = self.render_surfaces.get(&owner) else {
                continue;
            };
            let content_rect = if owner == root_id {
                viewport
            } else {
                let mut content = RectF::zero();
                for contributor in &surface.layer_list {
                    let child_surface = Some(contributor)
                        .filter(|contributor| **contributor != owner)
                        .and_then(|contributor| self.render_surfaces.get(contributor));
                    let rect = match child_surface {
                        Some(child) => child.content_rect,
                        None => self
                            .layer_by_id(*contributor)
                            .map(|layer| layer.draw_properties.drawable_content_rect)
                            .unwrap_or_else(RectF::zero),
                    };
                    content = union(content, rect);
                }
                intersect(surface.clip_rect, content)
            };
            if let Some(surface) = self.render_surfaces.get_mut(&owner) {
                surface.content_rect = content_rect;
            }
        }

        let mut kept = Vec::with_capacity(surface_order.len());
        let mut dropped = Vec::new();
        for owner in surface_order {
            let Some(surface) = self.render_surfaces.get(&owner) else {
                continue;
            };
            let contributes = match surface.target {
                None => true,
                Some(target) => {
                    !surface.content_rect.is_empty()
                        && self
                            .render_surfaces
                            .get(&target)
                            .is_some_and(|parent| {
                                parent.contributes_to_drawn_surface
                                    && parent.layer_list.contains(&owner)
                            })
                }
            };
            let keep = contributes || surface.has_copy_request;
            if let Some(surface) = self.render_surfaces.get_mut(&owner) {
                surface.contributes_to_drawn_surface = contributes;
            }
            if keep {
                kept.push(owner);
            } else {
                self.render_surfaces.remove(&owner);
                dropped.push(owner);
            }
        }

        for surface in self.render_surfaces.values_mut() {
            surface
                .layer_list
                .retain(|contributor| !dropped.contains(contributor));
        }

        self.damage_trackers.retain(|owner, _| kept.contains(owner));
        for owner in &kept {
            self.damage_trackers.entry(*owner).or_default();
        }
        self.render_surface_layer_list = kept;
    }
}
