//! Property trees derived from the layer hierarchy.
//!
//! Rebuilt by `LayerTreeImpl::update_draw_properties`. Nodes refer to their parent
//! by index; layers map to their nodes through `PropertyTrees::layer_nodes`.

use std::collections::HashMap;

use compositor_protocol::{LayerId, MainThreadScrollingReasons, RectF, Transform};

#[derive(Debug, Clone, PartialEq)]
pub struct TransformNode {
    pub owner: LayerId,
    pub parent: Option<usize>,
    pub local: Transform,
    pub screen_space: Transform,
    pub is_animating: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClipNode {
    pub owner: LayerId,
    pub parent: Option<usize>,
    /// Screen space clip, already intersected with every ancestor clip.
    pub clip_rect: RectF,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EffectNode {
    pub owner: LayerId,
    pub parent: Option<usize>,
    pub opacity: f32,
    pub screen_space_opacity: f32,
    pub has_render_surface: bool,
    pub has_copy_request: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScrollNode {
    pub id: usize,
    pub owner: LayerId,
    pub parent: Option<usize>,
    pub scrollable: bool,
    pub user_scrollable_horizontal: bool,
    pub user_scrollable_vertical: bool,
    pub main_thread_scrolling_reasons: MainThreadScrollingReasons,
    pub contains_non_fast_scrollable_region: bool,
    pub is_inner_viewport_scroll_layer: bool,
    pub is_outer_viewport_scroll_layer: bool,
    pub max_scroll_offset_affected_by_page_scale: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ScrollTree {
    nodes: Vec<ScrollNode>,
    by_layer: HashMap<LayerId, usize>,
    currently_scrolling_layer: Option<LayerId>,
}

impl ScrollTree {
    pub fn nodes(&self) -> &[ScrollNode] {
        &self.nodes
    }

    pub fn node(&self, id: usize) -> Option<&ScrollNode> {
        self.nodes.get(id)
    }

    pub fn node_for_layer(&self, layer_id: LayerId) -> Option<&ScrollNode> {
        self.by_layer.get(&layer_id).map(|&index| &self.nodes[index])
    }

    pub fn parent(&self, node: &ScrollNode) -> Option<&ScrollNode> {
        node.parent.and_then(|parent| self.nodes.get(parent))
    }

    /// `layer_id`'s node followed by every scroll ancestor, innermost first.
    pub fn ancestors_of(&self, layer_id: LayerId) -> Vec<&ScrollNode> {
        let mut chain = Vec::new();
        let mut current = self.node_for_layer(layer_id);
        while let Some(node) = current {
            chain.push(node);
            current = self.parent(node);
        }
        chain
    }

    pub fn currently_scrolling_layer(&self) -> Option<LayerId> {
        self.currently_scrolling_layer
    }

    pub fn set_currently_scrolling_layer(&mut self, layer_id: Option<LayerId>) {
        self.currently_scrolling_layer = layer_id;
    }

    pub(crate) fn push_node(&mut self, mut node: ScrollNode) -> usize {
        let index = self.nodes.len();
        node.id = index;
        self.by_layer.insert(node.owner, index);
        self.nodes.push(node);
        index
    }

    pub(crate) fn clear_nodes(&mut self) {
        self.nodes.clear();
        self.by_layer.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LayerNodeIndices {
    pub transform: usize,
    pub clip: Option<usize>,
    pub effect: Option<usize>,
    pub scroll: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct PropertyTrees {
    pub transform_tree: Vec<TransformNode>,
    pub clip_tree: Vec<ClipNode>,
    pub effect_tree: Vec<EffectNode>,
    pub scroll_tree: ScrollTree,
    pub layer_nodes: HashMap<LayerId, LayerNodeIndices>,
}

impl PropertyTrees {
    /// Drops every node but keeps the currently scrolling layer.
    pub(crate) fn clear(&mut self) {
        self.transform_tree.clear();
        self.clip_tree.clear();
        self.effect_tree.clear();
        self.scroll_tree.clear_nodes();
        self.layer_nodes.clear();
    }

    pub fn transform_node_for_layer(&self, layer_id: LayerId) -> Option<&TransformNode> {
        let indices = self.layer_nodes.get(&layer_id)?;
        self.transform_tree.get(indices.transform)
    }

    pub fn effect_node_for_layer(&self, layer_id: LayerId) -> Option<&EffectNode> {
        let indices = self.layer_nodes.get(&layer_id)?;
        indices.effect.and_then(|index| self.effect_tree.get(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scroll_node(owner: i32, parent: Option<usize>) -> ScrollNode {
        ScrollNode {
            id: 0,
            owner: LayerId(owner),
            parent,
            scrollable: true,
            user_scrollable_horizontal: true,
            user_scrollable_vertical: true,
            main_thread_scrolling_reasons: MainThreadScrollingReasons::empty(),
            contains_non_fast_scrollable_region: false,
            is_inner_viewport_scroll_layer: false,
            is_outer_viewport_scroll_layer: false,
            max_scroll_offset_affected_by_page_scale: false,
        }
    }

    #[test]
    fn ancestors_are_listed_innermost_first() {
        let mut tree = ScrollTree::default();
        let root = tree.push_node(scroll_node(1, None));
        let middle = tree.push_node(scroll_node(2, Some(root)));
        tree.push_node(scroll_node(3, Some(middle)));

        let owners = tree
            .ancestors_of(LayerId(3))
            .iter()
            .map(|node| node.owner)
            .collect::<Vec<_>>();
        assert_eq!(owners, vec![LayerId(3), LayerId(2), LayerId(1)]);
    }

    #[test]
    fn clearing_nodes_keeps_currently_scrolling_layer() {
        let mut tree = ScrollTree::default();
        tree.push_node(scroll_node(5, None));
        tree.set_currently_scrolling_layer(Some(LayerId(5)));
        tree.clear_nodes();
        assert!(tree.node_for_layer(LayerId(5)).is_none());
        assert_eq!(tree.currently_scrolling_layer(), Some(LayerId(5)));
    }
}
