use compositor_protocol::{LayerId, RectF, RenderPassId};

use crate::LayerTreeImpl;

/// An isolated compositing target owned by one layer. Surface space equals screen space.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSurfaceImpl {
    pub owner: LayerId,
    /// Owner of the surface this one draws into; `None` for the root surface.
    pub target: Option<LayerId>,
    pub content_rect: RectF,
    /// Clip inherited from the owner's ancestors, in screen space.
    pub clip_rect: Option<RectF>,
    pub draw_opacity: f32,
    /// Contributors in back-to-front order: drawn layers and child surface owners.
    pub layer_list: Vec<LayerId>,
    pub contributes_to_drawn_surface: bool,
    pub has_copy_request: bool,
    pub surface_property_changed: bool,
}

impl RenderSurfaceImpl {
    pub fn is_root(&self) -> bool {
        self.target.is_none()
    }

    pub fn render_pass_id(&self) -> RenderPassId {
        RenderPassId::new(self.owner, 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerIteratorItemKind {
    /// All contributors of `target` have been visited.
    TargetSurface,
    /// `layer`'s surface draws into `target`.
    ContributingSurface,
    /// `layer` draws its own content into `target`.
    ItSelf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerIteratorItem {
    pub kind: LayerIteratorItemKind,
    pub layer: LayerId,
    pub target: LayerId,
}

impl LayerTreeImpl {
    /// Flattened front-to-back walk over the render surface layer list.
    pub fn front_to_back_items(&self) -> Vec<LayerIteratorItem> {
        let mut items = Vec::new();
        if let Some(root) = self.root_layer_id() {
            self.push_surface_items(root, &mut items);
        }
        items
    }

    fn push_surface_items(&self, owner: LayerId, items: &mut Vec<LayerIteratorItem>) {
        let Some(surface) = self.render_surfaces.get(&owner) else {
            return;
        };
        for &contributor in surface.layer_list.iter().rev() {
            if contributor != owner && self.render_surfaces.contains_key(&contributor) {
                items.push(LayerIteratorItem {
                    kind: LayerIteratorItemKind::ContributingSurface,
                    layer: contributor,
                    target: owner,
                });
                self.push_surface_items(contributor, items);
            } else {
                items.push(LayerIteratorItem {
                    kind: LayerIteratorItemKind::ItSelf,
                    layer: contributor,
                    target: owner,
                });
            }
        }
        items.push(LayerIteratorItem {
            kind: LayerIteratorItemKind::TargetSurface,
            layer: owner,
            target: owner,
        });
    }

    /// Every layer that draws into `owner`'s surface, in back-to-front order.
    pub fn surface_contributing_layers(&self, owner: LayerId) -> &[LayerId] {
        self.render_surfaces
            .get(&owner)
            .map(|surface| surface.layer_list.as_slice())
            .unwrap_or(&[])
    }
}
