use compositor_protocol::{
    Color, CopyOutputRequest, LayerId, MainThreadScrollingReasons, PointF, RectF, ScrollOffset,
    SizeF, Transform, UiResourceId, VectorF,
};

use crate::LayerKey;
use crate::animation::LayerAnimation;
use crate::synced_property::SyncedScrollOffset;

#[derive(Debug, Clone, PartialEq)]
pub enum LayerContents {
    None,
    SolidColor(Color),
    /// Recorded content rasterized into tiles.
    Picture { recorded_size: SizeF },
    UiResource(UiResourceId),
    HeadsUpDisplay,
}

impl LayerContents {
    pub fn is_picture(&self) -> bool {
        matches!(self, LayerContents::Picture { .. })
    }
}

/// Derived each time the owning tree updates its draw properties.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawProperties {
    /// Layer space to target surface space. Surfaces are laid out in screen space.
    pub draw_transform: Transform,
    pub screen_space_transform: Transform,
    pub screen_space_transform_is_animating: bool,
    pub visible_layer_rect: RectF,
    /// Screen space rect after clipping; empty when nothing is visible.
    pub drawable_content_rect: RectF,
    pub clip_rect: Option<RectF>,
    pub render_target: Option<LayerId>,
    pub draw_opacity: f32,
    pub is_drawn: bool,
}

impl Default for DrawProperties {
    fn default() -> Self {
        Self {
            draw_transform: Transform::identity(),
            screen_space_transform: Transform::identity(),
            screen_space_transform_is_animating: false,
            visible_layer_rect: RectF::zero(),
            drawable_content_rect: RectF::zero(),
            clip_rect: None,
            render_target: None,
            draw_opacity: 1.0,
            is_drawn: false,
        }
    }
}

/// One impl-side layer. Links to other layers are arena keys owned by the tree.
#[derive(Debug)]
pub struct LayerImpl {
    id: LayerId,
    pub(crate) parent: Option<LayerKey>,
    pub(crate) children: Vec<LayerKey>,

    pub position: PointF,
    pub transform: Transform,
    pub bounds: SizeF,
    pub bounds_delta: VectorF,
    pub opacity: f32,
    pub draws_content: bool,
    pub contents_opaque: bool,
    pub background_color: Color,
    pub masks_to_bounds: bool,
    pub force_render_surface: bool,
    pub hide_layer_and_subtree: bool,
    pub contents: LayerContents,

    pub scroll_clip_layer: Option<LayerId>,
    pub user_scrollable_horizontal: bool,
    pub user_scrollable_vertical: bool,
    pub main_thread_scrolling_reasons: MainThreadScrollingReasons,
    pub non_fast_scrollable_region: Vec<RectF>,
    pub has_vertical_scrollbar: bool,
    pub has_horizontal_scrollbar: bool,
    pub(crate) scroll_offset: SyncedScrollOffset,

    pub(crate) copy_requests: Vec<CopyOutputRequest>,
    pub(crate) update_rect: RectF,
    pub(crate) layer_property_changed: bool,
    pub(crate) invalidation: Vec<RectF>,
    pub(crate) animations: Vec<LayerAnimation>,
    pub was_ever_ready_since_last_transform_animation: bool,
    pub(crate) draw_properties: DrawProperties,
}

impl LayerImpl {
    pub fn new(id: LayerId) -> Self {
        Self {
            id,
            parent: None,
            children: Vec::new(),
            position: PointF::zero(),
            transform: Transform::identity(),
            bounds: SizeF::zero(),
            bounds_delta: VectorF::zero(),
            opacity: 1.0,
            draws_content: false,
            contents_opaque: false,
            background_color: Color::TRANSPARENT,
            masks_to_bounds: false,
            force_render_surface: false,
            hide_layer_and_subtree: false,
            contents: LayerContents::None,
            scroll_clip_layer: None,
            user_scrollable_horizontal: true,
            user_scrollable_vertical: true,
            main_thread_scrolling_reasons: MainThreadScrollingReasons::empty(),
            non_fast_scrollable_region: Vec::new(),
            has_vertical_scrollbar: false,
            has_horizontal_scrollbar: false,
            scroll_offset: SyncedScrollOffset::default(),
            copy_requests: Vec::new(),
            update_rect: RectF::zero(),
            layer_property_changed: true,
            invalidation: Vec::new(),
            animations: Vec::new(),
            was_ever_ready_since_last_transform_animation: true,
            draw_properties: DrawProperties::default(),
        }
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn draw_properties(&self) -> &DrawProperties {
        &self.draw_properties
    }

    pub fn bounds_with_delta(&self) -> SizeF {
        SizeF::new(
            (self.bounds.width + self.bounds_delta.x).max(0.0),
            (self.bounds.height + self.bounds_delta.y).max(0.0),
        )
    }

    pub fn layer_rect(&self) -> RectF {
        RectF::new(PointF::zero(), self.bounds_with_delta())
    }

    pub fn scrollable(&self) -> bool {
        self.scroll_clip_layer.is_some()
    }

    pub fn current_scroll_offset(&self) -> ScrollOffset {
        self.scroll_offset.current()
    }

    pub fn synced_scroll_offset(&self) -> &SyncedScrollOffset {
        &self.scroll_offset
    }

    /// Main-thread commit of a new scroll base.
    pub fn push_scroll_offset_from_main_thread(&mut self, base: ScrollOffset) {
        self.scroll_offset.push_from_main_thread(base);
        self.layer_property_changed = true;
    }

    pub fn layer_property_changed(&self) -> bool {
        self.layer_property_changed
    }

    pub fn note_layer_property_changed(&mut self) {
        self.layer_property_changed = true;
    }

    pub fn update_rect(&self) -> RectF {
        self.update_rect
    }

    /// Marks `rect` (layer space) as needing redraw.
    pub fn union_update_rect(&mut self, rect: RectF) {
        if rect.is_empty() {
            return;
        }
        self.update_rect = if self.update_rect.is_empty() {
            rect
        } else {
            self.update_rect.union(&rect)
        };
    }

    /// Records a content invalidation on a picture layer.
    pub fn invalidate(&mut self, rect: RectF) {
        self.invalidation.push(rect);
        self.union_update_rect(rect);
    }

    pub fn take_invalidation(&mut self) -> Vec<RectF> {
        std::mem::take(&mut self.invalidation)
    }

    pub fn request_copy_of_output(&mut self, request: CopyOutputRequest) {
        self.copy_requests.push(request);
        self.layer_property_changed = true;
    }

    pub fn has_copy_requests(&self) -> bool {
        !self.copy_requests.is_empty()
    }

    pub fn take_copy_requests(&mut self) -> Vec<CopyOutputRequest> {
        std::mem::take(&mut self.copy_requests)
    }

    pub fn add_animation(&mut self, animation: LayerAnimation) {
        self.animations.push(animation);
    }

    pub fn animations(&self) -> &[LayerAnimation] {
        &self.animations
    }

    pub fn has_running_transform_animation(&self) -> bool {
        self.animations
            .iter()
            .any(|animation| animation.is_transform() && animation.is_running())
    }

    pub fn reset_change_tracking(&mut self) {
        self.layer_property_changed = false;
        self.update_rect = RectF::zero();
    }

    /// Copies every main-thread owned property into `target`.
    pub(crate) fn push_properties_to(&self, target: &mut LayerImpl) {
        debug_assert_eq!(self.id, target.id);
        let changed = self.layer_property_changed
            || target.position != self.position
            || target.transform != self.transform
            || target.bounds != self.bounds
            || target.opacity != self.opacity
            || target.draws_content != self.draws_content
            || target.contents != self.contents
            || target.masks_to_bounds != self.masks_to_bounds;

        target.position = self.position;
        target.transform = self.transform;
        target.bounds = self.bounds;
        target.bounds_delta = self.bounds_delta;
        target.opacity = self.opacity;
        target.draws_content = self.draws_content;
        target.contents_opaque = self.contents_opaque;
        target.background_color = self.background_color;
        target.masks_to_bounds = self.masks_to_bounds;
        target.force_render_surface = self.force_render_surface;
        target.hide_layer_and_subtree = self.hide_layer_and_subtree;
        target.contents = self.contents.clone();
        target.scroll_clip_layer = self.scroll_clip_layer;
        target.user_scrollable_horizontal = self.user_scrollable_horizontal;
        target.user_scrollable_vertical = self.user_scrollable_vertical;
        target.main_thread_scrolling_reasons = self.main_thread_scrolling_reasons;
        target.non_fast_scrollable_region = self.non_fast_scrollable_region.clone();
        target.has_vertical_scrollbar = self.has_vertical_scrollbar;
        target.has_horizontal_scrollbar = self.has_horizontal_scrollbar;
        target.scroll_offset.push_pending_to_active(&self.scroll_offset);
        target.union_update_rect(self.update_rect);
        target.invalidation.extend(self.invalidation.iter().copied());
        target.was_ever_ready_since_last_transform_animation =
            self.was_ever_ready_since_last_transform_animation;
        if changed {
            target.layer_property_changed = true;
        }
    }
}
