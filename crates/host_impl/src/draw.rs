use std::collections::{HashMap, HashSet};

use compositor_protocol::{
    Color, CompositorFrameMetadata, DidNotSwapReason, DrawQuad, DrawResult, IntRect, IntSize,
    LatencyComponentType, LayerId, PointF, QuadMaterial, RectF, RenderPass, RenderPassId,
    ResourceFormat, SizeF, Transform, VectorF, enclosing_int_rect,
};
use layer_tree::damage_tracker::DamageContributor;
use layer_tree::{LayerContents, LayerImpl, LayerIteratorItemKind, LayerTreeImpl};
use tiles::WhichTree;

use crate::LayerTreeHostImpl;

/// Snapshot of one draw, built by `prepare_to_draw` and emptied by `draw_layers`.
#[derive(Debug, Default)]
pub struct FrameData {
    pub render_surface_layer_list: Vec<LayerId>,
    /// Contributing passes first, root pass last.
    pub render_passes: Vec<RenderPass>,
    pub will_draw_layers: Vec<LayerId>,
    pub has_no_damage: bool,
}

#[derive(Debug, Default)]
struct AppendQuadsData {
    num_missing_tiles: usize,
    num_incomplete_tiles: usize,
    appended: bool,
}

impl LayerTreeHostImpl {
    pub fn prepare_to_draw(&mut self, frame: &mut FrameData) -> DrawResult {
        let has_root = self.update_draw_properties_and_tile_priorities(WhichTree::Active);
        debug_assert!(
            has_root || self.trees.active().layer_list_is_empty(),
            "draw properties failed for a non-empty tree"
        );

        // Completed raster lands as tile state changes, which damage their layers.
        self.tile_manager.flush();
        self.dispatch_tile_manager_notifications(true);

        *frame = FrameData::default();
        let tree = self.trees.active_mut();
        frame.render_surface_layer_list = tree.render_surface_layer_list().to_vec();
        let Some(root) = tree.root_render_surface().map(|surface| surface.owner) else {
            frame.has_no_damage = true;
            log::debug!("[host_impl] prepare_to_draw without a root surface");
            return DrawResult::AbortedCantDraw;
        };
        tree.damage_tracker_mut(root)
            .add_damage_next_update(self.viewport_damage_rect);
        self.viewport_damage_rect = RectF::zero();

        let draw_result = self.calculate_render_passes(frame);
        log::trace!(
            "[host_impl] prepare_to_draw result={draw_result:?} passes={} no_damage={}",
            frame.render_passes.len(),
            frame.has_no_damage
        );
        draw_result
    }

    fn calculate_render_passes(&mut self, frame: &mut FrameData) -> DrawResult {
        let hud_wants_to_draw =
            self.trees.active().hud_layer().is_some() && self.debug_state.show_hud_info();
        let root = match self.trees.active().root_render_surface() {
            Some(surface) => surface.owner,
            None => return DrawResult::AbortedCantDraw,
        };
        if hud_wants_to_draw {
            self.trees
                .active_mut()
                .damage_tracker_mut(root)
                .force_full_damage_next_update();
        }
        self.update_damage_tracking(&frame.render_surface_layer_list);

        let tree = self.trees.active();
        let Some(root_surface) = tree.render_surface(root) else {
            return DrawResult::AbortedCantDraw;
        };
        let root_damage = tree
            .damage_tracker(root)
            .map(|tracker| tracker.current_damage_rect())
            .unwrap_or_else(RectF::zero);
        let root_surface_has_contributing_layers = !root_surface.layer_list.is_empty();
        let root_surface_has_no_visible_damage = !root_damage.intersects(&root_surface.content_rect);
        let have_copy_request = frame
            .render_surface_layer_list
            .iter()
            .filter_map(|owner| tree.render_surface(*owner))
            .any(|surface| surface.has_copy_request);
        let must_always_swap = self
            .output_surface
            .as_ref()
            .is_some_and(|surface| surface.capabilities().can_force_reclaim_resources);
        if root_surface_has_contributing_layers
            && root_surface_has_no_visible_damage
            && !have_copy_request
            && !hud_wants_to_draw
            && !must_always_swap
        {
            frame.has_no_damage = true;
            return DrawResult::Success;
        }

        if self.resourceless_software_draw {
            self.raster_visible_picture_layers_on_demand(&frame.render_surface_layer_list);
        }

        let mut passes = self.build_render_passes(&frame.render_surface_layer_list);
        let tree = self.trees.active();
        let mut occluders: HashMap<LayerId, Vec<RectF>> = HashMap::new();
        let mut have_missing_animated_tiles = false;
        let mut missing_high_res = false;
        let mut ready_since_transform_animation = Vec::new();

        for item in tree.front_to_back_items() {
            match item.kind {
                LayerIteratorItemKind::TargetSurface => {}
                LayerIteratorItemKind::ContributingSurface => {
                    let Some(surface) = tree.render_surface(item.layer) else {
                        continue;
                    };
                    if !surface.contributes_to_drawn_surface {
                        continue;
                    }
                    let Some(target_pass) = passes.get_mut(&item.target) else {
                        continue;
                    };
                    let rect = enclosing_int_rect(surface.content_rect);
                    target_pass.quads.push(DrawQuad {
                        material: QuadMaterial::RenderPass {
                            render_pass_id: surface.render_pass_id(),
                        },
                        rect,
                        visible_rect: rect,
                        opacity: surface.draw_opacity,
                        layer_id: item.layer,
                    });
                }
                LayerIteratorItemKind::ItSelf => {
                    let Some(layer) = tree.layer_by_id(item.layer) else {
                        continue;
                    };
                    let properties = layer.draw_properties();
                    if !properties.is_drawn || properties.drawable_content_rect.is_empty() {
                        continue;
                    }
                    let target_occluders = occluders.entry(item.target).or_default();
                    if target_occluders
                        .iter()
                        .any(|occluder| occluder.contains_rect(&properties.drawable_content_rect))
                    {
                        continue;
                    }
                    let Some(target_pass) = passes.get_mut(&item.target) else {
                        continue;
                    };

                    let data = self.append_quads_for_layer(tree, layer, target_pass);
                    if data.appended {
                        frame.will_draw_layers.push(item.layer);
                    }
                    if layer.contents_opaque && properties.draw_opacity >= 1.0 {
                        target_occluders.push(properties.drawable_content_rect);
                    }

                    if data.num_missing_tiles > 0 {
                        have_missing_animated_tiles |= !layer
                            .was_ever_ready_since_last_transform_animation
                            && properties.screen_space_transform_is_animating;
                    } else {
                        ready_since_transform_animation.push(item.layer);
                    }
                    if (data.num_missing_tiles > 0 || data.num_incomplete_tiles > 0)
                        && tree.requires_high_res_to_draw()
                    {
                        missing_high_res = true;
                    }
                }
            }
        }

        let background_color = tree.background_color();
        let has_transparent_background = tree.has_transparent_background();
        if let Some(root_pass) = passes.get_mut(&root) {
            root_pass.has_transparent_background = has_transparent_background;
            if !has_transparent_background {
                let covered = occluders.get(&root).map(Vec::as_slice).unwrap_or(&[]);
                append_background_quads(root_pass, root, background_color, covered);
            }
        }

        // Passes go out in dependency order: a surface after every surface it draws.
        frame.render_passes = frame
            .render_surface_layer_list
            .iter()
            .rev()
            .filter_map(|owner| passes.remove(owner))
            .collect();

        let tree = self.trees.active_mut();
        for layer_id in ready_since_transform_animation {
            if let Some(layer) = tree.layer_mut(layer_id) {
                layer.was_ever_ready_since_last_transform_animation = true;
            }
        }
        self.fail_leftover_copy_requests();

        let mut draw_result = DrawResult::Success;
        if have_missing_animated_tiles && !self.settings.commit_to_active_tree {
            draw_result = DrawResult::AbortedCheckerboardAnimations;
        }
        if missing_high_res {
            draw_result = DrawResult::AbortedMissingHighResContent;
        }
        // Whatever was on screen is already gone, so an incomplete frame wins.
        if self.resourceless_software_draw {
            draw_result = DrawResult::Success;
        }

        Self::remove_render_passes(frame);
        draw_result
    }

    /// Runs every surface's damage tracker, children before the surfaces they
    /// draw into so child damage is final when the parent reads it.
    fn update_damage_tracking(&mut self, render_surface_layer_list: &[LayerId]) {
        for &owner in render_surface_layer_list.iter().rev() {
            let tree = self.trees.active();
            let Some(surface) = tree.render_surface(owner) else {
                continue;
            };
            let contributors: Vec<DamageContributor> = surface
                .layer_list
                .iter()
                .filter_map(|&contributor| damage_contributor(tree, owner, contributor))
                .collect();
            let content_rect = surface.content_rect;
            // The surface snapshot keeps its flag until draw properties are
            // recomputed; the owner's flag is reset after every draw.
            let surface_property_changed = tree
                .layer_by_id(owner)
                .is_some_and(LayerImpl::layer_property_changed);
            self.trees
                .active_mut()
                .damage_tracker_mut(owner)
                .update_damage_tracking_state(&contributors, content_rect, surface_property_changed);
        }
    }

    fn build_render_passes(&mut self, render_surface_layer_list: &[LayerId]) -> HashMap<LayerId, RenderPass> {
        let mut passes = HashMap::with_capacity(render_surface_layer_list.len());
        // Nothing can be read back from a software draw without resources, so
        // copy requests stay on their layers and are answered empty.
        let service_copy_requests = !self.resourceless_software_draw;
        for &owner in render_surface_layer_list {
            let tree = self.trees.active_mut();
            let Some(surface) = tree.render_surface(owner) else {
                continue;
            };
            let output_rect = enclosing_int_rect(surface.content_rect);
            let is_root = surface.is_root();
            let render_pass_id = surface.render_pass_id();
            let content_rect = surface.content_rect;
            let damage_rect = if is_root {
                let damage = tree
                    .damage_tracker(owner)
                    .map(|tracker| tracker.current_damage_rect())
                    .unwrap_or_else(RectF::zero);
                enclosing_int_rect(damage.intersection(&content_rect).unwrap_or_else(RectF::zero))
            } else {
                output_rect
            };
            let mut pass = RenderPass::new(render_pass_id, output_rect, damage_rect, Transform::identity());
            if service_copy_requests {
                if let Some(layer) = tree.layer_mut(owner) {
                    pass.copy_requests = layer.take_copy_requests();
                }
            }
            passes.insert(owner, pass);
        }
        passes
    }

    fn append_quads_for_layer(
        &self,
        tree: &LayerTreeImpl,
        layer: &LayerImpl,
        pass: &mut RenderPass,
    ) -> AppendQuadsData {
        let mut data = AppendQuadsData::default();
        let properties = layer.draw_properties();
        let drawable = properties.drawable_content_rect;
        let opacity = properties.draw_opacity;
        let layer_id = layer.id();
        let mut push = |material: QuadMaterial, rect: RectF| {
            let rect = enclosing_int_rect(rect);
            pass.quads.push(DrawQuad {
                material,
                rect,
                visible_rect: rect,
                opacity,
                layer_id,
            });
        };

        match &layer.contents {
            LayerContents::Picture { .. } => {
                let checkerboard_color = if layer.background_color.a > 0.0 {
                    layer.background_color
                } else {
                    tree.background_color()
                };
                for tile in self.tile_manager.tile_draw_info(layer_id, WhichTree::Active) {
                    let tile_rect = properties
                        .screen_space_transform
                        .outer_transformed_rect(&tile.rect.to_f32());
                    let Some(visible) = tile_rect.intersection(&drawable) else {
                        continue;
                    };
                    match tile.resource_id {
                        Some(resource_id) => push(QuadMaterial::Tile { resource_id }, visible),
                        None => {
                            push(QuadMaterial::Checkerboard(checkerboard_color), visible);
                            data.num_missing_tiles += 1;
                            if tile.required_for_draw {
                                data.num_incomplete_tiles += 1;
                            }
                        }
                    }
                    data.appended = true;
                }
            }
            LayerContents::SolidColor(color) => {
                push(QuadMaterial::SolidColor(*color), drawable);
                data.appended = true;
            }
            LayerContents::UiResource(ui_resource_id) => {
                if let Some(resource_id) = self.resource_id_for_ui_resource(*ui_resource_id) {
                    push(QuadMaterial::Texture { resource_id }, drawable);
                    data.appended = true;
                }
            }
            LayerContents::HeadsUpDisplay => {
                if self.debug_state.show_hud_info() {
                    push(QuadMaterial::DebugBorder(Color::rgba(1.0, 0.0, 0.0, 0.5)), drawable);
                    data.appended = true;
                }
            }
            LayerContents::None => {
                if layer.background_color.a > 0.0 {
                    push(QuadMaterial::SolidColor(layer.background_color), drawable);
                    data.appended = true;
                }
            }
        }
        data
    }

    fn raster_visible_picture_layers_on_demand(&mut self, render_surface_layer_list: &[LayerId]) {
        let tree = self.trees.active();
        let layers: Vec<LayerId> = render_surface_layer_list
            .iter()
            .flat_map(|owner| tree.surface_contributing_layers(*owner).iter().copied())
            .filter(|id| tree.layer_by_id(*id).is_some_and(|layer| layer.contents.is_picture()))
            .collect();
        for layer_id in layers {
            if let Err(error) = self.run_on_demand_raster_task(layer_id) {
                log::warn!("[host_impl] on-demand raster for layer {layer_id} failed: {error}");
            }
        }
    }

    /// Requests still on layers after pass construction belong to surfaces that
    /// were not drawn. They are answered now and a commit rebuilds the tree.
    fn fail_leftover_copy_requests(&mut self) {
        let tree = self.trees.active_mut();
        let mut failed = 0usize;
        for layer_id in tree.layer_ids_in_tree_order() {
            let Some(layer) = tree.layer_mut(layer_id) else {
                continue;
            };
            if !layer.has_copy_requests() {
                continue;
            }
            for request in layer.take_copy_requests() {
                request.send_empty_result();
                failed += 1;
            }
        }
        if failed == 0 {
            return;
        }
        tree.set_needs_update_draw_properties();
        self.client.set_needs_commit_on_impl_thread();
        log::debug!("[host_impl] answered {failed} undrawn copy requests with empty results");
    }

    /// Drops passes nothing draws and quads that point at dropped passes.
    /// Removal cascades: a dropped pass releases the passes it was drawing.
    pub(crate) fn remove_render_passes(frame: &mut FrameData) {
        let passes = &mut frame.render_passes;
        if passes.is_empty() {
            return;
        }
        let mut pass_exists: HashSet<RenderPassId> = HashSet::new();
        let mut pass_references: HashMap<RenderPassId, usize> = HashMap::new();

        let mut index = 0;
        while index < passes.len() {
            let is_root = index + 1 == passes.len();
            let pass = &mut passes[index];
            pass.quads.retain(|quad| match quad.render_pass_id() {
                Some(id) if pass_exists.contains(&id) => {
                    *pass_references.entry(id).or_default() += 1;
                    true
                }
                Some(_) => false,
                None => true,
            });
            if is_root {
                break;
            }
            if pass.quads.is_empty() && pass.copy_requests.is_empty() {
                passes.remove(index);
                continue;
            }
            pass_exists.insert(pass.id);
            index += 1;
        }

        // Back to front so a removed pass can release earlier ones.
        let mut index = passes.len().saturating_sub(1);
        while index > 0 {
            index -= 1;
            let pass = &passes[index];
            if !pass.copy_requests.is_empty() {
                continue;
            }
            if pass_references.get(&pass.id).copied().unwrap_or(0) > 0 {
                continue;
            }
            let removed = passes.remove(index);
            for referenced in removed.quads.iter().filter_map(DrawQuad::render_pass_id) {
                if let Some(count) = pass_references.get_mut(&referenced) {
                    *count = count.saturating_sub(1);
                }
            }
        }
    }

    pub fn draw_layers(&mut self, frame: &mut FrameData) {
        debug_assert!(self.can_draw(), "draw_layers while can_draw is false");
        if frame.has_no_damage {
            log::trace!("[host_impl] draw skipped: no damage");
            return;
        }
        debug_assert!(!frame.render_passes.is_empty(), "damaged frame without passes");

        let disable_image_filtering = self.resourceless_software_draw
            && (self.is_actively_scrolling() || self.trees.active().has_running_animations());
        self.update_hud_texture(frame);

        let device_scale_factor = self.trees.active().device_scale_factor();
        let device_viewport = self.device_viewport();
        let device_clip = self.device_clip();
        let Some(renderer) = self.renderer.as_mut() else {
            log::warn!("[host_impl] draw_layers without a renderer");
            return;
        };
        renderer.draw_frame(
            &mut frame.render_passes,
            device_scale_factor,
            device_viewport,
            device_clip,
            disable_image_filtering,
        );
        debug_assert!(
            frame.render_passes.is_empty(),
            "renderer left {} render passes undrawn",
            frame.render_passes.len()
        );
        if !frame.render_passes.is_empty() {
            log::warn!(
                "[host_impl] renderer left {} render passes undrawn",
                frame.render_passes.len()
            );
            frame.render_passes.clear();
        }

        let tree = self.trees.active_mut();
        for &owner in &frame.render_surface_layer_list {
            tree.damage_tracker_mut(owner).did_draw_damaged_area();
        }
        tree.reset_all_change_tracking();
        tree.set_has_ever_been_drawn(true);
    }

    /// Sizes the HUD texture to its layer and points this frame's HUD quads at it.
    fn update_hud_texture(&mut self, frame: &mut FrameData) {
        if !self.debug_state.show_hud_info() {
            return;
        }
        let tree = self.trees.active();
        let Some(hud_layer) = tree.hud_layer() else {
            return;
        };
        let Some(bounds) = tree.layer_by_id(hud_layer).map(LayerImpl::bounds_with_delta) else {
            return;
        };
        let size = IntSize::new(bounds.width.ceil() as i32, bounds.height.ceil() as i32);
        let Some(provider) = self.resource_provider.as_ref() else {
            return;
        };
        if size.is_empty() {
            return;
        }

        let resource_id = match self.hud_resource {
            Some((resource_id, current_size)) if current_size == size => resource_id,
            stale => {
                if let Some((old_id, _)) = stale {
                    provider.delete_resource(old_id);
                }
                let resource_id = provider.create_resource(size, ResourceFormat::Rgba8888);
                self.hud_resource = Some((resource_id, size));
                log::trace!("[host_impl] hud texture resized to {size:?}");
                resource_id
            }
        };
        for pass in &mut frame.render_passes {
            for quad in pass.quads.iter_mut().filter(|quad| quad.layer_id == hud_layer) {
                quad.material = QuadMaterial::Texture { resource_id };
            }
        }
    }

    pub(crate) fn release_hud_resource(&mut self) {
        let Some((resource_id, _)) = self.hud_resource.take() else {
            return;
        };
        if let Some(provider) = self.resource_provider.as_ref() {
            provider.delete_resource(resource_id);
        }
    }

    pub fn did_draw_all_layers(&mut self, frame: &mut FrameData) {
        log::trace!(
            "[host_impl] did draw {} layers",
            frame.will_draw_layers.len()
        );
        frame.will_draw_layers.clear();
        frame.render_surface_layer_list.clear();
    }

    /// Returns false when the frame had no damage. Promises on the active tree
    /// are resolved either way.
    pub fn swap_buffers(&mut self, frame: &FrameData) -> bool {
        self.trees.active_mut().reset_requires_high_res_to_draw();
        if frame.has_no_damage {
            self.trees
                .active_mut()
                .break_swap_promises(DidNotSwapReason::SwapFails);
            return false;
        }

        let mut metadata = self.make_compositor_frame_metadata();
        self.trees.active_mut().finish_swap_promises(&mut metadata);
        for latency in &mut metadata.latency_info {
            latency.add_component(LatencyComponentType::RendererSwap);
        }
        let Some(renderer) = self.renderer.as_mut() else {
            log::warn!("[host_impl] swap_buffers without a renderer");
            return false;
        };
        renderer.swap_buffers(metadata);
        true
    }

    pub fn make_compositor_frame_metadata(&self) -> CompositorFrameMetadata {
        let tree = self.trees.active();
        let mut metadata = CompositorFrameMetadata {
            device_scale_factor: tree.painted_device_scale_factor() * tree.device_scale_factor(),
            page_scale_factor: tree.current_page_scale_factor(),
            scrollable_viewport_size: tree.scrollable_viewport_size(),
            root_layer_size: tree.scrollable_size(),
            min_page_scale_factor: tree.min_page_scale_factor(),
            max_page_scale_factor: tree.max_page_scale_factor(),
            location_bar_offset: VectorF::new(0.0, self.top_controls_manager.controls_top_offset(tree)),
            location_bar_content_translation: VectorF::new(
                0.0,
                self.top_controls_manager.content_top_offset(tree),
            ),
            root_background_color: Some(tree.background_color()),
            ..CompositorFrameMetadata::default()
        };

        if let Some(outer) = tree.outer_viewport_scroll_layer().and_then(|id| tree.layer_by_id(id)) {
            metadata.root_overflow_x_hidden |= !outer.user_scrollable_horizontal;
            metadata.root_overflow_y_hidden |= !outer.user_scrollable_vertical;
        }
        let Some(inner) = tree.inner_viewport_scroll_layer().and_then(|id| tree.layer_by_id(id)) else {
            return metadata;
        };
        metadata.root_overflow_x_hidden |= !inner.user_scrollable_horizontal;
        metadata.root_overflow_y_hidden |= !inner.user_scrollable_vertical;
        metadata.root_scroll_offset = tree.total_scroll_offset();
        metadata
    }

    pub fn set_needs_redraw(&mut self) {
        self.client.set_needs_redraw_on_impl_thread();
    }

    pub fn set_needs_one_begin_impl_frame(&mut self) {
        self.client.set_needs_one_begin_impl_frame_on_impl_thread();
    }

    pub fn set_needs_redraw_rect(&mut self, damage_rect: RectF) {
        if damage_rect.is_empty() {
            return;
        }
        self.client.set_needs_redraw_rect_on_impl_thread(damage_rect);
    }

    /// Damage in root surface space folded into the next frame.
    pub fn set_viewport_damage(&mut self, damage_rect: RectF) {
        if damage_rect.is_empty() {
            return;
        }
        self.viewport_damage_rect = if self.viewport_damage_rect.is_empty() {
            damage_rect
        } else {
            self.viewport_damage_rect.union(&damage_rect)
        };
    }

    pub fn set_full_root_layer_damage(&mut self) {
        let size = self.draw_viewport_size();
        self.set_viewport_damage(RectF::from_size(size.to_f32()));
    }

    /// Tile priorities follow `viewport_rect` mapped through the inverse of
    /// `transform` instead of the device viewport.
    pub fn set_external_tile_priority_constraints(&mut self, viewport_rect: IntRect, transform: Transform) {
        let viewport_rect_for_tile_priority = transform
            .inverse()
            .map(|inverse| enclosing_int_rect(inverse.outer_transformed_rect(&viewport_rect.to_f32())))
            .unwrap_or_else(IntRect::zero);
        if self.viewport_rect_for_tile_priority == viewport_rect_for_tile_priority {
            return;
        }
        self.viewport_rect_for_tile_priority = viewport_rect_for_tile_priority;
        self.trees.active_mut().set_needs_update_draw_properties();
        if let Some(pending) = self.trees.pending_mut() {
            pending.set_needs_update_draw_properties();
        }
        self.set_full_root_layer_damage();
        self.set_needs_redraw();
    }
}

fn damage_contributor(tree: &LayerTreeImpl, owner: LayerId, contributor: LayerId) -> Option<DamageContributor> {
    if contributor != owner {
        if let Some(child) = tree.render_surface(contributor) {
            let child_changed = tree
                .layer_by_id(contributor)
                .is_some_and(LayerImpl::layer_property_changed);
            return Some(DamageContributor {
                layer_id: contributor,
                rect: child.content_rect,
                property_changed: child_changed,
                content_damage: tree
                    .damage_tracker(contributor)
                    .map(|tracker| tracker.current_damage_rect())
                    .unwrap_or_else(RectF::zero),
            });
        }
    }
    let layer = tree.layer_by_id(contributor)?;
    let properties = layer.draw_properties();
    let update_rect = layer.update_rect();
    let content_damage = if update_rect.is_empty() {
        RectF::zero()
    } else {
        properties
            .screen_space_transform
            .outer_transformed_rect(&update_rect)
    };
    Some(DamageContributor {
        layer_id: contributor,
        rect: properties.drawable_content_rect,
        property_changed: layer.layer_property_changed(),
        content_damage,
    })
}

/// Fills the root pass output with `color` wherever no opaque layer covers it.
/// Quads are appended last, behind everything else.
fn append_background_quads(pass: &mut RenderPass, root: LayerId, color: Color, covered: &[RectF]) {
    let mut uncovered = vec![pass.output_rect.to_f32()];
    for hole in covered {
        uncovered = uncovered
            .into_iter()
            .flat_map(|rect| subtract_rect(rect, *hole))
            .collect();
    }
    for rect in uncovered {
        let rect = enclosing_int_rect(rect);
        if rect.is_empty() {
            continue;
        }
        pass.quads.push(DrawQuad {
            material: QuadMaterial::SolidColor(color),
            rect,
            visible_rect: rect,
            opacity: 1.0,
            layer_id: root,
        });
    }
}

/// `rect` minus `hole` as up to four disjoint rects.
fn subtract_rect(rect: RectF, hole: RectF) -> Vec<RectF> {
    let Some(hole) = rect.intersection(&hole) else {
        return vec![rect];
    };
    let mut pieces = Vec::with_capacity(4);
    let mut push = |min_x: f32, min_y: f32, max_x: f32, max_y: f32| {
        if max_x > min_x && max_y > min_y {
            pieces.push(RectF::new(
                PointF::new(min_x, min_y),
                SizeF::new(max_x - min_x, max_y - min_y),
            ));
        }
    };
    push(rect.min_x(), rect.min_y(), rect.max_x(), hole.min_y());
    push(rect.min_x(), hole.max_y(), rect.max_x(), rect.max_y());
    push(rect.min_x(), hole.min_y(), hole.min_x(), hole.max_y());
    push(hole.max_x(), hole.min_y(), rect.max_x(), hole.max_y());
    pieces
}

#[cfg(test)]
mod tests {
    use compositor_protocol::{CopyOutputRequest, IntSize};

    use super::*;

    fn pass(owner: i32, quads_to: &[i32]) -> RenderPass {
        let id = RenderPassId::new(LayerId(owner), 0);
        let rect = IntRect::from_size(IntSize::new(10, 10));
        let mut pass = RenderPass::new(id, rect, rect, Transform::identity());
        for target in quads_to {
            pass.quads.push(DrawQuad {
                material: QuadMaterial::RenderPass {
                    render_pass_id: RenderPassId::new(LayerId(*target), 0),
                },
                rect,
                visible_rect: rect,
                opacity: 1.0,
                layer_id: LayerId(*target),
            });
        }
        pass
    }

    fn solid(mut pass: RenderPass) -> RenderPass {
        let rect = pass.output_rect;
        pass.quads.push(DrawQuad {
            material: QuadMaterial::SolidColor(Color::WHITE),
            rect,
            visible_rect: rect,
            opacity: 1.0,
            layer_id: pass.id.layer_id,
        });
        pass
    }

    fn ids(frame: &FrameData) -> Vec<i32> {
        frame
            .render_passes
            .iter()
            .map(|pass| pass.id.layer_id.0)
            .collect()
    }

    #[test]
    fn empty_passes_and_quads_pointing_at_them_are_removed() {
        let mut frame = FrameData {
            render_passes: vec![pass(3, &[]), solid(pass(2, &[])), pass(1, &[3, 2])],
            ..FrameData::default()
        };
        LayerTreeHostImpl::remove_render_passes(&mut frame);
        assert_eq!(ids(&frame), vec![2, 1]);
        let root = frame.render_passes.last().expect("root pass stays");
        assert_eq!(root.quads.len(), 1);
        assert_eq!(
            root.quads[0].render_pass_id(),
            Some(RenderPassId::new(LayerId(2), 0))
        );
    }

    #[test]
    fn unreferenced_passes_cascade_away() {
        // 3 only feeds 2, and nothing draws 2.
        let mut frame = FrameData {
            render_passes: vec![solid(pass(3, &[])), pass(2, &[3]), solid(pass(1, &[]))],
            ..FrameData::default()
        };
        LayerTreeHostImpl::remove_render_passes(&mut frame);
        assert_eq!(ids(&frame), vec![1]);
    }

    #[test]
    fn passes_with_copy_requests_survive_without_quads() {
        let mut copied = pass(2, &[]);
        copied.copy_requests.push(CopyOutputRequest::new(|_| {}));
        let mut frame = FrameData {
            render_passes: vec![copied, solid(pass(1, &[]))],
            ..FrameData::default()
        };
        LayerTreeHostImpl::remove_render_passes(&mut frame);
        assert_eq!(ids(&frame), vec![2, 1]);
    }

    #[test]
    fn subtracting_a_centered_hole_leaves_four_strips() {
        let rect = RectF::new(PointF::new(0.0, 0.0), SizeF::new(10.0, 10.0));
        let hole = RectF::new(PointF::new(2.0, 2.0), SizeF::new(6.0, 6.0));
        let pieces = subtract_rect(rect, hole);
        assert_eq!(pieces.len(), 4);
        let area: f32 = pieces.iter().map(|piece| piece.area()).sum();
        assert!((area - 64.0).abs() < 1e-4);
        assert_eq!(subtract_rect(rect, rect), Vec::<RectF>::new());
    }
}
