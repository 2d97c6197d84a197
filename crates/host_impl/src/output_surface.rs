use std::fmt;

use compositor_protocol::{IntRect, OutputSurface, RendererCapabilities};
use tiles::ResourceProvider;

use crate::LayerTreeHostImpl;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitializeRendererError {
    BindFailed,
    /// The surface offers neither delegation, a context nor a software device.
    NoRendererKind,
}

impl fmt::Display for InitializeRendererError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitializeRendererError::BindFailed => {
                write!(formatter, "output surface refused to bind to the compositor")
            }
            InitializeRendererError::NoRendererKind => {
                write!(formatter, "output surface supports no renderer kind")
            }
        }
    }
}

impl std::error::Error for InitializeRendererError {}

impl LayerTreeHostImpl {
    /// Switches to a new output surface. Everything backed by the previous
    /// surface is released first; on failure the host is left without one.
    pub fn initialize_renderer(
        &mut self,
        mut output_surface: Box<dyn OutputSurface>,
    ) -> Result<(), InitializeRendererError> {
        self.release_output_surface();
        if !output_surface.bind_to_client() {
            log::warn!("[host_impl] output surface bind failed");
            return Err(InitializeRendererError::BindFailed);
        }
        let capabilities = output_surface.capabilities();
        self.output_surface = Some(output_surface);
        self.resource_provider = Some(ResourceProvider::new());

        if let Err(error) = self.create_and_set_renderer() {
            self.release_output_surface();
            return Err(error);
        }
        self.create_tile_manager_resources();
        self.recreate_tree_resources();

        let can_draw = self.can_draw();
        self.client.on_can_draw_state_changed(can_draw);
        // New content must be fully rastered before the first draw on the surface.
        self.trees.active_mut().set_requires_high_res_to_draw();
        log::info!(
            "[host_impl] renderer initialized kind={:?} max_frames_pending={}",
            capabilities.renderer_kind(),
            capabilities.max_frames_pending
        );
        Ok(())
    }

    /// Drops the renderer and every resource tied to the current surface, in
    /// dependency order.
    pub fn release_output_surface(&mut self) {
        if self.output_surface.is_none() && self.resource_provider.is_none() {
            return;
        }
        self.release_tree_resources();
        self.renderer = None;
        self.clean_up_tile_manager_and_ui_resources();
        self.resource_provider = None;
        if let Some(mut output_surface) = self.output_surface.take() {
            output_surface.detach_from_client();
        }
        log::debug!("[host_impl] output surface released");
    }

    pub fn did_lose_output_surface(&mut self) {
        if let Some(provider) = self.resource_provider.as_ref() {
            provider.did_lose_output_surface();
        }
        log::warn!("[host_impl] output surface lost");
        self.client.did_lose_output_surface_on_impl_thread();
    }

    pub fn has_output_surface(&self) -> bool {
        self.output_surface.is_some()
    }

    pub fn renderer_capabilities(&self) -> Option<RendererCapabilities> {
        self.renderer.as_ref().map(|renderer| renderer.capabilities())
    }

    fn create_and_set_renderer(&mut self) -> Result<(), InitializeRendererError> {
        let Some(output_surface) = self.output_surface.as_mut() else {
            return Err(InitializeRendererError::BindFailed);
        };
        let Some(kind) = output_surface.capabilities().renderer_kind() else {
            return Err(InitializeRendererError::NoRendererKind);
        };
        let mut renderer = output_surface.create_renderer(kind);
        renderer.set_visible(self.visible);
        self.renderer = Some(renderer);

        self.set_full_root_layer_damage();
        // Draw properties depend on the renderer's texture limits.
        self.trees
            .for_each_tree_mut(|tree| tree.set_needs_update_draw_properties());
        self.client.update_renderer_capabilities_on_impl_thread();
        Ok(())
    }

    /// Embedder-driven viewport and clip, used by synchronous compositors that
    /// draw into part of a larger surface. Empty rects fall back to the surface.
    pub fn set_external_viewport_and_clip(&mut self, viewport: IntRect, clip: IntRect) {
        let viewport_changed = self.external_viewport != viewport;
        self.external_viewport = viewport;
        self.external_clip = clip;
        if viewport_changed {
            self.set_full_root_layer_damage();
            self.trees.active_mut().set_needs_update_draw_properties();
        }
    }

    /// Draws without GPU resources; tiles missing from the software path are
    /// rastered on demand during the draw.
    pub fn set_resourceless_software_draw(&mut self, resourceless_software_draw: bool) {
        if self.resourceless_software_draw == resourceless_software_draw {
            return;
        }
        self.resourceless_software_draw = resourceless_software_draw;
        let can_draw = self.can_draw();
        self.client.on_can_draw_state_changed(can_draw);
        self.set_full_root_layer_damage();
    }
}
