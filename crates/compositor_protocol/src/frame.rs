use smallvec::SmallVec;

use crate::{Color, IntRect, LayerId, RenderPassId, ResourceId, SizeF, Transform, VectorF};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QuadMaterial {
    SolidColor(Color),
    Tile { resource_id: ResourceId },
    Texture { resource_id: ResourceId },
    RenderPass { render_pass_id: RenderPassId },
    Checkerboard(Color),
    DebugBorder(Color),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawQuad {
    pub material: QuadMaterial,
    pub rect: IntRect,
    pub visible_rect: IntRect,
    pub opacity: f32,
    pub layer_id: LayerId,
}

impl DrawQuad {
    pub fn render_pass_id(&self) -> Option<RenderPassId> {
        match self.material {
            QuadMaterial::RenderPass { render_pass_id } => Some(render_pass_id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyOutputResult {
    Empty,
    Bitmap { size: IntRect },
}

impl CopyOutputResult {
    pub fn is_empty(&self) -> bool {
        matches!(self, CopyOutputResult::Empty)
    }
}

type CopyOutputCallback = Box<dyn FnOnce(CopyOutputResult) + Send>;

/// A request to read back a surface once it has been drawn.
///
/// Dropping a request without answering it answers it with an empty result.
pub struct CopyOutputRequest {
    callback: Option<CopyOutputCallback>,
}

impl CopyOutputRequest {
    pub fn new(callback: impl FnOnce(CopyOutputResult) + Send + 'static) -> Self {
        Self {
            callback: Some(Box::new(callback)),
        }
    }

    pub fn send_result(mut self, result: CopyOutputResult) {
        if let Some(callback) = self.callback.take() {
            callback(result);
        }
    }

    pub fn send_empty_result(self) {
        self.send_result(CopyOutputResult::Empty);
    }
}

impl Drop for CopyOutputRequest {
    fn drop(&mut self) {
        if let Some(callback) = self.callback.take() {
            callback(CopyOutputResult::Empty);
        }
    }
}

impl std::fmt::Debug for CopyOutputRequest {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("CopyOutputRequest")
            .field("answered", &self.callback.is_none())
            .finish()
    }
}

#[derive(Debug)]
pub struct RenderPass {
    pub id: RenderPassId,
    pub output_rect: IntRect,
    pub damage_rect: IntRect,
    pub transform_to_root_target: Transform,
    pub quads: Vec<DrawQuad>,
    pub copy_requests: Vec<CopyOutputRequest>,
    pub has_transparent_background: bool,
}

impl RenderPass {
    pub fn new(
        id: RenderPassId,
        output_rect: IntRect,
        damage_rect: IntRect,
        transform_to_root_target: Transform,
    ) -> Self {
        Self {
            id,
            output_rect,
            damage_rect,
            transform_to_root_target,
            quads: Vec::new(),
            copy_requests: Vec::new(),
            has_transparent_background: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LatencyComponentType {
    InputEventOriginal,
    InputEventScrollUpdate,
    ImplFrameBegin,
    RendererSwap,
    BufferSwapped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LatencyInfo {
    pub trace_id: i64,
    components: SmallVec<[LatencyComponentType; 4]>,
}

impl LatencyInfo {
    pub fn new(trace_id: i64) -> Self {
        Self {
            trace_id,
            components: SmallVec::new(),
        }
    }

    pub fn has_component(&self, component: LatencyComponentType) -> bool {
        self.components.contains(&component)
    }

    /// Adds `component` unless it is already recorded.
    pub fn add_component(&mut self, component: LatencyComponentType) -> bool {
        if self.has_component(component) {
            return false;
        }
        self.components.push(component);
        true
    }

    pub fn components(&self) -> &[LatencyComponentType] {
        &self.components
    }
}

/// Published with every swap.
///
/// `device_scale_factor` is in device pixels per DIP (painted scale included),
/// sizes are in CSS pixels and `location_bar_*` are DIP vectors.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompositorFrameMetadata {
    pub device_scale_factor: f32,
    pub page_scale_factor: f32,
    pub scrollable_viewport_size: SizeF,
    pub root_layer_size: SizeF,
    pub min_page_scale_factor: f32,
    pub max_page_scale_factor: f32,
    pub location_bar_offset: VectorF,
    pub location_bar_content_translation: VectorF,
    pub root_background_color: Option<Color>,
    pub root_overflow_x_hidden: bool,
    pub root_overflow_y_hidden: bool,
    pub root_scroll_offset: VectorF,
    pub latency_info: Vec<LatencyInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DidNotSwapReason {
    SwapFails,
    CommitFails,
    CommitNoUpdate,
    ActivationFails,
}

pub trait SwapPromise: Send {
    fn did_activate(&mut self) {}
    fn did_swap(&mut self, metadata: &mut CompositorFrameMetadata);
    fn did_not_swap(&mut self, reason: DidNotSwapReason);
    fn trace_id(&self) -> i64;
}

/// Carries one latency info into the frame metadata of the swap that shows it.
#[derive(Debug)]
pub struct LatencyInfoSwapPromise {
    latency: LatencyInfo,
    outcome: Option<Result<(), DidNotSwapReason>>,
}

impl LatencyInfoSwapPromise {
    pub fn new(latency: LatencyInfo) -> Self {
        Self {
            latency,
            outcome: None,
        }
    }

    pub fn outcome(&self) -> Option<Result<(), DidNotSwapReason>> {
        self.outcome
    }
}

impl SwapPromise for LatencyInfoSwapPromise {
    fn did_swap(&mut self, metadata: &mut CompositorFrameMetadata) {
        metadata.latency_info.push(self.latency.clone());
        self.outcome = Some(Ok(()));
    }

    fn did_not_swap(&mut self, reason: DidNotSwapReason) {
        self.outcome = Some(Err(reason));
    }

    fn trace_id(&self) -> i64 {
        self.latency.trace_id
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[test]
    fn dropped_copy_request_answers_with_empty_result() {
        let received = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&received);
        let request = CopyOutputRequest::new(move |result| {
            *sink.lock().expect("lock") = Some(result);
        });
        drop(request);
        assert_eq!(*received.lock().expect("lock"), Some(CopyOutputResult::Empty));
    }

    #[test]
    fn latency_component_is_recorded_once() {
        let mut latency = LatencyInfo::new(9);
        assert!(latency.add_component(LatencyComponentType::RendererSwap));
        assert!(!latency.add_component(LatencyComponentType::RendererSwap));
        assert_eq!(latency.components(), &[LatencyComponentType::RendererSwap]);
    }
}
