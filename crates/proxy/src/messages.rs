use std::time::Instant;

use compositor_protocol::{
    IntPoint, IntSize, PointF, ScrollInputType, ScrollStatus, ScrollUpdateInfo, VectorF,
};
use host_impl::InitializeRendererError;
use layer_tree::LayerTreeImpl;
use tiles::ManagedMemoryPolicy;

/// Everything the main thread hands over in one commit.
#[derive(Debug)]
pub struct CommitPayload {
    /// Main-thread copy of the tree. Layers are matched to the impl tree by id.
    pub tree: LayerTreeImpl,
    pub max_memory_needed_bytes: Option<usize>,
}

impl CommitPayload {
    pub fn new(tree: LayerTreeImpl) -> Self {
        Self {
            tree,
            max_memory_needed_bytes: None,
        }
    }
}

#[derive(Debug)]
pub enum ImplThreadMessage {
    /// Answer to the last `BeginMainFrame`.
    Commit(Box<CommitPayload>),
    SetVisible(bool),
    SetViewportSize(IntSize),
    SetMemoryPolicy(ManagedMemoryPolicy),
    SetNeedsCommit,
    SetNeedsRedraw,
    BeginFrame(Instant),
    BeginMainFrameAborted { main_frame_handled: bool },
    Shutdown,
}

/// Input travels separately from control messages so a burst of scroll
/// updates never queues behind a commit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputGesture {
    ScrollBegin {
        position: PointF,
        input_type: ScrollInputType,
    },
    ScrollUpdate {
        position: PointF,
        delta: VectorF,
    },
    ScrollEnd {
        position: PointF,
    },
    FlingStart,
    PinchBegin,
    PinchUpdate {
        magnify_delta: f32,
        anchor: IntPoint,
    },
    PinchEnd,
}

/// Impl-side deltas for one main frame. Swap promises stay on the impl
/// thread and ride along with the commit that answers this frame.
#[derive(Debug, Clone, PartialEq)]
pub struct BeginMainFrameArgs {
    pub frame_time: Instant,
    pub scrolls: Vec<ScrollUpdateInfo>,
    pub page_scale_delta: f32,
    pub top_controls_delta: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MainThreadMessage {
    BeginMainFrame(BeginMainFrameArgs),
    DidActivate { source_frame_number: i32 },
    DidSwap { source_frame_number: i32 },
    DidLoseOutputSurface,
    DidFailToInitializeOutputSurface(InitializeRendererError),
    /// Whether the embedder should keep sending `BeginFrame`.
    SetNeedsBeginFrames(bool),
    DidScrollBegin(ScrollStatus),
    DidOverscroll {
        accumulated_overscroll: VectorF,
        latest_overscroll_delta: VectorF,
    },
}
