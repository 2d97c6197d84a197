use bitflags::bitflags;

use crate::frame::SwapPromise;
use crate::{LayerId, PointF, VectorF};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollThread {
    OnImplThread,
    OnMainThread,
    Ignored,
    Unknown,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MainThreadScrollingReasons: u32 {
        const HAS_BACKGROUND_ATTACHMENT_FIXED_OBJECTS = 1 << 0;
        const THREADED_SCROLLING_DISABLED = 1 << 1;
        const SCROLLBAR_SCROLLING = 1 << 2;
        const PAGE_OVERLAY = 1 << 3;
        const HANDLING_SCROLL_FROM_MAIN_THREAD = 1 << 4;
        const NON_FAST_SCROLLABLE_REGION = 1 << 5;
        const EVENT_HANDLERS = 1 << 6;
        const FAILED_HIT_TEST = 1 << 7;
        const NO_SCROLLING_LAYER = 1 << 8;
        const NOT_SCROLLABLE = 1 << 9;
        const CONTINUING_MAIN_THREAD_SCROLL = 1 << 10;
        const NON_INVERTIBLE_TRANSFORM = 1 << 11;
        const PAGE_BASED_SCROLLING = 1 << 12;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollStatus {
    pub thread: ScrollThread,
    pub main_thread_scrolling_reasons: MainThreadScrollingReasons,
}

impl ScrollStatus {
    pub fn new(thread: ScrollThread, reasons: MainThreadScrollingReasons) -> Self {
        Self {
            thread,
            main_thread_scrolling_reasons: reasons,
        }
    }

    pub fn on_impl_thread() -> Self {
        Self::new(ScrollThread::OnImplThread, MainThreadScrollingReasons::empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollInputType {
    Touchscreen,
    Wheel,
    NonBubblingGesture,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Backward,
    Forward,
}

/// Per-delta state threaded through the scroll chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrollState {
    delta: VectorF,
    pub position: PointF,
    pub is_direct_manipulation: bool,
    pub should_propagate: bool,
    pub delta_consumed_for_scroll_sequence: bool,
    pub caused_scroll_x: bool,
    pub caused_scroll_y: bool,
    pub current_native_scrolling_layer: Option<LayerId>,
}

impl ScrollState {
    pub fn new(delta: VectorF, position: PointF) -> Self {
        Self {
            delta,
            position,
            is_direct_manipulation: false,
            should_propagate: true,
            delta_consumed_for_scroll_sequence: false,
            caused_scroll_x: false,
            caused_scroll_y: false,
            current_native_scrolling_layer: None,
        }
    }

    pub fn delta(&self) -> VectorF {
        self.delta
    }

    pub fn delta_x(&self) -> f32 {
        self.delta.x
    }

    pub fn delta_y(&self) -> f32 {
        self.delta.y
    }

    pub fn fully_consumed(&self) -> bool {
        self.delta.x == 0.0 && self.delta.y == 0.0
    }

    pub fn consume_delta(&mut self, consumed: VectorF) {
        if consumed.x == 0.0 && consumed.y == 0.0 {
            return;
        }
        self.delta -= consumed;
        self.delta_consumed_for_scroll_sequence = true;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InputHandlerScrollResult {
    pub did_scroll: bool,
    pub did_overscroll_root: bool,
    pub accumulated_root_overscroll: VectorF,
    pub unused_scroll_delta: VectorF,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollUpdateInfo {
    pub layer_id: LayerId,
    pub scroll_delta: VectorF,
}

/// Impl-side deltas handed to the next main-thread frame.
#[derive(Default)]
pub struct ScrollAndScaleSet {
    pub scrolls: Vec<ScrollUpdateInfo>,
    pub page_scale_delta: f32,
    pub top_controls_delta: f32,
    pub swap_promises: Vec<Box<dyn SwapPromise>>,
}

impl std::fmt::Debug for ScrollAndScaleSet {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ScrollAndScaleSet")
            .field("scrolls", &self.scrolls)
            .field("page_scale_delta", &self.page_scale_delta)
            .field("top_controls_delta", &self.top_controls_delta)
            .field("swap_promises", &self.swap_promises.len())
            .finish()
    }
}
