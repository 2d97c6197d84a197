//! Vocabulary shared by the compositor crates.
//!
//! Internal modules:
//! - `scroll`: scroll status, scroll state threading and deltas sent back to the main thread.
//! - `frame`: render passes, quads, copy requests, swap promises and frame metadata.
//! - `client`: the narrow traits the compositor core calls out through.

use std::fmt;

pub mod client;
pub mod frame;
pub mod scroll;

pub use client::{
    HostImplClient, InputHandlerClient, OutputSurface, OutputSurfaceCapabilities, Renderer,
    RendererCapabilities, RendererKind,
};
pub use frame::{
    CompositorFrameMetadata, CopyOutputRequest, CopyOutputResult, DidNotSwapReason, DrawQuad,
    LatencyComponentType, LatencyInfo, LatencyInfoSwapPromise, QuadMaterial, RenderPass,
    SwapPromise,
};
pub use scroll::{
    InputHandlerScrollResult, MainThreadScrollingReasons, ScrollAndScaleSet, ScrollDirection,
    ScrollInputType, ScrollState, ScrollStatus, ScrollThread, ScrollUpdateInfo,
};

pub type PointF = euclid::default::Point2D<f32>;
pub type VectorF = euclid::default::Vector2D<f32>;
pub type SizeF = euclid::default::Size2D<f32>;
pub type RectF = euclid::default::Rect<f32>;
pub type IntPoint = euclid::default::Point2D<i32>;
pub type IntSize = euclid::default::Size2D<i32>;
pub type IntRect = euclid::default::Rect<i32>;
pub type Transform = euclid::default::Transform2D<f32>;

/// Scroll offsets are vectors from the content origin.
pub type ScrollOffset = VectorF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(pub i32);

impl fmt::Display for LayerId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "layer#{}", self.0)
    }
}

/// Client supplied id; zero is reserved as invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UiResourceId(pub u32);

impl UiResourceId {
    pub const INVALID: UiResourceId = UiResourceId(0);

    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub u32);

impl ResourceId {
    pub const INVALID: ResourceId = ResourceId(0);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderPassId {
    pub layer_id: LayerId,
    pub index: u32,
}

impl RenderPassId {
    pub fn new(layer_id: LayerId, index: u32) -> Self {
        Self { layer_id, index }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const TRANSPARENT: Color = Color::rgba(0.0, 0.0, 0.0, 0.0);
    pub const WHITE: Color = Color::rgba(1.0, 1.0, 1.0, 1.0);

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn is_opaque(&self) -> bool {
        self.a >= 1.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawResult {
    Success,
    AbortedCheckerboardAnimations,
    AbortedMissingHighResContent,
    AbortedCantDraw,
    AbortedContextLost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawMode {
    Hardware,
    Software,
    ResourcelessSoftware,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceFormat {
    Rgba8888,
    Bgra8888,
    Alpha8,
}

impl ResourceFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            ResourceFormat::Rgba8888 | ResourceFormat::Bgra8888 => 4,
            ResourceFormat::Alpha8 => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiResourceBitmap {
    pub size: IntSize,
    pub opaque: bool,
    pub format: ResourceFormat,
}

impl UiResourceBitmap {
    pub fn new(size: IntSize, opaque: bool) -> Self {
        Self {
            size,
            opaque,
            format: ResourceFormat::Rgba8888,
        }
    }
}

/// Rounds each component of a vector toward negative infinity.
pub fn floor_vector(vector: VectorF) -> VectorF {
    VectorF::new(vector.x.floor(), vector.y.floor())
}

pub fn int_rect_to_f32(rect: IntRect) -> RectF {
    rect.to_f32()
}

pub fn enclosing_int_rect(rect: RectF) -> IntRect {
    rect.round_out().to_i32()
}
