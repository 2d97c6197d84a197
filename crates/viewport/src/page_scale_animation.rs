//! Animated zoom to a target scroll offset and page scale.
//!
//! Offsets are in CSS pixels. The viewport rect shrinks as the page scale grows,
//! so interpolation happens around an anchor that sits at the same normalized
//! position in the start and target viewports; the scale is interpolated in log
//! space so zooming in and out feel symmetric.

use std::time::{Duration, Instant};

use compositor_protocol::{SizeF, VectorF};

/// `cubic-bezier(x1, y1, x2, y2)` with fixed end points (0, 0) and (1, 1).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubicBezier {
    ax: f64,
    bx: f64,
    cx: f64,
    ay: f64,
    by: f64,
    cy: f64,
}

const BEZIER_EPSILON: f64 = 1e-7;

impl CubicBezier {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        let cx = 3.0 * x1;
        let bx = 3.0 * (x2 - x1) - cx;
        let ax = 1.0 - cx - bx;
        let cy = 3.0 * y1;
        let by = 3.0 * (y2 - y1) - cy;
        let ay = 1.0 - cy - by;
        Self {
            ax,
            bx,
            cx,
            ay,
            by,
            cy,
        }
    }

    /// Easing used for double-tap and programmatic zooms.
    pub fn page_scale_ease() -> Self {
        Self::new(0.8, 0.0, 0.3, 0.9)
    }

    fn sample_x(&self, t: f64) -> f64 {
        ((self.ax * t + self.bx) * t + self.cx) * t
    }

    fn sample_y(&self, t: f64) -> f64 {
        ((self.ay * t + self.by) * t + self.cy) * t
    }

    fn sample_derivative_x(&self, t: f64) -> f64 {
        (3.0 * self.ax * t + 2.0 * self.bx) * t + self.cx
    }

    fn solve_x(&self, x: f64) -> f64 {
        let mut t = x;
        for _ in 0..8 {
            let error = self.sample_x(t) - x;
            if error.abs() < BEZIER_EPSILON {
                return t;
            }
            let derivative = self.sample_derivative_x(t);
            if derivative.abs() < 1e-6 {
                break;
            }
            t -= error / derivative;
        }

        let (mut low, mut high) = (0.0, 1.0);
        t = x.clamp(low, high);
        while low < high {
            let sampled = self.sample_x(t);
            if (sampled - x).abs() < BEZIER_EPSILON {
                return t;
            }
            if x > sampled {
                low = t;
            } else {
                high = t;
            }
            let next = (high - low) * 0.5 + low;
            if next == t {
                break;
            }
            t = next;
        }
        t
    }

    pub fn value(&self, x: f64) -> f64 {
        if x <= 0.0 {
            return 0.0;
        }
        if x >= 1.0 {
            return 1.0;
        }
        self.sample_y(self.solve_x(x))
    }
}

#[derive(Debug, Clone)]
pub struct PageScaleAnimation {
    start_page_scale_factor: f32,
    target_page_scale_factor: f32,
    start_scroll_offset: VectorF,
    target_scroll_offset: VectorF,
    start_anchor: VectorF,
    target_anchor: VectorF,
    viewport_size: SizeF,
    root_layer_size: SizeF,
    start_time: Option<Instant>,
    duration: Duration,
    timing_function: CubicBezier,
}

impl PageScaleAnimation {
    /// `viewport_size` is the inner viewport container in viewport pixels and
    /// `root_layer_size` the scrollable content size in CSS pixels.
    pub fn new(
        start_scroll_offset: VectorF,
        start_page_scale_factor: f32,
        viewport_size: SizeF,
        root_layer_size: SizeF,
        timing_function: CubicBezier,
    ) -> Self {
        Self {
            start_page_scale_factor,
            target_page_scale_factor: start_page_scale_factor,
            start_scroll_offset,
            target_scroll_offset: start_scroll_offset,
            start_anchor: VectorF::zero(),
            target_anchor: VectorF::zero(),
            viewport_size,
            root_layer_size,
            start_time: None,
            duration: Duration::ZERO,
            timing_function,
        }
    }

    /// Zooms so that `target_scroll_offset` ends at the viewport origin.
    pub fn zoom_to(&mut self, target_scroll_offset: VectorF, target_page_scale_factor: f32, duration: Duration) {
        self.target_page_scale_factor = target_page_scale_factor;
        self.target_scroll_offset = target_scroll_offset;
        self.clamp_target_scroll_offset();
        self.duration = duration;

        if self.start_page_scale_factor == target_page_scale_factor {
            self.start_anchor = self.start_scroll_offset;
            self.target_anchor = self.target_scroll_offset;
            return;
        }
        self.infer_target_anchor_from_scroll_offsets();
        self.start_anchor = self.target_anchor;
    }

    /// Zooms around `anchor` (CSS pixels), moving it only when the target scale
    /// would push the viewport past the content edges.
    pub fn zoom_with_anchor(&mut self, anchor: VectorF, target_page_scale_factor: f32, duration: Duration) {
        self.start_anchor = anchor;
        self.target_page_scale_factor = target_page_scale_factor;
        self.duration = duration;

        self.infer_target_scroll_offset_from_start_anchor();
        self.clamp_target_scroll_offset();

        if self.start_page_scale_factor == self.target_page_scale_factor {
            self.target_anchor = self.start_anchor;
            return;
        }
        self.infer_target_anchor_from_scroll_offsets();
    }

    pub fn start_animation(&mut self, time: Instant) {
        debug_assert!(self.start_time.is_none(), "page scale animation started twice");
        self.start_time = Some(time);
    }

    pub fn is_animation_started(&self) -> bool {
        self.start_time.is_some()
    }

    pub fn target_scroll_offset(&self) -> VectorF {
        self.target_scroll_offset
    }

    pub fn target_page_scale_factor(&self) -> f32 {
        self.target_page_scale_factor
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn is_animation_complete_at_time(&self, time: Instant) -> bool {
        match self.start_time {
            Some(start) => time >= start + self.duration,
            None => false,
        }
    }

    pub fn scroll_offset_at_time(&self, time: Instant) -> VectorF {
        self.scroll_offset_at(self.interp_at_time(time))
    }

    pub fn page_scale_factor_at_time(&self, time: Instant) -> f32 {
        self.page_scale_factor_at(self.interp_at_time(time))
    }

    fn interp_at_time(&self, time: Instant) -> f32 {
        let Some(start) = self.start_time else {
            return 0.0;
        };
        if self.is_animation_complete_at_time(time) || self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = time.saturating_duration_since(start).as_secs_f64();
        self.timing_function
            .value(elapsed / self.duration.as_secs_f64()) as f32
    }

    fn start_viewport_size(&self) -> SizeF {
        self.viewport_size / self.start_page_scale_factor
    }

    fn target_viewport_size(&self) -> SizeF {
        self.viewport_size / self.target_page_scale_factor
    }

    fn viewport_size_at(&self, interp: f32) -> SizeF {
        self.viewport_size / self.page_scale_factor_at(interp)
    }

    fn clamp_target_scroll_offset(&mut self) {
        let target_viewport = self.target_viewport_size();
        let max = VectorF::new(
            self.root_layer_size.width - target_viewport.width,
            self.root_layer_size.height - target_viewport.height,
        );
        let offset = self.target_scroll_offset;
        self.target_scroll_offset = VectorF::new(
            offset.x.max(0.0).min(max.x),
            offset.y.max(0.0).min(max.y),
        );
    }

    fn infer_target_scroll_offset_from_start_anchor(&mut self) {
        let normalized = normalize_from_viewport(
            self.start_anchor - self.start_scroll_offset,
            self.start_viewport_size(),
        );
        self.target_scroll_offset =
            self.start_anchor - denormalize_to_viewport(normalized, self.target_viewport_size());
    }

    /// The anchor sits at the same normalized position in the start and target
    /// viewports: `start_offset + start_size * n == target_offset + target_size * n`.
    fn infer_target_anchor_from_scroll_offsets(&mut self) {
        let start = self.start_viewport_size();
        let target = self.target_viewport_size();
        let width_delta = target.width - start.width;
        let height_delta = target.height - start.height;
        let offset_delta = self.start_scroll_offset - self.target_scroll_offset;
        let normalized = VectorF::new(
            if width_delta == 0.0 { 0.0 } else { offset_delta.x / width_delta },
            if height_delta == 0.0 { 0.0 } else { offset_delta.y / height_delta },
        );
        self.target_anchor = self.target_scroll_offset + denormalize_to_viewport(normalized, target);
    }

    fn scroll_offset_at(&self, interp: f32) -> VectorF {
        if interp <= 0.0 {
            return self.start_scroll_offset;
        }
        if interp >= 1.0 {
            return self.target_scroll_offset;
        }
        self.anchor_at(interp) - self.viewport_relative_anchor_at(interp)
    }

    fn anchor_at(&self, interp: f32) -> VectorF {
        self.start_anchor.lerp(self.target_anchor, interp)
    }

    fn viewport_relative_anchor_at(&self, interp: f32) -> VectorF {
        let start_normalized = normalize_from_viewport(
            self.start_anchor - self.start_scroll_offset,
            self.start_viewport_size(),
        );
        let target_normalized = normalize_from_viewport(
            self.target_anchor - self.target_scroll_offset,
            self.target_viewport_size(),
        );
        let normalized = start_normalized.lerp(target_normalized, interp);
        denormalize_to_viewport(normalized, self.viewport_size_at(interp))
    }

    fn page_scale_factor_at(&self, interp: f32) -> f32 {
        if interp <= 0.0 {
            return self.start_page_scale_factor;
        }
        if interp >= 1.0 {
            return self.target_page_scale_factor;
        }
        let ratio = self.target_page_scale_factor / self.start_page_scale_factor;
        self.start_page_scale_factor * (ratio.ln() * interp).exp()
    }
}

fn normalize_from_viewport(denormalized: VectorF, viewport_size: SizeF) -> VectorF {
    if viewport_size.width == 0.0 || viewport_size.height == 0.0 {
        return VectorF::zero();
    }
    VectorF::new(
        denormalized.x / viewport_size.width,
        denormalized.y / viewport_size.height,
    )
}

fn denormalize_to_viewport(normalized: VectorF, viewport_size: SizeF) -> VectorF {
    VectorF::new(
        normalized.x * viewport_size.width,
        normalized.y * viewport_size.height,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn animation(offset: VectorF, scale: f32) -> PageScaleAnimation {
        PageScaleAnimation::new(
            offset,
            scale,
            SizeF::new(100.0, 100.0),
            SizeF::new(1000.0, 1000.0),
            CubicBezier::page_scale_ease(),
        )
    }

    #[test]
    fn bezier_hits_end_points_and_stays_monotonic() {
        let ease = CubicBezier::page_scale_ease();
        assert_eq!(ease.value(0.0), 0.0);
        assert_eq!(ease.value(1.0), 1.0);
        let samples: Vec<f64> = (0..=10).map(|step| ease.value(step as f64 / 10.0)).collect();
        assert!(samples.windows(2).all(|pair| pair[0] <= pair[1] + 1e-9));
    }

    #[test]
    fn zoom_to_reaches_target_scale_and_offset() {
        let mut zoom = animation(VectorF::new(0.0, 0.0), 1.0);
        zoom.zoom_to(VectorF::new(200.0, 300.0), 2.0, Duration::from_millis(100));
        let start = Instant::now();
        zoom.start_animation(start);

        assert!((zoom.page_scale_factor_at_time(start) - 1.0).abs() < 1e-4);
        let end = start + Duration::from_millis(100);
        assert!(zoom.is_animation_complete_at_time(end));
        assert!((zoom.page_scale_factor_at_time(end) - 2.0).abs() < 1e-4);
        assert_eq!(zoom.scroll_offset_at_time(end), VectorF::new(200.0, 300.0));
    }

    #[test]
    fn scale_interpolates_in_log_space() {
        let mut zoom = animation(VectorF::zero(), 1.0);
        zoom.zoom_to(VectorF::zero(), 4.0, Duration::from_secs(1));
        assert!((zoom.page_scale_factor_at(0.5) - 2.0).abs() < 1e-4);
    }

    #[test]
    fn target_offset_is_clamped_to_content() {
        let mut zoom = animation(VectorF::zero(), 1.0);
        zoom.zoom_to(VectorF::new(5000.0, -20.0), 2.0, Duration::from_secs(1));
        assert_eq!(zoom.target_scroll_offset(), VectorF::new(950.0, 0.0));
    }

    #[test]
    fn anchored_zoom_keeps_the_anchor_in_place() {
        let mut zoom = animation(VectorF::new(100.0, 100.0), 1.0);
        zoom.zoom_with_anchor(VectorF::new(150.0, 150.0), 2.0, Duration::from_secs(1));
        // Anchor was in the middle of the 100x100 viewport; at 2x it spans 50x50.
        assert_eq!(zoom.target_scroll_offset(), VectorF::new(125.0, 125.0));
    }
}
