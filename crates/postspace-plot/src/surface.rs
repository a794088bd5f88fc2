//! Render surface and frame pacing.
//!
//! A [`RenderSurface`] turns the camera and point set into a [`Frame`]:
//! a display list of projected spheres, painted back to front by
//! whatever backend consumes it. The last valid frame is always kept so
//! a backend never has to draw an empty canvas while data reloads or the
//! surface is being resized.

use std::time::{Duration, Instant};

use postspace_shared::PostId;
use serde::Serialize;

use crate::camera::OrbitCamera;
use crate::interaction::Interaction;
use crate::points::{PointSet, Rgb, POINT_RADIUS};
use crate::viewport::Viewport;

pub const TARGET_FPS: u32 = 60;
/// Resizes smaller than this in both dimensions are ignored.
pub const MIN_RESIZE_DELTA_PX: u32 = 5;

// ---------------------------------------------------------------------------
// Frame limiter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FrameLimiter {
    interval: Duration,
    last: Option<Instant>,
    forced: bool,
}

impl Default for FrameLimiter {
    fn default() -> Self {
        Self::new(TARGET_FPS)
    }
}

impl FrameLimiter {
    pub fn new(fps: u32) -> Self {
        Self {
            interval: Duration::from_secs(1) / fps.max(1),
            last: None,
            forced: false,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Let the next [`FrameLimiter::should_render`] pass regardless of
    /// timing.
    pub fn request_immediate(&mut self) {
        self.forced = true;
    }

    pub fn is_forced(&self) -> bool {
        self.forced
    }

    /// Gaps at least this long count as a full frame, so a ticker that
    /// wakes slightly early against a late previous tick still renders.
    pub fn slack(&self) -> Duration {
        self.interval - self.interval / 8
    }

    /// Whether a frame is due at `now`. A `true` answer counts as
    /// rendering.
    pub fn should_render(&mut self, now: Instant) -> bool {
        let due = match self.last {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.slack(),
        };
        if due || self.forced {
            self.last = Some(now);
            self.forced = false;
            true
        } else {
            false
        }
    }
}

// ---------------------------------------------------------------------------
// Frames
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FramePoint {
    pub post_id: PostId,
    pub screen_x: f64,
    pub screen_y: f64,
    pub radius_px: f64,
    pub depth: f64,
    pub color: Rgb,
    pub emissive: u32,
    pub label: String,
}

/// One rendered frame. `points` is sorted far to near.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    pub seq: u64,
    pub width: u32,
    pub height: u32,
    pub points: Vec<FramePoint>,
}

impl Frame {
    pub fn point(&self, id: PostId) -> Option<&FramePoint> {
        self.points.iter().find(|p| p.post_id == id)
    }
}

// ---------------------------------------------------------------------------
// Surface
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RenderSurface {
    viewport: Viewport,
    last: Option<Frame>,
    seq: u64,
}

impl RenderSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            viewport: Viewport::new(width, height),
            last: None,
            seq: 0,
        }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Adopt a new size. Returns `false` (and changes nothing) when the
    /// size is zero or differs by less than [`MIN_RESIZE_DELTA_PX`] in
    /// both dimensions.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if width == 0 || height == 0 {
            return false;
        }
        let dw = width.abs_diff(self.viewport.width());
        let dh = height.abs_diff(self.viewport.height());
        if dw < MIN_RESIZE_DELTA_PX && dh < MIN_RESIZE_DELTA_PX {
            return false;
        }

        tracing::debug!(width, height, "plot surface resized");
        self.viewport = Viewport::new(width, height);
        true
    }

    /// Render a new frame and keep it as the last valid one.
    pub fn render(
        &mut self,
        camera: &OrbitCamera,
        points: &PointSet,
        interaction: &Interaction,
    ) -> &Frame {
        let height = f64::from(self.viewport.height());
        let mut drawn: Vec<FramePoint> = points
            .points()
            .iter()
            .filter_map(|p| {
                let proj = camera.project(p.position)?;
                let (screen_x, screen_y) = self.viewport.to_pixels(proj.ndc);
                Some(FramePoint {
                    post_id: p.post_id,
                    screen_x,
                    screen_y,
                    radius_px: POINT_RADIUS * camera.pixels_per_unit(proj.depth, height),
                    depth: proj.depth,
                    color: p.color,
                    emissive: interaction.emissive_for(p.post_id),
                    label: p.label.clone(),
                })
            })
            .collect();
        drawn.sort_by(|a, b| b.depth.total_cmp(&a.depth));

        self.seq += 1;
        self.last.insert(Frame {
            seq: self.seq,
            width: self.viewport.width(),
            height: self.viewport.height(),
            points: drawn,
        })
    }

    /// Most recent valid frame.
    pub fn present(&self) -> Option<&Frame> {
        self.last.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limiter_paces_frames() {
        let mut limiter = FrameLimiter::new(60);
        let t0 = Instant::now();
        assert!(limiter.should_render(t0));
        assert!(!limiter.should_render(t0 + Duration::from_millis(5)));
        assert!(limiter.should_render(t0 + Duration::from_millis(17)));
    }

    #[test]
    fn test_jittered_ticks_all_render() {
        let mut limiter = FrameLimiter::default();
        let interval = limiter.interval();
        let t0 = Instant::now();
        let jitter_us = [0, 400, 0, 350, 10, 400, 0, 200, 400, 0];
        let rendered = jitter_us
            .iter()
            .enumerate()
            .filter(|(k, j)| {
                let tick = t0 + interval * *k as u32 + Duration::from_micros(**j);
                limiter.should_render(tick)
            })
            .count();
        assert_eq!(rendered, jitter_us.len());
    }

    #[test]
    fn test_half_interval_is_still_skipped() {
        let mut limiter = FrameLimiter::default();
        let t0 = Instant::now();
        assert!(limiter.should_render(t0));
        assert!(!limiter.should_render(t0 + limiter.interval() / 2));
        assert!(limiter.should_render(t0 + limiter.interval()));
    }

    #[test]
    fn test_forced_frame_skips_wait() {
        let mut limiter = FrameLimiter::default();
        let t0 = Instant::now();
        assert!(limiter.should_render(t0));
        limiter.request_immediate();
        assert!(limiter.should_render(t0 + Duration::from_millis(1)));
        assert!(!limiter.is_forced());
        assert!(!limiter.should_render(t0 + Duration::from_millis(2)));
    }

    #[test]
    fn test_small_resize_is_ignored() {
        let mut surface = RenderSurface::new(800, 600);
        assert!(!surface.resize(803, 597));
        assert_eq!(surface.viewport(), Viewport::new(800, 600));
        assert!(surface.resize(805, 600));
        assert_eq!(surface.viewport().width(), 805);
        assert!(!surface.resize(0, 600));
    }

    #[test]
    fn test_render_keeps_last_frame() {
        let mut surface = RenderSurface::new(400, 300);
        assert!(surface.present().is_none());

        let camera = OrbitCamera::new(surface.viewport().aspect());
        let seq = surface
            .render(&camera, &PointSet::default(), &Interaction::new())
            .seq;
        surface.resize(800, 600);
        let kept = surface.present().unwrap();
        assert_eq!(kept.seq, seq);
        assert_eq!(kept.width, 400);
    }
}
