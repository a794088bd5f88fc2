use std::time::Instant;

use postspace_shared::{Post, PostId};

use crate::camera::OrbitCamera;
use crate::interaction::{CameraGesture, Effect, Interaction, PointerButton};
use crate::math::Vec3;
use crate::points::PointSet;
use crate::surface::{Frame, FrameLimiter, RenderSurface};

/// Notifications for the surrounding UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlotEvent {
    HoverChanged(Option<PostId>),
    PostSelected(PostId),
    /// The selected post disappeared from the plot or was cleared.
    SelectionCleared,
}

/// Owns everything needed to draw the post map and react to pointer
/// input.
#[derive(Debug, Clone)]
pub struct PlotEngine {
    camera: OrbitCamera,
    points: PointSet,
    interaction: Interaction,
    surface: RenderSurface,
    limiter: FrameLimiter,
}

impl PlotEngine {
    pub fn new(width: u32, height: u32) -> Self {
        let surface = RenderSurface::new(width, height);
        Self {
            camera: OrbitCamera::new(surface.viewport().aspect()),
            points: PointSet::default(),
            interaction: Interaction::new(),
            surface,
            limiter: FrameLimiter::default(),
        }
    }

    pub fn camera(&self) -> &OrbitCamera {
        &self.camera
    }

    pub fn points(&self) -> &PointSet {
        &self.points
    }

    pub fn interaction(&self) -> &Interaction {
        &self.interaction
    }

    pub fn selected(&self) -> Option<PostId> {
        self.interaction.selected()
    }

    pub fn hovered(&self) -> Option<PostId> {
        self.interaction.hovered()
    }

    /// Replace the plotted posts. The previous frame stays presentable
    /// until the next one is rendered.
    pub fn set_posts(&mut self, posts: &[Post]) -> Vec<PlotEvent> {
        self.points = PointSet::from_posts(posts);
        let points = &self.points;
        let dropped = self.interaction.reset_for_reload(|id| points.contains(id));
        self.limiter.request_immediate();

        tracing::debug!(
            plotted = self.points.len(),
            skipped = self.points.skipped(),
            "plot points rebuilt"
        );

        match dropped {
            Some(_) => vec![PlotEvent::SelectionCleared],
            None => Vec::new(),
        }
    }

    pub fn pointer_move(&mut self, x: f64, y: f64) -> Vec<PlotEvent> {
        let hit = self.hit_at(x, y);
        let effects = self.interaction.pointer_move((x, y), hit);
        self.apply(effects)
    }

    pub fn pointer_down(&mut self, x: f64, y: f64, button: PointerButton) {
        self.interaction.pointer_down((x, y), button);
    }

    pub fn pointer_up(&mut self, x: f64, y: f64) -> Vec<PlotEvent> {
        let hit = self.hit_at(x, y);
        let effects = self.interaction.pointer_up((x, y), hit);
        self.apply(effects)
    }

    pub fn pointer_leave(&mut self) -> Vec<PlotEvent> {
        let effects = self.interaction.pointer_leave();
        self.apply(effects)
    }

    pub fn wheel(&mut self, delta_y: f64) {
        self.camera.zoom(delta_y);
    }

    /// Close the detail view's selection. Returns whether anything was
    /// selected.
    pub fn clear_selection(&mut self) -> bool {
        self.interaction.clear_selection().is_some()
    }

    /// Resize the drawing area. Accepted resizes render at once; ignored
    /// ones leave both size and last frame untouched.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if !self.surface.resize(width, height) {
            return false;
        }
        self.camera.set_aspect(self.surface.viewport().aspect());
        self.limiter.request_immediate();
        self.surface
            .render(&self.camera, &self.points, &self.interaction);
        true
    }

    /// Advance the camera and render if a frame is due at `now`.
    pub fn frame(&mut self, now: Instant) -> Option<&Frame> {
        if !self.limiter.should_render(now) {
            return None;
        }
        self.camera.update();
        Some(
            self.surface
                .render(&self.camera, &self.points, &self.interaction),
        )
    }

    /// Last valid frame, whether or not a new one was rendered recently.
    pub fn present(&self) -> Option<&Frame> {
        self.surface.present()
    }

    /// Pixel position of a plotted post under the current camera.
    pub fn screen_position(&self, id: PostId) -> Option<(f64, f64)> {
        let point = self.points.get(id)?;
        let proj = self.camera.project(point.position)?;
        Some(self.surface.viewport().to_pixels(proj.ndc))
    }

    /// World position of a plotted post.
    pub fn world_position(&self, id: PostId) -> Option<Vec3> {
        self.points.get(id).map(|p| p.position)
    }

    fn hit_at(&self, x: f64, y: f64) -> Option<PostId> {
        let ndc = self.surface.viewport().to_ndc(x, y);
        self.points.hit_test(&self.camera.ray_through(ndc))
    }

    fn apply(&mut self, effects: Vec<Effect>) -> Vec<PlotEvent> {
        let height = f64::from(self.surface.viewport().height());
        let mut events = Vec::new();
        for effect in effects {
            match effect {
                Effect::HoverChanged(id) => events.push(PlotEvent::HoverChanged(id)),
                Effect::Selected(id) => events.push(PlotEvent::PostSelected(id)),
                Effect::Camera(CameraGesture::Orbit { dx, dy }) => {
                    self.camera.orbit(dx, dy, height)
                }
                Effect::Camera(CameraGesture::Pan { dx, dy }) => self.camera.pan(dx, dy, height),
            }
        }
        events
    }
}
