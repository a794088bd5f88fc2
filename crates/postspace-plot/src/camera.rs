//! Perspective camera with orbit controls.
//!
//! The camera sits on a sphere around `target`, described by a radius,
//! an azimuth (`theta`, around +Y) and a polar angle (`phi`, from +Y).
//! Pointer gestures only accumulate deltas; [`OrbitCamera::update`]
//! applies a damped fraction of them each frame, so motion eases out
//! over the following frames.

use std::f64::consts::PI;

use crate::math::{Ray, Vec3};
use crate::viewport::Ndc;

pub const FOV_DEGREES: f64 = 75.0;
pub const NEAR: f64 = 0.1;
pub const FAR: f64 = 1000.0;
pub const START_POSITION: Vec3 = Vec3::new(3.0, 3.0, 3.0);
pub const MIN_DISTANCE: f64 = 1.0;
pub const MAX_DISTANCE: f64 = 10.0;
pub const DAMPING_FACTOR: f64 = 0.05;
pub const PAN_SPEED: f64 = 0.5;
/// Per wheel notch.
pub const ZOOM_STEP: f64 = 0.95;

const POLAR_MIN: f64 = 0.01;
const POLAR_MAX: f64 = PI - 0.01;
const SETTLE_EPS: f64 = 1e-6;

/// Result of projecting a world point onto the image plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub ndc: Ndc,
    /// Distance along the view direction.
    pub depth: f64,
}

#[derive(Debug, Clone)]
pub struct OrbitCamera {
    target: Vec3,
    radius: f64,
    theta: f64,
    phi: f64,
    aspect: f64,
    position: Vec3,

    // Pending motion, drained by `update`.
    d_theta: f64,
    d_phi: f64,
    pan_offset: Vec3,
    scale: f64,
}

impl OrbitCamera {
    /// Camera at the default start position, looking at the origin.
    pub fn new(aspect: f64) -> Self {
        Self::looking_at(START_POSITION, Vec3::ZERO, aspect)
    }

    pub fn looking_at(position: Vec3, target: Vec3, aspect: f64) -> Self {
        let offset = position - target;
        let radius = offset.length().clamp(MIN_DISTANCE, MAX_DISTANCE);
        let len = offset.length().max(f64::EPSILON);
        let theta = offset.x.atan2(offset.z);
        let phi = (offset.y / len).clamp(-1.0, 1.0).acos().clamp(POLAR_MIN, POLAR_MAX);

        let mut camera = Self {
            target,
            radius,
            theta,
            phi,
            aspect: 1.0,
            position,
            d_theta: 0.0,
            d_phi: 0.0,
            pan_offset: Vec3::ZERO,
            scale: 1.0,
        };
        camera.set_aspect(aspect);
        camera.position = camera.spherical_position();
        camera
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn distance(&self) -> f64 {
        self.radius
    }

    pub fn aspect(&self) -> f64 {
        self.aspect
    }

    /// Non-positive or non-finite ratios are ignored.
    pub fn set_aspect(&mut self, aspect: f64) {
        if aspect.is_finite() && aspect > 0.0 {
            self.aspect = aspect;
        }
    }

    /// Queue a rotation for a pointer drag of `(dx, dy)` pixels. A drag
    /// across the full viewport height turns the camera once around.
    pub fn orbit(&mut self, dx: f64, dy: f64, viewport_height: f64) {
        let h = viewport_height.max(1.0);
        self.d_theta -= 2.0 * PI * dx / h;
        self.d_phi -= 2.0 * PI * dy / h;
    }

    /// Queue a pan that moves camera and target together in the view
    /// plane.
    pub fn pan(&mut self, dx: f64, dy: f64, viewport_height: f64) {
        let h = viewport_height.max(1.0);
        let target_distance = self.radius * half_fov_tan();
        let (_, right, up) = self.basis();

        let left = 2.0 * dx * PAN_SPEED * target_distance / h;
        let upward = 2.0 * dy * PAN_SPEED * target_distance / h;
        self.pan_offset += right * -left + up * upward;
    }

    /// Negative `delta_y` (wheel away from the user) moves closer.
    pub fn zoom(&mut self, delta_y: f64) {
        if delta_y < 0.0 {
            self.scale *= ZOOM_STEP;
        } else if delta_y > 0.0 {
            self.scale /= ZOOM_STEP;
        }
    }

    /// Apply one damped step of pending motion. Returns whether the
    /// camera moved.
    pub fn update(&mut self) -> bool {
        let before = self.position;

        self.theta += self.d_theta * DAMPING_FACTOR;
        self.phi = (self.phi + self.d_phi * DAMPING_FACTOR).clamp(POLAR_MIN, POLAR_MAX);
        self.radius = (self.radius * self.scale).clamp(MIN_DISTANCE, MAX_DISTANCE);
        self.target += self.pan_offset * DAMPING_FACTOR;

        self.d_theta *= 1.0 - DAMPING_FACTOR;
        self.d_phi *= 1.0 - DAMPING_FACTOR;
        self.pan_offset = self.pan_offset * (1.0 - DAMPING_FACTOR);
        self.scale = 1.0;

        if self.d_theta.abs() < SETTLE_EPS {
            self.d_theta = 0.0;
        }
        if self.d_phi.abs() < SETTLE_EPS {
            self.d_phi = 0.0;
        }
        if self.pan_offset.length() < SETTLE_EPS {
            self.pan_offset = Vec3::ZERO;
        }

        self.position = self.spherical_position();
        (self.position - before).length_squared() > SETTLE_EPS * SETTLE_EPS
    }

    /// True once all damped motion has played out.
    pub fn is_settled(&self) -> bool {
        self.d_theta == 0.0 && self.d_phi == 0.0 && self.pan_offset == Vec3::ZERO
    }

    /// `(forward, right, up)` unit vectors of the view.
    pub fn basis(&self) -> (Vec3, Vec3, Vec3) {
        let forward = (self.target - self.position).normalized();
        let right = forward.cross(Vec3::UP).normalized();
        let up = right.cross(forward);
        (forward, right, up)
    }

    /// Ray from the eye through a point on the image plane.
    pub fn ray_through(&self, ndc: Ndc) -> Ray {
        let (forward, right, up) = self.basis();
        let t = half_fov_tan();
        let dir = forward + right * (ndc.x * t * self.aspect) + up * (ndc.y * t);
        Ray::new(self.position, dir)
    }

    /// Project a world point. `None` when it lies outside the near/far
    /// range (including behind the camera).
    pub fn project(&self, point: Vec3) -> Option<Projection> {
        let (forward, right, up) = self.basis();
        let rel = point - self.position;
        let depth = rel.dot(forward);
        if !(NEAR..=FAR).contains(&depth) {
            return None;
        }

        let t = half_fov_tan();
        Some(Projection {
            ndc: Ndc {
                x: rel.dot(right) / (depth * t * self.aspect),
                y: rel.dot(up) / (depth * t),
            },
            depth,
        })
    }

    /// Screen size, in pixels, of one world unit at `depth`.
    pub fn pixels_per_unit(&self, depth: f64, viewport_height: f64) -> f64 {
        viewport_height / (2.0 * depth.max(NEAR) * half_fov_tan())
    }

    fn spherical_position(&self) -> Vec3 {
        let sin_phi = self.phi.sin();
        self.target
            + Vec3::new(
                self.radius * sin_phi * self.theta.sin(),
                self.radius * self.phi.cos(),
                self.radius * sin_phi * self.theta.cos(),
            )
    }
}

fn half_fov_tan() -> f64 {
    (FOV_DEGREES.to_radians() / 2.0).tan()
}
