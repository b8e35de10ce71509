use glam::{Mat4, Vec2, Vec3};

use crate::render::CameraParams;

const FOV_Y_RADIANS: f32 = std::f32::consts::FRAC_PI_4;
const ROTATE_SPEED: f32 = 0.008;
const PAN_SPEED: f32 = 0.0016;
const ZOOM_STEP: f32 = 0.9;
const MAX_PITCH: f32 = 1.54;
const MIN_DISTANCE: f32 = 0.05;
const MAX_DISTANCE: f32 = 10_000.0;

/// Orbit-style camera: yaw/pitch/distance around a focus point, driven by
/// pointer drags and scroll.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitCamera {
    pub target: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub distance: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        // Matches the resting eye position used before a model is framed.
        Self {
            target: Vec3::ZERO,
            yaw: 0.0,
            pitch: 0.32,
            distance: 6.3,
        }
    }
}

impl OrbitCamera {
    /// Rotates around the target by a pointer-drag delta in pixels.
    pub fn orbit(&mut self, delta: Vec2) {
        self.yaw -= delta.x * ROTATE_SPEED;
        self.pitch = (self.pitch + delta.y * ROTATE_SPEED).clamp(-MAX_PITCH, MAX_PITCH);
    }

    /// Moves the target within the view plane by a pointer-drag delta.
    pub fn pan(&mut self, delta: Vec2) {
        let (right, up) = self.view_axes();
        let scale = self.distance * PAN_SPEED;
        self.target += right * (-delta.x * scale) + up * (delta.y * scale);
    }

    /// Zooms by scroll steps; positive steps move the eye closer.
    pub fn zoom(&mut self, steps: f32) {
        self.distance = (self.distance * ZOOM_STEP.powf(steps)).clamp(MIN_DISTANCE, MAX_DISTANCE);
    }

    /// Repositions the orbit so the given world-space bounds fill the view.
    pub fn frame(&mut self, min: Vec3, max: Vec3) {
        self.target = (min + max) * 0.5;
        let radius = ((max - min).length() * 0.5).max(MIN_DISTANCE);
        self.distance = (radius / (FOV_Y_RADIANS * 0.5).sin() * 1.2).clamp(MIN_DISTANCE, MAX_DISTANCE);
    }

    pub fn eye(&self) -> Vec3 {
        let offset = Vec3::new(
            self.yaw.sin() * self.pitch.cos(),
            self.pitch.sin(),
            self.yaw.cos() * self.pitch.cos(),
        );
        self.target + offset * self.distance
    }

    /// View-projection parameters for the current orbit.
    pub fn params(&self, aspect: f32) -> CameraParams {
        let eye = self.eye();
        let view = Mat4::look_at_rh(eye, self.target, Vec3::Y);
        let near = (self.distance * 0.01).max(0.01);
        let far = (self.distance * 50.0).max(100.0);
        let projection = Mat4::perspective_rh(FOV_Y_RADIANS, aspect.max(0.01), near, far);
        CameraParams {
            view_proj: projection * view,
            position: eye,
        }
    }

    fn view_axes(&self) -> (Vec3, Vec3) {
        let forward = (self.target - self.eye()).normalize_or_zero();
        let right = forward.cross(Vec3::Y).normalize_or_zero();
        let up = right.cross(forward).normalize_or_zero();
        (right, up)
    }
}
