use std::f64::consts::PI;

use foundation::math::{Vec3, clamp};

use crate::camera::OrthographicCamera;
use crate::config::ControlsConfig;

/// Angles below this are treated as settled.
const EPS: f64 = 1e-6;

/// Spherical coordinates of the camera relative to the target.
///
/// `theta` is measured from +Z towards +X; `phi` is the polar angle from +Y.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Spherical {
    pub radius: f64,
    pub theta: f64,
    pub phi: f64,
}

impl Spherical {
    pub fn from_offset(v: Vec3) -> Self {
        let radius = v.length();
        if radius <= 0.0 {
            return Self::default();
        }
        Self {
            radius,
            theta: v.x.atan2(v.z),
            phi: clamp(v.y / radius, -1.0, 1.0).acos(),
        }
    }

    pub fn to_offset(self) -> Vec3 {
        let sin_phi = self.phi.sin();
        Vec3::new(
            self.radius * sin_phi * self.theta.sin(),
            self.radius * self.phi.cos(),
            self.radius * sin_phi * self.theta.cos(),
        )
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum DragState {
    Idle,
    Rotating,
}

/// Orbit controls: auto-rotation and pointer-drag rotation around a target,
/// with damping. Zoom and pan are not offered.
#[derive(Debug, Clone)]
pub struct OrbitControls {
    config: ControlsConfig,
    pub target: Vec3,
    pub enabled: bool,
    spherical_delta: Spherical,
    drag: DragState,
    last_pointer_px: [f64; 2],
    viewport_height_px: f64,
}

impl OrbitControls {
    pub fn new(config: ControlsConfig, target: Vec3) -> Self {
        Self {
            config,
            target,
            enabled: true,
            spherical_delta: Spherical::default(),
            drag: DragState::Idle,
            last_pointer_px: [0.0, 0.0],
            viewport_height_px: 1.0,
        }
    }

    pub fn config(&self) -> &ControlsConfig {
        &self.config
    }

    /// Set the element height used to convert drag distance to angles.
    pub fn set_viewport_height(&mut self, height_px: f64) {
        self.viewport_height_px = height_px.max(1.0);
    }

    /// Angle auto-rotation adds per update (one call per rendered frame at 60 Hz).
    pub fn auto_rotation_angle(&self) -> f64 {
        2.0 * PI / 60.0 / 60.0 * self.config.auto_rotate_speed
    }

    /// Drop pending motion, e.g. after the camera was moved by something else.
    pub fn sync(&mut self) {
        self.spherical_delta = Spherical::default();
    }

    pub fn is_dragging(&self) -> bool {
        self.drag == DragState::Rotating
    }

    /// Handle pointer down event.
    pub fn pointer_down(&mut self, pos_px: [f64; 2]) {
        if !self.enabled {
            return;
        }
        self.drag = DragState::Rotating;
        self.last_pointer_px = pos_px;
    }

    /// Handle pointer move event. Ignored unless a drag is in progress.
    pub fn pointer_move(&mut self, pos_px: [f64; 2]) {
        if !self.enabled || self.drag != DragState::Rotating {
            return;
        }
        let dx = pos_px[0] - self.last_pointer_px[0];
        let dy = pos_px[1] - self.last_pointer_px[1];
        self.last_pointer_px = pos_px;

        let per_px = 2.0 * PI * self.config.rotate_speed / self.viewport_height_px;
        self.rotate_left(dx * per_px);
        self.rotate_up(dy * per_px);
    }

    pub fn pointer_up(&mut self) {
        self.drag = DragState::Idle;
    }

    fn rotate_left(&mut self, angle: f64) {
        self.spherical_delta.theta -= angle;
    }

    fn rotate_up(&mut self, angle: f64) {
        self.spherical_delta.phi -= angle;
    }

    /// Advance one frame: apply auto-rotation and pending drag motion to
    /// `camera`, then decay the pending motion. Returns whether the camera moved.
    pub fn update(&mut self, camera: &mut OrthographicCamera) -> bool {
        if !self.enabled {
            return false;
        }

        let offset = camera.position - self.target;
        let mut spherical = Spherical::from_offset(offset);

        if self.config.auto_rotate && self.drag == DragState::Idle {
            self.rotate_left(self.auto_rotation_angle());
        }

        let damping = self.config.damping_factor;
        let use_damping = damping > 0.0;
        if use_damping {
            spherical.theta += self.spherical_delta.theta * damping;
            spherical.phi += self.spherical_delta.phi * damping;
        } else {
            spherical.theta += self.spherical_delta.theta;
            spherical.phi += self.spherical_delta.phi;
        }

        spherical.phi = clamp(
            spherical.phi,
            self.config.min_polar_angle,
            self.config.max_polar_angle,
        );

        let before = camera.position;
        camera.position = self.target + spherical.to_offset();
        camera.look_at(self.target);

        if use_damping {
            self.spherical_delta.theta *= 1.0 - damping;
            self.spherical_delta.phi *= 1.0 - damping;
        } else {
            self.spherical_delta = Spherical::default();
        }

        (camera.position - before).length() > EPS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{Extents, OrthographicCamera};
    use approx::assert_abs_diff_eq;

    fn camera_at(position: Vec3) -> OrthographicCamera {
        let mut cam = OrthographicCamera::new(
            Extents {
                half_x: 5.0,
                half_y: 5.0,
            },
            0.01,
            100.0,
        );
        cam.position = position;
        cam
    }

    fn theta_of(cam: &OrthographicCamera, target: Vec3) -> f64 {
        Spherical::from_offset(cam.position - target).theta
    }

    #[test]
    fn spherical_round_trips_offsets() {
        let v = Vec3::new(3.0, 4.0, -2.0);
        let back = Spherical::from_offset(v).to_offset();
        assert_abs_diff_eq!(back.x, v.x, epsilon = 1e-9);
        assert_abs_diff_eq!(back.y, v.y, epsilon = 1e-9);
        assert_abs_diff_eq!(back.z, v.z, epsilon = 1e-9);
    }

    #[test]
    fn auto_rotation_converges_to_one_revolution_per_30s() {
        let target = Vec3::ZERO;
        let mut controls = OrbitControls::new(ControlsConfig::default(), target);
        let mut cam = camera_at(Vec3::new(0.0, 5.0, 20.0));

        // Let the damped motion reach steady state.
        for _ in 0..600 {
            controls.update(&mut cam);
        }
        let before = theta_of(&cam, target);
        controls.update(&mut cam);
        let after = theta_of(&cam, target);

        let per_frame = 2.0 * PI / 1800.0;
        let mut step = before - after;
        if step < 0.0 {
            step += 2.0 * PI;
        }
        assert_abs_diff_eq!(step, per_frame, epsilon = 1e-6);
    }

    #[test]
    fn update_keeps_radius_and_height() {
        let target = Vec3::new(-0.5, 1.2, 0.0);
        let mut controls = OrbitControls::new(ControlsConfig::default(), target);
        let start = Vec3::new(5.0, 10.0, 18.0);
        let mut cam = camera_at(start);
        for _ in 0..50 {
            controls.update(&mut cam);
        }
        assert_abs_diff_eq!(
            (cam.position - target).length(),
            (start - target).length(),
            epsilon = 1e-9
        );
        assert_abs_diff_eq!(cam.position.y, start.y, epsilon = 1e-9);
        assert_eq!(cam.target, target);
    }

    #[test]
    fn drag_pauses_auto_rotation() {
        let mut controls = OrbitControls::new(ControlsConfig::default(), Vec3::ZERO);
        let mut cam = camera_at(Vec3::new(0.0, 5.0, 20.0));
        controls.pointer_down([10.0, 10.0]);
        assert!(controls.is_dragging());
        assert!(!controls.update(&mut cam));
        controls.pointer_up();
        assert!(controls.update(&mut cam));
    }

    #[test]
    fn vertical_drag_respects_polar_clamp() {
        let config = ControlsConfig {
            auto_rotate: false,
            damping_factor: 0.0,
            ..ControlsConfig::default()
        };
        let mut controls = OrbitControls::new(config, Vec3::ZERO);
        controls.set_viewport_height(100.0);
        let mut cam = camera_at(Vec3::new(0.0, 5.0, 20.0));

        controls.pointer_down([0.0, 0.0]);
        controls.pointer_move([0.0, 10_000.0]);
        controls.update(&mut cam);
        let phi = Spherical::from_offset(cam.position).phi;
        assert_abs_diff_eq!(phi, config.min_polar_angle, epsilon = 1e-9);
    }

    #[test]
    fn disabled_controls_ignore_everything() {
        let mut controls = OrbitControls::new(ControlsConfig::default(), Vec3::ZERO);
        controls.enabled = false;
        let mut cam = camera_at(Vec3::new(0.0, 5.0, 20.0));
        controls.pointer_down([0.0, 0.0]);
        assert!(!controls.is_dragging());
        assert!(!controls.update(&mut cam));
        assert_eq!(cam.position, Vec3::new(0.0, 5.0, 20.0));
    }
}
