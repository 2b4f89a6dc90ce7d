use foundation::math::{Mat4, Vec3, clamp, mat4_look_at_rh, mat4_mul, mat4_orthographic_rh_z0};
use gpu::backend::CameraView;

use crate::config::{FramingConfig, ScaleCoefficients};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DeviceClass {
    Mobile,
    Tablet,
    Desktop,
}

impl DeviceClass {
    pub fn from_width(width: f64, framing: &FramingConfig) -> Self {
        if width < framing.tablet_min_width {
            DeviceClass::Mobile
        } else if width < framing.desktop_min_width {
            DeviceClass::Tablet
        } else {
            DeviceClass::Desktop
        }
    }

    fn coefficients(self, framing: &FramingConfig) -> ScaleCoefficients {
        match self {
            DeviceClass::Mobile => framing.mobile,
            DeviceClass::Tablet => framing.tablet,
            DeviceClass::Desktop => framing.desktop,
        }
    }
}

/// Half-widths of the orthographic frustum.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Extents {
    pub half_x: f64,
    pub half_y: f64,
}

/// Visible scale for a container: grows with its short side, clamped.
pub fn frame_scale(framing: &FramingConfig, width: f64, height: f64) -> f64 {
    let c = DeviceClass::from_width(width, framing).coefficients(framing);
    clamp(
        c.slope * width.min(height) + c.intercept,
        framing.min_scale,
        framing.max_scale,
    )
}

/// The short side of the container always spans `2 * scale` world units.
pub fn frame_extents(framing: &FramingConfig, width: f64, height: f64) -> Extents {
    let width = width.max(1.0);
    let height = height.max(1.0);
    let scale = frame_scale(framing, width, height);
    if width >= height {
        Extents {
            half_x: scale * width / height,
            half_y: scale,
        }
    } else {
        Extents {
            half_x: scale,
            half_y: scale * height / width,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct OrthographicCamera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub extents: Extents,
    pub near: f64,
    pub far: f64,
}

impl OrthographicCamera {
    pub fn new(extents: Extents, near: f64, far: f64) -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 1.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            extents,
            near,
            far,
        }
    }

    /// Build the camera for a container exactly as a resize to that size would.
    pub fn framed(framing: &FramingConfig, width: f64, height: f64) -> Self {
        Self::new(
            frame_extents(framing, width, height),
            framing.near,
            framing.far,
        )
    }

    pub fn look_at(&mut self, target: Vec3) {
        self.target = target;
    }

    pub fn view(&self) -> Mat4 {
        mat4_look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection(&self) -> Mat4 {
        let Extents { half_x, half_y } = self.extents;
        mat4_orthographic_rh_z0(-half_x, half_x, -half_y, half_y, self.near, self.far)
    }

    pub fn camera_view(&self) -> CameraView {
        let view = self.view();
        let projection = self.projection();
        CameraView {
            view,
            projection,
            view_proj: mat4_mul(projection, view),
            eye: self.position,
        }
    }
}

/// Camera placement around a target: horizontal radius, azimuth, fixed height.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct OrbitPose {
    pub azimuth: f64,
    pub radius: f64,
    pub height: f64,
}

impl OrbitPose {
    pub fn position(&self, target: Vec3) -> Vec3 {
        Vec3::new(
            target.x + self.radius * self.azimuth.sin(),
            self.height,
            target.z + self.radius * self.azimuth.cos(),
        )
    }
}
