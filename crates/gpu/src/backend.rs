use std::fmt;

use foundation::math::{Mat4, Vec3};
use scene::instance::ModelInstance;

use crate::settings::RendererSettings;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GpuContextError {
    /// No usable graphics adapter or context.
    Unavailable { reason: String },
    /// The drawing surface could not be created or was lost.
    Surface { reason: String },
    /// Device creation or a device-level operation failed.
    Device { reason: String },
}

impl fmt::Display for GpuContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuContextError::Unavailable { reason } => write!(f, "GPU unavailable: {reason}"),
            GpuContextError::Surface { reason } => write!(f, "surface error: {reason}"),
            GpuContextError::Device { reason } => write!(f, "device error: {reason}"),
        }
    }
}

impl std::error::Error for GpuContextError {}

/// Camera matrices for one frame, column-major.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CameraView {
    pub view: Mat4,
    pub projection: Mat4,
    pub view_proj: Mat4,
    pub eye: Vec3,
}

/// A renderer bound to one drawing surface.
pub trait RenderBackend {
    fn resize(&mut self, settings: &RendererSettings);
    /// Replace the displayed model with `model`.
    fn set_model(&mut self, model: &ModelInstance);
    /// False while the surface is still being set up. `render` is not called
    /// until this returns true; a failed setup reports ready and fails `render`.
    fn is_ready(&self) -> bool {
        true
    }
    fn render(&mut self, view: &CameraView) -> Result<(), GpuContextError>;
    /// Release GPU resources and detach the surface. Called once.
    fn dispose(&mut self);
}

pub trait BackendFactory {
    type Backend: RenderBackend;

    fn create(&mut self, settings: &RendererSettings) -> Result<Self::Backend, GpuContextError>;
}
