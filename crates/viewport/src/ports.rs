//! Host-side collaborators the viewer is driven through.

/// Measured size of the container the viewer draws into.
pub trait SizeSource {
    /// CSS pixels, `(width, height)`.
    fn size(&self) -> (f64, f64);
    fn device_pixel_ratio(&self) -> f64;
}

/// Schedules `ModelViewer::on_frame` callbacks, e.g. `requestAnimationFrame`.
pub trait FrameScheduler {
    /// Ask for one callback. Repeated requests before it fires collapse into one.
    fn request_frame(&mut self);
    /// Drop a pending request; no-op when none is pending.
    fn cancel_frame(&mut self);
}

/// Fixed size, for hosts without a live layout and for tests.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct StaticSize {
    pub width: f64,
    pub height: f64,
    pub device_pixel_ratio: f64,
}

impl StaticSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            device_pixel_ratio: 1.0,
        }
    }
}

impl SizeSource for StaticSize {
    fn size(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    fn device_pixel_ratio(&self) -> f64 {
        self.device_pixel_ratio
    }
}
