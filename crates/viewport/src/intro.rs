use crate::camera::OrbitPose;
use crate::config::IntroConfig;

/// `sqrt(1 - (t - 1)^4)`: fast start, gentle landing. `t` is clamped to [0, 1].
pub fn ease_out(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    (1.0 - (t - 1.0).powi(4)).sqrt()
}

/// Scripted fly-in: sweeps the azimuth over a fixed number of executed
/// frames while radius and height stay put.
#[derive(Debug, Clone)]
pub struct IntroAnimation {
    config: IntroConfig,
    initial: OrbitPose,
    frame_count: u32,
}

impl IntroAnimation {
    pub fn new(config: IntroConfig, initial: OrbitPose) -> Self {
        Self {
            config,
            initial,
            frame_count: 0,
        }
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    pub fn is_finished(&self) -> bool {
        self.frame_count >= self.config.frames
    }

    /// Pose for the next executed frame. Does nothing once finished.
    pub fn step(&mut self) -> OrbitPose {
        if !self.is_finished() {
            self.frame_count += 1;
        }
        self.pose()
    }

    pub fn pose(&self) -> OrbitPose {
        let t = self.frame_count as f64 / self.config.frames.max(1) as f64;
        OrbitPose {
            azimuth: self.initial.azimuth - ease_out(t) * self.config.sweep,
            ..self.initial
        }
    }
}
