use foundation::time::Time;

use crate::frame::Frame;

pub const DEFAULT_TARGET_FPS: f64 = 60.0;

/// Caps render work at a target rate regardless of how often the host calls back.
///
/// A callback that arrives sooner than one interval after the last executed
/// frame is skipped. An executed frame moves `last` forward by a whole number
/// of intervals so the cadence does not drift.
#[derive(Debug, Clone)]
pub struct FrameThrottle {
    interval_ms: f64,
    last_ms: Option<f64>,
    frame: Option<Frame>,
}

impl FrameThrottle {
    pub fn new(target_fps: f64) -> Self {
        let fps = if target_fps.is_finite() && target_fps > 0.0 {
            target_fps
        } else {
            DEFAULT_TARGET_FPS
        };
        Self {
            interval_ms: 1000.0 / fps,
            last_ms: None,
            frame: None,
        }
    }

    pub fn interval_ms(&self) -> f64 {
        self.interval_ms
    }

    /// Returns the frame to execute for a callback at `now_ms`, or `None` to skip.
    pub fn poll(&mut self, now_ms: f64) -> Option<Frame> {
        let time = Time::from_millis(now_ms);
        if let Some(last) = self.last_ms {
            let elapsed = now_ms - last;
            if elapsed < self.interval_ms {
                return None;
            }
            self.last_ms = Some(now_ms - elapsed % self.interval_ms);
        } else {
            self.last_ms = Some(now_ms);
        }

        let frame = match self.frame {
            Some(prev) => prev.next(time),
            None => Frame::first(time),
        };
        self.frame = Some(frame);
        Some(frame)
    }

    /// Forget the cadence; the next callback executes.
    pub fn reset(&mut self) {
        self.last_ms = None;
    }
}

impl Default for FrameThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_TARGET_FPS)
    }
}
