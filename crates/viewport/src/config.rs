use std::f64::consts::PI;
use std::fmt;

use gpu::settings::RendererPolicy;
use scene::optimize::ShadowPolicy;
use serde::{Deserialize, Serialize};
use streaming::loader::DEFAULT_DECODER_PATH;

use crate::gate::ObserveOptions;

pub const DEFAULT_MODEL_URL: &str = "/models/model.qmsh";

#[derive(Debug)]
pub enum ConfigError {
    Parse(serde_json::Error),
    Invalid { field: &'static str, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Parse(err) => write!(f, "viewer config parse error: {err}"),
            ConfigError::Invalid { field, reason } => {
                write!(f, "invalid viewer config {field}: {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Parse(err) => Some(err),
            ConfigError::Invalid { .. } => None,
        }
    }
}

/// Everything a viewer needs besides its host ports. Every field has a
/// default, so `{}` is a complete configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub model_url: String,
    pub decoder_path: String,
    pub observe: ObserveOptions,
    pub renderer: RendererPolicy,
    pub framing: FramingConfig,
    pub camera: CameraConfig,
    pub intro: IntroConfig,
    pub controls: ControlsConfig,
    pub target_fps: f64,
    pub shadows: ShadowConfig,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            model_url: DEFAULT_MODEL_URL.to_string(),
            decoder_path: DEFAULT_DECODER_PATH.to_string(),
            observe: ObserveOptions::default(),
            renderer: RendererPolicy::default(),
            framing: FramingConfig::default(),
            camera: CameraConfig::default(),
            intro: IntroConfig::default(),
            controls: ControlsConfig::default(),
            target_fps: 60.0,
            shadows: ShadowConfig::default(),
        }
    }
}

impl ViewerConfig {
    pub fn from_json_str(payload: &str) -> Result<Self, ConfigError> {
        let config: ViewerConfig = serde_json::from_str(payload).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let f = &self.framing;
        if !(f.min_scale > 0.0 && f.min_scale <= f.max_scale) {
            return Err(ConfigError::Invalid {
                field: "framing",
                reason: format!("scale range {}..={} is empty", f.min_scale, f.max_scale),
            });
        }
        if !(f.tablet_min_width <= f.desktop_min_width) {
            return Err(ConfigError::Invalid {
                field: "framing",
                reason: "tablet breakpoint is above desktop breakpoint".to_string(),
            });
        }
        if self.intro.frames == 0 {
            return Err(ConfigError::Invalid {
                field: "intro.frames",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(self.target_fps > 0.0) {
            return Err(ConfigError::Invalid {
                field: "target_fps",
                reason: format!("{} is not positive", self.target_fps),
            });
        }
        if !(0.0..=1.0).contains(&self.controls.damping_factor) {
            return Err(ConfigError::Invalid {
                field: "controls.damping_factor",
                reason: format!("{} is outside 0..=1", self.controls.damping_factor),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleCoefficients {
    pub slope: f64,
    pub intercept: f64,
}

/// Orthographic framing: how large the visible area is for a container size.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FramingConfig {
    /// Containers at least this wide are tablets.
    pub tablet_min_width: f64,
    /// Containers at least this wide are desktops.
    pub desktop_min_width: f64,
    pub min_scale: f64,
    pub max_scale: f64,
    pub mobile: ScaleCoefficients,
    pub tablet: ScaleCoefficients,
    pub desktop: ScaleCoefficients,
    pub near: f64,
    pub far: f64,
}

impl Default for FramingConfig {
    fn default() -> Self {
        Self {
            tablet_min_width: 640.0,
            desktop_min_width: 1024.0,
            min_scale: 3.0,
            max_scale: 9.0,
            mobile: ScaleCoefficients {
                slope: 0.006,
                intercept: 3.6,
            },
            tablet: ScaleCoefficients {
                slope: 0.0055,
                intercept: 4.2,
            },
            desktop: ScaleCoefficients {
                slope: 0.005,
                intercept: 4.8,
            },
            near: 0.01,
            far: 50_000.0,
        }
    }
}

/// Where the camera starts and what it looks at.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub target: [f64; 3],
    /// Horizontal distance from the target.
    pub radius: f64,
    /// World-space camera height.
    pub height: f64,
    /// Radians, measured from +Z towards +X.
    pub initial_azimuth: f64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            target: [-0.5, 1.2, 0.0],
            radius: 20.0,
            height: 10.0,
            initial_azimuth: 0.2 * PI,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntroConfig {
    /// Executed frames the fly-in lasts.
    pub frames: u32,
    /// Total azimuth swept, radians.
    pub sweep: f64,
}

impl Default for IntroConfig {
    fn default() -> Self {
        Self {
            frames: 100,
            sweep: 20.0 * PI,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlsConfig {
    pub auto_rotate: bool,
    /// 2.0 is one revolution every 30 seconds at 60 frames per second.
    pub auto_rotate_speed: f64,
    pub damping_factor: f64,
    pub rotate_speed: f64,
    pub min_polar_angle: f64,
    pub max_polar_angle: f64,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            auto_rotate: true,
            auto_rotate_speed: 2.0,
            damping_factor: 0.05,
            rotate_speed: 1.0,
            min_polar_angle: 0.01,
            max_polar_angle: PI - 0.01,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowConfig {
    pub cast: bool,
    pub receive: bool,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        let policy = ShadowPolicy::default();
        Self {
            cast: policy.cast,
            receive: policy.receive,
        }
    }
}

impl From<ShadowConfig> for ShadowPolicy {
    fn from(c: ShadowConfig) -> Self {
        ShadowPolicy {
            cast: c.cast,
            receive: c.receive,
        }
    }
}
