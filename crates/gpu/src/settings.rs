use serde::{Deserialize, Serialize};

/// Device-pixel-ratio handling for the drawing surface.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererPolicy {
    /// Upper bound on the pixel ratio used for the surface.
    pub max_pixel_ratio: f64,
    /// Anti-aliasing is enabled only when the device pixel ratio is at most this.
    pub antialias_max_ratio: f64,
}

impl Default for RendererPolicy {
    fn default() -> Self {
        Self {
            max_pixel_ratio: 2.0,
            antialias_max_ratio: 1.0,
        }
    }
}

/// Surface configuration derived from the container size and the device.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RendererSettings {
    pub css_width: f64,
    pub css_height: f64,
    pub pixel_ratio: f64,
    pub antialias: bool,
    /// Surface size in physical pixels (never 0).
    pub surface_width: u32,
    pub surface_height: u32,
}

impl RendererSettings {
    pub fn resolve(policy: &RendererPolicy, css_width: f64, css_height: f64, dpr: f64) -> Self {
        let dpr = if dpr.is_finite() && dpr > 0.0 { dpr } else { 1.0 };
        let pixel_ratio = dpr.min(policy.max_pixel_ratio);
        let px = |css: f64| (css.max(0.0) * pixel_ratio).round().max(1.0) as u32;
        Self {
            css_width,
            css_height,
            pixel_ratio,
            antialias: dpr <= policy.antialias_max_ratio,
            surface_width: px(css_width),
            surface_height: px(css_height),
        }
    }
}
