use serde::{Deserialize, Serialize};

/// IntersectionObserver options.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserveOptions {
    /// Minimum visible fraction of the container.
    pub threshold: f64,
    /// Grows the viewport by this many pixels on every side.
    pub root_margin_px: u32,
}

impl Default for ObserveOptions {
    fn default() -> Self {
        Self {
            threshold: 0.1,
            root_margin_px: 50,
        }
    }
}

impl ObserveOptions {
    /// CSS `rootMargin` value.
    pub fn root_margin(&self) -> String {
        format!("{}px", self.root_margin_px)
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct IntersectionSample {
    pub ratio: f64,
    pub is_intersecting: bool,
}

impl IntersectionSample {
    pub fn qualifies(&self, options: &ObserveOptions) -> bool {
        self.is_intersecting && self.ratio >= options.threshold
    }
}

/// Visibility signal for one container.
pub trait VisibilitySource {
    fn observe(&mut self, options: &ObserveOptions);
    /// Samples delivered since the last call, oldest first.
    fn take_samples(&mut self) -> Vec<IntersectionSample>;
    fn disconnect(&mut self);
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum GateState {
    Idle,
    Observing,
    Fired,
    Cancelled,
}

/// Fires exactly once, on the first qualifying intersection, then stops observing.
#[derive(Debug, Clone)]
pub struct VisibilityGate {
    options: ObserveOptions,
    state: GateState,
}

impl VisibilityGate {
    pub fn new(options: ObserveOptions) -> Self {
        Self {
            options,
            state: GateState::Idle,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn observe(&mut self, source: &mut impl VisibilitySource) {
        if self.state == GateState::Idle {
            source.observe(&self.options);
            self.state = GateState::Observing;
        }
    }

    /// Drain pending samples; `true` exactly once, when the gate fires.
    pub fn pump(&mut self, source: &mut impl VisibilitySource) -> bool {
        if self.state != GateState::Observing {
            return false;
        }
        let fired = source
            .take_samples()
            .iter()
            .any(|s| s.qualifies(&self.options));
        if fired {
            source.disconnect();
            self.state = GateState::Fired;
            tracing::debug!("visibility gate fired");
        }
        fired
    }

    /// Stop observing without firing.
    pub fn cancel(&mut self, source: &mut impl VisibilitySource) {
        if self.state == GateState::Observing {
            source.disconnect();
        }
        if self.state != GateState::Fired {
            self.state = GateState::Cancelled;
        }
    }
}
