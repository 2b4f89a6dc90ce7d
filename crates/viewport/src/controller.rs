use std::fmt;

use foundation::math::Vec3;
use gpu::backend::{BackendFactory, GpuContextError, RenderBackend};
use gpu::settings::RendererSettings;
use runtime::throttle::FrameThrottle;
use scene::instance::ModelInstance;
use streaming::loader::LoadError;

use crate::camera::{OrbitPose, OrthographicCamera, frame_extents};
use crate::config::ViewerConfig;
use crate::controls::OrbitControls;
use crate::intro::IntroAnimation;
use crate::ports::SizeSource;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Loading,
    IntroAnimating,
    Orbiting,
    Disposed,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Uninitialized => "uninitialized",
            Phase::Loading => "loading",
            Phase::IntroAnimating => "intro",
            Phase::Orbiting => "orbiting",
            Phase::Disposed => "disposed",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the page shows around the canvas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerStatus {
    Loading,
    Ready,
    Error(String),
}

impl ViewerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewerStatus::Loading => "loading",
            ViewerStatus::Ready => "ready",
            ViewerStatus::Error(_) => "error",
        }
    }
}

/// Handed out when loading starts; the load result must come back with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    pub generation: u64,
    pub url: String,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Throttled: too soon after the previous executed frame.
    Skipped,
    /// Nothing to draw in the current state.
    Idle,
    Rendered,
    /// The backend is still setting up; nothing advanced.
    Pending,
    /// The backend failed; the loop stops.
    Failed,
    Disposed,
}

/// Renderer, camera and controls for one container, plus the phase machine
/// that drives them.
pub struct ViewportController<B: RenderBackend> {
    config: ViewerConfig,
    renderer: Option<B>,
    settings: RendererSettings,
    camera: OrthographicCamera,
    controls: OrbitControls,
    intro: IntroAnimation,
    throttle: FrameThrottle,
    target: Vec3,
    model: Option<ModelInstance>,
    phase: Phase,
    status: ViewerStatus,
    generation: u64,
}

impl<B: RenderBackend> ViewportController<B> {
    /// Build everything for a container of the given size. Starts in `Loading`.
    pub fn create<F>(
        config: &ViewerConfig,
        factory: &mut F,
        size: &impl SizeSource,
        generation: u64,
    ) -> Result<Self, GpuContextError>
    where
        F: BackendFactory<Backend = B>,
    {
        let (width, height) = size.size();
        let settings =
            RendererSettings::resolve(&config.renderer, width, height, size.device_pixel_ratio());
        let renderer = factory.create(&settings)?;
        Ok(Self::new(config, renderer, settings, generation))
    }

    pub fn new(
        config: &ViewerConfig,
        renderer: B,
        settings: RendererSettings,
        generation: u64,
    ) -> Self {
        let [tx, ty, tz] = config.camera.target;
        let target = Vec3::new(tx, ty, tz);

        let mut camera =
            OrthographicCamera::framed(&config.framing, settings.css_width, settings.css_height);
        let pose = OrbitPose {
            azimuth: config.camera.initial_azimuth,
            radius: config.camera.radius,
            height: config.camera.height,
        };
        camera.position = pose.position(target);
        camera.look_at(target);

        let mut controls = OrbitControls::new(config.controls, target);
        controls.set_viewport_height(settings.css_height);
        // Input is ignored until the intro hands over.
        controls.enabled = false;

        tracing::debug!(
            width = settings.css_width,
            height = settings.css_height,
            pixel_ratio = settings.pixel_ratio,
            antialias = settings.antialias,
            "viewport created"
        );

        Self {
            config: config.clone(),
            renderer: Some(renderer),
            settings,
            camera,
            controls,
            intro: IntroAnimation::new(config.intro, pose),
            throttle: FrameThrottle::new(config.target_fps),
            target,
            model: None,
            phase: Phase::Loading,
            status: ViewerStatus::Loading,
            generation,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn status(&self) -> &ViewerStatus {
        &self.status
    }

    pub fn camera(&self) -> &OrthographicCamera {
        &self.camera
    }

    pub fn controls(&self) -> &OrbitControls {
        &self.controls
    }

    pub fn controls_mut(&mut self) -> &mut OrbitControls {
        &mut self.controls
    }

    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    pub fn model(&self) -> Option<&ModelInstance> {
        self.model.as_ref()
    }

    pub fn renderer(&self) -> Option<&B> {
        self.renderer.as_ref()
    }

    pub fn frame_count(&self) -> u32 {
        self.intro.frame_count()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn load_ticket(&self) -> LoadTicket {
        LoadTicket {
            generation: self.generation,
            url: self.config.model_url.clone(),
        }
    }

    /// True while frames should keep being requested.
    pub fn is_animating(&self) -> bool {
        matches!(self.phase, Phase::IntroAnimating | Phase::Orbiting)
            && !matches!(self.status, ViewerStatus::Error(_))
    }

    /// Accept the outcome of a load. Returns whether the model was installed.
    pub fn finish_load(
        &mut self,
        ticket: &LoadTicket,
        result: Result<ModelInstance, LoadError>,
    ) -> bool {
        if ticket.generation != self.generation || self.phase != Phase::Loading {
            tracing::debug!(url = %ticket.url, phase = ?self.phase, "stale load result dropped");
            return false;
        }

        match result {
            Ok(model) => {
                let Some(renderer) = self.renderer.as_mut() else {
                    return false;
                };
                renderer.set_model(&model);
                self.model = Some(model);
                self.phase = Phase::IntroAnimating;
                self.status = ViewerStatus::Ready;
                tracing::info!(url = %ticket.url, "model ready; starting intro");
                true
            }
            Err(err) => {
                tracing::warn!(url = %ticket.url, error = %err, "model failed to load");
                self.status = ViewerStatus::Error(err.to_string());
                false
            }
        }
    }

    /// One animation-frame callback at host time `now_ms`.
    pub fn tick(&mut self, now_ms: f64) -> TickOutcome {
        if self.phase == Phase::Disposed {
            return TickOutcome::Disposed;
        }
        if !self.is_animating() {
            return TickOutcome::Idle;
        }
        if !self.renderer.as_ref().is_some_and(|r| r.is_ready()) {
            return TickOutcome::Pending;
        }
        if self.throttle.poll(now_ms).is_none() {
            return TickOutcome::Skipped;
        }

        match self.phase {
            Phase::IntroAnimating => {
                let pose = self.intro.step();
                self.camera.position = pose.position(self.target);
                self.camera.look_at(self.target);
                if self.intro.is_finished() {
                    self.phase = Phase::Orbiting;
                    self.controls.enabled = true;
                    self.controls.sync();
                    tracing::debug!(frames = self.intro.frame_count(), "intro finished");
                }
            }
            Phase::Orbiting => {
                self.controls.update(&mut self.camera);
            }
            _ => {}
        }

        let view = self.camera.camera_view();
        let Some(renderer) = self.renderer.as_mut() else {
            return TickOutcome::Idle;
        };
        match renderer.render(&view) {
            Ok(()) => TickOutcome::Rendered,
            Err(err) => {
                tracing::warn!(error = %err, "render failed; stopping loop");
                self.status = ViewerStatus::Error(err.to_string());
                TickOutcome::Failed
            }
        }
    }

    /// Same framing as construction at the new size.
    pub fn resize(&mut self, size: &impl SizeSource) {
        if self.phase == Phase::Disposed {
            return;
        }
        let (width, height) = size.size();
        if !(width > 0.0 && height > 0.0) {
            tracing::debug!(width, height, "ignoring resize to empty container");
            return;
        }

        self.settings = RendererSettings::resolve(
            &self.config.renderer,
            width,
            height,
            size.device_pixel_ratio(),
        );
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.resize(&self.settings);
        }
        self.camera.extents = frame_extents(&self.config.framing, width, height);
        self.controls.set_viewport_height(height);
    }

    /// Release the renderer and the model. Idempotent.
    pub fn dispose(&mut self) {
        if let Some(mut renderer) = self.renderer.take() {
            renderer.dispose();
        }
        self.model = None;
        self.phase = Phase::Disposed;
    }
}
