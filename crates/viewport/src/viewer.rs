use std::fmt;

use gpu::backend::{BackendFactory, GpuContextError};
use runtime::metrics::Metrics;
use scene::instance::ModelInstance;
use streaming::loader::LoadError;

use crate::config::ViewerConfig;
use crate::controller::{LoadTicket, Phase, TickOutcome, ViewerStatus, ViewportController};
use crate::gate::{VisibilityGate, VisibilitySource};
use crate::ports::{FrameScheduler, SizeSource};

pub const METRIC_FRAMES_RENDERED: &str = "viewer.frames_rendered";
pub const METRIC_FRAMES_SKIPPED: &str = "viewer.frames_skipped";

#[derive(Debug)]
pub enum ViewerError {
    Gpu(GpuContextError),
}

impl fmt::Display for ViewerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewerError::Gpu(err) => write!(f, "renderer could not be created: {err}"),
        }
    }
}

impl std::error::Error for ViewerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ViewerError::Gpu(err) => Some(err),
        }
    }
}

impl From<GpuContextError> for ViewerError {
    fn from(e: GpuContextError) -> Self {
        ViewerError::Gpu(e)
    }
}

/// The attach/detach handle for one container.
///
/// Nothing GPU-related exists until the container is first seen; after
/// `detach` (or drop) nothing renders and late load results are ignored.
pub struct ModelViewer<F, S, V>
where
    F: BackendFactory,
    S: FrameScheduler,
    V: VisibilitySource,
{
    config: ViewerConfig,
    factory: F,
    scheduler: S,
    visibility: V,
    gate: VisibilityGate,
    controller: Option<ViewportController<F::Backend>>,
    status: ViewerStatus,
    generation: u64,
    disposed: bool,
    frame_pending: bool,
    metrics: Metrics,
}

impl<F, S, V> ModelViewer<F, S, V>
where
    F: BackendFactory,
    S: FrameScheduler,
    V: VisibilitySource,
{
    /// Start observing the container. Nothing else happens until it is visible.
    pub fn attach(config: ViewerConfig, factory: F, scheduler: S, mut visibility: V) -> Self {
        let mut gate = VisibilityGate::new(config.observe);
        gate.observe(&mut visibility);
        tracing::debug!(url = %config.model_url, "viewer attached");
        Self {
            config,
            factory,
            scheduler,
            visibility,
            gate,
            controller: None,
            status: ViewerStatus::Loading,
            generation: 1,
            disposed: false,
            frame_pending: false,
            metrics: Metrics::new(),
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        if self.disposed {
            return Phase::Disposed;
        }
        self.controller
            .as_ref()
            .map(ViewportController::phase)
            .unwrap_or(Phase::Uninitialized)
    }

    pub fn status(&self) -> ViewerStatus {
        match &self.controller {
            Some(c) => c.status().clone(),
            None => self.status.clone(),
        }
    }

    pub fn last_error(&self) -> Option<String> {
        match self.status() {
            ViewerStatus::Error(msg) => Some(msg),
            _ => None,
        }
    }

    pub fn controller(&self) -> Option<&ViewportController<F::Backend>> {
        self.controller.as_ref()
    }

    pub fn visibility_mut(&mut self) -> &mut V {
        &mut self.visibility
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Drain visibility samples; on the first qualifying one build the
    /// viewport and return the load to start.
    pub fn on_visibility(
        &mut self,
        size: &impl SizeSource,
    ) -> Result<Option<LoadTicket>, ViewerError> {
        if self.disposed || self.controller.is_some() {
            return Ok(None);
        }
        if !self.gate.pump(&mut self.visibility) {
            return Ok(None);
        }

        match ViewportController::create(&self.config, &mut self.factory, size, self.generation) {
            Ok(controller) => {
                let ticket = controller.load_ticket();
                self.controller = Some(controller);
                tracing::info!(url = %ticket.url, "viewport activated; loading model");
                Ok(Some(ticket))
            }
            Err(err) => {
                tracing::warn!(error = %err, "renderer creation failed");
                self.status = ViewerStatus::Error(err.to_string());
                Err(ViewerError::Gpu(err))
            }
        }
    }

    /// Hand back the result of the load started by `ticket`. Returns whether
    /// it was accepted.
    pub fn finish_load(
        &mut self,
        ticket: &LoadTicket,
        result: Result<ModelInstance, LoadError>,
    ) -> bool {
        if self.disposed || ticket.generation != self.generation {
            tracing::debug!(url = %ticket.url, "load finished after detach; dropped");
            return false;
        }
        let Some(controller) = self.controller.as_mut() else {
            return false;
        };
        let installed = controller.finish_load(ticket, result);
        if installed {
            self.request_frame();
        }
        installed
    }

    /// Animation-frame callback.
    pub fn on_frame(&mut self, now_ms: f64) -> TickOutcome {
        self.frame_pending = false;
        if self.disposed {
            return TickOutcome::Disposed;
        }
        let Some(controller) = self.controller.as_mut() else {
            return TickOutcome::Idle;
        };

        let outcome = controller.tick(now_ms);
        match outcome {
            TickOutcome::Rendered => self.metrics.inc_counter(METRIC_FRAMES_RENDERED, 1),
            TickOutcome::Skipped => self.metrics.inc_counter(METRIC_FRAMES_SKIPPED, 1),
            _ => {}
        }
        if controller.is_animating() {
            self.request_frame();
        }
        outcome
    }

    pub fn resize(&mut self, size: &impl SizeSource) {
        if self.disposed {
            return;
        }
        if let Some(controller) = self.controller.as_mut() {
            controller.resize(size);
        }
    }

    pub fn pointer_down(&mut self, pos_px: [f64; 2]) {
        if let Some(c) = self.controller.as_mut() {
            c.controls_mut().pointer_down(pos_px);
        }
    }

    pub fn pointer_move(&mut self, pos_px: [f64; 2]) {
        if let Some(c) = self.controller.as_mut() {
            c.controls_mut().pointer_move(pos_px);
        }
    }

    pub fn pointer_up(&mut self) {
        if let Some(c) = self.controller.as_mut() {
            c.controls_mut().pointer_up();
        }
    }

    /// Tear everything down. Safe in any state and idempotent.
    pub fn detach(&mut self) {
        if self.disposed {
            return;
        }
        self.scheduler.cancel_frame();
        self.frame_pending = false;
        self.gate.cancel(&mut self.visibility);
        if let Some(mut controller) = self.controller.take() {
            controller.dispose();
        }
        self.generation += 1;
        self.disposed = true;
        tracing::info!(metrics = %self.metrics, "viewer detached");
    }

    fn request_frame(&mut self) {
        if !self.frame_pending {
            self.scheduler.request_frame();
            self.frame_pending = true;
        }
    }
}

impl<F, S, V> Drop for ModelViewer<F, S, V>
where
    F: BackendFactory,
    S: FrameScheduler,
    V: VisibilitySource,
{
    fn drop(&mut self) {
        self.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::OrthographicCamera;
    use crate::gate::tests::FakeVisibility;
    use crate::ports::StaticSize;
    use approx::assert_relative_eq;
    use gpu::backend::{CameraView, RenderBackend};
    use gpu::settings::RendererSettings;
    use pretty_assertions::assert_eq;
    use scene::node::SceneNode;
    use std::cell::RefCell;
    use std::rc::Rc;
    use streaming::cache::AssetCache;
    use streaming::fetch::{AssetFetcher, FetchError};
    use streaming::loader::{DEFAULT_DECODER_PATH, METRIC_DECODE, ModelLoader};

    #[derive(Debug, Default)]
    struct BackendLog {
        created: Vec<RendererSettings>,
        resized: Vec<RendererSettings>,
        models: usize,
        renders: Vec<CameraView>,
        disposed: usize,
        fail_create: bool,
        fail_render: bool,
    }

    struct FakeBackend {
        log: Rc<RefCell<BackendLog>>,
    }

    impl RenderBackend for FakeBackend {
        fn resize(&mut self, settings: &RendererSettings) {
            self.log.borrow_mut().resized.push(*settings);
        }

        fn set_model(&mut self, _model: &ModelInstance) {
            self.log.borrow_mut().models += 1;
        }

        fn render(&mut self, view: &CameraView) -> Result<(), GpuContextError> {
            let mut log = self.log.borrow_mut();
            if log.fail_render {
                return Err(GpuContextError::Surface {
                    reason: "lost".into(),
                });
            }
            log.renders.push(*view);
            Ok(())
        }

        fn dispose(&mut self) {
            self.log.borrow_mut().disposed += 1;
        }
    }

    struct FakeFactory {
        log: Rc<RefCell<BackendLog>>,
    }

    impl BackendFactory for FakeFactory {
        type Backend = FakeBackend;

        fn create(&mut self, settings: &RendererSettings) -> Result<FakeBackend, GpuContextError> {
            let mut log = self.log.borrow_mut();
            if log.fail_create {
                return Err(GpuContextError::Unavailable {
                    reason: "no adapter".into(),
                });
            }
            log.created.push(*settings);
            Ok(FakeBackend {
                log: Rc::clone(&self.log),
            })
        }
    }

    #[derive(Debug, Default)]
    struct SchedulerLog {
        requests: usize,
        cancels: usize,
    }

    struct FakeScheduler {
        log: Rc<RefCell<SchedulerLog>>,
    }

    impl FrameScheduler for FakeScheduler {
        fn request_frame(&mut self) {
            self.log.borrow_mut().requests += 1;
        }

        fn cancel_frame(&mut self) {
            self.log.borrow_mut().cancels += 1;
        }
    }

    type TestViewer = ModelViewer<FakeFactory, FakeScheduler, FakeVisibility>;

    struct Harness {
        viewer: TestViewer,
        backend: Rc<RefCell<BackendLog>>,
        frames: Rc<RefCell<SchedulerLog>>,
    }

    fn harness(config: ViewerConfig) -> Harness {
        let backend = Rc::new(RefCell::new(BackendLog::default()));
        let frames = Rc::new(RefCell::new(SchedulerLog::default()));
        let viewer = ModelViewer::attach(
            config,
            FakeFactory {
                log: Rc::clone(&backend),
            },
            FakeScheduler {
                log: Rc::clone(&frames),
            },
            FakeVisibility::default(),
        );
        Harness {
            viewer,
            backend,
            frames,
        }
    }

    fn model() -> ModelInstance {
        ModelInstance::from_template(&SceneNode::group("root"))
    }

    fn activate(h: &mut Harness, size: &StaticSize) -> LoadTicket {
        h.viewer.visibility_mut().push(0.5, true);
        h.viewer
            .on_visibility(size)
            .expect("backend")
            .expect("gate fired")
    }

    fn ready(h: &mut Harness) {
        let ticket = activate(h, &StaticSize::new(800.0, 600.0));
        assert!(h.viewer.finish_load(&ticket, Ok(model())));
    }

    /// Drive callbacks `step_ms` apart until `executed` frames ran.
    fn run_frames(h: &mut Harness, start_ms: f64, step_ms: f64, executed: usize) -> (f64, usize) {
        let mut now = start_ms;
        let mut callbacks = 0;
        let mut ran = 0;
        while ran < executed {
            if h.viewer.on_frame(now) == TickOutcome::Rendered {
                ran += 1;
            }
            callbacks += 1;
            now += step_ms;
        }
        (now, callbacks)
    }

    #[test]
    fn attach_observes_with_configured_options() {
        let h = harness(ViewerConfig::default());
        let observed = h.viewer.visibility.observed.expect("observing");
        assert_eq!(observed.threshold, 0.1);
        assert_eq!(observed.root_margin(), "50px");
        assert_eq!(h.viewer.phase(), Phase::Uninitialized);
        assert_eq!(h.viewer.status(), ViewerStatus::Loading);
    }

    #[test]
    fn never_visible_builds_nothing() {
        let mut h = harness(ViewerConfig::default());
        h.viewer.visibility_mut().push(0.05, true);
        h.viewer.visibility_mut().push(0.9, false);
        let ticket = h
            .viewer
            .on_visibility(&StaticSize::new(800.0, 600.0))
            .expect("no error");
        assert!(ticket.is_none());
        assert!(h.backend.borrow().created.is_empty());
        assert!(h.viewer.controller().is_none());
        assert_eq!(h.viewer.on_frame(0.0), TickOutcome::Idle);
    }

    #[test]
    fn activation_builds_viewport_and_issues_ticket() {
        let mut h = harness(ViewerConfig::default());
        let size = StaticSize {
            width: 500.0,
            height: 400.0,
            device_pixel_ratio: 3.0,
        };
        let ticket = activate(&mut h, &size);

        assert_eq!(ticket.url, ViewerConfig::default().model_url);
        assert_eq!(h.viewer.phase(), Phase::Loading);
        assert_eq!(h.viewer.visibility.disconnects, 1);

        let created = h.backend.borrow().created.clone();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].pixel_ratio, 2.0);
        assert!(!created[0].antialias);
        assert_eq!((created[0].surface_width, created[0].surface_height), (1000, 800));

        // The gate never fires twice.
        h.viewer.visibility_mut().push(1.0, true);
        assert!(h.viewer.on_visibility(&size).expect("ok").is_none());
        assert_eq!(h.backend.borrow().created.len(), 1);
    }

    #[test]
    fn initial_camera_pose() {
        let mut h = harness(ViewerConfig::default());
        activate(&mut h, &StaticSize::new(800.0, 600.0));
        let cam = h.viewer.controller().expect("controller").camera();
        let az = 0.2 * std::f64::consts::PI;
        assert_relative_eq!(cam.position.x, -0.5 + 20.0 * az.sin(), epsilon = 1e-12);
        assert_relative_eq!(cam.position.y, 10.0);
        assert_relative_eq!(cam.position.z, 20.0 * az.cos(), epsilon = 1e-12);
        assert_eq!(cam.target, foundation::math::Vec3::new(-0.5, 1.2, 0.0));
        assert_eq!(cam.near, 0.01);
        assert_eq!(cam.far, 50_000.0);
    }

    #[test]
    fn load_success_starts_intro_and_requests_frame() {
        let mut h = harness(ViewerConfig::default());
        ready(&mut h);
        assert_eq!(h.viewer.phase(), Phase::IntroAnimating);
        assert_eq!(h.viewer.status(), ViewerStatus::Ready);
        assert_eq!(h.backend.borrow().models, 1);
        assert_eq!(h.frames.borrow().requests, 1);
    }

    #[test]
    fn intro_takes_exactly_100_executed_frames() {
        let mut h = harness(ViewerConfig::default());
        ready(&mut h);

        let (now, _) = run_frames(&mut h, 0.0, 17.0, 99);
        assert_eq!(h.viewer.phase(), Phase::IntroAnimating);
        assert_eq!(h.viewer.controller().expect("c").frame_count(), 99);

        run_frames(&mut h, now, 17.0, 1);
        assert_eq!(h.viewer.phase(), Phase::Orbiting);
        assert_eq!(h.viewer.controller().expect("c").frame_count(), 100);
        assert_eq!(h.backend.borrow().renders.len(), 100);
    }

    #[test]
    fn fast_displays_still_need_100_executed_frames() {
        let mut h = harness(ViewerConfig::default());
        ready(&mut h);

        let (_, callbacks) = run_frames(&mut h, 0.0, 1000.0 / 120.0 + 0.01, 100);
        assert_eq!(h.viewer.phase(), Phase::Orbiting);
        assert!(callbacks >= 199, "only {callbacks} callbacks");
        assert_eq!(h.viewer.metrics().counter(METRIC_FRAMES_RENDERED), 100);
        assert!(h.viewer.metrics().counter(METRIC_FRAMES_SKIPPED) >= 99);
    }

    #[test]
    fn intro_ends_where_it_started() {
        let mut h = harness(ViewerConfig::default());
        ready(&mut h);
        let start = h.viewer.controller().expect("c").camera().position;
        run_frames(&mut h, 0.0, 17.0, 100);
        let end = h.viewer.controller().expect("c").camera().position;
        // 20π sweep is ten full turns.
        assert_relative_eq!(start.x, end.x, epsilon = 1e-9);
        assert_relative_eq!(start.z, end.z, epsilon = 1e-9);
    }

    #[test]
    fn orbiting_keeps_moving_and_requesting_frames() {
        let mut h = harness(ViewerConfig::default());
        ready(&mut h);
        let (now, _) = run_frames(&mut h, 0.0, 17.0, 100);
        let before = h.viewer.controller().expect("c").camera().position;
        let requests = h.frames.borrow().requests;
        run_frames(&mut h, now, 17.0, 10);
        let after = h.viewer.controller().expect("c").camera().position;
        assert_ne!(before, after);
        assert!(h.frames.borrow().requests > requests);
    }

    #[test]
    fn load_failure_shows_error_and_renders_nothing() {
        let mut h = harness(ViewerConfig::default());
        let ticket = activate(&mut h, &StaticSize::new(800.0, 600.0));
        let err = LoadError::Fetch {
            url: ticket.url.clone(),
            source: FetchError::Status {
                url: ticket.url.clone(),
                status: 404,
            },
        };
        assert!(!h.viewer.finish_load(&ticket, Err(err)));

        assert_eq!(h.viewer.phase(), Phase::Loading);
        assert_eq!(h.viewer.status().as_str(), "error");
        assert!(h.viewer.last_error().expect("message").contains("404"));
        assert_eq!(h.viewer.on_frame(0.0), TickOutcome::Idle);
        assert!(h.backend.borrow().renders.is_empty());
        assert_eq!(h.frames.borrow().requests, 0);
    }

    #[test]
    fn backend_failure_surfaces_as_error() {
        let mut h = harness(ViewerConfig::default());
        h.backend.borrow_mut().fail_create = true;
        h.viewer.visibility_mut().push(1.0, true);
        let err = h
            .viewer
            .on_visibility(&StaticSize::new(800.0, 600.0))
            .expect_err("gpu");
        assert!(matches!(err, ViewerError::Gpu(_)));
        assert!(h.viewer.controller().is_none());
        assert_eq!(h.viewer.status().as_str(), "error");
    }

    #[test]
    fn render_failure_stops_the_loop() {
        let mut h = harness(ViewerConfig::default());
        ready(&mut h);
        h.backend.borrow_mut().fail_render = true;
        let requests = h.frames.borrow().requests;
        assert_eq!(h.viewer.on_frame(0.0), TickOutcome::Failed);
        assert_eq!(h.frames.borrow().requests, requests);
        assert_eq!(h.viewer.on_frame(100.0), TickOutcome::Idle);
    }

    #[test]
    fn detach_mid_load_discards_late_result() {
        let mut h = harness(ViewerConfig::default());
        let ticket = activate(&mut h, &StaticSize::new(800.0, 600.0));

        h.viewer.detach();
        assert_eq!(h.viewer.phase(), Phase::Disposed);
        assert_eq!(h.backend.borrow().disposed, 1);
        assert_eq!(h.frames.borrow().cancels, 1);

        assert!(!h.viewer.finish_load(&ticket, Ok(model())));
        assert_eq!(h.viewer.on_frame(16.0), TickOutcome::Disposed);
        assert!(h.backend.borrow().renders.is_empty());
        assert_eq!(h.backend.borrow().models, 0);
    }

    #[test]
    fn detach_is_idempotent_and_runs_on_drop() {
        let mut h = harness(ViewerConfig::default());
        ready(&mut h);
        h.viewer.detach();
        h.viewer.detach();
        assert_eq!(h.backend.borrow().disposed, 1);

        let mut other = harness(ViewerConfig::default());
        ready(&mut other);
        let log = Rc::clone(&other.backend);
        drop(other);
        assert_eq!(log.borrow().disposed, 1);
    }

    #[test]
    fn detach_before_activation_stops_observing() {
        let mut h = harness(ViewerConfig::default());
        h.viewer.detach();
        assert_eq!(h.viewer.visibility.disconnects, 1);
        h.viewer.visibility_mut().push(1.0, true);
        let ticket = h
            .viewer
            .on_visibility(&StaticSize::new(800.0, 600.0))
            .expect("ok");
        assert!(ticket.is_none());
        assert!(h.backend.borrow().created.is_empty());
    }

    #[test]
    fn resize_matches_fresh_construction() {
        let config = ViewerConfig::default();
        let sizes = [
            (300.0, 300.0),
            (900.0, 300.0),
            (320.0, 640.0),
            (1280.0, 720.0),
            (700.0, 1000.0),
            (2560.0, 1440.0),
            (1.0, 1.0),
        ];
        let mut h = harness(config.clone());
        activate(&mut h, &StaticSize::new(640.0, 480.0));

        for (w, h_px) in sizes {
            h.viewer.resize(&StaticSize::new(w, h_px));
            let resized = h.viewer.controller().expect("c").camera().extents;
            let fresh = OrthographicCamera::framed(&config.framing, w, h_px).extents;
            assert_eq!(resized, fresh, "size {w}x{h_px}");
        }
        assert_eq!(h.backend.borrow().resized.len(), sizes.len());
    }

    #[test]
    fn widening_a_square_container_keeps_y_at_scale() {
        let mut h = harness(ViewerConfig::default());
        activate(&mut h, &StaticSize::new(300.0, 300.0));
        let square = h.viewer.controller().expect("c").camera().extents;
        assert_relative_eq!(square.half_x, square.half_y);

        h.viewer.resize(&StaticSize::new(900.0, 300.0));
        let wide = h.viewer.controller().expect("c").camera().extents;
        // 900 wide is a tablet: 0.0055 * 300 + 4.2.
        let scale = 0.0055 * 300.0 + 4.2;
        assert_relative_eq!(wide.half_y, scale);
        assert_relative_eq!(wide.half_x, scale * 3.0);
    }

    #[test]
    fn resize_is_ignored_before_activation_and_after_detach() {
        let mut h = harness(ViewerConfig::default());
        h.viewer.resize(&StaticSize::new(100.0, 100.0));
        assert!(h.backend.borrow().resized.is_empty());

        activate(&mut h, &StaticSize::new(800.0, 600.0));
        h.viewer.detach();
        h.viewer.resize(&StaticSize::new(100.0, 100.0));
        assert!(h.backend.borrow().resized.is_empty());
    }

    #[test]
    fn pointer_input_waits_for_orbit_phase() {
        let mut h = harness(ViewerConfig::default());
        ready(&mut h);
        h.viewer.pointer_down([0.0, 0.0]);
        assert!(!h.viewer.controller().expect("c").controls().is_dragging());

        run_frames(&mut h, 0.0, 17.0, 100);
        h.viewer.pointer_down([0.0, 0.0]);
        assert!(h.viewer.controller().expect("c").controls().is_dragging());
        h.viewer.pointer_up();
        assert!(!h.viewer.controller().expect("c").controls().is_dragging());
    }

    /// Serves one encoded model and the decoder module. Every response is
    /// delayed by one poll, like a network round trip.
    struct ModelServer {
        model: Vec<u8>,
    }

    impl AssetFetcher for ModelServer {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
            let mut yielded = false;
            futures_util::future::poll_fn(|cx| {
                if yielded {
                    std::task::Poll::Ready(())
                } else {
                    yielded = true;
                    cx.waker().wake_by_ref();
                    std::task::Poll::Pending
                }
            })
            .await;

            if url == DEFAULT_DECODER_PATH {
                let module = formats::DecoderModule::current()
                    .to_json_pretty()
                    .map_err(|e| FetchError::Network {
                        url: url.to_string(),
                        reason: e.to_string(),
                    })?;
                return Ok(module.into_bytes());
            }
            if url == ViewerConfig::default().model_url {
                return Ok(self.model.clone());
            }
            Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
        }
    }

    #[test]
    fn two_viewers_share_one_cached_model() {
        let scene = SceneNode::group("root").with_child(SceneNode::mesh(
            "tri",
            scene::node::Mesh::new(
                scene::components::Geometry::new(
                    vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
                    vec![0, 1, 2],
                ),
                scene::components::Material::default(),
            ),
        ));
        let model = formats::encode_model(&scene, formats::EncodeOptions::default())
            .expect("encode");
        let cache = Rc::new(AssetCache::new());
        let loader = ModelLoader::new(ModelServer { model }, Rc::clone(&cache));

        let mut a = harness(ViewerConfig::default());
        let mut b = harness(ViewerConfig::default());
        let ta = activate(&mut a, &StaticSize::new(800.0, 600.0));
        let tb = activate(&mut b, &StaticSize::new(400.0, 400.0));

        let (ra, rb) = pollster::block_on(futures_util::future::join(
            loader.load(&ta.url),
            loader.load(&tb.url),
        ));
        assert!(a.viewer.finish_load(&ta, ra));
        assert!(b.viewer.finish_load(&tb, rb));

        // Both loads were in flight together; each decoded, one entry kept.
        assert_eq!(loader.metrics().counter(METRIC_DECODE), 2);
        assert_eq!(cache.len(), 1);
        let ma = a.viewer.controller().and_then(|c| c.model()).expect("model a");
        let mb = b.viewer.controller().and_then(|c| c.model()).expect("model b");
        assert_eq!(ma, mb);
        let positions = |m: &ModelInstance| {
            m.root.meshes().next().map(|mesh| mesh.geometry.positions.as_ptr())
        };
        assert_ne!(positions(ma), positions(mb));
        assert_eq!(a.viewer.on_frame(0.0), TickOutcome::Rendered);
        assert_eq!(b.viewer.on_frame(0.0), TickOutcome::Rendered);
    }
}
