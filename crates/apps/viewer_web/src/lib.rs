use console_error_panic_hook::set_once;
use gloo::events::EventListener;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;

use streaming::cache::AssetCache;
use streaming::loader::ModelLoader;
use viewport::config::ViewerConfig;
use viewport::controller::{LoadTicket, TickOutcome};
use viewport::viewer::ModelViewer;

mod dom;
mod wgpu;
use dom::{ContainerSize, HttpFetcher, IntersectionSource, RafScheduler};
use wgpu::WgpuBackendFactory;

type WebViewer = ModelViewer<WgpuBackendFactory, RafScheduler, IntersectionSource>;

/// Attribute mirroring the viewer status on the container, for page CSS.
const STATUS_ATTRIBUTE: &str = "data-viewer-status";

thread_local! {
    // One decoded-model cache per page, shared by every viewer on it.
    static CACHE: Rc<AssetCache> = Rc::new(AssetCache::new());
}

fn log(msg: &str) {
    web_sys::console::log_1(&JsValue::from_str(msg));
}

struct Host {
    container: web_sys::HtmlElement,
    viewer: RefCell<WebViewer>,
    loader: Rc<ModelLoader<HttpFetcher>>,
    listeners: RefCell<Vec<EventListener>>,
}

impl Host {
    fn new(container: web_sys::HtmlElement, config: ViewerConfig) -> Rc<Self> {
        let cache = CACHE.with(Rc::clone);
        let loader = ModelLoader::new(HttpFetcher, cache)
            .with_decoder_path(config.decoder_path.clone())
            .with_shadows(config.shadows.into());

        let host = Rc::new_cyclic(|weak: &Weak<Host>| {
            let for_frame = weak.clone();
            let scheduler = RafScheduler::new(move |now_ms| {
                if let Some(host) = for_frame.upgrade() {
                    host.on_frame(now_ms);
                }
            });
            let for_visibility = weak.clone();
            let visibility = IntersectionSource::new(container.clone().into(), move || {
                if let Some(host) = for_visibility.upgrade() {
                    host.on_visible();
                }
            });
            let factory = WgpuBackendFactory::new(container.clone());
            Host {
                container: container.clone(),
                viewer: RefCell::new(ModelViewer::attach(config, factory, scheduler, visibility)),
                loader: Rc::new(loader),
                listeners: RefCell::new(Vec::new()),
            }
        });
        host.install_listeners();
        host.publish_status();
        host
    }

    fn install_listeners(self: &Rc<Self>) {
        let mut listeners = Vec::new();

        if let Some(window) = web_sys::window() {
            let host = Rc::downgrade(self);
            listeners.push(EventListener::new(&window, "resize", move |_| {
                if let Some(host) = host.upgrade() {
                    let size = ContainerSize::measure(&host.container);
                    host.viewer.borrow_mut().resize(&size);
                }
            }));
        }

        let host = Rc::downgrade(self);
        listeners.push(EventListener::new(
            &self.container,
            "pointerdown",
            move |event| {
                if let (Some(host), Some(pos)) = (host.upgrade(), pointer_pos(event)) {
                    host.viewer.borrow_mut().pointer_down(pos);
                }
            },
        ));
        let host = Rc::downgrade(self);
        listeners.push(EventListener::new(
            &self.container,
            "pointermove",
            move |event| {
                if let (Some(host), Some(pos)) = (host.upgrade(), pointer_pos(event)) {
                    host.viewer.borrow_mut().pointer_move(pos);
                }
            },
        ));
        for kind in ["pointerup", "pointercancel", "pointerleave"] {
            let host = Rc::downgrade(self);
            listeners.push(EventListener::new(&self.container, kind, move |_| {
                if let Some(host) = host.upgrade() {
                    host.viewer.borrow_mut().pointer_up();
                }
            }));
        }

        *self.listeners.borrow_mut() = listeners;
    }

    fn on_visible(self: &Rc<Self>) {
        let size = ContainerSize::measure(&self.container);
        let activated = self.viewer.borrow_mut().on_visibility(&size);
        match activated {
            Ok(Some(ticket)) => self.start_load(ticket),
            Ok(None) => {}
            Err(err) => log(&format!("viewer init error: {err}")),
        }
        self.publish_status();
    }

    fn start_load(self: &Rc<Self>, ticket: LoadTicket) {
        let host = Rc::downgrade(self);
        let loader = Rc::clone(&self.loader);
        spawn_local(async move {
            let result = loader.load(&ticket.url).await;
            if let Err(err) = &result {
                log(&format!("model load error: {err}"));
            }
            // A detached viewer drops the late result.
            if let Some(host) = host.upgrade() {
                host.viewer.borrow_mut().finish_load(&ticket, result);
                host.publish_status();
            }
        });
    }

    fn on_frame(&self, now_ms: f64) {
        let outcome = self.viewer.borrow_mut().on_frame(now_ms);
        if outcome == TickOutcome::Failed {
            if let Some(err) = self.viewer.borrow().last_error() {
                log(&format!("render error: {err}"));
            }
            self.publish_status();
        }
    }

    fn publish_status(&self) {
        let status = self.viewer.borrow().status();
        if let Err(err) = self
            .container
            .set_attribute(STATUS_ATTRIBUTE, status.as_str())
        {
            log(&format!("failed to publish status {}: {err:?}", status.as_str()));
        }
    }

    fn detach(&self) {
        self.listeners.borrow_mut().clear();
        self.viewer.borrow_mut().detach();
    }
}

fn pointer_pos(event: &web_sys::Event) -> Option<[f64; 2]> {
    let event = event.dyn_ref::<web_sys::MouseEvent>()?;
    Some([event.offset_x() as f64, event.offset_y() as f64])
}

/// JS-side handle for one mounted viewer.
#[wasm_bindgen]
pub struct ViewerHandle {
    host: Rc<Host>,
}

#[wasm_bindgen]
impl ViewerHandle {
    /// Stop observing, cancel the pending frame and release the renderer.
    /// Safe to call more than once.
    pub fn detach(&self) {
        self.host.detach();
    }

    /// `"loading" | "ready" | "error"`.
    pub fn status(&self) -> String {
        self.host.viewer.borrow().status().as_str().to_string()
    }

    pub fn phase(&self) -> String {
        self.host.viewer.borrow().phase().to_string()
    }

    pub fn last_error(&self) -> Option<String> {
        self.host.viewer.borrow().last_error()
    }
}

#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    set_once();
    Ok(())
}

/// Mount a viewer on the element with id `container_id`.
///
/// `config_json` is a `ViewerConfig` in JSON; omitted fields keep their
/// defaults and `None` uses the defaults throughout.
#[wasm_bindgen]
pub fn attach(container_id: &str, config_json: Option<String>) -> Result<ViewerHandle, JsValue> {
    let config = match config_json.as_deref() {
        Some(json) => {
            ViewerConfig::from_json_str(json).map_err(|e| JsValue::from_str(&e.to_string()))?
        }
        None => ViewerConfig::default(),
    };

    let window = web_sys::window().ok_or_else(|| JsValue::from_str("window missing"))?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("document missing"))?;
    let container = document
        .get_element_by_id(container_id)
        .ok_or_else(|| JsValue::from_str("container missing"))?
        .dyn_into::<web_sys::HtmlElement>()?;

    Ok(ViewerHandle {
        host: Host::new(container, config),
    })
}
