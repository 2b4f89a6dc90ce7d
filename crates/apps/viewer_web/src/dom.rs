use std::cell::RefCell;
use std::rc::Rc;

use gloo::render::{AnimationFrame, request_animation_frame};
use gloo_net::http::Request;
use streaming::fetch::{AssetFetcher, FetchError};
use viewport::gate::{IntersectionSample, ObserveOptions, VisibilitySource};
use viewport::ports::{FrameScheduler, SizeSource};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{IntersectionObserver, IntersectionObserverEntry, IntersectionObserverInit};

/// Container size read once from layout.
#[derive(Debug, Copy, Clone)]
pub struct ContainerSize {
    width: f64,
    height: f64,
    dpr: f64,
}

impl ContainerSize {
    pub fn measure(container: &web_sys::HtmlElement) -> Self {
        let dpr = web_sys::window()
            .map(|w| w.device_pixel_ratio())
            .unwrap_or(1.0);
        Self {
            width: container.client_width() as f64,
            height: container.client_height() as f64,
            dpr,
        }
    }
}

impl SizeSource for ContainerSize {
    fn size(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    fn device_pixel_ratio(&self) -> f64 {
        self.dpr
    }
}

/// `requestAnimationFrame`, one pending callback at a time.
pub struct RafScheduler {
    on_frame: Rc<dyn Fn(f64)>,
    handle: Rc<RefCell<Option<AnimationFrame>>>,
}

impl RafScheduler {
    pub fn new(on_frame: impl Fn(f64) + 'static) -> Self {
        Self {
            on_frame: Rc::new(on_frame),
            handle: Rc::new(RefCell::new(None)),
        }
    }
}

impl FrameScheduler for RafScheduler {
    fn request_frame(&mut self) {
        if self.handle.borrow().is_some() {
            return;
        }
        let on_frame = Rc::clone(&self.on_frame);
        let slot = Rc::clone(&self.handle);
        let handle = request_animation_frame(move |now_ms| {
            slot.borrow_mut().take();
            on_frame(now_ms);
        });
        *self.handle.borrow_mut() = Some(handle);
    }

    fn cancel_frame(&mut self) {
        // Dropping the handle cancels the request.
        self.handle.borrow_mut().take();
    }
}

type ObserverCallback = Closure<dyn FnMut(js_sys::Array, IntersectionObserver)>;

/// IntersectionObserver on the container. Entries are queued and `notify`
/// is called so the owner can pump them.
pub struct IntersectionSource {
    target: web_sys::Element,
    pending: Rc<RefCell<Vec<IntersectionSample>>>,
    notify: Rc<dyn Fn()>,
    observer: Option<IntersectionObserver>,
    // Kept alive until the source drops; the observer may still be
    // dispatching into it when `disconnect` runs.
    _callback: Option<ObserverCallback>,
}

impl IntersectionSource {
    pub fn new(target: web_sys::Element, notify: impl Fn() + 'static) -> Self {
        Self {
            target,
            pending: Rc::new(RefCell::new(Vec::new())),
            notify: Rc::new(notify),
            observer: None,
            _callback: None,
        }
    }
}

impl VisibilitySource for IntersectionSource {
    fn observe(&mut self, options: &ObserveOptions) {
        let pending = Rc::clone(&self.pending);
        let notify = Rc::clone(&self.notify);
        let callback: ObserverCallback = Closure::wrap(Box::new(
            move |entries: js_sys::Array, _observer: IntersectionObserver| {
                {
                    let mut pending = pending.borrow_mut();
                    for entry in entries.iter() {
                        if let Ok(entry) = entry.dyn_into::<IntersectionObserverEntry>() {
                            pending.push(IntersectionSample {
                                ratio: entry.intersection_ratio(),
                                is_intersecting: entry.is_intersecting(),
                            });
                        }
                    }
                }
                notify();
            },
        )
            as Box<dyn FnMut(js_sys::Array, IntersectionObserver)>);

        let init = IntersectionObserverInit::new();
        init.set_threshold(&JsValue::from_f64(options.threshold));
        init.set_root_margin(&options.root_margin());
        match IntersectionObserver::new_with_options(callback.as_ref().unchecked_ref(), &init) {
            Ok(observer) => {
                observer.observe(&self.target);
                self.observer = Some(observer);
            }
            Err(err) => {
                web_sys::console::log_1(&JsValue::from_str(&format!(
                    "IntersectionObserver unavailable: {err:?}"
                )));
            }
        }
        self._callback = Some(callback);
    }

    fn take_samples(&mut self) -> Vec<IntersectionSample> {
        std::mem::take(&mut *self.pending.borrow_mut())
    }

    fn disconnect(&mut self) {
        if let Some(observer) = self.observer.take() {
            observer.disconnect();
        }
    }
}

impl Drop for IntersectionSource {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// `gloo-net` fetcher for model and decoder module bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpFetcher;

impl AssetFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let network = |reason: String| FetchError::Network {
            url: url.to_string(),
            reason,
        };
        let resp = Request::get(url)
            .send()
            .await
            .map_err(|e| network(e.to_string()))?;
        if !resp.ok() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: resp.status(),
            });
        }
        resp.binary().await.map_err(|e| network(e.to_string()))
    }
}
