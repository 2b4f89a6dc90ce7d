use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use formats::decoder::{DecoderModule, ModelDecoder};
use formats::model_codec::DecodeError;
use runtime::metrics::Metrics;
use scene::instance::ModelInstance;
use scene::optimize::{ShadowPolicy, optimize};

use crate::cache::AssetCache;
use crate::fetch::{AssetFetcher, FetchError};

pub const DEFAULT_DECODER_PATH: &str = "/decoder/decoder.json";

pub const METRIC_CACHE_HIT: &str = "model.cache_hit";
pub const METRIC_DECODE: &str = "model.decode";
pub const METRIC_LOAD_ERROR: &str = "model.load_error";
pub const METRIC_CACHE_ENTRIES: &str = "model.cache_entries";

#[derive(Debug)]
pub enum LoadError {
    Fetch { url: String, source: FetchError },
    Decode { url: String, source: DecodeError },
}

impl LoadError {
    pub fn url(&self) -> &str {
        match self {
            LoadError::Fetch { url, .. } | LoadError::Decode { url, .. } => url,
        }
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Fetch { url, source } => write!(f, "failed to fetch {url}: {source}"),
            LoadError::Decode { url, source } => write!(f, "failed to decode {url}: {source}"),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Fetch { source, .. } => Some(source),
            LoadError::Decode { source, .. } => Some(source),
        }
    }
}

/// Turns model URLs into independent [`ModelInstance`]s.
///
/// A cached template is cloned directly. Otherwise the bytes are fetched,
/// decoded, optimized and stored before cloning. The decoder module is
/// fetched from `decoder_path` the first time a decode is needed.
pub struct ModelLoader<F: AssetFetcher> {
    fetcher: F,
    cache: Rc<AssetCache>,
    decoder: RefCell<ModelDecoder>,
    decoder_path: String,
    shadows: ShadowPolicy,
    metrics: RefCell<Metrics>,
}

impl<F: AssetFetcher> ModelLoader<F> {
    pub fn new(fetcher: F, cache: Rc<AssetCache>) -> Self {
        Self {
            fetcher,
            cache,
            decoder: RefCell::new(ModelDecoder::new()),
            decoder_path: DEFAULT_DECODER_PATH.to_string(),
            shadows: ShadowPolicy::default(),
            metrics: RefCell::new(Metrics::new()),
        }
    }

    pub fn with_decoder_path(mut self, path: impl Into<String>) -> Self {
        self.decoder_path = path.into();
        self
    }

    pub fn with_shadows(mut self, shadows: ShadowPolicy) -> Self {
        self.shadows = shadows;
        self
    }

    pub fn cache(&self) -> &Rc<AssetCache> {
        &self.cache
    }

    pub fn metrics(&self) -> Metrics {
        self.metrics.borrow().clone()
    }

    pub async fn load(&self, url: &str) -> Result<ModelInstance, LoadError> {
        if let Some(template) = self.cache.get(url) {
            tracing::debug!(url = %url, "model cache hit");
            self.metrics.borrow_mut().inc_counter(METRIC_CACHE_HIT, 1);
            return Ok(ModelInstance::from_template(&template));
        }

        match self.load_uncached(url).await {
            Ok(instance) => Ok(instance),
            Err(err) => {
                tracing::warn!(url = %err.url(), error = %err, "model load failed");
                self.metrics.borrow_mut().inc_counter(METRIC_LOAD_ERROR, 1);
                Err(err)
            }
        }
    }

    async fn load_uncached(&self, url: &str) -> Result<ModelInstance, LoadError> {
        self.ensure_decoder().await?;

        let bytes = self
            .fetcher
            .fetch(url)
            .await
            .map_err(|source| LoadError::Fetch {
                url: url.to_string(),
                source,
            })?;

        let raw = self
            .decoder
            .borrow()
            .decode(&bytes)
            .map_err(|source| LoadError::Decode {
                url: url.to_string(),
                source,
            })?;
        self.metrics.borrow_mut().inc_counter(METRIC_DECODE, 1);

        let optimized = optimize(&raw, self.shadows);
        let template = self.cache.put(url, optimized);
        self.metrics
            .borrow_mut()
            .set_gauge(METRIC_CACHE_ENTRIES, self.cache.len() as i64);
        tracing::info!(
            url = %url,
            bytes = bytes.len(),
            meshes = template.mesh_count(),
            "model decoded and cached"
        );
        Ok(ModelInstance::from_template(&template))
    }

    async fn ensure_decoder(&self) -> Result<(), LoadError> {
        if self.decoder.borrow().is_configured() {
            return Ok(());
        }

        let path = self.decoder_path.clone();
        let bytes = self
            .fetcher
            .fetch(&path)
            .await
            .map_err(|source| LoadError::Fetch {
                url: path.clone(),
                source,
            })?;

        // Another load may have configured the decoder while this one waited.
        if self.decoder.borrow().is_configured() {
            return Ok(());
        }

        let module = DecoderModule::from_json_slice(&bytes).map_err(|source| LoadError::Decode {
            url: path.clone(),
            source,
        })?;
        self.decoder
            .borrow_mut()
            .configure(module)
            .map_err(|source| LoadError::Decode { url: path, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formats::model_codec::{EncodeOptions, encode_model};
    use pretty_assertions::assert_eq;
    use scene::components::{Geometry, Material};
    use scene::node::{Mesh, SceneNode};
    use std::collections::BTreeMap;
    use std::task::Poll;

    const MODEL: &str = "/models/car.qmsh";

    #[derive(Default)]
    struct FakeFetcher {
        files: BTreeMap<String, Result<Vec<u8>, FetchError>>,
        requests: RefCell<Vec<String>>,
        /// Suspend once per request so concurrent loads interleave.
        yield_first: bool,
    }

    impl FakeFetcher {
        fn with_defaults() -> Self {
            let mut f = Self::default();
            f.serve(
                DEFAULT_DECODER_PATH,
                DecoderModule::current()
                    .to_json_pretty()
                    .expect("module json")
                    .into_bytes(),
            );
            f.serve(MODEL, model_bytes());
            f
        }

        fn serve(&mut self, url: &str, bytes: Vec<u8>) {
            self.files.insert(url.to_string(), Ok(bytes));
        }

        fn fail(&mut self, url: &str, status: u16) {
            self.files.insert(
                url.to_string(),
                Err(FetchError::Status {
                    url: url.to_string(),
                    status,
                }),
            );
        }

        fn count(&self, url: &str) -> usize {
            self.requests.borrow().iter().filter(|u| *u == url).count()
        }
    }

    impl AssetFetcher for FakeFetcher {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
            self.requests.borrow_mut().push(url.to_string());
            if self.yield_first {
                yield_now().await;
            }
            self.files.get(url).cloned().unwrap_or(Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            }))
        }
    }

    async fn yield_now() {
        let mut yielded = false;
        futures_util::future::poll_fn(|cx| {
            if yielded {
                Poll::Ready(())
            } else {
                yielded = true;
                cx.waker().wake_by_ref();
                Poll::Pending
            }
        })
        .await
    }

    fn model_bytes() -> Vec<u8> {
        let scene = SceneNode::group("root").with_child(SceneNode::mesh(
            "tri",
            Mesh::new(
                Geometry::new(
                    vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
                    vec![0, 1, 2],
                ),
                Material::default(),
            ),
        ));
        encode_model(&scene, EncodeOptions::default()).expect("encode")
    }

    fn loader(fetcher: FakeFetcher) -> ModelLoader<Rc<FakeFetcher>> {
        ModelLoader::new(Rc::new(fetcher), Rc::new(AssetCache::new()))
    }

    #[test]
    fn same_url_is_decoded_once() {
        let loader = loader(FakeFetcher::with_defaults());

        let a = pollster::block_on(loader.load(MODEL)).expect("first load");
        let b = pollster::block_on(loader.load(MODEL)).expect("second load");

        assert_eq!(a, b);
        let pa = &a.root.meshes().next().expect("mesh").geometry.positions;
        let pb = &b.root.meshes().next().expect("mesh").geometry.positions;
        assert!(!std::ptr::eq(pa, pb));

        let metrics = loader.metrics();
        assert_eq!(metrics.counter(METRIC_DECODE), 1);
        assert_eq!(metrics.counter(METRIC_CACHE_HIT), 1);
        assert_eq!(metrics.gauge(METRIC_CACHE_ENTRIES), Some(1));
        assert_eq!(loader.fetcher.count(MODEL), 1);
        assert_eq!(loader.fetcher.count(DEFAULT_DECODER_PATH), 1);
    }

    #[test]
    fn loaded_instance_is_optimized() {
        let loader = loader(FakeFetcher::with_defaults());
        let inst = pollster::block_on(loader.load(MODEL)).expect("load");
        assert_eq!(inst.id, "model");
        let mesh = inst.root.meshes().next().expect("mesh");
        assert!(mesh.geometry.bounding_box.is_some());
        assert!(mesh.cast_shadow && mesh.receive_shadow);
    }

    #[test]
    fn decode_failure_leaves_cache_untouched() {
        let mut fetcher = FakeFetcher::with_defaults();
        fetcher.serve("/models/broken.qmsh", b"QMSH garbage".to_vec());
        let loader = loader(fetcher);

        let err = pollster::block_on(loader.load("/models/broken.qmsh")).expect_err("broken");
        assert!(matches!(err, LoadError::Decode { .. }));
        assert_eq!(err.url(), "/models/broken.qmsh");
        assert!(loader.cache().is_empty());
        assert_eq!(loader.metrics().counter(METRIC_LOAD_ERROR), 1);
    }

    #[test]
    fn fetch_failure_is_reported_with_url() {
        let mut fetcher = FakeFetcher::with_defaults();
        fetcher.fail(MODEL, 500);
        let loader = loader(fetcher);

        let err = pollster::block_on(loader.load(MODEL)).expect_err("500");
        match err {
            LoadError::Fetch { url, source } => {
                assert_eq!(url, MODEL);
                assert_eq!(
                    source,
                    FetchError::Status {
                        url: MODEL.to_string(),
                        status: 500
                    }
                );
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(loader.cache().is_empty());
    }

    #[test]
    fn missing_decoder_module_fails_before_fetching_model() {
        let mut fetcher = FakeFetcher::with_defaults();
        fetcher.fail(DEFAULT_DECODER_PATH, 404);
        let loader = loader(fetcher);

        let err = pollster::block_on(loader.load(MODEL)).expect_err("no decoder");
        assert_eq!(err.url(), DEFAULT_DECODER_PATH);
        assert_eq!(loader.fetcher.count(MODEL), 0);
    }

    #[test]
    fn incompatible_decoder_module_is_a_decode_error() {
        let mut fetcher = FakeFetcher::with_defaults();
        fetcher.serve(
            DEFAULT_DECODER_PATH,
            br#"{"codec":"draco","versions":[1],"max_quantization_bits":16}"#.to_vec(),
        );
        let loader = loader(fetcher);

        let err = pollster::block_on(loader.load(MODEL)).expect_err("incompatible");
        assert!(matches!(
            err,
            LoadError::Decode {
                source: DecodeError::IncompatibleDecoderModule { .. },
                ..
            }
        ));
    }

    #[test]
    fn custom_decoder_path_is_used() {
        let mut fetcher = FakeFetcher::with_defaults();
        let module = DecoderModule::current().to_json_pretty().expect("json");
        fetcher.serve("/static/qmsh/decoder.json", module.into_bytes());
        let loader = ModelLoader::new(Rc::new(fetcher), Rc::new(AssetCache::new()))
            .with_decoder_path("/static/qmsh/decoder.json");

        pollster::block_on(loader.load(MODEL)).expect("load");
        assert_eq!(loader.fetcher.count("/static/qmsh/decoder.json"), 1);
        assert_eq!(loader.fetcher.count(DEFAULT_DECODER_PATH), 0);
    }

    fn positions(inst: &ModelInstance) -> *const [f32; 3] {
        inst.root.meshes().next().expect("mesh").geometry.positions.as_ptr()
    }

    #[test]
    fn overlapping_first_loads_keep_one_canonical_template() {
        let fetcher = FakeFetcher {
            yield_first: true,
            ..FakeFetcher::with_defaults()
        };
        let loader = loader(fetcher);

        let (a, b) = pollster::block_on(futures_util::future::join(
            loader.load(MODEL),
            loader.load(MODEL),
        ));
        let (a, b) = (a.expect("first"), b.expect("second"));

        // Both missed the cache and decoded; the first put stayed canonical.
        let metrics = loader.metrics();
        assert_eq!(metrics.counter(METRIC_DECODE), 2);
        assert_eq!(metrics.counter(METRIC_CACHE_HIT), 0);
        assert_eq!(loader.fetcher.count(MODEL), 2);
        assert_eq!(loader.cache().len(), 1);
        assert_eq!(loader.cache().urls(), vec![MODEL.to_string()]);

        assert_eq!(a, b);
        assert_ne!(positions(&a), positions(&b));
        let canonical = loader.cache().get(MODEL).expect("cached");
        assert_eq!(a.root, *canonical);
    }
}
