use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use scene::node::SceneNode;

/// Decoded model templates keyed by the exact URL they were loaded from.
///
/// The first template stored for a URL stays canonical; later `put`s for the
/// same key are ignored. There is no eviction: entries live as long as the
/// cache. Share it between viewers with `Rc<AssetCache>`.
#[derive(Debug, Default)]
pub struct AssetCache {
    entries: RefCell<BTreeMap<String, Rc<SceneNode>>>,
}

impl AssetCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, url: &str) -> Option<Rc<SceneNode>> {
        self.entries.borrow().get(url).cloned()
    }

    /// Stores `template` unless `url` already has one; returns the canonical template.
    pub fn put(&self, url: impl Into<String>, template: SceneNode) -> Rc<SceneNode> {
        let url = url.into();
        let mut entries = self.entries.borrow_mut();
        if let Some(existing) = entries.get(&url) {
            tracing::debug!(url = %url, "template already cached; keeping first");
            return Rc::clone(existing);
        }
        let template = Rc::new(template);
        entries.insert(url, Rc::clone(&template));
        template
    }

    pub fn contains(&self, url: &str) -> bool {
        self.entries.borrow().contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Cached URLs in sorted order.
    pub fn urls(&self) -> Vec<String> {
        self.entries.borrow().keys().cloned().collect()
    }
}
