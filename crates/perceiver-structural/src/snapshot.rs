//! Offline [`DocumentPort`] over captured HTML.
//!
//! Element handles carry `node-{index}` ids that are only meaningful for the
//! markup they were produced from; replacing the markup makes them stale.

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use crate::errors::PerceiverError;
use crate::markup::parse_markup;
use crate::model::{DomTree, ElementHandle, Locator};
use crate::ports::DocumentPort;
use crate::query;

struct Captured {
    markup: String,
    tree: DomTree,
    revision: u64,
}

pub struct PageSnapshot {
    inner: RwLock<Captured>,
}

impl PageSnapshot {
    pub fn from_markup(markup: impl Into<String>) -> Self {
        let markup = markup.into();
        let tree = parse_markup(&markup);
        Self {
            inner: RwLock::new(Captured {
                markup,
                tree,
                revision: 0,
            }),
        }
    }

    /// Swaps in new markup, as a page does after navigation or re-render.
    pub fn replace_markup(&self, markup: impl Into<String>) {
        let markup = markup.into();
        let tree = parse_markup(&markup);
        let mut inner = self.inner.write();
        inner.markup = markup;
        inner.tree = tree;
        inner.revision += 1;
        debug!(revision = inner.revision, nodes = inner.tree.len(), "snapshot markup replaced");
    }

    pub fn revision(&self) -> u64 {
        self.inner.read().revision
    }

    pub fn node_count(&self) -> usize {
        self.inner.read().tree.len()
    }

    fn handle_for(tree: &DomTree, index: usize) -> Option<ElementHandle> {
        tree.get(index)
            .map(|node| ElementHandle::new(format!("node-{index}"), node.tag.clone()).with_text(node.text.clone()))
    }

    fn index_of(element: &ElementHandle) -> Result<usize, PerceiverError> {
        element
            .node_id
            .strip_prefix("node-")
            .and_then(|raw| raw.parse().ok())
            .ok_or_else(|| PerceiverError::StaleElement(element.node_id.clone()))
    }
}

#[async_trait]
impl DocumentPort for PageSnapshot {
    async fn query(&self, locator: &Locator) -> Result<Vec<ElementHandle>, PerceiverError> {
        let inner = self.inner.read();
        let indices = query::select(&inner.tree, locator.mode, &locator.selector)?;
        Ok(indices
            .into_iter()
            .filter_map(|index| Self::handle_for(&inner.tree, index))
            .collect())
    }

    async fn is_visible(&self, element: &ElementHandle) -> Result<bool, PerceiverError> {
        let index = Self::index_of(element)?;
        let inner = self.inner.read();
        match inner.tree.get(index) {
            Some(node) if node.tag == element.tag => Ok(!node.hidden),
            _ => Err(PerceiverError::StaleElement(element.node_id.clone())),
        }
    }

    async fn markup(&self) -> Result<String, PerceiverError> {
        Ok(self.inner.read().markup.clone())
    }
}
