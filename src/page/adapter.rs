use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::types::{ComputedStyle, ElementId, OcrText, Rect};
use crate::error::Result;

/// Read-only view of page state consumed by matching and extraction.
///
/// Implementations may be backed by an in-memory snapshot or by a live
/// browser; matching and extraction never write back through this trait.
#[async_trait]
pub trait PageAdapter: Send + Sync {
    /// URL of the page the elements belong to
    async fn page_url(&self) -> Result<Option<String>>;

    /// Topmost element at a page-coordinate point
    async fn element_at_point(&self, x: f64, y: f64) -> Result<Option<ElementId>>;

    async fn bounding_box(&self, element: ElementId) -> Result<Rect>;

    async fn computed_style(&self, element: ElementId) -> Result<ComputedStyle>;

    /// Lower-cased tag name
    async fn tag_name(&self, element: ElementId) -> Result<String>;

    async fn attributes(&self, element: ElementId) -> Result<BTreeMap<String, String>>;

    async fn attribute(&self, element: ElementId, name: &str) -> Result<Option<String>> {
        Ok(self.attributes(element).await?.remove(name))
    }

    /// Whitespace-normalized text of the element and all descendants
    async fn visible_text(&self, element: ElementId) -> Result<String>;

    /// Whitespace-normalized text of the element's own text nodes only
    async fn own_text(&self, element: ElementId) -> Result<String>;

    async fn parent(&self, element: ElementId) -> Result<Option<ElementId>>;

    /// Element children in document order
    async fn children(&self, element: ElementId) -> Result<Vec<ElementId>>;

    /// All elements matching `selector`, in document order. With a scope,
    /// only descendants of the scope element are considered.
    async fn query_selector_all(
        &self,
        scope: Option<ElementId>,
        selector: &str,
    ) -> Result<Vec<ElementId>>;

    /// Delegate a page region to the optical-text collaborator
    async fn recognize_text(&self, region: Rect) -> Result<OcrText>;

    /// Whether concurrent reads against the same page are safe
    fn supports_concurrent_reads(&self) -> bool {
        true
    }
}

/// Serializes every adapter call behind a single async gate.
///
/// Used for adapters whose host page cannot serve overlapping reads, while
/// callers keep several logical workers busy with scoring and validation.
pub struct GatedPage {
    inner: Arc<dyn PageAdapter>,
    gate: Mutex<()>,
}

impl GatedPage {
    pub fn new(inner: Arc<dyn PageAdapter>) -> Self {
        Self {
            inner,
            gate: Mutex::new(()),
        }
    }

    /// Wrap the adapter only if it cannot serve concurrent reads
    pub fn wrap_if_needed(inner: Arc<dyn PageAdapter>) -> Arc<dyn PageAdapter> {
        if inner.supports_concurrent_reads() {
            inner
        } else {
            tracing::debug!("Page adapter is single-threaded; gating reads");
            Arc::new(Self::new(inner))
        }
    }
}

#[async_trait]
impl PageAdapter for GatedPage {
    async fn page_url(&self) -> Result<Option<String>> {
        let _guard = self.gate.lock().await;
        self.inner.page_url().await
    }

    async fn element_at_point(&self, x: f64, y: f64) -> Result<Option<ElementId>> {
        let _guard = self.gate.lock().await;
        self.inner.element_at_point(x, y).await
    }

    async fn bounding_box(&self, element: ElementId) -> Result<Rect> {
        let _guard = self.gate.lock().await;
        self.inner.bounding_box(element).await
    }

    async fn computed_style(&self, element: ElementId) -> Result<ComputedStyle> {
        let _guard = self.gate.lock().await;
        self.inner.computed_style(element).await
    }

    async fn tag_name(&self, element: ElementId) -> Result<String> {
        let _guard = self.gate.lock().await;
        self.inner.tag_name(element).await
    }

    async fn attributes(&self, element: ElementId) -> Result<BTreeMap<String, String>> {
        let _guard = self.gate.lock().await;
        self.inner.attributes(element).await
    }

    async fn attribute(&self, element: ElementId, name: &str) -> Result<Option<String>> {
        let _guard = self.gate.lock().await;
        self.inner.attribute(element, name).await
    }

    async fn visible_text(&self, element: ElementId) -> Result<String> {
        let _guard = self.gate.lock().await;
        self.inner.visible_text(element).await
    }

    async fn own_text(&self, element: ElementId) -> Result<String> {
        let _guard = self.gate.lock().await;
        self.inner.own_text(element).await
    }

    async fn parent(&self, element: ElementId) -> Result<Option<ElementId>> {
        let _guard = self.gate.lock().await;
        self.inner.parent(element).await
    }

    async fn children(&self, element: ElementId) -> Result<Vec<ElementId>> {
        let _guard = self.gate.lock().await;
        self.inner.children(element).await
    }

    async fn query_selector_all(
        &self,
        scope: Option<ElementId>,
        selector: &str,
    ) -> Result<Vec<ElementId>> {
        let _guard = self.gate.lock().await;
        self.inner.query_selector_all(scope, selector).await
    }

    async fn recognize_text(&self, region: Rect) -> Result<OcrText> {
        let _guard = self.gate.lock().await;
        self.inner.recognize_text(region).await
    }

    fn supports_concurrent_reads(&self) -> bool {
        true
    }
}

/// Split the `class` attribute into class names, in attribute order
pub fn class_list(attributes: &BTreeMap<String, String>) -> Vec<String> {
    attributes
        .get("class")
        .map(|c| c.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

/// True when `element` is `ancestor` or lies inside it
pub async fn is_within(
    page: &dyn PageAdapter,
    ancestor: ElementId,
    element: ElementId,
) -> Result<bool> {
    let mut current = Some(element);
    while let Some(id) = current {
        if id == ancestor {
            return Ok(true);
        }
        current = page.parent(id).await?;
    }
    Ok(false)
}

/// Element and all of its descendants in document order
pub async fn self_and_descendants(
    page: &dyn PageAdapter,
    root: ElementId,
) -> Result<Vec<ElementId>> {
    let mut ordered = Vec::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        ordered.push(id);
        let children = page.children(id).await?;
        stack.extend(children.into_iter().rev());
    }
    Ok(ordered)
}

/// Ancestors from the parent upward, at most `limit` of them
pub async fn ancestors(
    page: &dyn PageAdapter,
    element: ElementId,
    limit: usize,
) -> Result<Vec<ElementId>> {
    let mut chain = Vec::new();
    let mut current = page.parent(element).await?;
    while let Some(id) = current {
        if chain.len() >= limit {
            break;
        }
        chain.push(id);
        current = page.parent(id).await?;
    }
    Ok(chain)
}
