use async_trait::async_trait;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::adapter::PageAdapter;
use super::selector::{MarkupWriter, SelectorIndex};
use super::types::{ComputedStyle, Edges, ElementId, OcrText, Rect};
use crate::browser::ocr::TextRecognizer;
use crate::error::{Result, ScrapeError};

/// Tags whose text never counts as visible content
const NON_VISUAL_TAGS: [&str; 6] = ["script", "style", "noscript", "template", "head", "meta"];

/// One run of an element's content, in document order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Content {
    Text(String),
    Element(ElementId),
}

#[derive(Debug, Clone)]
struct SnapshotNode {
    tag: String,
    attributes: BTreeMap<String, String>,
    content: Vec<Content>,
    parent: Option<ElementId>,
    bounds: Rect,
    style: ComputedStyle,
    paint_order: Option<i64>,
}

/// Immutable in-memory page state.
///
/// Built once per capture (or per test fixture) and read concurrently by any
/// number of matching and extraction workers.
pub struct PageSnapshot {
    url: Option<String>,
    nodes: Vec<SnapshotNode>,
    /// Pre-order traversal position per node
    order: Vec<usize>,
    /// Node ids in pre-order
    preorder: Vec<ElementId>,
    subtree_size: Vec<usize>,
    depth: Vec<usize>,
    rendered: Vec<bool>,
    recognizer: Option<Arc<dyn TextRecognizer>>,
    /// HTML mirror for selector queries, parsed on first use
    selector_index: OnceCell<SelectorIndex>,
}

impl PageSnapshot {
    pub fn builder(url: impl Into<String>) -> SnapshotBuilder {
        SnapshotBuilder::new(Some(url.into()))
    }

    pub fn with_text_recognizer(mut self, recognizer: Arc<dyn TextRecognizer>) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn element_count(&self) -> usize {
        self.nodes.len()
    }

    fn node(&self, id: ElementId) -> Result<&SnapshotNode> {
        self.nodes.get(id.0).ok_or(ScrapeError::UnknownElement(id))
    }

    fn element_children(&self, id: ElementId) -> impl Iterator<Item = ElementId> + '_ {
        self.nodes[id.0].content.iter().filter_map(|c| match c {
            Content::Element(child) => Some(*child),
            Content::Text(_) => None,
        })
    }

    fn collect_text(&self, id: ElementId, out: &mut Vec<String>) {
        let node = &self.nodes[id.0];
        if !self.rendered[id.0] || NON_VISUAL_TAGS.contains(&node.tag.as_str()) {
            return;
        }
        for content in &node.content {
            match content {
                Content::Text(text) => out.push(text.clone()),
                Content::Element(child) => self.collect_text(*child, out),
            }
        }
    }

    /// HTML rendering of the whole tree; each element carries its arena index
    pub fn to_markup(&self) -> String {
        enum Step<'a> {
            Open(ElementId),
            Text(&'a str),
            Close(ElementId),
        }

        let mut writer = MarkupWriter::default();
        let mut stack: Vec<Step<'_>> = self
            .preorder
            .iter()
            .rev()
            .filter(|id| self.nodes[id.0].parent.is_none())
            .map(|id| Step::Open(*id))
            .collect();
        while let Some(step) = stack.pop() {
            match step {
                Step::Open(id) => {
                    let node = &self.nodes[id.0];
                    writer.open(
                        id,
                        &node.tag,
                        node.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str())),
                    );
                    stack.push(Step::Close(id));
                    for content in node.content.iter().rev() {
                        stack.push(match content {
                            Content::Text(text) => Step::Text(text),
                            Content::Element(child) => Step::Open(*child),
                        });
                    }
                }
                Step::Text(text) => writer.text(text),
                Step::Close(id) => writer.close(&self.nodes[id.0].tag),
            }
        }
        writer.finish()
    }

    fn selector_index(&self) -> &SelectorIndex {
        self.selector_index
            .get_or_init(|| SelectorIndex::from_markup(&self.to_markup()))
    }

    /// True when `id` is a strict descendant of `scope`
    fn is_strict_descendant(&self, scope: ElementId, id: ElementId) -> bool {
        let start = self.order[scope.0];
        let position = self.order[id.0];
        position > start && position < start + self.subtree_size[scope.0]
    }
}

fn normalize_whitespace(parts: &[String]) -> String {
    parts
        .iter()
        .flat_map(|p| p.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl PageAdapter for PageSnapshot {
    async fn page_url(&self) -> Result<Option<String>> {
        Ok(self.url.clone())
    }

    async fn element_at_point(&self, x: f64, y: f64) -> Result<Option<ElementId>> {
        let hit = self
            .preorder
            .iter()
            .copied()
            .filter(|id| {
                let node = &self.nodes[id.0];
                self.rendered[id.0]
                    && node.bounds.has_area()
                    && node.bounds.contains_point(x, y)
                    && !NON_VISUAL_TAGS.contains(&node.tag.as_str())
            })
            .max_by_key(|id| {
                (
                    self.nodes[id.0].paint_order.unwrap_or(0),
                    self.depth[id.0],
                    self.order[id.0],
                )
            });
        Ok(hit)
    }

    async fn bounding_box(&self, element: ElementId) -> Result<Rect> {
        Ok(self.node(element)?.bounds)
    }

    async fn computed_style(&self, element: ElementId) -> Result<ComputedStyle> {
        Ok(self.node(element)?.style.clone())
    }

    async fn tag_name(&self, element: ElementId) -> Result<String> {
        Ok(self.node(element)?.tag.clone())
    }

    async fn attributes(&self, element: ElementId) -> Result<BTreeMap<String, String>> {
        Ok(self.node(element)?.attributes.clone())
    }

    async fn attribute(&self, element: ElementId, name: &str) -> Result<Option<String>> {
        Ok(self.node(element)?.attributes.get(name).cloned())
    }

    async fn visible_text(&self, element: ElementId) -> Result<String> {
        self.node(element)?;
        let mut parts = Vec::new();
        self.collect_text(element, &mut parts);
        Ok(normalize_whitespace(&parts))
    }

    async fn own_text(&self, element: ElementId) -> Result<String> {
        let node = self.node(element)?;
        if !self.rendered[element.0] || NON_VISUAL_TAGS.contains(&node.tag.as_str()) {
            return Ok(String::new());
        }
        let parts: Vec<String> = node
            .content
            .iter()
            .filter_map(|c| match c {
                Content::Text(text) => Some(text.clone()),
                Content::Element(_) => None,
            })
            .collect();
        Ok(normalize_whitespace(&parts))
    }

    async fn parent(&self, element: ElementId) -> Result<Option<ElementId>> {
        Ok(self.node(element)?.parent)
    }

    async fn children(&self, element: ElementId) -> Result<Vec<ElementId>> {
        self.node(element)?;
        Ok(self.element_children(element).collect())
    }

    async fn query_selector_all(
        &self,
        scope: Option<ElementId>,
        selector: &str,
    ) -> Result<Vec<ElementId>> {
        let matched = self.selector_index().select(selector)?;
        if let Some(scope) = scope {
            self.node(scope)?;
        }
        let mut ids: Vec<ElementId> = matched
            .into_iter()
            .filter(|id| id.0 < self.nodes.len())
            .filter(|id| scope.map_or(true, |s| self.is_strict_descendant(s, *id)))
            .collect();
        ids.sort_by_key(|id| self.order[id.0]);
        ids.dedup();
        Ok(ids)
    }

    async fn recognize_text(&self, region: Rect) -> Result<OcrText> {
        match &self.recognizer {
            Some(recognizer) => recognizer.recognize(region).await,
            None => Err(ScrapeError::OcrUnavailable),
        }
    }
}

/// Description of one element added to a [`SnapshotBuilder`]
#[derive(Debug, Clone)]
pub struct ElementSpec {
    tag: String,
    attributes: BTreeMap<String, String>,
    text: Option<String>,
    bounds: Rect,
    style: ComputedStyle,
    paint_order: Option<i64>,
}

impl ElementSpec {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attributes: BTreeMap::new(),
            text: None,
            bounds: Rect::default(),
            style: ComputedStyle::default(),
            paint_order: None,
        }
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn attrs(mut self, attributes: BTreeMap<String, String>) -> Self {
        self.attributes.extend(attributes);
        self
    }

    pub fn id(self, id: &str) -> Self {
        self.attr("id", id)
    }

    /// Append one class name to the class attribute
    pub fn class(mut self, class: &str) -> Self {
        let entry = self.attributes.entry("class".to_string()).or_default();
        if !entry.is_empty() {
            entry.push(' ');
        }
        entry.push_str(class);
        self
    }

    /// Leading text run of the element
    pub fn text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn bounds(mut self, x: f64, y: f64, width: f64, height: f64) -> Self {
        self.bounds = Rect::new(x, y, width, height);
        self
    }

    pub fn rect(mut self, rect: Rect) -> Self {
        self.bounds = rect;
        self
    }

    pub fn style(mut self, style: ComputedStyle) -> Self {
        self.style = style;
        self
    }

    pub fn display(mut self, display: &str) -> Self {
        self.style.display = display.to_string();
        self
    }

    pub fn margin(mut self, margin: Edges) -> Self {
        self.style.margin = margin;
        self
    }

    pub fn border_radius(mut self, radius: &str) -> Self {
        self.style.border_radius = radius.to_string();
        self
    }

    pub fn shadow(mut self, has_shadow: bool) -> Self {
        self.style.has_shadow = has_shadow;
        self
    }

    pub fn paint_order(mut self, order: i64) -> Self {
        self.paint_order = Some(order);
        self
    }
}

/// Incrementally assembles a [`PageSnapshot`]
pub struct SnapshotBuilder {
    url: Option<String>,
    nodes: Vec<SnapshotNode>,
}

impl SnapshotBuilder {
    pub fn new(url: Option<String>) -> Self {
        Self {
            url,
            nodes: Vec::new(),
        }
    }

    /// Add an element as the last child of `parent` (or as a top-level root)
    pub fn element(&mut self, parent: Option<ElementId>, spec: ElementSpec) -> ElementId {
        let id = ElementId(self.nodes.len());
        let content = spec.text.map(Content::Text).into_iter().collect();
        self.nodes.push(SnapshotNode {
            tag: spec.tag,
            attributes: spec.attributes,
            content,
            parent,
            bounds: spec.bounds,
            style: spec.style,
            paint_order: spec.paint_order,
        });
        if let Some(parent) = parent {
            if let Some(node) = self.nodes.get_mut(parent.0) {
                node.content.push(Content::Element(id));
            }
        }
        id
    }

    /// Append a text run to `parent` after its current content
    pub fn text(&mut self, parent: ElementId, text: &str) {
        if let Some(node) = self.nodes.get_mut(parent.0) {
            node.content.push(Content::Text(text.to_string()));
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn build(self) -> PageSnapshot {
        let count = self.nodes.len();
        let mut order = vec![0; count];
        let mut preorder = Vec::with_capacity(count);
        let mut subtree_size = vec![1; count];
        let mut depth = vec![0; count];
        let mut rendered = vec![true; count];

        let roots: Vec<ElementId> = (0..count)
            .filter(|i| self.nodes[*i].parent.is_none())
            .map(ElementId)
            .collect();

        // Iterative pre-order walk; the exit marker closes a subtree
        let mut stack: Vec<(ElementId, bool)> = roots.into_iter().rev().map(|r| (r, false)).collect();
        while let Some((id, exiting)) = stack.pop() {
            if exiting {
                subtree_size[id.0] = preorder.len() - order[id.0];
                continue;
            }
            order[id.0] = preorder.len();
            preorder.push(id);

            let node = &self.nodes[id.0];
            if let Some(parent) = node.parent {
                depth[id.0] = depth[parent.0] + 1;
                rendered[id.0] = rendered[parent.0] && node.style.is_rendered();
            } else {
                rendered[id.0] = node.style.is_rendered();
            }

            stack.push((id, true));
            let children: Vec<ElementId> = node
                .content
                .iter()
                .filter_map(|c| match c {
                    Content::Element(child) => Some(*child),
                    Content::Text(_) => None,
                })
                .collect();
            stack.extend(children.into_iter().rev().map(|c| (c, false)));
        }

        PageSnapshot {
            url: self.url,
            nodes: self.nodes,
            order,
            preorder,
            subtree_size,
            depth,
            rendered,
            recognizer: None,
            selector_index: OnceCell::new(),
        }
    }
}
