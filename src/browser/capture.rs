use serde::Deserialize;
use std::collections::BTreeMap;

use crate::error::{Result, ScrapeError};
use crate::page::{ComputedStyle, ElementId, ElementSpec, PageSnapshot, Rect, SnapshotBuilder};

use super::manager::BrowserManager;

/// Serializes the live DOM: every element's tag, attributes, content runs
/// (text or child index, in order), page-coordinate box and style subset.
/// Read-only; no matching logic runs in the page.
pub const SNAPSHOT_SCRIPT: &str = r#"
(() => {
  const nodes = [];
  const sx = window.scrollX, sy = window.scrollY;
  const px = (v) => parseFloat(v) || 0;
  const edges = (s, prop) => ({
    top: px(s[prop + 'Top']), right: px(s[prop + 'Right']),
    bottom: px(s[prop + 'Bottom']), left: px(s[prop + 'Left'])
  });
  const stack = [[document.documentElement, null]];
  while (stack.length) {
    const [el, parent] = stack.pop();
    const index = nodes.length;
    const r = el.getBoundingClientRect();
    const s = getComputedStyle(el);
    const attrs = {};
    for (const a of el.attributes) attrs[a.name] = a.value;
    const z = parseInt(s.zIndex, 10);
    nodes.push({
      tag: el.tagName.toLowerCase(),
      attrs,
      content: [],
      rect: [r.left + sx, r.top + sy, r.width, r.height],
      z: Number.isNaN(z) ? null : z,
      style: {
        display: s.display, position: s.position, visibility: s.visibility,
        margin: edges(s, 'margin'), padding: edges(s, 'padding'),
        background_color: s.backgroundColor, border_radius: s.borderRadius,
        has_shadow: s.boxShadow !== 'none'
      }
    });
    if (parent !== null) nodes[parent].content.push(index);
    const pending = [];
    for (const child of el.childNodes) {
      if (child.nodeType === Node.TEXT_NODE) {
        if (child.textContent.trim()) pending.push(child.textContent);
      } else if (child.nodeType === Node.ELEMENT_NODE) {
        pending.push(child);
      }
    }
    // Interleaved with child indices once the walk has assigned them
    nodes[index].pending = pending;
    for (let i = pending.length - 1; i >= 0; i--) {
      if (typeof pending[i] !== 'string') stack.push([pending[i], index]);
    }
  }
  for (const node of nodes) {
    const children = node.content;
    let next = 0;
    node.content = node.pending.map((item) => typeof item === 'string' ? item : children[next++]);
    delete node.pending;
  }
  return { url: location.href, nodes };
})()
"#;

#[derive(Debug, Deserialize)]
pub struct CapturedPage {
    pub url: Option<String>,
    pub nodes: Vec<RawNode>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RawContent {
    Child(usize),
    Text(String),
}

#[derive(Debug, Deserialize)]
pub struct RawNode {
    pub tag: String,
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
    #[serde(default)]
    pub content: Vec<RawContent>,
    pub rect: [f64; 4],
    #[serde(default)]
    pub z: Option<i64>,
    #[serde(default)]
    pub style: ComputedStyle,
}

enum Step {
    Open(usize, Option<ElementId>),
    Text(ElementId, String),
}

impl CapturedPage {
    /// Rebuild the captured tree; node 0 is the root
    pub fn into_snapshot(self) -> Result<PageSnapshot> {
        let count = self.nodes.len();
        let mut nodes: Vec<Option<RawNode>> = self.nodes.into_iter().map(Some).collect();
        let mut builder = SnapshotBuilder::new(self.url);
        if count == 0 {
            return Ok(builder.build());
        }

        let mut steps = vec![Step::Open(0, None)];
        while let Some(step) = steps.pop() {
            match step {
                Step::Text(parent, text) => builder.text(parent, &text),
                Step::Open(index, parent) => {
                    let node = nodes
                        .get_mut(index)
                        .and_then(Option::take)
                        .ok_or_else(|| {
                            ScrapeError::Adapter(format!("captured node {} missing or repeated", index))
                        })?;
                    let [x, y, width, height] = node.rect;
                    let mut spec = ElementSpec::new(&node.tag)
                        .attrs(node.attrs)
                        .rect(Rect::new(x, y, width, height))
                        .style(node.style);
                    if let Some(z) = node.z {
                        spec = spec.paint_order(z);
                    }
                    let id = builder.element(parent, spec);
                    for item in node.content.into_iter().rev() {
                        steps.push(match item {
                            RawContent::Child(child) => Step::Open(child, Some(id)),
                            RawContent::Text(text) => Step::Text(id, text),
                        });
                    }
                }
            }
        }

        Ok(builder.build())
    }
}

/// Capture the manager's current page into an immutable snapshot
pub async fn capture_snapshot(browser: &BrowserManager) -> Result<PageSnapshot> {
    let value = browser.evaluate(SNAPSHOT_SCRIPT).await?;
    let captured: CapturedPage = serde_json::from_value(value)?;
    let snapshot = captured.into_snapshot()?;
    tracing::info!(
        "Captured {} elements from {}",
        snapshot.element_count(),
        snapshot.url().unwrap_or("<unknown>")
    );
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::PageAdapter;

    #[tokio::test]
    async fn test_captured_json_rebuilds_tree() {
        let json = serde_json::json!({
            "url": "https://example.com/team",
            "nodes": [
                {"tag": "body", "attrs": {}, "content": [1, "tail"], "rect": [0, 0, 800, 600],
                 "style": {"display": "block"}},
                {"tag": "div", "attrs": {"class": "card"}, "content": ["Jane ", 2], "rect": [10, 10, 300, 200], "z": 2},
                {"tag": "b", "content": ["Doe"], "rect": [50, 10, 40, 20]}
            ]
        });
        let captured: CapturedPage = serde_json::from_value(json).unwrap();
        let page = captured.into_snapshot().unwrap();

        assert_eq!(page.element_count(), 3);
        let card = ElementId(1);
        assert_eq!(page.visible_text(card).await.unwrap(), "Jane Doe");
        assert_eq!(page.visible_text(ElementId(0)).await.unwrap(), "Jane Doe tail");
        assert_eq!(page.parent(ElementId(2)).await.unwrap(), Some(card));
        assert_eq!(
            page.bounding_box(card).await.unwrap(),
            Rect::new(10.0, 10.0, 300.0, 200.0)
        );
    }

    #[test]
    fn test_repeated_child_is_rejected() {
        let json = serde_json::json!({
            "url": null,
            "nodes": [
                {"tag": "body", "content": [1, 1], "rect": [0, 0, 1, 1]},
                {"tag": "div", "rect": [0, 0, 1, 1]}
            ]
        });
        let captured: CapturedPage = serde_json::from_value(json).unwrap();
        assert!(captured.into_snapshot().is_err());
    }
}
