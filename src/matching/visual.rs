use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::page::{ElementId, Edges, PageAdapter, Rect};

/// Geometry/styling fingerprint of one element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualProperties {
    pub bounds: Rect,
    pub aspect_ratio: f64,
    pub area: f64,
    pub index_in_parent: usize,
    pub sibling_count: usize,
    pub margins: Edges,
    pub padding: Edges,
    pub display: String,
    pub position: String,
    pub background_color: String,
    pub border_radius: String,
    pub has_shadow: bool,
}

pub async fn extract_visual_properties(
    page: &dyn PageAdapter,
    element: ElementId,
) -> Result<VisualProperties> {
    let bounds = page.bounding_box(element).await?;
    let style = page.computed_style(element).await?;

    let (index_in_parent, sibling_count) = match page.parent(element).await? {
        Some(parent) => {
            let siblings = page.children(parent).await?;
            let index = siblings.iter().position(|s| *s == element).unwrap_or(0);
            (index, siblings.len().saturating_sub(1))
        }
        None => (0, 0),
    };

    Ok(VisualProperties {
        bounds,
        aspect_ratio: bounds.aspect_ratio(),
        area: bounds.area(),
        index_in_parent,
        sibling_count,
        margins: style.margin,
        padding: style.padding,
        display: style.display,
        position: style.position,
        background_color: style.background_color,
        border_radius: style.border_radius,
        has_shadow: style.has_shadow,
    })
}
