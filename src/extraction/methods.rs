use regex::Regex;
use std::collections::BTreeMap;
use url::Url;

use crate::error::{Result, ScrapeError};
use crate::page::{is_within, self_and_descendants, ElementId, PageAdapter, Rect};

use super::method::{CoordinatePosition, Direction, FieldName, MethodKind, RelativeRegion};
use super::patterns::{EMAIL_RE, PHONE_RE};

/// Offsets tried around a coordinate whose hit falls outside the card
const COORDINATE_RETRY_OFFSETS: [(f64, f64); 4] = [(2.0, 0.0), (-2.0, 0.0), (0.0, 2.0), (0.0, -2.0)];

/// Href schemes never treated as navigable links
const NON_NAVIGABLE_SCHEMES: [&str; 4] = ["mailto:", "tel:", "javascript:", "data:"];

/// Values already accepted for earlier fields of the same card
pub type ResolvedFields = BTreeMap<FieldName, String>;

/// Everything a method may read while running against one card
pub struct MethodContext<'a> {
    pub page: &'a dyn PageAdapter,
    pub card: ElementId,
    pub card_box: Rect,
    pub field: FieldName,
    pub resolved: &'a ResolvedFields,
    pub page_url: Option<&'a Url>,
}

/// Raw method output before validation
#[derive(Debug, Clone, PartialEq)]
pub struct RawValue {
    pub text: String,
    /// Set by methods that report their own confidence (optical text)
    pub confidence: Option<f64>,
}

impl RawValue {
    fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            confidence: None,
        }
    }
}

/// Run one method against the card. `Ok(None)` means the method found nothing.
pub async fn execute(kind: &MethodKind, ctx: &MethodContext<'_>) -> Result<Option<RawValue>> {
    let outcome = match kind {
        MethodKind::LinkAttribute { scheme } => link_attribute(ctx, scheme).await,
        MethodKind::SelectorAttribute {
            selector,
            attribute,
        } => selector_attribute(ctx, selector, attribute.as_deref()).await,
        MethodKind::TextPattern { pattern, group } => text_pattern(ctx, pattern, *group).await,
        MethodKind::UrlPattern { fragments } => url_pattern(ctx, fragments).await,
        MethodKind::ProximityToAnchor {
            anchor_field,
            direction,
            max_distance,
        } => proximity_to_anchor(ctx, *anchor_field, *direction, *max_distance).await,
        MethodKind::FirstInternalLink => first_internal_link(ctx).await,
        MethodKind::KeywordMatch { keywords } => keyword_match(ctx, keywords).await,
        MethodKind::CoordinateFallback { position } => coordinate_fallback(ctx, *position).await,
        MethodKind::OpticalText { region } => optical_text(ctx, region.as_ref()).await,
    };

    outcome.map_err(|e| match e {
        already @ ScrapeError::MethodExecution { .. } => already,
        other => ScrapeError::MethodExecution {
            method: kind.tag(),
            message: other.to_string(),
        },
    })
}

/// `href` values of anchors in the card (the card itself first, if it is one)
async fn card_links(ctx: &MethodContext<'_>) -> Result<Vec<(ElementId, String)>> {
    let mut anchors = Vec::new();
    if ctx.page.tag_name(ctx.card).await? == "a" {
        anchors.push(ctx.card);
    }
    anchors.extend(ctx.page.query_selector_all(Some(ctx.card), "a[href]").await?);

    let mut links = Vec::with_capacity(anchors.len());
    for anchor in anchors {
        if let Some(href) = ctx.page.attribute(anchor, "href").await? {
            let href = href.trim();
            if !href.is_empty() {
                links.push((anchor, href.to_string()));
            }
        }
    }
    Ok(links)
}

fn resolve_href(base: Option<&Url>, href: &str) -> Option<String> {
    if let Ok(absolute) = Url::parse(href) {
        return Some(absolute.to_string());
    }
    match base {
        Some(base) => base.join(href).ok().map(|u| u.to_string()),
        None => Some(href.to_string()),
    }
}

fn is_navigable(href: &str) -> bool {
    let lowered = href.to_ascii_lowercase();
    !href.starts_with('#') && !NON_NAVIGABLE_SCHEMES.iter().any(|s| lowered.starts_with(s))
}

async fn link_attribute(ctx: &MethodContext<'_>, scheme: &str) -> Result<Option<RawValue>> {
    let scheme = scheme.to_ascii_lowercase();
    for (_, href) in card_links(ctx).await? {
        if !href.to_ascii_lowercase().starts_with(&scheme) {
            continue;
        }
        let rest = &href[scheme.len()..];
        let value = rest.split('?').next().unwrap_or_default().trim();
        if value.is_empty() {
            continue;
        }
        let value = if ctx.field == FieldName::Email {
            value.to_lowercase()
        } else {
            value.to_string()
        };
        return Ok(Some(RawValue::plain(value)));
    }
    Ok(None)
}

async fn selector_attribute(
    ctx: &MethodContext<'_>,
    selector: &str,
    attribute: Option<&str>,
) -> Result<Option<RawValue>> {
    for element in ctx.page.query_selector_all(Some(ctx.card), selector).await? {
        let value = match attribute {
            Some(name) => match ctx.page.attribute(element, name).await? {
                Some(raw) if matches!(name, "href" | "src") && !raw.trim().is_empty() => {
                    resolve_href(ctx.page_url, raw.trim())
                }
                other => other,
            },
            None => Some(ctx.page.visible_text(element).await?),
        };
        if let Some(value) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
            return Ok(Some(RawValue::plain(value)));
        }
    }
    Ok(None)
}

async fn text_pattern(ctx: &MethodContext<'_>, pattern: &str, group: usize) -> Result<Option<RawValue>> {
    let regex = Regex::new(pattern).map_err(|e| ScrapeError::MethodExecution {
        method: super::method::MethodTag::TextPattern,
        message: format!("invalid pattern: {}", e),
    })?;
    let text = ctx.page.visible_text(ctx.card).await?;
    Ok(regex
        .captures(&text)
        .and_then(|caps| caps.get(group))
        .map(|m| m.as_str().trim())
        .filter(|v| !v.is_empty())
        .map(RawValue::plain))
}

async fn url_pattern(ctx: &MethodContext<'_>, fragments: &[String]) -> Result<Option<RawValue>> {
    let fragments: Vec<String> = fragments.iter().map(|f| f.to_lowercase()).collect();
    for (_, href) in card_links(ctx).await? {
        let lowered = href.to_lowercase();
        if fragments.iter().any(|f| lowered.contains(f.as_str())) {
            if let Some(resolved) = resolve_href(ctx.page_url, &href) {
                return Ok(Some(RawValue::plain(resolved)));
            }
        }
    }
    Ok(None)
}

async fn first_internal_link(ctx: &MethodContext<'_>) -> Result<Option<RawValue>> {
    let page_host = ctx.page_url.and_then(|u| u.host_str());
    for (_, href) in card_links(ctx).await? {
        if !is_navigable(&href) {
            continue;
        }
        match (ctx.page_url, page_host) {
            (Some(base), Some(host)) => {
                if let Ok(resolved) = base.join(&href) {
                    if resolved.host_str() == Some(host) {
                        return Ok(Some(RawValue::plain(resolved.to_string())));
                    }
                }
            }
            // Without a page URL only root-relative links are known to be internal
            _ => {
                if href.starts_with('/') && !href.starts_with("//") {
                    return Ok(Some(RawValue::plain(href)));
                }
            }
        }
    }
    Ok(None)
}

/// First own-text run containing any keyword, case-insensitively
async fn keyword_match(ctx: &MethodContext<'_>, keywords: &[String]) -> Result<Option<RawValue>> {
    let needles: Vec<String> = keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();
    if needles.is_empty() {
        return Ok(None);
    }

    for element in self_and_descendants(ctx.page, ctx.card).await? {
        let text = ctx.page.own_text(element).await?;
        let lowered = text.to_lowercase();
        if needles.iter().any(|n| lowered.contains(n.as_str())) {
            return Ok(Some(RawValue::plain(text)));
        }
    }
    Ok(None)
}

/// Smallest element of the card whose text or href carries the anchor value
async fn locate_anchor(ctx: &MethodContext<'_>, value: &str) -> Result<Option<ElementId>> {
    let needle = value.to_lowercase();
    let mut best: Option<(ElementId, f64)> = None;
    for element in self_and_descendants(ctx.page, ctx.card).await? {
        let text = ctx.page.visible_text(element).await?.to_lowercase();
        let href = ctx
            .page
            .attribute(element, "href")
            .await?
            .unwrap_or_default()
            .to_lowercase();
        if !text.contains(&needle) && !href.contains(&needle) {
            continue;
        }
        let area = ctx.page.bounding_box(element).await?.area();
        if best.map_or(true, |(_, smallest)| area < smallest) {
            best = Some((element, area));
        }
    }
    Ok(best.map(|(id, _)| id))
}

fn lies_toward(direction: Direction, anchor: &Rect, candidate: &Rect) -> bool {
    let (cx, cy) = candidate.center();
    match direction {
        Direction::Above => cy < anchor.y,
        Direction::Below => cy > anchor.bottom(),
        Direction::Left => cx < anchor.x,
        Direction::Right => cx > anchor.right(),
        Direction::Any => true,
    }
}

async fn proximity_to_anchor(
    ctx: &MethodContext<'_>,
    anchor_field: FieldName,
    direction: Direction,
    max_distance: f64,
) -> Result<Option<RawValue>> {
    let Some(anchor_value) = ctx.resolved.get(&anchor_field) else {
        tracing::debug!("Proximity skipped: {} not resolved", anchor_field);
        return Ok(None);
    };
    let Some(anchor) = locate_anchor(ctx, anchor_value).await? else {
        return Ok(None);
    };
    let anchor_box = ctx.page.bounding_box(anchor).await?;

    // (off-direction, distance, document order)
    let mut best: Option<((bool, f64, usize), ElementId)> = None;
    for (position, element) in self_and_descendants(ctx.page, ctx.card)
        .await?
        .into_iter()
        .enumerate()
    {
        if element == anchor
            || is_within(ctx.page, element, anchor).await?
            || is_within(ctx.page, anchor, element).await?
        {
            continue;
        }
        if ctx.page.own_text(element).await?.is_empty() {
            continue;
        }
        let bounds = ctx.page.bounding_box(element).await?;
        let distance = anchor_box.gap_distance(&bounds);
        if distance > max_distance {
            continue;
        }
        let key = (!lies_toward(direction, &anchor_box, &bounds), distance, position);
        let better = match &best {
            None => true,
            Some((current, _)) => key
                .partial_cmp(current)
                .map_or(false, |o| o == std::cmp::Ordering::Less),
        };
        if better {
            best = Some((key, element));
        }
    }

    match best {
        Some((_, element)) => {
            let text = ctx.page.visible_text(element).await?;
            Ok(Some(RawValue::plain(text)).filter(|v| !v.text.is_empty()))
        }
        None => Ok(None),
    }
}

async fn coordinate_fallback(
    ctx: &MethodContext<'_>,
    position: CoordinatePosition,
) -> Result<Option<RawValue>> {
    let (x, y) = match position {
        CoordinatePosition::Relative { dx, dy } => (ctx.card_box.x + dx, ctx.card_box.y + dy),
        CoordinatePosition::Absolute { x, y } => (x, y),
    };

    let attempts = std::iter::once((0.0, 0.0)).chain(COORDINATE_RETRY_OFFSETS);
    for (ox, oy) in attempts {
        let Some(hit) = ctx.page.element_at_point(x + ox, y + oy).await? else {
            continue;
        };
        if !is_within(ctx.page, ctx.card, hit).await? {
            continue;
        }
        let text = ctx.page.visible_text(hit).await?;
        if !text.is_empty() {
            return Ok(Some(RawValue::plain(text)));
        }
    }
    Ok(None)
}

async fn optical_text(
    ctx: &MethodContext<'_>,
    region: Option<&RelativeRegion>,
) -> Result<Option<RawValue>> {
    let area = match region {
        Some(r) => Rect::new(ctx.card_box.x + r.dx, ctx.card_box.y + r.dy, r.width, r.height),
        None => ctx.card_box,
    };
    let recognized = ctx.page.recognize_text(area).await?;

    let text = match ctx.field {
        FieldName::Email => EMAIL_RE.find(&recognized.text).map(|m| m.as_str().to_lowercase()),
        FieldName::Phone => PHONE_RE.find(&recognized.text).map(|m| m.as_str().to_string()),
        _ => recognized
            .text
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string),
    };

    Ok(text.map(|text| RawValue {
        text,
        confidence: Some(recognized.confidence.clamp(0.0, 1.0)),
    }))
}
