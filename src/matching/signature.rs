use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::Result;
use crate::extraction::patterns::{EMAIL_RE, PHONE_RE};
use crate::page::{ancestors, class_list, ElementId, PageAdapter};

const MAX_PARENT_CHAIN: usize = 3;
const MAX_PARENT_CLASSES: usize = 5;
const MAX_CHILD_DEPTH: usize = 3;

/// Token substituted for digits and generated hashes in class names
pub const CLASS_WILDCARD: &str = "*";

static DIGIT_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]+").expect("valid regex"));

/// One ancestor level of a structural signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentLevel {
    pub tag: String,
    pub classes: Vec<String>,
}

/// Tag/structure fingerprint of one element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuralSignature {
    pub tag: String,
    pub parent_chain: Vec<ParentLevel>,
    pub child_count: usize,
    pub child_tag_histogram: BTreeMap<String, usize>,
    pub child_depth: usize,
    pub class_patterns: BTreeSet<String>,
    pub has_links: bool,
    pub link_count: usize,
    pub has_images: bool,
    pub image_count: usize,
    pub has_text: bool,
    pub text_node_count: usize,
    pub has_email: bool,
    pub has_phone: bool,
}

/// Replace digit runs and generated hash segments with the wildcard token.
///
/// `member-12` and `member-7` both become `member-*`; CSS-module style
/// segments such as `x1a2b3c` collapse to `*`.
pub fn normalize_class(class: &str) -> String {
    let mut out = String::with_capacity(class.len());
    let mut segment = String::new();

    let flush = |segment: &mut String, out: &mut String| {
        if segment.is_empty() {
            return;
        }
        let has_digit = segment.chars().any(|c| c.is_ascii_digit());
        let has_alpha = segment.chars().any(|c| c.is_ascii_alphabetic());
        if has_digit && has_alpha && segment.len() >= 5 {
            out.push_str(CLASS_WILDCARD);
        } else {
            out.push_str(&DIGIT_RUN_RE.replace_all(segment, CLASS_WILDCARD));
        }
        segment.clear();
    };

    for c in class.chars() {
        if c == '-' || c == '_' {
            flush(&mut segment, &mut out);
            out.push(c);
        } else {
            segment.push(c);
        }
    }
    flush(&mut segment, &mut out);
    out
}

/// Compute the structural signature of `element`
pub async fn extract_structural_signature(
    page: &dyn PageAdapter,
    element: ElementId,
) -> Result<StructuralSignature> {
    let tag = page.tag_name(element).await?;
    let attributes = page.attributes(element).await?;

    let mut parent_chain = Vec::new();
    for ancestor in ancestors(page, element, MAX_PARENT_CHAIN).await? {
        let ancestor_attrs = page.attributes(ancestor).await?;
        parent_chain.push(ParentLevel {
            tag: page.tag_name(ancestor).await?,
            classes: class_list(&ancestor_attrs)
                .iter()
                .take(MAX_PARENT_CLASSES)
                .map(|c| normalize_class(c))
                .collect(),
        });
    }

    let children = page.children(element).await?;
    let mut child_tag_histogram = BTreeMap::new();
    for child in &children {
        *child_tag_histogram
            .entry(page.tag_name(*child).await?)
            .or_insert(0) += 1;
    }

    let child_depth = subtree_depth(page, element, MAX_CHILD_DEPTH).await?;

    let class_patterns = class_list(&attributes)
        .iter()
        .map(|c| normalize_class(c))
        .collect();

    let link_count = page.query_selector_all(Some(element), "a[href]").await?.len();
    let image_count = page.query_selector_all(Some(element), "img").await?.len();

    let text = page.visible_text(element).await?;
    let mut text_node_count = 0;
    if !page.own_text(element).await?.is_empty() {
        text_node_count += 1;
    }
    for descendant in page.query_selector_all(Some(element), "*").await? {
        if !page.own_text(descendant).await?.is_empty() {
            text_node_count += 1;
        }
    }

    Ok(StructuralSignature {
        tag,
        parent_chain,
        child_count: children.len(),
        child_tag_histogram,
        child_depth,
        class_patterns,
        has_links: link_count > 0,
        link_count,
        has_images: image_count > 0,
        image_count,
        has_text: !text.is_empty(),
        text_node_count,
        has_email: EMAIL_RE.is_match(&text),
        has_phone: PHONE_RE.is_match(&text),
    })
}

/// Maximum depth of the subtree below `element`, capped at `cap`
async fn subtree_depth(page: &dyn PageAdapter, element: ElementId, cap: usize) -> Result<usize> {
    let mut depth = 0;
    let mut frontier = vec![element];
    while depth < cap {
        let mut next = Vec::new();
        for id in &frontier {
            next.extend(page.children(*id).await?);
        }
        if next.is_empty() {
            break;
        }
        depth += 1;
        frontier = next;
    }
    Ok(depth)
}
