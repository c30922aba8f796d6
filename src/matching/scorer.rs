use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::signature::{ParentLevel, StructuralSignature};
use super::visual::VisualProperties;

pub const STRUCTURAL_WEIGHT: f64 = 0.6;
pub const VISUAL_WEIGHT: f64 = 0.4;

// Structural sub-score weights (sum to 100)
const TAG_WEIGHT: f64 = 20.0;
const PARENT_CHAIN_WEIGHT: f64 = 15.0;
const CHILD_COUNT_WEIGHT: f64 = 15.0;
const CHILD_HISTOGRAM_WEIGHT: f64 = 15.0;
const CLASS_PATTERN_WEIGHT: f64 = 15.0;
const LINK_PRESENCE_POINTS: f64 = 5.0;
const LINK_COUNT_POINTS: f64 = 5.0;
const CONTENT_INDICATOR_POINTS: f64 = 5.0;

// Visual sub-score weights (sum to 100)
const SIZE_WEIGHT: f64 = 30.0;
const ASPECT_WEIGHT: f64 = 20.0;
const DISPLAY_WEIGHT: f64 = 15.0;
const MARGIN_WEIGHT: f64 = 15.0;
const SHADOW_POINTS: f64 = 10.0;
const RADIUS_POINTS: f64 = 10.0;

/// Per-level credit for a shared class at the same parent depth
const PARENT_CLASS_CREDIT: f64 = 0.5;

/// Similarity of a candidate against the reference
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityScore {
    /// 0-100
    pub structural: f64,
    /// 0-100
    pub visual: f64,
    /// Weighted combination, rounded into 0-100
    pub hybrid: u8,
}

pub fn score(
    reference: (&StructuralSignature, &VisualProperties),
    candidate: (&StructuralSignature, &VisualProperties),
) -> SimilarityScore {
    let structural = structural_similarity(reference.0, candidate.0);
    let visual = visual_similarity(reference.1, candidate.1);
    SimilarityScore {
        structural,
        visual,
        hybrid: hybrid_score(structural, visual),
    }
}

pub fn hybrid_score(structural: f64, visual: f64) -> u8 {
    let combined = structural * STRUCTURAL_WEIGHT + visual * VISUAL_WEIGHT;
    combined.round().clamp(0.0, 100.0) as u8
}

pub fn structural_similarity(a: &StructuralSignature, b: &StructuralSignature) -> f64 {
    let mut total = 0.0;

    if a.tag == b.tag {
        total += TAG_WEIGHT;
    }
    total += PARENT_CHAIN_WEIGHT * parent_chain_similarity(&a.parent_chain, &b.parent_chain);
    total += CHILD_COUNT_WEIGHT * child_count_similarity(a.child_count, b.child_count);
    total += CHILD_HISTOGRAM_WEIGHT * histogram_similarity(a, b);
    total += CLASS_PATTERN_WEIGHT * dice(&a.class_patterns, &b.class_patterns);

    if a.has_links == b.has_links {
        total += LINK_PRESENCE_POINTS;
    }
    let link_delta = a.link_count.abs_diff(b.link_count) as f64;
    total += (LINK_COUNT_POINTS - link_delta).max(0.0);

    if a.has_email == b.has_email {
        total += CONTENT_INDICATOR_POINTS;
    }
    if a.has_phone == b.has_phone {
        total += CONTENT_INDICATOR_POINTS;
    }

    total.clamp(0.0, 100.0)
}

/// Per level: matching tag is one point, a shared class (or two classless
/// levels) half a point, normalized so identical chains score 1.0
pub fn parent_chain_similarity(a: &[ParentLevel], b: &[ParentLevel]) -> f64 {
    let length = a.len().max(b.len());
    if length == 0 {
        return 1.0;
    }

    let mut points = 0.0;
    for (left, right) in a.iter().zip(b.iter()) {
        if left.tag == right.tag {
            points += 1.0;
        }
        let overlap = if left.classes.is_empty() && right.classes.is_empty() {
            true
        } else {
            left.classes.iter().any(|c| right.classes.contains(c))
        };
        if overlap {
            points += PARENT_CLASS_CREDIT;
        }
    }

    points / (length as f64 * (1.0 + PARENT_CLASS_CREDIT))
}

/// `max(0, 1 - |delta| / 10)`
pub fn child_count_similarity(a: usize, b: usize) -> f64 {
    (1.0 - a.abs_diff(b) as f64 / 10.0).max(0.0)
}

fn histogram_similarity(a: &StructuralSignature, b: &StructuralSignature) -> f64 {
    let tags: BTreeSet<&String> = a
        .child_tag_histogram
        .keys()
        .chain(b.child_tag_histogram.keys())
        .collect();
    if tags.is_empty() {
        return 1.0;
    }

    let sum: f64 = tags
        .iter()
        .map(|tag| {
            let left = a.child_tag_histogram.get(*tag).copied().unwrap_or(0) as f64;
            let right = b.child_tag_histogram.get(*tag).copied().unwrap_or(0) as f64;
            left.min(right) / left.max(right)
        })
        .sum();
    sum / tags.len() as f64
}

/// Dice coefficient; two empty sets are identical
fn dice(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let shared = a.intersection(b).count() as f64;
    2.0 * shared / (a.len() + b.len()) as f64
}

pub fn visual_similarity(a: &VisualProperties, b: &VisualProperties) -> f64 {
    let mut total = 0.0;

    let size = (ratio(a.bounds.width, b.bounds.width) + ratio(a.bounds.height, b.bounds.height)) / 2.0;
    total += SIZE_WEIGHT * size;

    let aspect = (1.0 - (a.aspect_ratio - b.aspect_ratio).abs() / 2.0).max(0.0);
    total += ASPECT_WEIGHT * aspect;

    if a.display == b.display {
        total += DISPLAY_WEIGHT;
    }

    let margins: f64 = a
        .margins
        .as_array()
        .iter()
        .zip(b.margins.as_array().iter())
        .map(|(m1, m2)| {
            let scale = m1.abs().max(m2.abs()).max(1.0);
            (1.0 - (m1 - m2).abs() / scale).max(0.0)
        })
        .sum::<f64>()
        / 4.0;
    total += MARGIN_WEIGHT * margins;

    if a.has_shadow == b.has_shadow {
        total += SHADOW_POINTS;
    }
    if a.border_radius == b.border_radius {
        total += RADIUS_POINTS;
    }

    total.clamp(0.0, 100.0)
}

/// min/max ratio; two zero lengths count as identical
fn ratio(a: f64, b: f64) -> f64 {
    let high = a.max(b);
    if high <= 0.0 {
        return 1.0;
    }
    a.min(b).max(0.0) / high
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{Edges, Rect};
    use std::collections::BTreeMap;

    fn signature() -> StructuralSignature {
        StructuralSignature {
            tag: "div".to_string(),
            parent_chain: vec![
                ParentLevel {
                    tag: "section".to_string(),
                    classes: vec!["team".to_string()],
                },
                ParentLevel {
                    tag: "main".to_string(),
                    classes: vec![],
                },
            ],
            child_count: 4,
            child_tag_histogram: BTreeMap::from([("h3".to_string(), 1), ("p".to_string(), 3)]),
            child_depth: 2,
            class_patterns: BTreeSet::from(["card".to_string(), "member-*".to_string()]),
            has_links: true,
            link_count: 2,
            has_images: true,
            image_count: 1,
            has_text: true,
            text_node_count: 4,
            has_email: true,
            has_phone: false,
        }
    }

    fn visual() -> VisualProperties {
        VisualProperties {
            bounds: Rect::new(0.0, 0.0, 300.0, 200.0),
            aspect_ratio: 1.5,
            area: 60000.0,
            index_in_parent: 0,
            sibling_count: 5,
            margins: Edges::new(8.0, 0.0, 8.0, 0.0),
            padding: Edges::uniform(12.0),
            display: "flex".to_string(),
            position: "static".to_string(),
            background_color: "rgb(255, 255, 255)".to_string(),
            border_radius: "4px".to_string(),
            has_shadow: true,
        }
    }

    #[test]
    fn test_self_similarity_is_maximal() {
        let s = signature();
        let v = visual();
        assert_eq!(structural_similarity(&s, &s), 100.0);
        assert_eq!(visual_similarity(&v, &v), 100.0);
        assert_eq!(score((&s, &v), (&s, &v)).hybrid, 100);
    }

    #[test]
    fn test_child_count_decay_is_monotonic() {
        let mut previous = f64::MAX;
        for other in 4..20 {
            let current = child_count_similarity(4, other);
            assert!(current <= previous);
            previous = current;
        }
        assert_eq!(child_count_similarity(0, 10), 0.0);
        assert_eq!(child_count_similarity(0, 25), 0.0);
    }

    #[test]
    fn test_tag_mismatch_costs_tag_weight() {
        let a = signature();
        let mut b = signature();
        b.tag = "li".to_string();
        assert_eq!(structural_similarity(&a, &b), 80.0);
    }

    #[test]
    fn test_parent_chain_partial() {
        let a = signature().parent_chain;
        let mut b = a.clone();
        b[0].classes = vec!["other".to_string()];
        // (1 + 1 + 0.5) / 3
        assert!((parent_chain_similarity(&a, &b) - 2.5 / 3.0).abs() < 1e-9);
        assert_eq!(parent_chain_similarity(&[], &[]), 1.0);
        assert_eq!(parent_chain_similarity(&a, &[]), 0.0);
    }

    #[test]
    fn test_visual_size_halving() {
        let a = visual();
        let mut b = visual();
        b.bounds = Rect::new(0.0, 0.0, 150.0, 100.0);
        // size 0.5 * 30, aspect unchanged
        assert_eq!(visual_similarity(&a, &b), 85.0);
    }

    #[test]
    fn test_hybrid_weighting() {
        assert_eq!(hybrid_score(100.0, 0.0), 60);
        assert_eq!(hybrid_score(0.0, 100.0), 40);
        assert_eq!(hybrid_score(50.0, 50.0), 50);
        assert_eq!(STRUCTURAL_WEIGHT + VISUAL_WEIGHT, 1.0);
    }
}
