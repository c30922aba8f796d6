//! Card similarity matching.
//!
//! Given a selection box around one example card, [`CardMatcher`] resolves the
//! card element, scores a candidate pool against it (60% structural, 40%
//! visual) and returns every card at or above the threshold, reference first.

pub mod candidates;
pub mod scorer;
pub mod selector_gen;
pub mod signature;
pub mod visual;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScrapeError};
use crate::page::{ElementId, PageAdapter, Rect};

pub use candidates::CandidateFinder;
pub use scorer::{SimilarityScore, STRUCTURAL_WEIGHT, VISUAL_WEIGHT};
pub use selector_gen::generate_selector;
pub use signature::{extract_structural_signature, StructuralSignature};
pub use visual::{extract_visual_properties, VisualProperties};

pub const DEFAULT_THRESHOLD: u8 = 65;

const MAX_ANCESTOR_WALK: usize = 10;
const MIN_SELECTION_OVERLAP: f64 = 0.5;

/// One element in a match set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateMatch {
    pub element: ElementId,
    #[serde(rename = "box")]
    pub bounds: Rect,
    /// 0-100; always 100 for the reference
    pub confidence: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structural_score: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visual_score: Option<u8>,
    pub is_reference: bool,
}

/// Result of [`CardMatcher::find_similar_cards`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchSet {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_signature: Option<StructuralSignature>,
    pub matches: Vec<CandidateMatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    pub total_found: usize,
}

impl MatchSet {
    fn failure(error: &ScrapeError) -> Self {
        Self {
            success: false,
            message: Some(error.to_string()),
            reference_signature: None,
            matches: Vec::new(),
            selector: None,
            total_found: 0,
        }
    }

    pub fn reference(&self) -> Option<&CandidateMatch> {
        self.matches.first().filter(|m| m.is_reference)
    }
}

pub struct CardMatcher<'a> {
    page: &'a dyn PageAdapter,
}

impl<'a> CardMatcher<'a> {
    pub fn new(page: &'a dyn PageAdapter) -> Self {
        Self { page }
    }

    /// Find every card similar to the one under `reference_box`.
    ///
    /// Selection failures (nothing under the box, no plausible card) come back
    /// as `success: false`; only adapter failures are returned as errors.
    pub async fn find_similar_cards(&self, reference_box: Rect, threshold: u8) -> Result<MatchSet> {
        match self.match_cards(reference_box, threshold).await {
            Ok(set) => Ok(set),
            Err(e) if e.is_selection_failure() => {
                tracing::info!("Card matching failed: {}", e);
                Ok(MatchSet::failure(&e))
            }
            Err(e) => Err(e),
        }
    }

    async fn match_cards(&self, reference_box: Rect, threshold: u8) -> Result<MatchSet> {
        let reference = self.identify_card(reference_box).await?;
        let reference_bounds = self.page.bounding_box(reference).await?;
        let reference_signature = extract_structural_signature(self.page, reference).await?;
        let reference_visual = extract_visual_properties(self.page, reference).await?;

        let pool = CandidateFinder::new(self.page).find(reference).await?;

        let mut kept = Vec::new();
        for candidate in pool {
            let (signature, visual) = match self.fingerprint(candidate).await {
                Ok(prints) => prints,
                Err(e) => {
                    tracing::debug!("Skipping candidate {}: {}", candidate, e);
                    continue;
                }
            };
            let similarity = scorer::score(
                (&reference_signature, &reference_visual),
                (&signature, &visual),
            );
            if similarity.hybrid >= threshold {
                kept.push(CandidateMatch {
                    element: candidate,
                    bounds: visual.bounds,
                    confidence: similarity.hybrid,
                    structural_score: Some(similarity.structural.round() as u8),
                    visual_score: Some(similarity.visual.round() as u8),
                    is_reference: false,
                });
            }
        }

        // Stable: equal scores keep candidate-pool order
        kept.sort_by(|a, b| b.confidence.cmp(&a.confidence));

        let mut matches = Vec::with_capacity(kept.len() + 1);
        matches.push(CandidateMatch {
            element: reference,
            bounds: reference_bounds,
            confidence: 100,
            structural_score: None,
            visual_score: None,
            is_reference: true,
        });
        matches.extend(kept);

        let selector = generate_selector(self.page, reference).await?;

        tracing::info!(
            "Matched {} cards at threshold {} (selector '{}')",
            matches.len(),
            threshold,
            selector
        );

        Ok(MatchSet {
            success: true,
            message: None,
            reference_signature: Some(reference_signature),
            total_found: matches.len(),
            matches,
            selector: Some(selector),
        })
    }

    async fn fingerprint(&self, element: ElementId) -> Result<(StructuralSignature, VisualProperties)> {
        Ok((
            extract_structural_signature(self.page, element).await?,
            extract_visual_properties(self.page, element).await?,
        ))
    }

    /// Resolve the card element best fitting the selection box.
    ///
    /// Starts at the element under the box center and walks up to ten
    /// ancestors, keeping the one with the best mean of overlap (IoU) and size
    /// similarity among those overlapping the box by more than half.
    pub async fn identify_card(&self, reference_box: Rect) -> Result<ElementId> {
        let (cx, cy) = reference_box.center();
        let hit = self
            .page
            .element_at_point(cx, cy)
            .await?
            .ok_or(ScrapeError::NoElementAtSelection { x: cx, y: cy })?;

        let mut best: Option<(ElementId, f64)> = None;
        let mut current = Some(hit);
        let mut walked = 0;
        while let Some(id) = current {
            if walked > MAX_ANCESTOR_WALK {
                break;
            }
            let bounds = self.page.bounding_box(id).await?;
            let overlap = bounds.iou(&reference_box);
            if overlap > MIN_SELECTION_OVERLAP {
                let size = size_similarity(&bounds, &reference_box);
                let fit = (overlap + size) / 2.0;
                if best.map_or(true, |(_, score)| fit > score) {
                    best = Some((id, fit));
                }
            }
            current = self.page.parent(id).await?;
            walked += 1;
        }

        best.map(|(id, _)| id).ok_or(ScrapeError::NoCardIdentified)
    }
}

fn size_similarity(a: &Rect, b: &Rect) -> f64 {
    let ratio = |x: f64, y: f64| {
        let high = x.max(y);
        if high <= 0.0 {
            0.0
        } else {
            x.min(y) / high
        }
    };
    (ratio(a.width, b.width) + ratio(a.height, b.height)) / 2.0
}
