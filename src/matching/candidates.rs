use std::collections::HashSet;

use crate::error::Result;
use crate::page::selector::escape_ident;
use crate::page::{class_list, ElementId, PageAdapter, Rect};

const MIN_SIZE_FACTOR: f64 = 0.5;
const MAX_SIZE_FACTOR: f64 = 2.0;
const MAX_CLASS_QUERIES: usize = 3;

/// Builds the deduplicated pool of elements worth scoring against a reference.
///
/// Three strategies are unioned: the reference's siblings, same-tag elements of
/// comparable size, and elements sharing one of the reference's longest
/// classes (also size-filtered). Order is first-seen, so the pool is stable for
/// a given page.
pub struct CandidateFinder<'a> {
    page: &'a dyn PageAdapter,
}

impl<'a> CandidateFinder<'a> {
    pub fn new(page: &'a dyn PageAdapter) -> Self {
        Self { page }
    }

    pub async fn find(&self, reference: ElementId) -> Result<Vec<ElementId>> {
        let reference_box = self.page.bounding_box(reference).await?;
        let tag = self.page.tag_name(reference).await?;

        let mut pool = CandidatePool::new(reference);

        if let Some(parent) = self.page.parent(reference).await? {
            for sibling in self.page.children(parent).await? {
                pool.push(sibling);
            }
        }
        let sibling_count = pool.len();

        for element in self.page.query_selector_all(None, &tag).await? {
            if self.is_comparable_size(element, &reference_box).await? {
                pool.push(element);
            }
        }
        let after_tag = pool.len();

        for class in longest_classes(&class_list(&self.page.attributes(reference).await?)) {
            for element in self
                .page
                .query_selector_all(None, &format!(".{}", class))
                .await?
            {
                if self.is_comparable_size(element, &reference_box).await? {
                    pool.push(element);
                }
            }
        }

        tracing::debug!(
            "Candidate pool: {} siblings, {} by tag, {} by class ({} total)",
            sibling_count,
            after_tag - sibling_count,
            pool.len() - after_tag,
            pool.len()
        );

        Ok(pool.into_vec())
    }

    async fn is_comparable_size(&self, element: ElementId, reference: &Rect) -> Result<bool> {
        let bounds = self.page.bounding_box(element).await?;
        Ok(within_factor(bounds.width, reference.width)
            && within_factor(bounds.height, reference.height))
    }
}

fn within_factor(value: f64, reference: f64) -> bool {
    value >= reference * MIN_SIZE_FACTOR && value <= reference * MAX_SIZE_FACTOR
}

/// Up to three class names, longest first (stable on ties), escaped for use in a selector
fn longest_classes(classes: &[String]) -> Vec<String> {
    let mut usable: Vec<&String> = classes.iter().filter(|c| !c.is_empty()).collect();
    usable.dedup();
    usable.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));
    usable
        .into_iter()
        .take(MAX_CLASS_QUERIES)
        .map(|c| escape_ident(c))
        .collect()
}

/// Insertion-ordered set of candidates that never contains the reference
struct CandidatePool {
    reference: ElementId,
    seen: HashSet<ElementId>,
    ordered: Vec<ElementId>,
}

impl CandidatePool {
    fn new(reference: ElementId) -> Self {
        Self {
            reference,
            seen: HashSet::new(),
            ordered: Vec::new(),
        }
    }

    fn push(&mut self, element: ElementId) {
        if element != self.reference && self.seen.insert(element) {
            self.ordered.push(element);
        }
    }

    fn len(&self) -> usize {
        self.ordered.len()
    }

    fn into_vec(self) -> Vec<ElementId> {
        self.ordered
    }
}
