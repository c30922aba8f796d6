use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::ScrapeError;
use crate::page::{ElementId, GatedPage, PageAdapter};

use super::engine::{CardExtraction, ExtractionEngine};
use super::method::FieldConfig;

/// One successfully extracted card
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedCard {
    /// Position in the input card list
    pub index: usize,
    pub element: ElementId,
    pub extraction: CardExtraction,
}

/// A card whose extraction could not complete
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardFailure {
    pub index: usize,
    pub element: ElementId,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchOutcome {
    /// In input order
    pub cards: Vec<ExtractedCard>,
    pub failures: Vec<CardFailure>,
}

/// Extract every card with at most `workers` cards in flight.
///
/// Output preserves input order. A failing card becomes a [`CardFailure`]
/// and never stops the batch.
pub async fn extract_cards(
    page: Arc<dyn PageAdapter>,
    cards: &[ElementId],
    configs: &[FieldConfig],
    workers: usize,
) -> BatchOutcome {
    let page = GatedPage::wrap_if_needed(page);
    let workers = workers.max(1);

    let results: Vec<(usize, ElementId, Result<CardExtraction, ScrapeError>)> =
        stream::iter(cards.iter().copied().enumerate())
            .map(|(index, card)| {
                let page = Arc::clone(&page);
                async move {
                    let result = ExtractionEngine::new(page.as_ref())
                        .extract_all_fields(card, configs)
                        .await;
                    (index, card, result)
                }
            })
            .buffered(workers)
            .collect()
            .await;

    let mut outcome = BatchOutcome::default();
    for (index, element, result) in results {
        match result {
            Ok(extraction) => outcome.cards.push(ExtractedCard {
                index,
                element,
                extraction,
            }),
            Err(e) => {
                let err = ScrapeError::CardBatchElement {
                    index,
                    message: e.to_string(),
                };
                tracing::warn!("{}", err);
                outcome.failures.push(CardFailure {
                    index,
                    element,
                    error: err.to_string(),
                });
            }
        }
    }

    tracing::info!(
        "Extracted {} cards ({} failed) with {} workers",
        outcome.cards.len(),
        outcome.failures.len(),
        workers
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::method::ExtractionConfig;
    use crate::extraction::FieldName;
    use crate::page::{ElementSpec, PageSnapshot};

    #[tokio::test]
    async fn test_order_preserved_and_failures_isolated() {
        let mut b = PageSnapshot::builder("https://example.com");
        let body = b.element(None, ElementSpec::new("body"));
        let mut cards = Vec::new();
        for i in 0..5 {
            let card = b.element(Some(body), ElementSpec::new("div").class("card"));
            b.element(
                Some(card),
                ElementSpec::new("a").attr("href", &format!("mailto:p{}@firm.com", i)),
            );
            cards.push(card);
        }
        // Handle that does not exist in the snapshot
        cards.insert(2, ElementId(999));
        let page: Arc<dyn PageAdapter> = Arc::new(b.build());

        let configs = ExtractionConfig::default_contact().to_field_configs();
        let outcome = extract_cards(page, &cards, &configs, 3).await;

        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].index, 2);
        let emails: Vec<_> = outcome
            .cards
            .iter()
            .map(|c| c.extraction.value(FieldName::Email).unwrap_or_default().to_string())
            .collect();
        assert_eq!(
            emails,
            vec!["p0@firm.com", "p1@firm.com", "p2@firm.com", "p3@firm.com", "p4@firm.com"]
        );
        assert_eq!(
            outcome.cards.iter().map(|c| c.index).collect::<Vec<_>>(),
            vec![0, 1, 3, 4, 5]
        );
    }
}
