//! Field extraction over in-memory card fixtures.
//!
//! Run with: cargo test --test field_extraction

mod common;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use card_extractor::extraction::{
    patterns::EMAIL_PATTERN, AttemptOutcome, Direction, ExtractionResult,
};
use card_extractor::models::{BatchStats, ContactRecord, RecordPolicy};
use card_extractor::page::{
    ComputedStyle, ElementId, ElementSpec, OcrText, PageAdapter, PageSnapshot, Rect,
};
use card_extractor::{
    extract_cards, Result as ScrapeResult, ExtractionConfig, ExtractionEngine, ExtractionMethod, FieldConfig, FieldName,
    MethodKind, MethodTag,
};

use common::{email_for, ten_card_directory};

fn mailto(priority: u32) -> ExtractionMethod {
    ExtractionMethod::new(
        priority,
        MethodKind::LinkAttribute {
            scheme: "mailto:".to_string(),
        },
        0.95,
    )
}

fn email_text(priority: u32) -> ExtractionMethod {
    ExtractionMethod::new(
        priority,
        MethodKind::TextPattern {
            pattern: EMAIL_PATTERN.to_string(),
            group: 0,
        },
        0.85,
    )
}

async fn extract_one(page: &PageSnapshot, card: ElementId, configs: &[FieldConfig]) -> Vec<(FieldName, ExtractionResult)> {
    ExtractionEngine::new(page)
        .extract_all_fields(card, configs)
        .await
        .unwrap()
        .results
        .into_iter()
        .collect()
}

// ============================================================================
// Method fallback
// ============================================================================

#[tokio::test]
async fn test_every_card_yields_its_mailto_address() {
    let directory = ten_card_directory();
    let page: Arc<dyn PageAdapter> = Arc::new(directory.page);
    let configs = ExtractionConfig::default_contact().to_field_configs();

    let outcome = extract_cards(page, &directory.cards, &configs, 4).await;

    assert!(outcome.failures.is_empty());
    assert_eq!(outcome.cards.len(), 10);
    for (i, card) in outcome.cards.iter().enumerate() {
        assert_eq!(card.index, i);
        let email = &card.extraction.results[&FieldName::Email];
        assert_eq!(email.value.as_deref(), Some(email_for(i).as_str()));
        assert_eq!(email.method_used, Some(MethodTag::LinkAttribute));
        assert!(email.validated);
        assert_eq!(card.extraction.value(FieldName::Title), Some("Senior Partner"));
    }
}

#[tokio::test]
async fn test_text_pattern_used_when_no_contact_link() {
    let mut b = PageSnapshot::builder("https://example.com/team");
    let card = b.element(
        None,
        ElementSpec::new("div")
            .text("Reach me at a@b.com")
            .bounds(0.0, 0.0, 300.0, 100.0),
    );
    let page = b.build();

    let config = FieldConfig::new(FieldName::Email, vec![email_text(2), mailto(1)]);
    let results = extract_one(&page, card, &[config]).await;
    let (_, email) = &results[0];

    assert_eq!(email.value.as_deref(), Some("a@b.com"));
    assert_eq!(email.method_used, Some(MethodTag::TextPattern));
    assert_eq!(email.confidence, 0.85);
    let tried: Vec<_> = email.attempts.iter().map(|a| (a.method, a.outcome.clone())).collect();
    assert_eq!(
        tried,
        vec![
            (MethodTag::LinkAttribute, AttemptOutcome::Empty),
            (MethodTag::TextPattern, AttemptOutcome::Accepted),
        ]
    );
}

#[tokio::test]
async fn test_proximity_picks_nearest_text_above_anchor() {
    let mut b = PageSnapshot::builder("https://example.com/team");
    let card = b.element(None, ElementSpec::new("div").bounds(0.0, 0.0, 300.0, 300.0));
    b.element(
        Some(card),
        ElementSpec::new("div").text("Practice Group Lead").bounds(10.0, 0.0, 200.0, 20.0),
    );
    b.element(
        Some(card),
        ElementSpec::new("span").text("Jane Doe").bounds(10.0, 40.0, 200.0, 20.0),
    );
    b.element(
        Some(card),
        ElementSpec::new("a")
            .attr("href", "mailto:jane@firm.com")
            .text("jane@firm.com")
            .bounds(10.0, 100.0, 200.0, 20.0),
    );
    b.element(
        Some(card),
        ElementSpec::new("p").text("Downtown Office").bounds(10.0, 125.0, 200.0, 20.0),
    );
    let page = b.build();

    let configs = vec![
        FieldConfig::new(FieldName::Email, vec![mailto(1)]),
        FieldConfig::new(
            FieldName::Name,
            vec![ExtractionMethod::new(
                1,
                MethodKind::ProximityToAnchor {
                    anchor_field: FieldName::Email,
                    direction: Direction::Above,
                    max_distance: 200.0,
                },
                0.6,
            )],
        ),
    ];

    let out = ExtractionEngine::new(&page)
        .extract_all_fields(card, &configs)
        .await
        .unwrap();
    assert_eq!(out.value(FieldName::Email), Some("jane@firm.com"));
    assert_eq!(out.value(FieldName::Name), Some("Jane Doe"));
    assert_eq!(
        out.results[&FieldName::Name].method_used,
        Some(MethodTag::ProximityToAnchor)
    );
}

#[tokio::test]
async fn test_proximity_without_resolved_anchor_is_empty() {
    let mut b = PageSnapshot::builder("https://example.com/team");
    let card = b.element(None, ElementSpec::new("div").bounds(0.0, 0.0, 300.0, 300.0));
    b.element(
        Some(card),
        ElementSpec::new("span").text("Jane Doe").bounds(10.0, 40.0, 200.0, 20.0),
    );
    let page = b.build();

    let config = FieldConfig::new(
        FieldName::Name,
        vec![ExtractionMethod::new(
            1,
            MethodKind::ProximityToAnchor {
                anchor_field: FieldName::Email,
                direction: Direction::Above,
                max_distance: 200.0,
            },
            0.6,
        )],
    );
    let results = extract_one(&page, card, &[config]).await;
    let (_, name) = &results[0];
    assert_eq!(name.value, None);
    assert_eq!(name.attempts[0].outcome, AttemptOutcome::Empty);
}

// ============================================================================
// Validation gating
// ============================================================================

#[tokio::test]
async fn test_invalid_value_is_never_returned() {
    let mut b = PageSnapshot::builder("https://example.com/team");
    let card = b.element(None, ElementSpec::new("div").bounds(0.0, 0.0, 300.0, 100.0));
    b.element(
        Some(card),
        ElementSpec::new("span").class("email").text("abc").bounds(0.0, 0.0, 100.0, 20.0),
    );
    let page = b.build();

    let config = FieldConfig::new(
        FieldName::Email,
        vec![ExtractionMethod::new(
            1,
            MethodKind::SelectorAttribute {
                selector: ".email".to_string(),
                attribute: None,
            },
            0.9,
        )],
    );
    let results = extract_one(&page, card, &[config]).await;
    let (_, email) = &results[0];

    assert_eq!(email.value, None);
    assert_eq!(email.method_used, None);
    assert!(!email.validated);
    assert_eq!(email.attempts[0].outcome, AttemptOutcome::Rejected);
}

#[tokio::test]
async fn test_bad_pattern_fails_method_not_card() {
    let mut b = PageSnapshot::builder("https://example.com/team");
    let card = b.element(None, ElementSpec::new("div").text("x@y.io").bounds(0.0, 0.0, 300.0, 100.0));
    let page = b.build();

    let broken = ExtractionMethod::new(
        1,
        MethodKind::TextPattern {
            pattern: "([unclosed".to_string(),
            group: 0,
        },
        0.9,
    );
    let config = FieldConfig::new(FieldName::Email, vec![broken, email_text(2)]);
    let results = extract_one(&page, card, &[config]).await;
    let (_, email) = &results[0];

    assert_eq!(email.value.as_deref(), Some("x@y.io"));
    assert!(matches!(email.attempts[0].outcome, AttemptOutcome::Failed(_)));
}

// ============================================================================
// Configuration and batches
// ============================================================================

#[test]
fn test_default_config_survives_json() {
    let config = ExtractionConfig::default_contact();
    let json = config.to_json().unwrap();
    let parsed = ExtractionConfig::from_json(&json).unwrap();

    assert_eq!(parsed, config);
    assert_eq!(parsed.to_field_configs(), config.to_field_configs());
}

#[test]
fn test_out_of_range_confidence_is_rejected() {
    let json = r#"{"email": [{"priority": 1, "kind": "link-attribute", "params": {"scheme": "mailto:"}, "confidence": 1.5}]}"#;
    assert!(ExtractionConfig::from_json(json).is_err());
}

#[tokio::test]
async fn test_failing_card_does_not_stop_batch() {
    let directory = ten_card_directory();
    let cards = vec![directory.cards[0], ElementId(9999), directory.cards[1]];
    let page: Arc<dyn PageAdapter> = Arc::new(directory.page);
    let configs = ExtractionConfig::default_contact().to_field_configs();

    let outcome = extract_cards(page, &cards, &configs, 2).await;

    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].index, 1);
    assert_eq!(outcome.failures[0].element, ElementId(9999));
    assert_eq!(
        outcome.cards.iter().map(|c| c.index).collect::<Vec<_>>(),
        vec![0, 2]
    );
    assert_eq!(outcome.cards[1].extraction.value(FieldName::Email), Some(email_for(1).as_str()));
}

#[tokio::test]
async fn test_records_and_stats_from_batch() {
    let directory = ten_card_directory();
    let page: Arc<dyn PageAdapter> = Arc::new(directory.page);
    let configs = ExtractionConfig::default_contact().to_field_configs();
    let outcome = extract_cards(page, &directory.cards, &configs, 3).await;

    let policy = RecordPolicy {
        required_fields: vec![FieldName::Email],
        derive_name_from_email: false,
    };
    let records: Vec<ContactRecord> = outcome
        .cards
        .iter()
        .map(|card| ContactRecord::from_extraction(card.index, 100, &card.extraction, &policy))
        .collect::<Result<_, _>>()
        .unwrap();

    let stats = BatchStats::from_records(&records);
    assert_eq!(stats.total, 10);
    assert_eq!(stats.with_email, 10);
    assert_eq!(stats.unique_domains, 1);
    assert_eq!(stats.top_domains[0].domain, "lawfirm.com");
    assert_eq!(stats.top_domains[0].count, 10);
    assert_eq!(records[3].name.as_deref(), Some("Person Delta"));
}

// ============================================================================
// Single-threaded pages
// ============================================================================

/// Snapshot wrapper that records how many adapter calls overlap
struct CountingPage {
    inner: PageSnapshot,
    concurrent: bool,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl CountingPage {
    fn new(inner: PageSnapshot, concurrent: bool) -> Self {
        Self {
            inner,
            concurrent,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    async fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        // Give other workers a chance to start a call while this one is open
        tokio::task::yield_now().await;
    }

    fn exit(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    async fn counted<T>(&self, call: impl std::future::Future<Output = T>) -> T {
        self.enter().await;
        let out = call.await;
        self.exit();
        out
    }
}

#[async_trait]
impl PageAdapter for CountingPage {
    async fn page_url(&self) -> ScrapeResult<Option<String>> {
        self.counted(self.inner.page_url()).await
    }

    async fn element_at_point(&self, x: f64, y: f64) -> ScrapeResult<Option<ElementId>> {
        self.counted(self.inner.element_at_point(x, y)).await
    }

    async fn bounding_box(&self, element: ElementId) -> ScrapeResult<Rect> {
        self.counted(self.inner.bounding_box(element)).await
    }

    async fn computed_style(&self, element: ElementId) -> ScrapeResult<ComputedStyle> {
        self.counted(self.inner.computed_style(element)).await
    }

    async fn tag_name(&self, element: ElementId) -> ScrapeResult<String> {
        self.counted(self.inner.tag_name(element)).await
    }

    async fn attributes(&self, element: ElementId) -> ScrapeResult<BTreeMap<String, String>> {
        self.counted(self.inner.attributes(element)).await
    }

    async fn visible_text(&self, element: ElementId) -> ScrapeResult<String> {
        self.counted(self.inner.visible_text(element)).await
    }

    async fn own_text(&self, element: ElementId) -> ScrapeResult<String> {
        self.counted(self.inner.own_text(element)).await
    }

    async fn parent(&self, element: ElementId) -> ScrapeResult<Option<ElementId>> {
        self.counted(self.inner.parent(element)).await
    }

    async fn children(&self, element: ElementId) -> ScrapeResult<Vec<ElementId>> {
        self.counted(self.inner.children(element)).await
    }

    async fn query_selector_all(
        &self,
        scope: Option<ElementId>,
        selector: &str,
    ) -> ScrapeResult<Vec<ElementId>> {
        self.counted(self.inner.query_selector_all(scope, selector)).await
    }

    async fn recognize_text(&self, region: Rect) -> ScrapeResult<OcrText> {
        self.counted(self.inner.recognize_text(region)).await
    }

    fn supports_concurrent_reads(&self) -> bool {
        self.concurrent
    }
}

#[tokio::test]
async fn test_single_threaded_page_is_read_one_call_at_a_time() {
    let configs = ExtractionConfig::default_contact().to_field_configs();

    let free_directory = ten_card_directory();
    let free = Arc::new(CountingPage::new(free_directory.page, true));
    let free_outcome = extract_cards(free.clone(), &free_directory.cards, &configs, 4).await;

    let gated_directory = ten_card_directory();
    let gated = Arc::new(CountingPage::new(gated_directory.page, false));
    let gated_outcome = extract_cards(gated.clone(), &gated_directory.cards, &configs, 4).await;

    assert!(free.peak.load(Ordering::SeqCst) > 1);
    assert_eq!(gated.peak.load(Ordering::SeqCst), 1);
    assert_eq!(gated.in_flight.load(Ordering::SeqCst), 0);

    assert!(gated_outcome.failures.is_empty());
    assert_eq!(
        gated_outcome.cards.iter().map(|c| c.index).collect::<Vec<_>>(),
        (0..10).collect::<Vec<_>>()
    );
    assert_eq!(
        serde_json::to_value(&gated_outcome.cards).unwrap(),
        serde_json::to_value(&free_outcome.cards).unwrap()
    );
    assert_eq!(
        gated_outcome.cards[7].extraction.value(FieldName::Email),
        Some(email_for(7).as_str())
    );
}
