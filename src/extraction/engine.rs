use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

use crate::error::Result;
use crate::page::{ElementId, PageAdapter, Rect};

use super::method::{ExtractionMethod, FieldConfig, FieldName, MethodTag, EXTRACTION_ORDER};
use super::methods::{execute, MethodContext, ResolvedFields};
use super::validate::FieldValidator;

/// What happened when one method ran for one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "message", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Accepted,
    /// Ran cleanly but produced nothing
    Empty,
    /// Produced a value the field's validator refused
    Rejected,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodAttempt {
    pub method: MethodTag,
    pub priority: u32,
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
}

/// Outcome of one field on one card, with provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub value: Option<String>,
    pub method_used: Option<MethodTag>,
    /// 0-1; zero when nothing was accepted
    pub confidence: f64,
    pub validated: bool,
    /// Methods actually invoked, in invocation order
    pub attempts: Vec<MethodAttempt>,
}

impl ExtractionResult {
    fn exhausted(attempts: Vec<MethodAttempt>) -> Self {
        Self {
            value: None,
            method_used: None,
            confidence: 0.0,
            validated: false,
            attempts,
        }
    }
}

/// All configured fields of one card
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardExtraction {
    pub values: BTreeMap<FieldName, Option<String>>,
    pub results: BTreeMap<FieldName, ExtractionResult>,
}

impl CardExtraction {
    pub fn value(&self, field: FieldName) -> Option<&str> {
        self.values.get(&field).and_then(|v| v.as_deref())
    }

    pub fn confidence(&self, field: FieldName) -> f64 {
        self.results.get(&field).map_or(0.0, |r| r.confidence)
    }
}

/// Multi-method field extraction against one page.
///
/// Fields run in [`EXTRACTION_ORDER`]; within a field, methods run by
/// ascending priority (stable on ties) until one yields a non-empty value the
/// field's validator accepts. Method failures are recorded and skipped.
pub struct ExtractionEngine<'a> {
    page: &'a dyn PageAdapter,
}

impl<'a> ExtractionEngine<'a> {
    pub fn new(page: &'a dyn PageAdapter) -> Self {
        Self { page }
    }

    pub async fn extract_all_fields(
        &self,
        card: ElementId,
        configs: &[FieldConfig],
    ) -> Result<CardExtraction> {
        let card_box = self.page.bounding_box(card).await?;
        let page_url = self
            .page
            .page_url()
            .await?
            .and_then(|u| Url::parse(&u).ok());

        let mut resolved = ResolvedFields::new();
        let mut extraction = CardExtraction::default();

        for field in EXTRACTION_ORDER {
            let Some(config) = configs.iter().find(|c| c.field == field) else {
                continue;
            };
            let result = self
                .extract_field(card, card_box, config, &resolved, page_url.as_ref())
                .await;
            if let Some(value) = &result.value {
                resolved.insert(field, value.clone());
            }
            extraction.values.insert(field, result.value.clone());
            extraction.results.insert(field, result);
        }

        tracing::debug!(
            "Card {}: {}/{} fields resolved",
            card,
            resolved.len(),
            extraction.results.len()
        );
        Ok(extraction)
    }

    async fn extract_field(
        &self,
        card: ElementId,
        card_box: Rect,
        config: &FieldConfig,
        resolved: &ResolvedFields,
        page_url: Option<&Url>,
    ) -> ExtractionResult {
        let ctx = MethodContext {
            page: self.page,
            card,
            card_box,
            field: config.field,
            resolved,
            page_url,
        };

        let mut ordered: Vec<&ExtractionMethod> = config.methods.iter().collect();
        ordered.sort_by_key(|m| m.priority);

        let mut attempts = Vec::with_capacity(ordered.len());
        for method in ordered {
            let tag = method.tag();
            let outcome = match execute(&method.kind, &ctx).await {
                Err(e) => {
                    tracing::debug!("{} on card {}: {}", config.field, card, e);
                    AttemptOutcome::Failed(e.to_string())
                }
                Ok(None) => AttemptOutcome::Empty,
                Ok(Some(raw)) => {
                    let value = raw.text.trim();
                    if value.is_empty() {
                        AttemptOutcome::Empty
                    } else if FieldValidator::validate(config.validator, value) {
                        attempts.push(MethodAttempt {
                            method: tag,
                            priority: method.priority,
                            outcome: AttemptOutcome::Accepted,
                        });
                        return ExtractionResult {
                            value: Some(value.to_string()),
                            method_used: Some(tag),
                            confidence: raw.confidence.unwrap_or(method.confidence),
                            validated: true,
                            attempts,
                        };
                    } else {
                        tracing::debug!(
                            "{} via {} rejected on card {}: {:?}",
                            config.field,
                            tag,
                            card,
                            value
                        );
                        AttemptOutcome::Rejected
                    }
                }
            };
            attempts.push(MethodAttempt {
                method: tag,
                priority: method.priority,
                outcome,
            });
        }

        ExtractionResult::exhausted(attempts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::method::{ExtractionConfig, MethodKind};
    use crate::page::{ElementSpec, PageSnapshot};

    fn method(priority: u32, kind: MethodKind) -> ExtractionMethod {
        ExtractionMethod::new(priority, kind, 0.9)
    }

    #[tokio::test]
    async fn test_priority_order_is_stable_and_stops_at_first_accept() {
        let mut b = PageSnapshot::builder("https://example.com");
        let card = b.element(None, ElementSpec::new("div").bounds(0.0, 0.0, 200.0, 100.0));
        b.element(Some(card), ElementSpec::new("span").class("a").text("not an email"));
        b.element(Some(card), ElementSpec::new("span").class("b").text("x@y.io"));
        b.element(Some(card), ElementSpec::new("span").class("c").text("z@y.io"));
        let page = b.build();

        let config = FieldConfig::new(
            FieldName::Email,
            vec![
                method(5, MethodKind::SelectorAttribute { selector: ".c".into(), attribute: None }),
                method(1, MethodKind::SelectorAttribute { selector: ".a".into(), attribute: None }),
                method(1, MethodKind::SelectorAttribute { selector: ".b".into(), attribute: None }),
            ],
        );

        let out = ExtractionEngine::new(&page)
            .extract_all_fields(card, &[config])
            .await
            .unwrap();
        let result = &out.results[&FieldName::Email];
        assert_eq!(result.value.as_deref(), Some("x@y.io"));
        assert_eq!(
            result.attempts.iter().map(|a| a.outcome.clone()).collect::<Vec<_>>(),
            vec![AttemptOutcome::Rejected, AttemptOutcome::Accepted]
        );
        assert!(result.attempts.iter().all(|a| a.priority == 1));
    }

    #[tokio::test]
    async fn test_exhausted_field_is_null_not_error() {
        let mut b = PageSnapshot::builder("https://example.com");
        let card = b.element(None, ElementSpec::new("div").text("nothing useful"));
        let page = b.build();

        let configs = ExtractionConfig::default_contact().to_field_configs();
        let out = ExtractionEngine::new(&page)
            .extract_all_fields(card, &configs)
            .await
            .unwrap();
        assert_eq!(out.values.get(&FieldName::Email), Some(&None));
        assert_eq!(out.value(FieldName::Phone), None);
        assert!(!out.results[&FieldName::Email].validated);
        assert_eq!(out.confidence(FieldName::Email), 0.0);
    }

    #[test]
    fn test_attempt_wire_format() {
        let attempt = MethodAttempt {
            method: MethodTag::TextPattern,
            priority: 2,
            outcome: AttemptOutcome::Failed("boom".into()),
        };
        assert_eq!(
            serde_json::to_value(&attempt).unwrap(),
            serde_json::json!({"method": "text-pattern", "priority": 2, "outcome": "failed", "message": "boom"})
        );
    }
}
