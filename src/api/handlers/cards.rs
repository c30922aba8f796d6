use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::extraction::{extract_cards, CardFailure, ExtractionConfig};
use crate::matching::{CardMatcher, MatchSet};
use crate::models::export;
use crate::models::{
    BatchStats, ContactRecord, ExportRequest, ExtractRequest, ExtractResponse, MatchRequest,
};
use crate::page::{PageAdapter, PageSnapshot, Rect};

use super::super::state::AppState;

fn threshold(state: &AppState, requested: Option<u8>) -> AppResult<u8> {
    match requested {
        Some(t) if t > 100 => Err(AppError::ValidationError(format!(
            "threshold must be within 0-100, got {}",
            t
        ))),
        Some(t) => Ok(t),
        None => Ok(state.config.match_threshold),
    }
}

async fn run_match(snapshot: &PageSnapshot, reference_box: Rect, threshold: u8) -> AppResult<MatchSet> {
    if !reference_box.has_area() {
        return Err(AppError::ValidationError(
            "reference_box must have a positive width and height".to_string(),
        ));
    }
    Ok(CardMatcher::new(snapshot)
        .find_similar_cards(reference_box, threshold)
        .await?)
}

/// Find every card similar to the selected one
pub async fn match_cards(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(request): Json<MatchRequest>,
) -> AppResult<Json<MatchSet>> {
    let snapshot = state.snapshot(&session_id)?;
    let threshold = threshold(&state, request.threshold)?;
    let match_set = run_match(&snapshot, request.reference_box, threshold).await?;
    Ok(Json(match_set))
}

/// Match cards, then extract a contact record from each
pub async fn extract(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(request): Json<ExtractRequest>,
) -> AppResult<Json<ExtractResponse>> {
    let snapshot = state.snapshot(&session_id)?;
    Ok(Json(run_extraction(&state, &session_id, &snapshot, request).await?))
}

/// Extract like [`extract`], answering with a JSON or CSV file of the records
pub async fn export_contacts(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(request): Json<ExportRequest>,
) -> AppResult<Response> {
    let snapshot = state.snapshot(&session_id)?;
    let format = request.format;
    let outcome = run_extraction(&state, &session_id, &snapshot, request.extract).await?;

    let now = Utc::now();
    let body = export::render(format, snapshot.url().unwrap_or_default(), &outcome.records, now)?;
    let disposition = format!("attachment; filename=\"{}\"", format.file_name(now));
    tracing::info!(
        "Session {}: exported {} records as {:?}",
        session_id,
        outcome.records.len(),
        format
    );

    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

async fn run_extraction(
    state: &AppState,
    session_id: &str,
    snapshot: &Arc<PageSnapshot>,
    request: ExtractRequest,
) -> AppResult<ExtractResponse> {
    let threshold = threshold(state, request.threshold)?;
    let match_set = run_match(snapshot, request.reference_box, threshold).await?;

    if !match_set.success {
        return Ok(ExtractResponse {
            match_set,
            records: Vec::new(),
            failures: Vec::new(),
            rejected: Vec::new(),
            stats: BatchStats::from_records(&[]),
        });
    }

    let config = request.config.unwrap_or_else(ExtractionConfig::default_contact);
    config.validate()?;
    let field_configs = config.to_field_configs();
    let cards: Vec<_> = match_set.matches.iter().map(|m| m.element).collect();
    let workers = request.workers.unwrap_or(state.config.extract_workers);

    let page: Arc<dyn PageAdapter> = snapshot.clone();
    let outcome = extract_cards(page, &cards, &field_configs, workers).await;

    let mut records = Vec::with_capacity(outcome.cards.len());
    let mut rejected = Vec::new();
    for card in &outcome.cards {
        let confidence = match_set.matches[card.index].confidence;
        match ContactRecord::from_extraction(card.index, confidence, &card.extraction, &request.policy) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::debug!("Card {} rejected by policy: {}", card.index, e);
                rejected.push(CardFailure {
                    index: card.index,
                    element: card.element,
                    error: e.to_string(),
                });
            }
        }
    }

    let stats = BatchStats::from_records(&records);
    tracing::info!(
        "Session {}: {} records from {} cards ({} failed, {} rejected)",
        session_id,
        records.len(),
        cards.len(),
        outcome.failures.len(),
        rejected.len()
    );

    Ok(ExtractResponse {
        match_set,
        records,
        failures: outcome.failures,
        rejected,
        stats,
    })
}
