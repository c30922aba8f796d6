use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::browser::{capture_snapshot, BrowserManager, HttpTextRecognizer, ScreenshotRecognizer, Viewport};
use crate::error::{AppError, AppResult};
use crate::models::{CreateSessionRequest, GenericResponse, NavigateRequest, SessionResponse};
use crate::page::PageSnapshot;

use super::super::state::{AppState, Session};

/// Capture the browser's page, attaching a text recognizer when `OCR_URL` is set
async fn capture(state: &AppState, browser: &BrowserManager) -> AppResult<PageSnapshot> {
    let snapshot = capture_snapshot(browser).await?;
    let Some(ocr_url) = state.config.ocr_url.as_deref() else {
        return Ok(snapshot);
    };
    match browser.page().await {
        Some(page) => {
            let recognizer = ScreenshotRecognizer::new(page, HttpTextRecognizer::new(ocr_url));
            Ok(snapshot.with_text_recognizer(Arc::new(recognizer)))
        }
        None => Ok(snapshot),
    }
}

/// Launch a browser on `url` and capture the page
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateSessionRequest>,
) -> AppResult<Json<SessionResponse>> {
    if request.url.trim().is_empty() {
        return Err(AppError::ValidationError("url must not be empty".to_string()));
    }

    let session_id = Uuid::new_v4().to_string();
    let browser = Arc::new(BrowserManager::with_pacing(state.config.pacing.clone()));
    let headless = request.headless.unwrap_or(state.config.headless);
    let viewport = Viewport {
        width: request.viewport_width,
        height: request.viewport_height,
    };

    browser
        .launch(&request.url, headless, viewport)
        .await
        .map_err(|e| AppError::BrowserError(e.to_string()))?;

    let snapshot = match capture(&state, &browser).await {
        Ok(snapshot) => Arc::new(snapshot),
        Err(e) => {
            let _ = browser.close().await;
            return Err(e);
        }
    };
    let url = browser
        .current_url()
        .await
        .unwrap_or_else(|_| request.url.clone());
    let captured_at = Utc::now();

    let response = SessionResponse {
        session_id: session_id.clone(),
        url: url.clone(),
        element_count: snapshot.element_count(),
        captured_at: captured_at.to_rfc3339(),
    };

    state.sessions.insert(
        session_id.clone(),
        Session {
            browser,
            url,
            snapshot,
            captured_at,
        },
    );
    tracing::info!("Created session {} ({} elements)", session_id, response.element_count);

    Ok(Json(response))
}

/// Re-capture a session's page (after scrolling, pagination, etc.)
pub async fn recapture(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> AppResult<Json<SessionResponse>> {
    let browser = state.browser(&session_id)?;
    let snapshot = Arc::new(capture(&state, &browser).await?);
    let url = browser.current_url().await.unwrap_or_default();
    let element_count = snapshot.element_count();

    if !state.replace_snapshot(&session_id, snapshot) {
        return Err(AppError::SessionNotFound(session_id));
    }

    Ok(Json(SessionResponse {
        session_id,
        url,
        element_count,
        captured_at: Utc::now().to_rfc3339(),
    }))
}

/// Load another URL in the session's browser and capture it
pub async fn navigate(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(request): Json<NavigateRequest>,
) -> AppResult<Json<SessionResponse>> {
    if request.url.trim().is_empty() {
        return Err(AppError::ValidationError("url must not be empty".to_string()));
    }
    let browser = state.browser(&session_id)?;
    browser
        .navigate(&request.url)
        .await
        .map_err(|e| AppError::BrowserError(e.to_string()))?;
    tracing::info!("Session {} navigated to {}", session_id, request.url);

    recapture(State(state), Path(session_id)).await
}

pub async fn close_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> AppResult<Json<GenericResponse>> {
    let (_, session) = state
        .sessions
        .remove(&session_id)
        .ok_or_else(|| AppError::SessionNotFound(session_id.clone()))?;

    if let Err(e) = session.browser.close().await {
        tracing::warn!("Failed to close browser for session {}: {}", session_id, e);
    }
    tracing::info!("Closed session {}", session_id);

    Ok(Json(GenericResponse {
        status: "closed".to_string(),
    }))
}
