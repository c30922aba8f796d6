use serde::Serialize;

use crate::extraction::CardFailure;
use crate::matching::MatchSet;

use super::contact::{BatchStats, ContactRecord};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub active_sessions: usize,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub url: String,
    pub element_count: usize,
    pub captured_at: String,
}

#[derive(Debug, Serialize)]
pub struct ExtractResponse {
    #[serde(rename = "match")]
    pub match_set: MatchSet,
    pub records: Vec<ContactRecord>,
    /// Cards whose extraction failed outright
    pub failures: Vec<CardFailure>,
    /// Cards extracted but refused by the record policy
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<CardFailure>,
    pub stats: BatchStats,
}

#[derive(Debug, Serialize)]
pub struct GenericResponse {
    pub status: String,
}
