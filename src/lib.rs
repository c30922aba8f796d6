//! Card similarity matching and multi-method field extraction for listing
//! pages such as staff directories.
//!
//! Select one example card; [`matching::CardMatcher`] finds the others and
//! [`extraction::ExtractionEngine`] pulls structured fields out of each,
//! all through the read-only [`page::PageAdapter`] boundary.

pub mod api;
pub mod browser;
pub mod config;
pub mod error;
pub mod extraction;
pub mod matching;
pub mod models;
pub mod page;

pub use error::{AppError, AppResult, Result, ScrapeError};
pub use extraction::{
    extract_cards, ExtractionConfig, ExtractionEngine, ExtractionMethod, FieldConfig, FieldName,
    MethodKind, MethodTag,
};
pub use matching::{CandidateMatch, CardMatcher, MatchSet, DEFAULT_THRESHOLD};
pub use page::{ElementId, PageAdapter, PageSnapshot, Rect, SnapshotBuilder};
