//! Page-state boundary.
//!
//! Matching and extraction only see a page through [`PageAdapter`]. The
//! in-memory [`PageSnapshot`] is the standard implementation; live browser
//! pages are captured into one (see `browser::capture`).

pub mod adapter;
pub mod selector;
pub mod snapshot;
pub mod types;

pub use adapter::{ancestors, class_list, is_within, self_and_descendants, GatedPage, PageAdapter};
pub use snapshot::{Content, ElementSpec, PageSnapshot, SnapshotBuilder};
pub use types::{ComputedStyle, Edges, ElementId, OcrText, Rect};
