//! Multi-method field extraction.
//!
//! Each field carries an ordered list of [`ExtractionMethod`]s. The engine
//! tries them by priority against a card element and keeps the first value
//! that passes the field's validator, recording every attempt.

pub mod batch;
pub mod engine;
pub mod method;
pub mod methods;
pub mod patterns;
pub mod validate;

pub use batch::{extract_cards, BatchOutcome, CardFailure, ExtractedCard};
pub use engine::{AttemptOutcome, CardExtraction, ExtractionEngine, ExtractionResult, MethodAttempt};
pub use method::{
    CoordinatePosition, Direction, ExtractionConfig, ExtractionMethod, FieldConfig, FieldName,
    MethodKind, MethodTag, RelativeRegion, ValidatorKind, EXTRACTION_ORDER,
};
pub use validate::FieldValidator;
