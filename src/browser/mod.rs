pub mod capture;
pub mod manager;
pub mod ocr;
pub mod pacing;

pub use capture::{capture_snapshot, CapturedPage, SNAPSHOT_SCRIPT};
pub use manager::{BrowserManager, Viewport};
pub use ocr::{HttpTextRecognizer, ScreenshotRecognizer, TextRecognizer};
pub use pacing::{NavigationPacer, PacingConfig};
