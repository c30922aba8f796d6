use serde::Deserialize;

use crate::extraction::ExtractionConfig;
use crate::page::Rect;

use super::contact::RecordPolicy;
use super::export::ExportFormat;

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub url: String,
    /// Falls back to the server's `HEADLESS` setting
    pub headless: Option<bool>,
    #[serde(default = "default_viewport_width")]
    pub viewport_width: u32,
    #[serde(default = "default_viewport_height")]
    pub viewport_height: u32,
}

fn default_viewport_width() -> u32 {
    1280
}
fn default_viewport_height() -> u32 {
    720
}

/// Move a session to another page (next page of a paginated listing)
#[derive(Debug, Deserialize)]
pub struct NavigateRequest {
    pub url: String,
}

/// Find cards similar to the one under `reference_box`
#[derive(Debug, Deserialize)]
pub struct MatchRequest {
    pub reference_box: Rect,
    pub threshold: Option<u8>,
}

/// Match, then extract every matched card
#[derive(Debug, Deserialize)]
pub struct ExtractRequest {
    pub reference_box: Rect,
    pub threshold: Option<u8>,
    /// Per-site configuration; the built-in contact configuration when absent
    pub config: Option<ExtractionConfig>,
    #[serde(default)]
    pub policy: RecordPolicy,
    pub workers: Option<usize>,
}

/// Extract, then render the records as a downloadable file
#[derive(Debug, Deserialize)]
pub struct ExportRequest {
    #[serde(flatten)]
    pub extract: ExtractRequest,
    #[serde(default)]
    pub format: ExportFormat,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_export_request_flattens_extract_fields() {
        let request: ExportRequest = serde_json::from_value(json!({
            "reference_box": {"x": 20.0, "y": 100.0, "width": 300.0, "height": 200.0},
            "threshold": 70,
            "format": "csv"
        }))
        .unwrap();
        assert_eq!(request.format, ExportFormat::Csv);
        assert_eq!(request.extract.threshold, Some(70));
        assert_eq!(request.extract.reference_box.width, 300.0);

        let request: ExportRequest = serde_json::from_value(json!({
            "reference_box": {"x": 0.0, "y": 0.0, "width": 10.0, "height": 10.0}
        }))
        .unwrap();
        assert_eq!(request.format, ExportFormat::Json);
    }
}
