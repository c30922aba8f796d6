use anyhow::anyhow;
use async_trait::async_trait;
use base64::Engine;
use chromiumoxide::Page;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::Result;
use crate::page::{OcrText, Rect};

use super::manager::capture_region;

const OCR_TIMEOUT: Duration = Duration::from_secs(30);

/// Optical text collaborator: reads the text rendered inside a page region
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn recognize(&self, region: Rect) -> Result<OcrText>;
}

/// Request body posted to the recognition service
#[derive(Debug, Clone, Serialize)]
pub struct OcrRequest {
    /// Base64 PNG
    pub image: String,
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OcrResponse {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub confidence: f64,
}

/// Client for an HTTP text-recognition service (`OCR_URL`)
#[derive(Clone)]
pub struct HttpTextRecognizer {
    client: Client,
    endpoint: String,
}

impl HttpTextRecognizer {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Recognize text in an already-captured PNG
    pub async fn recognize_png(&self, png: &[u8]) -> Result<OcrText> {
        let request = OcrRequest {
            image: base64::engine::general_purpose::STANDARD.encode(png),
            format: "png".to_string(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .timeout(OCR_TIMEOUT)
            .json(&request)
            .send()
            .await
            .map_err(|e| anyhow!("OCR request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("OCR service returned {}: {}", status, body).into());
        }

        let parsed: OcrResponse = response
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse OCR response: {}", e))?;

        Ok(OcrText {
            text: parsed.text,
            confidence: normalize_confidence(parsed.confidence),
        })
    }
}

/// Services report either 0-1 or 0-100
fn normalize_confidence(raw: f64) -> f64 {
    let scaled = if raw > 1.0 { raw / 100.0 } else { raw };
    scaled.clamp(0.0, 1.0)
}

/// Screenshots the region from a live page, then hands it to the HTTP service
pub struct ScreenshotRecognizer {
    page: Page,
    service: HttpTextRecognizer,
}

impl ScreenshotRecognizer {
    pub fn new(page: Page, service: HttpTextRecognizer) -> Self {
        Self { page, service }
    }
}

#[async_trait]
impl TextRecognizer for ScreenshotRecognizer {
    async fn recognize(&self, region: Rect) -> Result<OcrText> {
        let png = capture_region(&self.page, region).await?;
        tracing::debug!(
            "OCR region {}x{} at ({:.0}, {:.0}), {} bytes",
            region.width,
            region.height,
            region.x,
            region.y,
            png.len()
        );
        self.service.recognize_png(&png).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_confidence() {
        assert_eq!(normalize_confidence(0.87), 0.87);
        assert_eq!(normalize_confidence(87.0), 0.87);
        assert_eq!(normalize_confidence(-3.0), 0.0);
        assert_eq!(normalize_confidence(250.0), 1.0);
    }

    #[test]
    fn test_response_defaults() {
        let parsed: OcrResponse = serde_json::from_str(r#"{"text": "Jane Doe"}"#).unwrap();
        assert_eq!(parsed.text, "Jane Doe");
        assert_eq!(parsed.confidence, 0.0);
    }
}
