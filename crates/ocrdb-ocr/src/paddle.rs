//! PaddleOCR PP-StructureV3 layout parsing over the AI Studio HTTP API.
//!
//! The whole file is posted base64-encoded in one request; the response
//! carries one markdown rendering per page.

use async_trait::async_trait;
use base64::Engine;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use ocrdb_core::config::PaddleSettings;
use ocrdb_core::error::{Error, Result};
use ocrdb_core::ocr_output::{PaddleOutput, RawOcrOutput};
use ocrdb_core::traits::OcrProvider;
use ocrdb_core::types::SourceEngine;

/// `fileType` values understood by the layout-parsing endpoint.
const FILE_TYPE_PDF: u8 = 0;
const FILE_TYPE_IMAGE: u8 = 1;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LayoutParsingRequest {
    file: String,
    file_type: u8,
    use_doc_orientation_classify: bool,
    use_doc_unwarping: bool,
    use_chart_recognition: bool,
}

#[derive(Debug, Deserialize)]
struct LayoutParsingResponse {
    result: Option<LayoutParsingResult>,
    #[serde(rename = "errorMsg")]
    error_msg: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LayoutParsingResult {
    #[serde(default)]
    layout_parsing_results: Vec<PageResult>,
}

#[derive(Debug, Deserialize)]
struct PageResult {
    #[serde(default)]
    markdown: PageMarkdown,
}

#[derive(Debug, Default, Deserialize)]
struct PageMarkdown {
    #[serde(default)]
    text: String,
}

pub struct PaddleClient {
    http: reqwest::Client,
    settings: PaddleSettings,
}

impl PaddleClient {
    pub fn new(settings: PaddleSettings) -> Result<Self> {
        if settings.api_url.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "ocr.paddle.api_url is not set (OCRDB_OCR__PADDLE__API_URL or API_URL_PADDLE)".into(),
            ));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| Error::OcrFailure(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { http, settings })
    }

    fn file_type(path: &Path) -> u8 {
        if path.extension().is_some_and(|e| e.eq_ignore_ascii_case("pdf")) {
            FILE_TYPE_PDF
        } else {
            FILE_TYPE_IMAGE
        }
    }
}

#[async_trait]
impl OcrProvider for PaddleClient {
    fn engine(&self) -> SourceEngine {
        SourceEngine::Paddle
    }

    async fn run_ocr(&self, path: &Path) -> Result<RawOcrOutput> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| Error::OcrFailure(format!("cannot read {}: {e}", path.display())))?;
        let request = LayoutParsingRequest {
            file: base64::engine::general_purpose::STANDARD.encode(&bytes),
            file_type: Self::file_type(path),
            use_doc_orientation_classify: false,
            use_doc_unwarping: self.settings.use_doc_unwarping,
            use_chart_recognition: self.settings.use_chart_recognition,
        };

        info!(file = %path.display(), size = bytes.len(), "sending file to PaddleOCR");
        let response = self
            .http
            .post(&self.settings.api_url)
            .header("Authorization", format!("token {}", self.settings.access_token))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::OcrFailure(format!("PaddleOCR request failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::OcrFailure("rate limit exceeded".into()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::OcrFailure(format!("PaddleOCR API error {status}: {body}")));
        }

        let body: LayoutParsingResponse = response
            .json()
            .await
            .map_err(|e| Error::OcrFailure(format!("unreadable PaddleOCR response: {e}")))?;
        let result = body.result.ok_or_else(|| {
            Error::OcrFailure(format!(
                "PaddleOCR response has no result{}",
                body.error_msg.map(|m| format!(": {m}")).unwrap_or_default()
            ))
        })?;

        let pages = result.layout_parsing_results.into_iter().map(|p| p.markdown.text);
        let output = PaddleOutput::from_pages(pages);
        debug!(file = %path.display(), pages = output.pages.len(), "PaddleOCR finished");
        Ok(RawOcrOutput::Paddle(output))
    }
}
