//! MinerU cloud extraction.
//!
//! Four steps: request a presigned upload URL for a one-file batch, upload
//! the PDF, poll the batch until it is done, then download the result
//! archive and read its markdown and content list.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Read};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use ocrdb_core::config::MinerUSettings;
use ocrdb_core::error::{Error, Result};
use ocrdb_core::ocr_output::{MinerUBlock, MinerUOutput, RawOcrOutput};
use ocrdb_core::traits::OcrProvider;
use ocrdb_core::types::SourceEngine;

use crate::clean::MarkdownCleaner;

const CONTENT_LIST_SUFFIX: &str = "_content_list.json";

#[derive(Debug, Serialize)]
struct BatchRequest<'a> {
    files: Vec<BatchFile<'a>>,
    model_version: &'a str,
    enable_formula: bool,
    enable_table: bool,
}

#[derive(Debug, Serialize)]
struct BatchFile<'a> {
    name: &'a str,
    data_id: &'a str,
}

/// Every MinerU API response is wrapped in `{code, msg, data}`; `code` 0 is success.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: i64,
    #[serde(default)]
    msg: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct UploadUrls {
    batch_id: String,
    file_urls: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct BatchResults {
    #[serde(default)]
    extract_result: Vec<ExtractResult>,
}

#[derive(Debug, Deserialize)]
struct ExtractResult {
    state: String,
    full_zip_url: Option<String>,
    err_msg: Option<String>,
}

pub struct MinerUClient {
    http: reqwest::Client,
    settings: MinerUSettings,
    cleaner: Option<MarkdownCleaner>,
}

impl MinerUClient {
    pub fn new(settings: MinerUSettings) -> Result<Self> {
        if settings.api_key.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "ocr.mineru.api_key is not set (OCRDB_OCR__MINERU__API_KEY or MINERU_API_KEY)".into(),
            ));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| Error::OcrFailure(format!("Failed to create HTTP client: {e}")))?;
        let cleaner = if settings.clean_output { Some(MarkdownCleaner::new()?) } else { None };
        Ok(Self { http, settings, cleaner })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.settings.base_url.trim_end_matches('/'), path)
    }

    async fn read_envelope<T: DeserializeOwned>(&self, response: reqwest::Response, step: &str) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::OcrFailure(format!("MinerU {step} failed with {status}: {body}")));
        }
        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| Error::OcrFailure(format!("unreadable MinerU {step} response: {e}")))?;
        if envelope.code != 0 {
            return Err(Error::OcrFailure(format!("MinerU {step} error {}: {}", envelope.code, envelope.msg)));
        }
        envelope
            .data
            .ok_or_else(|| Error::OcrFailure(format!("MinerU {step} response has no data")))
    }

    async fn request_upload_url(&self, file_name: &str, data_id: &str) -> Result<(String, String)> {
        let request = BatchRequest {
            files: vec![BatchFile { name: file_name, data_id }],
            model_version: &self.settings.model_version,
            enable_formula: self.settings.enable_formula,
            enable_table: self.settings.enable_table,
        };
        let response = self
            .http
            .post(self.endpoint("file-urls/batch"))
            .bearer_auth(&self.settings.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::OcrFailure(format!("MinerU upload request failed: {e}")))?;
        let urls: UploadUrls = self.read_envelope(response, "upload request").await?;
        let upload_url = urls
            .file_urls
            .into_iter()
            .next()
            .ok_or_else(|| Error::OcrFailure("MinerU returned no upload URL".into()))?;
        Ok((urls.batch_id, upload_url))
    }

    async fn upload(&self, upload_url: &str, bytes: Vec<u8>) -> Result<()> {
        let response = self
            .http
            .put(upload_url)
            .body(bytes)
            .send()
            .await
            .map_err(|e| Error::OcrFailure(format!("MinerU upload failed: {e}")))?;
        if !response.status().is_success() {
            return Err(Error::OcrFailure(format!("MinerU upload failed: {}", response.status())));
        }
        Ok(())
    }

    /// Poll until the batch is done and return the result archive URL.
    async fn wait_for_result(&self, batch_id: &str) -> Result<String> {
        let url = self.endpoint(&format!("extract-results/batch/{batch_id}"));
        let interval = Duration::from_secs(self.settings.poll_interval_secs);

        for attempt in 1..=self.settings.max_polls {
            let response = self
                .http
                .get(&url)
                .bearer_auth(&self.settings.api_key)
                .send()
                .await
                .map_err(|e| Error::OcrFailure(format!("MinerU polling failed: {e}")))?;
            let results: BatchResults = self.read_envelope(response, "polling").await?;
            let result = results
                .extract_result
                .into_iter()
                .next()
                .ok_or_else(|| Error::OcrFailure(format!("MinerU batch {batch_id} has no results")))?;

            match result.state.as_str() {
                "done" => {
                    return result
                        .full_zip_url
                        .ok_or_else(|| Error::OcrFailure("MinerU finished without a result archive".into()));
                }
                "failed" => {
                    return Err(Error::OcrFailure(format!(
                        "MinerU extraction failed: {}",
                        result.err_msg.unwrap_or_else(|| "no reason given".into())
                    )));
                }
                state => {
                    debug!(batch_id, state, attempt, "MinerU batch still running");
                    tokio::time::sleep(interval).await;
                }
            }
        }
        Err(Error::OcrFailure(format!(
            "MinerU batch {batch_id} not done after {} polls",
            self.settings.max_polls
        )))
    }

    async fn download(&self, zip_url: &str) -> Result<Vec<u8>> {
        let response = self
            .http
            .get(zip_url)
            .send()
            .await
            .map_err(|e| Error::OcrFailure(format!("MinerU download failed: {e}")))?;
        if !response.status().is_success() {
            return Err(Error::OcrFailure(format!("MinerU download failed: {}", response.status())));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::OcrFailure(format!("MinerU download failed: {e}")))?;
        Ok(bytes.to_vec())
    }

    /// Read every `.md` entry (in name order) and the content list, if any.
    pub fn read_archive(&self, bytes: &[u8]) -> Result<MinerUOutput> {
        let broken = |e: &dyn std::fmt::Display| Error::OcrFailure(format!("unreadable MinerU archive: {e}"));
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| broken(&e))?;
        let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
        names.sort();

        let mut markdown_parts = Vec::new();
        let mut blocks: Option<Vec<MinerUBlock>> = None;
        for name in names {
            let is_markdown = name.ends_with(".md");
            let is_content_list = name.ends_with(CONTENT_LIST_SUFFIX);
            if !is_markdown && !is_content_list {
                continue;
            }
            let mut content = String::new();
            archive
                .by_name(&name)
                .map_err(|e| broken(&e))?
                .read_to_string(&mut content)
                .map_err(|e| broken(&e))?;

            if is_markdown {
                markdown_parts.push(content);
            } else {
                let parsed: Vec<MinerUBlock> = serde_json::from_str(&content).map_err(|e| broken(&e))?;
                blocks.get_or_insert_with(Vec::new).extend(parsed);
            }
        }

        let mut output = MinerUOutput { markdown: markdown_parts.join("\n\n"), blocks };
        if let Some(cleaner) = &self.cleaner {
            output.markdown = cleaner.clean(&output.markdown);
            for block in output.blocks.iter_mut().flatten() {
                block.text = cleaner.clean(&block.text);
            }
        }
        Ok(output)
    }
}

#[async_trait]
impl OcrProvider for MinerUClient {
    fn engine(&self) -> SourceEngine {
        SourceEngine::MinerU
    }

    async fn run_ocr(&self, path: &Path) -> Result<RawOcrOutput> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::OcrFailure(format!("not a file: {}", path.display())))?;
        let data_id = path
            .file_stem()
            .map_or_else(|| file_name.clone(), |s| s.to_string_lossy().into_owned());
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| Error::OcrFailure(format!("cannot read {}: {e}", path.display())))?;

        info!(file = %file_name, model = %self.settings.model_version, "requesting MinerU upload URL");
        let (batch_id, upload_url) = self.request_upload_url(&file_name, &data_id).await?;
        self.upload(&upload_url, bytes).await?;
        info!(file = %file_name, batch_id = %batch_id, "uploaded, waiting for MinerU");
        let zip_url = self.wait_for_result(&batch_id).await?;
        let archive = self.download(&zip_url).await?;
        let output = self.read_archive(&archive)?;
        debug!(
            file = %file_name,
            markdown_chars = output.markdown.len(),
            blocks = output.blocks.as_ref().map_or(0, Vec::len),
            "MinerU finished"
        );
        Ok(RawOcrOutput::MinerU(output))
    }
}
