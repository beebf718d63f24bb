//! Layered configuration and path helpers.
//!
//! Figment merges built-in defaults, `config.toml`, `config.<env>.toml`,
//! `OCRDB_*` env vars and a handful of legacy variable names into a typed
//! [`Settings`]. Paths accept `~` and `${VAR}`.
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::chunking::ChunkingConfig;
use crate::error::{Error, Result};
use crate::types::SourceEngine;

/// Unprefixed variables still honoured for existing deployments.
const LEGACY_ENV: [(&str, &str); 5] = [
    ("ACCESS_TOKEN", "ocr.paddle.access_token"),
    ("API_URL_PADDLE", "ocr.paddle.api_url"),
    ("MINERU_API_KEY", "ocr.mineru.api_key"),
    ("ELASTICSEARCH_INDEX", "collections.mineru"),
    ("ELASTICSEARCH_INDEX_PADDLE", "collections.paddle"),
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub collections: CollectionSettings,
    pub chunking: ChunkingConfig,
    pub search: SearchSettings,
    pub ingest: IngestSettings,
    pub ocr: OcrSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionSettings {
    /// Directory holding one index directory per collection.
    pub root_dir: String,
    pub paddle: String,
    pub mineru: String,
}

impl Default for CollectionSettings {
    fn default() -> Self {
        Self {
            root_dir: "data/collections".into(),
            paddle: "pdf_documents_paddle".into(),
            mineru: "pdf_documents".into(),
        }
    }
}

impl CollectionSettings {
    pub fn name_for(&self, engine: SourceEngine) -> &str {
        match engine {
            SourceEngine::Paddle => &self.paddle,
            SourceEngine::MinerU => &self.mineru,
        }
    }

    pub fn root_path(&self) -> PathBuf {
        expand_path(&self.root_dir)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub top_k: usize,
    pub snippet_chars: usize,
    /// Wrap matched terms in `<b>` tags in snippets.
    pub highlight: bool,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self { top_k: 3, snippet_chars: 1000, highlight: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    /// Files processed at once by folder ingestion.
    pub concurrency: usize,
    /// When set, each document's text is also written here as `<id>.md`.
    pub markdown_dir: Option<String>,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self { concurrency: 4, markdown_dir: None }
    }
}

impl IngestSettings {
    pub fn markdown_path(&self) -> Option<PathBuf> {
        self.markdown_dir.as_deref().map(expand_path)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    pub paddle: PaddleSettings,
    pub mineru: MinerUSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaddleSettings {
    /// PP-StructureV3 layout-parsing endpoint.
    pub api_url: String,
    pub access_token: String,
    pub timeout_secs: u64,
    pub use_chart_recognition: bool,
    pub use_doc_unwarping: bool,
}

impl Default for PaddleSettings {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            access_token: String::new(),
            timeout_secs: 600,
            use_chart_recognition: false,
            use_doc_unwarping: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MinerUSettings {
    pub base_url: String,
    pub api_key: String,
    /// `vlm`, `mfd` or `auto`.
    pub model_version: String,
    pub enable_formula: bool,
    pub enable_table: bool,
    pub poll_interval_secs: u64,
    pub max_polls: u32,
    pub timeout_secs: u64,
    pub clean_output: bool,
}

impl Default for MinerUSettings {
    fn default() -> Self {
        Self {
            base_url: "https://mineru.net/api/v4".into(),
            api_key: String::new(),
            model_version: "vlm".into(),
            enable_formula: true,
            enable_table: true,
            poll_interval_secs: 10,
            max_polls: 180,
            timeout_secs: 300,
            clean_output: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { level: "info".into() }
    }
}

impl Settings {
    /// Load from the working directory and the process environment.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load with an explicit config file in place of `config.toml`.
    pub fn load_from(config_file: Option<&Path>) -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        let base = config_file.map_or_else(|| PathBuf::from("config.toml"), Path::to_path_buf);

        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file(&base));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("OCRDB_").split("__")).merge(legacy_env());

        let settings: Settings = figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunking.target_chars == 0 {
            return Err(Error::InvalidConfig("chunking.target_chars must be positive".into()));
        }
        if self.search.top_k == 0 {
            return Err(Error::InvalidConfig("search.top_k must be positive".into()));
        }
        if self.ingest.concurrency == 0 {
            return Err(Error::InvalidConfig("ingest.concurrency must be positive".into()));
        }
        if self.collections.paddle == self.collections.mineru {
            return Err(Error::InvalidConfig(format!(
                "paddle and mineru share collection '{}'",
                self.collections.paddle
            )));
        }
        Ok(())
    }
}

fn legacy_env() -> Env {
    Env::raw()
        .only(&LEGACY_ENV.map(|(var, _)| var))
        .map(|key| {
            LEGACY_ENV
                .iter()
                .find(|(var, _)| key.as_str().eq_ignore_ascii_case(var))
                .map_or_else(|| key.as_str().to_string(), |(_, path)| (*path).to_string())
                .into()
        })
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
