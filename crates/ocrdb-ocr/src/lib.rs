#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! OCR provider clients: PaddleOCR layout parsing and MinerU batch extraction.

pub mod clean;
pub mod mineru;
pub mod paddle;

use std::sync::Arc;

use ocrdb_core::config::OcrSettings;
use ocrdb_core::{OcrProvider, Result, SourceEngine};

pub use clean::MarkdownCleaner;
pub use mineru::MinerUClient;
pub use paddle::PaddleClient;

/// Build the provider for `engine`. Fails with `InvalidConfig` when the
/// engine's endpoint or credentials are missing.
pub fn provider_for(engine: SourceEngine, settings: &OcrSettings) -> Result<Arc<dyn OcrProvider>> {
    let provider: Arc<dyn OcrProvider> = match engine {
        SourceEngine::Paddle => Arc::new(PaddleClient::new(settings.paddle.clone())?),
        SourceEngine::MinerU => Arc::new(MinerUClient::new(settings.mineru.clone())?),
    };
    Ok(provider)
}
