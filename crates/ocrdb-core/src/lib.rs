#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! Shared model for the OCR retrieval pipeline: engine-tagged documents and
//! chunks, the normalizer that produces them, the collection and OCR seams,
//! and layered settings.

pub mod chunking;
pub mod config;
pub mod error;
pub mod normalizer;
pub mod ocr_output;
pub mod registry;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use normalizer::Normalizer;
pub use ocr_output::{MinerUBlock, MinerUOutput, PaddleOutput, PaddlePage, RawOcrOutput};
pub use registry::{CollectionHandle, CollectionRegistry};
pub use traits::{CollectionStore, OcrProvider};
pub use types::{rank_and_truncate, Chunk, Document, QueryResult, Scope, SourceEngine};
