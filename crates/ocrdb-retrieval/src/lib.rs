#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! Indexing, querying and ingestion orchestration over a `CollectionRegistry`.

pub mod indexer;
pub mod ingest;
pub mod merge;
pub mod query;

pub use indexer::Indexer;
pub use ingest::{pdfs_in, BatchReport, DocumentLocks, FileFailure, IngestOptions, IngestReport, Ingestor};
pub use merge::{merge_ranked, normalize_scores};
pub use query::QueryEngine;
