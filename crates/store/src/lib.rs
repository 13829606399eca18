//! # semdex-store
//!
//! Embedding, indexing, and retrieval over extracted chunks.
//!
//! ## Architecture
//!
//! ```text
//! Chunk[] (semdex-extract)
//!     │
//!     ├──> EmbeddingService ──> EmbeddingProvider (fastembed / hash)
//!     │        └─> content-addressed disk cache
//!     │
//!     ├──> VectorIndex
//!     │        ├─> brute-force matrix backend (default)
//!     │        └─> pluggable AnnBackend
//!     │
//!     └──> ContextRetriever
//!              ├─> corpus walk (excludes, bounded concurrency)
//!              └─> query: embed → search → threshold → format
//! ```
//!
//! Failure handling follows one rule: per-item problems degrade (zero
//! vectors, skipped files) with a log line, while operation-level problems
//! (querying an unready index, mismatched builds) surface as [`StoreError`]
//! values with enough context to act on.

mod cache;
mod config;
mod embedder;
mod error;
mod index;
mod provider;
mod retriever;
mod types;

pub use cache::EmbeddingCache;
pub use config::{Config, EmbeddingConfig, IndexConfig, IndexingConfig, RetrieverConfig};
pub use embedder::EmbeddingService;
pub use error::{Result, StoreError};
pub use index::{AnnBackend, AnnBackendFactory, Metric, VectorIndex};
pub use provider::{
    provider_from_config, EmbeddingProvider, FastEmbedProvider, HashEmbeddingProvider,
};
pub use retriever::ContextRetriever;
pub use types::ScoredChunk;

// Re-export extraction types for convenience
pub use semdex_extract::{Chunk, ChunkKind, ExtractorSet, ExtractorSettings};
