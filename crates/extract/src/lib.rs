//! # semdex-extract
//!
//! Turns source files into retrievable chunks.
//!
//! Each supported format has its own extractor:
//!
//! - [`PythonExtractor`] parses with tree-sitter and emits one chunk per
//!   declaration plus the module docstring
//! - [`MarkupExtractor`] finds TS/JS declaration shapes with regular
//!   expressions and brace balancing
//! - [`MarkdownExtractor`] emits a whole-document chunk plus one chunk per
//!   heading-delimited section
//!
//! [`ExtractorSet`] dispatches by file extension and is the entry point for
//! callers walking a corpus. Extraction never fails loudly: unreadable,
//! oversized, or unparseable files are logged and skipped so a single bad
//! file cannot abort an indexing run.

mod config;
mod dispatch;
mod error;
mod extractor;
mod markdown;
mod markup;
mod python;
mod types;

pub use config::{ExtractorSettings, MarkdownSettings};
pub use dispatch::ExtractorSet;
pub use error::{ExtractError, Result};
pub use extractor::Extractor;
pub use markdown::MarkdownExtractor;
pub use markup::MarkupExtractor;
pub use python::PythonExtractor;
pub use types::{Chunk, ChunkKind};
