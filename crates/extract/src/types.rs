use serde::{Deserialize, Serialize};

/// Category of an extracted chunk.
///
/// The set is open in spirit: new extractors introduce new variants here.
/// String forms are the kebab-case names used in persisted metadata and
/// rendered output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChunkKind {
    /// Module-level description (e.g. a Python module docstring)
    Module,
    /// Class declaration
    Class,
    /// Function or method declaration
    Function,
    /// Function declared with the `async` keyword
    AsyncFunction,
    /// Interface declaration
    Interface,
    /// Function expression assigned to a `const`
    ArrowFunction,
    /// A whole prose document
    Document,
    /// A heading-delimited slice of a document
    Section,
}

impl ChunkKind {
    /// Human-readable name, matching the serialized form
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Module => "module",
            Self::Class => "class",
            Self::Function => "function",
            Self::AsyncFunction => "async-function",
            Self::Interface => "interface",
            Self::ArrowFunction => "arrow-function",
            Self::Document => "document",
            Self::Section => "section",
        }
    }
}

/// One retrievable unit of extracted content.
///
/// Chunks are immutable value data: created by an extractor, copied into the
/// index as metadata, never mutated in place. Re-indexing replaces the whole
/// metadata set rather than editing individual chunks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Source file path, as given by the caller
    pub file: String,

    /// Declaration name, heading text, or file basename; not unique
    pub name: String,

    /// Chunk category
    pub kind: ChunkKind,

    /// Raw source text, empty for prose-only chunks
    pub code: String,

    /// Associated natural-language text (docstring, comment, prose)
    pub doc_text: String,

    /// The text that gets embedded: `code` and `doc_text` combined
    pub full_text: String,

    /// First line of the chunk in the source file (1-based, inclusive)
    pub line_start: usize,

    /// Last line of the chunk in the source file (1-based, inclusive)
    pub line_end: usize,
}

impl Chunk {
    /// Assemble a chunk, deriving `full_text` from `code` and `doc_text`.
    ///
    /// When both are present they are concatenated; otherwise whichever is
    /// non-empty is used on its own.
    #[must_use]
    pub fn from_parts(
        file: impl Into<String>,
        name: impl Into<String>,
        kind: ChunkKind,
        code: String,
        doc_text: String,
        line_start: usize,
        line_end: usize,
    ) -> Self {
        let full_text = if !code.is_empty() && !doc_text.is_empty() {
            format!("{code}\n{doc_text}")
        } else if !code.is_empty() {
            code.clone()
        } else {
            doc_text.clone()
        };

        Self {
            file: file.into(),
            name: name.into(),
            kind,
            code,
            doc_text,
            full_text,
            line_start,
            line_end,
        }
    }

    /// True when the chunk carries no embeddable content.
    ///
    /// Extractors drop blank chunks before surfacing them; nothing with an
    /// empty `full_text` may reach the index.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.full_text.trim().is_empty()
    }

    /// Number of source lines covered by this chunk
    #[must_use]
    pub const fn line_count(&self) -> usize {
        self.line_end.saturating_sub(self.line_start) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn full_text_combines_code_and_doc() {
        let chunk = Chunk::from_parts(
            "a.py",
            "f",
            ChunkKind::Function,
            "def f():\n    pass".to_string(),
            "Does nothing.".to_string(),
            1,
            2,
        );
        assert_eq!(chunk.full_text, "def f():\n    pass\nDoes nothing.");
    }

    #[test]
    fn full_text_falls_back_to_single_part() {
        let code_only = Chunk::from_parts(
            "a.py",
            "f",
            ChunkKind::Function,
            "def f(): pass".to_string(),
            String::new(),
            1,
            1,
        );
        assert_eq!(code_only.full_text, "def f(): pass");

        let doc_only = Chunk::from_parts(
            "notes.md",
            "notes.md",
            ChunkKind::Document,
            String::new(),
            "# Notes".to_string(),
            1,
            1,
        );
        assert_eq!(doc_only.full_text, "# Notes");
    }

    #[test]
    fn blank_chunk_is_detected() {
        let blank = Chunk::from_parts(
            "a.md",
            "a.md",
            ChunkKind::Document,
            String::new(),
            "  \n\t\n".to_string(),
            1,
            3,
        );
        assert!(blank.is_blank());
    }

    #[test]
    fn line_count_is_inclusive() {
        let chunk = Chunk::from_parts(
            "a.py",
            "f",
            ChunkKind::Function,
            "x".to_string(),
            String::new(),
            10,
            15,
        );
        assert_eq!(chunk.line_count(), 6);
    }

    #[test]
    fn kind_names_are_kebab_case() {
        assert_eq!(ChunkKind::AsyncFunction.as_str(), "async-function");
        assert_eq!(ChunkKind::ArrowFunction.as_str(), "arrow-function");
        assert_eq!(
            serde_json::to_string(&ChunkKind::AsyncFunction).unwrap(),
            "\"async-function\""
        );
    }
}
