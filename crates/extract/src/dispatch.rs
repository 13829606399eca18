use crate::config::ExtractorSettings;
use crate::extractor::Extractor;
use crate::markdown::MarkdownExtractor;
use crate::markup::MarkupExtractor;
use crate::python::PythonExtractor;
use crate::types::Chunk;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Extension-keyed registry of extractors.
///
/// Built once with per-extractor configuration, then shared (cheaply cloned)
/// across worker tasks during a corpus walk. When two extractors claim the
/// same extension, the last registration wins; this is a deliberate choice,
/// not an oversight, and is not validated.
#[derive(Clone)]
pub struct ExtractorSet {
    by_extension: HashMap<String, Arc<dyn Extractor>>,
}

impl ExtractorSet {
    /// Build the default registry: structured Python extraction, regex-based
    /// TS/JS extraction, and heading-based Markdown extraction.
    #[must_use]
    pub fn new(settings: &ExtractorSettings) -> Self {
        let mut set = Self {
            by_extension: HashMap::new(),
        };
        set.register(Arc::new(PythonExtractor::new(settings.max_file_size)));
        set.register(Arc::new(MarkupExtractor::new(settings.max_file_size)));
        set.register(Arc::new(MarkdownExtractor::new(
            settings.max_file_size,
            settings.markdown.split_headings,
        )));
        set
    }

    /// Register an extractor for every extension it claims
    pub fn register(&mut self, extractor: Arc<dyn Extractor>) {
        for extension in extractor.supported_extensions() {
            self.by_extension
                .insert((*extension).to_ascii_lowercase(), Arc::clone(&extractor));
        }
    }

    /// Resolve the extractor for a path by its extension, case-insensitive
    #[must_use]
    pub fn extractor_for(&self, path: &Path) -> Option<&Arc<dyn Extractor>> {
        let extension = path.extension().and_then(|e| e.to_str())?;
        self.by_extension
            .get(&format!(".{}", extension.to_ascii_lowercase()))
    }

    /// Extract chunks from `path`, or log and return nothing when no
    /// extractor is registered for its extension
    #[must_use]
    pub fn extract_chunks(&self, path: &Path) -> Vec<Chunk> {
        match self.extractor_for(path) {
            Some(extractor) => extractor.extract(path),
            None => {
                log::warn!("No extractor found for {}", path.display());
                Vec::new()
            }
        }
    }

    /// All registered extensions, mainly for logging and diagnostics
    #[must_use]
    pub fn registered_extensions(&self) -> Vec<&str> {
        self.by_extension.keys().map(String::as_str).collect()
    }
}
