use serde::{Deserialize, Serialize};

/// Configuration shared by all extractors
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorSettings {
    /// Files larger than this many bytes are rejected up front
    pub max_file_size: u64,

    /// Settings specific to the document extractor
    pub markdown: MarkdownSettings,
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        Self {
            max_file_size: 1024 * 1024,
            markdown: MarkdownSettings::default(),
        }
    }
}

/// Settings for the heading-based document extractor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkdownSettings {
    /// Emit one chunk per heading-delimited section in addition to the
    /// whole-document chunk
    pub split_headings: bool,
}

impl Default for MarkdownSettings {
    fn default() -> Self {
        Self {
            split_headings: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let settings = ExtractorSettings::default();
        assert_eq!(settings.max_file_size, 1024 * 1024);
        assert!(settings.markdown.split_headings);
    }
}
