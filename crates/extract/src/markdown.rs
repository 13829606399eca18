use crate::extractor::{file_basename, read_source, Extractor};
use crate::types::{Chunk, ChunkKind};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

static HEADING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(#{1,6})\s+(.+)$").expect("heading pattern"));

/// Document extractor for Markdown files.
///
/// Always emits one chunk for the whole file. With `split_headings` enabled
/// (the default) it also emits one chunk per heading-delimited section, so a
/// query can land on the relevant part of a long document instead of the
/// whole thing.
pub struct MarkdownExtractor {
    max_file_size: u64,
    split_headings: bool,
}

impl MarkdownExtractor {
    #[must_use]
    pub fn new(max_file_size: u64, split_headings: bool) -> Self {
        Self {
            max_file_size,
            split_headings,
        }
    }
}

impl Extractor for MarkdownExtractor {
    fn supported_extensions(&self) -> &'static [&'static str] {
        &[".md", ".markdown"]
    }

    fn extract(&self, path: &Path) -> Vec<Chunk> {
        let Some(content) = read_source(path, self.max_file_size) else {
            return Vec::new();
        };
        let file = path.display().to_string();
        let basename = file_basename(path);

        let mut chunks = Vec::new();

        let document = Chunk::from_parts(
            file.clone(),
            basename.clone(),
            ChunkKind::Document,
            String::new(),
            content.clone(),
            1,
            content.matches('\n').count() + 1,
        );
        if !document.is_blank() {
            chunks.push(document);
        }

        if self.split_headings {
            // Line numbers accumulate section lengths; skipped blank sections
            // intentionally do not advance the counter.
            let mut line_count = 1usize;
            for (heading, section) in split_by_headings(&content) {
                if section.trim().is_empty() {
                    continue;
                }
                let section_lines = section.matches('\n').count() + 1;
                let line_start = line_count;
                let line_end = line_count + section_lines - 1;
                line_count = line_end + 1;

                chunks.push(Chunk::from_parts(
                    file.clone(),
                    format!("{basename}:{heading}"),
                    ChunkKind::Section,
                    String::new(),
                    section.to_string(),
                    line_start,
                    line_end,
                ));
            }
        }

        log::debug!("Extracted {} chunks from {file}", chunks.len());
        chunks
    }
}

/// Split content at `#`-style headings. Each section runs from its heading
/// line up to the next heading (or end of file). A document with no headings
/// yields a single synthetic section covering the whole body.
fn split_by_headings(content: &str) -> Vec<(String, &str)> {
    let headings: Vec<(usize, String)> = HEADING_RE
        .captures_iter(content)
        .filter_map(|captures| {
            let whole = captures.get(0)?;
            let text = captures.get(2)?.as_str().trim().to_string();
            Some((whole.start(), text))
        })
        .collect();

    if headings.is_empty() {
        return vec![("Document".to_string(), content)];
    }

    let mut sections = Vec::with_capacity(headings.len());
    for (i, (start, heading)) in headings.iter().enumerate() {
        let end = headings
            .get(i + 1)
            .map_or(content.len(), |(next_start, _)| *next_start);
        sections.push((heading.clone(), &content[*start..end]));
    }
    sections
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn extract_source(source: &str, split_headings: bool) -> Vec<Chunk> {
        let mut file = tempfile::Builder::new()
            .suffix(".md")
            .tempfile()
            .unwrap();
        file.write_all(source.as_bytes()).unwrap();
        MarkdownExtractor::new(1024 * 1024, split_headings).extract(file.path())
    }

    const DOC: &str = "\
# Guide\n\nIntro paragraph.\n\n## Install\n\nRun the installer.\n\n## Usage\n\nCall the tool.\n";

    #[test]
    fn emits_document_and_sections() {
        let chunks = extract_source(DOC, true);

        let document = chunks.iter().find(|c| c.kind == ChunkKind::Document).unwrap();
        assert!(document.full_text.contains("Intro paragraph."));
        assert_eq!(document.line_start, 1);

        let sections: Vec<_> = chunks
            .iter()
            .filter(|c| c.kind == ChunkKind::Section)
            .collect();
        assert_eq!(sections.len(), 3);
        assert!(sections[0].name.ends_with(":Guide"));
        assert!(sections[1].name.ends_with(":Install"));
        assert!(sections[1].full_text.contains("Run the installer."));
        assert!(sections[2].name.ends_with(":Usage"));
    }

    #[test]
    fn section_line_numbers_accumulate() {
        let chunks = extract_source(DOC, true);
        let sections: Vec<_> = chunks
            .iter()
            .filter(|c| c.kind == ChunkKind::Section)
            .collect();

        assert_eq!(sections[0].line_start, 1);
        for window in sections.windows(2) {
            assert_eq!(window[1].line_start, window[0].line_end + 1);
        }
        for section in &sections {
            assert!(section.line_start <= section.line_end);
        }
    }

    #[test]
    fn no_headings_yield_synthetic_section() {
        let chunks = extract_source("Just some prose.\nNothing else.\n", true);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].kind, ChunkKind::Document);
        assert_eq!(chunks[1].kind, ChunkKind::Section);
        assert!(chunks[1].name.ends_with(":Document"));
        assert!(chunks[1].full_text.contains("Just some prose."));
    }

    #[test]
    fn splitting_can_be_disabled() {
        let chunks = extract_source(DOC, false);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].kind, ChunkKind::Document);
    }

    #[test]
    fn blank_file_yields_nothing() {
        let chunks = extract_source("   \n\t\n", true);
        assert!(chunks.is_empty());
    }

    #[test]
    fn heading_only_sections_keep_the_counter_consistent() {
        // A section's content includes its heading line, so even a bodyless
        // heading survives the blank filter and advances the line counter.
        let chunks = extract_source("# A\n\nBody A.\n\n# Empty\n\n# C\n\nBody C.\n", true);
        let sections: Vec<_> = chunks
            .iter()
            .filter(|c| c.kind == ChunkKind::Section)
            .collect();
        assert_eq!(sections.len(), 3);
        for window in sections.windows(2) {
            assert_eq!(window[1].line_start, window[0].line_end + 1);
        }
    }
}
