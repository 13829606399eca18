use crate::extractor::{read_source, Extractor};
use crate::types::{Chunk, ChunkKind};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

/// Declaration shapes located by textual pattern matching
static FUNCTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:export\s+)?(?:async\s+)?function\s+(\w+)\s*\([^)]*\)\s*(?::\s*[^{]+)?\s*\{")
        .expect("function pattern")
});
static CLASS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:export\s+)?class\s+(\w+)(?:\s+extends\s+\w+)?(?:\s+implements\s+[^{]+)?\s*\{")
        .expect("class pattern")
});
static INTERFACE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:export\s+)?interface\s+(\w+)(?:\s+extends\s+[^{]+)?\s*\{")
        .expect("interface pattern")
});
static ARROW_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:export\s+)?const\s+(\w+)\s*=\s*(?:\([^)]*\)|[^=]+)\s*=>\s*(?:\{|\()")
        .expect("arrow pattern")
});

/// Lightweight-markup extractor for brace-delimited languages.
///
/// Locates function, class, interface, and arrow-function declarations with
/// regular expressions and recovers each body by walking the brace nesting
/// from the declaration's opening `{`. No parser dependency: good enough for
/// retrieval, not a compiler front end.
pub struct MarkupExtractor {
    max_file_size: u64,
}

impl MarkupExtractor {
    #[must_use]
    pub fn new(max_file_size: u64) -> Self {
        Self { max_file_size }
    }

    fn matches_for(
        &self,
        file: &str,
        content: &str,
        pattern: &Regex,
        kind: ChunkKind,
        chunks: &mut Vec<Chunk>,
    ) {
        for captures in pattern.captures_iter(content) {
            let Some(whole) = captures.get(0) else {
                continue;
            };
            let Some(name) = captures.get(1) else {
                continue;
            };
            let start = whole.start();

            let Some((code, line_start, line_end)) = balanced_block(file, content, start) else {
                continue;
            };

            let doc_text = doc_comment_before(content, start);
            let chunk = Chunk::from_parts(
                file,
                name.as_str(),
                kind,
                code,
                doc_text,
                line_start,
                line_end,
            );
            if !chunk.is_blank() {
                chunks.push(chunk);
            }
        }
    }
}

impl Extractor for MarkupExtractor {
    fn supported_extensions(&self) -> &'static [&'static str] {
        &[".ts", ".tsx", ".js", ".jsx"]
    }

    fn extract(&self, path: &Path) -> Vec<Chunk> {
        let Some(content) = read_source(path, self.max_file_size) else {
            return Vec::new();
        };
        let file = path.display().to_string();

        let mut chunks = Vec::new();
        self.matches_for(&file, &content, &FUNCTION_RE, ChunkKind::Function, &mut chunks);
        self.matches_for(&file, &content, &CLASS_RE, ChunkKind::Class, &mut chunks);
        self.matches_for(&file, &content, &INTERFACE_RE, ChunkKind::Interface, &mut chunks);
        self.matches_for(&file, &content, &ARROW_RE, ChunkKind::ArrowFunction, &mut chunks);

        log::debug!("Extracted {} chunks from {file}", chunks.len());
        chunks
    }
}

/// Extract the code block starting at `start`, ending at the brace that
/// balances the first `{` after it. An unbalanced block is a per-candidate
/// failure: logged, and the candidate is skipped.
fn balanced_block(file: &str, content: &str, start: usize) -> Option<(String, usize, usize)> {
    let open = start + content[start..].find('{')?;

    let mut depth = 1usize;
    let mut end = None;
    for (offset, byte) in content.as_bytes()[open + 1..].iter().enumerate() {
        match byte {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    end = Some(open + 1 + offset + 1);
                    break;
                }
            }
            _ => {}
        }
    }

    let Some(end) = end else {
        log::warn!("Unbalanced braces in {file} at offset {start}");
        return None;
    };

    let code = content[start..end].to_string();
    let line_start = content[..start].matches('\n').count() + 1;
    let line_end = content[..end].matches('\n').count() + 1;
    Some((code, line_start, line_end))
}

/// A `/** … */` block comment counts as the declaration's documentation only
/// when it ends exactly at the declaration start, ignoring whitespace.
fn doc_comment_before(content: &str, start: usize) -> String {
    let head = content[..start].trim_end();
    if !head.ends_with("*/") {
        return String::new();
    }
    let Some(open) = head.rfind("/**") else {
        return String::new();
    };
    head.get(open + 3..head.len() - 2)
        .map(str::trim)
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn extract_source(source: &str) -> Vec<Chunk> {
        let mut file = tempfile::Builder::new()
            .suffix(".ts")
            .tempfile()
            .unwrap();
        file.write_all(source.as_bytes()).unwrap();
        MarkupExtractor::new(1024 * 1024).extract(file.path())
    }

    #[test]
    fn extracts_documented_function() {
        let chunks = extract_source(
            "/**\n * Formats a user name.\n */\nfunction formatName(user: User): string {\n    return user.name;\n}\n",
        );
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].name, "formatName");
        assert_eq!(chunks[0].kind, ChunkKind::Function);
        assert!(chunks[0].doc_text.contains("Formats a user name."));
        assert_eq!(chunks[0].line_start, 4);
        assert_eq!(chunks[0].line_end, 6);
    }

    #[test]
    fn extracts_class_interface_and_arrow() {
        let source = "\
interface Props {\n    name: string;\n}\n\n\
class Widget {\n    render() {\n        return this.props;\n    }\n}\n\n\
const onClick = (event) => {\n    console.log(event);\n};\n";
        let chunks = extract_source(source);

        let interface = chunks.iter().find(|c| c.kind == ChunkKind::Interface).unwrap();
        assert_eq!(interface.name, "Props");

        let class = chunks.iter().find(|c| c.kind == ChunkKind::Class).unwrap();
        assert_eq!(class.name, "Widget");
        assert!(class.code.contains("render()"));

        let arrow = chunks.iter().find(|c| c.kind == ChunkKind::ArrowFunction).unwrap();
        assert_eq!(arrow.name, "onClick");
    }

    #[test]
    fn unbalanced_braces_skip_only_that_candidate() {
        let balanced = "function good() {\n    return 1;\n}\n\nfunction alsoGood() {\n    return 2;\n}\n";
        let unbalanced = "function good() {\n    return 1;\n}\n\nfunction alsoGood() {\n    return 2;\n";

        let full = extract_source(balanced);
        let partial = extract_source(unbalanced);
        assert_eq!(full.len(), 2);
        assert_eq!(partial.len(), full.len() - 1);
        assert_eq!(partial[0].name, "good");
    }

    #[test]
    fn detached_comment_is_not_associated() {
        let source = "/**\n * Unrelated docs.\n */\nconst x = 1;\n\nfunction lonely() {\n    return x;\n}\n";
        let chunks = extract_source(source);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].doc_text, "");
    }

    #[test]
    fn doc_comment_interior_is_trimmed() {
        assert_eq!(
            doc_comment_before("/** Hello. */\nfunction f() {}", 14),
            "Hello."
        );
        assert_eq!(doc_comment_before("/**/\nfunction f() {}", 5), "");
        assert_eq!(doc_comment_before("function f() {}", 0), "");
    }

    #[test]
    fn exported_async_functions_match() {
        let chunks = extract_source(
            "export async function loadData(url: string): Promise<Data> {\n    return fetch(url);\n}\n",
        );
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].name, "loadData");
    }
}
