use crate::error::{ExtractError, Result};
use crate::extractor::{read_source, Extractor};
use crate::types::{Chunk, ChunkKind};
use std::path::Path;
use tree_sitter::{Node, Parser};

/// Structured-language extractor for Python sources.
///
/// Parses the file with tree-sitter and emits one chunk for the module
/// docstring (when present) plus one chunk per function or class
/// declaration. Class bodies are walked recursively, so methods and nested
/// declarations are emitted independently of their parent.
pub struct PythonExtractor {
    max_file_size: u64,
}

impl PythonExtractor {
    #[must_use]
    pub fn new(max_file_size: u64) -> Self {
        Self { max_file_size }
    }

    /// Parse failures skip the whole file: logged, never fatal to the caller
    fn parse_chunks(&self, file: &str, content: &str) -> Vec<Chunk> {
        match self.try_parse(file, content) {
            Ok(chunks) => chunks,
            Err(err) => {
                log::error!("Error extracting chunks from {file}: {err}");
                Vec::new()
            }
        }
    }

    fn try_parse(&self, file: &str, content: &str) -> Result<Vec<Chunk>> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .map_err(|err| ExtractError::Other(format!("failed to load Python grammar: {err}")))?;

        let tree = parser
            .parse(content, None)
            .ok_or_else(|| ExtractError::parse(file, "parser returned no tree"))?;

        let root = tree.root_node();
        if root.has_error() {
            return Err(ExtractError::parse(file, "source contains syntax errors"));
        }

        let lines: Vec<&str> = content.lines().collect();
        let mut chunks = Vec::new();

        if let Some(docstring) = module_docstring(root, content) {
            let line_end = docstring.split('\n').count() + 1;
            let chunk = Chunk::from_parts(
                file,
                format!("{file}:module"),
                ChunkKind::Module,
                String::new(),
                docstring,
                1,
                line_end,
            );
            if !chunk.is_blank() {
                chunks.push(chunk);
            }
        }

        visit(root, file, content, &lines, &mut chunks);

        log::debug!("Extracted {} chunks from {file}", chunks.len());
        Ok(chunks)
    }
}

impl Extractor for PythonExtractor {
    fn supported_extensions(&self) -> &'static [&'static str] {
        &[".py", ".pyi"]
    }

    fn extract(&self, path: &Path) -> Vec<Chunk> {
        let Some(content) = read_source(path, self.max_file_size) else {
            return Vec::new();
        };
        self.parse_chunks(&path.display().to_string(), &content)
    }
}

/// Walk every node, emitting function and class declarations wherever they
/// appear. Declarations nested inside classes or other functions are emitted
/// in addition to their parent.
fn visit(node: Node, file: &str, content: &str, lines: &[&str], chunks: &mut Vec<Chunk>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "function_definition" | "class_definition" => {
                if let Some(chunk) = declaration_chunk(child, file, content, lines) {
                    if !chunk.is_blank() {
                        chunks.push(chunk);
                    }
                }
                visit(child, file, content, lines, chunks);
            }
            _ => visit(child, file, content, lines, chunks),
        }
    }
}

fn declaration_chunk(node: Node, file: &str, content: &str, lines: &[&str]) -> Option<Chunk> {
    let name = node
        .child_by_field_name("name")?
        .utf8_text(content.as_bytes())
        .ok()?
        .to_string();

    let kind = match node.kind() {
        "class_definition" => ChunkKind::Class,
        _ if is_async(node) => ChunkKind::AsyncFunction,
        _ => ChunkKind::Function,
    };

    let line_start = node.start_position().row + 1;
    let line_end = widened_end_line(node);
    if line_start > line_end || line_start > lines.len() {
        return None;
    }

    let slice_end = line_end.min(lines.len());
    let code = lines[line_start - 1..slice_end].join("\n");
    let doc_text = docstring_of(node, content).unwrap_or_default();

    Some(Chunk::from_parts(
        file, name, kind, code, doc_text, line_start, line_end,
    ))
}

/// End line of a declaration, widened to the furthest end line among its
/// direct body statements. Tolerates grammars that under-report the span of
/// multi-line trailing bodies.
fn widened_end_line(node: Node) -> usize {
    let mut end = node.end_position().row + 1;
    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for statement in body.named_children(&mut cursor) {
            if statement.kind() == "comment" {
                continue;
            }
            end = end.max(statement.end_position().row + 1);
        }
    }
    end
}

fn is_async(node: Node) -> bool {
    node.child(0).is_some_and(|first| first.kind() == "async")
}

/// Docstring of a function or class: the leading string expression of its
/// body block, with quote delimiters stripped.
fn docstring_of(node: Node, content: &str) -> Option<String> {
    let body = node.child_by_field_name("body")?;
    leading_string(body, content)
}

/// Module docstring: the leading string expression of the file
fn module_docstring(root: Node, content: &str) -> Option<String> {
    leading_string(root, content)
}

fn leading_string(block: Node, content: &str) -> Option<String> {
    let mut cursor = block.walk();
    let first = block
        .named_children(&mut cursor)
        .find(|child| child.kind() != "comment")?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let string = first.named_child(0)?;
    if string.kind() != "string" {
        return None;
    }
    let raw = string.utf8_text(content.as_bytes()).ok()?;
    Some(strip_string_literal(raw))
}

fn strip_string_literal(raw: &str) -> String {
    let trimmed =
        raw.trim_start_matches(|c: char| matches!(c, 'r' | 'R' | 'b' | 'B' | 'u' | 'U' | 'f' | 'F'));
    for delimiter in ["\"\"\"", "'''"] {
        if trimmed.len() >= 6 && trimmed.starts_with(delimiter) && trimmed.ends_with(delimiter) {
            return trimmed[3..trimmed.len() - 3].trim().to_string();
        }
    }
    for delimiter in ['"', '\''] {
        if trimmed.len() >= 2 && trimmed.starts_with(delimiter) && trimmed.ends_with(delimiter) {
            return trimmed[1..trimmed.len() - 1].trim().to_string();
        }
    }
    trimmed.trim().to_string()
}
