use crate::types::Chunk;
use std::path::Path;

/// A per-format chunk extractor.
///
/// Implementations turn one file into zero or more chunks. Extraction is
/// infallible at this boundary: anything that goes wrong with a file is
/// logged and yields an empty (or partial) list, never an error that aborts
/// the caller's corpus walk.
pub trait Extractor: Send + Sync {
    /// File extensions this extractor claims, lowercase with the leading dot
    fn supported_extensions(&self) -> &'static [&'static str];

    /// Extract chunks from the file at `path`
    fn extract(&self, path: &Path) -> Vec<Chunk>;
}

/// Validate and read a source file.
///
/// Rejects paths that do not exist, are not regular files, exceed
/// `max_file_size`, or do not decode as UTF-8. Every rejection is logged at
/// warn level and reported as `None` so the caller can skip the file.
pub(crate) fn read_source(path: &Path, max_file_size: u64) -> Option<String> {
    let metadata = match std::fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(_) => {
            log::warn!("File does not exist: {}", path.display());
            return None;
        }
    };

    if !metadata.is_file() {
        log::warn!("Not a regular file: {}", path.display());
        return None;
    }

    if metadata.len() > max_file_size {
        log::warn!(
            "File too large ({} bytes): {}",
            metadata.len(),
            path.display()
        );
        return None;
    }

    match std::fs::read_to_string(path) {
        Ok(content) => Some(content),
        Err(err) => {
            log::warn!("Cannot read file {}: {err}", path.display());
            None
        }
    }
}

/// Basename of a path as a string, falling back to the full display form
pub(crate) fn file_basename(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .map_or_else(|| path.display().to_string(), ToOwned::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_is_rejected() {
        assert!(read_source(Path::new("/no/such/file.py"), 1024).is_none());
    }

    #[test]
    fn directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_source(dir.path(), 1024).is_none());
    }

    #[test]
    fn oversized_file_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"0123456789").unwrap();
        assert!(read_source(file.path(), 5).is_none());
        assert!(read_source(file.path(), 10).is_some());
    }

    #[test]
    fn non_utf8_file_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0xff, 0xfe, 0x41]).unwrap();
        assert!(read_source(file.path(), 1024).is_none());
    }
}
