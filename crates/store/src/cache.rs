use crate::error::Result;
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

const CACHE_MAGIC: &[u8; 4] = b"EV01";

/// Content-addressed disk cache for embedding vectors.
///
/// One file per fingerprint, scoped under a per-provider directory so a
/// provider swap cannot serve another model's vectors. Entries carry their
/// dimension in the header and are ignored (not trusted) when it no longer
/// matches the active provider. Concurrent writers of the same key race
/// harmlessly: content is identical for a given fingerprint by construction
/// and writes go through a temp file + rename.
#[derive(Clone, Debug)]
pub struct EmbeddingCache {
    base_dir: PathBuf,
}

impl EmbeddingCache {
    pub fn new(cache_dir: impl AsRef<Path>, provider_id: &str) -> Self {
        Self {
            base_dir: cache_dir.as_ref().join(safe_component(provider_id)),
        }
    }

    /// Deterministic fingerprint of the exact input text
    #[must_use]
    pub fn fingerprint(text: &str) -> String {
        let digest = Sha256::digest(text.as_bytes());
        let mut hex = String::with_capacity(digest.len() * 2);
        for byte in digest {
            let _ = write!(hex, "{byte:02x}");
        }
        hex
    }

    fn vector_path(&self, fingerprint: &str) -> PathBuf {
        self.base_dir.join(format!("{fingerprint}.vec"))
    }

    /// Fetch a cached vector, or `None` on miss or on any stale/corrupt entry
    pub async fn get(&self, text: &str, dimension: usize) -> Option<Vec<f32>> {
        let path = self.vector_path(&Self::fingerprint(text));
        let bytes = tokio::fs::read(&path).await.ok()?;
        decode_vector(&bytes, dimension)
    }

    /// Store a vector for `text`; an existing entry is left untouched
    pub async fn put(&self, text: &str, vector: &[f32]) -> Result<()> {
        let path = self.vector_path(&Self::fingerprint(text));
        if path.exists() {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = encode_vector(vector);
        let tmp = path.with_extension("vec.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        if tokio::fs::rename(&tmp, &path).await.is_err() {
            let _ = tokio::fs::remove_file(&tmp).await;
        }
        Ok(())
    }
}

fn safe_component(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.') {
            out.push(ch);
        } else {
            out.push('_');
        }
    }
    if out.is_empty() {
        "_".to_string()
    } else {
        out
    }
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + vector.len() * 4);
    out.extend_from_slice(CACHE_MAGIC);
    #[allow(clippy::cast_possible_truncation)]
    let dimension = vector.len() as u32;
    out.extend_from_slice(&dimension.to_le_bytes());
    for value in vector {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

fn decode_vector(bytes: &[u8], expected_dimension: usize) -> Option<Vec<f32>> {
    if bytes.len() < 8 || &bytes[0..4] != CACHE_MAGIC {
        return None;
    }
    let dimension = u32::from_le_bytes(bytes[4..8].try_into().ok()?) as usize;
    if dimension != expected_dimension {
        return None;
    }
    let expected_len = 8usize.saturating_add(dimension.saturating_mul(4));
    if bytes.len() != expected_len {
        return None;
    }
    let mut vector = Vec::with_capacity(dimension);
    for i in 0..dimension {
        let start = 8 + i * 4;
        let value = f32::from_le_bytes(bytes[start..start + 4].try_into().ok()?);
        vector.push(value);
    }
    Some(vector)
}
