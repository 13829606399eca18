use crate::config::IndexConfig;
use crate::error::{Result, StoreError};
use crate::types::ScoredChunk;
use ndarray::{Array1, Array2};
use semdex_extract::Chunk;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const INDEX_MAGIC: &[u8; 4] = b"SXF1";
const SCORE_EPSILON: f32 = 1e-6;

/// Distance metric for vector comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Euclidean distance
    L2,
    /// Cosine similarity (vectors are L2-normalized on insertion so an
    /// inner-product backend yields cosine directly)
    Cosine,
}

impl Default for Metric {
    fn default() -> Self {
        Self::L2
    }
}

impl Metric {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::L2 => "l2",
            Self::Cosine => "cosine",
        }
    }
}

/// A pluggable approximate-nearest-neighbor backend.
///
/// `search` returns raw metric-native distances plus row indices into the
/// matrix it was built from. Absence of a backend triggers the brute-force
/// fallback with identical external search semantics, minus the sub-linear
/// scaling.
pub trait AnnBackend: Send + Sync {
    /// Index the given row-major matrix (replacing any previous contents)
    fn build(&mut self, vectors: &Array2<f32>, metric: Metric) -> Result<()>;

    /// Return up to `k` (distance, row-index) pairs, best first
    fn search(&self, query: &Array1<f32>, k: usize) -> Result<(Vec<f32>, Vec<usize>)>;

    /// Backend-native serialization of the built structure
    fn to_bytes(&self) -> Result<Vec<u8>>;

    /// Restore a previously serialized structure
    fn from_bytes(&mut self, bytes: &[u8]) -> Result<()>;
}

/// Constructor for a pluggable backend, invoked at build and load time
pub type AnnBackendFactory = Arc<dyn Fn() -> Box<dyn AnnBackend> + Send + Sync>;

enum Backend {
    Empty,
    Flat(Array2<f32>),
    Ann(Box<dyn AnnBackend>),
}

/// Metadata envelope persisted alongside the vector structure
#[derive(Serialize, Deserialize)]
struct Envelope {
    metadata: Vec<Chunk>,
    dimension: usize,
    metric: Metric,
}

/// Searchable store of embedding vectors and their chunk metadata.
///
/// Metadata entry `i` corresponds to vector row `i`, and that pairing is
/// stable across save/load. `build` fully replaces previous contents; there
/// is no incremental update.
pub struct VectorIndex {
    config: IndexConfig,
    metric: Metric,
    dimension: usize,
    metadata: Vec<Chunk>,
    backend: Backend,
    ann_factory: Option<AnnBackendFactory>,
}

impl VectorIndex {
    #[must_use]
    pub fn new(config: IndexConfig) -> Self {
        let metric = config.metric;
        Self {
            config,
            metric,
            dimension: 0,
            metadata: Vec::new(),
            backend: Backend::Empty,
            ann_factory: None,
        }
    }

    /// Plug in an approximate-search backend. It is used only when the
    /// configuration also enables it.
    #[must_use]
    pub fn with_ann_backend(mut self, factory: AnnBackendFactory) -> Self {
        self.ann_factory = Some(factory);
        self
    }

    /// True once `build` or `load` has produced a searchable structure
    #[must_use]
    pub fn is_ready(&self) -> bool {
        !matches!(self.backend, Backend::Empty)
    }

    /// Number of stored vectors (equals the number of metadata entries)
    #[must_use]
    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    #[must_use]
    pub const fn metric(&self) -> Metric {
        self.metric
    }

    /// Build the index from vectors and their parallel metadata.
    ///
    /// Fully replaces any previous contents, including the dimension. Empty
    /// input is a warned no-op. Mismatched counts and ragged vector lengths
    /// are errors: mixed-dimension stores must never exist.
    pub fn build(&mut self, vectors: Vec<Vec<f32>>, metadata: Vec<Chunk>) -> Result<()> {
        if vectors.len() != metadata.len() {
            return Err(StoreError::CountMismatch {
                vectors: vectors.len(),
                metadata: metadata.len(),
            });
        }
        if vectors.is_empty() {
            log::warn!("No embeddings provided to build index");
            return Ok(());
        }

        let dimension = vectors[0].len();
        for vector in &vectors {
            if vector.len() != dimension {
                return Err(StoreError::InvalidDimension {
                    expected: dimension,
                    actual: vector.len(),
                });
            }
        }

        let rows = vectors.len();
        let flat: Vec<f32> = vectors.into_iter().flatten().collect();
        let mut matrix = Array2::from_shape_vec((rows, dimension), flat)
            .map_err(|err| StoreError::Config(format!("invalid embedding matrix shape: {err}")))?;

        if self.metric == Metric::Cosine {
            normalize_rows(&mut matrix);
        }

        self.backend = if self.config.use_ann {
            if let Some(factory) = &self.ann_factory {
                let mut backend = factory();
                backend.build(&matrix, self.metric)?;
                Backend::Ann(backend)
            } else {
                Backend::Flat(matrix)
            }
        } else {
            Backend::Flat(matrix)
        };
        self.dimension = dimension;
        self.metadata = metadata;

        log::info!(
            "Built index with {} vectors, dimension {} ({})",
            self.len(),
            self.dimension,
            self.metric.as_str()
        );
        Ok(())
    }

    /// Search for the `top_k` nearest chunks.
    ///
    /// Results are ordered by descending score. Scores are comparable within
    /// one index only: under `l2` they are normalized against the current
    /// result batch's maximum distance, so different queries produce
    /// different scales.
    #[must_use]
    pub fn search(&self, query: &[f32], top_k: usize) -> Vec<ScoredChunk> {
        if !self.is_ready() {
            log::error!("Index not built yet");
            return Vec::new();
        }

        if query.len() != self.dimension {
            log::error!(
                "Query dimension {} does not match index dimension {}",
                query.len(),
                self.dimension
            );
            return Vec::new();
        }

        let k = top_k.min(self.metadata.len());
        if k == 0 {
            return Vec::new();
        }

        let mut query = Array1::from_vec(query.to_vec());
        if self.metric == Metric::Cosine {
            normalize_in_place(&mut query);
        }

        let (distances, indices) = match &self.backend {
            Backend::Empty => return Vec::new(),
            Backend::Ann(backend) => match backend.search(&query, k) {
                Ok(hits) => hits,
                Err(err) => {
                    log::error!("Backend search failed: {err}");
                    return Vec::new();
                }
            },
            Backend::Flat(matrix) => flat_search(matrix, &query, self.metric, k),
        };

        self.score_results(&distances, &indices)
    }

    /// Turn raw backend distances into scored metadata entries
    fn score_results(&self, distances: &[f32], indices: &[usize]) -> Vec<ScoredChunk> {
        let max_distance = distances.iter().copied().fold(0.0f32, f32::max);

        let mut results = Vec::with_capacity(indices.len());
        for (&distance, &index) in distances.iter().zip(indices) {
            let Some(chunk) = self.metadata.get(index) else {
                continue;
            };
            let score = match self.metric {
                // Inner product over normalized vectors IS cosine similarity
                Metric::Cosine => distance,
                // Normalized per query against this result batch, not globally
                Metric::L2 => 1.0 - distance / (max_distance + SCORE_EPSILON),
            };
            results.push(ScoredChunk {
                chunk: chunk.clone(),
                score,
                distance,
            });
        }
        results
    }

    /// Persist the vector structure and metadata envelope under `name`
    pub async fn save(&self, name: &str) -> Result<()> {
        let vector_bytes = match &self.backend {
            Backend::Empty => {
                return Err(StoreError::index(name, "cannot save an unbuilt index"));
            }
            Backend::Flat(matrix) => encode_matrix(matrix),
            Backend::Ann(backend) => backend.to_bytes()?,
        };

        tokio::fs::create_dir_all(&self.config.index_dir).await?;
        let (index_path, meta_path) = self.artifact_paths(name);
        write_atomic(&index_path, &vector_bytes).await?;

        let envelope = Envelope {
            metadata: self.metadata.clone(),
            dimension: self.dimension,
            metric: self.metric,
        };
        write_atomic(&meta_path, &serde_json::to_vec(&envelope)?).await?;

        log::info!(
            "Saved index to {} and metadata to {}",
            index_path.display(),
            meta_path.display()
        );
        Ok(())
    }

    /// Restore a previously saved index.
    ///
    /// Returns `false` (with logging) when either artifact is missing,
    /// unreadable, or mutually inconsistent; errors never escape this
    /// boundary.
    pub async fn load(&mut self, name: &str) -> bool {
        let (index_path, meta_path) = self.artifact_paths(name);

        let meta_bytes = match tokio::fs::read(&meta_path).await {
            Ok(bytes) => bytes,
            Err(err) => {
                log::error!("Index metadata not found at {}: {err}", meta_path.display());
                return false;
            }
        };
        let envelope: Envelope = match serde_json::from_slice(&meta_bytes) {
            Ok(envelope) => envelope,
            Err(err) => {
                log::error!("Corrupt index metadata at {}: {err}", meta_path.display());
                return false;
            }
        };

        let vector_bytes = match tokio::fs::read(&index_path).await {
            Ok(bytes) => bytes,
            Err(err) => {
                log::error!("Index file not found at {}: {err}", index_path.display());
                return false;
            }
        };

        let backend = if vector_bytes.starts_with(INDEX_MAGIC) {
            match decode_matrix(&vector_bytes) {
                Some(matrix) => Backend::Flat(matrix),
                None => {
                    log::error!("Corrupt index file at {}", index_path.display());
                    return false;
                }
            }
        } else if let Some(factory) = &self.ann_factory {
            let mut ann = factory();
            if let Err(err) = ann.from_bytes(&vector_bytes) {
                log::error!("Backend failed to load {}: {err}", index_path.display());
                return false;
            }
            Backend::Ann(ann)
        } else {
            log::error!(
                "Index file at {} requires an approximate-search backend that is not available",
                index_path.display()
            );
            return false;
        };

        if let Backend::Flat(matrix) = &backend {
            if matrix.ncols() != envelope.dimension || matrix.nrows() != envelope.metadata.len() {
                log::error!(
                    "Index artifacts for `{name}` are inconsistent: {}x{} vectors, dimension {}, {} metadata entries",
                    matrix.nrows(),
                    matrix.ncols(),
                    envelope.dimension,
                    envelope.metadata.len()
                );
                return false;
            }
        }

        self.metric = envelope.metric;
        self.dimension = envelope.dimension;
        self.metadata = envelope.metadata;
        self.backend = backend;

        log::info!(
            "Loaded index `{name}` with {} vectors from {}",
            self.len(),
            index_path.display()
        );
        true
    }

    fn artifact_paths(&self, name: &str) -> (PathBuf, PathBuf) {
        (
            self.config.index_dir.join(format!("{name}.index")),
            self.config.index_dir.join(format!("{name}.meta.json")),
        )
    }
}

/// Brute-force search directly over the stored matrix
fn flat_search(
    matrix: &Array2<f32>,
    query: &Array1<f32>,
    metric: Metric,
    k: usize,
) -> (Vec<f32>, Vec<usize>) {
    let mut scored: Vec<(f32, usize)> = match metric {
        Metric::Cosine => matrix
            .outer_iter()
            .enumerate()
            .map(|(i, row)| (row.dot(query), i))
            .collect(),
        Metric::L2 => matrix
            .outer_iter()
            .enumerate()
            .map(|(i, row)| {
                let distance = row
                    .iter()
                    .zip(query.iter())
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum::<f32>()
                    .sqrt();
                (distance, i)
            })
            .collect(),
    };

    match metric {
        // Highest inner product first
        Metric::Cosine => {
            scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        }
        // Smallest distance first
        Metric::L2 => {
            scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        }
    }
    scored.truncate(k);

    let distances = scored.iter().map(|(d, _)| *d).collect();
    let indices = scored.iter().map(|(_, i)| *i).collect();
    (distances, indices)
}

fn normalize_rows(matrix: &mut Array2<f32>) {
    for mut row in matrix.outer_iter_mut() {
        let norm = row.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            row.mapv_inplace(|v| v / norm);
        }
    }
}

fn normalize_in_place(vector: &mut Array1<f32>) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.mapv_inplace(|v| v / norm);
    }
}

fn encode_matrix(matrix: &Array2<f32>) -> Vec<u8> {
    let rows = matrix.nrows() as u32;
    let cols = matrix.ncols() as u32;
    let mut out = Vec::with_capacity(12 + matrix.len() * 4);
    out.extend_from_slice(INDEX_MAGIC);
    out.extend_from_slice(&rows.to_le_bytes());
    out.extend_from_slice(&cols.to_le_bytes());
    for value in matrix.iter() {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

fn decode_matrix(bytes: &[u8]) -> Option<Array2<f32>> {
    if bytes.len() < 12 || &bytes[0..4] != INDEX_MAGIC {
        return None;
    }
    let rows = u32::from_le_bytes(bytes[4..8].try_into().ok()?) as usize;
    let cols = u32::from_le_bytes(bytes[8..12].try_into().ok()?) as usize;
    let expected_len = 12usize
        .checked_add(rows.checked_mul(cols)?.checked_mul(4)?)?;
    if bytes.len() != expected_len {
        return None;
    }

    let mut values = Vec::with_capacity(rows * cols);
    for chunk in bytes[12..].chunks_exact(4) {
        values.push(f32::from_le_bytes(chunk.try_into().ok()?));
    }
    Array2::from_shape_vec((rows, cols), values).ok()
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
