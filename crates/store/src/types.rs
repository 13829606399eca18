use semdex_extract::Chunk;
use serde::{Deserialize, Serialize};

/// One search hit: the stored chunk metadata augmented with ranking scores.
///
/// `score` is normalized per metric (higher is more similar, comparable
/// within one index); `distance` is the raw metric-native value the backend
/// reported.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
    pub distance: f32,
}
