use crate::config::EmbeddingConfig;
use crate::error::{Result, StoreError};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::{Arc, Mutex};

/// A source of fixed-length embedding vectors.
///
/// The dimension is constant for the provider's lifetime. `embed_many` is an
/// optimization hook for providers with a multi-input call; the default just
/// loops over `embed_one`.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Stable identifier used to namespace cache entries
    fn id(&self) -> &str;

    /// Length of every vector this provider produces
    fn dimension(&self) -> usize;

    /// Embed a single text
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts, one vector per input, order preserved
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed_one(text).await?);
        }
        Ok(vectors)
    }
}

/// Construct the provider named by the configuration.
///
/// A bad model identifier or a failed model load is a setup failure and
/// propagates; there is no degraded fallback at construction time.
pub async fn provider_from_config(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.model.as_str() {
        "hash" => Ok(Arc::new(HashEmbeddingProvider::new(256))),
        _ => Ok(Arc::new(FastEmbedProvider::load(&config.model).await?)),
    }
}

/// Local ONNX embedding models via fastembed
pub struct FastEmbedProvider {
    model: Arc<Mutex<TextEmbedding>>,
    model_id: String,
    dimension: usize,
}

impl FastEmbedProvider {
    /// Load (downloading on first use) the named model and probe its
    /// dimension with a test embedding.
    pub async fn load(model_id: &str) -> Result<Self> {
        let id = model_id.to_string();
        let (model, dimension) =
            tokio::task::spawn_blocking(move || -> Result<(TextEmbedding, usize)> {
                let builtin = builtin_model(&id)?;
                let mut model = TextEmbedding::try_new(
                    InitOptions::new(builtin).with_show_download_progress(false),
                )
                .map_err(|err| {
                    StoreError::Embedding(format!("failed to load model `{id}`: {err}"))
                })?;

                let probe = model
                    .embed(vec!["dimension probe".to_string()], None)
                    .map_err(|err| {
                        StoreError::Embedding(format!("model `{id}` failed a probe embedding: {err}"))
                    })?;
                let dimension = probe
                    .first()
                    .map(Vec::len)
                    .ok_or_else(|| {
                        StoreError::Embedding(format!("model `{id}` returned no probe vector"))
                    })?;

                Ok((model, dimension))
            })
            .await
            .map_err(|err| StoreError::Embedding(format!("model load task failed: {err}")))??;

        log::info!("Loaded embedding model `{model_id}` (dimension {dimension})");
        Ok(Self {
            model: Arc::new(Mutex::new(model)),
            model_id: model_id.to_string(),
            dimension,
        })
    }

    async fn run(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let model = Arc::clone(&self.model);
        tokio::task::spawn_blocking(move || {
            let mut guard = model
                .lock()
                .map_err(|_| StoreError::Embedding("embedding model mutex poisoned".to_string()))?;
            guard
                .embed(texts, None)
                .map_err(|err| StoreError::Embedding(format!("embedding failed: {err}")))
        })
        .await
        .map_err(|err| StoreError::Embedding(format!("embedding task failed: {err}")))?
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    fn id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.run(vec![text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| StoreError::Embedding("no embedding returned".to_string()))
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.run(texts.to_vec()).await
    }
}

fn builtin_model(id: &str) -> Result<EmbeddingModel> {
    match id {
        "all-minilm-l6-v2" | "sentence-transformers/all-MiniLM-L6-v2" => {
            Ok(EmbeddingModel::AllMiniLML6V2)
        }
        "bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(EmbeddingModel::BGEBaseENV15),
        "nomic-embed-text-v1.5" => Ok(EmbeddingModel::NomicEmbedTextV15),
        other => Err(StoreError::Config(format!(
            "unknown embedding model `{other}`"
        ))),
    }
}

/// Deterministic token-hash embeddings.
///
/// No model download, no network: each token bumps one dimension selected by
/// an FNV-1a hash and the result is L2-normalized. Ranking quality is only
/// as good as lexical overlap, which is exactly enough for offline runs and
/// tests.
pub struct HashEmbeddingProvider {
    dimension: usize,
}

impl HashEmbeddingProvider {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|token| !token.is_empty())
        {
            let slot = (fnv1a(token.as_bytes()) as usize) % self.dimension;
            vector[slot] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbeddingProvider {
    fn id(&self) -> &str {
        "hash"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.vectorize(text))
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.vectorize(text)).collect())
    }
}

const fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = 0xcbf2_9ce4_8422_2325u64;
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        i += 1;
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_provider_is_deterministic() {
        let provider = HashEmbeddingProvider::new(64);
        let a = provider.embed_one("moving average of samples").await.unwrap();
        let b = provider.embed_one("moving average of samples").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[tokio::test]
    async fn hash_provider_vectors_are_normalized() {
        let provider = HashEmbeddingProvider::new(64);
        let vector = provider.embed_one("a few short tokens").await.unwrap();
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn similar_texts_score_higher_than_unrelated() {
        let provider = HashEmbeddingProvider::new(128);
        let base = provider
            .embed_one("compute the moving average of samples")
            .await
            .unwrap();
        let close = provider.embed_one("moving average of samples").await.unwrap();
        let far = provider
            .embed_one("installation instructions for the package")
            .await
            .unwrap();

        let dot = |a: &[f32], b: &[f32]| a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>();
        assert!(dot(&base, &close) > dot(&base, &far));
    }

    #[tokio::test]
    async fn unknown_model_is_a_setup_failure() {
        let config = EmbeddingConfig {
            model: "no-such-model".to_string(),
            ..EmbeddingConfig::default()
        };
        assert!(provider_from_config(&config).await.is_err());
    }

    #[tokio::test]
    async fn embed_many_preserves_order() {
        let provider = HashEmbeddingProvider::new(32);
        let texts = vec![
            "first text".to_string(),
            "second text".to_string(),
            "third text".to_string(),
        ];
        let batch = provider.embed_many(&texts).await.unwrap();
        for (text, vector) in texts.iter().zip(&batch) {
            assert_eq!(vector, &provider.embed_one(text).await.unwrap());
        }
    }
}
