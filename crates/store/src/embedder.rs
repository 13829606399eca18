use crate::cache::EmbeddingCache;
use crate::config::EmbeddingConfig;
use crate::provider::EmbeddingProvider;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Embedding computation with caching and bounded-concurrency batching.
///
/// Failures degrade instead of propagating: a provider error produces a
/// zero-filled vector for the affected texts, which ranks last under both
/// supported metrics. Callers that need "top-k truly most relevant" should
/// treat zero-score results with suspicion.
#[derive(Clone)]
pub struct EmbeddingService {
    provider: Arc<dyn EmbeddingProvider>,
    cache: Option<EmbeddingCache>,
    batch_size: usize,
    max_workers: usize,
}

impl EmbeddingService {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, config: &EmbeddingConfig) -> Self {
        let cache = config
            .use_cache
            .then(|| EmbeddingCache::new(&config.cache_dir, provider.id()));
        Self {
            provider,
            cache,
            batch_size: config.batch_size.max(1),
            max_workers: config.max_workers.max(1),
        }
    }

    /// Vector length of the active provider
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.provider.dimension()
    }

    /// Embed a single text: cache first, then the provider, then a zero
    /// vector if the provider fails.
    pub async fn embed(&self, text: &str) -> Vec<f32> {
        if let Some(cache) = &self.cache {
            if let Some(vector) = cache.get(text, self.dimension()).await {
                return vector;
            }
        }

        match self.provider.embed_one(text).await {
            Ok(vector) => {
                self.store_in_cache(text, &vector).await;
                vector
            }
            Err(err) => {
                log::error!("Error generating embedding, substituting zero vector: {err}");
                vec![0.0; self.dimension()]
            }
        }
    }

    /// Embed many texts. Input is partitioned into fixed-size groups which
    /// are processed concurrently under a bounded worker pool; the output row
    /// at position `i` always corresponds to input position `i`, regardless
    /// of which groups finish first or fail.
    pub async fn batch_embed(&self, texts: &[String], batch_size: Option<usize>) -> Vec<Vec<f32>> {
        if texts.is_empty() {
            return Vec::new();
        }

        let group_size = batch_size.unwrap_or(self.batch_size).max(1);
        let groups: Vec<Vec<String>> = texts
            .chunks(group_size)
            .map(<[String]>::to_vec)
            .collect();
        let group_sizes: Vec<usize> = groups.iter().map(Vec::len).collect();

        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let mut join_set = JoinSet::new();
        for (slot, group) in groups.into_iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let service = self.clone();
            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                (slot, service.process_group(group).await)
            });
        }

        // Results are indexed back into pre-sized slots, never appended in
        // completion order.
        let mut slots: Vec<Option<Vec<Vec<f32>>>> = vec![None; group_sizes.len()];
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((slot, rows)) => slots[slot] = Some(rows),
                Err(err) => log::error!("Embedding worker failed: {err}"),
            }
        }

        let dimension = self.dimension();
        let mut output = Vec::with_capacity(texts.len());
        for (slot, rows) in slots.into_iter().enumerate() {
            match rows {
                Some(rows) => output.extend(rows),
                None => {
                    output.extend(
                        std::iter::repeat_with(|| vec![0.0; dimension]).take(group_sizes[slot]),
                    );
                }
            }
        }
        output
    }

    /// Process one group: cache hits fill their rows first, the remaining
    /// misses go to the provider as a single multi-input call. A provider
    /// failure leaves zeros for exactly this group's misses.
    async fn process_group(&self, texts: Vec<String>) -> Vec<Vec<f32>> {
        let dimension = self.dimension();
        let mut rows = vec![vec![0.0f32; dimension]; texts.len()];

        let mut misses: Vec<(usize, String)> = Vec::new();
        if let Some(cache) = &self.cache {
            for (i, text) in texts.iter().enumerate() {
                match cache.get(text, dimension).await {
                    Some(vector) => rows[i] = vector,
                    None => misses.push((i, text.clone())),
                }
            }
        } else {
            misses = texts.into_iter().enumerate().collect();
        }

        if misses.is_empty() {
            return rows;
        }

        let miss_texts: Vec<String> = misses.iter().map(|(_, text)| text.clone()).collect();
        match self.provider.embed_many(&miss_texts).await {
            Ok(vectors) if vectors.len() == miss_texts.len() => {
                for ((slot, text), vector) in misses.iter().zip(vectors) {
                    self.store_in_cache(text, &vector).await;
                    rows[*slot] = vector;
                }
            }
            Ok(vectors) => {
                log::error!(
                    "Provider returned {} vectors for {} inputs, zero-filling the group",
                    vectors.len(),
                    miss_texts.len()
                );
            }
            Err(err) => {
                log::error!(
                    "Error generating batch embeddings for a group of {}: {err}",
                    miss_texts.len()
                );
            }
        }

        rows
    }

    async fn store_in_cache(&self, text: &str, vector: &[f32]) {
        if let Some(cache) = &self.cache {
            if let Err(err) = cache.put(text, vector).await {
                log::warn!("Failed to write embedding cache entry: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, StoreError};
    use crate::provider::HashEmbeddingProvider;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn config(cache_dir: Option<PathBuf>, batch_size: usize, max_workers: usize) -> EmbeddingConfig {
        EmbeddingConfig {
            model: "hash".to_string(),
            cache_dir: cache_dir.clone().unwrap_or_else(|| PathBuf::from("unused")),
            use_cache: cache_dir.is_some(),
            batch_size,
            max_workers,
        }
    }

    /// Counts provider calls, delegating to token-hash embeddings
    struct CountingProvider {
        inner: HashEmbeddingProvider,
        calls: AtomicUsize,
    }

    impl CountingProvider {
        fn new(dimension: usize) -> Self {
            Self {
                inner: HashEmbeddingProvider::new(dimension),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for CountingProvider {
        fn id(&self) -> &str {
            "counting"
        }
        fn dimension(&self) -> usize {
            self.inner.dimension()
        }
        async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed_one(text).await
        }
        async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed_many(texts).await
        }
    }

    /// Sleeps a content-dependent amount before answering, so group
    /// completion order differs from submission order.
    struct JitteryProvider {
        inner: HashEmbeddingProvider,
    }

    #[async_trait]
    impl EmbeddingProvider for JitteryProvider {
        fn id(&self) -> &str {
            "jittery"
        }
        fn dimension(&self) -> usize {
            self.inner.dimension()
        }
        async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
            self.inner.embed_one(text).await
        }
        async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let delay = 40u64.saturating_sub((texts[0].len() as u64) * 7 % 40);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            self.inner.embed_many(texts).await
        }
    }

    /// Fails whole calls whose first text contains a trigger marker
    struct FlakyProvider {
        inner: HashEmbeddingProvider,
    }

    #[async_trait]
    impl EmbeddingProvider for FlakyProvider {
        fn id(&self) -> &str {
            "flaky"
        }
        fn dimension(&self) -> usize {
            self.inner.dimension()
        }
        async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
            if text.contains("boom") {
                return Err(StoreError::Embedding("synthetic failure".to_string()));
            }
            self.inner.embed_one(text).await
        }
        async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            if texts.iter().any(|t| t.contains("boom")) {
                return Err(StoreError::Embedding("synthetic failure".to_string()));
            }
            self.inner.embed_many(texts).await
        }
    }

    fn sample_texts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("sample text number {i}")).collect()
    }

    #[tokio::test]
    async fn batch_embed_preserves_input_order_under_jitter() {
        let provider = Arc::new(JitteryProvider {
            inner: HashEmbeddingProvider::new(32),
        });
        let reference = HashEmbeddingProvider::new(32);
        let service = EmbeddingService::new(provider, &config(None, 1, 4));

        let texts = sample_texts(8);
        let vectors = service.batch_embed(&texts, None).await;
        assert_eq!(vectors.len(), texts.len());
        for (text, vector) in texts.iter().zip(&vectors) {
            assert_eq!(vector, &reference.embed_one(text).await.unwrap());
        }
    }

    #[tokio::test]
    async fn repeated_batch_embed_hits_the_cache() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(CountingProvider::new(32));
        let service = EmbeddingService::new(
            Arc::clone(&provider) as Arc<dyn EmbeddingProvider>,
            &config(Some(dir.path().to_path_buf()), 2, 2),
        );

        let texts = sample_texts(5);
        let first = service.batch_embed(&texts, None).await;
        let calls_after_first = provider.calls.load(Ordering::SeqCst);
        assert!(calls_after_first > 0);

        let second = service.batch_embed(&texts, None).await;
        assert_eq!(first, second);
        assert_eq!(provider.calls.load(Ordering::SeqCst), calls_after_first);
    }

    #[tokio::test]
    async fn failing_group_zero_fills_only_its_own_rows() {
        let provider = Arc::new(FlakyProvider {
            inner: HashEmbeddingProvider::new(16),
        });
        let service = EmbeddingService::new(provider, &config(None, 2, 2));

        // Groups of two: [ok, ok], [boom, ok], [ok]
        let texts = vec![
            "alpha".to_string(),
            "beta".to_string(),
            "boom gamma".to_string(),
            "delta".to_string(),
            "epsilon".to_string(),
        ];
        let vectors = service.batch_embed(&texts, None).await;
        assert_eq!(vectors.len(), 5);

        let is_zero = |v: &[f32]| v.iter().all(|x| *x == 0.0);
        assert!(!is_zero(&vectors[0]));
        assert!(!is_zero(&vectors[1]));
        assert!(is_zero(&vectors[2]));
        assert!(is_zero(&vectors[3]));
        assert!(!is_zero(&vectors[4]));
    }

    #[tokio::test]
    async fn single_embed_degrades_to_zero_vector() {
        let provider = Arc::new(FlakyProvider {
            inner: HashEmbeddingProvider::new(16),
        });
        let service = EmbeddingService::new(provider, &config(None, 4, 2));

        let vector = service.embed("boom").await;
        assert_eq!(vector, vec![0.0; 16]);
    }

    #[tokio::test]
    async fn empty_input_is_a_no_op() {
        let provider = Arc::new(CountingProvider::new(8));
        let service = EmbeddingService::new(
            Arc::clone(&provider) as Arc<dyn EmbeddingProvider>,
            &config(None, 4, 2),
        );
        assert!(service.batch_embed(&[], None).await.is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }
}
