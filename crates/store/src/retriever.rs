use crate::config::Config;
use crate::embedder::EmbeddingService;
use crate::error::{Result, StoreError};
use crate::index::VectorIndex;
use crate::provider::EmbeddingProvider;
use crate::types::ScoredChunk;
use globset::{Glob, GlobSet, GlobSetBuilder};
use once_cell::sync::Lazy;
use regex::Regex;
use semdex_extract::ExtractorSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use walkdir::WalkDir;

static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{[a-z_]+\}").expect("placeholder pattern"));

/// Drives the whole pipeline: corpus walk → extraction → embedding → index,
/// and at query time embedding → search → threshold filter → formatting.
pub struct ContextRetriever {
    extractors: ExtractorSet,
    embedder: EmbeddingService,
    index: VectorIndex,
    config: Config,
    exclude_dirs: GlobSet,
    exclude_files: GlobSet,
}

impl ContextRetriever {
    pub fn new(config: Config, provider: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let extractors = ExtractorSet::new(&config.extractors);
        let embedder = EmbeddingService::new(provider, &config.embedding);
        let index = VectorIndex::new(config.index.clone());
        let exclude_dirs = build_globset(&config.indexing.exclude_dirs)?;
        let exclude_files = build_globset(&config.indexing.exclude_files)?;

        Ok(Self {
            extractors,
            embedder,
            index,
            config,
            exclude_dirs,
            exclude_files,
        })
    }

    /// Name under which this retriever persists and loads its index
    #[must_use]
    pub fn index_name(&self) -> &str {
        &self.config.index_name
    }

    /// True once an index has been built or loaded
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.index.is_ready()
    }

    /// Walk `root`, extract chunks from every eligible file, embed them, and
    /// rebuild the index from scratch. Returns the number of indexed chunks.
    ///
    /// Extraction runs concurrently across files under a bounded pool; a
    /// failing file is logged and skipped. Chunk aggregation order across
    /// files is unspecified.
    pub async fn index_corpus(
        &mut self,
        root: &Path,
        extensions: Option<&[String]>,
        save: bool,
    ) -> Result<usize> {
        let files = self.collect_files(root, extensions);
        log::info!("Found {} files to process under {}", files.len(), root.display());

        let workers = self.config.indexing.max_workers.max(1);
        let semaphore = Arc::new(Semaphore::new(workers));
        let mut join_set = JoinSet::new();
        for path in files {
            let extractors = self.extractors.clone();
            let semaphore = Arc::clone(&semaphore);
            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                tokio::task::spawn_blocking(move || extractors.extract_chunks(&path)).await
            });
        }

        let mut chunks = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(Ok(file_chunks)) => chunks.extend(file_chunks),
                Ok(Err(err)) | Err(err) => {
                    log::error!("Extraction worker failed: {err}");
                }
            }
        }

        if chunks.is_empty() {
            log::warn!("No chunks extracted, aborting indexing");
            return Ok(0);
        }
        log::info!("Extracted {} chunks", chunks.len());

        let texts: Vec<String> = chunks.iter().map(|c| c.full_text.clone()).collect();
        let vectors = self.embedder.batch_embed(&texts, None).await;

        let count = chunks.len();
        self.index.build(vectors, chunks)?;

        if save {
            self.index.save(&self.config.index_name).await?;
        }
        Ok(count)
    }

    /// Embed the query text and search the index, returning metadata plus
    /// scores. Fails with [`StoreError::NotReady`] before the first
    /// build/load rather than silently returning nothing.
    pub async fn raw_query(&self, text: &str, top_k: Option<usize>) -> Result<Vec<ScoredChunk>> {
        self.ensure_ready()?;
        let query_vector = self.embedder.embed(text).await;
        Ok(self
            .index
            .search(&query_vector, top_k.unwrap_or(self.config.retriever.top_k)))
    }

    /// Query and render results as formatted strings.
    ///
    /// With a threshold (explicit or configured), results scoring below it
    /// are dropped; with none, output matches `raw_query` one-to-one.
    pub async fn query(&self, text: &str, threshold: Option<f32>) -> Result<Vec<String>> {
        let results = self.raw_query(text, None).await?;

        let threshold = threshold.or(self.config.retriever.threshold);
        let filtered: Vec<ScoredChunk> = match threshold {
            Some(threshold) => results
                .into_iter()
                .filter(|result| result.score >= threshold)
                .collect(),
            None => results,
        };

        Ok(filtered
            .iter()
            .map(|result| {
                render_result(
                    &self.config.retriever.format_template,
                    &self.config.retriever.separator,
                    result,
                )
            })
            .collect())
    }

    /// Load the previously persisted index for this retriever's index name
    pub async fn load_index(&mut self) -> bool {
        self.index.load(&self.config.index_name).await
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.index.is_ready() {
            Ok(())
        } else {
            Err(StoreError::NotReady {
                name: self.config.index_name.clone(),
            })
        }
    }

    /// Eligible files under `root`: excluded directories are pruned before
    /// descent, excluded basenames and unclaimed extensions are skipped, and
    /// an explicit allow-list (extensions with leading dot) restricts further.
    fn collect_files(&self, root: &Path, extensions: Option<&[String]>) -> Vec<PathBuf> {
        let allow: Option<Vec<String>> = extensions.map(|list| {
            list.iter()
                .map(|extension| extension.to_ascii_lowercase())
                .collect()
        });

        WalkDir::new(root)
            .into_iter()
            .filter_entry(|entry| {
                if entry.depth() == 0 || !entry.file_type().is_dir() {
                    return true;
                }
                let name = entry.file_name().to_string_lossy();
                !self.exclude_dirs.is_match(name.as_ref())
            })
            .filter_map(std::result::Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| {
                let basename = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                if self.exclude_files.is_match(&basename) {
                    return false;
                }
                if let Some(allow) = &allow {
                    let extension = path
                        .extension()
                        .map(|e| format!(".{}", e.to_string_lossy().to_ascii_lowercase()))
                        .unwrap_or_default();
                    if !allow.contains(&extension) {
                        return false;
                    }
                }
                self.extractors.extractor_for(path).is_some()
            })
            .collect()
    }
}

/// Substitute result fields into the template. Unknown placeholders render
/// as a literal `N/A` rather than failing the render.
fn render_result(template: &str, separator: &str, result: &ScoredChunk) -> String {
    let rendered = template
        .replace("{file}", &result.chunk.file)
        .replace("{kind}", result.chunk.kind.as_str())
        .replace("{name}", &result.chunk.name)
        .replace("{score}", &format!("{:.4}", result.score))
        .replace("{full_text}", &result.chunk.full_text)
        .replace("{separator}", separator);
    PLACEHOLDER_RE.replace_all(&rendered, "N/A").into_owned()
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|err| StoreError::Config(format!("invalid glob `{pattern}`: {err}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|err| StoreError::Config(format!("invalid exclude patterns: {err}")))
}
