use crate::error::{Result, StoreError};
use crate::index::Metric;
use semdex_extract::ExtractorSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration tree.
///
/// Every section has serde defaults, so a TOML file only needs to spell out
/// what it changes. A handful of `SEMDEX_*` environment variables override
/// the file for the settings that vary most between machines.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Name used to namespace persisted index artifacts
    pub index_name: String,

    pub embedding: EmbeddingConfig,
    pub index: IndexConfig,
    pub retriever: RetrieverConfig,
    pub indexing: IndexingConfig,
    pub extractors: ExtractorSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            index_name: "default".to_string(),
            embedding: EmbeddingConfig::default(),
            index: IndexConfig::default(),
            retriever: RetrieverConfig::default(),
            indexing: IndexingConfig::default(),
            extractors: ExtractorSettings::default(),
        }
    }
}

impl Config {
    /// Load configuration: defaults, overlaid by the TOML file at `path`
    /// (when given), overlaid by environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|err| {
                    StoreError::Config(format!(
                        "cannot read config file {}: {err}",
                        path.display()
                    ))
                })?;
                toml::from_str(&raw).map_err(|err| {
                    StoreError::Config(format!(
                        "invalid config file {}: {err}",
                        path.display()
                    ))
                })?
            }
            None => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(model) = std::env::var("SEMDEX_EMBEDDING_MODEL") {
            self.embedding.model = model;
        }
        if let Ok(dir) = std::env::var("SEMDEX_CACHE_DIR") {
            self.embedding.cache_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("SEMDEX_INDEX_DIR") {
            self.index.index_dir = PathBuf::from(dir);
        }
        if let Ok(name) = std::env::var("SEMDEX_INDEX_NAME") {
            self.index_name = name;
        }
    }
}

/// Embedding provider and embedding-service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Model identifier; `hash` selects the deterministic offline provider
    pub model: String,

    /// Directory for the content-addressed vector cache
    pub cache_dir: PathBuf,

    /// Whether to read/write the vector cache at all
    pub use_cache: bool,

    /// Number of texts per embedding group
    pub batch_size: usize,

    /// Concurrent embedding workers
    pub max_workers: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "all-minilm-l6-v2".to_string(),
            cache_dir: PathBuf::from(".semdex/cache/embeddings"),
            use_cache: true,
            batch_size: 32,
            max_workers: 4,
        }
    }
}

/// Vector index settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Directory for persisted index artifacts
    pub index_dir: PathBuf,

    /// Distance metric, fixed per index
    pub metric: Metric,

    /// Use an approximate-search backend when one is plugged in
    pub use_ann: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            index_dir: PathBuf::from(".semdex/index"),
            metric: Metric::default(),
            use_ann: true,
        }
    }
}

/// Query-time settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieverConfig {
    /// Default number of results per query
    pub top_k: usize,

    /// Default minimum score; `None` disables filtering
    pub threshold: Option<f32>,

    /// Template applied to each result. Placeholders: `{file}`, `{kind}`,
    /// `{name}`, `{score}`, `{full_text}`, `{separator}`.
    pub format_template: String,

    /// Literal substituted for `{separator}`
    pub separator: String,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            threshold: None,
            format_template: "File: {file} | Kind: {kind} | Name: {name}\n\
                              Score: {score}\n\
                              {separator}\n\
                              {full_text}\n\
                              {separator}\n"
                .to_string(),
            separator: "-".repeat(80),
        }
    }
}

/// Corpus-walk settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingConfig {
    /// Glob patterns for directory names to prune during traversal
    pub exclude_dirs: Vec<String>,

    /// Glob patterns for file basenames to skip
    pub exclude_files: Vec<String>,

    /// Concurrent extraction workers
    pub max_workers: usize,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            exclude_dirs: [
                ".git",
                "node_modules",
                "__pycache__",
                ".venv",
                "venv",
                "target",
                "dist",
                "build",
                ".semdex",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            exclude_files: ["*.min.js", "*.lock", ".*"]
                .into_iter()
                .map(String::from)
                .collect(),
            max_workers: std::thread::available_parallelism().map_or(4, usize::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn defaults_cover_every_section() {
        let config = Config::default();
        assert_eq!(config.index_name, "default");
        assert_eq!(config.retriever.top_k, 5);
        assert_eq!(config.retriever.threshold, None);
        assert_eq!(config.index.metric, Metric::L2);
        assert!(config.embedding.use_cache);
        assert!(config.indexing.exclude_dirs.iter().any(|d| d == ".git"));
    }

    #[test]
    fn partial_toml_overlays_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "index_name = \"myproj\"\n\n[index]\nmetric = \"cosine\"\n\n[retriever]\ntop_k = 3\nthreshold = 0.25\n"
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.index_name, "myproj");
        assert_eq!(config.index.metric, Metric::Cosine);
        assert_eq!(config.retriever.top_k, 3);
        assert_eq!(config.retriever.threshold, Some(0.25));
        // Untouched sections keep their defaults
        assert_eq!(config.embedding.batch_size, 32);
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "this is not toml {{").unwrap();
        assert!(Config::load(Some(file.path())).is_err());
    }

    #[test]
    fn missing_file_is_a_config_error() {
        assert!(Config::load(Some(Path::new("/no/such/config.toml"))).is_err());
    }
}
