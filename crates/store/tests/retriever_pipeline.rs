//! End-to-end pipeline tests: corpus walk → extraction → embedding →
//! index → query, using the deterministic hash provider so nothing touches
//! the network.

use semdex_store::{
    ChunkKind, Config, ContextRetriever, HashEmbeddingProvider, Metric, StoreError,
};
use std::path::Path;
use std::sync::Arc;

fn write_corpus(root: &Path) {
    std::fs::create_dir_all(root.join("src")).unwrap();
    std::fs::write(
        root.join("src/stats.py"),
        "def moving_average(samples, window):\n    \"\"\"Compute the moving average of a series of samples.\"\"\"\n    return sum(samples[-window:]) / window\n",
    )
    .unwrap();
    std::fs::write(
        root.join("README.md"),
        "# Overview\n\nThis package ships statistics helpers.\n\n## Install\n\nCopy the wheel into your environment and unpack it.\n\n## License\n\nDistributed under the MIT license terms.\n",
    )
    .unwrap();
}

fn test_config(root: &Path, index_name: &str) -> Config {
    let mut config = Config::default();
    config.index_name = index_name.to_string();
    config.index.metric = Metric::Cosine;
    config.index.index_dir = root.join(".semdex/index");
    config.embedding.cache_dir = root.join(".semdex/cache");
    config.embedding.batch_size = 2;
    config.embedding.max_workers = 2;
    config.retriever.top_k = 3;
    config
}

fn retriever_for(root: &Path, index_name: &str) -> ContextRetriever {
    ContextRetriever::new(
        test_config(root, index_name),
        Arc::new(HashEmbeddingProvider::new(256)),
    )
    .unwrap()
}

#[tokio::test]
async fn documented_function_ranks_first_for_its_docstring() {
    let dir = tempfile::tempdir().unwrap();
    write_corpus(dir.path());

    let mut retriever = retriever_for(dir.path(), "rank");
    let indexed = retriever
        .index_corpus(dir.path(), None, false)
        .await
        .unwrap();
    // One function chunk + document chunk + three section chunks
    assert_eq!(indexed, 5);

    let results = retriever
        .raw_query("moving average of a series of samples", None)
        .await
        .unwrap();
    assert_eq!(results.len(), 3);

    let top = &results[0];
    assert_eq!(top.chunk.name, "moving_average");
    assert_eq!(top.chunk.kind, ChunkKind::Function);
    assert!(top.chunk.file.ends_with("stats.py"));
    assert!(top.score > results[1].score);
}

#[tokio::test]
async fn threshold_filters_and_none_matches_raw() {
    let dir = tempfile::tempdir().unwrap();
    write_corpus(dir.path());

    let mut retriever = retriever_for(dir.path(), "threshold");
    retriever
        .index_corpus(dir.path(), None, false)
        .await
        .unwrap();

    let raw = retriever.raw_query("moving average", None).await.unwrap();
    let unfiltered = retriever.query("moving average", None).await.unwrap();
    assert_eq!(unfiltered.len(), raw.len());

    // Every rendered result keeps raw order
    for (rendered, scored) in unfiltered.iter().zip(&raw) {
        assert!(rendered.contains(&scored.chunk.name));
    }

    let strict = retriever.query("moving average", Some(0.9)).await.unwrap();
    let surviving = raw.iter().filter(|r| r.score >= 0.9).count();
    assert_eq!(strict.len(), surviving);
    assert!(strict.len() < raw.len());
}

#[tokio::test]
async fn save_and_load_reproduce_search_results() {
    let dir = tempfile::tempdir().unwrap();
    write_corpus(dir.path());

    let mut retriever = retriever_for(dir.path(), "persist");
    retriever
        .index_corpus(dir.path(), None, true)
        .await
        .unwrap();
    let before = retriever.raw_query("moving average", None).await.unwrap();

    let mut restored = retriever_for(dir.path(), "persist");
    assert!(!restored.is_ready());
    assert!(restored.load_index().await);
    assert!(restored.is_ready());

    let after = restored.raw_query("moving average", None).await.unwrap();
    assert_eq!(before.len(), after.len());
    for (x, y) in before.iter().zip(&after) {
        assert_eq!(x.chunk, y.chunk);
        assert!((x.score - y.score).abs() < 1e-6);
    }
}

#[tokio::test]
async fn extension_allow_list_restricts_indexing() {
    let dir = tempfile::tempdir().unwrap();
    write_corpus(dir.path());

    let mut retriever = retriever_for(dir.path(), "allowlist");
    let indexed = retriever
        .index_corpus(dir.path(), Some(&[".md".to_string()]), false)
        .await
        .unwrap();
    // Document chunk + three sections; the Python file is skipped
    assert_eq!(indexed, 4);

    let results = retriever.raw_query("moving average", None).await.unwrap();
    assert!(results
        .iter()
        .all(|r| matches!(r.chunk.kind, ChunkKind::Document | ChunkKind::Section)));
}

#[tokio::test]
async fn query_without_an_index_reports_not_ready() {
    let dir = tempfile::tempdir().unwrap();
    let retriever = retriever_for(dir.path(), "empty");

    match retriever.raw_query("anything", None).await {
        Err(StoreError::NotReady { name }) => assert_eq!(name, "empty"),
        other => panic!("expected NotReady, got {other:?}"),
    }
}

#[tokio::test]
async fn reindexing_replaces_the_previous_contents() {
    let dir = tempfile::tempdir().unwrap();
    write_corpus(dir.path());

    let mut retriever = retriever_for(dir.path(), "rebuild");
    retriever
        .index_corpus(dir.path(), None, false)
        .await
        .unwrap();

    // Second pass over only the markdown file: the function chunk is gone
    retriever
        .index_corpus(dir.path(), Some(&[".md".to_string()]), false)
        .await
        .unwrap();
    let results = retriever.raw_query("moving average", None).await.unwrap();
    assert!(results.iter().all(|r| r.chunk.name != "moving_average"));
}
