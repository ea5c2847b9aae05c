//! Pipeline setup: configuration, embedder, index lifecycle, generator.

use std::sync::Arc;

use anyhow::Context;
use reqmind_chat::{Generator, GeneratorConfig};
use reqmind_core::{AppConfig, Error};
use reqmind_infer::{create_embedder, EmbedderBackend};
use reqmind_ingest::Ingester;
use reqmind_runtime::{QueryOptions, QueryOrchestrator};
use reqmind_store::schema::DB_FILE;
use reqmind_store::VectorIndex;
use tracing::{info, warn};

use crate::cli::Cli;

/// Resolve configuration and bring the pipeline up.
///
/// Configuration problems are reported before any file is touched. The index is rebuilt when
/// `--recreate` is given or the index directory holds no index database; otherwise the existing
/// one is opened as is.
pub fn build(cli: &Cli) -> anyhow::Result<QueryOrchestrator> {
    let mut config = AppConfig::from_env()?;
    cli.apply(&mut config);
    config.validate()?;
    let generator_config = GeneratorConfig::from_env()?;

    let rebuild = cli.recreate || !config.index_dir.join(DB_FILE).is_file();
    if rebuild {
        config.require_corpus_dir()?;
    }

    let embedder = create_embedder(&config.embedding_model, &config.model_dir)
        .context("Could not load the embedding model")?;
    let generator = Arc::new(Generator::from_config(&generator_config)?);
    let options = QueryOptions::from_config(&config, generator_config.max_input_chars);

    if !rebuild {
        let index = VectorIndex::open(&config.index_dir, embedder.model_id(), embedder.dimension())
            .map_err(rebuild_hint)?;
        info!("Opened index at {} ({} entries)", config.index_dir.display(), index.len());
        if index.is_empty() {
            warn!("Index is empty; answers will have no document context");
        }
        let orchestrator = QueryOrchestrator::new(embedder, Arc::new(index), generator, options)
            .map_err(rebuild_hint)?;
        log_stats(orchestrator.index());
        return Ok(orchestrator);
    }

    let orchestrator = build_index(&config, embedder, generator, options)?;
    log_stats(orchestrator.index());
    Ok(orchestrator)
}

fn build_index(
    config: &AppConfig,
    embedder: Arc<dyn EmbedderBackend>,
    generator: Arc<Generator>,
    options: QueryOptions,
) -> anyhow::Result<QueryOrchestrator> {
    eprintln!("Building index from {} ...", config.corpus_dir.display());
    let report = Ingester::from_config(config)?.ingest_directory(&config.corpus_dir)?;
    if report.chunks.is_empty() {
        warn!(
            "No indexable text found in {}; answers will have no document context",
            config.corpus_dir.display()
        );
    }
    info!(
        total = report.stats.total,
        avg_chars = report.stats.avg_chars,
        min_chars = report.stats.min_chars,
        max_chars = report.stats.max_chars,
        "Chunk statistics"
    );

    let index = VectorIndex::create(&config.index_dir, embedder.model_id(), embedder.dimension())?;
    let orchestrator = QueryOrchestrator::new(embedder, Arc::new(index), generator, options)?;
    let added = orchestrator.ingest(&report.chunks)?;
    orchestrator.index().finish()?;

    eprintln!(
        "Indexed {} chunks from {} documents ({} duplicates skipped)",
        added, report.documents, report.duplicates
    );
    Ok(orchestrator)
}

fn log_stats(index: &VectorIndex) {
    match index.stats() {
        Ok(stats) => info!(
            "Index stats: {} entries from {} sources, model={} ({}d), {:.2} MB at {}",
            stats.entries,
            stats.sources,
            stats.model_id,
            stats.dimension,
            stats.db_size_mb,
            stats.db_path
        ),
        Err(e) => warn!("Could not read index stats: {}", e),
    }
}

fn rebuild_hint(err: Error) -> anyhow::Error {
    match err {
        Error::RebuildRequired(reason) => {
            anyhow::anyhow!("{}: rebuild required (run with --recreate)", reason)
        }
        other => other.into(),
    }
}
