//! Query orchestrator: embed the question, retrieve chunks, generate, cite.

use std::sync::Arc;

use reqmind_chat::{build_prompt, ContextPassage, Generator};
use reqmind_core::{AppConfig, Error, Result};
use reqmind_infer::EmbedderBackend;
use reqmind_ingest::TextChunk;
use reqmind_store::{NewEntry, SearchHit, VectorIndex};
use tracing::{debug, info};

use crate::types::*;

/// Chunks embedded per `embed_batch` call during ingestion.
pub const EMBED_BATCH_SIZE: usize = 32;

/// Returned for blank questions.
pub const EMPTY_QUESTION_ANSWER: &str = "Please provide a valid question.";

/// Per-query knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    pub top_k: usize,
    pub snippet_chars: usize,
    pub max_input_chars: usize,
}

impl QueryOptions {
    pub fn from_config(config: &AppConfig, max_input_chars: usize) -> Self {
        Self {
            top_k: config.top_k,
            snippet_chars: config.snippet_chars,
            max_input_chars,
        }
    }
}

/// Coordinates the embedder, the index and the generator.
///
/// Holds no per-query state; every `answer` call is independent.
pub struct QueryOrchestrator {
    embedder: Arc<dyn EmbedderBackend>,
    index: Arc<VectorIndex>,
    generator: Arc<Generator>,
    options: QueryOptions,
}

impl QueryOrchestrator {
    /// Fails with [`Error::RebuildRequired`] if the index was built with another embedder.
    pub fn new(
        embedder: Arc<dyn EmbedderBackend>,
        index: Arc<VectorIndex>,
        generator: Arc<Generator>,
        options: QueryOptions,
    ) -> Result<Self> {
        let manifest = index.manifest();
        if manifest.model_id != embedder.model_id() || manifest.dimension != embedder.dimension() {
            return Err(Error::RebuildRequired(format!(
                "index built with {} ({}d), embedder is {} ({}d)",
                manifest.model_id,
                manifest.dimension,
                embedder.model_id(),
                embedder.dimension()
            )));
        }
        if options.top_k == 0 {
            return Err(Error::Config("top_k must be greater than zero".into()));
        }
        info!(
            "Orchestrator ready: embedder={}, generator={}, top_k={}",
            embedder.model_id(),
            generator.backend_name(),
            options.top_k
        );
        Ok(Self {
            embedder,
            index,
            generator,
            options,
        })
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    /// Release the orchestrator and hand back the index, e.g. to close it.
    pub fn into_index(self) -> Arc<VectorIndex> {
        self.index
    }

    /// Embed `chunks` and add them to the index. Returns the number of entries added.
    ///
    /// Whitespace-only chunks are skipped.
    pub fn ingest(&self, chunks: &[TextChunk]) -> Result<usize> {
        let usable: Vec<&TextChunk> = chunks.iter().filter(|c| !c.text.trim().is_empty()).collect();
        if usable.len() < chunks.len() {
            debug!("Skipping {} blank chunks", chunks.len() - usable.len());
        }

        let mut added = 0;
        for batch in usable.chunks(EMBED_BATCH_SIZE) {
            let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
            let embeddings = self.embedder.embed_batch(&texts)?;
            if embeddings.len() != batch.len() {
                return Err(Error::Embedding(format!(
                    "embedder returned {} vectors for {} texts",
                    embeddings.len(),
                    batch.len()
                )));
            }
            let entries: Vec<NewEntry> = batch
                .iter()
                .zip(embeddings)
                .map(|(chunk, embedding)| NewEntry {
                    text: chunk.text.clone(),
                    source: chunk.source.clone(),
                    page: chunk.page,
                    chunk_index: chunk.chunk_index,
                    embedding,
                })
                .collect();
            added += self.index.add(&entries)?.len();
            debug!("Indexed {}/{} chunks", added, usable.len());
        }

        info!("Indexed {} chunks", added);
        Ok(added)
    }

    /// Answer `question` from the indexed documents.
    pub async fn answer(&self, question: &str) -> std::result::Result<QueryResult, QueryError> {
        let question = question.trim();
        if question.is_empty() {
            return Ok(QueryResult {
                answer: EMPTY_QUESTION_ANSWER.into(),
                sources: Vec::new(),
            });
        }

        debug!(stage = %QueryStage::Embedding, "Embedding question");
        let query = self
            .embedder
            .embed(question)
            .map_err(|e| QueryError::new(QueryStage::Embedding, e))?;

        debug!(stage = %QueryStage::Retrieving, top_k = self.options.top_k, "Searching index");
        let hits = self
            .index
            .search(&query, self.options.top_k)
            .map_err(|e| {
                QueryError::new(QueryStage::Retrieving, Error::Retrieval(e.to_string()))
            })?;
        debug!("Retrieved {} chunks", hits.len());

        debug!(stage = %QueryStage::Generating, "Generating answer");
        let passages: Vec<ContextPassage> = hits
            .iter()
            .map(|hit| ContextPassage {
                text: hit.entry.text.clone(),
                source: hit.entry.source.clone(),
                page: hit.entry.page,
            })
            .collect();
        let request = build_prompt(question, &passages, self.options.max_input_chars);
        let answer = self
            .generator
            .generate(&request)
            .await
            .map_err(|e| QueryError::new(QueryStage::Generating, e))?;

        let sources = hits
            .iter()
            .map(|hit| self.citation(hit))
            .collect::<Vec<_>>();
        info!(
            stage = %QueryStage::Done,
            "Answered with {} of {} retrieved chunks in context",
            request.context_used,
            hits.len()
        );
        Ok(QueryResult { answer, sources })
    }

    fn citation(&self, hit: &SearchHit) -> SourceCitation {
        SourceCitation {
            source: hit.entry.source.clone(),
            page: hit.entry.page,
            snippet: snippet(&hit.entry.text, self.options.snippet_chars),
            distance: hit.distance,
        }
    }
}

/// First `max_chars` characters of `text`, with `...` when cut.
pub fn snippet(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ndarray::Array1;
    use reqmind_chat::{GenerateError, GenerationMode, PromptRequest, RetryPolicy, TextGenerator};
    use reqmind_infer::HashingEmbedder;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Echoes a fixed answer and keeps the last prompt it saw.
    struct EchoGenerator {
        reply: std::result::Result<String, GenerateError>,
        last_prompt: Mutex<Option<String>>,
    }

    #[async_trait]
    impl TextGenerator for EchoGenerator {
        fn name(&self) -> String {
            "echo".into()
        }

        async fn generate(
            &self,
            _mode: GenerationMode,
            request: &PromptRequest,
        ) -> std::result::Result<String, GenerateError> {
            *self.last_prompt.lock().unwrap() = Some(request.completion_text());
            self.reply.clone()
        }
    }

    struct Fixture {
        orchestrator: QueryOrchestrator,
        backend: Arc<EchoGenerator>,
        _dir: TempDir,
    }

    fn fixture(reply: std::result::Result<String, GenerateError>) -> Fixture {
        let dir = TempDir::new().unwrap();
        let embedder: Arc<dyn EmbedderBackend> = Arc::new(HashingEmbedder::new(256).unwrap());
        let index = Arc::new(
            VectorIndex::create(dir.path(), embedder.model_id(), embedder.dimension()).unwrap(),
        );
        let backend = Arc::new(EchoGenerator {
            reply,
            last_prompt: Mutex::new(None),
        });
        let generator = Arc::new(
            Generator::new(backend.clone(), vec![GenerationMode::Completion], RetryPolicy::none())
                .unwrap(),
        );
        let orchestrator = QueryOrchestrator::new(
            embedder,
            index,
            generator,
            QueryOptions {
                top_k: 2,
                snippet_chars: 20,
                max_input_chars: 6000,
            },
        )
        .unwrap();
        Fixture {
            orchestrator,
            backend,
            _dir: dir,
        }
    }

    fn chunk(text: &str, source: &str, chunk_index: usize) -> TextChunk {
        TextChunk {
            text: text.into(),
            source: source.into(),
            page: None,
            chunk_index,
            start_char: 0,
            end_char: text.chars().count(),
        }
    }

    #[test]
    fn test_snippet() {
        assert_eq!(snippet("short", 200), "short");
        assert_eq!(snippet("abcdef", 3), "abc...");
        assert_eq!(snippet("äöüß", 2), "äö...");
    }

    #[test]
    fn test_ingest_skips_blank_chunks() {
        let f = fixture(Ok("unused".into()));
        let added = f
            .orchestrator
            .ingest(&[
                chunk("REQ-001 login", "a.txt", 0),
                chunk("   \n ", "a.txt", 1),
                chunk("REQ-002 export", "a.txt", 2),
            ])
            .unwrap();
        assert_eq!(added, 2);
        assert_eq!(f.orchestrator.index().len(), 2);
    }

    #[test]
    fn test_ingest_many_batches() {
        let f = fixture(Ok("unused".into()));
        let chunks: Vec<_> = (0..70)
            .map(|i| chunk(&format!("requirement number {}", i), "big.txt", i))
            .collect();
        assert_eq!(f.orchestrator.ingest(&chunks).unwrap(), 70);
    }

    #[tokio::test]
    async fn test_answer_with_citations() {
        let f = fixture(Ok("REQ-002 requires PDF export.".into()));
        f.orchestrator
            .ingest(&[
                chunk("REQ-001: The system shall authenticate users with a password.", "srs.txt", 0),
                chunk("REQ-002: The system shall export reports as PDF files.", "srs.txt", 1),
                chunk("Glossary of unrelated terms", "notes.md", 0),
            ])
            .unwrap();

        let result = f.orchestrator.answer("What does REQ-002 require?").await.unwrap();
        assert_eq!(result.answer, "REQ-002 requires PDF export.");
        assert_eq!(result.sources.len(), 2);
        assert!(result.sources[0].snippet.starts_with("REQ-002"));
        assert!(result.sources[0].snippet.ends_with("..."));
        assert!(result.sources[0].distance <= result.sources[1].distance);

        let prompt = f.backend.last_prompt.lock().unwrap().clone().unwrap();
        assert!(prompt.contains("[1] (source: srs.txt)\nREQ-002"));
        assert!(prompt.contains("Question: What does REQ-002 require?"));
    }

    #[tokio::test]
    async fn test_empty_index_still_generates() {
        let f = fixture(Ok("I don't know.".into()));
        let result = f.orchestrator.answer("Anything?").await.unwrap();
        assert!(result.sources.is_empty());
        let prompt = f.backend.last_prompt.lock().unwrap().clone().unwrap();
        assert!(prompt.contains(reqmind_chat::prompt::NO_CONTEXT_NOTE));
    }

    #[tokio::test]
    async fn test_blank_question_skips_pipeline() {
        let f = fixture(Ok("unused".into()));
        let result = f.orchestrator.answer("   ").await.unwrap();
        assert_eq!(result.answer, EMPTY_QUESTION_ANSWER);
        assert!(result.sources.is_empty());
        assert!(f.backend.last_prompt.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_generation_failure_reports_stage() {
        let f = fixture(Err(GenerateError::RateLimited));
        let err = f.orchestrator.answer("What is REQ-001?").await.unwrap_err();
        assert_eq!(err.stage, QueryStage::Generating);
        assert!(err.to_string().contains("generation"));
    }

    #[test]
    fn test_embedder_mismatch_requires_rebuild() {
        let dir = TempDir::new().unwrap();
        let index = Arc::new(VectorIndex::create(dir.path(), "lexical-hash-128", 128).unwrap());
        let embedder: Arc<dyn EmbedderBackend> = Arc::new(HashingEmbedder::new(256).unwrap());
        let backend = Arc::new(EchoGenerator {
            reply: Ok(String::new()),
            last_prompt: Mutex::new(None),
        });
        let generator = Arc::new(
            Generator::new(backend, vec![GenerationMode::Chat], RetryPolicy::none()).unwrap(),
        );
        let options = QueryOptions {
            top_k: 3,
            snippet_chars: 200,
            max_input_chars: 6000,
        };
        let err = QueryOrchestrator::new(embedder, index, generator, options).err().unwrap();
        assert!(matches!(err, Error::RebuildRequired(_)));
    }

    /// Reports the index's dimension but returns shorter vectors.
    struct ShortEmbedder;

    impl EmbedderBackend for ShortEmbedder {
        fn model_id(&self) -> &str {
            "short-8"
        }

        fn dimension(&self) -> usize {
            256
        }

        fn embed(&self, _text: &str) -> Result<Array1<f32>> {
            Ok(Array1::ones(8))
        }
    }

    #[tokio::test]
    async fn test_search_failure_reports_retrieval_stage() {
        let dir = TempDir::new().unwrap();
        let index = Arc::new(VectorIndex::create(dir.path(), "short-8", 256).unwrap());
        let backend = Arc::new(EchoGenerator {
            reply: Ok("unused".into()),
            last_prompt: Mutex::new(None),
        });
        let generator = Arc::new(
            Generator::new(backend.clone(), vec![GenerationMode::Chat], RetryPolicy::none())
                .unwrap(),
        );
        let options = QueryOptions {
            top_k: 3,
            snippet_chars: 200,
            max_input_chars: 6000,
        };
        let orchestrator =
            QueryOrchestrator::new(Arc::new(ShortEmbedder), index, generator, options).unwrap();

        let err = orchestrator.answer("What is REQ-001?").await.unwrap_err();
        assert_eq!(err.stage, QueryStage::Retrieving);
        assert!(matches!(err.source, Error::Retrieval(_)));
        assert!(backend.last_prompt.lock().unwrap().is_none());
    }
}
