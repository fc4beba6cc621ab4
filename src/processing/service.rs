//! RAG service coordinating document ingestion, retrieval, and answer generation.

use crate::{
    config::Config,
    document::{Document, load_pdf},
    embedding::{EmbeddingClient, EmbeddingClientError, get_embedding_client},
    llm::{ChatClient, ChatRequest, get_chat_client},
    metrics::{MetricsSnapshot, RagMetrics},
    processing::{
        answer::{ParsedAnswer, extract_figures, parse_sections},
        chunking::{SplitterSettings, split_documents},
        mappers::{PreparedChunk, StatsAccumulator, dedupe_chunks, map_scored_point},
        prompt::{
            NO_MATCHES, NOT_FOUND_ANSWER, PromptPair, join_context, numerical_prompt,
            standard_prompt,
        },
        types::{
            Answer, AnswerBody, BuildOutcome, DatabaseStatus, QuestionKind, RagError,
            RetrievedChunk,
        },
    },
    qdrant::{PointInsert, QdrantService, client::format_endpoint, scroller::stream_payloads},
};
use async_trait::async_trait;
use futures_util::{pin_mut, stream::StreamExt};
use serde_json::json;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio::sync::Mutex;

/// Coordinates the full pipeline: PDF loading, chunking, embedding, Qdrant writes, retrieval,
/// and prompting the chat model.
///
/// The service owns long-lived handles to the embedding and chat providers, the Qdrant transport,
/// and the metrics registry so the HTTP surface and the CLI share the same components. Construct
/// it once near process start and share it through an `Arc`.
pub struct RagService {
    config: Config,
    embedding_client: Box<dyn EmbeddingClient>,
    chat_client: Box<dyn ChatClient>,
    qdrant_service: QdrantService,
    metrics: Arc<RagMetrics>,
    ready: AtomicBool,
    build_lock: Mutex<()>,
}

/// Abstraction over the RAG pipeline used by external surfaces.
#[async_trait]
pub trait RagApi: Send + Sync {
    /// Whether a vector database is available for questions.
    fn is_ready(&self) -> bool;

    /// Rebuild the vector database from the configured PDF.
    async fn build_database(&self) -> Result<BuildOutcome, RagError>;

    /// Answer a question using retrieved context.
    async fn ask(&self, question: &str, kind: QuestionKind) -> Result<Answer, RagError>;

    /// Retrieve the chunks most similar to `query`.
    async fn search(&self, query: &str) -> Result<Vec<RetrievedChunk>, RagError>;

    /// Report collection presence and statistics.
    async fn database_status(&self) -> Result<DatabaseStatus, RagError>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;

    /// Largest number of questions accepted in one batch.
    fn batch_max_questions(&self) -> usize;
}

impl RagService {
    /// Build a service from configuration, creating provider clients and checking for the
    /// collection.
    ///
    /// An unreachable Qdrant is logged and leaves the service not ready; it does not fail
    /// construction.
    pub async fn new(config: &Config) -> Result<Self, RagError> {
        tracing::info!("Initializing embedding client");
        let embedding_client = get_embedding_client(config)?;
        let chat_client = get_chat_client(config)?;
        tracing::info!(model = %config.llm_model, "Chat client initialized");

        let service = Self::with_components(config.clone(), embedding_client, chat_client)?;
        if let Err(error) = service.refresh_readiness().await {
            tracing::warn!(error = %error, "Could not determine whether the database exists");
        }
        Ok(service)
    }

    /// Build a service around caller-supplied provider clients. Readiness starts unset.
    pub fn with_components(
        config: Config,
        embedding_client: Box<dyn EmbeddingClient>,
        chat_client: Box<dyn ChatClient>,
    ) -> Result<Self, RagError> {
        let qdrant_service = QdrantService::new(&config)?;
        Ok(Self {
            config,
            embedding_client,
            chat_client,
            qdrant_service,
            metrics: Arc::new(RagMetrics::new()),
            ready: AtomicBool::new(false),
            build_lock: Mutex::new(()),
        })
    }

    /// Re-check whether the collection exists and update the readiness flag.
    pub async fn refresh_readiness(&self) -> Result<bool, RagError> {
        let exists = self.database_exists().await?;
        self.ready.store(exists, Ordering::SeqCst);
        if exists {
            tracing::info!("RAG system is ready - database found.");
        } else {
            tracing::info!("RAG system starting - database not found, run /database/build first");
        }
        Ok(exists)
    }

    /// Whether the configured collection exists in Qdrant.
    pub async fn database_exists(&self) -> Result<bool, RagError> {
        Ok(self
            .qdrant_service
            .collection_exists(&self.config.qdrant_collection_name)
            .await?)
    }

    /// Load the configured PDF and rebuild the collection from it.
    pub async fn build_database(&self) -> Result<BuildOutcome, RagError> {
        tracing::info!(path = %self.config.document_path, "Building database");
        let pages = load_pdf(&self.config.document_path).await?;
        self.index_documents(&pages).await
    }

    /// Rebuild the collection from already-loaded pages.
    ///
    /// The collection is dropped and recreated, so the result always reflects exactly `pages`.
    /// Only one rebuild may run at a time.
    pub async fn index_documents(&self, pages: &[Document]) -> Result<BuildOutcome, RagError> {
        let _guard = self
            .build_lock
            .try_lock()
            .map_err(|_| RagError::BuildInProgress)?;
        let collection = self.config.qdrant_collection_name.clone();

        let chunks = split_documents(pages, &SplitterSettings::from_config(&self.config))?;
        let (prepared, skipped_duplicates) = dedupe_chunks(chunks);
        if prepared.is_empty() {
            return Err(RagError::EmptyDocument);
        }

        self.ready.store(false, Ordering::SeqCst);
        self.qdrant_service.delete_collection(&collection).await?;
        self.qdrant_service
            .create_collection(&collection, self.config.embedding_dimension as u64)
            .await?;
        self.qdrant_service.ensure_payload_indexes(&collection).await?;

        let mut written = 0;
        let batch_size = self.config.embedding_batch_size.max(1);
        for batch in prepared.chunks(batch_size) {
            let points = self.embed_batch(batch).await?;
            written += self.qdrant_service.index_points(&collection, points).await?;
            tracing::debug!(collection = %collection, written, total = prepared.len(), "Indexed batch");
        }

        self.metrics.record_build(written as u64);
        self.ready.store(true, Ordering::SeqCst);
        tracing::info!(
            collection = %collection,
            pages = pages.len(),
            chunks = written,
            skipped_duplicates,
            "Database built successfully"
        );

        Ok(BuildOutcome {
            collection,
            pages: pages.len(),
            chunks: written,
            skipped_duplicates,
        })
    }

    async fn embed_batch(&self, batch: &[PreparedChunk]) -> Result<Vec<PointInsert>, RagError> {
        let texts: Vec<String> = batch
            .iter()
            .map(|chunk| chunk.document.page_content.clone())
            .collect();
        let vectors = self.embedding_client.generate_embeddings(texts).await?;
        if vectors.len() != batch.len() {
            return Err(EmbeddingClientError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                batch.len(),
                vectors.len()
            ))
            .into());
        }

        batch
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| {
                self.check_dimension(&vector)?;
                let document = &chunk.document;
                Ok(PointInsert {
                    text: document.page_content.clone(),
                    chunk_hash: chunk.chunk_hash.clone(),
                    source: document.metadata.source.clone(),
                    page: document.metadata.page,
                    start_index: document.metadata.start_index,
                    vector,
                })
            })
            .collect()
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<(), RagError> {
        let expected = self.config.embedding_dimension;
        let actual = vector.len();
        if actual != expected {
            return Err(RagError::DimensionMismatch { expected, actual });
        }
        Ok(())
    }

    /// Embed `query` and return the top-k most similar chunks.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedChunk>, RagError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(RagError::EmptyQuery);
        }
        let collection = &self.config.qdrant_collection_name;
        if !self.qdrant_service.collection_exists(collection).await? {
            return Err(RagError::DatabaseMissing);
        }

        let mut vectors = self
            .embedding_client
            .generate_embeddings(vec![query.to_string()])
            .await?;
        let vector = vectors.pop().ok_or(RagError::EmptyEmbedding)?;
        self.check_dimension(&vector)?;

        let hits = self
            .qdrant_service
            .search_points(collection, vector, self.config.retrieval_top_k)
            .await?;
        let retrieved: Vec<RetrievedChunk> =
            hits.into_iter().filter_map(map_scored_point).collect();
        tracing::debug!(hits = retrieved.len(), "Retrieved context");
        Ok(retrieved)
    }

    /// Answer a question, recording the outcome in metrics.
    pub async fn ask(&self, question: &str, kind: QuestionKind) -> Result<Answer, RagError> {
        tracing::info!(kind = kind.as_str(), "Processing question: {}", question.trim());
        let result = self.answer(question, kind).await;
        self.metrics.record_question(result.is_ok());
        if let Err(error) = &result {
            tracing::warn!(error = %error, kind = kind.as_str(), "Question failed");
        }
        result
    }

    async fn answer(&self, question: &str, kind: QuestionKind) -> Result<Answer, RagError> {
        let retrieved = self.retrieve(question).await?;

        let body = match kind {
            QuestionKind::Query => AnswerBody::Raw {
                raw_output: if retrieved.is_empty() {
                    NO_MATCHES.to_string()
                } else {
                    join_context(&retrieved)
                },
            },
            QuestionKind::Standard if retrieved.is_empty() => AnswerBody::Sections(ParsedAnswer {
                answer: NOT_FOUND_ANSWER.to_string(),
                ..ParsedAnswer::default()
            }),
            QuestionKind::Standard => {
                let output = self.complete(standard_prompt(&retrieved, question)).await?;
                match parse_sections(&output) {
                    Some(parsed) => AnswerBody::Sections(parsed),
                    None => AnswerBody::Raw { raw_output: output },
                }
            }
            QuestionKind::Numerical if retrieved.is_empty() => AnswerBody::Numerical {
                raw_output: NOT_FOUND_ANSWER.to_string(),
                figures: Vec::new(),
            },
            QuestionKind::Numerical => {
                let output = self.complete(numerical_prompt(&retrieved, question)).await?;
                AnswerBody::Numerical {
                    figures: extract_figures(&output),
                    raw_output: output,
                }
            }
        };

        Ok(Answer { body, retrieved })
    }

    async fn complete(&self, prompt: PromptPair) -> Result<String, RagError> {
        let PromptPair { system, user } = prompt;
        let output = self
            .chat_client
            .complete(ChatRequest {
                model: self.config.llm_model.clone(),
                system,
                user,
                temperature: self.config.llm_temperature,
            })
            .await?;
        Ok(output)
    }

    /// Retrieval-only search.
    pub async fn search(&self, query: &str) -> Result<Vec<RetrievedChunk>, RagError> {
        tracing::info!("Searching for: {}", query.trim());
        let hits = self.retrieve(query).await?;
        self.metrics.record_search();
        Ok(hits)
    }

    /// Report whether the collection exists and, if so, its statistics.
    pub async fn database_status(&self) -> Result<DatabaseStatus, RagError> {
        let collection = &self.config.qdrant_collection_name;
        let database_path = format_endpoint(
            self.qdrant_service.base_url(),
            &format!("collections/{collection}"),
        );

        if !self.database_exists().await? {
            return Ok(DatabaseStatus {
                database_exists: false,
                database_path,
                stats: None,
            });
        }

        let info = self.qdrant_service.collection_info(collection).await?;
        let mut stats = StatsAccumulator::default();
        let stream = stream_payloads(
            &self.qdrant_service,
            collection,
            json!(["source", "page", "indexed_at"]),
        );
        pin_mut!(stream);
        while let Some(payload) = stream.next().await {
            stats.add(&payload?);
        }

        Ok(DatabaseStatus {
            database_exists: true,
            database_path,
            stats: Some(stats.finish(info.points_count)),
        })
    }

    /// Return the current metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[async_trait]
impl RagApi for RagService {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn build_database(&self) -> Result<BuildOutcome, RagError> {
        RagService::build_database(self).await
    }

    async fn ask(&self, question: &str, kind: QuestionKind) -> Result<Answer, RagError> {
        RagService::ask(self, question, kind).await
    }

    async fn search(&self, query: &str) -> Result<Vec<RetrievedChunk>, RagError> {
        RagService::search(self, query).await
    }

    async fn database_status(&self) -> Result<DatabaseStatus, RagError> {
        RagService::database_status(self).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        RagService::metrics_snapshot(self)
    }

    fn batch_max_questions(&self) -> usize {
        self.config.batch_max_questions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentMetadata;
    use crate::llm::LlmClientError;
    use httpmock::{
        Method::{DELETE, GET, POST, PUT},
        MockServer,
    };
    use std::sync::Mutex as StdMutex;

    const DIM: usize = 4;

    struct FixedEmbedder;

    #[async_trait]
    impl EmbeddingClient for FixedEmbedder {
        async fn generate_embeddings(
            &self,
            texts: Vec<String>,
        ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
            Ok(texts.iter().map(|_| vec![0.5; DIM]).collect())
        }
    }

    struct ShortEmbedder;

    #[async_trait]
    impl EmbeddingClient for ShortEmbedder {
        async fn generate_embeddings(
            &self,
            texts: Vec<String>,
        ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
            Ok(texts.iter().map(|_| vec![0.5; 2]).collect())
        }
    }

    #[derive(Default)]
    struct ScriptedChat {
        reply: String,
        requests: Arc<StdMutex<Vec<ChatRequest>>>,
    }

    #[async_trait]
    impl ChatClient for ScriptedChat {
        async fn complete(&self, request: ChatRequest) -> Result<String, LlmClientError> {
            if let Ok(mut guard) = self.requests.lock() {
                guard.push(request);
            }
            Ok(self.reply.clone())
        }
    }

    fn config(server: &MockServer) -> Config {
        Config::from_lookup(|key| match key {
            "QDRANT_URL" => Some(server.base_url()),
            "QDRANT_COLLECTION_NAME" => Some("budget".into()),
            "EMBEDDING_DIMENSION" => Some(DIM.to_string()),
            "TEXT_SPLITTER_CHUNK_SIZE" => Some("80".into()),
            "TEXT_SPLITTER_CHUNK_OVERLAP" => Some("10".into()),
            "EMBEDDING_BATCH_SIZE" => Some("2".into()),
            _ => None,
        })
        .expect("config")
    }

    fn service_with(
        server: &MockServer,
        embedder: Box<dyn EmbeddingClient>,
        reply: &str,
    ) -> (RagService, Arc<StdMutex<Vec<ChatRequest>>>) {
        let requests = Arc::new(StdMutex::new(Vec::new()));
        let chat = ScriptedChat {
            reply: reply.into(),
            requests: requests.clone(),
        };
        let service = RagService::with_components(config(server), embedder, Box::new(chat))
            .expect("service");
        (service, requests)
    }

    async fn mock_collection_present(server: &MockServer) {
        server
            .mock_async(|when, then| {
                when.method(GET).path("/collections/budget");
                then.status(200)
                    .json_body(json!({ "result": { "status": "green", "points_count": 2 } }));
            })
            .await;
    }

    async fn mock_query_hits(server: &MockServer) {
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/budget/points/query")
                    .body_contains("\"limit\":3");
                then.status(200).json_body(json!({
                    "result": { "points": [
                        { "id": "a", "score": 0.9, "payload": {
                            "text": "The Budget provides $51.4 billion for the Department of Energy.",
                            "source": "brief.pdf", "page": 0, "start_index": 0 } },
                        { "id": "b", "score": 0.7, "payload": {
                            "text": "A 4 percent increase over FY 2024.",
                            "source": "brief.pdf", "page": 1, "start_index": 120 } }
                    ] }
                }));
            })
            .await;
    }

    fn page(text: &str, page: usize) -> Document {
        Document {
            page_content: text.into(),
            metadata: DocumentMetadata {
                source: "brief.pdf".into(),
                page,
                start_index: None,
            },
        }
    }

    #[tokio::test]
    async fn index_documents_rebuilds_collection_in_batches() {
        let server = MockServer::start_async().await;
        let delete = server
            .mock_async(|when, then| {
                when.method(DELETE).path("/collections/budget");
                then.status(200).json_body(json!({ "result": true }));
            })
            .await;
        let create = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/collections/budget")
                    .body_contains("\"size\":4");
                then.status(200).json_body(json!({ "result": true }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(PUT).path("/collections/budget/index");
                then.status(200).json_body(json!({ "result": { "status": "acknowledged" } }));
            })
            .await;
        let upsert = server
            .mock_async(|when, then| {
                when.method(PUT).path("/collections/budget/points");
                then.status(200).json_body(json!({ "result": { "status": "completed" } }));
            })
            .await;

        let (service, _) = service_with(&server, Box::new(FixedEmbedder), "");
        let pages = vec![
            page("Department of Energy. The Budget provides $51.4 billion.", 0),
            page("Department of Energy. The Budget provides $51.4 billion.", 1),
            page("Grid resilience receives new funding in FY 2025.", 2),
        ];

        let outcome = service.index_documents(&pages).await.expect("build");

        delete.assert();
        create.assert();
        assert_eq!(outcome.pages, 3);
        assert_eq!(outcome.chunks, 2);
        assert_eq!(outcome.skipped_duplicates, 1);
        assert_eq!(upsert.hits(), 1);
        assert!(service.is_ready());
        assert_eq!(service.metrics_snapshot().chunks_indexed, 2);
    }

    #[tokio::test]
    async fn index_documents_rejects_blank_corpus() {
        let server = MockServer::start_async().await;
        let (service, _) = service_with(&server, Box::new(FixedEmbedder), "");
        let error = service
            .index_documents(&[page("   ", 0)])
            .await
            .expect_err("blank corpus");
        assert!(matches!(error, RagError::EmptyDocument));
    }

    #[tokio::test]
    async fn index_documents_refuses_a_second_concurrent_build() {
        let server = MockServer::start_async().await;
        let delete = server
            .mock_async(|when, then| {
                when.method(DELETE).path("/collections/budget");
                then.status(200).json_body(json!({ "result": true }));
            })
            .await;
        let (service, _) = service_with(&server, Box::new(FixedEmbedder), "");

        let running = service.build_lock.try_lock().expect("first build holds the lock");
        let error = service
            .index_documents(&[page("Grid resilience receives new funding.", 0)])
            .await
            .expect_err("second build");
        assert!(matches!(error, RagError::BuildInProgress));
        assert_eq!(delete.hits(), 0);
        assert!(!service.is_ready());
        drop(running);
    }

    #[tokio::test]
    async fn batch_limit_follows_service_config() {
        let server = MockServer::start_async().await;
        let mut config = config(&server);
        config.batch_max_questions = 4;
        let service = RagService::with_components(
            config,
            Box::new(FixedEmbedder),
            Box::new(ScriptedChat {
                reply: String::new(),
                requests: Arc::new(StdMutex::new(Vec::new())),
            }),
        )
        .expect("service");
        assert_eq!(RagApi::batch_max_questions(&service), 4);
    }

    #[tokio::test]
    async fn missing_collection_reports_database_missing() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/collections/budget");
                then.status(404);
            })
            .await;

        let (service, _) = service_with(&server, Box::new(FixedEmbedder), "");
        let error = service
            .ask("How much for energy?", QuestionKind::Standard)
            .await
            .expect_err("no database");
        assert_eq!(
            error.to_string(),
            "Database not found! Please run first '--build' option."
        );
        assert_eq!(service.metrics_snapshot().questions_failed, 1);
    }

    #[tokio::test]
    async fn standard_question_is_parsed_into_sections() {
        let server = MockServer::start_async().await;
        mock_collection_present(&server).await;
        mock_query_hits(&server).await;

        let reply = "ANSWER:\n$51.4 billion.\nSOURCES:\nbrief.pdf, page 1\nRELEVANT EXCERPTS:\n\"provides $51.4 billion\"";
        let (service, requests) = service_with(&server, Box::new(FixedEmbedder), reply);
        let answer = service
            .ask("How much for energy?", QuestionKind::Standard)
            .await
            .expect("answer");

        match &answer.body {
            AnswerBody::Sections(parsed) => {
                assert_eq!(parsed.answer, "$51.4 billion.");
                assert_eq!(parsed.sources, "brief.pdf, page 1");
            }
            other => panic!("unexpected body: {other:?}"),
        }
        assert_eq!(answer.retrieved.len(), 2);
        let sent = requests.lock().expect("requests");
        assert_eq!(sent.len(), 1);
        assert!(sent[0].user.contains("$51.4 billion for the Department of Energy"));
        assert_eq!(sent[0].model, "llama3.2:3b");
    }

    #[tokio::test]
    async fn unstructured_reply_falls_back_to_raw_output() {
        let server = MockServer::start_async().await;
        mock_collection_present(&server).await;
        mock_query_hits(&server).await;

        let (service, _) = service_with(&server, Box::new(FixedEmbedder), "It is $51.4 billion.");
        let answer = service
            .ask("How much?", QuestionKind::Standard)
            .await
            .expect("answer");
        assert_eq!(
            answer.body,
            AnswerBody::Raw {
                raw_output: "It is $51.4 billion.".into()
            }
        );
    }

    #[tokio::test]
    async fn numerical_question_extracts_figures() {
        let server = MockServer::start_async().await;
        mock_collection_present(&server).await;
        mock_query_hits(&server).await;

        let (service, _) = service_with(
            &server,
            Box::new(FixedEmbedder),
            "FY 2025: $51.4 billion, up 4 percent.",
        );
        let answer = service
            .ask("What is the energy budget?", QuestionKind::Numerical)
            .await
            .expect("answer");
        let AnswerBody::Numerical { figures, .. } = answer.body else {
            panic!("expected numerical body");
        };
        assert_eq!(figures.len(), 3);
        assert_eq!(service.metrics_snapshot().questions_answered, 1);
    }

    #[tokio::test]
    async fn query_kind_joins_context_without_calling_model() {
        let server = MockServer::start_async().await;
        mock_collection_present(&server).await;
        mock_query_hits(&server).await;

        let (service, requests) = service_with(&server, Box::new(FixedEmbedder), "unused");
        let answer = service
            .ask("energy", QuestionKind::Query)
            .await
            .expect("answer");
        let AnswerBody::Raw { raw_output } = answer.body else {
            panic!("expected raw body");
        };
        assert!(raw_output.contains("\n\n---\n\n"));
        assert!(requests.lock().expect("requests").is_empty());
    }

    #[tokio::test]
    async fn query_kind_without_hits_reports_no_matches() {
        let server = MockServer::start_async().await;
        mock_collection_present(&server).await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/collections/budget/points/query");
                then.status(200).json_body(json!({ "result": { "points": [] } }));
            })
            .await;

        let (service, _) = service_with(&server, Box::new(FixedEmbedder), "unused");
        let answer = service
            .ask("nothing", QuestionKind::Query)
            .await
            .expect("answer");
        assert_eq!(
            answer.body,
            AnswerBody::Raw {
                raw_output: "Unable to find any matches!".into()
            }
        );
    }

    #[tokio::test]
    async fn dimension_mismatch_is_reported() {
        let server = MockServer::start_async().await;
        mock_collection_present(&server).await;

        let (service, _) = service_with(&server, Box::new(ShortEmbedder), "");
        let error = service.search("energy").await.expect_err("mismatch");
        assert!(matches!(
            error,
            RagError::DimensionMismatch {
                expected: 4,
                actual: 2
            }
        ));
    }

    #[tokio::test]
    async fn blank_query_is_rejected() {
        let server = MockServer::start_async().await;
        let (service, _) = service_with(&server, Box::new(FixedEmbedder), "");
        assert!(matches!(
            service.search("  ").await,
            Err(RagError::EmptyQuery)
        ));
    }

    #[tokio::test]
    async fn database_status_scans_payloads() {
        let server = MockServer::start_async().await;
        mock_collection_present(&server).await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/collections/budget/points/scroll");
                then.status(200).json_body(json!({
                    "result": {
                        "points": [
                            { "id": "a", "payload": { "source": "brief.pdf", "page": 0, "indexed_at": "2025-03-01T10:00:00Z" } },
                            { "id": "b", "payload": { "source": "brief.pdf", "page": 1, "indexed_at": "2025-03-01T10:00:00Z" } }
                        ],
                        "next_page_offset": null
                    }
                }));
            })
            .await;

        let (service, _) = service_with(&server, Box::new(FixedEmbedder), "");
        let status = service.database_status().await.expect("status");
        assert!(status.database_exists);
        assert!(status.database_path.ends_with("/collections/budget"));
        let stats = status.stats.expect("stats");
        assert_eq!(stats.chunks, 2);
        assert_eq!(stats.pages, 2);
        assert_eq!(stats.last_indexed.as_deref(), Some("2025-03-01T10:00:00Z"));
    }

    #[tokio::test]
    async fn refresh_readiness_tracks_collection_presence() {
        let server = MockServer::start_async().await;
        mock_collection_present(&server).await;
        let (service, _) = service_with(&server, Box::new(FixedEmbedder), "");
        assert!(!service.is_ready());
        assert!(service.refresh_readiness().await.expect("readiness check"));
        assert!(service.is_ready());
    }
}
