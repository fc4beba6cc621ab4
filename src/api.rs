//! HTTP surface for the budget question-answering service.
//!
//! Endpoints:
//!
//! - `GET /` – Service name, version, and endpoint catalog.
//! - `GET /health` – Liveness plus whether a vector database is ready for questions.
//! - `GET /database/status` – Collection presence and statistics.
//! - `POST /database/build` – Rebuild the vector database from the configured PDF.
//! - `POST /ask` – Answer one question (`standard`, `numerical`, or `query`).
//! - `POST /ask/batch` – Answer several questions as `standard`, each with its own outcome.
//! - `POST /search` – Retrieval only; returns the scored chunks.
//! - `GET /metrics` – Build and query counters.

use crate::processing::{Answer, DatabaseStatus, QuestionKind, RagApi, RagError, RetrievedChunk};
use crate::qdrant::current_timestamp_rfc3339;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;

const SERVICE_NAME: &str = "Budget RAG API Server";
const NOT_READY_MESSAGE: &str = "RAG system not ready. Build database first.";

/// Build the HTTP router exposing the question-answering API.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: RagApi + 'static,
{
    Router::new()
        .route("/", get(root))
        .route("/health", get(health::<S>))
        .route("/database/status", get(database_status::<S>))
        .route("/database/build", post(build_database::<S>))
        .route("/ask", post(ask_question::<S>))
        .route("/ask/batch", post(ask_batch::<S>))
        .route("/search", post(search_documents::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .with_state(service)
}

/// Descriptor for a single endpoint in the discovery catalog.
#[derive(Serialize)]
struct EndpointDescriptor {
    method: &'static str,
    path: &'static str,
    description: &'static str,
}

/// Response body for `GET /`.
#[derive(Serialize)]
struct RootResponse {
    message: &'static str,
    version: &'static str,
    endpoints: Vec<EndpointDescriptor>,
}

async fn root() -> Json<RootResponse> {
    let endpoint = |method, path, description| EndpointDescriptor {
        method,
        path,
        description,
    };
    Json(RootResponse {
        message: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        endpoints: vec![
            endpoint("GET", "/health", "Check health"),
            endpoint("GET", "/database/status", "Check database status"),
            endpoint("POST", "/database/build", "Build vector database"),
            endpoint("POST", "/ask", "Ask questions with sources"),
            endpoint("POST", "/ask/batch", "Ask multiple questions"),
            endpoint("POST", "/search", "Search similar documents"),
            endpoint("GET", "/metrics", "Build and query counters"),
        ],
    })
}

/// Response body for `GET /health`.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
    service: &'static str,
    rag_system_ready: bool,
}

async fn health<S>(State(service): State<Arc<S>>) -> Json<HealthResponse>
where
    S: RagApi,
{
    Json(HealthResponse {
        status: "OK",
        timestamp: current_timestamp_rfc3339(),
        service: SERVICE_NAME,
        rag_system_ready: service.is_ready(),
    })
}

async fn database_status<S>(
    State(service): State<Arc<S>>,
) -> Result<Json<DatabaseStatus>, AppError>
where
    S: RagApi,
{
    let status = service
        .database_status()
        .await
        .map_err(|error| AppError::internal(format!("Failed to check database status: {error}")))?;
    Ok(Json(status))
}

/// Response body for `POST /database/build`.
#[derive(Serialize)]
struct BuildResponse {
    success: bool,
    message: &'static str,
    chunks: usize,
    pages: usize,
    skipped_duplicates: usize,
    timestamp: String,
}

/// Rebuild the vector database. A build already in progress is reported as a conflict.
async fn build_database<S>(State(service): State<Arc<S>>) -> Result<Json<BuildResponse>, AppError>
where
    S: RagApi,
{
    tracing::info!("Building database...");
    let outcome = service.build_database().await.map_err(|error| match error {
        RagError::BuildInProgress => {
            AppError::new(StatusCode::CONFLICT, RagError::BuildInProgress.to_string())
        }
        other => AppError::internal(format!("Failed to build database: {other}")),
    })?;
    Ok(Json(BuildResponse {
        success: true,
        message: "Database built successfully",
        chunks: outcome.chunks,
        pages: outcome.pages,
        skipped_duplicates: outcome.skipped_duplicates,
        timestamp: current_timestamp_rfc3339(),
    }))
}

/// Request body for `POST /ask`.
#[derive(Deserialize)]
struct QuestionRequest {
    question: String,
    /// `standard` (default), `numerical`, or `query`.
    #[serde(default = "default_question_type", rename = "type")]
    question_type: String,
}

fn default_question_type() -> String {
    QuestionKind::Standard.as_str().to_string()
}

/// Response body for `POST /ask`; also used per item in batch responses.
#[derive(Serialize)]
struct QuestionResponse {
    success: bool,
    question: String,
    #[serde(rename = "type")]
    question_type: String,
    result: Value,
    timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl QuestionResponse {
    fn from_outcome(
        question: String,
        question_type: String,
        outcome: Result<Answer, RagError>,
    ) -> Self {
        let (success, result, error) = match outcome {
            Ok(answer) => (
                true,
                serde_json::to_value(answer).unwrap_or_else(|_| json!({})),
                None,
            ),
            Err(error) => (false, json!({}), Some(error.to_string())),
        };
        Self {
            success,
            question,
            question_type,
            result,
            timestamp: current_timestamp_rfc3339(),
            error,
        }
    }
}

/// Answer a single question. Pipeline failures are reported in the body with `success: false`.
async fn ask_question<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<QuestionRequest>,
) -> Result<Json<QuestionResponse>, AppError>
where
    S: RagApi,
{
    ensure_ready(service.as_ref())?;
    if request.question.trim().is_empty() {
        return Err(AppError::bad_request("Question cannot be empty"));
    }

    let kind = QuestionKind::from_label(&request.question_type);
    let outcome = service.ask(&request.question, kind).await;
    Ok(Json(QuestionResponse::from_outcome(
        request.question,
        request.question_type,
        outcome,
    )))
}

/// Request body for `POST /ask/batch`.
#[derive(Deserialize)]
struct BatchQuestionRequest {
    #[serde(default)]
    questions: Vec<String>,
}

/// Response body for `POST /ask/batch`.
#[derive(Serialize)]
struct BatchResponse {
    success: bool,
    total_questions: usize,
    results: Vec<QuestionResponse>,
    timestamp: String,
}

/// Answer up to the service's batch limit of questions sequentially.
async fn ask_batch<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<BatchQuestionRequest>,
) -> Result<Json<BatchResponse>, AppError>
where
    S: RagApi,
{
    ensure_ready(service.as_ref())?;
    let max_questions = service.batch_max_questions();
    if request.questions.is_empty() {
        return Err(AppError::bad_request("Questions array cannot be empty."));
    }
    if request.questions.len() > max_questions {
        return Err(AppError::bad_request(format!(
            "Max {max_questions} questions allowed per batch"
        )));
    }

    let total_questions = request.questions.len();
    let mut results = Vec::with_capacity(total_questions);
    for (index, question) in request.questions.into_iter().enumerate() {
        tracing::info!(
            "Processing batch question {}/{}: {}",
            index + 1,
            total_questions,
            question
        );
        let outcome = if question.trim().is_empty() {
            Err(RagError::EmptyQuery)
        } else {
            service.ask(&question, QuestionKind::Standard).await
        };
        results.push(QuestionResponse::from_outcome(
            question,
            QuestionKind::Standard.as_str().to_string(),
            outcome,
        ));
    }

    Ok(Json(BatchResponse {
        success: results.iter().all(|item| item.success),
        total_questions,
        results,
        timestamp: current_timestamp_rfc3339(),
    }))
}

/// Request body for `POST /search`.
#[derive(Deserialize)]
struct SearchRequest {
    query: String,
}

/// Response body for `POST /search`.
#[derive(Serialize)]
struct SearchResponse {
    success: bool,
    query: String,
    results: Vec<RetrievedChunk>,
    timestamp: String,
}

async fn search_documents<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError>
where
    S: RagApi,
{
    ensure_ready(service.as_ref())?;
    if request.query.trim().is_empty() {
        return Err(AppError::bad_request("Query cannot be empty."));
    }

    let results = service
        .search(&request.query)
        .await
        .map_err(|error| AppError::internal(format!("Search failed: {error}")))?;
    Ok(Json(SearchResponse {
        success: true,
        query: request.query,
        results,
        timestamp: current_timestamp_rfc3339(),
    }))
}

/// Return the current counter snapshot.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<crate::metrics::MetricsSnapshot>
where
    S: RagApi,
{
    Json(service.metrics_snapshot())
}

fn ensure_ready<S>(service: &S) -> Result<(), AppError>
where
    S: RagApi + ?Sized,
{
    if service.is_ready() {
        Ok(())
    } else {
        Err(AppError::new(StatusCode::SERVICE_UNAVAILABLE, NOT_READY_MESSAGE))
    }
}

struct AppError {
    status: StatusCode,
    detail: String,
}

impl AppError {
    fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }

    fn internal(detail: impl Into<String>) -> Self {
        let error = Self::new(StatusCode::INTERNAL_SERVER_ERROR, detail);
        tracing::error!(detail = %error.detail, "Request failed");
        error
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}
