//! HTTP surface for Docweave.
//!
//! This module exposes a compact Axum router with a handful of endpoints:
//!
//! - `POST /ingest` – Submit a URL or inline text for processing. The pipeline runs in a
//!   background task; the response carries a `job_id` to poll.
//! - `GET /jobs/:id` – Poll a submitted job. The body carries the job status and, once
//!   completed, the full pipeline result (topics, noise points, overall summary).
//! - `GET /metrics` – Observe run counters.
//! - `GET /commands` – Machine-readable command catalog for quick discovery by tools/hosts.
//!
//! Requests return `202 Accepted` immediately because a full pipeline run makes many LLM
//! calls and can take minutes under rate limiting.

use crate::jobs::{JobState, JobStore};
use crate::pipeline::{PipelineApi, RunOverrides};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Shared handler state: the pipeline service plus the job registry.
pub struct AppState<S> {
    service: Arc<S>,
    jobs: Arc<JobStore>,
}

// Derived Clone would require `S: Clone`; the Arcs clone regardless.
impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            jobs: Arc::clone(&self.jobs),
        }
    }
}

/// Build the HTTP router exposing the ingestion API surface.
pub fn create_router<S>(service: Arc<S>, jobs: Arc<JobStore>) -> Router
where
    S: PipelineApi + 'static,
{
    let state = AppState { service, jobs };
    Router::new()
        .route("/ingest", post(ingest::<S>))
        .route("/jobs/:id", get(get_job::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .route("/commands", get(get_commands))
        .with_state(state)
}

/// Request body for the `POST /ingest` endpoint.
///
/// Exactly one of `url` or `text` must be provided; `url` wins when both are present.
#[derive(Deserialize)]
struct IngestRequest {
    /// URL to fetch and process.
    #[serde(default)]
    url: Option<String>,
    /// Inline document text to process.
    #[serde(default)]
    text: Option<String>,
    /// Per-request pipeline option overrides, flattened into the request body.
    #[serde(flatten)]
    options: RunOverrides,
}

/// Success response for the `POST /ingest` endpoint.
#[derive(Serialize)]
struct IngestResponse {
    /// Identifier to poll via `GET /jobs/:id`.
    job_id: Uuid,
}

/// Accept a document for processing and start a background pipeline run.
async fn ingest<S>(
    State(state): State<AppState<S>>,
    Json(request): Json<IngestRequest>,
) -> Result<(StatusCode, Json<IngestResponse>), AppError>
where
    S: PipelineApi + 'static,
{
    let IngestRequest { url, text, options } = request;
    if url.is_none() && text.is_none() {
        return Err(AppError::BadRequest(
            "Request must include either \"url\" or \"text\"".to_string(),
        ));
    }

    let job_id = state.jobs.create().await;
    tracing::info!(job_id = %job_id, has_url = url.is_some(), "Ingest request accepted");

    let service = Arc::clone(&state.service);
    let jobs = Arc::clone(&state.jobs);
    tokio::spawn(async move {
        jobs.update(job_id, JobState::Running).await;
        let outcome = match url {
            Some(url) => service.process_url(&url, options).await,
            None => {
                let text = text.unwrap_or_default();
                service.process_text(&text, options).await
            }
        };
        let settled = match outcome {
            Ok(result) => match serde_json::to_value(&result) {
                Ok(result) => JobState::Completed { result },
                Err(error) => {
                    tracing::error!(job_id = %job_id, %error, "Failed to serialize pipeline result");
                    JobState::Failed {
                        error: "Internal error: result serialization failed".to_string(),
                    }
                }
            },
            Err(error) => {
                tracing::warn!(job_id = %job_id, %error, "Pipeline run failed");
                JobState::Failed {
                    error: error.to_string(),
                }
            }
        };
        jobs.update(job_id, settled).await;
    });

    Ok((StatusCode::ACCEPTED, Json(IngestResponse { job_id })))
}

/// Poll a job's state.
async fn get_job<S>(
    State(state): State<AppState<S>>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobState>, AppError>
where
    S: PipelineApi,
{
    match state.jobs.get(id).await {
        Some(job) => Ok(Json(job)),
        None => Err(AppError::NotFound(format!("No job with id {id}"))),
    }
}

/// Return run counters useful for observability dashboards.
async fn get_metrics<S>(State(state): State<AppState<S>>) -> Json<crate::metrics::MetricsSnapshot>
where
    S: PipelineApi,
{
    Json(state.service.metrics_snapshot())
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<serde_json::Value>,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for discovery/UX in hosts and tools.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "ingest",
                method: "POST",
                path: "/ingest",
                description: "Submit a URL or inline text for processing. Returns 202 with { \"job_id\": uuid }; poll GET /jobs/:id for the result.",
                request_example: Some(json!({
                    "url": "https://example.org/article",
                    "use_repair": false,
                    "chunk_size": 300,
                    "chunk_overlap": 50
                })),
            },
            CommandDescriptor {
                name: "get_job",
                method: "GET",
                path: "/jobs/:id",
                description: "Poll a submitted job. Status is one of pending, running, completed, failed; completed jobs carry the pipeline result.",
                request_example: None,
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return run counters useful for observability dashboards.",
                request_example: None,
            },
        ],
    })
}

/// Errors mapped to HTTP error responses.
enum AppError {
    BadRequest(String),
    NotFound(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            Self::NotFound(message) => (StatusCode::NOT_FOUND, message).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{create_router, get_commands};
    use crate::jobs::JobStore;
    use crate::metrics::MetricsSnapshot;
    use crate::pipeline::types::{PipelineResult, ProcessedChunk, TopicSummary};
    use crate::pipeline::{PipelineApi, RunOverrides, ServiceError};
    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode},
    };
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    #[tokio::test]
    async fn commands_catalog_exposes_ingest_endpoint() {
        let response = get_commands().await;
        let commands = response.0.commands;
        let ingest = commands
            .iter()
            .find(|cmd| cmd.name == "ingest")
            .expect("ingest command present");

        assert_eq!(ingest.method, "POST");
        assert_eq!(ingest.path, "/ingest");
        assert!(commands.len() >= 3);
    }

    #[tokio::test]
    async fn ingest_runs_to_completion_and_is_pollable() {
        let service = Arc::new(StubPipelineService::new());
        let jobs = Arc::new(JobStore::new());
        let app = create_router(service.clone(), jobs.clone());

        let payload = json!({
            "text": "Document body",
            "use_repair": true,
            "chunk_size": 128
        });
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/ingest")
                    .header("content-type", "application/json")
                    .body(Body::from(payload.to_string()))
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let accepted: serde_json::Value = serde_json::from_slice(&body).expect("json body");
        let job_id = accepted["job_id"].as_str().expect("job id").to_string();

        // Poll until the spawned task settles the job.
        let mut completed = None;
        for _ in 0..50 {
            let response = app
                .clone()
                .oneshot(
                    Request::builder()
                        .uri(format!("/jobs/{job_id}"))
                        .body(Body::empty())
                        .expect("request"),
                )
                .await
                .expect("router response");
            assert_eq!(response.status(), StatusCode::OK);
            let body = to_bytes(response.into_body(), usize::MAX)
                .await
                .expect("body bytes");
            let job: serde_json::Value = serde_json::from_slice(&body).expect("json body");
            if job["status"] == "completed" {
                completed = Some(job);
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let job = completed.expect("job completed");
        assert_eq!(job["result"]["overall_summary"], "stub summary");
        assert_eq!(job["result"]["topics"][0]["topic_id"], 0);

        let calls = service.recorded_texts().await;
        assert_eq!(calls, vec!["Document body".to_string()]);
        let overrides = service.recorded_overrides().await;
        assert_eq!(overrides[0].use_repair, Some(true));
        assert_eq!(overrides[0].chunk_size, Some(128));
    }

    #[tokio::test]
    async fn ingest_without_url_or_text_is_rejected() {
        let service = Arc::new(StubPipelineService::new());
        let jobs = Arc::new(JobStore::new());
        let app = create_router(service, jobs);

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/ingest")
                    .header("content-type", "application/json")
                    .body(Body::from("{}"))
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_job_returns_not_found() {
        let service = Arc::new(StubPipelineService::new());
        let jobs = Arc::new(JobStore::new());
        let app = create_router(service, jobs);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/jobs/00000000-0000-0000-0000-000000000000")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    struct StubPipelineService {
        texts: Mutex<Vec<String>>,
        overrides: Mutex<Vec<RunOverrides>>,
    }

    impl StubPipelineService {
        fn new() -> Self {
            Self {
                texts: Mutex::new(Vec::new()),
                overrides: Mutex::new(Vec::new()),
            }
        }

        async fn recorded_texts(&self) -> Vec<String> {
            self.texts.lock().await.clone()
        }

        async fn recorded_overrides(&self) -> Vec<RunOverrides> {
            self.overrides.lock().await.clone()
        }

        fn stub_result() -> PipelineResult {
            PipelineResult {
                overall_summary: "stub summary".to_string(),
                topics: vec![TopicSummary {
                    topic_id: 0,
                    topic_summary: "a topic".to_string(),
                    chunks: vec![ProcessedChunk {
                        chunk_id: 0,
                        text: "chunk".to_string(),
                        embedding: None,
                        cluster_id: Some(0),
                    }],
                }],
                noise_points: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl PipelineApi for StubPipelineService {
        async fn process_url(
            &self,
            url: &str,
            overrides: RunOverrides,
        ) -> Result<PipelineResult, ServiceError> {
            self.texts.lock().await.push(url.to_string());
            self.overrides.lock().await.push(overrides);
            Ok(Self::stub_result())
        }

        async fn process_text(
            &self,
            text: &str,
            overrides: RunOverrides,
        ) -> Result<PipelineResult, ServiceError> {
            self.texts.lock().await.push(text.to_string());
            self.overrides.lock().await.push(overrides);
            Ok(Self::stub_result())
        }

        fn metrics_snapshot(&self) -> MetricsSnapshot {
            MetricsSnapshot {
                documents_processed: 0,
                chunks_processed: 0,
                topics_summarized: 0,
            }
        }
    }
}
