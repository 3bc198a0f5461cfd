//! End-to-end tests exercising the HTTP surface, content fetch, the Ollama provider
//! clients, and the full pipeline against a mock backend.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode};
use docweave::api::create_router;
use docweave::fetch::HttpContentFetcher;
use docweave::jobs::JobStore;
use docweave::pipeline::{ClusterParams, PipelineOptions, PipelineService, SUMMARY_NOT_PERFORMED};
use docweave::providers::{OllamaEmbeddingClient, OllamaGenerationClient};
use httpmock::{Method as MockMethod, MockServer};
use serde_json::json;
use tower::ServiceExt;

/// Pipeline defaults tuned so each paragraph of the fixtures becomes one chunk and the
/// two four-paragraph topics are large enough to cluster.
fn test_options() -> PipelineOptions {
    PipelineOptions {
        chunk_size: 20,
        chunk_overlap: 0,
        summarize_max_rpm: 0,
        repair_max_rpm: 0,
        cluster: ClusterParams {
            min_cluster_size: 3,
            min_samples: 1,
            cluster_selection_epsilon: 0.2,
        },
        ..PipelineOptions::default()
    }
}

/// Wire real Ollama clients at the mock server into a service and router.
fn build_app(server: &MockServer, defaults: PipelineOptions) -> Router {
    let base_url = server.base_url();
    let service = PipelineService::new(
        Arc::new(HttpContentFetcher::new()),
        Arc::new(OllamaGenerationClient::new(&base_url, "repair-model")),
        Arc::new(OllamaGenerationClient::new(&base_url, "summarize-model")),
        Arc::new(OllamaEmbeddingClient::new(&base_url, "embed-model")),
        defaults,
    );
    create_router(Arc::new(service), Arc::new(JobStore::new()))
}

/// Embeddings that put "alpha" and "beta" chunks on orthogonal axes.
async fn mock_two_topic_embeddings(server: &MockServer) {
    server
        .mock_async(|when, then| {
            when.method(MockMethod::POST)
                .path("/api/embeddings")
                .body_contains("alpha");
            then.status(200).json_body(json!({ "embedding": [1.0, 0.0] }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(MockMethod::POST)
                .path("/api/embeddings")
                .body_contains("beta");
            then.status(200).json_body(json!({ "embedding": [0.0, 1.0] }));
        })
        .await;
}

/// Canned generation responses keyed off the distinct prompt prefixes of each stage.
async fn mock_summarization(server: &MockServer) {
    server
        .mock_async(|when, then| {
            when.method(MockMethod::POST)
                .path("/api/generate")
                .body_contains("TEXT CHUNKS");
            then.status(200)
                .json_body(json!({ "response": "a topic summary", "done": true }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(MockMethod::POST)
                .path("/api/generate")
                .body_contains("TOPIC SUMMARIES");
            then.status(200)
                .json_body(json!({ "response": "the overall summary", "done": true }));
        })
        .await;
}

/// Submit a payload to `POST /ingest` and return the accepted job id.
async fn submit(app: &Router, payload: serde_json::Value) -> String {
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
    accepted["job_id"].as_str().expect("job id").to_string()
}

/// Poll `GET /jobs/:id` until the job settles, returning the final job document.
async fn await_job(app: &Router, job_id: &str) -> serde_json::Value {
    for _ in 0..250 {
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
        match job["status"].as_str() {
            Some("completed") | Some("failed") => return job,
            _ => tokio::time::sleep(Duration::from_millis(20)).await,
        }
    }
    panic!("job {job_id} did not settle in time");
}

fn two_topic_paragraphs() -> String {
    let mut text = String::new();
    for i in 0..4 {
        text.push_str(&format!("alpha topic {i}.\n\n"));
    }
    for i in 0..4 {
        text.push_str(&format!("beta theme {i}.\n\n"));
    }
    text
}

#[tokio::test]
async fn url_ingestion_produces_two_topics() {
    let server = MockServer::start_async().await;
    mock_two_topic_embeddings(&server).await;
    mock_summarization(&server).await;

    let paragraphs: String = two_topic_paragraphs()
        .trim_end()
        .split("\n\n")
        .map(|p| format!("<p>{p}</p>"))
        .collect();
    server
        .mock_async(move |when, then| {
            when.method(MockMethod::GET).path("/article");
            then.status(200).body(format!(
                "<html><head><title>Two Topics</title></head>\
                 <body><main>{paragraphs}</main></body></html>"
            ));
        })
        .await;

    let app = build_app(&server, test_options());
    let job_id = submit(
        &app,
        json!({ "url": format!("{}/article", server.base_url()) }),
    )
    .await;
    let job = await_job(&app, &job_id).await;

    assert_eq!(job["status"], "completed", "job: {job}");
    let result = &job["result"];
    assert_eq!(result["overall_summary"], "the overall summary");

    let topics = result["topics"].as_array().expect("topics array");
    assert_eq!(topics.len(), 2);
    assert_eq!(topics[0]["topic_id"], 0);
    assert_eq!(topics[1]["topic_id"], 1);
    for topic in topics {
        assert_eq!(topic["topic_summary"], "a topic summary");
        let chunks = topic["chunks"].as_array().expect("chunks array");
        assert_eq!(chunks.len(), 4);
        for chunk in chunks {
            assert!(chunk.get("embedding").is_none(), "embedding not serialized");
            assert_eq!(chunk["cluster_id"], topic["topic_id"]);
        }
    }
    assert_eq!(result["noise_points"].as_array().expect("noise").len(), 0);
}

#[tokio::test]
async fn inline_text_with_summary_disabled_takes_degenerate_shape() {
    let server = MockServer::start_async().await;
    mock_two_topic_embeddings(&server).await;
    let generate = server
        .mock_async(|when, then| {
            when.method(MockMethod::POST).path("/api/generate");
            then.status(200)
                .json_body(json!({ "response": "unused", "done": true }));
        })
        .await;

    let app = build_app(&server, test_options());
    let job_id = submit(
        &app,
        json!({
            "text": two_topic_paragraphs(),
            "use_clustering_summary": false
        }),
    )
    .await;
    let job = await_job(&app, &job_id).await;

    assert_eq!(job["status"], "completed", "job: {job}");
    let result = &job["result"];
    assert_eq!(result["overall_summary"], SUMMARY_NOT_PERFORMED);
    assert_eq!(result["topics"].as_array().expect("topics").len(), 0);
    let noise = result["noise_points"].as_array().expect("noise");
    assert_eq!(noise.len(), 8);

    generate.assert_hits_async(0).await;
}

#[tokio::test]
async fn repair_stage_rewrites_chunks_through_the_provider() {
    let server = MockServer::start_async().await;
    // The repair system prompt names the <repaired_text> tag; summarization prompts do not.
    server
        .mock_async(|when, then| {
            when.method(MockMethod::POST)
                .path("/api/generate")
                .body_contains("<repaired_text>");
            then.status(200).json_body(json!({
                "response": "<repaired_text>alpha, cleaned.</repaired_text>",
                "done": true
            }));
        })
        .await;
    mock_two_topic_embeddings(&server).await;
    mock_summarization(&server).await;

    let app = build_app(&server, test_options());
    let job_id = submit(
        &app,
        json!({
            "text": "alpha raw one.\n\nalpha raw two.\n\nalpha raw three.",
            "use_repair": true
        }),
    )
    .await;
    let job = await_job(&app, &job_id).await;

    assert_eq!(job["status"], "completed", "job: {job}");
    let result = &job["result"];
    assert_eq!(result["overall_summary"], "the overall summary");

    // All three chunks were rewritten identically, embed together, and form one topic.
    let topics = result["topics"].as_array().expect("topics array");
    assert_eq!(topics.len(), 1);
    let chunks = topics[0]["chunks"].as_array().expect("chunks array");
    assert_eq!(chunks.len(), 3);
    for chunk in chunks {
        assert_eq!(chunk["text"], "alpha, cleaned.");
    }
}

#[tokio::test]
async fn failed_fetch_settles_the_job_as_failed() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(MockMethod::GET).path("/gone");
            then.status(404);
        })
        .await;

    let app = build_app(&server, test_options());
    let job_id = submit(
        &app,
        json!({ "url": format!("{}/gone", server.base_url()) }),
    )
    .await;
    let job = await_job(&app, &job_id).await;

    assert_eq!(job["status"], "failed");
    let error = job["error"].as_str().expect("error message");
    assert!(error.contains("404"), "error: {error}");
}
