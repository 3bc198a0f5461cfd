use docweave::pipeline::{ClusterParams, PipelineOptions, PipelineService};
use docweave::providers::{OllamaEmbeddingClient, OllamaGenerationClient, ProviderRegistry};
use docweave::{api, config, fetch, jobs, logging};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() {
    config::init_config();
    logging::init_tracing();

    let config = config::get_config();
    let mut registry = ProviderRegistry::new();
    registry.register_generator(
        "repair",
        Arc::new(OllamaGenerationClient::new(
            &config.ollama_url,
            &config.repair_model,
        )),
    );
    registry.register_generator(
        "summarize",
        Arc::new(OllamaGenerationClient::new(
            &config.ollama_url,
            &config.summarize_model,
        )),
    );
    registry.set_default_generator(Arc::new(OllamaGenerationClient::new(
        &config.ollama_url,
        &config.summarize_model,
    )));
    registry.set_default_embedder(Arc::new(OllamaEmbeddingClient::new(
        &config.ollama_url,
        &config.embedding_model,
    )));

    let defaults = PipelineOptions {
        chunk_size: config.chunk_size,
        chunk_overlap: config.chunk_overlap,
        summarization_chunk_threshold: config.summarization_chunk_threshold,
        summarize_max_rpm: config.summarize_max_rpm,
        repair_max_rpm: config.repair_max_rpm,
        cluster: ClusterParams {
            min_cluster_size: config.min_cluster_size,
            min_samples: config.min_samples,
            cluster_selection_epsilon: config.cluster_selection_epsilon,
        },
        ..PipelineOptions::default()
    };

    let service = PipelineService::new(
        Arc::new(fetch::HttpContentFetcher::new()),
        registry.resolve_generator(Some("repair")),
        registry.resolve_generator(Some("summarize")),
        registry.resolve_embedder(None),
        defaults,
    );
    let app = api::create_router(Arc::new(service), Arc::new(jobs::JobStore::new()));

    let (listener, port) = bind_listener().await.expect("Failed to bind listener");
    tracing::info!("Listening on http://0.0.0.0:{}", port);
    axum::serve(listener, app).await.unwrap();
}

/// Bind the configured port, or scan a fixed range when none is configured.
async fn bind_listener() -> Result<(TcpListener, u16), std::io::Error> {
    use std::net::Ipv4Addr;

    if let Some(port) = config::get_config().server_port {
        let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await?;
        return Ok((listener, port));
    }

    for port in 4200..=4299_u16 {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => return Ok((listener, port)),
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port in use; trying next");
            }
            Err(err) => return Err(err),
        }
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::AddrNotAvailable,
        "No free port in range 4200-4299",
    ))
}
