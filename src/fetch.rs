//! URL fetching and main-content extraction.
//!
//! The fetcher retrieves a page over plain HTTP and extracts its main text: paragraphs
//! inside `<article>` or `<main>` containers when present, falling back to the whole body's
//! text when the primary extraction yields nothing. HTML parsing happens synchronously
//! between awaits since the parsed document is not `Send`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use thiserror::Error;

/// Extracted page content handed to the pipeline.
#[derive(Debug, Clone)]
pub struct ExtractedContent {
    /// The fetched URL.
    pub url: String,
    /// Page title, possibly empty.
    pub title: String,
    /// Extracted main text.
    pub text: String,
}

/// Errors raised while fetching or extracting content.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The HTTP request itself failed.
    #[error("failed to fetch {url}: {source}")]
    Request {
        /// The requested URL.
        url: String,
        /// Underlying transport error.
        #[source]
        source: reqwest::Error,
    },
    /// The server answered with a non-success status.
    #[error("{url} returned status {status}")]
    Status {
        /// The requested URL.
        url: String,
        /// Response status code.
        status: reqwest::StatusCode,
    },
    /// The page yielded no extractable text.
    #[error("no content could be extracted from {0}")]
    NoContent(String),
}

/// Collaborator turning a URL into extracted content.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Fetch a URL and extract its title and main text.
    async fn fetch(&self, url: &str) -> Result<ExtractedContent, FetchError>;
}

/// Plain-HTTP implementation of [`ContentFetcher`].
pub struct HttpContentFetcher {
    http: Client,
}

impl HttpContentFetcher {
    /// Build a fetcher with a dedicated HTTP client.
    pub fn new() -> Self {
        let http = Client::builder()
            .user_agent("docweave/fetch")
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to construct reqwest::Client for fetching");
        Self { http }
    }
}

impl Default for HttpContentFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentFetcher for HttpContentFetcher {
    async fn fetch(&self, url: &str) -> Result<ExtractedContent, FetchError> {
        tracing::info!(url, "Fetching URL");
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        let html = response.text().await.map_err(|source| FetchError::Request {
            url: url.to_string(),
            source,
        })?;

        let (title, text) = extract_content(&html);
        if text.trim().is_empty() {
            return Err(FetchError::NoContent(url.to_string()));
        }

        tracing::debug!(url, title = %title, length = text.len(), "Content extracted");
        Ok(ExtractedContent {
            url: url.to_string(),
            title,
            text,
        })
    }
}

/// Extract `(title, main_text)` from an HTML document.
fn extract_content(html: &str) -> (String, String) {
    let document = Html::parse_document(html);

    let title = Selector::parse("title")
        .ok()
        .and_then(|selector| document.select(&selector).next())
        .map(|element| element.text().collect::<String>().trim().to_string())
        .unwrap_or_default();

    let mut text = extract_main_text(&document);
    if text.trim().is_empty() {
        tracing::warn!("Primary extraction found no article content; falling back to body text");
        text = extract_body_text(&document);
    }

    (title, text)
}

/// Paragraph text from the first `<article>` or `<main>` container that has any.
fn extract_main_text(document: &Html) -> String {
    let Ok(paragraph) = Selector::parse("p") else {
        return String::new();
    };
    for container in ["article", "main"] {
        let Ok(selector) = Selector::parse(container) else {
            continue;
        };
        if let Some(root) = document.select(&selector).next() {
            let paragraphs: Vec<String> = root
                .select(&paragraph)
                .map(|p| p.text().collect::<String>().trim().to_string())
                .filter(|text| !text.is_empty())
                .collect();
            if !paragraphs.is_empty() {
                return paragraphs.join("\n\n");
            }
        }
    }
    String::new()
}

/// All text nodes under `<body>`, one line per node.
fn extract_body_text(document: &Html) -> String {
    let Ok(selector) = Selector::parse("body") else {
        return String::new();
    };
    document
        .select(&selector)
        .next()
        .map(|body| {
            body.text()
                .map(str::trim)
                .filter(|piece| !piece.is_empty())
                .collect::<Vec<&str>>()
                .join("\n")
        })
        .unwrap_or_default()
}
