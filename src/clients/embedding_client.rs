//! `EmbeddingClient` (§4.2): rate-limited `text -> Vector` over a remote
//! embedding service, grounded on the teacher's `common::api_client::ApiClient`
//! (reqwest client with connect/request timeouts, a `thiserror` error enum)
//! plus a counting-semaphore rate limiter in the style of the
//! `tokio::sync::Semaphore` usage seen across the retrieved pack's vector
//! search engines.

use crate::error::EmbeddingError;
use crate::vector::Vector;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::warn;

const MAX_INPUT_BYTES: usize = 4000;

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    #[serde(rename = "modelUri")]
    model_uri: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Vec<f64>,
    #[allow(dead_code)]
    #[serde(default, rename = "numTokens")]
    num_tokens: Option<String>,
    #[allow(dead_code)]
    #[serde(default, rename = "modelVersion")]
    model_version: Option<String>,
}

pub struct EmbeddingClient {
    http: Client,
    url: String,
    model_uri: String,
    token: String,
    folder_id: String,
    /// Counting semaphore of capacity `MAX_REQUESTS` (§4.2). Acquired before
    /// the remote call and released once the response is consumed, success
    /// or failure — the component's only suspension point besides the HTTP
    /// call itself.
    permits: Arc<Semaphore>,
}

impl EmbeddingClient {
    #[must_use]
    pub fn new(
        url: String,
        model_uri: String,
        token: String,
        folder_id: String,
        max_requests: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            http: Client::builder()
                .connect_timeout(Duration::from_secs(5))
                .timeout(timeout)
                .build()
                .expect("failed to build embedding HTTP client"),
            url,
            model_uri,
            token,
            folder_id,
            permits: Arc::new(Semaphore::new(max_requests.max(1))),
        }
    }

    /// Applies the §4.2 input-shaping rules, in order, first rule that holds
    /// wins.
    #[must_use]
    pub fn shape_input(title: &str, description: &str, full_text: &str) -> String {
        let full_text = if full_text == description { "" } else { full_text };
        let joined = format!("{title}\n\n{description}\n\n{full_text}");
        let candidate = joined.trim().to_string();
        if candidate.len() <= MAX_INPUT_BYTES {
            return candidate;
        }

        let title_description = format!("{title}{description}");
        if title_description.len() <= MAX_INPUT_BYTES {
            return title_description;
        }

        title.to_string()
    }

    async fn send(&self, text: &str) -> Result<EmbedResponse, EmbeddingError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .expect("embedding semaphore never closes");

        let request = EmbedRequest {
            model_uri: &self.model_uri,
            text,
        };

        let response = self
            .http
            .post(&self.url)
            .header("Authorization", format!("Api-Key {}", self.token))
            .header("X-Folder-Id", &self.folder_id)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::UnexpectedStatus { status, body });
        }

        let body = response.json::<EmbedResponse>().await?;
        Ok(body)
    }

    /// `embed(title, description, fullText) -> Vector`. On any transport,
    /// decode, or non-2xx failure, returns the error and produces no vector;
    /// callers MUST drop the item rather than cluster it on a
    /// [`Vector::sentinel`].
    pub async fn embed(
        &self,
        title: &str,
        description: &str,
        full_text: &str,
    ) -> Result<Vector, EmbeddingError> {
        let text = Self::shape_input(title, description, full_text);
        match self.send(&text).await {
            Ok(resp) => Ok(Vector::new(resp.embedding)),
            Err(e) => {
                warn!("embedding request failed, returning sentinel vector: {e}");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_input_drops_full_text_equal_to_description() {
        let shaped = EmbeddingClient::shape_input("T", "D", "D");
        assert_eq!(shaped, "T\n\nD");
    }

    #[test]
    fn shape_input_trims_and_joins() {
        let shaped = EmbeddingClient::shape_input("  T  ", "D", "F");
        assert_eq!(shaped, "T  \n\nD\n\nF".trim());
    }

    #[test]
    fn shape_input_falls_back_to_title_description_over_4000_bytes() {
        let full_text = "x".repeat(5000);
        let shaped = EmbeddingClient::shape_input("T", "D", &full_text);
        assert_eq!(shaped, "TD");
    }

    #[test]
    fn shape_input_falls_back_to_title_only_when_still_too_long() {
        let title = "t".repeat(5000);
        let description = "d".repeat(5000);
        let shaped = EmbeddingClient::shape_input(&title, &description, "f");
        assert_eq!(shaped, title);
    }

    #[test]
    fn shape_input_bound_never_exceeds_4000_unless_title_alone() {
        for (title, description, full_text) in [
            ("T", "D", "F"),
            ("T", "D", &"x".repeat(10_000)),
            (&"t".repeat(10_000), &"d".repeat(10_000), "f"),
        ] {
            let shaped = EmbeddingClient::shape_input(title, description, full_text);
            assert!(shaped.len() <= MAX_INPUT_BYTES || shaped == title);
        }
    }
}
