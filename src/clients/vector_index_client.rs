//! `VectorIndex` (§4.3): k-nearest centroid lookup and idempotent
//! registration against the external vector-index service, grounded on the
//! teacher's `common::api_client::ApiClient` request/response shape.
//!
//! This crate's index convention (§4.3, §9 design note) is **cosine
//! similarity in `[-1, 1]`, higher is better** — the same polarity the
//! Clusterer's threshold comparison assumes. An index backed by Euclidean
//! distance would need its own client that maps distances onto this
//! convention before `Clusterer::decide` ever sees them.

use crate::error::VectorIndexError;
use crate::vector::Vector;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One row of `VectorIndex.closest`: a candidate cluster ordered by
/// similarity, best match first.
#[derive(Debug, Clone, Deserialize)]
pub struct ClusterCandidate {
    pub cluster_id: i64,
    pub news_count: i64,
    pub distance: f64,
    /// Mirrors the wire response for completeness. `Clusterer::decide`
    /// doesn't trust this when assigning — it re-reads `is_rt` from the
    /// locked `clusters` row in the same transaction that absorbs the
    /// member, since this candidate snapshot can be stale by the time the
    /// assignment commits.
    #[serde(default)]
    pub is_rt: bool,
}

#[derive(Debug, Serialize)]
struct GetRequest {
    embedding: Vec<f64>,
    limit: usize,
}

#[derive(Debug, Deserialize)]
struct GetResponse {
    items: Vec<ClusterCandidate>,
}

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    id: i64,
    #[serde(rename = "publishDate")]
    publish_date: String,
    embedding: Vec<f64>,
    title: &'a str,
    text: &'a str,
    description: &'a str,
}

pub struct VectorIndexClient {
    http: Client,
    base_url: String,
}

impl VectorIndexClient {
    #[must_use]
    pub fn new(base_url: String, timeout: Duration) -> Self {
        Self {
            http: Client::builder()
                .connect_timeout(Duration::from_secs(5))
                .timeout(timeout)
                .build()
                .expect("failed to build vector index HTTP client"),
            base_url,
        }
    }

    /// `closest(v, k) -> [(clusterID, memberCount, distance)]`, ordered by
    /// distance ascending (best match first under this crate's polarity).
    ///
    /// # Errors
    /// Rejects a zero-dimension sentinel vector before issuing any request —
    /// the index must never be asked to compare against it (§9 design note).
    pub async fn closest(
        &self,
        v: &Vector,
        k: usize,
    ) -> Result<Vec<ClusterCandidate>, VectorIndexError> {
        if v.is_sentinel() {
            return Err(VectorIndexError::SentinelVector);
        }

        let url = format!("{}/get", self.base_url);
        let request = GetRequest {
            embedding: v.as_slice().to_vec(),
            limit: k,
        };
        let response = self.http.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(VectorIndexError::UnexpectedStatus { status, body });
        }

        let parsed: GetResponse = response.json().await?;
        Ok(parsed.items)
    }

    /// Idempotent insertion keyed by cluster ID. Must succeed before the
    /// Clusterer considers the cluster queryable for future items.
    ///
    /// # Errors
    /// Rejects a zero-dimension sentinel vector before issuing any request.
    pub async fn register(
        &self,
        cluster_id: i64,
        publish_date: DateTime<Utc>,
        v: &Vector,
        title: &str,
        full_text: &str,
        description: &str,
    ) -> Result<(), VectorIndexError> {
        if v.is_sentinel() {
            return Err(VectorIndexError::SentinelVector);
        }

        let url = format!("{}/register", self.base_url);
        let request = RegisterRequest {
            id: cluster_id,
            publish_date: publish_date.to_rfc3339(),
            embedding: v.as_slice().to_vec(),
            title,
            text: full_text,
            description,
        };
        let response = self.http.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(VectorIndexError::UnexpectedStatus { status, body });
        }
        Ok(())
    }
}
