//! Blocking client for a running `crs serve` instance.

use std::time::Duration;

use reqwest::blocking::{Client, Response};
use serde::de::DeserializeOwned;

use crate::domain::{ApplicantRecord, RiskScore};
use crate::error::AppError;
use crate::server::{ApiError, BatchRequest, BatchResponse, HealthResponse, ModelResponse};

/// Applicants sent per `/score/batch` request unless the service accepts fewer.
pub const DEFAULT_CHUNK: usize = 500;

pub struct ScoringClient {
    client: Client,
    base_url: String,
}

impl ScoringClient {
    pub fn new(base_url: &str) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .user_agent(concat!("crs/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::new(5, format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{path}", self.base_url)
    }

    pub fn health(&self) -> Result<HealthResponse, AppError> {
        let resp = self
            .client
            .get(self.url("/health"))
            .send()
            .map_err(|e| AppError::new(5, format!("Scoring service request failed: {e}")))?;
        parse(resp)
    }

    pub fn model_summary(&self) -> Result<ModelResponse, AppError> {
        let resp = self
            .client
            .get(self.url("/model"))
            .send()
            .map_err(|e| AppError::new(5, format!("Scoring service request failed: {e}")))?;
        parse(resp)
    }

    /// Chunk size for `score_batch`: `requested` (or [`DEFAULT_CHUNK`]) capped
    /// by the service's batch limit.
    pub fn chunk_size(&self, requested: Option<usize>) -> Result<usize, AppError> {
        let health = self.health()?;
        Ok(resolve_chunk(requested, health.max_batch))
    }

    /// Score applicants in chunks; results keep the input order.
    pub fn score_batch(
        &self,
        applicants: &[ApplicantRecord],
        chunk: usize,
    ) -> Result<Vec<RiskScore>, AppError> {
        let mut out = Vec::with_capacity(applicants.len());
        for (i, part) in applicants.chunks(chunk.max(1)).enumerate() {
            let body = BatchRequest {
                applicants: part.to_vec(),
            };
            let resp = self
                .client
                .post(self.url("/score/batch"))
                .json(&body)
                .send()
                .map_err(|e| AppError::new(5, format!("Scoring service request failed: {e}")))?;
            let batch: BatchResponse = parse(resp).map_err(|e| e.context(format!("chunk {i}")))?;
            if batch.scores.len() != part.len() {
                return Err(AppError::new(
                    5,
                    format!(
                        "Scoring service returned {} scores for {} applicants.",
                        batch.scores.len(),
                        part.len()
                    ),
                ));
            }
            out.extend(batch.scores);
        }
        Ok(out)
    }
}

fn resolve_chunk(requested: Option<usize>, max_batch: usize) -> usize {
    requested.unwrap_or(DEFAULT_CHUNK).min(max_batch).max(1)
}

fn parse<T: DeserializeOwned>(resp: Response) -> Result<T, AppError> {
    let status = resp.status();
    if !status.is_success() {
        let detail = resp
            .json::<ApiError>()
            .map(|e| e.message)
            .unwrap_or_else(|_| "no details".to_string());
        return Err(AppError::new(
            5,
            format!("Scoring service responded with status {status}: {detail}"),
        ));
    }
    resp.json()
        .map_err(|e| AppError::new(5, format!("Failed to parse scoring service response: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_api_prefix() {
        let client = ScoringClient::new("http://localhost:8080/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080");
        assert_eq!(client.url("/score/batch"), "http://localhost:8080/api/v1/score/batch");
    }

    #[test]
    fn chunk_respects_service_limit() {
        assert_eq!(resolve_chunk(None, 1000), DEFAULT_CHUNK);
        assert_eq!(resolve_chunk(None, 100), 100);
        assert_eq!(resolve_chunk(Some(50), 100), 50);
        assert_eq!(resolve_chunk(Some(0), 100), 1);
    }

    #[test]
    fn unreachable_service_is_a_network_error() {
        let client = ScoringClient::new("http://127.0.0.1:1").unwrap();
        assert_eq!(client.chunk_size(None).unwrap_err().exit_code(), 5);
    }
}
