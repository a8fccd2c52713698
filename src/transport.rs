//! Optional `reqwest`-backed [`HttpTransport`] convenience implementation,
//! gated behind the `network` feature. The core never calls this directly
//! — every CRL/OCSP/TSA/AIA round trip goes through the trait — this is
//! only offered for callers that don't want to wire up their own client.
//!
//! Grounded on the teacher's `crypto/timestamp.rs::TimestampClient`, which
//! builds one `reqwest::Client` with a fixed timeout and reuses it across
//! requests; generalized here to the crate's own `post`/`get` contract.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{PdfSignError, Result};
use crate::traits::HttpTransport;

/// A `reqwest::Client`-backed [`HttpTransport`]. One instance is meant to
/// be shared across a validation run; building a new `reqwest::Client` per
/// request would defeat connection pooling.
pub struct ReqwestHttpTransport {
    client: reqwest::Client,
}

impl ReqwestHttpTransport {
    pub fn new() -> Self {
        Self { client: reqwest::Client::new() }
    }
}

impl Default for ReqwestHttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpTransport for ReqwestHttpTransport {
    async fn post(&self, url: &str, body: Vec<u8>, content_type: &str, timeout: Duration) -> Result<Vec<u8>> {
        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .timeout(timeout)
            .body(body)
            .send()
            .await
            .map_err(|e| PdfSignError::network_failure(format!("POST {url} failed: {e}")))?;

        if !response.status().is_success() {
            return Err(PdfSignError::network_failure(format!(
                "POST {url} returned HTTP {}",
                response.status()
            )));
        }

        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| PdfSignError::network_failure(format!("reading response body from {url} failed: {e}")))
    }

    async fn get(&self, url: &str, timeout: Duration) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| PdfSignError::network_failure(format!("GET {url} failed: {e}")))?;

        if !response.status().is_success() {
            return Err(PdfSignError::network_failure(format!(
                "GET {url} returned HTTP {}",
                response.status()
            )));
        }

        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| PdfSignError::network_failure(format!("reading response body from {url} failed: {e}")))
    }
}
