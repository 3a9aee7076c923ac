//! HTTP filing fetcher.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use stakeledger_core::ingest::{FetchError, FilingBlob, FilingFetcher, FilingRequest};

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Downloads filings over HTTP. The governor admits every call before it
/// reaches this fetcher.
pub struct HttpFilingFetcher {
    client: Client,
}

impl HttpFilingFetcher {
    /// Filing archives require a descriptive user agent with a contact.
    pub fn new(user_agent: &str) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client })
    }
}

/// Whether a failed response is worth retrying.
pub fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
}

#[async_trait]
impl FilingFetcher for HttpFilingFetcher {
    async fn fetch(&self, request: &FilingRequest) -> Result<FilingBlob, FetchError> {
        let response = self
            .client
            .get(&request.endpoint)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() || e.is_request() {
                    FetchError::Transient(e.to_string())
                } else {
                    FetchError::Permanent(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = format!("{} returned {}", request.endpoint, status);
            return Err(if is_transient_status(status) {
                FetchError::Transient(message)
            } else {
                FetchError::Permanent(message)
            });
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Transient(e.to_string()))?;

        let mut blob = FilingBlob::new(request.filing_id.clone(), body.to_vec());
        blob.content_type = content_type;
        Ok(blob)
    }
}
