//! Filing fetch interface.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ownership::{CompanyId, FilingId, FilingType};

/// One filing to ingest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilingRequest {
    pub company_id: CompanyId,
    pub filing_id: FilingId,
    pub filing_type: FilingType,
    /// Where the filing is fetched from; also the governor's audit label.
    pub endpoint: String,
}

/// Raw filing contents as returned by a fetcher.
#[derive(Debug, Clone, PartialEq)]
pub struct FilingBlob {
    pub filing_id: FilingId,
    pub body: Vec<u8>,
    pub content_type: Option<String>,
}

impl FilingBlob {
    pub fn new(filing_id: FilingId, body: impl Into<Vec<u8>>) -> Self {
        Self {
            filing_id,
            body: body.into(),
            content_type: None,
        }
    }

    pub fn text(&self) -> std::result::Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.body)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Worth retrying: timeouts, connection resets, 5xx, 429.
    #[error("Transient: {0}")]
    Transient(String),

    /// Not worth retrying: 4xx, unreadable bodies.
    #[error("Permanent: {0}")]
    Permanent(String),
}

/// Downloads filings. Every call is preceded by a governor admission.
#[async_trait]
pub trait FilingFetcher: Send + Sync {
    async fn fetch(&self, request: &FilingRequest) -> std::result::Result<FilingBlob, FetchError>;
}
