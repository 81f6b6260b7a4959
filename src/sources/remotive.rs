//! Remotive listing source.
//!
//! Fetches remote job postings from the public Remotive API.
//!
//! API: `https://remotive.com/api/remote-jobs`
//! Auth: Not required.
//! The API is global, so the region argument only scopes the search text.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::ListingSource;
use crate::types::{RawListing, StrideError};

const BASE_URL: &str = "https://remotive.com/api/remote-jobs";
const SOURCE_NAME: &str = "remotive";

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RemotiveResponse {
    #[serde(default)]
    jobs: Vec<RemotiveJob>,
}

#[derive(Debug, Deserialize)]
struct RemotiveJob {
    title: String,
    #[serde(default)]
    company_name: String,
    url: String,
    #[serde(default)]
    description: Option<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct RemotiveSource {
    http: Client,
}

impl RemotiveSource {
    pub fn new() -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(20))
            .build()
            .context("Failed to build Remotive HTTP client")?;
        Ok(Self { http })
    }

    fn to_raw(job: RemotiveJob) -> RawListing {
        RawListing {
            title: job.title,
            company: job.company_name,
            link: job.url,
            description: job.description,
            source: Some(SOURCE_NAME.to_string()),
        }
    }
}

#[async_trait]
impl ListingSource for RemotiveSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn search(&self, query: &str, _region: &str, limit: usize) -> Result<Vec<RawListing>> {
        let response = self
            .http
            .get(BASE_URL)
            .query(&[("search", query), ("limit", &limit.to_string())])
            .send()
            .await
            .context("Remotive request failed")?;

        let status = response.status();
        if !status.is_success() {
            return Err(StrideError::Source {
                provider: self.name().to_string(),
                message: format!("HTTP {status}"),
            }
            .into());
        }

        let body: RemotiveResponse = response
            .json()
            .await
            .context("Failed to parse Remotive response")?;

        let listings: Vec<RawListing> = body
            .jobs
            .into_iter()
            .take(limit)
            .map(Self::to_raw)
            .collect();

        debug!(query, count = listings.len(), "Remotive search complete");
        Ok(listings)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
