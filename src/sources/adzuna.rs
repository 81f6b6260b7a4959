//! Adzuna listing source.
//!
//! Fetches job postings from the Adzuna search API.
//!
//! API: `https://api.adzuna.com/v1/api/jobs/{country}/search/{page}`
//! Auth: app_id + app_key query parameters.
//! The country code is fixed per client; the region argument is appended
//! to the search text for location scoping.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::ListingSource;
use crate::types::{RawListing, StrideError};

const BASE_URL: &str = "https://api.adzuna.com/v1/api/jobs";
const SOURCE_NAME: &str = "adzuna";

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct AdzunaResponse {
    #[serde(default)]
    results: Vec<AdzunaJob>,
}

#[derive(Debug, Deserialize)]
struct AdzunaJob {
    title: String,
    #[serde(default)]
    company: Option<AdzunaCompany>,
    redirect_url: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AdzunaCompany {
    #[serde(default)]
    display_name: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct AdzunaSource {
    http: Client,
    app_id: String,
    app_key: String,
    country: String,
}

impl AdzunaSource {
    pub fn new(app_id: String, app_key: String, country: String) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(20))
            .build()
            .context("Failed to build Adzuna HTTP client")?;
        Ok(Self {
            http,
            app_id,
            app_key,
            country,
        })
    }

    fn to_raw(job: AdzunaJob) -> RawListing {
        RawListing {
            title: job.title,
            company: job
                .company
                .map(|c| c.display_name)
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| "Unknown".to_string()),
            link: job.redirect_url,
            description: job.description,
            source: Some(SOURCE_NAME.to_string()),
        }
    }
}

#[async_trait]
impl ListingSource for AdzunaSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn search(&self, query: &str, region: &str, limit: usize) -> Result<Vec<RawListing>> {
        let url = format!("{BASE_URL}/{}/search/1", self.country);
        let what = format!("{query} {region}");

        let response = self
            .http
            .get(&url)
            .query(&[
                ("app_id", self.app_id.as_str()),
                ("app_key", self.app_key.as_str()),
                ("what", what.trim()),
                ("results_per_page", &limit.to_string()),
            ])
            .send()
            .await
            .context("Adzuna request failed")?;

        let status = response.status();
        if !status.is_success() {
            return Err(StrideError::Source {
                provider: self.name().to_string(),
                message: format!("HTTP {status}"),
            }
            .into());
        }

        let body: AdzunaResponse = response
            .json()
            .await
            .context("Failed to parse Adzuna response")?;

        let listings: Vec<RawListing> = body
            .results
            .into_iter()
            .take(limit)
            .map(Self::to_raw)
            .collect();

        debug!(query, region, count = listings.len(), "Adzuna search complete");
        Ok(listings)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
