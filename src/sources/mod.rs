//! Listing source integrations.
//!
//! Defines the `ListingSource` trait and provides HTTP implementations
//! for Remotive and Adzuna. Sources return raw postings; normalization
//! into `Listing` happens in the market aggregator.

pub mod adzuna;
pub mod remotive;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::RawListing;

/// Abstraction over job-listing providers.
///
/// An empty result set is a normal outcome (anti-automation blocking,
/// niche queries) and must never be treated as an error by implementors.
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Short identifier used in logs and listing provenance.
    fn name(&self) -> &str;

    /// Search for postings matching `query` in `region`, returning at
    /// most `limit` results.
    async fn search(&self, query: &str, region: &str, limit: usize) -> Result<Vec<RawListing>>;
}
