//! Listing aggregation and market analysis.
//!
//! The `MarketAggregator` fans out over configured listing sources,
//! normalizes postings, fills gaps with synthetic data from the
//! reasoning service, and derives cross-region arbitrage reports.

pub mod arbitrage;
pub mod salary;

use anyhow::Result;
use chrono::Utc;
use futures::future::join_all;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::config::{MarketConfig, RegionConfig};
use crate::reasoning::{ReasoningRequest, ReasoningService};
use crate::sources::ListingSource;
use crate::types::{
    ArbitrageOpportunity, Listing, MarketInsights, MarketSnapshot, MarketStrategy,
    MultiMarketReport, RawListing, SkillArbitrage,
};

/// Listings requested from each source per query.
const PER_SOURCE_LIMIT: usize = 20;

/// Listing count at which demand saturates.
const DEMAND_SATURATION: f64 = 50.0;

/// Trends shown when the reasoning service cannot provide any.
const FALLBACK_TRENDS: [&str; 3] = [
    "Remote-first hiring",
    "Cloud infrastructure skills",
    "AI tooling adoption",
];

/// Demand score: min(1, listings/50) + min(0.5, trends x 0.1).
pub fn demand_score(listing_count: usize, trend_count: usize) -> f64 {
    let listing_part = (listing_count as f64 / DEMAND_SATURATION).min(1.0);
    let trend_part = (trend_count as f64 * 0.1).min(0.5);
    listing_part + trend_part
}

pub struct MarketAggregator {
    sources: Vec<Arc<dyn ListingSource>>,
    reasoning: Arc<dyn ReasoningService>,
    regions: Vec<RegionConfig>,
    currency_rates: HashMap<String, f64>,
    skill_keywords: Vec<String>,
    arbitrage_threshold_usd: f64,
    source_timeout: Duration,
    source_permits: Arc<Semaphore>,
}

impl MarketAggregator {
    pub fn new(
        sources: Vec<Arc<dyn ListingSource>>,
        reasoning: Arc<dyn ReasoningService>,
        config: &MarketConfig,
    ) -> Self {
        Self {
            sources,
            reasoning,
            regions: config.regions.clone(),
            currency_rates: config.currency_rates.clone(),
            skill_keywords: config.skill_keywords.clone(),
            arbitrage_threshold_usd: config.arbitrage_threshold_usd,
            source_timeout: Duration::from_secs(config.source_timeout_secs),
            source_permits: Arc::new(Semaphore::new(config.max_concurrent_sources.max(1))),
        }
    }

    // -----------------------------------------------------------------------
    // Single-region insights
    // -----------------------------------------------------------------------

    /// Gather normalized listings plus trends and a salary estimate for
    /// one query/region pair. Source failures contribute zero listings;
    /// a fully empty result set triggers synthetic generation.
    pub async fn gather_insights(&self, query: &str, region: &str) -> Result<MarketInsights> {
        let searches = self.sources.iter().map(|source| {
            let source = source.clone();
            let permits = self.source_permits.clone();
            let timeout = self.source_timeout;
            let query = query.to_string();
            let region = region.to_string();
            async move {
                let _permit = permits.acquire().await;
                let name = source.name().to_string();
                match tokio::time::timeout(timeout, source.search(&query, &region, PER_SOURCE_LIMIT))
                    .await
                {
                    Ok(Ok(raw)) => raw,
                    Ok(Err(e)) => {
                        warn!(source = %name, error = %e, "Listing source failed");
                        Vec::new()
                    }
                    Err(_) => {
                        warn!(source = %name, timeout_secs = timeout.as_secs(), "Listing source timed out");
                        Vec::new()
                    }
                }
            }
        });

        let raw: Vec<RawListing> = join_all(searches).await.into_iter().flatten().collect();
        let mut listings: Vec<Listing> = raw
            .into_iter()
            .map(|r| self.normalize(r, region))
            .collect();

        if listings.is_empty() {
            info!(query, region, "All sources empty, generating synthetic listings");
            listings = self.synthetic_listings(query, region).await;
        }

        let (trends, salary_range) = self.market_signals(query, region).await;

        debug!(
            query,
            region,
            listings = listings.len(),
            trends = trends.len(),
            "Insights gathered"
        );

        Ok(MarketInsights {
            listings,
            trends,
            salary_range,
        })
    }

    fn normalize(&self, raw: RawListing, region: &str) -> Listing {
        let haystack = format!(
            "{} {}",
            raw.title.to_lowercase(),
            raw.description.as_deref().unwrap_or("").to_lowercase(),
        );
        let tags: Vec<String> = self
            .skill_keywords
            .iter()
            .filter(|k| haystack.contains(&k.to_lowercase()))
            .cloned()
            .collect();

        Listing {
            title: raw.title,
            company: raw.company,
            region: region.to_string(),
            link: raw.link,
            tags,
            description: raw.description.unwrap_or_default(),
            source: raw.source.unwrap_or_else(|| "unknown".to_string()),
            is_synthetic: false,
            posted_at: Utc::now(),
        }
    }

    /// Generate representative listings when every source comes back
    /// empty. All results are flagged synthetic; if generation itself
    /// fails, a single flagged placeholder stands in.
    async fn synthetic_listings(&self, query: &str, region: &str) -> Vec<Listing> {
        let prompt = format!(
            "List 5 realistic current job openings for \"{query}\" in {region}. \
             Respond with a JSON array of objects with keys \"title\", \
             \"company\" and \"description\". No other text."
        );

        match self.reasoning.generate(&ReasoningRequest::json(&prompt)).await {
            Ok(Value::Array(items)) if !items.is_empty() => items
                .iter()
                .filter_map(|item| {
                    let title = item.get("title")?.as_str()?.to_string();
                    Some(Listing {
                        title,
                        company: item
                            .get("company")
                            .and_then(|c| c.as_str())
                            .unwrap_or("Unknown")
                            .to_string(),
                        region: region.to_string(),
                        link: "#synthetic".to_string(),
                        tags: vec![],
                        description: item
                            .get("description")
                            .and_then(|d| d.as_str())
                            .unwrap_or("")
                            .to_string(),
                        source: "synthetic".to_string(),
                        is_synthetic: true,
                        posted_at: Utc::now(),
                    })
                })
                .collect(),
            Ok(_) | Err(_) => {
                warn!(query, region, "Synthetic generation failed, using placeholder");
                vec![Listing {
                    title: format!("{query} (market estimate)"),
                    company: "Market estimate".to_string(),
                    region: region.to_string(),
                    link: "#synthetic".to_string(),
                    tags: vec![],
                    description: format!("Representative {query} opening in {region}"),
                    source: "synthetic".to_string(),
                    is_synthetic: true,
                    posted_at: Utc::now(),
                }]
            }
        }
    }

    /// Trends and salary estimate for a market. Falls back to static
    /// trends and an empty salary string on any reasoning failure; the
    /// salary parser turns the empty string into its default range.
    async fn market_signals(&self, query: &str, region: &str) -> (Vec<String>, String) {
        let prompt = format!(
            "For the \"{query}\" job market in {region}, respond with JSON: \
             {{\"trends\": [3-5 short hiring trend strings], \
             \"salary_range\": \"typical annual salary range in local currency\"}}"
        );

        match self.reasoning.generate(&ReasoningRequest::json(&prompt)).await {
            Ok(value) => {
                let trends: Vec<String> = value
                    .get("trends")
                    .and_then(|t| t.as_array())
                    .map(|arr| {
                        arr.iter()
                            .filter_map(|v| v.as_str().map(str::to_string))
                            .collect()
                    })
                    .unwrap_or_default();
                let salary = value
                    .get("salary_range")
                    .and_then(|s| s.as_str())
                    .unwrap_or("")
                    .to_string();
                if trends.is_empty() {
                    (FALLBACK_TRENDS.iter().map(|s| s.to_string()).collect(), salary)
                } else {
                    (trends, salary)
                }
            }
            Err(e) => {
                warn!(query, region, error = %e, "Market signal generation failed");
                (
                    FALLBACK_TRENDS.iter().map(|s| s.to_string()).collect(),
                    String::new(),
                )
            }
        }
    }

    // -----------------------------------------------------------------------
    // Multi-region analysis
    // -----------------------------------------------------------------------

    /// Analyse every configured region concurrently and derive the
    /// arbitrage report. Regions that fail entirely are skipped; the
    /// strategy confidence reflects how many regions survived.
    pub async fn gather_multi_market_insights(
        &self,
        query: &str,
        primary_region: &str,
    ) -> Result<MultiMarketReport> {
        info!(query, primary_region, regions = self.regions.len(), "Multi-market analysis starting");

        let passes = self.regions.iter().map(|region_cfg| async {
            match self.gather_insights(query, &region_cfg.name).await {
                Ok(insights) => Some(self.build_snapshot(region_cfg, insights)),
                Err(e) => {
                    warn!(region = %region_cfg.name, error = %e, "Region analysis failed, skipping");
                    None
                }
            }
        });

        let snapshots: Vec<MarketSnapshot> =
            join_all(passes).await.into_iter().flatten().collect();

        if snapshots.is_empty() {
            anyhow::bail!("Every region failed during multi-market analysis");
        }

        let opportunities =
            arbitrage::find_opportunities(&snapshots, primary_region, self.arbitrage_threshold_usd);
        let skill_arbitrage = arbitrage::find_skill_arbitrage(&snapshots, &self.skill_keywords);
        let strategy = Self::synthesize_strategy(
            &opportunities,
            &skill_arbitrage,
            primary_region,
            snapshots.len(),
        );

        info!(
            regions_analyzed = snapshots.len(),
            opportunities = opportunities.len(),
            confidence = strategy.confidence,
            "Multi-market analysis complete"
        );

        Ok(MultiMarketReport {
            query: query.to_string(),
            primary_region: primary_region.to_string(),
            regions_analyzed: snapshots.len(),
            snapshots,
            arbitrage_opportunities: opportunities,
            skill_arbitrage,
            strategy,
            generated_at: Utc::now(),
        })
    }

    fn build_snapshot(&self, region_cfg: &RegionConfig, insights: MarketInsights) -> MarketSnapshot {
        let salary_local = salary::parse_salary_text(&insights.salary_range);
        let rate = self
            .currency_rates
            .get(&region_cfg.currency)
            .copied()
            .unwrap_or(1.0);
        let score = demand_score(insights.listings.len(), insights.trends.len());

        MarketSnapshot {
            region: region_cfg.name.clone(),
            currency: region_cfg.currency.clone(),
            listings: insights.listings,
            trends: insights.trends,
            salary_local,
            salary_usd: salary_local.scaled(rate),
            demand_score: score,
        }
    }

    fn synthesize_strategy(
        opportunities: &[ArbitrageOpportunity],
        skill_arbitrage: &SkillArbitrage,
        primary_region: &str,
        valid_regions: usize,
    ) -> MarketStrategy {
        let recommended: Vec<ArbitrageOpportunity> =
            opportunities.iter().take(3).cloned().collect();

        let mut skill_focus: Vec<String> = Vec::new();
        for entry in &skill_arbitrage.undervalued {
            if !skill_focus.contains(&entry.skill) {
                skill_focus.push(entry.skill.clone());
            }
            if skill_focus.len() == 3 {
                break;
            }
        }

        let migration_strategy = match recommended.first() {
            Some(top) => format!(
                "Target {} roles remotely from your current base, then evaluate relocation once income stabilises",
                top.region,
            ),
            None => format!(
                "No clear cross-border arbitrage detected, deepen expertise in {primary_region}",
            ),
        };

        let risk_assessment = if recommended.len() >= 2 {
            "Diversified: multiple viable target markets reduce single-market exposure".to_string()
        } else {
            "Concentrated: single or no target market, monitor demand shifts closely".to_string()
        };

        MarketStrategy {
            recommended_opportunities: recommended,
            skill_focus,
            migration_strategy,
            timeline: "3-6 months to remote-ready portfolio, 6-12 months to first cross-border offer"
                .to_string(),
            risk_assessment,
            confidence: (valid_regions as f64 * 0.2).min(0.9),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
