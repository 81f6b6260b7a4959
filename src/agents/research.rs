//! Research agent.
//!
//! Gathers listings through the market aggregator, then asks the
//! reasoning service to extract skills, trends and demand predictions.
//! Every reasoning step has a fallback so a research pass always yields
//! a usable snapshot.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::Researcher;
use crate::market::MarketAggregator;
use crate::reasoning::{ReasoningRequest, ReasoningService};
use crate::types::{Listing, MarketAnalysis, MarketPredictions, ResearchSnapshot};

/// Strategy flavors a tournament can run this agent under.
pub const STRATEGIES: [&str; 5] = [
    "balanced",
    "aggressive",
    "conservative",
    "innovative",
    "data_driven",
];

pub struct ResearchAgent {
    aggregator: Arc<MarketAggregator>,
    reasoning: Arc<dyn ReasoningService>,
    /// When set, multi-region analysis is attached to every snapshot.
    include_multi_market: bool,
}

impl ResearchAgent {
    pub fn new(aggregator: Arc<MarketAggregator>, reasoning: Arc<dyn ReasoningService>) -> Self {
        Self {
            aggregator,
            reasoning,
            include_multi_market: true,
        }
    }

    /// Lightweight variant used by the marathon loop for drift checks.
    pub fn shallow(aggregator: Arc<MarketAggregator>, reasoning: Arc<dyn ReasoningService>) -> Self {
        Self {
            aggregator,
            reasoning,
            include_multi_market: false,
        }
    }

    /// One research pass, optionally flavored by a tournament strategy.
    pub async fn research_with_strategy(
        &self,
        goal: &str,
        region: &str,
        strategy: Option<&str>,
    ) -> Result<ResearchSnapshot> {
        let insights = self.aggregator.gather_insights(goal, region).await?;
        let analysis = self.analyse(goal, &insights.listings, strategy).await;
        let predictions = self.predict(goal, &analysis).await;

        let multi_market = if self.include_multi_market {
            match self.aggregator.gather_multi_market_insights(goal, region).await {
                Ok(report) => Some(report),
                Err(e) => {
                    warn!(goal, error = %e, "Multi-market analysis failed, continuing without");
                    None
                }
            }
        } else {
            None
        };

        let summary = format!(
            "{} listings for {goal} in {region}; top skills: {}",
            insights.listings.len(),
            analysis.top_skills.join(", "),
        );

        info!(
            goal,
            region,
            strategy = strategy.unwrap_or("default"),
            listings = insights.listings.len(),
            skills = analysis.top_skills.len(),
            "Research pass complete"
        );

        Ok(ResearchSnapshot {
            listings: insights.listings,
            analysis,
            predictions,
            multi_market,
            summary,
        })
    }

    async fn analyse(
        &self,
        goal: &str,
        listings: &[Listing],
        strategy: Option<&str>,
    ) -> MarketAnalysis {
        let titles: Vec<&str> = listings.iter().take(15).map(|l| l.title.as_str()).collect();
        let angle = match strategy {
            Some("aggressive") => "Favor cutting-edge, high-risk high-reward skills.",
            Some("conservative") => "Favor established, widely-required skills.",
            Some("innovative") => "Favor emerging niches with little competition.",
            Some("data_driven") => "Weight strictly by how often skills appear in the titles.",
            _ => "Give a balanced view.",
        };
        let prompt = format!(
            "Job titles for \"{goal}\": {titles:?}. {angle} Respond with JSON: \
             {{\"top_skills\": [5-8 skills], \"experience_required\": \"short phrase\", \
             \"emerging_trends\": [2-4 trends]}}"
        );

        match self.reasoning.generate(&ReasoningRequest::json(&prompt)).await {
            Ok(value) => match serde_json::from_value::<MarketAnalysis>(value) {
                Ok(analysis) if !analysis.top_skills.is_empty() => analysis,
                _ => {
                    debug!(goal, "Analysis response mis-shaped, using tag-based fallback");
                    Self::fallback_analysis(listings)
                }
            },
            Err(e) => {
                warn!(goal, error = %e, "Analysis failed, using tag-based fallback");
                Self::fallback_analysis(listings)
            }
        }
    }

    /// Fallback built from listing tags when the reasoning service is
    /// unavailable.
    fn fallback_analysis(listings: &[Listing]) -> MarketAnalysis {
        let mut skills: Vec<String> = Vec::new();
        for listing in listings {
            for tag in &listing.tags {
                if !skills.contains(tag) {
                    skills.push(tag.clone());
                }
            }
        }
        MarketAnalysis {
            top_skills: skills,
            experience_required: "2+ years".to_string(),
            emerging_trends: vec![],
        }
    }

    async fn predict(&self, goal: &str, analysis: &MarketAnalysis) -> Option<MarketPredictions> {
        if analysis.top_skills.is_empty() {
            return None;
        }
        let prompt = format!(
            "Skills currently demanded for \"{goal}\": {:?}. Forecast demand over 12 months. \
             Respond with JSON: {{\"rising\": [...], \"stable\": [...], \"declining\": [...]}}",
            analysis.top_skills,
        );

        match self.reasoning.generate(&ReasoningRequest::json(&prompt)).await {
            Ok(value) => serde_json::from_value::<MarketPredictions>(value).ok(),
            Err(e) => {
                warn!(goal, error = %e, "Prediction failed, snapshot carries none");
                None
            }
        }
    }

}

#[async_trait]
impl Researcher for ResearchAgent {
    async fn research(&self, goal: &str, region: &str) -> Result<ResearchSnapshot> {
        self.research_with_strategy(goal, region, None).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
