//! Arbitrage detection over region snapshots.
//!
//! Two independent passes: region-level compensation arbitrage, and
//! skill-value arbitrage against a configured keyword vocabulary.
//! Both operate on already-normalized (USD) snapshots and are pure
//! functions of their inputs.

use crate::types::{ArbitrageOpportunity, MarketSnapshot, SkillArbitrage, SkillValueEntry};

/// Ratio below which a skill counts as undervalued in a region.
const UNDERVALUED_RATIO: f64 = 0.7;
/// Ratio above which a skill counts as overvalued in a region.
const OVERVALUED_RATIO: f64 = 1.3;
/// Listings per qualifying region that become opportunities.
const TOP_LISTINGS_PER_REGION: usize = 5;

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Region/listing pairs in regions (other than the primary) whose average
/// USD salary clears the threshold. Each qualifying region contributes its
/// top five listings; results are ranked by opportunity score descending.
pub fn find_opportunities(
    snapshots: &[MarketSnapshot],
    primary_region: &str,
    threshold_usd: f64,
) -> Vec<ArbitrageOpportunity> {
    let mut opportunities = Vec::new();

    for s in snapshots {
        if s.region == primary_region || s.salary_usd.avg <= threshold_usd {
            continue;
        }
        let score = (s.salary_usd.avg / 10_000.0).min(10.0);
        for listing in s.listings.iter().take(TOP_LISTINGS_PER_REGION) {
            opportunities.push(ArbitrageOpportunity {
                region: s.region.clone(),
                job_title: listing.title.clone(),
                salary_usd: s.salary_usd.avg,
                opportunity_score: score,
                description: format!(
                    "{} at {} in {} pays avg ${:.0} USD with demand score {:.2}",
                    listing.title, listing.company, s.region, s.salary_usd.avg, s.demand_score,
                ),
            });
        }
    }

    opportunities.sort_by(|a, b| {
        b.opportunity_score
            .partial_cmp(&a.opportunity_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    opportunities
}

/// Value of one skill in one region: mention count weighted by the
/// region's average salary.
fn skill_value(snapshot: &MarketSnapshot, skill: &str) -> f64 {
    let mentions = snapshot
        .listings
        .iter()
        .filter(|l| {
            l.title.to_lowercase().contains(skill)
                || l.description.to_lowercase().contains(skill)
                || l.tags.iter().any(|t| t.to_lowercase().contains(skill))
        })
        .count();
    mentions as f64 * snapshot.salary_usd.avg
}

/// Skills priced away from their cross-region mean.
///
/// For each keyword, the mean is taken over the regions where the skill
/// actually appears, and a skill seen in fewer than two regions has no
/// cross-region price to compare, so it yields nothing. A region is
/// undervalued below 0.7x the mean value and overvalued above 1.3x.
pub fn find_skill_arbitrage(snapshots: &[MarketSnapshot], keywords: &[String]) -> SkillArbitrage {
    let mut result = SkillArbitrage::default();

    for keyword in keywords {
        let skill = keyword.to_lowercase();

        let values: Vec<(&str, f64)> = snapshots
            .iter()
            .map(|s| (s.region.as_str(), skill_value(s, &skill)))
            .filter(|(_, value)| *value > 0.0)
            .collect();
        if values.len() < 2 {
            continue;
        }

        let mean: f64 = values.iter().map(|(_, value)| value).sum::<f64>() / values.len() as f64;

        for (region, value) in values {
            let ratio = value / mean;
            let entry = SkillValueEntry {
                skill: skill.clone(),
                region: region.to_string(),
                value_ratio: round2(ratio),
            };
            if ratio < UNDERVALUED_RATIO {
                result.undervalued.push(entry);
            } else if ratio > OVERVALUED_RATIO {
                result.overvalued.push(entry);
            }
        }
    }

    result
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
