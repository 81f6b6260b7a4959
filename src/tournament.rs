//! Tournament scheduler.
//!
//! Runs several research strategy variants concurrently against the same
//! goal, scores the completed ones, and promotes the winner's snapshot.
//! Errored variants are reported in the failure count but never ranked.

use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::agents::research::{ResearchAgent, STRATEGIES};
use crate::types::{
    LeaderboardRow, PerformanceMetrics, ResearchSnapshot, TournamentEntry, TournamentOutcome,
    TournamentPatterns, TournamentReport,
};

/// Leaderboard rows published per tournament.
const LEADERBOARD_SIZE: usize = 5;
/// Agents that must mention a skill for it to count as consensus.
const CONSENSUS_MIN_AGENTS: usize = 2;
/// Duration (seconds) at which the speed component reaches zero.
const SPEED_BUDGET_SECS: f64 = 60.0;

/// One research variant a tournament can schedule.
#[async_trait]
pub trait StrategyRunner: Send + Sync {
    async fn run(&self, goal: &str, region: &str, strategy: &str) -> Result<ResearchSnapshot>;
}

#[async_trait]
impl StrategyRunner for ResearchAgent {
    async fn run(&self, goal: &str, region: &str, strategy: &str) -> Result<ResearchSnapshot> {
        self.research_with_strategy(goal, region, Some(strategy)).await
    }
}

fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

/// Composite score for one completed variant:
/// 0.4 x listing yield + 0.3 x skill yield + 0.2 x predictions
/// + 0.1 x speed, rounded to 3 decimals.
pub fn score_metrics(metrics: &PerformanceMetrics) -> f64 {
    let jobs = (metrics.jobs_found as f64 / 10.0).min(1.0);
    let skills = (metrics.skills_identified as f64 / 5.0).min(1.0);
    let predictions = if metrics.predictions_generated { 1.0 } else { 0.0 };
    let speed = ((SPEED_BUDGET_SECS - metrics.duration_seconds) / SPEED_BUDGET_SECS).max(0.0);

    round3(0.4 * jobs + 0.3 * skills + 0.2 * predictions + 0.1 * speed)
}

fn key_insight(snapshot: &ResearchSnapshot) -> String {
    snapshot
        .predictions
        .as_ref()
        .and_then(|p| p.rising.first().cloned())
        .map(|skill| format!("Rising: {skill}"))
        .or_else(|| snapshot.analysis.emerging_trends.first().cloned())
        .or_else(|| snapshot.analysis.top_skills.first().cloned())
        .unwrap_or_else(|| "General market analysis".to_string())
}

pub struct TournamentScheduler {
    runner: Arc<dyn StrategyRunner>,
}

impl TournamentScheduler {
    pub fn new(runner: Arc<dyn StrategyRunner>) -> Self {
        Self { runner }
    }

    /// Run `agent_count` strategy variants concurrently. The returned
    /// outcome carries the winner's snapshot and the full report.
    pub async fn run_tournament(
        &self,
        goal: &str,
        region: &str,
        agent_count: usize,
    ) -> Result<TournamentOutcome> {
        let tournament_id = uuid::Uuid::new_v4().to_string();
        let strategies: Vec<&str> = STRATEGIES.iter().cycle().take(agent_count.max(1)).copied().collect();

        info!(
            tournament_id = %tournament_id,
            goal,
            region,
            agents = strategies.len(),
            "Tournament starting"
        );
        let started = Instant::now();

        let handles: Vec<_> = strategies
            .iter()
            .map(|strategy| {
                let runner = self.runner.clone();
                let goal = goal.to_string();
                let region = region.to_string();
                let strategy = strategy.to_string();
                tokio::spawn(async move {
                    let agent_started = Instant::now();
                    let result = runner.run(&goal, &region, &strategy).await;
                    (strategy, agent_started.elapsed().as_secs_f64(), result)
                })
            })
            .collect();

        let mut entries: Vec<TournamentEntry> = Vec::new();
        let mut failed = 0usize;

        for joined in join_all(handles).await {
            match joined {
                Ok((strategy, duration, Ok(snapshot))) => {
                    let metrics = PerformanceMetrics {
                        duration_seconds: duration,
                        jobs_found: snapshot.listing_count(),
                        skills_identified: snapshot.analysis.top_skills.len(),
                        predictions_generated: snapshot.has_predictions(),
                        success: true,
                    };
                    let score = score_metrics(&metrics);
                    entries.push(TournamentEntry {
                        strategy,
                        snapshot: Some(snapshot),
                        metrics,
                        score,
                    });
                }
                Ok((strategy, _, Err(e))) => {
                    warn!(strategy = %strategy, error = %e, "Strategy variant failed, dropping from ranking");
                    failed += 1;
                }
                Err(e) => {
                    warn!(error = %e, "Strategy task panicked, dropping from ranking");
                    failed += 1;
                }
            }
        }

        if entries.is_empty() {
            anyhow::bail!("Every strategy variant failed, tournament has no winner");
        }

        // Stable sort: equal scores keep strategy submission order.
        entries.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let patterns = Self::analyse_patterns(&entries);
        let leaderboard: Vec<LeaderboardRow> = entries
            .iter()
            .take(LEADERBOARD_SIZE)
            .enumerate()
            .map(|(i, entry)| LeaderboardRow {
                rank: i + 1,
                strategy: entry.strategy.clone(),
                score: entry.score,
                key_insight: entry
                    .snapshot
                    .as_ref()
                    .map(key_insight)
                    .unwrap_or_else(|| "General market analysis".to_string()),
            })
            .collect();

        let winner = entries.remove(0);
        let snapshot = winner
            .snapshot
            .ok_or_else(|| anyhow::anyhow!("Winner entry carried no snapshot"))?;

        let report = TournamentReport {
            id: tournament_id.clone(),
            goal: goal.to_string(),
            region: region.to_string(),
            total_agents: strategies.len(),
            successful_agents: strategies.len() - failed,
            failed_agents: failed,
            duration_seconds: started.elapsed().as_secs_f64(),
            winner_strategy: winner.strategy.clone(),
            winner_score: winner.score,
            leaderboard,
            patterns,
        };

        info!(
            tournament_id = %tournament_id,
            winner = %report.winner_strategy,
            score = report.winner_score,
            failed,
            "Tournament complete"
        );

        Ok(TournamentOutcome { snapshot, report })
    }

    fn analyse_patterns(entries: &[TournamentEntry]) -> TournamentPatterns {
        let mut skill_counts: HashMap<String, usize> = HashMap::new();
        let mut trends: Vec<String> = Vec::new();

        for entry in entries {
            let Some(snapshot) = &entry.snapshot else { continue };
            let mut seen = Vec::new();
            for skill in &snapshot.analysis.top_skills {
                let skill = skill.to_lowercase();
                if !seen.contains(&skill) {
                    *skill_counts.entry(skill.clone()).or_insert(0) += 1;
                    seen.push(skill);
                }
            }
            for trend in &snapshot.analysis.emerging_trends {
                if !trends.contains(trend) {
                    trends.push(trend.clone());
                }
            }
        }

        let mut consensus: Vec<(String, usize)> = skill_counts
            .iter()
            .filter(|(_, &count)| count >= CONSENSUS_MIN_AGENTS)
            .map(|(skill, &count)| (skill.clone(), count))
            .collect();
        consensus.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        TournamentPatterns {
            consensus_skills: consensus.into_iter().take(5).map(|(s, _)| s).collect(),
            unique_skills: skill_counts.len(),
            unique_trends: trends.len(),
            best_strategy: entries
                .first()
                .map(|e| e.strategy.clone())
                .unwrap_or_default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
