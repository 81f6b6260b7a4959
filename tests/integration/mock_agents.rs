//! Mock agents for integration testing.
//!
//! Deterministic implementations of the four worker traits plus the
//! tournament strategy runner. All state is in-memory and fully
//! controllable from test code.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::sync::Mutex;

use stride::agents::{Executor, Planner, Researcher, Verifier};
use stride::tournament::StrategyRunner;
use stride::types::*;

/// Build a snapshot with `count` listings and the given trends.
pub fn snapshot_with(count: usize, trends: &[&str]) -> ResearchSnapshot {
    let listings = (0..count)
        .map(|i| Listing {
            title: format!("Backend Developer {i}"),
            company: "TestCo".to_string(),
            region: "Kenya".to_string(),
            link: format!("https://jobs.example.com/{i}"),
            tags: vec!["python".to_string()],
            description: "Build and operate backend services".to_string(),
            source: "mock".to_string(),
            is_synthetic: false,
            posted_at: Utc::now(),
        })
        .collect();
    ResearchSnapshot {
        listings,
        analysis: MarketAnalysis {
            top_skills: vec!["python".to_string(), "sql".to_string()],
            experience_required: "2+ years".to_string(),
            emerging_trends: trends.iter().map(|t| t.to_string()).collect(),
        },
        predictions: None,
        multi_market: None,
        summary: format!("{count} listings analysed"),
    }
}

/// A researcher that returns a controllable snapshot.
///
/// As a `StrategyRunner`, only the "balanced" strategy produces
/// predictions, so tournaments over this mock always crown "balanced".
pub struct MockResearcher {
    listing_count: Mutex<usize>,
    trends: Mutex<Vec<String>>,
    force_error: Mutex<Option<String>>,
    calls: Mutex<usize>,
}

impl MockResearcher {
    pub fn new(listing_count: usize) -> Self {
        Self {
            listing_count: Mutex::new(listing_count),
            trends: Mutex::new(Vec::new()),
            force_error: Mutex::new(None),
            calls: Mutex::new(0),
        }
    }

    pub fn set_listing_count(&self, count: usize) {
        *self.listing_count.lock().unwrap() = count;
    }

    pub fn set_trends(&self, trends: &[&str]) {
        *self.trends.lock().unwrap() = trends.iter().map(|t| t.to_string()).collect();
    }

    /// Force all subsequent research calls to fail.
    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    pub fn clear_error(&self) {
        *self.force_error.lock().unwrap() = None;
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }

    fn build(&self) -> Result<ResearchSnapshot> {
        *self.calls.lock().unwrap() += 1;
        if let Some(err) = self.force_error.lock().unwrap().as_ref() {
            return Err(anyhow!("{}", err));
        }
        let count = *self.listing_count.lock().unwrap();
        let trends = self.trends.lock().unwrap().clone();
        let trend_refs: Vec<&str> = trends.iter().map(String::as_str).collect();
        Ok(snapshot_with(count, &trend_refs))
    }
}

#[async_trait]
impl Researcher for MockResearcher {
    async fn research(&self, _goal: &str, _region: &str) -> Result<ResearchSnapshot> {
        self.build()
    }
}

#[async_trait]
impl StrategyRunner for MockResearcher {
    async fn run(&self, _goal: &str, _region: &str, strategy: &str) -> Result<ResearchSnapshot> {
        let mut snapshot = self.build()?;
        if strategy == "balanced" {
            snapshot.predictions = Some(MarketPredictions {
                rising: vec!["rust".to_string()],
                stable: vec!["python".to_string()],
                declining: vec![],
            });
        }
        Ok(snapshot)
    }
}

/// A planner that always produces a three-milestone plan and always
/// accepts drift revisions.
pub struct MockPlanner;

impl MockPlanner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Planner for MockPlanner {
    async fn build_plan(&self, goal: &str, research: &ResearchSnapshot) -> Result<Plan> {
        let milestones = (1..=3)
            .map(|month| Milestone {
                month,
                title: format!("Milestone {month}"),
                focus: research.analysis.top_skills.clone(),
                tasks: vec![format!("Practice toward {goal}")],
            })
            .collect();
        Ok(Plan {
            goal: goal.to_string(),
            milestones,
            weekly_hours: 10,
            notes: vec![],
        })
    }

    async fn adjust_plan(
        &self,
        plan: &Plan,
        drift: &DriftReport,
        _score: f64,
    ) -> Result<Option<Plan>> {
        let mut revised = plan.clone();
        revised
            .notes
            .push(format!("Revised for delta {}", drift.job_delta));
        Ok(Some(revised))
    }

    fn suggest_adjustment(&self, plan: &Plan, score: f64) -> AdjustmentSuggestion {
        AdjustmentSuggestion {
            recommendation: format!("Score {score:.2}, keep the current pace"),
            action: "maintain_schedule".to_string(),
            adjusted_weekly_hours: plan.weekly_hours,
        }
    }
}

/// An executor that derives one resource and one sprint per milestone.
pub struct MockExecutor;

#[async_trait]
impl Executor for MockExecutor {
    async fn execute(&self, plan: &Plan) -> Result<ExecutionArtifacts> {
        let resources = plan
            .milestones
            .iter()
            .map(|m| ResourceSuggestion {
                milestone: m.title.clone(),
                name: format!("{} workbook", m.title),
                platform: "web".to_string(),
            })
            .collect();
        let sprints = plan
            .milestones
            .iter()
            .enumerate()
            .map(|(i, m)| Sprint {
                week: i as u32 + 1,
                title: m.title.clone(),
                focus_area: m.focus.first().cloned().unwrap_or_default(),
                total_minutes: plan.weekly_hours * 60,
            })
            .collect();
        Ok(ExecutionArtifacts {
            resources,
            schedule: Schedule { sprints },
        })
    }
}

/// A verifier with a controllable score and failure switch.
pub struct MockVerifier {
    score: Mutex<f64>,
    force_error: Mutex<Option<String>>,
}

impl MockVerifier {
    pub fn new(score: f64) -> Self {
        Self {
            score: Mutex::new(score),
            force_error: Mutex::new(None),
        }
    }

    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }
}

#[async_trait]
impl Verifier for MockVerifier {
    async fn verify(
        &self,
        _plan: &Plan,
        _artifacts: &ExecutionArtifacts,
    ) -> Result<VerificationReport> {
        if let Some(err) = self.force_error.lock().unwrap().as_ref() {
            return Err(anyhow!("{}", err));
        }
        let score = *self.score.lock().unwrap();
        Ok(VerificationReport {
            overall_score: score,
            quiz: Value::Null,
            mock_interview: Value::Null,
            status: if score >= 0.6 { "ON_TRACK" } else { "NEEDS_REVIEW" }.to_string(),
            runtime_errors: 0,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_researcher_returns_requested_count() {
        let researcher = MockResearcher::new(7);
        researcher.set_trends(&["AI tooling"]);
        let snapshot = researcher.research("goal", "Kenya").await.unwrap();
        assert_eq!(snapshot.listing_count(), 7);
        assert_eq!(snapshot.analysis.emerging_trends, vec!["AI tooling"]);
        assert_eq!(researcher.call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_researcher_forced_error() {
        let researcher = MockResearcher::new(5);
        researcher.set_error("simulated outage");
        assert!(researcher.research("goal", "Kenya").await.is_err());

        researcher.clear_error();
        assert!(researcher.research("goal", "Kenya").await.is_ok());
        assert_eq!(researcher.call_count(), 2);
    }

    #[tokio::test]
    async fn test_mock_strategy_runner_favours_balanced() {
        let researcher = MockResearcher::new(5);
        let balanced = researcher.run("goal", "Kenya", "balanced").await.unwrap();
        let aggressive = researcher.run("goal", "Kenya", "aggressive").await.unwrap();
        assert!(balanced.has_predictions());
        assert!(!aggressive.has_predictions());
    }

    #[tokio::test]
    async fn test_mock_planner_builds_three_milestones() {
        let planner = MockPlanner::new();
        let snapshot = snapshot_with(5, &[]);
        let plan = planner.build_plan("Backend Developer", &snapshot).await.unwrap();
        assert_eq!(plan.milestones.len(), 3);
        assert_eq!(plan.weekly_hours, 10);
    }

    #[tokio::test]
    async fn test_mock_executor_one_sprint_per_milestone() {
        let planner = MockPlanner::new();
        let plan = planner
            .build_plan("Backend Developer", &snapshot_with(5, &[]))
            .await
            .unwrap();
        let artifacts = MockExecutor.execute(&plan).await.unwrap();
        assert_eq!(artifacts.resources.len(), 3);
        assert_eq!(artifacts.schedule.sprints.len(), 3);
        assert_eq!(artifacts.schedule.sprints[0].total_minutes, 600);
    }

    #[tokio::test]
    async fn test_mock_verifier_status_tracks_score() {
        let plan = Plan {
            goal: "goal".to_string(),
            milestones: vec![],
            weekly_hours: 10,
            notes: vec![],
        };
        let artifacts = ExecutionArtifacts {
            resources: vec![],
            schedule: Schedule::default(),
        };

        let passing = MockVerifier::new(0.85);
        let report = passing.verify(&plan, &artifacts).await.unwrap();
        assert_eq!(report.status, "ON_TRACK");

        let failing = MockVerifier::new(0.3);
        let report = failing.verify(&plan, &artifacts).await.unwrap();
        assert_eq!(report.status, "NEEDS_REVIEW");
    }
}
