//! Marathon supervisory loop.
//!
//! Runs the pipeline once up front, then re-researches the market on a
//! fixed cycle for a bounded session. A listing-count delta beyond the
//! drift threshold publishes an URGENT market-shift message and triggers
//! a self-correction of the plan. Cycle errors are absorbed with a fixed
//! backoff: the loop ends only on duration expiry or an explicit stop.

use anyhow::{Context, Result};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::agents::Researcher;
use crate::bus::MessageBus;
use crate::config::MarathonConfig;
use crate::pipeline::Orchestrator;
use crate::types::{Checkpoint, DriftReport, Message, MessageKind, MessagePriority, TrendSample};

pub struct MarathonRunner {
    orchestrator: Orchestrator,
    /// Cycle researcher, usually a shallow variant of the pipeline's.
    researcher: Arc<dyn Researcher>,
    bus: Arc<MessageBus>,
    duration: Duration,
    cycle_interval: Duration,
    drift_threshold: i64,
    error_backoff: Duration,
}

impl MarathonRunner {
    pub fn new(
        orchestrator: Orchestrator,
        researcher: Arc<dyn Researcher>,
        bus: Arc<MessageBus>,
        config: &MarathonConfig,
    ) -> Self {
        Self {
            orchestrator,
            researcher,
            bus,
            duration: Duration::from_secs(config.duration_hours * 3600),
            cycle_interval: Duration::from_secs(config.cycle_interval_secs),
            drift_threshold: config.drift_threshold,
            error_backoff: Duration::from_secs(config.error_backoff_secs),
        }
    }

    /// Test hook: shrink the wall-clock parameters.
    #[cfg(test)]
    fn with_timing(mut self, duration: Duration, cycle: Duration, backoff: Duration) -> Self {
        self.duration = duration;
        self.cycle_interval = cycle;
        self.error_backoff = backoff;
        self
    }

    /// Run the session to completion. Returns the orchestrator so the
    /// caller can inspect the final context.
    pub async fn run(mut self, mut stop: watch::Receiver<bool>) -> Result<Orchestrator> {
        let deadline = Instant::now() + self.duration;

        info!(
            duration_secs = self.duration.as_secs(),
            cycle_secs = self.cycle_interval.as_secs(),
            drift_threshold = self.drift_threshold,
            "Marathon session starting"
        );

        // The up-front pipeline run already writes its own failure
        // checkpoint; the marathon survives it like any cycle error.
        if let Err(e) = self.orchestrator.run_pipeline().await {
            error!(error = %e, "Initial pipeline run failed, marathon continues monitoring");
        }

        loop {
            let now = Instant::now();
            if now >= deadline {
                info!("Marathon duration expired");
                break;
            }

            let sleep_for = self.cycle_interval.min(deadline - now);
            tokio::select! {
                _ = tokio::time::sleep(sleep_for) => {}
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        info!("Marathon stop requested");
                        break;
                    }
                    continue;
                }
            }
            if Instant::now() >= deadline {
                info!("Marathon duration expired");
                break;
            }

            if let Err(e) = self.run_cycle().await {
                let cycle = self.orchestrator.context().cycle_count;
                error!(cycle, error = %e, "Marathon cycle failed, backing off");

                let checkpoint = Checkpoint::new(
                    "CYCLE_ERROR",
                    json!({"cycle": cycle, "error": e.to_string()}),
                    self.orchestrator.state(),
                );
                if let Err(store_err) = self.orchestrator.store().append_checkpoint(&checkpoint) {
                    error!(error = %store_err, "Failed to write cycle-error checkpoint");
                }

                tokio::select! {
                    _ = tokio::time::sleep(self.error_backoff) => {}
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            info!("Marathon stop requested during backoff");
                            break;
                        }
                    }
                }
            }
        }

        let context = self.orchestrator.context();
        self.orchestrator
            .store()
            .append_checkpoint(&Checkpoint::new(
                "SESSION_ENDED",
                json!({
                    "cycles": context.cycle_count,
                    "plan_version": context.plan_version,
                    "final_listing_count": context.previous_listing_count,
                }),
                self.orchestrator.state(),
            ))
            .context("Failed to write session-ended checkpoint")?;

        info!(
            cycles = context.cycle_count,
            plan_version = context.plan_version,
            "Marathon session ended"
        );
        Ok(self.orchestrator)
    }

    async fn run_cycle(&mut self) -> Result<()> {
        let (goal, region, cycle) = {
            let ctx = self.orchestrator.context_mut();
            ctx.cycle_count += 1;
            (ctx.goal.clone(), ctx.region.clone(), ctx.cycle_count)
        };
        debug!(cycle, "Marathon cycle starting");

        let snapshot = self
            .researcher
            .research(&goal, &region)
            .await
            .context("Cycle research failed")?;

        let new_count = snapshot.listing_count();
        let previous = self.orchestrator.context().previous_listing_count;
        let delta = new_count as i64 - previous as i64;

        let seen: HashSet<&String> = self
            .orchestrator
            .context()
            .trend_history
            .iter()
            .flat_map(|s| s.trends.iter())
            .collect();
        let new_trends: Vec<String> = snapshot
            .analysis
            .emerging_trends
            .iter()
            .filter(|t| !seen.contains(t))
            .cloned()
            .collect();

        {
            let ctx = self.orchestrator.context_mut();
            ctx.trend_history.push(TrendSample {
                timestamp: chrono::Utc::now(),
                listing_count: new_count,
                trends: snapshot.analysis.emerging_trends.clone(),
            });
            ctx.previous_listing_count = new_count;
            ctx.research = Some(snapshot);
        }

        if delta.abs() > self.drift_threshold {
            warn!(cycle, delta, previous, new_count, "Significant market shift detected");
            self.bus.publish(Message::new(
                "marathon",
                "planning",
                MessageKind::MarketShift,
                json!({"job_delta": delta, "new_trends": new_trends, "cycle": cycle}),
                MessagePriority::Urgent,
            ))?;
            self.self_correct(delta, &new_trends).await?;
        } else {
            debug!(cycle, delta, "Drift below threshold, absorbed");
        }

        let progress = self.orchestrator.store().load_user_progress()?;
        self.orchestrator
            .store()
            .append_checkpoint(&Checkpoint::new(
                "PROGRESS_CHECK",
                json!({
                    "cycle": cycle,
                    "listing_count": new_count,
                    "job_delta": delta,
                    "completed_milestones": progress.completed_milestones.len(),
                }),
                self.orchestrator.state(),
            ))?;
        self.bus.publish(Message::new(
            "marathon",
            "user",
            MessageKind::ProgressUpdate,
            json!({"cycle": cycle, "listing_count": new_count}),
            MessagePriority::Normal,
        ))?;

        Ok(())
    }

    /// Ask the planner to revise the plan after a market shift. A `None`
    /// from the planner means the drift was absorbed; a revision bumps
    /// the plan version by exactly one.
    async fn self_correct(&mut self, delta: i64, new_trends: &[String]) -> Result<()> {
        let Some(plan) = self.orchestrator.context().plan.clone() else {
            warn!("Market shift before any plan exists, nothing to correct");
            return Ok(());
        };

        let drift = DriftReport {
            job_delta: delta,
            new_trends: new_trends.to_vec(),
        };
        let score = self.orchestrator.context().last_verification_score();

        match self
            .orchestrator
            .planner()
            .adjust_plan(&plan, &drift, score)
            .await
            .context("Self-correction failed")?
        {
            Some(revised) => {
                let ctx = self.orchestrator.context_mut();
                ctx.record_correction(revised);
                let version = ctx.plan_version;

                self.orchestrator
                    .store()
                    .append_checkpoint(&Checkpoint::new(
                        "SELF_CORRECTION",
                        json!({"plan_version": version, "job_delta": delta}),
                        self.orchestrator.state(),
                    ))?;
                self.bus.publish(Message::new(
                    "marathon",
                    "user",
                    MessageKind::CorrectionApplied,
                    json!({"plan_version": version}),
                    MessagePriority::Normal,
                ))?;
                info!(plan_version = version, "Plan self-corrected");
            }
            None => debug!(delta, "Planner absorbed the drift, plan unchanged"),
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{Executor, Planner, Verifier};
    use crate::storage::CheckpointStore;
    use crate::types::{
        AdjustmentSuggestion, ExecutionArtifacts, Listing, MarketAnalysis, Plan, PipelineState,
        ResearchSnapshot, Schedule, UserProgress, VerificationReport,
    };
    use async_trait::async_trait;
    use serde_json::Value;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    // -- Test doubles ------------------------------------------------------

    struct MemoryStore {
        checkpoints: Mutex<Vec<Checkpoint>>,
    }

    impl MemoryStore {
        fn new() -> Self {
            Self {
                checkpoints: Mutex::new(Vec::new()),
            }
        }

        fn steps(&self) -> Vec<String> {
            self.checkpoints
                .lock()
                .unwrap()
                .iter()
                .map(|c| c.step.clone())
                .collect()
        }
    }

    impl CheckpointStore for MemoryStore {
        fn append_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()> {
            self.checkpoints.lock().unwrap().push(checkpoint.clone());
            Ok(())
        }
        fn load_latest_checkpoint(&self) -> Result<Option<Checkpoint>> {
            Ok(self.checkpoints.lock().unwrap().last().cloned())
        }
        fn load_user_progress(&self) -> Result<UserProgress> {
            Ok(UserProgress::default())
        }
    }

    fn snapshot_with(count: usize) -> ResearchSnapshot {
        let listings = (0..count)
            .map(|i| Listing {
                title: format!("Role {i}"),
                company: "TestCo".to_string(),
                region: "Kenya".to_string(),
                link: "#".to_string(),
                tags: vec![],
                description: String::new(),
                source: "test".to_string(),
                is_synthetic: false,
                posted_at: chrono::Utc::now(),
            })
            .collect();
        ResearchSnapshot {
            listings,
            analysis: MarketAnalysis::default(),
            predictions: None,
            multi_market: None,
            summary: String::new(),
        }
    }

    /// Researcher that replays a script of cycle outcomes, repeating the
    /// last entry forever.
    struct ScriptedResearcher {
        script: Mutex<VecDeque<Result<usize, ()>>>,
        last: Mutex<Result<usize, ()>>,
    }

    impl ScriptedResearcher {
        fn new(script: Vec<Result<usize, ()>>) -> Self {
            let last = script.last().cloned().unwrap_or(Ok(0));
            Self {
                script: Mutex::new(script.into()),
                last: Mutex::new(last),
            }
        }
    }

    #[async_trait]
    impl Researcher for ScriptedResearcher {
        async fn research(&self, _goal: &str, _region: &str) -> Result<ResearchSnapshot> {
            let next = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| self.last.lock().unwrap().clone());
            match next {
                Ok(count) => Ok(snapshot_with(count)),
                Err(()) => anyhow::bail!("simulated research outage"),
            }
        }
    }

    struct StubPlanner;

    #[async_trait]
    impl Planner for StubPlanner {
        async fn build_plan(&self, goal: &str, _research: &ResearchSnapshot) -> Result<Plan> {
            Ok(Plan {
                goal: goal.to_string(),
                milestones: vec![],
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
            revised.notes.push(format!("delta {}", drift.job_delta));
            Ok(Some(revised))
        }
        fn suggest_adjustment(&self, plan: &Plan, _score: f64) -> AdjustmentSuggestion {
            AdjustmentSuggestion {
                recommendation: String::new(),
                action: "maintain_schedule".to_string(),
                adjusted_weekly_hours: plan.weekly_hours,
            }
        }
    }

    struct StubExecutor;

    #[async_trait]
    impl Executor for StubExecutor {
        async fn execute(&self, _plan: &Plan) -> Result<ExecutionArtifacts> {
            Ok(ExecutionArtifacts {
                resources: vec![],
                schedule: Schedule::default(),
            })
        }
    }

    struct StubVerifier;

    #[async_trait]
    impl Verifier for StubVerifier {
        async fn verify(
            &self,
            _plan: &Plan,
            _artifacts: &ExecutionArtifacts,
        ) -> Result<VerificationReport> {
            Ok(VerificationReport {
                overall_score: 0.9,
                quiz: Value::Null,
                mock_interview: Value::Null,
                status: "ON_TRACK".to_string(),
                runtime_errors: 0,
            })
        }
    }

    fn runner(
        store: Arc<MemoryStore>,
        bus: Arc<MessageBus>,
        cycle_script: Vec<Result<usize, ()>>,
    ) -> MarathonRunner {
        let orchestrator = Orchestrator::new(
            "Backend Developer",
            "Kenya",
            Arc::new(ScriptedResearcher::new(vec![Ok(10)])),
            Arc::new(StubPlanner),
            Arc::new(StubExecutor),
            Arc::new(StubVerifier),
            store,
        );
        let config = MarathonConfig {
            duration_hours: 72,
            cycle_interval_secs: 1800,
            drift_threshold: 5,
            error_backoff_secs: 60,
        };
        MarathonRunner::new(
            orchestrator,
            Arc::new(ScriptedResearcher::new(cycle_script)),
            bus,
            &config,
        )
        .with_timing(
            Duration::from_millis(250),
            Duration::from_millis(20),
            Duration::from_millis(10),
        )
    }

    fn stop_channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
        watch::channel(false)
    }

    // -- Tests -------------------------------------------------------------

    #[tokio::test]
    async fn test_survives_cycle_errors() {
        let store = Arc::new(MemoryStore::new());
        let bus = Arc::new(MessageBus::new());
        // Second cycle blows up; the loop must keep going.
        let runner = runner(
            store.clone(),
            bus,
            vec![Ok(10), Err(()), Ok(10), Ok(10)],
        );

        let (_stop_tx, stop_rx) = stop_channel();
        let orchestrator = runner.run(stop_rx).await.unwrap();

        let steps = store.steps();
        assert!(steps.contains(&"CYCLE_ERROR".to_string()));
        assert_eq!(steps.last().map(String::as_str), Some("SESSION_ENDED"));
        // Cycles after the error still ran.
        assert!(orchestrator.context().cycle_count >= 3);
    }

    #[tokio::test]
    async fn test_drift_triggers_urgent_message_and_correction() {
        let store = Arc::new(MemoryStore::new());
        let bus = Arc::new(MessageBus::new());
        // Pipeline research found 10 listings; first cycle finds 20.
        let runner = runner(store.clone(), bus.clone(), vec![Ok(20)]);

        let (_stop_tx, stop_rx) = stop_channel();
        let orchestrator = runner.run(stop_rx).await.unwrap();

        let shifts = bus.by_kind(MessageKind::MarketShift);
        assert!(!shifts.is_empty());
        assert_eq!(shifts[0].priority, MessagePriority::Urgent);
        assert_eq!(shifts[0].payload["job_delta"], 10);

        // First drift bumps the version 1 -> 2; later cycles see a
        // stable count of 20 and leave it alone.
        assert_eq!(orchestrator.context().plan_version, 2);
        assert!(store.steps().contains(&"SELF_CORRECTION".to_string()));
        assert!(!bus.by_kind(MessageKind::CorrectionApplied).is_empty());
    }

    #[tokio::test]
    async fn test_subthreshold_drift_absorbed() {
        let store = Arc::new(MemoryStore::new());
        let bus = Arc::new(MessageBus::new());
        // 10 -> 13 is a delta of 3, below the threshold of 5.
        let runner = runner(store.clone(), bus.clone(), vec![Ok(13)]);

        let (_stop_tx, stop_rx) = stop_channel();
        let orchestrator = runner.run(stop_rx).await.unwrap();

        assert!(bus.by_kind(MessageKind::MarketShift).is_empty());
        assert_eq!(orchestrator.context().plan_version, 1);
        assert!(!store.steps().contains(&"SELF_CORRECTION".to_string()));
        // Progress checkpoints were still written every cycle.
        assert!(store.steps().contains(&"PROGRESS_CHECK".to_string()));
    }

    #[tokio::test]
    async fn test_stop_signal_ends_session() {
        let store = Arc::new(MemoryStore::new());
        let bus = Arc::new(MessageBus::new());
        let runner = runner(store.clone(), bus, vec![Ok(10)]);

        let (stop_tx, stop_rx) = stop_channel();
        let handle = tokio::spawn(runner.run(stop_rx));
        tokio::time::sleep(Duration::from_millis(50)).await;
        stop_tx.send(true).unwrap();

        let orchestrator = handle.await.unwrap().unwrap();
        assert_eq!(
            store.steps().last().map(String::as_str),
            Some("SESSION_ENDED"),
        );
        // Stopped early: well under the 250ms worth of cycles.
        assert!(orchestrator.context().cycle_count < 12);
    }

    #[tokio::test]
    async fn test_trend_history_grows_per_cycle() {
        let store = Arc::new(MemoryStore::new());
        let bus = Arc::new(MessageBus::new());
        let runner = runner(store, bus, vec![Ok(10)]);

        let (_stop_tx, stop_rx) = stop_channel();
        let orchestrator = runner.run(stop_rx).await.unwrap();

        let ctx = orchestrator.context();
        // One sample from the pipeline run plus one per cycle.
        assert_eq!(ctx.trend_history.len() as u64, ctx.cycle_count + 1);
        assert_eq!(orchestrator.state(), PipelineState::Completed);
    }
}
