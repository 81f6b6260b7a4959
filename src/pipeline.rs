//! Pipeline state machine.
//!
//! Drives one session through IDLE -> RESEARCHING -> PLANNING ->
//! EXECUTING -> VERIFYING -> ADJUSTING -> COMPLETED. Transitions are
//! strictly sequential; any stage error moves the machine to FAILED,
//! writes a failure checkpoint, and re-raises to the caller. Earlier
//! stage outputs stay in the context for post-mortem inspection.

use anyhow::{Context, Result};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

use crate::agents::{Executor, Planner, Researcher, Verifier};
use crate::storage::CheckpointStore;
use crate::tournament::TournamentScheduler;
use crate::types::{
    Checkpoint, PipelineContext, PipelineState, ResearchSnapshot, StrideError, TrendSample,
};

pub struct Orchestrator {
    researcher: Arc<dyn Researcher>,
    planner: Arc<dyn Planner>,
    executor: Arc<dyn Executor>,
    verifier: Arc<dyn Verifier>,
    store: Arc<dyn CheckpointStore>,
    /// When set, the research stage runs as a tournament instead of a
    /// single research pass.
    tournament: Option<(Arc<TournamentScheduler>, usize)>,
    state: PipelineState,
    context: PipelineContext,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        goal: &str,
        region: &str,
        researcher: Arc<dyn Researcher>,
        planner: Arc<dyn Planner>,
        executor: Arc<dyn Executor>,
        verifier: Arc<dyn Verifier>,
        store: Arc<dyn CheckpointStore>,
    ) -> Self {
        Self {
            researcher,
            planner,
            executor,
            verifier,
            store,
            tournament: None,
            state: PipelineState::Idle,
            context: PipelineContext::new(goal, region),
        }
    }

    /// Enable tournament-mode research with the given agent count.
    pub fn with_tournament(mut self, scheduler: Arc<TournamentScheduler>, agents: usize) -> Self {
        self.tournament = Some((scheduler, agents));
        self
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn context(&self) -> &PipelineContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut PipelineContext {
        &mut self.context
    }

    pub fn planner(&self) -> Arc<dyn Planner> {
        self.planner.clone()
    }

    pub fn store(&self) -> Arc<dyn CheckpointStore> {
        self.store.clone()
    }

    fn transition(&mut self, state: PipelineState) {
        info!(from = %self.state, to = %state, "Pipeline transition");
        self.state = state;
    }

    fn checkpoint(&self, step: &str, metadata: serde_json::Value) -> Result<()> {
        self.store
            .append_checkpoint(&Checkpoint::new(step, metadata, self.state))
    }

    /// Run the full pipeline once. All-or-nothing: on any stage error the
    /// state becomes FAILED, a failure checkpoint is written, and the
    /// error is returned to the caller.
    pub async fn run_pipeline(&mut self) -> Result<()> {
        match self.run_stages().await {
            Ok(()) => Ok(()),
            Err(e) => {
                let failed_stage = self.state;
                self.transition(PipelineState::Failed);
                // Flatten the whole context chain so the checkpoint keeps
                // the original cause, not just the stage wrapper.
                let chain = format!("{e:#}");
                let checkpoint = Checkpoint::new(
                    "PIPELINE_FAILED",
                    json!({"stage": failed_stage.to_string(), "error": chain.as_str()}),
                    PipelineState::Failed,
                );
                if let Err(store_err) = self.store.append_checkpoint(&checkpoint) {
                    error!(error = %store_err, "Failed to write failure checkpoint");
                }
                Err(StrideError::Pipeline {
                    stage: failed_stage.to_string(),
                    message: chain,
                }
                .into())
            }
        }
    }

    async fn run_stages(&mut self) -> Result<()> {
        let goal = self.context.goal.clone();
        let region = self.context.region.clone();

        // -- Researching --
        self.transition(PipelineState::Researching);
        let snapshot = self.run_research(&goal, &region).await?;
        self.context.previous_listing_count = snapshot.listing_count();
        self.context.trend_history.push(TrendSample {
            timestamp: chrono::Utc::now(),
            listing_count: snapshot.listing_count(),
            trends: snapshot.analysis.emerging_trends.clone(),
        });
        self.checkpoint(
            "RESEARCH_COMPLETE",
            json!({
                "jobs_analyzed": snapshot.listing_count(),
                "synthetic": snapshot.listings.iter().any(|l| l.is_synthetic),
                "skills": snapshot.analysis.top_skills,
            }),
        )?;
        self.context.research = Some(snapshot);

        // -- Planning --
        self.transition(PipelineState::Planning);
        let research = self
            .context
            .research
            .as_ref()
            .context("Research snapshot missing before planning")?;
        let plan = self
            .planner
            .build_plan(&goal, research)
            .await
            .context("Planning stage failed")?;
        self.checkpoint(
            "PLANNING_COMPLETE",
            json!({"milestones": plan.milestones.len(), "weekly_hours": plan.weekly_hours}),
        )?;
        self.context.plan = Some(plan.clone());

        // -- Executing --
        self.transition(PipelineState::Executing);
        let artifacts = self
            .executor
            .execute(&plan)
            .await
            .context("Execution stage failed")?;
        self.checkpoint(
            "EXECUTION_COMPLETE",
            json!({
                "resources": artifacts.resources.len(),
                "sprints": artifacts.schedule.sprints.len(),
            }),
        )?;
        self.context.artifacts = Some(artifacts.clone());

        // -- Verifying --
        self.transition(PipelineState::Verifying);
        let report = self
            .verifier
            .verify(&plan, &artifacts)
            .await
            .context("Verification stage failed")?;
        self.checkpoint(
            "VERIFICATION_COMPLETE",
            json!({"overall_score": report.overall_score, "status": report.status}),
        )?;
        self.context.verification = Some(report.clone());

        // -- Adjusting: the suggestion is recorded, never auto-applied --
        self.transition(PipelineState::Adjusting);
        let suggestion = self.planner.suggest_adjustment(&plan, report.overall_score);
        self.checkpoint(
            "ADJUSTMENT_SUGGESTED",
            json!({"action": suggestion.action, "hours": suggestion.adjusted_weekly_hours}),
        )?;
        self.context.suggested_adjustment = Some(suggestion);

        // -- Completed --
        self.transition(PipelineState::Completed);
        self.checkpoint("PIPELINE_COMPLETE", json!({"goal": goal}))?;
        info!(goal, "Pipeline run complete");
        Ok(())
    }

    async fn run_research(&self, goal: &str, region: &str) -> Result<ResearchSnapshot> {
        match &self.tournament {
            Some((scheduler, agents)) => {
                let outcome = scheduler
                    .run_tournament(goal, region, *agents)
                    .await
                    .context("Tournament research failed")?;
                info!(
                    winner = %outcome.report.winner_strategy,
                    score = outcome.report.winner_score,
                    "Tournament research selected winner"
                );
                Ok(outcome.snapshot)
            }
            None => self
                .researcher
                .research(goal, region)
                .await
                .context("Research stage failed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
