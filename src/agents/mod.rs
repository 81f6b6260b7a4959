//! Worker agents behind the pipeline stages.
//!
//! Each stage of the orchestrator delegates to one of these traits.
//! Concrete agents live in the submodules and lean on the reasoning
//! service with documented fallbacks; tests substitute scripted fakes.

pub mod execution;
pub mod planning;
pub mod research;
pub mod verification;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::{
    AdjustmentSuggestion, DriftReport, ExecutionArtifacts, Plan, ResearchSnapshot,
    VerificationReport,
};

/// Produces the market view a session is planned against.
#[async_trait]
pub trait Researcher: Send + Sync {
    async fn research(&self, goal: &str, region: &str) -> Result<ResearchSnapshot>;
}

/// Builds and revises learning plans.
#[async_trait]
pub trait Planner: Send + Sync {
    async fn build_plan(&self, goal: &str, research: &ResearchSnapshot) -> Result<Plan>;

    /// Revise a plan after market drift. Returns `None` when the drift
    /// is too small to warrant a correction (the no-op gate).
    async fn adjust_plan(
        &self,
        plan: &Plan,
        drift: &DriftReport,
        verification_score: f64,
    ) -> Result<Option<Plan>>;

    /// Suggest (never apply) a pacing adjustment from the verification
    /// outcome.
    fn suggest_adjustment(&self, plan: &Plan, verification_score: f64) -> AdjustmentSuggestion;
}

/// Turns a plan into concrete artifacts.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, plan: &Plan) -> Result<ExecutionArtifacts>;
}

/// Assesses the produced artifacts. Failures here are not recovered;
/// the pipeline run fails.
#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verify(&self, plan: &Plan, artifacts: &ExecutionArtifacts)
        -> Result<VerificationReport>;
}
