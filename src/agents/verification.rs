//! Verification agent.
//!
//! Generates an assessment (quiz plus mock interview) for the executed
//! plan and scores it. Unlike the other agents this one has no local
//! fallback: a failed verification fails the pipeline run.
//!
//! Resource checks are currently syntax-only, so `runtime_errors` is
//! always reported as zero.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use super::Verifier;
use crate::reasoning::{ReasoningRequest, ReasoningService};
use crate::types::{ExecutionArtifacts, Plan, StrideError, VerificationReport};

/// Score at or above which a plan is considered on track.
const PASS_THRESHOLD: f64 = 0.6;

pub struct VerificationAgent {
    reasoning: Arc<dyn ReasoningService>,
}

impl VerificationAgent {
    pub fn new(reasoning: Arc<dyn ReasoningService>) -> Self {
        Self { reasoning }
    }

    fn parse_report(value: Value) -> Result<VerificationReport> {
        let overall_score = value
            .get("overall_score")
            .and_then(|s| s.as_f64())
            .context("Verification response missing overall_score")?
            .clamp(0.0, 1.0);

        let status = if overall_score >= PASS_THRESHOLD {
            "ON_TRACK"
        } else {
            "NEEDS_REVIEW"
        };

        Ok(VerificationReport {
            overall_score,
            quiz: value.get("quiz").cloned().unwrap_or(Value::Null),
            mock_interview: value.get("mock_interview").cloned().unwrap_or(Value::Null),
            status: status.to_string(),
            runtime_errors: 0,
        })
    }
}

#[async_trait]
impl Verifier for VerificationAgent {
    async fn verify(
        &self,
        plan: &Plan,
        artifacts: &ExecutionArtifacts,
    ) -> Result<VerificationReport> {
        let focus: Vec<&str> = plan
            .milestones
            .iter()
            .flat_map(|m| m.focus.iter().map(String::as_str))
            .collect();
        let prompt = format!(
            "Assess readiness for the goal \"{}\". Focus areas: {focus:?}. \
             Planned resources: {}. Respond with JSON: {{\"overall_score\": 0.0-1.0, \
             \"quiz\": {{\"questions\": [...]}}, \"mock_interview\": {{\"questions\": [...]}}}}",
            plan.goal,
            artifacts.resources.len(),
        );

        let value = self
            .reasoning
            .generate(&ReasoningRequest::json(&prompt))
            .await
            .map_err(|e| StrideError::Reasoning {
                model: self.reasoning.model_name().to_string(),
                message: e.to_string(),
            })
            .context("Verification assessment generation failed")?;

        let report = Self::parse_report(value)?;
        info!(
            goal = %plan.goal,
            score = report.overall_score,
            status = %report.status,
            "Verification complete"
        );
        Ok(report)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
