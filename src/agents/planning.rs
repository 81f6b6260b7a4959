//! Planning agent.
//!
//! Builds the learning plan from a research snapshot and revises it when
//! the marathon loop reports market drift. Sub-threshold drift is
//! silently absorbed: `adjust_plan` returns `None` and the caller keeps
//! the current plan and version.

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use super::Planner;
use crate::reasoning::{ReasoningRequest, ReasoningService};
use crate::types::{AdjustmentSuggestion, DriftReport, Milestone, Plan, ResearchSnapshot};

/// Listing-count delta below which drift alone never forces a revision.
const DRIFT_GATE_DELTA: i64 = 5;
/// Verification score above which a healthy plan is left alone.
const DRIFT_GATE_SCORE: f64 = 0.8;

const DEFAULT_WEEKLY_HOURS: u32 = 10;

/// Wire shape of a reasoning-produced plan.
#[derive(Debug, Deserialize)]
struct PlanDoc {
    #[serde(default)]
    milestones: Vec<Milestone>,
    #[serde(default)]
    weekly_hours: Option<u32>,
    #[serde(default)]
    notes: Vec<String>,
}

pub struct PlanningAgent {
    reasoning: Arc<dyn ReasoningService>,
}

impl PlanningAgent {
    pub fn new(reasoning: Arc<dyn ReasoningService>) -> Self {
        Self { reasoning }
    }

    fn parse_plan(goal: &str, value: serde_json::Value) -> Option<Plan> {
        let doc: PlanDoc = serde_json::from_value(value).ok()?;
        if doc.milestones.is_empty() {
            return None;
        }
        Some(Plan {
            goal: goal.to_string(),
            milestones: doc.milestones,
            weekly_hours: doc.weekly_hours.unwrap_or(DEFAULT_WEEKLY_HOURS),
            notes: doc.notes,
        })
    }

    /// Template plan used when the reasoning service cannot produce one.
    fn fallback_plan(goal: &str, research: &ResearchSnapshot) -> Plan {
        let skills = &research.analysis.top_skills;
        let first = skills.iter().take(3).cloned().collect::<Vec<_>>();
        let rest = skills.iter().skip(3).take(3).cloned().collect::<Vec<_>>();

        Plan {
            goal: goal.to_string(),
            milestones: vec![
                Milestone {
                    month: 1,
                    title: "Foundations".to_string(),
                    focus: first,
                    tasks: vec![
                        "Complete an introductory course".to_string(),
                        "Build one small practice project".to_string(),
                    ],
                },
                Milestone {
                    month: 3,
                    title: "Applied projects".to_string(),
                    focus: rest,
                    tasks: vec![
                        "Ship a portfolio project".to_string(),
                        "Contribute to an open-source repository".to_string(),
                    ],
                },
                Milestone {
                    month: 5,
                    title: "Market entry".to_string(),
                    focus: vec![],
                    tasks: vec![
                        "Polish portfolio and profile".to_string(),
                        "Apply to matching openings weekly".to_string(),
                    ],
                },
            ],
            weekly_hours: DEFAULT_WEEKLY_HOURS,
            notes: vec!["Template plan: reasoning service was unavailable".to_string()],
        }
    }
}

#[async_trait]
impl Planner for PlanningAgent {
    async fn build_plan(&self, goal: &str, research: &ResearchSnapshot) -> Result<Plan> {
        let prompt = format!(
            "Create a 6-month learning plan for the goal \"{goal}\". \
             Market skills in demand: {:?}. Emerging trends: {:?}. \
             Respond with JSON: {{\"milestones\": [{{\"month\": n, \"title\": \"...\", \
             \"focus\": [...], \"tasks\": [...]}}], \"weekly_hours\": n, \"notes\": [...]}}",
            research.analysis.top_skills, research.analysis.emerging_trends,
        );

        let plan = match self.reasoning.generate(&ReasoningRequest::json(&prompt)).await {
            Ok(value) => Self::parse_plan(goal, value)
                .unwrap_or_else(|| Self::fallback_plan(goal, research)),
            Err(e) => {
                warn!(goal, error = %e, "Plan generation failed, using template plan");
                Self::fallback_plan(goal, research)
            }
        };

        info!(
            goal,
            milestones = plan.milestones.len(),
            weekly_hours = plan.weekly_hours,
            "Plan built"
        );
        Ok(plan)
    }

    async fn adjust_plan(
        &self,
        plan: &Plan,
        drift: &DriftReport,
        verification_score: f64,
    ) -> Result<Option<Plan>> {
        let gated = drift.new_trends.is_empty()
            && drift.job_delta.abs() < DRIFT_GATE_DELTA
            && verification_score > DRIFT_GATE_SCORE;
        if gated {
            info!(
                job_delta = drift.job_delta,
                verification_score, "Drift below revision gate, keeping plan"
            );
            return Ok(None);
        }

        let prompt = format!(
            "Revise this learning plan after a market shift. Plan: {}. \
             Listing count changed by {} and new trends appeared: {:?}. \
             Last assessment score: {verification_score:.2}. \
             Respond with the full revised plan as JSON: {{\"milestones\": [...], \
             \"weekly_hours\": n, \"notes\": [...]}}",
            serde_json::to_string(plan)?,
            drift.job_delta,
            drift.new_trends,
        );

        let revised = match self.reasoning.generate(&ReasoningRequest::json(&prompt)).await {
            Ok(value) => Self::parse_plan(&plan.goal, value),
            Err(e) => {
                warn!(goal = %plan.goal, error = %e, "Plan revision failed, annotating in place");
                None
            }
        };

        // Minimal in-place revision when the reasoning service cannot
        // produce a full rewrite: the correction still has to happen.
        let revised = revised.unwrap_or_else(|| {
            let mut plan = plan.clone();
            plan.notes.push(format!(
                "Revised after market shift: listing delta {}, new trends {:?}",
                drift.job_delta, drift.new_trends,
            ));
            if let (Some(milestone), Some(trend)) =
                (plan.milestones.first_mut(), drift.new_trends.first())
            {
                if !milestone.focus.contains(trend) {
                    milestone.focus.push(trend.clone());
                }
            }
            plan
        });

        info!(goal = %plan.goal, job_delta = drift.job_delta, "Plan revised after drift");
        Ok(Some(revised))
    }

    fn suggest_adjustment(&self, plan: &Plan, verification_score: f64) -> AdjustmentSuggestion {
        if verification_score >= 0.8 {
            AdjustmentSuggestion {
                recommendation: "Strong results, increase pace".to_string(),
                action: "advance_to_next_milestone".to_string(),
                adjusted_weekly_hours: plan.weekly_hours + 2,
            }
        } else if verification_score >= 0.5 {
            AdjustmentSuggestion {
                recommendation: "On track, keep the current schedule".to_string(),
                action: "maintain_schedule".to_string(),
                adjusted_weekly_hours: plan.weekly_hours,
            }
        } else {
            AdjustmentSuggestion {
                recommendation: "Results below target, revisit fundamentals".to_string(),
                action: "repeat_current_milestone".to_string(),
                adjusted_weekly_hours: plan.weekly_hours.saturating_sub(2).max(4),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
