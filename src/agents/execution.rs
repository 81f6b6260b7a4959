//! Execution agent.
//!
//! Turns a plan into concrete artifacts: learning resource suggestions
//! (via the reasoning service, with a templated fallback) and a weekly
//! sprint schedule derived deterministically from the plan.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use super::Executor;
use crate::reasoning::{ReasoningRequest, ReasoningService};
use crate::types::{ExecutionArtifacts, Plan, ResourceSuggestion, Schedule, Sprint};

/// Weeks scheduled per plan milestone.
const WEEKS_PER_MILESTONE: u32 = 4;

pub struct ExecutionAgent {
    reasoning: Arc<dyn ReasoningService>,
}

impl ExecutionAgent {
    pub fn new(reasoning: Arc<dyn ReasoningService>) -> Self {
        Self { reasoning }
    }

    async fn suggest_resources(&self, plan: &Plan) -> Vec<ResourceSuggestion> {
        let milestones: Vec<&str> = plan.milestones.iter().map(|m| m.title.as_str()).collect();
        let prompt = format!(
            "Suggest one high-quality learning resource per milestone for the goal \
             \"{}\". Milestones: {milestones:?}. Respond with a JSON array of objects \
             with keys \"milestone\", \"name\" and \"platform\".",
            plan.goal,
        );

        match self.reasoning.generate(&ReasoningRequest::json(&prompt)).await {
            Ok(serde_json::Value::Array(items)) if !items.is_empty() => items
                .iter()
                .filter_map(|item| {
                    Some(ResourceSuggestion {
                        milestone: item.get("milestone")?.as_str()?.to_string(),
                        name: item.get("name")?.as_str()?.to_string(),
                        platform: item
                            .get("platform")
                            .and_then(|p| p.as_str())
                            .unwrap_or("web")
                            .to_string(),
                    })
                })
                .collect(),
            Ok(_) | Err(_) => {
                warn!(goal = %plan.goal, "Resource suggestion failed, using search templates");
                Self::fallback_resources(plan)
            }
        }
    }

    fn fallback_resources(plan: &Plan) -> Vec<ResourceSuggestion> {
        plan.milestones
            .iter()
            .map(|m| ResourceSuggestion {
                milestone: m.title.clone(),
                name: format!("Search: best {} course for {}", m.title.to_lowercase(), plan.goal),
                platform: "web".to_string(),
            })
            .collect()
    }

    /// Sprint schedule derived directly from the plan. Every milestone
    /// gets a fixed block of weeks at the plan's weekly time budget.
    fn build_schedule(plan: &Plan) -> Schedule {
        let mut sprints = Vec::new();
        let mut week = 1;

        for milestone in &plan.milestones {
            for _ in 0..WEEKS_PER_MILESTONE {
                sprints.push(Sprint {
                    week,
                    title: format!("Week {week}: {}", milestone.title),
                    focus_area: milestone
                        .focus
                        .first()
                        .cloned()
                        .unwrap_or_else(|| milestone.title.clone()),
                    total_minutes: plan.weekly_hours * 60,
                });
                week += 1;
            }
        }

        Schedule { sprints }
    }
}

#[async_trait]
impl Executor for ExecutionAgent {
    async fn execute(&self, plan: &Plan) -> Result<ExecutionArtifacts> {
        let resources = self.suggest_resources(plan).await;
        let schedule = Self::build_schedule(plan);

        info!(
            goal = %plan.goal,
            resources = resources.len(),
            sprints = schedule.sprints.len(),
            "Execution artifacts built"
        );

        Ok(ExecutionArtifacts {
            resources,
            schedule,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
