//! Shared types for the STRIDE agent.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that source, market, agent,
//! and orchestration modules can depend on them without circular
//! references.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Message priority. Priority never reorders the queue; it only drives
/// post-delivery side effects (escalation logging).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessagePriority {
    Normal,
    Urgent,
    Critical,
}

impl MessagePriority {
    /// Whether this priority requires an escalation side effect on dispatch.
    pub fn escalates(&self) -> bool {
        matches!(self, MessagePriority::Urgent | MessagePriority::Critical)
    }
}

impl fmt::Display for MessagePriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessagePriority::Normal => write!(f, "NORMAL"),
            MessagePriority::Urgent => write!(f, "URGENT"),
            MessagePriority::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Closed set of message kinds exchanged between workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    /// Significant listing-count delta detected by the marathon loop.
    MarketShift,
    /// Plan revised in place after a self-correction pass.
    CorrectionApplied,
    /// Periodic user-progress notification.
    ProgressUpdate,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::MarketShift => write!(f, "MARKET_SHIFT"),
            MessageKind::CorrectionApplied => write!(f, "CORRECTION_APPLIED"),
            MessageKind::ProgressUpdate => write!(f, "PROGRESS_UPDATE"),
        }
    }
}

/// A message passed between workers. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub sender: String,
    pub recipient: String,
    pub kind: MessageKind,
    /// Opaque structured payload.
    pub payload: Value,
    pub priority: MessagePriority,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(
        sender: &str,
        recipient: &str,
        kind: MessageKind,
        payload: Value,
        priority: MessagePriority,
    ) -> Self {
        Self {
            sender: sender.to_string(),
            recipient: recipient.to_string(),
            kind,
            payload,
            priority,
            created_at: Utc::now(),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} -> {}: {}",
            self.priority, self.sender, self.recipient, self.kind,
        )
    }
}

// ---------------------------------------------------------------------------
// Listings
// ---------------------------------------------------------------------------

/// A raw posting as returned by a listing source, before normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawListing {
    pub title: String,
    pub company: String,
    pub link: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

/// A normalized job listing, uniform across all sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub title: String,
    pub company: String,
    pub region: String,
    pub link: String,
    pub tags: Vec<String>,
    pub description: String,
    pub source: String,
    /// True when the listing was generated by the reasoning service
    /// because every real source came back empty.
    pub is_synthetic: bool,
    pub posted_at: DateTime<Utc>,
}

impl fmt::Display for Listing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = if self.is_synthetic { " (synthetic)" } else { "" };
        write!(
            f,
            "{} @ {} [{} via {}]{}",
            self.title, self.company, self.region, self.source, flag,
        )
    }
}

// ---------------------------------------------------------------------------
// Salary & market snapshots
// ---------------------------------------------------------------------------

/// A parsed salary range. Min/max/avg always travel together so the
/// fallback rules (single value, unparsable) stay in one place.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SalaryRange {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

impl SalaryRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            avg: (min + max) / 2.0,
        }
    }

    /// Scale every component by a fixed multiplier (currency conversion).
    pub fn scaled(&self, rate: f64) -> Self {
        Self {
            min: self.min * rate,
            max: self.max * rate,
            avg: self.avg * rate,
        }
    }
}

impl fmt::Display for SalaryRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.0}-{:.0} (avg {:.0})", self.min, self.max, self.avg)
    }
}

/// Insights for one query/region pair from a single aggregation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketInsights {
    pub listings: Vec<Listing>,
    pub trends: Vec<String>,
    /// Free-text salary estimate as supplied by the reasoning service.
    pub salary_range: String,
}

/// One region's analysed market state within a multi-region pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub region: String,
    pub currency: String,
    pub listings: Vec<Listing>,
    pub trends: Vec<String>,
    /// Salary in the region's local currency.
    pub salary_local: SalaryRange,
    /// Salary converted to the common reference currency (USD).
    pub salary_usd: SalaryRange,
    /// min(1, listings/50) + min(0.5, trends x 0.1)
    pub demand_score: f64,
}

/// A region whose normalized compensation clears the arbitrage threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbitrageOpportunity {
    pub region: String,
    pub job_title: String,
    pub salary_usd: f64,
    /// min(10, avg salary / 10_000)
    pub opportunity_score: f64,
    pub description: String,
}

/// A skill priced away from its cross-region mean in one region.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillValueEntry {
    pub skill: String,
    pub region: String,
    /// Region value over cross-region mean, rounded to 2 decimals.
    pub value_ratio: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkillArbitrage {
    pub undervalued: Vec<SkillValueEntry>,
    pub overvalued: Vec<SkillValueEntry>,
}

/// Strategic recommendation synthesised from a multi-region pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketStrategy {
    pub recommended_opportunities: Vec<ArbitrageOpportunity>,
    pub skill_focus: Vec<String>,
    pub migration_strategy: String,
    pub timeline: String,
    pub risk_assessment: String,
    pub confidence: f64,
}

/// Full report from a multi-region analysis pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiMarketReport {
    pub query: String,
    pub primary_region: String,
    pub snapshots: Vec<MarketSnapshot>,
    pub arbitrage_opportunities: Vec<ArbitrageOpportunity>,
    pub skill_arbitrage: SkillArbitrage,
    pub strategy: MarketStrategy,
    pub regions_analyzed: usize,
    pub generated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Research
// ---------------------------------------------------------------------------

/// Skills/trends extracted from listings by the reasoning service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketAnalysis {
    #[serde(default)]
    pub top_skills: Vec<String>,
    #[serde(default)]
    pub experience_required: String,
    #[serde(default)]
    pub emerging_trends: Vec<String>,
}

/// Forecast of skill demand velocity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketPredictions {
    #[serde(default)]
    pub rising: Vec<String>,
    #[serde(default)]
    pub stable: Vec<String>,
    #[serde(default)]
    pub declining: Vec<String>,
}

/// Output of one research pass: the latest view of the market.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchSnapshot {
    pub listings: Vec<Listing>,
    pub analysis: MarketAnalysis,
    pub predictions: Option<MarketPredictions>,
    pub multi_market: Option<MultiMarketReport>,
    pub summary: String,
}

impl ResearchSnapshot {
    pub fn listing_count(&self) -> usize {
        self.listings.len()
    }

    pub fn has_predictions(&self) -> bool {
        self.predictions.is_some()
    }
}

// ---------------------------------------------------------------------------
// Plan / execution / verification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Milestone {
    pub month: u32,
    pub title: String,
    pub focus: Vec<String>,
    pub tasks: Vec<String>,
}

/// A learning plan. Versioning lives on the `PipelineContext`, not here:
/// the plan itself is replaced wholesale on self-correction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub goal: String,
    pub milestones: Vec<Milestone>,
    pub weekly_hours: u32,
    #[serde(default)]
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sprint {
    pub week: u32,
    pub title: String,
    pub focus_area: String,
    pub total_minutes: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schedule {
    pub sprints: Vec<Sprint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSuggestion {
    pub milestone: String,
    pub name: String,
    pub platform: String,
}

/// Everything the execution stage produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionArtifacts {
    pub resources: Vec<ResourceSuggestion>,
    pub schedule: Schedule,
}

/// Result of the verification stage.
///
/// Quiz and interview content is opaque generated material, preserved
/// as raw JSON for audit and never interpreted by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    /// 0.0-1.0 assessment score.
    pub overall_score: f64,
    pub quiz: Value,
    pub mock_interview: Value,
    pub status: String,
    /// Resource checks are syntax-only for now, so this stays zero
    /// until real execution depth lands.
    pub runtime_errors: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustmentSuggestion {
    pub recommendation: String,
    pub action: String,
    pub adjusted_weekly_hours: u32,
}

/// What actually changed between two market snapshots, handed to the
/// planner when a correction is requested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftReport {
    pub job_delta: i64,
    pub new_trends: Vec<String>,
}

// ---------------------------------------------------------------------------
// Pipeline state & context
// ---------------------------------------------------------------------------

/// Orchestrator lifecycle state. Strictly sequential; any state can
/// transition to `Failed` on unhandled error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineState {
    Idle,
    Researching,
    Planning,
    Executing,
    Verifying,
    Adjusting,
    Completed,
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Idle => write!(f, "IDLE"),
            PipelineState::Researching => write!(f, "RESEARCHING"),
            PipelineState::Planning => write!(f, "PLANNING"),
            PipelineState::Executing => write!(f, "EXECUTING"),
            PipelineState::Verifying => write!(f, "VERIFYING"),
            PipelineState::Adjusting => write!(f, "ADJUSTING"),
            PipelineState::Completed => write!(f, "COMPLETED"),
            PipelineState::Failed => write!(f, "FAILED"),
        }
    }
}

/// One timestamped point in the market trend history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendSample {
    pub timestamp: DateTime<Utc>,
    pub listing_count: usize,
    pub trends: Vec<String>,
}

/// Mutable per-session aggregate. Owned exclusively by one orchestrator,
/// never shared across sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineContext {
    pub goal: String,
    pub region: String,
    pub research: Option<ResearchSnapshot>,
    pub plan: Option<Plan>,
    pub artifacts: Option<ExecutionArtifacts>,
    pub verification: Option<VerificationReport>,
    pub suggested_adjustment: Option<AdjustmentSuggestion>,
    /// Marathon cycles completed so far. Monotonically increasing.
    pub cycle_count: u64,
    /// Increases by exactly 1 per self-correction, never decreases.
    pub plan_version: u32,
    pub previous_listing_count: usize,
    pub trend_history: Vec<TrendSample>,
}

impl PipelineContext {
    pub fn new(goal: &str, region: &str) -> Self {
        Self {
            goal: goal.to_string(),
            region: region.to_string(),
            research: None,
            plan: None,
            artifacts: None,
            verification: None,
            suggested_adjustment: None,
            cycle_count: 0,
            plan_version: 1,
            previous_listing_count: 0,
            trend_history: Vec::new(),
        }
    }

    /// Replace the plan after a self-correction and bump the version.
    pub fn record_correction(&mut self, plan: Plan) {
        self.plan = Some(plan);
        self.plan_version += 1;
    }

    /// Last verification score, or 0.0 if verification never ran.
    pub fn last_verification_score(&self) -> f64 {
        self.verification
            .as_ref()
            .map(|v| v.overall_score)
            .unwrap_or(0.0)
    }
}

// ---------------------------------------------------------------------------
// Checkpoints & progress
// ---------------------------------------------------------------------------

/// Append-only audit record written after every stage transition and
/// marathon cycle. Never read back to drive live control flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub step: String,
    pub metadata: Value,
    pub state: String,
    pub timestamp: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(step: &str, metadata: Value, state: PipelineState) -> Self {
        Self {
            step: step.to_string(),
            metadata,
            state: state.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// User progress markers loaded from the persistence layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProgress {
    #[serde(default)]
    pub completed_milestones: Vec<String>,
    #[serde(default)]
    pub quiz_scores: Vec<f64>,
}

// ---------------------------------------------------------------------------
// Tournament
// ---------------------------------------------------------------------------

/// Raw performance numbers captured while a strategy variant runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub duration_seconds: f64,
    pub jobs_found: usize,
    pub skills_identified: usize,
    pub predictions_generated: bool,
    pub success: bool,
}

/// One strategy's entry in a tournament. Lives only for the duration of
/// a single tournament invocation.
#[derive(Debug, Clone)]
pub struct TournamentEntry {
    pub strategy: String,
    pub snapshot: Option<ResearchSnapshot>,
    pub metrics: PerformanceMetrics,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardRow {
    pub rank: usize,
    pub strategy: String,
    pub score: f64,
    pub key_insight: String,
}

/// Cross-agent pattern analysis derived from all scored entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TournamentPatterns {
    pub consensus_skills: Vec<String>,
    pub unique_skills: usize,
    pub unique_trends: usize,
    pub best_strategy: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TournamentReport {
    pub id: String,
    pub goal: String,
    pub region: String,
    pub total_agents: usize,
    pub successful_agents: usize,
    pub failed_agents: usize,
    pub duration_seconds: f64,
    pub winner_strategy: String,
    pub winner_score: f64,
    pub leaderboard: Vec<LeaderboardRow>,
    pub patterns: TournamentPatterns,
}

/// Winner's research payload plus tournament metadata.
#[derive(Debug, Clone)]
pub struct TournamentOutcome {
    pub snapshot: ResearchSnapshot,
    pub report: TournamentReport,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for STRIDE.
#[derive(Debug, thiserror::Error)]
pub enum StrideError {
    #[error("Reasoning service error ({model}): {message}")]
    Reasoning { model: String, message: String },

    #[error("Listing source error ({provider}): {message}")]
    Source { provider: String, message: String },

    #[error("Pipeline failed at stage {stage}: {message}")]
    Pipeline { stage: String, message: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
