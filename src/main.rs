//! STRIDE: autonomous career market agent.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! wires the listing sources, reasoning service and worker agents, then
//! runs a marathon session with graceful Ctrl+C shutdown.

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

use stride::agents::execution::ExecutionAgent;
use stride::agents::planning::PlanningAgent;
use stride::agents::research::ResearchAgent;
use stride::agents::verification::VerificationAgent;
use stride::agents::Researcher;
use stride::bus::MessageBus;
use stride::config::{self, AppConfig};
use stride::marathon::MarathonRunner;
use stride::market::MarketAggregator;
use stride::pipeline::Orchestrator;
use stride::reasoning::gemini::GeminiClient;
use stride::reasoning::ReasoningService;
use stride::sources::adzuna::AdzunaSource;
use stride::sources::remotive::RemotiveSource;
use stride::sources::ListingSource;
use stride::storage::{CheckpointStore, JsonCheckpointStore};
use stride::tournament::TournamentScheduler;

const BANNER: &str = r#"
 ____ _____ ____  ___ ____  _____
/ ___|_   _|  _ \|_ _|  _ \| ____|
\___ \ | | | |_) || || | | |  _|
 ___) || | |  _ < | || |_| | |___
|____/ |_| |_| \_\___|____/|_____|

  Strategic Trajectory & Real-time Income Discovery Engine
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    // Load configuration from TOML
    let cfg = config::AppConfig::load("config.toml")?;

    // Initialise structured logging
    init_logging();

    // Print startup banner
    println!("{BANNER}");
    info!(
        agent_name = %cfg.agent.name,
        goal = %cfg.agent.goal,
        region = %cfg.agent.region,
        duration_hours = cfg.marathon.duration_hours,
        "STRIDE starting up"
    );

    // -- Initialise components -------------------------------------------

    let reasoning = build_reasoning(&cfg)?;
    let sources = build_sources(&cfg)?;
    info!(sources = sources.len(), model = reasoning.model_name(), "Components configured");

    let aggregator = Arc::new(MarketAggregator::new(
        sources,
        reasoning.clone(),
        &cfg.market,
    ));

    let store: Arc<dyn CheckpointStore> = Arc::new(JsonCheckpointStore::new(
        &cfg.storage.checkpoint_path,
        &cfg.storage.progress_path,
    ));
    if let Some(latest) = store.load_latest_checkpoint()? {
        info!(step = %latest.step, state = %latest.state, "Previous session checkpoint found");
    }

    let full_researcher = Arc::new(ResearchAgent::new(aggregator.clone(), reasoning.clone()));
    let cycle_researcher: Arc<dyn Researcher> =
        Arc::new(ResearchAgent::shallow(aggregator, reasoning.clone()));
    let planner = Arc::new(PlanningAgent::new(reasoning.clone()));
    let executor = Arc::new(ExecutionAgent::new(reasoning.clone()));
    let verifier = Arc::new(VerificationAgent::new(reasoning));

    let tournament = Arc::new(TournamentScheduler::new(full_researcher.clone()));

    let orchestrator = Orchestrator::new(
        &cfg.agent.goal,
        &cfg.agent.region,
        full_researcher,
        planner,
        executor,
        verifier,
        store,
    )
    .with_tournament(tournament, cfg.tournament.agent_count);

    // -- Message bus router ------------------------------------------------

    let bus = Arc::new(MessageBus::new());
    let (stop_tx, stop_rx) = watch::channel(false);
    let router = {
        let bus = bus.clone();
        let stop_rx = stop_rx.clone();
        tokio::spawn(async move { bus.run_router(stop_rx).await })
    };

    // -- Marathon session --------------------------------------------------

    let runner = MarathonRunner::new(orchestrator, cycle_researcher, bus, &cfg.marathon);
    let mut session = tokio::spawn(runner.run(stop_rx));

    info!("Marathon session running. Press Ctrl+C to stop.");

    let orchestrator = tokio::select! {
        finished = &mut session => finished??,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, stopping session");
            let _ = stop_tx.send(true);
            session.await??
        }
    };

    let _ = stop_tx.send(true);
    if let Err(e) = router.await {
        error!(error = %e, "Message router task failed");
    }

    let ctx = orchestrator.context();
    info!(
        cycles = ctx.cycle_count,
        plan_version = ctx.plan_version,
        final_listing_count = ctx.previous_listing_count,
        final_state = %orchestrator.state(),
        "STRIDE shut down cleanly."
    );

    Ok(())
}

/// Build the reasoning client from config. A missing API key is not
/// fatal: every caller has a documented fallback, so the agent degrades
/// to template output instead of refusing to start.
fn build_reasoning(cfg: &AppConfig) -> Result<Arc<dyn ReasoningService>> {
    let api_key = std::env::var(&cfg.reasoning.api_key_env).unwrap_or_default();
    if api_key.is_empty() {
        warn!(
            env = %cfg.reasoning.api_key_env,
            "No reasoning API key configured, running on fallback output only"
        );
    }
    if cfg.reasoning.provider != "gemini" {
        warn!(provider = %cfg.reasoning.provider, "Unknown reasoning provider, defaulting to Gemini");
    }
    let client = GeminiClient::new(
        api_key,
        cfg.reasoning.model.clone(),
        cfg.reasoning.fallback_model.clone(),
    )
    .map_err(|e| anyhow::anyhow!("Failed to build reasoning client: {e}"))?;
    Ok(Arc::new(client))
}

/// Build the enabled listing sources. A source whose credentials are
/// missing is skipped with a warning rather than aborting startup.
fn build_sources(cfg: &AppConfig) -> Result<Vec<Arc<dyn ListingSource>>> {
    let mut sources: Vec<Arc<dyn ListingSource>> = Vec::new();

    if cfg.sources.remotive.enabled {
        sources.push(Arc::new(RemotiveSource::new()?));
    }

    if cfg.sources.adzuna.enabled {
        let app_id = AppConfig::resolve_env(&cfg.sources.adzuna.app_id_env);
        let app_key = AppConfig::resolve_env(&cfg.sources.adzuna.app_key_env);
        match (app_id, app_key) {
            (Ok(app_id), Ok(app_key)) => {
                sources.push(Arc::new(AdzunaSource::new(
                    app_id,
                    app_key,
                    cfg.sources.adzuna.country.clone(),
                )?));
            }
            _ => warn!("Adzuna enabled but credentials missing, skipping source"),
        }
    }

    if sources.is_empty() {
        warn!("No listing sources enabled, research will rely on synthetic listings");
    }

    Ok(sources)
}

/// Initialise the `tracing` subscriber. `STRIDE_LOG_JSON` switches to
/// JSON output for log shipping.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("stride=info"));

    if std::env::var("STRIDE_LOG_JSON").is_ok() {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
