//! End-to-end session tests.
//!
//! Wires the real orchestrator, tournament scheduler, marathon loop,
//! message bus and JSON checkpoint store together with mock agents, and
//! asserts on the persisted checkpoint trail and the bus history.

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::watch;

    use stride::bus::MessageBus;
    use stride::config::MarathonConfig;
    use stride::marathon::MarathonRunner;
    use stride::pipeline::Orchestrator;
    use stride::storage::{CheckpointStore, JsonCheckpointStore};
    use stride::tournament::TournamentScheduler;
    use stride::types::{
        Checkpoint, Message, MessageKind, MessagePriority, PipelineState,
    };

    use crate::mock_agents::{MockExecutor, MockPlanner, MockResearcher, MockVerifier};

    fn temp_paths() -> (String, String) {
        let id = uuid::Uuid::new_v4();
        let mut cp = std::env::temp_dir();
        cp.push(format!("stride_it_checkpoints_{id}.json"));
        let mut pg = std::env::temp_dir();
        pg.push(format!("stride_it_progress_{id}.json"));
        (
            cp.to_string_lossy().to_string(),
            pg.to_string_lossy().to_string(),
        )
    }

    fn read_steps(path: &str) -> Vec<String> {
        let contents = fs::read_to_string(path).unwrap();
        let checkpoints: Vec<Checkpoint> = serde_json::from_str(&contents).unwrap();
        checkpoints.into_iter().map(|c| c.step).collect()
    }

    fn orchestrator(
        researcher: Arc<MockResearcher>,
        verifier: Arc<MockVerifier>,
        store: Arc<dyn CheckpointStore>,
    ) -> Orchestrator {
        Orchestrator::new(
            "Backend Developer",
            "Kenya",
            researcher,
            Arc::new(MockPlanner::new()),
            Arc::new(MockExecutor),
            verifier,
            store,
        )
    }

    #[tokio::test]
    async fn test_full_pipeline_persists_checkpoint_trail() {
        let (cp_path, pg_path) = temp_paths();
        let store = Arc::new(JsonCheckpointStore::new(&cp_path, &pg_path));
        let mut orch = orchestrator(
            Arc::new(MockResearcher::new(12)),
            Arc::new(MockVerifier::new(0.85)),
            store.clone(),
        );

        orch.run_pipeline().await.unwrap();

        assert_eq!(orch.state(), PipelineState::Completed);
        assert_eq!(
            read_steps(&cp_path),
            vec![
                "RESEARCH_COMPLETE",
                "PLANNING_COMPLETE",
                "EXECUTION_COMPLETE",
                "VERIFICATION_COMPLETE",
                "ADJUSTMENT_SUGGESTED",
                "PIPELINE_COMPLETE",
            ],
        );

        let latest = store.load_latest_checkpoint().unwrap().unwrap();
        assert_eq!(latest.step, "PIPELINE_COMPLETE");
        assert_eq!(latest.state, "COMPLETED");

        let _ = fs::remove_file(&cp_path);
        let _ = fs::remove_file(&pg_path);
    }

    #[tokio::test]
    async fn test_tournament_pipeline_promotes_winner_snapshot() {
        let (cp_path, pg_path) = temp_paths();
        let store = Arc::new(JsonCheckpointStore::new(&cp_path, &pg_path));
        let researcher = Arc::new(MockResearcher::new(8));
        let scheduler = Arc::new(TournamentScheduler::new(researcher.clone()));

        let mut orch = orchestrator(
            researcher.clone(),
            Arc::new(MockVerifier::new(0.85)),
            store,
        )
        .with_tournament(scheduler, 3);

        orch.run_pipeline().await.unwrap();

        // One research call per strategy variant, none for the plain path.
        assert_eq!(researcher.call_count(), 3);
        // Only the "balanced" variant carries predictions, so the
        // promoted snapshot proves the winner was selected.
        let research = orch.context().research.as_ref().unwrap();
        assert!(research.has_predictions());
        assert_eq!(research.listing_count(), 8);

        let _ = fs::remove_file(&cp_path);
        let _ = fs::remove_file(&pg_path);
    }

    #[tokio::test]
    async fn test_verification_failure_is_recorded_on_disk() {
        let (cp_path, pg_path) = temp_paths();
        let store = Arc::new(JsonCheckpointStore::new(&cp_path, &pg_path));
        let verifier = Arc::new(MockVerifier::new(0.85));
        verifier.set_error("assessment generation outage");

        let mut orch = orchestrator(Arc::new(MockResearcher::new(12)), verifier, store.clone());

        assert!(orch.run_pipeline().await.is_err());
        assert_eq!(orch.state(), PipelineState::Failed);

        let latest = store.load_latest_checkpoint().unwrap().unwrap();
        assert_eq!(latest.step, "PIPELINE_FAILED");
        assert_eq!(latest.metadata["stage"], "VERIFYING");

        let steps = read_steps(&cp_path);
        assert!(steps.contains(&"EXECUTION_COMPLETE".to_string()));
        assert!(!steps.contains(&"ADJUSTMENT_SUGGESTED".to_string()));

        let _ = fs::remove_file(&cp_path);
        let _ = fs::remove_file(&pg_path);
    }

    #[tokio::test]
    async fn test_zero_duration_session_runs_pipeline_once() {
        let (cp_path, pg_path) = temp_paths();
        let store = Arc::new(JsonCheckpointStore::new(&cp_path, &pg_path));
        let orch = orchestrator(
            Arc::new(MockResearcher::new(12)),
            Arc::new(MockVerifier::new(0.85)),
            store,
        );

        let config = MarathonConfig {
            duration_hours: 0,
            cycle_interval_secs: 1,
            drift_threshold: 5,
            error_backoff_secs: 1,
        };
        let bus = Arc::new(MessageBus::new());
        let runner = MarathonRunner::new(orch, Arc::new(MockResearcher::new(12)), bus, &config);

        let (_stop_tx, stop_rx) = watch::channel(false);
        let orch = runner.run(stop_rx).await.unwrap();

        assert_eq!(orch.state(), PipelineState::Completed);
        assert_eq!(orch.context().cycle_count, 0);

        let steps = read_steps(&cp_path);
        assert_eq!(steps.first().map(String::as_str), Some("RESEARCH_COMPLETE"));
        assert_eq!(steps.last().map(String::as_str), Some("SESSION_ENDED"));

        let _ = fs::remove_file(&cp_path);
        let _ = fs::remove_file(&pg_path);
    }

    #[tokio::test]
    async fn test_marathon_drift_publishes_urgent_shift() {
        let (cp_path, pg_path) = temp_paths();
        let store = Arc::new(JsonCheckpointStore::new(&cp_path, &pg_path));
        // Pipeline research finds 10 listings, cycles then find 30.
        let orch = orchestrator(
            Arc::new(MockResearcher::new(10)),
            Arc::new(MockVerifier::new(0.85)),
            store,
        );

        let config = MarathonConfig {
            duration_hours: 1,
            cycle_interval_secs: 1,
            drift_threshold: 5,
            error_backoff_secs: 1,
        };
        let bus = Arc::new(MessageBus::new());
        let cycle_researcher = Arc::new(MockResearcher::new(30));
        let runner = MarathonRunner::new(orch, cycle_researcher, bus.clone(), &config);

        let (stop_tx, stop_rx) = watch::channel(false);
        let session = tokio::spawn(runner.run(stop_rx));
        tokio::time::sleep(Duration::from_millis(2500)).await;
        stop_tx.send(true).unwrap();
        let orch = session.await.unwrap().unwrap();

        // The 10 -> 30 jump crossed the threshold exactly once; the
        // stable count of 30 afterwards was absorbed.
        let shifts = bus.by_kind(MessageKind::MarketShift);
        assert_eq!(shifts.len(), 1);
        assert_eq!(shifts[0].priority, MessagePriority::Urgent);
        assert_eq!(shifts[0].payload["job_delta"], 20);
        assert_eq!(orch.context().plan_version, 2);

        let steps = read_steps(&cp_path);
        assert!(steps.contains(&"SELF_CORRECTION".to_string()));
        assert!(steps.contains(&"PROGRESS_CHECK".to_string()));
        assert_eq!(steps.last().map(String::as_str), Some("SESSION_ENDED"));

        let _ = fs::remove_file(&cp_path);
        let _ = fs::remove_file(&pg_path);
    }

    #[tokio::test]
    async fn test_router_delivers_published_messages_end_to_end() {
        let bus = Arc::new(MessageBus::new());
        let received = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = received.clone();
        bus.subscribe(
            "planning",
            Arc::new(move |m: Message| {
                let sink = sink.clone();
                Box::pin(async move {
                    sink.lock().unwrap().push(m);
                    Ok(())
                })
            }),
        );

        let (stop_tx, stop_rx) = watch::channel(false);
        let router = {
            let bus = bus.clone();
            tokio::spawn(async move { bus.run_router(stop_rx).await })
        };

        bus.publish(Message::new(
            "marathon",
            "planning",
            MessageKind::MarketShift,
            serde_json::json!({"job_delta": 20}),
            MessagePriority::Urgent,
        ))
        .unwrap();
        bus.publish(Message::new(
            "marathon",
            "user",
            MessageKind::ProgressUpdate,
            serde_json::json!({"cycle": 1}),
            MessagePriority::Normal,
        ))
        .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        stop_tx.send(true).unwrap();
        router.await.unwrap();

        // Only the "planning" subscriber existed; the "user" message is
        // dropped but both stay in history and the shift escalated.
        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].kind, MessageKind::MarketShift);
        assert_eq!(bus.history_len(), 2);
        assert_eq!(bus.escalation_count(), 1);
    }
}
