//! End-to-end behavior of the batch orchestrator against scripted scorers.

mod common;

use std::sync::Arc;
use std::time::Duration;

use batch_scorer::config::{BreakerConfig, OrchestratorConfig};
use batch_scorer::resilience::BreakerState;
use batch_scorer::scoring::{NoopSink, ScoringContext, ScoringError, ValidationError, CIRCUIT_OPEN_REASON};
use common::{breaker_config, items, numbered_items, orchestrator, orchestrator_with, Behavior, FailingSink, RecordingSink, ScriptedScorer};

fn student_context() -> ScoringContext {
    ScoringContext::default()
        .with_field("budget", 1500)
        .with_field("campus", "north")
}

#[tokio::test]
async fn test_healthy_batch_scores_every_item() {
    let scorer = ScriptedScorer::succeeding();
    let orch = orchestrator(scorer.clone());

    let batch = orch
        .score_batch(items(&["a", "b", "c"]), student_context())
        .await
        .unwrap();

    assert_eq!(batch.successful, 3);
    assert_eq!(batch.failed, 0);
    assert!(!batch.circuit_breaker_open);
    assert_eq!(scorer.calls(), 3);

    let ids: Vec<_> = batch.results.iter().map(|r| r.item_id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
    for result in &batch.results {
        assert!(result.success);
        assert!(result.error.is_none());
        assert_eq!(result.score, 75.0);
        assert_eq!(result.reasons.len(), 2);
    }
}

#[tokio::test]
async fn test_empty_batch_returns_empty_result() {
    let scorer = ScriptedScorer::succeeding();
    let orch = orchestrator(scorer.clone());

    let batch = orch.score_batch(Vec::new(), student_context()).await.unwrap();

    assert_eq!(batch.successful, 0);
    assert_eq!(batch.failed, 0);
    assert!(batch.results.is_empty());
    assert!(!batch.circuit_breaker_open);
    assert_eq!(scorer.calls(), 0);
}

#[tokio::test]
async fn test_too_many_items_is_rejected_without_scoring() {
    let scorer = ScriptedScorer::succeeding();
    let orch = orchestrator(scorer.clone());

    let err = orch
        .score_batch(numbered_items("l", 51), student_context())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ScoringError::Validation(ValidationError::TooManyItems { count: 51, max: 50 })
    ));
    assert_eq!(scorer.calls(), 0);
}

#[tokio::test]
async fn test_exactly_max_items_is_accepted() {
    let scorer = ScriptedScorer::succeeding();
    let orch = orchestrator(scorer.clone());

    let batch = orch.score_batch(numbered_items("l", 50), student_context()).await.unwrap();

    assert_eq!(batch.results.len(), 50);
    assert_eq!(batch.successful, 50);
    assert_eq!(scorer.calls(), 50);
}

#[tokio::test]
async fn test_open_breaker_short_circuits_next_batch() {
    let scorer = ScriptedScorer::failing("model overloaded");
    let orch = orchestrator_with(
        OrchestratorConfig::default(),
        breaker_config(3, 2, 60_000),
        scorer.clone(),
        Arc::new(NoopSink),
    );

    let first = orch
        .score_batch(items(&["a", "b", "c"]), student_context())
        .await
        .unwrap();
    assert_eq!(first.failed, 3);
    assert!(first
        .results
        .iter()
        .all(|r| r.error.as_deref() == Some("model overloaded")));
    assert_eq!(orch.status().circuit_breaker.state, BreakerState::Open);
    assert_eq!(scorer.calls(), 3);

    let second = orch
        .score_batch(items(&["d", "e", "f", "g"]), student_context())
        .await
        .unwrap();

    assert!(second.circuit_breaker_open);
    assert_eq!(second.successful, 0);
    assert_eq!(second.failed, 4);
    assert!(second
        .results
        .iter()
        .all(|r| r.error.as_deref() == Some(CIRCUIT_OPEN_REASON)));
    assert_eq!(scorer.calls(), 3, "no scorer calls while the circuit is open");
}

#[tokio::test(start_paused = true)]
async fn test_hanging_item_fails_with_timeout_others_unaffected() {
    let scorer = ScriptedScorer::succeeding();
    scorer.script("l-3", Behavior::Fail("model overloaded".into()));
    scorer.script("l-7", Behavior::Hang);
    let orch = orchestrator(scorer.clone());

    let batch = orch.score_batch(numbered_items("l", 10), student_context()).await.unwrap();

    assert_eq!(batch.results.len(), 10);
    assert_eq!(batch.successful, 8);
    assert_eq!(batch.failed, 2);
    assert!(!batch.circuit_breaker_open);

    let by_id = |id: &str| batch.results.iter().find(|r| r.item_id == id).unwrap();
    assert_eq!(by_id("l-3").error.as_deref(), Some("model overloaded"));
    assert!(by_id("l-7").error.as_deref().unwrap().starts_with("timeout"));
    assert!(by_id("l-0").success);
    assert!(by_id("l-9").success);
}

#[tokio::test(start_paused = true)]
async fn test_timed_out_items_are_not_cached() {
    let scorer = ScriptedScorer::succeeding();
    scorer.script("slow", Behavior::Delay(Duration::from_secs(45), 90.0));
    let orch = orchestrator(scorer.clone());

    let batch = orch
        .score_batch(items(&["fast", "slow"]), student_context())
        .await
        .unwrap();
    assert_eq!(batch.successful, 1);
    assert_eq!(orch.status().cache.entries, 1);

    // Let the abandoned call's original deadline pass; nothing may land in the cache.
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(orch.status().cache.entries, 1);
}

#[tokio::test]
async fn test_cache_hits_skip_the_scorer() {
    let scorer = ScriptedScorer::succeeding();
    let orch = orchestrator(scorer.clone());

    let first = orch
        .score_batch(items(&["a", "b"]), student_context())
        .await
        .unwrap();
    assert_eq!(scorer.calls(), 2);

    let second = orch
        .score_batch(items(&["a", "b"]), student_context())
        .await
        .unwrap();
    assert_eq!(scorer.calls(), 2);
    assert_eq!(second.successful, 2);
    for (before, after) in first.results.iter().zip(&second.results) {
        assert_eq!(before.item_id, after.item_id);
        assert_eq!(before.score, after.score);
        assert_eq!(before.reasons, after.reasons);
        assert_eq!(before.timestamp, after.timestamp);
    }
}

#[tokio::test]
async fn test_different_context_misses_the_cache() {
    let scorer = ScriptedScorer::succeeding();
    let orch = orchestrator(scorer.clone());

    orch.score_batch(items(&["a"]), student_context()).await.unwrap();
    orch.score_batch(items(&["a"]), student_context().with_field("budget", 900))
        .await
        .unwrap();

    assert_eq!(scorer.calls(), 2);
    assert_eq!(orch.status().cache.entries, 2);
}

#[tokio::test]
async fn test_failed_items_are_not_cached() {
    let scorer = ScriptedScorer::failing("model overloaded");
    let orch = orchestrator(scorer.clone());

    orch.score_batch(items(&["a"]), student_context()).await.unwrap();
    scorer.set_default(Behavior::Succeed(60.0));
    let batch = orch.score_batch(items(&["a"]), student_context()).await.unwrap();

    assert_eq!(scorer.calls(), 2);
    assert_eq!(batch.successful, 1);
    assert_eq!(batch.results[0].score, 60.0);
}

#[tokio::test]
async fn test_rolling_failures_abort_remaining_chunks() {
    let scorer = ScriptedScorer::failing("upstream 500");
    let orch = orchestrator_with(
        OrchestratorConfig {
            max_batch_size: 2,
            abort_failure_threshold: 3,
            ..OrchestratorConfig::default()
        },
        breaker_config(100, 2, 60_000),
        scorer.clone(),
        Arc::new(NoopSink),
    );

    let batch = orch.score_batch(numbered_items("l", 6), student_context()).await.unwrap();

    assert_eq!(scorer.calls(), 4, "third chunk is never attempted");
    assert_eq!(batch.results.len(), 6);
    assert_eq!(batch.failed, 6);
    assert!(batch.circuit_breaker_open);
    assert_eq!(batch.results[3].error.as_deref(), Some("upstream 500"));
    assert_eq!(batch.results[4].error.as_deref(), Some(CIRCUIT_OPEN_REASON));
    assert_eq!(batch.results[5].error.as_deref(), Some(CIRCUIT_OPEN_REASON));
}

#[tokio::test]
async fn test_success_resets_rolling_failures() {
    let scorer = ScriptedScorer::failing("upstream 500");
    scorer.script("l-2", Behavior::Succeed(80.0));
    let orch = orchestrator_with(
        OrchestratorConfig {
            max_batch_size: 2,
            abort_failure_threshold: 3,
            ..OrchestratorConfig::default()
        },
        breaker_config(100, 2, 60_000),
        scorer.clone(),
        Arc::new(NoopSink),
    );

    // Chunks: [F, F] [S, F] [F, F]; the success in the middle keeps the run below three.
    let batch = orch.score_batch(numbered_items("l", 6), student_context()).await.unwrap();

    assert_eq!(scorer.calls(), 6);
    assert_eq!(batch.successful, 1);
    assert_eq!(batch.failed, 5);
    assert!(!batch.circuit_breaker_open);
}

#[tokio::test]
async fn test_breaker_opening_mid_batch_skips_later_chunks() {
    let scorer = ScriptedScorer::failing("upstream 500");
    let orch = orchestrator_with(
        OrchestratorConfig {
            max_batch_size: 2,
            abort_failure_threshold: 100,
            ..OrchestratorConfig::default()
        },
        breaker_config(2, 2, 60_000),
        scorer.clone(),
        Arc::new(NoopSink),
    );

    let batch = orch.score_batch(numbered_items("l", 5), student_context()).await.unwrap();

    assert_eq!(scorer.calls(), 2);
    assert!(batch.circuit_breaker_open);
    assert_eq!(batch.failed, 5);
    assert!(batch.results[2..]
        .iter()
        .all(|r| r.error.as_deref() == Some(CIRCUIT_OPEN_REASON)));
}

#[tokio::test(start_paused = true)]
async fn test_breaker_recovers_through_half_open() {
    let scorer = ScriptedScorer::failing("upstream 500");
    let orch = orchestrator_with(
        OrchestratorConfig::default(),
        breaker_config(2, 2, 1_000),
        scorer.clone(),
        Arc::new(NoopSink),
    );

    orch.score_batch(items(&["a", "b"]), student_context()).await.unwrap();
    assert_eq!(orch.status().circuit_breaker.state, BreakerState::Open);

    tokio::time::advance(Duration::from_millis(1_100)).await;
    scorer.set_default(Behavior::Succeed(70.0));

    let probe = orch.score_batch(items(&["c"]), student_context()).await.unwrap();
    assert_eq!(probe.successful, 1);
    assert_eq!(orch.status().circuit_breaker.state, BreakerState::HalfOpen);

    let second = orch.score_batch(items(&["d"]), student_context()).await.unwrap();
    assert_eq!(second.successful, 1);
    assert_eq!(orch.status().circuit_breaker.state, BreakerState::Closed);
    assert_eq!(orch.status().circuit_breaker.failure_count, 0);
}

#[tokio::test]
async fn test_counts_always_reconcile() {
    for size in [1usize, 2, 7, 10, 11, 23, 50] {
        let scorer = ScriptedScorer::succeeding();
        for i in (0..size).step_by(3) {
            scorer.script(&format!("l-{i}"), Behavior::Fail("bad listing".into()));
        }
        let orch = orchestrator_with(
            OrchestratorConfig {
                max_batch_size: 4,
                ..OrchestratorConfig::default()
            },
            BreakerConfig::default(),
            scorer,
            Arc::new(NoopSink),
        );

        let batch = orch.score_batch(numbered_items("l", size), student_context()).await.unwrap();

        assert_eq!(batch.results.len(), size);
        assert_eq!(batch.successful + batch.failed, size);
        assert_eq!(batch.successful, batch.results.iter().filter(|r| r.success).count());
        for (i, result) in batch.results.iter().enumerate() {
            assert_eq!(result.item_id, format!("l-{i}"));
            if !result.success {
                assert!(result.error.is_some());
            }
            assert!((0.0..=100.0).contains(&result.score));
        }
    }
}

#[tokio::test]
async fn test_sink_receives_only_successful_items() {
    let scorer = ScriptedScorer::succeeding();
    scorer.script("b", Behavior::Fail("model overloaded".into()));
    let (sink, mut rx) = RecordingSink::new();
    let orch = orchestrator_with(
        OrchestratorConfig::default(),
        BreakerConfig::default(),
        scorer,
        sink,
    );

    let context = student_context();
    orch.score_batch(items(&["a", "b", "c"]), context.clone()).await.unwrap();

    let persisted = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    let ids: Vec<_> = persisted.items.iter().map(|r| r.item_id.as_str()).collect();
    assert_eq!(ids, vec!["a", "c"]);
    assert_eq!(persisted.context_fingerprint, context.fingerprint());
}

#[tokio::test]
async fn test_all_failed_batch_is_not_persisted() {
    let scorer = ScriptedScorer::failing("model overloaded");
    let (sink, mut rx) = RecordingSink::new();
    let orch = orchestrator_with(
        OrchestratorConfig::default(),
        BreakerConfig::default(),
        scorer,
        sink,
    );

    orch.score_batch(items(&["a"]), student_context()).await.unwrap();

    let received = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
    assert!(received.is_err());
}

#[tokio::test]
async fn test_sink_failure_does_not_change_the_result() {
    let scorer = ScriptedScorer::succeeding();
    let (sink, mut rx) = FailingSink::new();
    let orch = orchestrator_with(
        OrchestratorConfig::default(),
        BreakerConfig::default(),
        scorer,
        sink,
    );

    let batch = orch
        .score_batch(items(&["a", "b"]), student_context())
        .await
        .unwrap();
    assert_eq!(batch.successful, 2);
    assert!(!batch.circuit_breaker_open);

    let attempted = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(attempted, 2);
    assert_eq!(orch.status().circuit_breaker.state, BreakerState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_first_batch_after_cooldown_recovers_with_slow_scorer() {
    let scorer = ScriptedScorer::failing("upstream 500");
    let orch = orchestrator_with(
        OrchestratorConfig::default(),
        breaker_config(2, 2, 1_000),
        scorer.clone(),
        Arc::new(NoopSink),
    );

    orch.score_batch(items(&["a", "b"]), student_context()).await.unwrap();
    assert_eq!(orch.status().circuit_breaker.state, BreakerState::Open);

    tokio::time::advance(Duration::from_millis(1_100)).await;
    scorer.set_default(Behavior::Delay(Duration::from_millis(50), 70.0));

    let batch = orch.score_batch(numbered_items("l", 30), student_context()).await.unwrap();

    // Two half-open probes run in the first chunk; the other eight are turned away.
    // Once the probes close the breaker, later chunks score normally.
    assert_eq!(batch.results.len(), 30);
    assert_eq!(batch.successful, 22);
    assert_eq!(batch.failed, 8);
    assert!(!batch.circuit_breaker_open);
    assert!(batch.results[..10]
        .iter()
        .filter(|r| !r.success)
        .all(|r| r.error.as_deref() == Some(CIRCUIT_OPEN_REASON)));
    assert!(batch.results[10..].iter().all(|r| r.success));
    assert_eq!(scorer.calls(), 2 + 22);
    assert_eq!(orch.status().circuit_breaker.state, BreakerState::Closed);
}
