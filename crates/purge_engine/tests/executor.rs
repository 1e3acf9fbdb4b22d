mod support;

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use purge_core::{DeletionOutcome, FailReason, SkipReason};
use purge_engine::{DeletionExecutor, EngineEvent, Governor};
use support::*;
use tokio_util::sync::CancellationToken;

fn executor(world: &SharedWorld, sink: &RecordingSink) -> DeletionExecutor {
    init_logging();
    let config = test_config();
    let governor = Governor::new(config.rate_limit);
    world.lock().unwrap().governor = Some(governor.clone());
    DeletionExecutor::new(
        Arc::new(FakeActions::new(world.clone())),
        governor,
        Arc::new(sink.clone()),
        &config,
    )
}

#[tokio::test(start_paused = true)]
async fn confirmed_item_is_deleted() {
    let world = world();
    let sink = RecordingSink::default();
    let candidate = aged("a", 40);
    put_page(&world, purge_core::Partition::New, vec![candidate.clone()]);

    let outcome = executor(&world, &sink)
        .execute(&candidate, &CancellationToken::new())
        .await;

    assert_eq!(outcome, DeletionOutcome::Deleted);
    assert_eq!(world.lock().unwrap().deleted, vec!["a".to_string()]);
    assert_eq!(
        sink.events(),
        vec![EngineEvent::ItemFinished {
            handle: candidate.handle,
            outcome: DeletionOutcome::Deleted,
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn transport_faults_are_retried_after_a_cooldown() {
    let world = world();
    world.lock().unwrap().begin_faults = 2;
    let sink = RecordingSink::default();
    let candidate = aged("flaky", 40);

    let started = tokio::time::Instant::now();
    let outcome = executor(&world, &sink)
        .execute(&candidate, &CancellationToken::new())
        .await;

    assert_eq!(outcome, DeletionOutcome::Deleted);
    assert_eq!(world.lock().unwrap().begin_calls.len(), 3);
    // Two cooldowns of at least the configured minimum.
    assert!(started.elapsed() >= Duration::from_secs(10));
    let attempts: Vec<u32> = sink
        .events()
        .into_iter()
        .filter_map(|event| match event {
            EngineEvent::ItemRetrying { attempt, .. } => Some(attempt),
            _ => None,
        })
        .collect();
    assert_eq!(attempts, vec![1, 2]);
}

#[tokio::test(start_paused = true)]
async fn throttled_delete_waits_on_the_limiter_instead_of_retrying() {
    let world = world();
    world.lock().unwrap().throttled_begins = 1;
    let sink = RecordingSink::default();
    let candidate = aged("busy", 40);

    let started = tokio::time::Instant::now();
    let outcome = executor(&world, &sink)
        .execute(&candidate, &CancellationToken::new())
        .await;

    assert_eq!(outcome, DeletionOutcome::Deleted);
    assert_eq!(world.lock().unwrap().begin_calls.len(), 2);
    assert!(started.elapsed() >= Duration::from_secs(60));
    assert!(!sink
        .events()
        .iter()
        .any(|event| matches!(event, EngineEvent::ItemRetrying { .. })));
}

#[tokio::test(start_paused = true)]
async fn missing_confirmation_skips_without_confirming() {
    let world = world();
    world.lock().unwrap().undeletable.insert("foreign".to_string());
    let sink = RecordingSink::default();

    let outcome = executor(&world, &sink)
        .execute(&aged("foreign", 40), &CancellationToken::new())
        .await;

    assert_eq!(outcome, DeletionOutcome::Skipped(SkipReason::NoConfirmation));
    assert!(world.lock().unwrap().deleted.is_empty());
}

#[tokio::test(start_paused = true)]
async fn stop_during_retry_cooldown_fails_the_item() {
    let world = world();
    world.lock().unwrap().begin_faults = u32::MAX;
    let sink = RecordingSink::default();
    let cancel = CancellationToken::new();

    let stopper = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        stopper.cancel();
    });

    let outcome = executor(&world, &sink)
        .execute(&aged("never", 40), &cancel)
        .await;

    assert_eq!(outcome, DeletionOutcome::Failed(FailReason::Stopped));
    assert_eq!(world.lock().unwrap().begin_calls.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn stopped_run_issues_no_request() {
    let world = world();
    let sink = RecordingSink::default();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = executor(&world, &sink).execute(&aged("a", 40), &cancel).await;

    assert_eq!(outcome, DeletionOutcome::Failed(FailReason::Stopped));
    assert!(world.lock().unwrap().begin_calls.is_empty());
}
