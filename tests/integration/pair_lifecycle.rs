use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use pairly_app_lib::db::DbPool;
use pairly_app_lib::error::AppError;
use pairly_app_lib::models::point_entry::PointEntryCreateInput;
use pairly_app_lib::models::task::TaskCreateInput;
use pairly_app_lib::AppState;
use tempfile::tempdir;

fn setup_state() -> (AppState, tempfile::TempDir) {
    let dir = tempdir().expect("temp dir");
    let db_path = dir.path().join("pairs.sqlite");
    let pool = DbPool::new(db_path).expect("db pool");
    let state = AppState::new(pool).expect("app state");
    (state, dir)
}

#[test]
fn create_join_and_unlink() {
    let (state, _dir) = setup_state();
    let pairing = state.pairing_service();

    let pair = pairing.create_pair("alice").expect("create");
    assert_eq!(pair.member_a, "alice");
    assert!(pair.member_b.is_none());
    assert_eq!(pair.invite_code.len(), 6);

    let joined = pairing.join_pair(&pair.invite_code, "bob").expect("join");
    assert_eq!(joined.partner_of("alice"), Some("bob"));
    assert_eq!(joined.partner_of("bob"), Some("alice"));

    // Bob leaves; Alice keeps the pair and its history.
    pairing.unlink(&pair.id, "bob").expect("unlink bob");
    let remaining = pairing.get_pair(&pair.id).expect("pair survives");
    assert_eq!(remaining.member_a, "alice");
    assert!(remaining.member_b.is_none());

    // Alice leaves an empty pair; it is deleted.
    pairing.unlink(&pair.id, "alice").expect("unlink alice");
    assert!(matches!(
        pairing.get_pair(&pair.id),
        Err(AppError::NotFound)
    ));
}

#[test]
fn member_already_paired_cannot_create_or_join() {
    let (state, _dir) = setup_state();
    let pairing = state.pairing_service();

    let pair = pairing.create_pair("alice").expect("create");
    pairing.join_pair(&pair.invite_code, "bob").expect("join");

    assert!(matches!(
        pairing.create_pair("bob"),
        Err(AppError::Conflict { .. })
    ));

    let other = pairing.create_pair("carol").expect("second pair");
    assert!(matches!(
        pairing.join_pair(&other.invite_code, "alice"),
        Err(AppError::Conflict { .. })
    ));
}

#[test]
fn task_completions_drive_the_pair_streak() {
    let (state, _dir) = setup_state();
    let pair = state.pairing_service().create_pair("alice").expect("create");

    let task = state
        .task_service()
        .create_task(TaskCreateInput {
            title: "一起散步".into(),
            owner_id: "alice".into(),
            pair_id: Some(pair.id.clone()),
            worth: Some(1),
            ..Default::default()
        })
        .expect("create task");
    state.task_service().complete_task(&task.id).expect("complete");

    let streak = state.streak_service().get_streak(&pair.id).expect("streak");
    assert_eq!(streak.current, 1);
    assert_eq!(streak.longest, 1);

    // A second completion on the same day does not extend the streak.
    let second = state
        .task_service()
        .create_task(TaskCreateInput {
            title: "一起做饭".into(),
            owner_id: "bob".into(),
            pair_id: Some(pair.id.clone()),
            worth: Some(2),
            ..Default::default()
        })
        .expect("second task");
    state
        .task_service()
        .complete_task(&second.id)
        .expect("complete second");

    let streak = state.streak_service().get_streak(&pair.id).expect("streak");
    assert_eq!(streak.current, 1);
}

#[test]
fn live_shared_total_follows_ledger_writes() {
    let (state, _dir) = setup_state();
    let total = Arc::new(AtomicI64::new(-1));
    let sink_total = Arc::clone(&total);

    let aggregator = state.watch_shared_total(
        "p1",
        Arc::new(move |value| sink_total.store(value, Ordering::SeqCst)),
    );
    assert!(aggregator.is_running());

    state
        .ledger_service()
        .award_points(PointEntryCreateInput {
            owner_id: "alice".into(),
            pair_id: Some("p1".into()),
            value: 3,
            reason: Some("Task: 洗碗".into()),
            ..Default::default()
        })
        .expect("award");
    assert_eq!(total.load(Ordering::SeqCst), 3);

    // Entries replicated from the partner device merge into the same total.
    state
        .sync_service()
        .ingest_remote_entry(pairly_app_lib::models::point_entry::RemotePointEntry {
            id: "remote-1".into(),
            owner_id: "bob".into(),
            pair_id: Some("p1".into()),
            value: 4,
            scope: Some("shared".into()),
            ..Default::default()
        })
        .expect("ingest");
    assert_eq!(total.load(Ordering::SeqCst), 7);

    drop(aggregator);
    state
        .ledger_service()
        .award_points(PointEntryCreateInput {
            owner_id: "alice".into(),
            pair_id: Some("p1".into()),
            value: 5,
            reason: Some("Task: 做饭".into()),
            ..Default::default()
        })
        .expect("award after drop");
    assert_eq!(total.load(Ordering::SeqCst), 7);
}
