use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use pairly_app_lib::db::DbPool;
use pairly_app_lib::models::point_entry::{PointEntryCreateInput, RemotePointEntry};
use pairly_app_lib::models::task::{TaskCreateInput, TaskKind};
use pairly_app_lib::AppState;
use tempfile::tempdir;

fn setup_state() -> (AppState, tempfile::TempDir) {
    let dir = tempdir().expect("temp dir");
    let db_path = dir.path().join("points_flow.sqlite");
    let pool = DbPool::new(db_path).expect("db pool");
    let state = AppState::new(pool).expect("app state");
    (state, dir)
}

#[test]
fn awards_accumulate_into_shared_balance() {
    let (state, _dir) = setup_state();

    state
        .ledger_service()
        .award_points(PointEntryCreateInput {
            owner_id: "alice".into(),
            pair_id: Some("p1".into()),
            value: 3,
            reason: Some("Task: 洗碗".into()),
            ..Default::default()
        })
        .expect("award 3");
    state
        .ledger_service()
        .award_points(PointEntryCreateInput {
            owner_id: "bob".into(),
            pair_id: Some("p1".into()),
            value: 4,
            reason: Some("Task: 做饭".into()),
            ..Default::default()
        })
        .expect("award 4");

    let shared = state
        .balance_service()
        .shared_balance("p1")
        .expect("shared balance");
    assert_eq!(shared, 7);
}

#[test]
fn task_completion_feeds_both_balance_sources() {
    let (state, _dir) = setup_state();
    let task = state
        .task_service()
        .create_task(TaskCreateInput {
            title: "一起买菜".into(),
            owner_id: "alice".into(),
            pair_id: Some("p1".into()),
            worth: Some(5),
            ..Default::default()
        })
        .expect("create task");

    state.task_service().complete_task(&task.id).expect("complete");

    assert_eq!(
        state
            .balance_service()
            .shared_balance("p1")
            .expect("balance"),
        5
    );

    // Drop the ledger entry but leave the task completed: the balance keeps
    // the cached task points because earned takes the larger of the two.
    let entry = state
        .ledger_service()
        .entry_for_task(&task.id)
        .expect("entry lookup")
        .expect("entry exists");
    state
        .ledger_service()
        .undo_entry(entry.pair_id.as_deref(), &entry.id)
        .expect("undo entry");

    assert_eq!(
        state
            .balance_service()
            .shared_balance("p1")
            .expect("balance after undo"),
        5
    );
}

#[test]
fn personal_awards_credit_the_beneficiary_only() {
    let (state, _dir) = setup_state();
    let task = state
        .task_service()
        .create_task(TaskCreateInput {
            title: "送早餐".into(),
            owner_id: "giver".into(),
            pair_id: Some("p1".into()),
            kind: Some(TaskKind::Personal),
            for_uid: Some("receiver".into()),
            worth: Some(6),
            ..Default::default()
        })
        .expect("create task");
    state.task_service().complete_task(&task.id).expect("complete");

    let receiver = state
        .balance_service()
        .personal_balance("p1", "receiver")
        .expect("receiver balance");
    let giver = state
        .balance_service()
        .personal_balance("p1", "giver")
        .expect("giver balance");
    assert_eq!(receiver, 6);
    assert_eq!(giver, 0);

    // Personal completions do not leak into the shared pool.
    assert_eq!(
        state
            .balance_service()
            .shared_balance("p1")
            .expect("shared balance"),
        0
    );
}

#[test]
fn legacy_negative_entries_count_as_spend() {
    let (state, _dir) = setup_state();
    state
        .ledger_service()
        .award_points(PointEntryCreateInput {
            owner_id: "alice".into(),
            pair_id: Some("p1".into()),
            value: 10,
            reason: Some("Task: 大扫除".into()),
            ..Default::default()
        })
        .expect("award");

    // A debit written by an older partner revision arrives over sync.
    state
        .sync_service()
        .ingest_remote_entry(RemotePointEntry {
            id: "legacy-debit".into(),
            owner_id: "bob".into(),
            pair_id: Some("p1".into()),
            value: -4,
            reason: Some("奖励兑换: 电影之夜".into()),
            scope: Some("shared".into()),
            ..Default::default()
        })
        .expect("ingest debit");

    assert_eq!(
        state
            .balance_service()
            .shared_balance("p1")
            .expect("balance"),
        6
    );
}

#[test]
fn balance_never_goes_negative() {
    let (state, _dir) = setup_state();
    state
        .sync_service()
        .ingest_remote_entry(RemotePointEntry {
            id: "orphan-debit".into(),
            owner_id: "bob".into(),
            pair_id: Some("p1".into()),
            value: -9,
            scope: Some("shared".into()),
            ..Default::default()
        })
        .expect("ingest debit");

    assert_eq!(
        state
            .balance_service()
            .shared_balance("p1")
            .expect("balance"),
        0
    );
}

#[test]
fn restart_hydrates_live_totals_from_storage() {
    let dir = tempdir().expect("temp dir");
    let db_path = dir.path().join("restart.sqlite");

    {
        let pool = DbPool::new(db_path.clone()).expect("db pool");
        let state = AppState::new(pool).expect("app state");
        state
            .ledger_service()
            .award_points(PointEntryCreateInput {
                owner_id: "alice".into(),
                pair_id: Some("p1".into()),
                value: 5,
                reason: Some("Task: 大扫除".into()),
                ..Default::default()
            })
            .expect("award");
    }

    // A fresh process over the same database: the live total must start
    // from the persisted ledger, matching the derived balance.
    let pool = DbPool::new(db_path).expect("db pool");
    let state = AppState::new(pool).expect("app state");

    let total = Arc::new(AtomicI64::new(-1));
    let sink_total = Arc::clone(&total);
    let _aggregator = state.watch_shared_total(
        "p1",
        Arc::new(move |value| sink_total.store(value, Ordering::SeqCst)),
    );

    assert_eq!(total.load(Ordering::SeqCst), 5);
    assert_eq!(
        state
            .balance_service()
            .shared_balance("p1")
            .expect("balance"),
        total.load(Ordering::SeqCst)
    );
}

#[test]
fn overview_reports_both_scopes() {
    let (state, _dir) = setup_state();
    state
        .ledger_service()
        .award_points(PointEntryCreateInput {
            owner_id: "alice".into(),
            pair_id: Some("p1".into()),
            value: 3,
            reason: Some("Task: 洗碗".into()),
            ..Default::default()
        })
        .expect("shared award");
    state
        .ledger_service()
        .award_points(PointEntryCreateInput {
            owner_id: "alice".into(),
            pair_id: Some("p1".into()),
            value: 2,
            reason: Some("Personal task: 泡茶".into()),
            for_uid: Some("bob".into()),
            ..Default::default()
        })
        .expect("personal award");

    let snapshot = state
        .balance_service()
        .overview("p1", "bob")
        .expect("overview");
    assert_eq!(snapshot.shared, 3);
    assert_eq!(snapshot.personal, 2);
}
