use std::sync::Arc;
use std::thread;

use pairly_app_lib::db::DbPool;
use pairly_app_lib::error::AppError;
use pairly_app_lib::models::point_entry::{EntryScope, PointEntryCreateInput};
use pairly_app_lib::models::reward::RewardCreateInput;
use pairly_app_lib::AppState;
use tempfile::tempdir;

fn setup_state() -> (AppState, tempfile::TempDir) {
    let dir = tempdir().expect("temp dir");
    let db_path = dir.path().join("redemptions.sqlite");
    let pool = DbPool::new(db_path).expect("db pool");
    let state = AppState::new(pool).expect("app state");
    (state, dir)
}

fn earn_shared(state: &AppState, pair_id: &str, value: i64) {
    state
        .ledger_service()
        .award_points(PointEntryCreateInput {
            owner_id: "alice".into(),
            pair_id: Some(pair_id.into()),
            value,
            reason: Some("Task: 打扫".into()),
            ..Default::default()
        })
        .expect("award");
}

#[test]
fn redeem_deducts_from_the_balance() {
    let (state, _dir) = setup_state();
    earn_shared(&state, "p1", 10);
    let reward = state
        .reward_service()
        .create_reward(RewardCreateInput {
            title: "电影之夜".into(),
            cost: 4,
            owner_id: "alice".into(),
            pair_id: Some("p1".into()),
            ..Default::default()
        })
        .expect("create reward");

    let redemption = state
        .reward_service()
        .redeem(&reward.id, "bob")
        .expect("redeem");
    assert_eq!(redemption.cost, 4);
    assert_eq!(redemption.redeemed_by, "bob");

    assert_eq!(
        state
            .balance_service()
            .shared_balance("p1")
            .expect("balance"),
        6
    );
}

#[test]
fn shortfall_reports_required_and_available() {
    let (state, _dir) = setup_state();
    earn_shared(&state, "p1", 3);
    let reward = state
        .reward_service()
        .create_reward(RewardCreateInput {
            title: "按摩券".into(),
            cost: 8,
            owner_id: "alice".into(),
            pair_id: Some("p1".into()),
            ..Default::default()
        })
        .expect("create reward");

    match state.reward_service().redeem(&reward.id, "bob") {
        Err(AppError::InsufficientPoints {
            required,
            available,
            scope,
        }) => {
            assert_eq!(required, 8);
            assert_eq!(available, 3);
            assert_eq!(scope, EntryScope::Shared);
        }
        other => panic!("expected InsufficientPoints, got {:?}", other.err()),
    }
}

#[test]
fn undo_restores_the_balance() {
    let (state, _dir) = setup_state();
    earn_shared(&state, "p1", 10);
    let reward = state
        .reward_service()
        .create_reward(RewardCreateInput {
            title: "电影之夜".into(),
            cost: 10,
            owner_id: "alice".into(),
            pair_id: Some("p1".into()),
            ..Default::default()
        })
        .expect("create reward");

    let redemption = state
        .reward_service()
        .redeem(&reward.id, "bob")
        .expect("redeem");
    assert_eq!(
        state
            .balance_service()
            .shared_balance("p1")
            .expect("balance"),
        0
    );

    state
        .reward_service()
        .undo_redemption(&redemption.id)
        .expect("undo");
    assert_eq!(
        state
            .balance_service()
            .shared_balance("p1")
            .expect("balance after undo"),
        10
    );

    // Undoing twice fails: the record is gone.
    let again = state.reward_service().undo_redemption(&redemption.id);
    assert!(matches!(again, Err(AppError::NotFound)));
}

#[test]
fn personal_reward_spends_the_beneficiary_pool() {
    let (state, _dir) = setup_state();
    state
        .ledger_service()
        .award_points(PointEntryCreateInput {
            owner_id: "alice".into(),
            pair_id: Some("p1".into()),
            value: 7,
            reason: Some("Personal task: 跑腿".into()),
            for_uid: Some("bob".into()),
            ..Default::default()
        })
        .expect("personal award");

    let reward = state
        .reward_service()
        .create_reward(RewardCreateInput {
            title: "睡懒觉".into(),
            cost: 5,
            owner_id: "bob".into(),
            pair_id: Some("p1".into()),
            scope: Some(EntryScope::Personal),
            ..Default::default()
        })
        .expect("create reward");

    state
        .reward_service()
        .redeem(&reward.id, "bob")
        .expect("redeem");
    assert_eq!(
        state
            .balance_service()
            .personal_balance("p1", "bob")
            .expect("bob balance"),
        2
    );

    // Alice's personal pool is untouched by Bob's spend.
    assert_eq!(
        state
            .balance_service()
            .personal_balance("p1", "alice")
            .expect("alice balance"),
        0
    );
}

#[test]
fn concurrent_redeems_never_overspend() {
    let (state, _dir) = setup_state();
    earn_shared(&state, "p1", 10);
    let reward = state
        .reward_service()
        .create_reward(RewardCreateInput {
            title: "电影之夜".into(),
            cost: 10,
            owner_id: "alice".into(),
            pair_id: Some("p1".into()),
            ..Default::default()
        })
        .expect("create reward");

    let reward_id = Arc::new(reward.id);
    let handles: Vec<_> = ["alice", "bob"]
        .into_iter()
        .map(|user| {
            let service = Arc::clone(state.reward_service());
            let reward_id = Arc::clone(&reward_id);
            thread::spawn(move || service.redeem(&reward_id, user))
        })
        .collect();

    let results: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().expect("thread"))
        .collect();

    let succeeded = results.iter().filter(|result| result.is_ok()).count();
    assert_eq!(succeeded, 1, "exactly one redeem may win the balance");
    assert!(results.iter().any(|result| matches!(
        result,
        Err(AppError::InsufficientPoints { .. })
    )));

    assert_eq!(
        state
            .balance_service()
            .shared_balance("p1")
            .expect("balance"),
        0
    );
}
