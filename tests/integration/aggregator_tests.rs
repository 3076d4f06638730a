use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use pairly_app_lib::error::FeedErrorCode;
use pairly_app_lib::models::point_entry::{EntryScope, PointEntryRecord};
use pairly_app_lib::services::points_feed::{
    AggregatorConfig, EntryFeed, PointsAggregator,
};

fn entry(id: &str, pair: &str, value: i64, scope: EntryScope) -> PointEntryRecord {
    PointEntryRecord {
        id: id.to_string(),
        owner_id: "alice".to_string(),
        pair_id: Some(pair.to_string()),
        value,
        reason: String::new(),
        task_id: None,
        scope,
        kind: None,
        for_uid: None,
        created_at: "2026-01-01T00:00:00Z".to_string(),
    }
}

fn shared_config(pair: &str) -> AggregatorConfig {
    AggregatorConfig {
        pair_id: Some(pair.to_string()),
        owner_id: None,
        scope: EntryScope::Shared,
        beneficiary: None,
    }
}

fn watch(
    primary: &EntryFeed,
    mirror: Option<&EntryFeed>,
    config: AggregatorConfig,
) -> (PointsAggregator, Arc<AtomicI64>) {
    let total = Arc::new(AtomicI64::new(0));
    let sink_total = Arc::clone(&total);
    let mut aggregator = PointsAggregator::new(
        Arc::new(primary.clone()),
        mirror.map(|feed| Arc::new(feed.clone()) as _),
        config,
        Arc::new(move |value| sink_total.store(value, Ordering::SeqCst)),
    );
    aggregator.start();
    (aggregator, total)
}

#[test]
fn mirror_copy_wins_on_id_conflict() {
    let primary = EntryFeed::new();
    let mirror = EntryFeed::new();
    primary.publish(entry("e1", "p1", 3, EntryScope::Shared));
    mirror.publish(entry("e1", "p1", 5, EntryScope::Shared));

    let (_agg, total) = watch(&primary, Some(&mirror), shared_config("p1"));
    assert_eq!(total.load(Ordering::SeqCst), 5);
}

#[test]
fn duplicated_entries_count_once() {
    let primary = EntryFeed::new();
    let mirror = EntryFeed::new();
    let shared = entry("e1", "p1", 4, EntryScope::Shared);
    primary.publish(shared.clone());
    mirror.publish(shared);
    mirror.publish(entry("e2", "p1", 2, EntryScope::Shared));

    let (_agg, total) = watch(&primary, Some(&mirror), shared_config("p1"));
    assert_eq!(total.load(Ordering::SeqCst), 6);
}

#[test]
fn live_updates_recompute_the_total() {
    let primary = EntryFeed::new();
    let (_agg, total) = watch(&primary, None, shared_config("p1"));
    assert_eq!(total.load(Ordering::SeqCst), 0);

    primary.publish(entry("e1", "p1", 3, EntryScope::Shared));
    assert_eq!(total.load(Ordering::SeqCst), 3);

    primary.publish(entry("e2", "p1", 4, EntryScope::Shared));
    assert_eq!(total.load(Ordering::SeqCst), 7);

    primary.retract("e1");
    assert_eq!(total.load(Ordering::SeqCst), 4);
}

#[test]
fn failed_source_contributes_zero() {
    let primary = EntryFeed::new();
    let mirror = EntryFeed::new();
    primary.publish(entry("e1", "p1", 3, EntryScope::Shared));
    mirror.publish(entry("e2", "p1", 8, EntryScope::Shared));

    let (_agg, total) = watch(&primary, Some(&mirror), shared_config("p1"));
    assert_eq!(total.load(Ordering::SeqCst), 11);

    mirror.fail(FeedErrorCode::PermissionDenied);
    assert_eq!(total.load(Ordering::SeqCst), 3);
}

#[test]
fn missing_pair_index_falls_back_to_broad_query() {
    let primary = EntryFeed::new();
    primary.set_pair_filter_unsupported(true);
    primary.publish(entry("mine", "p1", 5, EntryScope::Shared));
    primary.publish(entry("other", "p2", 9, EntryScope::Shared));

    // The pair-filtered subscription is rejected; the aggregator retries
    // without the filter and drops foreign-pair entries itself.
    let (agg, total) = watch(&primary, None, shared_config("p1"));
    assert!(agg.is_running());
    assert_eq!(total.load(Ordering::SeqCst), 5);

    primary.publish(entry("mine-2", "p1", 2, EntryScope::Shared));
    primary.publish(entry("other-2", "p2", 4, EntryScope::Shared));
    assert_eq!(total.load(Ordering::SeqCst), 7);
}

#[test]
fn personal_total_filters_by_beneficiary() {
    let primary = EntryFeed::new();
    let mut for_bob = entry("e1", "p1", 5, EntryScope::Personal);
    for_bob.for_uid = Some("bob".to_string());
    let mut for_alice = entry("e2", "p1", 3, EntryScope::Personal);
    for_alice.for_uid = Some("alice".to_string());
    primary.publish(for_bob);
    primary.publish(for_alice);
    primary.publish(entry("e3", "p1", 7, EntryScope::Shared));

    let (_agg, total) = watch(
        &primary,
        None,
        AggregatorConfig {
            pair_id: Some("p1".to_string()),
            owner_id: None,
            scope: EntryScope::Personal,
            beneficiary: Some("bob".to_string()),
        },
    );
    assert_eq!(total.load(Ordering::SeqCst), 5);
}

#[test]
fn stop_then_restart_resubscribes() {
    let primary = EntryFeed::new();
    let total = Arc::new(AtomicI64::new(0));
    let sink_total = Arc::clone(&total);
    let mut aggregator = PointsAggregator::new(
        Arc::new(primary.clone()),
        None,
        shared_config("p1"),
        Arc::new(move |value| sink_total.store(value, Ordering::SeqCst)),
    );

    aggregator.start();
    primary.publish(entry("e1", "p1", 3, EntryScope::Shared));
    assert_eq!(total.load(Ordering::SeqCst), 3);

    aggregator.stop();
    assert!(!aggregator.is_running());
    primary.publish(entry("e2", "p1", 4, EntryScope::Shared));
    assert_eq!(total.load(Ordering::SeqCst), 3);

    aggregator.start();
    assert_eq!(total.load(Ordering::SeqCst), 7);
}
