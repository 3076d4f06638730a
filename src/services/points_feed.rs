//! Live point totals over injectable entry sources.
//!
//! The app shows balances that update while either partner is writing, so
//! totals are not one-shot queries: a [`PointsAggregator`] subscribes to a
//! primary source (the local ledger feed) and an optional mirror source
//! (entries replicated from the partner device) and recomputes on every
//! event. The two sources can overlap; merging is keyed by entry id and the
//! mirror copy wins on conflict, so a duplicated entry is counted once.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::error::FeedErrorCode;
use crate::models::point_entry::{EntryScope, PointEntryRecord};

pub type FeedSink = Arc<dyn Fn(FeedEvent) + Send + Sync>;
pub type TotalSink = Arc<dyn Fn(i64) + Send + Sync>;

#[derive(Debug, Clone)]
pub enum FeedEvent {
    /// Initial snapshot, or a full re-sync after reconnect.
    Reset(Vec<PointEntryRecord>),
    Upsert(PointEntryRecord),
    Remove { id: String },
    /// The source is no longer delivering; its data must not be trusted.
    Failed(FeedErrorCode),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryQuery {
    pub owner_id: Option<String>,
    pub pair_id: Option<String>,
}

impl EntryQuery {
    pub fn matches(&self, entry: &PointEntryRecord) -> bool {
        if let Some(owner) = &self.owner_id {
            if &entry.owner_id != owner {
                return false;
            }
        }
        if let Some(pair) = &self.pair_id {
            if entry.pair_id.as_deref() != Some(pair.as_str()) {
                return false;
            }
        }
        true
    }

    pub fn without_pair_filter(&self) -> Self {
        Self {
            owner_id: self.owner_id.clone(),
            pair_id: None,
        }
    }
}

/// A live stream of ledger entries. Sinks receive an initial `Reset`
/// snapshot followed by incremental events until the subscription drops.
pub trait EntrySource: Send + Sync {
    fn subscribe(&self, query: &EntryQuery, sink: FeedSink) -> Result<Subscription, FeedErrorCode>;
}

/// Detaches the sink when dropped.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

struct FeedState {
    entries: BTreeMap<String, PointEntryRecord>,
    subscribers: HashMap<u64, (EntryQuery, FeedSink)>,
}

/// In-process entry source. Serves as the local ledger feed (published to by
/// the ledger service after each committed write) and as the mirror feed the
/// sync layer pushes partner entries into. Tests drive it directly.
#[derive(Clone)]
pub struct EntryFeed {
    inner: Arc<FeedInner>,
}

struct FeedInner {
    state: Mutex<FeedState>,
    next_token: AtomicU64,
    pair_filter_unsupported: AtomicBool,
}

impl EntryFeed {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(FeedInner {
                state: Mutex::new(FeedState {
                    entries: BTreeMap::new(),
                    subscribers: HashMap::new(),
                }),
                next_token: AtomicU64::new(1),
                pair_filter_unsupported: AtomicBool::new(false),
            }),
        }
    }

    /// Declare that this source cannot serve pair-filtered subscriptions,
    /// mimicking a backend whose composite index is missing. Subscribers
    /// are expected to retry with a broader query.
    pub fn set_pair_filter_unsupported(&self, unsupported: bool) {
        self.inner
            .pair_filter_unsupported
            .store(unsupported, Ordering::SeqCst);
    }

    pub fn publish(&self, entry: PointEntryRecord) {
        // An upsert can move an entry out of a subscriber's filter (a
        // changed pair_id or owner_id); those subscribers get a Remove so
        // they do not keep the old copy until the next Reset.
        let (remove_sinks, upsert_sinks): (Vec<FeedSink>, Vec<FeedSink>) = {
            let Ok(mut state) = self.inner.state.lock() else {
                return;
            };
            let previous = state.entries.insert(entry.id.clone(), entry.clone());
            let removes = state
                .subscribers
                .values()
                .filter(|(query, _)| {
                    !query.matches(&entry)
                        && previous.as_ref().is_some_and(|old| query.matches(old))
                })
                .map(|(_, sink)| Arc::clone(sink))
                .collect();
            let upserts = state
                .subscribers
                .values()
                .filter(|(query, _)| query.matches(&entry))
                .map(|(_, sink)| Arc::clone(sink))
                .collect();
            (removes, upserts)
        };
        for sink in remove_sinks {
            sink(FeedEvent::Remove {
                id: entry.id.clone(),
            });
        }
        for sink in upsert_sinks {
            sink(FeedEvent::Upsert(entry.clone()));
        }
    }

    pub fn retract(&self, id: &str) {
        let sinks: Vec<FeedSink> = {
            let Ok(mut state) = self.inner.state.lock() else {
                return;
            };
            state.entries.remove(id);
            state
                .subscribers
                .values()
                .map(|(_, sink)| Arc::clone(sink))
                .collect()
        };
        for sink in sinks {
            sink(FeedEvent::Remove { id: id.to_string() });
        }
    }

    /// Broadcast a source failure to every subscriber.
    pub fn fail(&self, code: FeedErrorCode) {
        let sinks: Vec<FeedSink> = {
            let Ok(state) = self.inner.state.lock() else {
                return;
            };
            state
                .subscribers
                .values()
                .map(|(_, sink)| Arc::clone(sink))
                .collect()
        };
        for sink in sinks {
            sink(FeedEvent::Failed(code));
        }
    }
}

impl Default for EntryFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl EntrySource for EntryFeed {
    fn subscribe(&self, query: &EntryQuery, sink: FeedSink) -> Result<Subscription, FeedErrorCode> {
        if query.pair_id.is_some() && self.inner.pair_filter_unsupported.load(Ordering::SeqCst) {
            return Err(FeedErrorCode::IndexUnavailable);
        }

        let token = self.inner.next_token.fetch_add(1, Ordering::SeqCst);
        let snapshot: Vec<PointEntryRecord> = {
            let Ok(mut state) = self.inner.state.lock() else {
                return Err(FeedErrorCode::Unknown);
            };
            state
                .subscribers
                .insert(token, (query.clone(), Arc::clone(&sink)));
            state
                .entries
                .values()
                .filter(|entry| query.matches(entry))
                .cloned()
                .collect()
        };
        sink(FeedEvent::Reset(snapshot));

        let inner = Arc::downgrade(&self.inner);
        Ok(Subscription::new(move || {
            if let Some(inner) = inner.upgrade() {
                if let Ok(mut state) = inner.state.lock() {
                    state.subscribers.remove(&token);
                }
            }
        }))
    }
}

#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    pub pair_id: Option<String>,
    pub owner_id: Option<String>,
    pub scope: EntryScope,
    /// For personal totals: only entries credited to this partner count.
    pub beneficiary: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceSlot {
    Primary,
    Mirror,
}

impl SourceSlot {
    fn as_str(self) -> &'static str {
        match self {
            SourceSlot::Primary => "primary",
            SourceSlot::Mirror => "mirror",
        }
    }
}

#[derive(Default)]
struct AggregatorState {
    primary: HashMap<String, PointEntryRecord>,
    mirror: HashMap<String, PointEntryRecord>,
    last_total: Option<i64>,
}

/// Continuously updated point total over a primary and an optional mirror
/// source. `start` attaches both subscriptions, `stop` (or drop) detaches
/// them. Source failures degrade to a zero contribution from that source;
/// they never surface to the total callback.
pub struct PointsAggregator {
    primary: Arc<dyn EntrySource>,
    mirror: Option<Arc<dyn EntrySource>>,
    config: Arc<AggregatorConfig>,
    state: Arc<Mutex<AggregatorState>>,
    on_total: TotalSink,
    subscriptions: Vec<Subscription>,
}

impl PointsAggregator {
    pub fn new(
        primary: Arc<dyn EntrySource>,
        mirror: Option<Arc<dyn EntrySource>>,
        config: AggregatorConfig,
        on_total: TotalSink,
    ) -> Self {
        Self {
            primary,
            mirror,
            config: Arc::new(config),
            state: Arc::new(Mutex::new(AggregatorState::default())),
            on_total,
            subscriptions: Vec::new(),
        }
    }

    pub fn start(&mut self) {
        if !self.subscriptions.is_empty() {
            return;
        }
        if let Ok(mut state) = self.state.lock() {
            *state = AggregatorState::default();
        }

        let primary = Arc::clone(&self.primary);
        if let Some(sub) = self.attach(&primary, SourceSlot::Primary) {
            self.subscriptions.push(sub);
        }
        if let Some(mirror) = self.mirror.clone() {
            if let Some(sub) = self.attach(&mirror, SourceSlot::Mirror) {
                self.subscriptions.push(sub);
            }
        }
    }

    pub fn stop(&mut self) {
        self.subscriptions.clear();
    }

    pub fn is_running(&self) -> bool {
        !self.subscriptions.is_empty()
    }

    pub fn current_total(&self) -> i64 {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.last_total)
            .unwrap_or(0)
    }

    fn attach(&self, source: &Arc<dyn EntrySource>, slot: SourceSlot) -> Option<Subscription> {
        let query = EntryQuery {
            owner_id: self.config.owner_id.clone(),
            pair_id: self.config.pair_id.clone(),
        };
        let sink = self.make_sink(slot);

        match source.subscribe(&query, Arc::clone(&sink)) {
            Ok(sub) => Some(sub),
            Err(FeedErrorCode::IndexUnavailable) if query.pair_id.is_some() => {
                // No composite index for the pair-filtered query; fall back
                // to the owner-only query and filter the pair in memory.
                warn!(
                    target: "app::points::feed",
                    slot = slot.as_str(),
                    "pair-filtered subscription rejected, retrying without pair filter"
                );
                match source.subscribe(&query.without_pair_filter(), sink) {
                    Ok(sub) => Some(sub),
                    Err(code) => {
                        warn!(
                            target: "app::points::feed",
                            slot = slot.as_str(),
                            code = code.as_str(),
                            "fallback subscription failed, source contributes zero"
                        );
                        None
                    }
                }
            }
            Err(code) => {
                warn!(
                    target: "app::points::feed",
                    slot = slot.as_str(),
                    code = code.as_str(),
                    "subscription failed, source contributes zero"
                );
                None
            }
        }
    }

    fn make_sink(&self, slot: SourceSlot) -> FeedSink {
        let state = Arc::clone(&self.state);
        let config = Arc::clone(&self.config);
        let on_total = Arc::clone(&self.on_total);

        Arc::new(move |event| {
            let Ok(mut guard) = state.lock() else {
                return;
            };

            {
                let map = match slot {
                    SourceSlot::Primary => &mut guard.primary,
                    SourceSlot::Mirror => &mut guard.mirror,
                };
                match event {
                    FeedEvent::Reset(entries) => {
                        map.clear();
                        for entry in entries {
                            map.insert(entry.id.clone(), entry);
                        }
                    }
                    FeedEvent::Upsert(entry) => {
                        map.insert(entry.id.clone(), entry);
                    }
                    FeedEvent::Remove { id } => {
                        map.remove(&id);
                    }
                    FeedEvent::Failed(code) => {
                        warn!(
                            target: "app::points::feed",
                            slot = slot.as_str(),
                            code = code.as_str(),
                            "source failed, dropping its contribution"
                        );
                        map.clear();
                    }
                }
            }

            let total = merged_total(&guard, &config);
            if guard.last_total != Some(total) {
                guard.last_total = Some(total);
                drop(guard);
                debug!(target: "app::points::feed", total, "total changed");
                on_total(total);
            }
        })
    }
}

impl Drop for PointsAggregator {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Merge primary and mirror maps (mirror wins on id conflict), keep
/// qualifying awards, sum their values.
fn merged_total(state: &AggregatorState, config: &AggregatorConfig) -> i64 {
    let primary_only = state
        .primary
        .iter()
        .filter(|(id, _)| !state.mirror.contains_key(*id))
        .map(|(_, entry)| entry);

    primary_only
        .chain(state.mirror.values())
        .filter(|entry| qualifies(entry, config))
        .map(|entry| entry.value)
        .sum()
}

fn qualifies(entry: &PointEntryRecord, config: &AggregatorConfig) -> bool {
    if entry.value <= 0 {
        return false;
    }
    if let Some(pair) = &config.pair_id {
        if entry.pair_id.as_deref() != Some(pair.as_str()) {
            return false;
        }
    }
    if entry.scope != config.scope {
        return false;
    }
    if config.scope == EntryScope::Personal {
        if let Some(beneficiary) = &config.beneficiary {
            if entry.beneficiary() != beneficiary {
                return false;
            }
        }
    }
    true
}
