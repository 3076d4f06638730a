//! Classification of ledger entries into shared vs. personal scope.
//!
//! New entries get an authoritative scope at write time, so this cascade
//! only runs for rows that predate it: the migration backfill and entries
//! ingested from a partner device on an older revision. The reason-string
//! prefix outranks the explicit flags because it was written consistently
//! across every revision; `scope`/`kind` arrived later and may be absent.

use crate::models::point_entry::{EntryMeta, EntryScope};

const PERSONAL_TASK_PREFIX: &str = "personal task:";
const SHARED_TASK_PREFIX: &str = "task:";

/// Priority order, first match wins:
/// reason prefix, then explicit scope/kind flags, then legacy `forUid`
/// presence, then shared by default.
pub fn classify_entry(meta: &EntryMeta) -> EntryScope {
    if let Some(reason) = meta.reason.as_deref() {
        let lowered = reason.trim().to_lowercase();
        if lowered.starts_with(PERSONAL_TASK_PREFIX) {
            return EntryScope::Personal;
        }
        if lowered.starts_with(SHARED_TASK_PREFIX) {
            return EntryScope::Shared;
        }
    }

    if meta.scope.as_deref() == Some("personal") || meta.kind.as_deref() == Some("personal") {
        return EntryScope::Personal;
    }

    if meta.for_uid.is_some() {
        return EntryScope::Personal;
    }

    EntryScope::Shared
}

pub fn is_personal_meta(meta: &EntryMeta) -> bool {
    classify_entry(meta) == EntryScope::Personal
}

/// Spendable balance for display. Overspend from historical races is
/// clamped, never shown as negative.
pub fn spendable(earned: i64, spent: i64) -> i64 {
    (earned - spent).max(0)
}
