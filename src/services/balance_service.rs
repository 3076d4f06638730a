use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::db::repositories::point_entry_repository::PointEntryRepository;
use crate::db::repositories::redemption_repository::RedemptionRepository;
use crate::db::repositories::task_repository::TaskRepository;
use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::point_entry::EntryScope;
use crate::utils::points::spendable;

/// Derived balances for the points screen.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BalanceSnapshot {
    pub shared: i64,
    pub personal: i64,
}

#[derive(Clone)]
pub struct BalanceService {
    db: DbPool,
}

impl BalanceService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub fn shared_balance(&self, pair_id: &str) -> AppResult<i64> {
        self.db.with_connection(|conn| shared_balance(conn, pair_id))
    }

    pub fn personal_balance(&self, pair_id: &str, user_id: &str) -> AppResult<i64> {
        self.db
            .with_connection(|conn| personal_balance(conn, pair_id, user_id))
    }

    pub fn overview(&self, pair_id: &str, user_id: &str) -> AppResult<BalanceSnapshot> {
        self.db.with_connection(|conn| {
            Ok(BalanceSnapshot {
                shared: shared_balance(conn, pair_id)?,
                personal: personal_balance(conn, pair_id, user_id)?,
            })
        })
    }
}

/// Shared spendable balance for a pair.
///
/// "Earned" is derived twice: from positive shared ledger entries and from
/// the points cached on completed shared tasks. The two can diverge when an
/// undo removed an entry but not the task state (or vice versa); the larger
/// value wins. Spend counts redemption records plus debits left behind by
/// the retired negative-entry path.
pub fn shared_balance(conn: &Connection, pair_id: &str) -> AppResult<i64> {
    let ledger_earned = PointEntryRepository::earned_shared_total(conn, pair_id)?;
    let task_earned = TaskRepository::shared_points_total(conn, pair_id)?;
    let earned = ledger_earned.max(task_earned);

    let spent = RedemptionRepository::shared_spent_total(conn, pair_id)?
        + PointEntryRepository::legacy_shared_debit_total(conn, pair_id)?;

    debug!(
        target: "app::points",
        pair_id = %pair_id,
        ledger_earned,
        task_earned,
        spent,
        "shared balance computed"
    );
    Ok(spendable(earned, spent))
}

/// Personal spendable balance: awards credited to `user_id`, net of that
/// partner's own personal spend only.
pub fn personal_balance(conn: &Connection, pair_id: &str, user_id: &str) -> AppResult<i64> {
    let earned = PointEntryRepository::earned_personal_total(conn, pair_id, user_id)?;
    let spent = RedemptionRepository::personal_spent_total(conn, pair_id, user_id)?
        + PointEntryRepository::legacy_personal_debit_total(conn, pair_id, user_id)?;
    Ok(spendable(earned, spent))
}

pub fn scope_balance(
    conn: &Connection,
    pair_id: &str,
    scope: EntryScope,
    user_id: &str,
) -> AppResult<i64> {
    match scope {
        EntryScope::Shared => shared_balance(conn, pair_id),
        EntryScope::Personal => personal_balance(conn, pair_id, user_id),
    }
}
