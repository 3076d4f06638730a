use serde::{Deserialize, Serialize};

use crate::models::point_entry::EntryScope;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RewardRecord {
    pub id: String,
    pub owner_id: String,
    pub pair_id: Option<String>,
    pub title: String,
    pub cost: i64,
    pub scope: EntryScope,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RewardCreateInput {
    pub title: String,
    pub cost: i64,
    pub owner_id: String,
    #[serde(default)]
    pub pair_id: Option<String>,
    #[serde(default)]
    pub scope: Option<EntryScope>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RewardUpdateInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub cost: Option<i64>,
    #[serde(default)]
    pub scope: Option<EntryScope>,
}

/// One spend of accumulated points. Append-only; undo deletes the record
/// instead of writing a reversal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RewardRedemptionRecord {
    pub id: String,
    pub reward_id: String,
    pub title: String,
    pub cost: i64,
    pub scope: EntryScope,
    pub pair_id: Option<String>,
    pub redeemed_by: String,
    pub created_at: String,
}
