use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StreakRecord {
    pub pair_id: String,
    pub current: i64,
    pub longest: i64,
    /// `%Y-%m-%d` of the last day either partner completed a task.
    pub last_active_date: Option<String>,
}

impl StreakRecord {
    pub fn empty(pair_id: impl Into<String>) -> Self {
        Self {
            pair_id: pair_id.into(),
            current: 0,
            longest: 0,
            last_active_date: None,
        }
    }
}
