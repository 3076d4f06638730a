use serde::{Deserialize, Serialize};

/// Two linked accounts sharing tasks and points. A pair starts with a
/// single member plus an invite code the partner joins with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PairRecord {
    pub id: String,
    pub member_a: String,
    pub member_b: Option<String>,
    pub invite_code: String,
    pub created_at: String,
}

impl PairRecord {
    pub fn is_member(&self, user_id: &str) -> bool {
        self.member_a == user_id || self.member_b.as_deref() == Some(user_id)
    }

    pub fn partner_of(&self, user_id: &str) -> Option<&str> {
        if self.member_a == user_id {
            self.member_b.as_deref()
        } else if self.member_b.as_deref() == Some(user_id) {
            Some(self.member_a.as_str())
        } else {
            None
        }
    }
}
