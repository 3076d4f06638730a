use serde::{Deserialize, Serialize};

/// Authoritative classification of a ledger movement. Written at entry
/// creation time; legacy rows without it are classified once during
/// migration or at ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryScope {
    Shared,
    Personal,
}

impl EntryScope {
    pub fn as_str(self) -> &'static str {
        match self {
            EntryScope::Shared => "shared",
            EntryScope::Personal => "personal",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "shared" => Some(EntryScope::Shared),
            "personal" => Some(EntryScope::Personal),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PointEntryRecord {
    pub id: String,
    pub owner_id: String,
    pub pair_id: Option<String>,
    pub value: i64,
    pub reason: String,
    pub task_id: Option<String>,
    pub scope: EntryScope,
    pub kind: Option<String>,
    pub for_uid: Option<String>,
    pub created_at: String,
}

impl PointEntryRecord {
    /// The partner the entry is credited to. Personal awards carry an
    /// explicit `for_uid`; older rows fall back to the writer.
    pub fn beneficiary(&self) -> &str {
        self.for_uid.as_deref().unwrap_or(&self.owner_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PointEntryCreateInput {
    pub owner_id: String,
    #[serde(default)]
    pub pair_id: Option<String>,
    pub value: i64,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub scope: Option<EntryScope>,
    #[serde(default)]
    pub for_uid: Option<String>,
}

/// The classification-relevant subset of an entry, in the loose shape
/// older client revisions wrote it (string scope, optional everything).
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EntryMeta {
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub for_uid: Option<String>,
}

/// Wire shape of a ledger entry arriving from the partner device, which
/// may still run a revision that never wrote an authoritative scope.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemotePointEntry {
    pub id: String,
    pub owner_id: String,
    #[serde(default)]
    pub pair_id: Option<String>,
    pub value: i64,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub for_uid: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl RemotePointEntry {
    pub fn meta(&self) -> EntryMeta {
        EntryMeta {
            reason: self.reason.clone(),
            scope: self.scope.clone(),
            kind: self.kind.clone(),
            for_uid: self.for_uid.clone(),
        }
    }
}
