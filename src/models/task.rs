use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Shared,
    Personal,
}

impl TaskKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskKind::Shared => "shared",
            TaskKind::Personal => "personal",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "shared" => Some(TaskKind::Shared),
            "personal" => Some(TaskKind::Personal),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub id: String,
    pub title: String,
    pub owner_id: String,
    pub pair_id: Option<String>,
    pub kind: TaskKind,
    /// Beneficiary of a personal task; unused for shared tasks.
    pub for_uid: Option<String>,
    pub done: bool,
    /// Points actually awarded on completion (0 while open).
    pub points: i64,
    /// Points the task is configured to award when completed.
    pub worth: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskCreateInput {
    pub title: String,
    pub owner_id: String,
    #[serde(default)]
    pub pair_id: Option<String>,
    #[serde(default)]
    pub kind: Option<TaskKind>,
    #[serde(default)]
    pub for_uid: Option<String>,
    #[serde(default)]
    pub worth: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdateInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub kind: Option<TaskKind>,
    #[serde(default)]
    pub for_uid: Option<Option<String>>,
    #[serde(default)]
    pub worth: Option<i64>,
}
