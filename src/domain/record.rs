use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Local record of a ticket this tool created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketRecord {
    pub key: String,
    pub summary: String,
    pub status: String,
    #[serde(default)]
    pub blocked_by: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub creator: String,
    #[serde(default)]
    pub assignee: String,
    #[serde(
        rename = "estimated_end",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub estimated_end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub priority: String,
    #[serde(default)]
    pub issue_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
}

impl TicketRecord {
    pub fn new(key: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            summary: summary.into(),
            status: "To Do".to_string(),
            blocked_by: Vec::new(),
            created_at: Utc::now(),
            creator: String::new(),
            assignee: String::new(),
            estimated_end_date: None,
            priority: String::new(),
            issue_type: String::new(),
            project: None,
        }
    }
}
