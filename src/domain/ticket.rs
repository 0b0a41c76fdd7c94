use std::fmt;

use serde::{Deserialize, Serialize};

/// Input description of a ticket that has not been created yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketSpec {
    pub summary: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub issue_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub components: Vec<String>,
    #[serde(default)]
    pub blocked_by: Vec<String>,
}

impl TicketSpec {
    pub fn new(summary: impl Into<String>, issue_type: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            issue_type: issue_type.into(),
            ..Self::default()
        }
    }

    /// Fills the issue type and priority from defaults when the input left them blank.
    pub fn with_defaults(mut self, issue_type: &str, priority: &str) -> Self {
        if self.issue_type.trim().is_empty() {
            self.issue_type = issue_type.to_string();
        }
        if self
            .priority
            .as_deref()
            .is_none_or(|value| value.trim().is_empty())
        {
            self.priority = Some(priority.to_string());
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Lowest,
    Low,
    Medium,
    High,
    Highest,
}

impl Priority {
    pub const ALL: [Priority; 5] = [
        Priority::Lowest,
        Priority::Low,
        Priority::Medium,
        Priority::High,
        Priority::Highest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Lowest => "Lowest",
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
            Priority::Highest => "Highest",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|priority| priority.as_str().eq_ignore_ascii_case(value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueType {
    Task,
    Story,
    Bug,
    Epic,
    Subtask,
}

impl IssueType {
    pub const ALL: [IssueType; 5] = [
        IssueType::Task,
        IssueType::Story,
        IssueType::Bug,
        IssueType::Epic,
        IssueType::Subtask,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IssueType::Task => "Task",
            IssueType::Story => "Story",
            IssueType::Bug => "Bug",
            IssueType::Epic => "Epic",
            IssueType::Subtask => "Subtask",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|issue_type| issue_type.as_str().eq_ignore_ascii_case(value))
    }
}

/// Named relationship between two issues. The outward issue acts on the inward one,
/// so for `Blocks` the outward issue blocks the inward issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkKind {
    Blocks,
    Relates,
    Duplicates,
    Clones,
    Other(String),
}

impl LinkKind {
    pub fn as_str(&self) -> &str {
        match self {
            LinkKind::Blocks => "Blocks",
            LinkKind::Relates => "Relates",
            LinkKind::Duplicates => "Duplicates",
            LinkKind::Clones => "Clones",
            LinkKind::Other(name) => name,
        }
    }

    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "blocks" => LinkKind::Blocks,
            "relates" => LinkKind::Relates,
            "duplicates" => LinkKind::Duplicates,
            "clones" => LinkKind::Clones,
            _ => LinkKind::Other(value.trim().to_string()),
        }
    }
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
