use serde::Deserialize;
use serde_json::Value;

/// Field set for creating an issue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewIssue {
    pub project_key: String,
    pub summary: String,
    pub description: String,
    pub issue_type: String,
    pub priority: Option<String>,
    pub assignee: Option<String>,
    pub labels: Vec<String>,
    pub components: Vec<String>,
}

/// Partial update; only the fields that are set are sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateFields {
    pub summary: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub assignee: Option<String>,
    pub labels: Option<Vec<String>>,
}

impl UpdateFields {
    pub fn is_empty(&self) -> bool {
        self.summary.is_none()
            && self.description.is_none()
            && self.priority.is_none()
            && self.assignee.is_none()
            && self.labels.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatedIssue {
    pub id: String,
    pub key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Issue {
    #[serde(default)]
    pub id: String,
    pub key: String,
    #[serde(default)]
    pub fields: IssueFields,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IssueFields {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: Option<Value>,
    #[serde(rename = "issuetype", default)]
    pub issue_type: Option<NamedRef>,
    #[serde(default)]
    pub priority: Option<NamedRef>,
    #[serde(default)]
    pub status: Option<NamedRef>,
    #[serde(default)]
    pub assignee: Option<User>,
    #[serde(default)]
    pub reporter: Option<User>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub components: Vec<NamedRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NamedRef {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email_address: Option<String>,
}

impl User {
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.email_address.as_deref())
            .or(self.account_id.as_deref())
            .unwrap_or("")
    }
}

impl Issue {
    pub fn status_name(&self) -> &str {
        self.fields
            .status
            .as_ref()
            .map(|status| status.name.as_str())
            .unwrap_or("Unknown")
    }

    /// Plain text of the description, whether Jira returned a string or a document tree.
    pub fn description_text(&self) -> String {
        match &self.fields.description {
            Some(Value::String(text)) => text.clone(),
            Some(doc) => {
                let mut paragraphs = Vec::new();
                collect_paragraphs(doc, &mut paragraphs);
                paragraphs.join("\n\n")
            }
            None => String::new(),
        }
    }
}

fn collect_paragraphs(node: &Value, out: &mut Vec<String>) {
    let Some(children) = node.get("content").and_then(Value::as_array) else {
        return;
    };
    let is_block = node.get("type").and_then(Value::as_str) == Some("paragraph");
    if is_block {
        let text = children
            .iter()
            .filter_map(|child| child.get("text").and_then(Value::as_str))
            .collect::<String>();
        out.push(text);
        return;
    }
    for child in children {
        collect_paragraphs(child, out);
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Transition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub to: Option<NamedRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TransitionList {
    #[serde(default)]
    pub transitions: Vec<Transition>,
}

/// One page of a query-based search, addressed by offset.
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub start_at: u32,
    /// Page size that was asked for; a shorter page is the last one.
    pub max_results: u32,
    /// Number of issues matching the query, which may be an estimate.
    pub total: u32,
    pub issues: Vec<Issue>,
}

impl SearchPage {
    pub fn is_last(&self) -> bool {
        (self.issues.len() as u64) < u64::from(self.max_results)
    }
}
