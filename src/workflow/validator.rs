use std::sync::Arc;

use crate::domain::issue::NewIssue;
use crate::domain::ticket::{IssueType, Priority};
use crate::error::{TrackerError, TrackerResult};
use crate::services::IssueTrackerService;

pub const MAX_SUMMARY_LENGTH: usize = 255;

fn allowed_values<T>(values: &[T], name: impl Fn(&T) -> &'static str) -> String {
    let names = values.iter().map(name).collect::<Vec<_>>();
    format!("must be one of: {}", names.join(", "))
}

pub fn validate_priority(priority: &str) -> TrackerResult<Priority> {
    Priority::parse(priority).ok_or_else(|| {
        TrackerError::validation_with_details(
            "priority",
            "invalid priority",
            allowed_values(&Priority::ALL, Priority::as_str),
        )
    })
}

pub fn validate_issue_type(issue_type: &str) -> TrackerResult<IssueType> {
    IssueType::parse(issue_type).ok_or_else(|| {
        TrackerError::validation_with_details(
            "issue_type",
            "invalid issue type",
            allowed_values(&IssueType::ALL, IssueType::as_str),
        )
    })
}

/// Non-empty and at most 255 characters.
pub fn validate_summary(summary: &str) -> TrackerResult<()> {
    if summary.trim().is_empty() {
        return Err(TrackerError::validation("summary", "summary is required"));
    }
    let length = summary.chars().count();
    if length > MAX_SUMMARY_LENGTH {
        return Err(TrackerError::validation_with_details(
            "summary",
            "summary is too long",
            format!("maximum {MAX_SUMMARY_LENGTH} characters, got {length}"),
        ));
    }
    Ok(())
}

pub fn validate_labels(labels: &[String]) -> TrackerResult<()> {
    if labels.iter().any(|label| label.trim().is_empty()) {
        return Err(TrackerError::validation("labels", "label cannot be empty"));
    }
    Ok(())
}

/// Summary, issue type, priority (when set) and project, stopping at the first failure.
pub fn validate_create_request(issue: &NewIssue) -> TrackerResult<()> {
    validate_summary(&issue.summary)?;
    validate_issue_type(&issue.issue_type)?;
    if let Some(priority) = issue
        .priority
        .as_deref()
        .filter(|value| !value.trim().is_empty())
    {
        validate_priority(priority)?;
    }
    if issue.project_key.trim().is_empty() {
        return Err(TrackerError::validation(
            "project",
            "project key is required",
        ));
    }
    Ok(())
}

/// Checks that referenced tickets exist on the tracker.
#[derive(Clone)]
pub struct Validator {
    tracker: Arc<dyn IssueTrackerService>,
}

impl Validator {
    pub fn new(tracker: Arc<dyn IssueTrackerService>) -> Self {
        Self { tracker }
    }

    /// A missing ticket is a validation failure; any other error passes through.
    pub async fn ticket_exists(&self, key: &str) -> TrackerResult<()> {
        match self.tracker.get_issue(key).await {
            Ok(_) => Ok(()),
            Err(err) if err.is_not_found() => Err(TrackerError::validation_with_details(
                "ticket_key",
                format!("ticket not found: {key}"),
                "verify the ticket key is correct",
            )),
            Err(err) => Err(err),
        }
    }

    pub async fn tickets_exist(&self, keys: &[String]) -> TrackerResult<()> {
        for key in keys {
            self.ticket_exists(key).await?;
        }
        Ok(())
    }
}
