use tracing::{info, warn};

use crate::config::AppConfig;
use crate::context::AppContext;
use crate::domain::issue::CreatedIssue;
use crate::domain::record::TicketRecord;
use crate::domain::ticket::TicketSpec;
use crate::error::{AppResult, TrackerError};
use crate::workflow::batch::new_issue_from_spec;
use crate::workflow::validator::{Validator, validate_create_request, validate_labels};

pub struct TicketWorkflowOutcome {
    pub created: CreatedIssue,
    pub url: Option<String>,
    /// Blockers that could not be linked; the ticket itself exists.
    pub link_failures: Vec<TrackerError>,
}

/// Validates, creates and links a single ticket, then records it locally.
pub async fn create_ticket(ctx: &AppContext, spec: TicketSpec) -> AppResult<TicketWorkflowOutcome> {
    let project_key = ctx.config.project_key()?;
    let spec = spec.with_defaults(&ctx.config.default_issue_type, &ctx.config.default_priority);
    let issue = new_issue_from_spec(&project_key, &spec);

    validate_create_request(&issue)?;
    validate_labels(&issue.labels)?;
    if !spec.blocked_by.is_empty() {
        Validator::new(ctx.issue_tracker.clone())
            .tickets_exist(&spec.blocked_by)
            .await
            .map_err(|err| err.context("blocked-by validation failed"))?;
    }

    let created = ctx.issue_tracker.create_issue(&issue).await?;
    info!("Created {}", created.key);

    let mut link_failures = Vec::new();
    for blocker in &spec.blocked_by {
        match ctx.issue_tracker.link_blocks(blocker, &created.key).await {
            Ok(()) => info!("Linked {blocker} blocks {}", created.key),
            Err(err) => {
                warn!("could not link {blocker} blocks {}: {err}", created.key);
                link_failures.push(err);
            }
        }
    }

    let record = record_for(&ctx.config, &created.key, &spec);
    if let Err(err) = ctx.store.add(record) {
        warn!("ticket {} was created but not recorded: {err}", created.key);
    }

    Ok(TicketWorkflowOutcome {
        url: ctx.config.browse_url(&created.key),
        created,
        link_failures,
    })
}

/// Local record for a ticket created from `spec`.
pub fn record_for(config: &AppConfig, key: &str, spec: &TicketSpec) -> TicketRecord {
    TicketRecord {
        blocked_by: spec.blocked_by.clone(),
        creator: config.jira_email.clone().unwrap_or_default(),
        assignee: spec.assignee.clone().unwrap_or_default(),
        priority: spec.priority.clone().unwrap_or_default(),
        issue_type: spec.issue_type.clone(),
        project: config
            .project_mapping
            .find_project_for_key(key)
            .map(str::to_string),
        ..TicketRecord::new(key, spec.summary.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tempfile::TempDir;

    use super::*;
    use crate::error::AppError;
    use crate::services::TicketStore;
    use crate::test_support::{MockTracker, test_context as context};

    #[tokio::test]
    async fn creates_links_and_records_ticket() {
        let dir = TempDir::new().unwrap();
        let tracker = Arc::new(MockTracker::new().with_existing(&["PROJ-1"]));
        let (ctx, store) = context(tracker.clone(), dir.path());

        let spec = TicketSpec {
            blocked_by: vec!["PROJ-1".to_string()],
            ..TicketSpec::new("Add login", "")
        };
        let outcome = create_ticket(&ctx, spec).await.unwrap();

        assert_eq!(outcome.created.key, "PROJ-101");
        assert_eq!(
            outcome.url.as_deref(),
            Some("https://jira.example.com/browse/PROJ-101")
        );
        assert!(outcome.link_failures.is_empty());

        let created = tracker.created();
        assert_eq!(created[0].issue_type, "Task");
        assert_eq!(created[0].priority.as_deref(), Some("Medium"));
        assert_eq!(
            tracker.links(),
            vec![(
                "Blocks".to_string(),
                "PROJ-1".to_string(),
                "PROJ-101".to_string()
            )]
        );

        let record = store.get_by_key("PROJ-101").unwrap().unwrap();
        assert_eq!(record.summary, "Add login");
        assert_eq!(record.creator, "dev@example.com");
        assert_eq!(record.blocked_by, vec!["PROJ-1"]);
        assert_eq!(record.project.as_deref(), Some("Platform"));
    }

    #[tokio::test]
    async fn link_failures_do_not_fail_creation() {
        let dir = TempDir::new().unwrap();
        let tracker = Arc::new(
            MockTracker::new()
                .with_existing(&["PROJ-1"])
                .failing_link_from("PROJ-1"),
        );
        let (ctx, _store) = context(tracker, dir.path());

        let spec = TicketSpec {
            blocked_by: vec!["PROJ-1".to_string()],
            ..TicketSpec::new("Add login", "Story")
        };
        let outcome = create_ticket(&ctx, spec).await.unwrap();

        assert_eq!(outcome.link_failures.len(), 1);
    }

    #[tokio::test]
    async fn rejects_invalid_ticket_before_creating() {
        let dir = TempDir::new().unwrap();
        let tracker = Arc::new(MockTracker::new());
        let (ctx, store) = context(tracker.clone(), dir.path());

        let err = create_ticket(&ctx, TicketSpec::new("Add login", "Incident"))
            .await
            .err()
            .unwrap();
        match err {
            AppError::IssueTracker(err) => assert_eq!(err.validation_field(), Some("issue_type")),
            other => panic!("unexpected error: {other}"),
        }

        let spec = TicketSpec {
            blocked_by: vec!["PROJ-9".to_string()],
            ..TicketSpec::new("Add login", "Task")
        };
        assert!(create_ticket(&ctx, spec).await.is_err());

        assert!(tracker.created().is_empty());
        assert!(store.get_all().unwrap().is_empty());
    }
}
