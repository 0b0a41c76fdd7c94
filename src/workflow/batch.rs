//! Three-phase batch pipeline: validate every ticket, create them with bounded
//! concurrency, then link declared blockers.
//!
//! Phases never fail as a whole. Each returns one [`ProcessResult`] per outcome and
//! callers correlate results through [`ProcessResult::index`]. Creation results come
//! back in completion order.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};

use crate::domain::issue::NewIssue;
use crate::domain::ticket::TicketSpec;
use crate::error::{TrackerError, TrackerResult};
use crate::services::IssueTrackerService;
use crate::workflow::validator::{
    Validator, validate_issue_type, validate_labels, validate_priority, validate_summary,
};

pub const DEFAULT_MAX_CONCURRENT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    Validated,
    Created,
    Failed,
    /// Created, but at least one declared blocker could not be linked.
    Partial,
}

impl ProcessStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessStatus::Validated => "validated",
            ProcessStatus::Created => "created",
            ProcessStatus::Failed => "failed",
            ProcessStatus::Partial => "partial",
        }
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one ticket in one phase.
#[derive(Debug, Clone)]
pub struct ProcessResult {
    /// Zero-based position in the submitted list.
    pub index: usize,
    pub ticket: TicketSpec,
    pub created_key: Option<String>,
    pub error: Option<TrackerError>,
    pub status: ProcessStatus,
}

impl ProcessResult {
    fn validated(index: usize, ticket: TicketSpec) -> Self {
        Self {
            index,
            ticket,
            created_key: None,
            error: None,
            status: ProcessStatus::Validated,
        }
    }

    fn created(index: usize, ticket: TicketSpec, key: String) -> Self {
        Self {
            index,
            ticket,
            created_key: Some(key),
            error: None,
            status: ProcessStatus::Created,
        }
    }

    fn failed(index: usize, ticket: TicketSpec, error: TrackerError) -> Self {
        Self {
            index,
            ticket,
            created_key: None,
            error: Some(error),
            status: ProcessStatus::Failed,
        }
    }

    fn partial(index: usize, ticket: TicketSpec, key: String, error: TrackerError) -> Self {
        Self {
            index,
            ticket,
            created_key: Some(key),
            error: Some(error),
            status: ProcessStatus::Partial,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Result lists of a full pipeline run.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub validation: Vec<ProcessResult>,
    /// Sorted by index.
    pub created: Vec<ProcessResult>,
    /// Only the links that could not be established.
    pub links: Vec<ProcessResult>,
    pub stopped_after_validation: bool,
}

impl BatchReport {
    pub fn validation_failures(&self) -> usize {
        self.validation.iter().filter(|r| !r.is_success()).count()
    }

    pub fn created_count(&self) -> usize {
        self.created.iter().filter(|r| r.is_success()).count()
    }

    pub fn creation_failures(&self) -> usize {
        self.created.len() - self.created_count()
    }

    pub fn partial_count(&self) -> usize {
        self.links.len()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Stop after validation without creating anything.
    pub dry_run: bool,
}

pub struct BatchProcessor {
    tracker: Arc<dyn IssueTrackerService>,
    validator: Validator,
    project_key: String,
    max_concurrent: usize,
}

impl BatchProcessor {
    pub fn new(tracker: Arc<dyn IssueTrackerService>, project_key: impl Into<String>) -> Self {
        Self {
            validator: Validator::new(Arc::clone(&tracker)),
            tracker,
            project_key: project_key.into(),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
        }
    }

    /// Upper bound on simultaneous creation calls; zero is treated as one.
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// Runs all phases, stopping before creation when any ticket is invalid.
    pub async fn run(&self, tickets: &[TicketSpec], options: RunOptions) -> BatchReport {
        let mut report = BatchReport {
            validation: self.validate_tickets(tickets).await,
            ..BatchReport::default()
        };

        if report.validation_failures() > 0 {
            warn!(
                "{} of {} tickets failed validation; nothing was created",
                report.validation_failures(),
                tickets.len()
            );
            report.stopped_after_validation = true;
            return report;
        }
        if options.dry_run {
            report.stopped_after_validation = true;
            return report;
        }

        let mut created = self.create_tickets(tickets).await;
        created.sort_by_key(|result| result.index);
        report.links = self.link_tickets(&created).await;
        report.created = created;
        report
    }

    /// Phase 1. One result per ticket, in input order.
    #[instrument(skip_all, fields(tickets = tickets.len()))]
    pub async fn validate_tickets(&self, tickets: &[TicketSpec]) -> Vec<ProcessResult> {
        let mut results = Vec::with_capacity(tickets.len());
        for (index, ticket) in tickets.iter().enumerate() {
            let result = match self.validate_ticket(ticket).await {
                Ok(()) => ProcessResult::validated(index, ticket.clone()),
                Err(err) => ProcessResult::failed(index, ticket.clone(), err),
            };
            results.push(result);
        }

        let failures = results.iter().filter(|r| !r.is_success()).count();
        info!(
            "Validation finished: {} valid, {} invalid",
            results.len() - failures,
            failures
        );
        results
    }

    async fn validate_ticket(&self, ticket: &TicketSpec) -> TrackerResult<()> {
        validate_summary(&ticket.summary)?;
        validate_issue_type(&ticket.issue_type)?;
        if let Some(priority) = ticket
            .priority
            .as_deref()
            .filter(|value| !value.trim().is_empty())
        {
            validate_priority(priority)?;
        }
        validate_labels(&ticket.labels)?;
        if !ticket.blocked_by.is_empty() {
            self.validator
                .tickets_exist(&ticket.blocked_by)
                .await
                .map_err(|err| err.context("blocked-by validation failed"))?;
        }
        Ok(())
    }

    /// Phase 2. Every ticket is attempted; results arrive in completion order.
    #[instrument(skip_all, fields(tickets = tickets.len(), max_concurrent = self.max_concurrent))]
    pub async fn create_tickets(&self, tickets: &[TicketSpec]) -> Vec<ProcessResult> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let results = Arc::new(Mutex::new(Vec::with_capacity(tickets.len())));
        let mut tasks = JoinSet::new();

        for (index, ticket) in tickets.iter().cloned().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let results = Arc::clone(&results);
            let tracker = Arc::clone(&self.tracker);
            let project_key = self.project_key.clone();

            tasks.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => {
                        create_single_ticket(tracker.as_ref(), &project_key, index, ticket).await
                    }
                    Err(_) => ProcessResult::failed(
                        index,
                        ticket,
                        TrackerError::transport(None, "creation slots were closed"),
                    ),
                };
                results.lock().await.push(result);
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(err) = joined {
                warn!("ticket creation task ended abnormally: {err}");
            }
        }

        let mut results = std::mem::take(&mut *results.lock().await);
        if results.len() < tickets.len() {
            let reported: HashSet<usize> = results.iter().map(|r| r.index).collect();
            for (index, ticket) in tickets.iter().enumerate() {
                if !reported.contains(&index) {
                    results.push(ProcessResult::failed(
                        index,
                        ticket.clone(),
                        TrackerError::transport(None, "ticket creation did not complete"),
                    ));
                }
            }
        }

        let created = results.iter().filter(|r| r.is_success()).count();
        info!(
            "Creation finished: {} created, {} failed",
            created,
            results.len() - created
        );
        results
    }

    /// Phase 3. Links each blocker to its created ticket and reports only failures.
    #[instrument(skip_all)]
    pub async fn link_tickets(&self, created: &[ProcessResult]) -> Vec<ProcessResult> {
        let mut ordered = created
            .iter()
            .filter(|result| result.is_success())
            .collect::<Vec<_>>();
        ordered.sort_by_key(|result| result.index);

        let mut failures = Vec::new();
        for result in ordered {
            let Some(created_key) = result.created_key.as_deref() else {
                continue;
            };
            for blocker in &result.ticket.blocked_by {
                if let Err(err) = self.tracker.link_blocks(blocker, created_key).await {
                    warn!("could not link {blocker} blocks {created_key}: {err}");
                    failures.push(ProcessResult::partial(
                        result.index,
                        result.ticket.clone(),
                        created_key.to_string(),
                        err.context(format!("failed to link {blocker} blocks {created_key}")),
                    ));
                }
            }
        }

        info!("Linking finished: {} failed links", failures.len());
        failures
    }
}

pub(crate) fn new_issue_from_spec(project_key: &str, ticket: &TicketSpec) -> NewIssue {
    NewIssue {
        project_key: project_key.to_string(),
        summary: ticket.summary.clone(),
        description: ticket.description.clone(),
        issue_type: ticket.issue_type.clone(),
        priority: ticket.priority.clone(),
        assignee: ticket.assignee.clone(),
        labels: ticket.labels.clone(),
        components: ticket.components.clone(),
    }
}

async fn create_single_ticket(
    tracker: &dyn IssueTrackerService,
    project_key: &str,
    index: usize,
    ticket: TicketSpec,
) -> ProcessResult {
    let issue = new_issue_from_spec(project_key, &ticket);
    match tracker.create_issue(&issue).await {
        Ok(created) => ProcessResult::created(index, ticket, created.key),
        Err(err) => {
            warn!("ticket {} ({}) was not created: {err}", index + 1, ticket.summary);
            ProcessResult::failed(index, ticket, err)
        }
    }
}
