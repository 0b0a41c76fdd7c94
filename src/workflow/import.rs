//! Pulls existing tickets matching a JQL query into the local ticket store.

use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::context::AppContext;
use crate::domain::issue::{Issue, NamedRef};
use crate::domain::key::project_from_ticket_key;
use crate::domain::record::TicketRecord;
use crate::error::{AppError, AppResult};

const IMPORTED_CREATOR: &str = "imported";
const FALLBACK_STATUS: &str = "Open";
const FALLBACK_PRIORITY: &str = "Medium";

#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    pub jql: String,
    /// Logical project assigned to every imported ticket.
    pub map_project: Option<String>,
    /// Key prefix to logical project, consulted before the mapping file.
    pub map_rules: BTreeMap<String, String>,
    pub dry_run: bool,
    /// Overwrite records that already exist instead of skipping them.
    pub update_existing: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    pub records: Vec<TicketRecord>,
    pub added: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl ImportReport {
    /// Number of records per logical project; unmapped records are keyed by `None`.
    pub fn by_project(&self) -> BTreeMap<Option<&str>, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.records {
            *counts.entry(record.project.as_deref()).or_insert(0) += 1;
        }
        counts
    }
}

/// Parses a `PREFIX->project` rule.
pub fn parse_map_rule(rule: &str) -> AppResult<(String, String)> {
    let invalid = || {
        AppError::Input(format!(
            "invalid map rule '{rule}' (use the form PREFIX->project)"
        ))
    };
    let (prefix, project) = rule.split_once("->").ok_or_else(invalid)?;
    let (prefix, project) = (prefix.trim(), project.trim());
    if prefix.is_empty() || project.is_empty() || project.contains("->") {
        return Err(invalid());
    }
    Ok((prefix.to_string(), project.to_string()))
}

enum Stored {
    Added,
    Updated,
}

pub async fn import_tickets(ctx: &AppContext, options: &ImportOptions) -> AppResult<ImportReport> {
    let jql = options.jql.trim();
    if jql.is_empty() {
        return Err(AppError::Input("a JQL query is required".to_string()));
    }

    let issues = ctx.issue_tracker.search_all(jql).await?;
    info!("Found {} issue(s) for import", issues.len());

    let mut report = ImportReport {
        records: issues
            .iter()
            .map(|issue| record_from_issue(issue, project_for(ctx, options, &issue.key)))
            .collect(),
        ..ImportReport::default()
    };
    if options.dry_run {
        return Ok(report);
    }

    for record in &report.records {
        let key = record.key.as_str();
        let stored = match ctx.store.get_by_key(key)? {
            Some(existing) if options.update_existing => ctx
                .store
                .update(TicketRecord {
                    created_at: existing.created_at,
                    blocked_by: existing.blocked_by,
                    estimated_end_date: existing.estimated_end_date,
                    ..record.clone()
                })
                .map(|()| Stored::Updated),
            Some(_) => {
                report.skipped += 1;
                continue;
            }
            None => ctx.store.add(record.clone()).map(|()| Stored::Added),
        };
        match stored {
            Ok(Stored::Added) => report.added += 1,
            Ok(Stored::Updated) => report.updated += 1,
            Err(err) => {
                warn!("could not store {key}: {err}");
                report.failed += 1;
            }
        }
    }
    Ok(report)
}

fn project_for(ctx: &AppContext, options: &ImportOptions, key: &str) -> Option<String> {
    if let Some(project) = &options.map_project {
        return Some(project.clone());
    }
    let prefix = project_from_ticket_key(key)
        .or_else(|| key.split('-').next())
        .unwrap_or(key);
    options
        .map_rules
        .get(prefix)
        .map(String::as_str)
        .or_else(|| ctx.config.project_mapping.find_project_for_key(key))
        .map(str::to_string)
}

/// Local record describing an issue that already exists on the tracker.
pub fn record_from_issue(issue: &Issue, project: Option<String>) -> TicketRecord {
    let fields = &issue.fields;
    let named = |value: &Option<NamedRef>| {
        value
            .as_ref()
            .map(|named| named.name.clone())
            .filter(|name| !name.is_empty())
    };
    TicketRecord {
        status: named(&fields.status).unwrap_or_else(|| FALLBACK_STATUS.to_string()),
        creator: fields
            .reporter
            .as_ref()
            .map(|user| user.label().to_string())
            .filter(|label| !label.is_empty())
            .unwrap_or_else(|| IMPORTED_CREATOR.to_string()),
        assignee: fields
            .assignee
            .as_ref()
            .map(|user| user.label().to_string())
            .unwrap_or_default(),
        priority: named(&fields.priority).unwrap_or_else(|| FALLBACK_PRIORITY.to_string()),
        issue_type: named(&fields.issue_type).unwrap_or_default(),
        project,
        ..TicketRecord::new(issue.key.clone(), fields.summary.clone())
    }
}
