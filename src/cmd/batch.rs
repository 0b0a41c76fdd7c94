use std::fs;
use std::path::{Path, PathBuf};

use clap::Args;
use tracing::warn;

use crate::context::AppContext;
use crate::domain::ticket::TicketSpec;
use crate::error::{AppError, AppResult};
use crate::workflow::batch::{
    BatchProcessor, BatchReport, ProcessResult, ProcessStatus, RunOptions,
};
use crate::workflow::ticket::record_for;

#[derive(Args, Debug, Clone)]
pub struct BatchArgs {
    /// JSON file holding an array of tickets.
    pub file: PathBuf,
    /// Validate every ticket without creating anything.
    #[arg(long)]
    pub dry_run: bool,
    /// Maximum number of tickets created at the same time.
    #[arg(short = 'j', long)]
    pub max_concurrent: Option<usize>,
}

pub async fn run(ctx: &AppContext, args: BatchArgs) -> AppResult<BatchReport> {
    let tickets = load_tickets(
        &args.file,
        &ctx.config.default_issue_type,
        &ctx.config.default_priority,
    )?;
    println!(
        "Loaded {} ticket(s) from {}",
        tickets.len(),
        args.file.display()
    );

    let processor = BatchProcessor::new(ctx.issue_tracker.clone(), ctx.config.project_key()?)
        .with_max_concurrent(args.max_concurrent.unwrap_or(ctx.config.max_concurrent));
    let report = processor
        .run(
            &tickets,
            RunOptions {
                dry_run: args.dry_run,
            },
        )
        .await;

    print_validation(&report.validation);
    let invalid = report.validation_failures();
    if invalid > 0 {
        return Err(AppError::Input(format!(
            "{invalid} ticket(s) failed validation; nothing was created"
        )));
    }
    if report.stopped_after_validation {
        println!("\nDry run complete: all {} ticket(s) are valid.", tickets.len());
        return Ok(report);
    }

    print_creation(&report.created);
    print_links(&report.links);
    record_created(ctx, &report.created);

    println!("\nCreated {}/{} tickets", report.created_count(), tickets.len());
    println!("{}", summary_line(&report));
    Ok(report)
}

/// Reads tickets and fills blank issue types and priorities.
pub fn load_tickets(path: &Path, issue_type: &str, priority: &str) -> AppResult<Vec<TicketSpec>> {
    let contents = fs::read_to_string(path)?;
    parse_tickets(&contents, issue_type, priority)
}

fn parse_tickets(contents: &str, issue_type: &str, priority: &str) -> AppResult<Vec<TicketSpec>> {
    let tickets: Vec<TicketSpec> = serde_json::from_str(contents)
        .map_err(|err| AppError::Input(format!("failed to parse ticket file: {err}")))?;
    if tickets.is_empty() {
        return Err(AppError::Input("ticket file contains no tickets".to_string()));
    }
    Ok(tickets
        .into_iter()
        .map(|ticket| ticket.with_defaults(issue_type, priority))
        .collect())
}

fn print_validation(results: &[ProcessResult]) {
    println!("\nValidation");
    for result in results {
        println!("{}", result_line(result));
    }
}

fn print_creation(results: &[ProcessResult]) {
    println!("\nCreation");
    for result in results {
        println!("{}", result_line(result));
    }
}

fn print_links(results: &[ProcessResult]) {
    if results.is_empty() {
        return;
    }
    println!("\nLinking");
    for result in results {
        println!("{}", result_line(result));
    }
    println!("  {} link(s) failed; the tickets were created", results.len());
}

fn result_line(result: &ProcessResult) -> String {
    let position = result.index + 1;
    let summary = &result.ticket.summary;
    let key = result.created_key.as_deref().unwrap_or("-");
    let error = result
        .error
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_default();
    match result.status {
        ProcessStatus::Validated => format!("  ok [{position}] {summary}"),
        ProcessStatus::Created => format!("  ok [{position}] {summary} -> {key}"),
        ProcessStatus::Failed => format!("  x [{position}] {summary}: {error}"),
        ProcessStatus::Partial => format!("  ! [{position}] {key}: {error}"),
    }
}

fn summary_line(report: &BatchReport) -> String {
    format!(
        "Success: {} | Failures: {} | Partial: {}",
        report.created_count(),
        report.creation_failures(),
        report.partial_count()
    )
}

fn record_created(ctx: &AppContext, created: &[ProcessResult]) {
    for result in created {
        let Some(key) = result.created_key.as_deref() else {
            continue;
        };
        let record = record_for(&ctx.config, key, &result.ticket);
        if let Err(err) = ctx.store.add(record) {
            warn!("ticket {key} was created but not recorded: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::error::TrackerError;

    fn result(
        index: usize,
        status: ProcessStatus,
        key: Option<&str>,
        error: Option<&str>,
    ) -> ProcessResult {
        ProcessResult {
            index,
            ticket: TicketSpec::new(format!("Task {}", index + 1), "Task"),
            created_key: key.map(str::to_string),
            error: error.map(|message| TrackerError::transport(Some(400), message)),
            status,
        }
    }

    #[test]
    fn parses_tickets_with_defaults() {
        let tickets = parse_tickets(
            r#"[
                {"summary": "Task 1", "issue_type": "Bug", "priority": "High", "blocked_by": ["PROJ-100"]},
                {"summary": "Task 2", "description": "Second"}
            ]"#,
            "Task",
            "Medium",
        )
        .unwrap();

        assert_eq!(tickets.len(), 2);
        assert_eq!(tickets[0].issue_type, "Bug");
        assert_eq!(tickets[0].priority.as_deref(), Some("High"));
        assert_eq!(tickets[0].blocked_by, vec!["PROJ-100"]);
        assert_eq!(tickets[1].issue_type, "Task");
        assert_eq!(tickets[1].priority.as_deref(), Some("Medium"));
    }

    #[test]
    fn rejects_empty_or_malformed_files() {
        for contents in ["[]", "{invalid json}", r#"[{"description": "no summary"}]"#] {
            assert!(
                matches!(parse_tickets(contents, "Task", "Medium"), Err(AppError::Input(_))),
                "accepted {contents}"
            );
        }
    }

    #[test]
    fn loads_tickets_from_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tickets.json");
        fs::write(&path, r#"[{"summary": "From file"}]"#).unwrap();

        let tickets = load_tickets(&path, "Story", "Low").unwrap();
        assert_eq!(tickets[0].summary, "From file");
        assert_eq!(tickets[0].issue_type, "Story");

        assert!(matches!(
            load_tickets(&dir.path().join("missing.json"), "Task", "Medium"),
            Err(AppError::Io(_))
        ));
    }

    #[test]
    fn prints_each_status() {
        assert_eq!(
            result_line(&result(0, ProcessStatus::Validated, None, None)),
            "  ok [1] Task 1"
        );
        assert_eq!(
            result_line(&result(1, ProcessStatus::Created, Some("PROJ-7"), None)),
            "  ok [2] Task 2 -> PROJ-7"
        );
        assert!(
            result_line(&result(2, ProcessStatus::Failed, None, Some("boom")))
                .starts_with("  x [3] Task 3: ")
        );
        assert!(
            result_line(&result(3, ProcessStatus::Partial, Some("PROJ-9"), Some("no link")))
                .starts_with("  ! [4] PROJ-9: ")
        );
    }

    #[test]
    fn summarizes_creation_and_links() {
        let report = BatchReport {
            created: vec![
                result(0, ProcessStatus::Created, Some("PROJ-1"), None),
                result(1, ProcessStatus::Failed, None, Some("boom")),
                result(2, ProcessStatus::Created, Some("PROJ-2"), None),
            ],
            links: vec![result(2, ProcessStatus::Partial, Some("PROJ-2"), Some("no link"))],
            ..BatchReport::default()
        };
        assert_eq!(summary_line(&report), "Success: 2 | Failures: 1 | Partial: 1");
    }
}
