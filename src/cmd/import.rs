use std::collections::BTreeMap;

use clap::Args;

use crate::context::AppContext;
use crate::error::AppResult;
use crate::workflow::import::{ImportOptions, ImportReport, import_tickets, parse_map_rule};

#[derive(Args, Debug, Clone)]
pub struct ImportArgs {
    /// JQL query selecting the tickets to import.
    #[arg(long)]
    pub jql: String,
    /// Logical project assigned to every imported ticket.
    #[arg(long)]
    pub map_project: Option<String>,
    /// Maps a key prefix to a logical project, e.g. `BACK->backend`. Repeatable.
    #[arg(long = "map-rule")]
    pub map_rules: Vec<String>,
    /// Show what would be imported without saving anything.
    #[arg(long)]
    pub dry_run: bool,
    /// Overwrite tickets that are already recorded.
    #[arg(long)]
    pub update_existing: bool,
}

impl ImportArgs {
    fn options(self) -> AppResult<ImportOptions> {
        let map_rules = self
            .map_rules
            .iter()
            .map(|rule| parse_map_rule(rule))
            .collect::<AppResult<BTreeMap<_, _>>>()?;
        Ok(ImportOptions {
            jql: self.jql,
            map_project: self.map_project.filter(|project| !project.trim().is_empty()),
            map_rules,
            dry_run: self.dry_run,
            update_existing: self.update_existing,
        })
    }
}

pub async fn run(ctx: &AppContext, args: ImportArgs) -> AppResult<ImportReport> {
    let options = args.options()?;
    let report = import_tickets(ctx, &options).await?;

    if report.records.is_empty() {
        println!("No issues found matching the query.");
        return Ok(report);
    }

    println!("Found {} issue(s) to import", report.records.len());
    for (project, count) in report.by_project() {
        println!("  {}: {count}", project.unwrap_or("(unmapped)"));
    }

    if options.dry_run {
        println!("\nDry run complete: nothing was saved.");
        return Ok(report);
    }

    println!("\nImport complete");
    println!("  Added: {}", report.added);
    println!("  Updated: {}", report.updated);
    if report.skipped > 0 {
        println!("  Skipped (already recorded): {}", report.skipped);
    }
    if report.failed > 0 {
        println!("  Failed: {}", report.failed);
    }
    Ok(report)
}
