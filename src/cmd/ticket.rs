use clap::Args;
use tracing::warn;

use crate::context::AppContext;
use crate::domain::issue::{Issue, NamedRef, Transition, UpdateFields};
use crate::domain::key::is_ticket_key;
use crate::domain::ticket::{LinkKind, TicketSpec};
use crate::error::{AppError, AppResult};
use crate::workflow::ticket::{TicketWorkflowOutcome, create_ticket};
use crate::workflow::validator::{validate_labels, validate_priority, validate_summary};

#[derive(Args, Debug, Clone)]
pub struct CreateArgs {
    /// One-line summary of the ticket.
    pub summary: String,
    #[arg(short, long, default_value = "")]
    pub description: String,
    /// Task, Story, Bug, Epic or Subtask.
    #[arg(short = 't', long = "type")]
    pub issue_type: Option<String>,
    /// Lowest, Low, Medium, High or Highest.
    #[arg(short, long)]
    pub priority: Option<String>,
    /// Account id of the assignee.
    #[arg(short, long)]
    pub assignee: Option<String>,
    #[arg(short, long = "label")]
    pub labels: Vec<String>,
    #[arg(long = "component")]
    pub components: Vec<String>,
    /// Keys of tickets that block this one, comma separated.
    #[arg(short, long, value_delimiter = ',')]
    pub blocked_by: Vec<String>,
}

impl CreateArgs {
    fn into_spec(self) -> TicketSpec {
        TicketSpec {
            description: self.description,
            priority: self.priority,
            assignee: self.assignee,
            labels: self.labels,
            components: self.components,
            blocked_by: self
                .blocked_by
                .into_iter()
                .map(|key| key.trim().to_string())
                .filter(|key| !key.is_empty())
                .collect(),
            ..TicketSpec::new(self.summary, self.issue_type.unwrap_or_default())
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ShowArgs {
    pub key: String,
}

#[derive(Args, Debug, Clone)]
pub struct UpdateArgs {
    pub key: String,
    #[arg(short, long)]
    pub summary: Option<String>,
    #[arg(short, long)]
    pub description: Option<String>,
    #[arg(short, long)]
    pub priority: Option<String>,
    #[arg(short, long)]
    pub assignee: Option<String>,
    /// Replaces every label on the ticket.
    #[arg(short, long = "label")]
    pub labels: Option<Vec<String>>,
}

impl UpdateArgs {
    fn fields(&self) -> AppResult<UpdateFields> {
        if let Some(summary) = &self.summary {
            validate_summary(summary)?;
        }
        let priority = match &self.priority {
            Some(priority) => Some(validate_priority(priority)?.as_str().to_string()),
            None => None,
        };
        if let Some(labels) = &self.labels {
            validate_labels(labels)?;
        }
        let fields = UpdateFields {
            summary: self.summary.clone(),
            description: self.description.clone(),
            priority,
            assignee: self.assignee.clone(),
            labels: self.labels.clone(),
        };
        if fields.is_empty() {
            return Err(AppError::Input("nothing to update".to_string()));
        }
        Ok(fields)
    }
}

#[derive(Args, Debug, Clone)]
pub struct TransitionArgs {
    pub key: String,
    /// Transition name or id. Lists the available transitions when omitted.
    pub transition: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    /// JQL query.
    pub query: String,
    #[arg(long, default_value_t = 0)]
    pub start_at: u32,
    #[arg(short = 'n', long, default_value_t = 50)]
    pub max_results: u32,
}

#[derive(Args, Debug, Clone)]
pub struct LinkArgs {
    /// Issue on the outward side, e.g. the blocker.
    pub outward: String,
    /// Issue on the inward side, e.g. the blocked ticket.
    pub inward: String,
    #[arg(short, long, default_value = "Blocks")]
    pub kind: String,
}

#[derive(Args, Debug, Clone)]
pub struct RecordsArgs {
    /// Show a single record.
    pub key: Option<String>,
}

pub async fn run_create(ctx: &AppContext, args: CreateArgs) -> AppResult<TicketWorkflowOutcome> {
    create_ticket(ctx, args.into_spec()).await
}

pub async fn run_show(ctx: &AppContext, args: ShowArgs) -> AppResult<()> {
    let key = ticket_key(&args.key)?;
    let issue = ctx.issue_tracker.get_issue(&key).await?;
    print_issue(&issue);
    if let Some(url) = ctx.config.browse_url(&issue.key) {
        println!("URL: {url}");
    }
    Ok(())
}

pub async fn run_update(ctx: &AppContext, args: UpdateArgs) -> AppResult<()> {
    let key = ticket_key(&args.key)?;
    let fields = args.fields()?;
    ctx.issue_tracker.update_issue(&key, &fields).await?;
    println!("Ticket {key} updated.");
    Ok(())
}

pub async fn run_transition(ctx: &AppContext, args: TransitionArgs) -> AppResult<()> {
    let key = ticket_key(&args.key)?;
    let transitions = ctx.issue_tracker.transitions(&key).await?;

    let Some(wanted) = args.transition.as_deref() else {
        println!("Available transitions for {key}:");
        for transition in &transitions {
            println!("  {:<6} {}", transition.id, transition.name);
        }
        return Ok(());
    };

    let transition = find_transition(&transitions, wanted).ok_or_else(|| {
        let names = transitions
            .iter()
            .map(|t| t.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        AppError::Input(format!(
            "transition '{wanted}' is not available for {key} (available: {names})"
        ))
    })?;
    ctx.issue_tracker
        .transition_issue(&key, &transition.id)
        .await?;
    println!("Ticket {key} moved via '{}'.", transition.name);

    if let Some(mut record) = ctx.store.get_by_key(&key)? {
        record.status = transition
            .to
            .as_ref()
            .map(|to| to.name.clone())
            .unwrap_or_else(|| transition.name.clone());
        if let Err(err) = ctx.store.update(record) {
            warn!("local record for {key} was not updated: {err}");
        }
    }
    Ok(())
}

pub async fn run_search(ctx: &AppContext, args: SearchArgs) -> AppResult<()> {
    let query = args.query.trim();
    if query.is_empty() {
        return Err(AppError::Input("search query cannot be empty".to_string()));
    }
    let page = ctx
        .issue_tracker
        .search_issues(query, args.start_at, args.max_results)
        .await?;

    for issue in &page.issues {
        println!(
            "{:<12} {:<14} {}",
            issue.key,
            issue.status_name(),
            issue.fields.summary
        );
    }
    let shown_until = page.start_at as usize + page.issues.len();
    println!(
        "Showing {}-{} of {} (page size {})",
        if page.issues.is_empty() { 0 } else { page.start_at + 1 },
        shown_until,
        page.total,
        page.max_results
    );
    if !page.is_last() {
        println!(
            "More results with --start-at {shown_until} --max-results {}",
            page.max_results
        );
    }
    Ok(())
}

pub async fn run_link(ctx: &AppContext, args: LinkArgs) -> AppResult<()> {
    let outward = ticket_key(&args.outward)?;
    let inward = ticket_key(&args.inward)?;
    if outward == inward {
        return Err(AppError::Input("cannot link a ticket to itself".to_string()));
    }
    let kind = LinkKind::parse(&args.kind);
    ctx.issue_tracker
        .link_issues(&kind, &outward, &inward)
        .await?;
    println!("Linked {outward} --[{kind}]--> {inward}.");
    Ok(())
}

pub fn run_records(ctx: &AppContext, args: RecordsArgs) -> AppResult<()> {
    let records = match args.key {
        Some(key) => {
            let key = ticket_key(&key)?;
            let record = ctx
                .store
                .get_by_key(&key)?
                .ok_or_else(|| AppError::Input(format!("no local record for {key}")))?;
            vec![record]
        }
        None => ctx.store.get_all()?,
    };

    if records.is_empty() {
        println!("No tickets recorded yet.");
        return Ok(());
    }
    for record in records {
        let blocked_by = if record.blocked_by.is_empty() {
            String::new()
        } else {
            format!(" (blocked by {})", record.blocked_by.join(", "))
        };
        println!(
            "{:<12} {:<10} {} {}{}",
            record.key,
            record.status,
            record.created_at.format("%Y-%m-%d"),
            record.summary,
            blocked_by
        );
    }
    Ok(())
}

fn ticket_key(input: &str) -> AppResult<String> {
    let key = input.trim().to_uppercase();
    if is_ticket_key(&key) {
        Ok(key)
    } else {
        Err(AppError::Input(format!(
            "invalid ticket key '{input}' (expected PROJECT-123)"
        )))
    }
}

fn find_transition<'a>(transitions: &'a [Transition], wanted: &str) -> Option<&'a Transition> {
    let wanted = wanted.trim();
    transitions
        .iter()
        .find(|t| t.id == wanted)
        .or_else(|| {
            transitions
                .iter()
                .find(|t| t.name.eq_ignore_ascii_case(wanted))
        })
        .or_else(|| {
            transitions.iter().find(|t| {
                t.to
                    .as_ref()
                    .is_some_and(|to| to.name.eq_ignore_ascii_case(wanted))
            })
        })
}

fn print_issue(issue: &Issue) {
    let fields = &issue.fields;
    let name = |value: &Option<NamedRef>| {
        value
            .as_ref()
            .map(|named| named.name.clone())
            .unwrap_or_else(|| "-".to_string())
    };

    println!("{}: {}", issue.key, fields.summary);
    if !issue.id.is_empty() {
        println!("Id:         {}", issue.id);
    }
    println!("Status:     {}", issue.status_name());
    println!("Type:       {}", name(&fields.issue_type));
    println!("Priority:   {}", name(&fields.priority));
    println!(
        "Assignee:   {}",
        fields.assignee.as_ref().map(|u| u.label()).unwrap_or("-")
    );
    println!(
        "Reporter:   {}",
        fields.reporter.as_ref().map(|u| u.label()).unwrap_or("-")
    );
    if !fields.labels.is_empty() {
        println!("Labels:     {}", fields.labels.join(", "));
    }
    if !fields.components.is_empty() {
        let components = fields
            .components
            .iter()
            .map(|component| component.name.as_str())
            .collect::<Vec<_>>();
        println!("Components: {}", components.join(", "));
    }
    let description = issue.description_text();
    if !description.trim().is_empty() {
        println!("\n{description}");
    }
}
