mod cmd;
mod config;
mod context;
mod domain;
mod error;
mod infra;
mod services;
#[cfg(test)]
mod test_support;
mod workflow;

use std::io;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::cmd::batch::{self as batch_cmd, BatchArgs};
use crate::cmd::config::{self as config_cmd, ConfigArgs};
use crate::cmd::import::{self as import_cmd, ImportArgs};
use crate::cmd::ticket::{
    self, CreateArgs, LinkArgs, RecordsArgs, SearchArgs, ShowArgs, TransitionArgs, UpdateArgs,
};
use crate::config::{AppConfig, ConfigOverrides};
use crate::context::AppContext;
use crate::error::AppResult;
use crate::infra::jira::JiraClient;
use crate::infra::store::JsonTicketStore;

const LOG_ENV: &str = "JTC_LOG";

#[derive(Parser)]
#[command(name = "jtc", author, version, about = "Jira ticket creation CLI")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Jira base URL, e.g. https://company.atlassian.net.
    #[arg(long, global = true)]
    url: Option<String>,
    #[arg(long, global = true)]
    email: Option<String>,
    /// Jira API token.
    #[arg(long, global = true)]
    token: Option<String>,
    /// Project key, or a ticket key whose project is used.
    #[arg(long, global = true)]
    project: Option<String>,
    /// Increase log output (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

impl GlobalArgs {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            base_url: self.url.clone(),
            email: self.email.clone(),
            token: self.token.clone(),
            project: self.project.clone(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create a ticket and link the tickets that block it.
    Create(CreateArgs),
    /// Create every ticket listed in a JSON file.
    Batch(BatchArgs),
    /// Show a ticket.
    Show(ShowArgs),
    /// Update fields of a ticket.
    Update(UpdateArgs),
    /// Move a ticket through its workflow.
    Transition(TransitionArgs),
    /// Search tickets with JQL.
    Search(SearchArgs),
    /// Link two tickets.
    Link(LinkArgs),
    /// List tickets created by this tool.
    Records(RecordsArgs),
    /// Record existing tickets matching a JQL query.
    Import(ImportArgs),
    /// Manage CLI configuration.
    Config(ConfigArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    if let Err(error) = run(cli).await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

fn init_tracing(verbosity: u8) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(format!("jtc={default_level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

async fn run(cli: Cli) -> AppResult<()> {
    if let Commands::Config(args) = &cli.command {
        return config_cmd::run(args.command.clone());
    }

    let config = AppConfig::load(&cli.global.overrides())?;
    let context = build_context(config)?;

    match cli.command {
        Commands::Create(args) => {
            let outcome = ticket::run_create(&context, args).await?;
            println!("Ticket {} created.", outcome.created.key);
            if let Some(url) = &outcome.url {
                println!("View ticket: {url}");
            }
            for failure in &outcome.link_failures {
                eprintln!("Warning: {failure}");
            }
        }
        Commands::Batch(args) => {
            batch_cmd::run(&context, args).await?;
        }
        Commands::Show(args) => ticket::run_show(&context, args).await?,
        Commands::Update(args) => ticket::run_update(&context, args).await?,
        Commands::Transition(args) => ticket::run_transition(&context, args).await?,
        Commands::Search(args) => ticket::run_search(&context, args).await?,
        Commands::Link(args) => ticket::run_link(&context, args).await?,
        Commands::Records(args) => ticket::run_records(&context, args)?,
        Commands::Import(args) => {
            import_cmd::run(&context, args).await?;
        }
        Commands::Config(_) => {}
    }
    Ok(())
}

fn build_context(config: AppConfig) -> AppResult<AppContext> {
    let issue_tracker = Arc::new(JiraClient::new(config.client_config()?)?);
    let store = Arc::new(JsonTicketStore::new(config.store_path.clone()));
    Ok(AppContext::new(config, issue_tracker, store))
}
