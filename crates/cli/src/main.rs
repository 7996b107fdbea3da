//! Stepwise CLI — the main entry point.
//!
//! Commands:
//! - `run`      — Classify, plan and execute a task
//! - `resume`   — Continue a stored plan
//! - `plans`    — List stored plans
//! - `session`  — Inspect, search or clear a session log
//! - `config`   — Print the effective configuration

use clap::{Parser, Subcommand};

mod commands;
mod policy;
mod render;

#[derive(Parser)]
#[command(
    name = "stepwise",
    about = "Stepwise — plan-and-execute LLM task orchestration",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a task
    Run {
        /// The task, in natural language
        task: String,

        /// Print every mode event as one JSON line; never prompt
        #[arg(long)]
        json: bool,

        /// Session whose log records this run
        #[arg(short, long)]
        session: Option<String>,

        /// Skip the classifier and run a single loop
        #[arg(long, conflicts_with = "multi_step")]
        single_step: bool,

        /// Skip the classifier and plan the task
        #[arg(long)]
        multi_step: bool,
    },

    /// Resume a stored plan from its last persisted state
    Resume {
        plan_id: String,

        #[arg(long)]
        json: bool,

        #[arg(short, long)]
        session: Option<String>,
    },

    /// List stored plans, newest first
    Plans,

    /// Session log commands
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },

    /// Print the effective configuration (secrets redacted)
    Config,
}

#[derive(Subcommand)]
enum SessionCommands {
    /// Print every entry of a session log
    Show { id: String },

    /// Truncate a session log
    Clear { id: String },

    /// Keyword search over a session log
    Search {
        id: String,
        query: String,

        /// Number of matches to return
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// List known sessions
    List,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so --json output stays clean
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run {
            task,
            json,
            session,
            single_step,
            multi_step,
        } => {
            let mode = commands::task_mode(single_step, multi_step);
            commands::run::run(&task, json, session, mode).await?
        }
        Commands::Resume {
            plan_id,
            json,
            session,
        } => commands::resume::run(&plan_id, json, session).await?,
        Commands::Plans => commands::plans::run().await?,
        Commands::Session { command } => match command {
            SessionCommands::Show { id } => commands::session::show(&id).await?,
            SessionCommands::Clear { id } => commands::session::clear(&id).await?,
            SessionCommands::Search { id, query, top_k } => {
                commands::session::search(&id, &query, top_k).await?
            }
            SessionCommands::List => commands::session::list().await?,
        },
        Commands::Config => commands::config_cmd::run()?,
    }

    Ok(())
}
