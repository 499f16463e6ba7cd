#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line tools for campaign data and the campaign agents.
//!
//! ```text
//! resonance validate <csv>
//! resonance filter <csv> --strategy "Rally the Base" \
//!     --popularity-status "Trailing Opponent" \
//!     --base-popularity-status "Less Popular than Party" [--output out.csv]
//! resonance analyze <csv> rally|goldmine|summary
//! resonance report <csv> [--candidate NAME] [--opponent NAME] [--location NAME]
//! resonance chat [--agent political] [--data <csv>]
//! resonance serve [--interactive]
//! ```
//!
//! Running `resonance` with no subcommand enters interactive mode.

mod chat;
mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use dialoguer::{Input, Select};

#[derive(Parser)]
#[command(
    name = "resonance",
    about = "Campaign location analysis and campaign agents"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// What `analyze` prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Analysis {
    /// Rally the Base breakdown
    Rally,
    /// Hidden Goldmine summary
    Goldmine,
    /// Row/column counts and value counts
    Summary,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a campaign CSV and list data-quality issues
    Validate {
        /// Path to the CSV
        path: PathBuf,
        /// Maximum number of issues to print
        #[arg(long, default_value = "20")]
        max_issues: usize,
    },
    /// Apply the strategic filter to a campaign CSV
    Filter {
        /// Path to the CSV
        path: PathBuf,
        /// Strategy label
        #[arg(long)]
        strategy: String,
        /// Popularity status label
        #[arg(long)]
        popularity_status: String,
        /// Base popularity status label
        #[arg(long)]
        base_popularity_status: String,
        /// Write matching rows to this CSV instead of printing them
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print targeting analysis for a campaign CSV
    Analyze {
        /// Path to the CSV
        path: PathBuf,
        /// Which analysis to run
        #[arg(value_enum, default_value = "summary")]
        kind: Analysis,
    },
    /// Write the Markdown campaign report for a campaign CSV
    Report {
        /// Path to the CSV
        path: PathBuf,
        /// Candidate name
        #[arg(long)]
        candidate: Option<String>,
        /// Opponent name
        #[arg(long)]
        opponent: Option<String>,
        /// Location label
        #[arg(long)]
        location: Option<String>,
        /// Artifact directory (defaults to `ARTIFACTS_DIR` or `data/artifacts`)
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Chat with a campaign agent in the terminal
    Chat {
        /// Agent ID (political, content, merchandise)
        #[arg(long)]
        agent: Option<String>,
        /// Campaign CSV used by `load_campaign_data`
        #[arg(long)]
        data: Option<PathBuf>,
    },
    /// Start the API server
    Serve {
        /// Prompt for bind address and port
        #[arg(long)]
        interactive: bool,
    },
}

/// Top-level actions in interactive mode.
enum Action {
    Chat,
    Serve,
    Validate,
    Summarize,
    Report,
}

impl Action {
    const ALL: &[Self] = &[
        Self::Chat,
        Self::Serve,
        Self::Validate,
        Self::Summarize,
        Self::Report,
    ];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::Chat => "Chat with an agent",
            Self::Serve => "Start server",
            Self::Validate => "Validate a campaign CSV",
            Self::Summarize => "Summarize a campaign CSV",
            Self::Report => "Write a campaign report",
        }
    }
}

fn prompt_path() -> Result<PathBuf, Box<dyn std::error::Error>> {
    let default = std::env::var("CAMPAIGN_DATA_PATH")
        .unwrap_or_else(|_| "data/sample_campaign.csv".to_string());
    let path: String = Input::new()
        .with_prompt("Campaign CSV")
        .default(default)
        .interact_text()?;
    Ok(PathBuf::from(path))
}

/// The server uses actix-web's runtime, so it runs in a blocking task to
/// avoid nesting tokio runtimes.
async fn serve(interactive: bool) -> Result<(), Box<dyn std::error::Error>> {
    tokio::task::spawn_blocking(move || {
        actix_web::rt::System::new().block_on(async move {
            if interactive {
                resonance_server::interactive::run().await
            } else {
                resonance_server::run_server().await
            }
        })
    })
    .await??;
    Ok(())
}

async fn interactive() -> Result<(), Box<dyn std::error::Error>> {
    println!("Resonance");
    println!();

    let labels: Vec<&str> = Action::ALL.iter().map(Action::label).collect();

    let idx = Select::new()
        .with_prompt("What would you like to do?")
        .items(&labels)
        .default(0)
        .interact()?;

    match Action::ALL[idx] {
        Action::Chat => chat::run(None, None).await?,
        Action::Serve => serve(true).await?,
        Action::Validate => commands::validate(&prompt_path()?, 20)?,
        Action::Summarize => commands::analyze(&prompt_path()?, Analysis::Summary)?,
        Action::Report => commands::report(&prompt_path()?, None, None, None, None)?,
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = pretty_env_logger::try_init();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        return interactive().await;
    };

    match command {
        Commands::Validate { path, max_issues } => commands::validate(&path, max_issues)?,
        Commands::Filter {
            path,
            strategy,
            popularity_status,
            base_popularity_status,
            output,
        } => commands::filter(
            &path,
            &strategy,
            &popularity_status,
            &base_popularity_status,
            output.as_deref(),
        )?,
        Commands::Analyze { path, kind } => commands::analyze(&path, kind)?,
        Commands::Report {
            path,
            candidate,
            opponent,
            location,
            output_dir,
        } => commands::report(&path, candidate, opponent, location, output_dir)?,
        Commands::Chat { agent, data } => chat::run(agent, data).await?,
        Commands::Serve { interactive } => serve(interactive).await?,
    }

    Ok(())
}
