//! `justcal` CLI: manage a CalDAV calendar from the command line.
//!
//! ## Usage
//!
//! ```sh
//! # Create the configuration file interactively
//! justcal config --init
//!
//! # Add an event with natural-language dates and a recurrence phrase
//! justcal add -t "Team standup" -s "tomorrow at 9:30am" -r "weekdays"
//!
//! # List the next week (default) or an explicit range
//! justcal list
//! justcal list --from "next monday" --to "in 3 weeks" --format json
//!
//! # Search titles, descriptions and locations
//! justcal search dentist --field title
//!
//! # Edit or delete by UID or unique UID prefix
//! justcal edit 3f2a9c -l "Room 4"
//! justcal delete 3f2a9c -y
//! ```

mod caldav;
mod commands;
mod config;
mod output;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, CommandFactory, Parser, Subcommand, ValueEnum};
use justcal_core::SearchField;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;

#[derive(Parser)]
#[command(
    name = "justcal",
    version,
    about = "Manage a CalDAV calendar with natural-language dates and recurrence"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file (default: <config dir>/justcal/config.toml)
    #[arg(long, global = true, env = "JUSTCAL_CONFIG")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a new event
    Add(AddArgs),
    /// List events in a date range
    List(ListArgs),
    /// Search events by text
    Search(SearchArgs),
    /// Edit an existing event
    Edit(EditArgs),
    /// Delete an event
    Delete(DeleteArgs),
    /// Manage configuration
    Config(ConfigArgs),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Debug, Args)]
pub struct AddArgs {
    /// Event title
    #[arg(short, long)]
    pub title: String,
    /// Start date/time (natural language or ISO format)
    #[arg(short, long)]
    pub start: String,
    /// End date/time (default: start + preferences.default_duration)
    #[arg(short, long)]
    pub end: Option<String>,
    /// Event description
    #[arg(short, long)]
    pub description: Option<String>,
    /// Event location
    #[arg(short, long)]
    pub location: Option<String>,
    /// Create an all-day event
    #[arg(long)]
    pub all_day: bool,
    /// Recurrence pattern ("daily", "weekly on Monday", "FREQ=DAILY;COUNT=10")
    #[arg(short = 'r', long = "recur")]
    pub recur: Option<String>,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Start of range (default: today)
    #[arg(long)]
    pub from: Option<String>,
    /// End of range (default: preferences.list_days after the start)
    #[arg(long)]
    pub to: Option<String>,
    /// Output format
    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,
    /// Maximum number of events to show
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Text to look for (case-insensitive)
    pub query: String,
    /// Field to search: title, description, location or all
    #[arg(long, default_value = "all")]
    pub field: SearchField,
    /// Start of range (default: one year ago)
    #[arg(long)]
    pub from: Option<String>,
    /// End of range (default: one year ahead)
    #[arg(long)]
    pub to: Option<String>,
    /// Output format
    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

#[derive(Debug, Args)]
pub struct EditArgs {
    /// Event UID or unique UID prefix
    pub uid: String,
    /// New title
    #[arg(short, long)]
    pub title: Option<String>,
    /// New start date/time
    #[arg(short, long)]
    pub start: Option<String>,
    /// New end date/time
    #[arg(short, long)]
    pub end: Option<String>,
    /// New description
    #[arg(short, long)]
    pub description: Option<String>,
    /// New location
    #[arg(short, long)]
    pub location: Option<String>,
    /// New recurrence pattern
    #[arg(short = 'r', long = "recur")]
    pub recur: Option<String>,
}

#[derive(Debug, Args)]
pub struct DeleteArgs {
    /// Event UID or unique UID prefix
    pub uid: String,
    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
pub struct ConfigArgs {
    /// Create the configuration interactively
    #[arg(long)]
    pub init: bool,
    /// Print the configuration (password masked)
    #[arg(long)]
    pub show: bool,
    /// Check the CalDAV connection
    #[arg(long)]
    pub test: bool,
    /// Set a value, e.g. --set preferences.timezone Europe/Berlin
    #[arg(long, num_args = 2, value_names = ["KEY", "VALUE"])]
    pub set: Option<Vec<String>>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let config_path = match cli.config {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if let Commands::Config(args) = command {
        return commands::config(&config_path, args);
    }

    let config = Config::load(&config_path)?;
    let ctx = commands::Context::new(config).context("Invalid configuration")?;

    match command {
        Commands::Add(args) => commands::add(&ctx, args),
        Commands::List(args) => commands::list(&ctx, args),
        Commands::Search(args) => commands::search(&ctx, args),
        Commands::Edit(args) => commands::edit(&ctx, args),
        Commands::Delete(args) => commands::delete(&ctx, args),
        Commands::Config(_) => unreachable!("handled above"),
    }
}

/// Log to stderr so command output on stdout stays machine-readable.
fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = std::env::var("JUSTCAL_LOG")
        .ok()
        .and_then(|spec| EnvFilter::try_new(spec).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}
