//! CLI entry point for taskboard.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use taskboard_core::{Priority, SortKey};
use time::Date;
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

use taskboard_app::ProjectConfig;

mod commands;
mod tui;

/// Kanban board kept in a JSON file next to your project.
#[derive(Parser, Debug)]
#[command(
    name = "taskboard",
    version,
    about = "taskboard: a kanban board with optimistic drag-and-drop"
)]
struct Cli {
    /// Project directory holding `.taskboard/` (defaults to current).
    #[arg(long)]
    dir: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the board and its configured columns.
    Init,

    /// Print every column with its tasks.
    Show {
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// List tasks with filtering, sorting and paging.
    Ls {
        /// Column id or title.
        #[arg(long)]
        section: Option<String>,
        /// Free-text search over titles and tags.
        #[arg(long)]
        text: Option<String>,
        #[arg(short = 'p', long = "priority")]
        priorities: Vec<Priority>,
        /// Only completed tasks.
        #[arg(long, conflicts_with = "open")]
        done: bool,
        /// Only open tasks.
        #[arg(long)]
        open: bool,
        #[arg(short = 'a', long)]
        assignee: Option<String>,
        /// Tags that must all be present.
        #[arg(short = 't', long = "tag")]
        tags: Vec<String>,
        #[arg(long, value_enum)]
        sort: Option<SortArg>,
        /// Sort descending.
        #[arg(long, requires = "sort")]
        desc: bool,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = 20)]
        page_size: usize,
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Add a task to a column (the first column by default).
    Add {
        title: String,
        /// Column id or title.
        #[arg(short = 's', long)]
        section: Option<String>,
        #[arg(short = 'p', long)]
        priority: Option<Priority>,
        #[arg(short = 't', long = "tag")]
        tags: Vec<String>,
        #[arg(short = 'a', long)]
        assignee: Option<String>,
        /// Due date as YYYY-MM-DD.
        #[arg(long, value_parser = parse_date)]
        due: Option<Date>,
    },

    /// Move a task to another column.
    Mv {
        /// Task id or unique id prefix.
        task: String,
        /// Target column id or title.
        to: String,
        /// Place before this task instead of at the end.
        #[arg(long)]
        before: Option<String>,
    },

    /// Edit task fields.
    Edit {
        task: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(short = 'p', long)]
        priority: Option<Priority>,
        #[arg(long = "add-tag")]
        add_tags: Vec<String>,
        #[arg(long = "remove-tag")]
        remove_tags: Vec<String>,
        #[arg(short = 'a', long, conflicts_with = "clear_assignee")]
        assignee: Option<String>,
        #[arg(long)]
        clear_assignee: bool,
        #[arg(long, value_parser = parse_date, conflicts_with = "clear_due")]
        due: Option<Date>,
        #[arg(long)]
        clear_due: bool,
    },

    /// Mark a task as done (or open again with --undo).
    Done {
        task: String,
        #[arg(long)]
        undo: bool,
    },

    /// Delete a task.
    Rm { task: String },

    /// Manage columns.
    Section {
        #[command(subcommand)]
        cmd: SectionCommand,
    },

    /// Launch interactive terminal UI.
    Tui,
}

#[derive(Subcommand, Debug)]
enum SectionCommand {
    /// Append a column.
    Add { title: String },
    /// Rename a column.
    Rename { section: String, title: String },
    /// Delete an empty column.
    Rm { section: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum SortArg {
    Title,
    Priority,
    Due,
}

impl From<SortArg> for SortKey {
    fn from(value: SortArg) -> Self {
        match value {
            SortArg::Title => Self::Title,
            SortArg::Priority => Self::Priority,
            SortArg::Due => Self::DueDate,
        }
    }
}

fn parse_date(raw: &str) -> Result<Date, String> {
    let format = time::macros::format_description!("[year]-[month]-[day]");
    Date::parse(raw.trim(), format).map_err(|err| format!("expected YYYY-MM-DD: {err}"))
}

fn main() -> Result<()> {
    let Cli { dir, cmd } = Cli::parse();

    if should_install_tracing(&cmd) {
        install_tracing();
    }

    let workdir = dir.unwrap_or_else(|| PathBuf::from("."));
    execute_command(&workdir, cmd)
}

fn execute_command(workdir: &std::path::Path, command: Command) -> Result<()> {
    let config = ProjectConfig::from_workdir(workdir)?;
    match command {
        Command::Tui => {
            let runtime = tokio::runtime::Runtime::new()?;
            let (controller, notices) = commands::open_controller(workdir, &config)?;
            tui::run(&runtime, &controller, notices)
        }
        other => commands::run(other, workdir, &config),
    }
}

const fn should_install_tracing(cmd: &Command) -> bool {
    !matches!(cmd, Command::Tui)
}

fn install_tracing() {
    // RUST_LOG overrides the filter; INFO by default.
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_span_events(FmtSpan::NONE)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}
