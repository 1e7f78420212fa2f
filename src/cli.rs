use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::io_utils::SourceFormat;

pub const DEFAULT_DATABASE: &str = "sales_report.db";

#[derive(Debug, Parser)]
#[command(author, version, about = "Build sales reports from CSV, XLSX and JSON sources", long_about = None)]
pub struct Cli {
    /// SQLite database holding persisted tasks
    #[arg(long, global = true, env = "SALES_REPORT_DB", default_value = DEFAULT_DATABASE)]
    pub database: PathBuf,
    /// Timeout in seconds for each remote source fetch
    #[arg(long = "fetch-timeout-secs", global = true, default_value_t = crate::fetch::DEFAULT_TIMEOUT_SECS)]
    pub fetch_timeout_secs: u64,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Merge sources into a task, replacing any records previously stored under its name
    Ingest(IngestArgs),
    /// Print the stored records of a task
    Task(TaskArgs),
    /// List stored tasks with their record counts
    Tasks(TasksArgs),
    /// Print summary statistics and company/monthly aggregates for a task
    Analytics(TaskArgs),
}

#[derive(Debug, Args)]
pub struct IngestArgs {
    /// Name of the task (report) to create or replace
    #[arg(short = 't', long = "task")]
    pub task_name: String,
    /// Free-text description of the task
    #[arg(short = 'd', long = "description")]
    pub description: String,
    /// Local CSV/XLSX/JSON file to ingest (repeatable)
    #[arg(short = 'f', long = "file", action = clap::ArgAction::Append)]
    pub files: Vec<PathBuf>,
    /// Remote CSV/XLSX/JSON source URL (repeatable)
    #[arg(short = 'u', long = "url", action = clap::ArgAction::Append)]
    pub urls: Vec<String>,
    /// Force the format of every local file instead of using its extension
    #[arg(long = "format")]
    pub format: Option<SourceFormat>,
    /// Inline JSON filter such as '{"priceRange": {"min": 5000, "max": 15000}}'
    #[arg(long = "filters", conflicts_with = "filters_file")]
    pub filters: Option<String>,
    /// YAML or JSON file holding the filter specification
    #[arg(long = "filters-file")]
    pub filters_file: Option<PathBuf>,
    /// Character encoding of text sources (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Omit the ingested records from the printed report
    #[arg(long = "summary-only")]
    pub summary_only: bool,
}

#[derive(Debug, Args)]
pub struct TaskArgs {
    /// Task name
    pub task_name: String,
    /// Render as a text table instead of JSON
    #[arg(long = "table")]
    pub table: bool,
}

#[derive(Debug, Args)]
pub struct TasksArgs {
    /// Render as a text table instead of JSON
    #[arg(long = "table")]
    pub table: bool,
}
