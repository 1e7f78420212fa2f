pub mod cli;
pub mod data;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod frequency;
pub mod io_utils;
pub mod merge;
pub mod schema;
pub mod service;
pub mod stats;
pub mod store;
pub mod table;
pub mod yaml_provider;

use std::{env, fs, sync::OnceLock, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use encoding_rs::UTF_8;
use log::{LevelFilter, debug, info};
use serde::Serialize;

use crate::{
    cli::{Cli, Commands, IngestArgs, TaskArgs, TasksArgs},
    error::ReportError,
    fetch::{FetchConfig, HttpFetcher},
    filter::FilterSpec,
    merge::SourceInput,
    service::{IngestRequest, ReportService},
    store::SqliteStore,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("sales_report", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

type Service = ReportService<SqliteStore, HttpFetcher>;

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let encoding = match &cli.command {
        Commands::Ingest(args) => io_utils::resolve_encoding(args.input_encoding.as_deref())
            .map_err(invalid_input)?,
        _ => UTF_8,
    };
    let service = open_service(&cli)?.with_encoding(encoding);
    match cli.command {
        Commands::Ingest(args) => handle_ingest(&service, &args),
        Commands::Task(args) => handle_task(&service, &args),
        Commands::Tasks(args) => handle_tasks(&service, &args),
        Commands::Analytics(args) => handle_analytics(&service, &args),
    }
}

/// Exit code for a failure returned by [`run`]: the error kind's code when
/// a [`ReportError`] is in the chain, 1 otherwise.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<ReportError>())
        .map(|report_err| report_err.kind().exit_code())
        .unwrap_or(1)
}

fn open_service(cli: &Cli) -> Result<Service> {
    debug!("Opening task database {:?}", cli.database);
    let store = SqliteStore::open(&cli.database)
        .with_context(|| format!("Opening task database {:?}", cli.database))?;
    let config = FetchConfig {
        timeout: Duration::from_secs(cli.fetch_timeout_secs),
        ..FetchConfig::default()
    };
    let fetcher = HttpFetcher::new(&config)?;
    Ok(ReportService::new(store, fetcher))
}

/// User-supplied configuration that cannot be read is invalid input, not an
/// internal failure.
fn invalid_input(err: anyhow::Error) -> ReportError {
    ReportError::InvalidInput(format!("{err:#}"))
}

fn load_filters(args: &IngestArgs) -> Result<Option<FilterSpec>> {
    if let Some(raw) = &args.filters {
        return Ok(Some(FilterSpec::from_json(raw).map_err(invalid_input)?));
    }
    if let Some(path) = &args.filters_file {
        return Ok(Some(FilterSpec::load(path).map_err(invalid_input)?));
    }
    Ok(None)
}

fn handle_ingest(service: &Service, args: &IngestArgs) -> Result<()> {
    let filters = load_filters(args)?;
    let mut sources = Vec::with_capacity(args.files.len());
    for path in &args.files {
        let bytes = fs::read(path).with_context(|| format!("Reading source file {path:?}"))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mut input = SourceInput::file(name, bytes);
        input.format = args.format;
        sources.push(input);
    }
    let request = IngestRequest {
        task_name: args.task_name.clone(),
        task_description: args.description.clone(),
        sources,
        source_urls: args.urls.clone(),
        filters,
    };
    let mut report = service
        .ingest(&request)
        .with_context(|| format!("Ingesting task '{}'", args.task_name))?;
    info!(
        "Task '{}' now holds {} record(s) from {} source(s)",
        report.task_name, report.total_records, report.sources_processed
    );
    if args.summary_only {
        report.records.clear();
    }
    print_json(&report)
}

fn handle_task(service: &Service, args: &TaskArgs) -> Result<()> {
    let records = service
        .get_task(&args.task_name)
        .with_context(|| format!("Loading task '{}'", args.task_name))?;
    if args.table {
        print!("{}", table::render_records(&records));
        return Ok(());
    }
    #[derive(Serialize)]
    struct TaskView<'a> {
        task_name: &'a str,
        sales: &'a [schema::SalesRecord],
    }
    print_json(&TaskView {
        task_name: &args.task_name,
        sales: &records,
    })
}

fn handle_tasks(service: &Service, args: &TasksArgs) -> Result<()> {
    let tasks = service.list_tasks().context("Listing tasks")?;
    if args.table {
        print!("{}", table::render_tasks(&tasks));
        return Ok(());
    }
    #[derive(Serialize)]
    struct TasksView<'a> {
        tasks: &'a [store::TaskSummary],
    }
    print_json(&TasksView { tasks: &tasks })
}

fn handle_analytics(service: &Service, args: &TaskArgs) -> Result<()> {
    let analytics = service
        .get_analytics(&args.task_name)
        .with_context(|| format!("Computing analytics for task '{}'", args.task_name))?;
    if args.table {
        print!("{}", table::render_analytics(&analytics));
        return Ok(());
    }
    print_json(&analytics)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Serializing output")?;
    println!("{rendered}");
    Ok(())
}
