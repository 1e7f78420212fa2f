//! Core operations: ingest sources into a task, and read tasks back as raw
//! records or chart-ready aggregates.
//!
//! [`ReportService`] owns no global state. The persistence store and remote
//! fetcher are injected, and the processing date (used for date defaults)
//! is fixed per service so results are reproducible in tests.

use chrono::{Local, NaiveDate};
use encoding_rs::{Encoding, UTF_8};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    error::{ReportError, Result},
    fetch::{Fetcher, fetch_all},
    filter::{FilterSpec, apply_filters},
    frequency::{CompanyBucket, MonthBucket, company_aggregate, monthly_aggregate},
    merge::{SourceDescriptor, SourceInput, SourceMerger, ensure_unique_sale_ids},
    schema::SalesRecord,
    stats::{Summary, summarize},
    store::{TaskStore, TaskSummary},
};

pub const MAX_TASK_NAME_LEN: usize = 255;

#[derive(Debug, Clone, Default)]
pub struct IngestRequest {
    pub task_name: String,
    pub task_description: String,
    /// Uploaded files, processed before any URL.
    pub sources: Vec<SourceInput>,
    pub source_urls: Vec<String>,
    pub filters: Option<FilterSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    pub task_name: String,
    pub task_description: String,
    pub sources_processed: usize,
    pub total_records: usize,
    pub source_metadata: Vec<SourceDescriptor>,
    pub records: Vec<SalesRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analytics {
    pub task_name: String,
    pub summary: Summary,
    pub company_aggregate: Vec<CompanyBucket>,
    pub monthly_aggregate: Vec<MonthBucket>,
    pub records: Vec<SalesRecord>,
}

pub struct ReportService<S, F> {
    store: S,
    fetcher: F,
    processing_date: NaiveDate,
    encoding: &'static Encoding,
}

impl<S: TaskStore, F: Fetcher> ReportService<S, F> {
    pub fn new(store: S, fetcher: F) -> Self {
        Self {
            store,
            fetcher,
            processing_date: Local::now().date_naive(),
            encoding: UTF_8,
        }
    }

    pub fn with_processing_date(mut self, date: NaiveDate) -> Self {
        self.processing_date = date;
        self
    }

    /// Text encoding for CSV and JSON sources.
    pub fn with_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn processing_date(&self) -> NaiveDate {
        self.processing_date
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Merge, filter and persist. Any failing source aborts before the
    /// store is touched, so a failed ingestion leaves the previous records
    /// of the task in place.
    pub fn ingest(&self, request: &IngestRequest) -> Result<IngestReport> {
        validate_task(&request.task_name, &request.task_description)?;
        let task_name = request.task_name.trim();
        info!(
            "Ingesting task '{}' from {} file(s) and {} URL(s)",
            task_name,
            request.sources.len(),
            request.source_urls.len()
        );

        let mut merger =
            SourceMerger::new(task_name, self.processing_date).with_encoding(self.encoding);
        for source in &request.sources {
            merger.push(source)?;
        }
        for input in fetch_all(&self.fetcher, &request.source_urls)? {
            merger.push(&input)?;
        }
        let merged = merger.finish()?;

        let before = merged.records.len();
        let records = match &request.filters {
            Some(spec) => apply_filters(merged.records, spec),
            None => merged.records,
        };
        debug!("Filters kept {} of {before} record(s)", records.len());

        ensure_unique_sale_ids(&records)?;
        let total_records = self.store.replace_task(task_name, &records)?;
        info!("Persisted {total_records} record(s) for task '{task_name}'");

        Ok(IngestReport {
            task_name: task_name.to_string(),
            task_description: request.task_description.trim().to_string(),
            sources_processed: merged.descriptors.len(),
            total_records,
            source_metadata: merged.descriptors,
            records,
        })
    }

    pub fn get_task(&self, task_name: &str) -> Result<Vec<SalesRecord>> {
        self.store.get_task(task_name.trim())
    }

    pub fn list_tasks(&self) -> Result<Vec<TaskSummary>> {
        self.store.list_tasks()
    }

    pub fn get_analytics(&self, task_name: &str) -> Result<Analytics> {
        let records = self.get_task(task_name)?;
        Ok(Analytics {
            task_name: task_name.trim().to_string(),
            summary: summarize(&records, self.processing_date),
            company_aggregate: company_aggregate(&records),
            monthly_aggregate: monthly_aggregate(&records, self.processing_date),
            records,
        })
    }
}

pub fn validate_task(task_name: &str, task_description: &str) -> Result<()> {
    let name = task_name.trim();
    if name.is_empty() {
        return Err(ReportError::InvalidInput("task name must not be blank".into()));
    }
    if name.chars().count() > MAX_TASK_NAME_LEN {
        return Err(ReportError::InvalidInput(format!(
            "task name exceeds {MAX_TASK_NAME_LEN} characters"
        )));
    }
    if task_description.trim().is_empty() {
        return Err(ReportError::InvalidInput(
            "task description must not be blank".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn validate_task_rejects_blank_and_oversized_names() {
        assert!(validate_task("q1", "first quarter").is_ok());
        assert_eq!(
            validate_task("  ", "x").unwrap_err().kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(
            validate_task("q1", "").unwrap_err().kind(),
            ErrorKind::InvalidInput
        );
        let long = "n".repeat(MAX_TASK_NAME_LEN + 1);
        assert!(validate_task(&long, "x").is_err());
    }
}
