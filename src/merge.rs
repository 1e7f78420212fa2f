//! Source merging: decode each input, normalize it and concatenate the
//! results in submission order.
//!
//! Because every normalized table shares the canonical [`SalesRecord`]
//! shape, concatenation never has to reconcile columns; the per-source
//! column lists are kept only as provenance in [`SourceDescriptor`].

use chrono::NaiveDate;
use encoding_rs::{Encoding, UTF_8};
use itertools::Itertools;
use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ReportError, Result},
    io_utils::{self, SourceFormat},
    schema::{NormalizeContext, SalesRecord, normalize_table},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OriginKind {
    File,
    Url,
}

/// One input table as raw bytes plus everything needed to pick a decoder.
#[derive(Debug, Clone)]
pub struct SourceInput {
    /// File name for uploads, URL for remote sources.
    pub name: String,
    pub kind: OriginKind,
    pub format: Option<SourceFormat>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl SourceInput {
    pub fn file(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            kind: OriginKind::File,
            format: None,
            content_type: None,
            bytes: bytes.into(),
        }
    }

    pub fn url(
        url: impl Into<String>,
        content_type: Option<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            name: url.into(),
            kind: OriginKind::Url,
            format: None,
            content_type,
            bytes: bytes.into(),
        }
    }

    pub fn with_format(mut self, format: SourceFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn resolve_format(&self) -> Result<SourceFormat> {
        io_utils::resolve_format(&self.name, self.format, self.content_type.as_deref())
    }
}

/// Provenance for one ingested source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: OriginKind,
    pub records: usize,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedSources {
    pub records: Vec<SalesRecord>,
    pub descriptors: Vec<SourceDescriptor>,
}

pub struct SourceMerger<'a> {
    task_name: &'a str,
    processing_date: NaiveDate,
    encoding: &'static Encoding,
    merged: MergedSources,
}

impl<'a> SourceMerger<'a> {
    pub fn new(task_name: &'a str, processing_date: NaiveDate) -> Self {
        Self {
            task_name,
            processing_date,
            encoding: UTF_8,
            merged: MergedSources::default(),
        }
    }

    pub fn with_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Decodes and normalizes one source, appending its records. The first
    /// failure is returned as-is so the caller can abort the ingestion.
    pub fn push(&mut self, input: &SourceInput) -> Result<()> {
        let format = input.resolve_format()?;
        let table = io_utils::decode_table(&input.name, format, &input.bytes, self.encoding)?;
        let ctx = NormalizeContext {
            task_name: self.task_name,
            source_name: &input.name,
            source_position: self.merged.descriptors.len() + 1,
            processing_date: self.processing_date,
        };
        let normalized = normalize_table(&table, &ctx);
        info!(
            "Loaded {} record(s) from {} source '{}' ({:?})",
            normalized.records.len(),
            match input.kind {
                OriginKind::File => "file",
                OriginKind::Url => "url",
            },
            input.name,
            format
        );
        self.merged.descriptors.push(SourceDescriptor {
            name: input.name.clone(),
            kind: input.kind,
            records: normalized.records.len(),
            columns: normalized.columns,
        });
        self.merged.records.extend(normalized.records);
        Ok(())
    }

    pub fn finish(self) -> Result<MergedSources> {
        if self.merged.descriptors.is_empty() {
            return Err(ReportError::NoValidSources);
        }
        Ok(self.merged)
    }
}

/// Merges already-available inputs in order, stopping at the first failure.
pub fn merge_sources(
    inputs: &[SourceInput],
    task_name: &str,
    processing_date: NaiveDate,
) -> Result<MergedSources> {
    let mut merger = SourceMerger::new(task_name, processing_date);
    for input in inputs {
        merger.push(input)?;
    }
    merger.finish()
}

/// Rejects a record set in which a `sale_id` appears more than once.
pub fn ensure_unique_sale_ids(records: &[SalesRecord]) -> Result<()> {
    let duplicates = records
        .iter()
        .map(|r| r.sale_id.as_str())
        .duplicates()
        .take(5)
        .collect::<Vec<_>>();
    if duplicates.is_empty() {
        Ok(())
    } else {
        Err(ReportError::InvalidInput(format!(
            "duplicate sale_id value(s) within one task: {}",
            duplicates.iter().map(|id| format!("'{id}'")).join(", ")
        )))
    }
}
