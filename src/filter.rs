use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{schema::SalesRecord, yaml_provider};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Range<T> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<T>,
}

impl<T: PartialOrd + Copy> Range<T> {
    pub fn new(min: Option<T>, max: Option<T>) -> Self {
        Self { min, max }
    }

    /// Inclusive on both bounds; `None` never matches.
    pub fn contains(&self, value: Option<T>) -> bool {
        let Some(value) = value else {
            return false;
        };
        self.min.is_none_or(|min| value >= min) && self.max.is_none_or(|max| value <= max)
    }
}

/// Declarative record filter. Absent fields impose no constraint and present
/// fields compose with AND.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_range: Option<Range<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_range: Option<Range<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl FilterSpec {
    pub fn is_empty(&self) -> bool {
        self.price_range.is_none()
            && active(&self.model).is_none()
            && self.year_range.is_none()
            && active(&self.company).is_none()
            && active(&self.location).is_none()
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("Parsing filter specification JSON")
    }

    /// Loads a YAML (or JSON, which YAML subsumes) filter file.
    pub fn load(path: &Path) -> Result<Self> {
        yaml_provider::load_from_path(path)
            .with_context(|| format!("Loading filter specification from {path:?}"))
    }

    pub fn matches(&self, record: &SalesRecord) -> bool {
        if let Some(range) = &self.price_range
            && !range.contains(record.price)
        {
            return false;
        }
        if let Some(range) = &self.year_range
            && !range.contains(record.manufacturing_year)
        {
            return false;
        }
        equals(&self.model, record.car_model.as_deref())
            && equals(&self.company, record.company.as_deref())
            && equals(&self.location, record.sales_location.as_deref())
    }
}

fn active(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Exact, case-sensitive equality. An empty expected value imposes nothing.
fn equals(expected: &Option<String>, actual: Option<&str>) -> bool {
    match active(expected) {
        Some(expected) => actual == Some(expected),
        None => true,
    }
}

pub fn apply_filters(records: Vec<SalesRecord>, spec: &FilterSpec) -> Vec<SalesRecord> {
    if spec.is_empty() {
        return records;
    }
    records.into_iter().filter(|r| spec.matches(r)).collect()
}
