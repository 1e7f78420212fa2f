//! YAML loading for user-supplied configuration such as filter files.
//! JSON documents are valid YAML, so both load through here.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

pub use serde_yaml::Value as YamlValue;

pub fn parse_str<T: DeserializeOwned>(input: &str) -> Result<T> {
    // An empty document deserializes as null; treat it as an empty mapping.
    let value: YamlValue = if input.trim().is_empty() {
        YamlValue::Mapping(Default::default())
    } else {
        serde_yaml::from_str(input)?
    };
    Ok(serde_yaml::from_value(value)?)
}

pub fn load_from_path<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path).with_context(|| format!("Opening YAML file {path:?}"))?;
    parse_str(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{FilterSpec, Range};

    #[test]
    fn parses_yaml_and_json_filter_documents() {
        let yaml = "company: Acme\nyearRange:\n  min: 2019\n";
        let spec: FilterSpec = parse_str(yaml).unwrap();
        assert_eq!(spec.company.as_deref(), Some("Acme"));
        assert_eq!(spec.year_range, Some(Range::new(Some(2019), None)));

        let json = r#"{"location": "Oslo"}"#;
        let spec: FilterSpec = parse_str(json).unwrap();
        assert_eq!(spec.location.as_deref(), Some("Oslo"));
    }

    #[test]
    fn empty_document_is_an_empty_spec() {
        let spec: FilterSpec = parse_str("  \n").unwrap();
        assert!(spec.is_empty());
    }
}
