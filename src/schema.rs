//! Canonical sales-record schema and the normalizer that maps arbitrary
//! decoded tables onto it.
//!
//! Normalization runs in a fixed order: header clean-up
//! ([`normalize_column_name`]), alias resolution ([`canonical_alias`]),
//! default-filling of absent canonical columns, then per-value coercion.
//! Coercion never fails: values that cannot be read as the column's type
//! become `None`. `date_of_sale` is default-filled with the processing date
//! only when the column is absent, never when a present value is invalid.

use std::collections::HashMap;

use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    data::{coerce_date, coerce_float, coerce_integer, coerce_text, normalize_column_name},
    io_utils::RawTable,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesRecord {
    pub task_name: String,
    pub sale_id: String,
    pub company: Option<String>,
    pub car_model: Option<String>,
    pub manufacturing_year: Option<i64>,
    pub price: Option<f64>,
    pub sales_location: Option<String>,
    pub date_of_sale: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalField {
    SaleId,
    Company,
    CarModel,
    ManufacturingYear,
    Price,
    SalesLocation,
    DateOfSale,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 7] = [
        CanonicalField::SaleId,
        CanonicalField::Company,
        CanonicalField::CarModel,
        CanonicalField::ManufacturingYear,
        CanonicalField::Price,
        CanonicalField::SalesLocation,
        CanonicalField::DateOfSale,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CanonicalField::SaleId => "sale_id",
            CanonicalField::Company => "company",
            CanonicalField::CarModel => "car_model",
            CanonicalField::ManufacturingYear => "manufacturing_year",
            CanonicalField::Price => "price",
            CanonicalField::SalesLocation => "sales_location",
            CanonicalField::DateOfSale => "date_of_sale",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        CanonicalField::ALL.into_iter().find(|f| f.name() == name)
    }
}

/// Collapses known variant spellings onto canonical names. Expects a header
/// already passed through [`normalize_column_name`].
pub fn canonical_alias(column: &str) -> &str {
    match column {
        "saleid" => "sale_id",
        "manufacturingyear" => "manufacturing_year",
        "saleslocation" => "sales_location",
        "carmodel" => "car_model",
        "dateofsale" | "saledate" | "date" => "date_of_sale",
        other => other,
    }
}

pub fn resolve_column_name(raw: &str) -> String {
    canonical_alias(&normalize_column_name(raw)).to_string()
}

#[derive(Debug, Clone)]
pub struct NormalizeContext<'a> {
    pub task_name: &'a str,
    /// Name and 1-based position of the source within its ingestion. Both
    /// go into the `sale_id` synthesized for rows that lack one, so two
    /// uploads sharing a file name still get distinct ids.
    pub source_name: &'a str,
    pub source_position: usize,
    pub processing_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTable {
    /// Input columns after renaming, followed by the canonical columns that
    /// had to be added.
    pub columns: Vec<String>,
    pub records: Vec<SalesRecord>,
}

pub fn normalize_table(table: &RawTable, ctx: &NormalizeContext<'_>) -> NormalizedTable {
    let mut columns = table
        .headers
        .iter()
        .map(|h| resolve_column_name(h))
        .collect::<Vec<_>>();

    let mut positions: HashMap<CanonicalField, usize> = HashMap::new();
    for (idx, column) in columns.iter().enumerate() {
        if let Some(field) = CanonicalField::from_name(column) {
            positions.entry(field).or_insert(idx);
        }
    }
    for field in CanonicalField::ALL {
        if !positions.contains_key(&field) {
            columns.push(field.name().to_string());
        }
    }
    debug!(
        "Source '{}' columns after normalization: {:?}",
        ctx.source_name, columns
    );

    let date_column_present = positions.contains_key(&CanonicalField::DateOfSale);
    let records = table
        .rows
        .iter()
        .enumerate()
        .map(|(row_idx, row)| {
            let cell = |field: CanonicalField| {
                positions
                    .get(&field)
                    .and_then(|&idx| row.get(idx))
                    .and_then(Option::as_ref)
            };
            let sale_id = coerce_text(cell(CanonicalField::SaleId))
                .unwrap_or_else(|| {
                    format!("{}#{}:{}", ctx.source_name, ctx.source_position, row_idx + 1)
                });
            let date_of_sale = if date_column_present {
                coerce_date(cell(CanonicalField::DateOfSale))
            } else {
                Some(ctx.processing_date)
            };
            SalesRecord {
                task_name: ctx.task_name.to_string(),
                sale_id,
                company: coerce_text(cell(CanonicalField::Company)),
                car_model: coerce_text(cell(CanonicalField::CarModel)),
                manufacturing_year: coerce_integer(cell(CanonicalField::ManufacturingYear)),
                price: coerce_float(cell(CanonicalField::Price)),
                sales_location: coerce_text(cell(CanonicalField::SalesLocation)),
                date_of_sale,
            }
        })
        .collect();

    NormalizedTable { columns, records }
}
