//! Group-by aggregations for charting: per company and per calendar month.

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{schema::SalesRecord, stats::round_money};

pub const UNKNOWN_COMPANY: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyBucket {
    pub company: String,
    pub count: usize,
    pub total_revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthBucket {
    /// `YYYY-MM`
    pub month: String,
    pub count: usize,
    pub total_revenue: f64,
    pub avg_price: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    count: usize,
    revenue: f64,
}

impl Tally {
    fn add(&mut self, price: Option<f64>) {
        self.count += 1;
        self.revenue += price.unwrap_or(0.0);
    }
}

/// Buckets keep the order in which companies are first seen.
#[derive(Debug, Default)]
pub struct CompanyAccumulator {
    order: Vec<String>,
    positions: HashMap<String, usize>,
    tallies: Vec<Tally>,
}

impl CompanyAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ingest(&mut self, record: &SalesRecord) {
        let company = record.company.as_deref().unwrap_or(UNKNOWN_COMPANY);
        let idx = match self.positions.get(company) {
            Some(&idx) => idx,
            None => {
                let idx = self.order.len();
                self.order.push(company.to_string());
                self.positions.insert(company.to_string(), idx);
                self.tallies.push(Tally::default());
                idx
            }
        };
        self.tallies[idx].add(record.price);
    }

    pub fn render(&self) -> Vec<CompanyBucket> {
        self.order
            .iter()
            .zip(&self.tallies)
            .map(|(company, tally)| CompanyBucket {
                company: company.clone(),
                count: tally.count,
                total_revenue: round_money(tally.revenue),
            })
            .collect()
    }
}

/// Buckets are keyed by `(year, month)` so they sort chronologically, also
/// for years that `YYYY-MM` renders with a sign.
#[derive(Debug)]
pub struct MonthlyAccumulator {
    processing_date: NaiveDate,
    months: BTreeMap<(i32, u32), Tally>,
}

impl MonthlyAccumulator {
    pub fn new(processing_date: NaiveDate) -> Self {
        Self {
            processing_date,
            months: BTreeMap::new(),
        }
    }

    pub fn ingest(&mut self, record: &SalesRecord) {
        let date = record.date_of_sale.unwrap_or(self.processing_date);
        self.months
            .entry((date.year(), date.month()))
            .or_default()
            .add(record.price);
    }

    pub fn render(&self) -> Vec<MonthBucket> {
        self.months
            .iter()
            .map(|(&(year, month), tally)| MonthBucket {
                month: NaiveDate::from_ymd_opt(year, month, 1)
                    .map_or_else(|| format!("{year:04}-{month:02}"), month_key),
                count: tally.count,
                total_revenue: round_money(tally.revenue),
                avg_price: round_money(tally.revenue / tally.count as f64),
            })
            .collect()
    }
}

pub fn month_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

pub fn company_aggregate(records: &[SalesRecord]) -> Vec<CompanyBucket> {
    let mut acc = CompanyAccumulator::new();
    records.iter().for_each(|r| acc.ingest(r));
    acc.render()
}

pub fn monthly_aggregate(records: &[SalesRecord], processing_date: NaiveDate) -> Vec<MonthBucket> {
    let mut acc = MonthlyAccumulator::new(processing_date);
    records.iter().for_each(|r| acc.ingest(r));
    acc.render()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(company: Option<&str>, price: Option<f64>, date: Option<(i32, u32, u32)>) -> SalesRecord {
        SalesRecord {
            task_name: "t".into(),
            sale_id: "1".into(),
            company: company.map(str::to_string),
            car_model: None,
            manufacturing_year: None,
            price,
            sales_location: None,
            date_of_sale: date.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
        }
    }

    #[test]
    fn company_buckets_keep_first_seen_order_and_unknown() {
        let records = vec![
            record(Some("Zenith"), Some(10.0), None),
            record(None, Some(5.0), None),
            record(Some("Acme"), None, None),
            record(Some("Zenith"), Some(2.5), None),
        ];
        let buckets = company_aggregate(&records);
        let names = buckets.iter().map(|b| b.company.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["Zenith", UNKNOWN_COMPANY, "Acme"]);
        assert_eq!(buckets[0].count, 2);
        assert_eq!(buckets[0].total_revenue, 12.5);
        assert_eq!(buckets[2].total_revenue, 0.0);
    }

    #[test]
    fn monthly_buckets_are_sorted_and_averaged() {
        let records = vec![
            record(None, Some(300.0), Some((2024, 2, 1))),
            record(None, Some(100.0), Some((2024, 1, 15))),
            record(None, Some(200.0), Some((2024, 1, 20))),
        ];
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let buckets = monthly_aggregate(&records, today);
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].month, "2024-01");
        assert_eq!(buckets[0].count, 2);
        assert_eq!(buckets[0].avg_price, 150.0);
        assert_eq!(buckets[1].month, "2024-02");
    }

    #[test]
    fn months_sort_chronologically_across_signed_years() {
        let records = vec![
            record(None, Some(1.0), Some((10000, 1, 5))),
            record(None, Some(1.0), Some((2024, 1, 5))),
            record(None, Some(1.0), Some((-1, 1, 5))),
            record(None, Some(1.0), Some((-2, 1, 5))),
        ];
        let buckets = monthly_aggregate(&records, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        let months = buckets.iter().map(|b| b.month.as_str()).collect::<Vec<_>>();
        assert_eq!(months, vec!["-0002-01", "-0001-01", "2024-01", "+10000-01"]);
    }

    #[test]
    fn null_dates_fall_into_processing_month() {
        let today = NaiveDate::from_ymd_opt(2025, 11, 3).unwrap();
        let buckets = monthly_aggregate(&[record(None, Some(1.0), None)], today);
        assert_eq!(buckets[0].month, "2025-11");
    }

    #[test]
    fn monthly_average_rounds_half_to_even() {
        let records = vec![
            record(None, Some(0.25), Some((2024, 1, 1))),
            record(None, Some(0.0), Some((2024, 1, 2))),
        ];
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let buckets = monthly_aggregate(&records, today);
        assert_eq!(buckets[0].avg_price, 0.12);
    }
}
