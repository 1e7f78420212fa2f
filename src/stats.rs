use chrono::NaiveDate;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::schema::SalesRecord;

/// Rounds half-to-even at two decimal places. Applied to outputs only;
/// accumulation always runs on unrounded values.
pub fn round_money(value: f64) -> f64 {
    Decimal::from_f64(value)
        .map(|d| d.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven))
        .and_then(|d| d.to_f64())
        .unwrap_or(value)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_sales: usize,
    pub total_revenue: f64,
    pub average_price: f64,
    pub date_range: Option<DateRange>,
}

#[derive(Debug, Clone)]
pub struct SummaryAccumulator {
    processing_date: NaiveDate,
    count: usize,
    revenue: f64,
    earliest: Option<NaiveDate>,
    latest: Option<NaiveDate>,
}

impl SummaryAccumulator {
    pub fn new(processing_date: NaiveDate) -> Self {
        Self {
            processing_date,
            count: 0,
            revenue: 0.0,
            earliest: None,
            latest: None,
        }
    }

    pub fn ingest(&mut self, record: &SalesRecord) {
        self.count += 1;
        self.revenue += record.price.unwrap_or(0.0);
        // Missing dates count as the processing date for the range only.
        let date = record.date_of_sale.unwrap_or(self.processing_date);
        self.earliest = Some(self.earliest.map_or(date, |d| d.min(date)));
        self.latest = Some(self.latest.map_or(date, |d| d.max(date)));
    }

    pub fn finish(&self) -> Summary {
        let average = if self.count == 0 {
            0.0
        } else {
            self.revenue / self.count as f64
        };
        Summary {
            total_sales: self.count,
            total_revenue: round_money(self.revenue),
            average_price: round_money(average),
            date_range: self
                .earliest
                .zip(self.latest)
                .map(|(start, end)| DateRange { start, end }),
        }
    }
}

pub fn summarize(records: &[SalesRecord], processing_date: NaiveDate) -> Summary {
    let mut acc = SummaryAccumulator::new(processing_date);
    for record in records {
        acc.ingest(record);
    }
    acc.finish()
}
