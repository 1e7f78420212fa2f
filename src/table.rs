//! Aligned plain-text tables for terminal output.

use std::borrow::Cow;
use std::fmt::Write as _;

use crate::{
    frequency::{CompanyBucket, MonthBucket},
    schema::SalesRecord,
    service::Analytics,
    store::TaskSummary,
};

pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths = headers.iter().map(|h| h.chars().count().max(3)).collect::<Vec<_>>();
    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(widths.len()) {
            widths[idx] = widths[idx].max(sanitize_cell(cell).chars().count());
        }
    }

    let mut output = String::new();
    let header_cells = headers.iter().map(|h| h.to_string()).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&header_cells, &widths));
    let separator = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&separator, &widths));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }
    output
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let line = values
        .iter()
        .zip(widths)
        .map(|(value, width)| format!("{:<width$}", sanitize_cell(value), width = *width))
        .collect::<Vec<_>>()
        .join("  ");
    line.trim_end().to_string()
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

fn opt<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map(ToString::to_string).unwrap_or_default()
}

fn money(value: f64) -> String {
    format!("{value:.2}")
}

pub fn render_tasks(tasks: &[TaskSummary]) -> String {
    let rows = tasks
        .iter()
        .map(|t| vec![t.task_name.clone(), t.record_count.to_string()])
        .collect::<Vec<_>>();
    render_table(&["task_name", "record_count"], &rows)
}

pub fn render_records(records: &[SalesRecord]) -> String {
    let rows = records
        .iter()
        .map(|r| {
            vec![
                r.sale_id.clone(),
                opt(&r.company),
                opt(&r.car_model),
                opt(&r.manufacturing_year),
                r.price.map(money).unwrap_or_default(),
                opt(&r.sales_location),
                opt(&r.date_of_sale),
            ]
        })
        .collect::<Vec<_>>();
    render_table(
        &[
            "sale_id",
            "company",
            "car_model",
            "manufacturing_year",
            "price",
            "sales_location",
            "date_of_sale",
        ],
        &rows,
    )
}

fn render_companies(buckets: &[CompanyBucket]) -> String {
    let rows = buckets
        .iter()
        .map(|b| vec![b.company.clone(), b.count.to_string(), money(b.total_revenue)])
        .collect::<Vec<_>>();
    render_table(&["company", "count", "total_revenue"], &rows)
}

fn render_months(buckets: &[MonthBucket]) -> String {
    let rows = buckets
        .iter()
        .map(|b| {
            vec![
                b.month.clone(),
                b.count.to_string(),
                money(b.total_revenue),
                money(b.avg_price),
            ]
        })
        .collect::<Vec<_>>();
    render_table(&["month", "count", "total_revenue", "avg_price"], &rows)
}

pub fn render_analytics(analytics: &Analytics) -> String {
    let summary = &analytics.summary;
    let range = summary
        .date_range
        .map(|r| format!("{} .. {}", r.start, r.end))
        .unwrap_or_else(|| "-".to_string());
    let mut output = String::new();
    let _ = writeln!(output, "Task: {}", analytics.task_name);
    let _ = writeln!(output, "Total sales: {}", summary.total_sales);
    let _ = writeln!(output, "Total revenue: {}", money(summary.total_revenue));
    let _ = writeln!(output, "Average price: {}", money(summary.average_price));
    let _ = writeln!(output, "Date range: {range}");
    let _ = writeln!(output);
    output.push_str(&render_companies(&analytics.company_aggregate));
    let _ = writeln!(output);
    output.push_str(&render_months(&analytics.monthly_aggregate));
    output
}
