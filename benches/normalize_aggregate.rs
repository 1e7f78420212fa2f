use std::fmt::Write as _;

use chrono::NaiveDate;
use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use encoding_rs::UTF_8;
use sales_report::frequency::{company_aggregate, monthly_aggregate};
use sales_report::io_utils::{SourceFormat, decode_table};
use sales_report::schema::{NormalizeContext, SalesRecord, normalize_table};
use sales_report::stats::summarize;

fn generate_sales(rows: usize) -> Vec<u8> {
    let mut csv = String::from("Sale ID,Company,carModel,Manufacturing Year,Price,Sales Location,saleDate\n");
    for i in 0..rows {
        let company = match i % 4 {
            0 => "Acme",
            1 => "Zenith",
            2 => "Orbit",
            _ => "",
        };
        let month = (i % 12) + 1;
        let day = (i % 28) + 1;
        let year = 2015 + (i % 10);
        let price = 5_000 + (i % 40) * 750;
        let _ = writeln!(
            csv,
            "{i},{company},Model {},{year},{price}.50,City {},2024-{month:02}-{day:02}",
            i % 7,
            i % 5
        );
    }
    csv.into_bytes()
}

fn processing_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 15).expect("valid date")
}

fn normalize(bytes: &[u8]) -> Vec<SalesRecord> {
    let table = decode_table("sales.csv", SourceFormat::Csv, bytes, UTF_8).expect("decode csv");
    let ctx = NormalizeContext {
        task_name: "bench",
        source_name: "sales.csv",
        source_position: 1,
        processing_date: processing_date(),
    };
    normalize_table(&table, &ctx).records
}

fn bench_normalize_aggregate(c: &mut Criterion) {
    let bytes = generate_sales(50_000);
    let records = normalize(&bytes);

    let mut group = c.benchmark_group("sales_pipeline");

    group.bench_function("decode_and_normalize_csv", |b| {
        b.iter_batched(
            || (),
            |_| normalize(&bytes),
            BatchSize::SmallInput,
        );
    });

    group.bench_function("summary_and_aggregates", |b| {
        b.iter(|| {
            let summary = summarize(&records, processing_date());
            let companies = company_aggregate(&records);
            let months = monthly_aggregate(&records, processing_date());
            (summary, companies, months)
        });
    });

    group.finish();
}

criterion_group!(benches, bench_normalize_aggregate);
criterion_main!(benches);
