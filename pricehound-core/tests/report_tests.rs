// Tests for report generation functionality

use pricehound_core::crawl::SeedReport;
use pricehound_core::report::{
    ReportFormat, gather_report_data, generate_csv_report, generate_json_report, generate_report,
    generate_text_report, save_report,
};
use pricehound_scanner::{AggregateResultMap, CrawlStats, PriceRecord};
use rust_decimal::Decimal;
use tempfile::TempDir;

fn money(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn sample_reports() -> Vec<SeedReport> {
    let mut records = AggregateResultMap::new();
    records.insert(
        "https://shop.example/::worker-1::#1".to_string(),
        PriceRecord::new(money("1234.56"), "$", "total"),
    );
    records.insert(
        "https://shop.example/deals::worker-2::#1".to_string(),
        PriceRecord::new(money("9.99"), "EUR", "sale, \"hot\""),
    );

    let stats = CrawlStats {
        pages_fetched: 2,
        fetch_failures: 1,
        already_visited: 3,
        cancelled: 0,
        records: 2,
    };

    vec![
        SeedReport::new("https://shop.example".to_string(), records, stats),
        SeedReport::with_error(String::new(), "Invalid seed URL: seed URL is empty".to_string()),
    ]
}

// ============================================================================
// Report Format Tests
// ============================================================================

#[test]
fn test_report_format_from_str() {
    assert_eq!(ReportFormat::from_str("text"), Some(ReportFormat::Text));
    assert_eq!(ReportFormat::from_str("txt"), Some(ReportFormat::Text));
    assert_eq!(ReportFormat::from_str("json"), Some(ReportFormat::Json));
    assert_eq!(ReportFormat::from_str("csv"), Some(ReportFormat::Csv));
}

#[test]
fn test_report_format_from_str_case_insensitive() {
    assert_eq!(ReportFormat::from_str("JSON"), Some(ReportFormat::Json));
    assert_eq!(ReportFormat::from_str("Csv"), Some(ReportFormat::Csv));
}

#[test]
fn test_report_format_from_str_unknown() {
    assert_eq!(ReportFormat::from_str("html"), None);
    assert_eq!(ReportFormat::from_str(""), None);
}

// ============================================================================
// Report Data Tests
// ============================================================================

#[test]
fn test_gather_report_data_sorts_rows_and_counts() {
    let data = gather_report_data(&sample_reports());

    assert_eq!(data.total_records, 2);
    assert_eq!(data.seeds.len(), 2);

    let rows = &data.seeds[0].records;
    assert_eq!(rows[0].key, "https://shop.example/::worker-1::#1");
    assert_eq!(rows[0].page, "https://shop.example/");
    assert_eq!(rows[1].page, "https://shop.example/deals");

    assert!(data.seeds[1].records.is_empty());
    assert!(data.seeds[1].error.is_some());
}

// ============================================================================
// Output Format Tests
// ============================================================================

#[test]
fn test_generate_text_report() {
    let report = generate_text_report(&gather_report_data(&sample_reports()));

    assert!(report.contains("Seeds crawled: 2"));
    assert!(report.contains("Pages fetched: 2"));
    assert!(report.contains("Failed fetches: 1"));
    assert!(report.contains("Prices found: 2"));
    assert!(report.contains("https://shop.example"));
    assert!(report.contains("/deals"));
    assert!(report.contains("1234.56"));
    assert!(report.contains("seed URL is empty"));
}

#[test]
fn test_generate_json_report() {
    let json = generate_json_report(&gather_report_data(&sample_reports())).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value["total_records"], 2);
    let first = &value["seeds"][0]["records"][0];
    assert_eq!(first["amount"], "1234.56");
    assert_eq!(first["currency"], "$");
    assert_eq!(first["label"], "total");
    assert_eq!(value["seeds"][0]["stats"]["pages_fetched"], 2);
    assert!(value["seeds"][0].get("error").is_none());
    assert_eq!(value["seeds"][1]["error"], "Invalid seed URL: seed URL is empty");
}

#[test]
fn test_generate_csv_report_escapes_fields() {
    let csv = generate_csv_report(&gather_report_data(&sample_reports()));
    let lines: Vec<&str> = csv.lines().collect();

    assert_eq!(lines[0], "seed,page,key,amount,currency,label");
    assert_eq!(
        lines[1],
        "https://shop.example,https://shop.example/,https://shop.example/::worker-1::#1,1234.56,$,total"
    );
    assert!(lines[2].ends_with(",9.99,EUR,\"sale, \"\"hot\"\"\""));
    assert_eq!(lines.len(), 3);
}

#[test]
fn test_generate_report_dispatches_on_format() {
    let data = gather_report_data(&sample_reports());
    let csv = generate_report(&data, ReportFormat::Csv).unwrap();
    assert!(csv.starts_with("seed,page,key"));
    let json = generate_report(&data, ReportFormat::Json).unwrap();
    assert!(json.trim_start().starts_with('{'));
}

#[test]
fn test_save_report() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let path = dir.path().join("prices.csv");

    save_report("seed,page\n", &path)?;

    assert_eq!(std::fs::read_to_string(&path)?, "seed,page\n");
    Ok(())
}
