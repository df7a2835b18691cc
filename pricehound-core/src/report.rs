// Report generation from crawl results

use crate::crawl::{SeedReport, extract_url_path, page_of_key};
use colored::Colorize;
use pricehound_scanner::{CrawlStats, PriceRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
    Csv,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            "csv" => Some(ReportFormat::Csv),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportData {
    pub generated_at: String,
    pub total_records: usize,
    pub seeds: Vec<SeedSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedSection {
    pub seed: String,
    pub stats: CrawlStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub records: Vec<RecordRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordRow {
    pub key: String,
    pub page: String,
    #[serde(flatten)]
    pub record: PriceRecord,
}

/// Flatten seed reports into rows sorted by occurrence key.
pub fn gather_report_data(reports: &[SeedReport]) -> ReportData {
    let seeds: Vec<SeedSection> = reports
        .iter()
        .map(|report| {
            let sorted: BTreeMap<&String, &PriceRecord> = report.records.iter().collect();
            SeedSection {
                seed: report.seed.clone(),
                stats: report.stats,
                error: report.error.clone(),
                records: sorted
                    .into_iter()
                    .map(|(key, record)| RecordRow {
                        key: key.clone(),
                        page: page_of_key(key).to_string(),
                        record: record.clone(),
                    })
                    .collect(),
            }
        })
        .collect();

    ReportData {
        generated_at: chrono::Utc::now().to_rfc3339(),
        total_records: seeds.iter().map(|s| s.records.len()).sum(),
        seeds,
    }
}

pub fn generate_report(data: &ReportData, format: ReportFormat) -> Result<String, serde_json::Error> {
    match format {
        ReportFormat::Text => Ok(generate_text_report(data)),
        ReportFormat::Json => generate_json_report(data),
        ReportFormat::Csv => Ok(generate_csv_report(data)),
    }
}

pub fn generate_text_report(data: &ReportData) -> String {
    let mut report = String::new();

    report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");
    report.push_str("# Summary:\n");
    report.push_str(&format!("  Seeds crawled: {}\n", data.seeds.len()));
    let pages: usize = data.seeds.iter().map(|s| s.stats.pages_fetched).sum();
    report.push_str(&format!("  Pages fetched: {}\n", pages));
    let failures: usize = data.seeds.iter().map(|s| s.stats.fetch_failures).sum();
    report.push_str(&format!("  Failed fetches: {}\n", failures));
    report.push_str(&format!("  Prices found: {}\n", data.total_records));
    report.push_str("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");

    for section in &data.seeds {
        report.push_str(&format!("## {}\n", section.seed.bright_white().bold()));

        if let Some(ref error) = section.error {
            report.push_str(&format!("  {} {}\n\n", "✗".red().bold(), error.red()));
            continue;
        }
        report.push_str(&format!("  {} prices found\n\n", section.records.len()));

        // rows are key-sorted, so rows of one page are contiguous
        let mut current_page: Option<&str> = None;
        for row in &section.records {
            if current_page != Some(row.page.as_str()) {
                report.push_str(&format!("  {}\n", extract_url_path(&row.page).cyan()));
                current_page = Some(row.page.as_str());
            }
            let amount = format!("{} {}", row.record.currency(), row.record.amount());
            report.push_str(&format!(
                "    {:>16}  {}\n",
                amount.green(),
                row.record.label().bright_black()
            ));
        }
        report.push('\n');
    }

    report
}

pub fn generate_json_report(data: &ReportData) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(data)
}

pub fn generate_csv_report(data: &ReportData) -> String {
    let mut csv = String::from("seed,page,key,amount,currency,label\n");
    for section in &data.seeds {
        for row in &section.records {
            let fields = [
                section.seed.clone(),
                row.page.clone(),
                row.key.clone(),
                row.record.amount().to_string(),
                row.record.currency().to_string(),
                row.record.label().to_string(),
            ];
            let line: Vec<String> = fields.iter().map(|f| csv_escape(f)).collect();
            csv.push_str(&line.join(","));
            csv.push('\n');
        }
    }
    csv
}

fn csv_escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}
