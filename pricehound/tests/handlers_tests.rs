use pricehound::handlers::*;
use pricehound_core::crawl::SeedReport;
use pricehound_core::job::JobSettings;
use pricehound_scanner::CancellationToken;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

#[test]
fn test_parse_url_line_with_scheme() {
    let result = parse_url_line("https://example.com");
    assert_eq!(result, Some("https://example.com/".to_string()));
}

#[test]
fn test_parse_url_line_without_scheme() {
    let result = parse_url_line("example.com/shop");
    assert_eq!(result, Some("https://example.com/shop".to_string()));
}

#[test]
fn test_parse_url_line_invalid() {
    assert_eq!(parse_url_line("not a valid url!!!"), None);
    assert_eq!(parse_url_line("ftp://files.example"), None);
}

#[test]
fn test_load_urls_from_file() -> Result<(), Box<dyn std::error::Error>> {
    let mut temp_file = NamedTempFile::new()?;
    writeln!(temp_file, "https://example.com")?;
    writeln!(temp_file, "# staging shops")?;
    writeln!(temp_file, "shop.example.org")?;
    writeln!(temp_file)?; // Empty line
    writeln!(temp_file, "  http://deals.example.net/today  ")?;

    let path = PathBuf::from(temp_file.path());
    let urls = load_urls_from_file(&path)?;

    assert_eq!(urls.len(), 3);
    assert_eq!(urls[0], "https://example.com/");
    assert_eq!(urls[1], "https://shop.example.org/");
    assert_eq!(urls[2], "http://deals.example.net/today");

    Ok(())
}

#[test]
fn test_load_urls_from_file_empty() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file).unwrap();
    writeln!(temp_file, "   ").unwrap();

    let path = PathBuf::from(temp_file.path());
    let result = load_urls_from_file(&path);

    assert!(result.is_err());
    assert!(result.unwrap_err().contains("No valid URLs"));
}

#[test]
fn test_load_urls_from_file_missing() {
    let result = load_urls_from_file(&PathBuf::from("/nonexistent/pricehound/seeds.txt"));
    assert!(result.unwrap_err().contains("Failed to read hosts file"));
}

#[test]
fn test_load_urls_from_source_single_url() {
    let result = load_urls_from_source(Some("https://example.com"), None).unwrap();

    assert_eq!(result.len(), 1);
    assert_eq!(result[0], "https://example.com/");
}

#[test]
fn test_load_urls_from_source_bare_host() {
    let result = load_urls_from_source(Some("shop.example"), None).unwrap();
    assert_eq!(result, vec!["https://shop.example/".to_string()]);
}

#[test]
fn test_load_urls_from_source_invalid_url() {
    let result = load_urls_from_source(Some("not a valid url!!!"), None);
    assert!(result.unwrap_err().contains("Invalid seed URL"));
}

#[test]
fn test_crawl_command_accepts_bare_host() {
    let matches = pricehound::commands::command_argument_builder()
        .try_get_matches_from(["pricehound", "crawl", "-u", "shop.example"])
        .unwrap();
    let (_, crawl) = matches.subcommand().unwrap();
    let url = crawl.get_one::<String>("url").map(String::as_str);

    let urls = load_urls_from_source(url, None).unwrap();
    assert_eq!(urls, vec!["https://shop.example/".to_string()]);
}

#[test]
fn test_load_urls_from_source_prefers_hosts_file() -> Result<(), Box<dyn std::error::Error>> {
    let mut temp_file = NamedTempFile::new()?;
    writeln!(temp_file, "https://a.example")?;
    let path = PathBuf::from(temp_file.path());
    let result = load_urls_from_source(Some("https://ignored.example"), Some(&path))?;
    assert_eq!(result, vec!["https://a.example/".to_string()]);
    Ok(())
}

#[test]
fn test_load_urls_from_source_no_input() {
    let result = load_urls_from_source(None, None);
    assert!(result.is_err());
    assert!(result.unwrap_err().contains("--url or --hosts-file"));
}

#[test]
fn test_render_report_formats() {
    let reports = vec![SeedReport::with_error(
        "https://a.example".to_string(),
        "HTTP status 500".to_string(),
    )];

    let csv = render_report(&reports, "csv").unwrap();
    assert_eq!(csv.lines().next(), Some("seed,page,key,amount,currency,label"));

    let json = render_report(&reports, "json").unwrap();
    assert!(json.contains("HTTP status 500"));

    let err = render_report(&reports, "yaml").unwrap_err();
    assert!(err.contains("Unknown report format"));
}

#[tokio::test]
async fn test_run_job_input_rejects_invalid_seed() -> Result<(), Box<dyn std::error::Error>> {
    let mut temp_file = NamedTempFile::new()?;
    writeln!(temp_file, "{{\"Url\": \"\"}}")?;
    writeln!(temp_file, "exit")?;
    writeln!(temp_file, "https://never.example")?;

    let path = temp_file.path().to_string_lossy().into_owned();
    let tally = run_job_input(
        Some(&path),
        JobSettings::default(),
        5,
        CancellationToken::new(),
    )
    .await?;

    assert_eq!(tally.completed, 0);
    assert_eq!(tally.rejected, 1);
    assert_eq!(tally.records, 0);
    Ok(())
}

#[tokio::test]
async fn test_run_job_input_missing_file() {
    let result = run_job_input(
        Some("/nonexistent/pricehound/jobs.txt"),
        JobSettings::default(),
        5,
        CancellationToken::new(),
    )
    .await;

    let err = format!("{:#}", result.unwrap_err());
    assert!(err.contains("Failed to open job file"));
}
