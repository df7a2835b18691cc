use anyhow::{Context, Result};
use clap::ArgMatches;
use colored::Colorize;
use pricehound_core::crawl::{CrawlOptions, SeedReport, execute_crawl};
use pricehound_core::job::{ConsoleSink, JobSettings, JobTally, LineJobSource, run_jobs};
use pricehound_core::report::{ReportFormat, gather_report_data, generate_report, save_report};
use pricehound_scanner::text::make_absolute;
use pricehound_scanner::{CancellationToken, Crawler};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncBufRead;
use tracing_subscriber::EnvFilter;

/// Log to stderr so reports on stdout stay clean. `RUST_LOG` overrides the
/// default level.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

// Helper functions for crawl handler

/// Load URLs from either a file or a single URL argument
pub fn load_urls_from_source(
    url: Option<&str>,
    hosts_file: Option<&PathBuf>,
) -> Result<Vec<String>, String> {
    if let Some(hosts_file_path) = hosts_file {
        load_urls_from_file(hosts_file_path)
    } else if let Some(url) = url {
        parse_url_line(url.trim())
            .map(|url| vec![url])
            .ok_or_else(|| format!("Invalid seed URL '{}'", url))
    } else {
        Err("Either --url or --hosts-file must be provided".to_string())
    }
}

/// Load and parse seed URLs from a file, one per line
pub fn load_urls_from_file(path: &Path) -> Result<Vec<String>, String> {
    let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
    let content = fs::read_to_string(&expanded)
        .map_err(|e| format!("Failed to read hosts file {}: {}", path.display(), e))?;

    let urls: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(parse_url_line)
        .collect();

    if urls.is_empty() {
        return Err(format!("No valid URLs found in {}", path.display()));
    }

    Ok(urls)
}

/// Parse a single line as a seed URL, adding `https://` when no scheme is given
pub fn parse_url_line(line: &str) -> Option<String> {
    match make_absolute(line, None) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Some(url.to_string()),
        Ok(url) => {
            eprintln!("{}  Skipping non-HTTP URL '{}'", "[!]".yellow(), url);
            None
        }
        Err(_) => {
            eprintln!("{}  Skipping invalid URL '{}'", "[!]".yellow(), line);
            None
        }
    }
}

/// Render the crawl reports in the requested format
pub fn render_report(reports: &[SeedReport], format: &str) -> Result<String, String> {
    let format = ReportFormat::from_str(format)
        .ok_or_else(|| format!("Unknown report format '{}'", format))?;
    let data = gather_report_data(reports);
    generate_report(&data, format).map_err(|e| format!("Failed to render report: {}", e))
}

pub async fn handle_crawl(sub_matches: &ArgMatches, quiet: bool, cancel: CancellationToken) {
    let url = sub_matches.get_one::<String>("url").map(String::as_str);
    let hosts_file = sub_matches.get_one::<PathBuf>("hosts-file");
    let max_depth = *sub_matches.get_one::<usize>("depth").unwrap_or(&1);
    let cross_host = sub_matches.get_flag("cross-host");
    let timeout_secs = *sub_matches.get_one::<u64>("timeout").unwrap_or(&20);
    let format = sub_matches
        .get_one::<String>("format")
        .map(String::as_str)
        .unwrap_or("text");
    let output = sub_matches.get_one::<PathBuf>("output");

    let urls = match load_urls_from_source(url, hosts_file) {
        Ok(urls) => urls,
        Err(e) => {
            eprintln!("{} {}", "✗".red().bold(), e);
            std::process::exit(1);
        }
    };

    if !quiet {
        println!("Crawling {} seed(s)", urls.len());
        println!("Max depth: {}", max_depth);
        println!(
            "Cross-host: {}\n",
            if cross_host {
                "follow"
            } else {
                "disabled (same host only)"
            }
        );
    }

    let options = CrawlOptions {
        urls,
        max_depth,
        same_host_only: !cross_host,
        timeout_secs,
        show_progress_bars: !quiet,
    };

    let progress_callback = Arc::new(|msg: String| {
        eprintln!("{}", msg);
    });

    let reports = match execute_crawl(options, Some(progress_callback), cancel.clone()).await {
        Ok(reports) => reports,
        Err(e) => {
            eprintln!("{} Crawl failed: {}", "✗".red().bold(), e);
            std::process::exit(1);
        }
    };

    if cancel.is_cancelled() {
        eprintln!("{} Crawl interrupted, reporting partial results", "[!]".yellow());
    } else if !quiet {
        println!("\n{} Crawl complete!\n", "✓".green().bold());
    }

    let report = match render_report(&reports, format) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("{} {}", "✗".red().bold(), e);
            std::process::exit(1);
        }
    };

    match output {
        Some(path) => {
            let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
            if let Err(e) = save_report(&report, Path::new(&expanded)) {
                eprintln!("{} Failed to save report to {}: {}", "✗".red().bold(), expanded, e);
                std::process::exit(1);
            }
            if !quiet {
                println!("{} Report saved to {}", "✓".green().bold(), expanded);
            }
        }
        None => print!("{}", report),
    }
}

/// Drain jobs from `path` (stdin when `None`) and print each outcome to stdout
pub async fn run_job_input(
    path: Option<&str>,
    settings: JobSettings,
    timeout_secs: u64,
    cancel: CancellationToken,
) -> Result<JobTally> {
    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match path {
        Some(path) => {
            let expanded = shellexpand::tilde(path).into_owned();
            let file = tokio::fs::File::open(&expanded)
                .await
                .with_context(|| format!("Failed to open job file {}", expanded))?;
            Box::new(tokio::io::BufReader::new(file))
        }
        None => Box::new(tokio::io::BufReader::new(tokio::io::stdin())),
    };

    let mut source = LineJobSource::new(reader);
    let mut sink = ConsoleSink::new(io::stdout());
    let crawler = Crawler::with_timeout(timeout_secs);

    run_jobs(&mut source, &mut sink, &crawler, settings, cancel).await
}

pub async fn handle_jobs(sub_matches: &ArgMatches, quiet: bool, cancel: CancellationToken) {
    let path = sub_matches.get_one::<String>("PATH").map(String::as_str);
    let settings = JobSettings {
        max_depth: *sub_matches.get_one::<usize>("depth").unwrap_or(&1),
        same_host_only: !sub_matches.get_flag("cross-host"),
    };
    let timeout_secs = *sub_matches.get_one::<u64>("timeout").unwrap_or(&20);

    if !quiet {
        eprintln!(
            "Waiting for jobs from {} (type 'exit' to stop)",
            path.unwrap_or("stdin")
        );
    }

    match run_job_input(path, settings, timeout_secs, cancel.clone()).await {
        Ok(tally) => {
            if !quiet {
                eprintln!(
                    "{} {} job(s) completed, {} rejected, {} prices found",
                    "✓".green().bold(),
                    tally.completed,
                    tally.rejected,
                    tally.records
                );
            }
            // an abandoned stdin read would hold up runtime shutdown
            if cancel.is_cancelled() {
                std::process::exit(130);
            }
        }
        Err(e) => {
            eprintln!("{} Job processing failed: {:#}", "✗".red().bold(), e);
            std::process::exit(1);
        }
    }
}
