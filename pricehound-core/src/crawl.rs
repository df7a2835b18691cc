use indicatif::{ProgressBar, ProgressStyle};
use pricehound_scanner::crawler::DEFAULT_TIMEOUT_SECS;
use pricehound_scanner::{AggregateResultMap, CancellationToken, CrawlStats, Crawler, PageEvent};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use url::Url;

/// Options for configuring a crawl operation
pub struct CrawlOptions {
    pub urls: Vec<String>,
    pub max_depth: usize,
    pub same_host_only: bool,
    pub timeout_secs: u64,
    pub show_progress_bars: bool,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            urls: Vec::new(),
            max_depth: 1,
            same_host_only: true,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            show_progress_bars: false,
        }
    }
}

/// Callback for reporting crawl progress
pub type CrawlProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Everything one seed produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedReport {
    pub seed: String,
    pub stats: CrawlStats,
    pub records: AggregateResultMap,
    pub error: Option<String>,
}

impl SeedReport {
    pub fn new(seed: String, records: AggregateResultMap, stats: CrawlStats) -> Self {
        Self {
            seed,
            stats,
            records,
            error: None,
        }
    }

    pub fn with_error(seed: String, error: String) -> Self {
        Self {
            seed,
            stats: CrawlStats::default(),
            records: AggregateResultMap::new(),
            error: Some(error),
        }
    }
}

/// Extract the path component from a URL
pub fn extract_url_path(url: &str) -> String {
    Url::parse(url)
        .ok()
        .map(|u| {
            let path = u.path().to_string();
            if path.is_empty() || path == "/" {
                "/".to_string()
            } else {
                path
            }
        })
        .unwrap_or_else(|| url.to_string())
}

/// The page URL an occurrence key was produced for
pub fn page_of_key(key: &str) -> &str {
    key.rsplitn(3, "::").nth(2).unwrap_or(key)
}

/// Execute a crawl for every seed in `options`, one after the other
pub async fn execute_crawl(
    options: CrawlOptions,
    progress_callback: Option<CrawlProgressCallback>,
    cancel: CancellationToken,
) -> Result<Vec<SeedReport>, String> {
    let CrawlOptions {
        urls,
        max_depth,
        same_host_only,
        timeout_secs,
        show_progress_bars,
    } = options;

    if urls.is_empty() {
        return Err("No seed URLs provided".to_string());
    }

    let progress_bar = if show_progress_bars {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .map_err(|e| e.to_string())?,
        );
        pb.set_message("Starting crawl...");
        Some(Arc::new(pb))
    } else {
        None
    };

    let fetched_count = Arc::new(AtomicUsize::new(0));

    let mut crawler = Crawler::with_timeout(timeout_secs);
    if let Some(ref pb) = progress_bar {
        let pb_clone = pb.clone();
        let count_clone = fetched_count.clone();
        crawler = crawler.with_page_callback(Arc::new(move |event: PageEvent| {
            if let PageEvent::Fetched { url, .. } = event {
                let count = count_clone.fetch_add(1, Ordering::Relaxed) + 1;
                pb_clone.set_message(format!("Crawling... {} pages fetched ({})", count, url));
                pb_clone.tick();
            }
        }));
    }

    let mut reports = Vec::new();
    for (idx, url_str) in urls.iter().enumerate() {
        if cancel.is_cancelled() {
            break;
        }

        if let Some(ref callback) = progress_callback
            && urls.len() > 1
        {
            callback(format!("Crawling seed {}/{}: {}", idx + 1, urls.len(), url_str));
        }

        match crawler
            .crawl_with_stats(url_str, max_depth, same_host_only, cancel.clone())
            .await
        {
            Ok((records, stats)) => {
                reports.push(SeedReport::new(url_str.clone(), records, stats));
            }
            Err(e) => {
                if let Some(ref callback) = progress_callback {
                    callback(format!("[!]  Failed to crawl {}: {}", url_str, e));
                }
                reports.push(SeedReport::with_error(url_str.clone(), e.to_string()));
            }
        }
    }

    if let Some(ref pb) = progress_bar {
        let total = fetched_count.load(Ordering::Relaxed);
        pb.finish_with_message(format!("Crawl complete! {} pages fetched", total));
    }

    Ok(reports)
}
