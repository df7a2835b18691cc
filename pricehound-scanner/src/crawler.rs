use crate::error::{Result, ScanError};
use crate::links::extract_urls;
use crate::prices::PriceExtractor;
use crate::result::{AggregateResultMap, PageResultMap, merge_into};
use crate::text::{LabelHeuristics, hosts_equal, make_absolute};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use url::Url;

pub const DEFAULT_TIMEOUT_SECS: u64 = 20;
pub const DEFAULT_USER_AGENT: &str = "Pricehound/0.1 (https://github.com/trapdoorsec/pricehound)";
pub const MAX_REDIRECTS: usize = 5;

pub type PageCallback = Arc<dyn Fn(PageEvent) + Send + Sync>;

/// Per-page progress notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    Fetched { url: String, depth: usize },
    Failed { url: String, error: String },
}

/// Counters for one crawl run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlStats {
    pub pages_fetched: usize,
    pub fetch_failures: usize,
    pub already_visited: usize,
    pub cancelled: usize,
    pub records: usize,
}

struct CrawlTask {
    url: Url,
    depth: usize,
}

enum TaskOutcome {
    Page(PageResultMap),
    AlreadyVisited,
    FetchFailed,
    Cancelled,
}

/// URLs claimed during one crawl run.
#[derive(Default)]
struct VisitedSet {
    urls: Mutex<HashSet<String>>,
}

impl VisitedSet {
    /// Claim `url`. Only the first caller for a given URL gets `true`.
    async fn claim(&self, url: &Url) -> bool {
        self.urls.lock().await.insert(url.as_str().to_string())
    }
}

/// State shared by every task of one crawl run.
struct CrawlRun {
    client: Client,
    extractor: PriceExtractor,
    visited: VisitedSet,
    next_worker: AtomicU64,
    max_depth: usize,
    seed_host: Option<String>,
    cancel: CancellationToken,
    queue: mpsc::UnboundedSender<CrawlTask>,
    page_callback: Option<PageCallback>,
}

impl CrawlRun {
    fn notify(&self, event: PageEvent) {
        if let Some(ref callback) = self.page_callback {
            callback(event);
        }
    }

    /// Whether the host policy of this run lets us request `url`.
    fn allows(&self, url: &Url) -> bool {
        match self.seed_host {
            Some(ref host) => hosts_equal(url, host),
            None => true,
        }
    }
}

pub struct Crawler {
    client: Client,
    extractor: PriceExtractor,
    timeout_secs: u64,
    user_agent: String,
    page_callback: Option<PageCallback>,
}

impl Crawler {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT_SECS)
    }

    pub fn with_timeout(timeout_secs: u64) -> Self {
        Self {
            client: Self::build_client(timeout_secs, DEFAULT_USER_AGENT),
            extractor: PriceExtractor::default(),
            timeout_secs,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            page_callback: None,
        }
    }

    fn build_client(timeout_secs: u64, user_agent: &str) -> Client {
        Client::builder()
            .user_agent(user_agent)
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .connect_timeout(std::time::Duration::from_secs(timeout_secs.div_ceil(2)))
            .pool_max_idle_per_host(50)
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .tcp_keepalive(std::time::Duration::from_secs(60))
            // redirects are followed by hand so the host policy applies to them
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("Failed to create HTTP client")
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self.client = Self::build_client(self.timeout_secs, &self.user_agent);
        self
    }

    pub fn with_label_heuristics(mut self, labels: LabelHeuristics) -> Self {
        self.extractor = PriceExtractor::new(labels);
        self
    }

    pub fn with_page_callback(mut self, callback: PageCallback) -> Self {
        self.page_callback = Some(callback);
        self
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }

    /// Crawl from `seed_url` and return every price found, keyed by occurrence.
    ///
    /// Only an empty or unresolvable seed is an error. Pages that fail to
    /// fetch are skipped.
    pub async fn crawl(
        &self,
        seed_url: &str,
        max_depth: usize,
        same_host_only: bool,
        cancel: CancellationToken,
    ) -> Result<AggregateResultMap> {
        self.crawl_with_stats(seed_url, max_depth, same_host_only, cancel)
            .await
            .map(|(results, _)| results)
    }

    pub async fn crawl_with_stats(
        &self,
        seed_url: &str,
        max_depth: usize,
        same_host_only: bool,
        cancel: CancellationToken,
    ) -> Result<(AggregateResultMap, CrawlStats)> {
        let start = Self::resolve_seed(seed_url)?;
        info!(
            "Starting price crawl of {} (max depth {}, same host only: {})",
            start, max_depth, same_host_only
        );

        let seed_host = if same_host_only {
            start.host_str().map(str::to_string)
        } else {
            None
        };

        let (queue, mut incoming) = mpsc::unbounded_channel();
        let run = Arc::new(CrawlRun {
            client: self.client.clone(),
            extractor: self.extractor.clone(),
            visited: VisitedSet::default(),
            next_worker: AtomicU64::new(0),
            max_depth,
            seed_host,
            cancel,
            queue,
            page_callback: self.page_callback.clone(),
        });

        let mut pending = JoinSet::new();
        pending.spawn(Self::crawl_page(run.clone(), CrawlTask { url: start, depth: 0 }));

        let mut pages = Vec::new();
        let mut stats = CrawlStats::default();

        // Tasks queue their children before they finish, so once the set is
        // empty and the queue is drained nothing can still be produced.
        loop {
            while let Ok(task) = incoming.try_recv() {
                Self::schedule(&run, &mut pending, task);
            }
            if pending.is_empty() {
                break;
            }

            tokio::select! {
                Some(task) = incoming.recv() => Self::schedule(&run, &mut pending, task),
                Some(joined) = pending.join_next() => match joined {
                    Ok(TaskOutcome::Page(page)) => {
                        stats.pages_fetched += 1;
                        pages.push(page);
                    }
                    Ok(TaskOutcome::AlreadyVisited) => stats.already_visited += 1,
                    Ok(TaskOutcome::FetchFailed) => stats.fetch_failures += 1,
                    Ok(TaskOutcome::Cancelled) => stats.cancelled += 1,
                    Err(e) => warn!("Crawl task failed: {}", e),
                },
            }
        }

        let mut results = AggregateResultMap::new();
        for page in pages {
            stats.records += merge_into(&mut results, page);
        }

        info!(
            "Crawl complete. Fetched {} pages ({} failed), found {} prices",
            stats.pages_fetched, stats.fetch_failures, stats.records
        );
        Ok((results, stats))
    }

    fn resolve_seed(seed_url: &str) -> Result<Url> {
        if seed_url.trim().is_empty() {
            return Err(ScanError::InvalidSeed("seed URL is empty".to_string()));
        }

        let mut start = make_absolute(seed_url, None)
            .map_err(|e| ScanError::InvalidSeed(e.to_string()))?;
        if start.scheme() != "http" && start.scheme() != "https" {
            return Err(ScanError::InvalidSeed(format!(
                "unsupported scheme '{}'",
                start.scheme()
            )));
        }

        start.set_fragment(None);
        Ok(start)
    }

    fn schedule(run: &Arc<CrawlRun>, pending: &mut JoinSet<TaskOutcome>, task: CrawlTask) {
        if run.cancel.is_cancelled() {
            trace!("Crawl cancelled, dropping {}", task.url);
            return;
        }
        pending.spawn(Self::crawl_page(run.clone(), task));
    }

    async fn crawl_page(run: Arc<CrawlRun>, task: CrawlTask) -> TaskOutcome {
        if run.cancel.is_cancelled() {
            return TaskOutcome::Cancelled;
        }
        if !run.visited.claim(&task.url).await {
            trace!("Already visited {}", task.url);
            return TaskOutcome::AlreadyVisited;
        }

        debug!("Fetching {} (depth {})", task.url, task.depth);
        let (final_url, html) = match Self::fetch(&run, &task.url).await {
            Ok((final_url, body)) => (final_url, Arc::<str>::from(body)),
            Err(e) => {
                warn!("Fetch error for {}: {}", task.url, e);
                run.notify(PageEvent::Failed {
                    url: task.url.to_string(),
                    error: e.to_string(),
                });
                return TaskOutcome::FetchFailed;
            }
        };
        run.notify(PageEvent::Fetched {
            url: task.url.to_string(),
            depth: task.depth,
        });

        let page_url = task.url.to_string();
        let worker_id = run.next_worker.fetch_add(1, Ordering::Relaxed) + 1;
        let extraction = {
            let run = run.clone();
            let html = html.clone();
            let page_url = page_url.clone();
            tokio::task::spawn_blocking(move || run.extractor.extract(&page_url, worker_id, &html))
        };

        if task.depth < run.max_depth && !run.cancel.is_cancelled() {
            Self::queue_links(&run, &final_url, task.depth, &html);
        }

        match extraction.await {
            Ok(page) => TaskOutcome::Page(page),
            Err(e) => {
                warn!("Price extraction for {} failed: {}", page_url, e);
                TaskOutcome::Page(PageResultMap::new())
            }
        }
    }

    fn queue_links(run: &CrawlRun, base: &Url, depth: usize, html: &str) {
        for found in extract_urls(base, html) {
            if !run.allows(&found) {
                trace!("Skipping cross-host link {}", found);
                continue;
            }

            debug!("Queuing {} at depth {}", found, depth + 1);
            let child = CrawlTask {
                url: found,
                depth: depth + 1,
            };
            if run.queue.send(child).is_err() {
                break;
            }
        }
    }

    /// Fetch `url`, following up to [`MAX_REDIRECTS`] redirects that the
    /// run's host policy allows. Returns the final URL with the body.
    async fn fetch(run: &CrawlRun, url: &Url) -> Result<(Url, String)> {
        let mut current = url.clone();

        for _ in 0..=MAX_REDIRECTS {
            let response = run.client.get(current.as_str()).send().await?;
            let status = response.status();

            if status.is_redirection() {
                let next = response
                    .headers()
                    .get(reqwest::header::LOCATION)
                    .and_then(|location| location.to_str().ok())
                    .and_then(|location| current.join(location).ok())
                    .ok_or(ScanError::StatusError(status.as_u16()))?;

                if !matches!(next.scheme(), "http" | "https") || !run.allows(&next) {
                    return Err(ScanError::RedirectError(format!(
                        "{} -> {} leaves the crawl scope",
                        current, next
                    )));
                }

                trace!("Following redirect {} -> {}", current, next);
                current = next;
                continue;
            }

            if !status.is_success() {
                return Err(ScanError::StatusError(status.as_u16()));
            }

            return Ok((current, response.text().await?));
        }

        Err(ScanError::RedirectError(format!(
            "more than {} redirects from {}",
            MAX_REDIRECTS, url
        )))
    }
}

impl Default for Crawler {
    fn default() -> Self {
        Self::new()
    }
}
