//! Job intake and result delivery around the crawl engine.
//!
//! A [`JobSource`] hands out one seed URL per job and a [`ResultSink`]
//! receives what the crawl produced. The engine does not care where jobs
//! come from; [`LineJobSource`] reads them from any line-oriented input,
//! which covers files, stdin and the JSON messages a queue publisher emits.

use anyhow::{Context, Result};
use pricehound_scanner::{AggregateResultMap, CancellationToken, CrawlStats, Crawler, ScanError};
use serde::Deserialize;
use std::future::Future;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};
use uuid::Uuid;

/// Line that ends a [`LineJobSource`] early.
pub const EXIT_COMMAND: &str = "exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlJob {
    pub id: Uuid,
    pub url: String,
}

impl CrawlJob {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            url: url.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum JobOutcome {
    Completed {
        job: CrawlJob,
        records: AggregateResultMap,
        stats: CrawlStats,
    },
    Rejected {
        job: CrawlJob,
        reason: String,
    },
}

impl JobOutcome {
    pub fn job(&self) -> &CrawlJob {
        match self {
            JobOutcome::Completed { job, .. } | JobOutcome::Rejected { job, .. } => job,
        }
    }
}

pub trait JobSource {
    /// Next job, or `None` once the source is exhausted.
    fn next_job(&mut self) -> impl Future<Output = Result<Option<CrawlJob>>> + Send;
}

pub trait ResultSink {
    fn deliver(&mut self, outcome: JobOutcome) -> Result<()>;
}

/// Per-job crawl settings.
#[derive(Debug, Clone, Copy)]
pub struct JobSettings {
    pub max_depth: usize,
    pub same_host_only: bool,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            max_depth: 1,
            same_host_only: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobTally {
    pub completed: usize,
    pub rejected: usize,
    pub records: usize,
}

/// Run one crawl per job until the source is exhausted or `cancel` fires.
pub async fn run_jobs<S, K>(
    source: &mut S,
    sink: &mut K,
    crawler: &Crawler,
    settings: JobSettings,
    cancel: CancellationToken,
) -> Result<JobTally>
where
    S: JobSource,
    K: ResultSink,
{
    let mut tally = JobTally::default();

    loop {
        // waiting for input must not outlive a cancellation
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = source.next_job() => next?,
        };
        let Some(job) = next else {
            break;
        };
        if cancel.is_cancelled() {
            break;
        }
        info!("Processing job {}: {}", job.id, job.url);

        let outcome = match crawler
            .crawl_with_stats(
                &job.url,
                settings.max_depth,
                settings.same_host_only,
                cancel.clone(),
            )
            .await
        {
            Ok((records, stats)) => {
                tally.completed += 1;
                tally.records += records.len();
                JobOutcome::Completed {
                    job,
                    records,
                    stats,
                }
            }
            Err(e) => {
                tally.rejected += 1;
                let reason = match e {
                    ScanError::InvalidSeed(reason) => reason,
                    other => other.to_string(),
                };
                JobOutcome::Rejected { job, reason }
            }
        };

        sink.deliver(outcome)?;
    }

    Ok(tally)
}

#[derive(Deserialize)]
struct JobMessage {
    #[serde(alias = "Url")]
    url: String,
}

/// One job per non-blank line. A line may be a bare URL or a JSON message
/// such as `{"Url": "https://shop.example"}`; a line reading `exit` stops
/// the source.
pub struct LineJobSource<R> {
    reader: R,
    line: String,
    line_no: usize,
}

impl<R: AsyncBufRead + Unpin + Send> LineJobSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
            line_no: 0,
        }
    }

    async fn read_job(&mut self) -> Result<Option<CrawlJob>> {
        loop {
            self.line.clear();
            let read = self
                .reader
                .read_line(&mut self.line)
                .await
                .context("Failed to read job input")?;
            if read == 0 {
                return Ok(None);
            }
            self.line_no += 1;

            let trimmed = self.line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if trimmed.eq_ignore_ascii_case(EXIT_COMMAND) {
                return Ok(None);
            }

            if trimmed.starts_with('{') {
                match serde_json::from_str::<JobMessage>(trimmed) {
                    Ok(message) => return Ok(Some(CrawlJob::new(message.url))),
                    Err(e) => {
                        warn!("Skipping malformed job message on line {}: {}", self.line_no, e);
                        continue;
                    }
                }
            }

            return Ok(Some(CrawlJob::new(trimmed)));
        }
    }
}

impl<R: AsyncBufRead + Unpin + Send> JobSource for LineJobSource<R> {
    async fn next_job(&mut self) -> Result<Option<CrawlJob>> {
        self.read_job().await
    }
}

/// Prints a summary and every record of each finished job.
pub struct ConsoleSink<W> {
    out: W,
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ResultSink for ConsoleSink<W> {
    fn deliver(&mut self, outcome: JobOutcome) -> Result<()> {
        match outcome {
            JobOutcome::Completed { job, records, stats } => {
                writeln!(
                    self.out,
                    "[job {}] Found {} prices across {} pages ({})",
                    job.id,
                    records.len(),
                    stats.pages_fetched,
                    job.url
                )?;
                let mut entries: Vec<_> = records.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));
                for (key, record) in entries {
                    writeln!(self.out, "[job {}]   {} => {}", job.id, key, record)?;
                }
            }
            JobOutcome::Rejected { job, reason } => {
                writeln!(self.out, "[job {}] Rejected {:?}: {}", job.id, job.url, reason)?;
            }
        }
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn test_line_source_skips_blanks_and_reads_json() {
        let input = "https://a.example\n\n   \n{\"Url\": \"https://b.example\", \"Timestamp\": \"2024-01-01T00:00:00Z\"}\n{\"url\": \"c.example\"}\n";
        let mut source = LineJobSource::new(Cursor::new(input));

        let mut urls = Vec::new();
        while let Some(job) = source.next_job().await.unwrap() {
            urls.push(job.url);
        }

        assert_eq!(urls, vec!["https://a.example", "https://b.example", "c.example"]);
    }

    #[tokio::test]
    async fn test_line_source_stops_at_exit() {
        let mut source = LineJobSource::new(Cursor::new("a.example\nEXIT\nb.example\n"));
        assert_eq!(source.next_job().await.unwrap().unwrap().url, "a.example");
        assert!(source.next_job().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_line_source_skips_malformed_json() {
        let mut source = LineJobSource::new(Cursor::new("{not json\nd.example\n"));
        assert_eq!(source.next_job().await.unwrap().unwrap().url, "d.example");
    }

    #[test]
    fn test_console_sink_reports_rejection() {
        let mut sink = ConsoleSink::new(Vec::new());
        let job = CrawlJob::new("");
        sink.deliver(JobOutcome::Rejected {
            job,
            reason: "seed URL is empty".to_string(),
        })
        .unwrap();

        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert!(out.contains("Rejected \"\": seed URL is empty"));
    }
}
