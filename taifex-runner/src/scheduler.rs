//! Crawl scheduler: expand a date range into tasks, fan them out over a
//! bounded worker pool, and collect outcomes on a single thread.
//!
//! ```text
//!   tasks ──par_iter──▶ [rayon pool, N workers] ──mpsc──▶ collector ──▶ ResultTable
//!                        fetch → classify → parse         (owns table, counts, progress)
//! ```
//!
//! Per-task faults never abort a crawl. The only fatal error is a range with
//! no business days.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};

use taifex_core::calendar::BusinessCalendar;
use taifex_core::data::{FetchError, FetchOutcome, Fetcher, HttpPageSource, RecordFetcher};
use taifex_core::domain::{Contract, FetchTask, Identity, ResultTable};

use crate::config::CrawlConfig;
use crate::consistency::{check_consistency, log_flags, ConsistencyFlag};
use crate::progress::{CrawlProgress, LogProgress, TaskStatus};

/// Errors that abort a crawl before or instead of producing a table.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("no trading days between {start} and {end}")]
    NoTradingDays { start: NaiveDate, end: NaiveDate },
    #[error("no contracts selected")]
    NoContracts,
    #[error("failed to build worker pool: {0}")]
    WorkerPool(String),
    #[error("page source: {0}")]
    Source(#[from] FetchError),
}

/// Cross product in presentation order. Without identities, one aggregate
/// task per (date, contract).
pub fn build_tasks(
    days: &[NaiveDate],
    contracts: &[Contract],
    identities: &[Identity],
) -> Vec<FetchTask> {
    let per_contract: Vec<Option<Identity>> = if identities.is_empty() {
        vec![None]
    } else {
        identities.iter().copied().map(Some).collect()
    };

    let mut tasks = Vec::with_capacity(days.len() * contracts.len() * per_contract.len());
    for &date in days {
        for &contract in contracts {
            for &identity in &per_contract {
                tasks.push(FetchTask::new(date, contract, identity));
            }
        }
    }
    tasks
}

/// Outcome counts for one crawl.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CrawlSummary {
    pub total: usize,
    pub parsed: usize,
    pub no_data: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub elapsed_ms: u64,
}

impl CrawlSummary {
    pub fn completed(&self) -> usize {
        self.parsed + self.no_data + self.failed + self.cancelled
    }

    pub fn status(&self) -> CrawlStatus {
        if self.total > 0 && self.failed == self.total {
            CrawlStatus::AllFailed
        } else if self.cancelled > 0 {
            CrawlStatus::Cancelled
        } else if self.failed > 0 {
            CrawlStatus::Partial
        } else {
            CrawlStatus::Complete
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlStatus {
    /// Every task parsed or reported no data.
    Complete,
    /// Some tasks failed; the table holds the rest.
    Partial,
    /// Stopped early; the table holds what finished.
    Cancelled,
    /// Every task failed. Usually a block or a site outage.
    AllFailed,
}

/// Everything a crawl produced.
#[derive(Debug, Clone)]
pub struct CrawlReport {
    /// Sorted by date, contract, identity.
    pub table: ResultTable,
    pub summary: CrawlSummary,
    pub status: CrawlStatus,
    pub flags: Vec<ConsistencyFlag>,
    /// Tasks that exhausted their attempts, in completion order.
    pub failed_tasks: Vec<FetchTask>,
}

/// Run `tasks` on a pool of `workers` threads and collect the results.
///
/// - `progress`: notified from the collector (this thread) after every task.
/// - `cancel`: once set, tasks not yet started are skipped and counted as cancelled.
pub fn crawl_tasks(
    tasks: &[FetchTask],
    fetcher: &dyn RecordFetcher,
    workers: usize,
    progress: &dyn CrawlProgress,
    cancel: Option<&AtomicBool>,
) -> Result<CrawlReport, CrawlError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()
        .map_err(|e| CrawlError::WorkerPool(e.to_string()))?;

    let start_time = Instant::now();
    let total = tasks.len();
    let mut summary = CrawlSummary {
        total,
        ..CrawlSummary::default()
    };
    let mut table = ResultTable::new();
    let mut failed_tasks = Vec::new();

    progress.on_start(total);
    let (tx, rx) = mpsc::channel::<(FetchTask, Option<FetchOutcome>)>();

    std::thread::scope(|s| {
        s.spawn(move || {
            pool.install(|| {
                tasks.par_iter().for_each_with(tx, |tx, task| {
                    let outcome = if cancel.is_some_and(|f| f.load(Ordering::Relaxed)) {
                        None
                    } else {
                        Some(fetcher.fetch(task))
                    };
                    // Receiver outlives every sender; a send can only fail if the collector panicked.
                    let _ = tx.send((*task, outcome));
                });
            });
        });

        for (task, outcome) in rx {
            let status = match outcome {
                Some(FetchOutcome::Parsed(record)) => {
                    table.push(record);
                    summary.parsed += 1;
                    TaskStatus::Parsed
                }
                Some(FetchOutcome::NoData) => {
                    summary.no_data += 1;
                    TaskStatus::NoData
                }
                Some(FetchOutcome::Failed { .. }) => {
                    summary.failed += 1;
                    failed_tasks.push(task);
                    TaskStatus::Failed
                }
                None => {
                    summary.cancelled += 1;
                    TaskStatus::Cancelled
                }
            };
            progress.on_task_done(&task, status, summary.completed(), total);
        }
    });

    summary.elapsed_ms = start_time.elapsed().as_millis() as u64;
    progress.on_complete(summary.completed(), total);

    table.sort_for_presentation();
    let flags = check_consistency(&table);
    log_flags(&flags);

    info!(
        total = summary.total,
        parsed = summary.parsed,
        no_data = summary.no_data,
        failed = summary.failed,
        cancelled = summary.cancelled,
        elapsed_ms = summary.elapsed_ms,
        "crawl summary"
    );

    let status = summary.status();
    if status == CrawlStatus::AllFailed {
        error!(
            total = summary.total,
            "every task failed; the exchange may be blocking requests or down"
        );
    }

    Ok(CrawlReport {
        table,
        summary,
        status,
        flags,
        failed_tasks,
    })
}

/// Build the HTTP-backed fetcher a config describes.
pub fn exchange_fetcher(config: &CrawlConfig) -> Result<Fetcher<HttpPageSource>, CrawlError> {
    let source = HttpPageSource::new(config.base_url.clone(), config.timeout())?;
    Ok(Fetcher::new(source, config.retry_policy(), config.scope))
}

/// Date-range crawler over a fetcher.
pub struct Crawler<F> {
    fetcher: F,
    workers: usize,
    calendar: BusinessCalendar,
    progress: Box<dyn CrawlProgress>,
    cancel: Option<Arc<AtomicBool>>,
}

impl<F: RecordFetcher> Crawler<F> {
    /// Crawler anchored at today's date in Taipei, logging progress.
    pub fn new(fetcher: F, workers: usize) -> Self {
        Self {
            fetcher,
            workers,
            calendar: BusinessCalendar::taipei_today(),
            progress: Box::new(LogProgress::default()),
            cancel: None,
        }
    }

    pub fn with_calendar(mut self, calendar: BusinessCalendar) -> Self {
        self.calendar = calendar;
        self
    }

    pub fn with_progress(mut self, progress: Box<dyn CrawlProgress>) -> Self {
        self.progress = progress;
        self
    }

    /// Share a flag that stops the crawl from starting new tasks once set.
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Crawl every business day in `start..=end` (end clamped to today).
    pub fn crawl_date_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        contracts: &[Contract],
        identities: &[Identity],
    ) -> Result<CrawlReport, CrawlError> {
        if contracts.is_empty() {
            return Err(CrawlError::NoContracts);
        }

        let days = self.calendar.business_days(start, end);
        if days.is_empty() {
            error!(%start, %end, "no trading days in range");
            return Err(CrawlError::NoTradingDays { start, end });
        }

        let tasks = build_tasks(&days, contracts, identities);
        info!(
            %start,
            %end,
            days = days.len(),
            contracts = contracts.len(),
            identities = identities.len(),
            tasks = tasks.len(),
            workers = self.workers,
            "crawling date range"
        );

        crawl_tasks(
            &tasks,
            &self.fetcher,
            self.workers,
            self.progress.as_ref(),
            self.cancel.as_deref(),
        )
    }
}
