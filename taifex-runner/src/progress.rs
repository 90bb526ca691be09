//! Crawl progress reporting.

use taifex_core::domain::FetchTask;
use tracing::info;

/// How a finished task ended, as seen by the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Parsed,
    NoData,
    Failed,
    Cancelled,
}

/// Observer for crawl progress. Called from the collector thread only.
pub trait CrawlProgress {
    fn on_start(&self, total: usize);
    fn on_task_done(&self, task: &FetchTask, status: TaskStatus, completed: usize, total: usize);
    fn on_complete(&self, completed: usize, total: usize);
}

/// Logs a progress line every `every` completed tasks and at the end.
pub struct LogProgress {
    every: usize,
}

impl LogProgress {
    pub fn new(every: usize) -> Self {
        Self {
            every: every.max(1),
        }
    }
}

impl Default for LogProgress {
    fn default() -> Self {
        Self::new(25)
    }
}

impl CrawlProgress for LogProgress {
    fn on_start(&self, total: usize) {
        info!(total, "crawl started");
    }

    fn on_task_done(&self, _task: &FetchTask, _status: TaskStatus, completed: usize, total: usize) {
        if completed % self.every == 0 && completed < total {
            let pct = completed as f64 / total.max(1) as f64 * 100.0;
            info!(completed, total, "progress {pct:.0}%");
        }
    }

    fn on_complete(&self, completed: usize, total: usize) {
        info!(completed, total, "crawl finished");
    }
}

/// Discards all progress events.
pub struct SilentProgress;

impl CrawlProgress for SilentProgress {
    fn on_start(&self, _total: usize) {}
    fn on_task_done(&self, _task: &FetchTask, _status: TaskStatus, _completed: usize, _total: usize) {}
    fn on_complete(&self, _completed: usize, _total: usize) {}
}
