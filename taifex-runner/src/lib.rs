//! TAIFEX Runner — crawl orchestration, consistency checks, export.
//!
//! This crate builds on `taifex-core` to provide:
//! - TOML crawl configuration with defaults and validation
//! - Date-range crawler: task expansion, bounded worker pool, single collector
//! - Progress reporting
//! - Post-crawl duplicate/outlier checks and net-volume reconciliation
//! - CSV and JSON export of the result table

pub mod config;
pub mod consistency;
pub mod export;
pub mod progress;
pub mod scheduler;

pub use config::{ConfigError, CrawlConfig};
pub use consistency::{
    check_consistency, log_flags, net_volume_mismatches, ConsistencyFlag, FlagReason,
};
pub use export::{export_csv, export_json, save_table, SavedFiles};
pub use progress::{CrawlProgress, LogProgress, SilentProgress, TaskStatus};
pub use scheduler::{
    build_tasks, crawl_tasks, exchange_fetcher, CrawlError, CrawlReport, CrawlStatus,
    CrawlSummary, Crawler,
};
