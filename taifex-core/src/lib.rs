//! TAIFEX Core — domain types, page parsing, fetching, business calendar.
//!
//! This crate turns one (date, contract, identity) query into at most one
//! positioning record:
//! - Domain types (contracts, identities, tasks, records, result table)
//! - Number normalization and page classification
//! - Table location and the two layout strategies
//! - Retrying fetcher over a pluggable page source
//! - Monday–Friday business calendar in exchange local time

pub mod calendar;
pub mod data;
pub mod domain;

pub use calendar::{is_business_day, BusinessCalendar};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything handed across worker threads is Send + Sync.
    ///
    /// The scheduler shares one fetcher across a rayon pool and moves records
    /// over a channel. If any type fails this check, the build breaks immediately.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::FetchTask>();
        require_sync::<domain::FetchTask>();
        require_send::<domain::ParsedRecord>();
        require_sync::<domain::ParsedRecord>();
        require_send::<domain::ResultTable>();
        require_sync::<domain::ResultTable>();

        // Fetch types
        require_send::<data::FetchOutcome>();
        require_sync::<data::FetchOutcome>();
        require_send::<data::FetchError>();
        require_sync::<data::FetchError>();
        require_send::<data::HttpPageSource>();
        require_sync::<data::HttpPageSource>();
        require_send::<data::Fetcher<data::HttpPageSource>>();
        require_sync::<data::Fetcher<data::HttpPageSource>>();
    }

    /// The scheduler only depends on the object-safe fetcher trait.
    #[test]
    fn record_fetcher_is_object_safe() {
        fn _check(f: &dyn data::RecordFetcher, task: &domain::FetchTask) -> data::FetchOutcome {
            f.fetch(task)
        }
    }
}
