//! Page-source trait and structured fetch errors.
//!
//! The PageSource trait abstracts over where positioning pages come from (the
//! exchange over HTTP, canned pages in tests) so the fetcher's retry and
//! classification logic never touches the network directly.

use super::layout::ParseMiss;
use crate::domain::{Contract, FetchTask};
use chrono::NaiveDate;
use thiserror::Error;

/// Query for one positioning page. Identity is not a query parameter: every
/// identity of a contract is printed on the same page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageQuery {
    pub date: NaiveDate,
    pub contract: Contract,
}

impl PageQuery {
    pub fn for_task(task: &FetchTask) -> Self {
        Self {
            date: task.date,
            contract: task.contract,
        }
    }

    /// Form parameters in the order the exchange's own form submits them.
    pub fn params(&self) -> [(&'static str, String); 5] {
        [
            ("queryType", "2".to_string()),
            ("marketCode", "0".to_string()),
            ("dateaddcnt", String::new()),
            ("commodity_id", self.contract.code().to_string()),
            ("queryDate", self.date.format("%Y/%m/%d").to_string()),
        ]
    }
}

/// A page as received, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPage {
    pub status: u16,
    pub body: String,
}

impl RawPage {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Structured error types for fetch operations.
///
/// Every variant except [`FetchError::ClientBuild`] is a per-task fault: it
/// ends up inside a failed outcome and never aborts a crawl.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("network fault: {0}")]
    Network(String),

    #[error("HTTP status {0}")]
    HttpStatus(u16),

    #[error("exchange returned an error page")]
    ErrorPage,

    #[error("unparseable page: {0}")]
    Parse(ParseMiss),

    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),
}

impl FetchError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FetchError::ClientBuild(_))
    }
}

/// Source of positioning pages.
///
/// Implementations only transport bytes. Status handling, classification and
/// retries live in the fetcher above this trait.
pub trait PageSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Perform one request.
    fn get(&self, query: &PageQuery) -> Result<RawPage, FetchError>;
}

impl<S: PageSource + ?Sized> PageSource for std::sync::Arc<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn get(&self, query: &PageQuery) -> Result<RawPage, FetchError> {
        (**self).get(query)
    }
}
