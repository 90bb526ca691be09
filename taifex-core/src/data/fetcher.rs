//! Single-task fetch: request, classify, parse, retry.
//!
//! Attempt outcomes:
//!
//! | Page                     | Effect                                  |
//! |--------------------------|-----------------------------------------|
//! | transport fault          | attempt consumed                        |
//! | status other than 200    | attempt consumed                        |
//! | no-data marker           | done, no record, no further attempts    |
//! | error marker             | attempt consumed                        |
//! | candidate, parses        | done, record                            |
//! | candidate, doesn't parse | attempt consumed                        |
//! | client cannot be built   | done, failed, no further attempts       |

use super::classify::{classify_page, PageClass};
use super::layout::{extract_record, ParseMiss};
use super::provider::{FetchError, PageQuery, PageSource};
use crate::domain::{DataScope, FetchTask, ParsedRecord};
use rand::Rng;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Per-task attempt budget and pacing.
///
/// The pause before attempt `n` (0-based) is
/// `request_delay + n * backoff + uniform(0..=jitter)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub request_delay: Duration,
    pub backoff: Duration,
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            request_delay: Duration::from_millis(500),
            backoff: Duration::from_secs(1),
            jitter: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// No pauses at all. For canned sources.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            request_delay: Duration::ZERO,
            backoff: Duration::ZERO,
            jitter: Duration::ZERO,
        }
    }

    /// Pause before the given 0-based attempt.
    pub fn pause_before(&self, attempt: u32, rng: &mut impl Rng) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rng.gen_range(0..=jitter_ms))
        };
        self.request_delay + self.backoff * attempt + jitter
    }
}

/// Result of one task. Exactly one per task.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Parsed(ParsedRecord),
    /// The exchange published nothing for this query.
    NoData,
    /// Attempt budget exhausted, or a fault no retry can fix.
    Failed { attempts: u32, reason: FetchError },
}

impl FetchOutcome {
    pub fn record(&self) -> Option<&ParsedRecord> {
        match self {
            FetchOutcome::Parsed(r) => Some(r),
            _ => None,
        }
    }
}

/// Anything that turns a task into an outcome. The scheduler only sees this.
pub trait RecordFetcher: Send + Sync {
    fn fetch(&self, task: &FetchTask) -> FetchOutcome;
}

/// Retrying fetcher over a page source.
pub struct Fetcher<S> {
    source: S,
    policy: RetryPolicy,
    scope: DataScope,
}

impl<S: PageSource> Fetcher<S> {
    pub fn new(source: S, policy: RetryPolicy, scope: DataScope) -> Self {
        Self {
            source,
            policy,
            scope,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// One request plus classification and parse.
    fn attempt(&self, task: &FetchTask, query: &PageQuery) -> Result<Option<ParsedRecord>, FetchError> {
        let page = self.source.get(query)?;
        if !page.is_ok() {
            return Err(FetchError::HttpStatus(page.status));
        }

        match classify_page(&page.body) {
            PageClass::NoData => Ok(None),
            PageClass::Error => Err(FetchError::ErrorPage),
            PageClass::Candidate => extract_record(&page.body, task)
                .map(Some)
                .map_err(FetchError::Parse),
        }
    }
}

impl<S: PageSource> RecordFetcher for Fetcher<S> {
    fn fetch(&self, task: &FetchTask) -> FetchOutcome {
        let query = PageQuery::for_task(task);
        let mut rng = rand::thread_rng();
        let max_attempts = self.policy.max_attempts.max(1);
        let mut last_error = FetchError::Network("no attempt made".into());

        for attempt in 0..max_attempts {
            let pause = self.policy.pause_before(attempt, &mut rng);
            if !pause.is_zero() {
                std::thread::sleep(pause);
            }

            match self.attempt(task, &query) {
                Ok(Some(record)) => {
                    debug!(task = %task.describe(), attempt = attempt + 1, "parsed");
                    return FetchOutcome::Parsed(record.restrict_to(self.scope));
                }
                Ok(None) => {
                    info!(task = %task.describe(), "no data published");
                    return FetchOutcome::NoData;
                }
                Err(e) if !e.is_retryable() => {
                    warn!(task = %task.describe(), error = %e, "giving up without retry");
                    return FetchOutcome::Failed {
                        attempts: attempt + 1,
                        reason: e,
                    };
                }
                Err(e) => {
                    match &e {
                        FetchError::Parse(ParseMiss::NoBaseRow | ParseMiss::NoContractRow) => warn!(
                            task = %task.describe(),
                            attempt = attempt + 1,
                            "contract base row not found"
                        ),
                        _ => warn!(
                            task = %task.describe(),
                            attempt = attempt + 1,
                            error = %e,
                            "attempt failed"
                        ),
                    }
                    last_error = e;
                }
            }
        }

        warn!(
            task = %task.describe(),
            attempts = max_attempts,
            error = %last_error,
            "retries exhausted, record dropped"
        );
        FetchOutcome::Failed {
            attempts: max_attempts,
            reason: last_error,
        }
    }
}
