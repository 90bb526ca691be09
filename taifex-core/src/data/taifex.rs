//! HTTP page source for the exchange's daily positioning page.
//!
//! The exchange serves the page as an HTML form result. It answers 200 for
//! data, for "no data" and for most malformed queries alike. This source maps
//! transport faults only; the status travels up with the body and the fetcher
//! decides what a non-200 answer costs.

use super::provider::{FetchError, PageQuery, PageSource, RawPage};
use reqwest::blocking::{Client, ClientBuilder};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER};
use std::time::Duration;
use tracing::debug;

/// Institutional positioning by contract, all identities on one page.
pub const DEFAULT_BASE_URL: &str = "https://www.taifex.com.tw/cht/3/futContractsDate";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";
const ACCEPT_ZH_TW: &str = "zh-TW,zh;q=0.9,en-US;q=0.8,en;q=0.7";
const MARKET_VIEW_REFERER: &str = "https://www.taifex.com.tw/cht/3/futDailyMarketView";

/// Exchange page source over a blocking reqwest client.
pub struct HttpPageSource {
    client: Client,
    base_url: String,
}

fn browser_like(timeout: Duration) -> ClientBuilder {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_ZH_TW));
    headers.insert(REFERER, HeaderValue::from_static(MARKET_VIEW_REFERER));

    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .default_headers(headers)
}

impl HttpPageSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        Self::with_builder(base_url, browser_like(timeout))
    }

    /// Source against the public exchange URL.
    pub fn exchange(timeout: Duration) -> Result<Self, FetchError> {
        Self::new(DEFAULT_BASE_URL, timeout)
    }

    fn with_builder(base_url: impl Into<String>, builder: ClientBuilder) -> Result<Self, FetchError> {
        let client = builder
            .build()
            .map_err(|e| FetchError::ClientBuild(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl PageSource for HttpPageSource {
    fn name(&self) -> &str {
        "taifex"
    }

    fn get(&self, query: &PageQuery) -> Result<RawPage, FetchError> {
        let resp = self
            .client
            .get(&self.base_url)
            .query(&query.params())
            .send()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = resp.status().as_u16();
        let body = resp
            .text()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        debug!(
            contract = %query.contract,
            date = %query.date,
            status,
            bytes = body.len(),
            "page received"
        );

        Ok(RawPage { status, body })
    }
}
