use std::time::Duration;

use anyhow::{Error, Result};
use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, REFERER, USER_AGENT},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::quote::Fields;

pub const DEFAULT_SCAN_URL: &str = "https://scanner.tradingview.com/crypto/scan";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Anything that can hand back the latest field values for a ticker.
#[allow(async_fn_in_trait)]
pub trait QuoteSource {
    /// `Ok(None)` when the provider knows no row for `ticker`.
    async fn fetch_fields(&self, ticker: &str, columns: &[String]) -> Result<Option<Fields>>;
}

#[derive(Clone)]
pub struct ScanClient {
    client: Client,
    scan_url: String,
}

impl ScanClient {
    pub fn new(scan_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        // The scanner rejects requests that don't look like they came from its site.
        headers.insert(USER_AGENT, HeaderValue::from_static("Mozilla/5.0"));
        headers.insert(
            REFERER,
            HeaderValue::from_static("https://www.tradingview.com/"),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            scan_url: scan_url.into(),
        })
    }

    pub fn scan_url(&self) -> &str {
        &self.scan_url
    }
}

impl QuoteSource for ScanClient {
    async fn fetch_fields(&self, ticker: &str, columns: &[String]) -> Result<Option<Fields>, Error> {
        debug!(ticker, url = %self.scan_url, columns = columns.len(), "posting scan request");

        let res: ScanResponse = self
            .client
            .post(&self.scan_url)
            .json(&ScanRequest::new(ticker, columns))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(res.into_fields(columns))
    }
}

//
// Match the scanner's JSON
// body:     {"symbols":{"tickers":[..],"query":{"types":[]}},"columns":[..],"range":[0,1]}
// response: {"totalCount":1,"data":[{"s":"BINANCE:LTCUSDT","d":[..]}]}
//
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ScanRequest<'a> {
    pub symbols: Symbols<'a>,
    pub columns: &'a [String],
    pub range: [u32; 2],
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Symbols<'a> {
    pub tickers: [&'a str; 1],
    pub query: SymbolQuery,
}

#[derive(Debug, Serialize, Clone, Default, PartialEq)]
pub struct SymbolQuery {
    pub types: Vec<String>,
}

impl<'a> ScanRequest<'a> {
    pub fn new(ticker: &'a str, columns: &'a [String]) -> Self {
        Self {
            symbols: Symbols {
                tickers: [ticker],
                query: SymbolQuery::default(),
            },
            columns,
            range: [0, 1],
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ScanResponse {
    #[serde(default)]
    pub data: Vec<ScanRow>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ScanRow {
    #[serde(rename = "s", default)]
    pub symbol: Option<String>,

    #[serde(rename = "d", default)]
    pub values: Vec<Value>,
}

impl ScanResponse {
    /// Values of the first row keyed by the requested columns.
    pub fn into_fields(self, columns: &[String]) -> Option<Fields> {
        self.data
            .into_iter()
            .next()
            .map(|row| Fields::zip(columns, &row.values))
    }
}
