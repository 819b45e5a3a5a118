use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use common::{error::AppError, utils::config::AppConfig};

/// One row of the upstream item catalog.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CatalogEntry {
    pub id: i64,
    pub name: String,
    pub examine: Option<String>,
    #[serde(default)]
    pub members: bool,
    pub lowalch: Option<i64>,
    pub highalch: Option<i64>,
    #[serde(rename = "limit")]
    pub buy_limit: Option<i64>,
    pub value: Option<i64>,
    pub icon: Option<String>,
}

/// Latest instant-buy/instant-sell prices for one item.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct PriceQuote {
    pub high: Option<i64>,
    pub low: Option<i64>,
}

impl PriceQuote {
    /// True when the upstream reported no trade on either side.
    pub fn is_empty(&self) -> bool {
        self.high.is_none() && self.low.is_none()
    }
}

#[derive(Debug, Deserialize)]
struct LatestPricesEnvelope {
    data: HashMap<String, PriceQuote>,
}

/// Upstream feed of catalog rows and latest prices.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_catalog(&self) -> Result<Vec<CatalogEntry>, AppError>;
    async fn fetch_latest_prices(&self) -> Result<HashMap<i64, PriceQuote>, AppError>;
}

/// HTTP client for the public wiki price API.
#[derive(Debug, Clone)]
pub struct WikiApiSource {
    http: reqwest::Client,
    mapping_url: String,
    latest_url: String,
}

impl WikiApiSource {
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .user_agent(config.http_user_agent.clone())
            .build()?;

        Ok(Self {
            http,
            mapping_url: config.catalog_mapping_url.clone(),
            latest_url: config.latest_prices_url.clone(),
        })
    }
}

#[async_trait]
impl CatalogSource for WikiApiSource {
    async fn fetch_catalog(&self) -> Result<Vec<CatalogEntry>, AppError> {
        let response = self
            .http
            .get(&self.mapping_url)
            .send()
            .await?
            .error_for_status()
            .map_err(|err| AppError::Upstream(format!("catalog fetch failed: {err}")))?;

        let entries: Vec<CatalogEntry> = response.json().await?;
        debug!(count = entries.len(), "Fetched catalog mapping");
        Ok(entries)
    }

    async fn fetch_latest_prices(&self) -> Result<HashMap<i64, PriceQuote>, AppError> {
        let response = self
            .http
            .get(&self.latest_url)
            .send()
            .await?
            .error_for_status()
            .map_err(|err| AppError::Upstream(format!("price fetch failed: {err}")))?;

        let envelope: LatestPricesEnvelope = response.json().await?;
        let prices = parse_price_map(envelope.data);
        debug!(count = prices.len(), "Fetched latest prices");
        Ok(prices)
    }
}

/// Keys arrive as strings; non-numeric keys and quotes with neither side
/// populated are dropped.
fn parse_price_map(raw: HashMap<String, PriceQuote>) -> HashMap<i64, PriceQuote> {
    raw.into_iter()
        .filter_map(|(key, quote)| {
            let item_id = key.parse::<i64>().ok()?;
            (!quote.is_empty()).then_some((item_id, quote))
        })
        .collect()
}
