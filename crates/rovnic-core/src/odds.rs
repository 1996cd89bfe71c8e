//! Game context source backed by The Odds API (v4).

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::error::{CoreError, Result};
use crate::features::GameContext;

pub const DEFAULT_ODDS_BASE_URL: &str = "https://api.the-odds-api.com/v4";
const REGIONS: &str = "us";
const MARKETS: &str = "h2h,spreads,totals";

/// Supplies upcoming games for a domain.
#[async_trait]
pub trait GameContextSource: Send + Sync {
    async fn fetch(&self, domain: &str) -> Result<Vec<GameContext>>;
}

/// Provider sport key for a domain, if the domain is supported.
pub fn sport_key(domain: &str) -> Option<&'static str> {
    let key = match domain.to_ascii_lowercase().as_str() {
        "nba" => "basketball_nba",
        "nfl" => "americanfootball_nfl",
        "mlb" => "baseball_mlb",
        "nhl" => "icehockey_nhl",
        "ncaaf" => "americanfootball_ncaaf",
        "ncaab" => "basketball_ncaab",
        "soccer" => "soccer_epl",
        "ufc" => "mma_ufc",
        _ => return None,
    };
    Some(key)
}

#[derive(Debug, Clone)]
pub struct OddsApiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OddsApiClient {
    /// Build a client whose every request is bounded by `timeout`.
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(CoreError::Configuration("odds API key is empty".to_string()));
        }
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::Configuration(format!("http client: {e}")))?;
        Ok(Self {
            http,
            base_url: DEFAULT_ODDS_BASE_URL.to_string(),
            api_key,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn odds_url(&self, sport_key: &str) -> String {
        format!("{}/sports/{}/odds", self.base_url, sport_key)
    }
}

#[async_trait]
impl GameContextSource for OddsApiClient {
    #[instrument(skip(self))]
    async fn fetch(&self, domain: &str) -> Result<Vec<GameContext>> {
        let key = sport_key(domain)
            .ok_or_else(|| CoreError::Configuration(format!("unknown domain '{domain}'")))?;

        let response = self
            .http
            .get(self.odds_url(key))
            .query(&[
                ("apiKey", self.api_key.as_str()),
                ("regions", REGIONS),
                ("markets", MARKETS),
            ])
            .send()
            .await
            .map_err(|e| CoreError::unavailable("odds api", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CoreError::unavailable(
                "odds api",
                format!("HTTP {status} for {domain}"),
            ));
        }

        let games: Vec<GameContext> = response
            .json()
            .await
            .map_err(|e| CoreError::unavailable("odds api", format!("malformed body: {e}")))?;
        debug!(games = games.len(), "Fetched odds");
        Ok(games)
    }
}
