//! Feature extraction from raw game context.
//!
//! [`GameContext`] mirrors one event of an odds feed; a [`FeatureExtractor`]
//! turns it into the vector the predictor scores. Training reuses the
//! vectors captured on outcome records, so the same extractor must be used
//! for a domain across model generations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Market key for head-to-head (moneyline) prices.
pub const H2H_MARKET: &str = "h2h";

/// One upcoming game with the bookmaker markets quoted on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameContext {
    pub id: String,
    #[serde(default)]
    pub sport_key: String,
    pub commence_time: DateTime<Utc>,
    pub home_team: String,
    pub away_team: String,
    #[serde(default)]
    pub bookmakers: Vec<Bookmaker>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmaker {
    pub key: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub markets: Vec<Market>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    pub key: String,
    #[serde(default)]
    pub outcomes: Vec<MarketOutcome>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketOutcome {
    pub name: String,
    /// Decimal odds
    pub price: f64,
    #[serde(default)]
    pub point: Option<f64>,
}

impl GameContext {
    pub fn matchup(&self) -> String {
        format!("{} vs {}", self.home_team, self.away_team)
    }
}

/// Turns raw game context into a model feature vector.
pub trait FeatureExtractor: Send + Sync {
    /// Length of every vector `extract` returns.
    fn width(&self) -> usize;

    fn extract(&self, domain: &str, context: &GameContext) -> Result<Vec<f64>>;
}

/// Market-implied features from head-to-head prices.
///
/// Produces `[home implied probability, away implied probability,
/// overround]`, each averaged over the bookmakers quoting both teams.
/// Implied probability is `1 / decimal price`; overround is the sum of the
/// implied probabilities of every outcome in the market (draws included).
#[derive(Debug, Clone, Copy, Default)]
pub struct OddsFeatureExtractor;

impl OddsFeatureExtractor {
    pub const WIDTH: usize = 3;
}

fn implied(price: f64) -> Option<f64> {
    (price.is_finite() && price > 1.0).then(|| 1.0 / price)
}

impl FeatureExtractor for OddsFeatureExtractor {
    fn width(&self) -> usize {
        Self::WIDTH
    }

    fn extract(&self, domain: &str, context: &GameContext) -> Result<Vec<f64>> {
        let mut sums = [0.0f64; Self::WIDTH];
        let mut books = 0usize;

        for book in &context.bookmakers {
            let Some(market) = book.markets.iter().find(|m| m.key == H2H_MARKET) else {
                continue;
            };
            let price_of = |team: &str| {
                market
                    .outcomes
                    .iter()
                    .find(|o| o.name == team)
                    .and_then(|o| implied(o.price))
            };
            let (Some(home), Some(away)) =
                (price_of(&context.home_team), price_of(&context.away_team))
            else {
                continue;
            };
            let overround: f64 = market.outcomes.iter().filter_map(|o| implied(o.price)).sum();

            sums[0] += home;
            sums[1] += away;
            sums[2] += overround;
            books += 1;
        }

        if books == 0 {
            return Err(CoreError::FeatureExtraction(format!(
                "{domain} game {} has no usable head-to-head prices",
                context.id
            )));
        }
        Ok(sums.iter().map(|s| s / books as f64).collect())
    }
}
