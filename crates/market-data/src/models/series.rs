use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::Symbol;

/// One observation of a price series.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}

impl SeriesPoint {
    pub fn new(timestamp: DateTime<Utc>, price: f64) -> Self {
        Self {
            timestamp,
            price,
            volume: None,
        }
    }

    pub fn with_volume(timestamp: DateTime<Utc>, price: f64, volume: f64) -> Self {
        Self {
            timestamp,
            price,
            volume: Some(volume),
        }
    }
}

/// Provider-agnostic price history with derived statistics.
///
/// Points are kept in ascending timestamp order. `mean_return` is the mean
/// of simple period-over-period returns and `volatility` their sample
/// standard deviation; both are zero when fewer than two points exist.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormalizedSeries {
    pub symbol: Symbol,
    pub points: Vec<SeriesPoint>,
    pub source_provider: String,
    pub volatility: f64,
    pub mean_return: f64,
}

impl NormalizedSeries {
    /// Build a series, sorting points and deriving return statistics.
    pub fn new(symbol: impl Into<Symbol>, source: impl Into<String>, mut points: Vec<SeriesPoint>) -> Self {
        points.retain(|p| p.price.is_finite());
        points.sort_by_key(|p| p.timestamp);

        let returns = simple_returns(&points);
        let (mean_return, volatility) = mean_and_std(&returns);

        Self {
            symbol: symbol.into(),
            points,
            source_provider: source.into(),
            volatility,
            mean_return,
        }
    }

    /// Build a series from parallel timestamp/price columns.
    ///
    /// Returns `None` when the columns differ in length.
    pub fn from_columns(
        symbol: impl Into<Symbol>,
        source: impl Into<String>,
        timestamps: &[DateTime<Utc>],
        prices: &[f64],
        volumes: Option<&[f64]>,
    ) -> Option<Self> {
        if timestamps.len() != prices.len() {
            return None;
        }
        if let Some(v) = volumes {
            if v.len() != prices.len() {
                return None;
            }
        }

        let points = timestamps
            .iter()
            .zip(prices)
            .enumerate()
            .map(|(i, (ts, price))| SeriesPoint {
                timestamp: *ts,
                price: *price,
                volume: volumes.map(|v| v[i]),
            })
            .collect();

        Some(Self::new(symbol, source, points))
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn latest_price(&self) -> Option<f64> {
        self.points.last().map(|p| p.price)
    }

    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.points.iter().map(|p| p.timestamp).collect()
    }

    pub fn prices(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.price).collect()
    }
}

fn simple_returns(points: &[SeriesPoint]) -> Vec<f64> {
    points
        .windows(2)
        .filter(|w| w[0].price != 0.0)
        .map(|w| (w[1].price - w[0].price) / w[0].price)
        .collect()
}

fn mean_and_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if values.len() < 2 {
        return (mean, 0.0);
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, variance.sqrt())
}
