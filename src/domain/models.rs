// src/domain/models.rs
use crate::domain::errors::{ConfigError, ConfigResult};
use chrono::{Datelike, Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Instrument symbol, stored upper-cased
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ticker(String);

impl Ticker {
    pub fn new(symbol: &str) -> ConfigResult<Self> {
        let symbol = symbol.trim();
        if symbol.is_empty() {
            return Err(ConfigError::EmptyTicker);
        }
        Ok(Self(symbol.to_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Spacing between consecutive price points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Weekly,
    Monthly,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Weekly => "weekly",
            Granularity::Monthly => "monthly",
        }
    }

    pub fn periods_per_year(&self) -> f64 {
        match self {
            Granularity::Weekly => 52.0,
            Granularity::Monthly => 12.0,
        }
    }

    /// Number of periods covering the inclusive span `start..=end`.
    /// Returns 0 for an inverted range.
    ///
    /// A weekly grid whose last step falls short of `end`'s month gets one
    /// closing period, so every calendar month in the span has a period.
    pub fn period_count(&self, start: NaiveDate, end: NaiveDate) -> usize {
        if start > end {
            return 0;
        }
        match self {
            Granularity::Weekly => {
                let steps = (end - start).num_days() / 7;
                let last = start
                    .checked_add_signed(Duration::days(steps * 7))
                    .unwrap_or(end);
                let closing = (last.year(), last.month()) != (end.year(), end.month());
                steps as usize + 1 + usize::from(closing)
            }
            Granularity::Monthly => month_span(start, end),
        }
    }

    /// Date of the period at `index` within `start..=end`; never later than `end`
    pub fn period_date_within(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        index: usize,
    ) -> Option<NaiveDate> {
        self.period_date(start, index).map(|date| date.min(end))
    }

    /// Calendar date of the period at `index`, counted from `start`
    pub fn period_date(&self, start: NaiveDate, index: usize) -> Option<NaiveDate> {
        match self {
            Granularity::Weekly => {
                let days = i64::try_from(index).ok()?.checked_mul(7)?;
                start.checked_add_signed(Duration::days(days))
            }
            Granularity::Monthly => {
                let months = u32::try_from(index).ok()?;
                start.checked_add_months(Months::new(months))
            }
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "weekly" | "week" | "1wk" => Ok(Granularity::Weekly),
            "monthly" | "month" | "1mo" => Ok(Granularity::Monthly),
            other => Err(ConfigError::Invalid(format!("Unknown granularity: {}", other))),
        }
    }
}

/// Inclusive number of calendar months touched by `start..=end`
pub fn month_span(start: NaiveDate, end: NaiveDate) -> usize {
    if start > end {
        return 0;
    }
    let months = (end.year() - start.year()) * 12 + end.month() as i32 - start.month() as i32 + 1;
    months.max(0) as usize
}

/// Contribution strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strategy {
    #[serde(rename = "lump")]
    LumpSum,
    #[serde(rename = "dca")]
    DollarCostAverage,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::LumpSum => "lump",
            Strategy::DollarCostAverage => "dca",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Strategy::LumpSum => write!(f, "Lump Sum"),
            Strategy::DollarCostAverage => write!(f, "Dollar-Cost Averaging"),
        }
    }
}

impl FromStr for Strategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lump" | "lump_sum" | "lumpsum" => Ok(Strategy::LumpSum),
            "dca" | "dollar_cost_average" => Ok(Strategy::DollarCostAverage),
            other => Err(ConfigError::Invalid(format!("Unknown strategy: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub index: usize,
    pub date: NaiveDate,
    pub price: f64,
}

/// Immutable price history for one ticker.
///
/// Identified by `(ticker, start, end, granularity, seed)`. Points are dated
/// in ascending order, indexed contiguously from 0 and strictly positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    ticker: Ticker,
    start: NaiveDate,
    end: NaiveDate,
    granularity: Granularity,
    seed: Option<u64>,
    points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Build a series from raw prices, dating each one from `start` at the
    /// given granularity. The requested range ends at the last period's date.
    pub fn from_prices(
        ticker: Ticker,
        start: NaiveDate,
        granularity: Granularity,
        prices: &[f64],
    ) -> ConfigResult<Self> {
        if prices.is_empty() {
            return Err(ConfigError::InvalidSeries("no prices".to_string()));
        }

        let mut points = Vec::with_capacity(prices.len());
        for (index, &price) in prices.iter().enumerate() {
            let date = granularity.period_date(start, index).ok_or_else(|| {
                ConfigError::InvalidSeries(format!("period {} is out of calendar range", index))
            })?;
            points.push(PricePoint { index, date, price });
        }

        let end = points[points.len() - 1].date;
        Self::from_points(ticker, start, end, granularity, None, points)
    }

    pub(crate) fn from_points(
        ticker: Ticker,
        start: NaiveDate,
        end: NaiveDate,
        granularity: Granularity,
        seed: Option<u64>,
        points: Vec<PricePoint>,
    ) -> ConfigResult<Self> {
        if start > end {
            return Err(ConfigError::InvertedDateRange { start, end });
        }
        if points.is_empty() {
            return Err(ConfigError::InvalidSeries("no prices".to_string()));
        }
        for (expected, point) in points.iter().enumerate() {
            if point.index != expected {
                return Err(ConfigError::InvalidSeries(format!(
                    "index {} found at position {}",
                    point.index, expected
                )));
            }
            if !(point.price.is_finite() && point.price > 0.0) {
                return Err(ConfigError::InvalidSeries(format!(
                    "price {} at index {} is not positive",
                    point.price, expected
                )));
            }
        }
        if points.windows(2).any(|w| w[0].date > w[1].date) {
            return Err(ConfigError::InvalidSeries("dates are not ascending".to_string()));
        }

        Ok(Self {
            ticker,
            start,
            end,
            granularity,
            seed,
            points,
        })
    }

    pub fn ticker(&self) -> &Ticker {
        &self.ticker
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last_frame(&self) -> usize {
        self.points.len().saturating_sub(1)
    }

    pub fn price(&self, index: usize) -> f64 {
        self.points[index.min(self.last_frame())].price
    }

    pub fn prices(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.price).collect()
    }

    /// Calendar months in the requested range
    pub fn total_months(&self) -> usize {
        month_span(self.start, self.end)
    }
}

/// Portfolio position at one frame
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FrameMetrics {
    pub invested_to_date: f64,
    pub shares_held: f64,
    pub portfolio_value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SummaryMetrics {
    pub total_invested: f64,
    pub final_value: f64,
    pub total_return_pct: f64,
    pub cagr_pct: f64,
    pub years: f64,
    pub max_drawdown_pct: f64,
    pub shares_held: f64,
}

/// Combined position of every ticker in a run at one frame
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PortfolioTotals {
    /// Contributed per ticker; every ticker follows the same schedule
    pub contributed: f64,
    pub combined_value: f64,
    pub growth_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerSimulation {
    pub ticker: Ticker,
    pub series: PriceSeries,
    pub summary: SummaryMetrics,
}

/// One simulation request's results, shared by every ticker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationRun {
    pub strategy: Strategy,
    pub amount: f64,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub granularity: Granularity,
    pub tickers: Vec<TickerSimulation>,
}

impl SimulationRun {
    /// Frames available to every ticker
    pub fn frame_count(&self) -> usize {
        self.tickers
            .iter()
            .map(|t| t.series.len())
            .min()
            .unwrap_or(0)
    }

    pub fn last_frame(&self) -> usize {
        self.frame_count().saturating_sub(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackMode {
    Stopped,
    Playing,
    Paused,
    Capturing,
}

impl fmt::Display for PlaybackMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PlaybackMode::Stopped => write!(f, "STOPPED"),
            PlaybackMode::Playing => write!(f, "PLAYING"),
            PlaybackMode::Paused => write!(f, "PAUSED"),
            PlaybackMode::Capturing => write!(f, "CAPTURING"),
        }
    }
}

/// Read-only snapshot of the clock
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    pub frame_index: usize,
    pub last_frame: usize,
    pub mode: PlaybackMode,
    pub is_playing: bool,
    pub is_capturing: bool,
    pub speed_multiplier: f64,
}
