// src/market_data/generator.rs
use crate::domain::errors::{ConfigError, ConfigResult};
use crate::domain::models::{Granularity, PricePoint, PriceSeries, Ticker};
use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Monthly drift per known ticker
const GROWTH_PROFILES: &[(&str, f64)] = &[
    ("NVDA", 0.035),
    ("AAPL", 0.018),
    ("MSFT", 0.020),
    ("GOOGL", 0.015),
    ("TSLA", 0.025),
    ("SPY", 0.012),
    ("AMD", 0.022),
    ("QQQ", 0.015),
];

const DEFAULT_MONTHLY_DRIFT: f64 = 0.015;

/// Uniform random numbers consumed by the generator
pub trait RandomSource {
    /// Next sample in `[0, 1)`
    fn next_unit(&mut self) -> f64;

    /// Seed this source was built from, if reproducible
    fn seed(&self) -> Option<u64> {
        None
    }
}

/// Adapts any `rand` generator into a `RandomSource`
pub struct RngSource<R: Rng> {
    rng: R,
    seed: Option<u64>,
}

impl RngSource<StdRng> {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            seed: Some(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            seed: None,
        }
    }
}

impl<R: Rng> RngSource<R> {
    pub fn new(rng: R) -> Self {
        Self { rng, seed: None }
    }
}

impl<R: Rng> RandomSource for RngSource<R> {
    fn next_unit(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    fn seed(&self) -> Option<u64> {
        self.seed
    }
}

/// Replays a fixed list of samples, cycling when exhausted
#[derive(Debug, Clone)]
pub struct SequenceSource {
    values: Vec<f64>,
    position: usize,
}

impl SequenceSource {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values, position: 0 }
    }

    /// Every draw returns `value`
    pub fn constant(value: f64) -> Self {
        Self::new(vec![value])
    }
}

impl RandomSource for SequenceSource {
    fn next_unit(&mut self) -> f64 {
        if self.values.is_empty() {
            return 0.5;
        }
        let value = self.values[self.position % self.values.len()];
        self.position += 1;
        value.clamp(0.0, 1.0 - f64::EPSILON)
    }
}

/// Random-walk parameters, expressed per calendar month
#[derive(Debug, Clone)]
pub struct GeneratorParams {
    pub initial_price_min: f64,
    pub initial_price_max: f64,
    pub volatility: f64,
    pub price_floor: f64,
    pub shock_probability: f64,
    pub shock_factor: f64,
}

impl Default for GeneratorParams {
    fn default() -> Self {
        Self {
            initial_price_min: 100.0,
            initial_price_max: 200.0,
            volatility: 0.08,
            price_floor: 10.0,
            shock_probability: 0.05,
            shock_factor: 0.92,
        }
    }
}

/// Per-period coefficients after scaling the monthly parameters
#[derive(Debug, Clone, Copy)]
struct StepModel {
    drift: f64,
    volatility: f64,
    floor: f64,
    shock_probability: f64,
    shock_factor: f64,
}

/// Monthly drift for a ticker, falling back to the default profile
pub fn monthly_drift(ticker: &Ticker) -> f64 {
    GROWTH_PROFILES
        .iter()
        .find(|(symbol, _)| *symbol == ticker.as_str())
        .map(|(_, drift)| *drift)
        .unwrap_or(DEFAULT_MONTHLY_DRIFT)
}

/// Synthesises plausible price histories from an injected random source
pub struct PriceSeriesGenerator<S: RandomSource> {
    params: GeneratorParams,
    source: S,
}

impl<S: RandomSource> PriceSeriesGenerator<S> {
    pub fn new(source: S) -> Self {
        Self::with_params(source, GeneratorParams::default())
    }

    pub fn with_params(source: S, params: GeneratorParams) -> Self {
        Self { params, source }
    }

    pub fn params(&self) -> &GeneratorParams {
        &self.params
    }

    /// Generate one series covering `start..=end`
    pub fn generate(
        &mut self,
        ticker: &Ticker,
        start: NaiveDate,
        end: NaiveDate,
        granularity: Granularity,
    ) -> ConfigResult<PriceSeries> {
        if start > end {
            return Err(ConfigError::InvertedDateRange { start, end });
        }

        let periods = granularity.period_count(start, end);
        let model = self.step_model(ticker, granularity);

        let spread = self.params.initial_price_max - self.params.initial_price_min;
        let mut price = (self.params.initial_price_min + self.source.next_unit() * spread)
            .max(model.floor);

        let mut points = Vec::with_capacity(periods);
        for index in 0..periods {
            if index > 0 {
                price = self.step(price, &model);
            }
            let date = granularity.period_date_within(start, end, index).ok_or_else(|| {
                ConfigError::InvalidSeries(format!("period {} is out of calendar range", index))
            })?;
            points.push(PricePoint { index, date, price });
        }

        log::debug!(
            "Generated {} {} prices for {} ({} -> {})",
            points.len(),
            granularity,
            ticker,
            start,
            end
        );

        PriceSeries::from_points(
            ticker.clone(),
            start,
            end,
            granularity,
            self.source.seed(),
            points,
        )
    }

    fn step_model(&self, ticker: &Ticker, granularity: Granularity) -> StepModel {
        let scale = 12.0 / granularity.periods_per_year();
        StepModel {
            drift: monthly_drift(ticker) * scale,
            volatility: self.params.volatility * scale.sqrt(),
            floor: self.params.price_floor,
            shock_probability: self.params.shock_probability * scale,
            shock_factor: self.params.shock_factor,
        }
    }

    fn step(&mut self, price: f64, model: &StepModel) -> f64 {
        let trend = price * model.drift;
        let walk = price * model.volatility * (self.source.next_unit() - 0.5);
        let mut next = (price + trend + walk).max(model.floor);

        if self.source.next_unit() < model.shock_probability {
            next *= model.shock_factor;
        }
        next
    }
}
