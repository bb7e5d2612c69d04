// src/simulation/service.rs
use crate::analysis::accountant::summarize;
use crate::config::SimulationConfig;
use crate::domain::errors::ConfigResult;
use crate::domain::models::{SimulationRun, TickerSimulation};
use crate::market_data::generator::{PriceSeriesGenerator, RandomSource, RngSource};
use std::sync::{Arc, Mutex};

/// Builds simulation runs and holds the most recent one
pub struct SimulationService {
    current: Mutex<Option<Arc<SimulationRun>>>,
}

impl SimulationService {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(None),
        }
    }

    /// Generate a run for `config`, seeded from `config.seed` when present
    pub fn run(&self, config: &SimulationConfig) -> ConfigResult<Arc<SimulationRun>> {
        let source = match config.seed {
            Some(seed) => RngSource::seeded(seed),
            None => RngSource::from_entropy(),
        };
        self.run_with(config, &mut PriceSeriesGenerator::new(source))
    }

    /// Generate a run with a caller-supplied generator
    pub fn run_with<S: RandomSource>(
        &self,
        config: &SimulationConfig,
        generator: &mut PriceSeriesGenerator<S>,
    ) -> ConfigResult<Arc<SimulationRun>> {
        let tickers = config.validate()?;
        let amount = config.amount_f64()?;

        let mut simulations = Vec::with_capacity(tickers.len());
        for ticker in tickers {
            let series = generator.generate(
                &ticker,
                config.start_date,
                config.end_date,
                config.granularity,
            )?;
            let summary = summarize(&series, config.strategy, amount);
            log::info!(
                "{}: invested {:.2}, final {:.2}, return {:.2}%, CAGR {:.2}%, max drawdown {:.2}%",
                ticker,
                summary.total_invested,
                summary.final_value,
                summary.total_return_pct,
                summary.cagr_pct,
                summary.max_drawdown_pct
            );
            simulations.push(TickerSimulation {
                ticker,
                series,
                summary,
            });
        }

        let run = Arc::new(SimulationRun {
            strategy: config.strategy,
            amount,
            start: config.start_date,
            end: config.end_date,
            granularity: config.granularity,
            tickers: simulations,
        });

        log::info!(
            "Simulation ready: {} ticker(s), {} frames, {} strategy",
            run.tickers.len(),
            run.frame_count(),
            run.strategy
        );

        let mut current = self
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *current = Some(run.clone());

        Ok(run)
    }

    /// The most recently generated run
    pub fn current(&self) -> Option<Arc<SimulationRun>> {
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Default for SimulationService {
    fn default() -> Self {
        Self::new()
    }
}
