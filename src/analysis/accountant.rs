// src/analysis/accountant.rs
//! Investment accounting over a price series.
//!
//! Every function here is a pure recomputation from its inputs, so any frame
//! can be evaluated in isolation for scrubbing, seeking or off-line capture.

use crate::domain::errors::{ComputationError, ComputationResult};
use crate::domain::models::{
    FrameMetrics, PortfolioTotals, PriceSeries, Strategy, SummaryMetrics, TickerSimulation,
};
use chrono::Datelike;

/// Flags the periods that receive a DCA contribution.
///
/// The first period dated in each calendar month contributes, capped at the
/// number of months in the requested range. The mapping is monotonic and
/// independent of granularity.
pub fn contribution_flags(series: &PriceSeries) -> Vec<bool> {
    let cap = series.total_months();
    let mut flags = Vec::with_capacity(series.len());
    let mut previous_month: Option<(i32, u32)> = None;
    let mut count = 0;

    for point in series.points() {
        let month = (point.date.year(), point.date.month());
        let is_new_month = previous_month != Some(month);
        let contributes = is_new_month && count < cap;
        if contributes {
            count += 1;
        }
        previous_month = Some(month);
        flags.push(contributes);
    }

    flags
}

/// Number of contributions made up to and including `frame_index`
pub fn contributions_through(series: &PriceSeries, frame_index: usize) -> usize {
    let frame = frame_index.min(series.last_frame());
    contribution_flags(series)
        .iter()
        .take(frame + 1)
        .filter(|&&flag| flag)
        .count()
}

/// Portfolio metrics at one frame; indices past the end clamp to the last frame
pub fn metrics_at_frame(
    series: &PriceSeries,
    strategy: Strategy,
    amount: f64,
    frame_index: usize,
) -> FrameMetrics {
    let frame = frame_index.min(series.last_frame());
    let price = series.price(frame);

    match strategy {
        Strategy::LumpSum => {
            let shares_held = amount / series.price(0);
            FrameMetrics {
                invested_to_date: amount,
                shares_held,
                portfolio_value: shares_held * price,
            }
        }
        Strategy::DollarCostAverage => {
            let flags = contribution_flags(series);
            let mut contributions = 0usize;
            let mut shares_held = 0.0;
            for (point, _) in series
                .points()
                .iter()
                .zip(flags.iter())
                .take(frame + 1)
                .filter(|(_, flag)| **flag)
            {
                contributions += 1;
                shares_held += amount / point.price;
            }
            FrameMetrics {
                invested_to_date: amount * contributions as f64,
                shares_held,
                portfolio_value: shares_held * price,
            }
        }
    }
}

/// Metrics for every frame in one pass.
///
/// Agrees with `metrics_at_frame` at each index; useful when a caller needs
/// successive frames and wants the running sums instead of a rescan.
pub fn metrics_series(series: &PriceSeries, strategy: Strategy, amount: f64) -> Vec<FrameMetrics> {
    match strategy {
        Strategy::LumpSum => (0..series.len())
            .map(|frame| metrics_at_frame(series, strategy, amount, frame))
            .collect(),
        Strategy::DollarCostAverage => {
            let flags = contribution_flags(series);
            let mut contributions = 0usize;
            let mut shares_held = 0.0;
            series
                .points()
                .iter()
                .zip(flags)
                .map(|(point, contributes)| {
                    if contributes {
                        contributions += 1;
                        shares_held += amount / point.price;
                    }
                    FrameMetrics {
                        invested_to_date: amount * contributions as f64,
                        shares_held,
                        portfolio_value: shares_held * point.price,
                    }
                })
                .collect()
        }
    }
}

/// `(value - invested) / invested * 100`
pub fn total_return_pct(invested: f64, value: f64) -> ComputationResult<f64> {
    if invested <= 0.0 {
        return Err(ComputationError::DivisionUndefined("nothing invested"));
    }
    Ok((value - invested) / invested * 100.0)
}

/// Compound annual growth rate as a percentage
pub fn cagr_pct(invested: f64, value: f64, years: f64) -> ComputationResult<f64> {
    if invested <= 0.0 {
        return Err(ComputationError::DivisionUndefined("nothing invested"));
    }
    if years <= 0.0 {
        return Err(ComputationError::DivisionUndefined("zero-length period"));
    }
    Ok(((value / invested).powf(1.0 / years) - 1.0) * 100.0)
}

/// Largest peak-to-trough decline of the portfolio value, in percent
pub fn max_drawdown_pct(frames: &[FrameMetrics]) -> f64 {
    let mut peak = 0.0f64;
    let mut max_drawdown = 0.0f64;

    for frame in frames {
        peak = peak.max(frame.portfolio_value);
        if peak > 0.0 {
            let drawdown = (peak - frame.portfolio_value) / peak * 100.0;
            max_drawdown = max_drawdown.max(drawdown);
        }
    }

    max_drawdown.clamp(0.0, 100.0)
}

/// Aggregate results for a completed run
pub fn summarize(series: &PriceSeries, strategy: Strategy, amount: f64) -> SummaryMetrics {
    let frames = metrics_series(series, strategy, amount);
    let last = metrics_at_frame(series, strategy, amount, series.last_frame());
    let years = series.len() as f64 / series.granularity().periods_per_year();

    let total_return = total_return_pct(last.invested_to_date, last.portfolio_value)
        .unwrap_or_else(|e| {
            log::debug!("{}: reporting 0% return ({})", series.ticker(), e);
            0.0
        });
    let cagr = cagr_pct(last.invested_to_date, last.portfolio_value, years).unwrap_or_else(|e| {
        log::debug!("{}: reporting 0% CAGR ({})", series.ticker(), e);
        0.0
    });

    SummaryMetrics {
        total_invested: last.invested_to_date,
        final_value: last.portfolio_value,
        total_return_pct: total_return,
        cagr_pct: cagr,
        years,
        max_drawdown_pct: max_drawdown_pct(&frames),
        shares_held: last.shares_held,
    }
}

/// Combined position of several tickers at one frame
pub fn totals_at_frame(
    tickers: &[TickerSimulation],
    strategy: Strategy,
    amount: f64,
    frame_index: usize,
) -> PortfolioTotals {
    let mut contributed = 0.0f64;
    let mut combined_value = 0.0;

    for sim in tickers {
        let metrics = metrics_at_frame(&sim.series, strategy, amount, frame_index);
        contributed = contributed.max(metrics.invested_to_date);
        combined_value += metrics.portfolio_value;
    }

    let combined_invested = contributed * tickers.len() as f64;
    let growth_pct = total_return_pct(combined_invested, combined_value).unwrap_or(0.0);

    PortfolioTotals {
        contributed,
        combined_value,
        growth_pct,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Granularity, Ticker};
    use chrono::NaiveDate;

    fn monthly(prices: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        PriceSeries::from_prices(Ticker::new("TEST").unwrap(), start, Granularity::Monthly, prices)
            .unwrap()
    }

    fn weekly(start: NaiveDate, weeks: usize) -> PriceSeries {
        let prices = vec![50.0; weeks];
        PriceSeries::from_prices(Ticker::new("TEST").unwrap(), start, Granularity::Weekly, &prices)
            .unwrap()
    }

    #[test]
    fn dca_with_flat_prices_breaks_even() {
        let series = monthly(&[100.0; 12]);
        let metrics = metrics_at_frame(&series, Strategy::DollarCostAverage, 100.0, 11);
        assert_eq!(metrics.invested_to_date, 1200.0);
        assert!((metrics.shares_held - 12.0).abs() < 1e-9);
        assert!((metrics.portfolio_value - 1200.0).abs() < 1e-9);

        let summary = summarize(&series, Strategy::DollarCostAverage, 100.0);
        assert!(summary.total_return_pct.abs() < 1e-9);
        assert!(summary.cagr_pct.abs() < 1e-9);
        assert_eq!(summary.max_drawdown_pct, 0.0);
        assert!((summary.years - 1.0).abs() < 1e-12);
    }

    #[test]
    fn lump_sum_on_linear_rise() {
        let prices: Vec<f64> = (1..=12).map(|i| i as f64 * 100.0).collect();
        let series = monthly(&prices);
        let summary = summarize(&series, Strategy::LumpSum, 1200.0);

        assert!((summary.shares_held - 12.0).abs() < 1e-9);
        assert!((summary.final_value - 14400.0).abs() < 1e-6);
        assert!((summary.total_return_pct - 1100.0).abs() < 1e-6);
        assert!((summary.cagr_pct - 1100.0).abs() < 1e-6);
        assert_eq!(summary.max_drawdown_pct, 0.0);
    }

    #[test]
    fn lump_sum_shares_do_not_change() {
        let series = monthly(&[80.0, 120.0, 60.0, 90.0]);
        let first = metrics_at_frame(&series, Strategy::LumpSum, 400.0, 0);
        for frame in 0..series.len() {
            let m = metrics_at_frame(&series, Strategy::LumpSum, 400.0, frame);
            assert_eq!(m.shares_held, first.shares_held);
            assert_eq!(m.invested_to_date, 400.0);
            assert!((m.portfolio_value - 5.0 * series.price(frame)).abs() < 1e-9);
        }
    }

    #[test]
    fn drawdown_tracks_peak_to_trough() {
        let series = monthly(&[100.0, 200.0, 50.0, 150.0]);
        let summary = summarize(&series, Strategy::LumpSum, 100.0);
        assert!((summary.max_drawdown_pct - 75.0).abs() < 1e-9);
    }

    #[test]
    fn weekly_contributes_once_per_month() {
        // 2021-01-04 is a Monday; 13 weeks reach the end of March
        let start = NaiveDate::from_ymd_opt(2021, 1, 4).unwrap();
        let series = weekly(start, 13);
        let flags = contribution_flags(&series);

        let months: Vec<u32> = series
            .points()
            .iter()
            .zip(flags.iter())
            .filter(|(_, f)| **f)
            .map(|(p, _)| p.date.month())
            .collect();
        assert_eq!(months, vec![1, 2, 3]);
        assert!(flags[0]);
        assert_eq!(contributions_through(&series, 12), 3);
        assert_eq!(contributions_through(&series, 3), 1);
    }

    #[test]
    fn dca_invested_steps_only_on_contribution_frames() {
        let start = NaiveDate::from_ymd_opt(2019, 11, 20).unwrap();
        let series = weekly(start, 30);
        let flags = contribution_flags(&series);
        let frames = metrics_series(&series, Strategy::DollarCostAverage, 25.0);

        for i in 1..frames.len() {
            let delta = frames[i].invested_to_date - frames[i - 1].invested_to_date;
            if flags[i] {
                assert_eq!(delta, 25.0);
            } else {
                assert_eq!(delta, 0.0);
            }
        }
        let last = frames[frames.len() - 1];
        assert_eq!(last.invested_to_date, 25.0 * series.total_months() as f64);
    }

    #[test]
    fn series_pass_matches_single_frame() {
        let series = monthly(&[10.0, 12.0, 9.0, 15.0, 14.0, 18.0]);
        for strategy in [Strategy::LumpSum, Strategy::DollarCostAverage] {
            let frames = metrics_series(&series, strategy, 50.0);
            for (i, frame) in frames.iter().enumerate() {
                assert_eq!(*frame, metrics_at_frame(&series, strategy, 50.0, i));
            }
        }
    }

    #[test]
    fn frame_past_end_clamps() {
        let series = monthly(&[10.0, 20.0]);
        assert_eq!(
            metrics_at_frame(&series, Strategy::DollarCostAverage, 10.0, 99),
            metrics_at_frame(&series, Strategy::DollarCostAverage, 10.0, 1)
        );
    }

    #[test]
    fn zero_investment_reports_zero_returns() {
        assert_eq!(
            total_return_pct(0.0, 10.0),
            Err(ComputationError::DivisionUndefined("nothing invested"))
        );
        assert!(cagr_pct(100.0, 200.0, 0.0).is_err());

        let series = monthly(&[10.0, 20.0]);
        let summary = summarize(&series, Strategy::DollarCostAverage, 0.0);
        assert_eq!(summary.total_return_pct, 0.0);
        assert_eq!(summary.cagr_pct, 0.0);
    }

    #[test]
    fn totals_combine_tickers() {
        let a = monthly(&[100.0, 200.0]);
        let b = monthly(&[100.0, 100.0]);
        let sims: Vec<TickerSimulation> = [a, b]
            .into_iter()
            .map(|series| TickerSimulation {
                ticker: series.ticker().clone(),
                summary: summarize(&series, Strategy::LumpSum, 100.0),
                series,
            })
            .collect();

        let totals = totals_at_frame(&sims, Strategy::LumpSum, 100.0, 1);
        assert_eq!(totals.contributed, 100.0);
        assert!((totals.combined_value - 300.0).abs() < 1e-9);
        assert!((totals.growth_pct - 50.0).abs() < 1e-9);
    }
}
