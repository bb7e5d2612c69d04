use chrono::NaiveDate;
use invest_time_machine::analysis::accountant::{metrics_at_frame, metrics_series, summarize};
use invest_time_machine::config::Config;
use invest_time_machine::domain::models::{Granularity, PriceSeries, Strategy, Ticker};
use invest_time_machine::market_data::generator::{PriceSeriesGenerator, RngSource};
use invest_time_machine::simulation::SimulationService;

fn monthly(prices: &[f64]) -> PriceSeries {
    let start = NaiveDate::from_ymd_opt(2019, 1, 1).unwrap();
    PriceSeries::from_prices(Ticker::new("TEST").unwrap(), start, Granularity::Monthly, prices)
        .unwrap()
}

fn generated(symbol: &str, granularity: Granularity, seed: u64) -> PriceSeries {
    let mut generator = PriceSeriesGenerator::new(RngSource::seeded(seed));
    generator
        .generate(
            &Ticker::new(symbol).unwrap(),
            NaiveDate::from_ymd_opt(2010, 3, 15).unwrap(),
            NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
            granularity,
        )
        .unwrap()
}

#[test]
fn flat_dca_breaks_even_after_a_year() {
    let series = monthly(&[100.0; 12]);
    let metrics = metrics_at_frame(&series, Strategy::DollarCostAverage, 100.0, 11);
    let summary = summarize(&series, Strategy::DollarCostAverage, 100.0);

    assert_eq!(metrics.invested_to_date, 1200.0);
    assert!((metrics.shares_held - 12.0).abs() < 1e-9);
    assert!((metrics.portfolio_value - 1200.0).abs() < 1e-9);
    assert!(summary.total_return_pct.abs() < 1e-9);
}

#[test]
fn lump_sum_on_rising_prices_returns_1100_percent() {
    let prices: Vec<f64> = (1..=12).map(|i| 100.0 * i as f64).collect();
    let series = monthly(&prices);
    let summary = summarize(&series, Strategy::LumpSum, 1200.0);

    assert!((summary.shares_held - 12.0).abs() < 1e-9);
    assert!((summary.final_value - 14400.0).abs() < 1e-6);
    assert!((summary.total_return_pct - 1100.0).abs() < 1e-6);
}

#[test]
fn generated_prices_stay_positive_and_contiguous() {
    for (i, symbol) in ["NVDA", "TSLA", "SPY", "ZZZZ"].iter().enumerate() {
        for granularity in [Granularity::Monthly, Granularity::Weekly] {
            let series = generated(symbol, granularity, 100 + i as u64);
            assert!(!series.is_empty());
            for (index, point) in series.points().iter().enumerate() {
                assert_eq!(point.index, index);
                assert!(point.price > 0.0);
            }
        }
    }
}

#[test]
fn lump_sum_shares_never_change() {
    let series = generated("AAPL", Granularity::Weekly, 3);
    let frames = metrics_series(&series, Strategy::LumpSum, 5000.0);
    let shares = frames[0].shares_held;

    for (index, frame) in frames.iter().enumerate() {
        assert_eq!(frame.shares_held, shares);
        assert!((frame.portfolio_value - shares * series.price(index)).abs() < 1e-6);
    }
}

#[test]
fn dca_contributions_only_grow_at_month_boundaries() {
    for granularity in [Granularity::Monthly, Granularity::Weekly] {
        let series = generated("MSFT", granularity, 11);
        let frames = metrics_series(&series, Strategy::DollarCostAverage, 250.0);

        for pair in frames.windows(2) {
            assert!(pair[1].invested_to_date >= pair[0].invested_to_date);
        }
        for (index, pair) in frames.windows(2).enumerate() {
            if pair[1].invested_to_date > pair[0].invested_to_date {
                let previous = series.points()[index].date;
                let current = series.points()[index + 1].date;
                assert_ne!(
                    previous.format("%Y-%m").to_string(),
                    current.format("%Y-%m").to_string()
                );
            }
        }

        let last = frames[frames.len() - 1];
        assert_eq!(last.invested_to_date, 250.0 * series.total_months() as f64);
    }
}

#[test]
fn drawdown_is_bounded() {
    for seed in 0..20 {
        let series = generated("AMD", Granularity::Monthly, seed);
        let summary = summarize(&series, Strategy::DollarCostAverage, 100.0);
        assert!(summary.max_drawdown_pct >= 0.0);
        assert!(summary.max_drawdown_pct <= 100.0);
    }

    let rising: Vec<f64> = (0..24).map(|i| 50.0 + i as f64).collect();
    let summary = summarize(&monthly(&rising), Strategy::LumpSum, 1000.0);
    assert_eq!(summary.max_drawdown_pct, 0.0);
}

#[test]
fn frame_metrics_are_repeatable() {
    let series = generated("QQQ", Granularity::Weekly, 42);
    for frame in [0, 7, 100, series.last_frame(), series.last_frame() + 10] {
        let first = metrics_at_frame(&series, Strategy::DollarCostAverage, 75.0, frame);
        let second = metrics_at_frame(&series, Strategy::DollarCostAverage, 75.0, frame);
        assert_eq!(first, second);
    }
}

#[test]
fn seeded_service_runs_are_reproducible() {
    let mut config = Config::default().simulation;
    config.tickers = vec!["nvda".to_string(), "googl".to_string()];
    config.start_date = NaiveDate::from_ymd_opt(2018, 1, 1).unwrap();
    config.end_date = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
    config.seed = Some(2024);

    let service = SimulationService::new();
    let first = service.run(&config).unwrap();
    let second = service.run(&config).unwrap();

    assert_eq!(first.frame_count(), 72);
    for (a, b) in first.tickers.iter().zip(second.tickers.iter()) {
        assert_eq!(a.series.prices(), b.series.prices());
        assert_eq!(a.summary, b.summary);
    }
}

#[test]
fn weekly_dca_contributes_in_a_month_the_grid_barely_reaches() {
    for (start, end) in [
        ((2021, 1, 1), (2021, 3, 3)),
        ((2022, 5, 30), (2022, 7, 1)),
        ((2019, 12, 31), (2020, 2, 2)),
    ] {
        let start = NaiveDate::from_ymd_opt(start.0, start.1, start.2).unwrap();
        let end = NaiveDate::from_ymd_opt(end.0, end.1, end.2).unwrap();
        let series = PriceSeriesGenerator::new(RngSource::seeded(5))
            .generate(&Ticker::new("SPY").unwrap(), start, end, Granularity::Weekly)
            .unwrap();

        let last = metrics_at_frame(&series, Strategy::DollarCostAverage, 100.0, series.last_frame());
        assert_eq!(series.points()[series.last_frame()].date, end);
        assert_eq!(last.invested_to_date, 100.0 * series.total_months() as f64);
    }
}
