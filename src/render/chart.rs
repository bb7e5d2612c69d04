// src/render/chart.rs
//! Chart composition for one frame of a simulation run.

use crate::analysis::accountant::{metrics_series, totals_at_frame};
use crate::domain::models::{FrameMetrics, SimulationRun};
use crate::render::image::{DrawCommand, Point, RenderedImage, TextAlign, Watermark};
use chrono::Datelike;
use serde::{Deserialize, Serialize};

const GRID_BANDS: usize = 5;
const MAX_YEAR_LABELS: i32 = 6;
const HEADROOM: f64 = 1.15;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Padding {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

/// Surface size and colours, supplied at the rendering boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderStyle {
    pub width: u32,
    pub height: u32,
    pub padding: Padding,
    pub background_top: String,
    pub background_bottom: String,
    pub grid: String,
    pub axis_text: String,
    pub contribution_line: String,
    pub series_colors: Vec<String>,
    pub gain: String,
    pub loss: String,
    pub panel_fill: String,
    pub box_fill: String,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 600,
            padding: Padding {
                top: 100.0,
                right: 80.0,
                bottom: 80.0,
                left: 90.0,
            },
            background_top: "#F0FDF4".to_string(),
            background_bottom: "#FFFFFF".to_string(),
            grid: "#E0E7E9".to_string(),
            axis_text: "#64748B".to_string(),
            contribution_line: "#94A3B8".to_string(),
            series_colors: vec![
                "#00C853".to_string(),
                "#7C3AED".to_string(),
                "#F59E0B".to_string(),
            ],
            gain: "#00C853".to_string(),
            loss: "#EF4444".to_string(),
            panel_fill: "rgba(240, 253, 244, 0.9)".to_string(),
            box_fill: "rgba(255, 255, 255, 0.95)".to_string(),
        }
    }
}

impl RenderStyle {
    fn series_color(&self, idx: usize) -> &str {
        if self.series_colors.is_empty() {
            return &self.gain;
        }
        &self.series_colors[idx % self.series_colors.len()]
    }
}

/// `$12.3K`
pub fn format_thousands(value: f64, decimals: usize) -> String {
    format!("${:.*}K", decimals, value / 1000.0)
}

/// Maps frame/value pairs onto the plotting area
struct Plot {
    left: f64,
    bottom: f64,
    width: f64,
    height: f64,
    step: f64,
    max_value: f64,
}

impl Plot {
    fn new(style: &RenderStyle, frame_count: usize, max_value: f64) -> Self {
        let p = style.padding;
        let width = style.width as f64 - p.left - p.right;
        let height = style.height as f64 - p.top - p.bottom;
        let step = if frame_count > 1 {
            width / (frame_count - 1) as f64
        } else {
            0.0
        };
        Self {
            left: p.left,
            bottom: style.height as f64 - p.bottom,
            width,
            height,
            step,
            max_value: if max_value > 0.0 { max_value } else { 1.0 },
        }
    }

    fn point(&self, frame: usize, value: f64) -> Point {
        Point::new(
            self.left + self.step * frame as f64,
            self.bottom - value / self.max_value * self.height,
        )
    }
}

/// Compose the frame. Frames past the end clamp to the last one.
pub fn compose(
    run: &SimulationRun,
    frame_index: usize,
    style: &RenderStyle,
    watermark: Option<&Watermark>,
) -> RenderedImage {
    let frame = frame_index.min(run.last_frame());
    let width = style.width as f64;
    let height = style.height as f64;
    let pad = style.padding;

    let mut commands = vec![DrawCommand::VerticalGradient {
        top: style.background_top.clone(),
        bottom: style.background_bottom.clone(),
    }];

    let histories: Vec<Vec<FrameMetrics>> = run
        .tickers
        .iter()
        .map(|sim| {
            let mut frames = metrics_series(&sim.series, run.strategy, run.amount);
            frames.truncate(frame + 1);
            frames
        })
        .collect();

    let mut max_value = 0.0f64;
    if frame > 0 {
        for metrics in histories.iter().flatten() {
            max_value = max_value.max(metrics.portfolio_value).max(metrics.invested_to_date);
        }
    }
    let plot = Plot::new(style, run.frame_count(), max_value * HEADROOM);

    // grid and value axis
    for i in 0..=GRID_BANDS {
        let y = pad.top + plot.height / GRID_BANDS as f64 * i as f64;
        commands.push(DrawCommand::Line {
            from: Point::new(pad.left, y),
            to: Point::new(width - pad.right, y),
            color: style.grid.clone(),
            width: 1.0,
        });
        let value = plot.max_value / GRID_BANDS as f64 * (GRID_BANDS - i) as f64;
        let label = if frame > 0 {
            format_thousands(value, 1)
        } else {
            format_thousands(0.0, 1)
        };
        commands.push(DrawCommand::Text {
            at: Point::new(pad.left - 15.0, y + 5.0),
            text: label,
            color: style.axis_text.clone(),
            size: 14.0,
            bold: false,
            align: TextAlign::Right,
        });
    }

    // year axis
    let start_year = run.start.year();
    let year_range = run.end.year() - start_year + 1;
    let labels = year_range.clamp(1, MAX_YEAR_LABELS);
    for i in 0..labels {
        let (year, x) = if labels > 1 {
            let fraction = i as f64 / (labels - 1) as f64;
            (
                start_year + ((year_range - 1) as f64 * fraction).floor() as i32,
                pad.left + plot.width * fraction,
            )
        } else {
            (start_year, pad.left)
        };
        commands.push(DrawCommand::Text {
            at: Point::new(x, height - pad.bottom + 30.0),
            text: year.to_string(),
            color: style.axis_text.clone(),
            size: 14.0,
            bold: false,
            align: TextAlign::Center,
        });
    }

    // contributed capital, dashed
    if frame > 0 {
        if let Some(first) = histories.first() {
            commands.push(DrawCommand::Polyline {
                points: first
                    .iter()
                    .enumerate()
                    .map(|(i, m)| plot.point(i, m.invested_to_date))
                    .collect(),
                color: style.contribution_line.clone(),
                width: 2.0,
                dashed: true,
                glow: 0.0,
            });
        }
    }

    if let Some(mark) = watermark {
        let mark_width = 200.0;
        let mark_height = mark.scaled_height(mark_width);
        commands.push(DrawCommand::Image {
            source: mark.source.to_string(),
            origin: Point::new((width - mark_width) / 2.0, (height - mark_height) / 2.0),
            width: mark_width,
            height: mark_height,
            opacity: 0.08,
        });
    }

    for (idx, history) in histories.iter().enumerate() {
        commands.push(DrawCommand::Polyline {
            points: history
                .iter()
                .enumerate()
                .map(|(i, m)| plot.point(i, m.portfolio_value))
                .collect(),
            color: style.series_color(idx).to_string(),
            width: 3.0,
            dashed: false,
            glow: 10.0,
        });
    }

    if frame > 0 {
        // per-ticker value boxes, top right
        for (idx, (sim, history)) in run.tickers.iter().zip(histories.iter()).enumerate() {
            let value = history.last().map(|m| m.portfolio_value).unwrap_or(0.0);
            let box_x = width - pad.right - 160.0;
            let box_y = pad.top + idx as f64 * 75.0;
            commands.push(DrawCommand::Rect {
                origin: Point::new(box_x, box_y),
                width: 150.0,
                height: 65.0,
                fill: style.box_fill.clone(),
                shadow: 15.0,
            });
            commands.push(DrawCommand::Text {
                at: Point::new(box_x + 15.0, box_y + 25.0),
                text: sim.ticker.to_string(),
                color: style.axis_text.clone(),
                size: 14.0,
                bold: true,
                align: TextAlign::Left,
            });
            commands.push(DrawCommand::Text {
                at: Point::new(box_x + 15.0, box_y + 48.0),
                text: format_thousands(value, 2),
                color: style.series_color(idx).to_string(),
                size: 20.0,
                bold: true,
                align: TextAlign::Left,
            });
        }

        // totals panel, top left
        let totals = totals_at_frame(&run.tickers, run.strategy, run.amount, frame);
        commands.push(DrawCommand::Rect {
            origin: Point::new(pad.left, pad.top - 80.0),
            width: 180.0,
            height: 75.0,
            fill: style.panel_fill.clone(),
            shadow: 10.0,
        });
        commands.push(DrawCommand::Text {
            at: Point::new(pad.left + 15.0, pad.top - 55.0),
            text: "Total Contributed".to_string(),
            color: style.axis_text.clone(),
            size: 13.0,
            bold: false,
            align: TextAlign::Left,
        });
        commands.push(DrawCommand::Text {
            at: Point::new(pad.left + 15.0, pad.top - 25.0),
            text: format_thousands(totals.contributed, 1),
            color: style.gain.clone(),
            size: 28.0,
            bold: true,
            align: TextAlign::Left,
        });
        let growth_color = if totals.growth_pct >= 0.0 { &style.gain } else { &style.loss };
        let sign = if totals.growth_pct >= 0.0 { "+" } else { "" };
        commands.push(DrawCommand::Text {
            at: Point::new(pad.left + 15.0, pad.top - 5.0),
            text: format!("{}{:.1}% Growth", sign, totals.growth_pct),
            color: growth_color.clone(),
            size: 16.0,
            bold: true,
            align: TextAlign::Left,
        });

        // contributed marker at the head of the dashed line
        let marker = plot.point(frame, totals.contributed);
        for (text, dy) in [
            ("Contributed".to_string(), -8.0),
            (format_thousands(totals.contributed, 2), 7.0),
        ] {
            commands.push(DrawCommand::Text {
                at: Point::new(marker.x - 10.0, marker.y + dy),
                text,
                color: style.axis_text.clone(),
                size: 12.0,
                bold: false,
                align: TextAlign::Right,
            });
        }
    }

    if let Some(mark) = watermark {
        let mark_width = 60.0;
        commands.push(DrawCommand::Image {
            source: mark.source.to_string(),
            origin: Point::new(pad.left + 10.0, height - pad.bottom + 40.0),
            width: mark_width,
            height: mark.scaled_height(mark_width),
            opacity: 0.6,
        });
    }

    RenderedImage {
        width: style.width,
        height: style.height,
        frame_index: frame,
        commands,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::accountant::summarize;
    use crate::domain::models::{Granularity, PriceSeries, Strategy, Ticker, TickerSimulation};
    use chrono::NaiveDate;

    fn run(prices: &[f64], strategy: Strategy, amount: f64) -> SimulationRun {
        let start = NaiveDate::from_ymd_opt(2019, 1, 1).unwrap();
        let series = PriceSeries::from_prices(
            Ticker::new("AAPL").unwrap(),
            start,
            Granularity::Monthly,
            prices,
        )
        .unwrap();
        SimulationRun {
            strategy,
            amount,
            start,
            end: series.end(),
            granularity: Granularity::Monthly,
            tickers: vec![TickerSimulation {
                ticker: series.ticker().clone(),
                summary: summarize(&series, strategy, amount),
                series,
            }],
        }
    }

    #[test]
    fn first_frame_has_no_overlays() {
        let run = run(&[100.0; 12], Strategy::DollarCostAverage, 100.0);
        let image = compose(&run, 0, &RenderStyle::default(), None);

        assert_eq!(image.frame_index, 0);
        assert!(!image.texts().any(|t| t == "Total Contributed"));
        assert_eq!(image.polylines().count(), 1);
        assert_eq!(image.image_count(), 0);
    }

    #[test]
    fn later_frame_shows_values() {
        let run = run(&[100.0; 12], Strategy::DollarCostAverage, 100.0);
        let image = compose(&run, 11, &RenderStyle::default(), None);

        let texts: Vec<&str> = image.texts().collect();
        assert!(texts.contains(&"Total Contributed"));
        assert!(texts.contains(&"$1.2K"));
        assert!(texts.contains(&"$1.20K"));
        assert!(texts.contains(&"+0.0% Growth"));
        assert!(texts.contains(&"AAPL"));

        // contribution line plus one series, each with a point per frame
        let lines: Vec<&[Point]> = image.polylines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.len() == 12));
    }

    #[test]
    fn series_stays_inside_plot() {
        let run = run(&[100.0, 300.0, 50.0, 80.0], Strategy::LumpSum, 1000.0);
        let style = RenderStyle::default();
        let image = compose(&run, 3, &style, None);
        for line in image.polylines() {
            for p in line {
                assert!(p.y >= style.padding.top - 1e-9);
                assert!(p.y <= style.height as f64 - style.padding.bottom + 1e-9);
            }
        }
    }

    #[test]
    fn watermark_adds_two_images() {
        let run = run(&[100.0, 110.0], Strategy::LumpSum, 500.0);
        let mark = Watermark::new(400, 100, "logo.png");
        let image = compose(&run, 1, &RenderStyle::default(), Some(&mark));
        assert_eq!(image.image_count(), 2);
        assert!(image.image_sources().all(|source| source == "logo.png"));
    }

    #[test]
    fn rendering_is_deterministic() {
        let run = run(&[100.0, 120.0, 90.0], Strategy::DollarCostAverage, 50.0);
        let style = RenderStyle::default();
        assert_eq!(compose(&run, 2, &style, None), compose(&run, 2, &style, None));
    }

    #[test]
    fn formats_thousands() {
        assert_eq!(format_thousands(14400.0, 1), "$14.4K");
        assert_eq!(format_thousands(950.0, 2), "$0.95K");
    }
}
