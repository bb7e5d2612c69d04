// src/domain/mod.rs
pub mod errors;
pub mod models;

// Re-export common types for convenience
pub use errors::{
    AppError, AppResult, CaptureError, CaptureResult, ComputationError, ConfigError, ConfigResult,
    PlaybackError, PlaybackResult,
};
pub use models::{
    FrameMetrics, Granularity, PlaybackMode, PlaybackState, PortfolioTotals, PricePoint,
    PriceSeries, SimulationRun, Strategy, SummaryMetrics, Ticker, TickerSimulation,
};
