// src/domain/errors.rs
use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Computation error: {0}")]
    Computation(#[from] ComputationError),

    #[error("Playback error: {0}")]
    Playback(#[from] PlaybackError),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Rejected before any simulation runs
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("At least one ticker is required")]
    NoTickers,

    #[error("At most 3 tickers are supported, got {0}")]
    TooManyTickers(usize),

    #[error("Ticker symbol must not be empty")]
    EmptyTicker,

    #[error("Ticker listed more than once: {0}")]
    DuplicateTicker(String),

    #[error("Contribution amount must be positive")]
    NonPositiveAmount,

    #[error("Start date {start} is after end date {end}")]
    InvertedDateRange { start: NaiveDate, end: NaiveDate },

    #[error("Speed multiplier must be a positive number, got {0}")]
    InvalidSpeed(f64),

    #[error("Invalid price series: {0}")]
    InvalidSeries(String),

    #[error("{0}")]
    Invalid(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ComputationError {
    #[error("Division undefined: {0}")]
    DivisionUndefined(&'static str),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlaybackError {
    #[error("A capture is in progress")]
    CaptureInProgress,

    #[error("Capture already in progress")]
    AlreadyCapturing,

    #[error("No capture is in progress")]
    NotCapturing,

    #[error("Capture ticket {0} is no longer valid")]
    StaleCapture(u64),

    #[error("Speed multiplier must be a positive number, got {0}")]
    InvalidSpeed(f64),

    #[error("Playback requires a running Tokio runtime")]
    NoRuntime,
}

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Capture already in progress")]
    AlreadyCapturing,

    #[error("Capture was cancelled")]
    Cancelled,

    #[error("Simulation run has no frames to capture")]
    EmptyRun,

    #[error("Video sink error: {0}")]
    Sink(String),

    #[error("Playback error: {0}")]
    Playback(PlaybackError),
}

impl From<PlaybackError> for CaptureError {
    fn from(error: PlaybackError) -> Self {
        match error {
            PlaybackError::AlreadyCapturing | PlaybackError::CaptureInProgress => {
                CaptureError::AlreadyCapturing
            }
            PlaybackError::NotCapturing | PlaybackError::StaleCapture(_) => CaptureError::Cancelled,
            other => CaptureError::Playback(other),
        }
    }
}

impl From<std::io::Error> for CaptureError {
    fn from(error: std::io::Error) -> Self {
        CaptureError::Sink(error.to_string())
    }
}

// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;
pub type ConfigResult<T> = Result<T, ConfigError>;
pub type ComputationResult<T> = Result<T, ComputationError>;
pub type PlaybackResult<T> = Result<T, PlaybackError>;
pub type CaptureResult<T> = Result<T, CaptureError>;
