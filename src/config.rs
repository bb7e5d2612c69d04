// src/config.rs
use crate::domain::errors::{AppError, AppResult, ConfigError, ConfigResult};
use crate::domain::models::{Granularity, Strategy, Ticker};
use chrono::NaiveDate;
use dotenv::dotenv;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

pub const MAX_TICKERS: usize = 3;

/// Time machine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// What to simulate
    pub simulation: SimulationConfig,

    /// On-screen playback
    pub playback: PlaybackConfig,

    /// Video export
    pub capture: CaptureConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Simulation request, passed explicitly into each run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// 1 to 3 ticker symbols (e.g., ["AAPL", "NVDA"])
    pub tickers: Vec<String>,

    /// First day of the simulated range
    pub start_date: NaiveDate,

    /// Last day of the simulated range (inclusive)
    pub end_date: NaiveDate,

    pub granularity: Granularity,

    pub strategy: Strategy,

    /// Lump sum total, or the monthly contribution for DCA
    pub amount: Decimal,

    /// Fixed seed for reproducible price series
    pub seed: Option<u64>,
}

/// Playback configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Milliseconds between frames at 1x
    pub base_interval_ms: u64,

    pub speed_multiplier: f64,

    /// Start playing as soon as a run is ready
    pub auto_play: bool,
}

/// Capture / export configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Output frame rate hint for the encoder
    pub fps: u32,

    /// Output bit-rate hint in bits per second
    pub bitrate: u64,

    /// Milliseconds between emitted frames at 1x
    pub frame_interval_ms: u64,

    pub speed_multiplier: f64,

    pub mime_type: String,

    /// Where the CLI writes captured frames
    pub output_path: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "warn", "error")
    pub level: String,

    /// Log to file
    pub to_file: bool,

    /// Log file path
    pub file_path: Option<String>,
}

impl SimulationConfig {
    /// Check the request and return its normalised tickers
    pub fn validate(&self) -> ConfigResult<Vec<Ticker>> {
        if self.tickers.is_empty() {
            return Err(ConfigError::NoTickers);
        }
        if self.tickers.len() > MAX_TICKERS {
            return Err(ConfigError::TooManyTickers(self.tickers.len()));
        }

        let mut tickers: Vec<Ticker> = Vec::with_capacity(self.tickers.len());
        for symbol in &self.tickers {
            let ticker = Ticker::new(symbol)?;
            if tickers.contains(&ticker) {
                return Err(ConfigError::DuplicateTicker(ticker.to_string()));
            }
            tickers.push(ticker);
        }

        if self.amount <= Decimal::ZERO {
            return Err(ConfigError::NonPositiveAmount);
        }
        if self.start_date > self.end_date {
            return Err(ConfigError::InvertedDateRange {
                start: self.start_date,
                end: self.end_date,
            });
        }

        Ok(tickers)
    }

    pub fn amount_f64(&self) -> ConfigResult<f64> {
        self.amount
            .to_f64()
            .ok_or_else(|| ConfigError::Invalid(format!("Amount out of range: {}", self.amount)))
    }
}

/// Split a comma separated ticker list
pub fn parse_tickers(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_var<T: FromStr>(key: &str, default: T) -> AppResult<T> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| {
            AppError::Config(ConfigError::Invalid(format!("Invalid value for {}: {}", key, raw)))
        }),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        // Load .env file if it exists
        dotenv().ok();

        let defaults = Config::default();

        let tickers = env::var("TICKERS")
            .map(|raw| parse_tickers(&raw))
            .unwrap_or(defaults.simulation.tickers);

        let simulation_config = SimulationConfig {
            tickers,
            start_date: parse_var("START_DATE", defaults.simulation.start_date)?,
            end_date: parse_var("END_DATE", defaults.simulation.end_date)?,
            granularity: parse_var("GRANULARITY", defaults.simulation.granularity)?,
            strategy: parse_var("STRATEGY", defaults.simulation.strategy)?,
            amount: parse_var("AMOUNT", defaults.simulation.amount)?,
            seed: match env::var("SEED") {
                Ok(raw) => Some(raw.trim().parse().map_err(|_| {
                    AppError::Config(ConfigError::Invalid(format!("Invalid SEED: {}", raw)))
                })?),
                Err(_) => None,
            },
        };

        let playback_config = PlaybackConfig {
            base_interval_ms: parse_var("PLAYBACK_INTERVAL_MS", defaults.playback.base_interval_ms)?,
            speed_multiplier: parse_var("PLAYBACK_SPEED", defaults.playback.speed_multiplier)?,
            auto_play: env::var("AUTO_PLAY")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
        };

        let capture_config = CaptureConfig {
            fps: parse_var("CAPTURE_FPS", defaults.capture.fps)?,
            bitrate: parse_var("CAPTURE_BITRATE", defaults.capture.bitrate)?,
            frame_interval_ms: parse_var("CAPTURE_INTERVAL_MS", defaults.capture.frame_interval_ms)?,
            speed_multiplier: parse_var("CAPTURE_SPEED", defaults.capture.speed_multiplier)?,
            mime_type: env::var("CAPTURE_MIME_TYPE").unwrap_or(defaults.capture.mime_type),
            output_path: env::var("CAPTURE_OUTPUT").ok(),
        };

        // Create Logging config
        let logging_config = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            to_file: env::var("LOG_TO_FILE")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
            file_path: env::var("LOG_FILE_PATH").ok(),
        };

        Ok(Config {
            simulation: simulation_config,
            playback: playback_config,
            capture: capture_config,
            logging: logging_config,
        })
    }

    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let mut file = File::open(path).map_err(|e| {
            ConfigError::Invalid(format!("Failed to open config file: {}", e))
        })?;

        let mut contents = String::new();
        file.read_to_string(&mut contents).map_err(|e| {
            ConfigError::Invalid(format!("Failed to read config file: {}", e))
        })?;

        let config: Config = serde_json::from_str(&contents).map_err(|e| {
            ConfigError::Invalid(format!("Failed to parse config file: {}", e))
        })?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> AppResult<()> {
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Check every section before anything runs
    pub fn validate(&self) -> ConfigResult<()> {
        self.simulation.validate()?;
        if !(self.playback.speed_multiplier.is_finite() && self.playback.speed_multiplier > 0.0) {
            return Err(ConfigError::InvalidSpeed(self.playback.speed_multiplier));
        }
        if !(self.capture.speed_multiplier.is_finite() && self.capture.speed_multiplier > 0.0) {
            return Err(ConfigError::InvalidSpeed(self.capture.speed_multiplier));
        }
        if self.playback.base_interval_ms == 0 || self.capture.frame_interval_ms == 0 {
            return Err(ConfigError::Invalid("Frame intervals must be positive".to_string()));
        }
        if self.capture.fps == 0 {
            return Err(ConfigError::Invalid("Capture fps must be positive".to_string()));
        }
        Ok(())
    }

    /// Initialize logging based on configuration
    pub fn init_logging(&self) -> AppResult<()> {
        let mut builder = env_logger::Builder::new();

        // Set log level
        let log_level = match self.logging.level.to_lowercase().as_str() {
            "trace" => log::LevelFilter::Trace,
            "debug" => log::LevelFilter::Debug,
            "info" => log::LevelFilter::Info,
            "warn" => log::LevelFilter::Warn,
            "error" => log::LevelFilter::Error,
            _ => log::LevelFilter::Info,
        };

        builder.filter_level(log_level);

        // Configure output
        if self.logging.to_file {
            if let Some(file_path) = &self.logging.file_path {
                let file = File::create(file_path).map_err(|e| {
                    ConfigError::Invalid(format!("Failed to create log file: {}", e))
                })?;

                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
        }

        builder
            .try_init()
            .map_err(|e| ConfigError::Invalid(format!("Logger already initialised: {}", e)))?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            simulation: SimulationConfig {
                tickers: vec!["AAPL".to_string()],
                start_date: NaiveDate::from_ymd_opt(2015, 1, 1).unwrap_or_default(),
                end_date: chrono::Local::now().date_naive(),
                granularity: Granularity::Monthly,
                strategy: Strategy::DollarCostAverage,
                amount: dec!(100),
                seed: None,
            },
            playback: PlaybackConfig {
                base_interval_ms: 50,
                speed_multiplier: 1.0,
                auto_play: true,
            },
            capture: CaptureConfig {
                fps: 30,
                bitrate: 5_000_000,
                frame_interval_ms: 50,
                speed_multiplier: 1.0,
                mime_type: "video/webm;codecs=vp9".to_string(),
                output_path: None,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                to_file: false,
                file_path: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(tickers: &[&str]) -> SimulationConfig {
        SimulationConfig {
            tickers: tickers.iter().map(|t| t.to_string()).collect(),
            start_date: NaiveDate::from_ymd_opt(2018, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            granularity: Granularity::Monthly,
            strategy: Strategy::DollarCostAverage,
            amount: dec!(250),
            seed: Some(1),
        }
    }

    #[test]
    fn valid_request_normalises_tickers() {
        let tickers = request(&["aapl", "NVDA"]).validate().unwrap();
        assert_eq!(tickers[0].as_str(), "AAPL");
        assert_eq!(tickers.len(), 2);
    }

    #[test]
    fn ticker_count_is_bounded() {
        assert_eq!(request(&[]).validate(), Err(ConfigError::NoTickers));
        assert_eq!(
            request(&["A", "B", "C", "D"]).validate(),
            Err(ConfigError::TooManyTickers(4))
        );
        assert_eq!(
            request(&["spy", "SPY"]).validate(),
            Err(ConfigError::DuplicateTicker("SPY".to_string()))
        );
        assert_eq!(request(&["AAPL", " "]).validate(), Err(ConfigError::EmptyTicker));
    }

    #[test]
    fn amount_and_dates_are_checked() {
        let mut config = request(&["AAPL"]);
        config.amount = Decimal::ZERO;
        assert_eq!(config.validate(), Err(ConfigError::NonPositiveAmount));

        let mut config = request(&["AAPL"]);
        std::mem::swap(&mut config.start_date, &mut config.end_date);
        assert!(matches!(config.validate(), Err(ConfigError::InvertedDateRange { .. })));
    }

    #[test]
    fn parse_tickers_skips_blanks() {
        assert_eq!(parse_tickers("aapl, ,nvda,"), vec!["AAPL", "NVDA"]);
    }

    #[test]
    fn config_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = Config::default();
        config.simulation = request(&["MSFT"]);
        config.to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.simulation.tickers, vec!["MSFT"]);
        assert_eq!(loaded.simulation.amount, dec!(250));
        assert_eq!(loaded.simulation.strategy, Strategy::DollarCostAverage);
        assert_eq!(loaded.capture.fps, 30);
    }

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }
}
