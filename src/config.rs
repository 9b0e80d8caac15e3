// src/config.rs
use crate::domain::errors::{AppError, AppResult};
use dotenv::dotenv;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

/// Market engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Price dynamics and trading costs
    pub market: MarketConfig,

    /// Scheduling and concurrency
    pub engine: EngineConfig,

    /// Trading hours
    pub calendar: CalendarConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Price dynamics and trading cost parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketConfig {
    pub base_volatility: f64,
    pub trend_strength: f64,
    pub mean_reversion: f64,
    pub min_spread: f64,
    pub max_spread: f64,
    pub liquidity_factor: f64,
    pub base_volume_per_day: f64,
    pub slippage_factor: f64,
    pub commission_rate: Decimal,
    pub min_fee: Decimal,
    /// Short exposure allowed as a fraction of the position ceiling
    pub short_exposure_ratio: Decimal,
}

/// Scheduler configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Seconds between price ticks
    pub tick_interval_secs: u64,

    /// Seconds between pending order sweeps
    pub sweep_interval_secs: u64,

    /// Maximum concurrent per-asset updates in a tick
    pub worker_pool_size: usize,

    /// Chance of a random market event per tick
    pub event_probability: f64,

    /// Seed for reproducible runs
    pub seed: Option<u64>,

    /// Synthetic assets registered when the store starts empty
    pub demo_assets: usize,
}

/// Trading hours configuration (UTC hours)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarConfig {
    pub open_hour: u32,
    pub close_hour: u32,
    pub always_open: bool,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "warn", "error")
    pub level: String,

    /// Log to file
    pub to_file: bool,

    /// Log file path
    pub file_path: Option<String>,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        // Load .env file if it exists
        dotenv().ok();

        let defaults = Config::default();

        let market = MarketConfig {
            base_volatility: env_or("MARKET_BASE_VOLATILITY", defaults.market.base_volatility),
            trend_strength: env_or("MARKET_TREND_STRENGTH", defaults.market.trend_strength),
            mean_reversion: env_or("MARKET_MEAN_REVERSION", defaults.market.mean_reversion),
            min_spread: env_or("MARKET_MIN_SPREAD", defaults.market.min_spread),
            max_spread: env_or("MARKET_MAX_SPREAD", defaults.market.max_spread),
            liquidity_factor: env_or("MARKET_LIQUIDITY_FACTOR", defaults.market.liquidity_factor),
            base_volume_per_day: env_or(
                "MARKET_BASE_VOLUME_PER_DAY",
                defaults.market.base_volume_per_day,
            ),
            slippage_factor: env_or("MARKET_SLIPPAGE_FACTOR", defaults.market.slippage_factor),
            commission_rate: env_or("MARKET_COMMISSION_RATE", defaults.market.commission_rate),
            min_fee: env_or("MARKET_MIN_FEE", defaults.market.min_fee),
            short_exposure_ratio: env_or(
                "MARKET_SHORT_EXPOSURE_RATIO",
                defaults.market.short_exposure_ratio,
            ),
        };

        let engine = EngineConfig {
            tick_interval_secs: env_or("ENGINE_TICK_INTERVAL_SECS", defaults.engine.tick_interval_secs),
            sweep_interval_secs: env_or(
                "ENGINE_SWEEP_INTERVAL_SECS",
                defaults.engine.sweep_interval_secs,
            ),
            worker_pool_size: env_or("ENGINE_WORKER_POOL_SIZE", defaults.engine.worker_pool_size),
            event_probability: env_or("ENGINE_EVENT_PROBABILITY", defaults.engine.event_probability),
            seed: env::var("ENGINE_SEED").ok().and_then(|v| v.parse().ok()),
            demo_assets: env_or("ENGINE_DEMO_ASSETS", defaults.engine.demo_assets),
        };

        let calendar = CalendarConfig {
            open_hour: env_or("CALENDAR_OPEN_HOUR", defaults.calendar.open_hour),
            close_hour: env_or("CALENDAR_CLOSE_HOUR", defaults.calendar.close_hour),
            always_open: env_or("CALENDAR_ALWAYS_OPEN", defaults.calendar.always_open),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            to_file: env_or("LOG_TO_FILE", false),
            file_path: env::var("LOG_FILE_PATH").ok(),
        };

        let config = Config {
            market,
            engine,
            calendar,
            logging,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let mut file = File::open(path).map_err(|e| {
            AppError::Config(format!("Failed to open config file: {}", e))
        })?;

        let mut contents = String::new();
        file.read_to_string(&mut contents).map_err(|e| {
            AppError::Config(format!("Failed to read config file: {}", e))
        })?;

        let config: Config = serde_json::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> AppResult<()> {
        let contents = serde_json::to_string_pretty(self).map_err(|e| {
            AppError::Config(format!("Failed to serialize config: {}", e))
        })?;

        std::fs::write(path, contents).map_err(|e| {
            AppError::Config(format!("Failed to write config file: {}", e))
        })?;

        Ok(())
    }

    /// Reject settings the simulation cannot run with
    pub fn validate(&self) -> AppResult<()> {
        let m = &self.market;
        if m.liquidity_factor <= 0.0 {
            return Err(AppError::Config("liquidity_factor must be positive".to_string()));
        }
        if m.min_spread <= 0.0 || m.min_spread > m.max_spread {
            return Err(AppError::Config(
                "spread bounds must satisfy 0 < min_spread <= max_spread".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.engine.event_probability) {
            return Err(AppError::Config(
                "event_probability must be within [0, 1]".to_string(),
            ));
        }
        if self.engine.worker_pool_size == 0 {
            return Err(AppError::Config("worker_pool_size must be at least 1".to_string()));
        }
        if self.engine.tick_interval_secs == 0 || self.engine.sweep_interval_secs == 0 {
            return Err(AppError::Config("intervals must be at least one second".to_string()));
        }
        if self.calendar.open_hour > 23 || self.calendar.close_hour > 24 {
            return Err(AppError::Config("calendar hours out of range".to_string()));
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
                    AppError::Config(format!("Failed to create log file: {}", e))
                })?;

                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
        }

        builder.try_init().map_err(|e| {
            AppError::Config(format!("Failed to initialize logger: {}", e))
        })?;

        Ok(())
    }
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            base_volatility: 0.025,
            trend_strength: 0.3,
            mean_reversion: 0.1,
            min_spread: 0.002,
            max_spread: 0.02,
            liquidity_factor: 1.0,
            base_volume_per_day: 1000.0,
            slippage_factor: 0.001,
            commission_rate: Decimal::new(1, 3),
            min_fee: Decimal::ONE,
            short_exposure_ratio: Decimal::new(5, 1),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            market: MarketConfig::default(),
            engine: EngineConfig {
                tick_interval_secs: 60,
                sweep_interval_secs: 180,
                worker_pool_size: 8,
                event_probability: 0.05,
                seed: None,
                demo_assets: 8,
            },
            calendar: CalendarConfig {
                open_hour: 9,
                close_hour: 16,
                always_open: false,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                to_file: false,
                file_path: None,
            },
        }
    }
}
