//! Session configuration, built and validated once from a [`ConfigPort`].

use chrono::{NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use super::error::BotError;
use super::gate::Indexing;
use super::order::{Precision, Sizing};
use crate::ports::config_port::ConfigPort;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradingMode {
    Backtest,
    Paper,
    Live,
}

impl TradingMode {
    /// Venue state is simulated and must be advanced every tick.
    pub fn is_simulated(&self) -> bool {
        matches!(self, TradingMode::Backtest | TradingMode::Paper)
    }
}

impl FromStr for TradingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "backtest" => Ok(TradingMode::Backtest),
            "paper" => Ok(TradingMode::Paper),
            "live" => Ok(TradingMode::Live),
            other => Err(format!("expected backtest, paper or live, got '{other}'")),
        }
    }
}

impl fmt::Display for TradingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TradingMode::Backtest => "backtest",
            TradingMode::Paper => "paper",
            TradingMode::Live => "live",
        })
    }
}

/// Where market data comes from. `None` means the strategy fetches its own
/// data and no prices are resolved for orders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataFeed {
    None,
    Named(String),
}

impl DataFeed {
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
            DataFeed::None
        } else {
            DataFeed::Named(trimmed.to_string())
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, DataFeed::Named(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyConfig {
    pub name: String,
    /// Registry key of the strategy implementation.
    pub class: String,
    /// One instrument, or the watchlist of a portfolio strategy.
    pub instruments: Vec<String>,
    pub portfolio: bool,
    pub interval: String,
    /// Minimum number of bars the strategy needs.
    pub period: usize,
    pub risk_pc: Option<f64>,
    pub sizing: Option<Sizing>,
    pub parameters: BTreeMap<String, String>,
}

impl StrategyConfig {
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }

    /// Granularities named by `interval`, primary first. `1h,4h` means
    /// hourly bars with a four-hourly secondary timeframe.
    pub fn granularities(&self) -> Vec<String> {
        list(&self.interval)
    }

    pub fn primary_granularity(&self) -> &str {
        self.interval
            .split(',')
            .map(str::trim)
            .next()
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VenueConfig {
    pub name: String,
    /// Tradable instruments. Empty means every strategy instrument.
    pub instruments: Vec<String>,
    pub commission_pct: f64,
    pub slippage_pct: f64,
    pub spread: f64,
    pub precision: Precision,
    pub initial_cash: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub mode: TradingMode,
    pub scan: bool,
    pub feed: DataFeed,
    pub indexing: Indexing,
    allow_duplicate_bars: bool,
    pub dynamic_data: bool,
    pub notify: u8,
    pub verbosity: u8,
    pub data_start: Option<NaiveDateTime>,
    pub data_end: Option<NaiveDateTime>,
    pub venue_timeout: Option<Duration>,
    pub data_dir: PathBuf,
    pub strategy: StrategyConfig,
    pub venues: Vec<VenueConfig>,
}

impl SessionConfig {
    pub fn from_port(config: &dyn ConfigPort) -> Result<Self, BotError> {
        let mode = parse_field(config, "session", "mode", "backtest")?;
        let indexing = match config.get_string("session", "indexing") {
            Some(value) => value
                .parse::<Indexing>()
                .map_err(|e| invalid("session", "indexing", e.to_string()))?,
            None => Indexing::default(),
        };
        let data_start = optional_timestamp(config, "session", "data_start")?;
        let data_end = optional_timestamp(config, "session", "data_end")?;
        if let (Some(start), Some(end)) = (data_start, data_end) {
            if start >= end {
                return Err(invalid(
                    "session",
                    "data_start",
                    "data_start must be before data_end",
                ));
            }
        }

        let venue_timeout = parse_venue_timeout(config)?;

        Ok(Self {
            mode,
            scan: config.get_bool("session", "scan")?.unwrap_or(false),
            feed: DataFeed::parse(&config.get_string("session", "feed").unwrap_or_default()),
            indexing,
            allow_duplicate_bars: config
                .get_bool("session", "allow_duplicate_bars")?
                .unwrap_or(false),
            dynamic_data: config.get_bool("session", "dynamic_data")?.unwrap_or(false),
            notify: level(config, "notify")?,
            verbosity: level(config, "verbosity")?,
            data_start,
            data_end,
            venue_timeout,
            data_dir: PathBuf::from(
                config
                    .get_string("session", "data_dir")
                    .unwrap_or_else(|| ".".to_string()),
            ),
            strategy: strategy_config(config)?,
            venues: venue_configs(config)?,
        })
    }

    pub fn is_backtest(&self) -> bool {
        self.mode == TradingMode::Backtest
    }

    /// Duplicate bars are always allowed without a data feed, since there is
    /// nothing to compare.
    pub fn allow_duplicate_bars(&self) -> bool {
        self.allow_duplicate_bars || !self.feed.is_live()
    }

    pub fn with_allow_duplicate_bars(mut self, allow: bool) -> Self {
        self.allow_duplicate_bars = allow;
        self
    }

    pub fn is_multi_venue(&self) -> bool {
        self.venues.len() > 1
    }
}

/// `venue_timeout_secs`, where zero disables the deadline.
fn parse_venue_timeout(config: &dyn ConfigPort) -> Result<Option<Duration>, BotError> {
    let secs = config
        .get_double("session", "venue_timeout_secs")?
        .unwrap_or(0.0);
    if secs.is_nan() || secs < 0.0 {
        return Err(invalid(
            "session",
            "venue_timeout_secs",
            "venue_timeout_secs must be non-negative",
        ));
    }
    if secs == 0.0 {
        return Ok(None);
    }
    Duration::try_from_secs_f64(secs)
        .map(Some)
        .map_err(|e| invalid("session", "venue_timeout_secs", format!("{secs}: {e}")))
}

fn strategy_config(config: &dyn ConfigPort) -> Result<StrategyConfig, BotError> {
    let name = required(config, "strategy", "name")?;
    let class = config
        .get_string("strategy", "class")
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| name.clone());
    let portfolio = config.get_bool("strategy", "portfolio")?.unwrap_or(false);
    let instruments = if portfolio {
        list(&required(config, "strategy", "watchlist")?)
    } else {
        vec![required(config, "strategy", "instrument")?]
    };
    if instruments.is_empty() {
        return Err(missing("strategy", "watchlist"));
    }

    let period = config.get_int("strategy", "period")?.unwrap_or(1);
    if period < 1 {
        return Err(invalid(
            "strategy",
            "period",
            "period must be at least 1",
        ));
    }

    let risk_pc = match config.get_double("strategy", "risk_pc")? {
        Some(value) => {
            if value.is_nan() || value <= 0.0 || value > 100.0 {
                return Err(invalid(
                    "strategy",
                    "risk_pc",
                    "risk_pc must be between 0 and 100",
                ));
            }
            Some(value)
        }
        None => None,
    };

    let parameters = config
        .keys("parameters")
        .into_iter()
        .filter_map(|key| {
            config
                .get_string("parameters", &key)
                .map(|value| (key, value))
        })
        .collect();

    Ok(StrategyConfig {
        name,
        class,
        instruments,
        portfolio,
        interval: required(config, "strategy", "interval")?,
        period: period as usize,
        risk_pc,
        sizing: match config.get_string("strategy", "sizing") {
            Some(value) => Some(
                value
                    .parse::<Sizing>()
                    .map_err(|reason| invalid("strategy", "sizing", reason))?,
            ),
            None => None,
        },
        parameters,
    })
}

/// Venue sections named in `[venues] names`. Without that list the session
/// trades on a single default paper venue.
fn venue_configs(config: &dyn ConfigPort) -> Result<Vec<VenueConfig>, BotError> {
    let names = config
        .get_string("venues", "names")
        .map(|names| list(&names))
        .unwrap_or_default();
    if names.is_empty() {
        return Ok(vec![venue_config(config, "paper")?]);
    }
    names
        .iter()
        .map(|name| venue_config(config, name))
        .collect()
}

fn venue_config(config: &dyn ConfigPort, name: &str) -> Result<VenueConfig, BotError> {
    let section = format!("venue.{name}");
    let non_negative = |key: &str, default: f64| -> Result<f64, BotError> {
        let value = config.get_double(&section, key)?.unwrap_or(default);
        if value.is_nan() || value < 0.0 {
            return Err(invalid(&section, key, format!("{key} must be non-negative")));
        }
        Ok(value)
    };
    let decimals = |key: &str, default: i64| -> Result<u32, BotError> {
        let value = config.get_int(&section, key)?.unwrap_or(default);
        u32::try_from(value)
            .ok()
            .filter(|d| *d <= 12)
            .ok_or_else(|| invalid(&section, key, format!("{key} must be between 0 and 12")))
    };

    let initial_cash = config
        .get_double(&section, "initial_cash")?
        .unwrap_or(10_000.0);
    if initial_cash.is_nan() || initial_cash <= 0.0 {
        return Err(invalid(
            &section,
            "initial_cash",
            "initial_cash must be positive",
        ));
    }

    Ok(VenueConfig {
        name: name.to_string(),
        instruments: config
            .get_string(&section, "instruments")
            .map(|i| list(&i))
            .unwrap_or_default(),
        commission_pct: non_negative("commission_pct", 0.0)?,
        slippage_pct: non_negative("slippage_pct", 0.0)?,
        spread: non_negative("spread", 0.0)?,
        precision: Precision {
            size: decimals("size_precision", 2)?,
            price: decimals("price_precision", 5)?,
        },
        initial_cash,
    })
}

fn level(config: &dyn ConfigPort, key: &str) -> Result<u8, BotError> {
    let value = config.get_int("session", key)?.unwrap_or(0);
    u8::try_from(value).map_err(|_| invalid("session", key, format!("{key} must be 0 to 255")))
}

fn parse_field<T>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: &str,
) -> Result<T, BotError>
where
    T: FromStr<Err = String>,
{
    config
        .get_string(section, key)
        .unwrap_or_else(|| default.to_string())
        .parse::<T>()
        .map_err(|reason| invalid(section, key, reason))
}

fn required(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, BotError> {
    match config.get_string(section, key) {
        Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(missing(section, key)),
    }
}

fn optional_timestamp(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<NaiveDateTime>, BotError> {
    match config.get_string(section, key) {
        Some(value) => parse_timestamp(&value).map(Some).ok_or_else(|| {
            invalid(
                section,
                key,
                format!("invalid {key} format, expected YYYY-MM-DD [HH:MM:SS]"),
            )
        }),
        None => Ok(None),
    }
}

/// `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS` or a bare date at midnight.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn missing(section: &str, key: &str) -> BotError {
    BotError::ConfigMissing {
        section: section.to_string(),
        key: key.to_string(),
    }
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> BotError {
    BotError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}
