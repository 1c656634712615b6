//! Fast/slow EMA crossover on the primary close series.
//!
//! Parameters: `fast` (default 12), `slow` (default 26), `size` (default 1).
//! A crossover in the opposite direction of an open position closes it
//! before entering the other way.

use chrono::NaiveDateTime;
use std::collections::BTreeMap;

use crate::domain::config::StrategyConfig;
use crate::domain::data::StrategyData;
use crate::domain::ema::ema;
use crate::domain::error::BotError;
use crate::domain::order::{Order, OrderType};
use crate::domain::signal::Signal;
use crate::ports::strategy_port::StrategyPort;

#[derive(Debug, Clone)]
pub struct EmaCross {
    fast: usize,
    slow: usize,
    size: f64,
    /// Direction of the position this strategy believes it holds.
    position: i32,
    fast_values: Vec<f64>,
    slow_values: Vec<f64>,
}

impl EmaCross {
    pub fn new(fast: usize, slow: usize, size: f64) -> Result<Self, BotError> {
        if fast == 0 || fast >= slow {
            return Err(strategy_error(format!(
                "fast period ({fast}) must be positive and below slow period ({slow})"
            )));
        }
        if size <= 0.0 {
            return Err(strategy_error("size must be positive"));
        }
        Ok(Self {
            fast,
            slow,
            size,
            position: 0,
            fast_values: Vec::new(),
            slow_values: Vec::new(),
        })
    }

    pub fn from_config(config: &StrategyConfig) -> Result<Self, BotError> {
        Self::new(
            parameter(config, "fast", 12)?,
            parameter(config, "slow", 26)?,
            parameter(config, "size", 1.0)?,
        )
    }

    /// Warmup points are NaN.
    fn to_values(series: Vec<Option<f64>>) -> Vec<f64> {
        series.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect()
    }

    fn crossover(&self) -> i32 {
        let n = self.fast_values.len();
        if n < 2 {
            return 0;
        }
        let (f0, f1) = (self.fast_values[n - 2], self.fast_values[n - 1]);
        let (s0, s1) = (self.slow_values[n - 2], self.slow_values[n - 1]);
        if [f0, f1, s0, s1].iter().any(|v| v.is_nan()) {
            return 0;
        }
        if f0 <= s0 && f1 > s1 {
            1
        } else if f0 >= s0 && f1 < s1 {
            -1
        } else {
            0
        }
    }
}

fn strategy_error(reason: impl Into<String>) -> BotError {
    BotError::Strategy {
        name: "ema_cross".into(),
        reason: reason.into(),
    }
}

fn parameter<T: std::str::FromStr>(
    config: &StrategyConfig,
    key: &str,
    default: T,
) -> Result<T, BotError> {
    match config.parameter(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| strategy_error(format!("invalid parameter {key} = '{value}'"))),
        None => Ok(default),
    }
}

impl StrategyPort for EmaCross {
    fn generate_signal(
        &mut self,
        _timestamp: NaiveDateTime,
        data: Option<&StrategyData>,
    ) -> Result<Signal, BotError> {
        let Some(closes) = data.and_then(StrategyData::primary).map(|s| s.closes()) else {
            return Err(strategy_error("needs a data feed"));
        };
        self.fast_values = Self::to_values(ema(&closes, self.fast));
        self.slow_values = Self::to_values(ema(&closes, self.slow));

        let cross = self.crossover();
        if cross == 0 || cross == self.position {
            return Ok(Signal::Empty);
        }

        let mut orders = Vec::new();
        if self.position != 0 {
            orders.push(Order::new(OrderType::Close));
        }
        orders.push(Order::market(cross, self.size));
        self.position = cross;
        Ok(Signal::from(orders))
    }

    fn name(&self) -> Option<&str> {
        Some("ema_cross")
    }

    fn indicators(&self) -> Option<BTreeMap<String, Vec<f64>>> {
        Some(BTreeMap::from([
            (format!("ema_{}", self.fast), self.fast_values.clone()),
            (format!("ema_{}", self.slow), self.slow_values.clone()),
        ]))
    }
}
