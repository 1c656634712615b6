//! Fills and the per-bot trade result record handed to reporting.

use chrono::NaiveDateTime;
use std::collections::BTreeMap;

use super::bar::TimeSeries;

#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub timestamp: NaiveDateTime,
    pub instrument: String,
    pub exchange: String,
    pub order_type: String,
    pub direction: i32,
    pub size: f64,
    pub price: f64,
    pub commission: f64,
}

impl Fill {
    pub fn notional(&self) -> f64 {
        self.size * self.price
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeResults {
    pub instrument: String,
    /// Fill history per venue name.
    pub fills: BTreeMap<String, Vec<Fill>>,
    pub indicators: Option<BTreeMap<String, Vec<f64>>>,
    pub data: TimeSeries,
    pub interval: String,
}

impl TradeResults {
    pub fn fill_count(&self) -> usize {
        self.fills.values().map(Vec::len).sum()
    }

    pub fn total_commission(&self) -> f64 {
        self.fills.values().flatten().map(|f| f.commission).sum()
    }

    /// Net signed size traded, per instrument.
    pub fn net_position(&self, instrument: &str) -> f64 {
        self.fills
            .values()
            .flatten()
            .filter(|f| f.instrument == instrument)
            .map(|f| f.direction.signum() as f64 * f.size)
            .sum()
    }
}
