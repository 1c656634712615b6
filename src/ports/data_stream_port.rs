//! Data stream port trait.

use chrono::NaiveDateTime;
use std::collections::HashMap;

use crate::domain::bar::{Bar, TimeSeries};
use crate::domain::data::{StrategyData, StreamSnapshot};
use crate::domain::error::BotError;

pub trait DataStreamPort: Send {
    fn refresh(&mut self, timestamp: NaiveDateTime) -> Result<StreamSnapshot, BotError>;

    /// Current bar per instrument for an already point-in-time checked series.
    fn get_trading_bars(
        &self,
        data: &TimeSeries,
        quote_bars: bool,
        timestamp: NaiveDateTime,
        context: Option<&StrategyData>,
    ) -> Result<HashMap<String, Bar>, BotError>;
}
