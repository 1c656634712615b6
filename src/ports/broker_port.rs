//! Execution venue port trait.

use chrono::NaiveDateTime;

use crate::domain::bar::TimeSeries;
use crate::domain::error::BotError;
use crate::domain::order::{Order, Precision, TopOfBook};
use crate::domain::results::Fill;

/// A venue, real or simulated. Venues may be shared between sessions, so
/// every method takes `&self` and implementations serialize their own state.
pub trait BrokerPort: Send + Sync {
    fn name(&self) -> &str;

    fn initialise_data(
        &self,
        instrument: &str,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
        granularity: &str,
    ) -> Result<(), BotError>;

    fn get_precision(&self, instrument: &str) -> Result<Precision, BotError>;

    fn get_orderbook(&self, instrument: &str) -> Result<TopOfBook, BotError>;

    fn get_candles(&self, instrument: &str) -> Result<TimeSeries, BotError>;

    fn place_order(&self, order: &Order) -> Result<(), BotError>;

    /// Advance simulated fills and PnL to `timestamp`. Live venues ignore it.
    fn update_positions(
        &self,
        _instrument: &str,
        _timestamp: NaiveDateTime,
    ) -> Result<(), BotError> {
        Ok(())
    }

    fn fill_history(&self) -> Vec<Fill> {
        Vec::new()
    }
}
