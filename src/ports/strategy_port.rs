//! Strategy port trait.

use chrono::NaiveDateTime;
use std::collections::BTreeMap;

use crate::domain::bar::TimeSeries;
use crate::domain::data::StrategyData;
use crate::domain::error::BotError;
use crate::domain::signal::Signal;

pub trait StrategyPort: Send {
    /// Decide what to trade at `timestamp`. `data` is the point-in-time view
    /// when the session has a data stream attached.
    fn generate_signal(
        &mut self,
        timestamp: NaiveDateTime,
        data: Option<&StrategyData>,
    ) -> Result<Signal, BotError>;

    /// Self-declared name, preferred over the configured one on orders.
    fn name(&self) -> Option<&str> {
        None
    }

    fn shutdown(&mut self) -> Result<(), BotError> {
        Ok(())
    }

    fn indicators(&self) -> Option<BTreeMap<String, Vec<f64>>> {
        None
    }

    fn plot_data(&self) -> Option<TimeSeries> {
        None
    }
}
