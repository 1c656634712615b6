//! Historical bar access port trait.

use chrono::NaiveDateTime;

use crate::domain::bar::TimeSeries;
use crate::domain::error::BotError;

pub trait DataPort: Send + Sync {
    fn fetch_bars(
        &self,
        instrument: &str,
        granularity: &str,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Result<TimeSeries, BotError>;

    fn list_instruments(&self, granularity: &str) -> Result<Vec<String>, BotError>;
}
