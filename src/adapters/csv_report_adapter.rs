//! CSV trade report adapter implementing ReportPort.

use serde::Serialize;

use crate::domain::error::BotError;
use crate::domain::results::TradeResults;
use crate::ports::report_port::ReportPort;

#[derive(Debug, Serialize)]
struct FillRow<'a> {
    venue: &'a str,
    timestamp: String,
    instrument: &'a str,
    order_type: &'a str,
    direction: i32,
    size: f64,
    price: f64,
    commission: f64,
}

/// One row per fill, across all venues, in venue then time order.
pub struct CsvReportAdapter;

impl ReportPort for CsvReportAdapter {
    fn write(&self, results: &TradeResults, output_path: &str) -> Result<(), BotError> {
        let mut writer = csv::Writer::from_path(output_path)?;
        for (venue, fills) in &results.fills {
            for fill in fills {
                writer.serialize(FillRow {
                    venue,
                    timestamp: fill.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                    instrument: &fill.instrument,
                    order_type: &fill.order_type,
                    direction: fill.direction,
                    size: fill.size,
                    price: fill.price,
                    commission: fill.commission,
                })?;
            }
        }
        writer.flush()?;
        Ok(())
    }
}
