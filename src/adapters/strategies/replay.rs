//! Replays order records from a CSV signal file.
//!
//! Parameter `signals` names the file. Each row carries a `timestamp` plus
//! the loose order fields of an [`OrderRecord`]; rows are emitted once, on the
//! first tick at or after their timestamp. Rows naming another instrument are
//! ignored unless the session trades a portfolio.

use chrono::NaiveDateTime;
use serde::Deserialize;
use std::path::Path;

use crate::domain::config::{parse_timestamp, StrategyConfig};
use crate::domain::data::StrategyData;
use crate::domain::error::BotError;
use crate::domain::order::OrderRecord;
use crate::domain::signal::Signal;
use crate::ports::strategy_port::StrategyPort;

#[derive(Debug, Deserialize)]
struct ReplayRow {
    timestamp: String,
    order_type: Option<String>,
    instrument: Option<String>,
    direction: Option<i32>,
    size: Option<f64>,
    exchange: Option<String>,
    sizing: Option<String>,
    risk_pc: Option<f64>,
    limit_price: Option<f64>,
    stop_price: Option<f64>,
    stop_loss: Option<f64>,
    take_profit: Option<f64>,
}

impl ReplayRow {
    fn into_entry(self) -> Result<(NaiveDateTime, OrderRecord), BotError> {
        let timestamp = parse_timestamp(&self.timestamp).ok_or_else(|| BotError::Strategy {
            name: "replay".into(),
            reason: format!("invalid signal timestamp '{}'", self.timestamp),
        })?;
        Ok((
            timestamp,
            OrderRecord {
                order_type: self.order_type,
                instrument: self.instrument,
                direction: self.direction,
                size: self.size,
                exchange: self.exchange,
                sizing: self.sizing,
                risk_pc: self.risk_pc,
                limit_price: self.limit_price,
                stop_price: self.stop_price,
                stop_loss: self.stop_loss,
                take_profit: self.take_profit,
            },
        ))
    }
}

#[derive(Debug, Clone)]
pub struct Replay {
    /// Sorted by timestamp.
    records: Vec<(NaiveDateTime, OrderRecord)>,
    cursor: usize,
}

impl Replay {
    pub fn new(mut records: Vec<(NaiveDateTime, OrderRecord)>) -> Self {
        records.sort_by_key(|(timestamp, _)| *timestamp);
        Self { records, cursor: 0 }
    }

    pub fn from_csv(path: &Path, instrument: Option<&str>) -> Result<Self, BotError> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut records = Vec::new();
        for row in reader.deserialize::<ReplayRow>() {
            let (timestamp, record) = row?.into_entry()?;
            let other_instrument = matches!(
                (instrument, record.instrument.as_deref()),
                (Some(own), Some(named)) if !named.is_empty() && named != own
            );
            if !other_instrument {
                records.push((timestamp, record));
            }
        }
        Ok(Self::new(records))
    }

    pub fn from_config(config: &StrategyConfig, instrument: &str) -> Result<Self, BotError> {
        let path = config.parameter("signals").ok_or_else(|| BotError::ConfigMissing {
            section: "parameters".into(),
            key: "signals".into(),
        })?;
        let own = (!config.portfolio).then_some(instrument);
        Self::from_csv(Path::new(path), own)
    }

    pub fn remaining(&self) -> usize {
        self.records.len() - self.cursor
    }
}

impl StrategyPort for Replay {
    fn generate_signal(
        &mut self,
        timestamp: NaiveDateTime,
        _data: Option<&StrategyData>,
    ) -> Result<Signal, BotError> {
        let due = self.records[self.cursor..]
            .iter()
            .take_while(|(at, _)| *at <= timestamp)
            .count();
        let records = self.records[self.cursor..self.cursor + due]
            .iter()
            .map(|(_, record)| record.clone());
        let signal = Signal::list(records);
        self.cursor += due;
        Ok(signal)
    }

    fn name(&self) -> Option<&str> {
        Some("replay")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::fs;
    use tempfile::TempDir;

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn signal_file(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("signals.csv");
        fs::write(
            &path,
            "timestamp,order_type,instrument,direction,size,exchange,sizing,risk_pc,limit_price,stop_price,stop_loss,take_profit\n\
             2024-01-02 03:00:00,market,EURUSD,1,10,,,,,,,\n\
             2024-01-02 01:00:00,limit,,-1,5,,,,1.1,,,\n\
             2024-01-02 03:00:00,market,GBPUSD,1,2,,,,,,,\n",
        )
        .unwrap();
        path
    }

    #[test]
    fn emits_records_once_when_due() {
        let dir = TempDir::new().unwrap();
        let mut replay = Replay::from_csv(&signal_file(&dir), Some("EURUSD")).unwrap();
        assert_eq!(replay.remaining(), 2);

        assert!(replay.generate_signal(at(0), None).unwrap().is_empty());
        let first = replay.generate_signal(at(2), None).unwrap();
        assert_eq!(first.len(), 1);
        match first.into_entries().pop() {
            Some(crate::domain::signal::OrderEntry::Record(record)) => {
                assert_eq!(record.order_type.as_deref(), Some("limit"));
                assert_eq!(record.limit_price, Some(1.1));
                assert_eq!(record.instrument, None);
            }
            other => panic!("expected a record, got {other:?}"),
        }
        assert_eq!(replay.generate_signal(at(3), None).unwrap().len(), 1);
        assert!(replay.generate_signal(at(4), None).unwrap().is_empty());
    }

    #[test]
    fn portfolio_keeps_every_instrument() {
        let dir = TempDir::new().unwrap();
        let replay = Replay::from_csv(&signal_file(&dir), None).unwrap();
        assert_eq!(replay.remaining(), 3);
    }

    #[test]
    fn missing_signal_parameter_is_reported() {
        let config = StrategyConfig {
            name: "replay".into(),
            class: "replay".into(),
            instruments: vec!["EURUSD".into()],
            portfolio: false,
            interval: "1h".into(),
            period: 1,
            risk_pc: None,
            sizing: None,
            parameters: Default::default(),
        };
        assert!(matches!(
            Replay::from_config(&config, "EURUSD"),
            Err(BotError::ConfigMissing { .. })
        ));
    }
}
