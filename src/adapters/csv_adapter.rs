//! CSV file bar store and data stream.
//!
//! Bars live in `<instrument>_<granularity>.csv` files with a header row of
//! `timestamp,open,high,low,close,volume` (`date` is accepted for the first
//! column). An optional `<instrument>_<granularity>_quote.csv` supplies quote
//! bars.

use chrono::NaiveDateTime;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::domain::bar::{Bar, TimeSeries};
use crate::domain::config::parse_timestamp;
use crate::domain::data::{AuxValue, QuoteData, StrategyData, StreamSnapshot};
use crate::domain::error::BotError;
use crate::ports::data_port::DataPort;
use crate::ports::data_stream_port::DataStreamPort;

#[derive(Debug, Deserialize)]
struct BarRow {
    #[serde(alias = "date")]
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: f64,
}

impl BarRow {
    fn into_bar(self) -> Result<Bar, BotError> {
        let timestamp = parse_timestamp(&self.timestamp).ok_or_else(|| BotError::Validation {
            reason: format!("invalid bar timestamp '{}'", self.timestamp),
        })?;
        Ok(Bar {
            timestamp,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
        })
    }
}

pub struct CsvBarStore {
    base_path: PathBuf,
}

impl CsvBarStore {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, instrument: &str, granularity: &str) -> PathBuf {
        self.base_path.join(format!("{instrument}_{granularity}.csv"))
    }

    fn quote_path(&self, instrument: &str, granularity: &str) -> PathBuf {
        self.base_path.join(format!("{instrument}_{granularity}_quote.csv"))
    }

    fn read_series(
        path: &Path,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Result<TimeSeries, BotError> {
        let content = fs::read_to_string(path).map_err(|e| {
            BotError::Io(std::io::Error::new(
                e.kind(),
                format!("failed to read {}: {e}", path.display()),
            ))
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();
        for row in rdr.deserialize::<BarRow>() {
            let bar = row?.into_bar()?;
            if start.is_some_and(|s| bar.timestamp < s) || end.is_some_and(|e| bar.timestamp > e) {
                continue;
            }
            bars.push(bar);
        }
        Ok(TimeSeries::new(bars))
    }

    /// Quote bars for `instrument`, when a quote file exists.
    pub fn fetch_quotes(
        &self,
        instrument: &str,
        granularity: &str,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Result<Option<TimeSeries>, BotError> {
        let path = self.quote_path(instrument, granularity);
        if !path.exists() {
            return Ok(None);
        }
        Self::read_series(&path, start, end).map(Some)
    }
}

impl DataPort for CsvBarStore {
    fn fetch_bars(
        &self,
        instrument: &str,
        granularity: &str,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Result<TimeSeries, BotError> {
        Self::read_series(&self.csv_path(instrument, granularity), start, end)
    }

    fn list_instruments(&self, granularity: &str) -> Result<Vec<String>, BotError> {
        let suffix = format!("_{granularity}.csv");
        let mut instruments = Vec::new();
        for entry in fs::read_dir(&self.base_path)? {
            let name = entry?.file_name();
            let name = name.to_string_lossy();
            if let Some(instrument) = name.strip_suffix(&suffix) {
                instruments.push(instrument.to_string());
            }
        }
        instruments.sort();
        Ok(instruments)
    }
}

/// Data stream for one bot, reading from a [`CsvBarStore`].
///
/// The first granularity is the primary series; further granularities become
/// multi-timeframe data. For portfolio bots the remaining instruments are
/// passed as auxiliary series keyed by instrument, and their bars count as
/// current bars too.
pub struct CsvDataStream {
    store: Arc<CsvBarStore>,
    instruments: Vec<String>,
    granularities: Vec<String>,
    start: Option<NaiveDateTime>,
    end: Option<NaiveDateTime>,
}

impl CsvDataStream {
    pub fn new(
        store: Arc<CsvBarStore>,
        instruments: Vec<String>,
        granularities: Vec<String>,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Self {
        Self {
            store,
            instruments,
            granularities,
            start,
            end,
        }
    }

    fn primary_instrument(&self) -> Result<&str, BotError> {
        self.instruments
            .first()
            .map(String::as_str)
            .ok_or_else(|| BotError::config("data stream has no instruments"))
    }

    fn primary_granularity(&self) -> Result<&str, BotError> {
        self.granularities
            .first()
            .map(String::as_str)
            .ok_or_else(|| BotError::config("data stream has no granularity"))
    }
}

impl DataStreamPort for CsvDataStream {
    fn refresh(&mut self, _timestamp: NaiveDateTime) -> Result<StreamSnapshot, BotError> {
        let instrument = self.primary_instrument()?;
        let granularity = self.primary_granularity()?;
        let data = self
            .store
            .fetch_bars(instrument, granularity, self.start, self.end)?;

        let multi_data = if self.granularities.len() > 1 {
            let mut frames = Vec::with_capacity(self.granularities.len());
            for granularity in &self.granularities {
                let series = self
                    .store
                    .fetch_bars(instrument, granularity, self.start, self.end)?;
                frames.push((granularity.clone(), series));
            }
            Some(frames)
        } else {
            None
        };

        let aux_data = if self.instruments.len() > 1 {
            let mut aux = BTreeMap::new();
            for other in self.instruments.iter().skip(1) {
                let series = self
                    .store
                    .fetch_bars(other, granularity, self.start, self.end)?;
                aux.insert(other.clone(), AuxValue::Series(series));
            }
            Some(aux)
        } else {
            None
        };

        let quote_data = self
            .store
            .fetch_quotes(instrument, granularity, self.start, self.end)?
            .map(QuoteData::Series);

        Ok(StreamSnapshot {
            data,
            multi_data,
            quote_data,
            aux_data,
        })
    }

    fn get_trading_bars(
        &self,
        data: &TimeSeries,
        _quote_bars: bool,
        _timestamp: NaiveDateTime,
        context: Option<&StrategyData>,
    ) -> Result<HashMap<String, Bar>, BotError> {
        let mut bars = HashMap::new();
        if let Some(bar) = data.last() {
            bars.insert(self.primary_instrument()?.to_string(), bar.clone());
        }
        if let Some(aux) = context.and_then(StrategyData::aux) {
            for instrument in self.instruments.iter().skip(1) {
                if let Some(AuxValue::Series(series)) = aux.get(instrument) {
                    if let Some(bar) = series.last() {
                        bars.insert(instrument.clone(), bar.clone());
                    }
                }
            }
        }
        Ok(bars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn setup_test_data() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        let csv_content = "timestamp,open,high,low,close,volume\n\
            2024-01-15 00:00:00,100.0,110.0,90.0,105.0,50000\n\
            2024-01-16 00:00:00,105.0,115.0,100.0,110.0,60000\n\
            2024-01-17 00:00:00,110.0,120.0,105.0,115.0,55000\n";

        fs::write(path.join("EURUSD_1d.csv"), csv_content).unwrap();
        fs::write(
            path.join("GBPUSD_1d.csv"),
            "date,open,high,low,close,volume\n2024-01-15,1.2,1.3,1.1,1.25,10\n",
        )
        .unwrap();
        fs::write(
            path.join("AUDUSD_1h.csv"),
            "timestamp,open,high,low,close,volume\n",
        )
        .unwrap();

        (dir, path)
    }

    #[test]
    fn fetch_bars_returns_correct_data() {
        let (_dir, path) = setup_test_data();
        let store = CsvBarStore::new(path);

        let bars = store.fetch_bars("EURUSD", "1d", None, None).unwrap();
        assert_eq!(bars.len(), 3);
        let first = bars.first().unwrap();
        assert_eq!(first.timestamp, at(15, 0));
        assert_eq!(first.open, 100.0);
        assert_eq!(first.high, 110.0);
        assert_eq!(first.low, 90.0);
        assert_eq!(first.close, 105.0);
        assert_eq!(first.volume, 50000.0);
    }

    #[test]
    fn fetch_bars_applies_window() {
        let (_dir, path) = setup_test_data();
        let store = CsvBarStore::new(path);
        let bars = store
            .fetch_bars("EURUSD", "1d", Some(at(16, 0)), Some(at(16, 0)))
            .unwrap();
        assert_eq!(bars.closes(), vec![110.0]);
    }

    #[test]
    fn date_column_alias_is_accepted() {
        let (_dir, path) = setup_test_data();
        let store = CsvBarStore::new(path);
        let bars = store.fetch_bars("GBPUSD", "1d", None, None).unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars.first().unwrap().timestamp, at(15, 0));
    }

    #[test]
    fn missing_file_is_io_error() {
        let (_dir, path) = setup_test_data();
        let store = CsvBarStore::new(path);
        let err = store.fetch_bars("NZDUSD", "1d", None, None).unwrap_err();
        assert!(matches!(err, BotError::Io(_)));
    }

    #[test]
    fn bad_timestamp_is_rejected() {
        let (_dir, path) = setup_test_data();
        fs::write(
            path.join("BAD_1d.csv"),
            "timestamp,open,high,low,close,volume\nyesterday,1,1,1,1,1\n",
        )
        .unwrap();
        let store = CsvBarStore::new(path);
        assert!(matches!(
            store.fetch_bars("BAD", "1d", None, None),
            Err(BotError::Validation { .. })
        ));
    }

    #[test]
    fn list_instruments_by_granularity() {
        let (_dir, path) = setup_test_data();
        let store = CsvBarStore::new(path);
        assert_eq!(
            store.list_instruments("1d").unwrap(),
            vec!["EURUSD".to_string(), "GBPUSD".to_string()]
        );
        assert_eq!(
            store.list_instruments("1h").unwrap(),
            vec!["AUDUSD".to_string()]
        );
    }

    #[test]
    fn stream_refresh_single_instrument() {
        let (_dir, path) = setup_test_data();
        let mut stream = CsvDataStream::new(
            Arc::new(CsvBarStore::new(path)),
            vec!["EURUSD".into()],
            vec!["1d".into()],
            None,
            None,
        );
        let snapshot = stream.refresh(at(20, 0)).unwrap();
        assert_eq!(snapshot.data.len(), 3);
        assert!(snapshot.multi_data.is_none());
        assert!(snapshot.aux_data.is_none());
        assert!(snapshot.quote_data.is_none());
    }

    #[test]
    fn stream_portfolio_tracks_every_instrument() {
        let (_dir, path) = setup_test_data();
        let mut stream = CsvDataStream::new(
            Arc::new(CsvBarStore::new(path)),
            vec!["EURUSD".into(), "GBPUSD".into()],
            vec!["1d".into()],
            None,
            None,
        );
        let snapshot = stream.refresh(at(20, 0)).unwrap();
        let data = snapshot.strategy_data();
        let bars = stream
            .get_trading_bars(&snapshot.data, false, at(20, 0), Some(&data))
            .unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars["EURUSD"].close, 115.0);
        assert_eq!(bars["GBPUSD"].close, 1.25);
    }

    #[test]
    fn stream_reads_quote_file() {
        let (_dir, path) = setup_test_data();
        fs::write(
            path.join("EURUSD_1d_quote.csv"),
            "timestamp,open,high,low,close\n2024-01-15,1,1,1,1\n",
        )
        .unwrap();
        let mut stream = CsvDataStream::new(
            Arc::new(CsvBarStore::new(path)),
            vec!["EURUSD".into()],
            vec!["1d".into()],
            None,
            None,
        );
        let snapshot = stream.refresh(at(20, 0)).unwrap();
        assert!(matches!(snapshot.quote_data, Some(QuoteData::Series(_))));
    }

    #[test]
    fn stream_keeps_configured_timeframe_order() {
        let (_dir, path) = setup_test_data();
        fs::write(
            path.join("EURUSD_1h.csv"),
            "timestamp,open,high,low,close,volume\n2024-01-17 01:00:00,2,2,2,2,1\n",
        )
        .unwrap();
        let mut stream = CsvDataStream::new(
            Arc::new(CsvBarStore::new(path)),
            vec!["EURUSD".into()],
            vec!["1h".into(), "1d".into()],
            None,
            None,
        );
        let snapshot = stream.refresh(at(20, 0)).unwrap();
        let frames = snapshot.multi_data.as_ref().unwrap();
        let keys: Vec<&str> = frames.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["1h", "1d"]);
        assert_eq!(snapshot.strategy_data().primary().unwrap().closes(), vec![2.0]);
    }
}
