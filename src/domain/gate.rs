//! Point-in-time data checks.
//!
//! Strategies only ever see bars that were complete at the evaluation
//! timestamp, truncated to the configured history length. Duplicate-bar
//! detection suppresses signals when nothing new arrived since the last tick.

use chrono::NaiveDateTime;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use super::bar::{Bar, TimeSeries};
use super::data::{AuxValue, BaseData, QuoteData, StrategyData};
use super::error::BotError;
use crate::ports::data_stream_port::DataStreamPort;

/// Which end of its interval a bar's timestamp marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Indexing {
    /// Stamped at the open: a bar is complete only once the next one starts,
    /// so bars at the evaluation timestamp are still forming.
    #[default]
    Open,
    /// Stamped at the close: a bar at the evaluation timestamp is complete.
    Close,
}

impl Indexing {
    pub fn is_visible(&self, bar: &NaiveDateTime, timestamp: &NaiveDateTime) -> bool {
        match self {
            Indexing::Open => bar < timestamp,
            Indexing::Close => bar <= timestamp,
        }
    }

    /// Most recent bar of `series` complete at `timestamp`.
    pub fn latest_visible<'a>(
        &self,
        series: &'a TimeSeries,
        timestamp: NaiveDateTime,
    ) -> Option<&'a Bar> {
        match self {
            Indexing::Open => series.latest_before(timestamp),
            Indexing::Close => series.latest_at(timestamp),
        }
    }
}

impl FromStr for Indexing {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "open" => Ok(Indexing::Open),
            "close" => Ok(Indexing::Close),
            other => Err(BotError::config(format!(
                "unrecognised indexing type '{other}'"
            ))),
        }
    }
}

impl fmt::Display for Indexing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Indexing::Open => f.write_str("open"),
            Indexing::Close => f.write_str("close"),
        }
    }
}

/// Drop bars not yet visible at `timestamp` (when checking for future data),
/// then keep at most `tail_bars` of the most recent ones.
pub fn check_series(
    series: &TimeSeries,
    timestamp: NaiveDateTime,
    indexing: Indexing,
    tail_bars: Option<usize>,
    check_for_future_data: bool,
) -> TimeSeries {
    let past = if check_for_future_data {
        series.filtered(|bar| indexing.is_visible(&bar.timestamp, &timestamp))
    } else {
        series.clone()
    };
    match tail_bars {
        Some(n) => past.tail(n),
        None => past,
    }
}

/// Series entries get the same treatment as price data; other values pass
/// through untouched.
pub fn check_aux(
    aux: &BTreeMap<String, AuxValue>,
    timestamp: NaiveDateTime,
    indexing: Indexing,
    tail_bars: Option<usize>,
    check_for_future_data: bool,
) -> BTreeMap<String, AuxValue> {
    aux.iter()
        .map(|(key, value)| {
            let checked = match value {
                AuxValue::Series(series) => AuxValue::Series(check_series(
                    series,
                    timestamp,
                    indexing,
                    tail_bars,
                    check_for_future_data,
                )),
                other => other.clone(),
            };
            (key.clone(), checked)
        })
        .collect()
}

/// Result of gating one tick's data.
#[derive(Debug, Clone, PartialEq)]
pub struct GateOutput {
    pub data: StrategyData,
    pub current_bars: HashMap<String, Bar>,
    pub quote_bars: HashMap<String, Bar>,
    /// False when fewer than the minimum number of bars are visible; the
    /// tick must not ask the strategy for a signal.
    pub sufficient_data: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataIntegrityGate {
    pub indexing: Indexing,
    pub min_bars: usize,
}

impl DataIntegrityGate {
    pub fn new(indexing: Indexing, min_bars: usize) -> Self {
        Self { indexing, min_bars }
    }

    pub fn process(
        &self,
        data: &StrategyData,
        quote: Option<&QuoteData>,
        timestamp: NaiveDateTime,
        check_for_future_data: bool,
        stream: &dyn DataStreamPort,
    ) -> Result<GateOutput, BotError> {
        let tail = Some(self.min_bars);
        let base = match data.base() {
            BaseData::Series(series) => BaseData::Series(check_series(
                series,
                timestamp,
                self.indexing,
                tail,
                check_for_future_data,
            )),
            BaseData::MultiTimeframe(frames) if frames.is_empty() => {
                return Err(BotError::config(
                    "unrecognised data shape: empty multi-timeframe mapping",
                ));
            }
            BaseData::MultiTimeframe(frames) => BaseData::MultiTimeframe(
                frames
                    .iter()
                    .map(|(granularity, series)| {
                        let checked = check_series(
                            series,
                            timestamp,
                            self.indexing,
                            tail,
                            check_for_future_data,
                        );
                        (granularity.clone(), checked)
                    })
                    .collect(),
            ),
        };
        let processed = match data.aux() {
            Some(aux) => StrategyData::Composite {
                base,
                aux: check_aux(aux, timestamp, self.indexing, tail, check_for_future_data),
            },
            None => StrategyData::Base(base),
        };

        let (current_bars, sufficient_data) = match processed.primary() {
            Some(primary) => {
                let bars = trading_bars(stream, primary, false, timestamp, Some(&processed))?;
                (bars, primary.len() >= self.min_bars)
            }
            None => (HashMap::new(), false),
        };

        let quote_bars = match quote {
            None => current_bars.clone(),
            Some(QuoteData::Series(series)) => {
                let checked =
                    check_series(series, timestamp, self.indexing, tail, check_for_future_data);
                trading_bars(stream, &checked, true, timestamp, Some(&processed))?
            }
            Some(QuoteData::PerInstrument(per_instrument)) => {
                let mut merged = HashMap::new();
                for series in per_instrument.values() {
                    let checked = check_series(
                        series,
                        timestamp,
                        self.indexing,
                        tail,
                        check_for_future_data,
                    );
                    merged.extend(trading_bars(
                        stream,
                        &checked,
                        true,
                        timestamp,
                        Some(&processed),
                    )?);
                }
                merged
            }
        };

        Ok(GateOutput {
            data: processed,
            current_bars,
            quote_bars,
            sufficient_data,
        })
    }
}

fn trading_bars(
    stream: &dyn DataStreamPort,
    series: &TimeSeries,
    quote: bool,
    timestamp: NaiveDateTime,
    context: Option<&StrategyData>,
) -> Result<HashMap<String, Bar>, BotError> {
    if series.is_empty() {
        return Ok(HashMap::new());
    }
    stream.get_trading_bars(series, quote, timestamp, context)
}

/// Bars seen on the previous tick, per tracked instrument.
#[derive(Debug, Clone, Default)]
pub struct LastBarCache {
    last: Option<HashMap<String, Bar>>,
}

impl LastBarCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<&HashMap<String, Bar>> {
        self.last.as_ref()
    }

    /// Whether `current` carries new data, recording it as the latest bars
    /// either way. Data is stale only when every tracked instrument's bar
    /// equals its cached predecessor; anything that cannot be compared
    /// counts as new.
    pub fn check_new(&mut self, current: HashMap<String, Bar>, allow_duplicates: bool) -> bool {
        let new_data = allow_duplicates || !self.all_unchanged(&current);
        self.last = Some(current);
        new_data
    }

    fn all_unchanged(&self, current: &HashMap<String, Bar>) -> bool {
        let Some(last) = &self.last else {
            return false;
        };
        !current.is_empty()
            && current
                .iter()
                .all(|(instrument, bar)| last.get(instrument) == Some(bar))
    }
}
