//! OHLCV bar and time series representation.

use chrono::NaiveDateTime;

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Bars ordered by timestamp, oldest first.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TimeSeries {
    bars: Vec<Bar>,
}

impl TimeSeries {
    pub fn new(mut bars: Vec<Bar>) -> Self {
        bars.sort_by_key(|b| b.timestamp);
        Self { bars }
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first(&self) -> Option<&Bar> {
        self.bars.first()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn timestamps(&self) -> impl Iterator<Item = NaiveDateTime> + '_ {
        self.bars.iter().map(|b| b.timestamp)
    }

    /// Latest bar with a timestamp at or before `timestamp`.
    pub fn latest_at(&self, timestamp: NaiveDateTime) -> Option<&Bar> {
        let idx = self.bars.partition_point(|b| b.timestamp <= timestamp);
        idx.checked_sub(1).map(|i| &self.bars[i])
    }

    /// Latest bar with a timestamp strictly before `timestamp`.
    pub fn latest_before(&self, timestamp: NaiveDateTime) -> Option<&Bar> {
        let idx = self.bars.partition_point(|b| b.timestamp < timestamp);
        idx.checked_sub(1).map(|i| &self.bars[i])
    }

    /// Keep only the bars matching `keep`, preserving order.
    pub fn filtered(&self, keep: impl Fn(&Bar) -> bool) -> TimeSeries {
        TimeSeries {
            bars: self.bars.iter().filter(|b| keep(b)).cloned().collect(),
        }
    }

    /// The most recent `n` bars.
    pub fn tail(&self, n: usize) -> TimeSeries {
        let start = self.bars.len().saturating_sub(n);
        TimeSeries {
            bars: self.bars[start..].to_vec(),
        }
    }
}

impl From<Vec<Bar>> for TimeSeries {
    fn from(bars: Vec<Bar>) -> Self {
        TimeSeries::new(bars)
    }
}
