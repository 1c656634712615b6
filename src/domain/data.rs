//! Shapes of strategy input data.

use std::collections::BTreeMap;

use super::bar::TimeSeries;

/// Series per granularity in configured order; the first is primary.
pub type Timeframes = Vec<(String, TimeSeries)>;

/// Primary price data: one series or one series per timeframe.
#[derive(Debug, Clone, PartialEq)]
pub enum BaseData {
    Series(TimeSeries),
    MultiTimeframe(Timeframes),
}

impl BaseData {
    /// The series current bars and sufficiency are judged on: the single
    /// series, or the first configured timeframe.
    pub fn primary(&self) -> Option<&TimeSeries> {
        match self {
            BaseData::Series(series) => Some(series),
            BaseData::MultiTimeframe(frames) => frames.first().map(|(_, series)| series),
        }
    }

    /// Series for `granularity` when this is multi-timeframe data.
    pub fn timeframe(&self, granularity: &str) -> Option<&TimeSeries> {
        match self {
            BaseData::Series(_) => None,
            BaseData::MultiTimeframe(frames) => frames
                .iter()
                .find(|(key, _)| key == granularity)
                .map(|(_, series)| series),
        }
    }
}

/// Auxiliary strategy input. Only series are subject to point-in-time checks.
#[derive(Debug, Clone, PartialEq)]
pub enum AuxValue {
    Series(TimeSeries),
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum StrategyData {
    Base(BaseData),
    Composite {
        base: BaseData,
        aux: BTreeMap<String, AuxValue>,
    },
}

impl StrategyData {
    pub fn base(&self) -> &BaseData {
        match self {
            StrategyData::Base(base) => base,
            StrategyData::Composite { base, .. } => base,
        }
    }

    pub fn aux(&self) -> Option<&BTreeMap<String, AuxValue>> {
        match self {
            StrategyData::Base(_) => None,
            StrategyData::Composite { aux, .. } => Some(aux),
        }
    }

    pub fn primary(&self) -> Option<&TimeSeries> {
        self.base().primary()
    }
}

/// Quote series for bid/ask aware fills.
#[derive(Debug, Clone, PartialEq)]
pub enum QuoteData {
    Series(TimeSeries),
    PerInstrument(BTreeMap<String, TimeSeries>),
}

/// Everything a data stream hands back on refresh.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StreamSnapshot {
    pub data: TimeSeries,
    pub multi_data: Option<Timeframes>,
    pub quote_data: Option<QuoteData>,
    pub aux_data: Option<BTreeMap<String, AuxValue>>,
}

impl StreamSnapshot {
    /// Assemble the strategy view: multi-timeframe data replaces the single
    /// series when present, and auxiliary data wraps the result.
    pub fn strategy_data(&self) -> StrategyData {
        let base = match &self.multi_data {
            Some(frames) => BaseData::MultiTimeframe(frames.clone()),
            None => BaseData::Series(self.data.clone()),
        };
        match &self.aux_data {
            Some(aux) => StrategyData::Composite {
                base,
                aux: aux.clone(),
            },
            None => StrategyData::Base(base),
        }
    }
}
