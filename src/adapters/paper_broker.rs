//! Simulated venue for backtests and paper trading.
//!
//! Orders queue until the next `update_positions` call for their instrument,
//! then fill against the latest bar complete at that time under the session's
//! bar indexing, so the venue never prices off a bar that is still forming. Market orders fill
//! at the close with slippage; limit and stop-limit orders fill at their
//! price once the bar trades through it. Not a matching engine.

use chrono::NaiveDateTime;
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::domain::bar::{Bar, TimeSeries};
use crate::domain::config::VenueConfig;
use crate::domain::error::BotError;
use crate::domain::gate::Indexing;
use crate::domain::order::{Order, OrderType, Precision, TopOfBook};
use crate::domain::results::Fill;
use crate::ports::broker_port::BrokerPort;
use crate::ports::data_port::DataPort;

/// Commission as a percentage of trade value.
pub fn calculate_commission(trade_value: f64, commission_pct: f64) -> f64 {
    trade_value * commission_pct / 100.0
}

/// Buying pays up, selling gives up: `price * (1 ± slippage_pct / 100)`.
pub fn apply_slippage(market_price: f64, direction: i32, slippage_pct: f64) -> f64 {
    market_price * (1.0 + direction.signum() as f64 * slippage_pct / 100.0)
}

#[derive(Debug, Default)]
struct PaperState {
    candles: HashMap<String, TimeSeries>,
    clock: HashMap<String, NaiveDateTime>,
    pending: Vec<Order>,
    positions: HashMap<String, f64>,
    cash: f64,
    fills: Vec<Fill>,
}

impl PaperState {
    fn current_bar(&self, instrument: &str, indexing: Indexing) -> Option<&Bar> {
        let series = self.candles.get(instrument)?;
        match self.clock.get(instrument) {
            Some(ts) => indexing.latest_visible(series, *ts),
            None => series.last(),
        }
    }
}

pub struct PaperBroker {
    config: VenueConfig,
    indexing: Indexing,
    data: Arc<dyn DataPort>,
    state: Mutex<PaperState>,
}

impl PaperBroker {
    pub fn new(config: VenueConfig, indexing: Indexing, data: Arc<dyn DataPort>) -> Self {
        let state = PaperState {
            cash: config.initial_cash,
            ..Default::default()
        };
        Self {
            config,
            indexing,
            data,
            state: Mutex::new(state),
        }
    }

    pub fn cash(&self) -> Result<f64, BotError> {
        Ok(self.lock()?.cash)
    }

    pub fn position(&self, instrument: &str) -> Result<f64, BotError> {
        Ok(self
            .lock()?
            .positions
            .get(instrument)
            .copied()
            .unwrap_or_default())
    }

    pub fn pending_orders(&self) -> Result<usize, BotError> {
        Ok(self.lock()?.pending.len())
    }

    fn lock(&self) -> Result<MutexGuard<'_, PaperState>, BotError> {
        self.state.lock().map_err(|_| BotError::Venue {
            venue: self.config.name.clone(),
            instrument: String::new(),
            reason: "venue state poisoned".into(),
        })
    }

    fn venue_error(&self, instrument: &str, reason: impl Into<String>) -> BotError {
        BotError::Venue {
            venue: self.config.name.clone(),
            instrument: instrument.to_string(),
            reason: reason.into(),
        }
    }

    fn tradeable(&self, instrument: &str) -> bool {
        self.config.instruments.is_empty()
            || self.config.instruments.iter().any(|i| i == instrument)
    }

    /// Size, direction and fill price for `order` against `bar`, or `None`
    /// when the order does not fill on this bar.
    fn fill_terms(&self, order: &Order, bar: &Bar, position: f64) -> Option<(i32, f64, f64)> {
        let direction = order.direction.unwrap_or_default().signum();
        let size = order.size.unwrap_or_default();
        match order.order_type {
            OrderType::Market => Some((
                direction,
                size,
                apply_slippage(bar.close, direction, self.config.slippage_pct),
            )),
            OrderType::Limit => {
                let limit = order.limit_price?;
                let touched = if direction > 0 {
                    bar.low <= limit
                } else {
                    bar.high >= limit
                };
                touched.then_some((direction, size, limit))
            }
            OrderType::StopLimit => {
                let stop = order.stop_price?;
                let limit = order.limit_price.unwrap_or(stop);
                let triggered = if direction > 0 {
                    bar.high >= stop && bar.low <= limit
                } else {
                    bar.low <= stop && bar.high >= limit
                };
                triggered.then_some((direction, size, limit))
            }
            OrderType::Close | OrderType::Reduce if position != 0.0 => {
                let direction = -(position.signum() as i32);
                let size = match order.order_type {
                    OrderType::Reduce => size.min(position.abs()),
                    _ => position.abs(),
                };
                Some((
                    direction,
                    size,
                    apply_slippage(bar.close, direction, self.config.slippage_pct),
                ))
            }
            _ => None,
        }
    }
}

impl BrokerPort for PaperBroker {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn initialise_data(
        &self,
        instrument: &str,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
        granularity: &str,
    ) -> Result<(), BotError> {
        let series = self.data.fetch_bars(instrument, granularity, start, end)?;
        debug!(
            "{}: loaded {} {granularity} bars for {instrument}",
            self.config.name,
            series.len()
        );
        self.lock()?.candles.insert(instrument.to_string(), series);
        Ok(())
    }

    fn get_precision(&self, instrument: &str) -> Result<Precision, BotError> {
        if !self.tradeable(instrument) {
            return Err(self.venue_error(instrument, "instrument not traded on this venue"));
        }
        Ok(self.config.precision)
    }

    fn get_orderbook(&self, instrument: &str) -> Result<TopOfBook, BotError> {
        let state = self.lock()?;
        let bar = state
            .current_bar(instrument, self.indexing)
            .ok_or_else(|| self.venue_error(instrument, "no price data"))?;
        let half_spread = self.config.spread / 2.0;
        Ok(TopOfBook {
            bid: bar.close - half_spread,
            ask: bar.close + half_spread,
        })
    }

    fn get_candles(&self, instrument: &str) -> Result<TimeSeries, BotError> {
        self.lock()?
            .candles
            .get(instrument)
            .cloned()
            .ok_or_else(|| self.venue_error(instrument, "no candles loaded"))
    }

    fn place_order(&self, order: &Order) -> Result<(), BotError> {
        let instrument = order.instrument_name();
        if !self.tradeable(instrument) {
            return Err(self.venue_error(instrument, "instrument not traded on this venue"));
        }
        match order.order_type {
            OrderType::Cancel => {
                self.lock()?
                    .pending
                    .retain(|pending| pending.instrument_name() != instrument);
                return Ok(());
            }
            OrderType::Modify | OrderType::Other(_) => {
                return Err(self.venue_error(
                    instrument,
                    format!("{} orders are not supported", order.order_type),
                ));
            }
            _ => {}
        }
        if order.order_type.requires_direction() && !order.size.is_some_and(|s| s > 0.0) {
            return Err(self.venue_error(instrument, "order size must be positive"));
        }
        self.lock()?.pending.push(order.clone());
        Ok(())
    }

    fn update_positions(&self, instrument: &str, timestamp: NaiveDateTime) -> Result<(), BotError> {
        let mut state = self.lock()?;
        state.clock.insert(instrument.to_string(), timestamp);
        let Some(bar) = state.current_bar(instrument, self.indexing).cloned() else {
            return Ok(());
        };

        let (due, waiting): (Vec<Order>, Vec<Order>) = std::mem::take(&mut state.pending)
            .into_iter()
            .partition(|order| order.instrument_name() == instrument);
        state.pending = waiting;

        for order in due {
            let position = state.positions.get(instrument).copied().unwrap_or_default();
            let Some((direction, size, price)) = self.fill_terms(&order, &bar, position) else {
                if matches!(order.order_type, OrderType::Limit | OrderType::StopLimit) {
                    state.pending.push(order);
                } else {
                    warn!(
                        "{}: {} order for {instrument} had nothing to act on",
                        self.config.name, order.order_type
                    );
                }
                continue;
            };

            let value = size * price;
            let commission = calculate_commission(value, self.config.commission_pct);
            state.cash -= direction as f64 * value + commission;
            *state.positions.entry(instrument.to_string()).or_default() +=
                direction as f64 * size;
            state.fills.push(Fill {
                timestamp,
                instrument: instrument.to_string(),
                exchange: self.config.name.clone(),
                order_type: order.order_type.to_string(),
                direction,
                size,
                price,
                commission,
            });
        }
        Ok(())
    }

    fn fill_history(&self) -> Vec<Fill> {
        self.lock()
            .map(|state| state.fills.clone())
            .unwrap_or_default()
    }
}
