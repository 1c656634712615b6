//! The trading session driver.
//!
//! A [`Bot`] binds one strategy to its venues and runs one update cycle per
//! tick. Ticks are driven by an external scheduler through [`Bot::tick`],
//! which gates the data before handing over to [`Bot::update`].

use chrono::NaiveDateTime;
use log::{debug, error, info, warn};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::bar::{Bar, TimeSeries};
use super::config::{SessionConfig, TradingMode};
use super::data::{StrategyData, StreamSnapshot};
use super::error::BotError;
use super::gate::{DataIntegrityGate, GateOutput, LastBarCache};
use super::guard::VenueGuard;
use super::normalizer::{self, OrderDefaults};
use super::order::Order;
use super::qualifier;
use super::results::TradeResults;
use super::router::BrokerRouter;
use super::signal::Signal;
use super::tick::{DropReason, DroppedOrder, SkipReason, TickReport};
use crate::ports::broker_port::BrokerPort;
use crate::ports::data_stream_port::DataStreamPort;
use crate::ports::notifier_port::NotifierPort;
use crate::ports::strategy_port::StrategyPort;

/// Phases of one update cycle, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickPhase {
    /// Bring simulated venues up to the tick timestamp.
    AdvanceSimulation,
    GenerateSignal,
    Normalize,
    Qualify,
    Dispatch,
    /// Paper trading only: let simulated venues act on the new orders.
    AdvancePostDispatch,
    Report,
}

impl TickPhase {
    pub fn first(mode: TradingMode) -> Self {
        if mode.is_simulated() {
            TickPhase::AdvanceSimulation
        } else {
            TickPhase::GenerateSignal
        }
    }

    /// The phase after `self`, or `None` once the report is done.
    pub fn next(self, mode: TradingMode, scan: bool) -> Option<Self> {
        match self {
            TickPhase::AdvanceSimulation => Some(TickPhase::GenerateSignal),
            TickPhase::GenerateSignal => Some(TickPhase::Normalize),
            TickPhase::Normalize => Some(TickPhase::Qualify),
            TickPhase::Qualify if scan => TickPhase::Dispatch.next(mode, scan),
            TickPhase::Qualify => Some(TickPhase::Dispatch),
            TickPhase::Dispatch if mode == TradingMode::Paper => {
                Some(TickPhase::AdvancePostDispatch)
            }
            TickPhase::Dispatch | TickPhase::AdvancePostDispatch => Some(TickPhase::Report),
            TickPhase::Report => None,
        }
    }

    pub fn sequence(mode: TradingMode, scan: bool) -> Vec<Self> {
        std::iter::successors(Some(Self::first(mode)), |phase| phase.next(mode, scan)).collect()
    }
}

/// How qualified orders reach their venue.
pub trait ExecutionMethod: Send {
    fn submit(
        &self,
        venue: &Arc<dyn BrokerPort>,
        order: &Order,
        timestamp: NaiveDateTime,
        guard: &VenueGuard,
    ) -> Result<(), BotError>;
}

/// Places the order on its venue as is.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectSubmission;

impl ExecutionMethod for DirectSubmission {
    fn submit(
        &self,
        venue: &Arc<dyn BrokerPort>,
        order: &Order,
        _timestamp: NaiveDateTime,
        guard: &VenueGuard,
    ) -> Result<(), BotError> {
        let order = order.clone();
        guard.call(venue, "place_order", move |v| v.place_order(&order))
    }
}

/// Closures run under the venue deadline like direct submission does, so
/// they must be cheap to clone onto the venue worker.
impl<F> ExecutionMethod for F
where
    F: Fn(&Arc<dyn BrokerPort>, &Order, NaiveDateTime) -> Result<(), BotError>
        + Clone
        + Send
        + 'static,
{
    fn submit(
        &self,
        venue: &Arc<dyn BrokerPort>,
        order: &Order,
        timestamp: NaiveDateTime,
        guard: &VenueGuard,
    ) -> Result<(), BotError> {
        let method = self.clone();
        let order = order.clone();
        guard.call(venue, "place_order", move |v| method(v, &order, timestamp))
    }
}

/// The "order placed" log line.
pub fn placed_message(timestamp: NaiveDateTime, order: &Order) -> String {
    format!(
        "{}: {} {} {} order of {} units placed.",
        timestamp.format("%b %d %Y %H:%M:%S"),
        order.instrument_name(),
        order.direction_label(),
        order.order_type,
        order.size.unwrap_or_default()
    )
}

pub struct Bot {
    instrument: String,
    session: Arc<SessionConfig>,
    router: BrokerRouter,
    strategy: Box<dyn StrategyPort>,
    stream: Option<Box<dyn DataStreamPort>>,
    notifier: Option<Arc<dyn NotifierPort>>,
    execution: Box<dyn ExecutionMethod>,
    defaults: OrderDefaults,
    gate: DataIntegrityGate,
    guard: VenueGuard,
    last_bars: LastBarCache,
    snapshot: Option<StreamSnapshot>,
    trade_results: Option<TradeResults>,
}

impl Bot {
    /// Bind `strategy` to the venues in `router` and load venue data for the
    /// instruments this bot trades. For portfolio sessions `instrument` is
    /// only a label.
    pub fn new(
        instrument: &str,
        session: Arc<SessionConfig>,
        router: BrokerRouter,
        strategy: Box<dyn StrategyPort>,
        stream: Option<Box<dyn DataStreamPort>>,
        notifier: Option<Arc<dyn NotifierPort>>,
    ) -> Result<Self, BotError> {
        let params = &session.strategy;
        let defaults = OrderDefaults {
            instrument: (!params.portfolio).then(|| instrument.to_string()),
            strategy_name: strategy
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| params.name.clone()),
            granularity: params.interval.clone(),
            sizing: params.sizing.clone(),
            risk_pc: params.risk_pc,
        };

        let gate = DataIntegrityGate::new(session.indexing, params.period);
        let guard = VenueGuard::new(session.venue_timeout);

        let bot = Self {
            instrument: instrument.to_string(),
            gate,
            guard,
            session,
            router,
            strategy,
            stream,
            notifier,
            execution: Box::new(DirectSubmission),
            defaults,
            last_bars: LastBarCache::new(),
            snapshot: None,
            trade_results: None,
        };
        bot.initialise_venues()?;
        Ok(bot)
    }

    pub fn with_execution_method(mut self, method: impl ExecutionMethod + 'static) -> Self {
        self.execution = Box::new(method);
        self
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn session(&self) -> &SessionConfig {
        &self.session
    }

    pub fn router(&self) -> &BrokerRouter {
        &self.router
    }

    pub fn last_bars(&self) -> Option<&HashMap<String, Bar>> {
        self.last_bars.last()
    }

    pub fn trade_results(&self) -> Option<&TradeResults> {
        self.trade_results.as_ref()
    }

    fn traded_instruments(&self) -> Vec<String> {
        if self.session.strategy.portfolio {
            self.session.strategy.instruments.clone()
        } else {
            vec![self.instrument.clone()]
        }
    }

    fn initialise_venues(&self) -> Result<(), BotError> {
        let granularity = self.session.strategy.primary_granularity().to_string();
        for instrument in self.traded_instruments() {
            for venue in self.router.resolve(&instrument)? {
                let (instrument, granularity) = (instrument.clone(), granularity.clone());
                let (start, end) = (self.session.data_start, self.session.data_end);
                self.guard.call(venue, "initialise_data", move |v| {
                    v.initialise_data(&instrument, start, end, &granularity)
                })?;
            }
        }
        Ok(())
    }

    /// Refresh the stream as the session mode requires and gate the result.
    /// `None` when no data stream is attached.
    pub fn check_data(&mut self, timestamp: NaiveDateTime) -> Result<Option<GateOutput>, BotError> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(None);
        };

        let check_for_future_data = self.session.is_backtest();
        let refresh =
            !check_for_future_data || self.session.dynamic_data || self.snapshot.is_none();
        if refresh {
            let snapshot = stream.refresh(timestamp)?;
            if self.session.feed.is_live() && snapshot.data.is_empty() {
                return Err(BotError::DataUnavailable {
                    instrument: self.instrument.clone(),
                });
            }
            self.snapshot = Some(snapshot);
        }

        let Some(snapshot) = self.snapshot.as_ref() else {
            return Ok(None);
        };
        self.gate
            .process(
                &snapshot.strategy_data(),
                snapshot.quote_data.as_ref(),
                timestamp,
                check_for_future_data,
                &**stream,
            )
            .map(Some)
    }

    /// Record `current_bars` and report whether they carry new data.
    pub fn check_last_bar(&mut self, current_bars: HashMap<String, Bar>) -> bool {
        let new_data = self
            .last_bars
            .check_new(current_bars, self.session.allow_duplicate_bars());
        if !new_data && !self.session.is_backtest() {
            warn!("Duplicate bar detected. Skipping.");
        }
        new_data
    }

    /// Gate the data for `timestamp`, then run the update cycle unless the
    /// data is insufficient or unchanged since the last tick.
    pub fn tick(&mut self, timestamp: NaiveDateTime) -> Result<TickReport, BotError> {
        let gated = self.check_data(timestamp)?;
        let (data, current_bars, sufficient) = match gated {
            Some(out) => (Some(out.data), out.current_bars, out.sufficient_data),
            None => (None, HashMap::new(), true),
        };

        let new_data = self.check_last_bar(current_bars);
        if !sufficient {
            debug!("{timestamp}: not enough data for {} yet", self.instrument);
            return Ok(TickReport::skipped(timestamp, SkipReason::InsufficientData));
        }
        if !new_data {
            return Ok(TickReport::skipped(timestamp, SkipReason::DuplicateBar));
        }
        self.update(timestamp, data.as_ref())
    }

    /// Run one update cycle at `timestamp` on already gated `data`.
    pub fn update(
        &mut self,
        timestamp: NaiveDateTime,
        data: Option<&StrategyData>,
    ) -> Result<TickReport, BotError> {
        let mode = self.session.mode;
        let scan = self.session.scan;
        let mut report = TickReport::new(timestamp);
        let mut signal = Signal::Empty;
        let mut orders = Vec::new();

        let mut phase = Some(TickPhase::first(mode));
        while let Some(current) = phase {
            debug!("{} {timestamp}: {current:?}", self.instrument);
            match current {
                TickPhase::AdvanceSimulation | TickPhase::AdvancePostDispatch => {
                    self.advance_simulation(timestamp)?;
                }
                TickPhase::GenerateSignal => {
                    signal = self.strategy.generate_signal(timestamp, data)?;
                }
                TickPhase::Normalize => {
                    let normalized = normalizer::normalize(
                        std::mem::take(&mut signal),
                        &self.defaults,
                        &self.router,
                    )?;
                    report.dropped.extend(normalized.dropped);
                    orders = normalized.orders;
                }
                TickPhase::Qualify => {
                    let qualified = qualifier::qualify(
                        std::mem::take(&mut orders),
                        &self.router,
                        self.session.feed.is_live(),
                        &self.guard,
                    );
                    report.dropped.extend(qualified.dropped);
                    report.qualified = qualified.orders;
                }
                TickPhase::Dispatch => self.dispatch(timestamp, &mut report),
                TickPhase::Report => self.report(&report),
            }
            phase = current.next(mode, scan);
        }
        Ok(report)
    }

    fn advance_simulation(&self, timestamp: NaiveDateTime) -> Result<(), BotError> {
        for (instrument, venue) in self.router.routes() {
            let instrument = instrument.to_string();
            self.guard.call(venue, "update_positions", move |v| {
                v.update_positions(&instrument, timestamp)
            })?;
        }
        Ok(())
    }

    /// Submit every qualified order; a failure drops only the order concerned.
    fn dispatch(&self, timestamp: NaiveDateTime, report: &mut TickReport) {
        for order in &report.qualified {
            let result = self
                .router
                .venue(order.exchange_name())
                .and_then(|venue| self.execution.submit(venue, order, timestamp, &self.guard));
            match result {
                Ok(()) => report.submitted.push(order.clone()),
                Err(e) => {
                    error!(
                        "exception when submitting {} order for {}: {e}",
                        order.order_type,
                        order.instrument_name()
                    );
                    report.dropped.push(DroppedOrder {
                        order: order.clone(),
                        reason: DropReason::Submission(e.to_string()),
                    });
                }
            }
        }
    }

    fn report(&self, report: &TickReport) {
        let timestamp = report.timestamp;
        if !report.submitted.is_empty() {
            for order in &report.submitted {
                info!("{}", placed_message(timestamp, order));
            }
        } else if report.dropped.is_empty() {
            debug!(
                "{}: No signal detected ({}).",
                timestamp.format("%b %d %Y %H:%M:%S"),
                self.instrument
            );
        } else {
            debug!(
                "{}: No orders placed ({}), {} dropped.",
                timestamp.format("%b %d %Y %H:%M:%S"),
                self.instrument,
                report.dropped.len()
            );
        }

        let notify = self.session.notify;
        if notify > 0 && !(self.session.is_backtest() || self.session.scan) {
            for order in &report.submitted {
                self.notify(|n| n.send_order(order));
            }
        }

        if self.session.scan {
            if self.session.verbosity > 0 || notify == 0 {
                if report.qualified.is_empty() {
                    info!("{}: No signal detected.", self.instrument);
                } else {
                    info!("Scan hits:");
                    for order in &report.qualified {
                        info!("{order}");
                    }
                }
            }
            if notify > 0 {
                for order in &report.qualified {
                    self.notify(|n| n.send_message(&format!("Scan hit: {order}")));
                }
            }
        }
    }

    fn notify<F>(&self, send: F)
    where
        F: FnOnce(&dyn NotifierPort) -> Result<(), BotError>,
    {
        if let Some(notifier) = &self.notifier {
            if let Err(e) = send(notifier.as_ref()) {
                warn!("notification for {} failed: {e}", self.instrument);
            }
        }
    }

    /// Price data to chart: the strategy's own when requested and available,
    /// otherwise the candles of the bot's primary venue.
    pub fn plot_data(&self, use_strategy_plot_data: bool) -> Result<TimeSeries, BotError> {
        if use_strategy_plot_data {
            if let Some(data) = self.strategy.plot_data() {
                return Ok(data);
            }
        }
        let instrument = self.candle_instrument();
        let venue = self
            .router
            .resolve(&instrument)?
            .first()
            .ok_or_else(|| BotError::config(format!("no venue routes instrument '{instrument}'")))?;
        self.guard
            .call(venue, "get_candles", move |v| v.get_candles(&instrument))
    }

    fn candle_instrument(&self) -> String {
        self.traded_instruments()
            .into_iter()
            .next()
            .unwrap_or_else(|| self.instrument.clone())
    }

    /// Collect fills for this bot's instruments from every venue, along with
    /// strategy indicators and price data.
    pub fn create_trade_results(&mut self) -> Result<&TradeResults, BotError> {
        let instruments = self.traded_instruments();
        let mut fills = BTreeMap::new();
        for (name, venue) in self.router.venues() {
            let history: Vec<_> = self
                .guard
                .call(venue, "fill_history", |v| Ok(v.fill_history()))?
                .into_iter()
                .filter(|fill| instruments.contains(&fill.instrument))
                .collect();
            fills.insert(name.to_string(), history);
        }

        let results = TradeResults {
            instrument: self.instrument.clone(),
            fills,
            indicators: self.strategy.indicators(),
            data: self.plot_data(false)?,
            interval: self.session.strategy.interval.clone(),
        };
        Ok(self.trade_results.insert(results))
    }

    /// Run the strategy's shutdown hook.
    pub fn shutdown(&mut self) -> Result<(), BotError> {
        debug!("shutting down {} bot", self.instrument);
        self.strategy.shutdown()
    }
}

impl std::fmt::Debug for Bot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bot")
            .field("instrument", &self.instrument)
            .field("mode", &self.session.mode)
            .field("scan", &self.session.scan)
            .finish_non_exhaustive()
    }
}
