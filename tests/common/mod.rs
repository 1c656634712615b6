#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::thread::{self, ThreadId};
use tickbot::adapters::file_config_adapter::FileConfigAdapter;
use tickbot::domain::bar::{Bar, TimeSeries};
use tickbot::domain::config::SessionConfig;
use tickbot::domain::data::{StrategyData, StreamSnapshot};
use tickbot::domain::error::BotError;
use tickbot::domain::order::{Order, Precision, TopOfBook};
use tickbot::domain::results::Fill;
use tickbot::domain::signal::Signal;
use tickbot::ports::broker_port::BrokerPort;
use tickbot::ports::data_stream_port::DataStreamPort;
use tickbot::ports::notifier_port::NotifierPort;
use tickbot::ports::strategy_port::StrategyPort;

pub fn at(hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 5)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + Duration::hours(hour as i64)
}

pub fn bar(hour: u32, close: f64) -> Bar {
    Bar {
        timestamp: at(hour),
        open: close,
        high: close + 0.5,
        low: close - 0.5,
        close,
        volume: 100.0,
    }
}

/// Hourly bars starting at hour 0.
pub fn series(closes: &[f64]) -> TimeSeries {
    TimeSeries::new(
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| bar(i as u32, close))
            .collect(),
    )
}

/// Session from INI text. `session` lines go into `[session]`; the strategy
/// trades EURUSD hourly unless `strategy` overrides it.
pub fn session_with(session: &str, strategy: &str, extra: &str) -> Arc<SessionConfig> {
    let strategy = if strategy.is_empty() {
        "instrument = EURUSD"
    } else {
        strategy
    };
    let ini = format!(
        "[session]\n{session}\n\n[strategy]\nname = scripted\ninterval = 1h\n{strategy}\n\n{extra}\n"
    );
    let adapter = FileConfigAdapter::from_string(&ini).unwrap();
    Arc::new(SessionConfig::from_port(&adapter).unwrap())
}

pub fn session(session: &str) -> Arc<SessionConfig> {
    session_with(session, "", "")
}

/// Venue that records what it is asked to do.
pub struct RecordingBroker {
    pub name: String,
    pub precision: Precision,
    pub book: TopOfBook,
    pub candles: TimeSeries,
    /// Orders of this size are rejected.
    pub reject_size: Option<f64>,
    /// Orders of this size hang for the given time before being accepted.
    pub stall: Option<(f64, std::time::Duration)>,
    pub placed: Mutex<Vec<Order>>,
    pub updates: Mutex<Vec<(String, NaiveDateTime)>>,
    pub initialised: Mutex<Vec<String>>,
    pub fills: Vec<Fill>,
}

impl RecordingBroker {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            precision: Precision { size: 2, price: 4 },
            book: TopOfBook {
                bid: 1.09995,
                ask: 1.10005,
            },
            candles: TimeSeries::default(),
            reject_size: None,
            stall: None,
            placed: Mutex::new(Vec::new()),
            updates: Mutex::new(Vec::new()),
            initialised: Mutex::new(Vec::new()),
            fills: Vec::new(),
        }
    }

    pub fn rejecting(mut self, size: f64) -> Self {
        self.reject_size = Some(size);
        self
    }

    pub fn stalling(mut self, size: f64, delay: std::time::Duration) -> Self {
        self.stall = Some((size, delay));
        self
    }

    pub fn with_fills(mut self, fills: Vec<Fill>) -> Self {
        self.fills = fills;
        self
    }

    pub fn with_candles(mut self, candles: TimeSeries) -> Self {
        self.candles = candles;
        self
    }

    pub fn placed(&self) -> Vec<Order> {
        self.placed.lock().unwrap().clone()
    }

    pub fn update_count(&self) -> usize {
        self.updates.lock().unwrap().len()
    }
}

impl BrokerPort for RecordingBroker {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialise_data(
        &self,
        instrument: &str,
        _start: Option<NaiveDateTime>,
        _end: Option<NaiveDateTime>,
        _granularity: &str,
    ) -> Result<(), BotError> {
        self.initialised.lock().unwrap().push(instrument.to_string());
        Ok(())
    }

    fn get_precision(&self, _instrument: &str) -> Result<Precision, BotError> {
        Ok(self.precision)
    }

    fn get_orderbook(&self, _instrument: &str) -> Result<TopOfBook, BotError> {
        Ok(self.book)
    }

    fn get_candles(&self, _instrument: &str) -> Result<TimeSeries, BotError> {
        Ok(self.candles.clone())
    }

    fn place_order(&self, order: &Order) -> Result<(), BotError> {
        if let Some((size, delay)) = self.stall {
            if order.size == Some(size) {
                thread::sleep(delay);
            }
        }
        if self.reject_size.is_some() && order.size == self.reject_size {
            return Err(BotError::Venue {
                venue: self.name.clone(),
                instrument: order.instrument_name().to_string(),
                reason: "rejected".into(),
            });
        }
        self.placed.lock().unwrap().push(order.clone());
        Ok(())
    }

    fn update_positions(&self, instrument: &str, timestamp: NaiveDateTime) -> Result<(), BotError> {
        self.updates
            .lock()
            .unwrap()
            .push((instrument.to_string(), timestamp));
        Ok(())
    }

    fn fill_history(&self) -> Vec<Fill> {
        self.fills.clone()
    }
}

/// Returns queued signals in turn, then empty signals. Records the data it
/// was handed.
pub struct ScriptedStrategy {
    signals: VecDeque<Signal>,
    fail: bool,
    pub calls: Arc<AtomicUsize>,
    pub seen: Arc<Mutex<Vec<Option<TimeSeries>>>>,
    pub shutdowns: Arc<AtomicUsize>,
}

impl ScriptedStrategy {
    pub fn new(signals: Vec<Signal>) -> Self {
        Self {
            signals: signals.into(),
            fail: false,
            calls: Arc::new(AtomicUsize::new(0)),
            seen: Arc::new(Mutex::new(Vec::new())),
            shutdowns: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn silent() -> Self {
        Self::new(Vec::new())
    }

    /// Errors on every signal request.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::silent()
        }
    }
}

impl StrategyPort for ScriptedStrategy {
    fn generate_signal(
        &mut self,
        _timestamp: NaiveDateTime,
        data: Option<&StrategyData>,
    ) -> Result<Signal, BotError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(BotError::Strategy {
                name: "scripted".into(),
                reason: "no signal today".into(),
            });
        }
        self.seen
            .lock()
            .unwrap()
            .push(data.and_then(StrategyData::primary).cloned());
        Ok(self.signals.pop_front().unwrap_or_default())
    }

    fn shutdown(&mut self) -> Result<(), BotError> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Serves the same snapshot on every refresh. Current bars are the last bar
/// of whatever series the gate hands back.
pub struct StaticStream {
    pub instrument: String,
    pub snapshot: StreamSnapshot,
    pub refreshes: Arc<AtomicUsize>,
}

impl StaticStream {
    pub fn new(instrument: &str, data: TimeSeries) -> Self {
        Self {
            instrument: instrument.to_string(),
            snapshot: StreamSnapshot {
                data,
                ..Default::default()
            },
            refreshes: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl DataStreamPort for StaticStream {
    fn refresh(&mut self, _timestamp: NaiveDateTime) -> Result<StreamSnapshot, BotError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(self.snapshot.clone())
    }

    fn get_trading_bars(
        &self,
        data: &TimeSeries,
        _quote_bars: bool,
        _timestamp: NaiveDateTime,
        _context: Option<&StrategyData>,
    ) -> Result<HashMap<String, Bar>, BotError> {
        Ok(data
            .last()
            .map(|bar| HashMap::from([(self.instrument.clone(), bar.clone())]))
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub orders: Mutex<Vec<String>>,
    pub messages: Mutex<Vec<String>>,
}

impl NotifierPort for RecordingNotifier {
    fn send_order(&self, order: &Order) -> Result<(), BotError> {
        self.orders.lock().unwrap().push(order.to_string());
        Ok(())
    }

    fn send_message(&self, message: &str) -> Result<(), BotError> {
        self.messages.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

/// Log records tagged with the thread that emitted them, so parallel tests
/// only see their own lines.
struct CaptureLogger {
    lines: Mutex<Vec<(ThreadId, Level, String)>>,
}

impl Log for CaptureLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push((thread::current().id(), record.level(), record.args().to_string()));
        }
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger {
    lines: Mutex::new(Vec::new()),
};

/// Route log output into memory for the rest of the test binary.
pub fn capture_logs() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        if log::set_logger(&LOGGER).is_ok() {
            log::set_max_level(LevelFilter::Trace);
        }
    });
}

/// Lines logged at `level` by the calling thread.
pub fn logged(level: Level) -> Vec<String> {
    let me = thread::current().id();
    LOGGER
        .lines
        .lock()
        .unwrap()
        .iter()
        .filter(|(thread, lvl, _)| *thread == me && *lvl == level)
        .map(|(_, _, line)| line.clone())
        .collect()
}
