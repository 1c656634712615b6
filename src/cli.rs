//! CLI definition and dispatch.

use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use log::{info, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use crate::adapters::csv_adapter::{CsvBarStore, CsvDataStream};
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::log_notifier::LogNotifier;
use crate::adapters::paper_broker::PaperBroker;
use crate::domain::bot::Bot;
use crate::domain::config::{SessionConfig, TradingMode};
use crate::domain::error::BotError;
use crate::domain::registry::StrategyRegistry;
use crate::domain::results::TradeResults;
use crate::domain::router::BrokerRouter;
use crate::ports::broker_port::BrokerPort;
use crate::ports::data_port::DataPort;
use crate::ports::data_stream_port::DataStreamPort;
use crate::ports::notifier_port::NotifierPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "tickbot", about = "Per-instrument trading session driver")]
pub struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest or paper session over the bars in the data directory
    Run {
        #[arg(short, long)]
        config: PathBuf,
        /// Report qualified orders instead of submitting them
        #[arg(long)]
        scan: bool,
        /// Write fills to this CSV file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a session configuration
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Run {
            config,
            scan,
            output,
        } => run_session(&config, scan, output.as_ref()),
        Command::Validate { config } => run_validate(&config),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(fail)
}

fn fail(err: BotError) -> ExitCode {
    eprintln!("error: {err}");
    (&err).into()
}

/// Load and validate the session, including the strategy class.
pub fn load_session(
    path: &PathBuf,
    registry: &StrategyRegistry,
) -> Result<SessionConfig, ExitCode> {
    let adapter = load_config(path)?;
    let session = SessionConfig::from_port(&adapter).map_err(fail)?;
    if !registry.contains(&session.strategy.class) {
        let known: Vec<&str> = registry.classes().collect();
        return Err(fail(BotError::ConfigInvalid {
            section: "strategy".into(),
            key: "class".into(),
            reason: format!(
                "unknown strategy class '{}' (known: {})",
                session.strategy.class,
                known.join(", ")
            ),
        }));
    }
    Ok(session)
}

fn run_validate(config_path: &PathBuf) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let session = match load_session(config_path, &StrategyRegistry::with_builtins()) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let strategy = &session.strategy;
    eprintln!("\nSession:");
    eprintln!("  Mode:        {}", session.mode);
    eprintln!("  Scan:        {}", session.scan);
    eprintln!("  Indexing:    {}", session.indexing);
    eprintln!("  Data dir:    {}", session.data_dir.display());
    eprintln!("\nStrategy:");
    eprintln!("  Name:        {} ({})", strategy.name, strategy.class);
    eprintln!("  Instruments: {}", strategy.instruments.join(", "));
    eprintln!("  Interval:    {}", strategy.interval);
    eprintln!("  Period:      {}", strategy.period);
    let store = CsvBarStore::new(session.data_dir.clone());
    let granularity = strategy.primary_granularity();
    match store.list_instruments(granularity) {
        Ok(available) => {
            for instrument in &strategy.instruments {
                if !available.contains(instrument) {
                    eprintln!("  warning: no {granularity} bars for {instrument} in data dir");
                }
            }
        }
        Err(e) => eprintln!("  warning: cannot read data dir: {e}"),
    }
    eprintln!("\nVenues:");
    for venue in &session.venues {
        let instruments = if venue.instruments.is_empty() {
            "all".to_string()
        } else {
            venue.instruments.join(", ")
        };
        eprintln!("  {}: {instruments}", venue.name);
    }
    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

/// One paper venue per configured venue, sharing the bar store.
pub fn build_venues(
    session: &SessionConfig,
    data: Arc<dyn DataPort>,
) -> BTreeMap<String, Arc<dyn BrokerPort>> {
    session
        .venues
        .iter()
        .map(|venue| {
            let broker: Arc<dyn BrokerPort> =
                Arc::new(PaperBroker::new(venue.clone(), session.indexing, Arc::clone(&data)));
            (venue.name.clone(), broker)
        })
        .collect()
}

/// Router for a bot trading `instruments`. Venues without an instrument
/// list trade every strategy instrument.
pub fn build_router(
    session: &SessionConfig,
    venues: &BTreeMap<String, Arc<dyn BrokerPort>>,
    instruments: &[String],
) -> Result<BrokerRouter, BotError> {
    let tradeable: BTreeMap<String, Vec<String>> = session
        .venues
        .iter()
        .map(|venue| {
            let listed = if venue.instruments.is_empty() {
                &session.strategy.instruments
            } else {
                &venue.instruments
            };
            let own = listed
                .iter()
                .filter(|i| instruments.contains(i))
                .cloned()
                .collect();
            (venue.name.clone(), own)
        })
        .collect();

    if session.is_multi_venue() {
        return BrokerRouter::multi(venues.clone(), &tradeable);
    }
    let (name, venue) = venues
        .iter()
        .next()
        .ok_or_else(|| BotError::config("session has no venues"))?;
    let routed = tradeable.get(name).cloned().unwrap_or_default();
    Ok(BrokerRouter::single(name, Arc::clone(venue), &routed))
}

/// Every bar timestamp of every strategy instrument at the primary
/// granularity, in order.
pub fn build_timeline(
    session: &SessionConfig,
    data: &dyn DataPort,
) -> Result<Vec<NaiveDateTime>, BotError> {
    let granularity = session.strategy.primary_granularity();
    let mut timeline = BTreeSet::new();
    for instrument in &session.strategy.instruments {
        let series = data.fetch_bars(
            instrument,
            granularity,
            session.data_start,
            session.data_end,
        )?;
        timeline.extend(series.timestamps());
    }
    Ok(timeline.into_iter().collect())
}

/// One bot per instrument, or a single bot for a portfolio strategy.
pub fn build_bots(
    session: Arc<SessionConfig>,
    registry: &StrategyRegistry,
    store: Arc<CsvBarStore>,
    venues: &BTreeMap<String, Arc<dyn BrokerPort>>,
) -> Result<Vec<Bot>, BotError> {
    let strategy = &session.strategy;
    let labels: Vec<(String, Vec<String>)> = if strategy.portfolio {
        vec![("portfolio".to_string(), strategy.instruments.clone())]
    } else {
        strategy
            .instruments
            .iter()
            .map(|instrument| (instrument.clone(), vec![instrument.clone()]))
            .collect()
    };

    let notifier: Option<Arc<dyn NotifierPort>> = (session.notify > 0)
        .then(|| Arc::new(LogNotifier::new("[tickbot] ")) as Arc<dyn NotifierPort>);

    let mut bots = Vec::with_capacity(labels.len());
    for (label, instruments) in labels {
        let router = build_router(&session, venues, &instruments)?;
        let stream: Option<Box<dyn DataStreamPort>> = session.feed.is_live().then(|| {
            Box::new(CsvDataStream::new(
                Arc::clone(&store),
                instruments,
                strategy.granularities(),
                session.data_start,
                session.data_end,
            )) as Box<dyn DataStreamPort>
        });
        let bot = Bot::new(
            &label,
            Arc::clone(&session),
            router,
            registry.build(strategy, &label)?,
            stream,
            notifier.clone(),
        )?;
        bots.push(bot);
    }
    Ok(bots)
}

/// Drive every bot over `timeline`. A failing tick stops the session.
pub fn run_timeline(bots: &mut [Bot], timeline: &[NaiveDateTime]) -> Result<usize, BotError> {
    let mut submitted = 0;
    for &timestamp in timeline {
        for bot in bots.iter_mut() {
            let report = bot.tick(timestamp)?;
            submitted += report.submitted.len();
        }
    }
    Ok(submitted)
}

/// Drive every bot over `timeline` and collect their results. Every bot is
/// shut down afterwards, including when the session failed.
pub fn run_to_completion(
    bots: &mut [Bot],
    timeline: &[NaiveDateTime],
) -> Result<(usize, Vec<TradeResults>), BotError> {
    let outcome = run_timeline(bots, timeline).and_then(|submitted| {
        let results = bots
            .iter_mut()
            .map(|bot| bot.create_trade_results().cloned())
            .collect::<Result<Vec<_>, _>>()?;
        Ok((submitted, results))
    });
    for bot in bots.iter_mut() {
        if let Err(e) = bot.shutdown() {
            warn!("Shutdown of {} failed: {e}", bot.instrument());
        }
    }
    outcome
}

fn run_session(config_path: &PathBuf, scan: bool, output_path: Option<&PathBuf>) -> ExitCode {
    // Stage 1: Load and validate config
    eprintln!("Loading config from {}", config_path.display());
    let registry = StrategyRegistry::with_builtins();
    let mut session = match load_session(config_path, &registry) {
        Ok(s) => s,
        Err(code) => return code,
    };
    if session.mode == TradingMode::Live {
        return fail(BotError::ConfigInvalid {
            section: "session".into(),
            key: "mode".into(),
            reason: "live sessions need a venue adapter; run backtest or paper".into(),
        });
    }
    session.scan |= scan;
    let session = Arc::new(session);

    // Stage 2: Venues and timeline
    let store = Arc::new(CsvBarStore::new(session.data_dir.clone()));
    let data: Arc<dyn DataPort> = store.clone();
    let venues = build_venues(&session, Arc::clone(&data));
    let timeline = match build_timeline(&session, &*data) {
        Ok(t) => t,
        Err(e) => return fail(e),
    };
    if timeline.is_empty() {
        return fail(BotError::DataUnavailable {
            instrument: session.strategy.instruments.join(","),
        });
    }

    // Stage 3: Bots
    let mut bots = match build_bots(Arc::clone(&session), &registry, store, &venues) {
        Ok(b) => b,
        Err(e) => return fail(e),
    };
    eprintln!(
        "Running {} ({} mode) for {} bot(s) over {} bars",
        session.strategy.name,
        session.mode,
        bots.len(),
        timeline.len()
    );
    info!("Session started at {}", timeline[0]);

    // Stage 4: Drive the session, then collect results and shut down
    let (submitted, results) = match run_to_completion(&mut bots, &timeline) {
        Ok(outcome) => outcome,
        Err(e) => return fail(e),
    };

    eprintln!("\n=== Session Results ===");
    eprintln!("Orders Submitted: {submitted}");
    for result in &results {
        let fills = || result.fills.values().flatten();
        let commission: f64 = fills().map(|fill| fill.commission).sum();
        let turnover: f64 = fills().map(|fill| fill.notional()).sum();
        eprintln!(
            "{:<16} fills: {:<5} turnover: {turnover:.2} commission: {commission:.2}",
            result.instrument,
            result.fill_count()
        );
    }

    // Stage 5: Report
    if let Some(path) = output_path {
        let path = path.display().to_string();
        if let Err(e) = CsvReportAdapter.write_all(&results, &path) {
            return fail(e);
        }
        eprintln!("Fills written to {path}");
    }

    ExitCode::SUCCESS
}
