//! Port traits for the collaborators a trading session talks to.

pub mod broker_port;
pub mod config_port;
pub mod data_port;
pub mod data_stream_port;
pub mod notifier_port;
pub mod report_port;
pub mod strategy_port;
