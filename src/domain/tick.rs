//! Outcome of one update cycle.

use chrono::NaiveDateTime;
use std::fmt;

use super::order::Order;

#[derive(Debug, Clone, PartialEq)]
pub enum DropReason {
    /// Directional order type without a direction.
    MissingDirection,
    Qualification(String),
    Submission(String),
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::MissingDirection => f.write_str("no direction"),
            DropReason::Qualification(reason) => write!(f, "qualification failed: {reason}"),
            DropReason::Submission(reason) => write!(f, "submission failed: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DroppedOrder {
    pub order: Order,
    pub reason: DropReason,
}

/// Why a tick never asked the strategy for a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    InsufficientData,
    DuplicateBar,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub timestamp: NaiveDateTime,
    pub skipped: Option<SkipReason>,
    /// Orders that made it through qualification. In scan mode these are
    /// the scan hits and nothing is submitted.
    pub qualified: Vec<Order>,
    pub submitted: Vec<Order>,
    pub dropped: Vec<DroppedOrder>,
}

impl TickReport {
    pub fn new(timestamp: NaiveDateTime) -> Self {
        Self {
            timestamp,
            skipped: None,
            qualified: Vec::new(),
            submitted: Vec::new(),
            dropped: Vec::new(),
        }
    }

    pub fn skipped(timestamp: NaiveDateTime, reason: SkipReason) -> Self {
        Self {
            skipped: Some(reason),
            ..Self::new(timestamp)
        }
    }

    pub fn signal_generated(&self) -> bool {
        self.skipped.is_none()
    }
}
