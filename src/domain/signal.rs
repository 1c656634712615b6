//! Decision payloads a strategy may return for a tick.

use std::collections::BTreeMap;

use super::order::{Order, OrderRecord};

/// One element of a strategy payload.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderEntry {
    Record(OrderRecord),
    Order(Order),
}

impl From<Order> for OrderEntry {
    fn from(order: Order) -> Self {
        OrderEntry::Order(order)
    }
}

impl From<OrderRecord> for OrderEntry {
    fn from(record: OrderRecord) -> Self {
        OrderEntry::Record(record)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Signal {
    #[default]
    Empty,
    Single(OrderEntry),
    /// Key order carries no meaning.
    Named(BTreeMap<String, OrderEntry>),
    List(Vec<OrderEntry>),
}

impl Signal {
    pub fn order(order: Order) -> Self {
        Signal::Single(OrderEntry::Order(order))
    }

    pub fn record(record: OrderRecord) -> Self {
        Signal::Single(OrderEntry::Record(record))
    }

    pub fn list<I, E>(entries: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<OrderEntry>,
    {
        Signal::List(entries.into_iter().map(Into::into).collect())
    }

    pub fn len(&self) -> usize {
        match self {
            Signal::Empty => 0,
            Signal::Single(_) => 1,
            Signal::Named(map) => map.len(),
            Signal::List(entries) => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries in payload order (key order for named payloads).
    pub fn into_entries(self) -> Vec<OrderEntry> {
        match self {
            Signal::Empty => Vec::new(),
            Signal::Single(entry) => vec![entry],
            Signal::Named(map) => map.into_values().collect(),
            Signal::List(entries) => entries,
        }
    }
}

impl From<Order> for Signal {
    fn from(order: Order) -> Self {
        Signal::order(order)
    }
}

impl From<Vec<Order>> for Signal {
    fn from(orders: Vec<Order>) -> Self {
        Signal::list(orders)
    }
}

impl From<Option<Order>> for Signal {
    fn from(order: Option<Order>) -> Self {
        order.map(Signal::order).unwrap_or_default()
    }
}
