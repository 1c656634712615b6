//! Turns whatever a strategy returned into canonical, decorated orders.
//!
//! Three passes, each building a fresh sequence:
//! 1. convert every payload entry into an [`Order`] (a record without an order
//!    type fails the whole batch)
//! 2. decorate with the session defaults
//! 3. drop directional orders that have no direction, then resolve exchanges

use log::debug;

use super::error::BotError;
use super::order::{Order, Sizing};
use super::router::BrokerRouter;
use super::signal::{OrderEntry, Signal};
use super::tick::{DropReason, DroppedOrder};

/// Metadata stamped onto every order a session produces.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDefaults {
    /// Fallback instrument. `None` for portfolio sessions, whose orders must
    /// name their instrument.
    pub instrument: Option<String>,
    pub strategy_name: String,
    pub granularity: String,
    pub sizing: Option<Sizing>,
    pub risk_pc: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Normalized {
    pub orders: Vec<Order>,
    pub dropped: Vec<DroppedOrder>,
}

pub fn normalize(
    signal: Signal,
    defaults: &OrderDefaults,
    router: &BrokerRouter,
) -> Result<Normalized, BotError> {
    let orders = signal
        .into_entries()
        .into_iter()
        .map(|entry| match entry {
            OrderEntry::Order(order) => Ok(order),
            OrderEntry::Record(record) => Order::try_from(record),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let orders = orders
        .into_iter()
        .map(|order| decorate(order, defaults))
        .collect::<Result<Vec<_>, _>>()?;

    let (orders, dropped): (Vec<Order>, Vec<Order>) = orders
        .into_iter()
        .partition(|o| !o.order_type.requires_direction() || o.has_direction());
    let dropped = dropped
        .into_iter()
        .map(|order| {
            debug!(
                "dropping {} {} order without direction",
                order.instrument_name(),
                order.order_type
            );
            DroppedOrder {
                order,
                reason: DropReason::MissingDirection,
            }
        })
        .collect();

    let orders = orders
        .into_iter()
        .map(|mut order| {
            order.exchange = Some(router.resolve_exchange(order.exchange.as_deref())?);
            Ok(order)
        })
        .collect::<Result<Vec<_>, BotError>>()?;

    Ok(Normalized { orders, dropped })
}

fn decorate(mut order: Order, defaults: &OrderDefaults) -> Result<Order, BotError> {
    if order.instrument.as_deref().is_none_or(str::is_empty) {
        order.instrument = Some(defaults.instrument.clone().ok_or_else(|| {
            BotError::validation(format!(
                "{} order names no instrument and the session trades a portfolio",
                order.order_type
            ))
        })?);
    }
    order.strategy = Some(defaults.strategy_name.clone());
    order.granularity = Some(defaults.granularity.clone());
    if order.sizing.is_none() {
        order.sizing = defaults.sizing.clone();
    }
    if order.risk_pc.is_none() {
        order.risk_pc = defaults.risk_pc;
    }
    Ok(order)
}
