//! Attaches venue precision and, with a live feed, top-of-book prices.

use log::error;

use super::error::BotError;
use super::guard::VenueGuard;
use super::order::Order;
use super::router::BrokerRouter;
use super::tick::{DropReason, DroppedOrder};

/// Price adjustment factor attached alongside book prices. Constant for now.
pub const PRICE_ADJUSTMENT: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Qualified {
    pub orders: Vec<Order>,
    pub dropped: Vec<DroppedOrder>,
}

/// Qualify each order against its venue. Failures drop only the order
/// concerned.
pub fn qualify(
    orders: Vec<Order>,
    router: &BrokerRouter,
    live_feed: bool,
    guard: &VenueGuard,
) -> Qualified {
    let mut qualified = Qualified::default();
    for mut order in orders {
        match qualify_order(&mut order, router, live_feed, guard) {
            Ok(()) => qualified.orders.push(order),
            Err(e) => {
                error!(
                    "exception when qualifying {} order for {} on {}: {e}",
                    order.order_type,
                    order.instrument_name(),
                    order.exchange_name()
                );
                qualified.dropped.push(DroppedOrder {
                    order,
                    reason: DropReason::Qualification(e.to_string()),
                });
            }
        }
    }
    qualified
}

fn qualify_order(
    order: &mut Order,
    router: &BrokerRouter,
    live_feed: bool,
    guard: &VenueGuard,
) -> Result<(), BotError> {
    let venue = router.venue(order.exchange_name())?;
    let instrument = order.instrument_name().to_string();

    let precision = {
        let instrument = instrument.clone();
        guard.call(venue, "get_precision", move |v| v.get_precision(&instrument))?
    };

    if live_feed {
        let book = guard.call(venue, "get_orderbook", move |v| v.get_orderbook(&instrument))?;
        let price = if order.is_short() { book.bid } else { book.ask };
        order.qualify(Some(price), Some(PRICE_ADJUSTMENT), precision);
    } else {
        // Priced at submission time by the venue.
        order.qualify(None, None, precision);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bar::TimeSeries;
    use crate::domain::order::{Precision, TopOfBook};
    use crate::ports::broker_port::BrokerPort;
    use chrono::NaiveDateTime;
    use std::sync::Arc;

    struct BookVenue;

    impl BrokerPort for BookVenue {
        fn name(&self) -> &str {
            "paper"
        }
        fn initialise_data(
            &self,
            _instrument: &str,
            _start: Option<NaiveDateTime>,
            _end: Option<NaiveDateTime>,
            _granularity: &str,
        ) -> Result<(), BotError> {
            Ok(())
        }
        fn get_precision(&self, instrument: &str) -> Result<Precision, BotError> {
            if instrument == "BROKEN" {
                return Err(BotError::Venue {
                    venue: "paper".into(),
                    instrument: instrument.into(),
                    reason: "unknown instrument".into(),
                });
            }
            Ok(Precision { size: 1, price: 4 })
        }
        fn get_orderbook(&self, _instrument: &str) -> Result<TopOfBook, BotError> {
            Ok(TopOfBook {
                bid: 1.0999,
                ask: 1.1001,
            })
        }
        fn get_candles(&self, _instrument: &str) -> Result<TimeSeries, BotError> {
            Ok(TimeSeries::default())
        }
        fn place_order(&self, _order: &Order) -> Result<(), BotError> {
            Ok(())
        }
    }

    fn router() -> BrokerRouter {
        BrokerRouter::single(
            "paper",
            Arc::new(BookVenue),
            &["EURUSD".to_string(), "BROKEN".to_string()],
        )
    }

    fn order(direction: i32, instrument: &str) -> Order {
        Order::market(direction, 10.04)
            .with_instrument(instrument)
            .with_exchange("paper")
    }

    #[test]
    fn long_takes_ask_short_takes_bid() {
        let q = qualify(
            vec![order(1, "EURUSD"), order(-1, "EURUSD")],
            &router(),
            true,
            &VenueGuard::unbounded(),
        );
        assert_eq!(q.orders[0].order_price, Some(1.1001));
        assert_eq!(q.orders[1].order_price, Some(1.0999));
        assert_eq!(q.orders[0].price_adjustment, Some(PRICE_ADJUSTMENT));
        assert_eq!(q.orders[0].size, Some(10.0));
        assert_eq!(q.orders[0].precision, Some(Precision { size: 1, price: 4 }));
    }

    #[test]
    fn without_live_feed_price_is_deferred() {
        let q = qualify(
            vec![order(1, "EURUSD")],
            &router(),
            false,
            &VenueGuard::unbounded(),
        );
        assert_eq!(q.orders[0].order_price, None);
        assert_eq!(q.orders[0].price_adjustment, None);
        assert!(q.orders[0].precision.is_some());
    }

    #[test]
    fn precision_failure_drops_only_that_order() {
        let q = qualify(
            vec![order(1, "EURUSD"), order(1, "BROKEN"), order(-1, "EURUSD")],
            &router(),
            true,
            &VenueGuard::unbounded(),
        );
        assert_eq!(q.orders.len(), 2);
        assert_eq!(q.dropped.len(), 1);
        assert_eq!(q.dropped[0].order.instrument_name(), "BROKEN");
        assert!(matches!(q.dropped[0].reason, DropReason::Qualification(_)));
    }

    #[test]
    fn unknown_exchange_drops_order() {
        let q = qualify(
            vec![order(1, "EURUSD").with_exchange("elsewhere")],
            &router(),
            true,
            &VenueGuard::unbounded(),
        );
        assert!(q.orders.is_empty());
        assert_eq!(q.dropped.len(), 1);
    }

    #[test]
    fn requalifying_is_a_no_op() {
        let guard = VenueGuard::unbounded();
        let first = qualify(vec![order(1, "EURUSD")], &router(), true, &guard);
        let second = qualify(first.orders.clone(), &router(), true, &guard);
        assert_eq!(first.orders, second.orders);
    }
}
