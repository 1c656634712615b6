//! Canonical orders and the raw records strategies may emit instead.

use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

use super::error::BotError;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OrderType {
    #[default]
    Market,
    Limit,
    StopLimit,
    Reduce,
    Close,
    Modify,
    Cancel,
    Other(String),
}

impl OrderType {
    /// Order types that are meaningless without a direction.
    pub fn requires_direction(&self) -> bool {
        matches!(
            self,
            OrderType::Market | OrderType::Limit | OrderType::StopLimit | OrderType::Reduce
        )
    }

    pub fn as_str(&self) -> &str {
        match self {
            OrderType::Market => "market",
            OrderType::Limit => "limit",
            OrderType::StopLimit => "stop-limit",
            OrderType::Reduce => "reduce",
            OrderType::Close => "close",
            OrderType::Modify => "modify",
            OrderType::Cancel => "cancel",
            OrderType::Other(name) => name,
        }
    }
}

impl FromStr for OrderType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        Ok(match normalized.as_str() {
            "market" => OrderType::Market,
            "limit" => OrderType::Limit,
            "stop-limit" | "stop_limit" => OrderType::StopLimit,
            "reduce" => OrderType::Reduce,
            "close" => OrderType::Close,
            "modify" => OrderType::Modify,
            "cancel" => OrderType::Cancel,
            _ => OrderType::Other(normalized),
        })
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position sizing hint attached to orders.
#[derive(Debug, Clone, PartialEq)]
pub enum Sizing {
    /// Size from the risk-percentage hint.
    Risk,
    Units(f64),
}

impl FromStr for Sizing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("risk") {
            return Ok(Sizing::Risk);
        }
        trimmed
            .parse::<f64>()
            .map(Sizing::Units)
            .map_err(|_| format!("expected 'risk' or a number, got '{trimmed}'"))
    }
}

impl fmt::Display for Sizing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sizing::Risk => f.write_str("risk"),
            Sizing::Units(units) => write!(f, "{units}"),
        }
    }
}

/// Decimal places a venue accepts for an instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Precision {
    pub size: u32,
    pub price: u32,
}

impl Precision {
    pub fn round_size(&self, value: f64) -> f64 {
        round_to(value, self.size)
    }

    pub fn round_price(&self, value: f64) -> f64 {
        round_to(value, self.price)
    }
}

fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Best bid and ask for an instrument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TopOfBook {
    pub bid: f64,
    pub ask: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Order {
    pub instrument: Option<String>,
    pub order_type: OrderType,
    /// Positive for long/buy, negative for short/sell.
    pub direction: Option<i32>,
    pub size: Option<f64>,
    pub exchange: Option<String>,
    pub strategy: Option<String>,
    pub granularity: Option<String>,
    pub sizing: Option<Sizing>,
    pub risk_pc: Option<f64>,
    pub limit_price: Option<f64>,
    pub stop_price: Option<f64>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    /// Reference price resolved from the venue order book.
    pub order_price: Option<f64>,
    pub price_adjustment: Option<f64>,
    pub precision: Option<Precision>,
}

impl Order {
    pub fn new(order_type: OrderType) -> Self {
        Order {
            order_type,
            ..Default::default()
        }
    }

    pub fn market(direction: i32, size: f64) -> Self {
        Order {
            direction: Some(direction),
            size: Some(size),
            ..Order::new(OrderType::Market)
        }
    }

    pub fn limit(direction: i32, size: f64, limit_price: f64) -> Self {
        Order {
            direction: Some(direction),
            size: Some(size),
            limit_price: Some(limit_price),
            ..Order::new(OrderType::Limit)
        }
    }

    pub fn with_instrument(mut self, instrument: &str) -> Self {
        self.instrument = Some(instrument.to_string());
        self
    }

    pub fn with_exchange(mut self, exchange: &str) -> Self {
        self.exchange = Some(exchange.to_string());
        self
    }

    pub fn has_direction(&self) -> bool {
        matches!(self.direction, Some(d) if d != 0)
    }

    pub fn is_short(&self) -> bool {
        matches!(self.direction, Some(d) if d < 0)
    }

    pub fn direction_label(&self) -> &'static str {
        if matches!(self.direction, Some(d) if d > 0) {
            "long"
        } else {
            "short"
        }
    }

    pub fn instrument_name(&self) -> &str {
        self.instrument.as_deref().unwrap_or("")
    }

    pub fn exchange_name(&self) -> &str {
        self.exchange.as_deref().unwrap_or("")
    }

    /// Attach venue context. Size and any limit/stop prices are rounded to the
    /// venue precision, so applying the same context twice changes nothing.
    pub fn qualify(
        &mut self,
        order_price: Option<f64>,
        price_adjustment: Option<f64>,
        precision: Precision,
    ) {
        self.order_price = order_price.map(|p| precision.round_price(p));
        self.price_adjustment = price_adjustment;
        self.precision = Some(precision);
        self.size = self.size.map(|s| precision.round_size(s));
        self.limit_price = self.limit_price.map(|p| precision.round_price(p));
        self.stop_price = self.stop_price.map(|p| precision.round_price(p));
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} order", self.direction_label(), self.order_type)?;
        if let Some(size) = self.size {
            write!(f, " of {size} units")?;
        }
        write!(f, " for {}", self.instrument_name())?;
        if let Some(exchange) = &self.exchange {
            write!(f, " on {exchange}")?;
        }
        if let Some(price) = self.limit_price {
            write!(f, " @ {price}")?;
        }
        Ok(())
    }
}

/// Loosely typed order description. Every field is optional, including the
/// order type, which must be present for the record to become an [`Order`].
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct OrderRecord {
    #[serde(default)]
    pub order_type: Option<String>,
    #[serde(default)]
    pub instrument: Option<String>,
    #[serde(default)]
    pub direction: Option<i32>,
    #[serde(default)]
    pub size: Option<f64>,
    #[serde(default)]
    pub exchange: Option<String>,
    #[serde(default)]
    pub sizing: Option<String>,
    #[serde(default)]
    pub risk_pc: Option<f64>,
    #[serde(default)]
    pub limit_price: Option<f64>,
    #[serde(default)]
    pub stop_price: Option<f64>,
    #[serde(default)]
    pub stop_loss: Option<f64>,
    #[serde(default)]
    pub take_profit: Option<f64>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl TryFrom<OrderRecord> for Order {
    type Error = BotError;

    fn try_from(record: OrderRecord) -> Result<Self, Self::Error> {
        let order_type = match non_blank(record.order_type.clone()) {
            Some(t) => t.parse::<OrderType>().unwrap_or_default(),
            None => {
                return Err(BotError::validation(format!(
                    "record has no order_type: {record:?}"
                )));
            }
        };
        let sizing = match non_blank(record.sizing) {
            Some(s) => Some(s.parse::<Sizing>().map_err(BotError::validation)?),
            None => None,
        };

        Ok(Order {
            instrument: non_blank(record.instrument),
            order_type,
            direction: record.direction,
            size: record.size,
            exchange: non_blank(record.exchange),
            sizing,
            risk_pc: record.risk_pc,
            limit_price: record.limit_price,
            stop_price: record.stop_price,
            stop_loss: record.stop_loss,
            take_profit: record.take_profit,
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_type_parses_known_and_unknown() {
        assert_eq!("Market".parse::<OrderType>().unwrap(), OrderType::Market);
        assert_eq!(
            "stop-limit".parse::<OrderType>().unwrap(),
            OrderType::StopLimit
        );
        assert_eq!(
            "trailing".parse::<OrderType>().unwrap(),
            OrderType::Other("trailing".into())
        );
    }

    #[test]
    fn directional_types() {
        assert!(OrderType::Market.requires_direction());
        assert!(OrderType::Limit.requires_direction());
        assert!(OrderType::StopLimit.requires_direction());
        assert!(OrderType::Reduce.requires_direction());
        assert!(!OrderType::Close.requires_direction());
        assert!(!OrderType::Cancel.requires_direction());
    }

    #[test]
    fn zero_direction_counts_as_missing() {
        let mut order = Order::market(0, 1.0);
        assert!(!order.has_direction());
        order.direction = None;
        assert!(!order.has_direction());
        order.direction = Some(-1);
        assert!(order.has_direction());
        assert!(order.is_short());
    }

    #[test]
    fn sizing_parses() {
        assert_eq!("risk".parse::<Sizing>().unwrap(), Sizing::Risk);
        assert_eq!("12.5".parse::<Sizing>().unwrap(), Sizing::Units(12.5));
        assert!("lots".parse::<Sizing>().is_err());
    }

    #[test]
    fn record_without_order_type_is_rejected() {
        let record = OrderRecord {
            direction: Some(1),
            size: Some(10.0),
            ..Default::default()
        };
        let err = Order::try_from(record).unwrap_err();
        assert!(matches!(err, BotError::Validation { .. }));
    }

    #[test]
    fn record_converts_fields() {
        let record = OrderRecord {
            order_type: Some("limit".into()),
            instrument: Some("EURUSD".into()),
            direction: Some(-1),
            size: Some(5.0),
            limit_price: Some(1.1),
            exchange: Some("  ".into()),
            sizing: Some("risk".into()),
            ..Default::default()
        };
        let order = Order::try_from(record).unwrap();
        assert_eq!(order.order_type, OrderType::Limit);
        assert_eq!(order.instrument.as_deref(), Some("EURUSD"));
        assert_eq!(order.direction, Some(-1));
        assert_eq!(order.exchange, None);
        assert_eq!(order.sizing, Some(Sizing::Risk));
    }

    #[test]
    fn qualify_rounds_and_is_idempotent() {
        let precision = Precision { size: 2, price: 4 };
        let mut order = Order::limit(1, 10.123, 1.234_567);
        order.qualify(Some(1.234_51), Some(1.0), precision);
        assert_eq!(order.size, Some(10.12));
        assert_eq!(order.limit_price, Some(1.2346));
        assert_eq!(order.order_price, Some(1.2345));

        let once = order.clone();
        order.qualify(Some(1.234_51), Some(1.0), precision);
        assert_eq!(order, once);
    }

    #[test]
    fn display_mentions_direction_and_size() {
        let order = Order::market(1, 10.0)
            .with_instrument("EURUSD")
            .with_exchange("paper");
        assert_eq!(
            order.to_string(),
            "long market order of 10 units for EURUSD on paper"
        );
    }
}
