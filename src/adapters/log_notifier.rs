//! Notifier that delivers to the log.

use log::info;

use crate::domain::error::BotError;
use crate::domain::order::Order;
use crate::ports::notifier_port::NotifierPort;

#[derive(Debug, Clone, Default)]
pub struct LogNotifier {
    prefix: String,
}

impl LogNotifier {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn format_order(&self, order: &Order) -> String {
        format!("{}New order: {order}", self.prefix)
    }
}

impl NotifierPort for LogNotifier {
    fn send_order(&self, order: &Order) -> Result<(), BotError> {
        info!("{}", self.format_order(order));
        Ok(())
    }

    fn send_message(&self, message: &str) -> Result<(), BotError> {
        info!("{}{message}", self.prefix);
        Ok(())
    }
}
