//! Notification delivery port trait.

use crate::domain::error::BotError;
use crate::domain::order::Order;

pub trait NotifierPort: Send + Sync {
    fn send_order(&self, order: &Order) -> Result<(), BotError>;

    fn send_message(&self, message: &str) -> Result<(), BotError>;
}
