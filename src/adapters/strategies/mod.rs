//! Built-in strategy implementations.

pub mod ema_cross;
pub mod replay;

use crate::domain::registry::StrategyRegistry;

pub use ema_cross::EmaCross;
pub use replay::Replay;

impl StrategyRegistry {
    /// Registry preloaded with the `ema_cross` and `replay` strategies.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry
            .register("ema_cross", |config, _| Ok(Box::new(EmaCross::from_config(config)?)))
            .register("replay", |config, instrument| {
                Ok(Box::new(Replay::from_config(config, instrument)?))
            });
        registry
    }
}
