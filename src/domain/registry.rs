//! Named strategy factories, resolved once at session start.

use std::collections::BTreeMap;

use super::config::StrategyConfig;
use super::error::BotError;
use crate::ports::strategy_port::StrategyPort;

/// Builds a strategy instance for one instrument.
pub type StrategyFactory =
    Box<dyn Fn(&StrategyConfig, &str) -> Result<Box<dyn StrategyPort>, BotError> + Send + Sync>;

#[derive(Default)]
pub struct StrategyRegistry {
    factories: BTreeMap<String, StrategyFactory>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` under `class`, replacing any earlier registration.
    pub fn register<F>(&mut self, class: &str, factory: F) -> &mut Self
    where
        F: Fn(&StrategyConfig, &str) -> Result<Box<dyn StrategyPort>, BotError>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(class.to_string(), Box::new(factory));
        self
    }

    pub fn contains(&self, class: &str) -> bool {
        self.factories.contains_key(class)
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn build(
        &self,
        config: &StrategyConfig,
        instrument: &str,
    ) -> Result<Box<dyn StrategyPort>, BotError> {
        let factory = self.factories.get(&config.class).ok_or_else(|| {
            BotError::config(format!(
                "unknown strategy class '{}' (known: {})",
                config.class,
                self.classes().collect::<Vec<_>>().join(", ")
            ))
        })?;
        factory(config, instrument)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::data::StrategyData;
    use crate::domain::signal::Signal;
    use chrono::NaiveDateTime;

    struct Idle(String);

    impl StrategyPort for Idle {
        fn generate_signal(
            &mut self,
            _timestamp: NaiveDateTime,
            _data: Option<&StrategyData>,
        ) -> Result<Signal, BotError> {
            Ok(Signal::Empty)
        }

        fn name(&self) -> Option<&str> {
            Some(&self.0)
        }
    }

    fn config(class: &str) -> StrategyConfig {
        StrategyConfig {
            name: "test".into(),
            class: class.into(),
            instruments: vec!["EURUSD".into()],
            portfolio: false,
            interval: "1h".into(),
            period: 1,
            risk_pc: None,
            sizing: None,
            parameters: BTreeMap::new(),
        }
    }

    #[test]
    fn builds_registered_class() {
        let mut registry = StrategyRegistry::new();
        registry.register("idle", |_, instrument| {
            Ok(Box::new(Idle(format!("idle-{instrument}"))))
        });
        let strategy = registry.build(&config("idle"), "EURUSD").unwrap();
        assert_eq!(strategy.name(), Some("idle-EURUSD"));
        assert!(registry.contains("idle"));
    }

    #[test]
    fn unknown_class_is_config_error() {
        let registry = StrategyRegistry::new();
        let err = registry.build(&config("missing"), "EURUSD").err().unwrap();
        assert!(matches!(err, BotError::Config { .. }));
        assert!(err.to_string().contains("missing"));
    }
}
