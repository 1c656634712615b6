//! Configuration access port trait.
//!
//! Implementors only supply raw string access. Typed getters return `None`
//! for an absent key and an error for a value that does not parse, so a typo
//! never silently becomes the default.

use std::str::FromStr;

use crate::domain::error::BotError;

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;

    /// Keys present in a section, sorted. Empty when the section is missing.
    fn keys(&self, section: &str) -> Vec<String>;

    fn get_int(&self, section: &str, key: &str) -> Result<Option<i64>, BotError> {
        parse_value(self.get_string(section, key), section, key, "an integer")
    }

    fn get_double(&self, section: &str, key: &str) -> Result<Option<f64>, BotError> {
        parse_value(self.get_string(section, key), section, key, "a number")
    }

    /// Accepts `true`/`yes`/`on`/`1` and `false`/`no`/`off`/`0`.
    fn get_bool(&self, section: &str, key: &str) -> Result<Option<bool>, BotError> {
        let Some(value) = self.get_string(section, key) else {
            return Ok(None);
        };
        match value.trim().to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(Some(true)),
            "false" | "no" | "off" | "0" => Ok(Some(false)),
            _ => Err(not_a(&value, section, key, "a boolean")),
        }
    }
}

fn parse_value<T: FromStr>(
    value: Option<String>,
    section: &str,
    key: &str,
    expected: &str,
) -> Result<Option<T>, BotError> {
    value
        .map(|v| v.trim().parse::<T>().map_err(|_| not_a(&v, section, key, expected)))
        .transpose()
}

fn not_a(value: &str, section: &str, key: &str, expected: &str) -> BotError {
    BotError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: format!("'{}' is not {expected}", value.trim()),
    }
}
