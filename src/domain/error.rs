//! Domain error types.

/// Top-level error type for tickbot.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    #[error("configuration error: {reason}")]
    Config { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("invalid order submitted: {reason}")]
    Validation { reason: String },

    #[error("venue {venue} failed for {instrument}: {reason}")]
    Venue {
        venue: String,
        instrument: String,
        reason: String,
    },

    #[error("venue {venue} did not answer {operation} within {millis} ms")]
    Timeout {
        venue: String,
        operation: String,
        millis: u128,
    },

    #[error("no data returned for {instrument}")]
    DataUnavailable { instrument: String },

    #[error("strategy {name} failed: {reason}")]
    Strategy { name: String, reason: String },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BotError {
    pub fn config(reason: impl Into<String>) -> Self {
        BotError::Config {
            reason: reason.into(),
        }
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        BotError::Validation {
            reason: reason.into(),
        }
    }
}

impl From<&BotError> for std::process::ExitCode {
    fn from(err: &BotError) -> Self {
        let code: u8 = match err {
            BotError::Io(_) | BotError::Csv(_) => 1,
            BotError::Config { .. }
            | BotError::ConfigParse { .. }
            | BotError::ConfigMissing { .. }
            | BotError::ConfigInvalid { .. } => 2,
            BotError::Validation { .. } | BotError::Strategy { .. } => 4,
            BotError::DataUnavailable { .. } => 5,
            BotError::Venue { .. } | BotError::Timeout { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_by_category() {
        let code = |err: &BotError| format!("{:?}", std::process::ExitCode::from(err));
        let venue = BotError::Venue {
            venue: "paper".into(),
            instrument: "EURUSD".into(),
            reason: "rejected".into(),
        };
        assert_eq!(code(&venue), format!("{:?}", std::process::ExitCode::from(6)));
        assert_eq!(
            code(&BotError::config("bad")),
            format!("{:?}", std::process::ExitCode::from(2))
        );
        assert_eq!(
            code(&BotError::validation("bad")),
            format!("{:?}", std::process::ExitCode::from(4))
        );
    }

    #[test]
    fn messages_carry_context() {
        let err = BotError::ConfigMissing {
            section: "strategy".into(),
            key: "interval".into(),
        };
        assert_eq!(err.to_string(), "missing config key [strategy] interval");

        let err = BotError::DataUnavailable {
            instrument: "EURUSD".into(),
        };
        assert_eq!(err.to_string(), "no data returned for EURUSD");
    }
}
