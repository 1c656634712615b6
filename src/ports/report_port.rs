//! Trade result reporting port trait.

use crate::domain::error::BotError;
use crate::domain::results::TradeResults;

/// Port for writing the finalized per-bot trade results.
pub trait ReportPort {
    fn write(&self, results: &TradeResults, output_path: &str) -> Result<(), BotError>;

    /// Default implementation: writes each result to its own file, suffixed
    /// with the instrument.
    fn write_all(&self, results: &[TradeResults], output_path: &str) -> Result<(), BotError> {
        if let [single] = results {
            return self.write(single, output_path);
        }
        for result in results {
            self.write(result, &format!("{output_path}.{}", result.instrument))?;
        }
        Ok(())
    }
}
