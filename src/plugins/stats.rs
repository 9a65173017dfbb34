use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::time::Duration;

use super::contract::{OutcomeStatus, PluginOutcome};

/// Running execution counters
///
/// Skipped executions are counted separately and are not part of `total`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionStats {
    pub total: u64,
    pub success: u64,
    pub warning: u64,
    pub failure: u64,
    pub error: u64,
    pub skipped: u64,
    pub total_duration: Duration,
}

impl ExecutionStats {
    pub fn record(&mut self, outcome: &PluginOutcome) {
        match outcome.status {
            OutcomeStatus::Skipped => {
                self.skipped += 1;
                return;
            }
            OutcomeStatus::Success => self.success += 1,
            OutcomeStatus::Warning => self.warning += 1,
            OutcomeStatus::Failure => self.failure += 1,
            OutcomeStatus::Error => self.error += 1,
        }
        self.total += 1;
        self.total_duration += outcome.duration;
    }

    /// Share of counted executions that passed (Success or Warning)
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.success + self.warning) as f64 / self.total as f64
    }

    pub fn avg_duration(&self) -> Duration {
        match u32::try_from(self.total) {
            Ok(0) => Duration::ZERO,
            Ok(n) => self.total_duration / n,
            Err(_) => Duration::from_secs_f64(self.total_duration.as_secs_f64() / self.total as f64),
        }
    }
}

impl Serialize for ExecutionStats {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ExecutionStats", 9)?;
        state.serialize_field("total", &self.total)?;
        state.serialize_field("success", &self.success)?;
        state.serialize_field("warning", &self.warning)?;
        state.serialize_field("failure", &self.failure)?;
        state.serialize_field("error", &self.error)?;
        state.serialize_field("skipped", &self.skipped)?;
        state.serialize_field("success_rate", &self.success_rate())?;
        state.serialize_field("total_duration_ms", &(self.total_duration.as_secs_f64() * 1000.0))?;
        state.serialize_field("avg_duration_ms", &(self.avg_duration().as_secs_f64() * 1000.0))?;
        state.end()
    }
}
