//! Folding per-plugin outcomes into one hook status
//!
//! The fold is order independent: the same multiset of (name, status,
//! blocking) entries always produces the same status and reason.

use serde::Serialize;

use crate::plugins::OutcomeStatus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Aggregate {
    pub status: OutcomeStatus,
    pub reason: String,
}

pub fn fold<'a>(entries: impl IntoIterator<Item = (&'a str, OutcomeStatus, bool)>) -> Aggregate {
    let mut blocking_problems = Vec::new();
    let mut warnings = Vec::new();
    let mut skipped = 0usize;
    let mut counted = 0usize;

    for (name, status, blocking) in entries {
        counted += 1;
        match status {
            OutcomeStatus::Failure | OutcomeStatus::Error if blocking => blocking_problems.push(name),
            OutcomeStatus::Failure | OutcomeStatus::Error | OutcomeStatus::Warning => warnings.push(name),
            OutcomeStatus::Skipped => skipped += 1,
            OutcomeStatus::Success => {}
        }
    }

    if !blocking_problems.is_empty() {
        blocking_problems.sort_unstable();
        return Aggregate {
            status: OutcomeStatus::Failure,
            reason: format!("blocking plugin(s) failed: {}", blocking_problems.join(", ")),
        };
    }

    if !warnings.is_empty() {
        warnings.sort_unstable();
        return Aggregate {
            status: OutcomeStatus::Warning,
            reason: format!("plugin(s) reported warnings: {}", warnings.join(", ")),
        };
    }

    if counted == 0 {
        return Aggregate {
            status: OutcomeStatus::Skipped,
            reason: "no plugins ran".to_string(),
        };
    }

    if skipped == counted {
        return Aggregate {
            status: OutcomeStatus::Skipped,
            reason: format!("all {counted} plugin(s) skipped"),
        };
    }

    Aggregate {
        status: OutcomeStatus::Success,
        reason: format!("{} plugin(s) passed", counted - skipped),
    }
}
