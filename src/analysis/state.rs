use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::ResultRecord;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Outcome {
    Success,
    Failure,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum AnalysisStatus {
    #[default]
    Idle,
    Pending,
    Settled(Outcome),
}

/// What the consumer renders: status plus independent result and error slots.
///
/// Every settle overwrites the shared slots, so when submissions overlap the
/// one that settles last decides what is shown.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisState {
    pub status: AnalysisStatus,
    pub result: Option<ResultRecord>,
    pub error: Option<String>,
    /// Id of the most recent submission.
    pub last_submission: Option<u64>,
    /// Id of the submission whose settle produced the current status.
    pub settled_submission: Option<u64>,
    pub settled_at: Option<DateTime<Utc>>,
    pub in_flight: u32,
}

impl AnalysisState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pending(&self) -> bool {
        self.status == AnalysisStatus::Pending
    }

    pub fn begin(&mut self, submission_id: u64) {
        self.status = AnalysisStatus::Pending;
        self.error = None;
        self.last_submission = Some(submission_id);
        self.in_flight = self.in_flight.saturating_add(1);
    }

    /// Replace the stored result. A stale error from an overlapping failure
    /// stays until the next submission begins.
    pub fn succeed(&mut self, submission_id: u64, result: ResultRecord, at: DateTime<Utc>) {
        self.result = Some(result);
        self.settle(submission_id, Outcome::Success, at);
    }

    /// Record the failure message; the previous result is left in place.
    pub fn fail(&mut self, submission_id: u64, message: String, at: DateTime<Utc>) {
        self.error = Some(message);
        self.settle(submission_id, Outcome::Failure, at);
    }

    /// Back to idle once the consumer has seen the outcome. Ignored while pending.
    pub fn dismiss(&mut self) -> bool {
        if matches!(self.status, AnalysisStatus::Settled(_)) {
            self.status = AnalysisStatus::Idle;
            true
        } else {
            false
        }
    }

    fn settle(&mut self, submission_id: u64, outcome: Outcome, at: DateTime<Utc>) {
        self.status = AnalysisStatus::Settled(outcome);
        self.settled_submission = Some(submission_id);
        self.settled_at = Some(at);
        self.in_flight = self.in_flight.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn begin_clears_error_but_keeps_result() {
        let mut state = AnalysisState::new();
        state.begin(1);
        state.succeed(1, ResultRecord::new(json!({"risk": "Low"})), Utc::now());
        state.begin(2);
        state.fail(2, "boom".into(), Utc::now());
        state.begin(3);

        assert!(state.is_pending());
        assert_eq!(state.error, None);
        assert_eq!(state.result.as_ref().and_then(|r| r.risk_level()), Some("Low"));
    }

    #[test]
    fn failure_keeps_previous_result() {
        let mut state = AnalysisState::new();
        state.begin(1);
        state.succeed(1, ResultRecord::new(json!({"risk": "High"})), Utc::now());
        state.begin(2);
        state.fail(2, "offline".into(), Utc::now());

        assert_eq!(state.status, AnalysisStatus::Settled(Outcome::Failure));
        assert_eq!(state.error.as_deref(), Some("offline"));
        assert!(state.result.is_some());
        assert_eq!(state.in_flight, 0);
    }

    #[test]
    fn dismiss_only_from_settled() {
        let mut state = AnalysisState::new();
        assert!(!state.dismiss());
        state.begin(1);
        assert!(!state.dismiss());
        state.fail(1, "x".into(), Utc::now());
        assert!(state.dismiss());
        assert_eq!(state.status, AnalysisStatus::Idle);
    }
}
