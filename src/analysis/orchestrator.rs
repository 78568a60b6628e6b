use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use anyhow::{anyhow, Result};
use chrono::Utc;
use serde::Serialize;
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};

use crate::models::{FeatureRecord, ResultRecord};
use crate::{log_info, log_warn};

use super::{AnalysisError, AnalysisState, Analyzer};

const ENABLE_LOGS: bool = true;

const EVENT_CAPACITY: usize = 32;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum AnalysisEvent {
    StateChanged { state: AnalysisState },
    /// A fresh result is stored; the consumer should bring it into view.
    RevealResult {
        submission_id: u64,
        result: ResultRecord,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionOutcome {
    Success(ResultRecord),
    Failure(String),
}

impl SubmissionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SubmissionOutcome::Success(_))
    }
}

/// Resolves once the submission has settled and its outcome is applied.
pub struct SubmissionHandle {
    id: u64,
    task: JoinHandle<SubmissionOutcome>,
}

impl SubmissionHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub async fn outcome(self) -> Result<SubmissionOutcome> {
        self.task
            .await
            .map_err(|err| anyhow!("analysis submission {} did not complete: {err}", self.id))
    }
}

/// Drives analysis requests and owns the shared result/error/status slots.
///
/// Submissions are not serialized: each runs against its own record snapshot
/// and applies its outcome when it settles.
#[derive(Clone)]
pub struct AnalysisOrchestrator {
    state: Arc<Mutex<AnalysisState>>,
    analyzer: Arc<dyn Analyzer>,
    events: broadcast::Sender<AnalysisEvent>,
    next_submission: Arc<AtomicU64>,
}

impl AnalysisOrchestrator {
    pub fn new(analyzer: Arc<dyn Analyzer>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(AnalysisState::new())),
            analyzer,
            events,
            next_submission: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AnalysisEvent> {
        self.events.subscribe()
    }

    pub async fn get_state(&self) -> AnalysisState {
        self.state.lock().await.clone()
    }

    /// Mark the orchestrator pending and start analysing `record`.
    ///
    /// The record is taken by value, so later edits never reach this request.
    pub async fn submit(&self, record: FeatureRecord) -> SubmissionHandle {
        let id = self.next_submission.fetch_add(1, Ordering::Relaxed);

        {
            let mut state = self.state.lock().await;
            state.begin(id);
            emit_state(&self.events, &state);
        }
        log_info!("Analysis submission {} started", id);

        let state = self.state.clone();
        let analyzer = self.analyzer.clone();
        let events = self.events.clone();

        let task = tokio::spawn(async move {
            // A panicking analyzer must still settle the submission.
            let call = tokio::spawn(async move { analyzer.analyze(&record).await });
            let response = call.await.unwrap_or_else(|err| {
                log_warn!("Analysis submission {} aborted: {}", id, err);
                Err(AnalysisError::Rejected(None))
            });
            let settled_at = Utc::now();

            let mut guard = state.lock().await;
            match response {
                Ok(result) => {
                    log_info!(
                        "Analysis submission {} succeeded (risk: {})",
                        id,
                        result.risk_level().unwrap_or("unreported")
                    );
                    guard.succeed(id, result.clone(), settled_at);
                    emit_state(&events, &guard);
                    let _ = events.send(AnalysisEvent::RevealResult {
                        submission_id: id,
                        result: result.clone(),
                    });
                    SubmissionOutcome::Success(result)
                }
                Err(err) => {
                    let message = err.user_message();
                    log_warn!("Analysis submission {} failed: {:?}", id, err);
                    guard.fail(id, message.clone(), settled_at);
                    emit_state(&events, &guard);
                    SubmissionOutcome::Failure(message)
                }
            }
        });

        SubmissionHandle { id, task }
    }

    /// Return a settled orchestrator to idle.
    pub async fn dismiss(&self) -> bool {
        let mut state = self.state.lock().await;
        let changed = state.dismiss();
        if changed {
            emit_state(&self.events, &state);
        }
        changed
    }
}

fn emit_state(events: &broadcast::Sender<AnalysisEvent>, state: &AnalysisState) {
    // No receivers is fine; the state is always readable through `get_state`.
    let _ = events.send(AnalysisEvent::StateChanged {
        state: state.clone(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AnalysisError, AnalysisStatus, Outcome, FALLBACK_MESSAGE};
    use crate::models::FeatureName;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::oneshot;

    type Reply = Result<ResultRecord, AnalysisError>;

    /// Analyzer whose replies are released by the test, in any order.
    struct GatedAnalyzer {
        gates: StdMutex<VecDeque<oneshot::Receiver<Reply>>>,
        seen: StdMutex<Vec<FeatureRecord>>,
    }

    impl GatedAnalyzer {
        fn with_gates(count: usize) -> (Arc<Self>, Vec<oneshot::Sender<Reply>>) {
            let (senders, receivers): (Vec<_>, VecDeque<_>) =
                (0..count).map(|_| oneshot::channel()).unzip();
            let analyzer = Arc::new(Self {
                gates: StdMutex::new(receivers),
                seen: StdMutex::new(Vec::new()),
            });
            (analyzer, senders)
        }
    }

    #[async_trait]
    impl Analyzer for GatedAnalyzer {
        async fn analyze(&self, record: &FeatureRecord) -> Result<ResultRecord, AnalysisError> {
            self.seen.lock().unwrap().push(*record);
            let gate = self.gates.lock().unwrap().pop_front().expect("unexpected call");
            gate.await
                .unwrap_or_else(|_| Err(AnalysisError::Transport("gate dropped".into())))
        }
    }

    #[tokio::test]
    async fn success_stores_result_and_reveals() {
        let (analyzer, mut gates) = GatedAnalyzer::with_gates(1);
        let orchestrator = AnalysisOrchestrator::new(analyzer);
        let mut events = orchestrator.subscribe();

        let handle = orchestrator.submit(FeatureRecord::default()).await;
        assert!(orchestrator.get_state().await.is_pending());

        gates
            .remove(0)
            .send(Ok(ResultRecord::new(json!({"riskLevel": "Low"}))))
            .unwrap();
        assert!(handle.outcome().await.unwrap().is_success());

        let state = orchestrator.get_state().await;
        assert_eq!(state.status, AnalysisStatus::Settled(Outcome::Success));
        assert_eq!(state.error, None);
        assert_eq!(state.result.unwrap().risk_level(), Some("Low"));

        let mut revealed = false;
        while let Ok(event) = events.try_recv() {
            if let AnalysisEvent::RevealResult { submission_id, .. } = event {
                assert_eq!(submission_id, 1);
                revealed = true;
            }
        }
        assert!(revealed);
    }

    #[tokio::test]
    async fn rejection_without_message_uses_fallback() {
        let (analyzer, mut gates) = GatedAnalyzer::with_gates(1);
        let orchestrator = AnalysisOrchestrator::new(analyzer);

        let handle = orchestrator.submit(FeatureRecord::default()).await;
        gates.remove(0).send(Err(AnalysisError::Rejected(None))).unwrap();

        assert_eq!(
            handle.outcome().await.unwrap(),
            SubmissionOutcome::Failure(FALLBACK_MESSAGE.to_string())
        );
        let state = orchestrator.get_state().await;
        assert_eq!(state.status, AnalysisStatus::Settled(Outcome::Failure));
        assert_eq!(state.error.as_deref(), Some(FALLBACK_MESSAGE));
        assert_eq!(state.result, None);
    }

    #[tokio::test]
    async fn last_settled_submission_wins() {
        let (analyzer, mut gates) = GatedAnalyzer::with_gates(2);
        let orchestrator = AnalysisOrchestrator::new(analyzer);

        let first = orchestrator.submit(FeatureRecord::default()).await;
        let second = orchestrator.submit(FeatureRecord::default()).await;
        let second_gate = gates.remove(1);
        let first_gate = gates.remove(0);

        second_gate
            .send(Ok(ResultRecord::new(json!({"riskLevel": "High"}))))
            .unwrap();
        second.outcome().await.unwrap();
        first_gate
            .send(Err(AnalysisError::Rejected(Some("timeout upstream".into()))))
            .unwrap();
        first.outcome().await.unwrap();

        let state = orchestrator.get_state().await;
        assert_eq!(state.status, AnalysisStatus::Settled(Outcome::Failure));
        assert_eq!(state.error.as_deref(), Some("timeout upstream"));
        assert_eq!(state.settled_submission, Some(1));
        assert_eq!(state.last_submission, Some(2));
        assert_eq!(state.result.unwrap().risk_level(), Some("High"));
        assert_eq!(state.in_flight, 0);
    }

    #[tokio::test]
    async fn submission_uses_record_snapshot() {
        let (analyzer, mut gates) = GatedAnalyzer::with_gates(1);
        let orchestrator = AnalysisOrchestrator::new(analyzer.clone());

        let mut record = FeatureRecord::default();
        let handle = orchestrator.submit(record).await;
        record = record.with(FeatureName::Age, 80.0);
        assert_eq!(record.age, 80.0);

        gates.remove(0).send(Ok(ResultRecord::new(json!({})))).unwrap();
        handle.outcome().await.unwrap();

        assert_eq!(analyzer.seen.lock().unwrap()[0].age, 54.0);
    }

    #[tokio::test]
    async fn dismiss_returns_to_idle() {
        let (analyzer, mut gates) = GatedAnalyzer::with_gates(1);
        let orchestrator = AnalysisOrchestrator::new(analyzer);

        let handle = orchestrator.submit(FeatureRecord::default()).await;
        assert!(!orchestrator.dismiss().await);

        gates.remove(0).send(Ok(ResultRecord::new(json!({})))).unwrap();
        handle.outcome().await.unwrap();

        assert!(orchestrator.dismiss().await);
        let state = orchestrator.get_state().await;
        assert_eq!(state.status, AnalysisStatus::Idle);
        assert!(state.result.is_some());
    }

    /// Panics on the default profile, succeeds on anything else.
    struct PanickingAnalyzer;

    #[async_trait]
    impl Analyzer for PanickingAnalyzer {
        async fn analyze(&self, record: &FeatureRecord) -> Result<ResultRecord, AnalysisError> {
            if *record == FeatureRecord::default() {
                panic!("analyzer crashed");
            }
            Ok(ResultRecord::new(json!({"riskLevel": "Low"})))
        }
    }

    #[tokio::test]
    async fn panicking_analyzer_settles_as_failure() {
        let orchestrator = AnalysisOrchestrator::new(Arc::new(PanickingAnalyzer));

        let handle = orchestrator.submit(FeatureRecord::default()).await;
        assert_eq!(
            handle.outcome().await.unwrap(),
            SubmissionOutcome::Failure(FALLBACK_MESSAGE.to_string())
        );

        let state = orchestrator.get_state().await;
        assert_eq!(state.status, AnalysisStatus::Settled(Outcome::Failure));
        assert_eq!(state.in_flight, 0);

        let retry = orchestrator
            .submit(FeatureRecord::default().with(FeatureName::Age, 61.0))
            .await;
        assert!(retry.outcome().await.unwrap().is_success());
        assert_eq!(
            orchestrator.get_state().await.status,
            AnalysisStatus::Settled(Outcome::Success)
        );
    }
}
