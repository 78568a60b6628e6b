pub mod http;
pub mod orchestrator;
pub mod state;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{FeatureRecord, ResultRecord};

pub use http::HttpAnalyzer;
pub use orchestrator::{AnalysisEvent, AnalysisOrchestrator, SubmissionHandle, SubmissionOutcome};
pub use state::{AnalysisState, AnalysisStatus, Outcome};

/// Shown when a failed analysis carries no message of its own.
pub const FALLBACK_MESSAGE: &str =
    "Analysis Failed: Please check your internet connection and API configuration.";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AnalysisError {
    /// The analyzer answered with a failure, optionally explaining why.
    #[error("{}", message_or_fallback(.0))]
    Rejected(Option<String>),
    #[error("{0}")]
    Transport(String),
    #[error("{0}")]
    Configuration(String),
}

impl AnalysisError {
    pub fn message(&self) -> Option<&str> {
        let message = match self {
            AnalysisError::Rejected(message) => message.as_deref(),
            AnalysisError::Transport(message) | AnalysisError::Configuration(message) => {
                Some(message.as_str())
            }
        };
        message.filter(|text| !text.is_empty())
    }

    /// Message for display; empty or missing messages become [`FALLBACK_MESSAGE`].
    pub fn user_message(&self) -> String {
        self.message().unwrap_or(FALLBACK_MESSAGE).to_string()
    }
}

fn message_or_fallback(message: &Option<String>) -> &str {
    message
        .as_deref()
        .filter(|text| !text.is_empty())
        .unwrap_or(FALLBACK_MESSAGE)
}

/// The remote classifier. Transport and authentication are the implementor's
/// concern.
#[async_trait]
pub trait Analyzer: Send + Sync + 'static {
    async fn analyze(&self, record: &FeatureRecord) -> Result<ResultRecord, AnalysisError>;
}
