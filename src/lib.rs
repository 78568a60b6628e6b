pub mod analysis;
pub mod cli;
pub mod models;
pub mod session;
pub mod settings;
pub mod tabular;
pub mod utils;

pub use analysis::{
    AnalysisError, AnalysisEvent, AnalysisOrchestrator, AnalysisState, AnalysisStatus, Analyzer,
    HttpAnalyzer, Outcome, SubmissionHandle, SubmissionOutcome, FALLBACK_MESSAGE,
};
pub use models::{FeatureName, FeatureRecord, ResultRecord};
pub use session::{ClinicalSession, SessionSnapshot};
pub use settings::{AnalyzerSettings, SettingsStore, UserSettings};

/// Command-line entry point.
pub fn run() -> anyhow::Result<()> {
    cli::run()
}
