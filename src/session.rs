use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Result;
use serde::Serialize;
use tokio::sync::{broadcast, Mutex};

use crate::{
    analysis::{
        AnalysisEvent, AnalysisOrchestrator, AnalysisState, Analyzer, HttpAnalyzer,
        SubmissionHandle,
    },
    log_info, log_warn,
    models::{Advisory, FeatureName, FeatureRecord},
    settings::UserSettings,
    tabular::{self, ExportArtifact},
};

const ENABLE_LOGS: bool = true;

/// Everything a renderer needs to draw the current session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub features: FeatureRecord,
    pub analysis: AnalysisState,
    pub advisories: Vec<Advisory>,
}

/// Session-scoped owner of the patient record and the analysis lifecycle.
///
/// Field edits and imports while a submission is pending only affect later
/// submissions. Overlapping imports apply in completion order.
#[derive(Clone)]
pub struct ClinicalSession {
    features: Arc<Mutex<FeatureRecord>>,
    orchestrator: AnalysisOrchestrator,
    export_dir: PathBuf,
}

impl ClinicalSession {
    pub fn new(analyzer: Arc<dyn Analyzer>, export_dir: PathBuf) -> Self {
        Self {
            features: Arc::new(Mutex::new(FeatureRecord::default())),
            orchestrator: AnalysisOrchestrator::new(analyzer),
            export_dir,
        }
    }

    /// Session backed by the HTTP analyzer described in `settings`.
    pub fn from_settings(settings: &UserSettings) -> Result<Self> {
        let analyzer = HttpAnalyzer::new(&settings.analyzer)?;
        Ok(Self::new(Arc::new(analyzer), settings.export_dir.clone()))
    }

    pub fn orchestrator(&self) -> &AnalysisOrchestrator {
        &self.orchestrator
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AnalysisEvent> {
        self.orchestrator.subscribe()
    }

    pub async fn features(&self) -> FeatureRecord {
        *self.features.lock().await
    }

    pub async fn set_field(&self, name: FeatureName, raw: &str) -> FeatureRecord {
        let mut guard = self.features.lock().await;
        *guard = guard.set_field(name, raw);
        *guard
    }

    /// Like [`ClinicalSession::set_field`] but addressed by the field's text name.
    pub async fn set_field_named(&self, name: &str, raw: &str) -> Result<FeatureRecord> {
        let name: FeatureName = name.parse()?;
        Ok(self.set_field(name, raw).await)
    }

    pub async fn replace_features(&self, record: FeatureRecord) {
        *self.features.lock().await = record;
    }

    /// Import from document text. Returns whether the record was replaced.
    pub async fn import_text(&self, text: &str) -> bool {
        let Some(parsed) = tabular::inspect_document(text) else {
            log_info!("Import found no usable data row; record unchanged");
            return false;
        };

        for coerced in &parsed.coerced {
            log_warn!(
                "Import token '{}' for {} is not a number; stored as 0",
                coerced.token,
                coerced.field
            );
        }
        self.replace_features(parsed.record).await;
        true
    }

    /// Read an uploaded `.tab` / `.csv` file and import it.
    pub async fn import_file(&self, path: &Path) -> Result<bool> {
        let text = tabular::read_document(path).await?;
        Ok(self.import_text(&text).await)
    }

    pub async fn export(&self) -> ExportArtifact {
        ExportArtifact::new(&self.features().await)
    }

    pub async fn export_to_dir(&self) -> Result<PathBuf> {
        let record = self.features().await;
        tabular::write_export(&self.export_dir, &record).await
    }

    /// Submit the current record. Later edits do not reach this request.
    pub async fn submit(&self) -> SubmissionHandle {
        let record = self.features().await;
        self.orchestrator.submit(record).await
    }

    pub async fn dismiss(&self) -> bool {
        self.orchestrator.dismiss().await
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let features = self.features().await;
        SessionSnapshot {
            features,
            analysis: self.orchestrator.get_state().await,
            advisories: features.advisories(),
        }
    }
}
