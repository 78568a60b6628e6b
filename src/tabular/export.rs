use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::log_info;
use crate::models::{FeatureName, FeatureRecord};
use crate::utils::numeric::format_value;

const ENABLE_LOGS: bool = true;

const ROLE: &str = "feature";

/// A serialized record paired with a unique download name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl ExportArtifact {
    pub fn new(record: &FeatureRecord) -> Self {
        Self {
            file_name: export_file_name(),
            bytes: export_bytes(record),
        }
    }
}

/// Render the four-row Orange layout. Byte layout is fixed; the importing
/// tool matches the header rows exactly.
pub fn export_text(record: &FeatureRecord) -> String {
    let names = FeatureName::ALL.map(|name| name.as_str());
    let kinds = FeatureName::ALL.map(|name| name.kind().as_str());
    let roles = [ROLE; 10];
    let values = record.values().map(format_value);

    let mut out = String::new();
    for row in [names.join("\t"), kinds.join("\t"), roles.join("\t"), values.join("\t")] {
        out.push_str(&row);
        out.push('\n');
    }
    out
}

pub fn export_bytes(record: &FeatureRecord) -> Vec<u8> {
    export_text(record).into_bytes()
}

/// `orange_export_<unix millis>_<8 hex>.tab`; the random suffix keeps names
/// distinct when two exports land in the same millisecond.
pub fn export_file_name() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "orange_export_{}_{}.tab",
        Utc::now().timestamp_millis(),
        &suffix[..8]
    )
}

/// Write an export artifact into `dir`, creating the directory if needed.
pub async fn write_export(dir: &Path, record: &FeatureRecord) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create export directory {}", dir.display()))?;

    let artifact = ExportArtifact::new(record);
    let path = dir.join(&artifact.file_name);

    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .await
        .with_context(|| format!("Failed to create {}", path.display()))?;
    file.write_all(&artifact.bytes)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    file.flush().await?;

    log_info!("Exported record to {}", path.display());
    Ok(path)
}
