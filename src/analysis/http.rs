use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use crate::models::{FeatureRecord, ResultRecord};
use crate::settings::AnalyzerSettings;

use super::{AnalysisError, Analyzer};

#[derive(Serialize)]
struct AnalysisRequest<'a> {
    features: &'a FeatureRecord,
}

/// Posts the record as JSON to a remote classifier and returns its reply verbatim.
pub struct HttpAnalyzer {
    client: Client,
    endpoint: Option<String>,
    api_key: Option<String>,
}

impl HttpAnalyzer {
    pub fn new(settings: &AnalyzerSettings) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("cardiaguard/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self::with_client(client, settings))
    }

    pub fn with_client(client: Client, settings: &AnalyzerSettings) -> Self {
        Self {
            client,
            endpoint: non_blank(settings.endpoint.as_deref()),
            api_key: non_blank(settings.api_key.as_deref()),
        }
    }
}

#[async_trait]
impl Analyzer for HttpAnalyzer {
    async fn analyze(&self, record: &FeatureRecord) -> Result<ResultRecord, AnalysisError> {
        let endpoint = self.endpoint.as_deref().ok_or_else(|| {
            AnalysisError::Configuration("No analysis endpoint is configured".to_string())
        })?;

        let mut request = self
            .client
            .post(endpoint)
            .json(&AnalysisRequest { features: record });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|err| AnalysisError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.json::<Value>().await.ok();
            return Err(AnalysisError::Rejected(body.as_ref().and_then(error_message)));
        }

        let payload = response.json::<Value>().await.map_err(|err| {
            AnalysisError::Rejected(Some(format!("Malformed analysis response: {err}")))
        })?;

        Ok(ResultRecord::new(payload))
    }
}

/// Pull a human-readable reason out of an error body: `{"error": "..."}`,
/// `{"message": "..."}` or `{"error": {"message": "..."}}`.
fn error_message(body: &Value) -> Option<String> {
    let candidates = [
        body.get("error").and_then(Value::as_str),
        body.get("message").and_then(Value::as_str),
        body.pointer("/error/message").and_then(Value::as_str),
    ];
    candidates
        .into_iter()
        .flatten()
        .find(|text| !text.is_empty())
        .map(str::to_string)
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}
