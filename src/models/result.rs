use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Diagnostic payload returned by the analysis capability.
///
/// The shape belongs to the analyzer's contract, so the record is kept as raw
/// JSON. Accessors only peek at commonly returned keys for logging.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ResultRecord(Value);

impl ResultRecord {
    pub fn new(payload: Value) -> Self {
        Self(payload)
    }

    pub fn payload(&self) -> &Value {
        &self.0
    }

    pub fn into_payload(self) -> Value {
        self.0
    }

    /// Top-level risk label, when the analyzer reports one.
    pub fn risk_level(&self) -> Option<&str> {
        ["riskLevel", "risk_level", "risk"]
            .iter()
            .find_map(|key| self.0.get(*key).and_then(Value::as_str))
    }
}

impl From<Value> for ResultRecord {
    fn from(payload: Value) -> Self {
        Self(payload)
    }
}
