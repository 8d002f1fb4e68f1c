use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Response body of the ping endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PingResponse {
    /// `1` reachable, `0` unreachable, `null` still checking
    #[serde(default)]
    pub detail: Option<i64>,
}

/// Response body of the legacy health endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostnameData {
    pub hostname: String,
}

/// Response body of `/system/hostname`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostnameResponse {
    pub data: HostnameData,
}

/// Response body of `/system/os`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OsResponse {
    pub os: String,
}

/// Generic `{ "message": ... }` acknowledgement. Fields other than `message` are kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MessageResponse {
    /// The message, or the whole body rendered as JSON when there is none
    pub fn summary(&self) -> String {
        match &self.message {
            Some(message) => message.clone(),
            None => Value::Object(self.extra.clone()).to_string(),
        }
    }
}

/// GPU memory statistics, in MiB
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VramUsage {
    pub used_vram: u64,
    pub total_vram: u64,
}

impl VramUsage {
    pub fn used_percent(&self) -> u8 {
        if self.total_vram == 0 {
            return 0;
        }
        let pct = (self.used_vram as f64 / self.total_vram as f64 * 100.0).round();
        pct.clamp(0.0, 100.0) as u8
    }
}

/// Runnable scripts grouped by folder
pub type ScriptCatalog = BTreeMap<String, Vec<String>>;

/// Response body of `/scripts`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScriptsResponse {
    #[serde(default)]
    pub data: ScriptCatalog,
}

/// Response body of `/koboldcpp/models`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelsResponse {
    #[serde(default)]
    pub models: Vec<String>,
}

/// Response body of `/koboldcpp/download/progress/{job_id}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DownloadProgress {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub progress_ratio: Option<f64>,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<String>,
}

impl DownloadProgress {
    pub fn percent(&self) -> u8 {
        let ratio = self.progress_ratio.unwrap_or(0.0);
        if !ratio.is_finite() {
            return 0;
        }
        (ratio * 100.0).round().clamp(0.0, 100.0) as u8
    }
}
