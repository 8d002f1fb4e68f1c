use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Request body for the power endpoints (`/system/shutdown`, `/system/start-desktop`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerRequest {
    pub script: String,
}

impl PowerRequest {
    /// The token the backend expects before acting on a power request
    pub const CONFIRMATION: &str = "ValidData";

    pub fn confirmed() -> Self {
        Self {
            script: Self::CONFIRMATION.to_string(),
        }
    }
}

/// Request body for `/scripts/run`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunScriptRequest {
    pub script: String,
}

/// Request body for starting a model download
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadRequest {
    /// Hugging Face repository, e.g. `unsloth/DeepSeek-R1-Distill-Qwen-1.5B-GGUF`
    pub hf_model: String,
    pub branch: String,
    pub job_id: String,
    /// Empty string downloads the backend's default selection
    #[serde(default)]
    pub specific_file: String,
}

impl DownloadRequest {
    pub const DEFAULT_BRANCH: &str = "main";
}

/// KV cache quantization for the inference server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KvQuant {
    F16,
    Q8,
    Q4,
}

impl FromStr for KvQuant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "f16" => Ok(KvQuant::F16),
            "q8" => Ok(KvQuant::Q8),
            "q4" => Ok(KvQuant::Q4),
            other => Err(format!("unknown kv quantization '{}' (expected f16, q8 or q4)", other)),
        }
    }
}

impl fmt::Display for KvQuant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KvQuant::F16 => "f16",
            KvQuant::Q8 => "q8",
            KvQuant::Q4 => "q4",
        };
        f.write_str(name)
    }
}

/// Context lengths offered by the model panel
pub const CONTEXT_LENGTH_PRESETS: [u32; 3] = [8192, 15360, 20480];
pub const DEFAULT_CONTEXT_LENGTH: u32 = CONTEXT_LENGTH_PRESETS[0];

/// Request body for `/koboldcpp/set-parameters`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetParametersRequest {
    pub model_path: String,
    pub context_length: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kv_quant: Option<KvQuant>,
}
