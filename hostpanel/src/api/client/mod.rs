use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use shared::config::Config;
use shared_http::api::{
    DownloadProgress, DownloadRequest, HostnameResponse, KvQuant, MessageResponse, ModelsResponse,
    OsResponse, PowerRequest, RunScriptRequest, ScriptCatalog, ScriptsResponse,
    SetParametersRequest, VramUsage,
};
use tracing::{debug, info, warn};

use crate::api::ApiError;
use crate::downloads::{DownloadWatch, JobId};
use crate::liveness::{self, Liveness};
use crate::poller::Poller;
use crate::probe::HttpProbe;

/// Typed client for the host-management backend. One method per endpoint.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    config: Arc<Config>,
}

impl ApiClient {
    pub fn new(config: Config) -> Result<Self, ApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.backend_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        let response = self.client.get(url).send().await?;
        read_json(response).await
    }

    async fn post_json<B, T>(&self, url: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.client.post(url).json(body).send().await?;
        read_json(response).await
    }
}

impl ApiClient {
    /// Check the configured health endpoint once.
    pub async fn check_health(&self) -> Result<Liveness, ApiError> {
        let url = self.config.health_url();
        self.check_health_at(&url).await
    }

    /// Check an arbitrary health URL using the configured contract.
    pub async fn check_health_at(&self, url: &str) -> Result<Liveness, ApiError> {
        debug!("Checking health at URL: {}", url);
        let response = self.client.get(url).send().await?;
        let body = read_body(response).await?;
        Ok(liveness::decode_health(self.config.health_contract, &body)?)
    }

    /// Start polling the configured health endpoint at `interval`.
    pub fn poll_health(&self, interval: Duration) -> Result<Poller, ApiError> {
        let url = self.config.health_url();
        self.poll_url(&url, interval)
    }

    /// Start polling `url` (absolute, or relative to the backend URL) at `interval`.
    pub fn poll_url(&self, url: &str, interval: Duration) -> Result<Poller, ApiError> {
        let url = self.config.resolve(url)?;
        let probe = Arc::new(HttpProbe::new(self.clone(), url));
        Ok(Poller::start(probe, interval)?)
    }

    pub async fn fetch_hostname(&self) -> Result<String, ApiError> {
        let response: HostnameResponse = self.get_json(&self.endpoint("/system/hostname")).await?;
        info!("Hostname: {}", response.data.hostname);
        Ok(response.data.hostname)
    }

    pub async fn fetch_os(&self) -> Result<String, ApiError> {
        let response: OsResponse = self.get_json(&self.endpoint("/system/os")).await?;
        Ok(response.os)
    }

    pub async fn shut_down_desktop(&self) -> Result<MessageResponse, ApiError> {
        self.power_action("/system/shutdown").await
    }

    pub async fn start_desktop(&self) -> Result<MessageResponse, ApiError> {
        self.power_action("/system/start-desktop").await
    }

    async fn power_action(&self, path: &str) -> Result<MessageResponse, ApiError> {
        let response: MessageResponse = self
            .post_json(&self.endpoint(path), &PowerRequest::confirmed())
            .await
            .inspect_err(|e| warn!("Power action {} failed: {}", path, e))?;
        info!("Message: {}", response.summary());
        Ok(response)
    }

    pub async fn fetch_vram_usage(&self) -> Result<VramUsage, ApiError> {
        let usage: VramUsage = self
            .get_json(&self.endpoint("/system/vram-usage"))
            .await
            .inspect_err(|e| warn!("Error fetching VRAM usage: {}", e))?;
        debug!(used = usage.used_vram, total = usage.total_vram, "VRAM usage");
        Ok(usage)
    }

    pub async fn fetch_scripts(&self) -> Result<ScriptCatalog, ApiError> {
        let response: ScriptsResponse = self.get_json(&self.endpoint("/scripts")).await?;
        Ok(response.data)
    }

    pub async fn run_script(&self, script: &str) -> Result<MessageResponse, ApiError> {
        let request = RunScriptRequest {
            script: script.to_string(),
        };
        let response: MessageResponse = self
            .post_json(&self.endpoint("/scripts/run"), &request)
            .await
            .inspect_err(|e| warn!("Running script '{}' failed: {}", script, e))?;
        info!("Message: {}", response.summary());
        Ok(response)
    }

    pub async fn fetch_models(&self) -> Result<Vec<String>, ApiError> {
        let response: ModelsResponse = self
            .get_json(&self.endpoint("/koboldcpp/models"))
            .await
            .inspect_err(|e| warn!("Error fetching GGUF models: {}", e))?;
        Ok(response.models)
    }

    /// Ask the backend to download `hf_model`. Returns the generated job id.
    pub async fn start_download(
        &self,
        hf_model: &str,
        branch: Option<&str>,
        specific_file: Option<&str>,
    ) -> Result<JobId, ApiError> {
        let job_id = JobId::generate();
        let request = DownloadRequest {
            hf_model: hf_model.to_string(),
            branch: branch.unwrap_or(DownloadRequest::DEFAULT_BRANCH).to_string(),
            job_id: job_id.to_string(),
            specific_file: specific_file.unwrap_or_default().to_string(),
        };
        // the acknowledgement carries nothing, but it must be JSON
        let _: serde_json::Value = self
            .post_json(&self.endpoint("/koboldcpp/download"), &request)
            .await?;
        info!(job_id = %job_id, model = hf_model, "Download started");
        Ok(job_id)
    }

    pub async fn fetch_download_progress(&self, job_id: &JobId) -> Result<DownloadProgress, ApiError> {
        let url = self.endpoint(&format!("/koboldcpp/download/progress/{}", job_id));
        self.get_json(&url).await
    }

    /// Poll progress of `job_id` at the configured download interval.
    pub fn watch_download(&self, job_id: JobId) -> Result<DownloadWatch, ApiError> {
        Ok(DownloadWatch::start(
            self.clone(),
            job_id,
            self.config.download_poll_interval,
        )?)
    }

    pub async fn set_parameters(
        &self,
        model_path: &str,
        context_length: u32,
        kv_quant: Option<KvQuant>,
    ) -> Result<(), ApiError> {
        let request = SetParametersRequest {
            model_path: model_path.to_string(),
            context_length,
            kv_quant,
        };
        let response = self
            .client
            .post(self.endpoint("/koboldcpp/set-parameters"))
            .json(&request)
            .send()
            .await?;
        let body = read_body(response)
            .await
            .inspect_err(|e| warn!("Error setting parameters: {}", e))?;
        info!("Parameters set: {}", String::from_utf8_lossy(&body));
        Ok(())
    }
}

async fn read_body(response: Response) -> Result<Vec<u8>, ApiError> {
    let status = response.status();
    if !status.is_success() {
        debug!("{} answered {}", response.url(), status);
        return Err(ApiError::Http { status });
    }
    Ok(response.bytes().await?.to_vec())
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let body = read_body(response).await?;
    Ok(serde_json::from_slice(&body)?)
}
