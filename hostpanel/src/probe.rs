use async_trait::async_trait;
use shared::Result;
use std::sync::Arc;
use tracing::debug;

use crate::api::ApiClient;
use crate::liveness::Liveness;
use crate::ports::{LivenessProbe, ProbeFactory};

/// Probe that GETs a health URL and classifies it with the client's health contract
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: ApiClient,
    url: String,
}

impl HttpProbe {
    pub fn new(client: ApiClient, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl LivenessProbe for HttpProbe {
    fn target(&self) -> &str {
        &self.url
    }

    async fn probe(&self) -> Liveness {
        match self.client.check_health_at(&self.url).await {
            Ok(liveness) => liveness,
            Err(e) => {
                debug!(url = %self.url, "Health check failed: {}", e);
                Liveness::Offline
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpProbeFactory {
    client: ApiClient,
}

impl HttpProbeFactory {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

impl ProbeFactory for HttpProbeFactory {
    fn resolve(&self, target: &str) -> Result<String> {
        self.client.config().resolve(target)
    }

    fn probe_for(&self, url: &str) -> Arc<dyn LivenessProbe> {
        Arc::new(HttpProbe::new(self.client.clone(), url))
    }
}
