use async_trait::async_trait;
use shared::Result;
use std::sync::Arc;

use crate::liveness::Liveness;

// Ports are the seams between the pollers and whatever performs a check

/// One liveness check against a single target
#[async_trait]
pub trait LivenessProbe: Send + Sync + 'static {
    /// What is being checked, for logs
    fn target(&self) -> &str;

    /// Run one check. Failures are classified, never returned.
    async fn probe(&self) -> Liveness;
}

/// Builds probes for the shared polling service
pub trait ProbeFactory: Send + Sync + 'static {
    /// Canonical key for `target`; identical polls resolve to the same key
    fn resolve(&self, target: &str) -> Result<String> {
        Ok(target.to_string())
    }

    fn probe_for(&self, url: &str) -> Arc<dyn LivenessProbe>;
}
