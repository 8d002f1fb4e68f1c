pub mod api;
pub mod downloads;
pub mod liveness;
pub mod poller;
pub mod polling_service;
pub mod ports;
pub mod probe;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use api::{ApiClient, ApiError};
pub use downloads::{DownloadState, DownloadWatch, HfModelRef, JobId};
pub use liveness::{Liveness, PollState};
pub use poller::Poller;
pub use polling_service::{PollingService, StatusStream, StatusSubscription};
pub use ports::{LivenessProbe, ProbeFactory};
pub use probe::{HttpProbe, HttpProbeFactory};
