//! Model download jobs: client-generated job ids and a progress watcher.

use shared::{Error, Result};
use shared_http::api::DownloadProgress;
use std::fmt;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::{ApiClient, ApiError};

/// Identifier the client assigns to a download before asking the backend to start it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId(String);

impl JobId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A Hugging Face model address as typed by a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HfModelRef {
    pub model: String,
    pub branch: Option<String>,
}

impl HfModelRef {
    const HUB_PREFIX: &str = "https://huggingface.co/";

    /// Accepts `org/repo`, `org/repo:branch` and full hub URLs.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim().trim_end_matches('/');
        let trimmed = trimmed.strip_prefix(Self::HUB_PREFIX).unwrap_or(trimmed);

        // `org/repo:branch[:anything]`; segments after the branch are ignored
        let mut parts = trimmed.split(':');
        let model = parts.next().unwrap_or_default();
        let branch = parts.next();

        if model.is_empty() {
            return Err(Error::InvalidModel(input.to_string()));
        }
        if let Some(branch) = branch {
            let valid = !branch.is_empty()
                && branch
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
            if !valid {
                return Err(Error::InvalidModel(format!(
                    "branch '{}' may only contain letters, digits, '.', '_' and '-'",
                    branch
                )));
            }
        }

        Ok(Self {
            model: model.to_string(),
            branch: branch.map(str::to_string),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DownloadState {
    /// Started, no progress reported yet
    Pending,
    Running {
        filename: Option<String>,
        percent: u8,
    },
    Done {
        filename: Option<String>,
    },
    Failed {
        message: String,
    },
}

impl DownloadState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DownloadState::Done { .. } | DownloadState::Failed { .. })
    }

    pub fn percent(&self) -> u8 {
        match self {
            DownloadState::Pending | DownloadState::Failed { .. } => 0,
            DownloadState::Running { percent, .. } => *percent,
            DownloadState::Done { .. } => 100,
        }
    }

    fn from_poll(result: std::result::Result<DownloadProgress, ApiError>) -> Self {
        match result {
            Err(e) => DownloadState::Failed {
                message: e.to_string(),
            },
            Ok(DownloadProgress {
                error: Some(message),
                ..
            }) => DownloadState::Failed { message },
            Ok(progress) if progress.done => DownloadState::Done {
                filename: progress.filename,
            },
            Ok(progress) => DownloadState::Running {
                percent: progress.percent(),
                filename: progress.filename,
            },
        }
    }
}

/// Polls a download job's progress until it finishes, fails, or is stopped
pub struct DownloadWatch {
    job_id: JobId,
    state: watch::Receiver<DownloadState>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl DownloadWatch {
    /// First poll happens one `interval` after start.
    pub fn start(client: ApiClient, job_id: JobId, interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(Error::InvalidInterval(
                "progress interval must be positive".to_string(),
            ));
        }

        let (tx, rx) = watch::channel(DownloadState::Pending);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(client, job_id.clone(), interval, tx, cancel.clone()));

        Ok(Self {
            job_id,
            state: rx,
            cancel,
            task: Some(task),
        })
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn subscribe(&self) -> watch::Receiver<DownloadState> {
        self.state.clone()
    }

    pub fn state(&self) -> DownloadState {
        self.state.borrow().clone()
    }

    /// Wait until the job reaches `Done` or `Failed`.
    ///
    /// Returns the last known state if polling ends some other way.
    pub async fn wait(self) -> DownloadState {
        let mut rx = self.state.clone();
        loop {
            let current = rx.borrow_and_update().clone();
            if current.is_terminal() {
                return current;
            }
            if rx.changed().await.is_err() {
                return rx.borrow().clone();
            }
        }
    }

    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(job_id = %self.job_id, "Download watch ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for DownloadWatch {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl fmt::Debug for DownloadWatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadWatch")
            .field("job_id", &self.job_id)
            .field("state", &*self.state.borrow())
            .finish()
    }
}

async fn run(
    client: ApiClient,
    job_id: JobId,
    interval: Duration,
    tx: watch::Sender<DownloadState>,
    cancel: CancellationToken,
) {
    let mut ticker = time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = client.fetch_download_progress(&job_id) => result,
        };
        if cancel.is_cancelled() {
            break;
        }

        let next = DownloadState::from_poll(result);
        match &next {
            DownloadState::Failed { message } => {
                warn!(job_id = %job_id, "Download failed: {}", message)
            }
            DownloadState::Done { filename } => {
                info!(job_id = %job_id, filename = ?filename, "Download complete")
            }
            _ => debug!(job_id = %job_id, percent = next.percent(), "Download progress"),
        }

        let finished = next.is_terminal();
        tx.send_replace(next);
        if finished {
            break;
        }
    }
}
