//! Fixed-interval liveness poller.
//!
//! A poller owns one background task that checks its probe immediately and then
//! once per interval, publishing each result through a `watch` channel. Only the
//! task writes the state; consumers hold receivers.

use chrono::Utc;
use shared::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::liveness::{Liveness, PollState};
use crate::ports::LivenessProbe;

pub struct Poller {
    target: String,
    state: watch::Receiver<PollState>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Poller {
    /// Start polling `probe` every `interval`. The first check runs right away.
    pub fn start(probe: Arc<dyn LivenessProbe>, interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(Error::InvalidInterval(
                "poll interval must be positive".to_string(),
            ));
        }

        let target = probe.target().to_string();
        let (tx, rx) = watch::channel(PollState::default());
        let cancel = CancellationToken::new();

        info!(probe = %target, interval_ms = interval.as_millis() as u64, "Starting poller");
        let task = tokio::spawn(run(probe, interval, tx, cancel.clone()));

        Ok(Self {
            target,
            state: rx,
            cancel,
            task: Some(task),
        })
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// A receiver that observes every published state
    pub fn subscribe(&self) -> watch::Receiver<PollState> {
        self.state.clone()
    }

    pub fn state(&self) -> PollState {
        self.state.borrow().clone()
    }

    pub fn liveness(&self) -> Liveness {
        self.state.borrow().value
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stop without waiting. A check already in flight is discarded.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Stop and wait for the task to exit; nothing is published after this returns.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(probe = %self.target, "Poller task ended abnormally: {}", e);
            }
        }
        debug!(probe = %self.target, "Poller stopped");
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("target", &self.target)
            .field("state", &*self.state.borrow())
            .field("stopped", &self.cancel.is_cancelled())
            .finish()
    }
}

async fn run(
    probe: Arc<dyn LivenessProbe>,
    interval: Duration,
    tx: watch::Sender<PollState>,
    cancel: CancellationToken,
) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut checks: u64 = 0;

    loop {
        let scheduled = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            at = ticker.tick() => at,
        };

        let value = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            value = probe.probe() => value,
        };

        // a check that outlived its interval waits for the next boundary
        if let Some(next) = next_boundary(scheduled, Instant::now(), interval) {
            ticker.reset_at(next);
        }

        // stopped while the response was being classified
        if cancel.is_cancelled() {
            break;
        }

        checks += 1;
        let previous = tx
            .send_replace(PollState {
                value,
                last_updated: Some(Utc::now()),
                checks,
            })
            .value;

        if previous != value {
            info!(probe = %probe.target(), from = %previous, to = %value, "Liveness changed");
        } else {
            debug!(probe = %probe.target(), value = %value, checks, "Liveness unchanged");
        }
    }
}

/// First interval boundary at or after `now` when a check started at `scheduled` overran.
fn next_boundary(scheduled: Instant, now: Instant, interval: Duration) -> Option<Instant> {
    let elapsed = now.saturating_duration_since(scheduled);
    if elapsed <= interval {
        return None;
    }
    let periods = elapsed.as_nanos().div_ceil(interval.as_nanos());
    let periods = u32::try_from(periods).unwrap_or(u32::MAX);
    Some(scheduled + interval.saturating_mul(periods))
}
